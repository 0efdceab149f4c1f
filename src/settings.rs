use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::providers::google::{DEFAULT_ENDPOINT, ENDPOINT_ENV};
use crate::providers::{RetryPolicies, RetryPolicy};
use crate::segmenter::DEFAULT_MAX_CHUNK_SIZE;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const SETTINGS_DIR: &str = ".pdf-translator";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub max_chunk_size: usize,
    pub endpoint: String,
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub rate_limit_retry: RetryPolicy,
    pub transport_retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            concurrency: 1,
            rate_limit_retry: RetryPolicy::rate_limit(),
            transport_retry: RetryPolicy::transport(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    segment: Option<SegmentSettings>,
    translate: Option<TranslateSettings>,
    retry: Option<RetrySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct SegmentSettings {
    max_chunk_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    endpoint: Option<String>,
    timeout_secs: Option<u64>,
    concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrySettings {
    rate_limit: Option<RetryPolicySettings>,
    transport: Option<RetryPolicySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RetryPolicySettings {
    max_attempts: Option<u32>,
    base_delay_ms: Option<u64>,
    backoff_multiplier: Option<f64>,
    max_delay_ms: Option<u64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path
        && !extra.exists()
    {
        return Err(anyhow!("settings file not found: {}", extra.display()));
    }
    ordered_paths.extend(extra_path.map(Path::to_path_buf));

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            debug!("applied settings from {}", path.display());
            settings.merge(parsed);
        }
    }

    if let Ok(endpoint) = std::env::var(ENDPOINT_ENV)
        && !endpoint.trim().is_empty()
    {
        settings.endpoint = endpoint.trim().to_string();
    }

    Ok(settings)
}

impl Settings {
    pub fn retry_policies(&self) -> RetryPolicies {
        RetryPolicies::new(vec![self.rate_limit_retry.clone(), self.transport_retry.clone()])
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(segment) = incoming.segment
            && let Some(size) = segment.max_chunk_size
            && size > 0
        {
            self.max_chunk_size = size;
        }
        if let Some(translate) = incoming.translate {
            if let Some(endpoint) = translate.endpoint
                && !endpoint.trim().is_empty()
            {
                self.endpoint = endpoint.trim().to_string();
            }
            if let Some(secs) = translate.timeout_secs
                && secs > 0
            {
                self.request_timeout = Duration::from_secs(secs);
            }
            if let Some(concurrency) = translate.concurrency
                && concurrency > 0
            {
                self.concurrency = concurrency.min(crate::orchestrator::MAX_CONCURRENCY);
            }
        }
        if let Some(retry) = incoming.retry {
            if let Some(policy) = retry.rate_limit {
                merge_policy(&mut self.rate_limit_retry, policy);
            }
            if let Some(policy) = retry.transport {
                merge_policy(&mut self.transport_retry, policy);
            }
        }
    }
}

fn merge_policy(target: &mut RetryPolicy, incoming: RetryPolicySettings) {
    if let Some(attempts) = incoming.max_attempts
        && attempts > 0
    {
        target.max_attempts = attempts;
    }
    if let Some(ms) = incoming.base_delay_ms {
        target.base_delay = Duration::from_millis(ms);
    }
    if let Some(multiplier) = incoming.backoff_multiplier
        && multiplier.is_finite()
        && multiplier >= 1.0
    {
        target.backoff_multiplier = multiplier;
    }
    if let Some(ms) = incoming.max_delay_ms {
        target.max_delay = Duration::from_millis(ms);
    }
    if target.max_delay < target.base_delay {
        target.max_delay = target.base_delay;
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(SETTINGS_DIR))
        }
    })
}
