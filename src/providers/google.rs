use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::retry::{is_rate_limited, retry_after};
use super::{CapabilityFuture, TranslateRequest, TranslateResponse, TranslationCapability};
use crate::error::CapabilityError;

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
pub const ENDPOINT_ENV: &str = "PDF_TRANSLATOR_ENDPOINT";

/// Client for the public Google Translate web endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslate {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.trim().is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint
        };
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TranslationCapability for GoogleTranslate {
    fn name(&self) -> &str {
        "google"
    }

    fn translate(&self, request: TranslateRequest) -> CapabilityFuture {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        Box::pin(async move { call_translate(&client, &endpoint, request).await })
    }
}

async fn call_translate(
    client: &reqwest::Client,
    endpoint: &str,
    request: TranslateRequest,
) -> Result<TranslateResponse, CapabilityError> {
    let response = client
        .post(endpoint)
        .query(&[
            ("client", "gtx"),
            ("sl", request.source.as_str()),
            ("tl", request.target.as_str()),
            ("dt", "t"),
        ])
        .form(&[("q", request.text.as_str())])
        .send()
        .await
        .map_err(|err| CapabilityError::transport(err.to_string()))?;

    let status = response.status();
    let hint = retry_after(response.headers());
    let body = response
        .text()
        .await
        .map_err(|err| CapabilityError::transport(err.to_string()))?;
    debug!("translate endpoint responded {} ({} bytes)", status, body.len());

    if status.is_success() {
        return parse_response(&body, request.source.as_str());
    }
    let message = format!("{}: {}", status, summarize(&body));
    if is_rate_limited(status, &body) {
        return Err(CapabilityError::rate_limited(message).with_retry_after(hint));
    }
    if status == reqwest::StatusCode::BAD_REQUEST {
        return Err(CapabilityError::unsupported(format!(
            "{} -> {} rejected ({})",
            request.source, request.target, message
        )));
    }
    Err(CapabilityError::transport(message))
}

/// Response shape: `[[["translated", "source", ...], ...], null, "detected", ...]`.
pub(crate) fn parse_response(
    body: &str,
    requested_source: &str,
) -> Result<TranslateResponse, CapabilityError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| CapabilityError::transport(format!("malformed response: {}", err)))?;
    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| CapabilityError::transport("response carries no translation segments"))?;

    let translated_text = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect::<String>();
    let detected_source_lang = value
        .get(2)
        .and_then(Value::as_str)
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or(requested_source)
        .to_string();

    Ok(TranslateResponse {
        translated_text,
        detected_source_lang,
    })
}

fn summarize(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= 200 {
        return trimmed.to_string();
    }
    let short: String = trimmed.chars().take(200).collect();
    format!("{}...", short)
}
