use anyhow::{Result, anyhow};
use isolang::Language;
use std::fmt;
use std::str::FromStr;

pub const AUTO: &str = "auto";

/// Caller-supplied source language: explicit code or auto-detect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceLang {
    #[default]
    Auto,
    Code(String),
}

impl SourceLang {
    pub fn is_auto(&self) -> bool {
        matches!(self, SourceLang::Auto)
    }

    pub fn as_str(&self) -> &str {
        match self {
            SourceLang::Auto => AUTO,
            SourceLang::Code(code) => code,
        }
    }
}

impl fmt::Display for SourceLang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceLang {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(AUTO) {
            return Ok(SourceLang::Auto);
        }
        if !is_valid_lang_code(value) {
            return Err(anyhow!(
                "invalid source language code '{}' (expected ISO 639-1/3 code or auto)",
                value
            ));
        }
        Ok(SourceLang::Code(normalize_code(value)))
    }
}

pub fn parse_target(value: &str) -> Result<String> {
    let value = value.trim();
    if !is_valid_lang_code(value) {
        return Err(anyhow!(
            "invalid target language code '{}' (expected ISO 639-1/3 code)",
            value
        ));
    }
    Ok(normalize_code(value))
}

/// Parses a `SOURCE-TARGET` preset such as `auto-id` or `en->id`.
pub fn parse_direction(value: &str) -> Result<(SourceLang, String)> {
    let normalized = value.trim().replace("->", "-");
    let Some((source, target)) = normalized.split_once('-') else {
        return Err(anyhow!(
            "invalid direction '{}' (expected SOURCE-TARGET, e.g. auto-id)",
            value
        ));
    };
    Ok((source.parse()?, parse_target(target)?))
}

pub fn is_valid_lang_code(code: &str) -> bool {
    if is_iso_code(code) {
        return true;
    }
    let Some((base, suffix)) = split_lang_suffix(code) else {
        return false;
    };
    is_iso_code(&base)
        && matches!(suffix.len(), 2..=4)
        && suffix.chars().all(|ch| ch.is_ascii_alphanumeric())
}

pub fn language_name(code: &str) -> Option<&'static str> {
    let base = split_lang_suffix(code)
        .map(|(base, _)| base)
        .unwrap_or_else(|| code.trim().to_lowercase());
    lookup(&base).map(|language| language.to_name())
}

fn is_iso_code(code: &str) -> bool {
    lookup(&code.trim().to_lowercase()).is_some()
}

fn lookup(code: &str) -> Option<Language> {
    match code.len() {
        2 => Language::from_639_1(code),
        3 => Language::from_639_3(code),
        _ => None,
    }
}

fn split_lang_suffix(code: &str) -> Option<(String, String)> {
    let mut parts = code.trim().splitn(2, ['-', '_']);
    let base = parts.next()?.trim();
    let suffix = parts.next()?.trim();
    if base.is_empty() || suffix.is_empty() {
        return None;
    }
    Some((base.to_lowercase(), suffix.to_string()))
}

/// `EN` -> `en`, `zh_cn` -> `zh-CN`.
fn normalize_code(code: &str) -> String {
    match split_lang_suffix(code) {
        Some((base, suffix)) if suffix.len() == 2 => format!("{}-{}", base, suffix.to_uppercase()),
        Some((base, suffix)) => format!("{}-{}", base, suffix),
        None => code.trim().to_lowercase(),
    }
}
