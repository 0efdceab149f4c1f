use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::error::CapabilityError;
use crate::languages::SourceLang;

pub mod google;
pub mod retry;

pub use google::GoogleTranslate;
pub use retry::{RetryPolicies, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateRequest {
    pub text: String,
    pub source: SourceLang,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslateResponse {
    pub translated_text: String,
    pub detected_source_lang: String,
}

pub type CapabilityFuture =
    Pin<Box<dyn Future<Output = Result<TranslateResponse, CapabilityError>> + Send>>;

/// Translates one piece of text and reports the source language it detected.
pub trait TranslationCapability: Send + Sync {
    fn name(&self) -> &str;
    fn translate(&self, request: TranslateRequest) -> CapabilityFuture;
}

impl<T: TranslationCapability + ?Sized> TranslationCapability for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn translate(&self, request: TranslateRequest) -> CapabilityFuture {
        (**self).translate(request)
    }
}
