//! Language-model provider implementations for SketchPal.
//!
//! All providers implement the `sketchpal_core::Provider` trait.
//! [`ProviderClient`] is the tagged dispatch over the supported backends and
//! is built from configuration.

pub mod client;
pub mod custom_http;
pub mod hosted;

pub use client::{ProviderClient, ProviderSet, build_from_config};
pub use custom_http::CustomHttpProvider;
pub use hosted::HostedProvider;

use sketchpal_core::error::ProviderError;
use std::time::Duration;

/// Build the shared HTTP client used by every provider.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Classify a transport failure.
pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status to a provider error.
pub(crate) async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(status, body = %error_body, "Provider returned error");
            ProviderError::ApiError {
                status_code: status,
                message: error_body,
            }
        }
    }
}
