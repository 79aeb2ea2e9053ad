//! Provider selection from configuration.
//!
//! The set of backends is closed, so dispatch goes through a tagged enum
//! rather than a registry of trait objects.

use async_trait::async_trait;
use sketchpal_config::{AppConfig, ProviderConfig, ProviderKind};
use sketchpal_core::error::ProviderError;
use sketchpal_core::provider::{ChunkReceiver, Provider, ProviderRequest};
use std::sync::Arc;
use tracing::{info, warn};

use crate::custom_http::CustomHttpProvider;
use crate::hosted::HostedProvider;

/// One of the supported chat backends.
pub enum ProviderClient {
    Hosted(HostedProvider),
    CustomHttp(CustomHttpProvider),
}

impl ProviderClient {
    /// Build the backend a provider table describes.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        match config.kind {
            ProviderKind::Hosted => HostedProvider::from_config(config).map(Self::Hosted),
            ProviderKind::Custom => CustomHttpProvider::from_config(config).map(Self::CustomHttp),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Hosted(_) => ProviderKind::Hosted,
            Self::CustomHttp(_) => ProviderKind::Custom,
        }
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Self::Hosted(p) => p,
            Self::CustomHttp(p) => p,
        }
    }
}

#[async_trait]
impl Provider for ProviderClient {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, ProviderError> {
        self.inner().complete(request).await
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.inner().stream(request).await
    }
}

/// The providers a chat session needs.
pub struct ProviderSet {
    /// Answers user queries and writes summaries.
    pub chat: Arc<dyn Provider>,

    /// Describes captured frames. `None` when no hosted key is configured,
    /// in which case screen analysis is skipped.
    pub vision: Option<Arc<dyn Provider>>,
}

/// Build the chat and vision providers from configuration.
///
/// Fails only when the selected chat backend cannot be built.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderSet, ProviderError> {
    let chat = Arc::new(ProviderClient::from_config(config.chat_provider())?);
    info!(provider = %chat.name(), "Chat provider ready");

    let vision: Option<Arc<dyn Provider>> = match chat.kind() {
        ProviderKind::Hosted => Some(chat.clone() as Arc<dyn Provider>),
        ProviderKind::Custom => match ProviderClient::from_config(config.vision_provider()) {
            Ok(p) => Some(Arc::new(p)),
            Err(e) => {
                warn!(error = %e, "Screen analysis disabled");
                None
            }
        },
    };

    Ok(ProviderSet { chat, vision })
}
