use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;

    /// Context window size for this model.
    ///
    /// Reads from the static catalog; unknown models get
    /// [`crate::catalog::DEFAULT_CONTEXT_WINDOW`].
    fn context_window(&self) -> u32 {
        crate::catalog::context_window(self.model_name(), crate::catalog::DEFAULT_CONTEXT_WINDOW)
    }
}
