use tokio::sync::mpsc;
use crate::{Error, Result};
use crate::message::RtmpMessage;

/// Receives every complete inbound message, in arrival order
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: RtmpMessage) -> Result<()>;
}

/// Forward messages into a channel
#[async_trait::async_trait]
impl MessageHandler for mpsc::Sender<RtmpMessage> {
    async fn handle(&self, message: RtmpMessage) -> Result<()> {
        self.send(message)
            .await
            .map_err(|_| Error::connection("Message receiver dropped"))
    }
}

/// Handler backed by a plain closure
pub struct FnHandler<F> {
    f: F,
}

/// Wrap a closure as a [`MessageHandler`]
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(RtmpMessage) -> Result<()> + Send + Sync,
{
    FnHandler { f }
}

#[async_trait::async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(RtmpMessage) -> Result<()> + Send + Sync,
{
    async fn handle(&self, message: RtmpMessage) -> Result<()> {
        (self.f)(message)
    }
}
