//! The byte-moving seam under both protocol modules.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::Result;

/// Pause after a failed receive before the loops read again. Only
/// [`Transport::receive`] returning `Ok(None)` ends a receive loop.
pub(crate) const RECEIVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One whole frame or datagram per call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Waits for the next frame. Returns `Ok(None)` once [`Transport::shutdown`]
    /// has been called, including for a receive that was already waiting.
    async fn receive(&self) -> Result<Option<Vec<u8>>>;

    fn shutdown(&self);
}

/// Latching shutdown flag that any number of receivers can await.
#[derive(Debug)]
pub(crate) struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        ShutdownSignal { tx }
    }

    pub(crate) fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only returns once triggered.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// In-memory transport. Whatever owns the paired [`ChannelHandle`] plays the
/// wire: frames it feeds in are received here, frames sent here come out of
/// the handle.
pub struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: ShutdownSignal,
}

pub struct ChannelHandle {
    inbound: mpsc::UnboundedSender<Vec<u8>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ChannelHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                inbound: Mutex::new(inbound_rx),
                outbound: outbound_tx,
                shutdown: ShutdownSignal::new(),
            },
            ChannelHandle {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        if self.outbound.send(data.to_vec()).is_err() {
            tracing::debug!("Channel handle dropped, discarding {} bytes", data.len());
        }
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        if self.shutdown.is_triggered() {
            return Ok(None);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            frame = inbound.recv() => Ok(frame),
            _ = self.shutdown.triggered() => Ok(None),
        }
    }

    fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

impl ChannelHandle {
    /// Hands a received frame to the transport. Returns false if the
    /// transport is gone.
    pub fn feed(&self, frame: Vec<u8>) -> bool {
        self.inbound.send(frame).is_ok()
    }

    /// Next frame the transport was asked to transmit.
    pub async fn next_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbound.recv().await
    }

    pub fn try_next_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_feed_and_drain() {
        let (transport, mut handle) = ChannelTransport::pair();
        assert!(handle.feed(vec![1, 2, 3]));
        assert_eq!(transport.receive().await.unwrap(), Some(vec![1, 2, 3]));

        transport.send(&[4, 5]).await.unwrap();
        assert_eq!(handle.next_outbound().await, Some(vec![4, 5]));
        assert_eq!(handle.try_next_outbound(), None);
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_pending_receive() {
        let (transport, _handle) = ChannelTransport::pair();
        let transport = Arc::new(transport);
        let receiver = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.receive().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .expect("receive did not return after shutdown")
            .unwrap();
        assert_eq!(result.unwrap(), None);
        assert_eq!(transport.receive().await.unwrap(), None);
    }
}
