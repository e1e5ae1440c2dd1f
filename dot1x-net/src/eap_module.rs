//! Send and receive loops for EAPOL frames.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::eap::{EapFrame, EapMessage};
use crate::error::Error;
use crate::ethernet::MacAddress;
use crate::transport::{Transport, RECEIVE_RETRY_DELAY};

type OutboundQueue = mpsc::UnboundedReceiver<Option<Vec<u8>>>;

pub struct EapModule<T> {
    transport: T,
    auth_mac: MacAddress,
    outbound_tx: mpsc::UnboundedSender<Option<Vec<u8>>>,
    outbound_rx: Mutex<Option<OutboundQueue>>,
}

impl<T: Transport> EapModule<T> {
    /// `auth_mac` is the source address of every frame sent to supplicants.
    pub fn new(transport: T, auth_mac: MacAddress) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        EapModule {
            transport,
            auth_mac,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
        }
    }

    pub fn auth_mac(&self) -> MacAddress {
        self.auth_mac
    }

    /// Queues `message` for `dst`.
    pub fn send_eap_message(&self, dst: MacAddress, message: &EapMessage) {
        debug!("Queueing {} for {}", message, dst);
        let frame = match EapFrame::new(dst, self.auth_mac, message.clone()).pack() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Unable to encode {} for {}: {}", message, dst, e);
                return;
            }
        };
        if self.outbound_tx.send(Some(frame)).is_err() {
            warn!("EAP send loop has stopped, dropping {} for {}", message, dst);
        }
    }

    /// Reads frames until the transport shuts down, handing each decoded
    /// message and its source MAC to `on_message`. Undecodable frames are
    /// logged and skipped.
    pub async fn receive_eap_messages<F>(&self, mut on_message: F)
    where
        F: FnMut(MacAddress, EapMessage) + Send,
    {
        loop {
            let frame = match self.transport.receive().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read from EAP transport: {}", e);
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
            };
            debug!("Received frame: {}", hex::encode(&frame));
            match EapFrame::parse(&frame) {
                Ok(EapFrame { src_mac, message, .. }) => {
                    debug!("Received {} from {}", message, src_mac);
                    on_message(src_mac, message);
                }
                Err(Error::BadEthertype(ethertype)) => {
                    debug!("Ignoring frame with ethertype 0x{:04x}", ethertype);
                }
                Err(e) => warn!("Dropping undecodable EAPOL frame: {}", e),
            }
        }
        info!("Done receiving EAP messages");
    }

    /// Writes queued frames until the shutdown sentinel is dequeued.
    pub async fn send_eap_messages(&self) {
        let queue = self.outbound_rx.lock().unwrap().take();
        let Some(mut queue) = queue else {
            warn!("EAP send loop is already running");
            return;
        };
        while let Some(Some(frame)) = queue.recv().await {
            if let Err(e) = self.transport.send(&frame).await {
                error!("Failed to send EAP frame: {}", e);
            }
        }
        info!("Done sending EAP messages");
    }

    /// Stops both loops: the send loop after frames already queued, the
    /// receive loop immediately.
    pub fn shut_down(&self) {
        let _ = self.outbound_tx.send(None);
        self.transport.shutdown();
    }
}
