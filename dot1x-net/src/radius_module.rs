//! Send and receive loops for RADIUS, with packet-id correlation.

use std::io;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::eap::EapMessage;
use crate::error::{Error, Result};
use crate::ethernet::MacAddress;
use crate::radius::{peek_packet_id, PendingRequest, PendingRequests, RadiusCode, RadiusPacket};
use crate::radius_attributes::{AttributeList, RadiusAttribute, RadiusAttributeType, NAS_PORT_TYPE_ETHERNET};
use crate::radius_auth::AUTHENTICATOR_LEN;
use crate::transport::{Transport, RECEIVE_RETRY_DELAY};

/// An EAP response to relay to the server on behalf of one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusRequest {
    pub eap_message: EapMessage,
    pub src_mac: MacAddress,
    pub identity: Option<String>,
    pub state: Option<Vec<u8>>,
    pub port_id: u32,
    pub session_id: u64,
}

/// A validated server answer, routed back to the device that asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusResponse {
    pub src_mac: MacAddress,
    pub port_id: u32,
    pub session_id: u64,
    pub code: RadiusCode,
    pub eap_message: Option<EapMessage>,
    pub state: Option<Vec<u8>>,
}

/// NAS-Port for an authenticator port: the last three octets of its MAC read
/// as a big-endian integer.
pub fn port_id_from_mac(mac: MacAddress) -> u32 {
    let octets = mac.octets();
    u32::from_be_bytes([0, octets[3], octets[4], octets[5]])
}

pub struct RadiusModule<T> {
    transport: T,
    secret: Vec<u8>,
    nas_id: String,
    next_id: Mutex<u8>,
    pending: Mutex<PendingRequests>,
    outbound_tx: mpsc::UnboundedSender<Option<OutboundPacket>>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Option<OutboundPacket>>>>,
}

/// An encoded Access-Request and the device it was sent for.
type OutboundPacket = (MacAddress, Vec<u8>);

impl<T: Transport> RadiusModule<T> {
    /// `nas_id` is sent as both NAS-Identifier and Called-Station-Id, so it
    /// must fit a Text attribute.
    pub fn new(transport: T, secret: &str, nas_id: &str) -> Result<Self> {
        RadiusAttribute::text(RadiusAttributeType::NasIdentifier, nas_id)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(RadiusModule {
            transport,
            secret: secret.as_bytes().to_vec(),
            nas_id: nas_id.to_string(),
            next_id: Mutex::new(0),
            pending: Mutex::new(PendingRequests::new()),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
        })
    }

    /// Encodes `request` and queues it for the send loop. An error means
    /// nothing was sent and no packet id was used; the caller has to settle
    /// the device's session itself.
    pub fn send_radius_request(&self, request: RadiusRequest) -> Result<()> {
        let bytes = self.encode_request(&request)?;
        if self.outbound_tx.send(Some((request.src_mac, bytes))).is_err() {
            warn!("RADIUS send loop has stopped, dropping request for {}", request.src_mac);
        }
        Ok(())
    }

    fn next_packet_id(&self) -> u8 {
        let mut id = self.next_id.lock().unwrap();
        let packet_id = *id;
        *id = id.wrapping_add(1);
        packet_id
    }

    fn generate_request_authenticator() -> Result<[u8; AUTHENTICATOR_LEN]> {
        let mut authenticator = [0u8; AUTHENTICATOR_LEN];
        getrandom::getrandom(&mut authenticator)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;
        Ok(authenticator)
    }

    fn request_attributes(&self, request: &RadiusRequest) -> Result<AttributeList> {
        let eap = request.eap_message.pack_eap()?;
        let mut attributes = AttributeList::default();
        if let Some(identity) = request.identity.as_deref().filter(|i| !i.is_empty()) {
            attributes.push(RadiusAttribute::text(RadiusAttributeType::UserName, identity)?);
        }
        attributes.push(RadiusAttribute::text(
            RadiusAttributeType::CallingStationId,
            &request.src_mac.to_string(),
        )?);
        attributes.push(RadiusAttribute::integer(RadiusAttributeType::NasPort, request.port_id)?);
        attributes.push(RadiusAttribute::text(RadiusAttributeType::CalledStationId, &self.nas_id)?);
        attributes.push(RadiusAttribute::enumerated(
            RadiusAttributeType::NasPortType,
            NAS_PORT_TYPE_ETHERNET,
        )?);
        attributes.push(RadiusAttribute::text(RadiusAttributeType::NasIdentifier, &self.nas_id)?);
        attributes.push(RadiusAttribute::eap_message(&eap)?);
        if let Some(state) = &request.state {
            attributes.push(RadiusAttribute::string(RadiusAttributeType::State, state)?);
        }
        attributes.push(RadiusAttribute::message_authenticator_placeholder());
        Ok(attributes)
    }

    /// Builds the signed Access-Request. The packet id is taken and the
    /// request recorded as pending only once the packet is known to encode.
    fn encode_request(&self, request: &RadiusRequest) -> Result<Vec<u8>> {
        let attributes = self.request_attributes(request)?;
        let request_authenticator = Self::generate_request_authenticator()?;
        let mut packet = RadiusPacket::new(RadiusCode::AccessRequest, 0, request_authenticator, attributes);
        // Size check before anything is committed.
        packet.pack()?;

        packet.packet_id = self.next_packet_id();
        self.pending.lock().unwrap().insert(
            packet.packet_id,
            PendingRequest {
                src_mac: request.src_mac,
                port_id: request.port_id,
                request_authenticator,
                session_id: request.session_id,
            },
        );
        debug!("Sending {} for {}", packet, request.src_mac);
        packet.build(&self.secret)
    }

    /// Writes queued requests until the shutdown sentinel is dequeued.
    pub async fn send_radius_messages(&self) {
        let queue = self.outbound_rx.lock().unwrap().take();
        let Some(mut queue) = queue else {
            warn!("RADIUS send loop is already running");
            return;
        };
        while let Some(Some((src_mac, bytes))) = queue.recv().await {
            if let Err(e) = self.transport.send(&bytes).await {
                error!("Failed to send RADIUS request for {}: {}", src_mac, e);
            }
        }
        info!("Done sending RADIUS messages");
    }

    /// Validates one datagram against its pending request and extracts what
    /// the device's state machine needs.
    fn decode_response(&self, data: &[u8]) -> Result<RadiusResponse> {
        let packet_id = peek_packet_id(data)?;
        // Clone so the lock is not held during validation.
        let pending = self
            .pending
            .lock()
            .unwrap()
            .get(packet_id)
            .cloned()
            .ok_or(Error::UnknownCorrelation(packet_id))?;

        let packet = RadiusPacket::parse_with_request_authenticator(
            data,
            &self.secret,
            Some(&pending.request_authenticator),
        )?;
        debug!("Received {}", packet);

        let eap_message = packet
            .eap_message()
            .map(|eap| EapMessage::parse_eap(&eap))
            .transpose()?;
        Ok(RadiusResponse {
            src_mac: pending.src_mac,
            port_id: pending.port_id,
            session_id: pending.session_id,
            code: packet.code,
            eap_message,
            state: packet.state(),
        })
    }

    /// Reads datagrams until the transport shuts down. Each valid
    /// Access-Accept, Access-Reject or Access-Challenge goes to `on_response`;
    /// anything that fails to decode or validate is logged and dropped.
    pub async fn receive_radius_messages<F>(&self, mut on_response: F)
    where
        F: FnMut(RadiusResponse) + Send,
    {
        loop {
            let data = match self.transport.receive().await {
                Ok(Some(data)) => data,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read from RADIUS transport: {}", e);
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
            };
            debug!("Received datagram: {}", hex::encode(&data));
            match self.decode_response(&data) {
                Ok(response) if response.code.is_response() => on_response(response),
                Ok(response) => warn!("Ignoring {:?} from RADIUS server", response.code),
                Err(e) => warn!("Dropping RADIUS packet: {}", e),
            }
        }
        info!("Done receiving RADIUS messages");
    }

    pub fn shut_down(&self) {
        let _ = self.outbound_tx.send(None);
        self.transport.shutdown();
    }
}
