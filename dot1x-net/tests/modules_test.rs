use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pnet::packet::ethernet::{EtherType, EtherTypes, MutableEthernetPacket};
use pnet::util::MacAddr;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use dot1x_net::eap::{EapCode, EapFrame, EapMessage};
use dot1x_net::radius::{PendingRequests, RadiusCode, RadiusPacket};
use dot1x_net::radius_attributes::{AttributeList, AttributeValue, RadiusAttribute, RadiusAttributeType};
use dot1x_net::{
    ChannelHandle, ChannelTransport, EapModule, Error, MacAddress, RadiusModule, RadiusRequest, RadiusSocket, Result,
    Transport,
};

const SECRET: &str = "SECRET";
const SUPPLICANT: MacAddress = MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
const AUTHENTICATOR: MacAddress = MacAddress([0x02, 0x42, 0xac, 0x17, 0x00, 0x6f]);

fn build_frame(src: MacAddress, ethertype: EtherType, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0u8; 14 + payload.len()];
    let mut packet = MutableEthernetPacket::new(&mut buffer).unwrap();
    packet.set_destination(MacAddr::new(0x01, 0x80, 0xc2, 0x00, 0x00, 0x03));
    let [a, b, c, d, e, f] = src.octets();
    packet.set_source(MacAddr::new(a, b, c, d, e, f));
    packet.set_ethertype(ethertype);
    packet.set_payload(payload);
    buffer
}

async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Option<T> {
    tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_eap_module_skips_bad_frames_and_relays_good_ones() {
    let (transport, mut wire) = ChannelTransport::pair();
    let module = Arc::new(EapModule::new(transport, AUTHENTICATOR));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let receiver = {
        let module = module.clone();
        tokio::spawn(async move {
            module
                .receive_eap_messages(move |src, message| {
                    let _ = tx.send((src, message));
                })
                .await
        })
    };
    let sender = {
        let module = module.clone();
        tokio::spawn(async move { module.send_eap_messages().await })
    };

    let eapol = EtherType::new(0x888e);
    wire.feed(build_frame(SUPPLICANT, EtherTypes::Ipv4, &[0x45, 0, 0, 20]));
    wire.feed(build_frame(SUPPLICANT, eapol, &[1, 1, 0]));
    wire.feed(build_frame(SUPPLICANT, eapol, &[1, 0, 0, 6, 2, 9, 0, 6, 26, 0]));
    wire.feed(build_frame(SUPPLICANT, eapol, &[1, 1, 0, 0]));

    let identity = EapMessage::Identity {
        code: EapCode::Response,
        id: 1,
        identity: "user1".to_string(),
    };
    wire.feed(build_frame(SUPPLICANT, eapol, &identity.pack().unwrap()));

    assert_eq!(recv_within(&mut rx).await, Some((SUPPLICANT, EapMessage::EapolStart)));
    assert_eq!(recv_within(&mut rx).await, Some((SUPPLICANT, identity)));

    let request = EapMessage::Identity {
        code: EapCode::Request,
        id: 1,
        identity: String::new(),
    };
    module.send_eap_message(SUPPLICANT, &request);
    let frame = tokio::time::timeout(Duration::from_millis(500), wire.next_outbound())
        .await
        .unwrap()
        .unwrap();
    let parsed = EapFrame::parse(&frame).unwrap();
    assert_eq!(parsed.src_mac, AUTHENTICATOR);
    assert_eq!(parsed.dst_mac, SUPPLICANT);
    assert_eq!(parsed.message, request);

    module.shut_down();
    tokio::time::timeout(Duration::from_secs(1), receiver).await.unwrap().unwrap();
    tokio::time::timeout(Duration::from_secs(1), sender).await.unwrap().unwrap();
}

/// Fails its first receive with ENETDOWN, then behaves like the wrapped
/// channel transport.
struct InterfaceBounce {
    inner: ChannelTransport,
    failed: AtomicBool,
}

impl InterfaceBounce {
    fn pair() -> (Self, ChannelHandle) {
        let (inner, handle) = ChannelTransport::pair();
        let transport = InterfaceBounce {
            inner,
            failed: AtomicBool::new(false),
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for InterfaceBounce {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.inner.send(data).await
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        if !self.failed.swap(true, Ordering::SeqCst) {
            return Err(Error::Io(io::Error::from_raw_os_error(libc::ENETDOWN)));
        }
        self.inner.receive().await
    }

    fn shutdown(&self) {
        self.inner.shutdown()
    }
}

#[tokio::test]
async fn test_eap_receive_survives_transport_error() {
    let (transport, wire) = InterfaceBounce::pair();
    let module = Arc::new(EapModule::new(transport, AUTHENTICATOR));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let receiver = {
        let module = module.clone();
        tokio::spawn(async move {
            module
                .receive_eap_messages(move |src, message| {
                    let _ = tx.send((src, message));
                })
                .await
        })
    };

    wire.feed(build_frame(SUPPLICANT, EtherType::new(0x888e), &[1, 1, 0, 0]));
    assert_eq!(recv_within(&mut rx).await, Some((SUPPLICANT, EapMessage::EapolStart)));
    assert!(!receiver.is_finished());

    module.shut_down();
    tokio::time::timeout(Duration::from_secs(1), receiver).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_radius_receive_survives_transport_error() {
    let (transport, mut wire) = InterfaceBounce::pair();
    let module = Arc::new(RadiusModule::new(transport, SECRET, "02:42:ac:17:00:6f").unwrap());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let receiver = {
        let module = module.clone();
        tokio::spawn(async move {
            module
                .receive_radius_messages(move |response| {
                    let _ = tx.send(response);
                })
                .await
        })
    };
    {
        let module = module.clone();
        tokio::spawn(async move { module.send_radius_messages().await });
    }

    module.send_radius_request(identity_relay(1, None)).unwrap();
    let datagram = tokio::time::timeout(Duration::from_millis(500), wire.next_outbound())
        .await
        .unwrap()
        .unwrap();
    let request = RadiusPacket::parse(&datagram, SECRET.as_bytes(), &PendingRequests::new()).unwrap();
    let mut attributes = AttributeList::default();
    attributes.push(RadiusAttribute::message_authenticator_placeholder());
    let accept = RadiusPacket::new(RadiusCode::AccessAccept, request.packet_id, [0; 16], attributes)
        .build_response(SECRET.as_bytes(), &request.authenticator)
        .unwrap();
    wire.feed(accept);

    let response = recv_within(&mut rx).await.unwrap();
    assert_eq!(response.code, RadiusCode::AccessAccept);
    assert_eq!(response.src_mac, SUPPLICANT);
    assert!(!receiver.is_finished());

    module.shut_down();
    tokio::time::timeout(Duration::from_secs(1), receiver).await.unwrap().unwrap();
}

async fn start_radius_module() -> (
    Arc<RadiusModule<RadiusSocket>>,
    UdpSocket,
    mpsc::UnboundedReceiver<dot1x_net::RadiusResponse>,
) {
    let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let socket = RadiusSocket::bind("127.0.0.1:0".parse().unwrap(), server.local_addr().unwrap())
        .await
        .unwrap();
    let module = Arc::new(RadiusModule::new(socket, SECRET, "02:42:ac:17:00:6f").unwrap());
    let (tx, rx) = mpsc::unbounded_channel();
    {
        let module = module.clone();
        tokio::spawn(async move {
            module
                .receive_radius_messages(move |response| {
                    let _ = tx.send(response);
                })
                .await
        });
    }
    {
        let module = module.clone();
        tokio::spawn(async move { module.send_radius_messages().await });
    }
    (module, server, rx)
}

async fn receive_access_request(server: &UdpSocket) -> (RadiusPacket, std::net::SocketAddr) {
    let mut buf = [0u8; 4096];
    let (len, from) = tokio::time::timeout(Duration::from_secs(1), server.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap();
    let request = RadiusPacket::parse(&buf[..len], SECRET.as_bytes(), &PendingRequests::new()).unwrap();
    (request, from)
}

fn identity_relay(session_id: u64, state: Option<Vec<u8>>) -> RadiusRequest {
    RadiusRequest {
        eap_message: EapMessage::Identity {
            code: EapCode::Response,
            id: 1,
            identity: "user1".to_string(),
        },
        src_mac: SUPPLICANT,
        identity: Some("user1".to_string()),
        state,
        port_id: 0x17006f,
        session_id,
    }
}

#[tokio::test]
async fn test_radius_module_request_attributes_and_challenge() {
    let (module, server, mut responses) = start_radius_module().await;

    module.send_radius_request(identity_relay(7, Some(b"prior".to_vec()))).unwrap();
    let (request, from) = receive_access_request(&server).await;

    assert_eq!(request.code, RadiusCode::AccessRequest);
    assert_eq!(request.packet_id, 0);
    let types: Vec<_> = request.attributes.iter().map(|a| a.attr_type()).collect();
    assert_eq!(
        types,
        vec![
            RadiusAttributeType::UserName,
            RadiusAttributeType::CallingStationId,
            RadiusAttributeType::NasPort,
            RadiusAttributeType::CalledStationId,
            RadiusAttributeType::NasPortType,
            RadiusAttributeType::NasIdentifier,
            RadiusAttributeType::EapMessage,
            RadiusAttributeType::State,
            RadiusAttributeType::MessageAuthenticator,
        ]
    );
    let value = |t| request.attributes.find(t).unwrap().value().clone();
    assert_eq!(value(RadiusAttributeType::UserName), AttributeValue::Text("user1".into()));
    assert_eq!(value(RadiusAttributeType::CallingStationId), AttributeValue::Text("aa:bb:cc:dd:ee:01".into()));
    assert_eq!(value(RadiusAttributeType::NasPort), AttributeValue::Integer(0x17006f));
    assert_eq!(value(RadiusAttributeType::NasPortType), AttributeValue::Enum(15));
    assert_eq!(value(RadiusAttributeType::NasIdentifier), AttributeValue::Text("02:42:ac:17:00:6f".into()));
    assert_eq!(request.eap_message(), Some(vec![2, 1, 0, 10, 1, b'u', b's', b'e', b'r', b'1']));
    assert_eq!(request.state(), Some(b"prior".to_vec()));

    let challenge_eap = EapMessage::Md5Challenge {
        code: EapCode::Request,
        id: 2,
        challenge: vec![0x11; 16],
        extra: vec![],
    };
    let challenge = RadiusPacket::new(
        RadiusCode::AccessChallenge,
        request.packet_id,
        [0; 16],
        AttributeList::new(vec![
            RadiusAttribute::eap_message(&challenge_eap.pack_eap().unwrap()).unwrap(),
            RadiusAttribute::string(RadiusAttributeType::State, b"round-2").unwrap(),
            RadiusAttribute::message_authenticator_placeholder(),
        ]),
    );

    // Signed with the wrong secret: silently dropped.
    let forged = challenge.build_response(b"NOT-SECRET", &request.authenticator).unwrap();
    server.send_to(&forged, from).await.unwrap();
    assert_eq!(recv_within(&mut responses).await, None);

    let reply = challenge.build_response(SECRET.as_bytes(), &request.authenticator).unwrap();
    server.send_to(&reply, from).await.unwrap();
    let response = recv_within(&mut responses).await.unwrap();
    assert_eq!(response.src_mac, SUPPLICANT);
    assert_eq!(response.session_id, 7);
    assert_eq!(response.port_id, 0x17006f);
    assert_eq!(response.code, RadiusCode::AccessChallenge);
    assert_eq!(response.eap_message, Some(challenge_eap));
    assert_eq!(response.state, Some(b"round-2".to_vec()));

    module.shut_down();
}

#[tokio::test]
async fn test_radius_module_drops_uncorrelated_responses() {
    let (module, server, mut responses) = start_radius_module().await;

    module.send_radius_request(identity_relay(1, None)).unwrap();
    let (request, from) = receive_access_request(&server).await;
    assert!(request.state().is_none());

    let reject = RadiusPacket::new(
        RadiusCode::AccessReject,
        request.packet_id.wrapping_add(1),
        [0; 16],
        AttributeList::new(vec![RadiusAttribute::message_authenticator_placeholder()]),
    );
    let stray = reject.build_response(SECRET.as_bytes(), &request.authenticator).unwrap();
    server.send_to(&stray, from).await.unwrap();
    assert_eq!(recv_within(&mut responses).await, None);

    let reject = RadiusPacket { packet_id: request.packet_id, ..reject };
    let reply = reject.build_response(SECRET.as_bytes(), &request.authenticator).unwrap();
    server.send_to(&reply, from).await.unwrap();
    let response = recv_within(&mut responses).await.unwrap();
    assert_eq!(response.code, RadiusCode::AccessReject);
    assert_eq!(response.eap_message, None);

    // Second request gets the next packet id.
    module.send_radius_request(identity_relay(1, None)).unwrap();
    let (second, _) = receive_access_request(&server).await;
    assert_eq!(second.packet_id, request.packet_id.wrapping_add(1));

    module.shut_down();
}
