//! RADIUS packets (RFC 2865) as exchanged with the authentication server.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::ethernet::MacAddress;
use crate::radius_attributes::{
    raw_value_offset, AttributeList, AttributeValue, RadiusAttribute, RadiusAttributeType,
    ATTRIBUTE_HEADER_LEN,
};
use crate::radius_auth::{
    encrypt_user_password, response_authenticator, sign_message_authenticator,
    validate_message_authenticator, validate_response_authenticator, AUTHENTICATOR_LEN,
    AUTHENTICATOR_OFFSET,
};

pub const RADIUS_HEADER_LEN: usize = 20;
pub const RADIUS_MAX_LEN: usize = 4096;

// RADIUS Packet Codes
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum RadiusCode {
    AccessRequest = 1,
    AccessAccept = 2,
    AccessReject = 3,
    AccessChallenge = 11,
}

impl RadiusCode {
    /// Codes a server sends back in answer to an Access-Request.
    pub fn is_response(self) -> bool {
        matches!(
            self,
            RadiusCode::AccessAccept | RadiusCode::AccessReject | RadiusCode::AccessChallenge
        )
    }
}

impl TryFrom<u8> for RadiusCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(RadiusCode::AccessRequest),
            2 => Ok(RadiusCode::AccessAccept),
            3 => Ok(RadiusCode::AccessReject),
            11 => Ok(RadiusCode::AccessChallenge),
            other => Err(Error::UnknownRadiusCode(other)),
        }
    }
}

/// What was sent under a packet id, needed to route and validate the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub src_mac: MacAddress,
    pub port_id: u32,
    pub request_authenticator: [u8; AUTHENTICATOR_LEN],
    /// Generation of the device session that issued the request.
    pub session_id: u64,
}

/// Outstanding requests keyed by RADIUS packet id. Entries are overwritten
/// when the id wraps around, never removed on lookup.
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HashMap<u8, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, packet_id: u8, request: PendingRequest) {
        self.requests.insert(packet_id, request);
    }

    pub fn get(&self, packet_id: u8) -> Option<&PendingRequest> {
        self.requests.get(&packet_id)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusPacket {
    pub code: RadiusCode,
    pub packet_id: u8,
    pub authenticator: [u8; AUTHENTICATOR_LEN],
    pub attributes: AttributeList,
}

impl RadiusPacket {
    pub fn new(
        code: RadiusCode,
        packet_id: u8,
        authenticator: [u8; AUTHENTICATOR_LEN],
        attributes: AttributeList,
    ) -> Self {
        RadiusPacket {
            code,
            packet_id,
            authenticator,
            attributes,
        }
    }

    /// MAC-Authentication-Bypass request: the supplicant MAC stands in as
    /// both user name and password.
    pub fn mab_access_request(
        packet_id: u8,
        request_authenticator: [u8; AUTHENTICATOR_LEN],
        src_mac: MacAddress,
        nas_port: Option<u32>,
        secret: &[u8],
    ) -> Result<Self> {
        let user_name = src_mac.to_string_with("");
        let mut attributes = AttributeList::default();
        attributes.push(RadiusAttribute::text(RadiusAttributeType::UserName, &user_name)?);
        attributes.push(RadiusAttribute::text(
            RadiusAttributeType::CallingStationId,
            &src_mac.to_string_with("-"),
        )?);
        if let Some(port) = nas_port {
            attributes.push(RadiusAttribute::integer(RadiusAttributeType::NasPort, port)?);
        }
        let hidden = encrypt_user_password(secret, &request_authenticator, user_name.as_bytes());
        attributes.push(RadiusAttribute::string(RadiusAttributeType::UserPassword, &hidden)?);
        attributes.push(RadiusAttribute::message_authenticator_placeholder());

        Ok(RadiusPacket::new(
            RadiusCode::AccessRequest,
            packet_id,
            request_authenticator,
            attributes,
        ))
    }

    /// Encodes header and attributes as they are; no hashing.
    pub fn pack(&self) -> Result<Vec<u8>> {
        let length = RADIUS_HEADER_LEN + self.attributes.packed_len();
        if length > RADIUS_MAX_LEN {
            return Err(Error::PacketTooLarge {
                size: length,
                max: RADIUS_MAX_LEN,
            });
        }
        let mut bytes = Vec::with_capacity(length);
        bytes.push(self.code as u8);
        bytes.push(self.packet_id);
        bytes.extend_from_slice(&(length as u16).to_be_bytes());
        bytes.extend_from_slice(&self.authenticator);
        bytes.extend_from_slice(&self.attributes.pack());
        Ok(bytes)
    }

    fn message_authenticator_offset(&self) -> Option<usize> {
        self.attributes
            .offset_of(RadiusAttributeType::MessageAuthenticator)
            .map(|offset| RADIUS_HEADER_LEN + offset + ATTRIBUTE_HEADER_LEN)
    }

    /// Packs a request and fills in its Message-Authenticator, if it has one.
    pub fn build(&self, secret: &[u8]) -> Result<Vec<u8>> {
        let mut bytes = self.pack()?;
        if let Some(offset) = self.message_authenticator_offset() {
            sign_message_authenticator(&mut bytes, offset, &self.authenticator, secret);
        }
        Ok(bytes)
    }

    /// Packs a server response: Message-Authenticator first, then the
    /// Response-Authenticator over the signed packet.
    pub fn build_response(
        &self,
        secret: &[u8],
        request_authenticator: &[u8; AUTHENTICATOR_LEN],
    ) -> Result<Vec<u8>> {
        let mut bytes = self.pack()?;
        if let Some(offset) = self.message_authenticator_offset() {
            sign_message_authenticator(&mut bytes, offset, request_authenticator, secret);
        }
        let authenticator = response_authenticator(&bytes, request_authenticator, secret)?;
        bytes[AUTHENTICATOR_OFFSET..AUTHENTICATOR_OFFSET + AUTHENTICATOR_LEN].copy_from_slice(&authenticator);
        Ok(bytes)
    }

    /// Parses and validates a received packet. Responses are checked against
    /// the authenticator of the request recorded under their packet id.
    pub fn parse(data: &[u8], secret: &[u8], pending: &PendingRequests) -> Result<Self> {
        let packet_id = peek_packet_id(data)?;
        let request_authenticator = pending.get(packet_id).map(|p| p.request_authenticator);
        Self::parse_with_request_authenticator(data, secret, request_authenticator.as_ref())
    }

    /// Like [`RadiusPacket::parse`] with the request authenticator supplied
    /// directly. Access-Requests validate against their own authenticator and
    /// ignore `request_authenticator`.
    pub fn parse_with_request_authenticator(
        data: &[u8],
        secret: &[u8],
        request_authenticator: Option<&[u8; AUTHENTICATOR_LEN]>,
    ) -> Result<Self> {
        if data.len() < RADIUS_HEADER_LEN {
            return Err(Error::truncated("RADIUS header", RADIUS_HEADER_LEN, data.len()));
        }
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if length > RADIUS_MAX_LEN {
            return Err(Error::PacketTooLarge {
                size: length,
                max: RADIUS_MAX_LEN,
            });
        }
        if length < RADIUS_HEADER_LEN || data.len() < length {
            return Err(Error::truncated("RADIUS packet", length.max(RADIUS_HEADER_LEN), data.len()));
        }
        // Octets beyond the length field are padding (RFC 2865 section 3).
        let data = &data[..length];

        let code = RadiusCode::try_from(data[0])?;
        let packet_id = data[1];
        let mut authenticator = [0u8; AUTHENTICATOR_LEN];
        authenticator.copy_from_slice(&data[AUTHENTICATOR_OFFSET..RADIUS_HEADER_LEN]);
        let attributes = AttributeList::parse(&data[RADIUS_HEADER_LEN..])?;

        let request_authenticator = if code.is_response() {
            *request_authenticator.ok_or(Error::UnknownCorrelation(packet_id))?
        } else {
            authenticator
        };

        if code.is_response() {
            validate_response_authenticator(data, &request_authenticator, secret)?;
        }
        if let Some(offset) = raw_value_offset(
            &data[RADIUS_HEADER_LEN..],
            RadiusAttributeType::MessageAuthenticator,
        ) {
            validate_message_authenticator(
                data,
                RADIUS_HEADER_LEN + offset,
                &request_authenticator,
                secret,
            )?;
        }

        Ok(RadiusPacket {
            code,
            packet_id,
            authenticator,
            attributes,
        })
    }

    /// The reassembled EAP-Message, if the packet carries one.
    pub fn eap_message(&self) -> Option<Vec<u8>> {
        self.attributes
            .find(RadiusAttributeType::EapMessage)
            .map(RadiusAttribute::value_bytes)
    }

    pub fn state(&self) -> Option<Vec<u8>> {
        match self.attributes.find(RadiusAttributeType::State)?.value() {
            AttributeValue::String(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for RadiusPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(id={}", self.code, self.packet_id)?;
        for attribute in &self.attributes {
            write!(f, ", {}", attribute)?;
        }
        write!(f, ")")
    }
}

/// Packet id of a datagram, read before anything else is validated.
pub fn peek_packet_id(data: &[u8]) -> Result<u8> {
    if data.len() < RADIUS_HEADER_LEN {
        return Err(Error::truncated("RADIUS header", RADIUS_HEADER_LEN, data.len()));
    }
    Ok(data[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radius_auth::decrypt_user_password;

    const SECRET: &[u8] = b"SECRET";

    fn request_authenticator() -> [u8; 16] {
        let mut ra = [0u8; 16];
        for (i, b) in ra.iter_mut().enumerate() {
            *b = i as u8;
        }
        ra
    }

    fn access_request() -> RadiusPacket {
        RadiusPacket::new(
            RadiusCode::AccessRequest,
            0,
            request_authenticator(),
            AttributeList::new(vec![
                RadiusAttribute::text(RadiusAttributeType::UserName, "user1").unwrap(),
                RadiusAttribute::message_authenticator_placeholder(),
            ]),
        )
    }

    fn pending_for(packet_id: u8) -> PendingRequests {
        let mut pending = PendingRequests::new();
        pending.insert(
            packet_id,
            PendingRequest {
                src_mac: MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]),
                port_id: 1,
                request_authenticator: request_authenticator(),
                session_id: 1,
            },
        );
        pending
    }

    fn accept(packet_id: u8) -> RadiusPacket {
        RadiusPacket::new(
            RadiusCode::AccessAccept,
            packet_id,
            [0u8; 16],
            AttributeList::new(vec![
                RadiusAttribute::eap_message(&[3, 1, 0, 4]).unwrap(),
                RadiusAttribute::message_authenticator_placeholder(),
            ]),
        )
    }

    #[test]
    fn test_build_fills_message_authenticator() {
        let bytes = access_request().build(SECRET).unwrap();
        assert_eq!(bytes.len(), 45);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 45]);
        assert_eq!(hex::encode(&bytes[29..45]), "55efdcffcf9836390077a7fe5b17a6f3");
    }

    #[test]
    fn test_access_request_validates_against_itself() {
        let bytes = access_request().build(SECRET).unwrap();
        let parsed = RadiusPacket::parse(&bytes, SECRET, &PendingRequests::new()).unwrap();
        assert_eq!(parsed.code, RadiusCode::AccessRequest);
        assert_eq!(parsed.attributes.len(), 2);
        assert!(RadiusPacket::parse(&bytes, b"WRONG", &PendingRequests::new()).is_err());
    }

    #[test]
    fn test_response_round_trip() {
        let response = accept(0);
        let bytes = response.build_response(SECRET, &request_authenticator()).unwrap();
        let parsed = RadiusPacket::parse(&bytes, SECRET, &pending_for(0)).unwrap();
        assert_eq!(parsed.code, RadiusCode::AccessAccept);
        assert_eq!(parsed.packet_id, 0);
        assert_eq!(parsed.eap_message(), Some(vec![3, 1, 0, 4]));
        assert_eq!(&parsed.authenticator[..], &bytes[4..20]);
        let ma = parsed.attributes.find(RadiusAttributeType::MessageAuthenticator).unwrap();
        assert_eq!(ma.value_bytes(), bytes[28..44].to_vec());
        assert_ne!(ma.value_bytes(), vec![0u8; 16]);
    }

    #[test]
    fn test_flipped_authenticator_is_rejected() {
        let mut bytes = accept(0).build_response(SECRET, &request_authenticator()).unwrap();
        bytes[10] ^= 0x80;
        let err = RadiusPacket::parse(&bytes, SECRET, &pending_for(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidResponseAuthenticator(0)));
    }

    #[test]
    fn test_mutated_attribute_fails_message_authenticator() {
        let response = accept(0);
        let mut bytes = response.build_response(SECRET, &request_authenticator()).unwrap();
        // Corrupt the EAP-Message, then recompute only the Response-Authenticator.
        bytes[22] = 4;
        let authenticator = response_authenticator(&bytes, &request_authenticator(), SECRET).unwrap();
        bytes[4..20].copy_from_slice(&authenticator);
        let err = RadiusPacket::parse(&bytes, SECRET, &pending_for(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidMessageAuthenticator(0)));
    }

    #[test]
    fn test_response_without_pending_request() {
        let bytes = accept(9).build_response(SECRET, &request_authenticator()).unwrap();
        let err = RadiusPacket::parse(&bytes, SECRET, &pending_for(0)).unwrap_err();
        assert!(matches!(err, Error::UnknownCorrelation(9)));
    }

    #[test]
    fn test_challenge_with_long_eap_message_and_state() {
        let eap: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
        let challenge = RadiusPacket::new(
            RadiusCode::AccessChallenge,
            7,
            [0u8; 16],
            AttributeList::new(vec![
                RadiusAttribute::eap_message(&eap).unwrap(),
                RadiusAttribute::string(RadiusAttributeType::State, b"state-1").unwrap(),
                RadiusAttribute::message_authenticator_placeholder(),
            ]),
        );
        let bytes = challenge.build_response(SECRET, &request_authenticator()).unwrap();
        let parsed = RadiusPacket::parse(&bytes, SECRET, &pending_for(7)).unwrap();
        assert_eq!(parsed.eap_message(), Some(eap));
        assert_eq!(parsed.state(), Some(b"state-1".to_vec()));
        assert_eq!(parsed.attributes.len(), 3);
    }

    #[test]
    fn test_unknown_code_and_short_header() {
        let mut bytes = access_request().build(SECRET).unwrap();
        bytes[0] = 4;
        assert!(matches!(
            RadiusPacket::parse(&bytes, SECRET, &PendingRequests::new()),
            Err(Error::UnknownRadiusCode(4))
        ));
        assert!(matches!(
            RadiusPacket::parse(&bytes[..19], SECRET, &PendingRequests::new()),
            Err(Error::TruncatedHeader { needed: 20, available: 19, .. })
        ));
    }

    #[test]
    fn test_oversized_packet_is_refused() {
        let mut attributes = AttributeList::default();
        attributes.push(RadiusAttribute::eap_message(&vec![0u8; 4100]).unwrap());
        let packet = RadiusPacket::new(RadiusCode::AccessRequest, 1, [0; 16], attributes);
        assert!(matches!(packet.pack(), Err(Error::PacketTooLarge { max: 4096, .. })));
    }

    #[test]
    fn test_mab_access_request() {
        let mac = MacAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        let packet = RadiusPacket::mab_access_request(3, request_authenticator(), mac, Some(42), SECRET).unwrap();
        let bytes = packet.build(SECRET).unwrap();
        let parsed = RadiusPacket::parse(&bytes, SECRET, &PendingRequests::new()).unwrap();

        let find = |t| parsed.attributes.find(t).unwrap().value().clone();
        assert_eq!(find(RadiusAttributeType::UserName), AttributeValue::Text("aabbccddee01".into()));
        assert_eq!(find(RadiusAttributeType::CallingStationId), AttributeValue::Text("aa-bb-cc-dd-ee-01".into()));
        assert_eq!(find(RadiusAttributeType::NasPort), AttributeValue::Integer(42));
        let hidden = parsed.attributes.find(RadiusAttributeType::UserPassword).unwrap().value_bytes();
        assert_eq!(decrypt_user_password(SECRET, &request_authenticator(), &hidden), b"aabbccddee01");
    }
}
