//! EAP (RFC 3748) messages as carried between supplicant and authenticator.
//!
//! Decoding goes header-first: Ethernet, then EAPOL, then (for EAPOL type
//! EAP-Packet) the EAP header and the type-specific body. Every stage checks
//! its declared length against what is actually there.

use std::fmt;

use crate::eapol::{EapolPacket, EapolType};
use crate::error::{Error, Result};
use crate::ethernet::{EthernetFrame, MacAddress, ETHERTYPE_EAPOL};

pub const EAP_HEADER_LEN: usize = 4;
pub const EAP_TYPE_LEN: usize = 1;

const EAP_CODE_SUCCESS: u8 = 3;
const EAP_CODE_FAILURE: u8 = 4;

/// Code of a typed EAP packet. Success and Failure carry no type byte and are
/// separate message variants.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum EapCode {
    Request = 1,
    Response = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum EapType {
    Identity = 1,
    LegacyNak = 3, // Response only
    Md5Challenge = 4,
    Tls = 13,
    Ttls = 21,
    Peap = 25,
}

impl TryFrom<u8> for EapType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(EapType::Identity),
            3 => Ok(EapType::LegacyNak),
            4 => Ok(EapType::Md5Challenge),
            13 => Ok(EapType::Tls),
            21 => Ok(EapType::Ttls),
            25 => Ok(EapType::Peap),
            other => Err(Error::UnknownEapType(other)),
        }
    }
}

/// One decoded EAPOL/EAP message. TLS-family payloads are opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EapMessage {
    Identity {
        code: EapCode,
        id: u8,
        identity: String,
    },
    LegacyNak {
        code: EapCode,
        id: u8,
        desired_types: Vec<u8>,
    },
    Md5Challenge {
        code: EapCode,
        id: u8,
        challenge: Vec<u8>,
        extra: Vec<u8>,
    },
    Tls {
        code: EapCode,
        id: u8,
        flags: u8,
        extra: Vec<u8>,
    },
    Ttls {
        code: EapCode,
        id: u8,
        flags: u8,
        extra: Vec<u8>,
    },
    Peap {
        code: EapCode,
        id: u8,
        flags: u8,
        extra: Vec<u8>,
    },
    Success {
        id: u8,
    },
    Failure {
        id: u8,
    },
    EapolStart,
    EapolLogoff,
}

impl EapMessage {
    /// EAP identifier, absent for the EAPOL-only variants.
    pub fn id(&self) -> Option<u8> {
        match self {
            EapMessage::Identity { id, .. }
            | EapMessage::LegacyNak { id, .. }
            | EapMessage::Md5Challenge { id, .. }
            | EapMessage::Tls { id, .. }
            | EapMessage::Ttls { id, .. }
            | EapMessage::Peap { id, .. }
            | EapMessage::Success { id }
            | EapMessage::Failure { id } => Some(*id),
            EapMessage::EapolStart | EapMessage::EapolLogoff => None,
        }
    }

    pub fn code(&self) -> Option<EapCode> {
        match self {
            EapMessage::Identity { code, .. }
            | EapMessage::LegacyNak { code, .. }
            | EapMessage::Md5Challenge { code, .. }
            | EapMessage::Tls { code, .. }
            | EapMessage::Ttls { code, .. }
            | EapMessage::Peap { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_response(&self) -> bool {
        self.code() == Some(EapCode::Response)
    }

    /// Parses a bare EAP packet (no EAPOL header), as found inside an
    /// EAP-Message RADIUS attribute.
    pub fn parse_eap(data: &[u8]) -> Result<Self> {
        if data.len() < EAP_HEADER_LEN {
            return Err(Error::truncated("EAP header", EAP_HEADER_LEN, data.len()));
        }
        let code = data[0];
        let id = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if length < EAP_HEADER_LEN {
            return Err(Error::MalformedEap(format!(
                "length field {} shorter than the header",
                length
            )));
        }
        if data.len() < length {
            return Err(Error::truncated("EAP body", length, data.len()));
        }

        let code = match code {
            EAP_CODE_SUCCESS => return Ok(EapMessage::Success { id }),
            EAP_CODE_FAILURE => return Ok(EapMessage::Failure { id }),
            1 => EapCode::Request,
            2 => EapCode::Response,
            other => return Err(Error::UnknownEapCode(other)),
        };

        let typed_header = EAP_HEADER_LEN + EAP_TYPE_LEN;
        if length < typed_header {
            return Err(Error::truncated("EAP type", typed_header, length));
        }
        let body = &data[typed_header..length];

        match EapType::try_from(data[EAP_HEADER_LEN])? {
            EapType::Identity => {
                let identity = String::from_utf8(body.to_vec())
                    .map_err(|e| Error::MalformedEap(format!("identity is not UTF-8: {}", e)))?;
                Ok(EapMessage::Identity { code, id, identity })
            }
            EapType::LegacyNak => Ok(EapMessage::LegacyNak {
                code,
                id,
                desired_types: body.to_vec(),
            }),
            EapType::Md5Challenge => {
                let value_size = *body
                    .first()
                    .ok_or_else(|| Error::truncated("EAP-MD5 value size", 1, 0))?
                    as usize;
                if body.len() < 1 + value_size {
                    return Err(Error::truncated("EAP-MD5 value", 1 + value_size, body.len()));
                }
                Ok(EapMessage::Md5Challenge {
                    code,
                    id,
                    challenge: body[1..1 + value_size].to_vec(),
                    extra: body[1 + value_size..].to_vec(),
                })
            }
            tls_type @ (EapType::Tls | EapType::Ttls | EapType::Peap) => {
                let (&flags, extra) = body
                    .split_first()
                    .ok_or_else(|| Error::truncated("EAP-TLS flags", 1, 0))?;
                let extra = extra.to_vec();
                Ok(match tls_type {
                    EapType::Tls => EapMessage::Tls { code, id, flags, extra },
                    EapType::Ttls => EapMessage::Ttls { code, id, flags, extra },
                    _ => EapMessage::Peap { code, id, flags, extra },
                })
            }
        }
    }

    /// Parses an EAPOL packet and, for EAP-Packet frames, the EAP inside it.
    pub fn parse_eapol(data: &[u8]) -> Result<Self> {
        let eapol = EapolPacket::from_bytes(data)?;
        match eapol.packet_type {
            EapolType::Eap => EapMessage::parse_eap(eapol.payload),
            EapolType::Start => Ok(EapMessage::EapolStart),
            EapolType::Logoff => Ok(EapMessage::EapolLogoff),
            other => Err(Error::UnsupportedEapolType(other as u8)),
        }
    }

    /// Encodes the EAP packet alone. The length field is computed here.
    /// EAPOL-Start/Logoff have no EAP representation, and a message whose
    /// fields do not fit their length octets is refused.
    pub fn pack_eap(&self) -> Result<Vec<u8>> {
        let (code, id, eap_type, body) = match self {
            EapMessage::Success { id } => return pack_eap_header(EAP_CODE_SUCCESS, *id, 0),
            EapMessage::Failure { id } => return pack_eap_header(EAP_CODE_FAILURE, *id, 0),
            EapMessage::EapolStart | EapMessage::EapolLogoff => {
                return Err(Error::MalformedEap(format!("{} cannot be carried as EAP", self)));
            }
            EapMessage::Identity { code, id, identity } => {
                (*code, *id, EapType::Identity, identity.as_bytes().to_vec())
            }
            EapMessage::LegacyNak { code, id, desired_types } => {
                (*code, *id, EapType::LegacyNak, desired_types.clone())
            }
            EapMessage::Md5Challenge { code, id, challenge, extra } => {
                let value_size = u8::try_from(challenge.len()).map_err(|_| {
                    Error::MalformedEap(format!("EAP-MD5 value of {} bytes exceeds 255", challenge.len()))
                })?;
                let mut body = Vec::with_capacity(1 + challenge.len() + extra.len());
                body.push(value_size);
                body.extend_from_slice(challenge);
                body.extend_from_slice(extra);
                (*code, *id, EapType::Md5Challenge, body)
            }
            EapMessage::Tls { code, id, flags, extra } => (*code, *id, EapType::Tls, tls_body(*flags, extra)),
            EapMessage::Ttls { code, id, flags, extra } => (*code, *id, EapType::Ttls, tls_body(*flags, extra)),
            EapMessage::Peap { code, id, flags, extra } => (*code, *id, EapType::Peap, tls_body(*flags, extra)),
        };

        let mut bytes = pack_eap_header(code as u8, id, EAP_TYPE_LEN + body.len())?;
        bytes.push(eap_type as u8);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Encodes the message with its EAPOL header.
    pub fn pack(&self) -> Result<Vec<u8>> {
        Ok(match self {
            EapMessage::EapolStart => EapolPacket::new(EapolType::Start, &[]).to_bytes(),
            EapMessage::EapolLogoff => EapolPacket::new(EapolType::Logoff, &[]).to_bytes(),
            _ => EapolPacket::new(EapolType::Eap, &self.pack_eap()?).to_bytes(),
        })
    }
}

impl fmt::Display for EapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EapMessage::Identity { code, id, identity } => {
                write!(f, "Identity({:?}, id={}, identity={:?})", code, id, identity)
            }
            EapMessage::LegacyNak { code, id, desired_types } => {
                write!(f, "LegacyNak({:?}, id={}, desired={:?})", code, id, desired_types)
            }
            EapMessage::Md5Challenge { code, id, challenge, .. } => {
                write!(f, "Md5Challenge({:?}, id={}, challenge={})", code, id, hex::encode(challenge))
            }
            EapMessage::Tls { code, id, flags, extra } => {
                write!(f, "Tls({:?}, id={}, flags=0x{:02x}, {} bytes)", code, id, flags, extra.len())
            }
            EapMessage::Ttls { code, id, flags, extra } => {
                write!(f, "Ttls({:?}, id={}, flags=0x{:02x}, {} bytes)", code, id, flags, extra.len())
            }
            EapMessage::Peap { code, id, flags, extra } => {
                write!(f, "Peap({:?}, id={}, flags=0x{:02x}, {} bytes)", code, id, flags, extra.len())
            }
            EapMessage::Success { id } => write!(f, "Success(id={})", id),
            EapMessage::Failure { id } => write!(f, "Failure(id={})", id),
            EapMessage::EapolStart => write!(f, "EapolStart"),
            EapMessage::EapolLogoff => write!(f, "EapolLogoff"),
        }
    }
}

fn pack_eap_header(code: u8, id: u8, body_len: usize) -> Result<Vec<u8>> {
    let size = EAP_HEADER_LEN + body_len;
    let length = u16::try_from(size).map_err(|_| Error::PacketTooLarge {
        size,
        max: u16::MAX as usize,
    })?;
    let mut bytes = Vec::with_capacity(size);
    bytes.push(code);
    bytes.push(id);
    bytes.extend_from_slice(&length.to_be_bytes());
    Ok(bytes)
}

fn tls_body(flags: u8, extra: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(1 + extra.len());
    body.push(flags);
    body.extend_from_slice(extra);
    body
}

/// An EAP message together with the Ethernet addressing it travelled with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapFrame {
    pub dst_mac: MacAddress,
    pub src_mac: MacAddress,
    pub message: EapMessage,
}

impl EapFrame {
    pub fn new(dst_mac: MacAddress, src_mac: MacAddress, message: EapMessage) -> Self {
        EapFrame {
            dst_mac,
            src_mac,
            message,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let ethernet = EthernetFrame::parse(data)?;
        if ethernet.ethertype != ETHERTYPE_EAPOL {
            return Err(Error::BadEthertype(ethernet.ethertype));
        }
        let message = EapMessage::parse_eapol(&ethernet.payload)?;
        Ok(EapFrame {
            dst_mac: ethernet.dst_mac,
            src_mac: ethernet.src_mac,
            message,
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        Ok(EthernetFrame::new(self.dst_mac, self.src_mac, ETHERTYPE_EAPOL, self.message.pack()?).pack())
    }
}
