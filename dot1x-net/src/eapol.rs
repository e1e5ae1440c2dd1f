// EAPOL Packet Definitions
// Based on IEEE 802.1X

use crate::error::{Error, Result};

pub const EAPOL_HEADER_LEN: usize = 4;

/// Version written on every frame we originate.
pub const EAPOL_VERSION: u8 = 1;

// EAPOL Packet Type
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum EapolType {
    Eap = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    EncapsulatedAsfAlert = 4,
}

impl TryFrom<u8> for EapolType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(EapolType::Eap),
            1 => Ok(EapolType::Start),
            2 => Ok(EapolType::Logoff),
            3 => Ok(EapolType::Key),
            4 => Ok(EapolType::EncapsulatedAsfAlert),
            other => Err(Error::UnsupportedEapolType(other)),
        }
    }
}

/// EAPOL header plus the body it declares. Trailing bytes past the declared
/// body length (Ethernet padding) are not part of `payload`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct EapolPacket<'a> {
    pub version: u8,
    pub packet_type: EapolType,
    pub payload: &'a [u8],
}

impl<'a> EapolPacket<'a> {
    pub fn new(packet_type: EapolType, payload: &'a [u8]) -> Self {
        EapolPacket {
            version: EAPOL_VERSION,
            packet_type,
            payload,
        }
    }

    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        if data.len() < EAPOL_HEADER_LEN {
            return Err(Error::truncated("EAPOL header", EAPOL_HEADER_LEN, data.len()));
        }
        let version = data[0];
        let packet_type = EapolType::try_from(data[1])?;
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let end = EAPOL_HEADER_LEN + length;
        if data.len() < end {
            return Err(Error::truncated("EAPOL body", end, data.len()));
        }

        Ok(EapolPacket {
            version,
            packet_type,
            payload: &data[EAPOL_HEADER_LEN..end],
        })
    }

    /// The length field is always taken from `payload`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(EAPOL_HEADER_LEN + self.payload.len());
        bytes.push(self.version);
        bytes.push(self.packet_type as u8);
        bytes.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(self.payload);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_byte_buffer_is_truncated_header() {
        let err = EapolPacket::from_bytes(&[1, 1, 0]).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedHeader { needed: 4, available: 3, .. }
        ));
    }

    #[test]
    fn test_declared_length_past_end_is_rejected() {
        let err = EapolPacket::from_bytes(&[1, 0, 0, 10, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::TruncatedHeader { needed: 14, available: 7, .. }));
    }

    #[test]
    fn test_padding_is_not_payload() {
        let mut frame = EapolPacket::new(EapolType::Start, &[]).to_bytes();
        frame.extend_from_slice(&[0u8; 42]);
        let packet = EapolPacket::from_bytes(&frame).unwrap();
        assert_eq!(packet.packet_type, EapolType::Start);
        assert_eq!(packet.version, EAPOL_VERSION);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn test_unknown_packet_type() {
        let err = EapolPacket::from_bytes(&[1, 9, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedEapolType(9)));
    }
}
