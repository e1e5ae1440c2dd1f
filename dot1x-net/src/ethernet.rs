//! Ethernet II framing and MAC addresses.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ETHERNET_HEADER_LEN: usize = 14;

/// EtherType carried by every EAPOL frame (IEEE 802.1X Port Access Entity).
pub const ETHERTYPE_EAPOL: u16 = 0x888e;

/// 6-byte hardware address, compared and hashed by its raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// PAE group address that supplicants send EAPOL to.
    pub const EAPOL_MULTICAST: MacAddress = MacAddress([0x01, 0x80, 0xc2, 0x00, 0x00, 0x03]);

    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.try_into().ok()?;
        Some(MacAddress(bytes))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Lower-case hex with `separator` between octets, e.g. `aabbccddee01`
    /// or `aa-bb-cc-dd-ee-01`.
    pub fn to_string_with(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts colon-delimited hex with one or two digits per octet, any case.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMacAddress(s.to_string());
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

impl From<MacAddress> for [u8; 6] {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl From<pnet::datalink::MacAddr> for MacAddress {
    fn from(mac: pnet::datalink::MacAddr) -> Self {
        MacAddress(mac.octets())
    }
}

/// Ethernet II frame: fixed 14-byte header followed by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dst_mac: MacAddress,
    pub src_mac: MacAddress,
    pub ethertype: u16,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn new(dst_mac: MacAddress, src_mac: MacAddress, ethertype: u16, payload: Vec<u8>) -> Self {
        EthernetFrame {
            dst_mac,
            src_mac,
            ethertype,
            payload,
        }
    }

    /// Everything after the header is payload; NIC padding is left for the
    /// inner protocol's own length field to discard.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(Error::truncated("Ethernet header", ETHERNET_HEADER_LEN, data.len()));
        }
        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&data[0..6]);
        src.copy_from_slice(&data[6..12]);
        Ok(EthernetFrame {
            dst_mac: MacAddress(dst),
            src_mac: MacAddress(src),
            ethertype: u16::from_be_bytes([data[12], data[13]]),
            payload: data[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.dst_mac.0);
        bytes.extend_from_slice(&self.src_mac.0);
        bytes.extend_from_slice(&self.ethertype.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}
