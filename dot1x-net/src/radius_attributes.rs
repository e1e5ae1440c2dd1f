//! RADIUS attribute-value pairs and their datatypes (RFC 2865, RFC 2869).

use std::fmt;

use crate::error::{Error, Result};

pub const ATTRIBUTE_HEADER_LEN: usize = 2;
pub const MAX_ATTRIBUTE_VALUE_LEN: usize = 253;
pub const MESSAGE_AUTHENTICATOR_LEN: usize = 16;

const INTEGER_LEN: usize = 4;
const VSA_MIN_LEN: usize = 5;

/// NAS-Port-Type value for a wired Ethernet port.
pub const NAS_PORT_TYPE_ETHERNET: u32 = 15;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataType {
    Integer,
    Enum,
    Text,
    String,
    /// Unbounded value split across consecutive AVPs of the same type.
    Concat,
    Vsa,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[repr(u8)]
pub enum RadiusAttributeType {
    UserName = 1,
    UserPassword = 2,
    NasIpAddress = 4,
    NasPort = 5,
    ServiceType = 6,
    FilterId = 11,
    FramedMtu = 12,
    ReplyMessage = 18,
    State = 24,
    VendorSpecific = 26,
    SessionTimeout = 27,
    CalledStationId = 30,
    CallingStationId = 31,
    NasIdentifier = 32,
    AcctSessionId = 44,
    NasPortType = 61,
    TunnelType = 64,
    TunnelMediumType = 65,
    ConnectInfo = 77,
    EapMessage = 79,
    MessageAuthenticator = 80,
    TunnelPrivateGroupId = 81,
    NasFilterRule = 92,
}

impl RadiusAttributeType {
    pub fn datatype(self) -> DataType {
        use RadiusAttributeType::*;
        match self {
            UserName | FilterId | ReplyMessage | CalledStationId | CallingStationId
            | NasIdentifier | AcctSessionId | ConnectInfo => DataType::Text,
            UserPassword | NasIpAddress | State | MessageAuthenticator | TunnelPrivateGroupId
            | NasFilterRule => DataType::String,
            NasPort | FramedMtu | SessionTimeout => DataType::Integer,
            ServiceType | NasPortType | TunnelType | TunnelMediumType => DataType::Enum,
            VendorSpecific => DataType::Vsa,
            EapMessage => DataType::Concat,
        }
    }
}

impl TryFrom<u8> for RadiusAttributeType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        use RadiusAttributeType::*;
        Ok(match value {
            1 => UserName,
            2 => UserPassword,
            4 => NasIpAddress,
            5 => NasPort,
            6 => ServiceType,
            11 => FilterId,
            12 => FramedMtu,
            18 => ReplyMessage,
            24 => State,
            26 => VendorSpecific,
            27 => SessionTimeout,
            30 => CalledStationId,
            31 => CallingStationId,
            32 => NasIdentifier,
            44 => AcctSessionId,
            61 => NasPortType,
            64 => TunnelType,
            65 => TunnelMediumType,
            77 => ConnectInfo,
            79 => EapMessage,
            80 => MessageAuthenticator,
            81 => TunnelPrivateGroupId,
            92 => NasFilterRule,
            other => return Err(Error::UnsupportedAttribute(other)),
        })
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AttributeValue {
    Integer(u32),
    Enum(u32),
    Text(String),
    String(Vec<u8>),
    Concat(Vec<u8>),
    /// Vendor-Id followed by vendor data, kept opaque.
    Vsa(Vec<u8>),
}

impl AttributeValue {
    fn datatype(&self) -> DataType {
        match self {
            AttributeValue::Integer(_) => DataType::Integer,
            AttributeValue::Enum(_) => DataType::Enum,
            AttributeValue::Text(_) => DataType::Text,
            AttributeValue::String(_) => DataType::String,
            AttributeValue::Concat(_) => DataType::Concat,
            AttributeValue::Vsa(_) => DataType::Vsa,
        }
    }

    /// Raw value bytes, without any AVP header.
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            AttributeValue::Integer(v) | AttributeValue::Enum(v) => v.to_be_bytes().to_vec(),
            AttributeValue::Text(s) => s.as_bytes().to_vec(),
            AttributeValue::String(b) | AttributeValue::Concat(b) | AttributeValue::Vsa(b) => b.clone(),
        }
    }
}

/// One logical attribute. A `Concat` attribute may occupy several AVPs on
/// the wire but is always a single `RadiusAttribute` here.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RadiusAttribute {
    attr_type: RadiusAttributeType,
    value: AttributeValue,
}

impl RadiusAttribute {
    /// Checks that `value` has the datatype `attr_type` requires and fits its
    /// length bounds.
    pub fn new(attr_type: RadiusAttributeType, value: AttributeValue) -> Result<Self> {
        let datatype = attr_type.datatype();
        if value.datatype() != datatype {
            return Err(Error::malformed_attribute(
                attr_type as u8,
                format!("expected {:?} value, got {:?}", datatype, value.datatype()),
            ));
        }
        check_value_len(attr_type, datatype, value.as_bytes().len())?;
        Ok(RadiusAttribute { attr_type, value })
    }

    pub fn text(attr_type: RadiusAttributeType, text: &str) -> Result<Self> {
        Self::new(attr_type, AttributeValue::Text(text.to_string()))
    }

    pub fn string(attr_type: RadiusAttributeType, bytes: &[u8]) -> Result<Self> {
        Self::new(attr_type, AttributeValue::String(bytes.to_vec()))
    }

    pub fn integer(attr_type: RadiusAttributeType, value: u32) -> Result<Self> {
        Self::new(attr_type, AttributeValue::Integer(value))
    }

    pub fn enumerated(attr_type: RadiusAttributeType, value: u32) -> Result<Self> {
        Self::new(attr_type, AttributeValue::Enum(value))
    }

    pub fn eap_message(eap: &[u8]) -> Result<Self> {
        Self::new(RadiusAttributeType::EapMessage, AttributeValue::Concat(eap.to_vec()))
    }

    /// Zero-filled Message-Authenticator, overwritten when the packet is built.
    pub fn message_authenticator_placeholder() -> Self {
        RadiusAttribute {
            attr_type: RadiusAttributeType::MessageAuthenticator,
            value: AttributeValue::String(vec![0u8; MESSAGE_AUTHENTICATOR_LEN]),
        }
    }

    pub fn attr_type(&self) -> RadiusAttributeType {
        self.attr_type
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    pub fn value_bytes(&self) -> Vec<u8> {
        self.value.as_bytes()
    }

    /// Decodes a single AVP value (header already stripped).
    fn decode(attr_type: RadiusAttributeType, data: &[u8]) -> Result<Self> {
        let datatype = attr_type.datatype();
        check_value_len(attr_type, datatype, data.len())?;
        let value = match datatype {
            DataType::Integer => AttributeValue::Integer(be_u32(data)),
            DataType::Enum => AttributeValue::Enum(be_u32(data)),
            DataType::Text => AttributeValue::Text(String::from_utf8(data.to_vec()).map_err(|_| {
                Error::malformed_attribute(attr_type as u8, "text value is not UTF-8")
            })?),
            DataType::String => AttributeValue::String(data.to_vec()),
            DataType::Concat => AttributeValue::Concat(data.to_vec()),
            DataType::Vsa => AttributeValue::Vsa(data.to_vec()),
        };
        Ok(RadiusAttribute { attr_type, value })
    }

    /// Bytes this attribute occupies on the wire, headers of every chunk
    /// included.
    pub fn packed_len(&self) -> usize {
        let data_len = self.value.as_bytes().len();
        match self.value {
            AttributeValue::Concat(_) => {
                let chunks = data_len.div_ceil(MAX_ATTRIBUTE_VALUE_LEN);
                chunks * ATTRIBUTE_HEADER_LEN + data_len
            }
            _ => ATTRIBUTE_HEADER_LEN + data_len,
        }
    }

    fn pack_into(&self, out: &mut Vec<u8>) {
        let data = self.value.as_bytes();
        for chunk in data.chunks(MAX_ATTRIBUTE_VALUE_LEN) {
            out.push(self.attr_type as u8);
            out.push((chunk.len() + ATTRIBUTE_HEADER_LEN) as u8);
            out.extend_from_slice(chunk);
        }
    }
}

impl fmt::Display for RadiusAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            AttributeValue::Integer(v) | AttributeValue::Enum(v) => write!(f, "{:?}={}", self.attr_type, v),
            AttributeValue::Text(s) => write!(f, "{:?}={:?}", self.attr_type, s),
            AttributeValue::String(b) | AttributeValue::Concat(b) | AttributeValue::Vsa(b) => {
                write!(f, "{:?}=0x{}", self.attr_type, hex::encode(b))
            }
        }
    }
}

fn be_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn check_value_len(attr_type: RadiusAttributeType, datatype: DataType, len: usize) -> Result<()> {
    let (min, max) = match datatype {
        DataType::Integer | DataType::Enum => (INTEGER_LEN, INTEGER_LEN),
        DataType::Vsa => (VSA_MIN_LEN, MAX_ATTRIBUTE_VALUE_LEN),
        DataType::Concat => (1, usize::MAX),
        DataType::Text | DataType::String => (1, MAX_ATTRIBUTE_VALUE_LEN),
    };
    if len < min || len > max {
        return Err(Error::malformed_attribute(
            attr_type as u8,
            format!("{:?} value length {} outside {}..={}", datatype, len, min, max),
        ));
    }
    Ok(())
}

/// Ordered attributes of one packet.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct AttributeList {
    attributes: Vec<RadiusAttribute>,
}

impl AttributeList {
    pub fn new(attributes: Vec<RadiusAttribute>) -> Self {
        AttributeList { attributes }
    }

    pub fn push(&mut self, attribute: RadiusAttribute) {
        self.attributes.push(attribute);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RadiusAttribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// First attribute of the given type.
    pub fn find(&self, attr_type: RadiusAttributeType) -> Option<&RadiusAttribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type)
    }

    /// Byte offset of the first attribute of `attr_type` from the start of
    /// the attribute section.
    pub fn offset_of(&self, attr_type: RadiusAttributeType) -> Option<usize> {
        let mut offset = 0;
        for attribute in &self.attributes {
            if attribute.attr_type == attr_type {
                return Some(offset);
            }
            offset += attribute.packed_len();
        }
        None
    }

    pub fn packed_len(&self) -> usize {
        self.attributes.iter().map(RadiusAttribute::packed_len).sum()
    }

    /// Walks the AVP stream once. Chunks of a Concat attribute are joined in
    /// encounter order into one attribute that sits where its first chunk
    /// was.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut attributes: Vec<RadiusAttribute> = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            if data.len() - pos < ATTRIBUTE_HEADER_LEN {
                return Err(Error::truncated("RADIUS attribute header", ATTRIBUTE_HEADER_LEN, data.len() - pos));
            }
            let type_id = data[pos];
            let length = data[pos + 1] as usize;
            if length < ATTRIBUTE_HEADER_LEN {
                return Err(Error::malformed_attribute(type_id, format!("length {} below header size", length)));
            }
            if pos + length > data.len() {
                return Err(Error::truncated("RADIUS attribute", length, data.len() - pos));
            }
            let attr_type = RadiusAttributeType::try_from(type_id)?;
            let value = &data[pos + ATTRIBUTE_HEADER_LEN..pos + length];
            pos += length;

            if attr_type.datatype() == DataType::Concat {
                let existing = attributes.iter_mut().find(|a| a.attr_type == attr_type);
                if let Some(RadiusAttribute {
                    value: AttributeValue::Concat(buffer),
                    ..
                }) = existing
                {
                    buffer.extend_from_slice(value);
                    continue;
                }
            }
            attributes.push(RadiusAttribute::decode(attr_type, value)?);
        }
        Ok(AttributeList { attributes })
    }

    /// Encodes every attribute, re-chunking Concat values at 253 bytes.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.packed_len());
        for attribute in &self.attributes {
            attribute.pack_into(&mut out);
        }
        out
    }
}

/// Offset, within a well-formed raw AVP stream, of the value of the first
/// AVP of `attr_type`.
pub(crate) fn raw_value_offset(data: &[u8], attr_type: RadiusAttributeType) -> Option<usize> {
    let mut pos = 0;
    while pos + ATTRIBUTE_HEADER_LEN <= data.len() {
        if data[pos] == attr_type as u8 {
            return Some(pos + ATTRIBUTE_HEADER_LEN);
        }
        let length = data[pos + 1] as usize;
        if length < ATTRIBUTE_HEADER_LEN {
            return None;
        }
        pos += length;
    }
    None
}

impl<'a> IntoIterator for &'a AttributeList {
    type Item = &'a RadiusAttribute;
    type IntoIter = std::slice::Iter<'a, RadiusAttribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.attributes.iter()
    }
}
