//! Error types for the 802.1X relay codecs and transports.

use thiserror::Error;

/// Result type alias for codec and transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while decoding, encoding or moving a packet.
///
/// All parse-time variants are non-fatal: the receive loop that hit one logs it
/// and drops the packet.
#[derive(Error, Debug)]
pub enum Error {
    /// A header (or the body length it declares) runs past the available bytes.
    #[error("{layer} truncated: need {needed} bytes, have {available}")]
    TruncatedHeader {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    /// Ethernet frame that does not carry EAPOL.
    #[error("bad ethertype 0x{0:04x}, expected 0x888e")]
    BadEthertype(u16),

    /// EAPOL packet type this relay does not handle (e.g. EAPOL-Key).
    #[error("unsupported EAPOL packet type {0}")]
    UnsupportedEapolType(u8),

    #[error("unknown EAP code {0}")]
    UnknownEapCode(u8),

    #[error("unknown EAP type {0}")]
    UnknownEapType(u8),

    /// Type-specific EAP body that cannot be decoded.
    #[error("malformed EAP body: {0}")]
    MalformedEap(String),

    #[error("unknown RADIUS code {0}")]
    UnknownRadiusCode(u8),

    #[error("unsupported RADIUS attribute type {0}")]
    UnsupportedAttribute(u8),

    /// Attribute whose length or content violates its datatype.
    #[error("malformed RADIUS attribute {attr_type}: {reason}")]
    MalformedAttribute { attr_type: u8, reason: String },

    #[error("invalid Response-Authenticator on packet id {0}")]
    InvalidResponseAuthenticator(u8),

    /// Must be silently dropped by the receiver (RFC 2869 section 5.14).
    #[error("invalid Message-Authenticator on packet id {0}")]
    InvalidMessageAuthenticator(u8),

    /// Response whose packet id has no outstanding request.
    #[error("no pending request for RADIUS packet id {0}")]
    UnknownCorrelation(u8),

    #[error("packet too large: {size} bytes exceeds {max}")]
    PacketTooLarge { size: usize, max: usize },

    #[error("'{0}' is not a MAC address")]
    InvalidMacAddress(String),

    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn truncated(layer: &'static str, needed: usize, available: usize) -> Self {
        Error::TruncatedHeader {
            layer,
            needed,
            available,
        }
    }

    pub(crate) fn malformed_attribute<S: Into<String>>(attr_type: u8, reason: S) -> Self {
        Error::MalformedAttribute {
            attr_type,
            reason: reason.into(),
        }
    }
}
