pub mod eap;
pub mod eap_module;
pub mod eap_socket;
pub mod eapol;
pub mod error;
pub mod ethernet;
pub mod interface;
pub mod radius;
pub mod radius_attributes;
pub mod radius_auth;
pub mod radius_module;
pub mod radius_socket;
pub mod transport;

pub use eap::{EapCode, EapFrame, EapMessage, EapType};
pub use eap_module::EapModule;
pub use eap_socket::EapSocket;
pub use error::{Error, Result};
pub use ethernet::MacAddress;
pub use interface::{lookup_interface, InterfaceInfo};
pub use radius::{RadiusCode, RadiusPacket};
pub use radius_module::{port_id_from_mac, RadiusModule, RadiusRequest, RadiusResponse};
pub use radius_socket::RadiusSocket;
pub use transport::{ChannelHandle, ChannelTransport, Transport};
