use std::net::{IpAddr, Ipv4Addr};

use pnet::datalink::{self, NetworkInterface};

use crate::error::{Error, Result};
use crate::ethernet::MacAddress;

/// What the relay needs to know about the port it authenticates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub index: u32,
    pub mac: MacAddress,
    pub ipv4: Option<Ipv4Addr>,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(interface: &NetworkInterface) -> Self {
        let ipv4 = interface.ips.iter().find_map(|ip| match ip.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        });
        InterfaceInfo {
            name: interface.name.clone(),
            index: interface.index,
            mac: interface.mac.map(MacAddress::from).unwrap_or(MacAddress::ZERO),
            ipv4,
        }
    }
}

pub fn lookup_interface(name: &str) -> Result<InterfaceInfo> {
    datalink::interfaces()
        .iter()
        .find(|iface| iface.name == name)
        .map(InterfaceInfo::from)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}
