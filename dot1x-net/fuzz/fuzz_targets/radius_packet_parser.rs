#![no_main]

use dot1x_net::radius::{PendingRequests, RadiusPacket};
use dot1x_net::radius_attributes::AttributeList;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = RadiusPacket::parse(data, b"SECRET", &PendingRequests::new());
    let _ = RadiusPacket::parse_with_request_authenticator(data, b"SECRET", Some(&[0u8; 16]));
    if let Ok(attributes) = AttributeList::parse(data) {
        let _ = attributes.pack();
    }
});
