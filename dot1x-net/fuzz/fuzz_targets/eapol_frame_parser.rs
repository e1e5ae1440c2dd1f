#![no_main]

use dot1x_net::eap::{EapFrame, EapMessage};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only panics matter; parse errors are expected.
    let _ = EapFrame::parse(data);
    let _ = EapMessage::parse_eapol(data);
    if let Ok(message) = EapMessage::parse_eap(data) {
        let _ = message.pack_eap();
    }
});
