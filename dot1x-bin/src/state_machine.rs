//! The per-device 802.1X exchange.
//!
//! Each handler consumes one event and returns what must be sent as a
//! result. Nothing here touches a transport, so the caller decides when the
//! sends happen (after releasing its session lock).

use dot1x_core::{AuthSession, AuthState};
use dot1x_net::{EapCode, EapMessage, MacAddress, RadiusCode, RadiusRequest, RadiusResponse};
use tracing::{info, warn};

/// Identifier of the EAP-Request/Identity that opens every exchange.
pub const IDENTITY_REQUEST_ID: u8 = 1;

/// What to relay to the supplicant after a RADIUS answer, and whether the
/// exchange has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiusOutcome {
    pub reply: Option<EapMessage>,
    /// `Some(success)` once the session reached a terminal state.
    pub result: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    session: AuthSession,
    src_mac: MacAddress,
    port_id: u32,
}

impl AuthStateMachine {
    /// `port_id` identifies the authenticator port the supplicant is on.
    pub fn new(src_mac: MacAddress, port_id: u32, session_id: u64) -> Self {
        AuthStateMachine {
            session: AuthSession::new(src_mac.octets(), session_id),
            src_mac,
            port_id,
        }
    }

    pub fn state(&self) -> AuthState {
        self.session.state
    }

    pub fn session_id(&self) -> u64 {
        self.session.session_id
    }

    pub fn src_mac(&self) -> MacAddress {
        self.src_mac
    }

    pub fn identity(&self) -> Option<&str> {
        self.session.identity.as_deref()
    }

    pub fn received_eapol_start(&mut self) -> EapMessage {
        self.session.transition(AuthState::Supplicant, Some(AuthState::Start));
        EapMessage::Identity {
            code: EapCode::Request,
            id: IDENTITY_REQUEST_ID,
            identity: String::new(),
        }
    }

    /// Turns a supplicant's EAP response into the Access-Request that
    /// carries it.
    pub fn received_eap_response(&mut self, message: EapMessage) -> RadiusRequest {
        self.session.transition(AuthState::Radius, Some(AuthState::Supplicant));
        if let EapMessage::Identity { identity, .. } = &message {
            if self.session.identity.is_none() {
                info!("Identity of {} is {:?}", self.src_mac, identity);
                self.session.identity = Some(identity.clone());
            }
        }
        if let Some(id) = message.id() {
            self.session.last_eap_id = id;
        }
        RadiusRequest {
            eap_message: message,
            src_mac: self.src_mac,
            identity: self.session.identity.clone(),
            state: self.session.radius_state.clone(),
            port_id: self.port_id,
            session_id: self.session.session_id,
        }
    }

    pub fn received_radius_response(&mut self, response: RadiusResponse) -> RadiusOutcome {
        self.session.radius_state = response.state;
        match response.code {
            RadiusCode::AccessChallenge => {
                self.session.transition(AuthState::Supplicant, Some(AuthState::Radius));
                if response.eap_message.is_none() {
                    warn!("Access-Challenge for {} carries no EAP-Message", self.src_mac);
                }
                RadiusOutcome {
                    reply: response.eap_message,
                    result: None,
                }
            }
            RadiusCode::AccessAccept => {
                self.session.transition(AuthState::Success, Some(AuthState::Radius));
                let reply = response.eap_message.unwrap_or(EapMessage::Success {
                    id: self.session.last_eap_id,
                });
                RadiusOutcome {
                    reply: Some(reply),
                    result: Some(true),
                }
            }
            RadiusCode::AccessReject => self.fail(),
            RadiusCode::AccessRequest => {
                // Filtered by the RADIUS module before it gets here.
                warn!("Ignoring Access-Request addressed to {}", self.src_mac);
                RadiusOutcome {
                    reply: None,
                    result: None,
                }
            }
        }
    }

    /// The Access-Request for the last response could not be built, so no
    /// answer will ever come.
    pub fn relay_failed(&mut self) -> RadiusOutcome {
        warn!("Unable to relay {}'s response to the RADIUS server", self.src_mac);
        self.fail()
    }

    fn fail(&mut self) -> RadiusOutcome {
        self.session.transition(AuthState::Fail, Some(AuthState::Radius));
        // RFC 3748 4.2: Success and Failure reuse the Identifier of the
        // Response they answer.
        RadiusOutcome {
            reply: Some(EapMessage::Failure {
                id: self.session.last_eap_id,
            }),
            result: Some(false),
        }
    }
}
