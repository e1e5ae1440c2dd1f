//! Represents the state of one device's 802.1X authentication.

use std::fmt;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Start,
    /// Waiting for the supplicant's next EAP response.
    Supplicant,
    /// Waiting for the RADIUS server's answer.
    Radius,
    Success,
    Fail,
}

impl AuthState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuthState::Success | AuthState::Fail)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        AuthState::Start
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::Start => "start",
            AuthState::Supplicant => "talk to supplicant",
            AuthState::Radius => "talk to RADIUS server",
            AuthState::Success => "succeeded",
            AuthState::Fail => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    /// The supplicant's MAC address.
    pub mac_addr: [u8; 6],
    /// Generation number; a new EAPOL-Start for the same MAC gets a new one.
    pub session_id: u64,
    pub state: AuthState,
    /// The supplicant's identity, once known.
    pub identity: Option<String>,
    /// The RADIUS `State` attribute to echo in the next Access-Request.
    pub radius_state: Option<Vec<u8>>,
    /// Identifier of the last EAP response relayed to RADIUS.
    pub last_eap_id: u8,
}

impl AuthSession {
    pub fn new(mac_addr: [u8; 6], session_id: u64) -> Self {
        AuthSession {
            mac_addr,
            session_id,
            state: AuthState::Start,
            identity: None,
            radius_state: None,
            last_eap_id: 0,
        }
    }

    /// Moves to `target`.
    ///
    /// # Panics
    ///
    /// If `expected` is given and the session is in any other state. Callers
    /// filter out-of-order network events beforehand, so a mismatch here is
    /// a logic error.
    pub fn transition(&mut self, target: AuthState, expected: Option<AuthState>) {
        if let Some(expected) = expected {
            assert_eq!(
                self.state, expected,
                "state was {} expected {}",
                self.state, expected
            );
        }
        debug!("Transition for session {}: {} -> {}", self.session_id, self.state, target);
        self.state = target;
    }
}
