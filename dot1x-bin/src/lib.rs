pub mod config;
pub mod state_machine;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dot1x_core::{AuthState, TestResult};
use dot1x_net::{port_id_from_mac, EapMessage, EapModule, MacAddress, RadiusModule, RadiusResponse, Transport};
use tracing::{debug, error, info, warn};

pub use state_machine::{AuthStateMachine, RadiusOutcome};

type ResultCallback = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Relays EAP between supplicants and the RADIUS server, one
/// [`AuthStateMachine`] per supplicant MAC.
pub struct Authenticator<E, R> {
    eap_module: Arc<EapModule<E>>,
    radius_module: Arc<RadiusModule<R>>,
    port_id: u32,
    state_machines: Mutex<HashMap<MacAddress, AuthStateMachine>>,
    results: Mutex<Vec<(MacAddress, bool)>>,
    last_session_id: AtomicU64,
    on_result: ResultCallback,
    stop_after_result: bool,
}

impl<E, R> Authenticator<E, R>
where
    E: Transport + 'static,
    R: Transport + 'static,
{
    pub fn new(eap_module: EapModule<E>, radius_module: RadiusModule<R>) -> Self {
        let port_id = port_id_from_mac(eap_module.auth_mac());
        Authenticator {
            eap_module: Arc::new(eap_module),
            radius_module: Arc::new(radius_module),
            port_id,
            state_machines: Mutex::new(HashMap::new()),
            results: Mutex::new(Vec::new()),
            last_session_id: AtomicU64::new(0),
            on_result: Box::new(|_, _| {}),
            stop_after_result: false,
        }
    }

    /// Called with the supplicant MAC and the outcome, once per finished
    /// session.
    pub fn with_result_callback<F>(mut self, on_result: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.on_result = Box::new(on_result);
        self
    }

    pub fn stop_after_result(mut self, stop: bool) -> Self {
        self.stop_after_result = stop;
        self
    }

    /// Whether any supplicant has sent an EAPOL-Start yet.
    pub fn has_started(&self) -> bool {
        self.last_session_id.load(Ordering::SeqCst) > 0
    }

    /// Finished sessions in completion order.
    pub fn results(&self) -> Vec<(MacAddress, bool)> {
        self.results.lock().unwrap().clone()
    }

    pub fn received_eap_message(&self, src_mac: MacAddress, message: EapMessage) {
        match message {
            EapMessage::EapolStart => {
                let session_id = self.last_session_id.fetch_add(1, Ordering::SeqCst) + 1;
                let mut machine = AuthStateMachine::new(src_mac, self.port_id, session_id);
                let request = machine.received_eapol_start();
                let superseded = self.state_machines.lock().unwrap().insert(src_mac, machine);
                match superseded {
                    Some(old) => info!(
                        "EAPOL-Start from {} supersedes session {} ({})",
                        src_mac,
                        old.session_id(),
                        old.state()
                    ),
                    None => info!("EAPOL-Start from {}, starting session {}", src_mac, session_id),
                }
                self.eap_module.send_eap_message(src_mac, &request);
            }
            EapMessage::EapolLogoff => {
                if self.state_machines.lock().unwrap().remove(&src_mac).is_some() {
                    info!("EAPOL-Logoff from {}, session removed", src_mac);
                } else {
                    debug!("EAPOL-Logoff from {} without a session", src_mac);
                }
            }
            message if message.is_response() => {
                let request = {
                    let mut machines = self.state_machines.lock().unwrap();
                    match machines.get_mut(&src_mac) {
                        None => {
                            warn!("Dropping {} from {}: no session", message, src_mac);
                            return;
                        }
                        Some(machine) if machine.state() != AuthState::Supplicant => {
                            warn!(
                                "Dropping {} from {}: session is in state {}",
                                message,
                                src_mac,
                                machine.state()
                            );
                            return;
                        }
                        Some(machine) => machine.received_eap_response(message),
                    }
                };
                let session_id = request.session_id;
                if let Err(e) = self.radius_module.send_radius_request(request) {
                    error!("Unable to build Access-Request for {}: {}", src_mac, e);
                    self.relay_failed(src_mac, session_id);
                }
            }
            message => debug!("Ignoring {} from {}", message, src_mac),
        }
    }

    pub fn received_radius_response(&self, response: RadiusResponse) {
        let src_mac = response.src_mac;
        let outcome = {
            let mut machines = self.state_machines.lock().unwrap();
            let Some(machine) = machines.get_mut(&src_mac) else {
                warn!("Dropping {:?} for {}: no session", response.code, src_mac);
                return;
            };
            if machine.session_id() != response.session_id {
                warn!(
                    "Dropping {:?} for {}: session {} was superseded by {}",
                    response.code,
                    src_mac,
                    response.session_id,
                    machine.session_id()
                );
                return;
            }
            if machine.state() != AuthState::Radius {
                warn!(
                    "Dropping {:?} for {}: session is in state {}",
                    response.code,
                    src_mac,
                    machine.state()
                );
                return;
            }
            let outcome = machine.received_radius_response(response);
            if outcome.result.is_some() {
                machines.remove(&src_mac);
            }
            outcome
        };
        self.deliver(src_mac, outcome);
    }

    /// Ends a session whose response never reached the server, unless a
    /// restart or logoff replaced it in the meantime.
    fn relay_failed(&self, src_mac: MacAddress, session_id: u64) {
        let outcome = {
            let mut machines = self.state_machines.lock().unwrap();
            match machines.get_mut(&src_mac) {
                Some(machine) if machine.session_id() == session_id && machine.state() == AuthState::Radius => {
                    let outcome = machine.relay_failed();
                    machines.remove(&src_mac);
                    outcome
                }
                _ => return,
            }
        };
        self.deliver(src_mac, outcome);
    }

    fn deliver(&self, src_mac: MacAddress, outcome: RadiusOutcome) {
        if let Some(reply) = &outcome.reply {
            self.eap_module.send_eap_message(src_mac, reply);
        }
        if let Some(success) = outcome.result {
            self.process_result(src_mac, success);
        }
    }

    fn process_result(&self, src_mac: MacAddress, success: bool) {
        if success {
            info!("Authentication for {} succeeded", src_mac);
        } else {
            warn!("Authentication for {} failed", src_mac);
        }
        self.results.lock().unwrap().push((src_mac, success));
        (self.on_result)(&src_mac.to_string(), success);
        if self.stop_after_result {
            info!("Result received, shutting down");
            self.shut_down();
        }
    }

    /// Runs both send loops and both receive loops until [`Self::shut_down`].
    pub async fn run(self: &Arc<Self>) {
        let eap_receiver = {
            let this = self.clone();
            let module = self.eap_module.clone();
            tokio::spawn(async move {
                module
                    .receive_eap_messages(move |src_mac, message| this.received_eap_message(src_mac, message))
                    .await
            })
        };
        let radius_receiver = {
            let this = self.clone();
            let module = self.radius_module.clone();
            tokio::spawn(async move {
                module
                    .receive_radius_messages(move |response| this.received_radius_response(response))
                    .await
            })
        };
        let eap_sender = {
            let module = self.eap_module.clone();
            tokio::spawn(async move { module.send_eap_messages().await })
        };
        let radius_sender = {
            let module = self.radius_module.clone();
            tokio::spawn(async move { module.send_radius_messages().await })
        };

        for (name, task) in [
            ("EAP receive", eap_receiver),
            ("RADIUS receive", radius_receiver),
            ("EAP send", eap_sender),
            ("RADIUS send", radius_sender),
        ] {
            if let Err(e) = task.await {
                error!("{} loop failed: {}", name, e);
            }
        }
        info!("Authenticator stopped");
    }

    pub fn shut_down(&self) {
        self.eap_module.shut_down();
        self.radius_module.shut_down();
    }
}

/// One line per finished session, plus the overall test result.
pub fn summarize(results: &[(MacAddress, bool)]) -> (String, TestResult) {
    if results.is_empty() {
        return (
            "Authentication failed. No EAPOL messages received.".to_string(),
            TestResult::Skip,
        );
    }
    let summary = results
        .iter()
        .map(|(mac, success)| {
            format!(
                "Authentication for {} {}.",
                mac,
                if *success { "succeeded" } else { "failed" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let result = if results.iter().all(|(_, success)| *success) {
        TestResult::Pass
    } else {
        TestResult::Fail
    };
    (summary, result)
}
