use serde::Deserialize;
use std::net::Ipv4Addr;

/// The log level for the application, corresponding to syslog levels.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

// Helper functions for default values
fn default_interface() -> String { "eth0".to_string() }
fn default_debug() -> bool { false }
fn default_loglevel() -> LogLevel { LogLevel::Info }
fn default_radiuslistenport() -> u16 { 0 }
fn default_radiusserver() -> Ipv4Addr { Ipv4Addr::LOCALHOST }
fn default_radiusport() -> u16 { 1812 }
fn default_radiussecret() -> String { "SECRET".to_string() }
fn default_promiscuous() -> bool { true }
fn default_eapolidletime() -> u64 { 180 }
fn default_stopafterresult() -> bool { true }

/// Configuration of the 802.1X authenticator.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    /// Interface the supplicant is attached to.
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_loglevel")]
    pub loglevel: LogLevel,

    /// Local RADIUS client address; the interface's first IPv4 address when unset.
    #[serde(default)]
    pub radiuslisten: Option<Ipv4Addr>,
    #[serde(default = "default_radiuslistenport")]
    pub radiuslistenport: u16,
    #[serde(default = "default_radiusserver")]
    pub radiusserver: Ipv4Addr,
    #[serde(default = "default_radiusport")]
    pub radiusport: u16,
    #[serde(default = "default_radiussecret")]
    pub radiussecret: String,
    /// NAS-Identifier and Called-Station-Id; the interface MAC when unset.
    #[serde(default)]
    pub radiusnasid: Option<String>,

    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,
    /// Seconds to wait for the first EAPOL-Start before giving up.
    #[serde(default = "default_eapolidletime")]
    pub eapolidletime: u64,
    /// End the run once the first device has a result.
    #[serde(default = "default_stopafterresult")]
    pub stopafterresult: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            interface: default_interface(),
            debug: default_debug(),
            loglevel: default_loglevel(),
            radiuslisten: None,
            radiuslistenport: default_radiuslistenport(),
            radiusserver: default_radiusserver(),
            radiusport: default_radiusport(),
            radiussecret: default_radiussecret(),
            radiusnasid: None,
            promiscuous: default_promiscuous(),
            eapolidletime: default_eapolidletime(),
            stopafterresult: default_stopafterresult(),
        }
    }
}
