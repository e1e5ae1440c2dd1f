use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dot1x_bin::config::{load_config_from_path, tracing_level, Args};
use dot1x_bin::{summarize, Authenticator};
use dot1x_net::{lookup_interface, EapModule, EapSocket, RadiusModule, RadiusSocket};
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config_from_path(&args.config_file)?;

    tracing_subscriber::fmt()
        .with_max_level(tracing_level(&config))
        .init();

    info!("Starting dot1x-authenticator on {}", config.interface);

    let interface = lookup_interface(&config.interface)
        .with_context(|| format!("Failed to look up interface {}", config.interface))?;
    let listen_ip = config
        .radiuslisten
        .or(interface.ipv4)
        .ok_or_else(|| anyhow!("Interface {} has no IPv4 address and radiuslisten is unset", interface.name))?;
    let nas_id = config
        .radiusnasid
        .clone()
        .unwrap_or_else(|| interface.mac.to_string());

    let eap_socket = EapSocket::open(&interface, config.promiscuous)
        .with_context(|| format!("Failed to open EAPOL socket on {}", interface.name))?;
    let radius_listen = SocketAddr::from((listen_ip, config.radiuslistenport));
    let radius_server = SocketAddr::from((config.radiusserver, config.radiusport));
    let radius_socket = RadiusSocket::bind(radius_listen, radius_server)
        .await
        .with_context(|| format!("Failed to bind RADIUS socket to {}", radius_listen))?;
    info!(
        "EAPOL on {} ({}), RADIUS {} -> {}, NAS id {}",
        interface.name,
        interface.mac,
        radius_socket.local_addr()?,
        radius_server,
        nas_id
    );

    let eap_module = EapModule::new(eap_socket, interface.mac);
    let radius_module = RadiusModule::new(radius_socket, &config.radiussecret, &nas_id)
        .with_context(|| format!("Unusable NAS id {:?}", nas_id))?;
    let authenticator = Arc::new(
        Authenticator::new(eap_module, radius_module).stop_after_result(config.stopafterresult),
    );

    let idle_watchdog = {
        let authenticator = authenticator.clone();
        let idle_time = Duration::from_secs(config.eapolidletime);
        tokio::spawn(async move {
            tokio::time::sleep(idle_time).await;
            if !authenticator.has_started() {
                warn!("No EAPOL-Start within {:?}, giving up", idle_time);
                authenticator.shut_down();
            }
        })
    };

    let signals = {
        let authenticator = authenticator.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }
            authenticator.shut_down();
        })
    };

    authenticator.run().await;
    idle_watchdog.abort();
    signals.abort();

    let (summary, result) = summarize(&authenticator.results());
    info!("{}", summary);
    info!("Test result: {}", result);
    if let Some(path) = &args.result_file {
        fs::write(path, format!("{}\n{}\n", result, summary))
            .with_context(|| format!("Failed to write result file {}", path.display()))?;
    }

    Ok(())
}
