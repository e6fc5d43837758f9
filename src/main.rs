//! Gatehouse: local HTTPS web-service host
//!
//! Serves a single web endpoint whose requests pass through an inspector
//! pipeline (authentication, then CORS allow-listing) before reaching the
//! operations behind it.
//!
//! Usage:
//!   gatehouse                                  # Port and certificate from appsettings.json
//!   gatehouse --environment Development        # Use appsettings.Development.json
//!   gatehouse --port 9443 --no-browser         # Override port, stay headless
//!   gatehouse --no-tls                         # Plain HTTP (for debugging)

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gatehouse_protocol::{HostConfig, Routes};
use gatehouse_server::HostServer;
use gatehouse_transport::{CertificateProvider, TransportConfig, TransportServer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gatehouse", about = "Gatehouse: local HTTPS web-service host")]
struct Cli {
    /// Directory holding appsettings*.json
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Hosting environment ("Development" selects appsettings.Development.json)
    #[arg(long, env = "GATEHOUSE_ENVIRONMENT")]
    environment: Option<String>,

    /// Port to listen on, overriding the configured one (0 for OS-assigned)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    hostname: String,

    /// Certificate store directory (defaults to ~/.gatehouse/certs)
    #[arg(long)]
    cert_store: Option<PathBuf>,

    /// Disable TLS (for development/debugging)
    #[arg(long)]
    no_tls: bool,

    /// Do not open the browser on startup
    #[arg(long)]
    no_browser: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if let Some(ref log_path) = cli.log_file {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_context(|| format!("opening log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();

        eprintln!("Logging to {}", log_path.display());
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// Route panics from any thread through tracing before the default report.
fn install_panic_logger() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!("Unhandled panic: {info}");
        default_hook(info);
    }));
}

/// Open `url` in the platform's default browser.
fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut command = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut command = std::process::Command::new("xdg-open");

    command.arg(url).spawn().map(|_| ())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn load_config(dir: &Path, environment: Option<&str>) -> anyhow::Result<HostConfig> {
    let file = HostConfig::settings_file_name(environment);
    HostConfig::load_for_environment(dir, environment)
        .with_context(|| format!("loading {}", dir.join(file).display()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.config_dir, cli.environment.as_deref())?;
    let port = cli.port.unwrap_or(config.kestrel.port);

    let tls = if cli.no_tls {
        None
    } else {
        let store = cli
            .cert_store
            .clone()
            .unwrap_or_else(CertificateProvider::default_store_dir);
        let provider = CertificateProvider::new(config.kestrel.certificate_subject(), store);
        // Without a certificate the host cannot serve HTTPS at all.
        let certificate = provider
            .get()
            .with_context(|| format!("Certificate not found: {}", provider.subject()))?;
        info!(
            subject = %certificate.subject,
            fingerprint = %certificate.fingerprint,
            "Using certificate"
        );
        Some(certificate.tls_config())
    };

    let host = Arc::new(HostServer::with_defaults());
    host.initialize()
        .await
        .map_err(|e| anyhow::anyhow!("initializing host: {e}"))?;

    let transport_config = TransportConfig {
        port,
        hostname: cli.hostname.clone(),
        tls,
        ..TransportConfig::default()
    };
    let mut transport = TransportServer::start_with_handler(transport_config, Arc::clone(&host))
        .await
        .context("starting transport")?;

    let scheme = if transport.is_tls() { "https" } else { "http" };
    let url = format!(
        "{scheme}://localhost:{}{}",
        transport.port(),
        Routes::operation(Routes::TEST)
    );

    println!();
    println!("  Gatehouse running on {}", transport.local_addr());
    println!("  Endpoint:   {scheme}://localhost:{}{}", transport.port(), Routes::ENDPOINT);
    println!("  Inspectors: {}", host.pipeline().names().join(" → "));
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    if !cli.no_browser && std::io::stdin().is_terminal() {
        if let Err(e) = open_browser(&url) {
            warn!("Could not open browser at {url}: {e}");
        }
    } else {
        info!("Running headless");
    }

    shutdown_signal().await;

    info!("Shutting down...");
    transport.stop().await;
    host.shutdown().await;
    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {e:#}");
        std::process::exit(1);
    }
    install_panic_logger();

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}
