use std::path::Path;

use tokio::sync::broadcast::error::RecvError;
use yiodock::prelude::*;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Builds the client config from the environment.
///
/// `YIO_CONFIG` names a JSON file with a full [`DockConfig`]; otherwise
/// `YIO_HOST` and `YIO_TOKEN` (default `"0"`) are used. `YIO_HOST` also
/// overrides the host from the file.
fn load_config(
    var: impl Fn(&str) -> Option<String>,
) -> Result<DockConfig, Box<dyn std::error::Error>> {
    let mut config = match var("YIO_CONFIG") {
        Some(path) => {
            let raw = std::fs::read_to_string(Path::new(&path))?;
            serde_json::from_str(&raw)?
        }
        None => {
            let token = var("YIO_TOKEN").unwrap_or_else(|| "0".into());
            DockConfig::new("", token)
        }
    };
    if let Some(host) = var("YIO_HOST") {
        config.host = host;
    }
    Ok(config)
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

fn describe(event: &DockEvent) -> Option<String> {
    match event {
        DockEvent::Status(status) => Some(format!("status: {status}")),
        DockEvent::StatusText(Some(text)) if !text.is_empty() => {
            Some(format!("dock: {text}"))
        }
        DockEvent::StatusText(_) | DockEvent::ValueChanged => None,
        DockEvent::IrReceived(code) => Some(format!("ir code: {code}")),
    }
}

/// Logs events until ctrl-c. Turns the IR receiver on whenever the dock
/// comes online so received codes show up.
async fn monitor(dock: &DockHandle) {
    let mut events = dock.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                return;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = describe(&event) {
                        tracing::info!("{line}");
                    }
                    if event == DockEvent::Status(DockStatus::Online) {
                        if let Err(e) = dock.set_ir_receiver(true).await {
                            tracing::warn!(
                                error = %e,
                                "could not enable IR receiver"
                            );
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "monitor fell behind");
                }
                Err(RecvError::Closed) => return,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = load_config(|name| std::env::var(name).ok())?;
    let dock = DockClient::spawn(config)?;

    monitor(&dock).await;
    dock.dispose().await;
    Ok(())
}
