use super::display::{format_event, format_summary};
use crate::messages::ChatLine;
use crate::network::{Session, SessionConfig, SessionEvent, WebSocketConnector};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long to let the receive loop wind down after disconnecting
const RECEIVE_LOOP_GRACE: Duration = Duration::from_secs(2);

/// Settings for `rtsession connect`, as given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub url: Option<String>,
    pub token: Option<String>,
    pub buffer_size: Option<usize>,
    pub config: Option<PathBuf>,
    pub name: String,
    pub messages: Vec<String>,
    pub once: bool,
}

/// Load the configuration file: the explicit path if given (which must
/// exist), otherwise the default location if present, otherwise defaults.
pub fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    if let Some(path) = path {
        return SessionConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    match SessionConfig::default_config_file() {
        Ok(default_path) if default_path.exists() => {
            debug!(path = %default_path.display(), "Loading default configuration");
            SessionConfig::load_from_file(&default_path).with_context(|| {
                format!("Failed to load configuration from {}", default_path.display())
            })
        }
        _ => Ok(SessionConfig::default()),
    }
}

/// Apply command-line overrides on top of the file configuration
pub fn resolve_config(options: &ConnectOptions) -> Result<SessionConfig> {
    let mut config = load_config(options.config.as_deref())?;
    if let Some(url) = &options.url {
        config.endpoint = url.clone();
    }
    if let Some(token) = &options.token {
        config.authorization = Some(format!("Bearer {}", token));
    }
    if let Some(buffer_size) = options.buffer_size {
        config.buffer_capacity = buffer_size;
    }
    config.validate().context("Invalid session configuration")?;
    Ok(config)
}

pub async fn run_connect(options: ConnectOptions) -> Result<()> {
    let config = resolve_config(&options)?;
    let endpoint = config.endpoint.clone();
    let (session, mut events) =
        Session::<ChatLine>::new(config, Arc::new(WebSocketConnector::new()))
            .context("Failed to create session")?;

    session
        .connect()
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;
    session.set_in_room(true);

    for body in &options.messages {
        let line = ChatLine::new(options.name.clone(), body.clone());
        let outcome = session
            .send(&line)
            .await
            .context("Failed to send chat line")?;
        if !outcome.is_sent() {
            warn!(?outcome, "Chat line was not sent");
        }
    }

    if !options.once {
        println!("Connected to {}. Press Ctrl-C to disconnect.", endpoint);
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let closed = matches!(
                        event,
                        SessionEvent::PeerClosed(_) | SessionEvent::ReceiveFailed { .. }
                    );
                    println!("{}", format_event(&event));
                    if closed {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted; disconnecting");
                    break;
                }
            }
        }
    }

    session.leave_room(|| debug!("Left room"));
    session.disconnect().await;
    if tokio::time::timeout(RECEIVE_LOOP_GRACE, session.wait_for_receive_loop())
        .await
        .is_err()
    {
        warn!("Receive loop did not stop within {:?}", RECEIVE_LOOP_GRACE);
    }

    while let Ok(event) = events.try_recv() {
        println!("{}", format_event(&event));
    }

    println!("{}", format_summary(&session.stats(), &session.status()));
    Ok(())
}

pub fn render_config(config: &SessionConfig, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(config).context("Failed to serialize configuration")
    } else {
        toml::to_string_pretty(config).context("Failed to serialize configuration")
    }
}

pub fn show_config(path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", render_config(&config, json)?);
    Ok(())
}

pub fn init_config(endpoint: Option<String>, force: bool) -> Result<PathBuf> {
    let path = SessionConfig::default_config_file().context("Failed to determine config path")?;
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    let config = SessionConfig {
        endpoint: endpoint.unwrap_or_default(),
        ..SessionConfig::default()
    };
    config
        .save_to_file(&path)
        .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    Ok(path)
}
