use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use liveframe_core::Error;
use liveframe_core::auth::{LogOnlyPrompt, SessionManager};
use liveframe_core::config::LiveframeConfig;
use liveframe_core::http::DefaultHttpClient;
use liveframe_core::overlay::OverlayActor;
use liveframe_core::platforms::YouTubeClient;
use liveframe_core::repositories::FileTokenStore;
use liveframe_core::tasks::{status_channel, StatusPoller, VisibilitySynchronizer};
use liveframe_core::traits::AuthenticationHandler;

mod prompt;
mod surface;

use prompt::BrowserPrompt;
use surface::LogSurface;

#[derive(Parser, Debug, Clone)]
#[command(name = "liveframe")]
#[command(author, version, about = "Shows a desktop overlay while you are live on YouTube")]
struct Args {
    /// OAuth client secret JSON (defaults to ~/.liveframe/secret.json)
    #[arg(long)]
    secret_file: Option<PathBuf>,

    /// Token cache (defaults to ~/.liveframe/token.json)
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// Loopback redirect URL; overrides the secret file's redirect_uris
    #[arg(long)]
    redirect_url: Option<String>,

    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_secs: u64,

    /// Per-request timeout; must be shorter than the poll interval
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    call_timeout_secs: u64,

    #[arg(long, default_value_t = 1)]
    error_cooldown_secs: u64,

    /// How long to wait for the browser consent before giving up
    #[arg(long, default_value_t = 300)]
    consent_timeout_secs: u64,

    /// Only log the consent URL instead of opening a browser
    #[arg(long, default_value = "false")]
    no_browser: bool,
}

impl Args {
    fn into_config(self) -> LiveframeConfig {
        let defaults = LiveframeConfig::default();
        LiveframeConfig {
            secret_path: self.secret_file.unwrap_or(defaults.secret_path),
            token_path: self.token_file.unwrap_or(defaults.token_path),
            redirect_url: self.redirect_url,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            error_cooldown: Duration::from_secs(self.error_cooldown_secs),
            consent_timeout: Duration::from_secs(self.consent_timeout_secs),
            open_browser: !self.no_browser,
            ..defaults
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("liveframe=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    let config = args.into_config();
    info!(
        "liveframe starting. secret={}, token={}, interval={:?}",
        config.secret_path.display(),
        config.token_path.display(),
        config.poll_interval
    );

    match run(config).await {
        Ok(()) => {}
        Err(Error::Cancelled(reason)) => info!("Stopped before authorization finished: {}", reason),
        Err(e) => {
            error!("liveframe failed: {}", e);
            return Err(e.into());
        }
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run(config: LiveframeConfig) -> Result<(), Error> {
    // Configuration problems stop us before anything is spawned.
    let client_config = config.load_client_config()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    install_shutdown_signals(shutdown_tx)?;

    let prompt: Arc<dyn AuthenticationHandler> = if config.open_browser {
        Arc::new(BrowserPrompt)
    } else {
        Arc::new(LogOnlyPrompt)
    };
    let manager = SessionManager::new(
        client_config,
        Arc::new(FileTokenStore::new(&config.token_path)),
        Arc::new(DefaultHttpClient::new()),
        prompt,
    )
    .with_timeouts(config.consent_timeout, config.callback_grace);

    let client = manager.authorize(shutdown_rx.clone()).await?;
    info!("Authorized; starting status pipeline");

    let actor = OverlayActor::spawn(LogSurface::default())?;
    let (tx, rx) = status_channel();
    let source = Arc::new(YouTubeClient::new(client));

    let poller = StatusPoller::new(source, config.poller_settings()).spawn(tx, shutdown_rx.clone());
    let sync = VisibilitySynchronizer::new(actor.handle()).spawn(rx, shutdown_rx);

    let (poller_res, sync_res) = tokio::join!(poller, sync);
    if let Err(e) = poller_res {
        warn!("Status poller task ended abnormally: {:?}", e);
    }
    match sync_res {
        Ok(state) => info!("Synchronizer finished in state {:?}", state),
        Err(e) => warn!("Synchronizer task ended abnormally: {:?}", e),
    }

    actor.shutdown()
}

/// Flips `shutdown` on Ctrl-C, or SIGTERM on unix. Handlers are registered
/// before this returns.
fn install_shutdown_signals(shutdown_tx: watch::Sender<bool>) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        #[cfg(unix)]
        let received = tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "Ctrl-C"),
            _ = terminate.recv() => Ok("SIGTERM"),
        };
        #[cfg(not(unix))]
        let received = tokio::signal::ctrl_c().await.map(|_| "Ctrl-C");

        match received {
            Ok(name) => {
                info!("{} detected; shutting down...", name);
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {:?}", e),
        }
    }))
}
