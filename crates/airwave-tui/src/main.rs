mod action;
mod app;
mod app_state;
mod audio;
mod component;
mod components;
mod core;
mod focus;
mod mpv;
mod notify;
mod route;
mod session;
mod sleep_timer;
mod stores;
mod theme;
mod widgets;

use std::time::Duration;

use airwave_proto::config::{BackendKind, Config};
use tokio::sync::{broadcast, mpsc};

use crate::notify::{Notifier, Severity};

/// Change notices from the stores and the player core.
///
/// Carries no data; receivers fetch the new snapshot from the store that
/// sent it.
#[derive(Debug, Clone)]
pub enum BroadcastMessage {
    /// The playback session changed; fetch from `SessionManager`.
    SessionUpdated,
    /// The station catalog was reloaded.
    CatalogUpdated,
    /// The signed-in user's favorite set changed.
    FavoritesUpdated,
    /// Sign-in state or profile changed.
    IdentityUpdated,
    /// The comment thread of this station was refetched.
    CommentsUpdated(String),
    /// The admin user list was reloaded.
    UsersUpdated,
    /// A transient message for the user.
    Notice(Severity, String),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = airwave_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("airwave.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Connection-level DEBUG from the HTTP client is noise.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("airwave log: {}", log_path.display());

    tracing::info!("airwave starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {}", e);
            Config::default()
        }
    };

    // ── Backend ──────────────────────────────────────────────────────────────
    let backend = airwave_proto::backend::connect(&config).await?;
    let backend_label = match config.backend.kind {
        BackendKind::Local => "local".to_string(),
        BackendKind::Rest => config
            .backend
            .url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string(),
    };

    // ── Broadcast channel (stores/core → TUI) ────────────────────────────────
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<BroadcastMessage>(1024);
    let notifier = Notifier::new(broadcast_tx);

    // ── Stores ───────────────────────────────────────────────────────────────
    let identity = stores::identity::IdentityStore::new(backend.clone(), notifier.clone());
    let catalog = stores::catalog::CatalogStore::new(backend.clone(), notifier.clone());
    let favorites = stores::favorites::FavoritesStore::new(backend.clone(), notifier.clone());
    let comments = stores::comments::CommentsStore::new(
        backend.clone(),
        notifier.clone(),
        identity.subscribe(),
    );
    let admin = stores::admin::AdminStore::new(backend.clone(), notifier.clone());

    identity.spawn_sync();
    catalog.spawn_sync();
    favorites.spawn_sync(identity.subscribe());
    comments.spawn_sync();
    admin.spawn_sync();

    // ── Player core ──────────────────────────────────────────────────────────
    let session = session::SessionManager::new(
        config.paths.session_file.clone(),
        config.player.default_volume,
    );
    let initial_session = session.get().await;

    let (event_tx, event_rx) = mpsc::channel::<core::PlayerEvent>(1024);
    let (media_tx, mut media_rx) = mpsc::channel::<audio::MediaEvent>(256);
    let media_forward = event_tx.clone();
    tokio::spawn(async move {
        while let Some(ev) = media_rx.recv().await {
            if media_forward.send(core::PlayerEvent::Media(ev)).await.is_err() {
                break;
            }
        }
    });

    let sink = Box::new(mpv::MpvSink::new(media_tx, initial_session.volume));
    let player_core = core::PlayerCore::new(
        session.clone(),
        sink,
        notifier.clone(),
        event_tx.clone(),
        Duration::from_secs(config.player.connect_timeout_secs.max(1)),
    );
    tokio::spawn(player_core.run(event_rx));
    let player = core::PlayerHandle::new(event_tx);

    // ── Initial loads ────────────────────────────────────────────────────────
    {
        let catalog = catalog.clone();
        tokio::spawn(async move {
            if let Err(e) = catalog.load().await {
                tracing::error!("initial catalog load failed: {}", e);
            }
        });
    }
    {
        let identity = identity.clone();
        tokio::spawn(async move {
            if let Err(e) = identity.restore().await {
                tracing::warn!("session restore failed: {}", e);
            }
        });
    }

    notifier.send(BroadcastMessage::SessionUpdated);

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let stores = app::Stores {
        session,
        catalog,
        favorites,
        identity,
        comments,
        admin,
    };
    let app = app::App::new(
        stores,
        player,
        initial_session,
        config.sleep_presets(),
        backend_label,
    );
    app.run(broadcast_rx).await?;

    Ok(())
}
