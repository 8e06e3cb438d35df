//! Playback session state, shared read-only with the views and written only
//! by the player core.

use std::path::PathBuf;
use std::sync::Arc;

use airwave_proto::model::RadioStation;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Connecting,
    Playing,
    Paused,
    Error,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    /// Bumped on every change.
    pub rev: u64,
    pub station: Option<RadioStation>,
    pub intend_playing: bool,
    pub buffering: bool,
    pub status: PlaybackStatus,
    pub volume: f32,
    pub time_pos: Option<f64>,
    pub duration: Option<f64>,
    /// Seconds left on the sleep timer.
    pub sleep_remaining: Option<u64>,
    /// Station id restored from the last run, not yet resolved to a station.
    pub last_station_id: Option<String>,
}

impl SessionState {
    pub fn is_current(&self, station_id: &str) -> bool {
        self.station.as_ref().is_some_and(|s| s.id == station_id)
    }

    /// Playing, or about to be.
    pub fn is_active(&self) -> bool {
        self.intend_playing && self.status != PlaybackStatus::Error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentSession {
    pub last_station_id: Option<String>,
    pub volume: f32,
}

#[derive(Clone)]
pub struct SessionManager {
    state: Arc<RwLock<SessionState>>,
    session_file: PathBuf,
}

impl SessionManager {
    pub fn new(session_file: PathBuf, default_volume: f32) -> Self {
        let persistent = Self::load_persistent(&session_file).unwrap_or(PersistentSession {
            last_station_id: None,
            volume: default_volume,
        });
        let state = SessionState {
            rev: 1,
            station: None,
            intend_playing: false,
            buffering: false,
            status: PlaybackStatus::Idle,
            volume: sanitize_volume(persistent.volume).unwrap_or(default_volume),
            time_pos: None,
            duration: None,
            sleep_remaining: None,
            last_station_id: persistent.last_station_id,
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            session_file,
        }
    }

    pub async fn get(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Apply `f` and bump the revision.
    pub async fn update<F: FnOnce(&mut SessionState)>(&self, f: F) -> SessionState {
        let mut state = self.state.write().await;
        f(&mut state);
        state.rev += 1;
        state.clone()
    }

    /// New station: the previous station's buffering, status and timeline
    /// do not carry over.
    pub async fn set_station(&self, station: RadioStation) -> anyhow::Result<()> {
        self.update(|s| {
            s.last_station_id = Some(station.id.clone());
            s.station = Some(station);
            s.intend_playing = true;
            s.buffering = true;
            s.status = PlaybackStatus::Connecting;
            s.time_pos = None;
            s.duration = None;
        })
        .await;
        self.save().await
    }

    pub async fn set_stopped(&self) -> anyhow::Result<()> {
        self.update(|s| {
            s.station = None;
            s.intend_playing = false;
            s.buffering = false;
            s.status = PlaybackStatus::Idle;
            s.time_pos = None;
            s.duration = None;
        })
        .await;
        self.save().await
    }

    pub async fn set_status(&self, status: PlaybackStatus, buffering: bool) {
        self.update(|s| {
            s.status = status;
            s.buffering = buffering;
        })
        .await;
    }

    /// Returns the stored value, always within [0, 1].
    pub async fn set_volume(&self, volume: f32) -> anyhow::Result<f32> {
        let state = self.update(|s| s.volume = volume.clamp(0.0, 1.0)).await;
        self.save().await?;
        Ok(state.volume)
    }

    pub async fn set_timeline(&self, time_pos: Option<f64>, duration: Option<f64>) {
        self.update(|s| {
            s.time_pos = time_pos;
            s.duration = duration;
        })
        .await;
    }

    pub async fn set_sleep_remaining(&self, remaining: Option<u64>) {
        self.update(|s| s.sleep_remaining = remaining).await;
    }

    async fn save(&self) -> anyhow::Result<()> {
        let persistent = {
            let state = self.state.read().await;
            PersistentSession {
                last_station_id: state
                    .station
                    .as_ref()
                    .map(|s| s.id.clone())
                    .or_else(|| state.last_station_id.clone()),
                volume: state.volume,
            }
        };
        if let Some(parent) = self.session_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&persistent)?;
        tokio::fs::write(&self.session_file, json).await?;
        Ok(())
    }

    fn load_persistent(path: &PathBuf) -> Option<PersistentSession> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }
}

/// NaN is rejected; everything else is clamped into [0, 1].
pub fn sanitize_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}
