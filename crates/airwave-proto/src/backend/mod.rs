//! Client side of the backend-as-a-service: tables, file storage, auth and
//! change notification behind one trait.
//!
//! Two implementations exist: [`RestBackend`] talks to the hosted service over
//! HTTP, [`LocalBackend`] keeps the same tables in process for offline use and
//! tests. Neither enforces access policies; that is the hosted service's job.

mod local;
mod query;
mod rest;

pub use local::LocalBackend;
pub use query::Query;
pub use rest::RestBackend;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::model::{
    NewComment, Profile, ProfilePatch, RadioStation, Role, StationComment, StationDraft,
};

pub const STATION_IMAGES_BUCKET: &str = "station_images";
pub const AVATARS_BUCKET: &str = "avatars";

/// Tables the client reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Table {
    Stations,
    Profiles,
    UserRoles,
    Favorites,
    Comments,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Stations => "radio_stations",
            Table::Profiles => "profiles",
            Table::UserRoles => "user_roles",
            Table::Favorites => "user_favorites",
            Table::Comments => "station_comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub id: Option<String>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            table,
            kind,
            id: Some(id.into()),
        }
    }
}

/// An authenticated session as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// True when the access token expires within `margin_secs`.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(at) => at - chrono::Duration::seconds(margin_secs) <= Utc::now(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Result of starting an OAuth sign-in.
#[derive(Debug, Clone, PartialEq)]
pub enum OAuthStart {
    /// Open this URL in a browser; the provider redirects back with tokens.
    Redirect(String),
    /// The backend signed the user in directly.
    SignedIn(Session),
}

#[async_trait]
pub trait Backend: Send + Sync {
    // ── stations ─────────────────────────────────────────────────────────────

    /// All stations ordered by name.
    async fn list_stations(&self) -> Result<Vec<RadioStation>>;
    async fn insert_station(&self, draft: &StationDraft) -> Result<RadioStation>;
    async fn update_station(&self, id: &str, draft: &StationDraft) -> Result<RadioStation>;
    async fn delete_station(&self, id: &str) -> Result<()>;

    // ── profiles & roles ─────────────────────────────────────────────────────

    async fn list_profiles(&self) -> Result<Vec<Profile>>;
    async fn profiles_by_ids(&self, ids: &[String]) -> Result<Vec<Profile>>;
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>>;
    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Profile>;

    async fn roles_for(&self, user_id: &str) -> Result<Vec<Role>>;
    async fn admin_user_ids(&self) -> Result<Vec<String>>;
    async fn grant_role(&self, user_id: &str, role: Role) -> Result<()>;
    async fn revoke_role(&self, user_id: &str, role: Role) -> Result<()>;

    // ── favorites ────────────────────────────────────────────────────────────

    async fn favorite_station_ids(&self, user_id: &str) -> Result<Vec<String>>;
    async fn add_favorite(&self, user_id: &str, station_id: &str) -> Result<()>;
    async fn remove_favorite(&self, user_id: &str, station_id: &str) -> Result<()>;

    // ── comments ─────────────────────────────────────────────────────────────

    /// Comments for a station, newest first.
    async fn comments_for_station(&self, station_id: &str) -> Result<Vec<StationComment>>;
    async fn insert_comment(&self, comment: &NewComment) -> Result<StationComment>;
    async fn delete_comment(&self, comment_id: &str) -> Result<()>;

    // ── storage ──────────────────────────────────────────────────────────────

    /// Upload an object and return its public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
    fn public_url(&self, bucket: &str, path: &str) -> String;

    // ── auth ─────────────────────────────────────────────────────────────────

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;
    /// Returns `None` when the service requires email confirmation first.
    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>)
        -> Result<Option<Session>>;
    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthStart>;
    /// Finish an OAuth sign-in from the URL the provider redirected to.
    async fn complete_oauth(&self, callback_url: &str) -> Result<Session>;
    async fn sign_out(&self) -> Result<()>;
    /// Reload a persisted session, refreshing it when expired.
    async fn restore_session(&self) -> Result<Option<Session>>;
    async fn current_session(&self) -> Option<Session>;

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Build the backend selected in the config.
pub async fn connect(config: &Config) -> anyhow::Result<Arc<dyn Backend>> {
    match config.backend.kind {
        BackendKind::Rest => {
            if config.backend.url.trim().is_empty() {
                anyhow::bail!("backend.kind = \"rest\" requires backend.url");
            }
            info!("Using hosted backend at {}", config.backend.url);
            let backend = Arc::new(RestBackend::new(
                &config.backend,
                Some(config.paths.auth_file.clone()),
            )?);
            backend.start_change_watcher(std::time::Duration::from_secs(
                config.backend.poll_interval_secs.max(1),
            ));
            Ok(backend)
        }
        BackendKind::Local => {
            let seed = crate::seed::load_seed(config).await;
            let storage_root = crate::platform::data_dir().join("storage");
            info!(
                "Using local backend at {} ({} seed stations)",
                config.paths.local_db.display(),
                seed.len()
            );
            let backend = LocalBackend::open(config.paths.local_db.clone(), storage_root, seed)?;
            Ok(Arc::new(backend))
        }
    }
}

/// Random v4-style identifier for rows created client-side.
pub(crate) fn new_id() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let a: u32 = rng.gen();
    let b: u16 = rng.gen();
    let c: u16 = (rng.gen::<u16>() & 0x0fff) | 0x4000;
    let d: u16 = (rng.gen::<u16>() & 0x3fff) | 0x8000;
    let e: u64 = rng.gen::<u64>() & 0xffff_ffff_ffff;
    format!("{a:08x}-{b:04x}-{c:04x}-{d:04x}-{e:012x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_look_like_uuids() {
        let id = new_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
        assert_eq!(&id[14..15], "4");
        assert_ne!(new_id(), id);
    }

    #[test]
    fn session_expiry_margin() {
        let mut s = Session {
            user_id: "u".into(),
            email: "u@example.com".into(),
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Some(Utc::now() + chrono::Duration::seconds(30)),
        };
        assert!(s.expires_within(60));
        assert!(!s.expires_within(10));
        s.expires_at = None;
        assert!(!s.expires_within(60));
    }

    #[test]
    fn table_names() {
        assert_eq!(Table::Stations.name(), "radio_stations");
        assert_eq!(Table::Favorites.name(), "user_favorites");
    }
}
