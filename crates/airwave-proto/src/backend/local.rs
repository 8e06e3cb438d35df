//! In-process backend: the same tables as the hosted service, kept behind a
//! `RwLock` and optionally snapshotted to a JSON file after every write.
//!
//! Constraints mirrored from the hosted schema:
//! - favorites and comments must reference an existing station
//! - `(user_id, station_id)` and `(user_id, role)` pairs are unique
//! - deleting a station cascades to its favorites and comments
//!
//! Auth accepts any well-formed email with a password of at least six
//! characters; unknown emails are registered on first sign-in. Emails starting
//! with `admin` are granted the admin role at registration.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::{
    new_id, AuthEvent, Backend, ChangeEvent, ChangeKind, OAuthStart, Session, Table,
};
use crate::error::{BackendError, Result};
use crate::model::{
    FavoriteRow, NewComment, Profile, ProfilePatch, RadioStation, Role, RoleRow, StationComment,
    StationDraft,
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    user_id: String,
    email: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    stations: Vec<RadioStation>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    roles: Vec<RoleRow>,
    #[serde(default)]
    favorites: Vec<FavoriteRow>,
    #[serde(default)]
    comments: Vec<StationComment>,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    session: Option<Session>,
}

impl Tables {
    fn station_exists(&self, id: &str) -> bool {
        self.stations.iter().any(|s| s.id == id)
    }
}

pub struct LocalBackend {
    tables: RwLock<Tables>,
    db_path: Option<PathBuf>,
    storage_root: PathBuf,
    changes: broadcast::Sender<ChangeEvent>,
    auth: broadcast::Sender<AuthEvent>,
}

impl LocalBackend {
    /// Fresh tables seeded with `stations`; nothing is written to disk except
    /// uploaded objects under `storage_root`.
    pub fn in_memory(stations: Vec<RadioStation>, storage_root: PathBuf) -> Self {
        Self::from_tables(
            Tables {
                stations: stamp(stations),
                ..Tables::default()
            },
            None,
            storage_root,
        )
    }

    /// Load the snapshot at `db_path`, or seed a new one from `seed`.
    pub fn open(
        db_path: PathBuf,
        storage_root: PathBuf,
        seed: Vec<RadioStation>,
    ) -> anyhow::Result<Self> {
        let tables = match std::fs::read_to_string(&db_path) {
            Ok(content) => {
                let tables: Tables = serde_json::from_str(&content)?;
                info!(
                    "Local backend: loaded {} stations from {}",
                    tables.stations.len(),
                    db_path.display()
                );
                tables
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Local backend: seeding {} stations", seed.len());
                Tables {
                    stations: stamp(seed),
                    ..Tables::default()
                }
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_tables(tables, Some(db_path), storage_root))
    }

    fn from_tables(tables: Tables, db_path: Option<PathBuf>, storage_root: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(256);
        let (auth, _) = broadcast::channel(16);
        Self {
            tables: RwLock::new(tables),
            db_path,
            storage_root,
            changes,
            auth,
        }
    }

    async fn persist(&self) -> Result<()> {
        let Some(path) = &self.db_path else {
            return Ok(());
        };
        let json = {
            let tables = self.tables.read().await;
            serde_json::to_string_pretty(&*tables)?
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Persist, then announce the change. A failed snapshot write is logged,
    /// the in-memory write stands.
    async fn committed(&self, events: Vec<ChangeEvent>) {
        if let Err(e) = self.persist().await {
            warn!("Local backend: snapshot write failed: {}", e);
        }
        for event in events {
            debug!("Local backend: change {:?}", event);
            let _ = self.changes.send(event);
        }
    }

    async fn open_session(&self, user_id: &str, email: &str) -> Session {
        let session = Session {
            user_id: user_id.to_string(),
            email: email.to_string(),
            access_token: new_id(),
            refresh_token: new_id(),
            expires_at: None,
        };
        self.tables.write().await.session = Some(session.clone());
        self.committed(Vec::new()).await;
        let _ = self.auth.send(AuthEvent::SignedIn(session.clone()));
        session
    }

    /// Create the account, profile and role rows for a new user.
    async fn register(&self, email: &str, name: Option<&str>) -> Result<String> {
        let user_id = new_id();
        let mut events = vec![
            ChangeEvent::new(Table::Profiles, ChangeKind::Insert, &user_id),
            ChangeEvent::new(Table::UserRoles, ChangeKind::Insert, &user_id),
        ];
        {
            let mut t = self.tables.write().await;
            if t.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
                return Err(BackendError::Conflict("User already registered".into()));
            }
            t.accounts.push(Account {
                user_id: user_id.clone(),
                email: email.to_string(),
            });
            let default_name = email.split('@').next().unwrap_or(email).to_string();
            t.profiles.push(Profile {
                id: user_id.clone(),
                name: Some(name.map(str::to_string).unwrap_or(default_name)),
                email: Some(email.to_string()),
                created_at: Some(Utc::now()),
                ..Profile::default()
            });
            t.roles.push(RoleRow {
                user_id: user_id.clone(),
                role: Role::User,
            });
            if email.to_ascii_lowercase().starts_with("admin") {
                t.roles.push(RoleRow {
                    user_id: user_id.clone(),
                    role: Role::Admin,
                });
                events.push(ChangeEvent::new(Table::UserRoles, ChangeKind::Insert, &user_id));
            }
        }
        info!("Local backend: registered {}", email);
        self.committed(events).await;
        Ok(user_id)
    }
}

/// Seeded rows get creation timestamps like inserted ones.
fn stamp(mut stations: Vec<RadioStation>) -> Vec<RadioStation> {
    let now = Utc::now();
    for s in &mut stations {
        s.created_at.get_or_insert(now);
    }
    stations
}

fn check_credentials(email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    let well_formed = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !well_formed {
        return Err(BackendError::validation("Invalid email address"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BackendError::validation(
            "Password should be at least 6 characters",
        ));
    }
    Ok(())
}

fn station_from_draft(id: String, draft: &StationDraft) -> RadioStation {
    RadioStation {
        id,
        name: draft.name.clone(),
        stream_url: draft.stream_url.clone(),
        image_url: draft.image_url.clone(),
        description: draft.description.clone(),
        category: draft.category.clone(),
        is_featured: draft.is_featured,
        listeners: 0,
        created_at: Some(Utc::now()),
        updated_at: draft.updated_at,
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list_stations(&self) -> Result<Vec<RadioStation>> {
        let mut stations = self.tables.read().await.stations.clone();
        stations.sort_by_key(|s| s.name.to_lowercase());
        Ok(stations)
    }

    async fn insert_station(&self, draft: &StationDraft) -> Result<RadioStation> {
        let station = station_from_draft(new_id(), draft);
        self.tables.write().await.stations.push(station.clone());
        self.committed(vec![ChangeEvent::new(
            Table::Stations,
            ChangeKind::Insert,
            &station.id,
        )])
        .await;
        Ok(station)
    }

    async fn update_station(&self, id: &str, draft: &StationDraft) -> Result<RadioStation> {
        let updated = {
            let mut t = self.tables.write().await;
            let row = t
                .stations
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| BackendError::NotFound(format!("station {id}")))?;
            row.name = draft.name.clone();
            row.stream_url = draft.stream_url.clone();
            row.description = draft.description.clone();
            row.category = draft.category.clone();
            row.is_featured = draft.is_featured;
            row.image_url = draft.image_url.clone();
            row.updated_at = Some(draft.updated_at.unwrap_or_else(Utc::now));
            row.clone()
        };
        self.committed(vec![ChangeEvent::new(Table::Stations, ChangeKind::Update, id)])
            .await;
        Ok(updated)
    }

    async fn delete_station(&self, id: &str) -> Result<()> {
        let mut events = Vec::new();
        {
            let mut t = self.tables.write().await;
            if !t.station_exists(id) {
                return Err(BackendError::NotFound(format!("station {id}")));
            }
            t.stations.retain(|s| s.id != id);
            let before = t.favorites.len();
            t.favorites.retain(|f| f.station_id != id);
            if t.favorites.len() != before {
                events.push(ChangeEvent::new(Table::Favorites, ChangeKind::Delete, id));
            }
            let before = t.comments.len();
            t.comments.retain(|c| c.station_id != id);
            if t.comments.len() != before {
                events.push(ChangeEvent::new(Table::Comments, ChangeKind::Delete, id));
            }
        }
        events.insert(0, ChangeEvent::new(Table::Stations, ChangeKind::Delete, id));
        self.committed(events).await;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self.tables.read().await.profiles.clone())
    }

    async fn profiles_by_ids(&self, ids: &[String]) -> Result<Vec<Profile>> {
        let t = self.tables.read().await;
        Ok(t.profiles
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let t = self.tables.read().await;
        Ok(t.profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Profile> {
        let updated = {
            let mut t = self.tables.write().await;
            let row = t
                .profiles
                .iter_mut()
                .find(|p| p.id == user_id)
                .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))?;
            patch.apply(row);
            row.updated_at = Some(patch.updated_at.unwrap_or_else(Utc::now));
            row.clone()
        };
        self.committed(vec![ChangeEvent::new(
            Table::Profiles,
            ChangeKind::Update,
            user_id,
        )])
        .await;
        Ok(updated)
    }

    async fn roles_for(&self, user_id: &str) -> Result<Vec<Role>> {
        let t = self.tables.read().await;
        Ok(t.roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role)
            .collect())
    }

    async fn admin_user_ids(&self) -> Result<Vec<String>> {
        let t = self.tables.read().await;
        Ok(t.roles
            .iter()
            .filter(|r| r.role == Role::Admin)
            .map(|r| r.user_id.clone())
            .collect())
    }

    async fn grant_role(&self, user_id: &str, role: Role) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            if t.roles.iter().any(|r| r.user_id == user_id && r.role == role) {
                return Err(BackendError::Conflict(format!(
                    "{user_id} already has role {role:?}"
                )));
            }
            t.roles.push(RoleRow {
                user_id: user_id.to_string(),
                role,
            });
        }
        self.committed(vec![ChangeEvent::new(
            Table::UserRoles,
            ChangeKind::Insert,
            user_id,
        )])
        .await;
        Ok(())
    }

    async fn revoke_role(&self, user_id: &str, role: Role) -> Result<()> {
        self.tables
            .write()
            .await
            .roles
            .retain(|r| !(r.user_id == user_id && r.role == role));
        self.committed(vec![ChangeEvent::new(
            Table::UserRoles,
            ChangeKind::Delete,
            user_id,
        )])
        .await;
        Ok(())
    }

    async fn favorite_station_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let t = self.tables.read().await;
        Ok(t.favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.station_id.clone())
            .collect())
    }

    async fn add_favorite(&self, user_id: &str, station_id: &str) -> Result<()> {
        {
            let mut t = self.tables.write().await;
            if !t.station_exists(station_id) {
                return Err(BackendError::NotFound(format!("station {station_id}")));
            }
            if t
                .favorites
                .iter()
                .any(|f| f.user_id == user_id && f.station_id == station_id)
            {
                return Err(BackendError::Conflict("already a favorite".into()));
            }
            t.favorites.push(FavoriteRow {
                user_id: user_id.to_string(),
                station_id: station_id.to_string(),
            });
        }
        self.committed(vec![ChangeEvent::new(
            Table::Favorites,
            ChangeKind::Insert,
            station_id,
        )])
        .await;
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, station_id: &str) -> Result<()> {
        self.tables
            .write()
            .await
            .favorites
            .retain(|f| !(f.user_id == user_id && f.station_id == station_id));
        self.committed(vec![ChangeEvent::new(
            Table::Favorites,
            ChangeKind::Delete,
            station_id,
        )])
        .await;
        Ok(())
    }

    async fn comments_for_station(&self, station_id: &str) -> Result<Vec<StationComment>> {
        let t = self.tables.read().await;
        // Reverse insertion order first so equal timestamps stay newest-first.
        let mut comments: Vec<StationComment> = t
            .comments
            .iter()
            .rev()
            .filter(|c| c.station_id == station_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<StationComment> {
        let row = StationComment {
            id: new_id(),
            station_id: comment.station_id.clone(),
            user_id: comment.user_id.clone(),
            content: comment.content.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        {
            let mut t = self.tables.write().await;
            if !t.station_exists(&comment.station_id) {
                return Err(BackendError::NotFound(format!(
                    "station {}",
                    comment.station_id
                )));
            }
            t.comments.push(row.clone());
        }
        self.committed(vec![ChangeEvent::new(
            Table::Comments,
            ChangeKind::Insert,
            &row.station_id,
        )])
        .await;
        Ok(row)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let station_id = {
            let mut t = self.tables.write().await;
            let pos = t
                .comments
                .iter()
                .position(|c| c.id == comment_id)
                .ok_or_else(|| BackendError::NotFound(format!("comment {comment_id}")))?;
            t.comments.remove(pos).station_id
        };
        self.committed(vec![ChangeEvent::new(
            Table::Comments,
            ChangeKind::Delete,
            station_id,
        )])
        .await;
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String> {
        if path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return Err(BackendError::validation(format!("invalid object path {path}")));
        }
        let target = self.storage_root.join(bucket).join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!("Local backend: stored {}", target.display());
        Ok(self.public_url(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "file://{}",
            self.storage_root.join(bucket).join(path).display()
        )
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        check_credentials(email, password)?;
        let email = email.trim();
        let existing = {
            let t = self.tables.read().await;
            t.accounts
                .iter()
                .find(|a| a.email.eq_ignore_ascii_case(email))
                .cloned()
        };
        let user_id = match existing {
            Some(account) => account.user_id,
            None => self.register(email, None).await?,
        };
        Ok(self.open_session(&user_id, email).await)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Option<Session>> {
        check_credentials(email, password)?;
        let email = email.trim();
        let user_id = self.register(email, name).await?;
        Ok(Some(self.open_session(&user_id, email).await))
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthStart> {
        let email = format!("{}@example.com", provider.to_ascii_lowercase());
        let existing = {
            let t = self.tables.read().await;
            t.accounts
                .iter()
                .find(|a| a.email == email)
                .map(|a| a.user_id.clone())
        };
        let user_id = match existing {
            Some(id) => id,
            None => self.register(&email, None).await?,
        };
        Ok(OAuthStart::SignedIn(self.open_session(&user_id, &email).await))
    }

    async fn complete_oauth(&self, _callback_url: &str) -> Result<Session> {
        self.current_session()
            .await
            .ok_or(BackendError::Unauthenticated)
    }

    async fn sign_out(&self) -> Result<()> {
        self.tables.write().await.session = None;
        self.committed(Vec::new()).await;
        let _ = self.auth.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn restore_session(&self) -> Result<Option<Session>> {
        let session = self.current_session().await;
        if let Some(s) = &session {
            let _ = self.auth.send(AuthEvent::SignedIn(s.clone()));
        }
        Ok(session)
    }

    async fn current_session(&self) -> Option<Session> {
        self.tables.read().await.session.clone()
    }

    fn auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth.subscribe()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, name: &str) -> RadioStation {
        RadioStation {
            id: id.into(),
            name: name.into(),
            stream_url: format!("http://{id}.example/live"),
            category: vec!["Jazz".into()],
            ..Default::default()
        }
    }

    fn backend() -> (LocalBackend, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let b = LocalBackend::in_memory(
            vec![station("b", "beta"), station("a", "Alpha")],
            dir.path().join("storage"),
        );
        (b, dir)
    }

    #[tokio::test]
    async fn stations_are_sorted_by_name() {
        let (b, _dir) = backend();
        let names: Vec<String> = b
            .list_stations()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "beta"]);
    }

    #[tokio::test]
    async fn favorites_are_unique_and_reference_stations() {
        let (b, _dir) = backend();
        b.add_favorite("u1", "a").await.unwrap();
        assert!(matches!(
            b.add_favorite("u1", "a").await,
            Err(BackendError::Conflict(_))
        ));
        assert!(matches!(
            b.add_favorite("u1", "missing").await,
            Err(BackendError::NotFound(_))
        ));
        assert_eq!(b.favorite_station_ids("u1").await.unwrap(), vec!["a"]);
        b.remove_favorite("u1", "a").await.unwrap();
        assert!(b.favorite_station_ids("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_station_cascades() {
        let (b, _dir) = backend();
        let mut changes = b.subscribe();
        b.add_favorite("u1", "a").await.unwrap();
        b.insert_comment(&NewComment {
            station_id: "a".into(),
            user_id: "u1".into(),
            content: "nice".into(),
        })
        .await
        .unwrap();
        b.delete_station("a").await.unwrap();

        assert!(b.favorite_station_ids("u1").await.unwrap().is_empty());
        assert!(b.comments_for_station("a").await.unwrap().is_empty());

        let mut tables = Vec::new();
        while let Ok(ev) = changes.try_recv() {
            tables.push((ev.table, ev.kind));
        }
        assert!(tables.contains(&(Table::Stations, ChangeKind::Delete)));
        assert!(tables.contains(&(Table::Favorites, ChangeKind::Delete)));
        assert!(tables.contains(&(Table::Comments, ChangeKind::Delete)));
    }

    #[tokio::test]
    async fn comments_come_back_newest_first() {
        let (b, _dir) = backend();
        for text in ["first", "second", "third"] {
            b.insert_comment(&NewComment {
                station_id: "b".into(),
                user_id: "u1".into(),
                content: text.into(),
            })
            .await
            .unwrap();
        }
        let contents: Vec<String> = b
            .comments_for_station("b")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn update_station_sets_timestamp() {
        let (b, _dir) = backend();
        let mut draft = StationDraft::from(&station("a", "Alpha"));
        draft.name = "Alpha Two".into();
        let updated = b.update_station("a", &draft).await.unwrap();
        assert_eq!(updated.name, "Alpha Two");
        assert!(updated.updated_at.is_some());
        assert!(matches!(
            b.update_station("zzz", &draft).await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sign_up_creates_profile_and_roles() {
        let (b, _dir) = backend();
        let mut auth = b.auth_events();
        let session = b
            .sign_up("admin@example.com", "secret1", Some("Boss"))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(auth.try_recv(), Ok(AuthEvent::SignedIn(_))));

        let profile = b.get_profile(&session.user_id).await.unwrap().unwrap();
        assert_eq!(profile.name.as_deref(), Some("Boss"));
        let roles = b.roles_for(&session.user_id).await.unwrap();
        assert!(roles.contains(&Role::Admin));
        assert!(roles.contains(&Role::User));

        assert!(matches!(
            b.sign_up("admin@example.com", "secret1", None).await,
            Err(BackendError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn sign_in_validates_and_reuses_accounts() {
        let (b, _dir) = backend();
        assert!(matches!(
            b.sign_in_with_password("nope", "secret1").await,
            Err(BackendError::Validation(_))
        ));
        assert!(matches!(
            b.sign_in_with_password("dj@example.com", "123").await,
            Err(BackendError::Validation(_))
        ));
        let first = b.sign_in_with_password("dj@example.com", "secret1").await.unwrap();
        b.sign_out().await.unwrap();
        assert!(b.current_session().await.is_none());
        let second = b.sign_in_with_password("DJ@example.com", "secret1").await.unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(b.roles_for(&first.user_id).await.unwrap(), vec![Role::User]);
    }

    #[tokio::test]
    async fn oauth_signs_in_demo_user() {
        let (b, _dir) = backend();
        let start = b.sign_in_with_oauth("google").await.unwrap();
        let OAuthStart::SignedIn(session) = start else {
            panic!("expected direct sign-in");
        };
        assert_eq!(session.email, "google@example.com");
    }

    #[tokio::test]
    async fn roles_grant_and_revoke() {
        let (b, _dir) = backend();
        b.grant_role("u1", Role::Admin).await.unwrap();
        assert!(matches!(
            b.grant_role("u1", Role::Admin).await,
            Err(BackendError::Conflict(_))
        ));
        assert_eq!(b.admin_user_ids().await.unwrap(), vec!["u1"]);
        b.revoke_role("u1", Role::Admin).await.unwrap();
        assert!(b.admin_user_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn uploads_land_under_storage_root() {
        let (b, dir) = backend();
        let url = b
            .upload("avatars", "u1/pic.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert!(url.starts_with("file://"));
        let bytes = std::fs::read(dir.path().join("storage/avatars/u1/pic.png")).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(b.upload("avatars", "../escape", vec![], "x").await.is_err());
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.json");
        let storage = dir.path().join("storage");
        {
            let b = LocalBackend::open(db.clone(), storage.clone(), vec![station("a", "Alpha")])
                .unwrap();
            let s = b.sign_in_with_password("dj@example.com", "secret1").await.unwrap();
            b.add_favorite(&s.user_id, "a").await.unwrap();
        }
        let b = LocalBackend::open(db, storage, Vec::new()).unwrap();
        assert_eq!(b.list_stations().await.unwrap().len(), 1);
        let session = b.restore_session().await.unwrap().unwrap();
        assert_eq!(
            b.favorite_station_ids(&session.user_id).await.unwrap(),
            vec!["a"]
        );
    }
}
