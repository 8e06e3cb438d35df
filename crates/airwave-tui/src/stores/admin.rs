use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use airwave_proto::backend::{Backend, Table, STATION_IMAGES_BUCKET};
use airwave_proto::error::{BackendError, Result};
use airwave_proto::model::{RadioStation, Role, StationDraft, UserWithRole};
use chrono::Utc;
use reqwest::Url;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::notify::Notifier;
use crate::stores::read_image;
use crate::BroadcastMessage;

pub const CATEGORY_REQUIRED: &str = "Please select or enter at least one category.";

/// Station editor contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationForm {
    pub name: String,
    pub stream_url: String,
    pub description: String,
    pub categories: Vec<String>,
    pub is_featured: bool,
    pub image_url: Option<String>,
}

impl StationForm {
    pub fn from_station(station: &RadioStation) -> Self {
        Self {
            name: station.name.clone(),
            stream_url: station.stream_url.clone(),
            description: station.description.clone().unwrap_or_default(),
            categories: station.category.clone(),
            is_featured: station.is_featured,
            image_url: station.image_url.clone(),
        }
    }

    /// Returns false for blanks and case-insensitive duplicates.
    pub fn add_category(&mut self, category: &str) -> bool {
        let category = category.trim();
        if category.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
        {
            return false;
        }
        self.categories.push(category.to_string());
        true
    }

    pub fn remove_category(&mut self, category: &str) {
        self.categories.retain(|c| !c.eq_ignore_ascii_case(category));
    }

    pub fn validate(&self) -> Result<StationDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(BackendError::validation("Station name is required"));
        }
        let stream_url = self.stream_url.trim();
        if stream_url.is_empty() {
            return Err(BackendError::validation("Stream URL is required"));
        }
        match Url::parse(stream_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(BackendError::validation(
                    "Stream URL must be an http(s) URL",
                ))
            }
        }
        if self.categories.iter().all(|c| c.trim().is_empty()) {
            return Err(BackendError::validation(CATEGORY_REQUIRED));
        }

        let description = self.description.trim();
        Ok(StationDraft {
            name: name.to_string(),
            stream_url: stream_url.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            category: self
                .categories
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            is_featured: self.is_featured,
            image_url: self.image_url.clone().filter(|u| !u.trim().is_empty()),
            updated_at: None,
        })
    }
}

/// Station and user management for administrators. Role checks happen in
/// the views; the backend enforces its own policies.
#[derive(Clone)]
pub struct AdminStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    /// `None` until the users table has been opened once.
    users: Arc<RwLock<Option<Vec<UserWithRole>>>>,
}

impl AdminStore {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            users: Arc::new(RwLock::new(None)),
        }
    }

    /// Keep a loaded user list current with profile and role changes.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut changes = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) if matches!(event.table, Table::Profiles | Table::UserRoles) => {
                        if store.users.read().await.is_some() {
                            let _ = store.load_users().await;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("admin: missed {} change events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // ── stations ──────────────────────────────────────────────────────────────

    pub async fn create_station(&self, form: &StationForm) -> Result<RadioStation> {
        let draft = form.validate()?;
        let result = self.backend.insert_station(&draft).await;
        let station = self.report(result, "Error creating station")?;
        info!("admin: created station {} ({})", station.name, station.id);
        self.notifier.success(format!("Station \"{}\" created", station.name));
        Ok(station)
    }

    pub async fn update_station(&self, id: &str, form: &StationForm) -> Result<RadioStation> {
        let mut draft = form.validate()?;
        draft.updated_at = Some(Utc::now());
        let result = self.backend.update_station(id, &draft).await;
        let station = self.report(result, "Error updating station")?;
        info!("admin: updated station {}", id);
        self.notifier.success(format!("Station \"{}\" updated", station.name));
        Ok(station)
    }

    pub async fn delete_station(&self, station: &RadioStation) -> Result<()> {
        let result = self.backend.delete_station(&station.id).await;
        self.report(result, "Error deleting station")?;
        info!("admin: deleted station {}", station.id);
        self.notifier.success(format!("Station \"{}\" deleted", station.name));
        Ok(())
    }

    /// Upload `path` and point the form at it. On failure the form keeps
    /// its previous image.
    pub async fn upload_station_image(&self, form: &mut StationForm, path: &Path) -> Result<String> {
        let image = self.report(read_image(path).await, "Upload Error")?;
        let object = format!("{}.{}", Utc::now().timestamp_millis(), image.extension);
        let result = self
            .backend
            .upload(STATION_IMAGES_BUCKET, &object, image.bytes, image.content_type)
            .await;
        let url = self.report(result, "Upload Error")?;
        form.image_url = Some(url.clone());
        self.notifier.success("Image uploaded");
        Ok(url)
    }

    // ── users ─────────────────────────────────────────────────────────────────

    /// Profiles joined with the admin role rows, sorted by label.
    pub async fn load_users(&self) -> Result<()> {
        match self.fetch_users().await {
            Ok(users) => {
                info!("admin: {} users", users.len());
                *self.users.write().await = Some(users);
                self.notifier.send(BroadcastMessage::UsersUpdated);
                Ok(())
            }
            Err(e) => {
                self.notifier.error(format!("Error loading users: {e}"));
                Err(e)
            }
        }
    }

    async fn fetch_users(&self) -> Result<Vec<UserWithRole>> {
        let profiles = self.backend.list_profiles().await?;
        let admins: HashSet<String> = self.backend.admin_user_ids().await?.into_iter().collect();
        let mut users: Vec<UserWithRole> = profiles
            .into_iter()
            .map(|p| {
                let is_admin = admins.contains(&p.id);
                UserWithRole::new(p, is_admin)
            })
            .collect();
        users.sort_by_key(|u| u.label().to_lowercase());
        Ok(users)
    }

    pub async fn users(&self) -> Vec<UserWithRole> {
        self.users.read().await.clone().unwrap_or_default()
    }

    /// Inserts the role row only when the user is not already an admin.
    pub async fn grant_admin(&self, user: &UserWithRole) -> Result<()> {
        let result = self.backend.admin_user_ids().await;
        let admins = self.report(result, "Error updating role")?;
        if admins.iter().any(|id| *id == user.profile.id) {
            self.notifier
                .info(format!("{} is already an admin", user.label()));
        } else {
            let result = self.backend.grant_role(&user.profile.id, Role::Admin).await;
            self.report(result, "Error updating role")?;
            info!("admin: granted admin to {}", user.profile.id);
            self.notifier
                .success(format!("{} is now an admin", user.label()));
        }
        self.load_users().await
    }

    pub async fn revoke_admin(&self, user: &UserWithRole) -> Result<()> {
        let result = self.backend.revoke_role(&user.profile.id, Role::Admin).await;
        self.report(result, "Error updating role")?;
        info!("admin: revoked admin from {}", user.profile.id);
        self.notifier
            .success(format!("{} is no longer an admin", user.label()));
        self.load_users().await
    }

    fn report<T>(&self, result: Result<T>, context: &str) -> Result<T> {
        if let Err(e) = &result {
            self.notifier.error(format!("{context}: {e}"));
        }
        result
    }
}

/// Users whose name or email contains `query`.
pub fn filter_users<'a>(users: &'a [UserWithRole], query: &str) -> Vec<&'a UserWithRole> {
    users.iter().filter(|u| u.matches_query(query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{notices, notifier};
    use crate::notify::Severity;
    use crate::stores::testing::{local, CountingBackend};
    use airwave_proto::model::Profile;

    fn valid_form() -> StationForm {
        let mut form = StationForm {
            name: " Night Drive ".into(),
            stream_url: "https://stream.example/night".into(),
            ..Default::default()
        };
        form.add_category("Synthwave");
        form
    }

    fn store() -> (AdminStore, Arc<CountingBackend>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(CountingBackend::new(local(dir.path().to_path_buf())));
        let store = AdminStore::new(backend.clone(), notifier().0);
        (store, backend, dir)
    }

    #[test]
    fn form_validation_rules() {
        let draft = valid_form().validate().unwrap();
        assert_eq!(draft.name, "Night Drive");
        assert_eq!(draft.description, None);
        assert_eq!(draft.category, vec!["Synthwave"]);

        let mut form = valid_form();
        form.name = "  ".into();
        assert!(form.validate().is_err());

        let mut form = valid_form();
        form.stream_url = "ftp://stream.example/x".into();
        assert!(form.validate().is_err());
        form.stream_url = "not a url".into();
        assert!(form.validate().is_err());

        let mut form = valid_form();
        form.categories.clear();
        assert_eq!(form.validate().unwrap_err().to_string(), CATEGORY_REQUIRED);
    }

    #[test]
    fn categories_are_trimmed_and_deduplicated() {
        let mut form = StationForm::default();
        assert!(form.add_category(" Jazz "));
        assert!(!form.add_category("jazz"));
        assert!(!form.add_category("   "));
        assert!(form.add_category("Blues"));
        assert_eq!(form.categories, vec!["Jazz", "Blues"]);
        form.remove_category("JAZZ");
        assert_eq!(form.categories, vec!["Blues"]);
    }

    #[tokio::test]
    async fn invalid_form_makes_no_call() {
        let (store, backend, _dir) = store();
        let mut form = valid_form();
        form.categories.clear();
        assert!(store.create_station(&form).await.is_err());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn station_crud_round() {
        let (store, backend, _dir) = store();
        let created = store.create_station(&valid_form()).await.unwrap();
        assert_eq!(created.name, "Night Drive");

        let mut form = StationForm::from_station(&created);
        form.is_featured = true;
        let updated = store.update_station(&created.id, &form).await.unwrap();
        assert!(updated.is_featured);
        assert!(updated.updated_at.is_some());

        store.delete_station(&updated).await.unwrap();
        let ids: Vec<String> = backend
            .list_stations()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert!(!ids.contains(&created.id));
    }

    #[tokio::test]
    async fn failed_upload_keeps_previous_image() {
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut rx) = notifier();
        let store = AdminStore::new(local(dir.path().to_path_buf()), notifier);
        let mut form = valid_form();
        form.image_url = Some("http://img.example/old.png".into());

        let missing = dir.path().join("missing.png");
        assert!(store.upload_station_image(&mut form, &missing).await.is_err());
        assert_eq!(form.image_url.as_deref(), Some("http://img.example/old.png"));
        assert!(notices(&mut rx)
            .iter()
            .any(|(sev, text)| *sev == Severity::Error && text.starts_with("Upload Error")));

        let logo = dir.path().join("logo.webp");
        std::fs::write(&logo, [1, 2, 3]).unwrap();
        let url = store.upload_station_image(&mut form, &logo).await.unwrap();
        assert!(url.contains(STATION_IMAGES_BUCKET));
        assert!(url.ends_with(".webp"));
        assert_eq!(form.image_url, Some(url));
    }

    #[tokio::test]
    async fn users_are_listed_with_roles_and_roles_toggle() {
        let (store, backend, _dir) = store();
        backend
            .sign_up("admin@example.com", "secret1", Some("Zed"))
            .await
            .unwrap();
        backend
            .sign_up("listener@example.com", "secret1", Some("amy"))
            .await
            .unwrap();

        store.load_users().await.unwrap();
        let users = store.users().await;
        let labels: Vec<&str> = users.iter().map(|u| u.label()).collect();
        assert_eq!(labels, vec!["amy", "Zed"]);
        assert!(!users[0].is_admin);
        assert!(users[1].is_admin);

        store.grant_admin(&users[0]).await.unwrap();
        assert!(store.users().await[0].is_admin);

        // granting twice inserts nothing new
        store.grant_admin(&users[0]).await.unwrap();
        let admins = backend.admin_user_ids().await.unwrap();
        assert_eq!(
            admins.iter().filter(|id| **id == users[0].profile.id).count(),
            1
        );

        store.revoke_admin(&users[0]).await.unwrap();
        assert!(!store.users().await[0].is_admin);
    }

    #[test]
    fn filter_matches_name_or_email() {
        let users = vec![
            UserWithRole::new(
                Profile {
                    id: "u1".into(),
                    name: Some("Amy".into()),
                    email: Some("amy@example.com".into()),
                    ..Default::default()
                },
                false,
            ),
            UserWithRole::new(
                Profile {
                    id: "u2".into(),
                    name: Some("Zed".into()),
                    email: Some("z@radio.test".into()),
                    ..Default::default()
                },
                true,
            ),
        ];
        assert_eq!(filter_users(&users, "radio.test").len(), 1);
        assert_eq!(filter_users(&users, "AMY")[0].profile.id, "u1");
        assert_eq!(filter_users(&users, "").len(), 2);
    }
}
