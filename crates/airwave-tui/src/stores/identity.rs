use std::path::Path;
use std::sync::Arc;

use airwave_proto::backend::{AuthEvent, Backend, OAuthStart, Session, Table, AVATARS_BUCKET};
use airwave_proto::error::{BackendError, Result};
use airwave_proto::model::{ProfilePatch, User};
use chrono::Utc;
use regex::Regex;
use std::sync::OnceLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::Notifier;
use crate::stores::read_image;
use crate::BroadcastMessage;

pub const MIN_PASSWORD_LEN: usize = 6;

fn email_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    let valid = match email_pattern() {
        Some(re) => re.is_match(email),
        None => email.contains('@'),
    };
    if valid {
        Ok(())
    } else {
        Err(BackendError::validation("Please enter a valid email address"))
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(BackendError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )))
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileEdit {
    pub name: String,
    pub country: String,
    pub status: String,
}

impl ProfileEdit {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone().unwrap_or_default(),
            country: user.country.clone().unwrap_or_default(),
            status: user.status.clone().unwrap_or_default(),
        }
    }

    fn into_patch(self) -> ProfilePatch {
        ProfilePatch {
            name: Some(self.name.trim().to_string()),
            country: Some(self.country.trim().to_string()),
            status: Some(self.status.trim().to_string()),
            avatar_url: None,
            updated_at: Some(Utc::now()),
        }
    }
}

/// The signed-in user, derived from auth session events.
#[derive(Clone)]
pub struct IdentityStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    user_tx: Arc<watch::Sender<Option<User>>>,
}

impl IdentityStore {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        let (user_tx, _) = watch::channel(None);
        Self {
            backend,
            notifier,
            user_tx: Arc::new(user_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user_tx.subscribe()
    }

    pub fn current(&self) -> Option<User> {
        self.user_tx.borrow().clone()
    }

    pub fn is_admin(&self) -> bool {
        self.user_tx.borrow().as_ref().is_some_and(User::is_admin)
    }

    /// React to session changes made anywhere (token refresh, another
    /// sign-in path, remote sign-out) and to role changes of the signed-in
    /// user.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut events = self.backend.auth_events();
        let mut changes = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(AuthEvent::SignedIn(session)) | Ok(AuthEvent::TokenRefreshed(session)) => {
                            let known = store
                                .current()
                                .is_some_and(|u| u.id == session.user_id);
                            if !known {
                                if let Err(e) = store.load_user(&session).await {
                                    warn!("identity: loading user failed: {}", e);
                                }
                            }
                        }
                        Ok(AuthEvent::SignedOut) => store.clear(),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("identity: missed {} auth events", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    change = changes.recv() => match change {
                        Ok(change) if change.table == Table::UserRoles => {
                            let mine = store
                                .current()
                                .is_some_and(|u| change.id.as_deref() == Some(u.id.as_str()));
                            if mine {
                                debug!("identity: roles changed, reloading");
                                store.refresh().await;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("identity: missed {} change events", n);
                            store.refresh().await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }

    /// Pick up a session persisted by an earlier run.
    pub async fn restore(&self) -> Result<Option<User>> {
        match self.backend.restore_session().await? {
            Some(session) => {
                info!("identity: restored session for {}", session.email);
                self.load_user(&session).await.map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        validate_email(email)?;
        validate_password(password)?;
        let result = self
            .backend
            .sign_in_with_password(email.trim(), password)
            .await;
        let session = self.report(result, "Sign in failed")?;
        let user = self.load_user(&session).await?;
        self.notifier
            .success(format!("Welcome back, {}", user.display_name()));
        Ok(user)
    }

    /// `Ok(None)` means the account exists but must be confirmed by email.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        confirm: &str,
        name: Option<&str>,
    ) -> Result<Option<User>> {
        validate_email(email)?;
        validate_password(password)?;
        if password != confirm {
            return Err(BackendError::validation("Passwords do not match"));
        }
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let result = self.backend.sign_up(email.trim(), password, name).await;
        match self.report(result, "Sign up failed")? {
            Some(session) => {
                let user = self.load_user(&session).await?;
                self.notifier.success("Account created");
                Ok(Some(user))
            }
            None => {
                self.notifier
                    .info("Check your email to confirm your account");
                Ok(None)
            }
        }
    }

    pub async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthStart> {
        let result = self.backend.sign_in_with_oauth(provider).await;
        let start = self.report(result, "Sign in failed")?;
        if let OAuthStart::SignedIn(session) = &start {
            self.load_user(session).await?;
        }
        Ok(start)
    }

    /// Finish OAuth with the URL the provider redirected the browser to.
    pub async fn complete_oauth(&self, callback_url: &str) -> Result<User> {
        let result = self.backend.complete_oauth(callback_url.trim()).await;
        let session = self.report(result, "Sign in failed")?;
        self.load_user(&session).await
    }

    /// The local user is cleared before the backend is told; a backend
    /// failure is only reported.
    pub async fn sign_out(&self) {
        self.clear();
        match self.backend.sign_out().await {
            Ok(()) => self.notifier.info("Signed out"),
            Err(e) => self.notifier.error(format!("Error signing out: {e}")),
        }
    }

    pub async fn update_profile(&self, edit: ProfileEdit) -> Result<User> {
        let user = self.current().ok_or(BackendError::Unauthenticated)?;
        let result = self.backend.update_profile(&user.id, &edit.into_patch()).await;
        self.report(result, "Error updating profile")?;
        let user = self.reload().await?;
        self.notifier.success("Profile updated");
        Ok(user)
    }

    /// Upload `path` to the avatars bucket and point the profile at it.
    pub async fn upload_avatar(&self, path: &Path) -> Result<User> {
        let user = self.current().ok_or(BackendError::Unauthenticated)?;
        let image = self.report(read_image(path).await, "Upload Error")?;
        let object = format!(
            "{}/{:016x}.{}",
            user.id,
            rand::random::<u64>(),
            image.extension
        );
        let result = self
            .backend
            .upload(AVATARS_BUCKET, &object, image.bytes, image.content_type)
            .await;
        let url = self.report(result, "Upload Error")?;

        let patch = ProfilePatch {
            avatar_url: Some(url),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        let result = self.backend.update_profile(&user.id, &patch).await;
        self.report(result, "Error updating profile")?;
        let user = self.reload().await?;
        self.notifier.success("Avatar updated");
        Ok(user)
    }

    /// Reload profile and roles of the current user.
    pub async fn reload(&self) -> Result<User> {
        let session = self
            .backend
            .current_session()
            .await
            .ok_or(BackendError::Unauthenticated)?;
        self.load_user(&session).await
    }

    /// Reload the signed-in user, if any, logging failures.
    async fn refresh(&self) {
        if self.current().is_none() {
            return;
        }
        if let Err(e) = self.reload().await {
            warn!("identity: reloading user failed: {}", e);
        }
    }

    async fn load_user(&self, session: &Session) -> Result<User> {
        let profile = self.backend.get_profile(&session.user_id).await?;
        let roles = self.backend.roles_for(&session.user_id).await?;
        let user = User::from_profile(&session.user_id, &session.email, profile, &roles);
        info!(
            "identity: {} signed in (admin={})",
            user.email,
            user.is_admin()
        );
        self.user_tx.send_replace(Some(user.clone()));
        self.notifier.send(BroadcastMessage::IdentityUpdated);
        Ok(user)
    }

    fn clear(&self) {
        if self.user_tx.send_replace(None).is_some() {
            info!("identity: signed out");
            self.notifier.send(BroadcastMessage::IdentityUpdated);
        }
    }

    fn report<T>(&self, result: Result<T>, context: &str) -> Result<T> {
        if let Err(e) = &result {
            self.notifier.error(format!("{context}: {e}"));
        }
        result
    }
}
