//! HTTP client for the hosted backend: PostgREST tables under `/rest/v1`,
//! object storage under `/storage/v1` and the auth service under `/auth/v1`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthEvent, Backend, ChangeEvent, ChangeKind, OAuthStart, Query, Session, Table};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::model::{
    FavoriteRow, NewComment, Profile, ProfilePatch, RadioStation, Role, RoleRow, StationComment,
    StationDraft,
};

/// Refresh the access token when it expires within this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct RestBackend {
    client: Client,
    base: String,
    anon_key: String,
    redirect_url: String,
    auth_file: Option<PathBuf>,
    session: RwLock<Option<Session>>,
    changes: broadcast::Sender<ChangeEvent>,
    auth: broadcast::Sender<AuthEvent>,
}

// ── auth payloads ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            user_id: self.user.id,
            email: self.user.email.unwrap_or_default(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: expiry(self.expires_at, self.expires_in),
        }
    }
}

fn expiry(expires_at: Option<i64>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_at
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .or_else(|| expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)))
}

#[derive(Debug, Deserialize)]
struct StationFingerprint {
    id: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct StationIdRow {
    station_id: String,
}

#[derive(Debug, Deserialize)]
struct RoleOnlyRow {
    role: Role,
}

#[derive(Debug, Deserialize)]
struct UserIdRow {
    user_id: String,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Moderator => "moderator",
        Role::User => "user",
    }
}

/// Turn a non-2xx response into a [`BackendError`], pulling the message out of
/// whichever field the service used.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or(body);
    Err(BackendError::from_status(status.as_u16(), message))
}

fn first<T>(rows: Vec<T>, what: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(what.to_string()))
}

impl RestBackend {
    pub fn new(config: &BackendConfig, auth_file: Option<PathBuf>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let (changes, _) = broadcast::channel(256);
        let (auth, _) = broadcast::channel(16);
        Ok(Self {
            client,
            base: config.url.trim().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            redirect_url: config.redirect_url.clone(),
            auth_file,
            session: RwLock::new(None),
            changes,
            auth,
        })
    }

    fn rest_url(&self, query: &Query) -> String {
        format!("{}/rest/v1/{}", self.base, query.table_name())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base, path)
    }

    /// Access token of the current session, refreshed when close to expiry;
    /// the anon key when signed out.
    async fn bearer(&self) -> String {
        let current = self.session.read().await.clone();
        match current {
            Some(s) if s.expires_within(REFRESH_MARGIN_SECS) => match self.refresh(&s).await {
                Ok(fresh) => fresh.access_token,
                Err(e) => {
                    warn!("Token refresh failed, signing out: {}", e);
                    self.drop_session().await;
                    self.anon_key.clone()
                }
            },
            Some(s) => s.access_token,
            None => self.anon_key.clone(),
        }
    }

    async fn request(&self, method: Method, url: String) -> RequestBuilder {
        let token = self.bearer().await;
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn select<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>> {
        let resp = self
            .request(Method::GET, self.rest_url(&query))
            .await
            .query(query.params())
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn insert<B, T>(&self, query: Query, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .request(Method::POST, self.rest_url(&query))
            .await
            .query(query.params())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn update<B, T>(&self, query: Query, body: &B) -> Result<Vec<T>>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let resp = self
            .request(Method::PATCH, self.rest_url(&query))
            .await
            .query(query.params())
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn delete(&self, query: Query) -> Result<()> {
        let resp = self
            .request(Method::DELETE, self.rest_url(&query))
            .await
            .query(query.params())
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// DELETE that returns the removed rows.
    async fn delete_returning<T: DeserializeOwned>(&self, query: Query) -> Result<Vec<T>> {
        let resp = self
            .request(Method::DELETE, self.rest_url(&query))
            .await
            .query(query.params())
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    fn emit(&self, table: Table, kind: ChangeKind, id: &str) {
        let _ = self.changes.send(ChangeEvent::new(table, kind, id));
    }

    // ── session handling ─────────────────────────────────────────────────────

    async fn token_request(&self, grant_type: &str, body: serde_json::Value) -> Result<Session> {
        let resp = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(resp).await?.json().await?;
        Ok(token.into_session())
    }

    async fn refresh(&self, stale: &Session) -> Result<Session> {
        debug!("Refreshing access token for {}", stale.email);
        let fresh = self
            .token_request(
                "refresh_token",
                serde_json::json!({ "refresh_token": stale.refresh_token }),
            )
            .await?;
        self.store_session(fresh.clone()).await;
        let _ = self.auth.send(AuthEvent::TokenRefreshed(fresh.clone()));
        Ok(fresh)
    }

    async fn store_session(&self, session: Session) {
        *self.session.write().await = Some(session.clone());
        let Some(path) = &self.auth_file else { return };
        let result = async {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(&session)?;
            tokio::fs::write(path, json).await?;
            Ok::<_, BackendError>(())
        }
        .await;
        if let Err(e) = result {
            warn!("Failed to persist session to {}: {}", path.display(), e);
        }
    }

    async fn drop_session(&self) {
        self.session.write().await.take();
        if let Some(path) = &self.auth_file {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
        let _ = self.auth.send(AuthEvent::SignedOut);
    }

    async fn signed_in(&self, session: Session) -> Session {
        info!("Signed in as {}", session.email);
        self.store_session(session.clone()).await;
        let _ = self.auth.send(AuthEvent::SignedIn(session.clone()));
        session
    }

    // ── change notification ──────────────────────────────────────────────────

    async fn station_fingerprints(&self) -> Result<HashMap<String, Option<DateTime<Utc>>>> {
        let rows: Vec<StationFingerprint> = self
            .select(Query::table(Table::Stations).select("id,updated_at"))
            .await?;
        Ok(rows.into_iter().map(|r| (r.id, r.updated_at)).collect())
    }

    /// Poll the stations table every `every` and emit change events for rows
    /// that appeared, disappeared or changed `updated_at`. The task ends when
    /// the backend is dropped.
    pub fn start_change_watcher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let mut known: Option<HashMap<String, Option<DateTime<Utc>>>> = None;
            loop {
                ticker.tick().await;
                let Some(backend) = weak.upgrade() else { break };
                let current = match backend.station_fingerprints().await {
                    Ok(c) => c,
                    Err(e) => {
                        debug!("Change poll failed: {}", e);
                        continue;
                    }
                };
                if let Some(previous) = &known {
                    for event in diff_fingerprints(previous, &current) {
                        debug!("Change detected: {:?}", event);
                        let _ = backend.changes.send(event);
                    }
                }
                known = Some(current);
            }
        })
    }
}

fn diff_fingerprints(
    previous: &HashMap<String, Option<DateTime<Utc>>>,
    current: &HashMap<String, Option<DateTime<Utc>>>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (id, stamp) in current {
        match previous.get(id) {
            None => events.push(ChangeEvent::new(Table::Stations, ChangeKind::Insert, id)),
            Some(old) if old != stamp => {
                events.push(ChangeEvent::new(Table::Stations, ChangeKind::Update, id))
            }
            Some(_) => {}
        }
    }
    for id in previous.keys().filter(|id| !current.contains_key(*id)) {
        events.push(ChangeEvent::new(Table::Stations, ChangeKind::Delete, id));
    }
    events
}

/// Tokens from an OAuth redirect. The auth service puts them in the fragment;
/// some flows use the query string.
fn oauth_tokens(callback_url: &str) -> Result<(String, String, Option<DateTime<Utc>>)> {
    let url = Url::parse(callback_url.trim())
        .map_err(|e| BackendError::validation(format!("Invalid callback URL: {e}")))?;
    let pairs_from = |raw: &str| -> HashMap<String, String> {
        Url::parse(&format!("http://callback.invalid/?{raw}"))
            .map(|u| u.query_pairs().into_owned().collect())
            .unwrap_or_default()
    };
    let mut pairs = pairs_from(url.fragment().unwrap_or_default());
    if !pairs.contains_key("access_token") {
        pairs = pairs_from(url.query().unwrap_or_default());
    }
    if let Some(err) = pairs.get("error_description").or_else(|| pairs.get("error")) {
        return Err(BackendError::validation(err.clone()));
    }
    let access = pairs
        .get("access_token")
        .cloned()
        .ok_or_else(|| BackendError::validation("Callback URL has no access token"))?;
    let refresh = pairs.get("refresh_token").cloned().unwrap_or_default();
    let parse = |k: &str| pairs.get(k).and_then(|v| v.parse::<i64>().ok());
    Ok((access, refresh, expiry(parse("expires_at"), parse("expires_in"))))
}

#[async_trait]
impl Backend for RestBackend {
    async fn list_stations(&self) -> Result<Vec<RadioStation>> {
        let mut stations: Vec<RadioStation> = self
            .select(Query::table(Table::Stations).select("*").order("name", true))
            .await?;
        // The database orders by collation; keep the client order stable.
        stations.sort_by_key(|s| s.name.to_lowercase());
        Ok(stations)
    }

    async fn insert_station(&self, draft: &StationDraft) -> Result<RadioStation> {
        let rows = self.insert(Query::table(Table::Stations), draft).await?;
        let station: RadioStation = first(rows, "inserted station")?;
        self.emit(Table::Stations, ChangeKind::Insert, &station.id);
        Ok(station)
    }

    async fn update_station(&self, id: &str, draft: &StationDraft) -> Result<RadioStation> {
        let mut draft = draft.clone();
        draft.updated_at.get_or_insert_with(Utc::now);
        let rows = self
            .update(Query::table(Table::Stations).eq("id", id), &draft)
            .await?;
        let station: RadioStation = first(rows, &format!("station {id}"))?;
        self.emit(Table::Stations, ChangeKind::Update, id);
        Ok(station)
    }

    async fn delete_station(&self, id: &str) -> Result<()> {
        self.delete(Query::table(Table::Stations).eq("id", id)).await?;
        self.emit(Table::Stations, ChangeKind::Delete, id);
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.select(Query::table(Table::Profiles).select("*").order("name", true))
            .await
    }

    async fn profiles_by_ids(&self, ids: &[String]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(Query::table(Table::Profiles).select("*").in_list("id", ids))
            .await
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let rows: Vec<Profile> = self
            .select(
                Query::table(Table::Profiles)
                    .select("*")
                    .eq("id", user_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> Result<Profile> {
        let mut patch = patch.clone();
        patch.updated_at.get_or_insert_with(Utc::now);
        let rows = self
            .update(Query::table(Table::Profiles).eq("id", user_id), &patch)
            .await?;
        let profile = first(rows, &format!("profile {user_id}"))?;
        self.emit(Table::Profiles, ChangeKind::Update, user_id);
        Ok(profile)
    }

    async fn roles_for(&self, user_id: &str) -> Result<Vec<Role>> {
        let rows: Vec<RoleOnlyRow> = self
            .select(
                Query::table(Table::UserRoles)
                    .select("role")
                    .eq("user_id", user_id),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }

    async fn admin_user_ids(&self) -> Result<Vec<String>> {
        let rows: Vec<UserIdRow> = self
            .select(
                Query::table(Table::UserRoles)
                    .select("user_id")
                    .eq("role", role_name(Role::Admin)),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }

    async fn grant_role(&self, user_id: &str, role: Role) -> Result<()> {
        let row = RoleRow {
            user_id: user_id.to_string(),
            role,
        };
        let _: Vec<serde_json::Value> = self.insert(Query::table(Table::UserRoles), &row).await?;
        self.emit(Table::UserRoles, ChangeKind::Insert, user_id);
        Ok(())
    }

    async fn revoke_role(&self, user_id: &str, role: Role) -> Result<()> {
        self.delete(
            Query::table(Table::UserRoles)
                .eq("user_id", user_id)
                .eq("role", role_name(role)),
        )
        .await?;
        self.emit(Table::UserRoles, ChangeKind::Delete, user_id);
        Ok(())
    }

    async fn favorite_station_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let rows: Vec<StationIdRow> = self
            .select(
                Query::table(Table::Favorites)
                    .select("station_id")
                    .eq("user_id", user_id),
            )
            .await?;
        Ok(rows.into_iter().map(|r| r.station_id).collect())
    }

    async fn add_favorite(&self, user_id: &str, station_id: &str) -> Result<()> {
        let row = FavoriteRow {
            user_id: user_id.to_string(),
            station_id: station_id.to_string(),
        };
        let _: Vec<serde_json::Value> = self.insert(Query::table(Table::Favorites), &row).await?;
        self.emit(Table::Favorites, ChangeKind::Insert, station_id);
        Ok(())
    }

    async fn remove_favorite(&self, user_id: &str, station_id: &str) -> Result<()> {
        self.delete(
            Query::table(Table::Favorites)
                .eq("user_id", user_id)
                .eq("station_id", station_id),
        )
        .await?;
        self.emit(Table::Favorites, ChangeKind::Delete, station_id);
        Ok(())
    }

    async fn comments_for_station(&self, station_id: &str) -> Result<Vec<StationComment>> {
        self.select(
            Query::table(Table::Comments)
                .select("*")
                .eq("station_id", station_id)
                .order("created_at", false),
        )
        .await
    }

    async fn insert_comment(&self, comment: &NewComment) -> Result<StationComment> {
        let rows = self.insert(Query::table(Table::Comments), comment).await?;
        let row: StationComment = first(rows, "inserted comment")?;
        self.emit(Table::Comments, ChangeKind::Insert, &row.station_id);
        Ok(row)
    }

    async fn delete_comment(&self, comment_id: &str) -> Result<()> {
        let rows = self
            .delete_returning(Query::table(Table::Comments).eq("id", comment_id))
            .await?;
        // comment events carry the station id
        let row: StationComment = first(rows, "deleted comment")?;
        self.emit(Table::Comments, ChangeKind::Delete, &row.station_id);
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base, bucket, path);
        let resp = self
            .request(Method::POST, url)
            .await
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        Ok(self.public_url(bucket, path))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base, bucket, path)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .token_request(
                "password",
                serde_json::json!({ "email": email.trim(), "password": password }),
            )
            .await?;
        Ok(self.signed_in(session).await)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Option<Session>> {
        let mut body = serde_json::json!({ "email": email.trim(), "password": password });
        if let Some(name) = name {
            body["data"] = serde_json::json!({ "name": name });
        }
        let resp = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = check(resp).await?.json().await?;
        if value.get("access_token").is_none() {
            info!("Sign-up for {} awaits email confirmation", email.trim());
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(value)?;
        Ok(Some(self.signed_in(token.into_session()).await))
    }

    async fn sign_in_with_oauth(&self, provider: &str) -> Result<OAuthStart> {
        let mut url = Url::parse(&self.auth_url("authorize"))
            .map_err(|e| BackendError::validation(format!("Invalid backend URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", &self.redirect_url);
        Ok(OAuthStart::Redirect(url.to_string()))
    }

    async fn complete_oauth(&self, callback_url: &str) -> Result<Session> {
        let (access_token, refresh_token, expires_at) = oauth_tokens(callback_url)?;
        let resp = self
            .client
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&access_token)
            .send()
            .await?;
        let user: AuthUser = check(resp).await?.json().await?;
        let session = Session {
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            access_token,
            refresh_token,
            expires_at,
        };
        Ok(self.signed_in(session).await)
    }

    async fn sign_out(&self) -> Result<()> {
        let current = self.session.read().await.clone();
        // Local state goes first; a failed logout call only leaves a token
        // the service will expire on its own.
        self.drop_session().await;
        if let Some(session) = current {
            let resp = self
                .client
                .post(self.auth_url("logout"))
                .header("apikey", &self.anon_key)
                .bearer_auth(&session.access_token)
                .send()
                .await?;
            check(resp).await?;
        }
        Ok(())
    }

    async fn restore_session(&self) -> Result<Option<Session>> {
        let Some(path) = &self.auth_file else {
            return Ok(None);
        };
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let saved: Session = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        let session = if saved.expires_within(REFRESH_MARGIN_SECS) {
            match self.refresh(&saved).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("Stored session could not be refreshed: {}", e);
                    self.drop_session().await;
                    return Ok(None);
                }
            }
        } else {
            *self.session.write().await = Some(saved.clone());
            saved
        };
        info!("Restored session for {}", session.email);
        let _ = self.auth.send(AuthEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
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

    #[test]
    fn fingerprint_diff_reports_each_kind() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let previous: HashMap<_, _> = [("a".to_string(), Some(t0)), ("b".to_string(), None)]
            .into_iter()
            .collect();
        let current: HashMap<_, _> = [("a".to_string(), Some(t1)), ("c".to_string(), None)]
            .into_iter()
            .collect();
        let mut events: Vec<(ChangeKind, String)> = diff_fingerprints(&previous, &current)
            .into_iter()
            .map(|e| (e.kind, e.id.unwrap()))
            .collect();
        events.sort_by(|x, y| x.1.cmp(&y.1));
        assert_eq!(
            events,
            vec![
                (ChangeKind::Update, "a".to_string()),
                (ChangeKind::Delete, "b".to_string()),
                (ChangeKind::Insert, "c".to_string()),
            ]
        );
        assert!(diff_fingerprints(&current, &current).is_empty());
    }

    #[test]
    fn oauth_tokens_from_fragment() {
        let (access, refresh, expires) = oauth_tokens(
            "http://localhost:3000/#access_token=abc&refresh_token=def&expires_in=3600&token_type=bearer",
        )
        .unwrap();
        assert_eq!(access, "abc");
        assert_eq!(refresh, "def");
        assert!(expires.is_some());
    }

    #[test]
    fn oauth_errors_are_reported() {
        let err = oauth_tokens("http://localhost:3000/?error=access_denied&error_description=Denied")
            .unwrap_err();
        assert_eq!(err.to_string(), "Denied");
        assert!(oauth_tokens("not a url").is_err());
        assert!(oauth_tokens("http://localhost:3000/").is_err());
    }

    #[tokio::test]
    async fn oauth_start_builds_authorize_url() {
        let backend = RestBackend::new(
            &BackendConfig {
                url: "https://api.example.test/".into(),
                ..BackendConfig::default()
            },
            None,
        )
        .unwrap();
        let OAuthStart::Redirect(url) = backend.sign_in_with_oauth("google").await.unwrap() else {
            panic!("expected redirect");
        };
        assert!(url.starts_with("https://api.example.test/auth/v1/authorize?provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A3000%2F"));
        assert_eq!(
            backend.public_url("avatars", "u/x.png"),
            "https://api.example.test/storage/v1/object/public/avatars/u/x.png"
        );
    }
}
