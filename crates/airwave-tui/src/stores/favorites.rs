use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use airwave_proto::backend::Backend;
use airwave_proto::error::{BackendError, Result};
use airwave_proto::model::{RadioStation, User};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::Notifier;
use crate::BroadcastMessage;

pub const SIGN_IN_REQUIRED: &str = "You must be signed in to add favorites";

#[derive(Debug, Default)]
struct FavoritesState {
    user_id: Option<String>,
    ids: BTreeSet<String>,
    /// Set while the user's favorites are being fetched.
    loading: bool,
    /// Toggles made during that fetch, replayed over its result.
    pending: BTreeMap<String, bool>,
}

impl FavoritesState {
    fn apply_fetched(&mut self, fetched: Vec<String>) {
        self.ids = fetched.into_iter().collect();
        for (station_id, favorite) in std::mem::take(&mut self.pending) {
            if favorite {
                self.ids.insert(station_id);
            } else {
                self.ids.remove(&station_id);
            }
        }
        self.loading = false;
    }
}

/// Favorited station ids of the signed-in user.
#[derive(Clone)]
pub struct FavoritesStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    state: Arc<RwLock<FavoritesState>>,
}

impl FavoritesStore {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            state: Arc::new(RwLock::new(FavoritesState::default())),
        }
    }

    /// Follow the signed-in user.
    pub fn spawn_sync(&self, mut user_rx: watch::Receiver<Option<User>>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                let user_id = user_rx.borrow_and_update().as_ref().map(|u| u.id.clone());
                store.set_user(user_id).await;
                if user_rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Switch to `user_id`. The old set is dropped before anything is
    /// fetched, so a sign-out never shows stale favorites.
    pub async fn set_user(&self, user_id: Option<String>) {
        {
            let mut state = self.state.write().await;
            if state.user_id == user_id {
                return;
            }
            state.user_id = user_id.clone();
            state.ids.clear();
            state.pending.clear();
            state.loading = user_id.is_some();
        }
        self.notifier.send(BroadcastMessage::FavoritesUpdated);

        let Some(user_id) = user_id else {
            return;
        };
        match self.backend.favorite_station_ids(&user_id).await {
            Ok(ids) => {
                let mut state = self.state.write().await;
                // the user may have changed while we were fetching
                if state.user_id.as_deref() == Some(user_id.as_str()) {
                    debug!("favorites: {} for {}", ids.len(), user_id);
                    state.apply_fetched(ids);
                    drop(state);
                    self.notifier.send(BroadcastMessage::FavoritesUpdated);
                }
            }
            Err(e) => {
                {
                    let mut state = self.state.write().await;
                    if state.user_id.as_deref() == Some(user_id.as_str()) {
                        state.loading = false;
                        state.pending.clear();
                    }
                }
                warn!("favorites: fetch failed: {}", e);
                self.notifier.error(format!("Error loading favorites: {e}"));
            }
        }
    }

    /// Flip `station_id` and return whether it is now a favorite. The local
    /// set changes first and is not rolled back when the backend fails.
    pub async fn toggle(&self, station_id: &str) -> Result<bool> {
        let (user_id, now_favorite) = {
            let mut state = self.state.write().await;
            let Some(user_id) = state.user_id.clone() else {
                drop(state);
                self.notifier.error(SIGN_IN_REQUIRED);
                return Err(BackendError::Unauthenticated);
            };
            let now_favorite = if state.ids.remove(station_id) {
                false
            } else {
                state.ids.insert(station_id.to_string());
                true
            };
            if state.loading {
                state.pending.insert(station_id.to_string(), now_favorite);
            }
            (user_id, now_favorite)
        };
        self.notifier.send(BroadcastMessage::FavoritesUpdated);

        let result = if now_favorite {
            self.backend.add_favorite(&user_id, station_id).await
        } else {
            self.backend.remove_favorite(&user_id, station_id).await
        };
        match result {
            Ok(()) => {
                if now_favorite {
                    self.notifier.success("Added to favorites");
                } else {
                    self.notifier.info("Removed from favorites");
                }
                Ok(now_favorite)
            }
            Err(e) => {
                self.notifier.error(format!("Error updating favorites: {e}"));
                Err(e)
            }
        }
    }

    pub async fn is_favorite(&self, station_id: &str) -> bool {
        self.state.read().await.ids.contains(station_id)
    }

    pub async fn ids(&self) -> BTreeSet<String> {
        self.state.read().await.ids.clone()
    }
}

/// Favorited stations in catalog order; ids missing from the catalog are
/// dropped.
pub fn favorite_stations<'a>(
    ids: &BTreeSet<String>,
    catalog: &'a [RadioStation],
) -> Vec<&'a RadioStation> {
    catalog.iter().filter(|s| ids.contains(&s.id)).collect()
}
