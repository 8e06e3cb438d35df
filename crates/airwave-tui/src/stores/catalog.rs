use std::collections::BTreeSet;
use std::sync::Arc;

use airwave_proto::backend::{Backend, Table};
use airwave_proto::error::Result;
use airwave_proto::model::RadioStation;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::Notifier;
use crate::BroadcastMessage;

pub const RELATED_LIMIT: usize = 5;

/// Category selection on the discover page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    pub fn matches(&self, station: &RadioStation) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Named(c) => station.has_category(c),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryFilter::All => "All",
            CategoryFilter::Named(c) => c,
        }
    }
}

/// The station catalog, kept in sync with the backend.
#[derive(Clone)]
pub struct CatalogStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    stations: Arc<RwLock<Vec<RadioStation>>>,
    /// Held from fetch to write so an older listing never lands last.
    loading: Arc<Mutex<()>>,
}

impl CatalogStore {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            stations: Arc::new(RwLock::new(Vec::new())),
            loading: Arc::new(Mutex::new(())),
        }
    }

    /// Refetch everything. On failure the previous list stays.
    ///
    /// Overlapping calls run one after another; each fetch starts after the
    /// previous one has been stored.
    pub async fn load(&self) -> Result<()> {
        let _loading = self.loading.lock().await;
        match self.backend.list_stations().await {
            Ok(mut stations) => {
                stations.sort_by_key(|s| s.name.to_lowercase());
                info!("catalog: {} stations", stations.len());
                *self.stations.write().await = stations;
                self.notifier.send(BroadcastMessage::CatalogUpdated);
                Ok(())
            }
            Err(e) => {
                self.notifier.error(format!("Error loading stations: {e}"));
                Err(e)
            }
        }
    }

    /// Refetch whenever the stations table changes.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut changes = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) if event.table == Table::Stations => {
                        debug!("catalog: {:?} {:?}", event.kind, event.id);
                        let _ = store.load().await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("catalog: missed {} change events, reloading", n);
                        let _ = store.load().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn all(&self) -> Vec<RadioStation> {
        self.stations.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<RadioStation> {
        self.stations.read().await.iter().find(|s| s.id == id).cloned()
    }
}

// ── queries ───────────────────────────────────────────────────────────────────

/// Stations matching both the text query and the category filter.
pub fn search<'a>(
    stations: &'a [RadioStation],
    query: &str,
    category: &CategoryFilter,
) -> Vec<&'a RadioStation> {
    stations
        .iter()
        .filter(|s| category.matches(s) && s.matches_query(query))
        .collect()
}

/// `(featured, regular)` for the home page.
pub fn split_featured(stations: &[RadioStation]) -> (Vec<&RadioStation>, Vec<&RadioStation>) {
    stations.iter().partition(|s| s.is_featured)
}

/// Up to [`RELATED_LIMIT`] other stations sharing a category with `station`.
pub fn related<'a>(stations: &'a [RadioStation], station: &RadioStation) -> Vec<&'a RadioStation> {
    stations
        .iter()
        .filter(|s| s.id != station.id && s.shares_category_with(station))
        .take(RELATED_LIMIT)
        .collect()
}

/// Every category in use, deduplicated and sorted.
pub fn categories(stations: &[RadioStation]) -> Vec<String> {
    stations
        .iter()
        .flat_map(|s| s.category.iter())
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{drain, notifier};
    use crate::stores::testing::{local, sample_stations, station, CountingBackend};
    use std::time::Duration;
    use airwave_proto::model::StationDraft;

    #[test]
    fn search_combines_text_and_category() {
        let stations = sample_stations();
        let jazz = CategoryFilter::Named("jazz".into());

        let ids = |v: Vec<&RadioStation>| v.iter().map(|s| s.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(search(&stations, "", &jazz)), vec!["s1", "s2"]);
        assert_eq!(ids(search(&stations, "blues", &jazz)), vec!["s2"]);
        assert_eq!(ids(search(&stations, "grooves", &CategoryFilter::All)), vec!["s3"]);
        assert_eq!(search(&stations, "", &CategoryFilter::All).len(), 4);
        assert!(search(&stations, "metal", &CategoryFilter::All).is_empty());
    }

    #[test]
    fn featured_split() {
        let stations = sample_stations();
        let (featured, regular) = split_featured(&stations);
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].id, "s3");
        assert_eq!(regular.len(), 3);
    }

    #[test]
    fn related_excludes_self_and_caps() {
        let mut stations: Vec<RadioStation> = (0..8)
            .map(|i| station(&format!("j{i}"), &format!("Jazz {i}"), &["Jazz"]))
            .collect();
        stations.push(station("r", "Rock", &["Rock"]));
        let me = stations[0].clone();

        let rel = related(&stations, &me);
        assert_eq!(rel.len(), RELATED_LIMIT);
        assert!(rel.iter().all(|s| s.id != me.id && s.id != "r"));
    }

    #[test]
    fn categories_are_flat_sorted_unique() {
        let mut stations = sample_stations();
        stations.push(station("x", "X", &[" ", "Jazz"]));
        assert_eq!(
            categories(&stations),
            vec!["Ambient", "Blues", "Electronic", "Jazz", "News"]
        );
    }

    #[tokio::test]
    async fn load_sorts_and_broadcasts() {
        let dir = tempfile::tempdir().unwrap();
        let (notifier, mut rx) = notifier();
        let store = CatalogStore::new(local(dir.path().to_path_buf()), notifier);
        store.load().await.unwrap();

        let names: Vec<String> = store.all().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Blues Hour", "Groove Salad", "Jazz FM", "News 24"]);
        assert!(drain(&mut rx)
            .iter()
            .any(|m| matches!(m, BroadcastMessage::CatalogUpdated)));
        assert_eq!(store.get("s4").await.map(|s| s.name), Some("News 24".into()));
    }

    #[tokio::test]
    async fn sync_refetches_on_station_changes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = local(dir.path().to_path_buf());
        let (notifier, _rx) = notifier();
        let store = CatalogStore::new(backend.clone(), notifier);
        store.load().await.unwrap();
        let task = store.spawn_sync();

        backend
            .insert_station(&StationDraft {
                name: "Ambient Dreams".into(),
                stream_url: "http://stream.example/ad".into(),
                category: vec!["Ambient".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let mut found = false;
        for _ in 0..50 {
            if store.all().await.iter().any(|s| s.name == "Ambient Dreams") {
                found = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        task.abort();
        assert!(found);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_earlier_load_does_not_overwrite_newer_one() {
        let dir = tempfile::tempdir().unwrap();
        let backend = local(dir.path().to_path_buf());
        let slow_first = CountingBackend::new(backend.clone())
            .with_list_delays([Duration::from_millis(50), Duration::ZERO]);
        let (notifier, _rx) = notifier();
        let store = CatalogStore::new(Arc::new(slow_first), notifier);

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.load().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        backend
            .insert_station(&StationDraft {
                name: "Ambient Dreams".into(),
                stream_url: "http://stream.example/ad".into(),
                category: vec!["Ambient".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        store.load().await.unwrap();
        first.await.unwrap().unwrap();

        let all = store.all().await;
        assert_eq!(all.len(), 5);
        assert!(all.iter().any(|s| s.name == "Ambient Dreams"));
    }
}
