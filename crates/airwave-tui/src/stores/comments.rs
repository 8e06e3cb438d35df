use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use airwave_proto::backend::{Backend, Table};
use airwave_proto::error::{BackendError, Result};
use airwave_proto::model::{CommentWithAuthor, NewComment, User};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::notify::Notifier;
use crate::BroadcastMessage;

pub const MAX_COMMENT_LEN: usize = 1000;
pub const SIGN_IN_TO_COMMENT: &str = "Sign in to join the conversation";

/// Comments per station, newest first, with author profiles joined in.
#[derive(Clone)]
pub struct CommentsStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    user: watch::Receiver<Option<User>>,
    cache: Arc<RwLock<HashMap<String, Vec<CommentWithAuthor>>>>,
    /// Station whose thread is open; remote changes to it are refetched.
    watching: Arc<RwLock<Option<String>>>,
}

impl CommentsStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        user: watch::Receiver<Option<User>>,
    ) -> Self {
        Self {
            backend,
            notifier,
            user,
            cache: Arc::new(RwLock::new(HashMap::new())),
            watching: Arc::new(RwLock::new(None)),
        }
    }

    /// Refetch the open thread when someone else comments on it.
    pub fn spawn_sync(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut changes = self.backend.subscribe();
        tokio::spawn(async move {
            loop {
                let event = match changes.recv().await {
                    Ok(event) if event.table == Table::Comments => event,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("comments: missed {} change events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(station_id) = store.watching.read().await.clone() else {
                    continue;
                };
                if event.id.as_deref().map_or(true, |id| id == station_id) {
                    debug!("comments: {:?} on {}", event.kind, station_id);
                    let _ = store.fetch(&station_id).await;
                }
            }
        })
    }

    /// Make `station_id` the open thread and load it.
    pub async fn open(&self, station_id: &str) -> Result<()> {
        *self.watching.write().await = Some(station_id.to_string());
        self.fetch(station_id).await
    }

    pub async fn close(&self) {
        *self.watching.write().await = None;
    }

    pub async fn fetch(&self, station_id: &str) -> Result<()> {
        match self.load(station_id).await {
            Ok(comments) => {
                debug!("comments: {} for {}", comments.len(), station_id);
                self.cache
                    .write()
                    .await
                    .insert(station_id.to_string(), comments);
                self.notifier
                    .send(BroadcastMessage::CommentsUpdated(station_id.to_string()));
                Ok(())
            }
            Err(e) => {
                self.notifier.error(format!("Error loading comments: {e}"));
                Err(e)
            }
        }
    }

    async fn load(&self, station_id: &str) -> Result<Vec<CommentWithAuthor>> {
        let comments = self.backend.comments_for_station(station_id).await?;
        let author_ids: Vec<String> = comments
            .iter()
            .map(|c| c.user_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let profiles: HashMap<String, _> = if author_ids.is_empty() {
            HashMap::new()
        } else {
            self.backend
                .profiles_by_ids(&author_ids)
                .await?
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect()
        };
        Ok(comments
            .into_iter()
            .map(|comment| CommentWithAuthor {
                author: profiles.get(&comment.user_id).cloned(),
                comment,
            })
            .collect())
    }

    pub async fn comments(&self, station_id: &str) -> Vec<CommentWithAuthor> {
        self.cache
            .read()
            .await
            .get(station_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Rejected without touching the backend when signed out or blank.
    pub async fn post(&self, station_id: &str, content: &str) -> Result<()> {
        let user_id = self.user.borrow().as_ref().map(|u| u.id.clone());
        let Some(user_id) = user_id else {
            self.notifier.error(SIGN_IN_TO_COMMENT);
            return Err(BackendError::Unauthenticated);
        };
        let content = validate_comment(content)?;

        let comment = NewComment {
            station_id: station_id.to_string(),
            user_id,
            content,
        };
        if let Err(e) = self.backend.insert_comment(&comment).await {
            self.notifier.error(format!("Error posting comment: {e}"));
            return Err(e);
        }
        self.notifier.success("Comment posted");
        self.fetch(station_id).await
    }

    /// Only the author may delete a comment.
    pub async fn delete(&self, station_id: &str, comment_id: &str) -> Result<()> {
        let user_id = self
            .user
            .borrow()
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(BackendError::Unauthenticated)?;
        let owned = self
            .comments(station_id)
            .await
            .iter()
            .any(|c| c.comment.id == comment_id && c.comment.user_id == user_id);
        if !owned {
            return Err(BackendError::validation(
                "You can only delete your own comments",
            ));
        }
        if let Err(e) = self.backend.delete_comment(comment_id).await {
            self.notifier.error(format!("Error deleting comment: {e}"));
            return Err(e);
        }
        self.notifier.info("Comment deleted");
        self.fetch(station_id).await
    }

    pub fn can_delete(&self, comment: &CommentWithAuthor) -> bool {
        self.user
            .borrow()
            .as_ref()
            .is_some_and(|u| u.id == comment.comment.user_id)
    }
}

/// Trimmed content, or a validation error for blank or overlong text.
pub fn validate_comment(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(BackendError::validation("Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(BackendError::validation(format!(
            "Comments are limited to {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::{notices, notifier};
    use crate::notify::Severity;
    use crate::stores::testing::{local, CountingBackend};
    use airwave_proto::model::ProfilePatch;

    struct Fixture {
        store: CommentsStore,
        backend: Arc<CountingBackend>,
        user_tx: watch::Sender<Option<User>>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(CountingBackend::new(local(dir.path().to_path_buf())));
        let (user_tx, user_rx) = watch::channel(None);
        let store = CommentsStore::new(backend.clone(), notifier().0, user_rx);
        Fixture {
            store,
            backend,
            user_tx,
            _dir: dir,
        }
    }

    async fn sign_in(f: &Fixture, email: &str, name: Option<&str>) -> User {
        let session = f
            .backend
            .sign_up(email, "secret1", name)
            .await
            .unwrap()
            .unwrap();
        let user = User {
            id: session.user_id,
            email: email.into(),
            ..Default::default()
        };
        f.user_tx.send_replace(Some(user.clone()));
        user
    }

    #[tokio::test]
    async fn signed_out_post_makes_no_call() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(CountingBackend::new(local(dir.path().to_path_buf())));
        let (notifier, mut rx) = notifier();
        let (_tx, user_rx) = watch::channel(None);
        let store = CommentsStore::new(backend.clone(), notifier, user_rx);

        let err = store.post("s1", "great station").await.unwrap_err();
        assert!(err.is_unauthenticated());
        assert_eq!(backend.calls(), 0);
        assert_eq!(
            notices(&mut rx),
            vec![(Severity::Error, SIGN_IN_TO_COMMENT.to_string())]
        );
    }

    #[tokio::test]
    async fn blank_post_makes_no_call() {
        let f = fixture();
        sign_in(&f, "dj@example.com", None).await;
        let calls = f.backend.calls();

        let err = f.store.post("s1", "   \n ").await.unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert_eq!(f.backend.calls(), calls);
    }

    #[test]
    fn content_is_trimmed_and_capped() {
        assert_eq!(validate_comment("  hi  ").unwrap(), "hi");
        assert!(validate_comment(&"x".repeat(MAX_COMMENT_LEN)).is_ok());
        assert!(validate_comment(&"x".repeat(MAX_COMMENT_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn posts_come_back_newest_first_with_authors() {
        let f = fixture();
        let user = sign_in(&f, "dj@example.com", Some("DJ")).await;
        f.backend
            .update_profile(
                &user.id,
                &ProfilePatch {
                    country: Some("NL".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        f.store.post("s1", "first").await.unwrap();
        f.store.post("s1", "  second ").await.unwrap();

        let thread = f.store.comments("s1").await;
        let contents: Vec<&str> = thread.iter().map(|c| c.comment.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert_eq!(thread[0].author_name(), "DJ");
        assert_eq!(thread[0].author_country(), Some("NL"));
        assert!(f.store.comments("s2").await.is_empty());
    }

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let f = fixture();
        sign_in(&f, "author@example.com", None).await;
        f.store.post("s1", "mine").await.unwrap();
        let comment = f.store.comments("s1").await.remove(0);
        assert!(f.store.can_delete(&comment));

        sign_in(&f, "other@example.com", None).await;
        assert!(!f.store.can_delete(&comment));
        assert!(f.store.delete("s1", &comment.comment.id).await.is_err());
        assert_eq!(f.store.comments("s1").await.len(), 1);

        f.user_tx.send_replace(Some(User {
            id: comment.comment.user_id.clone(),
            ..Default::default()
        }));
        f.store.delete("s1", &comment.comment.id).await.unwrap();
        assert!(f.store.comments("s1").await.is_empty());
    }

    #[tokio::test]
    async fn open_thread_follows_remote_comments() {
        let f = fixture();
        let user = sign_in(&f, "dj@example.com", None).await;
        f.store.open("s2").await.unwrap();
        let task = f.store.spawn_sync();

        f.backend
            .insert_comment(&NewComment {
                station_id: "s2".into(),
                user_id: user.id,
                content: "from elsewhere".into(),
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if !f.store.comments("s2").await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        task.abort();
        assert_eq!(f.store.comments("s2").await.len(), 1);
    }
}
