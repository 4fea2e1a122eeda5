//! Client-side comment cache with optimistic mutations.
//!
//! Each paginated comment list is keyed by its target video plus an optional
//! parent comment (top-level list vs. one replies list). A mutation runs the
//! same sequence every time: cancel any in-flight refetch for the key, take
//! a snapshot, apply the optimistic write synchronously, then issue the
//! server mutation and either reconcile the server row in place or restore
//! the snapshot. Fetches are two-phase (`begin_*` / `complete_fetch`) so a
//! response that raced an optimistic write can be told apart by its epoch
//! and dropped instead of clobbering the newer cache state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::{CommentAuthor, CommentCursor, CommentPage, CommentView};

/// Identity of one paginated comment list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub video_id: Uuid,
    pub parent_id: Option<Uuid>,
}

impl ListKey {
    pub fn top_level(video_id: Uuid) -> Self {
        Self {
            video_id,
            parent_id: None,
        }
    }

    pub fn replies(video_id: Uuid, parent_id: Uuid) -> Self {
        Self {
            video_id,
            parent_id: Some(parent_id),
        }
    }
}

/// Cache entry identifier. Temporary ids are minted locally and share no
/// format guarantees with server ids, so the two are distinct variants
/// rather than one string compared by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryId {
    Temp(Uuid),
    Server(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CachedComment {
    pub id: EntryId,
    pub parent_id: Option<Uuid>,
    pub author: CommentAuthor,
    pub body: String,
    pub like_count: i64,
    pub viewer_liked: bool,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<CommentView> for CachedComment {
    fn from(view: CommentView) -> Self {
        Self {
            id: EntryId::Server(view.id),
            parent_id: view.parent_id,
            author: view.author,
            body: view.body,
            like_count: view.like_count,
            viewer_liked: view.viewer_liked,
            reply_count: view.reply_count,
            created_at: view.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CachedPage {
    pub comments: Vec<CachedComment>,
    pub next_cursor: Option<CommentCursor>,
}

/// One list's cached value. `fetch_epoch` counts cancellations: every
/// optimistic write bumps it, and a fetch completion carrying an older epoch
/// is stale and gets dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentList {
    pub pages: Vec<CachedPage>,
    pub comment_count: Option<i64>,
    stale: bool,
    fetch_epoch: u64,
}

/// Errors reported by the transport collaborator. `Unauthorized` is kept
/// separate so only genuine authentication failures route to the sign-in
/// flow; everything else is a generic mutation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, PartialEq, Error)]
pub enum CommentError {
    #[error("sign-in required")]
    AuthenticationRequired,
    #[error("mutation failed: {0}")]
    MutationFailed(ApiError),
    #[error("fetch failed: {0}")]
    FetchFailed(ApiError),
    /// The server confirmed a comment whose optimistic entry was no longer in
    /// the cache. The list has already been invalidated for a full refetch.
    #[error("optimistic entry lost before reconciliation")]
    ReconciliationMismatch,
}

/// The server endpoints the cache mutates and queries through.
pub trait CommentsApi {
    fn create_comment(
        &self,
        video_id: Uuid,
        parent_id: Option<Uuid>,
        body: &str,
    ) -> impl std::future::Future<Output = Result<CommentView, ApiError>>;

    fn like_comment(&self, comment_id: Uuid)
        -> impl std::future::Future<Output = Result<(), ApiError>>;

    fn unlike_comment(
        &self,
        comment_id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), ApiError>>;

    fn fetch_page(
        &self,
        key: ListKey,
        cursor: Option<CommentCursor>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<CommentPage, ApiError>>;
}

/// Authentication collaborator: current sign-in state plus the side-effecting
/// sign-in flow trigger.
pub trait AuthGateway {
    fn is_signed_in(&self) -> bool;
    fn viewer_profile(&self) -> Option<CommentAuthor>;
    fn open_sign_in(&self);
}

/// Handle for an in-flight fetch. Completion is only applied if no optimistic
/// write bumped the list's epoch in the meantime.
#[derive(Debug)]
pub struct FetchTicket {
    key: ListKey,
    epoch: u64,
    cursor: Option<CommentCursor>,
}

/// Handle for an in-flight create, carrying the rollback snapshot and the
/// temporary id to reconcile against.
#[derive(Debug)]
pub struct CreateTicket {
    key: ListKey,
    temp_id: Uuid,
    snapshot: CommentList,
}

pub struct CommentSession<A, G> {
    api: A,
    auth: G,
    page_size: usize,
    lists: HashMap<ListKey, CommentList>,
}

impl<A: CommentsApi, G: AuthGateway> CommentSession<A, G> {
    pub fn new(api: A, auth: G, page_size: usize) -> Self {
        Self {
            api,
            auth,
            page_size,
            lists: HashMap::new(),
        }
    }

    pub fn list(&self, key: ListKey) -> Option<&CommentList> {
        self.lists.get(&key)
    }

    /// All cached comments for a list, first page first.
    pub fn comments(&self, key: ListKey) -> Vec<&CachedComment> {
        self.lists
            .get(&key)
            .map(|list| list.pages.iter().flat_map(|p| p.comments.iter()).collect())
            .unwrap_or_default()
    }

    pub fn comment_count(&self, key: ListKey) -> Option<i64> {
        self.lists.get(&key).and_then(|l| l.comment_count)
    }

    /// True when the list should be refetched to converge to server truth.
    pub fn is_stale(&self, key: ListKey) -> bool {
        self.lists.get(&key).map(|l| l.stale).unwrap_or(true)
    }

    // --- fetching ------------------------------------------------------

    /// Starts a refresh of the list's first page.
    pub fn begin_refresh(&mut self, key: ListKey) -> FetchTicket {
        let list = self.lists.entry(key).or_default();
        FetchTicket {
            key,
            epoch: list.fetch_epoch,
            cursor: None,
        }
    }

    /// Starts a fetch of the next page, or returns None when the list is
    /// fully loaded.
    pub fn begin_next_page(&mut self, key: ListKey) -> Option<FetchTicket> {
        let list = self.lists.entry(key).or_default();
        if list.pages.is_empty() {
            return Some(FetchTicket {
                key,
                epoch: list.fetch_epoch,
                cursor: None,
            });
        }
        let cursor = list.pages.last()?.next_cursor?;
        Some(FetchTicket {
            key,
            epoch: list.fetch_epoch,
            cursor: Some(cursor),
        })
    }

    /// Applies a fetched page. Returns false when the response was stale (an
    /// optimistic write cancelled it) and has been dropped.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, page: CommentPage) -> bool {
        let list = self.lists.entry(ticket.key).or_default();
        if list.fetch_epoch != ticket.epoch {
            return false;
        }

        let cached = CachedPage {
            comments: page.comments.into_iter().map(CachedComment::from).collect(),
            next_cursor: page.next_cursor,
        };

        if ticket.cursor.is_none() {
            list.pages = vec![cached];
            list.comment_count = page.comment_count;
        } else {
            list.pages.push(cached);
        }
        list.stale = false;
        true
    }

    pub async fn refresh(&mut self, key: ListKey) -> Result<(), CommentError> {
        let ticket = self.begin_refresh(key);
        let page = self
            .api
            .fetch_page(key, None, self.page_size)
            .await
            .map_err(CommentError::FetchFailed)?;
        self.complete_fetch(ticket, page);
        Ok(())
    }

    pub async fn load_next_page(&mut self, key: ListKey) -> Result<(), CommentError> {
        let Some(ticket) = self.begin_next_page(key) else {
            return Ok(());
        };
        let page = self
            .api
            .fetch_page(key, ticket.cursor, self.page_size)
            .await
            .map_err(CommentError::FetchFailed)?;
        self.complete_fetch(ticket, page);
        Ok(())
    }

    // --- create --------------------------------------------------------

    /// Applies the optimistic entry for a new comment. Fails before touching
    /// the cache when the viewer is not signed in.
    pub fn begin_create(&mut self, key: ListKey, body: &str) -> Result<CreateTicket, CommentError> {
        if !self.auth.is_signed_in() {
            self.auth.open_sign_in();
            return Err(CommentError::AuthenticationRequired);
        }
        let author = self.auth.viewer_profile().unwrap_or(CommentAuthor {
            id: Uuid::nil(),
            name: "You".to_string(),
            image_url: None,
        });

        let list = self.lists.entry(key).or_default();
        // Cancel any in-flight refetch so a stale response cannot overwrite
        // the optimistic entry.
        list.fetch_epoch += 1;
        let snapshot = list.clone();

        let temp_id = Uuid::new_v4();
        let optimistic = CachedComment {
            id: EntryId::Temp(temp_id),
            parent_id: key.parent_id,
            author,
            body: body.to_string(),
            like_count: 0,
            viewer_liked: false,
            reply_count: 0,
            created_at: Utc::now(),
        };

        if list.pages.is_empty() {
            list.pages.push(CachedPage::default());
        }
        let first = &mut list.pages[0];
        first.comments.insert(0, optimistic);
        first.comments.truncate(self.page_size);
        list.comment_count = Some(list.comment_count.unwrap_or(0) + 1);

        Ok(CreateTicket {
            key,
            temp_id,
            snapshot,
        })
    }

    /// Settles a create: replaces the temporary entry with the server row, or
    /// rolls the list back to its snapshot. The list is marked stale either
    /// way, and a reply create also marks the parent's top-level list stale
    /// since its denormalized reply counts just changed.
    pub fn complete_create(
        &mut self,
        ticket: CreateTicket,
        result: Result<CommentView, ApiError>,
    ) -> Result<(), CommentError> {
        match result {
            Ok(view) => {
                let list = self.lists.entry(ticket.key).or_default();
                let temp = EntryId::Temp(ticket.temp_id);
                let reconciled = list
                    .pages
                    .first_mut()
                    .and_then(|p| p.comments.iter_mut().find(|c| c.id == temp))
                    .map(|slot| *slot = CachedComment::from(view))
                    .is_some();

                list.stale = true;
                if ticket.key.parent_id.is_some() {
                    self.mark_stale(ListKey::top_level(ticket.key.video_id));
                }

                if !reconciled {
                    warn!(
                        video_id = %ticket.key.video_id,
                        "optimistic comment vanished before reconciliation, refetching list"
                    );
                    let list = self.lists.entry(ticket.key).or_default();
                    list.pages.clear();
                    list.comment_count = None;
                    list.stale = true;
                    return Err(CommentError::ReconciliationMismatch);
                }
                Ok(())
            }
            Err(err) => {
                self.restore(ticket.key, ticket.snapshot);
                warn!(video_id = %ticket.key.video_id, "comment create failed, rolled back: {err}");
                if err == ApiError::Unauthorized {
                    self.auth.open_sign_in();
                    return Err(CommentError::AuthenticationRequired);
                }
                Err(CommentError::MutationFailed(err))
            }
        }
    }

    pub async fn create(&mut self, key: ListKey, body: &str) -> Result<(), CommentError> {
        let ticket = self.begin_create(key, body)?;
        let result = self
            .api
            .create_comment(key.video_id, key.parent_id, body)
            .await;
        self.complete_create(ticket, result)
    }

    // --- like / unlike -------------------------------------------------

    pub async fn like(&mut self, key: ListKey, comment_id: Uuid) -> Result<(), CommentError> {
        self.toggle_like(key, comment_id, true).await
    }

    pub async fn unlike(&mut self, key: ListKey, comment_id: Uuid) -> Result<(), CommentError> {
        self.toggle_like(key, comment_id, false).await
    }

    async fn toggle_like(
        &mut self,
        key: ListKey,
        comment_id: Uuid,
        liked: bool,
    ) -> Result<(), CommentError> {
        if !self.auth.is_signed_in() {
            self.auth.open_sign_in();
            return Err(CommentError::AuthenticationRequired);
        }

        let list = self.lists.entry(key).or_default();
        list.fetch_epoch += 1;
        let snapshot = list.clone();

        let target = EntryId::Server(comment_id);
        for page in &mut list.pages {
            for comment in &mut page.comments {
                if comment.id != target {
                    continue;
                }
                // Guarded delta: a like on an already-liked comment (or the
                // reverse) changes nothing.
                if comment.viewer_liked != liked {
                    comment.like_count += if liked { 1 } else { -1 };
                }
                comment.viewer_liked = liked;
            }
        }

        let result = if liked {
            self.api.like_comment(comment_id).await
        } else {
            self.api.unlike_comment(comment_id).await
        };

        match result {
            Ok(()) => {
                self.mark_stale(key);
                Ok(())
            }
            Err(err) => {
                self.restore(key, snapshot);
                match err {
                    ApiError::Unauthorized => {
                        self.auth.open_sign_in();
                        Err(CommentError::AuthenticationRequired)
                    }
                    other => {
                        warn!(%comment_id, "like toggle failed, rolled back: {other}");
                        Err(CommentError::MutationFailed(other))
                    }
                }
            }
        }
    }

    // --- internals -----------------------------------------------------

    fn mark_stale(&mut self, key: ListKey) {
        self.lists.entry(key).or_default().stale = true;
    }

    /// Restores a pre-mutation snapshot, keeping the current epoch so the
    /// rollback does not resurrect fetches it already cancelled.
    fn restore(&mut self, key: ListKey, mut snapshot: CommentList) {
        let epoch = self
            .lists
            .get(&key)
            .map(|l| l.fetch_epoch)
            .unwrap_or(snapshot.fetch_epoch);
        snapshot.fetch_epoch = epoch;
        snapshot.stale = true;
        self.lists.insert(key, snapshot);
    }
}
