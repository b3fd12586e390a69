//! In-memory gist cache with lazy content loading.
//!
//! The list endpoint only returns lightweight gists; file bodies are pulled
//! per gist through [`GistCache::fetch_content`]. Tag and search indexes are
//! kept in step with the map on every mutation.

pub mod pagination;

use crate::config::Config;
use crate::error::AppError;
use crate::models::gist::{CreateGistRequest, Gist, UpdateGistRequest};
use crate::remote::GistClient;
use crate::search::SearchIndex;
use crate::tags::{apply_derived_tags, TagCount, TagIndex};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

/// Change notifications published after successful cache mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Synced { count: usize },
    ContentLoaded { id: String },
    Created { id: String },
    Updated { id: String },
    Deleted { id: String },
    StarChanged { id: String, starred: bool },
}

#[derive(Default)]
struct CacheState {
    gists: HashMap<String, Gist>,
    loaded: HashSet<String>,
    loading_id: Option<String>,
    tags: TagIndex,
    search: SearchIndex,
    starred_ids: HashSet<String>,
    starred: HashMap<String, Gist>,
}

impl CacheState {
    fn insert(&mut self, gist: Gist, loaded: bool) {
        self.tags.replace_gist(&gist);
        self.search.update(&gist);
        if loaded {
            self.loaded.insert(gist.id.clone());
        } else {
            self.loaded.remove(&gist.id);
        }
        if self.starred_ids.contains(&gist.id) {
            self.starred.insert(gist.id.clone(), gist.clone());
        }
        self.gists.insert(gist.id.clone(), gist);
    }

    fn remove(&mut self, id: &str) -> bool {
        self.tags.remove(id);
        self.search.remove(id);
        self.loaded.remove(id);
        self.starred_ids.remove(id);
        self.starred.remove(id);
        self.gists.remove(id).is_some()
    }

    fn newest_first<'a>(&self, gists: impl Iterator<Item = &'a Gist>) -> Vec<Gist> {
        let mut out: Vec<Gist> = gists.cloned().collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

/// Cache of the authenticated user's gists.
pub struct GistCache {
    client: Arc<dyn GistClient>,
    per_page: u32,
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

impl GistCache {
    pub fn new(client: Arc<dyn GistClient>, per_page: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            per_page: per_page.max(1),
            state: Mutex::new(CacheState::default()),
            events,
        }
    }

    pub fn from_config(client: Arc<dyn GistClient>, config: &Config) -> Self {
        Self::new(client, config.per_page)
    }

    /// The remote client this cache talks to.
    pub fn client(&self) -> &Arc<dyn GistClient> {
        &self.client
    }

    /// Receive [`CacheEvent`]s for mutations made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Replace the cache with a fresh copy of every gist.
    ///
    /// The new list is fully fetched before anything is swapped in, so a
    /// failure leaves the previous cache untouched. Gists whose content was
    /// loaded and whose `updated_at` did not move keep that content.
    ///
    /// # Returns
    /// The number of gists now cached.
    ///
    /// # Errors
    /// Propagates the remote error when every page strategy fails.
    pub async fn sync_all(&self) -> Result<usize, AppError> {
        let fetched = pagination::fetch_all(self.client.as_ref(), self.per_page).await?;
        let count = {
            let mut state = self.state();
            let mut gists = HashMap::with_capacity(fetched.len());
            let mut loaded = HashSet::new();
            for mut gist in fetched {
                if let Some(previous) = state.gists.get(&gist.id) {
                    if state.loaded.contains(&gist.id) && previous.updated_at == gist.updated_at {
                        gist = previous.clone();
                        loaded.insert(gist.id.clone());
                    }
                }
                apply_derived_tags(&mut gist);
                gists.insert(gist.id.clone(), gist);
            }
            state.tags.rebuild(gists.values());
            state.search = SearchIndex::build(gists.values());
            for (id, starred) in state.starred.iter_mut() {
                if let Some(fresh) = gists.get(id) {
                    *starred = fresh.clone();
                }
            }
            state.gists = gists;
            state.loaded = loaded;
            state.gists.len()
        };
        info!(count, "synced gists");
        self.emit(CacheEvent::Synced { count });
        Ok(count)
    }

    /// Make sure the file bodies of `id` are cached and return the gist.
    ///
    /// Returns immediately when the content is already loaded. While a fetch
    /// for the same id is in flight, the cached (possibly content-less) gist
    /// is returned instead of issuing a second request.
    ///
    /// # Errors
    /// Returns [`AppError::NotFound`] when a fetch for `id` is in flight and
    /// nothing is cached yet, or the remote error from the fetch itself.
    pub async fn fetch_content(&self, id: &str) -> Result<Gist, AppError> {
        {
            let mut state = self.state();
            if state.loaded.contains(id) {
                if let Some(gist) = state.gists.get(id) {
                    debug!(id, "content already cached");
                    return Ok(gist.clone());
                }
            }
            if state.loading_id.as_deref() == Some(id) {
                debug!(id, "content fetch already in flight");
                return state
                    .gists
                    .get(id)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound(format!("gist {} is still loading", id)));
            }
            state.loading_id = Some(id.to_string());
        }

        let result = self.client.get(id).await;

        let gist = {
            let mut state = self.state();
            if state.loading_id.as_deref() == Some(id) {
                state.loading_id = None;
            }
            let mut gist = result?;
            apply_derived_tags(&mut gist);
            state.insert(gist.clone(), true);
            gist
        };
        debug!(id, files = gist.files.len(), "content loaded");
        self.emit(CacheEvent::ContentLoaded { id: id.to_string() });
        Ok(gist)
    }

    /// Create a gist remotely, then cache it.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] without calling the remote when the
    /// request carries no files. Otherwise propagates the remote error; the
    /// cache is left unchanged.
    pub async fn create(&self, request: CreateGistRequest) -> Result<Gist, AppError> {
        if request.files.is_empty() {
            return Err(AppError::BadRequest(
                "a gist needs at least one file".to_string(),
            ));
        }
        let mut gist = self.client.create(&request).await?;
        apply_derived_tags(&mut gist);
        let id = gist.id.clone();
        {
            let loaded = gist.all_content_loaded();
            self.state().insert(gist.clone(), loaded);
        }
        debug!(id = %id, "gist created");
        self.emit(CacheEvent::Created { id });
        Ok(gist)
    }

    /// Update a gist remotely, then replace the cached copy.
    ///
    /// # Errors
    /// Propagates the remote error; the cache is left unchanged.
    pub async fn update(&self, id: &str, request: UpdateGistRequest) -> Result<Gist, AppError> {
        let mut gist = self.client.update(id, &request).await?;
        apply_derived_tags(&mut gist);
        {
            let loaded = gist.all_content_loaded();
            self.state().insert(gist.clone(), loaded);
        }
        debug!(id, "gist updated");
        self.emit(CacheEvent::Updated { id: gist.id.clone() });
        Ok(gist)
    }

    /// Delete a gist remotely, then drop it from every local structure.
    ///
    /// # Errors
    /// Propagates the remote error; the cache is left unchanged.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.client.delete(id).await?;
        let was_cached = self.state().remove(id);
        debug!(id, was_cached, "gist deleted");
        self.emit(CacheEvent::Deleted { id: id.to_string() });
        Ok(())
    }

    /// Star a gist remotely and record it locally.
    pub async fn star(&self, id: &str) -> Result<(), AppError> {
        self.client.star(id).await?;
        self.set_starred_locally(id, true);
        Ok(())
    }

    /// Unstar a gist remotely and forget it locally.
    pub async fn unstar(&self, id: &str) -> Result<(), AppError> {
        self.client.unstar(id).await?;
        self.set_starred_locally(id, false);
        Ok(())
    }

    /// Ask the remote whether `id` is starred and refresh the local set.
    pub async fn is_starred(&self, id: &str) -> Result<bool, AppError> {
        let starred = self.client.is_starred(id).await?;
        {
            let mut state = self.state();
            if starred {
                state.starred_ids.insert(id.to_string());
                if let Some(gist) = state.gists.get(id).cloned() {
                    state.starred.insert(id.to_string(), gist);
                }
            } else {
                state.starred_ids.remove(id);
                state.starred.remove(id);
            }
        }
        Ok(starred)
    }

    /// Local answer only; `false` until a star query or listing saw the id.
    pub fn is_starred_cached(&self, id: &str) -> bool {
        self.state().starred_ids.contains(id)
    }

    /// Fetch the starred gists and replace the local starred set.
    pub async fn list_starred(&self) -> Result<Vec<Gist>, AppError> {
        let mut fetched = self.client.list_starred().await?;
        for gist in &mut fetched {
            apply_derived_tags(gist);
        }
        {
            let mut state = self.state();
            state.starred_ids = fetched.iter().map(|gist| gist.id.clone()).collect();
            state.starred = fetched
                .iter()
                .map(|gist| (gist.id.clone(), gist.clone()))
                .collect();
        }
        debug!(count = fetched.len(), "starred gists listed");
        Ok(fetched)
    }

    /// Starred gists known locally, most recently updated first.
    pub fn starred(&self) -> Vec<Gist> {
        let state = self.state();
        state.newest_first(state.starred.values())
    }

    fn set_starred_locally(&self, id: &str, starred: bool) {
        {
            let mut state = self.state();
            if starred {
                state.starred_ids.insert(id.to_string());
                if let Some(gist) = state.gists.get(id).cloned() {
                    state.starred.insert(id.to_string(), gist);
                }
            } else {
                state.starred_ids.remove(id);
                state.starred.remove(id);
            }
        }
        self.emit(CacheEvent::StarChanged {
            id: id.to_string(),
            starred,
        });
    }

    pub fn get(&self, id: &str) -> Option<Gist> {
        self.state().gists.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().gists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().gists.is_empty()
    }

    /// Every cached gist, most recently updated first.
    pub fn gists(&self) -> Vec<Gist> {
        let state = self.state();
        state.newest_first(state.gists.values())
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.state().loaded.contains(id)
    }

    /// The id whose content fetch is currently in flight, if any.
    pub fn loading_id(&self) -> Option<String> {
        self.state().loading_id.clone()
    }

    /// Every tag with the number of gists carrying it, sorted by tag.
    pub fn tag_counts(&self) -> Vec<TagCount> {
        self.state().tags.tags()
    }

    /// Gists carrying every tag in `tags`, most recently updated first.
    ///
    /// An empty tag list selects every gist.
    pub fn gists_with_tags<S: AsRef<str>>(&self, tags: &[S]) -> Vec<Gist> {
        let state = self.state();
        if tags.is_empty() {
            return state.newest_first(state.gists.values());
        }
        let ids = state.tags.ids_with_all(tags);
        state.newest_first(ids.iter().filter_map(|id| state.gists.get(id)))
    }

    /// Run a fuzzy or `/regex/flags` query against the search index.
    pub fn search(&self, query: &str) -> Vec<Gist> {
        self.state().search.search(query)
    }
}
