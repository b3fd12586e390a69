//! Shared test-only helpers for gistshelf_core.

use crate::error::AppError;
use crate::models::gist::{
    CreateGistRequest, FileContent, Gist, GistFile, UpdateGistRequest, Visibility,
};
use crate::remote::{GistClient, GistPage};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;

/// Remote operations the fake can count or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    ListPage,
    Get,
    Create,
    Update,
    Delete,
    Star,
    Unstar,
    IsStarred,
    ListStarred,
}

/// How the fake advertises pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkMode {
    /// GitHub-style `next`/`last` relations when there is more than one page.
    Standard,
    /// No header at all (some 2FA-protected accounts).
    Missing,
}

#[derive(Debug, Default)]
pub(crate) struct CallLog {
    pub(crate) calls: Vec<Op>,
    pub(crate) pages: Vec<u32>,
    pub(crate) created: Vec<CreateGistRequest>,
    pub(crate) updated: Vec<(String, UpdateGistRequest)>,
}

impl CallLog {
    pub(crate) fn count(&self, op: Op) -> usize {
        self.calls.iter().filter(|call| **call == op).count()
    }

    pub(crate) fn writes(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

struct FakeState {
    gists: BTreeMap<String, Gist>,
    starred: BTreeSet<String>,
    failing: HashSet<Op>,
    fail_pages: HashSet<u32>,
    link_mode: LinkMode,
    next_id: u64,
    clock: DateTime<Utc>,
    log: CallLog,
}

/// In-memory stand-in for the gist service.
pub(crate) struct FakeGistClient {
    state: Mutex<FakeState>,
    get_gate: Mutex<Option<Arc<Semaphore>>>,
}

/// Fixed base time so recency ordering in tests is deterministic.
pub(crate) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// A gist with loaded files, updated `minutes` after [`base_time`].
pub(crate) fn remote_gist(id: &str, description: &str, minutes: i64, files: &[(&str, &str, &str)]) -> Gist {
    let mut gist = Gist::new(id, description);
    gist.created_at = base_time();
    gist.updated_at = base_time() + Duration::minutes(minutes);
    for (name, language, content) in files {
        let mut file = GistFile::loaded(*name, *content);
        if !language.is_empty() {
            file = file.with_language(*language);
        }
        gist = gist.with_file(file);
    }
    gist
}

fn lightweight(gist: &Gist) -> Gist {
    let mut light = gist.clone();
    for file in light.files.values_mut() {
        file.content = FileContent::Unloaded;
    }
    light
}

fn not_found(id: &str) -> AppError {
    AppError::remote(404, format!("gist {} not found", id))
}

impl FakeGistClient {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                gists: BTreeMap::new(),
                starred: BTreeSet::new(),
                failing: HashSet::new(),
                fail_pages: HashSet::new(),
                link_mode: LinkMode::Standard,
                next_id: 1,
                clock: base_time() + Duration::days(1),
                log: CallLog::default(),
            }),
            get_gate: Mutex::new(None),
        }
    }

    pub(crate) fn with_gists(gists: impl IntoIterator<Item = Gist>) -> Self {
        let fake = Self::new();
        for gist in gists {
            fake.seed(gist);
        }
        fake
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake state")
    }

    pub(crate) fn seed(&self, gist: Gist) {
        self.state().gists.insert(gist.id.clone(), gist);
    }

    pub(crate) fn remove_remote(&self, id: &str) {
        self.state().gists.remove(id);
    }

    pub(crate) fn remote(&self, id: &str) -> Option<Gist> {
        self.state().gists.get(id).cloned()
    }

    pub(crate) fn set_link_mode(&self, mode: LinkMode) {
        self.state().link_mode = mode;
    }

    pub(crate) fn fail(&self, op: Op) {
        self.state().failing.insert(op);
    }

    pub(crate) fn recover(&self, op: Op) {
        self.state().failing.remove(&op);
    }

    pub(crate) fn fail_page(&self, page: u32) {
        self.state().fail_pages.insert(page);
    }

    pub(crate) fn calls(&self, op: Op) -> usize {
        self.state().log.count(op)
    }

    pub(crate) fn log<R>(&self, read: impl FnOnce(&CallLog) -> R) -> R {
        read(&self.state().log)
    }

    /// Make every `get` wait for a permit on the returned semaphore.
    pub(crate) fn hold_gets(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.get_gate.lock().expect("gate") = Some(gate.clone());
        gate
    }

    fn begin(&self, op: Op) -> Result<MutexGuard<'_, FakeState>, AppError> {
        let mut state = self.state();
        state.log.calls.push(op);
        if state.failing.contains(&op) {
            return Err(AppError::remote(502, format!("injected {:?} failure", op)));
        }
        Ok(state)
    }

    fn tick(state: &mut FakeState) -> DateTime<Utc> {
        state.clock += Duration::minutes(1);
        state.clock
    }
}

#[async_trait]
impl GistClient for FakeGistClient {
    async fn list_page(&self, page: u32, per_page: u32) -> Result<GistPage, AppError> {
        let mut state = self.begin(Op::ListPage)?;
        state.log.pages.push(page);
        if state.fail_pages.contains(&page) {
            return Err(AppError::remote(500, format!("page {} unavailable", page)));
        }
        let mut all: Vec<&Gist> = state.gists.values().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        let per_page = per_page.max(1) as usize;
        let total_pages = all.len().div_ceil(per_page).max(1) as u32;
        let start = (page.saturating_sub(1) as usize) * per_page;
        let gists = all
            .iter()
            .skip(start)
            .take(per_page)
            .map(|gist| lightweight(gist))
            .collect();
        let link_header = match state.link_mode {
            LinkMode::Missing => None,
            LinkMode::Standard if total_pages <= 1 => None,
            LinkMode::Standard => {
                let mut parts = Vec::new();
                if page < total_pages {
                    parts.push(format!(
                        "<https://fake.test/gists?per_page={}&page={}>; rel=\"next\"",
                        per_page,
                        page + 1
                    ));
                }
                parts.push(format!(
                    "<https://fake.test/gists?per_page={}&page={}>; rel=\"last\"",
                    per_page, total_pages
                ));
                Some(parts.join(", "))
            }
        };
        Ok(GistPage { gists, link_header })
    }

    async fn get(&self, id: &str) -> Result<Gist, AppError> {
        let gate = self.get_gate.lock().expect("gate").clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate open").forget();
        }
        let state = self.begin(Op::Get)?;
        state.gists.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn create(&self, request: &CreateGistRequest) -> Result<Gist, AppError> {
        let mut state = self.begin(Op::Create)?;
        state.log.created.push(request.clone());
        let id = format!("created{}", state.next_id);
        state.next_id += 1;
        let now = Self::tick(&mut state);
        let mut gist = Gist::new(id.clone(), request.description.clone());
        gist.visibility = request.visibility;
        gist.created_at = now;
        gist.updated_at = now;
        for (name, content) in &request.files {
            gist = gist.with_file(GistFile::loaded(name.clone(), content.clone()));
        }
        state.gists.insert(id, gist.clone());
        Ok(gist)
    }

    async fn update(&self, id: &str, request: &UpdateGistRequest) -> Result<Gist, AppError> {
        let mut state = self.begin(Op::Update)?;
        state.log.updated.push((id.to_string(), request.clone()));
        let now = Self::tick(&mut state);
        let Some(gist) = state.gists.get_mut(id) else {
            return Err(not_found(id));
        };
        gist.description = request.description.clone();
        gist.updated_at = now;
        for (name, edit) in &request.files {
            match edit {
                None => {
                    gist.files.remove(name);
                }
                Some(edit) => {
                    let previous = gist.files.remove(name);
                    let target = edit.rename_to.clone().unwrap_or_else(|| name.clone());
                    let mut file = GistFile::loaded(target.clone(), edit.content.clone());
                    file.language = previous.and_then(|old| old.language);
                    gist.files.insert(target, file);
                }
            }
        }
        Ok(gist.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut state = self.begin(Op::Delete)?;
        state.starred.remove(id);
        state.gists.remove(id).map(|_| ()).ok_or_else(|| not_found(id))
    }

    async fn star(&self, id: &str) -> Result<(), AppError> {
        let mut state = self.begin(Op::Star)?;
        if !state.gists.contains_key(id) {
            return Err(not_found(id));
        }
        state.starred.insert(id.to_string());
        Ok(())
    }

    async fn unstar(&self, id: &str) -> Result<(), AppError> {
        let mut state = self.begin(Op::Unstar)?;
        state.starred.remove(id);
        Ok(())
    }

    async fn is_starred(&self, id: &str) -> Result<bool, AppError> {
        let state = self.begin(Op::IsStarred)?;
        Ok(state.starred.contains(id))
    }

    async fn list_starred(&self) -> Result<Vec<Gist>, AppError> {
        let state = self.begin(Op::ListStarred)?;
        Ok(state
            .starred
            .iter()
            .filter_map(|id| state.gists.get(id))
            .map(lightweight)
            .collect())
    }
}

/// A secret gist holding a settings document, as another device would leave it.
pub(crate) fn settings_gist(id: &str, json: &str) -> Gist {
    let mut gist = remote_gist(id, crate::constants::SETTINGS_GIST_DESCRIPTION, 0, &[]);
    gist.visibility = Visibility::Secret;
    gist.with_file(GistFile::loaded(crate::constants::SETTINGS_FILE_NAME, json))
}
