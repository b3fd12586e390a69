//! Contract for the remote gist service.

/// REST adapter for the GitHub gist API.
pub mod github;

pub use github::GithubClient;

use crate::error::AppError;
use crate::models::gist::{CreateGistRequest, Gist, UpdateGistRequest};
use async_trait::async_trait;

/// One page of a gist listing.
#[derive(Debug, Clone, Default)]
pub struct GistPage {
    /// Lightweight gists; file content is never loaded in listings.
    pub gists: Vec<Gist>,
    /// Raw `Link` pagination header, when the service sent one.
    pub link_header: Option<String>,
}

/// Operations the cache and the settings engine need from the gist service.
///
/// Every failure is returned as-is to the caller; implementations do not
/// retry.
#[async_trait]
pub trait GistClient: Send + Sync {
    /// Fetch one page (1-based) of the authenticated user's gists.
    async fn list_page(&self, page: u32, per_page: u32) -> Result<GistPage, AppError>;

    /// Fetch a single gist including file content.
    async fn get(&self, id: &str) -> Result<Gist, AppError>;

    async fn create(&self, request: &CreateGistRequest) -> Result<Gist, AppError>;

    async fn update(&self, id: &str, request: &UpdateGistRequest) -> Result<Gist, AppError>;

    async fn delete(&self, id: &str) -> Result<(), AppError>;

    async fn star(&self, id: &str) -> Result<(), AppError>;

    async fn unstar(&self, id: &str) -> Result<(), AppError>;

    async fn is_starred(&self, id: &str) -> Result<bool, AppError>;

    /// Every gist the user starred.
    async fn list_starred(&self) -> Result<Vec<Gist>, AppError>;
}
