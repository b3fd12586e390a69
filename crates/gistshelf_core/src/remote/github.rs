//! [`GistClient`] implementation over the GitHub REST API.

use super::{GistClient, GistPage};
use crate::cache::pagination::parse_link_header;
use crate::config::Config;
use crate::constants::{DEFAULT_PER_PAGE, MAX_FALLBACK_PAGES, USER_AGENT};
use crate::error::AppError;
use crate::models::gist::{
    CreateGistRequest, FileContent, Gist, GistFile, Owner, UpdateGistRequest, Visibility,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_LENGTH, LINK};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct OwnerDto {
    login: String,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GistFileDto {
    filename: Option<String>,
    language: Option<String>,
    #[serde(default)]
    size: u64,
    raw_url: Option<String>,
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GistDto {
    id: String,
    description: Option<String>,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    files: BTreeMap<String, GistFileDto>,
    owner: Option<OwnerDto>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: Option<String>,
}

impl From<GistDto> for Gist {
    fn from(dto: GistDto) -> Self {
        let files = dto
            .files
            .into_iter()
            .map(|(key, file)| {
                let filename = file.filename.unwrap_or_else(|| key.clone());
                let content = match file.content {
                    Some(text) if !file.truncated => FileContent::Loaded(text),
                    _ => FileContent::Unloaded,
                };
                let file = GistFile {
                    filename,
                    language: file.language,
                    size: file.size,
                    raw_url: file.raw_url,
                    content,
                };
                (key, file)
            })
            .collect();
        Gist {
            id: dto.id,
            description: dto.description.unwrap_or_default(),
            files,
            visibility: Visibility::from_public(dto.public),
            owner: dto.owner.map(|owner| Owner {
                login: owner.login,
                avatar_url: owner.avatar_url,
            }),
            created_at: dto.created_at,
            updated_at: dto.updated_at,
            html_url: dto.html_url,
            tags: Default::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FileBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    description: &'a str,
    public: bool,
    files: BTreeMap<&'a str, FileBody<'a>>,
}

#[derive(Debug, Serialize)]
struct UpdateBody<'a> {
    description: &'a str,
    /// `None` serializes as `null`, which deletes the file upstream.
    files: BTreeMap<&'a str, Option<FileBody<'a>>>,
}

impl<'a> From<&'a CreateGistRequest> for CreateBody<'a> {
    fn from(request: &'a CreateGistRequest) -> Self {
        Self {
            description: &request.description,
            public: request.visibility.is_public(),
            files: request
                .files
                .iter()
                .map(|(name, content)| {
                    let file = FileBody {
                        content,
                        filename: None,
                    };
                    (name.as_str(), file)
                })
                .collect(),
        }
    }
}

impl<'a> From<&'a UpdateGistRequest> for UpdateBody<'a> {
    fn from(request: &'a UpdateGistRequest) -> Self {
        Self {
            description: &request.description,
            files: request
                .files
                .iter()
                .map(|(name, edit)| {
                    let file = edit.as_ref().map(|edit| FileBody {
                        content: &edit.content,
                        filename: edit.rename_to.as_deref(),
                    });
                    (name.as_str(), file)
                })
                .collect(),
        }
    }
}

/// Build a user-facing message for a failed response.
///
/// GitHub reports errors as `{"message": ...}`; other JSON bodies are passed
/// through, and an empty body falls back to the status reason.
pub fn error_message_for_response(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(body)
            .to_string();
    }
    body.to_string()
}

/// REST client for `api.github.com` (or a compatible endpoint).
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base: Url,
    per_page: u32,
}

impl GithubClient {
    /// Build a client for `api_url`, authenticating with `token` when given.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for an unusable URL or token and
    /// [`AppError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        api_url: &str,
        token: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<Self, AppError> {
        let base = Url::parse(api_url)
            .map_err(|err| AppError::Config(format!("Invalid API URL '{}': {}", api_url, err)))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Config(format!(
                "API URL '{}' cannot be used as a base",
                api_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| AppError::Config("Token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base,
            per_page: DEFAULT_PER_PAGE,
        })
    }

    /// Build a client from runtime configuration.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let mut client = Self::new(
            &config.api_url,
            config.token.as_deref(),
            config.request_timeout,
        )?;
        client.per_page = config.per_page;
        Ok(client)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AppError::Config("API URL cannot be used as a base".to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, AppError> {
        Ok(self.http.request(method, self.url(segments)?))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::remote(
            status.as_u16(),
            error_message_for_response(status, &body),
        ))
    }

    async fn gist_from(&self, builder: RequestBuilder) -> Result<Gist, AppError> {
        let dto: GistDto = self.send(builder).await?.json().await?;
        Ok(dto.into())
    }

    async fn page_of(
        &self,
        segments: &[&str],
        page: u32,
        per_page: u32,
    ) -> Result<GistPage, AppError> {
        let builder = self
            .request(Method::GET, segments)?
            .query(&[("page", page), ("per_page", per_page)]);
        let response = self.send(builder).await?;
        let link_header = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let dtos: Vec<GistDto> = response.json().await?;
        debug!(page, per_page, count = dtos.len(), "fetched gist page");
        Ok(GistPage {
            gists: dtos.into_iter().map(Gist::from).collect(),
            link_header,
        })
    }
}

#[async_trait]
impl GistClient for GithubClient {
    async fn list_page(&self, page: u32, per_page: u32) -> Result<GistPage, AppError> {
        self.page_of(&["gists"], page, per_page).await
    }

    async fn get(&self, id: &str) -> Result<Gist, AppError> {
        self.gist_from(self.request(Method::GET, &["gists", id])?)
            .await
    }

    async fn create(&self, request: &CreateGistRequest) -> Result<Gist, AppError> {
        let body = CreateBody::from(request);
        self.gist_from(self.request(Method::POST, &["gists"])?.json(&body))
            .await
    }

    async fn update(&self, id: &str, request: &UpdateGistRequest) -> Result<Gist, AppError> {
        let body = UpdateBody::from(request);
        self.gist_from(self.request(Method::PATCH, &["gists", id])?.json(&body))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        self.send(self.request(Method::DELETE, &["gists", id])?)
            .await?;
        Ok(())
    }

    async fn star(&self, id: &str) -> Result<(), AppError> {
        let builder = self
            .request(Method::PUT, &["gists", id, "star"])?
            .header(CONTENT_LENGTH, HeaderValue::from_static("0"));
        self.send(builder).await?;
        Ok(())
    }

    async fn unstar(&self, id: &str) -> Result<(), AppError> {
        self.send(self.request(Method::DELETE, &["gists", id, "star"])?)
            .await?;
        Ok(())
    }

    async fn is_starred(&self, id: &str) -> Result<bool, AppError> {
        match self
            .send(self.request(Method::GET, &["gists", id, "star"])?)
            .await
        {
            Ok(_) => Ok(true),
            Err(AppError::Remote { status: 404, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_starred(&self) -> Result<Vec<Gist>, AppError> {
        let mut gists = Vec::new();
        let mut page = 1;
        while page <= MAX_FALLBACK_PAGES {
            let batch = self.page_of(&["gists", "starred"], page, self.per_page).await?;
            let next = batch
                .link_header
                .as_deref()
                .map(parse_link_header)
                .and_then(|links| links.next);
            gists.extend(batch.gists);
            match next {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(gists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_github_message_field() {
        let body = json!({"message": "Bad credentials", "documentation_url": "x"}).to_string();
        assert_eq!(
            error_message_for_response(StatusCode::UNAUTHORIZED, &body),
            "Bad credentials"
        );
        assert_eq!(
            error_message_for_response(StatusCode::BAD_GATEWAY, "upstream exploded"),
            "upstream exploded"
        );
        assert_eq!(
            error_message_for_response(StatusCode::NOT_FOUND, "  "),
            "Not Found"
        );
    }

    #[test]
    fn dto_conversion_marks_truncated_or_missing_content_unloaded() {
        let dto: GistDto = serde_json::from_value(json!({
            "id": "abc",
            "description": null,
            "public": true,
            "files": {
                "full.rs": {"filename": "full.rs", "language": "Rust", "size": 3, "content": "x()"},
                "big.txt": {"filename": "big.txt", "size": 9000000, "content": "partial", "truncated": true},
                "meta.md": {"filename": "meta.md", "language": "Markdown", "size": 1}
            },
            "owner": {"login": "octo", "avatar_url": null},
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "html_url": "https://gist.github.com/abc"
        }))
        .expect("dto");
        let gist = Gist::from(dto);

        assert_eq!(gist.description, "");
        assert_eq!(gist.visibility, Visibility::Public);
        assert_eq!(gist.owner.as_ref().map(|o| o.login.as_str()), Some("octo"));
        assert_eq!(gist.files["full.rs"].content, FileContent::Loaded("x()".to_string()));
        assert_eq!(gist.files["big.txt"].content, FileContent::Unloaded);
        assert_eq!(gist.files["meta.md"].content, FileContent::Unloaded);
        assert_eq!(gist.files["meta.md"].language.as_deref(), Some("Markdown"));
    }

    #[test]
    fn update_body_serializes_deleted_files_as_null() {
        let request = UpdateGistRequest::new("desc")
            .put_file("keep.txt", "body")
            .delete_file("gone.txt");
        let body = UpdateBody::from(&request);
        let value = serde_json::to_value(&body).expect("encode");
        assert_eq!(
            value,
            json!({
                "description": "desc",
                "files": {"gone.txt": null, "keep.txt": {"content": "body"}}
            })
        );
    }

    #[test]
    fn url_joins_segments_under_base_path() {
        let client = GithubClient::new(
            "http://127.0.0.1:1/api/v3/",
            None,
            std::time::Duration::from_secs(1),
        )
        .expect("client");
        let url = client.url(&["gists", "abc", "star"]).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:1/api/v3/gists/abc/star");
    }
}
