//! Fetching every page of the authenticated user's gists.
//!
//! The preferred strategy reads the `Link` header of page 1 and requests the
//! remaining pages concurrently. When the header is missing (some accounts
//! with two-factor auth never receive it) or that strategy fails, pages are
//! walked one at a time until a short page, capped at
//! [`MAX_FALLBACK_PAGES`].

use crate::constants::MAX_FALLBACK_PAGES;
use crate::error::AppError;
use crate::models::gist::Gist;
use crate::remote::GistClient;
use futures::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Page numbers advertised by a `Link` response header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationLinks {
    pub first: Option<u32>,
    pub prev: Option<u32>,
    pub next: Option<u32>,
    pub last: Option<u32>,
}

impl PaginationLinks {
    /// True when the header advertises nothing beyond the current page.
    pub fn is_single_page(&self) -> bool {
        self.next.is_none() && self.last.map_or(true, |last| last <= 1)
    }
}

/// Parse a `Link` header such as
/// `<https://api.github.com/gists?page=2>; rel="next", <...?page=5>; rel="last"`.
///
/// Entries whose URL has no numeric `page` parameter are ignored.
pub fn parse_link_header(header: &str) -> PaginationLinks {
    let mut links = PaginationLinks::default();
    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let Some(target) = parts.next() else {
            continue;
        };
        let target = target.trim();
        let Some(url) = target.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) else {
            continue;
        };
        let Some(page) = page_param(url) else {
            continue;
        };
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("rel") {
                continue;
            }
            for rel in value.trim().trim_matches('"').split_whitespace() {
                match rel {
                    "first" => links.first = Some(page),
                    "prev" => links.prev = Some(page),
                    "next" => links.next = Some(page),
                    "last" => links.last = Some(page),
                    _ => {}
                }
            }
        }
    }
    links
}

fn page_param(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

enum LinkOutcome {
    Complete(Vec<Gist>),
    NoHeader(Vec<Gist>),
}

/// Fetch every page of gists, deduplicated by id (first occurrence wins).
///
/// # Errors
/// Returns the fallback strategy's error when both strategies fail.
pub async fn fetch_all(client: &dyn GistClient, per_page: u32) -> Result<Vec<Gist>, AppError> {
    let per_page = per_page.max(1);
    let gists = match fetch_with_link_header(client, per_page).await {
        Ok(LinkOutcome::Complete(gists)) => gists,
        Ok(LinkOutcome::NoHeader(first_page)) => {
            debug!("no Link header on page 1; walking pages sequentially");
            fetch_sequential(client, per_page, Some(first_page)).await?
        }
        Err(err) => {
            warn!("parallel page fetch failed, retrying sequentially: {}", err);
            fetch_sequential(client, per_page, None).await?
        }
    };
    Ok(dedupe_by_id(gists))
}

async fn fetch_with_link_header(
    client: &dyn GistClient,
    per_page: u32,
) -> Result<LinkOutcome, AppError> {
    let first = client.list_page(1, per_page).await?;
    let Some(header) = first.link_header.as_deref() else {
        return Ok(LinkOutcome::NoHeader(first.gists));
    };
    let links = parse_link_header(header);
    if links.is_single_page() {
        return Ok(LinkOutcome::Complete(first.gists));
    }
    let Some(last) = links.last else {
        // `next` without `last`: the page count is unknown.
        return Ok(LinkOutcome::NoHeader(first.gists));
    };
    debug!(pages = last, "fetching remaining pages concurrently");
    let rest = try_join_all((2..=last).map(|page| client.list_page(page, per_page))).await?;
    let mut gists = first.gists;
    for page in rest {
        gists.extend(page.gists);
    }
    Ok(LinkOutcome::Complete(gists))
}

async fn fetch_sequential(
    client: &dyn GistClient,
    per_page: u32,
    first_page: Option<Vec<Gist>>,
) -> Result<Vec<Gist>, AppError> {
    let mut gists = Vec::new();
    let mut page = 1;
    if let Some(first) = first_page {
        let full = first.len() >= per_page as usize;
        gists.extend(first);
        if !full {
            return Ok(gists);
        }
        page = 2;
    }
    while page <= MAX_FALLBACK_PAGES {
        let batch = client.list_page(page, per_page).await?.gists;
        let full = batch.len() >= per_page as usize;
        gists.extend(batch);
        if !full {
            break;
        }
        page += 1;
    }
    if page > MAX_FALLBACK_PAGES {
        warn!(
            max_pages = MAX_FALLBACK_PAGES,
            "stopped paging at the safety cap; the gist list may be incomplete"
        );
    }
    Ok(gists)
}

fn dedupe_by_id(gists: Vec<Gist>) -> Vec<Gist> {
    let mut seen = HashSet::with_capacity(gists.len());
    gists
        .into_iter()
        .filter(|gist| seen.insert(gist.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remote_gist, FakeGistClient, LinkMode, Op};

    fn fake_with(count: usize) -> FakeGistClient {
        FakeGistClient::with_gists(
            (0..count).map(|n| remote_gist(&format!("g{:03}", n), "", n as i64, &[])),
        )
    }

    #[test]
    fn parse_link_header_reads_every_relation() {
        let header = "<https://api.github.com/gists?per_page=100&page=2>; rel=\"next\", \
                      <https://api.github.com/gists?per_page=100&page=7>; rel=\"last\", \
                      <https://api.github.com/gists?page=1&per_page=100>; rel=\"first\"";
        let links = parse_link_header(header);
        assert_eq!(links.next, Some(2));
        assert_eq!(links.last, Some(7));
        assert_eq!(links.first, Some(1));
        assert_eq!(links.prev, None);
        assert!(!links.is_single_page());
    }

    #[test]
    fn parse_link_header_ignores_garbage() {
        assert_eq!(parse_link_header(""), PaginationLinks::default());
        assert_eq!(parse_link_header("not a link"), PaginationLinks::default());
        let links = parse_link_header("<https://x.test/gists?page=abc>; rel=\"next\"");
        assert_eq!(links.next, None);
        assert!(PaginationLinks::default().is_single_page());
    }

    #[tokio::test]
    async fn link_header_fetches_remaining_pages() {
        let fake = fake_with(25);
        let gists = fetch_all(&fake, 10).await.expect("fetch");
        assert_eq!(gists.len(), 25);
        let mut pages = fake.log(|log| log.pages.clone());
        pages.sort_unstable();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_header_walks_until_short_page() {
        let fake = fake_with(25);
        fake.set_link_mode(LinkMode::Missing);
        let gists = fetch_all(&fake, 10).await.expect("fetch");
        assert_eq!(gists.len(), 25);
        assert_eq!(fake.log(|log| log.pages.clone()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_header_with_exact_multiple_stops_on_empty_page() {
        let fake = fake_with(20);
        fake.set_link_mode(LinkMode::Missing);
        let gists = fetch_all(&fake, 10).await.expect("fetch");
        assert_eq!(gists.len(), 20);
        assert_eq!(fake.log(|log| log.pages.clone()), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_parallel_fetch_falls_back_to_sequential() {
        let fake = fake_with(25);
        fake.fail_page(3);
        let err = fetch_all(&fake, 10).await.expect_err("page 3 keeps failing");
        assert!(matches!(err, AppError::Remote { status: 500, .. }));
        // Parallel attempt (1, 2, 3) followed by the sequential restart (1, 2, 3).
        assert_eq!(fake.calls(Op::ListPage), 6);
    }

    #[tokio::test]
    async fn single_page_needs_one_request() {
        let fake = fake_with(3);
        let gists = fetch_all(&fake, 10).await.expect("fetch");
        assert_eq!(gists.len(), 3);
        assert_eq!(fake.calls(Op::ListPage), 1);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let a = remote_gist("a", "first", 1, &[]);
        let b = remote_gist("b", "", 2, &[]);
        let dup = remote_gist("a", "second", 3, &[]);
        let out = dedupe_by_id(vec![a, b, dup]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].description, "first");
    }
}
