use axum::http::{StatusCode, Uri};
use serde::Serialize;
use url::Url;

use super::errors::ServerError;

const MAX_PAGE_SIZE: i64 = 100;

/// `?page=` and `?limit=` as sent by the client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pagination {
    page: i64,
    limit: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl Pagination {
    /// A limit that isn't a positive integer falls back to `default_limit`;
    /// a page that isn't one is a 404.
    pub fn from_params(
        page: Option<&str>,
        limit: Option<&str>,
        default_limit: u32,
    ) -> Result<Self, ServerError> {
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .map_or(i64::from(default_limit.max(1)), |l| l.min(MAX_PAGE_SIZE));

        let page = match page {
            None => 1,
            Some(page) => page
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(invalid_page)?,
        };

        Ok(Self { page, limit })
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Wraps one page of results. `request_url` is the absolute URL the
    /// page was requested at; the links reuse its query string.
    pub fn into_page<T>(
        self,
        count: i64,
        results: Vec<T>,
        request_url: &Url,
    ) -> Result<Page<T>, ServerError> {
        let num_pages = ((count + self.limit - 1) / self.limit).max(1);
        if self.page > num_pages {
            return Err(invalid_page());
        }

        let next = (self.page < num_pages).then(|| page_link(request_url, self.page + 1));
        let previous = (self.page > 1).then(|| page_link(request_url, self.page - 1));

        Ok(Page {
            count,
            next,
            previous,
            results,
        })
    }
}

/// The absolute URL of a request, given the public base URL of the app.
pub(crate) fn request_url(base_url: &Url, uri: &Uri) -> Url {
    let mut url = base_url.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());
    url
}

fn invalid_page() -> ServerError {
    ServerError::Detail(StatusCode::NOT_FOUND, "Invalid page.".to_string())
}

/// `url` pointing at `page`. Page 1 is linked without a `page` parameter.
fn page_link(url: &Url, page: i64) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if page != 1 {
        pairs.push(("page".to_string(), page.to_string()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut link = url.clone();
    link.set_query(None);
    if !pairs.is_empty() {
        link.query_pairs_mut().extend_pairs(pairs);
    }

    link.into()
}
