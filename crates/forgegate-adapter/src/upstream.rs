use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{Error, Result, paginate};

const UA: &str = concat!("forgegate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct UpstreamOptions {
    /// Total deadline for one upstream call, body included.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for UpstreamOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Shared HTTP client for every backend.
///
/// Makes exactly one attempt per call and maps upstream statuses onto
/// [`Error`]: 404 is `NotFound`, 401 is `NotAuthenticated`, anything else
/// outside 2xx is `Upstream` with the body attached.
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
}

impl UpstreamClient {
    pub fn new(options: &UpstreamOptions) -> Result<Self> {
        let http = Client::builder()
            .user_agent(UA)
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .build()?;

        debug!(
            timeout_secs = options.timeout.as_secs(),
            connect_timeout_secs = options.connect_timeout.as_secs(),
            "upstream client initialized"
        );

        Ok(Self { http })
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    /// Sends a request and maps non-success statuses. `what` names the
    /// looked-up thing in error messages.
    pub(crate) async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(what.to_string())),
            StatusCode::UNAUTHORIZED => Err(Error::NotAuthenticated(format!(
                "upstream rejected credentials for {what}"
            ))),
            _ => {
                let url = response.url().to_string();
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, %url, "upstream returned error status");
                Err(Error::Upstream {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    pub(crate) async fn fetch_json<T>(&self, request: RequestBuilder, what: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, what).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| Error::Decode(format!("{what}: {err}")))
    }

    /// Fetches one page of a listing along with its `next` link.
    pub(crate) async fn fetch_page<T>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<(T, Option<String>)>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, what).await?;
        let next = paginate::next_link(response.headers())?;
        let page = response
            .json::<T>()
            .await
            .map_err(|err| Error::Decode(format!("{what}: {err}")))?;
        Ok((page, next))
    }

    /// Walks a paginated listing, following `next` links for at most
    /// `max_pages` pages. Hitting the cap truncates the listing.
    pub(crate) async fn fetch_all<T, F>(
        &self,
        first: Url,
        max_pages: usize,
        what: &str,
        prepare: F,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send,
        F: Fn(RequestBuilder) -> RequestBuilder + Send + Sync,
    {
        let mut items = Vec::new();
        let mut url = first.to_string();

        for _ in 0..max_pages {
            let (page, next) = self
                .fetch_page::<Vec<T>>(prepare(self.get(&url)), what)
                .await?;
            items.extend(page);

            match next {
                Some(next) => url = next,
                None => return Ok(items),
            }
        }

        warn!(what, max_pages, "page cap reached, listing truncated");
        Ok(items)
    }
}

/// Joins a configured base URL and a path, tolerating a trailing slash on the base.
pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
