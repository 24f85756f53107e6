//! Project Online OData extraction client.
//!
//! All reads from the ProjectData feed: projects, tasks, resources,
//! assignments, and custom field metadata. Results are paged through
//! [`ODataPager`], which follows every `@odata.nextLink` lazily — one page
//! in memory at a time, consume-once. Every outbound request first takes a
//! rate-limit token, then runs under the retry engine.

use crate::auth::TokenProvider;
use crate::error::{MigrationError, Result};
use crate::retry::{self, RetryPolicy};
use crate::source::models::*;
use crate::source::rate_limit::RateLimiter;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Optional OData query clauses passed straight through to the feed.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub select: Option<String>,
    pub expand: Option<String>,
}

impl QueryOptions {
    fn append_to(&self, url: &mut reqwest::Url) {
        let mut pairs = url.query_pairs_mut();
        if let Some(f) = &self.filter {
            pairs.append_pair("$filter", f);
        }
        if let Some(s) = &self.select {
            pairs.append_pair("$select", s);
        }
        if let Some(e) = &self.expand {
            pairs.append_pair("$expand", e);
        }
    }
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl Inner {
    async fn fetch_page<T: DeserializeOwned>(&self, url: &str) -> Result<ODataPage<T>> {
        self.limiter.acquire().await;
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        let bearer = self.tokens.get_access_token().await?;
        retry::try_with(&self.retry, &self.cancel, || {
            // Build the request synchronously so the returned future owns it
            // outright; replays rebuild from scratch.
            let req = self
                .http
                .get(url)
                .bearer_auth(&bearer)
                .header(reqwest::header::ACCEPT, "application/json");
            async move {
                let resp = req.send().await.map_err(MigrationError::from_transport)?;

                let status = resp.status();
                if status.is_success() {
                    return resp
                        .json::<ODataPage<T>>()
                        .await
                        .map_err(MigrationError::from_transport);
                }

                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                let message = format!("source request failed with {status}");
                Err(match status.as_u16() {
                    429 => MigrationError::rate_limited(message, retry_after),
                    s => MigrationError::http_status(s, message),
                })
            }
        })
        .await
    }
}

/// Lazy, finite, consume-once page walker over one OData result set.
pub struct ODataPager<T> {
    inner: Arc<Inner>,
    next_url: Option<String>,
    buffer: VecDeque<T>,
}

impl<T: DeserializeOwned> ODataPager<T> {
    /// The next item, fetching pages as needed. `Ok(None)` means the last
    /// page was consumed; the pager cannot be restarted.
    pub async fn try_next(&mut self) -> Result<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            let Some(url) = self.next_url.take() else {
                return Ok(None);
            };
            let page: ODataPage<T> = self.inner.fetch_page(&url).await?;
            self.next_url = page.next_link;
            self.buffer.extend(page.value);
            // An empty page with a next link is legal; keep walking.
        }
    }

    /// Drain the remainder into a Vec. Convenience for callers that need the
    /// full snapshot anyway (the pipeline does, for cross-entity joins).
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.try_next().await? {
            out.push(item);
        }
        Ok(out)
    }
}

/// Client for the ProjectData OData surface.
pub struct SourceClient {
    inner: Arc<Inner>,
}

impl SourceClient {
    /// `source_url` is the PWA site root, e.g.
    /// `https://contoso.sharepoint.com/sites/pwa`.
    pub fn new(
        source_url: &str,
        tokens: Arc<dyn TokenProvider>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        reqwest::Url::parse(source_url).map_err(|e| {
            MigrationError::config(format!("PROJECT_ONLINE_URL is not a valid URL: {e}"))
        })?;
        let base_url = format!("{}/_api/ProjectData", source_url.trim_end_matches('/'));
        Ok(Self::with_base_url(base_url, tokens, limiter, retry, cancel))
    }

    /// Base-URL override for tests pointing at a local server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                tokens,
                limiter,
                retry,
                cancel,
            }),
        }
    }

    fn pager<T: DeserializeOwned>(&self, path: &str, opts: &QueryOptions) -> Result<ODataPager<T>> {
        let mut url = reqwest::Url::parse(&format!("{}/{}", self.inner.base_url, path))
            .map_err(|e| MigrationError::config(format!("bad OData path {path}: {e}")))?;
        opts.append_to(&mut url);
        Ok(ODataPager {
            inner: self.inner.clone(),
            next_url: Some(url.to_string()),
            buffer: VecDeque::new(),
        })
    }

    /// All projects visible to the caller.
    pub fn list_projects(&self, opts: &QueryOptions) -> Result<ODataPager<Project>> {
        self.pager("Projects", opts)
    }

    /// One project by id, or None when the feed has no such project.
    pub async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let opts = QueryOptions {
            filter: Some(format!("ProjectId eq guid'{project_id}'")),
            ..Default::default()
        };
        let mut pager = self.list_projects(&opts)?;
        pager.try_next().await
    }

    /// Tasks of one project.
    pub fn list_tasks(
        &self,
        project_id: &str,
        opts: &QueryOptions,
    ) -> Result<ODataPager<ProjectTask>> {
        self.pager(&format!("Projects(guid'{project_id}')/Tasks"), opts)
    }

    /// Resources — the whole enterprise pool, or one project's share.
    pub fn list_resources(&self, project_id: Option<&str>) -> Result<ODataPager<Resource>> {
        match project_id {
            Some(id) => self.pager(
                &format!("Projects(guid'{id}')/ProjectResources"),
                &QueryOptions::default(),
            ),
            None => self.pager("Resources", &QueryOptions::default()),
        }
    }

    /// Assignments of one project.
    pub fn list_assignments(&self, project_id: &str) -> Result<ODataPager<Assignment>> {
        self.pager(
            &format!("Projects(guid'{project_id}')/Assignments"),
            &QueryOptions::default(),
        )
    }

    /// Custom field metadata, grouped by the entity kind the field attaches
    /// to (`Project` / `Task` / `Resource`).
    pub async fn get_custom_field_schema(&self) -> Result<HashMap<String, Vec<CustomFieldDef>>> {
        let opts = QueryOptions {
            expand: Some("LookupEntries".into()),
            ..Default::default()
        };
        let defs: Vec<CustomFieldDef> = self
            .pager::<CustomFieldDef>("CustomFields", &opts)?
            .collect_all()
            .await?;
        let mut grouped: HashMap<String, Vec<CustomFieldDef>> = HashMap::new();
        for def in defs {
            let kind = def
                .entity_type
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            grouped.entry(kind).or_default().push(def);
        }
        Ok(grouped)
    }
}
