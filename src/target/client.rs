//! Smartsheet REST client.
//!
//! Thin typed wrapper over the HTTP surface. Every request runs through the
//! retry engine; HTTP statuses are mapped into the error taxonomy before
//! they reach callers. Multi-element creates go out as one request per batch.

use crate::error::{MigrationError, Result};
use crate::retry::{self, RetryPolicy};
use crate::target::models::*;
use crate::target::traits::SheetStore;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const DEFAULT_BASE_URL: &str = "https://api.smartsheet.com/2.0";

/// Client for the Smartsheet REST API.
pub struct SmartsheetClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

/// List endpoints wrap their payload in `data`.
#[derive(Deserialize)]
struct IndexResult<T> {
    data: Vec<T>,
}

/// Mutation endpoints wrap their payload in `result`.
#[derive(Deserialize)]
struct ActionResult<T> {
    result: T,
}

/// Error body shape returned by the API.
#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Workspace GET response carries its sheets inline.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceDetail {
    id: u64,
    name: String,
    permalink: Option<String>,
    access_level: Option<String>,
    #[serde(default)]
    sheets: Vec<SheetInfo>,
}

impl SmartsheetClient {
    pub fn new(token: impl Into<String>, retry: RetryPolicy, cancel: CancellationToken) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, token, retry, cancel)
    }

    /// Base-URL override for tests and regional endpoints.
    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry,
            cancel,
        }
    }

    async fn request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        retry::try_with(&self.retry, &self.cancel, || {
            // Build the request synchronously so the returned future owns it
            // outright; replays rebuild from scratch.
            let mut req = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token);
            if let Some(b) = body {
                req = req.json(b);
            }
            async move {
                let resp = req.send().await.map_err(MigrationError::from_transport)?;
                Self::decode(resp).await
            }
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(MigrationError::from_transport);
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let message = resp
            .json::<ApiError>()
            .await
            .map(|e| e.message)
            .unwrap_or_default();
        let message = if message.is_empty() {
            format!("request failed with {}", status)
        } else {
            message
        };

        Err(match status {
            StatusCode::FORBIDDEN => MigrationError::permission(message),
            StatusCode::TOO_MANY_REQUESTS => MigrationError::rate_limited(message, retry_after),
            _ => MigrationError::http_status(status.as_u16(), message),
        })
    }
}

#[async_trait]
impl SheetStore for SmartsheetClient {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let index: IndexResult<Workspace> = self
            .request(Method::GET, "/workspaces?includeAll=true", None::<&()>)
            .await?;
        Ok(index.data)
    }

    async fn get_workspace(&self, workspace_id: u64) -> Result<Workspace> {
        let detail: WorkspaceDetail = self
            .request(
                Method::GET,
                &format!("/workspaces/{}", workspace_id),
                None::<&()>,
            )
            .await?;
        Ok(Workspace {
            id: detail.id,
            name: detail.name,
            permalink: detail.permalink,
            access_level: detail.access_level,
        })
    }

    async fn get_workspace_sheets(&self, workspace_id: u64) -> Result<Vec<SheetInfo>> {
        let detail: WorkspaceDetail = self
            .request(
                Method::GET,
                &format!("/workspaces/{}", workspace_id),
                None::<&()>,
            )
            .await?;
        Ok(detail.sheets)
    }

    async fn create_workspace(&self, name: &str) -> Result<Workspace> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
        }
        let created: ActionResult<Workspace> = self
            .request(Method::POST, "/workspaces", Some(&Body { name }))
            .await?;
        Ok(created.result)
    }

    async fn get_sheet(&self, sheet_id: u64) -> Result<Sheet> {
        self.request(Method::GET, &format!("/sheets/{}", sheet_id), None::<&()>)
            .await
    }

    async fn create_sheet_in_workspace(
        &self,
        workspace_id: u64,
        spec: &SheetSpec,
    ) -> Result<Sheet> {
        let created: ActionResult<Sheet> = self
            .request(
                Method::POST,
                &format!("/workspaces/{}/sheets", workspace_id),
                Some(spec),
            )
            .await?;
        Ok(created.result)
    }

    async fn rename_sheet(&self, sheet_id: u64, new_name: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
        }
        let _: ActionResult<Sheet> = self
            .request(
                Method::PUT,
                &format!("/sheets/{}", sheet_id),
                Some(&Body { name: new_name }),
            )
            .await?;
        Ok(())
    }

    async fn delete_rows(&self, sheet_id: u64, row_ids: &[u64]) -> Result<usize> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        let ids = row_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let _: serde_json::Value = self
            .request(
                Method::DELETE,
                &format!("/sheets/{}/rows?ids={}&ignoreRowsNotFound=true", sheet_id, ids),
                None::<&()>,
            )
            .await?;
        Ok(row_ids.len())
    }

    async fn copy_sheet_to_workspace(
        &self,
        sheet_id: u64,
        workspace_id: u64,
        new_name: &str,
    ) -> Result<Sheet> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            destination_type: &'a str,
            destination_id: u64,
            new_name: &'a str,
        }
        let copied: ActionResult<Sheet> = self
            .request(
                Method::POST,
                &format!("/sheets/{}/copy?include=data", sheet_id),
                Some(&Body {
                    destination_type: "workspace",
                    destination_id: workspace_id,
                    new_name,
                }),
            )
            .await?;
        // The copy result is a stub; fetch the full sheet for columns and rows.
        self.get_sheet(copied.result.id).await
    }

    async fn add_columns(&self, sheet_id: u64, columns: &[Column]) -> Result<Vec<Column>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let created: ActionResult<Vec<Column>> = self
            .request(
                Method::POST,
                &format!("/sheets/{}/columns", sheet_id),
                Some(&columns),
            )
            .await?;
        Ok(created.result)
    }

    async fn update_column(&self, sheet_id: u64, column: &Column) -> Result<Column> {
        let column_id = column.id.ok_or_else(|| {
            MigrationError::data("cannot update a column that has no id")
        })?;
        let updated: ActionResult<Column> = self
            .request(
                Method::PUT,
                &format!("/sheets/{}/columns/{}", sheet_id, column_id),
                Some(column),
            )
            .await?;
        Ok(updated.result)
    }

    async fn add_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let created: ActionResult<Vec<Row>> = self
            .request(
                Method::POST,
                &format!("/sheets/{}/rows", sheet_id),
                Some(&rows),
            )
            .await?;
        Ok(created.result)
    }

    async fn update_rows(&self, sheet_id: u64, rows: &[Row]) -> Result<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let updated: ActionResult<Vec<Row>> = self
            .request(
                Method::PUT,
                &format!("/sheets/{}/rows", sheet_id),
                Some(&rows),
            )
            .await?;
        Ok(updated.result)
    }
}
