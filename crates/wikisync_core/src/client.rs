use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::SyncConfig;

pub const API_VERSION: &str = "7.2-preview";

/// Typed failure surface for every remote-call wrapper. Callers match on the
/// kind instead of catching generic failures; `Conflict` is the only variant
/// the upsert protocol recovers from.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} failed with HTTP {status}: {detail}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        detail: String,
    },
    #[error("concurrency conflict for page {path}")]
    Conflict { path: String },
    #[error("failed to decode {operation} response: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub wiki_type: Option<String>,
}

/// One page read from the remote wiki. `etag` is the opaque concurrency token
/// presented back on update; `content` is filled only when requested.
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub path: String,
    pub content: Option<String>,
    pub etag: Option<String>,
}

pub trait WikiReadApi {
    fn list_wikis(&mut self) -> Result<Vec<WikiDescriptor>, ApiError>;
    /// All page paths of the wiki via a full-recursion listing, deduplicated
    /// and order-preserving.
    fn list_page_paths(&mut self, wiki_id: &str) -> Result<Vec<String>, ApiError>;
    /// `Ok(None)` when the page does not exist.
    fn get_page(
        &mut self,
        wiki_id: &str,
        path: &str,
        include_content: bool,
    ) -> Result<Option<PageRecord>, ApiError>;
    fn request_count(&self) -> usize;
}

pub trait WikiWriteApi: WikiReadApi {
    fn create_wiki(&mut self, name: &str) -> Result<WikiDescriptor, ApiError>;
    fn create_page(&mut self, wiki_id: &str, path: &str, content: &str) -> Result<(), ApiError>;
    fn update_page(
        &mut self,
        wiki_id: &str,
        path: &str,
        content: &str,
        etag: &str,
    ) -> Result<(), ApiError>;
}

/// Pick a wiki from a listing: by name when one is configured, otherwise
/// prefer the project wiki, otherwise the first entry.
pub fn select_wiki<'a>(
    wikis: &'a [WikiDescriptor],
    name: Option<&str>,
) -> Option<&'a WikiDescriptor> {
    if let Some(name) = name {
        return wikis.iter().find(|wiki| wiki.name == name);
    }
    wikis
        .iter()
        .find(|wiki| {
            wiki.wiki_type
                .as_deref()
                .is_some_and(|kind| kind.eq_ignore_ascii_case("projectWiki"))
        })
        .or_else(|| wikis.first())
}

/// Normalize the two listing response shapes into one deduplicated,
/// order-preserving path sequence: either `{"value": [{"path": ...}, ...]}`
/// or a nested tree node carrying `subPages` arrays.
pub fn normalize_page_listing(payload: &Value) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    if let Some(items) = payload.get("value").and_then(Value::as_array) {
        for item in items {
            if let Some(path) = item.get("path").and_then(Value::as_str) {
                push_unique(path, &mut seen, &mut out);
            }
        }
        return out;
    }

    walk_page_node(payload, &mut seen, &mut out);
    out
}

fn walk_page_node(node: &Value, seen: &mut BTreeSet<String>, out: &mut Vec<String>) {
    if let Some(path) = node.get("path").and_then(Value::as_str) {
        push_unique(path, seen, out);
    }
    if let Some(children) = node.get("subPages").and_then(Value::as_array) {
        for child in children {
            walk_page_node(child, seen, out);
        }
    }
}

fn push_unique(path: &str, seen: &mut BTreeSet<String>, out: &mut Vec<String>) {
    if seen.insert(path.to_string()) {
        out.push(path.to_string());
    }
}

/// Blocking Azure DevOps wiki REST client. One request in flight at a time;
/// no automatic retries (the upsert conflict retry lives in the importer).
pub struct AzureDevOpsClient {
    client: Client,
    org_url: String,
    project: String,
    pat: String,
    request_count: usize,
}

impl AzureDevOpsClient {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Azure DevOps HTTP client")?;
        Ok(Self {
            client,
            org_url: config.org_url.clone(),
            project: config.project.clone(),
            pat: config.pat.clone(),
            request_count: 0,
        })
    }

    fn wikis_url(&self) -> String {
        format!("{}/{}/_apis/wiki/wikis", self.org_url, self.project)
    }

    fn pages_url(&self, wiki_id: &str) -> String {
        format!(
            "{}/{}/_apis/wiki/wikis/{}/pages",
            self.org_url, self.project, wiki_id
        )
    }

    fn send_json(
        &mut self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Value, ApiError> {
        let response = self.send(operation, request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(operation, status, response));
        }
        decode_json(operation, response)
    }

    fn send(
        &mut self,
        operation: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response, ApiError> {
        self.request_count += 1;
        request
            .basic_auth("", Some(self.pat.clone()))
            .header("Accept", "application/json")
            .send()
            .map_err(|source| ApiError::Transport { operation, source })
    }
}

impl WikiReadApi for AzureDevOpsClient {
    fn list_wikis(&mut self) -> Result<Vec<WikiDescriptor>, ApiError> {
        let url = self.wikis_url();
        let request = self
            .client
            .get(url)
            .query(&[("api-version", API_VERSION)]);
        let payload = self.send_json("list wikis", request)?;
        let wikis = payload.get("value").cloned().unwrap_or_else(|| json!([]));
        serde_json::from_value(wikis).map_err(|error| ApiError::Decode {
            operation: "list wikis",
            detail: error.to_string(),
        })
    }

    fn list_page_paths(&mut self, wiki_id: &str) -> Result<Vec<String>, ApiError> {
        let url = self.pages_url(wiki_id);
        let request = self.client.get(url).query(&[
            ("recursionLevel", "Full"),
            ("api-version", API_VERSION),
        ]);
        let payload = self.send_json("list pages", request)?;
        Ok(normalize_page_listing(&payload))
    }

    fn get_page(
        &mut self,
        wiki_id: &str,
        path: &str,
        include_content: bool,
    ) -> Result<Option<PageRecord>, ApiError> {
        let url = self.pages_url(wiki_id);
        let request = self.client.get(url).query(&[
            ("path", path),
            (
                "includeContent",
                if include_content { "true" } else { "false" },
            ),
            ("api-version", API_VERSION),
        ]);
        let response = self.send("get page", request)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error("get page", status, response));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_matches('"').to_string());
        let payload = decode_json("get page", response)?;
        let content = payload
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Some(PageRecord {
            path: path.to_string(),
            content,
            etag,
        }))
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

impl WikiWriteApi for AzureDevOpsClient {
    fn create_wiki(&mut self, name: &str) -> Result<WikiDescriptor, ApiError> {
        let url = self.wikis_url();
        let request = self
            .client
            .post(url)
            .query(&[("api-version", API_VERSION)])
            .json(&json!({ "name": name, "type": "projectWiki" }));
        let payload = self.send_json("create wiki", request)?;
        serde_json::from_value(payload).map_err(|error| ApiError::Decode {
            operation: "create wiki",
            detail: error.to_string(),
        })
    }

    fn create_page(&mut self, wiki_id: &str, path: &str, content: &str) -> Result<(), ApiError> {
        let url = self.pages_url(wiki_id);
        let request = self
            .client
            .put(url)
            .query(&[("path", path), ("api-version", API_VERSION)])
            .json(&json!({ "content": content }));
        let response = self.send("create page", request)?;
        check_write_status("create page", path, response)
    }

    fn update_page(
        &mut self,
        wiki_id: &str,
        path: &str,
        content: &str,
        etag: &str,
    ) -> Result<(), ApiError> {
        let url = self.pages_url(wiki_id);
        let request = self
            .client
            .patch(url)
            .query(&[("path", path), ("api-version", API_VERSION)])
            .header(reqwest::header::IF_MATCH, etag)
            .json(&json!({ "content": content }));
        let response = self.send("update page", request)?;
        check_write_status("update page", path, response)
    }
}

fn check_write_status(
    operation: &'static str,
    path: &str,
    response: Response,
) -> Result<(), ApiError> {
    let status = response.status();
    if status == StatusCode::OK || status == StatusCode::CREATED {
        return Ok(());
    }
    if status == StatusCode::CONFLICT || status == StatusCode::PRECONDITION_FAILED {
        return Err(ApiError::Conflict {
            path: path.to_string(),
        });
    }
    Err(status_error(operation, status, response))
}

fn status_error(operation: &'static str, status: StatusCode, response: Response) -> ApiError {
    let mut detail = response.text().unwrap_or_default();
    detail.truncate(2000);
    ApiError::Status {
        operation,
        status,
        detail,
    }
}

fn decode_json(operation: &'static str, response: Response) -> Result<Value, ApiError> {
    response.json().map_err(|error| ApiError::Decode {
        operation,
        detail: error.to_string(),
    })
}
