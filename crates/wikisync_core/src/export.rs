use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::client::{AzureDevOpsClient, WikiReadApi, select_wiki};
use crate::config::SyncConfig;
use crate::error::PreconditionError;
use crate::paths::{LocalPathMapper, container_paths, normalize_page_path};

#[derive(Debug, Clone, Serialize)]
pub struct ExportPageResult {
    pub path: String,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub wiki: String,
    pub requested_pages: usize,
    pub exported: usize,
    pub created_dirs: usize,
    pub skipped: usize,
    pub pages: Vec<ExportPageResult>,
    pub request_count: usize,
}

pub fn export_wiki(config: &SyncConfig) -> Result<ExportReport> {
    let mut client = AzureDevOpsClient::new(config)?;
    export_wiki_with_api(config, &mut client)
}

/// Mirror the remote wiki hierarchy into `config.output_dir`.
///
/// Containers become directories (created even when the container page has no
/// content); a container with content additionally gets an `index.md`. Leaves
/// become `<segment>.md` under their parent chain, and a leaf whose content
/// fetch returns nothing is skipped without failing the run. Any listing or
/// fetch failure aborts the whole run.
pub fn export_wiki_with_api<A: WikiReadApi>(
    config: &SyncConfig,
    api: &mut A,
) -> Result<ExportReport> {
    let wikis = api.list_wikis()?;
    let wiki = select_wiki(&wikis, config.wiki_name.as_deref())
        .ok_or_else(|| {
            PreconditionError::new(format!(
                "wiki not found: {}",
                config.wiki_name.as_deref().unwrap_or("<any project wiki>")
            ))
        })?
        .clone();

    let mut report = ExportReport {
        wiki: wiki.name.clone(),
        requested_pages: 0,
        exported: 0,
        created_dirs: 0,
        skipped: 0,
        pages: Vec::new(),
        request_count: 0,
    };

    let listed = api.list_page_paths(&wiki.id)?;
    report.requested_pages = listed.len();
    if listed.is_empty() {
        report.request_count = api.request_count();
        return Ok(report);
    }

    let normalized: Vec<String> = listed.iter().map(|path| normalize_page_path(path)).collect();
    let containers = container_paths(&normalized);

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;

    let mut mapper = LocalPathMapper::new();
    for path in &normalized {
        let segments = mapper.local_segments(path);
        // The pages endpoint addresses the root as "/".
        let fetch_path = if path.is_empty() { "/" } else { path.as_str() };

        if containers.contains(path) {
            let dir_path = join_segments(&config.output_dir, &segments);
            fs::create_dir_all(&dir_path)
                .with_context(|| format!("failed to create {}", dir_path.display()))?;
            report.created_dirs += 1;

            let content = fetch_content(api, &wiki.id, fetch_path)?;
            match content {
                Some(content) if !content.is_empty() => {
                    let index_path = dir_path.join("index.md");
                    fs::write(&index_path, &content)
                        .with_context(|| format!("failed to write {}", index_path.display()))?;
                    report.exported += 1;
                    report.pages.push(ExportPageResult {
                        path: path.clone(),
                        action: "index".to_string(),
                        detail: Some(display_path(&index_path)),
                    });
                }
                _ => {
                    report.pages.push(ExportPageResult {
                        path: path.clone(),
                        action: "folder".to_string(),
                        detail: Some(display_path(&dir_path)),
                    });
                }
            }
        } else {
            let parent_dir = join_segments(&config.output_dir, &segments[..segments.len() - 1]);
            fs::create_dir_all(&parent_dir)
                .with_context(|| format!("failed to create {}", parent_dir.display()))?;

            let Some(content) = fetch_content(api, &wiki.id, fetch_path)? else {
                report.skipped += 1;
                report.pages.push(ExportPageResult {
                    path: path.clone(),
                    action: "skipped".to_string(),
                    detail: Some("no content".to_string()),
                });
                continue;
            };
            let leaf_path = parent_dir.join(format!("{}.md", segments[segments.len() - 1]));
            fs::write(&leaf_path, &content)
                .with_context(|| format!("failed to write {}", leaf_path.display()))?;
            report.exported += 1;
            report.pages.push(ExportPageResult {
                path: path.clone(),
                action: "exported".to_string(),
                detail: Some(display_path(&leaf_path)),
            });
        }
    }

    report.request_count = api.request_count();
    Ok(report)
}

fn fetch_content<A: WikiReadApi>(
    api: &mut A,
    wiki_id: &str,
    path: &str,
) -> Result<Option<String>> {
    let page = api
        .get_page(wiki_id, path, true)
        .with_context(|| format!("failed to fetch content for {path}"))?;
    Ok(page.and_then(|record| record.content))
}

fn join_segments(root: &std::path::Path, segments: &[String]) -> PathBuf {
    let mut out = root.to_path_buf();
    for segment in segments {
        out.push(segment);
    }
    out
}

fn display_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
