use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::client::{ApiError, AzureDevOpsClient, WikiWriteApi, select_wiki};
use crate::config::SyncConfig;
use crate::error::PreconditionError;

/// Top-level knowledge folders synchronized by default.
pub const DEFAULT_FOLDERS: &[&str] = &["Networking", "Security", "DevOps"];

const SUPPORTED_TEXT_EXTS: &[&str] = &["md", "txt"];

const CODE_BLOCK_LANGS: &[(&str, &str)] = &[
    ("py", "python"),
    ("ps1", "powershell"),
    ("sh", "bash"),
    ("js", "javascript"),
    ("ts", "typescript"),
    ("json", "json"),
    ("yml", "yaml"),
    ("yaml", "yaml"),
    ("xml", "xml"),
    ("cs", "csharp"),
];

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub folders: Vec<String>,
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            folders: DEFAULT_FOLDERS.iter().map(|name| name.to_string()).collect(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPageResult {
    pub path: String,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub dry_run: bool,
    pub wiki: String,
    pub folders: usize,
    pub created: usize,
    pub updated: usize,
    pub conflicts: Vec<String>,
    pub errors: Vec<String>,
    pub pages: Vec<ImportPageResult>,
    pub request_count: usize,
}

pub fn import_tree(config: &SyncConfig, options: &ImportOptions) -> Result<ImportReport> {
    let mut client = AzureDevOpsClient::new(config)?;
    import_tree_with_api(config, options, &mut client)
}

/// Walk the allow-listed top-level folders under `config.knowledge_root` and
/// upsert one index page per folder plus one sub-page per immediate file.
///
/// Pages are independent units of work: a conflict that survives the single
/// re-read-and-retry, or any other per-page failure, is recorded and the run
/// continues with the remaining pages.
pub fn import_tree_with_api<A: WikiWriteApi>(
    config: &SyncConfig,
    options: &ImportOptions,
    api: &mut A,
) -> Result<ImportReport> {
    if !config.knowledge_root.exists() {
        return Err(PreconditionError::new(format!(
            "root folder not found: {}",
            config.knowledge_root.display()
        ))
        .into());
    }

    let mut report = ImportReport {
        success: true,
        dry_run: options.dry_run,
        wiki: config.wiki_name_or_default().to_string(),
        folders: 0,
        created: 0,
        updated: 0,
        conflicts: Vec::new(),
        errors: Vec::new(),
        pages: Vec::new(),
        request_count: 0,
    };

    let folders = selected_folders(&config.knowledge_root, &options.folders)?;
    if folders.is_empty() {
        return Ok(report);
    }

    let wiki_id = if options.dry_run {
        String::new()
    } else {
        ensure_wiki(api, config.wiki_name_or_default())?
    };

    for folder in folders {
        report.folders += 1;
        let folder_name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let files = immediate_files(&folder)?;

        let index_body = folder_index_body(&folder_name, &folder, &files)?;
        apply_upsert(api, &wiki_id, &folder_name, &index_body, options, &mut report);

        for file in &files {
            if is_index_file(file) {
                continue;
            }
            let page_path = make_page_path(&folder_name, file);
            let content = render_file(file);
            apply_upsert(api, &wiki_id, &page_path, &content, options, &mut report);
        }
    }

    report.request_count = api.request_count();
    report.success = report.errors.is_empty() && report.conflicts.is_empty();
    Ok(report)
}

/// Create-or-update with optimistic concurrency.
///
/// Reads the current page for its token; a present token drives an update, an
/// absent one a create. On conflict (create raced another actor, or the token
/// went stale) the page is re-read once and retried as an update; a second
/// conflict propagates to the caller.
pub fn upsert_page<A: WikiWriteApi>(
    api: &mut A,
    wiki_id: &str,
    path: &str,
    content: &str,
) -> Result<UpsertAction, ApiError> {
    let etag = api.get_page(wiki_id, path, false)?.and_then(|page| page.etag);
    let first = match &etag {
        Some(token) => api
            .update_page(wiki_id, path, content, token)
            .map(|()| UpsertAction::Updated),
        None => api
            .create_page(wiki_id, path, content)
            .map(|()| UpsertAction::Created),
    };

    match first {
        Ok(action) => Ok(action),
        Err(ApiError::Conflict { .. }) => {
            let token = api
                .get_page(wiki_id, path, false)?
                .and_then(|page| page.etag)
                .ok_or_else(|| ApiError::Conflict {
                    path: path.to_string(),
                })?;
            api.update_page(wiki_id, path, content, &token)
                .map(|()| UpsertAction::Updated)
        }
        Err(error) => Err(error),
    }
}

/// Page path for a local file: text files drop their extension, everything
/// else keeps the full file name.
pub fn make_page_path(folder_name: &str, file: &Path) -> String {
    format!("{folder_name}/{}", page_leaf_name(file))
}

/// Render a local file as page content: text files pass through verbatim,
/// other extensions are wrapped in a fenced code block tagged with the mapped
/// language. Unreadable files degrade to a placeholder note.
pub fn render_file(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let Ok(text) = fs::read_to_string(path) else {
        return format!("> Unable to display file `{file_name}` (binary or unreadable)");
    };

    if is_text_file(path) {
        return text;
    }
    let fence = match code_block_language(path) {
        Some(lang) => format!("```{lang}"),
        None => "```".to_string(),
    };
    format!("{fence}\n{text}\n```")
}

fn apply_upsert<A: WikiWriteApi>(
    api: &mut A,
    wiki_id: &str,
    path: &str,
    content: &str,
    options: &ImportOptions,
    report: &mut ImportReport,
) {
    if options.dry_run {
        report.pages.push(ImportPageResult {
            path: path.to_string(),
            action: "would_upsert".to_string(),
            detail: Some(format!("{} bytes", content.len())),
        });
        return;
    }

    match upsert_page(api, wiki_id, path, content) {
        Ok(UpsertAction::Created) => {
            report.created += 1;
            report.pages.push(ImportPageResult {
                path: path.to_string(),
                action: "created".to_string(),
                detail: None,
            });
        }
        Ok(UpsertAction::Updated) => {
            report.updated += 1;
            report.pages.push(ImportPageResult {
                path: path.to_string(),
                action: "updated".to_string(),
                detail: None,
            });
        }
        Err(ApiError::Conflict { .. }) => {
            report.conflicts.push(path.to_string());
            report.pages.push(ImportPageResult {
                path: path.to_string(),
                action: "conflict".to_string(),
                detail: Some("concurrency conflict persisted after retry".to_string()),
            });
        }
        Err(error) => {
            report.errors.push(format!("{path}: {error}"));
            report.pages.push(ImportPageResult {
                path: path.to_string(),
                action: "error".to_string(),
                detail: Some(error.to_string()),
            });
        }
    }
}

fn ensure_wiki<A: WikiWriteApi>(api: &mut A, name: &str) -> Result<String> {
    let wikis = api.list_wikis()?;
    if let Some(wiki) = select_wiki(&wikis, Some(name)) {
        return Ok(wiki.id.clone());
    }
    let created = api
        .create_wiki(name)
        .with_context(|| format!("failed to create wiki {name}"))?;
    Ok(created.id)
}

/// Index body for a folder page. A folder that carries its own `index.md`
/// provides the body verbatim, which keeps an exported tree importable
/// without rewriting container content; otherwise the body is a generated
/// link list over the folder's immediate files.
fn folder_index_body(folder_name: &str, folder: &Path, files: &[PathBuf]) -> Result<String> {
    let index_file = folder.join("index.md");
    if index_file.is_file() {
        return Ok(render_file(&index_file));
    }

    let mut lines = vec![format!("# {folder_name}"), String::new(), "Sub-pages:".to_string()];
    for file in files {
        if is_index_file(file) {
            continue;
        }
        let display = page_leaf_name(file);
        let page_path = make_page_path(folder_name, file);
        lines.push(format!("- [{display}]({page_path})"));
    }
    Ok(lines.join("\n"))
}

fn selected_folders(root: &Path, allow_list: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to scan {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if allow_list.iter().any(|allowed| allowed == name.as_ref()) {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn immediate_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("failed to scan {}", folder.display()))?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn page_leaf_name(file: &Path) -> String {
    if is_text_file(file) {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    } else {
        file.file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn is_index_file(file: &Path) -> bool {
    file.file_name()
        .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case("index.md"))
}

fn is_text_file(file: &Path) -> bool {
    extension_lowercase(file)
        .map(|ext| SUPPORTED_TEXT_EXTS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn code_block_language(file: &Path) -> Option<&'static str> {
    let ext = extension_lowercase(file)?;
    CODE_BLOCK_LANGS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, lang)| *lang)
}

fn extension_lowercase(file: &Path) -> Option<String> {
    file.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
