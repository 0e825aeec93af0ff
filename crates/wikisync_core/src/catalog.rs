use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use walkdir::WalkDir;

use crate::classify::{Category, DocType, infer_category, infer_type};
use crate::error::PreconditionError;

/// One exported page in the knowledge catalog. `id` is a 1-based running
/// number in scan order, serialized as a string.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub file_name: String,
    pub category: Category,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
struct CatalogDocument {
    items: Vec<KnowledgeItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogReport {
    pub items: usize,
    pub output_path: String,
    pub networking: usize,
    pub security: usize,
    pub devops: usize,
}

/// Aggregate every exported `.md` file under `input_dir` into one pretty JSON
/// document at `output_path`.
///
/// `Home.md` and `index.md` files are navigation artifacts and skipped
/// (case-insensitive). A file whose content cannot be read as UTF-8 still
/// gets an item, with empty content, so the catalog always covers the full
/// tree.
pub fn build_catalog(input_dir: &Path, output_path: &Path) -> Result<CatalogReport> {
    if !input_dir.exists() {
        return Err(PreconditionError::new(format!(
            "input folder not found: {}",
            input_dir.display()
        ))
        .into());
    }

    let mut items = Vec::new();
    for file in markdown_files(input_dir)? {
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if is_navigation_file(&file_name) {
            continue;
        }

        let content = fs::read_to_string(&file).unwrap_or_default();
        let relative = file.strip_prefix(input_dir).unwrap_or(&file);
        items.push(KnowledgeItem {
            id: (items.len() + 1).to_string(),
            category: infer_category(relative, &content),
            doc_type: infer_type(&file_name),
            file_name,
            content,
        });
    }

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let document = CatalogDocument { items };
    let json = serde_json::to_string_pretty(&document).context("failed to serialize catalog")?;
    fs::write(output_path, json)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    let count_for = |category: Category| {
        document
            .items
            .iter()
            .filter(|item| item.category == category)
            .count()
    };
    Ok(CatalogReport {
        items: document.items.len(),
        output_path: output_path.to_string_lossy().replace('\\', "/"),
        networking: count_for(Category::Networking),
        security: count_for(Category::Security),
        devops: count_for(Category::DevOps),
    })
}

fn markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to scan {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_markdown = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("md"));
        if is_markdown {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn is_navigation_file(file_name: &str) -> bool {
    let lowered = file_name.to_ascii_lowercase();
    lowered == "home.md" || lowered == "index.md"
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use serde_json::Value;
    use tempfile::tempdir;

    use super::build_catalog;
    use crate::error::PreconditionError;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write file");
    }

    #[test]
    fn catalog_collects_and_classifies_markdown() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("wiki-export");
        write_file(&input.join("Networking").join("vpn.md"), "tunnel config");
        write_file(&input.join("Security").join("wifi-credentials.md"), "ssid");
        write_file(&input.join("Networking").join("index.md"), "nav");
        write_file(&input.join("Home").join("index.md"), "welcome");
        write_file(&input.join("notes.txt"), "not markdown");
        let output = temp.path().join("it_knowledge.json");

        let report = build_catalog(&input, &output).expect("catalog");

        assert_eq!(report.items, 2);
        assert_eq!(report.networking, 1);
        assert_eq!(report.security, 1);
        assert_eq!(report.devops, 0);

        let json: Value =
            serde_json::from_str(&fs::read_to_string(&output).expect("read output"))
                .expect("parse output");
        let items = json["items"].as_array().expect("items array");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "1");
        assert_eq!(items[1]["id"], "2");
        let credentials = items
            .iter()
            .find(|item| item["file_name"] == "wifi-credentials.md")
            .expect("credentials item");
        assert_eq!(credentials["category"], "Security");
        assert_eq!(credentials["type"], "credentials");
        assert_eq!(credentials["content"], "ssid");
    }

    #[test]
    fn catalog_skips_home_and_index_case_insensitively() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("wiki-export");
        write_file(&input.join("HOME.md"), "welcome");
        write_file(&input.join("DevOps").join("Index.md"), "nav");
        write_file(&input.join("DevOps").join("pipeline.md"), "stages");
        let output = temp.path().join("it_knowledge.json");

        let report = build_catalog(&input, &output).expect("catalog");
        assert_eq!(report.items, 1);
        assert_eq!(report.devops, 1);
    }

    #[test]
    fn catalog_fails_with_precondition_for_missing_input() {
        let temp = tempdir().expect("tempdir");
        let error = build_catalog(
            &temp.path().join("absent"),
            &temp.path().join("it_knowledge.json"),
        )
        .expect_err("must fail");
        assert!(error.downcast_ref::<PreconditionError>().is_some());
    }

    #[test]
    fn empty_input_yields_empty_items_array() {
        let temp = tempdir().expect("tempdir");
        let input = temp.path().join("wiki-export");
        fs::create_dir_all(&input).expect("create input");
        let output = temp.path().join("it_knowledge.json");

        let report = build_catalog(&input, &output).expect("catalog");
        assert_eq!(report.items, 0);
        let json: Value =
            serde_json::from_str(&fs::read_to_string(&output).expect("read output"))
                .expect("parse output");
        assert_eq!(json["items"].as_array().expect("items").len(), 0);
    }
}
