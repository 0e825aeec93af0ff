use std::path::Path;

use serde::Serialize;

const KNOWN_CATEGORY_FOLDERS: &[(&str, Category)] = &[
    ("Networking", Category::Networking),
    ("Security", Category::Security),
    ("DevOps", Category::DevOps),
];

const NETWORKING_KEYWORDS: &[&str] = &["vpn", "subnet", "network", "gateway", "cidr", "dns"];
const SECURITY_KEYWORDS: &[&str] = &[
    "incident",
    "vulnerability",
    "threat",
    "siem",
    "soc",
    "security",
];

const CODE_SUFFIX_EXTS: &[&str] = &[
    "py", "ps1", "sh", "js", "ts", "yaml", "yml", "json", "xml", "cs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Networking,
    Security,
    DevOps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Code,
    MeetingNotes,
    Knowledge,
    Credentials,
    Others,
}

/// Category of a document. The top-level folder decides when it names a known
/// category; otherwise content keywords decide (networking terms checked
/// before security terms), and everything left over files under DevOps.
pub fn infer_category(relative_path: &Path, content: &str) -> Category {
    if let Some(top) = top_folder(relative_path) {
        for (name, category) in KNOWN_CATEGORY_FOLDERS {
            if top == *name {
                return *category;
            }
        }
    }

    let lowered = content.to_ascii_lowercase();
    if contains_any(&lowered, NETWORKING_KEYWORDS) {
        Category::Networking
    } else if contains_any(&lowered, SECURITY_KEYWORDS) {
        Category::Security
    } else {
        Category::DevOps
    }
}

/// Document type from the file name alone, first match wins: meeting-note
/// markers, knowledge markers, credential markers, then code files exported
/// as `<name>.<ext>.md`.
pub fn infer_type(file_name: &str) -> DocType {
    let lowered = file_name.to_ascii_lowercase();
    if lowered.contains("meeting-notes") || lowered.contains("meeting_notes") {
        return DocType::MeetingNotes;
    }
    if lowered.starts_with("knowledge") || lowered.contains("knowledge-") {
        return DocType::Knowledge;
    }
    if lowered.contains("credentials") {
        return DocType::Credentials;
    }
    if has_code_suffix(&lowered) {
        return DocType::Code;
    }
    DocType::Others
}

fn top_folder(relative_path: &Path) -> Option<&str> {
    let mut components = relative_path.components();
    let first = components.next()?;
    // A bare file name has no folder component.
    components.next()?;
    first.as_os_str().to_str()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn has_code_suffix(lowered_name: &str) -> bool {
    let Some(without_md) = lowered_name.strip_suffix(".md") else {
        return false;
    };
    CODE_SUFFIX_EXTS
        .iter()
        .any(|ext| without_md.ends_with(&format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{Category, DocType, infer_category, infer_type};

    #[test]
    fn category_follows_known_top_folder() {
        assert_eq!(
            infer_category(Path::new("Networking/notes.md"), "nothing relevant"),
            Category::Networking
        );
        assert_eq!(
            infer_category(Path::new("Security/siem.md"), ""),
            Category::Security
        );
        // Folder wins over content keywords.
        assert_eq!(
            infer_category(Path::new("DevOps/pipeline.md"), "vpn everywhere"),
            Category::DevOps
        );
    }

    #[test]
    fn category_falls_back_to_content_keywords() {
        assert_eq!(
            infer_category(Path::new("Misc/notes.md"), "the vpn gateway flapped"),
            Category::Networking
        );
        assert_eq!(
            infer_category(Path::new("Misc/report.md"), "SIEM triage for the incident"),
            Category::Security
        );
    }

    #[test]
    fn unknown_folder_without_keywords_defaults_to_devops() {
        assert_eq!(
            infer_category(Path::new("Misc/shopping.md"), "milk, eggs"),
            Category::DevOps
        );
        assert_eq!(infer_category(Path::new("loose.md"), ""), Category::DevOps);
    }

    #[test]
    fn type_detects_meeting_notes_regardless_of_content() {
        assert_eq!(infer_type("meeting-notes-2024.md"), DocType::MeetingNotes);
        assert_eq!(infer_type("Q3_Meeting_Notes.md"), DocType::MeetingNotes);
    }

    #[test]
    fn type_detects_knowledge_and_credentials() {
        assert_eq!(infer_type("knowledge-base-vpn.md"), DocType::Knowledge);
        assert_eq!(infer_type("wifi-credentials.md"), DocType::Credentials);
    }

    #[test]
    fn type_detects_code_through_double_extensions() {
        assert_eq!(infer_type("backup.ps1.md"), DocType::Code);
        assert_eq!(infer_type("probe.py.md"), DocType::Code);
        assert_eq!(infer_type("pipeline.yaml.md"), DocType::Code);
        // A plain markdown page is not code.
        assert_eq!(infer_type("deploy.md"), DocType::Others);
    }

    #[test]
    fn type_defaults_to_others() {
        assert_eq!(infer_type("random-thoughts.md"), DocType::Others);
        assert_eq!(infer_type("index.md"), DocType::Others);
    }
}
