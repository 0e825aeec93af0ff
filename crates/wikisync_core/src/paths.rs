use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use sha2::{Digest, Sha256};

/// Local name for the wiki root page (`/`).
pub const ROOT_PAGE_NAME: &str = "Home";

const ILLEGAL_SEGMENT_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const FALLBACK_SEGMENT: &str = "untitled";

/// Rewrite a raw page-path segment into a file-system-safe name.
///
/// Each blocklisted character becomes `_`; leading whitespace and any trailing
/// run of whitespace and periods are trimmed so the result is a valid Windows
/// file name and the function is idempotent. A segment with nothing left
/// after dropping blocklisted characters and trimming falls back to
/// `untitled`, so an all-illegal input never degrades to a row of
/// underscores. Characters outside the blocklist pass through untouched.
pub fn sanitize_segment(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|ch| !ILLEGAL_SEGMENT_CHARS.contains(ch))
        .collect();
    if trim_segment(&kept).is_empty() {
        return FALLBACK_SEGMENT.to_string();
    }

    let replaced: String = name
        .chars()
        .map(|ch| {
            if ILLEGAL_SEGMENT_CHARS.contains(&ch) {
                '_'
            } else {
                ch
            }
        })
        .collect();
    trim_segment(&replaced).to_string()
}

fn trim_segment(value: &str) -> &str {
    value
        .trim_start()
        .trim_end_matches(|ch: char| ch == '.' || ch.is_whitespace())
}

/// Normalize a remote page path: trim surrounding whitespace and any trailing
/// slash. The root page normalizes to the empty string.
pub fn normalize_page_path(path: &str) -> String {
    path.trim().trim_end_matches('/').to_string()
}

/// Split a normalized page path into raw segments. The root path yields the
/// single default segment.
pub fn page_segments(path: &str) -> Vec<String> {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        vec![ROOT_PAGE_NAME.to_string()]
    } else {
        segments
    }
}

/// Classify containers among a set of normalized page paths: `P` is a
/// container iff some other path starts with `P + "/"`.
///
/// Sorted-set prefix probe: the first element at or after `P + "/"` in
/// lexicographic order starts with that prefix iff `P` has a descendant, so
/// one range lookup per path replaces the quadratic pairwise scan.
pub fn container_paths(paths: &[String]) -> BTreeSet<String> {
    let sorted: BTreeSet<&str> = paths.iter().map(String::as_str).collect();
    let mut containers = BTreeSet::new();
    for path in &sorted {
        let prefix = format!("{path}/");
        let has_child = sorted
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .next()
            .is_some_and(|candidate| candidate.starts_with(prefix.as_str()));
        if has_child {
            containers.insert((*path).to_string());
        }
    }
    containers
}

/// Maps remote page paths to local path segments, resolving sanitization
/// collisions within a run.
///
/// Two distinct raw segments under the same parent can sanitize to the same
/// name (`"x?"` and `"x*"` both become `"x_"`). The first arrival keeps the
/// plain name; later arrivals get a `-<hash>` suffix derived from the raw
/// segment, so the mapping is deterministic for a given listing order and the
/// same raw path always maps to the same local path.
#[derive(Debug, Default)]
pub struct LocalPathMapper {
    assigned: BTreeMap<(String, String), String>,
    taken: BTreeMap<(String, String), String>,
}

impl LocalPathMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Local path segments for a normalized remote page path.
    pub fn local_segments(&mut self, path: &str) -> Vec<String> {
        let mut parent = String::new();
        let mut out = Vec::new();
        for raw in page_segments(path) {
            let segment = self.allocate(&parent, &raw);
            parent = if parent.is_empty() {
                segment.clone()
            } else {
                format!("{parent}/{segment}")
            };
            out.push(segment);
        }
        out
    }

    fn allocate(&mut self, parent: &str, raw: &str) -> String {
        let key = (parent.to_string(), raw.to_string());
        if let Some(existing) = self.assigned.get(&key) {
            return existing.clone();
        }

        let base = sanitize_segment(raw);
        let mut candidate = base.clone();
        for hash_len in [8, 16, 64] {
            match self.taken.get(&(parent.to_string(), candidate.clone())) {
                None => break,
                Some(_) => candidate = format!("{base}-{}", &segment_hash(raw)[..hash_len]),
            }
        }

        self.assigned.insert(key, candidate.clone());
        self.taken
            .insert((parent.to_string(), candidate.clone()), raw.to_string());
        candidate
    }
}

fn segment_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut output = String::with_capacity(64);
    for byte in digest.iter() {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
