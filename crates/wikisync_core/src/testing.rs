//! In-memory wiki API double shared by the exporter and importer tests.

use std::collections::BTreeMap;

use reqwest::StatusCode;

use crate::client::{ApiError, PageRecord, WikiDescriptor, WikiReadApi, WikiWriteApi};

#[derive(Debug, Clone)]
struct MockPage {
    content: Option<String>,
    version: u64,
}

/// Scriptable stand-in for the Azure DevOps client. Pages live in a map keyed
/// by normalized path and carry a version counter that doubles as the etag.
#[derive(Debug, Default)]
pub(crate) struct MockApi {
    wikis: Vec<WikiDescriptor>,
    pages: BTreeMap<String, MockPage>,
    listing: Vec<String>,
    requests: usize,
    pub fail_listing: bool,
    /// Simulate losing the create race: the page materializes under another
    /// writer's hand and the create itself reports a conflict.
    pub conflict_on_create: bool,
    /// Every update conflicts, except for paths named in
    /// `conflict_exempt_paths`.
    pub fail_update_with_conflict: bool,
    pub conflict_exempt_paths: Vec<String>,
    pub create_calls: usize,
    pub update_calls: usize,
    pub created_wikis: Vec<String>,
}

impl MockApi {
    pub fn with_wiki(name: &str) -> Self {
        let mut api = Self::default();
        api.wikis.push(WikiDescriptor {
            id: "wiki-1".to_string(),
            name: name.to_string(),
            wiki_type: Some("projectWiki".to_string()),
        });
        api
    }

    /// Register a remote page as the exporter would list it. The raw path is
    /// kept in listing order.
    pub fn insert_page(&mut self, path: &str, content: Option<&str>) {
        self.listing.push(path.to_string());
        self.pages.insert(
            page_key(path),
            MockPage {
                content: content.map(str::to_string),
                version: 1,
            },
        );
    }

    /// Register a page without adding it to the listing, with an explicit
    /// version so stale-token scenarios can be staged.
    pub fn seed_page(&mut self, path: &str, content: &str, version: u64) {
        self.pages.insert(
            page_key(path),
            MockPage {
                content: Some(content.to_string()),
                version,
            },
        );
    }

    pub fn page_content(&self, path: &str) -> Option<String> {
        self.pages
            .get(&page_key(path))
            .and_then(|page| page.content.clone())
    }

    pub fn request_count_value(&self) -> usize {
        self.requests
    }

    fn update_conflicts_for(&self, path: &str) -> bool {
        self.fail_update_with_conflict
            && !self
                .conflict_exempt_paths
                .iter()
                .any(|exempt| page_key(exempt) == page_key(path))
    }
}

impl WikiReadApi for MockApi {
    fn list_wikis(&mut self) -> Result<Vec<WikiDescriptor>, ApiError> {
        self.requests += 1;
        Ok(self.wikis.clone())
    }

    fn list_page_paths(&mut self, _wiki_id: &str) -> Result<Vec<String>, ApiError> {
        self.requests += 1;
        if self.fail_listing {
            return Err(ApiError::Status {
                operation: "list pages",
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "simulated listing failure".to_string(),
            });
        }
        Ok(self.listing.clone())
    }

    fn get_page(
        &mut self,
        _wiki_id: &str,
        path: &str,
        include_content: bool,
    ) -> Result<Option<PageRecord>, ApiError> {
        self.requests += 1;
        Ok(self.pages.get(&page_key(path)).map(|page| PageRecord {
            path: path.to_string(),
            content: if include_content {
                page.content.clone()
            } else {
                None
            },
            etag: Some(page.version.to_string()),
        }))
    }

    fn request_count(&self) -> usize {
        self.requests
    }
}

impl WikiWriteApi for MockApi {
    fn create_wiki(&mut self, name: &str) -> Result<WikiDescriptor, ApiError> {
        self.requests += 1;
        let descriptor = WikiDescriptor {
            id: format!("wiki-{}", self.wikis.len() + 1),
            name: name.to_string(),
            wiki_type: Some("projectWiki".to_string()),
        };
        self.wikis.push(descriptor.clone());
        self.created_wikis.push(name.to_string());
        Ok(descriptor)
    }

    fn create_page(&mut self, _wiki_id: &str, path: &str, content: &str) -> Result<(), ApiError> {
        self.requests += 1;
        self.create_calls += 1;
        let key = page_key(path);
        if self.conflict_on_create {
            self.pages.entry(key).or_insert(MockPage {
                content: Some("concurrent".to_string()),
                version: 1,
            });
            return Err(ApiError::Conflict {
                path: path.to_string(),
            });
        }
        if self.pages.contains_key(&key) {
            return Err(ApiError::Conflict {
                path: path.to_string(),
            });
        }
        self.pages.insert(
            key,
            MockPage {
                content: Some(content.to_string()),
                version: 1,
            },
        );
        Ok(())
    }

    fn update_page(
        &mut self,
        _wiki_id: &str,
        path: &str,
        content: &str,
        etag: &str,
    ) -> Result<(), ApiError> {
        self.requests += 1;
        self.update_calls += 1;
        if self.update_conflicts_for(path) {
            return Err(ApiError::Conflict {
                path: path.to_string(),
            });
        }
        let Some(page) = self.pages.get_mut(&page_key(path)) else {
            return Err(ApiError::Conflict {
                path: path.to_string(),
            });
        };
        if page.version.to_string() != etag {
            return Err(ApiError::Conflict {
                path: path.to_string(),
            });
        }
        page.content = Some(content.to_string());
        page.version += 1;
        Ok(())
    }
}

/// Canonical lookup key: leading slash, no trailing slash, root stays `/`.
fn page_key(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
