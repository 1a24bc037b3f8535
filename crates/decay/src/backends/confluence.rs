//! Confluence page-tree backend.
//!
//! Every page below the configured parent is a document; pages with children
//! are also containers. Titles and change history come from the page itself.
//! Marking appends ` (Stale)` to the page title, applied directly as a new page
//! version (there is no branch to review).

use super::http::{build_client, send, send_json};
use crate::audit::error::{SourceError, SourceResult};
use crate::audit::source::{
    ChangeSet, ChangeSetTarget, DocumentSource, Properties, PropertyDelta, StaleMark,
    StoredDocument,
};
use crate::audit::types::{ChangeInfo, DocumentContent, Node, NodeKind};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

pub const STALE_TITLE_SUFFIX: &str = " (Stale)";
const PAGE_LIMIT: usize = 50;

/// Connection settings for one Confluence site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfluenceConfig {
    /// `acme.atlassian.net` or a full base URL.
    pub host: String,
    pub username: String,
    /// Password or API token.
    pub password: String,
    pub parent_page_id: String,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Page {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<PageVersion>,
    #[serde(default, rename = "_links")]
    pub links: Option<PageLinks>,
    #[serde(default)]
    pub body: Option<PageBody>,
    #[serde(default)]
    pub children: Option<PageChildren>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageVersion {
    pub number: u64,
    #[serde(default)]
    pub when: Option<DateTime<Utc>>,
    #[serde(default)]
    pub by: Option<PageAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageAuthor {
    #[serde(default)]
    pub public_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageLinks {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub webui: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageBody {
    #[serde(default)]
    pub storage: Option<StorageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StorageBody {
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageChildren {
    #[serde(default)]
    pub page: Option<ChildCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChildCount {
    #[serde(default)]
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChildPages {
    pub results: Vec<Page>,
    #[serde(default)]
    pub size: usize,
    #[serde(default, rename = "_links")]
    pub links: Option<NextLink>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextLink {
    #[serde(default)]
    pub next: Option<String>,
}

impl Page {
    pub fn has_children(&self) -> bool {
        self.children
            .as_ref()
            .and_then(|c| c.page.as_ref())
            .map(|p| p.size > 0)
            .unwrap_or(false)
    }

    pub fn node(&self) -> Node {
        let kind = if self.has_children() {
            NodeKind::ParentDocument
        } else {
            NodeKind::Leaf
        };
        Node::new(kind, self.id.clone(), self.title.clone())
    }

    pub fn change_info(&self) -> Option<ChangeInfo> {
        let version = self.version.as_ref()?;
        let by = version.by.as_ref();
        Some(ChangeInfo {
            when: version.when?,
            actor_name: by.and_then(|b| b.public_name.clone().or_else(|| b.display_name.clone())),
            actor_email: by.and_then(|b| b.email.clone()).filter(|e| !e.is_empty()),
        })
    }

    pub fn link(&self) -> String {
        match &self.links {
            Some(PageLinks {
                base: Some(base),
                webui: Some(webui),
            }) => format!("{}{}", base, webui),
            Some(PageLinks {
                webui: Some(webui), ..
            }) => webui.clone(),
            _ => String::new(),
        }
    }
}

/// REST root for a host: bare host names get `https://` and the cloud
/// `/wiki` context path.
pub fn api_root(host: &str) -> Result<Url, String> {
    let trimmed = host.trim().trim_end_matches('/');
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let mut url = Url::parse(&with_scheme).map_err(|e| format!("{}: {}", host, e))?;
    if url.path() == "/" || url.path().is_empty() {
        url.set_path("/wiki");
    }
    let path = format!("{}/rest/api", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

// ============================================================================
// Source
// ============================================================================

pub struct ConfluenceSource {
    client: Client,
    config: ConfluenceConfig,
    api: Url,
    /// Pages fetched for history, reused for link and title lookups.
    pages: Mutex<HashMap<String, Page>>,
}

impl ConfluenceSource {
    pub fn new(config: ConfluenceConfig) -> SourceResult<Self> {
        let api = api_root(&config.host).map_err(|e| SourceError::unexpected(&config.host, e))?;
        Ok(Self {
            client: build_client()?,
            config,
            api,
            pages: Mutex::new(HashMap::new()),
        })
    }

    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> SourceResult<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::unexpected(&self.config.host, "cannot be a base URL"))?
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header("Accept", "application/json")
    }

    fn fetch_page(&self, id: &str, expand: &str) -> SourceResult<Page> {
        let mut url = self.url(["content", id])?;
        url.query_pairs_mut().append_pair("expand", expand);
        send_json(self.authorized(self.client.get(url)), id)
    }

    /// Page with version info, from cache when possible.
    fn page(&self, id: &str) -> SourceResult<Page> {
        if let Some(page) = self.pages.lock().ok().and_then(|p| p.get(id).cloned()) {
            return Ok(page);
        }
        let page = self.fetch_page(id, "version,children.page")?;
        if let Ok(mut pages) = self.pages.lock() {
            pages.insert(id.to_string(), page.clone());
        }
        Ok(page)
    }
}

impl DocumentSource for ConfluenceSource {
    fn describe(&self) -> String {
        format!("{} (page {})", self.config.host, self.config.parent_page_id)
    }

    fn list_children(&self, identifier: &str) -> SourceResult<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut start = 0usize;
        loop {
            let mut url = self.url(["content", identifier, "child", "page"])?;
            url.query_pairs_mut()
                .append_pair("expand", "version,children.page")
                .append_pair("limit", &PAGE_LIMIT.to_string())
                .append_pair("start", &start.to_string());
            let batch: ChildPages = send_json(self.authorized(self.client.get(url)), identifier)?;

            let fetched = batch.results.len();
            if let Ok(mut pages) = self.pages.lock() {
                for page in &batch.results {
                    pages.insert(page.id.clone(), page.clone());
                }
            }
            nodes.extend(batch.results.iter().map(Page::node));

            let has_next = batch.links.and_then(|l| l.next).is_some();
            if fetched == 0 || (!has_next && batch.size < PAGE_LIMIT) {
                break;
            }
            start += fetched;
        }
        Ok(nodes)
    }

    fn get_change_history(&self, identifier: &str) -> SourceResult<Option<ChangeInfo>> {
        Ok(self.page(identifier)?.change_info())
    }

    fn get_content(&self, identifier: &str) -> SourceResult<DocumentContent> {
        // Pages carry no front matter; only the link is useful here.
        Ok(DocumentContent {
            bytes: Vec::new(),
            content_link: self.page(identifier)?.link(),
        })
    }

    fn get_display_metadata(&self, identifier: &str) -> SourceResult<Option<String>> {
        Ok(Some(self.page(identifier)?.title))
    }

    fn uses_file_extensions(&self) -> bool {
        false
    }

    fn root_node(&self, root: &str) -> SourceResult<Option<Node>> {
        let page = self.page(root)?;
        let node = Node::new(NodeKind::ParentDocument, page.id.clone(), page.title);
        Ok(Some(node))
    }
}

impl ChangeSetTarget for ConfluenceSource {
    fn stale_mark(&self) -> StaleMark {
        StaleMark::TitleSuffix(STALE_TITLE_SUFFIX.to_string())
    }

    fn read_properties(&self, identifier: &str) -> SourceResult<StoredDocument> {
        let page = self.fetch_page(identifier, "body.storage,version")?;
        let version = page
            .version
            .as_ref()
            .map(|v| v.number)
            .ok_or_else(|| SourceError::unexpected(identifier, "page has no version"))?;
        Ok(StoredDocument {
            identifier: identifier.to_string(),
            properties: Properties {
                title: Some(page.title.clone()),
                fields: Default::default(),
            },
            body: page
                .body
                .and_then(|b| b.storage)
                .map(|s| s.value)
                .unwrap_or_default(),
            revision: version.to_string(),
        })
    }

    fn create_change_set(&self) -> SourceResult<ChangeSet> {
        // Edits go straight to the live pages.
        Ok(ChangeSet {
            name: format!("decay-marker-{}", Utc::now().timestamp()),
            base_revision: "live".to_string(),
        })
    }

    fn write_properties(
        &self,
        change_set: &ChangeSet,
        stored: &StoredDocument,
        delta: &PropertyDelta,
    ) -> SourceResult<()> {
        let current: u64 = stored
            .revision
            .parse()
            .map_err(|e| SourceError::unexpected(&stored.identifier, e))?;
        let title = delta
            .title
            .clone()
            .or_else(|| stored.properties.title.clone())
            .unwrap_or_default();
        let body = json!({
            "id": stored.identifier,
            "type": "page",
            "title": title,
            "version": {
                "number": current + 1,
                "message": format!("Marked as stale by decay ({})", change_set.name),
            },
            "body": {
                "storage": {
                    "value": stored.body,
                    "representation": "storage",
                }
            }
        });
        send(
            self.authorized(self.client.put(self.url(["content", stored.identifier.as_str()])?))
                .json(&body),
            &stored.identifier,
        )?;
        if let Ok(mut pages) = self.pages.lock() {
            pages.remove(&stored.identifier);
        }
        Ok(())
    }

    fn publish_change_set(&self, _change_set: &ChangeSet, _edits: usize) -> SourceResult<Option<String>> {
        Ok(None)
    }
}
