//! GitHub repository backend (REST v3).
//!
//! Directories are containers, files are leaves. Change history comes from the
//! newest commit touching a path on the configured branch; ownership comes
//! from the file's front matter. Marking sets `out_of_date: true` in the front
//! matter on a `decay-marker-<seconds>` branch and opens a pull request.

use super::http::{build_client, send, send_json};
use crate::audit::error::{SourceError, SourceResult};
use crate::audit::metadata::{parse_front_matter, FrontMatter};
use crate::audit::source::{
    ChangeSet, ChangeSetTarget, DocumentSource, Properties, PropertyDelta, StaleMark,
    StoredDocument,
};
use crate::audit::types::{ChangeInfo, DocumentContent, Node, NodeKind};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_BRANCH: &str = "master";
pub const PULL_REQUEST_TITLE: &str = "Decay automated updates";
const PULL_REQUEST_BODY: &str =
    "This PR was generated automatically by Decay because properties on some files were changed.";

/// Connection settings for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Folder to audit, relative to the repository root.
    pub root_path: String,
    pub access_token: String,
    pub api_url: String,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileContent {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl FileContent {
    pub fn decode(&self, identifier: &str) -> SourceResult<Vec<u8>> {
        match (self.encoding.as_deref(), self.content.as_deref()) {
            (Some("base64"), Some(content)) => {
                let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(compact)
                    .map_err(|e| SourceError::unexpected(identifier, e))
            }
            // Files above the API size limit come back with encoding "none".
            (_, None) | (Some("none"), _) => Ok(Vec::new()),
            (_, Some(content)) => Ok(content.as_bytes().to_vec()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommitEntry {
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CommitDetail {
    #[serde(default)]
    pub committer: Option<GitActor>,
    #[serde(default)]
    pub author: Option<GitActor>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GitActor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl CommitEntry {
    pub fn change_info(&self) -> Option<ChangeInfo> {
        let actor = self
            .commit
            .committer
            .as_ref()
            .filter(|c| c.date.is_some())
            .or(self.commit.author.as_ref())?;
        Some(ChangeInfo {
            when: actor.date?,
            actor_name: actor.name.clone(),
            actor_email: actor.email.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct BranchInfo {
    commit: BranchCommit,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullRequest {
    html_url: String,
}

#[derive(Debug, Serialize)]
struct UpdateFileRequest<'a> {
    message: String,
    content: String,
    sha: &'a str,
    branch: &'a str,
}

pub(crate) fn node_from_entry(entry: &ContentEntry) -> Option<Node> {
    let kind = match entry.kind.as_str() {
        "file" => NodeKind::Leaf,
        "dir" => NodeKind::Container,
        // symlinks and submodules are not documents
        _ => return None,
    };
    Some(Node::new(kind, entry.path.clone(), entry.name.clone()))
}

// ============================================================================
// Source
// ============================================================================

pub struct GitHubSource {
    client: Client,
    config: GitHubConfig,
}

impl GitHubSource {
    pub fn new(config: GitHubConfig) -> SourceResult<Self> {
        Ok(Self {
            client: build_client()?,
            config,
        })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// `{api}/repos/{owner}/{repo}/{segments...}` with every segment escaped.
    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> SourceResult<Url> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| SourceError::unexpected(&self.config.api_url, e))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SourceError::unexpected(&self.config.api_url, "cannot be a base URL"))?;
            path.pop_if_empty()
                .extend(["repos", self.config.owner.as_str(), self.config.repo.as_str()])
                .extend(segments.into_iter().filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn contents_url(&self, path: &str) -> SourceResult<Url> {
        let path = if path == "/" { "" } else { path };
        self.url(std::iter::once("contents").chain(path.split('/')))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.access_token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn get(&self, url: Url) -> RequestBuilder {
        self.authorized(self.client.get(url))
    }

    fn fetch_file(&self, path: &str, reference: &str) -> SourceResult<FileContent> {
        let mut url = self.contents_url(path)?;
        url.query_pairs_mut().append_pair("ref", reference);
        send_json(self.get(url), path)
    }
}

impl DocumentSource for GitHubSource {
    fn describe(&self) -> String {
        format!(
            "{}/{}@{}",
            self.config.owner, self.config.repo, self.config.branch
        )
    }

    fn list_children(&self, identifier: &str) -> SourceResult<Vec<Node>> {
        let mut url = self.contents_url(identifier)?;
        url.query_pairs_mut().append_pair("ref", &self.config.branch);
        let entries: Vec<ContentEntry> = send_json(self.get(url), identifier)?;
        Ok(entries.iter().filter_map(node_from_entry).collect())
    }

    fn get_change_history(&self, identifier: &str) -> SourceResult<Option<ChangeInfo>> {
        let mut url = self.url(["commits"])?;
        url.query_pairs_mut()
            .append_pair("path", identifier)
            .append_pair("sha", &self.config.branch)
            .append_pair("per_page", "1");
        let commits: Vec<CommitEntry> = send_json(self.get(url), identifier)?;
        Ok(commits.first().and_then(CommitEntry::change_info))
    }

    fn get_content(&self, identifier: &str) -> SourceResult<DocumentContent> {
        let file = self.fetch_file(identifier, &self.config.branch)?;
        Ok(DocumentContent {
            bytes: file.decode(identifier)?,
            content_link: file.html_url.clone().unwrap_or_default(),
        })
    }

    fn get_display_metadata(&self, _identifier: &str) -> SourceResult<Option<String>> {
        // Titles live in front matter.
        Ok(None)
    }
}

impl ChangeSetTarget for GitHubSource {
    fn stale_mark(&self) -> StaleMark {
        StaleMark::out_of_date_flag()
    }

    fn read_properties(&self, identifier: &str) -> SourceResult<StoredDocument> {
        let file = self.fetch_file(identifier, &self.config.branch)?;
        let bytes = file.decode(identifier)?;
        let front_matter =
            parse_front_matter(&bytes).map_err(|e| SourceError::unexpected(identifier, e))?;
        Ok(StoredDocument {
            identifier: identifier.to_string(),
            properties: Properties {
                title: front_matter.title(),
                fields: front_matter.fields,
            },
            body: front_matter.body,
            revision: file.sha,
        })
    }

    fn create_change_set(&self) -> SourceResult<ChangeSet> {
        let branch: BranchInfo = send_json(
            self.get(self.url(["branches", self.config.branch.as_str()])?),
            &self.config.branch,
        )?;
        let name = format!("decay-marker-{}", Utc::now().timestamp());
        let body = json!({
            "ref": format!("refs/heads/{}", name),
            "sha": branch.commit.sha,
        });
        send(
            self.authorized(self.client.post(self.url(["git", "refs"])?))
                .json(&body),
            &name,
        )?;
        tracing::info!(branch = %name, base = %branch.commit.sha, "Created marker branch");
        Ok(ChangeSet {
            name,
            base_revision: branch.commit.sha,
        })
    }

    fn write_properties(
        &self,
        change_set: &ChangeSet,
        stored: &StoredDocument,
        delta: &PropertyDelta,
    ) -> SourceResult<()> {
        let mut front_matter = FrontMatter {
            fields: stored.properties.fields.clone(),
            body: stored.body.clone(),
            present: true,
        };
        for (key, value) in &delta.fields {
            if let Some(key) = key.as_str() {
                front_matter.set(key, value.clone());
            }
        }
        if let Some(title) = &delta.title {
            front_matter.set("title", serde_yaml::Value::String(title.clone()));
        }
        let rendered = front_matter
            .render()
            .map_err(|e| SourceError::unexpected(&stored.identifier, e))?;

        let request = UpdateFileRequest {
            message: format!("decay updated these fields: {}", delta.keys().join(",")),
            content: BASE64.encode(rendered.as_bytes()),
            sha: &stored.revision,
            branch: &change_set.name,
        };
        send(
            self.authorized(self.client.put(self.contents_url(&stored.identifier)?))
                .json(&request),
            &stored.identifier,
        )?;
        Ok(())
    }

    fn publish_change_set(&self, change_set: &ChangeSet, edits: usize) -> SourceResult<Option<String>> {
        if edits == 0 {
            return Ok(None);
        }
        let body = json!({
            "title": PULL_REQUEST_TITLE,
            "body": PULL_REQUEST_BODY,
            "head": change_set.name,
            "base": self.config.branch,
        });
        let pull: PullRequest = send_json(
            self.authorized(self.client.post(self.url(["pulls"])?))
                .json(&body),
            &change_set.name,
        )?;
        Ok(Some(pull.html_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GitHubConfig {
        GitHubConfig {
            owner: "acme".into(),
            repo: "handbook".into(),
            branch: "main".into(),
            root_path: "docs".into(),
            access_token: "token".into(),
            api_url: DEFAULT_API_URL.into(),
        }
    }

    #[test]
    fn directory_listing_maps_to_nodes() {
        let payload = r#"[
            {"type": "file", "path": "docs/a.md", "name": "a.md", "sha": "1"},
            {"type": "dir", "path": "docs/guides", "name": "guides", "sha": "2"},
            {"type": "symlink", "path": "docs/link", "name": "link", "sha": "3"}
        ]"#;
        let entries: Vec<ContentEntry> = serde_json::from_str(payload).unwrap();
        let nodes: Vec<Node> = entries.iter().filter_map(node_from_entry).collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].kind, NodeKind::Leaf);
        assert_eq!(nodes[0].identifier, "docs/a.md");
        assert_eq!(nodes[1].kind, NodeKind::Container);
    }

    #[test]
    fn commit_dates_are_normalized_to_utc() {
        let payload = r#"[{"commit": {
            "committer": {"name": "Bob", "email": "bob@x.com", "date": "2024-05-01T10:00:00+02:00"},
            "author": {"name": "Ann", "email": "ann@x.com", "date": "2024-04-30T00:00:00Z"}
        }}]"#;
        let commits: Vec<CommitEntry> = serde_json::from_str(payload).unwrap();
        let info = commits[0].change_info().unwrap();
        assert_eq!(info.when.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert_eq!(info.actor_name.as_deref(), Some("Bob"));
        assert_eq!(info.actor_email.as_deref(), Some("bob@x.com"));
    }

    #[test]
    fn commit_falls_back_to_author() {
        let payload = r#"{"commit": {"author": {"name": "Ann", "date": "2024-04-30T00:00:00Z"}}}"#;
        let commit: CommitEntry = serde_json::from_str(payload).unwrap();
        assert_eq!(commit.change_info().unwrap().actor_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn file_content_decodes_wrapped_base64() {
        let file = FileContent {
            sha: "abc".into(),
            html_url: None,
            content: Some("LS0tCm93bmVy\nOiBhQHguY29tCi0tLQo=\n".into()),
            encoding: Some("base64".into()),
        };
        assert_eq!(file.decode("a.md").unwrap(), b"---\nowner: a@x.com\n---\n");

        let oversized = FileContent {
            sha: "abc".into(),
            html_url: None,
            content: Some(String::new()),
            encoding: Some("none".into()),
        };
        assert!(oversized.decode("big.md").unwrap().is_empty());
    }

    #[test]
    fn urls_escape_path_segments() {
        let source = GitHubSource::new(config()).unwrap();
        let url = source.contents_url("docs/release notes.md").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/handbook/contents/docs/release%20notes.md"
        );
        let root = source.contents_url("/").unwrap();
        assert_eq!(root.as_str(), "https://api.github.com/repos/acme/handbook/contents");
        assert_eq!(source.describe(), "acme/handbook@main");
    }
}
