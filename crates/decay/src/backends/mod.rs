//! Backends - GitHub repositories and Confluence page trees
//!
//! Each backend implements both [`DocumentSource`] and [`ChangeSetTarget`].
//! Exactly one is selected per run.

pub mod confluence;
pub mod github;
mod http;

pub use confluence::{ConfluenceConfig, ConfluenceSource};
pub use github::{GitHubConfig, GitHubSource};

use crate::audit::{ChangeSetTarget, DocumentSource, SourceResult};

/// Settings for the selected backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    GitHub(GitHubConfig),
    Confluence(ConfluenceConfig),
}

impl BackendConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GitHub(_) => "github",
            Self::Confluence(_) => "confluence",
        }
    }

    /// Identifier the traversal starts from.
    pub fn root(&self) -> &str {
        match self {
            Self::GitHub(config) => &config.root_path,
            Self::Confluence(config) => &config.parent_page_id,
        }
    }

    pub fn connect(&self) -> SourceResult<Backend> {
        Ok(match self {
            Self::GitHub(config) => Backend::GitHub(GitHubSource::new(config.clone())?),
            Self::Confluence(config) => Backend::Confluence(ConfluenceSource::new(config.clone())?),
        })
    }
}

/// A connected backend.
pub enum Backend {
    GitHub(GitHubSource),
    Confluence(ConfluenceSource),
}

impl Backend {
    pub fn source(&self) -> &dyn DocumentSource {
        match self {
            Self::GitHub(source) => source,
            Self::Confluence(source) => source,
        }
    }

    pub fn target(&self) -> &dyn ChangeSetTarget {
        match self {
            Self::GitHub(source) => source,
            Self::Confluence(source) => source,
        }
    }
}
