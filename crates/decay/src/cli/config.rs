//! Command line arguments, the optional YAML config file and the validated
//! run configuration.
//!
//! Precedence: command line (including env vars) over `--config` / `./decay.yml`
//! over built-in defaults.

use super::error::HelpfulError;
use crate::audit::{EmailAddress, InvalidEmail, StalenessPolicy, TraversalFilter};
use crate::backends::github::{DEFAULT_API_URL, DEFAULT_BRANCH};
use crate::backends::{BackendConfig, ConfluenceConfig, GitHubConfig};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "decay.yml";
pub const DEFAULT_STALE_AGE_DAYS: u32 = 30;
pub const DEFAULT_EXTENSIONS: [&str; 2] = [".md", ".html"];
const DEFAULT_GITHUB_ROOT: &str = "/";

/// What a run does after the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Email each owner the stale documents they own.
    NotifyOwners,
    /// Email the administrator a report of every analyzed document.
    SendAdminReport,
    /// Flag stale documents in the source.
    MarkStale,
    /// Only analyze and print the results.
    Analyze,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotifyOwners => "notify-owners",
            Self::SendAdminReport => "send-admin-report",
            Self::MarkStale => "mark-stale",
            Self::Analyze => "analyze",
        }
    }

    pub fn sends_email(&self) -> bool {
        matches!(self, Self::NotifyOwners | Self::SendAdminReport)
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "decay")]
#[command(version)]
#[command(about = "Find stale documentation and tell the people who own it")]
pub struct Cli {
    /// Actions to take after analysis
    #[arg(value_enum)]
    pub actions: Vec<Action>,

    /// YAML config file (defaults to ./decay.yml when present)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Days without a change after which a document is stale
    #[arg(short = 's', long)]
    pub stale_age_in_days: Option<u32>,

    /// File extensions to check (comma separated)
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Path in the source to skip (repeatable)
    #[arg(short = 'i', long = "ignore-path")]
    pub ignore_paths: Vec<String>,

    /// File to skip, as its path in the source (repeatable)
    #[arg(short = 'n', long = "ignore-file")]
    pub ignore_files: Vec<String>,

    /// Receives the admin report and reports for documents without an owner
    #[arg(short = 'm', long)]
    pub administrator: Option<String>,

    /// SendGrid API key used to send reports
    #[arg(short = 'k', long, env = "DECAY_SENDGRID_API_KEY", hide_env_values = true)]
    pub sendgrid_api_key: Option<String>,

    /// Address reports are sent from
    #[arg(short = 'r', long)]
    pub from_email: Option<String>,

    /// GitHub organization or user that owns the repository
    #[arg(long)]
    pub github_owner: Option<String>,

    /// GitHub repository name
    #[arg(long)]
    pub github_repo: Option<String>,

    /// Branch to audit [default: master]
    #[arg(long)]
    pub github_branch: Option<String>,

    /// Folder in the repository to audit [default: /]
    #[arg(long)]
    pub github_root_path: Option<String>,

    /// Personal access token with read access (write access for mark-stale)
    #[arg(long, env = "DECAY_GITHUB_TOKEN", hide_env_values = true)]
    pub github_access_token: Option<String>,

    /// Confluence host, e.g. acme.atlassian.net
    #[arg(long)]
    pub confluence_host: Option<String>,

    /// Confluence user name
    #[arg(long)]
    pub confluence_username: Option<String>,

    /// Confluence password or API token
    #[arg(long, env = "DECAY_CONFLUENCE_PASSWORD", hide_env_values = true)]
    pub confluence_password: Option<String>,

    /// Id of the page whose tree is audited
    #[arg(long)]
    pub confluence_parent_page_id: Option<String>,

    /// Print the analysis records as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Verbose console logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

// ============================================================================
// Config file
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub actions: Vec<Action>,
    pub stale_age_in_days: Option<u32>,
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub ignore_paths: Vec<String>,
    #[serde(default)]
    pub ignore_files: Vec<String>,
    pub administrator: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub from_email: Option<String>,
    pub github: Option<GitHubSection>,
    pub confluence: Option<ConfluenceSection>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubSection {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub root_path: Option<String>,
    pub access_token: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfluenceSection {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub parent_page_id: Option<String>,
}

impl FileConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Read `explicit`, or `./decay.yml` if it exists, or nothing.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
                }
                path.to_path_buf()
            }
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let text = fs::read_to_string(&path).map_err(|e| ConfigError::ConfigUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let config = Self::from_yaml(&text).map_err(|e| ConfigError::ConfigUnreadable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("cannot read config file {}: {reason}", .path.display())]
    ConfigUnreadable { path: PathBuf, reason: String },

    #[error("no action given")]
    NoActions,

    #[error("{value} is not a valid email address for {field}: {reason}")]
    InvalidEmail {
        field: &'static str,
        value: String,
        reason: InvalidEmail,
    },

    #[error("{action} sends email and needs {}", .missing.join(" and "))]
    MissingEmailSettings {
        action: &'static str,
        missing: Vec<&'static str>,
    },

    #[error("send-admin-report needs an administrator")]
    MissingAdministrator,

    #[error("no documentation source configured")]
    NoBackend,

    #[error("both GitHub and Confluence settings were given; choose one")]
    MultipleBackends,

    #[error("{backend} settings are incomplete, missing {}", .missing.join(", "))]
    IncompleteBackend {
        backend: &'static str,
        missing: Vec<&'static str>,
    },
}

impl ConfigError {
    /// User-facing rendering with suggestions.
    pub fn to_helpful(&self) -> HelpfulError {
        match self {
            Self::ConfigNotFound(path) => HelpfulError::config_not_found(path),
            Self::ConfigUnreadable { path, reason } => HelpfulError::config_invalid(path, reason),
            Self::NoActions => HelpfulError::new(self.to_string())
                .with_context("Nothing to do")
                .with_suggestions([
                    "TRY: decay analyze ... to only list stale documents",
                    "TRY: Actions: notify-owners, send-admin-report, mark-stale, analyze",
                ]),
            Self::InvalidEmail { .. } => HelpfulError::new(self.to_string())
                .with_suggestion("TRY: Use a plain address such as docs-team@example.com"),
            Self::MissingEmailSettings { .. } => HelpfulError::new(self.to_string())
                .with_context("Reports are delivered through SendGrid")
                .with_suggestions([
                    "TRY: Pass --sendgrid-api-key or set DECAY_SENDGRID_API_KEY",
                    "TRY: Pass --from-email with the sender address",
                ]),
            Self::MissingAdministrator => HelpfulError::new(self.to_string())
                .with_suggestion("TRY: Pass --administrator <email>"),
            Self::NoBackend => HelpfulError::new(self.to_string()).with_suggestions([
                "TRY: --github-owner, --github-repo and --github-access-token for a repository",
                "TRY: --confluence-host, --confluence-username, --confluence-password and --confluence-parent-page-id for a wiki",
            ]),
            Self::MultipleBackends => HelpfulError::new(self.to_string())
                .with_context("One run audits one documentation source")
                .with_suggestion("TRY: Remove the settings of the source you do not want to audit"),
            Self::IncompleteBackend { missing, .. } => HelpfulError::new(self.to_string())
                .with_suggestions(missing.iter().map(|m| format!("TRY: Pass {}", m))),
        }
    }
}

/// Email delivery settings, present only when an email action was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub sendgrid_api_key: String,
    pub from: EmailAddress,
}

/// Validated settings for one run. Built once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    actions: Vec<Action>,
    policy: StalenessPolicy,
    filter: TraversalFilter,
    administrator: Option<EmailAddress>,
    email: Option<EmailSettings>,
    backend: BackendConfig,
    json: bool,
}

impl RunConfig {
    /// Load the config file named by (or implied by) `cli` and validate.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = FileConfig::load(cli.config.as_deref())?;
        Self::build(cli, file)
    }

    pub fn build(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let mut actions = if cli.actions.is_empty() {
            file.actions.clone()
        } else {
            cli.actions.clone()
        };
        actions.sort();
        actions.dedup();
        if actions.is_empty() {
            return Err(ConfigError::NoActions);
        }

        let threshold = cli
            .stale_age_in_days
            .or(file.stale_age_in_days)
            .unwrap_or(DEFAULT_STALE_AGE_DAYS);
        let extensions = cli
            .extensions
            .clone()
            .or_else(|| file.extensions.clone())
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
        let ignore_paths = merged(&file.ignore_paths, &cli.ignore_paths);
        let ignore_files = merged(&file.ignore_files, &cli.ignore_files);

        let administrator = optional_email(
            "--administrator",
            cli.administrator.as_ref().or(file.administrator.as_ref()),
        )?;
        let from = optional_email(
            "--from-email",
            cli.from_email.as_ref().or(file.from_email.as_ref()),
        )?;
        let api_key = non_empty(cli.sendgrid_api_key.as_ref().or(file.sendgrid_api_key.as_ref()));

        let email = match actions.iter().find(|a| a.sends_email()) {
            None => None,
            Some(action) => match (api_key, from) {
                (Some(sendgrid_api_key), Some(from)) => Some(EmailSettings {
                    sendgrid_api_key,
                    from,
                }),
                (key, from) => {
                    let mut missing = Vec::new();
                    if key.is_none() {
                        missing.push("--sendgrid-api-key");
                    }
                    if from.is_none() {
                        missing.push("--from-email");
                    }
                    return Err(ConfigError::MissingEmailSettings {
                        action: action.as_str(),
                        missing,
                    });
                }
            },
        };

        if actions.contains(&Action::SendAdminReport) && administrator.is_none() {
            return Err(ConfigError::MissingAdministrator);
        }

        let backend = select_backend(cli, &file)?;

        Ok(Self {
            actions,
            policy: StalenessPolicy::new(threshold),
            filter: TraversalFilter::new(extensions, ignore_paths, ignore_files),
            administrator,
            email,
            backend,
            json: cli.json,
        })
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn wants(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    pub fn filter(&self) -> &TraversalFilter {
        &self.filter
    }

    pub fn administrator(&self) -> Option<&EmailAddress> {
        self.administrator.as_ref()
    }

    pub fn email(&self) -> Option<&EmailSettings> {
        self.email.as_ref()
    }

    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    pub fn json(&self) -> bool {
        self.json
    }
}

fn merged(file: &[String], cli: &[String]) -> Vec<String> {
    let mut all: Vec<String> = file.iter().chain(cli.iter()).cloned().collect();
    all.dedup();
    all
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_email(field: &'static str, raw: Option<&String>) -> Result<Option<EmailAddress>, ConfigError> {
    match non_empty(raw) {
        None => Ok(None),
        Some(value) => EmailAddress::parse(&value)
            .map(Some)
            .map_err(|reason| ConfigError::InvalidEmail {
                field,
                value,
                reason,
            }),
    }
}

fn select_backend(cli: &Cli, file: &FileConfig) -> Result<BackendConfig, ConfigError> {
    let gh = file.github.clone().unwrap_or_default();
    let cf = file.confluence.clone().unwrap_or_default();

    let github = [
        ("--github-owner", non_empty(cli.github_owner.as_ref().or(gh.owner.as_ref()))),
        ("--github-repo", non_empty(cli.github_repo.as_ref().or(gh.repo.as_ref()))),
        (
            "--github-access-token",
            non_empty(cli.github_access_token.as_ref().or(gh.access_token.as_ref())),
        ),
    ];
    let confluence = [
        ("--confluence-host", non_empty(cli.confluence_host.as_ref().or(cf.host.as_ref()))),
        (
            "--confluence-username",
            non_empty(cli.confluence_username.as_ref().or(cf.username.as_ref())),
        ),
        (
            "--confluence-password",
            non_empty(cli.confluence_password.as_ref().or(cf.password.as_ref())),
        ),
        (
            "--confluence-parent-page-id",
            non_empty(cli.confluence_parent_page_id.as_ref().or(cf.parent_page_id.as_ref())),
        ),
    ];

    // Secrets can arrive through the environment without the user picking a
    // backend, so a lone token does not count as choosing GitHub.
    let github_chosen = github[..2].iter().any(|(_, v)| v.is_some())
        || non_empty(cli.github_root_path.as_ref().or(gh.root_path.as_ref())).is_some();
    let confluence_chosen = confluence
        .iter()
        .enumerate()
        .any(|(i, (_, v))| i != 2 && v.is_some());

    match (github_chosen, confluence_chosen) {
        (false, false) => Err(ConfigError::NoBackend),
        (true, true) => Err(ConfigError::MultipleBackends),
        (true, false) => {
            let missing = missing_fields(&github);
            if !missing.is_empty() {
                return Err(ConfigError::IncompleteBackend {
                    backend: "GitHub",
                    missing,
                });
            }
            let [owner, repo, token] = github.map(|(_, v)| v.unwrap_or_default());
            Ok(BackendConfig::GitHub(GitHubConfig {
                owner,
                repo,
                branch: non_empty(cli.github_branch.as_ref().or(gh.branch.as_ref()))
                    .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
                root_path: non_empty(cli.github_root_path.as_ref().or(gh.root_path.as_ref()))
                    .unwrap_or_else(|| DEFAULT_GITHUB_ROOT.to_string()),
                access_token: token,
                api_url: non_empty(gh.api_url.as_ref())
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            }))
        }
        (false, true) => {
            let missing = missing_fields(&confluence);
            if !missing.is_empty() {
                return Err(ConfigError::IncompleteBackend {
                    backend: "Confluence",
                    missing,
                });
            }
            let [host, username, password, parent_page_id] =
                confluence.map(|(_, v)| v.unwrap_or_default());
            Ok(BackendConfig::Confluence(ConfluenceConfig {
                host,
                username,
                password,
                parent_page_id,
            }))
        }
    }
}

fn missing_fields<const N: usize>(fields: &[(&'static str, Option<String>); N]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["decay"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    const GITHUB: [&str; 6] = [
        "--github-owner",
        "acme",
        "--github-repo",
        "handbook",
        "--github-access-token",
        "t0ken",
    ];

    fn with_github(args: &[&str]) -> Cli {
        let mut all: Vec<&str> = args.to_vec();
        all.extend_from_slice(&GITHUB);
        parse(&all)
    }

    #[test]
    fn defaults_apply() {
        let config = RunConfig::build(&with_github(&["analyze"]), FileConfig::default()).unwrap();
        assert_eq!(config.policy().threshold_days(), 30);
        assert_eq!(config.filter().extensions(), &[".md".to_string(), ".html".to_string()]);
        match config.backend() {
            BackendConfig::GitHub(gh) => {
                assert_eq!(gh.branch, "master");
                assert_eq!(gh.root_path, "/");
                assert_eq!(gh.api_url, DEFAULT_API_URL);
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert!(config.email().is_none());
    }

    #[test]
    fn extensions_split_on_commas() {
        let config =
            RunConfig::build(&with_github(&["analyze", "--extensions", "md,RST"]), FileConfig::default())
                .unwrap();
        assert_eq!(config.filter().extensions(), &[".md".to_string(), ".rst".to_string()]);
    }

    #[test]
    fn notify_requires_key_and_sender() {
        let err = RunConfig::build(&with_github(&["notify-owners"]), FileConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingEmailSettings {
                action: "notify-owners",
                missing: vec!["--sendgrid-api-key", "--from-email"],
            }
        );
    }

    #[test]
    fn admin_report_requires_administrator() {
        let cli = with_github(&[
            "send-admin-report",
            "--sendgrid-api-key",
            "SG.x",
            "--from-email",
            "decay@acme.io",
        ]);
        assert_eq!(
            RunConfig::build(&cli, FileConfig::default()).unwrap_err(),
            ConfigError::MissingAdministrator
        );
    }

    #[test]
    fn invalid_administrator_is_rejected() {
        let cli = with_github(&["analyze", "--administrator", "not-an-email"]);
        let err = RunConfig::build(&cli, FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEmail { field: "--administrator", .. }));
    }

    #[test]
    fn backend_selection() {
        assert_eq!(
            RunConfig::build(&parse(&["analyze"]), FileConfig::default()).unwrap_err(),
            ConfigError::NoBackend
        );

        let partial = parse(&["analyze", "--github-owner", "acme"]);
        assert_eq!(
            RunConfig::build(&partial, FileConfig::default()).unwrap_err(),
            ConfigError::IncompleteBackend {
                backend: "GitHub",
                missing: vec!["--github-repo", "--github-access-token"],
            }
        );

        let both = with_github(&["analyze", "--confluence-host", "acme.atlassian.net"]);
        assert_eq!(
            RunConfig::build(&both, FileConfig::default()).unwrap_err(),
            ConfigError::MultipleBackends
        );
    }

    #[test]
    fn file_values_fill_gaps_and_cli_wins() {
        let file = FileConfig::from_yaml(
            r#"
actions: [mark-stale]
stale_age_in_days: 90
ignore_paths: [/docs/archive/]
administrator: Admin@ACME.io
confluence:
  host: acme.atlassian.net
  username: bot
  password: secret
  parent_page_id: "42"
"#,
        )
        .unwrap();
        let cli = parse(&["--stale-age-in-days", "10", "--ignore-path", "drafts"]);
        let config = RunConfig::build(&cli, file).unwrap();

        assert_eq!(config.actions(), &[Action::MarkStale]);
        assert_eq!(config.policy().threshold_days(), 10);
        assert_eq!(
            config.filter().ignore_paths(),
            &["docs/archive".to_string(), "drafts".to_string()]
        );
        assert_eq!(config.administrator().unwrap().as_str(), "Admin@acme.io");
        assert_eq!(config.backend().root(), "42");
    }

    #[test]
    fn ignore_path_help_describes_source_paths() {
        use clap::CommandFactory;
        let command = Cli::command();
        let help = command
            .get_arguments()
            .find(|arg| arg.get_long() == Some("ignore-path"))
            .and_then(|arg| arg.get_help())
            .map(|help| help.to_string())
            .unwrap();
        assert_eq!(help, "Path in the source to skip (repeatable)");
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(FileConfig::from_yaml("stale_days: 3").is_err());
        assert_eq!(FileConfig::from_yaml("").unwrap(), FileConfig::default());
    }

    #[test]
    fn duplicate_actions_collapse() {
        let config =
            RunConfig::build(&with_github(&["analyze", "mark-stale", "analyze"]), FileConfig::default())
                .unwrap();
        assert_eq!(config.actions(), &[Action::MarkStale, Action::Analyze]);
        assert!(config.wants(Action::MarkStale));
        assert!(!config.wants(Action::NotifyOwners));
    }
}
