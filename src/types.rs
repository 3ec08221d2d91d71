//! Shared types for gitloc
//!
//! [`RepoIdentity`] turns an arbitrary remote URL into the organization and
//! repository names that key both the working copy and the stats cache. The
//! remaining types are the persisted cache schema and the JSON report.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;

/// Suffix stripped from remote URLs before any other processing.
const GIT_SUFFIX: &str = ".git";

/// Hosts whose URL path starts with the organization (`/<org>/<repo>`).
const GIT_SOURCE_HOSTS: [&str; 3] = ["github.com", "gitlab.com", "bitbucket.org"];

/// Routing prefixes used by self-hosted gerrit instances.
const ROUTING_PREFIXES: [&str; 2] = ["/r/", "/gerrit/"];

/// Label that replaces cloc's `SUM:` row label.
pub const TOTAL_LABEL: &str = "Total";

/// Error type for identity derivation failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("repository URL cannot be empty")]
    Empty,
    #[error("malformed repository URL '{url}': {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("cannot derive an organization from '{0}'")]
    MissingOrganization(String),
    #[error("cannot derive a repository name from '{0}'")]
    MissingRepository(String),
}

/// Organization/repository pair derived from a remote URL.
///
/// Two URL styles are recognised:
/// - git-source hosts (github, gitlab, bitbucket): the first path segment is
///   the organization and the rest of the path is the repository.
/// - any other host: the second label of the host name is the organization
///   (`gerrit.onap.org` -> `onap`) and the whole path is the repository.
///
/// Unless hierarchy mode is on, the repository path is flattened by replacing
/// the *first* `/` and the *first* `_` with `-` and dropping the first `/.`
/// and the first `.`. Later occurrences are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoIdentity {
    /// Remote URL with any trailing `.git` removed; this is what gets cloned.
    pub remote: String,
    pub organization: String,
    pub repository: String,
}

impl RepoIdentity {
    /// Derive the identity of `url`.
    ///
    /// With `follow_hierarchy` the repository keeps its `/` separators and is
    /// expected to be laid out as nested directories.
    pub fn resolve(url: &str, follow_hierarchy: bool) -> Result<Self, IdentityError> {
        if url.is_empty() {
            return Err(IdentityError::Empty);
        }

        let remote = url.strip_suffix(GIT_SUFFIX).unwrap_or(url);
        let parsed = Url::parse(remote).map_err(|source| IdentityError::Malformed {
            url: remote.to_string(),
            source,
        })?;

        let host = host_with_port(&parsed);
        let organization = if is_git_source(&host) {
            organization_from_path(parsed.path())
        } else {
            organization_from_host(&host)
        }
        .ok_or_else(|| IdentityError::MissingOrganization(remote.to_string()))?;

        let repository = repository_name(parsed.path(), &organization, follow_hierarchy);
        if repository.is_empty() {
            return Err(IdentityError::MissingRepository(remote.to_string()));
        }

        Ok(Self {
            remote: remote.to_string(),
            organization,
            repository,
        })
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.repository)
    }
}

fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn is_git_source(host: &str) -> bool {
    GIT_SOURCE_HOSTS.iter().any(|known| host.contains(known))
}

/// Strip a gerrit routing prefix, then any leading slashes.
fn sanitize_path(path: &str) -> &str {
    let path = ROUTING_PREFIXES
        .iter()
        .find_map(|prefix| path.strip_prefix(prefix))
        .unwrap_or(path);
    path.trim_start_matches('/')
}

fn organization_from_path(path: &str) -> Option<String> {
    sanitize_path(path)
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

fn organization_from_host(host: &str) -> Option<String> {
    sanitize_path(host)
        .split('.')
        .nth(1)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

fn repository_name(path: &str, organization: &str, follow_hierarchy: bool) -> String {
    let mut name = sanitize_path(path).to_string();
    if name.contains(organization) {
        name = name.replacen(&format!("{}/", organization), "", 1);
    }
    if !follow_hierarchy {
        for (from, to) in [("/", "-"), ("_", "-"), ("/.", ""), (".", "")] {
            name = name.replacen(from, to, 1);
        }
    }
    name
}

/// One row of the line-counting tool's language table.
///
/// Counts are kept as the tool printed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStat {
    pub language: String,
    pub files: String,
    pub blank: String,
    pub comment: String,
    pub code: String,
}

/// Cached measurement for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(rename = "loc", default)]
    pub line_count: i64,
    #[serde(rename = "pls", default, deserialize_with = "null_as_empty")]
    pub language_stats: Vec<LanguageStat>,
    /// RFC3339 UTC time of the last non-zero measurement.
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<LanguageStat>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LanguageStat>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The JSON object printed on success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocReport {
    #[serde(rename = "loc")]
    pub line_count: i64,
    #[serde(rename = "pls")]
    pub language_stats: Vec<LanguageStat>,
}

impl From<CacheRecord> for LocReport {
    fn from(record: CacheRecord) -> Self {
        Self {
            line_count: record.line_count,
            language_stats: record.language_stats,
        }
    }
}
