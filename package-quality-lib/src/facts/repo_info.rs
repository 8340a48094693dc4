use crate::estimation::Repository;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// The issue-tracker coordinates of a package's source repository.
///
/// Only git repositories hosted on the issue tracker are understood. Anything else yields
/// an invalid [`RepoInfo`], which makes the issues factor contribute zeros without any
/// network traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub name: String,
    pub valid: bool,
}

const SSH_PREFIX: &str = "git@github.com:";
const GIT_PROTOCOL_PREFIX: &str = "git://github.com:";

impl RepoInfo {
    #[must_use]
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Derive `{owner, name}` from a package's repository descriptor.
    ///
    /// Accepted URL shapes:
    /// - `git@github.com:owner/name(.git)`
    /// - `git://github.com:owner/name(.git)`
    /// - any URL that splits on `/` into exactly five segments, e.g.
    ///   `https://github.com/owner/name(.git)`
    #[must_use]
    pub fn extract(repository: Option<&Repository>) -> Self {
        let Some(repository) = repository else {
            return Self::invalid();
        };

        if repository.kind.as_deref() != Some("git") {
            return Self::invalid();
        }

        let Some(url) = repository.url.as_deref() else {
            return Self::invalid();
        };

        let (owner, name) = if let Some(rest) = url.strip_prefix(SSH_PREFIX).or_else(|| url.strip_prefix(GIT_PROTOCOL_PREFIX)) {
            let mut parts = rest.split('/');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(owner), Some(name), None) => (owner, name),
                _ => return Self::invalid(),
            }
        } else {
            let segments: Vec<_> = url.split('/').collect();
            match segments.as_slice() {
                [_, _, _, owner, name] => (*owner, *name),
                _ => return Self::invalid(),
            }
        };

        let name = name.strip_suffix(".git").unwrap_or(name);
        if owner.is_empty() || name.is_empty() {
            return Self::invalid();
        }

        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            valid: true,
        }
    }
}

impl Display for RepoInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.valid {
            write!(f, "{}/{}", self.owner, self.name)
        } else {
            write!(f, "<no repository>")
        }
    }
}
