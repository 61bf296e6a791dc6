//! Store configuration, resolved once at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::{BranchName, GithubConfig};
use crate::store::error::{StoreError, StoreResult};

/// Where the process runs.
///
/// A hosted deployment has an immutable filesystem, so content can only be
/// persisted remotely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Hosted,
}

/// The repository remote writes go to.
#[derive(Debug, Clone)]
pub enum RemoteTarget {
    Github(GithubConfig),
    /// a Git repository on disk, opened (or created) in place
    GitRepository(PathBuf),
}

impl RemoteTarget {
    /// Names of the settings still needed before this target is usable.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        match self {
            RemoteTarget::Github(github) => github.missing_settings(),
            RemoteTarget::GitRepository(_) => Vec::new(),
        }
    }
}

/// Store configuration options.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding `content/`.
    pub content_root: PathBuf,
    pub environment: Environment,
    pub remote: Option<RemoteTarget>,
    /// Branch remote commits land on.
    pub branch: BranchName,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("."),
            environment: Environment::Development,
            remote: None,
            branch: BranchName::main(),
        }
    }
}

impl StoreConfig {
    pub fn new(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: content_root.into(),
            ..Default::default()
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn hosted(self) -> Self {
        self.environment(Environment::Hosted)
    }

    pub fn github(mut self, config: GithubConfig) -> Self {
        self.remote = Some(RemoteTarget::Github(config));
        self
    }

    pub fn git_repository(mut self, path: impl Into<PathBuf>) -> Self {
        self.remote = Some(RemoteTarget::GitRepository(path.into()));
        self
    }

    pub fn branch(mut self, branch: BranchName) -> Self {
        self.branch = branch;
        self
    }

    /// Settings missing for remote persistence; empty when a remote can be used.
    pub fn missing_remote_settings(&self) -> Vec<&'static str> {
        match &self.remote {
            Some(target) => target.missing_settings(),
            None => GithubConfig::default().missing_settings(),
        }
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from `lookup`, which maps a variable name to its value.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::new(var("FOLIO_CONTENT_ROOT").unwrap_or_else(|| ".".to_string()));

        config.environment = match var("FOLIO_ENV").as_deref() {
            Some("production" | "hosted") => Environment::Hosted,
            Some("development" | "local") => Environment::Development,
            Some(other) => {
                return Err(StoreError::InvalidConfig(format!(
                    "FOLIO_ENV must be 'development' or 'production', got '{}'",
                    other
                )))
            }
            None if var("VERCEL").as_deref() == Some("1") || var("NODE_ENV").as_deref() == Some("production") => {
                Environment::Hosted
            }
            None => Environment::Development,
        };

        let owner = var("GITHUB_OWNER");
        let repo = var("GITHUB_REPO");
        let token = var("GITHUB_TOKEN");
        if owner.is_some() || repo.is_some() || token.is_some() {
            let mut github = GithubConfig {
                owner,
                repo,
                token,
                ..Default::default()
            };
            if let Some(url) = var("GITHUB_API_URL") {
                github = github.api_base(url);
            }
            if let Some(raw) = var("FOLIO_REMOTE_TIMEOUT_SECS") {
                let secs: u64 = raw.parse().map_err(|_| {
                    StoreError::InvalidConfig(format!("FOLIO_REMOTE_TIMEOUT_SECS must be a number of seconds, got '{}'", raw))
                })?;
                github = github.timeout(Duration::from_secs(secs));
            }
            config.remote = Some(RemoteTarget::Github(github));
        }

        if let Some(branch) = var("GITHUB_BRANCH") {
            config.branch = BranchName::new(branch).map_err(|e| StoreError::InvalidConfig(e.to_string()))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.content_root, PathBuf::from("."));
        assert!(config.remote.is_none());
        assert_eq!(config.branch, BranchName::main());
        assert_eq!(
            config.missing_remote_settings(),
            vec!["GITHUB_OWNER", "GITHUB_REPO", "GITHUB_TOKEN"]
        );
    }

    #[test]
    fn test_hosted_markers() {
        for vars in [&[("VERCEL", "1")][..], &[("NODE_ENV", "production")], &[("FOLIO_ENV", "hosted")]] {
            let config = StoreConfig::from_lookup(lookup(vars)).unwrap();
            assert_eq!(config.environment, Environment::Hosted);
        }

        // an explicit setting wins over platform markers
        let config = StoreConfig::from_lookup(lookup(&[("VERCEL", "1"), ("FOLIO_ENV", "development")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_github_settings() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("GITHUB_OWNER", "jane"),
            ("GITHUB_REPO", "site"),
            ("GITHUB_TOKEN", " "),
            ("GITHUB_BRANCH", "content"),
            ("GITHUB_API_URL", "https://ghe.example.com/api/v3"),
            ("FOLIO_REMOTE_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.branch.as_str(), "content");
        assert_eq!(config.missing_remote_settings(), vec!["GITHUB_TOKEN"]);
        let Some(RemoteTarget::Github(github)) = &config.remote else {
            panic!("expected a github target");
        };
        assert_eq!(github.api_base, "https://ghe.example.com/api/v3");
        assert_eq!(github.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values() {
        let bad_env = StoreConfig::from_lookup(lookup(&[("FOLIO_ENV", "staging")]));
        assert!(matches!(bad_env, Err(StoreError::InvalidConfig(_))));

        let bad_timeout = StoreConfig::from_lookup(lookup(&[("GITHUB_OWNER", "a"), ("FOLIO_REMOTE_TIMEOUT_SECS", "soon")]));
        assert!(matches!(bad_timeout, Err(StoreError::InvalidConfig(_))));

        let bad_branch = StoreConfig::from_lookup(lookup(&[("GITHUB_BRANCH", "../main")]));
        assert!(matches!(bad_branch, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new("/srv/site").hosted().git_repository("/srv/content.git");
        assert_eq!(config.environment, Environment::Hosted);
        assert!(config.missing_remote_settings().is_empty());
    }
}
