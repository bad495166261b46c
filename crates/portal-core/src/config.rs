//! Portal configuration
//!
//! Every recognized option is a named field; unknown keys are rejected when
//! the TOML file is parsed. Passwords for seeded portals can come from the
//! file or from `PORTAL_PASSWORD_<ID>` environment variables, the latter
//! taking precedence.

use crate::activity::DEFAULT_RECENT;
use crate::error::ConfigError;
use crate::store::DeletionPolicy;
use crate::types::{NewResource, PortalId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "PORTAL_CONFIG";
/// Environment variable overriding `data_path`
pub const DATA_PATH_ENV: &str = "PORTAL_DATA_PATH";
/// Environment variable overriding `credentials_path`
pub const CREDENTIALS_PATH_ENV: &str = "PORTAL_CREDENTIALS_PATH";

/// Portal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PortalConfig {
    /// Portal document location
    pub data_path: PathBuf,
    /// Credential file location, kept apart from the document
    pub credentials_path: PathBuf,
    /// Idle seconds before a session must log in again
    pub session_timeout_secs: u64,
    /// Portal whose sessions may run admin operations; cannot be deleted
    pub admin_portal: String,
    /// What deleting a portal does to its log history
    pub deletion_policy: DeletionPolicy,
    /// Default length of the recent-activity feed
    pub recent_default: usize,
    /// Portals created on first start
    pub portals: Vec<PortalSeed>,
}

/// A portal created when the document does not exist yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortalSeed {
    /// Portal name
    pub id: String,
    /// Initial password
    #[serde(default)]
    pub password: Option<String>,
    /// Initial members
    #[serde(default)]
    pub members: Vec<String>,
    /// Initial resources
    #[serde(default)]
    pub resources: Vec<NewResource>,
    /// Password came from the environment and must replace any stored one
    #[serde(skip)]
    pub password_from_env: bool,
}

impl PortalSeed {
    /// Create seed with no password, members or resources
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: None,
            members: Vec::new(),
            resources: Vec::new(),
            password_from_env: false,
        }
    }

    /// With password
    #[inline]
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// With members
    #[inline]
    #[must_use]
    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// With resource
    #[inline]
    #[must_use]
    pub fn with_resource(mut self, resource: NewResource) -> Self {
        self.resources.push(resource);
        self
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("portal_data.json"),
            credentials_path: PathBuf::from("portal_credentials.json"),
            session_timeout_secs: 1800,
            admin_portal: "Admin".to_string(),
            deletion_policy: DeletionPolicy::Cascade,
            recent_default: DEFAULT_RECENT,
            portals: Vec::new(),
        }
    }
}

impl PortalConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With document path
    #[inline]
    #[must_use]
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    /// With credential file path
    #[inline]
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// With session timeout in seconds
    #[inline]
    #[must_use]
    pub fn with_session_timeout_secs(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }

    /// With admin portal name
    #[inline]
    #[must_use]
    pub fn with_admin_portal(mut self, name: impl Into<String>) -> Self {
        self.admin_portal = name.into();
        self
    }

    /// With deletion policy
    #[inline]
    #[must_use]
    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    /// With an additional seeded portal, replacing a seed of the same name
    #[must_use]
    pub fn with_seed(mut self, seed: PortalSeed) -> Self {
        self.portals
            .retain(|s| !s.id.trim().eq_ignore_ascii_case(seed.id.trim()));
        self.portals.push(seed);
        self
    }

    /// Parse configuration from TOML text and validate it
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed TOML or unknown keys,
    /// `ConfigError::Invalid` for inconsistent values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`PortalConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Check values that the schema alone cannot
    ///
    /// # Errors
    /// `ConfigError::Invalid` describing the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session_timeout_secs must be positive".to_string(),
            ));
        }
        if self.recent_default == 0 {
            return Err(ConfigError::Invalid(
                "recent_default must be positive".to_string(),
            ));
        }
        PortalId::new(&self.admin_portal)
            .map_err(|_| ConfigError::Invalid("admin_portal must not be blank".to_string()))?;

        let mut seen: Vec<PortalId> = Vec::new();
        for seed in &self.portals {
            let id = PortalId::new(&seed.id)
                .map_err(|_| ConfigError::Invalid("portal id must not be blank".to_string()))?;
            if seen.iter().any(|s| s.same_name(&id)) {
                return Err(ConfigError::Invalid(format!("portal {id} is listed twice")));
            }
            if seed.resources.iter().any(|r| r.name.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "portal {id} has a resource with a blank name"
                )));
            }
            seen.push(id);
        }
        Ok(())
    }

    /// Admin portal id
    ///
    /// # Errors
    /// `ConfigError::Invalid` if blank
    pub fn admin_portal_id(&self) -> Result<PortalId, ConfigError> {
        PortalId::new(&self.admin_portal)
            .map_err(|_| ConfigError::Invalid("admin_portal must not be blank".to_string()))
    }

    /// Session idle threshold
    #[must_use]
    pub fn session_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.session_timeout_secs).unwrap_or(i64::MAX))
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(std::env::vars())
    }

    /// Apply overrides from the given variables
    ///
    /// Recognized: `PORTAL_DATA_PATH`, `PORTAL_CREDENTIALS_PATH` and
    /// `PORTAL_PASSWORD_<ID>` for every seeded portal and the admin portal.
    #[must_use]
    pub fn with_overrides_from<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.into()))
            .collect();
        let lookup = |key: &str| {
            vars.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        if let Some(path) = lookup(DATA_PATH_ENV) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(CREDENTIALS_PATH_ENV) {
            self.credentials_path = PathBuf::from(path);
        }

        if let Ok(admin) = PortalId::new(&self.admin_portal) {
            let listed = self
                .portals
                .iter()
                .any(|s| PortalId::new(&s.id).is_ok_and(|id| id.same_name(&admin)));
            if !listed {
                self.portals.push(PortalSeed::new(admin.as_str()));
            }
        }

        for seed in &mut self.portals {
            let Ok(id) = PortalId::new(&seed.id) else {
                continue;
            };
            let var = id.password_env_var();
            if let Some(password) = lookup(&var).filter(|p| !p.is_empty()) {
                tracing::debug!("password for portal {} taken from {}", id, var);
                seed.password = Some(password);
                seed.password_from_env = true;
            }
        }
        self
    }
}
