use crate::error::CommonError;
use crate::result::CommonResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "weft.config.json";

/// Where saved view state lives between requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateSavingMethod {
    /// Saved state is kept in the session's view cache; the client only sees a token
    Server,
    /// Saved state is encoded into the token itself and round-trips through the client
    Client,
}

impl Default for StateSavingMethod {
    fn default() -> Self {
        StateSavingMethod::Server
    }
}

/// Weft configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub state_saving_method: StateSavingMethod,

    /// Save only the diff against the template baseline (false = whole tree)
    #[serde(default = "default_true")]
    pub partial_state_saving: bool,

    /// Maximum number of logical views (tabs or windows) kept per session
    /// before the least recently used one is evicted with all of its states
    #[serde(default = "default_number_of_views")]
    pub number_of_logical_views: usize,

    /// Maximum number of saved states kept per logical view before LRU eviction
    #[serde(default = "default_number_of_views")]
    pub number_of_views_in_session: usize,

    /// Random state tokens (true) or per-session sequential tokens (false)
    #[serde(default = "default_true")]
    pub generate_unique_state_ids: bool,

    /// View rendered when a postback references an unknown or evicted state token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_expired_recovery_view: Option<String>,

    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Treat unmatched outcomes as view ids
    #[serde(default = "default_true")]
    pub implicit_navigation: bool,
}

fn default_true() -> bool {
    true
}

fn default_number_of_views() -> usize {
    15
}

fn default_locale() -> String {
    "en".to_string()
}

impl Config {
    /// Load config from a directory, falling back to defaults when no file exists
    pub fn load(dir: impl AsRef<Path>) -> CommonResult<Self> {
        let config_path = Self::path_in(dir);

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<Config>(&content)?
        } else {
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse config from a JSON string
    pub fn from_json(json: &str) -> CommonResult<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn path_in(dir: impl AsRef<Path>) -> PathBuf {
        dir.as_ref().join(DEFAULT_CONFIG_NAME)
    }

    pub fn validate(&self) -> CommonResult<()> {
        if self.number_of_logical_views == 0 {
            return Err(CommonError::Invalid(
                "numberOfLogicalViews must be at least 1".to_string(),
            ));
        }

        if self.number_of_views_in_session == 0 {
            return Err(CommonError::Invalid(
                "numberOfViewsInSession must be at least 1".to_string(),
            ));
        }

        if let Some(view) = &self.view_expired_recovery_view {
            if view.trim().is_empty() {
                return Err(CommonError::Invalid(
                    "viewExpiredRecoveryView must not be blank".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn with_recovery_view(mut self, view_id: impl Into<String>) -> Self {
        self.view_expired_recovery_view = Some(view_id.into());
        self
    }

    pub fn with_state_saving_method(mut self, method: StateSavingMethod) -> Self {
        self.state_saving_method = method;
        self
    }

    pub fn with_number_of_views(mut self, count: usize) -> Self {
        self.number_of_views_in_session = count;
        self
    }

    pub fn with_number_of_logical_views(mut self, count: usize) -> Self {
        self.number_of_logical_views = count;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_saving_method: StateSavingMethod::Server,
            partial_state_saving: true,
            number_of_logical_views: default_number_of_views(),
            number_of_views_in_session: default_number_of_views(),
            generate_unique_state_ids: true,
            view_expired_recovery_view: None,
            default_locale: default_locale(),
            implicit_navigation: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "stateSavingMethod": "client",
            "partialStateSaving": false,
            "numberOfViewsInSession": 4,
            "numberOfLogicalViews": 3,
            "generateUniqueStateIds": false,
            "viewExpiredRecoveryView": "/expired"
        }"#;

        let config = Config::from_json(json).unwrap();
        assert_eq!(config.state_saving_method, StateSavingMethod::Client);
        assert!(!config.partial_state_saving);
        assert_eq!(config.number_of_views_in_session, 4);
        assert_eq!(config.number_of_logical_views, 3);
        assert!(!config.generate_unique_state_ids);
        assert_eq!(config.view_expired_recovery_view.as_deref(), Some("/expired"));
        assert_eq!(config.default_locale, "en");
        assert!(config.implicit_navigation);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.state_saving_method, StateSavingMethod::Server);
        assert!(config.partial_state_saving);
        assert_eq!(config.number_of_views_in_session, 15);
        assert_eq!(config.number_of_logical_views, 15);
        assert!(config.view_expired_recovery_view.is_none());
    }

    #[test]
    fn test_rejects_zero_view_capacity() {
        let err = Config::from_json(r#"{ "numberOfViewsInSession": 0 }"#).unwrap_err();
        assert!(matches!(err, CommonError::Invalid(_)));

        let err = Config::from_json(r#"{ "numberOfLogicalViews": 0 }"#).unwrap_err();
        assert!(matches!(err, CommonError::Invalid(ref m) if m.contains("numberOfLogicalViews")));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            Config::path_in(dir.path()),
            r#"{ "numberOfViewsInSession": 2, "defaultLocale": "de" }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.number_of_views_in_session, 2);
        assert_eq!(config.default_locale, "de");
    }
}
