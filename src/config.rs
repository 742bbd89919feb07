//! Runtime configuration read from the environment
//!
//! Both config types can be constructed directly, the `from_env`
//! constructors are only used by the command line tool.

use std::env;
use std::path::PathBuf;

use tracing::debug;

use crate::{PhenotagError, PhenotagResult};

/// Default path of the database snapshot
pub const DEFAULT_DATABASE: &str = "phenotag.json";

/// Locations of the database and of external input files
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Path of the JSON database snapshot (`PHENOTAG_DATABASE`)
    pub database: PathBuf,
    /// Directory of external inputs such as the code map (`PHENOTAG_DATA_DIR`)
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            data_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Constructs settings from explicit paths
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(database: P, data_dir: Q) -> Self {
        Self {
            database: database.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Reads `PHENOTAG_DATABASE` and `PHENOTAG_DATA_DIR`, falling back to
    /// the defaults for unset variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let settings = Self {
            database: env::var_os("PHENOTAG_DATABASE")
                .map(PathBuf::from)
                .unwrap_or(default.database),
            data_dir: env::var_os("PHENOTAG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
        };
        debug!("Settings: {settings:?}");
        settings
    }
}

/// Credentials and metadata for the DOI registrar
///
/// The default configuration is inactive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DoiConfig {
    /// Whether DOIs are registered at all (`DOI_ACTIVE`)
    pub active: bool,
    /// `DOI_USERNAME`
    pub username: String,
    /// `DOI_PASSWORD`
    pub password: String,
    /// The DOI prefix of the library (`DOI_PREFIX`)
    pub prefix: String,
    /// URL the DOIs resolve to (`DOI_REFERRER`)
    pub referrer: String,
    /// Relation type between versions (`DOI_RELATION`)
    pub relation: String,
}

impl DoiConfig {
    /// Constructs an active configuration
    pub fn new(
        username: &str,
        password: &str,
        prefix: &str,
        referrer: &str,
        relation: &str,
    ) -> Self {
        Self {
            active: true,
            username: username.to_string(),
            password: password.to_string(),
            prefix: prefix.to_string(),
            referrer: referrer.to_string(),
            relation: relation.to_string(),
        }
    }

    /// Reads the `DOI_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`PhenotagError::Validation`] if `DOI_ACTIVE` is set but
    /// username, password or prefix are missing
    pub fn from_env() -> PhenotagResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> PhenotagResult<Self> {
        let active = lookup("DOI_ACTIVE").map_or(false, |value| parse_flag(&value));
        let var = |key: &str| lookup(key).unwrap_or_default().trim().to_string();
        let config = Self {
            active,
            username: var("DOI_USERNAME"),
            password: var("DOI_PASSWORD"),
            prefix: var("DOI_PREFIX"),
            referrer: var("DOI_REFERRER"),
            relation: var("DOI_RELATION"),
        };
        if config.active {
            for (field, value) in [
                ("DOI_USERNAME", &config.username),
                ("DOI_PASSWORD", &config.password),
                ("DOI_PREFIX", &config.prefix),
            ] {
                if value.is_empty() {
                    return Err(PhenotagError::Validation {
                        field,
                        reason: "required when DOI_ACTIVE is set".to_string(),
                    });
                }
            }
        }
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn flags() {
        for value in ["true", "TRUE", "1", "yes", " On "] {
            assert!(parse_flag(value), "{value}");
        }
        for value in ["false", "0", "", "nope"] {
            assert!(!parse_flag(value), "{value}");
        }
    }

    #[test]
    fn inactive_without_credentials() {
        let config = DoiConfig::from_lookup(lookup(&[("DOI_ACTIVE", "false")])).unwrap();
        assert_eq!(config, DoiConfig::default());
    }

    #[test]
    fn active_requires_credentials() {
        let err = DoiConfig::from_lookup(lookup(&[("DOI_ACTIVE", "yes"), ("DOI_USERNAME", "u")]));
        assert!(matches!(
            err,
            Err(PhenotagError::Validation { field: "DOI_PASSWORD", .. })
        ));

        let config = DoiConfig::from_lookup(lookup(&[
            ("DOI_ACTIVE", "1"),
            ("DOI_USERNAME", "u"),
            ("DOI_PASSWORD", "p"),
            ("DOI_PREFIX", "10.1234"),
        ]))
        .unwrap();
        assert!(config.active);
        assert_eq!(config.prefix, "10.1234");
    }
}
