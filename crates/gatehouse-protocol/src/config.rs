//! Host configuration loaded from `appsettings*.json`.
//!
//! The only recognised option group is:
//!
//! ```json
//! { "Kestrel": { "Port": 8080, "CertificateSubject": "local-webservices" } }
//! ```
//!
//! Other top-level sections are ignored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Subject used when `Kestrel.CertificateSubject` is absent.
pub const DEFAULT_CERTIFICATE_SUBJECT: &str = "local-webservices";

/// Environment name that selects `appsettings.Development.json`.
pub const DEVELOPMENT_ENVIRONMENT: &str = "Development";

const KESTREL_SECTION: &str = "Kestrel";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("required configuration section '{0}' is missing")]
    MissingSection(&'static str),
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(rename = "Kestrel")]
    pub kestrel: KestrelOptions,
}

/// Listener options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KestrelOptions {
    /// Port to listen on (0 for OS-assigned)
    #[serde(rename = "Port", default)]
    pub port: u16,
    /// Subject of the TLS certificate to resolve or provision
    #[serde(
        rename = "CertificateSubject",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_subject: Option<String>,
}

impl KestrelOptions {
    /// Configured subject, or [`DEFAULT_CERTIFICATE_SUBJECT`].
    pub fn certificate_subject(&self) -> &str {
        self.certificate_subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_CERTIFICATE_SUBJECT)
    }
}

impl HostConfig {
    /// Parses a configuration document. `origin` names the source in errors.
    pub fn from_json(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let parse = |source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        };

        let document: serde_json::Value = serde_json::from_str(text).map_err(parse)?;
        if document.get(KESTREL_SECTION).is_none() {
            return Err(ConfigError::MissingSection(KESTREL_SECTION));
        }
        serde_json::from_value(document).map_err(parse)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Loads the settings file that matches `environment` from `dir`.
    pub fn load_for_environment(dir: &Path, environment: Option<&str>) -> Result<Self, ConfigError> {
        Self::load(&dir.join(Self::settings_file_name(environment)))
    }

    /// `appsettings.Development.json` for the development environment,
    /// `appsettings.json` otherwise.
    pub fn settings_file_name(environment: Option<&str>) -> &'static str {
        match environment {
            Some(env) if env.eq_ignore_ascii_case(DEVELOPMENT_ENVIRONMENT) => {
                "appsettings.Development.json"
            }
            _ => "appsettings.json",
        }
    }
}
