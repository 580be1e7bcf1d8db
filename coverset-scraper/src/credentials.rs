use std::path::Path;

use coverset_lib::settings::settings_path;

use crate::error::CatalogError;

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";

/// Client-credentials pair for the Spotify Web API.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"********")
            .finish()
    }
}

/// Where a credential field's value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from an environment variable.
    EnvVar(&'static str),
    /// Loaded from the `[spotify]` table of the settings file.
    ConfigFile,
    /// Not set anywhere.
    Missing,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnvVar(var) => write!(f, "env ${}", var),
            Self::ConfigFile => write!(f, "config file"),
            Self::Missing => write!(f, "not set"),
        }
    }
}

/// Provenance of each credential field.
#[derive(Debug)]
pub struct CredentialSources {
    pub client_id: CredentialSource,
    pub client_secret: CredentialSource,
}

#[derive(Debug, Default, serde::Deserialize)]
struct SettingsFile {
    spotify: Option<SpotifyConfig>,
}

#[derive(Debug, Default, serde::Deserialize)]
struct SpotifyConfig {
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl Credentials {
    /// Load credentials from the environment or the settings file.
    ///
    /// Priority: env vars > `[spotify]` in `settings.toml`.
    pub fn load() -> Result<Self, CatalogError> {
        Self::load_from(&settings_path())
    }

    pub fn load_from(settings: &Path) -> Result<Self, CatalogError> {
        let config = load_config_file(settings);

        let client_id = std::env::var(CLIENT_ID_VAR)
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.client_id.clone()))
            .ok_or_else(|| {
                CatalogError::Config(format!(
                    "Missing client_id. Set {} or add it to [spotify] in {}",
                    CLIENT_ID_VAR,
                    settings.display()
                ))
            })?;

        let client_secret = std::env::var(CLIENT_SECRET_VAR)
            .ok()
            .or_else(|| config.as_ref().and_then(|c| c.client_secret.clone()))
            .ok_or_else(|| {
                CatalogError::Config(format!(
                    "Missing client_secret. Set {} or add it to [spotify] in {}",
                    CLIENT_SECRET_VAR,
                    settings.display()
                ))
            })?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

/// Determine where each credential field is coming from.
pub fn credential_sources(settings: &Path) -> CredentialSources {
    let config = load_config_file(settings);

    let source = |var: &'static str, in_file: bool| {
        if std::env::var(var).is_ok() {
            CredentialSource::EnvVar(var)
        } else if in_file {
            CredentialSource::ConfigFile
        } else {
            CredentialSource::Missing
        }
    };

    CredentialSources {
        client_id: source(
            CLIENT_ID_VAR,
            config.as_ref().is_some_and(|c| c.client_id.is_some()),
        ),
        client_secret: source(
            CLIENT_SECRET_VAR,
            config.as_ref().is_some_and(|c| c.client_secret.is_some()),
        ),
    }
}

fn load_config_file(path: &Path) -> Option<SpotifyConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    let file: SettingsFile = toml::from_str(&content).ok()?;
    file.spotify
}
