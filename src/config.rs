use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{hlog_debug, Error, Result};

const DEFAULT_API_URL: &str = "https://api.anyfetch.com";
const DEFAULT_MOCKS_DIR: &str = "mocks";
const DEFAULT_CATALOG: &str = "config/descriptors.json";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_count() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Credentials {
    pub login: Option<String>,
    pub password: Option<String>,
}

/// Templates for the entities created during a harvest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FakeEntities {
    #[serde(default = "default_fake_user")]
    pub user: Value,
    #[serde(default = "default_fake_company")]
    pub company: Value,
    #[serde(default = "default_fake_document")]
    pub document: Value,
}

fn default_fake_user() -> Value {
    json!({
        "email": "thechuck@norris.com",
        "name": "Chuck Norris",
        "password": "norris",
        "is_admin": true
    })
}

fn default_fake_company() -> Value {
    json!({
        "name": "the_chuck_company"
    })
}

fn default_fake_document() -> Value {
    json!({
        "identifier": "the \"unique\" document identifier (éüà)",
        "document_type": "file",
        "data": {
            "foo": "some_string"
        },
        "metadata": {
            "some_key": "some random sentence"
        }
    })
}

impl Default for FakeEntities {
    fn default() -> Self {
        Self {
            user: default_fake_user(),
            company: default_fake_company(),
            document: default_fake_document(),
        }
    }
}

impl FakeEntities {
    /// Identifier of the fake document, used to fetch and delete it.
    pub fn document_identifier(&self) -> Option<&str> {
        self.document.get("identifier").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub mocks_dir: Option<String>,
    pub catalog: Option<String>,
    #[serde(default = "default_user_count")]
    pub user_count: usize,
    pub max_in_flight: Option<usize>,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub fake: FakeEntities,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            mocks_dir: None,
            catalog: None,
            user_count: default_user_count(),
            max_in_flight: None,
            credentials: Credentials::default(),
            fake: FakeEntities::default(),
        }
    }
}

impl Config {
    pub fn harvest_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(Error::NoHomeDir)?
            .join(".mock-harvest"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::harvest_dir()?.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults. Environment overrides are applied
    /// last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };
        hlog_debug!("Config::load path={}", path.display());

        let mut config = if path.exists() {
            Self::from_toml(&fs::read_to_string(&path)?)?
        } else {
            hlog_debug!("Config file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());

        hlog_debug!(
            "Config loaded: api_url={}, user_count={}, max_in_flight={:?}",
            config.api_url,
            config.user_count,
            config.max_in_flight
        );
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `MOCKS_API_URL`, `MOCKS_LOGIN` and `MOCKS_PASSWORD`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("MOCKS_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        }
        if let Some(login) = lookup("MOCKS_LOGIN").filter(|v| !v.is_empty()) {
            self.credentials.login = Some(login);
        }
        if let Some(password) = lookup("MOCKS_PASSWORD").filter(|v| !v.is_empty()) {
            self.credentials.password = Some(password);
        }
    }

    /// Login and password, both required to harvest.
    pub fn credentials(&self) -> Result<(String, String)> {
        match (&self.credentials.login, &self.credentials.password) {
            (Some(login), Some(password)) if !login.is_empty() && !password.is_empty() => {
                Ok((login.clone(), password.clone()))
            }
            _ => Err(Error::Config(
                "a login and a password are required (set MOCKS_LOGIN and MOCKS_PASSWORD)"
                    .to_string(),
            )),
        }
    }

    pub fn mocks_dir(&self) -> PathBuf {
        expand_tilde(self.mocks_dir.as_deref().unwrap_or(DEFAULT_MOCKS_DIR))
    }

    pub fn catalog_path(&self) -> PathBuf {
        expand_tilde(self.catalog.as_deref().unwrap_or(DEFAULT_CATALOG))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
