//! Configuration for the skycache server.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `config.toml` in the platform config dir)
//! 3. the bare environment variables the program has always honoured
//!    (`PORT`, `AUTH_LOGIN`, `CDN`, ...)
//! 4. `SKYCACHE_*` environment variables
//! 5. command-line flags, passed in as [`Overrides`]

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Deserializer, Serialize};
use std::ops::Not;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CDN: &str = "https://cdn.dos.zone/vcsky/";
pub const DEFAULT_WORKERS: usize = 8;

const ENV_PREFIX: &str = "SKYCACHE_";
const LEGACY_ENV: &[(&str, &str)] = &[
    ("PORT", "port"),
    ("AUTH_LOGIN", "login"),
    ("AUTH_PASSWORD", "password"),
    ("CDN", "cdn"),
    ("DOWNLOAD_DIR", "dir"),
    ("DOWNLOAD_CACHE", "download_cache"),
    ("WORKERS", "workers"),
    ("MANIFEST", "manifest"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on (all interfaces).
    pub port: u16,
    /// Basic auth user; auth is only enforced when a password is set too.
    #[serde(deserialize_with = "text")]
    pub login: Option<String>,
    #[serde(deserialize_with = "text")]
    pub password: Option<String>,
    /// Origin base URL that `/vcsky/` requests are proxied to.
    pub cdn: String,
    /// Cache root. See [`Config::cache_dir`].
    pub dir: Option<PathBuf>,
    /// Bulk download worker count.
    pub workers: usize,
    /// Warm the whole cache, then exit.
    #[serde(deserialize_with = "flag")]
    pub download: bool,
    /// Warm the whole cache in the background while serving.
    #[serde(deserialize_with = "flag")]
    pub download_cache: bool,
    /// Asset manifest to use instead of the bundled one.
    pub manifest: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            login: None,
            password: None,
            cdn: DEFAULT_CDN.to_string(),
            dir: None,
            workers: DEFAULT_WORKERS,
            download: false,
            download_cache: false,
            manifest: None,
        }
    }
}

impl Config {
    /// Load from every source, `file` overriding the default config file
    /// location.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match file {
            Some(path) if !path.is_file() => {
                tracing::error!(path = %path.display(), "config file does not exist");
                exn::bail!(ErrorKind::Invalid("config"));
            },
            Some(path) => Some(path.to_path_buf()),
            None => default_file().filter(|path| path.is_file()),
        };
        Self::figment(file.as_deref(), overrides).extract::<Self>().or_raise(|| ErrorKind::Load)?.validated()
    }

    fn figment(file: Option<&Path>, overrides: Overrides) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "reading config file");
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(legacy_env())
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Serialized::defaults(overrides))
    }

    fn validated(self) -> Result<Self> {
        if self.port == 0 {
            exn::bail!(ErrorKind::Invalid("port"));
        }
        if self.workers == 0 {
            exn::bail!(ErrorKind::Invalid("workers"));
        }
        if !(self.cdn.starts_with("http://") || self.cdn.starts_with("https://")) {
            exn::bail!(ErrorKind::Invalid("cdn"));
        }
        Ok(self)
    }

    /// Credentials, if basic auth is enabled.
    pub fn auth(&self) -> Option<(&str, &str)> {
        match (self.login.as_deref(), self.password.as_deref()) {
            (Some(login), Some(password)) if !login.is_empty() && !password.is_empty() => Some((login, password)),
            _ => None,
        }
    }

    /// The cache root: `dir` if set, else `skycache` in the system temp dir.
    pub fn cache_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) if !dir.as_os_str().is_empty() => dir.clone(),
            _ => std::env::temp_dir().join("skycache"),
        }
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Not::not")]
    pub download: bool,
    #[serde(skip_serializing_if = "Not::not")]
    pub download_cache: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

/// `config.toml` in the platform's config directory for this program.
pub fn default_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "skycache").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map(|(_, field)| (*field).into())
    })
}

/// Booleans from the environment arrive as whatever they look like: accept
/// `true`/`false`, `1`/`0`, and `yes`/`no`/`on`/`off`.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Int(value) => Ok(value != 0),
        Flag::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!("expected a boolean, found `{other}`"))),
        },
    }
}

/// Strings from the environment may have been parsed as numbers or booleans
/// (a numeric password, say); take them back as text.
fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Str(String),
        Int(i64),
        Uint(u64),
        Float(f64),
        Bool(bool),
    }
    Ok(Option::<Text>::deserialize(deserializer)?.map(|value| match value {
        Text::Str(s) => s,
        Text::Int(n) => n.to_string(),
        Text::Uint(n) => n.to_string(),
        Text::Float(n) => n.to_string(),
        Text::Bool(b) => b.to_string(),
    }))
}
