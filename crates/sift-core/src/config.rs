//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wrap an already assembled figment, e.g. an inline TOML string in tests.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Like `get`, but an absent key yields `default`. A present but malformed
    /// value is still an error.
    pub fn get_or<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(default) }
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let search = SearchSettings::from_config(self)?;
        match env {
            "prod" | "production" if search.max_results > SearchSettings::HARD_CEILING => {
                return Err(Error::InvalidConfig(format!(
                    "search.max_results {} exceeds {} in production",
                    search.max_results,
                    SearchSettings::HARD_CEILING
                ))
                .into());
            }
            _ => {}
        }
        Ok(())
    }
}

/// Process-wide limits applied to every query descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Ceiling every `max_results` is clamped to.
    pub max_results: usize,
    /// Used when a descriptor omits `max_results`.
    pub default_max_results: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { max_results: 10_000, default_max_results: 20 }
    }
}

impl SearchSettings {
    pub const HARD_CEILING: usize = 100_000;

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings: Self = config.get_or("search", Self::default())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.max_results == 0 {
            return Err(Error::InvalidConfig("search.max_results must be greater than zero".into()));
        }
        if self.default_max_results > self.max_results {
            return Err(Error::InvalidConfig(format!(
                "search.default_max_results {} exceeds search.max_results {}",
                self.default_max_results, self.max_results
            )));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
