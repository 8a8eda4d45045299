use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EchovetProfileConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
    pub scenarios: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EchovetConfig {
    #[serde(rename = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
    pub scenarios: Option<String>,
    #[serde(rename = "defaultProfile")]
    pub default_profile: Option<String>,
    pub profiles: HashMap<String, EchovetProfileConfig>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EchovetConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
}

/// Settings after profile and flag resolution; everything the harness needs
/// is explicit here, nothing global.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub scenarios: Option<PathBuf>,
}

/// Looks for `echovet.json` in the target directory (or reads the target as
/// a config file directly). A missing file is not an error.
pub fn load_config(target: &Path) -> Result<Option<LoadedConfig>> {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        std::env::current_dir()?.join(target)
    };

    let (file_path, dir) = if resolved.is_dir() {
        (resolved.join("echovet.json"), resolved)
    } else {
        (
            resolved.clone(),
            resolved
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or(resolved),
        )
    };

    if !file_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&file_path)
        .with_context(|| format!("reading config {}", file_path.display()))?;
    let config: EchovetConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", file_path.display()))?;

    Ok(Some(LoadedConfig {
        config,
        path: file_path,
        dir,
    }))
}

impl LoadedConfig {
    /// Profile values override top-level ones; the caller's CLI flags
    /// override both.
    pub fn resolve(&self, requested_profile: Option<&str>) -> Result<ResolvedSettings> {
        let profile_name = requested_profile
            .map(str::to_string)
            .or_else(|| self.config.default_profile.clone());

        let profile = match &profile_name {
            Some(name) => Some(self.config.profiles.get(name).with_context(|| {
                format!("profile {:?} not found in {}", name, self.path.display())
            })?),
            None => None,
        };

        let base_url = profile
            .and_then(|p| p.base_url.clone())
            .or_else(|| self.config.base_url.clone());

        let timeout_ms = profile
            .and_then(|p| p.timeout_ms)
            .or(self.config.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let scenarios = profile
            .and_then(|p| p.scenarios.clone())
            .or_else(|| self.config.scenarios.clone())
            .map(|value| resolve_relative(&self.dir, &value));

        Ok(ResolvedSettings {
            base_url,
            timeout_ms,
            scenarios,
        })
    }
}

pub fn resolve_relative(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

pub fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
