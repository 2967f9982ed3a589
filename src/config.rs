use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const CONFIG_FILENAME: &str = "docfill.toml";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub remote: RemoteSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ApiSection {
    /// Chat model identifier sent with every collaborator call.
    #[serde(default)]
    pub model: Option<String>,
    /// OpenAI-compatible endpoint root.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
}

impl ApiSection {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RemoteSection {
    /// Base URL of a deployed docfill server (remote mode).
    #[serde(default)]
    pub endpoint: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, CONFIG_FILENAME, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILENAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() && !force {
        anyhow::bail!("config already exists: {} (use --force)", path.display());
    }
    std::fs::write(&path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", path.display()))?;
    Ok(path)
}

pub const DEFAULT_CONFIG_TOML: &str = r#"# docfill configuration

[api]
# Chat model used for placeholder detection and filling.
model = "gpt-4o"
# OpenAI-compatible endpoint root.
base_url = "https://api.openai.com/v1"
# Environment variable that holds the API key.
api_key_env = "OPENAI_API_KEY"
max_retries = 3
# max_output_tokens = 4000

[remote]
# Deployed docfill server for --remote mode.
# endpoint = "http://localhost:3000"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses() {
        let cfg: AppConfig = toml::from_str(DEFAULT_CONFIG_TOML).expect("parse default config");
        assert_eq!(cfg.api.model(), "gpt-4o");
        assert_eq!(cfg.api.max_retries, Some(3));
        assert!(cfg.remote.endpoint.is_none());
    }

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("parse empty config");
        assert_eq!(cfg.api.model(), DEFAULT_MODEL);
        assert_eq!(cfg.api.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.api.api_key_env(), "OPENAI_API_KEY");
    }
}
