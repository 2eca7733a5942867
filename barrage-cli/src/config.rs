//! Configuration loading with environment overrides

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ENV_PREFIX: &str = "BARRAGE";

/// File-backed process configuration; every field can be overridden by a
/// `BARRAGE_*` environment variable and then by a CLI flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarrageConfig {
    pub port: Option<u16>,
    pub target_url: Option<String>,
    pub controller_url: Option<String>,
    pub statsd_server_url: Option<String>,
    pub worker_url: Option<String>,
}

impl BarrageConfig {
    /// Load `config.yaml` from the configuration directory; a missing file
    /// yields the defaults.
    pub fn load(config_dir: &Path) -> anyhow::Result<Self> {
        let path = config_dir.join("config.yaml");
        let mut config = if path.is_file() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("could not read {}", path.display()))?;
            let config: BarrageConfig = serde_yaml::from_str(&raw)
                .with_context(|| format!("could not parse {}", path.display()))?;
            info!(path = %path.display(), "using config file");
            config
        } else {
            warn!(dir = %config_dir.display(), "could not find config file");
            BarrageConfig::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(port) = std::env::var(format!("{ENV_PREFIX}_PORT")) {
            self.port = Some(
                port.parse()
                    .with_context(|| format!("invalid {ENV_PREFIX}_PORT: {port}"))?,
            );
        }
        for (var, field) in [
            ("TARGET_URL", &mut self.target_url),
            ("CONTROLLER_URL", &mut self.controller_url),
            ("STATSD_SERVER_URL", &mut self.statsd_server_url),
            ("WORKER_URL", &mut self.worker_url),
        ] {
            if let Ok(value) = std::env::var(format!("{ENV_PREFIX}_{var}")) {
                *field = Some(value);
            }
        }
        Ok(())
    }
}

/// Path of the optional `projects.json` that installs the file-backed
/// project provider.
pub fn projects_file(config_dir: &Path) -> Option<PathBuf> {
    let path = config_dir.join("projects.json");
    path.is_file().then_some(path)
}
