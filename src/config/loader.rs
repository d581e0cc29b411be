//! Configuration loading and merging logic.

use std::path::{Path, PathBuf};

use super::{Config, Settings};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (`--target`); takes precedence over the config file.
    pub target: Option<PathBuf>,
}

/// Look for a config file inside the data directory.
fn find_config_in_data_dir(data_dir: &Path) -> Option<PathBuf> {
    let extensions = ["toml", "yaml", "yml", "json"];
    for ext in extensions {
        let path = data_dir.join(format!("stakeholder.{}", ext));
        if path.exists() {
            return Some(path);
        }
    }
    None
}

fn absolute(path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

async fn load_file_config(options: &LoadOptions, target: Option<&Path>) -> Result<Config, String> {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return Config::load_from_path(config_path).await;
    }

    // Priority 2: Config inside the target directory
    if let Some(config_path) = target.and_then(find_config_in_data_dir) {
        tracing::debug!("Found config in data dir: {}", config_path.display());
        return Config::load_from_path(&config_path).await;
    }

    // Priority 3: Auto-discover via prefer
    Ok(Config::load().await)
}

/// Resolve settings: defaults, then config file, then `--target`.
///
/// An explicit `--config` that cannot be read or parsed is an error.
pub async fn load_settings(options: LoadOptions) -> Result<(Settings, Config), String> {
    let target = options.target.as_deref().map(absolute);
    let config = load_file_config(&options, target.as_deref()).await?;

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(target) = target {
        settings.set_data_dir(target);
    }

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn target_overrides_config_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stakeholder.toml"),
            "data_dir = \"/elsewhere\"\n[download]\nconcurrency = 3\n",
        )
        .unwrap();

        let (settings, config) = load_settings(LoadOptions {
            config_path: None,
            target: Some(dir.path().to_path_buf()),
        })
        .await
        .unwrap();

        assert!(config.source_path.is_some());
        assert_eq!(settings.data_dir, dir.path());
        assert_eq!(settings.download.concurrency, 3);
    }

    #[tokio::test]
    async fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_settings(LoadOptions {
            config_path: Some(dir.path().join("nope.toml")),
            target: Some(dir.path().to_path_buf()),
        })
        .await;
        assert!(result.is_err());
    }
}
