use crate::{AppConfig, DocDiffError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "docdiff.toml";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    pub path: PathBuf,
    pub exists: bool,
    pub portable: bool,
}

pub fn load_config(prefer_portable: bool) -> Result<LoadedConfig, DocDiffError> {
    let (path, portable) = resolve_config_path(prefer_portable)?;
    let exists = path.exists();

    let mut config = if exists {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data).map_err(|e| DocDiffError::Config(e.to_string()))?
    } else {
        AppConfig::default()
    };

    config.portable_mode = portable;

    Ok(LoadedConfig {
        config,
        path,
        exists,
        portable,
    })
}

pub fn ensure_config(prefer_portable: bool) -> Result<LoadedConfig, DocDiffError> {
    let loaded = load_config(prefer_portable)?;
    if !loaded.exists {
        save_config(&loaded.path, &loaded.config)?;
    }
    Ok(loaded)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), DocDiffError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = toml::to_string_pretty(config).map_err(|e| DocDiffError::Config(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

fn resolve_config_path(prefer_portable: bool) -> Result<(PathBuf, bool), DocDiffError> {
    if let Some(portable_path) = portable_config_path() {
        if prefer_portable || portable_path.exists() {
            return Ok((portable_path, true));
        }
    }

    let dirs = ProjectDirs::from("", "docdiff", "docdiff")
        .ok_or_else(|| DocDiffError::Config("Unable to determine config directory".to_string()))?;
    Ok((dirs.config_dir().join(CONFIG_FILE_NAME), false))
}

fn portable_config_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("docdiff.toml");

        let config = AppConfig {
            ignore_patterns: vec!["*.tmp".to_string()],
            follow_symlinks: true,
            worker_threads: 4,
            portable_mode: false,
        };

        save_config(&path, &config).unwrap();

        let data = fs::read_to_string(&path).unwrap();
        let loaded: AppConfig = toml::from_str(&data).unwrap();
        assert_eq!(loaded.ignore_patterns, vec!["*.tmp".to_string()]);
        assert!(loaded.follow_symlinks);
        assert_eq!(loaded.worker_threads, 4);
    }

    #[test]
    fn test_config_defaults_on_empty() {
        let loaded: AppConfig = toml::from_str("").unwrap();
        assert!(loaded.ignore_patterns.is_empty());
        assert!(!loaded.follow_symlinks);
        assert_eq!(loaded.worker_threads, 0);
    }
}
