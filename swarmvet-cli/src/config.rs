///! CLI configuration management

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use swarmvet_core::HealthConfig;

/// Load health-check configuration.
///
/// An explicit path must exist; without one, the default location is used
/// when present and built-in defaults otherwise.
pub fn load(path: Option<&Path>) -> Result<HealthConfig> {
    match path {
        Some(path) => read(path),
        None => {
            let path = default_path()?;
            if path.exists() {
                read(&path)
            } else {
                Ok(HealthConfig::default())
            }
        }
    }
}

fn read(path: &Path) -> Result<HealthConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}

fn default_path() -> Result<PathBuf> {
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".config/swarmvet/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/swarmvet.toml"))).unwrap_err();
        assert!(err.to_string().contains("reading config file"));
    }
}
