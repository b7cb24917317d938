//! Runtime configuration for the `parc` binary.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

/// Settings read from `parc.toml` and `PARC_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ParcConfig {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf { PathBuf::from("parc.db") }

impl ParcConfig {
  /// Layer the optional TOML file at `path` under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("PARC"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: ParcConfig = settings
      .try_deserialize()
      .context("failed to deserialise ParcConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_file_falls_back_to_default_store() {
    let cfg = ParcConfig::load(Path::new("does-not-exist.toml")).unwrap();
    // PARC_STORE_PATH may be set in the environment running the tests.
    if std::env::var_os("PARC_STORE_PATH").is_none() {
      assert_eq!(cfg.store_path, PathBuf::from("parc.db"));
    }
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/parc/parc.db")),
      PathBuf::from(home).join("parc/parc.db")
    );
  }

  #[test]
  fn other_paths_untouched() {
    assert_eq!(expand_tilde(Path::new("/var/lib/parc.db")), PathBuf::from("/var/lib/parc.db"));
    assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
  }
}
