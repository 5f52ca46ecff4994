//! Writing a starter configuration file.

use std::path::Path;

use crate::config::{self, Config};

/// Write the default configuration to `path` (or the default location).
pub fn cmd_init_config(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
    }

    config::save(&Config::default(), &path)?;
    println!("Wrote default configuration to {}", path.display());
    println!("Set paths.base_dir, paths.dest_dir and paths.changes_file before the first run.");
    Ok(())
}
