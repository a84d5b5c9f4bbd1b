//! Init command - create the configuration file and state directories.

use std::path::Path;

use spotindex::config::ConfigFile;

use crate::error::CliError;

/// Run the init command.
pub fn run(config_path: &Path, force: bool) -> Result<(), CliError> {
    let exists = config_path.exists();
    let config = if exists && !force {
        ConfigFile::load(config_path)?
    } else {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        ConfigFile::defaults_in(base)
    };

    for dir in [&config.index.cache_dir, &config.logging.directory] {
        std::fs::create_dir_all(dir)
            .map_err(|e| spotindex::IndexError::io(dir.as_path(), e))?;
    }

    if exists && !force {
        println!("Configuration file already exists (use --force to reset):");
    } else {
        config.save(config_path)?;
        println!("Configuration file written:");
    }
    println!("  {}", config_path.display());
    println!();
    println!("Primary image folder: {}", config.sources.primary.display());
    if !config.sources.primary.exists() {
        println!("  (not found - set [sources] primary in the config file)");
    }
    println!("Snapshots:            {}", config.index.cache_dir.display());
    println!();
    println!("Add network folders with 'spotindex sources add <PATH>',");
    println!("then build the index with 'spotindex index'.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_config_and_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");

        run(&path, false).unwrap();

        assert!(path.exists());
        let config = ConfigFile::load(&path).unwrap();
        assert!(config.index.cache_dir.is_dir());
        assert!(config.logging.directory.is_dir());
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        run(&path, false).unwrap();

        let mut edited = ConfigFile::load(&path).unwrap();
        edited.monitor.interval_secs = 42;
        edited.save(&path).unwrap();

        run(&path, false).unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap().monitor.interval_secs, 42);

        run(&path, true).unwrap();
        assert_ne!(ConfigFile::load(&path).unwrap().monitor.interval_secs, 42);
    }
}
