//! Subcommands for managing the program settings file
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result, ensure};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// Subcommands for settings
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Write a commented-out settings file to the config directory
    Init,
    /// Get the path to where the settings file is read from
    Path,
    /// Write the contents of a placeholder `settings.toml` to the console
    DumpDefault,
}

impl SettingsSubcommands {
    /// Execute the supplied settings subcommand
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Init => {
                let file_path = get_settings_file_path();
                write_default_settings_file(&file_path)?;
                println!("Settings file written to {}", file_path.display());
            }
            Self::Path => println!("{}", get_settings_file_path().display()),
            Self::DumpDefault => print!("{}", Settings::default_file_contents()),
        }

        Ok(())
    }
}

/// Create a placeholder settings file, failing if one already exists
fn write_default_settings_file(file_path: &Path) -> Result<()> {
    ensure!(
        !file_path.exists(),
        "Settings file already exists: {}",
        file_path.display()
    );

    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path)
            .with_context(|| format!("Failed to create directory: {}", dir_path.display()))?;
    }
    fs::write(file_path, Settings::default_file_contents())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_default_settings_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("deropt").join("settings.toml");

        write_default_settings_file(&file_path).unwrap();
        let contents = fs::read_to_string(&file_path).unwrap();
        assert!(contents.starts_with("# This file contains the program settings for deropt"));

        // Never clobber an existing file
        assert!(write_default_settings_file(&file_path).is_err());
    }
}
