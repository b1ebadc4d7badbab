//! Scaffolding for `slotted init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::config::{HarnessConfig, write_config};

/// Example scenario written by `slotted init`.
pub const SAMPLE_SCENARIO: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scenarios/mail.json"
));

/// Canonical file locations under a project root.
#[derive(Debug, Clone)]
pub struct HarnessPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub scenarios_dir: PathBuf,
    pub sample_scenario_path: PathBuf,
}

impl HarnessPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let scenarios_dir = root.join("scenarios");
        Self {
            config_path: root.join("slotted.toml"),
            sample_scenario_path: scenarios_dir.join("mail.json"),
            scenarios_dir,
            root,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
}

/// Write a default config and the sample scenario. Existing files are kept
/// unless `force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<HarnessPaths> {
    let paths = HarnessPaths::new(root);
    fs::create_dir_all(&paths.scenarios_dir)
        .with_context(|| format!("create {}", paths.scenarios_dir.display()))?;
    if options.force || !paths.config_path.exists() {
        write_config(&paths.config_path, &HarnessConfig::default())?;
    }
    write_if_missing_or_force(&paths.sample_scenario_path, SAMPLE_SCENARIO, options.force)?;
    Ok(paths)
}

fn write_if_missing_or_force(path: &Path, contents: &str, force: bool) -> Result<()> {
    if !force && path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_writes_config_and_sample() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_project(temp.path(), &InitOptions::default()).expect("init");
        assert_eq!(load_config(&paths.config_path).expect("config"), HarnessConfig::default());
        let sample = fs::read_to_string(&paths.sample_scenario_path).expect("sample");
        assert_eq!(sample, SAMPLE_SCENARIO);
    }

    #[test]
    fn init_keeps_existing_files_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path());
        fs::create_dir_all(&paths.scenarios_dir).expect("mkdir");
        fs::write(&paths.sample_scenario_path, "{}").expect("write");

        init_project(temp.path(), &InitOptions { force: false }).expect("init");
        assert_eq!(fs::read_to_string(&paths.sample_scenario_path).expect("read"), "{}");

        init_project(temp.path(), &InitOptions { force: true }).expect("init force");
        assert_eq!(
            fs::read_to_string(&paths.sample_scenario_path).expect("read"),
            SAMPLE_SCENARIO
        );
    }
}
