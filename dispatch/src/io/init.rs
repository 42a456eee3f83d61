//! Initialization helpers for `.dispatch/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{DispatchConfig, load_config, write_config};
use super::file_store::{FileSequenceService, SEQUENCE_SCHEMA};

/// Canonical paths within `.dispatch/` for a project root.
#[derive(Debug, Clone)]
pub struct DispatchPaths {
    pub root: PathBuf,
    pub dispatch_dir: PathBuf,
    pub gitignore_path: PathBuf,
    pub config_path: PathBuf,
    pub schema_path: PathBuf,
}

impl DispatchPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dispatch_dir = root.join(".dispatch");
        Self {
            root: root.clone(),
            dispatch_dir: dispatch_dir.clone(),
            gitignore_path: dispatch_dir.join(".gitignore"),
            config_path: dispatch_dir.join("config.toml"),
            schema_path: dispatch_dir.join("sequence.schema.json"),
        }
    }

    /// Data directory for `cfg`.
    pub fn data_dir(&self, cfg: &DispatchConfig) -> PathBuf {
        cfg.resolve_data_dir(&self.dispatch_dir)
    }
}

/// Options for `init_dispatch`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing dispatch-owned files.
    pub force: bool,
}

/// Create `.dispatch/` scaffolding in `root`.
///
/// Fails if `.dispatch/` already exists unless `options.force` is set.
/// Sequence files under the data directory are never touched.
pub fn init_dispatch(root: &Path, options: &InitOptions) -> Result<DispatchPaths> {
    let paths = DispatchPaths::new(root);
    if paths.dispatch_dir.exists() && !paths.dispatch_dir.is_dir() {
        return Err(anyhow!(
            "dispatch init: .dispatch exists but is not a directory"
        ));
    }
    if paths.dispatch_dir.exists() && !options.force {
        return Err(anyhow!(
            "dispatch init: .dispatch already exists (use --force to overwrite)"
        ));
    }

    let cfg = DispatchConfig::default();
    create_dir(&paths.dispatch_dir)?;
    create_dir(&paths.data_dir(&cfg))?;
    write_file(&paths.gitignore_path, DISPATCH_GITIGNORE)?;
    write_file(&paths.schema_path, SEQUENCE_SCHEMA)?;
    write_config(&paths.config_path, &cfg)?;

    Ok(paths)
}

/// Load config for `root` and build the file-backed service it points at.
pub fn open_service(root: &Path) -> Result<(DispatchConfig, FileSequenceService)> {
    let paths = DispatchPaths::new(root);
    let cfg = load_config(&paths.config_path)
        .with_context(|| format!("load config for {}", root.display()))?;
    let service =
        FileSequenceService::new(paths.data_dir(&cfg)).with_max_len(cfg.max_sequence_len);
    Ok((cfg, service))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const DISPATCH_GITIGNORE: &str = "*.tmp\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{items, key};

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_dispatch(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.dispatch_dir.is_dir());
        assert!(paths.gitignore_path.is_file());
        assert!(paths.schema_path.is_file());
        assert!(paths.config_path.is_file());
        assert!(paths.data_dir(&DispatchConfig::default()).is_dir());

        let cfg = load_config(&paths.config_path).expect("load config");
        assert_eq!(cfg, DispatchConfig::default());
    }

    #[test]
    fn init_without_force_refuses_existing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_dispatch(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_dispatch(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_keeps_sequences() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_dispatch(temp.path(), &InitOptions { force: false }).expect("init");
        let (_, service) = open_service(temp.path()).expect("open");
        let k = key("driver-1", "2024-06-01");
        service
            .write_sequence(&k, &items(&[("a", false)]))
            .expect("seed");

        init_dispatch(temp.path(), &InitOptions { force: true }).expect("re-init");
        assert_eq!(
            service.read_sequence(&k).expect("read"),
            items(&[("a", false)])
        );
    }
}
