// src/storage/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::engine::PlanState;

pub mod mock;

pub use mock::MemoryStore;

/// Where plan snapshots are kept between runs.
pub trait StateStore: Send + Sync + Debug {
    /// Load the last saved snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<PlanState>>;
    fn save(&self, state: &PlanState) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<PlanState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("reading state file {:?}", self.path))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("parsing state file {:?}", self.path))?;
        Ok(Some(state))
    }

    fn save(&self, state: &PlanState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating dir {:?}", parent))?;
            }
        }

        let json = serde_json::to_vec_pretty(state).context("serialising plan state")?;
        let tmp = self.temp_path();
        {
            let mut file =
                fs::File::create(&tmp).with_context(|| format!("creating file {:?}", tmp))?;
            file.write_all(&json)
                .with_context(|| format!("writing to file {:?}", tmp))?;
            file.sync_all()
                .with_context(|| format!("syncing file {:?}", tmp))?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing state file {:?}", self.path))?;

        debug!(path = ?self.path, tasks = state.tasks.len(), "plan state saved");
        Ok(())
    }
}
