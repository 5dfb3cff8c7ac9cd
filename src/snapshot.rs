use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::world::World;

/// Writes the population summary to `{dir}/{scenario}/frame_{frame:08}.json`
/// every `interval` frames. An interval of 0 disables snapshots.
pub struct SnapshotWriter {
    dir: PathBuf,
    interval: u32,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>, interval: u32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            interval,
        }
    }

    pub fn maybe_write(&self, world: &World, scenario: &str) -> Result<Option<PathBuf>> {
        if self.interval == 0 || world.frame() % self.interval != 0 {
            return Ok(None);
        }

        let dir = self.dir.join(scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("frame_{:08}.json", world.frame()));
        let json = serde_json::to_string_pretty(&world.snapshot(scenario))?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        debug!(path = %path.display(), "wrote snapshot");
        Ok(Some(path))
    }
}
