//! Checkpoint sinks and stores.

use crate::error::{KohonenError, Result};
use crate::som::PrototypeMap;
use crate::storage::format::CheckpointFormat;
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// An immutable snapshot of the prototype map.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Iteration tag.
    pub tag: u64,
    /// Copy of the map at that iteration.
    pub map: PrototypeMap,
}

/// Receives checkpoints from the training loop.
///
/// `store` must complete before the loop proceeds to the next iteration.
pub trait CheckpointSink {
    /// Durably stores a checkpoint.
    fn store(&mut self, checkpoint: Checkpoint) -> Result<()>;
}

/// A sink that can also hand checkpoints back by tag.
pub trait CheckpointStore: CheckpointSink {
    /// Loads the checkpoint stored under `tag`.
    fn load(&self, tag: u64) -> Result<PrototypeMap>;

    /// All stored tags in ascending order.
    fn tags(&self) -> Result<Vec<u64>>;
}

/// Sink that drops every checkpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl CheckpointSink for NullSink {
    fn store(&mut self, _checkpoint: Checkpoint) -> Result<()> {
        Ok(())
    }
}

/// In-memory checkpoint store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    checkpoints: BTreeMap<u64, PrototypeMap>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored checkpoints.
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Borrows the checkpoint stored under `tag`.
    pub fn get(&self, tag: u64) -> Option<&PrototypeMap> {
        self.checkpoints.get(&tag)
    }
}

impl CheckpointSink for MemoryStore {
    fn store(&mut self, checkpoint: Checkpoint) -> Result<()> {
        self.checkpoints.insert(checkpoint.tag, checkpoint.map);
        Ok(())
    }
}

impl CheckpointStore for MemoryStore {
    fn load(&self, tag: u64) -> Result<PrototypeMap> {
        self.checkpoints
            .get(&tag)
            .cloned()
            .ok_or(KohonenError::CheckpointNotFound(tag))
    }

    fn tags(&self) -> Result<Vec<u64>> {
        Ok(self.checkpoints.keys().copied().collect())
    }
}

/// File-backed checkpoint store, one `weights_<tag>.ksom` file per tag.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// File name prefix.
    const PREFIX: &'static str = "weights_";
    /// File extension.
    const EXTENSION: &'static str = "ksom";

    /// Opens (creating if needed) a store rooted at `root`.
    pub fn create<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens an existing store without creating anything.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(KohonenError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("checkpoint directory {} does not exist", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Directory holding the checkpoint files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file for `tag`.
    pub fn path_for(&self, tag: u64) -> PathBuf {
        self.root
            .join(format!("{}{}.{}", Self::PREFIX, tag, Self::EXTENSION))
    }

    fn parse_tag(path: &Path) -> Option<u64> {
        if path.extension()? != Self::EXTENSION {
            return None;
        }
        path.file_stem()?
            .to_str()?
            .strip_prefix(Self::PREFIX)?
            .parse()
            .ok()
    }
}

impl CheckpointSink for DirectoryStore {
    fn store(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let path = self.path_for(checkpoint.tag);
        CheckpointFormat::write(&path, checkpoint.tag, &checkpoint.map)?;
        debug!("Wrote checkpoint {} to {}", checkpoint.tag, path.display());
        Ok(())
    }
}

impl CheckpointStore for DirectoryStore {
    fn load(&self, tag: u64) -> Result<PrototypeMap> {
        let path = self.path_for(tag);
        if !path.exists() {
            return Err(KohonenError::CheckpointNotFound(tag));
        }
        let (header, map) = CheckpointFormat::read(&path)?;
        if header.tag != tag {
            return Err(KohonenError::InvalidCheckpoint(format!(
                "{} holds tag {}, expected {}",
                path.display(),
                header.tag,
                tag
            )));
        }
        Ok(map)
    }

    fn tags(&self) -> Result<Vec<u64>> {
        let mut tags = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            if let Some(tag) = Self::parse_tag(&entry?.path()) {
                tags.push(tag);
            }
        }
        tags.sort_unstable();
        Ok(tags)
    }
}
