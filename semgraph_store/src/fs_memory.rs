//! File-memory collaborator: snapshots and link content.
//!
//! The store persists through this interface only. [`FileMemory`] keeps the
//! segments in a binary snapshot next to a JSON manifest and the link
//! content index in a JSON file. [`NullMemory`] backs stores without a repo
//! directory: content lives in memory and snapshots are no-ops.

use crate::segment::SegmentImage;
use parking_lot::RwLock;
use semgraph::addr::PackedAddr;
use semgraph::error::{StoreError, StoreResult};
use semgraph::params::StoreParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

/// Opaque snapshot of the segments vector, the unit of `save`/`load`.
pub struct SegmentSnapshot {
    pub(crate) segments: Vec<SegmentImage>,
}

/// Interface the store requires from its persistence collaborator.
pub trait FsMemory: Send + Sync {
    /// Forwarded store lifecycle: called once before any other operation.
    fn initialize(&mut self, params: &StoreParams) -> StoreResult<()>;
    /// Forwarded store lifecycle: called once on shutdown.
    fn shutdown(&mut self) -> StoreResult<()>;

    /// Persist a snapshot of the segments vector.
    fn save(&self, snapshot: &SegmentSnapshot) -> StoreResult<()>;
    /// Load the previously saved snapshot, `None` when there is none.
    fn load(&self) -> StoreResult<Option<SegmentSnapshot>>;

    /// Associate content bytes with a link key.
    fn link_string(&self, key: PackedAddr, bytes: &[u8], searchable: bool) -> StoreResult<()>;
    /// Drop the content association of a link key.
    fn unlink_string(&self, key: PackedAddr) -> StoreResult<()>;
    /// Content bytes of a link key.
    fn string_by_link(&self, key: PackedAddr) -> StoreResult<Option<Vec<u8>>>;
    /// Keys of searchable links whose content equals `bytes`.
    fn links_by_string(&self, bytes: &[u8]) -> StoreResult<Vec<PackedAddr>>;
    /// Keys of searchable links whose content matches `bytes` by
    /// substring; queries no longer than `max_prefix_len` match as a
    /// prefix instead.
    fn links_by_substring(&self, bytes: &[u8], max_prefix_len: u32) -> StoreResult<Vec<PackedAddr>>;
    /// Contents of searchable links matching `bytes` by substring, with
    /// the same prefix rule.
    fn strings_by_substring(&self, bytes: &[u8], max_prefix_len: u32)
    -> StoreResult<Vec<Vec<u8>>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentEntry {
    key: u64,
    bytes: Vec<u8>,
    searchable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotManifest {
    version: u32,
    segments: u32,
}

const SNAPSHOT_VERSION: u32 = 1;

/// Substring match with the prefix shortcut: short queries are treated as
/// prefixes, longer ones by containment. A zero limit always means
/// containment; an empty query matches everything.
fn matches_substring(content: &[u8], query: &[u8], max_prefix_len: u32) -> bool {
    if query.is_empty() {
        return true;
    }
    if max_prefix_len != 0 && query.len() <= max_prefix_len as usize {
        return content.starts_with(query);
    }
    if query.len() > content.len() {
        return false;
    }
    content.windows(query.len()).any(|window| window == query)
}

/// Shared content index used by both collaborators.
#[derive(Debug, Default)]
struct ContentIndex {
    entries: HashMap<u64, ContentEntry>,
}

impl ContentIndex {
    fn link(&mut self, key: PackedAddr, bytes: &[u8], searchable: bool) {
        self.entries.insert(
            key.0,
            ContentEntry {
                key: key.0,
                bytes: bytes.to_vec(),
                searchable,
            },
        );
    }

    fn unlink(&mut self, key: PackedAddr) {
        self.entries.remove(&key.0);
    }

    fn get(&self, key: PackedAddr) -> Option<Vec<u8>> {
        self.entries.get(&key.0).map(|entry| entry.bytes.clone())
    }

    fn links_by_string(&self, bytes: &[u8]) -> Vec<PackedAddr> {
        self.entries
            .values()
            .filter(|entry| entry.searchable && entry.bytes == bytes)
            .map(|entry| PackedAddr(entry.key))
            .collect()
    }

    fn links_by_substring(&self, bytes: &[u8], max_prefix_len: u32) -> Vec<PackedAddr> {
        self.entries
            .values()
            .filter(|entry| entry.searchable && matches_substring(&entry.bytes, bytes, max_prefix_len))
            .map(|entry| PackedAddr(entry.key))
            .collect()
    }

    fn strings_by_substring(&self, bytes: &[u8], max_prefix_len: u32) -> Vec<Vec<u8>> {
        self.entries
            .values()
            .filter(|entry| entry.searchable && matches_substring(&entry.bytes, bytes, max_prefix_len))
            .map(|entry| entry.bytes.clone())
            .collect()
    }
}

/// In-memory collaborator for stores without a repo directory.
#[derive(Default)]
pub struct NullMemory {
    index: RwLock<ContentIndex>,
}

impl NullMemory {
    /// Create an empty in-memory collaborator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FsMemory for NullMemory {
    fn initialize(&mut self, _params: &StoreParams) -> StoreResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn save(&self, _snapshot: &SegmentSnapshot) -> StoreResult<()> {
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<SegmentSnapshot>> {
        Ok(None)
    }

    fn link_string(&self, key: PackedAddr, bytes: &[u8], searchable: bool) -> StoreResult<()> {
        self.index.write().link(key, bytes, searchable);
        Ok(())
    }

    fn unlink_string(&self, key: PackedAddr) -> StoreResult<()> {
        self.index.write().unlink(key);
        Ok(())
    }

    fn string_by_link(&self, key: PackedAddr) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.index.read().get(key))
    }

    fn links_by_string(&self, bytes: &[u8]) -> StoreResult<Vec<PackedAddr>> {
        Ok(self.index.read().links_by_string(bytes))
    }

    fn links_by_substring(&self, bytes: &[u8], max_prefix_len: u32) -> StoreResult<Vec<PackedAddr>> {
        Ok(self.index.read().links_by_substring(bytes, max_prefix_len))
    }

    fn strings_by_substring(
        &self,
        bytes: &[u8],
        max_prefix_len: u32,
    ) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.index.read().strings_by_substring(bytes, max_prefix_len))
    }
}

/// File-backed collaborator rooted at a repo directory.
pub struct FileMemory {
    repo_path: PathBuf,
    index: RwLock<ContentIndex>,
}

impl FileMemory {
    /// Create a collaborator rooted at `repo_path`. The directory is
    /// created on `initialize`.
    pub fn new(repo_path: PathBuf) -> Self {
        Self {
            repo_path,
            index: RwLock::new(ContentIndex::default()),
        }
    }

    fn segments_path(&self) -> PathBuf {
        self.repo_path.join("segments.bin")
    }

    fn manifest_path(&self) -> PathBuf {
        self.repo_path.join("segments.json")
    }

    fn strings_path(&self) -> PathBuf {
        self.repo_path.join("strings.json")
    }

    fn save_strings(&self) -> StoreResult<()> {
        let entries: Vec<ContentEntry> = self.index.read().entries.values().cloned().collect();
        let file = File::create(self.strings_path())?;
        serde_json::to_writer(BufWriter::new(file), &entries)?;
        Ok(())
    }

    fn load_strings(&self) -> StoreResult<()> {
        let path = self.strings_path();
        if !path.exists() {
            return Ok(());
        }
        let file = File::open(path)?;
        let entries: Vec<ContentEntry> = serde_json::from_reader(BufReader::new(file))?;
        let mut index = self.index.write();
        index.entries = entries
            .into_iter()
            .map(|entry| (entry.key, entry))
            .collect();
        Ok(())
    }
}

impl FsMemory for FileMemory {
    fn initialize(&mut self, params: &StoreParams) -> StoreResult<()> {
        std::fs::create_dir_all(&self.repo_path)?;
        tracing::info!(
            repo_path = %self.repo_path.display(),
            save_period = params.save_period,
            update_period = params.update_period,
            "file-memory initialized"
        );
        Ok(())
    }

    fn shutdown(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn save(&self, snapshot: &SegmentSnapshot) -> StoreResult<()> {
        let manifest = SnapshotManifest {
            version: SNAPSHOT_VERSION,
            segments: snapshot.segments.len() as u32,
        };
        let manifest_file = File::create(self.manifest_path())?;
        serde_json::to_writer_pretty(BufWriter::new(manifest_file), &manifest)?;

        let mut writer = BufWriter::new(File::create(self.segments_path())?);
        writer.write_all(&(snapshot.segments.len() as u32).to_le_bytes())?;
        for image in &snapshot.segments {
            image.write_to(&mut writer)?;
        }
        writer.flush()?;

        self.save_strings()?;
        tracing::info!(segments = snapshot.segments.len(), "snapshot saved");
        Ok(())
    }

    fn load(&self) -> StoreResult<Option<SegmentSnapshot>> {
        let path = self.segments_path();
        if !path.exists() {
            return Ok(None);
        }

        let manifest_path = self.manifest_path();
        let manifest: Option<SnapshotManifest> = if manifest_path.exists() {
            let file = File::open(manifest_path)?;
            Some(serde_json::from_reader(BufReader::new(file))?)
        } else {
            None
        };
        if let Some(manifest) = &manifest {
            if manifest.version != SNAPSHOT_VERSION {
                return Err(StoreError::Io {
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "unsupported snapshot version",
                    ),
                });
            }
        }

        let mut reader = BufReader::new(File::open(path)?);
        let mut count_buf = [0u8; 4];
        reader.read_exact(&mut count_buf)?;
        let count = u32::from_le_bytes(count_buf);
        let mut segments = Vec::with_capacity(count as usize);
        for _ in 0..count {
            segments.push(SegmentImage::read_from(&mut reader)?);
        }

        self.load_strings()?;
        tracing::info!(segments = segments.len(), "snapshot loaded");
        Ok(Some(SegmentSnapshot { segments }))
    }

    fn link_string(&self, key: PackedAddr, bytes: &[u8], searchable: bool) -> StoreResult<()> {
        self.index.write().link(key, bytes, searchable);
        Ok(())
    }

    fn unlink_string(&self, key: PackedAddr) -> StoreResult<()> {
        self.index.write().unlink(key);
        Ok(())
    }

    fn string_by_link(&self, key: PackedAddr) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.index.read().get(key))
    }

    fn links_by_string(&self, bytes: &[u8]) -> StoreResult<Vec<PackedAddr>> {
        Ok(self.index.read().links_by_string(bytes))
    }

    fn links_by_substring(&self, bytes: &[u8], max_prefix_len: u32) -> StoreResult<Vec<PackedAddr>> {
        Ok(self.index.read().links_by_substring(bytes, max_prefix_len))
    }

    fn strings_by_substring(
        &self,
        bytes: &[u8],
        max_prefix_len: u32,
    ) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.index.read().strings_by_substring(bytes, max_prefix_len))
    }
}
