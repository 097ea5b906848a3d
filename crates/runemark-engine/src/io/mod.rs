use crate::marks::exclusivity::is_consistent;
use crate::marks::payload::PayloadValue;
use crate::marks::run::Run;
use crate::marks::sequence::{BlockId, RunSequence};
use crate::marks::tag::TagSet;
use log::warn;
use relative_path::{RelativePath, RelativePathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid blocks directory: {0}")]
    InvalidBlocksDir(String),
    #[error("Failed to parse block file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize block {id}: {source}")]
    Serialize {
        id: BlockId,
        #[source]
        source: toml::ser::Error,
    },
}

/// On-disk form of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFile {
    /// Files written by hand may leave this out; a fresh id is assigned
    #[serde(default = "BlockId::generate")]
    pub id: BlockId,
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_untagged")]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<PayloadValue>,
}

fn is_untagged(tags: &TagSet) -> bool {
    tags.is_empty()
}

impl From<&Run> for RunRecord {
    fn from(run: &Run) -> Self {
        Self {
            text: run.text().to_string(),
            tags: run.tags(),
            payload: run.payload().values().cloned().collect(),
        }
    }
}

impl RunRecord {
    /// Build the run, resolving conflicting tags and dropping payload for
    /// tags the run does not carry
    fn into_run(self) -> Run {
        if !is_consistent(self.tags) {
            warn!(
                "Run {:?} carries conflicting tags `{}`; later tags win",
                self.text,
                self.tags.data_type()
            );
        }
        let mut run = Run::new(self.text, self.tags);
        for value in self.payload {
            if run.has(value.tag()) {
                run = run.with_payload(value);
            } else {
                warn!("Dropping `{}` payload of a run without that tag", value.tag());
            }
        }
        run
    }
}

impl From<&RunSequence> for BlockFile {
    fn from(sequence: &RunSequence) -> Self {
        Self {
            id: sequence.block_id().clone(),
            runs: sequence.runs().map(RunRecord::from).collect(),
        }
    }
}

impl From<BlockFile> for RunSequence {
    fn from(file: BlockFile) -> Self {
        RunSequence::from_runs(file.id, file.runs.into_iter().map(RunRecord::into_run))
    }
}

/// Parse a block from TOML text
pub fn block_from_toml(content: &str) -> Result<RunSequence, toml::de::Error> {
    let file: BlockFile = toml::from_str(content)?;
    Ok(file.into())
}

/// Render a block as TOML text
pub fn block_to_toml(sequence: &RunSequence) -> Result<String, toml::ser::Error> {
    toml::to_string(&BlockFile::from(sequence))
}

/// Read a block file
pub fn read_block(relative_path: &RelativePath, blocks_root: &Path) -> Result<RunSequence, IoError> {
    let absolute_path = relative_path.to_path(blocks_root);
    if !absolute_path.exists() {
        return Err(IoError::NotFound(absolute_path));
    }
    let content = fs::read_to_string(&absolute_path)?;
    block_from_toml(&content).map_err(|source| IoError::Parse {
        path: absolute_path,
        source,
    })
}

/// Write a block file, creating parent directories as needed
pub fn write_block(
    relative_path: &RelativePath,
    blocks_root: &Path,
    sequence: &RunSequence,
) -> Result<(), IoError> {
    let absolute_path = relative_path.to_path(blocks_root);
    let content = block_to_toml(sequence).map_err(|source| IoError::Serialize {
        id: sequence.block_id().clone(),
        source,
    })?;

    if let Some(parent) = absolute_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&absolute_path, content)?;
    Ok(())
}

/// Scan for block files, returned relative to `blocks_root` in sorted order
pub fn scan_block_files(blocks_root: &Path) -> Result<Vec<RelativePathBuf>, IoError> {
    if !blocks_root.exists() {
        return Err(IoError::InvalidBlocksDir(
            "blocks directory not found".to_string(),
        ));
    }

    let mut files = Vec::new();
    scan_directory_recursive(blocks_root, &mut files)?;
    files.sort();

    files
        .iter()
        .filter_map(|path| path.strip_prefix(blocks_root).ok())
        .map(|relative| {
            RelativePathBuf::from_path(relative)
                .map_err(|e| IoError::InvalidBlocksDir(e.to_string()))
        })
        .collect()
}

fn scan_directory_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), IoError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            scan_directory_recursive(&path, files)?;
        } else if let Some(ext) = path.extension()
            && ext == "toml"
        {
            files.push(path);
        }
    }

    Ok(())
}

pub fn validate_blocks_dir(path: &Path) -> Result<(), IoError> {
    if !path.exists() || !path.is_dir() {
        return Err(IoError::InvalidBlocksDir(
            "Directory does not exist".to_string(),
        ));
    }

    Ok(())
}
