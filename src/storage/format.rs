//! Binary format for prototype map checkpoints.
//!
//! ## Format Layout
//!
//! ```text
//! +------------------+
//! | Header (32 bytes)|
//! +------------------+
//! | Weights          |
//! | (bincode Vec)    |
//! +------------------+
//! ```
//!
//! ### Header (32 bytes)
//! - Magic number (4 bytes): "KSOM"
//! - Version (2 bytes)
//! - Flags (2 bytes): reserved, 0
//! - Grid rows (4 bytes)
//! - Grid columns (4 bytes)
//! - Vector dimension (4 bytes)
//! - Tag (8 bytes): iteration at which the snapshot was taken
//! - Reserved (4 bytes)
//!
//! All integers are little-endian.

use crate::error::{KohonenError, Result};
use crate::som::{PrototypeMap, Topology};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic number for checkpoint files.
const MAGIC: &[u8; 4] = b"KSOM";

/// Current format version.
const VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// Checkpoint file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointHeader {
    /// Format version.
    pub version: u16,
    /// Flags.
    pub flags: u16,
    /// Grid rows.
    pub rows: u32,
    /// Grid columns.
    pub cols: u32,
    /// Vector dimension.
    pub dim: u32,
    /// Checkpoint tag.
    pub tag: u64,
}

impl CheckpointHeader {
    /// Creates a header describing `map` under `tag`.
    pub fn new(tag: u64, map: &PrototypeMap) -> Result<Self> {
        let topology = map.topology();
        Ok(Self {
            version: VERSION,
            flags: 0,
            rows: to_u32(topology.rows(), "rows")?,
            cols: to_u32(topology.cols(), "cols")?,
            dim: to_u32(map.dim(), "dim")?,
            tag,
        })
    }

    /// Writes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.rows.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.cols.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.dim.to_le_bytes());
        bytes[20..28].copy_from_slice(&self.tag.to_le_bytes());
        // Reserved (bytes 28-31)
        bytes
    }

    /// Reads a header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(KohonenError::InvalidCheckpoint(
                "Header too short".to_string(),
            ));
        }
        if &bytes[0..4] != MAGIC {
            return Err(KohonenError::InvalidCheckpoint(
                "Invalid magic number".to_string(),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(KohonenError::InvalidCheckpoint(format!(
                "Unsupported version {}",
                version
            )));
        }

        Ok(Self {
            version,
            flags: u16::from_le_bytes([bytes[6], bytes[7]]),
            rows: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            cols: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            dim: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            tag: u64::from_le_bytes([
                bytes[20], bytes[21], bytes[22], bytes[23], bytes[24], bytes[25], bytes[26],
                bytes[27],
            ]),
        })
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| KohonenError::InvalidCheckpoint(format!("{} too large: {}", what, value)))
}

/// Reader/writer for checkpoint files.
pub struct CheckpointFormat;

impl CheckpointFormat {
    /// Writes `map` tagged with `tag` to `path`.
    pub fn write<P: AsRef<Path>>(path: P, tag: u64, map: &PrototypeMap) -> Result<()> {
        let header = CheckpointHeader::new(tag, map)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&header.to_bytes())?;
        bincode::serialize_into(&mut writer, map.as_slice())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads only the header of a checkpoint file.
    pub fn read_header<P: AsRef<Path>>(path: P) -> Result<CheckpointHeader> {
        let mut file = File::open(path)?;
        let mut bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut bytes)?;
        CheckpointHeader::from_bytes(&bytes)
    }

    /// Reads a checkpoint file, returning its header and map.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<(CheckpointHeader, PrototypeMap)> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;
        let header = CheckpointHeader::from_bytes(&bytes)?;

        let weights: Vec<f64> = bincode::deserialize_from(&mut reader)?;
        let topology = Topology::new(header.rows as usize, header.cols as usize)
            .map_err(|e| KohonenError::InvalidCheckpoint(e.to_string()))?;
        let map = PrototypeMap::from_flat(topology, header.dim as usize, weights)
            .map_err(|e| KohonenError::InvalidCheckpoint(e.to_string()))?;

        Ok((header, map))
    }
}
