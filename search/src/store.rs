//! Partition persistence.
//!
//! Each financial year is stored as two files in the store directory:
//!
//! - `tenders_<key>.csv`: the record table, one row per tender.
//! - `embeddings_<key>.vec`: a binary vector file.
//!
//! `<key>` is the year with every byte outside `[A-Za-z0-9.-]` written as
//! `_XX` (uppercase hex), see [`year_key`].
//!
//! # Vector file format
//!
//! ```text
//! magic            4 bytes   "TVEC"
//! format version   u32 LE
//! composer version u32 LE
//! record count     u64 LE
//! dimension        u32 LE
//! normalized       u8
//! records digest   32 bytes  SHA-256 of the CSV file
//! year             u16 LE length + UTF-8
//! provider         u16 LE length + UTF-8
//! model            u16 LE length + UTF-8
//! vectors          count * dimension f32 LE
//! ```
//!
//! Both files are written to `.tmp` siblings and renamed into place, CSV
//! first. The digest ties the pair together: a vector file next to any CSV
//! other than the one it was written with fails to load.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::compose::COMPOSER_VERSION;
use crate::error::{Result, SearchError};
use crate::partition::{Partition, PartitionMeta};
use crate::record::TenderRecord;

const MAGIC_BYTES: &[u8; 4] = b"TVEC";

/// Current vector file format version.
const FORMAT_VERSION: u32 = 1;

const BYTES_PER_F32: usize = 4;

/// Header bytes before the length-prefixed strings: magic, format version,
/// composer version, count, dimension, normalized flag, digest.
const FIXED_HEADER_LEN: usize = 4 + 4 + 4 + 8 + 4 + 1 + 32;

/// Year, provider and model.
const HEADER_STRINGS: usize = 3;

/// File-name key for a financial year.
///
/// ASCII letters, digits, `.` and `-` are kept; every other byte,
/// including `_`, becomes `_` followed by two uppercase hex digits. The
/// mapping is injective, so distinct years never share files.
pub fn year_key(year: &str) -> String {
    let mut key = String::with_capacity(year.len());
    for byte in year.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-') {
            key.push(char::from(byte));
        } else {
            key.push_str(&format!("_{byte:02X}"));
        }
    }
    key
}

/// Header of a vector file.
#[derive(Debug, Clone, PartialEq)]
struct VectorHeader {
    composer_version: u32,
    count: u64,
    dimension: u32,
    normalized: bool,
    digest: [u8; 32],
    year: String,
    provider: String,
    model: String,
}

impl VectorHeader {
    fn write(&self, out: &mut Vec<u8>) -> std::result::Result<(), String> {
        out.extend_from_slice(MAGIC_BYTES);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.composer_version.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.dimension.to_le_bytes());
        out.push(u8::from(self.normalized));
        out.extend_from_slice(&self.digest);
        for s in [&self.year, &self.provider, &self.model] {
            let len = u16::try_from(s.len()).map_err(|_| format!("header string too long: {s}"))?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }

    /// Parse a header, returning it with the payload that follows.
    fn parse(bytes: &[u8]) -> std::result::Result<(Self, &[u8]), String> {
        let mut cursor = Cursor { bytes, pos: 0 };

        if cursor.take(4)? != MAGIC_BYTES {
            return Err("not a vector file (bad magic)".to_string());
        }
        let version = cursor.u32()?;
        if version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {version}, expected {FORMAT_VERSION}"
            ));
        }

        let composer_version = cursor.u32()?;
        let count = cursor.u64()?;
        let dimension = cursor.u32()?;
        let normalized = cursor.take(1)?[0] != 0;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(cursor.take(32)?);
        let year = cursor.string()?;
        let provider = cursor.string()?;
        let model = cursor.string()?;

        let header = Self {
            composer_version,
            count,
            dimension,
            normalized,
            digest,
            year,
            provider,
            model,
        };
        Ok((header, &bytes[cursor.pos..]))
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> std::result::Result<&'a [u8], String> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| "truncated header".to_string())?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> std::result::Result<u32, String> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self) -> std::result::Result<u64, String> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn string(&mut self) -> std::result::Result<String, String> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2)?);
        let len = usize::from(u16::from_le_bytes(buf));
        String::from_utf8(self.take(len)?.to_vec()).map_err(|e| format!("invalid UTF-8: {e}"))
    }
}

/// Storage backend for partitions.
#[derive(Debug, Clone)]
pub struct PartitionStore {
    /// Directory holding every saved partition.
    root: PathBuf,
}

impl PartitionStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record table for `year`.
    pub fn records_path(&self, year: &str) -> PathBuf {
        self.root
            .join(format!("tenders_{}.csv", year_key(year)))
    }

    /// Path of the vector file for `year`.
    pub fn vectors_path(&self, year: &str) -> PathBuf {
        self.root
            .join(format!("embeddings_{}.vec", year_key(year)))
    }

    /// Whether both artifacts for `year` are present.
    pub async fn exists(&self, year: &str) -> bool {
        fs::try_exists(self.records_path(year)).await.unwrap_or(false)
            && fs::try_exists(self.vectors_path(year)).await.unwrap_or(false)
    }

    /// Save a partition, replacing any previous save for the same year.
    pub async fn save(&self, partition: &Partition) -> Result<()> {
        let year = partition.year();
        let csv_bytes = encode_records(partition.records())?;

        let meta = partition.meta();
        let header = VectorHeader {
            composer_version: meta.composer_version,
            count: partition.len() as u64,
            dimension: u32::try_from(partition.dimension())
                .map_err(|_| SearchError::Config("vector dimension exceeds u32".to_string()))?,
            normalized: meta.normalized,
            digest: Sha256::digest(&csv_bytes).into(),
            year: year.to_string(),
            provider: meta.provider.clone(),
            model: meta.model.clone(),
        };

        let mut vec_bytes =
            Vec::with_capacity(128 + partition.len() * partition.dimension() * BYTES_PER_F32);
        header
            .write(&mut vec_bytes)
            .map_err(SearchError::Config)?;
        for vector in partition.vectors() {
            for x in vector {
                vec_bytes.extend_from_slice(&x.to_le_bytes());
            }
        }

        let records_path = self.records_path(year);
        let vectors_path = self.vectors_path(year);
        let records_tmp = records_path.with_extension("csv.tmp");
        let vectors_tmp = vectors_path.with_extension("vec.tmp");

        let written = async {
            write_synced(&records_tmp, &csv_bytes).await?;
            write_synced(&vectors_tmp, &vec_bytes).await?;
            fs::rename(&records_tmp, &records_path).await?;
            fs::rename(&vectors_tmp, &vectors_path).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = written {
            for tmp in [&records_tmp, &vectors_tmp] {
                match fs::remove_file(tmp).await {
                    Ok(()) => {}
                    Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
                    Err(cleanup) => warn!("Could not remove {}: {cleanup}", tmp.display()),
                }
            }
            return Err(e.into());
        }

        info!(
            "Saved partition {year}: {} records, dimension {} ({})",
            partition.len(),
            partition.dimension(),
            vectors_path.display()
        );
        Ok(())
    }

    /// Load the saved partition for `year`.
    ///
    /// Fails with `NotFound` when either artifact is missing,
    /// `StalePartition` when the vectors came from another text composer
    /// version, and `CorruptPartition` when the artifacts disagree.
    pub async fn load(&self, year: &str) -> Result<Partition> {
        let csv_bytes = read_or_not_found(&self.records_path(year), year).await?;
        let vec_bytes = read_or_not_found(&self.vectors_path(year), year).await?;

        let corrupt = |reason: String| SearchError::CorruptPartition {
            year: year.to_string(),
            reason,
        };

        let (header, payload) = VectorHeader::parse(&vec_bytes).map_err(corrupt)?;

        if header.composer_version != COMPOSER_VERSION {
            return Err(SearchError::StalePartition {
                year: year.to_string(),
                stored: header.composer_version,
                current: COMPOSER_VERSION,
            });
        }

        if header.year != year {
            return Err(corrupt(format!(
                "vector file belongs to financial year {}",
                header.year
            )));
        }

        let digest: [u8; 32] = Sha256::digest(&csv_bytes).into();
        if digest != header.digest {
            return Err(corrupt(
                "record table does not match the vector file".to_string(),
            ));
        }

        let records = decode_records(&csv_bytes).map_err(|e| corrupt(format!("record table: {e}")))?;
        if records.len() as u64 != header.count {
            return Err(corrupt(format!(
                "record table has {} rows, vector file expects {}",
                records.len(),
                header.count
            )));
        }

        let dimension = header.dimension as usize;
        let expected_len = records
            .len()
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(BYTES_PER_F32));
        if dimension == 0 || expected_len != Some(payload.len()) {
            let expected_len =
                expected_len.map_or_else(|| "an overflowing size".to_string(), |len| len.to_string());
            return Err(corrupt(format!(
                "vector payload is {} bytes, expected {expected_len} for {} x {dimension}",
                payload.len(),
                records.len()
            )));
        }

        let vectors = payload
            .chunks_exact(dimension * BYTES_PER_F32)
            .map(|row| {
                row.chunks_exact(BYTES_PER_F32)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect()
            })
            .collect();

        let meta = PartitionMeta {
            provider: header.provider,
            model: header.model,
            normalized: header.normalized,
            composer_version: header.composer_version,
        };

        let partition = Partition::new(year, records, vectors, meta)?;
        debug!(
            "Loaded partition {year}: {} records, dimension {}",
            partition.len(),
            partition.dimension()
        );
        Ok(partition)
    }

    /// Delete both artifacts for `year`. Missing files are ignored.
    pub async fn remove(&self, year: &str) -> Result<()> {
        for path in [self.records_path(year), self.vectors_path(year)] {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Financial years with a saved vector file, sorted.
    pub async fn list_years(&self) -> Result<Vec<String>> {
        let mut years = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_vector_file = path
                .file_name()
                .and_then(std::ffi::OsStr::to_str)
                .is_some_and(|n| n.starts_with("embeddings_") && n.ends_with(".vec"));
            if !is_vector_file {
                continue;
            }

            let bytes = match read_header_bytes(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    warn!("Skipping truncated vector file {}", path.display());
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match VectorHeader::parse(&bytes) {
                Ok((header, _)) => years.push(header.year),
                Err(e) => warn!("Skipping unreadable vector file {}: {e}", path.display()),
            }
        }

        years.sort();
        Ok(years)
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Read just the header of a vector file, leaving the payload on disk.
async fn read_header_bytes(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path).await?;
    let mut bytes = vec![0u8; FIXED_HEADER_LEN];
    file.read_exact(&mut bytes).await?;

    for _ in 0..HEADER_STRINGS {
        let mut len = [0u8; 2];
        file.read_exact(&mut len).await?;
        bytes.extend_from_slice(&len);
        let start = bytes.len();
        bytes.resize(start + usize::from(u16::from_le_bytes(len)), 0);
        file.read_exact(&mut bytes[start..]).await?;
    }
    Ok(bytes)
}

async fn read_or_not_found(path: &Path, year: &str) -> Result<Vec<u8>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(SearchError::NotFound {
            year: year.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn encode_records(records: &[TenderRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| SearchError::Io(e.into_error()))
}

fn decode_records(bytes: &[u8]) -> std::result::Result<Vec<TenderRecord>, csv::Error> {
    csv::Reader::from_reader(bytes).deserialize().collect()
}
