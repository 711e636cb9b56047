//! Bulk loading of precomputed reference vectors from a directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};
use crate::faces::codec::{self, CodecError};
use crate::faces::extractor::l2_normalize;
use crate::faces::store::{KeyValueService, ReferenceStore};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";
const REFERENCE_EXTENSIONS: &[&str] = &["npy", "bin"];

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub dir: PathBuf,
    pub ttl: Duration,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BootstrapReport {
    pub dir: String,
    pub loaded: Vec<String>,
    pub skipped: Vec<String>,
}

pub fn bootstrap_references<K: KeyValueService>(
    config: &BootstrapConfig,
    store: &ReferenceStore<K>,
) -> AppResult<BootstrapReport> {
    let mut report = BootstrapReport {
        dir: config.dir.display().to_string(),
        ..BootstrapReport::default()
    };

    for (guard_id, path) in reference_files(&config.dir)? {
        let bytes = fs::read(&path).map_err(|source| AppError::BootstrapRead {
            path: path.clone(),
            source,
        })?;
        let mut vector = decode_reference_file(&bytes, store.embedding_dim()).map_err(|source| {
            AppError::CorruptData {
                key: path.display().to_string(),
                source,
            }
        })?;
        l2_normalize(&mut vector)?;

        if config.overwrite {
            store.put(&guard_id, &vector, config.ttl)?;
        } else if !store.put_if_absent(&guard_id, &vector, config.ttl)? {
            debug!(%guard_id, "reference already present; skipping");
            report.skipped.push(guard_id);
            continue;
        }
        report.loaded.push(guard_id);
    }

    info!(
        dir = %config.dir.display(),
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "reference bootstrap finished"
    );
    Ok(report)
}

/// Regular, non-hidden `.npy`, `.bin` or extensionless files in `dir`, keyed by
/// file stem and sorted by key. Anything else is skipped.
fn reference_files(dir: &Path) -> AppResult<Vec<(String, PathBuf)>> {
    let read_err = |source| AppError::BootstrapRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !entry.file_type().map_err(read_err)?.is_file() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if stem.is_empty() || stem.starts_with('.') {
            continue;
        }
        if !has_reference_extension(&path) {
            debug!(path = %path.display(), "not a reference file; skipping");
            continue;
        }
        files.push((stem.to_string(), path));
    }
    files.sort();
    Ok(files)
}

fn has_reference_extension(path: &Path) -> bool {
    match path.extension() {
        None => true,
        Some(ext) => ext
            .to_str()
            .is_some_and(|ext| REFERENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())),
    }
}

/// Accepts a raw little-endian `f32` array or a NumPy `.npy` file holding one.
pub fn decode_reference_file(bytes: &[u8], expected_dim: usize) -> Result<Vec<f32>, CodecError> {
    codec::decode(npy_payload(bytes), expected_dim)
}

fn npy_payload(bytes: &[u8]) -> &[u8] {
    if !bytes.starts_with(NPY_MAGIC) || bytes.len() < 10 {
        return bytes;
    }
    // Version 1 stores a u16 header length, versions 2 and 3 a u32.
    let (header_len, preamble) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        _ if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        _ => return bytes,
    };
    let data_start = preamble + header_len;
    if data_start > bytes.len() || !npy_header_is_f32_le(&bytes[preamble..data_start]) {
        return bytes;
    }
    &bytes[data_start..]
}

fn npy_header_is_f32_le(header: &[u8]) -> bool {
    let header = String::from_utf8_lossy(header);
    header.contains("'descr': '<f4'") && header.contains("'fortran_order': False")
}
