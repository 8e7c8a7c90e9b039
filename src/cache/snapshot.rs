//! Cache Snapshot Module
//!
//! Keeps every cache generation as one JSON file under a directory so that
//! generations outlive the process. Bodies are base64 encoded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheGeneration, RequestKey};
use crate::error::{Result, WorkerError};
use crate::models::ResponseRecord;

const SNAPSHOT_EXTENSION: &str = "json";

/// On-disk form of one generation.
#[derive(Debug, Serialize, Deserialize)]
struct GenerationSnapshot {
    name: String,
    created_at: u64,
    entries: Vec<EntrySnapshot>,
}

/// On-disk form of one cached response.
#[derive(Debug, Serialize, Deserialize)]
struct EntrySnapshot {
    url: String,
    status: u16,
    /// Header pairs in order; repeated names are kept
    headers: Vec<(String, String)>,
    body: String,
    stored_at: u64,
}

/// Directory holding one snapshot file per generation.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
}

impl SnapshotDir {
    /// Uses `root`, creating it when missing.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| io_error(format!("creating cache dir {}", root.display()), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // == Load ==
    /// Reads every snapshot, oldest generation first.
    ///
    /// Unreadable or corrupt files are skipped with a warning.
    pub fn load_all(&self, max_entries: usize) -> Result<Vec<CacheGeneration>> {
        let dir = fs::read_dir(&self.root)
            .map_err(|e| io_error(format!("reading cache dir {}", self.root.display()), e))?;

        let mut generations = Vec::new();
        for item in dir {
            let path = match item {
                Ok(item) => item.path(),
                Err(err) => {
                    warn!("Skipping cache dir entry: {}", err);
                    continue;
                }
            };
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            match read_snapshot(&path, max_entries) {
                Ok(generation) => {
                    debug!("Loaded cache {} from {}", generation.name(), path.display());
                    generations.push(generation);
                }
                Err(err) => warn!("Skipping cache snapshot {}: {}", path.display(), err),
            }
        }

        generations.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(generations)
    }

    // == Save ==
    /// Writes the whole generation, replacing its previous snapshot.
    pub fn save(&self, generation: &CacheGeneration) -> Result<()> {
        let snapshot = GenerationSnapshot {
            name: generation.name().to_string(),
            created_at: generation.created_at(),
            entries: generation
                .entries()
                .map(|(key, entry)| encode_entry(key, entry))
                .collect(),
        };
        let content = serde_json::to_vec(&snapshot)
            .map_err(|e| WorkerError::Storage(format!("encoding cache '{}': {}", snapshot.name, e)))?;

        // Write then rename so a crash never leaves a truncated snapshot
        let path = self.path_for(generation.name());
        let staging = path.with_extension("tmp");
        fs::write(&staging, content)
            .map_err(|e| io_error(format!("writing {}", staging.display()), e))?;
        fs::rename(&staging, &path)
            .map_err(|e| io_error(format!("replacing {}", path.display()), e))?;

        debug!("Saved cache {} to {}", generation.name(), path.display());
        Ok(())
    }

    // == Remove ==
    /// Deletes a generation's snapshot. A missing file is not an error.
    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error(format!("removing {}", path.display()), err)),
        }
    }

    /// Generation names are percent-encoded so they never escape the directory.
    fn path_for(&self, name: &str) -> PathBuf {
        let file: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        self.root.join(format!("{}.{}", file, SNAPSHOT_EXTENSION))
    }
}

fn read_snapshot(path: &Path, max_entries: usize) -> Result<CacheGeneration> {
    let content =
        fs::read(path).map_err(|e| io_error(format!("reading {}", path.display()), e))?;
    let snapshot: GenerationSnapshot = serde_json::from_slice(&content)
        .map_err(|e| WorkerError::Storage(format!("decoding {}: {}", path.display(), e)))?;

    let entries = snapshot
        .entries
        .into_iter()
        .map(decode_entry)
        .collect::<Result<Vec<_>>>()?;

    Ok(CacheGeneration::restore(
        snapshot.name,
        snapshot.created_at,
        max_entries,
        entries,
    ))
}

fn encode_entry(key: &RequestKey, entry: &CacheEntry) -> EntrySnapshot {
    let headers = entry
        .response
        .headers
        .iter()
        .filter_map(|(name, value)| match value.to_str() {
            Ok(text) => Some((name.as_str().to_string(), text.to_string())),
            Err(_) => {
                debug!("Not persisting opaque header {} of {}", name, key.as_str());
                None
            }
        })
        .collect();

    EntrySnapshot {
        url: key.as_str().to_string(),
        status: entry.response.status.as_u16(),
        headers,
        body: STANDARD.encode(&entry.response.body),
        stored_at: entry.stored_at,
    }
}

fn decode_entry(snapshot: EntrySnapshot) -> Result<(RequestKey, CacheEntry)> {
    let url = Url::parse(&snapshot.url)?;
    let status = StatusCode::from_u16(snapshot.status).map_err(|_| {
        WorkerError::Storage(format!("invalid status {} for {}", snapshot.status, snapshot.url))
    })?;

    let mut headers = HeaderMap::new();
    for (name, value) in snapshot.headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            return Err(WorkerError::Storage(format!(
                "invalid header {} for {}",
                name, snapshot.url
            )));
        };
        headers.append(name, value);
    }

    let body = STANDARD
        .decode(snapshot.body.as_bytes())
        .map_err(|e| WorkerError::Storage(format!("invalid body for {}: {}", snapshot.url, e)))?;

    let entry = CacheEntry {
        response: ResponseRecord {
            status,
            headers,
            body: body.into(),
        },
        stored_at: snapshot.stored_at,
    };
    Ok((RequestKey::for_url(&url), entry))
}

fn io_error(context: String, err: std::io::Error) -> WorkerError {
    WorkerError::Storage(format!("{}: {}", context, err))
}
