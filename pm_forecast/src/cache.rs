//! On-disk store of fitted models, one artifact per city and algorithm
//!
//! Artifacts are `PMFC` followed by a bincode encoded [`ModelArtifact`].
//! Anything unreadable is treated as absent so the caller retrains.

use crate::error::{ForecastError, Result};
use crate::models::{Algorithm, FittedModel};
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// File magic of every artifact
pub const ARTIFACT_MAGIC: &[u8; 4] = b"PMFC";

/// Bumped whenever a fitted model's layout changes
pub const ARTIFACT_VERSION: u32 = 2;

/// Extension of artifact files
pub const ARTIFACT_EXTENSION: &str = "model";

/// A fitted model with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub city: String,
    pub algorithm: Algorithm,
    /// Training window the model was fitted on
    pub train_days: u32,
    pub fitted_at: DateTime<Utc>,
    pub model: FittedModel,
}

impl ModelArtifact {
    pub fn new(city: &str, train_days: u32, model: FittedModel) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            city: city.to_string(),
            algorithm: model.algorithm(),
            train_days,
            fitted_at: Utc::now(),
            model,
        }
    }
}

/// Which stored artifacts are still acceptable for reuse.
///
/// The default accepts any artifact of the right algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    /// Reject artifacts fitted on a different training window
    pub match_train_days: bool,
    /// Reject artifacts older than this many hours
    pub max_age_hours: Option<u64>,
}

impl CachePolicy {
    /// Reason the artifact must not be reused, if any
    pub fn rejection(&self, artifact: &ModelArtifact, train_days: u32) -> Option<String> {
        if self.match_train_days && artifact.train_days != train_days {
            return Some(format!(
                "trained on {} days, requested {}",
                artifact.train_days, train_days
            ));
        }
        if let Some(hours) = self.max_age_hours {
            let age = Utc::now() - artifact.fitted_at;
            if age > Duration::hours(hours as i64) {
                return Some(format!("fitted {} hours ago", age.num_hours()));
            }
        }
        None
    }
}

/// Model store rooted at one directory.
///
/// Writers for the same key are serialized; readers never lock and only see
/// fully written files because every write lands through a rename.
#[derive(Debug)]
pub struct ModelCache {
    root: PathBuf,
    policy: CachePolicy,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    write_seq: AtomicU64,
}

impl ModelCache {
    /// Open a cache, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            policy: CachePolicy::default(),
            locks: Mutex::new(HashMap::new()),
            write_seq: AtomicU64::new(0),
        })
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Cache key for a city: lowercase, whitespace runs become `_`. Letters
    /// and digits of any script are kept; separators, control characters and
    /// other punctuation except `_` and `-` become `_`
    pub fn normalize_city(city: &str) -> String {
        let mut key = String::with_capacity(city.len());
        let mut in_space = false;
        for ch in city.trim().to_lowercase().chars() {
            if ch.is_whitespace() {
                if !in_space {
                    key.push('_');
                }
                in_space = true;
                continue;
            }
            in_space = false;
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                key.push(ch);
            } else {
                key.push('_');
            }
        }
        key
    }

    pub fn path_for(&self, city: &str, algorithm: Algorithm) -> PathBuf {
        self.root.join(format!(
            "{}_{}.{}",
            Self::normalize_city(city),
            algorithm.tag(),
            ARTIFACT_EXTENSION
        ))
    }

    /// Load the artifact for `(city, algorithm)`.
    ///
    /// A missing file is a silent miss; an unreadable one is a miss with a
    /// warning.
    pub fn get(&self, city: &str, algorithm: Algorithm) -> Option<ModelArtifact> {
        let path = self.path_for(city, algorithm);
        match read_artifact(&path, city, algorithm) {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                let not_found = err
                    .downcast_ref::<std::io::Error>()
                    .map(|io| io.kind() == ErrorKind::NotFound)
                    .unwrap_or(false);
                if !not_found {
                    log::warn!(
                        "ignoring cached model city={} algorithm={} path={}: {:#}",
                        city,
                        algorithm,
                        path.display(),
                        err
                    );
                }
                None
            }
        }
    }

    /// [`ModelCache::get`] filtered through the cache policy
    pub fn lookup(
        &self,
        city: &str,
        algorithm: Algorithm,
        train_days: u32,
    ) -> Option<ModelArtifact> {
        let artifact = self.get(city, algorithm)?;
        match self.policy.rejection(&artifact, train_days) {
            Some(reason) => {
                log::info!(
                    "cached model is stale city={} algorithm={}: {}",
                    city,
                    algorithm,
                    reason
                );
                None
            }
            None => Some(artifact),
        }
    }

    /// Store an artifact, replacing any previous one for the key
    pub fn put(&self, city: &str, algorithm: Algorithm, artifact: &ModelArtifact) -> Result<()> {
        if artifact.algorithm != algorithm {
            return Err(ForecastError::Cache(format!(
                "artifact holds a {} model, not {}",
                artifact.algorithm, algorithm
            )));
        }

        let path = self.path_for(city, algorithm);
        let key_lock = self.key_lock(&path);
        let _guard = key_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!(
            "{}.tmp-{}-{}",
            ARTIFACT_EXTENSION,
            std::process::id(),
            seq
        ));

        let written = write_artifact(&tmp, artifact).and_then(|_| {
            fs::rename(&tmp, &path)
                .with_context(|| format!("Failed to move {} into place", tmp.display()))
        });
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(ForecastError::Cache(format!("{:#}", err)));
        }

        log::debug!(
            "cached model city={} algorithm={} path={}",
            city,
            algorithm,
            path.display()
        );
        Ok(())
    }

    fn key_lock(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = path.to_string_lossy().into_owned();
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key).or_default().clone()
    }
}

fn read_artifact(path: &Path, city: &str, algorithm: Algorithm) -> anyhow::Result<ModelArtifact> {
    // Decoding from a slice bounds every length prefix by the file size
    let bytes = fs::read(path)?;
    let body = match bytes.strip_prefix(ARTIFACT_MAGIC.as_slice()) {
        Some(body) => body,
        None => bail!("not a model artifact"),
    };

    let artifact: ModelArtifact =
        bincode::deserialize(body).context("Failed to deserialize artifact")?;
    if artifact.version != ARTIFACT_VERSION {
        bail!(
            "artifact version {} does not match {}",
            artifact.version,
            ARTIFACT_VERSION
        );
    }
    if artifact.algorithm != algorithm || artifact.model.algorithm() != algorithm {
        bail!("artifact holds a {} model", artifact.model.algorithm());
    }
    if ModelCache::normalize_city(&artifact.city) != ModelCache::normalize_city(city) {
        bail!("artifact belongs to {}", artifact.city);
    }
    Ok(artifact)
}

fn write_artifact(path: &Path, artifact: &ModelArtifact) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(ARTIFACT_MAGIC)?;
    bincode::serialize_into(&mut writer, artifact)
        .with_context(|| format!("Failed to serialize artifact to: {}", path.display()))?;
    let file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("Failed to flush artifact")?;
    file.sync_all()?;
    Ok(())
}
