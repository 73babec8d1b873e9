//! Canonical/working path resolution and the identity claim table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::job::{derive_job_id, ExtractWindow, JobSpec};

use super::error::IdentityError;
use super::normalize::legalize_filename;

/// Marker appended to a working name that would otherwise collide.
const WORKING_MARKER: &str = "working";

/// How many disambiguated working names are tried before giving up.
const MAX_WORKING_CANDIDATES: usize = 64;

/// Why a job was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The canonical artifact is already on disk.
    AlreadyExists,
    /// Another job currently holds the claim on this identity.
    InFlight,
}

/// Keyed in-process claim table.
///
/// Holds canonical and working paths of every job between resolution and
/// completion. Insert-if-absent under one lock is the atomic claim.
#[derive(Debug, Clone, Default)]
pub struct ClaimTable {
    inner: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims `key`, or returns `None` if it is already held.
    pub fn try_claim(&self, key: PathBuf) -> Option<IdentityClaim> {
        let mut held = self.lock();
        if !held.insert(key.clone()) {
            return None;
        }
        Some(IdentityClaim {
            keys: vec![key],
            table: self.clone(),
        })
    }

    /// Adds `key` to an existing claim, or returns false if it is held.
    fn extend_claim(&self, claim: &mut IdentityClaim, key: PathBuf) -> bool {
        let mut held = self.lock();
        if !held.insert(key.clone()) {
            return false;
        }
        claim.keys.push(key);
        true
    }

    pub fn is_claimed(&self, key: &Path) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// A held claim. Released when dropped.
#[derive(Debug)]
pub struct IdentityClaim {
    keys: Vec<PathBuf>,
    table: ClaimTable,
}

impl Drop for IdentityClaim {
    fn drop(&mut self) {
        let mut held = self.table.lock();
        for key in &self.keys {
            held.remove(key);
        }
    }
}

/// Everything the pipeline needs to run a claimed job.
#[derive(Debug)]
pub struct ResolvedJob {
    pub job_id: String,
    pub normalized_name: String,
    pub group_dir: PathBuf,
    pub canonical_path: PathBuf,
    pub working_path: PathBuf,
    pub temp_output_path: PathBuf,
    pub scratch_dir: PathBuf,
    pub window: ExtractWindow,
    claim: IdentityClaim,
}

impl ResolvedJob {
    /// Releases the identity claim explicitly.
    pub fn release(self) {
        drop(self.claim);
    }
}

/// Outcome of resolving a job.
#[derive(Debug)]
pub enum Resolution {
    /// Nothing to do for this job.
    Skip {
        job_id: String,
        canonical_path: PathBuf,
        reason: SkipReason,
    },
    /// The identity is claimed and the job may run.
    Proceed(ResolvedJob),
}

/// Resolves jobs against a storage root.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    storage_root: PathBuf,
    scratch_root: PathBuf,
    output_extension: String,
    working_extension: String,
    max_duration_secs: u64,
    claims: ClaimTable,
}

impl IdentityResolver {
    /// Creates a resolver.
    ///
    /// `output_extension` is the canonical artifact's extension and
    /// `working_extension` the acquisition tool's output extension.
    pub fn new(
        storage_root: impl Into<PathBuf>,
        scratch_root: impl Into<PathBuf>,
        output_extension: impl Into<String>,
        working_extension: impl Into<String>,
        max_duration_secs: u64,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            scratch_root: scratch_root.into(),
            output_extension: output_extension.into(),
            working_extension: working_extension.into(),
            max_duration_secs,
            claims: ClaimTable::new(),
        }
    }

    /// Shares an existing claim table (several resolvers over one storage root).
    pub fn with_claims(mut self, claims: ClaimTable) -> Self {
        self.claims = claims;
        self
    }

    pub fn claims(&self) -> &ClaimTable {
        &self.claims
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// The group directory for a raw container group.
    pub fn group_dir(&self, container_group: &str) -> PathBuf {
        self.storage_root.join(legalize_filename(container_group))
    }

    /// The canonical path for a raw name and group. Pure; touches no disk.
    pub fn canonical_path(&self, desired_name: &str, container_group: &str) -> PathBuf {
        self.group_dir(container_group).join(format!(
            "{}.{}",
            legalize_filename(desired_name),
            self.output_extension
        ))
    }

    /// The stable job id for a job description.
    pub fn job_id(&self, job: &JobSpec) -> String {
        derive_job_id(
            &legalize_filename(&job.container_group),
            &legalize_filename(&job.desired_output_identity),
        )
    }

    /// Resolves a job: skip if its artifact exists or is being produced,
    /// otherwise claim the identity and compute its paths.
    pub async fn resolve(&self, job: &JobSpec) -> Result<Resolution, IdentityError> {
        if job.source_ref.trim().is_empty() {
            return Err(IdentityError::EmptySourceRef);
        }

        let normalized_name = legalize_filename(&job.desired_output_identity);
        let group_dir = self.group_dir(&job.container_group);
        let canonical_path = self.canonical_path(&job.desired_output_identity, &job.container_group);
        let job_id = self.job_id(job);

        if tokio::fs::try_exists(&canonical_path).await? {
            return Ok(Resolution::Skip {
                job_id,
                canonical_path,
                reason: SkipReason::AlreadyExists,
            });
        }

        let Some(mut claim) = self.claims.try_claim(canonical_path.clone()) else {
            return Ok(Resolution::Skip {
                job_id,
                canonical_path,
                reason: SkipReason::InFlight,
            });
        };

        // A job holding the claim may have finalized between the check above
        // and our claim.
        if tokio::fs::try_exists(&canonical_path).await? {
            return Ok(Resolution::Skip {
                job_id,
                canonical_path,
                reason: SkipReason::AlreadyExists,
            });
        }

        let working_path = self
            .claim_working_path(job, &group_dir, &canonical_path, &mut claim)
            .await?;

        let temp_output_path = group_dir.join(format!(
            ".{}.{}.part.{}",
            normalized_name, job_id, self.output_extension
        ));
        let scratch_dir = self.scratch_root.join(&job_id);
        let window = ExtractWindow::resolve(job.trim_window.as_ref(), self.max_duration_secs);

        debug!(
            "Resolved job {}: canonical={}, working={}",
            job_id,
            canonical_path.display(),
            working_path.display()
        );

        Ok(Resolution::Proceed(ResolvedJob {
            job_id,
            normalized_name,
            group_dir,
            canonical_path,
            working_path,
            temp_output_path,
            scratch_dir,
            window,
            claim,
        }))
    }

    /// Picks a working path distinct from the canonical path, from any file
    /// already on disk and from every other in-flight job's paths.
    ///
    /// An unclaimed file at the unmarked working path is a download left by
    /// an interrupted run and is removed so the path is reused. This only
    /// happens when working and output extensions differ; otherwise that file
    /// could be another identity's canonical artifact.
    async fn claim_working_path(
        &self,
        job: &JobSpec,
        group_dir: &Path,
        canonical_path: &Path,
        claim: &mut IdentityClaim,
    ) -> Result<PathBuf, IdentityError> {
        let stem = legalize_filename(&job.working_identity);

        for attempt in 0..MAX_WORKING_CANDIDATES {
            let name = match attempt {
                0 => format!("{}.{}", stem, self.working_extension),
                1 => format!("{}.{}.{}", stem, WORKING_MARKER, self.working_extension),
                n => format!("{}.{}-{}.{}", stem, WORKING_MARKER, n, self.working_extension),
            };
            let candidate = group_dir.join(name);

            if candidate == canonical_path {
                continue;
            }
            if tokio::fs::try_exists(&candidate).await? {
                if attempt == 0 && self.reclaim_stale_working(claim, &candidate).await {
                    return Ok(candidate);
                }
                continue;
            }
            if self.claims.extend_claim(claim, candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(IdentityError::WorkingPathExhausted {
            group: job.container_group.clone(),
            name: job.working_identity.clone(),
        })
    }

    async fn reclaim_stale_working(&self, claim: &mut IdentityClaim, path: &Path) -> bool {
        if self.working_extension == self.output_extension {
            return false;
        }
        if !self.claims.extend_claim(claim, path.to_path_buf()) {
            return false;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                warn!("Removed stale working file {}", path.display());
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(
                    "Could not remove stale working file {}: {}",
                    path.display(),
                    e
                );
                false
            }
        }
    }
}
