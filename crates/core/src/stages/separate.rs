//! Separation stage: isolate a target stem with demucs.
//!
//! Best-effort. Every failure here is reported as a [`SeparateError`] and the
//! pipeline falls back to the basic chain.
//!
//! The separation toolchain cannot open every file name the acquisition
//! stage produces. When the working file's name is not plain ASCII, an alias
//! with a generated name is linked into the job's scratch directory and
//! passed instead; it is removed right after the invocation whatever the
//! outcome. This only patches the input boundary of this one stage.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::identity::is_encoding_safe;
use crate::janitor::CleanupGuard;

use super::config::SeparateConfig;
use super::error::SeparateError;
use super::invocation::{ProcessRunner, TokioProcessRunner, ToolInvocation};
use super::types::SeparatedTracks;

/// Splits a recording into a target stem and the residual.
#[async_trait]
pub trait Separator: Send + Sync {
    /// Returns the name of this separator implementation.
    fn name(&self) -> &str;

    /// Cheap health check. An error means the stage must not be attempted.
    async fn probe(&self) -> Result<(), SeparateError>;

    /// Separates `input` into `output_dir`. `scratch_dir` is where an alias
    /// may be placed.
    async fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        scratch_dir: &Path,
    ) -> Result<SeparatedTracks, SeparateError>;
}

/// demucs based separator.
pub struct DemucsSeparator {
    config: SeparateConfig,
    runner: Arc<dyn ProcessRunner>,
}

impl DemucsSeparator {
    /// Creates a separator that spawns real processes.
    pub fn new(config: SeparateConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioProcessRunner))
    }

    /// Creates a separator with a custom process runner.
    pub fn with_runner(config: SeparateConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { config, runner }
    }

    fn base_invocation(&self) -> ToolInvocation {
        ToolInvocation::new(&self.config.program).args(&self.config.prefix_args)
    }

    fn build_invocation(&self, input: &Path, output_dir: &Path) -> ToolInvocation {
        self.base_invocation()
            .arg("--two-stems")
            .arg(&self.config.stem)
            .arg("-n")
            .arg(&self.config.model)
            .arg("-o")
            .arg(output_dir)
            .arg(input)
    }

    /// Where demucs writes its stems for `input`.
    fn expected_tracks(&self, input: &Path, output_dir: &Path) -> SeparatedTracks {
        let base = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let track_dir = output_dir.join(&self.config.model).join(base);
        SeparatedTracks {
            target: track_dir.join(format!("{}.wav", self.config.stem)),
            residual: Some(track_dir.join(format!("no_{}.wav", self.config.stem))),
        }
    }

    /// Returns the path to hand to demucs, creating an alias if needed.
    async fn invocation_input(
        &self,
        input: &Path,
        scratch_dir: &Path,
        alias_guard: &mut CleanupGuard,
    ) -> Result<PathBuf, SeparateError> {
        let safe = input
            .file_name()
            .and_then(|n| n.to_str())
            .map(is_encoding_safe)
            .unwrap_or(false);
        if safe {
            return Ok(input.to_path_buf());
        }

        tokio::fs::create_dir_all(scratch_dir).await?;
        let extension = input
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| is_encoding_safe(e))
            .unwrap_or("wav");
        let alias = scratch_dir.join(format!(
            "alias-{}.{}",
            uuid::Uuid::new_v4().simple(),
            extension
        ));

        alias_guard.track(&alias);
        if let Err(e) = tokio::fs::hard_link(input, &alias).await {
            debug!("Hard link for alias failed ({}), copying instead", e);
            tokio::fs::copy(input, &alias).await?;
        }
        debug!("Aliased {} as {}", input.display(), alias.display());
        Ok(alias)
    }

    async fn run_separation(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> Result<SeparatedTracks, SeparateError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let invocation = self.build_invocation(input, output_dir);
        let output = self
            .runner
            .run(&invocation, Duration::from_secs(self.config.timeout_secs))
            .await?;

        if !output.success {
            return Err(SeparateError::Failed {
                reason: format!("{} exited with code {:?}", self.name(), output.exit_code),
                stderr: output.stderr_opt(),
            });
        }

        let tracks = self.expected_tracks(input, output_dir);
        if !tokio::fs::try_exists(&tracks.target).await? {
            return Err(SeparateError::MissingOutput {
                path: tracks.target,
            });
        }
        Ok(tracks)
    }
}

#[async_trait]
impl Separator for DemucsSeparator {
    fn name(&self) -> &str {
        "demucs"
    }

    async fn probe(&self) -> Result<(), SeparateError> {
        if !self.config.enabled {
            return Err(SeparateError::Unavailable {
                reason: "separation disabled in configuration".to_string(),
            });
        }

        let invocation = self.base_invocation().arg("--help");
        let output = self
            .runner
            .run(
                &invocation,
                Duration::from_secs(self.config.probe_timeout_secs),
            )
            .await
            .map_err(|e| SeparateError::Unavailable {
                reason: e.to_string(),
            })?;

        if output.success {
            Ok(())
        } else {
            Err(SeparateError::Unavailable {
                reason: format!("health check exited with code {:?}", output.exit_code),
            })
        }
    }

    async fn separate(
        &self,
        input: &Path,
        output_dir: &Path,
        scratch_dir: &Path,
    ) -> Result<SeparatedTracks, SeparateError> {
        let mut alias_guard = CleanupGuard::new("separate-alias");
        let result = match self
            .invocation_input(input, scratch_dir, &mut alias_guard)
            .await
        {
            Ok(path) => self.run_separation(&path, output_dir).await,
            Err(e) => Err(e),
        };
        // The alias never outlives the invocation.
        alias_guard.sweep().await;

        if let Err(ref e) = result {
            warn!("Separation of {} failed: {}", input.display(), e);
        }
        result
    }
}
