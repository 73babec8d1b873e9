//! Zip writer for batch archives.

use chrono::Utc;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::janitor::CleanupGuard;
use crate::metrics;

use super::error::ArchiveError;

/// Writes batch archives under a storage root.
#[derive(Debug, Clone)]
pub struct ArchiveAggregator {
    storage_root: PathBuf,
    archive_dir: String,
}

impl ArchiveAggregator {
    pub fn new(storage_root: impl Into<PathBuf>, archive_dir: impl Into<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            archive_dir: archive_dir.into(),
        }
    }

    /// Directory archives are written to.
    pub fn archive_root(&self) -> PathBuf {
        self.storage_root.join(&self.archive_dir)
    }

    /// Writes every path into a new archive and returns the archive's path
    /// relative to the storage root.
    ///
    /// The archive is assembled as a `.part` file and only renamed into
    /// place once complete and synced, so a reader never sees a truncated
    /// archive under its final name.
    pub async fn bundle(&self, paths: &[PathBuf]) -> Result<PathBuf, ArchiveError> {
        if paths.is_empty() {
            return Err(ArchiveError::NoEntries);
        }

        let archive_root = self.archive_root();
        tokio::fs::create_dir_all(&archive_root).await?;

        let name = format!(
            "batch-{}-{}.zip",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        let final_path = archive_root.join(&name);
        let part_path = archive_root.join(format!("{}.part", name));

        let mut guard = CleanupGuard::new("archive");
        guard.track(&part_path);

        let entries = entry_names(paths);
        let entry_count = entries.len();
        let writer_path = part_path.clone();
        tokio::task::spawn_blocking(move || write_zip(&writer_path, &entries))
            .await
            .map_err(|e| ArchiveError::Writer(e.to_string()))??;

        tokio::fs::rename(&part_path, &final_path).await?;
        guard.disarm(&part_path);

        metrics::ARCHIVE_ENTRIES
            .with_label_values(&[])
            .observe(entry_count as f64);
        info!(
            "Wrote archive {} with {} entries",
            final_path.display(),
            entry_count
        );

        Ok(final_path
            .strip_prefix(&self.storage_root)
            .map(Path::to_path_buf)
            .unwrap_or(final_path))
    }
}

/// Pairs each path with its entry name: the file name, with ` (n)` added
/// before the extension when an earlier entry already took it.
pub fn entry_names(paths: &[PathBuf]) -> Vec<(PathBuf, String)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut entries = Vec::with_capacity(paths.len());

    for path in paths {
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        let mut name = base.clone();
        let mut n = 1;
        while used.contains(&name) {
            n += 1;
            name = suffixed(&base, n);
        }
        if n > 1 {
            warn!(
                "Archive entry name {} repeated; storing {} as {}",
                base,
                path.display(),
                name
            );
        }
        used.insert(name.clone());
        entries.push((path.clone(), name));
    }

    entries
}

fn suffixed(base: &str, n: usize) -> String {
    let candidate = Path::new(base);
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match candidate.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    }
}

fn write_zip(output: &Path, entries: &[(PathBuf, String)]) -> Result<(), ArchiveError> {
    let file = File::create(output)?;
    let mut zip = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (path, name) in entries {
        let mut input = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::MissingInput { path: path.clone() },
            _ => ArchiveError::Io(e),
        })?;
        debug!("Adding to archive: {} as {}", path.display(), name);
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut input, &mut zip)?;
    }

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (entry.name().to_string(), body)
            })
            .collect()
    }

    #[test]
    fn test_entry_names_flatten_and_suffix() {
        let paths = vec![
            PathBuf::from("/s/a/Song.mp3"),
            PathBuf::from("/s/b/Song.mp3"),
            PathBuf::from("/s/b/Other.mp3"),
            PathBuf::from("/s/c/Song.mp3"),
            PathBuf::from("/s/d/Song (2).mp3"),
        ];
        let names: Vec<String> = entry_names(&paths).into_iter().map(|(_, n)| n).collect();
        assert_eq!(
            names,
            vec![
                "Song.mp3",
                "Song (2).mp3",
                "Other.mp3",
                "Song (3).mp3",
                "Song (2) (2).mp3"
            ]
        );
    }

    #[tokio::test]
    async fn test_bundle_writes_relative_archive() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("g")).unwrap();
        let a = root.join("g").join("a.mp3");
        let b = root.join("g").join("b.mp3");
        std::fs::write(&a, b"aaa").unwrap();
        std::fs::write(&b, b"bbbb").unwrap();

        let aggregator = ArchiveAggregator::new(root, "archives");
        let relative = aggregator.bundle(&[a, b]).await.unwrap();

        assert!(relative.is_relative());
        assert!(relative.starts_with("archives"));
        let name = relative.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("batch-") && name.ends_with(".zip"));

        let entries = read_entries(&root.join(&relative));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("a.mp3".to_string(), b"aaa".to_vec()));
        assert_eq!(entries[1].0, "b.mp3");

        let leftovers: Vec<_> = std::fs::read_dir(aggregator.archive_root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_bundle_rejects_empty() {
        let temp = TempDir::new().unwrap();
        let aggregator = ArchiveAggregator::new(temp.path(), "archives");
        assert!(matches!(
            aggregator.bundle(&[]).await,
            Err(ArchiveError::NoEntries)
        ));
    }

    #[tokio::test]
    async fn test_missing_input_leaves_no_part_file() {
        let temp = TempDir::new().unwrap();
        let aggregator = ArchiveAggregator::new(temp.path(), "archives");
        let result = aggregator.bundle(&[temp.path().join("gone.mp3")]).await;
        assert!(matches!(result, Err(ArchiveError::MissingInput { .. })));

        let remaining: Vec<_> = std::fs::read_dir(aggregator.archive_root()).unwrap().collect();
        assert!(remaining.is_empty());
    }
}
