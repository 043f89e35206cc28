use crate::error::{AppError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// An artifact fully written to a temp file next to its destination,
/// not yet visible under its final name.
#[derive(Debug)]
pub struct StagedArtifact {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedArtifact {
    /// Stage raw bytes for `destination`
    pub fn from_bytes(destination: &Path, bytes: &[u8]) -> Result<Self> {
        let mut temp = Self::temp_for(destination)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    /// Stage a CSV table with a header row derived from `T`
    pub fn csv<T: Serialize>(destination: &Path, rows: &[T]) -> Result<Self> {
        let temp = Self::temp_for(destination)?;
        let mut writer = csv::Writer::from_writer(temp);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        let temp = writer
            .into_inner()
            .map_err(|e| AppError::Csv(format!("failed to finish {}: {}", destination.display(), e)))?;
        temp.as_file().sync_all()?;

        debug!(path = %destination.display(), rows = rows.len(), "Artifact staged");
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
        })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Rename the staged file onto its destination
    pub fn commit(self) -> Result<PathBuf> {
        self.temp.persist(&self.destination)?;
        info!(path = %self.destination.display(), "Artifact written");
        Ok(self.destination)
    }

    fn temp_for(destination: &Path) -> Result<NamedTempFile> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        Ok(NamedTempFile::new_in(dir)?)
    }
}

/// Commit a set of staged artifacts together.
///
/// Destinations that already exist are copied aside first. If any rename
/// fails, artifacts already committed by this call are rolled back: earlier
/// contents are restored and new files are removed.
pub fn commit_all(artifacts: Vec<StagedArtifact>) -> Result<Vec<PathBuf>> {
    let mut committed: Vec<(PathBuf, Option<NamedTempFile>)> =
        Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        let backup = backup_existing(artifact.destination())?;
        match artifact.commit() {
            Ok(path) => committed.push((path, backup)),
            Err(err) => {
                roll_back(committed);
                return Err(err);
            }
        }
    }

    Ok(committed.into_iter().map(|(path, _)| path).collect())
}

fn backup_existing(destination: &Path) -> Result<Option<NamedTempFile>> {
    let is_file = std::fs::metadata(destination)
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Ok(None);
    }
    let backup = StagedArtifact::temp_for(destination)?;
    std::fs::copy(destination, backup.path())?;
    Ok(Some(backup))
}

fn roll_back(committed: Vec<(PathBuf, Option<NamedTempFile>)>) {
    for (path, backup) in committed {
        let restored = match backup {
            Some(previous) => previous.persist(&path).map(|_| ()).map_err(|e| e.error),
            None => std::fs::remove_file(&path),
        };
        match restored {
            Ok(()) => warn!(path = %path.display(), "Rolled back committed artifact"),
            Err(err) => warn!(
                path = %path.display(),
                error = %err,
                "Failed to roll back committed artifact"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OffenderMetrics;

    fn metrics_row() -> OffenderMetrics {
        OffenderMetrics {
            abuser_id: "A1".to_string(),
            incident_count: 3,
            avg_days_between_incidents: 45,
            avg_severity: 7,
            max_severity: 9,
            hospitalization_rate: 67,
            arrest_rate: 67,
        }
    }

    #[test]
    fn test_staged_artifact_invisible_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");

        let staged = StagedArtifact::csv(&path, &[metrics_row()]).unwrap();
        assert!(!path.exists());

        staged.commit().unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "Abuser_ID,incident_count,avg_days_between_incidents,avg_severity,max_severity,hospitalization_rate,arrest_rate\nA1,3,45,7,9,67,67\n"
        );
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        {
            let _staged = StagedArtifact::from_bytes(&path, b"partial").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_all_writes_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.csv");
        let second = dir.path().join("nested").join("b.txt");

        let staged = vec![
            StagedArtifact::csv(&first, &[metrics_row()]).unwrap(),
            StagedArtifact::from_bytes(&second, b"hello").unwrap(),
        ];
        let paths = commit_all(staged).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(first.exists());
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "hello");
    }

    #[test]
    fn test_failed_commit_restores_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let replaced = dir.path().join("a.csv");
        let created = dir.path().join("c.txt");
        let blocked = dir.path().join("b.csv");
        std::fs::write(&replaced, "old").unwrap();

        let staged = vec![
            StagedArtifact::from_bytes(&replaced, b"new").unwrap(),
            StagedArtifact::from_bytes(&created, b"fresh").unwrap(),
            StagedArtifact::from_bytes(&blocked, b"never").unwrap(),
        ];
        // A directory at the last destination makes its rename fail
        std::fs::create_dir(&blocked).unwrap();

        assert!(commit_all(staged).is_err());
        assert_eq!(std::fs::read_to_string(&replaced).unwrap(), "old");
        assert!(!created.exists());
        assert!(blocked.is_dir());

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }
}
