//! Per-iteration archive of solver inputs and outputs.

use std::path::PathBuf;

use crate::domain::errors::DomainResult;

/// What one archive pass copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReport {
    /// Archive directory for the iteration.
    pub dir: PathBuf,
    /// Files copied.
    pub copied: usize,
    /// Files that did not exist.
    pub skipped: usize,
}

/// Copies an iteration's files into `<work_dir>/iteration<N>`.
///
/// `N` is the iteration index shifted by `first_iteration`, so a restarted run
/// keeps numbering where the previous one stopped.
#[derive(Debug, Clone)]
pub struct IterationArchive {
    work_dir: PathBuf,
    first_iteration: usize,
}

impl IterationArchive {
    /// Archive rooted at `work_dir`, labels shifted by `first_iteration`.
    pub fn new(work_dir: impl Into<PathBuf>, first_iteration: usize) -> Self {
        Self {
            work_dir: work_dir.into(),
            first_iteration,
        }
    }

    /// Archive directory for `iteration`.
    pub fn dir_for(&self, iteration: usize) -> PathBuf {
        self.work_dir
            .join(format!("iteration{}", iteration + self.first_iteration))
    }

    /// Copy `files` (relative to the working directory) that exist.
    pub async fn archive(&self, iteration: usize, files: &[PathBuf]) -> DomainResult<ArchiveReport> {
        let dir = self.dir_for(iteration);
        tokio::fs::create_dir_all(&dir).await?;

        let mut copied = 0;
        let mut skipped = 0;
        for file in files {
            let source = self.work_dir.join(file);
            if !tokio::fs::try_exists(&source).await? {
                tracing::debug!(iteration, file = %file.display(), "nothing to archive");
                skipped += 1;
                continue;
            }
            let name = file.file_name().unwrap_or(file.as_os_str());
            tokio::fs::copy(&source, dir.join(name)).await?;
            copied += 1;
        }

        tracing::info!(iteration, dir = %dir.display(), copied, skipped, "iteration archived");
        Ok(ArchiveReport {
            dir,
            copied,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copies_existing_files_with_offset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zone0.in"), "deck").unwrap();
        std::fs::write(dir.path().join("zone0.out"), "log").unwrap();

        let archive = IterationArchive::new(dir.path(), 5);
        let report = archive
            .archive(
                2,
                &[
                    PathBuf::from("zone0.in"),
                    PathBuf::from("zone0.out"),
                    PathBuf::from("zone0.sed"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.dir, dir.path().join("iteration7"));
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, 1);
        let deck = std::fs::read_to_string(report.dir.join("zone0.in")).unwrap();
        assert_eq!(deck, "deck");
    }

    #[test]
    fn rearchiving_an_iteration_overwrites_its_copy() {
        let dir = tempfile::tempdir().unwrap();
        let archive = IterationArchive::new(dir.path(), 0);
        let files = [PathBuf::from("zone0.in")];

        std::fs::write(dir.path().join("zone0.in"), "first").unwrap();
        tokio_test::assert_ok!(tokio_test::block_on(archive.archive(1, &files)));
        std::fs::write(dir.path().join("zone0.in"), "second").unwrap();
        let report = tokio_test::assert_ok!(tokio_test::block_on(archive.archive(1, &files)));

        assert_eq!(report.copied, 1);
        let deck = std::fs::read_to_string(archive.dir_for(1).join("zone0.in")).unwrap();
        assert_eq!(deck, "second");
    }
}
