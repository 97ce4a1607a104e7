//! Concurrent conversion of many archives.
//!
//! Every eligible file becomes an independent task on a worker pool. A task
//! that fails is reported and logged, never propagated: the batch always
//! attempts every file and signals completion once all tasks are done.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error};
use rayon::prelude::*;

use crate::archive::ARCHIVE_EXTENSION;
use crate::convert::{Outcome, convert_archive};
use crate::error::{OotrsError, Result};

/// Files to convert. Outputs mirror each file's path relative to `base_dir`
/// under `conversion_dir`.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub base_dir: PathBuf,
    pub conversion_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker count; `None` uses the available parallelism.
    pub jobs: Option<usize>,
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub result: Result<Outcome>,
}

/// Progress notifications emitted while a batch runs.
#[derive(Debug)]
pub enum BatchEvent<'a> {
    /// A directory group, sent for every group before any task starts.
    Directory { dir: &'a Path, files: &'a [PathBuf] },
    /// A task finished. Sent from worker threads in completion order.
    Finished(&'a FileReport),
    /// Every task has finished. Sent exactly once, last.
    Completed {
        converted: usize,
        skipped: usize,
        failed: usize,
    },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn converted(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.files.iter().filter_map(|report| match &report.result {
            Ok(Outcome::Converted(out)) => Some((report.path.as_path(), out.as_path())),
            _ => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &Path> {
        self.files
            .iter()
            .filter(|report| matches!(report.result, Ok(Outcome::Skipped)))
            .map(|report| report.path.as_path())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| report.result.is_err())
    }
}

/// Convert every `.ootrs` file of `job` concurrently.
///
/// Only failing to create the conversion root (or the worker pool) is an
/// error; per-file failures are collected into the returned report.
pub fn run_batch<F>(job: &BatchJob, options: &BatchOptions, on_event: F) -> Result<BatchReport>
where
    F: Fn(BatchEvent<'_>) + Sync,
{
    fs::create_dir_all(&job.conversion_dir)?;

    let (archives, ignored): (Vec<&PathBuf>, Vec<&PathBuf>) =
        job.files.iter().partition(|path| is_archive(path));
    for path in ignored {
        debug!("ignoring {}", path.display());
    }

    for (dir, files) in &group_by_directory(&job.base_dir, &archives) {
        on_event(BatchEvent::Directory { dir, files });
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs.unwrap_or(0))
        .build()
        .map_err(io::Error::other)?;

    let files: Vec<FileReport> = pool.install(|| {
        archives
            .par_iter()
            .map(|path| {
                let report = process_file(job, path);
                on_event(BatchEvent::Finished(&report));
                report
            })
            .collect()
    });

    let report = BatchReport { files };
    on_event(BatchEvent::Completed {
        converted: report.converted().count(),
        skipped: report.skipped().count(),
        failed: report.failures().count(),
    });
    Ok(report)
}

fn process_file(job: &BatchJob, input: &Path) -> FileReport {
    let dest_dir = destination_dir(job, input);
    let result = fs::create_dir_all(&dest_dir)
        .map_err(OotrsError::from)
        .and_then(|()| convert_archive(input, &dest_dir));

    match &result {
        Ok(Outcome::Converted(out)) => debug!("{} -> {}", input.display(), out.display()),
        Ok(Outcome::Skipped) => debug!("{} is already converted", input.display()),
        Err(e) => error!("error processing {}: {e}", input.display()),
    }
    FileReport {
        path: input.to_path_buf(),
        result,
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Path of `input` relative to the batch base; files outside the base keep
/// only their file name.
fn relative_path<'a>(base_dir: &Path, input: &'a Path) -> &'a Path {
    input
        .strip_prefix(base_dir)
        .ok()
        .or_else(|| input.file_name().map(Path::new))
        .unwrap_or(input)
}

fn destination_dir(job: &BatchJob, input: &Path) -> PathBuf {
    let relative = relative_path(&job.base_dir, input);
    let target = job.conversion_dir.join(relative);
    target
        .parent()
        .map_or_else(|| job.conversion_dir.clone(), Path::to_path_buf)
}

fn group_by_directory(base_dir: &Path, files: &[&PathBuf]) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        let dir = relative_path(base_dir, path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        groups.entry(dir).or_default().push((*path).clone());
    }
    for files in groups.values_mut() {
        files.sort();
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn job(base: &Path, files: &[&str]) -> BatchJob {
        BatchJob {
            base_dir: base.to_path_buf(),
            conversion_dir: base.with_file_name("music_converted"),
            files: files.iter().map(|f| base.join(f)).collect(),
        }
    }

    #[test]
    fn test_destination_mirrors_relative_path() {
        let job = job(Path::new("/music"), &[]);
        assert_eq!(
            destination_dir(&job, Path::new("/music/dungeons/water.ootrs")),
            PathBuf::from("/music_converted/dungeons")
        );
        assert_eq!(
            destination_dir(&job, Path::new("/music/top.ootrs")),
            PathBuf::from("/music_converted")
        );
        assert_eq!(
            destination_dir(&job, Path::new("/elsewhere/stray.ootrs")),
            PathBuf::from("/music_converted")
        );
    }

    #[test]
    fn test_group_by_directory() {
        let job = job(
            Path::new("/music"),
            &["b/two.ootrs", "a.ootrs", "b/one.ootrs", "c/d/three.ootrs"],
        );
        let files: Vec<&PathBuf> = job.files.iter().collect();
        let groups = group_by_directory(&job.base_dir, &files);

        let dirs: Vec<&Path> = groups.keys().map(PathBuf::as_path).collect();
        assert_eq!(dirs, [Path::new(""), Path::new("b"), Path::new("c/d")]);
        assert_eq!(
            groups[Path::new("b")],
            [
                PathBuf::from("/music/b/one.ootrs"),
                PathBuf::from("/music/b/two.ootrs")
            ]
        );
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive(Path::new("song.ootrs")));
        assert!(is_archive(Path::new("SONG.OOTRS")));
        assert!(!is_archive(Path::new("song.zip")));
        assert!(!is_archive(Path::new("ootrs")));
    }

    #[test]
    fn test_non_archives_are_not_dispatched() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("music");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("notes.txt"), b"not music").unwrap();

        let job = job(&base, &["notes.txt"]);
        let events = Mutex::new(Vec::new());
        let report = run_batch(&job, &BatchOptions::default(), |event| {
            events.lock().unwrap().push(format!("{event:?}"));
        })
        .unwrap();

        assert!(report.files.is_empty());
        assert!(job.conversion_dir.is_dir());
        let events = events.into_inner().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].starts_with("Completed"));
    }

    #[test]
    fn test_unwritable_conversion_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let job = BatchJob {
            base_dir: tmp.path().to_path_buf(),
            conversion_dir: blocker.join("converted"),
            files: vec![tmp.path().join("song.ootrs")],
        };
        assert!(run_batch(&job, &BatchOptions::default(), |_| {}).is_err());
    }

    #[test]
    fn test_unreadable_archive_is_a_file_failure() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("music");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("broken.ootrs"), b"not a zip").unwrap();

        let job = job(&base, &["broken.ootrs", "missing.ootrs"]);
        let options = BatchOptions { jobs: Some(2) };
        let report = run_batch(&job, &options, |_| {}).unwrap();

        assert_eq!(report.failures().count(), 2);
        assert_eq!(report.converted().count(), 0);
    }
}
