//! `.ootrs` archive container: a zip holding one sequence, one meta file and
//! optionally a sound bank pair plus replacement samples.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{OotrsError, Result};
use crate::metadata::METADATA_EXTENSION;

pub const ARCHIVE_EXTENSION: &str = "ootrs";
pub const SEQUENCE_EXTENSION: &str = "seq";
pub const META_EXTENSION: &str = "meta";
pub const BANK_EXTENSION: &str = "zbank";
pub const BANK_META_EXTENSION: &str = "bankmeta";
pub const SOUND_EXTENSION: &str = "zsound";

const EXTRACT_PREFIX: &str = "ootrs_convert_";

/// Classified top-level files of an extracted archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveContents {
    pub sequence: PathBuf,
    pub meta: PathBuf,
    pub bank: Option<PathBuf>,
    pub bank_meta: Option<PathBuf>,
    pub samples: Vec<PathBuf>,
}

impl ArchiveContents {
    /// Classify the files directly inside `dir` by extension.
    pub fn classify(dir: &Path) -> Result<Self> {
        let mut sequence = None;
        let mut meta = None;
        let mut bank = None;
        let mut bank_meta = None;
        let mut samples = Vec::new();

        for path in sorted_files(dir)? {
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let (slot, what) = match extension.as_str() {
                SEQUENCE_EXTENSION => (&mut sequence, "sequence"),
                META_EXTENSION => (&mut meta, "meta"),
                BANK_EXTENSION => (&mut bank, "bank"),
                BANK_META_EXTENSION => (&mut bank_meta, "bank meta"),
                SOUND_EXTENSION => {
                    samples.push(path);
                    continue;
                }
                _ => continue,
            };
            if slot.replace(path).is_some() {
                return Err(OotrsError::DuplicateComponent(what));
            }
        }

        let sequence = sequence.ok_or(OotrsError::MissingComponent("sequence"))?;
        let meta = meta.ok_or(OotrsError::MissingComponent("meta"))?;
        match (&bank, &bank_meta) {
            (Some(_), None) => return Err(OotrsError::MissingComponent("bank meta")),
            (None, Some(_)) => return Err(OotrsError::MissingComponent("bank")),
            _ => {}
        }

        Ok(Self {
            sequence,
            meta,
            bank,
            bank_meta,
            samples,
        })
    }

    /// The `(bank, bank meta)` pair, when the archive carries a sound bank.
    pub fn bank_pair(&self) -> Option<(&Path, &Path)> {
        self.bank.as_deref().zip(self.bank_meta.as_deref())
    }
}

/// An archive extracted into a temporary directory. The directory is removed
/// when this value is dropped.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    pub contents: ArchiveContents,
}

impl ExtractedArchive {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[derive(Debug)]
pub enum Extraction {
    /// The archive already carries a `.metadata` file.
    AlreadyConverted,
    Extracted(ExtractedArchive),
}

/// Extract `path` into a fresh temporary directory and classify its files.
pub fn unpack(path: &Path) -> Result<Extraction> {
    let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let marker = format!(".{METADATA_EXTENSION}");
    if zip.file_names().any(|name| name.ends_with(&marker)) {
        debug!("{} already has a metadata file", path.display());
        return Ok(Extraction::AlreadyConverted);
    }

    let dir = tempfile::Builder::new().prefix(EXTRACT_PREFIX).tempdir()?;
    zip.extract(dir.path())?;
    debug!("extracted {} into {}", path.display(), dir.path().display());

    let contents = ArchiveContents::classify(dir.path())?;
    Ok(Extraction::Extracted(ExtractedArchive { dir, contents }))
}

/// Zip every file in `source_dir` into `dest_dir/<name>.ootrs`.
///
/// The archive is staged under a temporary name in `dest_dir` and renamed
/// over any existing output only once it is complete.
pub fn pack(source_dir: &Path, dest_dir: &Path, name: &str) -> Result<PathBuf> {
    let out_path = dest_dir.join(format!("{name}.{ARCHIVE_EXTENSION}"));
    let staging = tempfile::Builder::new()
        .prefix(".ootrs_pack_")
        .suffix(".tmp")
        .tempfile_in(dest_dir)?;

    let mut zip = ZipWriter::new(staging.as_file());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in sorted_files(source_dir)? {
        let entry = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(entry, options)?;
        io::copy(&mut File::open(&path)?, &mut zip)?;
    }
    zip.finish()?;

    staging.persist(&out_path).map_err(|e| e.error)?;
    debug!("packed {} into {}", source_dir.display(), out_path.display());
    Ok(out_path)
}

/// Regular files directly inside `dir`, sorted by path. A subfolder is an
/// error since its contents would not survive repacking.
pub(crate) fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            return Err(OotrsError::NestedEntry(
                entry.file_name().to_string_lossy().into_owned(),
            ));
        }
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
