use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::archive::{self, Extraction, META_EXTENSION};
use crate::bank::SoundBank;
use crate::descriptor::MetaDescriptor;
use crate::error::Result;
use crate::metadata;
use crate::resolver;

const STAGING_PREFIX: &str = "ootrs_convert_2_";

/// What happened to a single archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Path of the newly written archive.
    Converted(PathBuf),
    /// The archive was already in the new format; nothing was written.
    Skipped,
}

/// Convert one legacy archive into `dest_dir`.
///
/// The output keeps the input's file stem. Every extracted file except the
/// legacy meta file is carried over, and a `.metadata` file named after the
/// meta file is added.
pub fn convert_archive(input: &Path, dest_dir: &Path) -> Result<Outcome> {
    let extracted = match archive::unpack(input)? {
        Extraction::AlreadyConverted => return Ok(Outcome::Skipped),
        Extraction::Extracted(extracted) => extracted,
    };
    let contents = &extracted.contents;

    let mut descriptor = MetaDescriptor::parse(&fs::read_to_string(&contents.meta)?)?;
    if let Some((bank, bank_meta)) = contents.bank_pair() {
        resolve_with_bank(&mut descriptor, bank, bank_meta)?;
    }

    let staging = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir()?;
    copy_archive_files(extracted.path(), staging.path())?;
    metadata::write_metadata(staging.path(), &file_stem(&contents.meta), &descriptor)?;

    let out = archive::pack(staging.path(), dest_dir, &file_stem(input))?;
    Ok(Outcome::Converted(out))
}

/// Decode the archive's bank and resolve any raw temp addresses against it.
fn resolve_with_bank(descriptor: &mut MetaDescriptor, bank: &Path, bank_meta: &Path) -> Result<()> {
    let bank = SoundBank::decode(&fs::read(bank_meta)?, &fs::read(bank)?)?;
    if descriptor.has_unresolved() {
        let resolved = resolver::resolve(descriptor, &bank);
        debug!("resolved {resolved} of {} sound directives", descriptor.directives.len());
    }
    Ok(())
}

/// Copy every file except the legacy meta file.
fn copy_archive_files(source: &Path, dest: &Path) -> Result<()> {
    for path in archive::sorted_files(source)? {
        let is_meta = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(META_EXTENSION));
        if is_meta {
            continue;
        }
        if let Some(name) = path.file_name() {
            fs::copy(&path, dest.join(name))?;
        }
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_zip;
    use crate::bank::tests::BankBuilder;
    use crate::error::OotrsError;
    use std::fs::File;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn read_entry(archive: &Path, name: &str) -> String {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut out = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn entry_names(archive: &Path) -> Vec<String> {
        let zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(ToString::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn test_convert_without_bank() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("Dark World.ootrs");
        write_zip(
            &input,
            &[
                ("dw.seq", b"seq"),
                ("dw.meta", b"Dark World\n-\nbgm\nDungeon\nZSOUND:choir.zsound:1F00"),
                ("choir.zsound", b"pcm"),
            ],
        );
        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();

        let Outcome::Converted(out) = convert_archive(&input, &dest).unwrap() else {
            panic!("expected conversion");
        };
        assert_eq!(out, dest.join("Dark World.ootrs"));
        assert_eq!(entry_names(&out), ["choir.zsound", "dw.metadata", "dw.seq"]);

        let metadata = read_entry(&out, "dw.metadata");
        assert!(metadata.contains("  display name: Dark World\n"));
        assert!(metadata.contains("    choir.zsound:\n      temp address: 0x1F00\n"));
    }

    #[test]
    fn test_convert_resolves_against_bank() {
        let tmp = TempDir::new().unwrap();
        let builder = BankBuilder::default()
            .instrument(Some([0, 0xA00, 0]))
            .drum(Some(0xB00));
        let bank = builder.build();
        let input = tmp.path().join("custom.ootrs");
        write_zip(
            &input,
            &[
                ("c.seq", b"seq"),
                ("c.meta", b"Custom\n-\nbgm\nField\nZSOUND:lead:A00\nZSOUND:snare:B00\nZSOUND:gone:C00"),
                ("c.zbank", &bank),
                ("c.bankmeta", &builder.meta()),
            ],
        );

        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();

        let Outcome::Converted(out) = convert_archive(&input, &dest).unwrap() else {
            panic!("expected conversion");
        };
        let metadata = read_entry(&out, "c.metadata");
        assert!(metadata.contains(
            "    lead:\n      instrument type: INST\n      list index: 0\n      key region: PRIM\n"
        ));
        assert!(metadata.contains("    snare:\n      instrument type: DRUM\n      list index: 0\n"));
        assert!(metadata.contains("    gone:\n      temp address: 0xC00\n"));
    }

    #[test]
    fn test_already_converted_input_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("done.ootrs");
        write_zip(&input, &[("d.seq", b"seq"), ("d.metadata", b"game: oot\n")]);
        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();

        assert_eq!(convert_archive(&input, &dest).unwrap(), Outcome::Skipped);
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_bank_meta_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("bad.ootrs");
        write_zip(
            &input,
            &[
                ("b.seq", b"seq"),
                ("b.meta", b"Bad\n-\n"),
                ("b.zbank", &[0; 16]),
                ("b.bankmeta", &[0; 5]),
            ],
        );
        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();

        assert!(matches!(
            convert_archive(&input, &dest),
            Err(OotrsError::Malformed(_))
        ));
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 0);
    }
}
