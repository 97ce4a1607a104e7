//! Converter for Ocarina of Time Randomizer custom music archives.
//!
//! Legacy `.ootrs` archives describe a song with a positional plain-text
//! `.meta` file. This crate rewrites them to carry a typed `.metadata` file
//! instead, resolving raw sample addresses into bank references when the
//! archive ships its own sound bank.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let out = ootrs::convert_archive(Path::new("song.ootrs"), Path::new("converted")).unwrap();
//! println!("{out:?}");
//! ```
//!
//! For many files at once use [`run_batch`], which converts on a worker
//! pool and reports per-file outcomes.

pub mod archive;
pub mod bank;
mod batch;
mod convert;
pub mod descriptor;
pub mod error;
pub mod metadata;
pub mod resolver;

pub use archive::{ArchiveContents, Extraction};
pub use bank::{Sample, SampleOwner, SoundBank};
pub use batch::{BatchEvent, BatchJob, BatchOptions, BatchReport, FileReport, run_batch};
pub use convert::{Outcome, convert_archive};
pub use descriptor::{MetaDescriptor, SoundDirective};
pub use error::{OotrsError, Result};
