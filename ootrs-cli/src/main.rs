use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ootrs::{BatchEvent, BatchJob, BatchOptions, Outcome};
use walkdir::WalkDir;

const DIRECTORY_OUTPUT_SUFFIX: &str = "_converted";
const FILE_OUTPUT_DIR: &str = "converted_files";

#[derive(Parser)]
#[command(
    name = "ootrs",
    version,
    about = "Convert legacy .ootrs music archives to the .metadata format"
)]
struct Cli {
    /// Archives or directories to convert (directories are searched recursively)
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let options = BatchOptions { jobs: cli.jobs };

    for path in &cli.paths {
        let Some(job) = plan(path)? else {
            eprintln!("warning: {} is neither a file nor a directory", path.display());
            continue;
        };
        ootrs::run_batch(&job, &options, print_event).with_context(|| {
            format!(
                "failed to create output directory {}",
                job.conversion_dir.display()
            )
        })?;
    }

    println!("All files processed.");
    Ok(())
}

/// Directories convert into a sibling `<name>_converted` tree; single files
/// into a `converted_files` folder next to them.
fn plan(path: &Path) -> Result<Option<BatchJob>> {
    let path = std::path::absolute(path)
        .with_context(|| format!("cannot resolve {}", path.display()))?;

    if path.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = path.parent().unwrap_or(&path);
        let conversion_dir = parent.join(format!("{name}{DIRECTORY_OUTPUT_SUFFIX}"));
        let files = WalkDir::new(&path)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .collect();
        info!("processing directory {}", path.display());
        return Ok(Some(BatchJob {
            base_dir: path,
            conversion_dir,
            files,
        }));
    }

    if path.is_file() {
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(Some(BatchJob {
            conversion_dir: base_dir.join(FILE_OUTPUT_DIR),
            base_dir,
            files: vec![path],
        }));
    }

    Ok(None)
}

fn print_event(event: BatchEvent<'_>) {
    match event {
        BatchEvent::Directory { dir, files } => {
            info!("{}: {} archive(s)", dir.display(), files.len());
        }
        BatchEvent::Finished(report) => match &report.result {
            Ok(Outcome::Converted(out)) => {
                println!("{} -> {}", report.path.display(), out.display());
            }
            Ok(Outcome::Skipped) => {
                println!("{}: already converted, skipped", report.path.display());
            }
            Err(e) => eprintln!("error: {}: {e}", report.path.display()),
        },
        BatchEvent::Completed {
            converted,
            skipped,
            failed,
        } => {
            println!("{converted} converted, {skipped} skipped, {failed} failed");
        }
    }
}
