//! Main entry point for the abunpack CLI application.
//!
//! The decode/extract pipeline is synchronous. It runs as a single blocking
//! task on the tokio runtime so the async side stays free.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use abunpack::cli::{Command, DecodeArgs};
use abunpack::{
    ArchiveEntry, Cli, ContainerHeader, Decoder, Destination, EntryError, EntryKind, Error,
    ExtractLog,
    PatternSelection, TarExtractor, TargetSelection, VariantPolicy,
};

/// Application entry point.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    StderrLogger::install(&cli);

    tokio::task::spawn_blocking(move || run(&cli))
        .await
        .context("worker task panicked")?
}

/// Prints library warnings (lenient headers, truncated archives, trailing
/// bytes) on stderr next to the per-entry failures.
struct StderrLogger {
    level: log::LevelFilter,
}

impl StderrLogger {
    fn install(cli: &Cli) {
        let level = if cli.is_very_quiet() {
            log::LevelFilter::Error
        } else {
            log::LevelFilter::Warn
        };
        let logger = Box::new(Self { level });
        if log::set_boxed_logger(logger).is_ok() {
            log::set_max_level(level);
        }
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}: {}", record.level().as_str().to_lowercase(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Reports extraction outcomes on the console.
struct ConsoleLog {
    quiet: bool,
    very_quiet: bool,
    failures: usize,
}

impl ConsoleLog {
    fn new(cli: &Cli) -> Self {
        Self {
            quiet: cli.is_quiet(),
            very_quiet: cli.is_very_quiet(),
            failures: 0,
        }
    }
}

impl ExtractLog for ConsoleLog {
    fn extracted(&mut self, entry: &ArchiveEntry) {
        if !self.quiet {
            println!("  extracting: {}", entry.path);
        }
    }

    fn failed(&mut self, entry: &ArchiveEntry, error: &EntryError) {
        self.failures += 1;
        if !self.very_quiet {
            eprintln!("Failed extracting: {} > {}", entry.path, error);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Decode {
            file,
            output,
            tmp,
            decode,
        } => {
            let destination = match (output, tmp) {
                (Some(path), _) => Destination::Path(path.clone()),
                (None, true) => Destination::Temp,
                (None, false) => Destination::Beside,
            };
            let report = decoder(decode).destination(destination).decode(file)?;

            if !cli.is_quiet() {
                eprintln!(
                    "{}: {} -> {}",
                    report.archive.display(),
                    format_size(report.payload_bytes),
                    format_size(report.archive_bytes)
                );
            }
            println!("{}", report.archive.display());
        }

        Command::Restore {
            file,
            extract_dir,
            keep_tar,
            decode,
        } => {
            let report = match decoder(decode).destination(Destination::Temp).decode(file) {
                Ok(report) => report,
                Err(e) => {
                    if let Error::Decompression { output, .. } = &e {
                        discard_partial(cli, output, *keep_tar);
                    }
                    return Err(e.into());
                }
            };
            let result = extract_all(cli, &report.archive, extract_dir);

            if *keep_tar {
                if !cli.is_quiet() {
                    eprintln!("Archive kept at {}", report.archive.display());
                }
            } else {
                std::fs::remove_file(&report.archive).with_context(|| {
                    format!("failed to remove {}", report.archive.display())
                })?;
            }
            result?;
        }

        Command::Extract {
            archive,
            targets,
            full,
            extract_dir,
        } => {
            let extractor = TarExtractor::open(archive)?;
            let mut log = ConsoleLog::new(cli);
            let selection = TargetSelection::new(targets.iter().cloned(), *full);

            for path in extractor.extract(extract_dir, selection, &mut log)? {
                if !cli.is_very_quiet() {
                    println!("{path}");
                }
            }
            summarize(cli, &log);
        }

        Command::Find {
            archive,
            pattern,
            extract_dir,
        } => {
            let extractor = TarExtractor::open(archive)?;
            let mut log = ConsoleLog {
                quiet: true,
                ..ConsoleLog::new(cli)
            };
            let selection = PatternSelection::new(pattern)?;

            for entry in extractor.extract(extract_dir, selection, &mut log)? {
                if !cli.is_very_quiet() {
                    println!("{entry}");
                }
            }
            summarize(cli, &log);
        }

        Command::List { archive, verbose } => {
            let extractor = TarExtractor::open(archive)?;
            list_entries(&extractor.list_entries()?, *verbose);
        }

        Command::Info { file } => {
            let source = File::open(file).with_context(|| format!("cannot open {}", file.display()))?;
            let header = ContainerHeader::read(&mut BufReader::new(source), file)?;
            println!(
                "{}: encryption {:?} (token {:?})",
                file.display(),
                header.encryption,
                String::from_utf8_lossy(&header.encryption.token())
            );
        }
    }

    Ok(())
}

/// Drop the partial archive a failed decode left behind, unless asked to
/// keep it.
fn discard_partial(cli: &Cli, output: &Path, keep: bool) {
    if keep {
        if !cli.is_quiet() {
            eprintln!("Partial archive kept at {}", output.display());
        }
    } else if let Err(e) = std::fs::remove_file(output) {
        log::warn!("failed to remove {}: {}", output.display(), e);
    }
}

fn decoder(args: &DecodeArgs) -> Decoder {
    let policy = if args.lenient {
        VariantPolicy::Lenient
    } else {
        VariantPolicy::Strict
    };
    Decoder::new().chunk_size(args.chunk_size).policy(policy)
}

fn extract_all(cli: &Cli, archive: &Path, dest: &Path) -> Result<()> {
    let extractor = TarExtractor::open(archive)?;
    let mut log = ConsoleLog::new(cli);

    let extracted = extractor
        .extract(dest, TargetSelection::full(), &mut log)?
        .count();

    if !cli.is_quiet() {
        eprintln!("{} entries extracted to {}", extracted, dest.display());
    }
    summarize(cli, &log);
    Ok(())
}

fn summarize(cli: &Cli, log: &ConsoleLog) {
    if log.failures > 0 && !cli.is_very_quiet() {
        eprintln!("{} entries could not be extracted", log.failures);
    }
}

/// List entries of the archive.
///
/// Simple format prints paths only; verbose adds type, size and mode.
fn list_entries(entries: &[ArchiveEntry], verbose: bool) {
    if verbose {
        println!("{:>10}  {:>9}  {:>6}  Name", "Length", "Type", "Mode");
        println!("{}", "-".repeat(60));
    }

    let mut total = 0u64;
    let mut files = 0usize;

    for entry in entries {
        if verbose {
            let mode = entry
                .mode
                .map(|m| format!("{:o}", m & 0o7777))
                .unwrap_or_else(|| "-".to_string());
            let name = match &entry.kind {
                EntryKind::Symlink { target } | EntryKind::HardLink { target } => {
                    format!("{} -> {}", entry.path, target.display())
                }
                _ => entry.path.clone(),
            };
            println!(
                "{:>10}  {:>9}  {:>6}  {}",
                entry.size,
                entry.kind.as_str(),
                mode,
                name
            );

            if entry.kind == EntryKind::File {
                total += entry.size;
                files += 1;
            }
        } else {
            println!("{}", entry.path);
        }
    }

    if verbose {
        println!("{}", "-".repeat(60));
        println!("{:>10}  {} files", format_size(total), files);
    }
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
