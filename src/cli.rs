use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::backup::DEFAULT_CHUNK_SIZE;
use crate::archive::PatternSelection;

#[derive(Parser, Debug)]
#[command(name = "abunpack")]
#[command(version)]
#[command(about = "Decode Android backup files and extract their contents", long_about = None)]
#[command(after_help = "Examples:\n  \
  abunpack decode phone.ab                 write phone.ab.tar\n  \
  abunpack restore phone.ab -d out         decode to a temp file and extract everything\n  \
  abunpack find phone.ab.tar -e 'apps/com.whatsapp/'   extract one app\n  \
  abunpack list -v phone.ab.tar            list archive entries")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a backup into a tar archive
    Decode {
        /// Backup file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Write the archive here instead of FILE.tar
        #[arg(short = 'o', value_name = "OUT", conflicts_with = "tmp")]
        output: Option<PathBuf>,

        /// Write the archive to a temporary file
        #[arg(long)]
        tmp: bool,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Decode a backup and extract every entry
    Restore {
        /// Backup file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,

        /// Keep the intermediate tar archive
        #[arg(long)]
        keep_tar: bool,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Extract every entry of a tar archive, reporting the listed targets
    Extract {
        /// Tar archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Entries to report (default: none unless --all)
        #[arg(value_name = "TARGETS")]
        targets: Vec<String>,

        /// Report every extracted entry
        #[arg(short = 'a', long = "all")]
        full: bool,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,
    },

    /// Extract only entries whose path matches a pattern
    Find {
        /// Tar archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// Regular expression matched at the start of each entry path
        #[arg(short = 'e', long, value_name = "REGEX", default_value = PatternSelection::DEFAULT_PATTERN)]
        pattern: String,

        /// Extract files into exdir
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        extract_dir: PathBuf,
    },

    /// List entries of a tar archive
    List {
        /// Tar archive
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,

        /// List verbosely
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Show the header of a backup file
    Info {
        /// Backup file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// Bytes of compressed payload read per chunk
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Accept unrecognized encryption tokens as unencrypted
    #[arg(long)]
    pub lenient: bool,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_find_with_default_pattern() {
        let cli = Cli::parse_from(["abunpack", "find", "x.tar", "-d", "out"]);
        match cli.command {
            Command::Find {
                pattern,
                extract_dir,
                ..
            } => {
                assert_eq!(pattern, ".+?");
                assert_eq!(extract_dir, PathBuf::from("out"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decode_output_conflicts_with_tmp() {
        assert!(Cli::try_parse_from(["abunpack", "decode", "a.ab", "-o", "b", "--tmp"]).is_err());

        let cli = Cli::parse_from(["abunpack", "-qq", "decode", "a.ab", "--chunk-size", "17"]);
        assert!(cli.is_very_quiet());
        match cli.command {
            Command::Decode { decode, .. } => assert_eq!(decode.chunk_size, 17),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extract_collects_targets() {
        let cli = Cli::parse_from(["abunpack", "extract", "x.tar", "a", "b/c", "--all"]);
        match cli.command {
            Command::Extract { targets, full, .. } => {
                assert_eq!(targets, ["a", "b/c"]);
                assert!(full);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
