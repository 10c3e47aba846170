// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! modpatch command line: version range checks and config inspection.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;

use modpatch::config;
use modpatch::package::{FsPackageReader, PackageReader};
use modpatch::semver::{satisfies, valid, SatisfiesOptions, VersionRange};
use modpatch::telemetry::{init_telemetry, TelemetryConfig};

/// modpatch version string.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// modpatch - module patching engine tools.
#[derive(Parser)]
#[command(name = "modpatch")]
#[command(author, version, about = "Module load interception and semver gating", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for modpatch.
#[derive(Subcommand)]
enum Commands {
    /// Check whether a version satisfies a range (exit code 0 or 1)
    Satisfies {
        /// Version to test, e.g. 1.2.3-beta.1
        version: String,
        /// Range, e.g. "^1.0.0 || >=3.0.0 <4"
        range: String,
        /// Let prerelease versions match any clause
        #[arg(long)]
        include_prerelease: bool,
    },

    /// Print the version from a package directory's package.json
    PackageVersion {
        /// Package directory
        dir: PathBuf,
    },

    /// Show the resolved configuration
    Config {
        /// Directory to search for config files (defaults to the current one)
        dir: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = if cli.verbose {
        TelemetryConfig::development()
    } else {
        TelemetryConfig::default()
    };
    let _guard = match init_telemetry(&telemetry) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("{} {}", "warning:".yellow(), e);
            None
        }
    };

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

fn run(command: Commands) -> modpatch::Result<ExitCode> {
    match command {
        Commands::Satisfies {
            version,
            range,
            include_prerelease,
        } => {
            if !valid(&version) {
                eprintln!("{} {} is not a valid version", "✗".red(), version.bright_white());
                return Ok(ExitCode::FAILURE);
            }
            for err in VersionRange::parse(&range).errors() {
                eprintln!("{} {}", "warning:".yellow(), err);
            }

            let options = SatisfiesOptions { include_prerelease };
            if satisfies(&version, &range, options) {
                println!("{} {} satisfies {}", "✓".green(), version.bright_white(), range.cyan());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{} {} does not satisfy {}", "✗".red(), version.bright_white(), range.cyan());
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::PackageVersion { dir } => {
            let version = FsPackageReader.read_version(&dir)?;
            println!("{}", version);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let resolved = config::load_config(&dir)?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => {
            println!("modpatch {}", VERSION);
            Ok(ExitCode::SUCCESS)
        }
    }
}
