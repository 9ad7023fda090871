use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use jffs2_extract::Error;
use log::LevelFilter;
use memmap::Mmap;

/// Offline extractor for JFFS2 filesystem images.
#[derive(Parser, Debug)]
#[command(name = "jffs2-extract", version, about)]
struct Cli {
    /// Path to the JFFS2 image to extract.
    filesystem: PathBuf,

    /// Destination root directory.
    #[arg(short = 'd', long = "dest", default_value = "jffs2-root")]
    dest: PathBuf,

    /// Increase logging verbosity; may be repeated (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Permit extracting into an existing destination directory.
    #[arg(short = 'f', long = "force")]
    force: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if cli.dest.exists() && !cli.force {
        return Err(Error::Usage(format!(
            "destination '{}' already exists (pass --force to extract into it anyway)",
            cli.dest.display()
        ))
        .into());
    }

    let file = fs::File::open(&cli.filesystem).map_err(|e| {
        Error::Usage(format!("failed to open '{}': {}", cli.filesystem.display(), e))
    })?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| {
        Error::Usage(format!("failed to map '{}': {}", cli.filesystem.display(), e))
    })?;

    fs::create_dir_all(&cli.dest)
        .with_context(|| format!("failed to create destination '{}'", cli.dest.display()))?;

    let summary = jffs2_extract::extract_all(&mmap, &cli.dest);

    println!(
        "recovered {} logical filesystem(s) into {}",
        summary.filesystem_count,
        cli.dest.display()
    );

    Ok(())
}
