mod scan;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use updinfo_types::UpdateInformation;

use crate::scan::scan_dir;

#[derive(Parser)]
#[command(version, about = "Inspect the update information of AppImages")]
struct Args {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and parse an update information string
    Parse {
        /// e.g. "gh-releases-zsync|owner|repo|latest|app-*-x86_64.AppImage.zsync"
        update_info: String,
    },
    /// Read the update information embedded in an AppImage
    Read {
        file: PathBuf,
        /// Print the embedded string without parsing it
        #[arg(long)]
        raw: bool,
    },
    /// Report the update information of every AppImage below a folder
    Scan {
        dir: PathBuf,
        /// Also list files that are not ELF binaries
        #[arg(short, long)]
        all: bool,
        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::Parse { update_info } => {
            let info = updinfo_types::parse(&update_info)
                .with_context(|| format!("Parsing '{update_info}'"))?;
            print_info(&info, args.json)?;
        }
        Command::Read { file, raw: true } => {
            let raw = updinfo_elf::read_update_info(&file)
                .with_context(|| format!("Reading {}", file.display()))?;
            if args.json {
                println!("{}", serde_json::to_string(&raw)?);
            } else {
                println!("{raw}");
            }
        }
        Command::Read { file, raw: false } => {
            let info = updinfo_elf::read_and_parse(&file)
                .with_context(|| format!("Reading {}", file.display()))?;
            print_info(&info, args.json)?;
        }
        Command::Scan { dir, all, progress } => {
            let entries = scan_dir(&dir, all, progress)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    println!("{entry}");
                }
            }
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_info(info: &UpdateInformation, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }
    println!("transport: {}", info.transport());
    match info {
        UpdateInformation::ZsyncDirect { file_url } => println!("file url:  {file_url}"),
        UpdateInformation::GithubReleasesZsync {
            owner,
            repo,
            release_name,
            zsync_filename_pattern,
        } => {
            println!("owner:     {owner}");
            println!("repo:      {repo}");
            println!("release:   {release_name}");
            println!("zsync:     {zsync_filename_pattern}");
        }
        UpdateInformation::BintrayZsync {
            owner,
            repo,
            package_name,
            zsync_filename_pattern,
        } => {
            println!("owner:     {owner}");
            println!("repo:      {repo}");
            println!("package:   {package_name}");
            println!("zsync:     {zsync_filename_pattern}");
        }
    }
    Ok(())
}
