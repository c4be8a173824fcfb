use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use edufs::DEFAULT_GROUPS;

#[derive(Parser)]
#[command(version, about = "Build and inspect EDUFS images")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a fresh volume in an image file
    Format(FormatArgs),

    /// Copy every regular file of a host directory into the root directory
    Pack {
        #[command(flatten)]
        image: ImageArgs,

        /// Host directory to copy from
        source: PathBuf,
    },

    /// List a directory
    Ls {
        #[command(flatten)]
        image: ImageArgs,

        #[arg(default_value = "/")]
        path: String,
    },

    /// Print the superblock, the cylinder groups and usage
    Info {
        #[command(flatten)]
        image: ImageArgs,
    },
}

#[derive(Args)]
pub struct ImageArgs {
    /// Image file
    pub image: PathBuf,

    /// Sector size of the device holding the image
    #[arg(long, default_value_t = 512)]
    pub sector_size: u32,
}

#[derive(Args)]
pub struct FormatArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Volume size in MiB
    #[arg(long, short, default_value_t = 64)]
    pub size_mib: u64,

    /// Initial number of cylinder groups
    #[arg(long, short, default_value_t = DEFAULT_GROUPS)]
    pub groups: u32,

    #[arg(long, default_value_t = 32)]
    pub sectors_per_track: u32,

    #[arg(long, default_value_t = 16)]
    pub heads: u32,

    #[arg(long, short = 'L', default_value = "")]
    pub volume_name: String,

    /// Print the layout without writing anything
    #[arg(short = 'N')]
    pub dry_run: bool,

    /// Dump the superblock and every cylinder group header
    #[arg(long, short)]
    pub verbose: bool,
}
