use std::num::ParseIntError;
use std::path::PathBuf;

use structopt::StructOpt;

/// Parses a comma separated list of block sizes, e.g. "64,32,16"
fn parse_block_sizes(value: &str) -> Result<BlockSizes, ParseIntError> {
    value
        .split(',')
        .map(|size| size.trim().parse::<u32>())
        .collect::<Result<Vec<u32>, _>>()
        .map(BlockSizes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSizes(pub Vec<u32>);

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Decode a firmware file and print what it contains
    Info(InfoOpts),
    /// Check whether a firmware file is meant for a device
    Check(CheckOpts),
    /// Bootload a firmware file into a simulated device
    Simulate(SimulateOpts),
}

#[derive(StructOpt, Debug)]
pub struct InfoOpts {
    /// The firmware filename
    #[structopt(parse(from_os_str))]
    pub filename: PathBuf,
}

#[derive(StructOpt, Debug)]
pub struct CheckOpts {
    /// The firmware filename
    #[structopt(parse(from_os_str))]
    pub filename: PathBuf,
    /// Chip model reported by the device
    #[structopt(long)]
    pub chip: String,
    /// Board name reported by the device
    #[structopt(long)]
    pub board: String,
    /// Board revision reported by the device
    #[structopt(long = "rev")]
    pub revision: u32,
    /// Build info string reported by the device
    #[structopt(long)]
    pub build_info: Option<String>,
    /// Build date string reported by the device
    #[structopt(long)]
    pub build_date: Option<String>,
    /// The device is currently running its bootloader
    #[structopt(long)]
    pub bootloader: bool,
}

#[derive(StructOpt, Debug)]
pub struct SimulateOpts {
    /// The firmware filename
    #[structopt(parse(from_os_str))]
    pub filename: PathBuf,
    /// Code block sizes accepted by the simulated bootloader
    #[structopt(
        env = "ASPHODEL_BLOCK_SIZES",
        long = "block-sizes",
        default_value = "64,16",
        parse(try_from_str = parse_block_sizes)
    )]
    pub block_sizes: BlockSizes,
    /// Number of device failures tolerated over the whole bootload
    #[structopt(env = "ASPHODEL_TRIES", short = "t", long = "tries", default_value = "10")]
    pub tries: u32,
    /// Make this many bootloader reconnects fail
    #[structopt(long = "fail-reconnects", default_value = "0")]
    pub fail_reconnects: usize,
    /// Start with every page already programmed
    #[structopt(long)]
    pub preloaded: bool,
}

#[derive(StructOpt, Debug)]
#[structopt(name = "asphodel-flash")]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,
}
