use std::fs;
use std::path::Path;
use std::thread;

use anyhow::Context;
use log::{debug, info};
use sha2::{Digest, Sha256};
use structopt::StructOpt;

use asphodel_flash::progress::{self, ProgressEvent, DEFAULT_PROGRESS_BOUND};
use asphodel_flash::sim::{Operation, SimulatedDevice};
use asphodel_flash::{already_programmed, ensure_supported, DeviceInfo, FirmwareImage, Orchestrator};

mod cli;

/// Reads and decodes the firmware file at `path`, returning the image and the raw file contents
fn read_firmware<P: AsRef<Path>>(path: P) -> Result<(FirmwareImage, Vec<u8>), anyhow::Error> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("Could not read firmware file '{}'", path.display()))?;
    let image = FirmwareImage::from_bytes(&bytes)
        .with_context(|| format!("Failed to decode firmware file '{}'", path.display()))?;

    Ok((image, bytes))
}

fn print_info<P: AsRef<Path>>(path: P) -> Result<(), anyhow::Error> {
    let (image, bytes) = read_firmware(&path)?;

    println!("File SHA-256: {}", hex::encode(Sha256::digest(&bytes)));
    println!("Chip: {}", image.chip);
    println!("Boards:");

    for (revision, board_name) in &image.board {
        println!("  {} rev {}", board_name, revision);
    }

    println!(
        "Build info: {}",
        image.build_info.as_deref().unwrap_or("<none>")
    );
    println!(
        "Build date: {}",
        image.build_date.as_deref().unwrap_or("<none>")
    );
    println!("Application: {}", image.is_application);
    println!("Bootloader: {}", image.is_bootloader);
    println!(
        "Pages: {} ({} bytes)",
        image.pages.len(),
        image.data_len()
    );

    for page in &image.pages {
        debug!(
            "Page {}: {} bytes, nonce {}, digest {}",
            page.page_number,
            page.data.len(),
            hex::encode(&page.nonce),
            hex::encode(&page.digest)
        );
    }

    Ok(())
}

fn check(opts: cli::CheckOpts) -> Result<(), anyhow::Error> {
    let (image, _) = read_firmware(&opts.filename)?;
    let device_info = DeviceInfo {
        chip_model: opts.chip,
        board_info: (opts.board, opts.revision),
        supports_bootloader: opts.bootloader,
        build_info: opts.build_info,
        build_date: opts.build_date,
    };

    ensure_supported(&image, &device_info)?;

    println!("Firmware supports the device");

    if already_programmed(&image, &device_info) {
        println!("Device is already running this firmware, no update needed");
    } else {
        println!("Device needs to be updated");
    }

    Ok(())
}

fn simulate(opts: cli::SimulateOpts) -> Result<(), anyhow::Error> {
    let (image, _) = read_firmware(&opts.filename)?;
    let orchestrator = Orchestrator::builder()
        .tries(opts.tries)
        .build()
        .with_context(|| "Invalid bootload options")?;

    let mut device = SimulatedDevice::new(opts.block_sizes.0);
    device.fail_next(Operation::ReconnectBootloader, opts.fail_reconnects);

    if opts.preloaded {
        device.preload(&image.pages);
    }

    let (progress, events) = progress::channel(DEFAULT_PROGRESS_BOUND);

    // Run the bootload on a worker thread while this thread reports progress
    let worker = thread::spawn(move || {
        let result = orchestrator.run(&mut device, &image, progress);

        (result, device)
    });

    let mut total = 0;

    for event in events {
        match event {
            ProgressEvent::Sizing(size) => total = size,
            ProgressEvent::Status(status) => info!("{}", status),
            ProgressEvent::Bytes(done) => debug!("{}/{}", done, total),
            ProgressEvent::Finished => info!("Finished"),
        }
    }

    let (result, device) = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Bootload worker thread panicked"))?;

    result.with_context(|| "Bootload failed")?;

    println!(
        "Bootload complete: {} blocks written, {} device calls",
        device.block_writes().len(),
        device.calls().len()
    );

    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    use cli::Command;

    // Create a logger with a timestamp, filtered through RUST_LOG
    pretty_env_logger::init_timed();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    match opts.command {
        Command::Info(cli::InfoOpts { filename }) => print_info(filename)?,
        Command::Check(opts) => check(opts)?,
        Command::Simulate(opts) => simulate(opts)?,
    }

    Ok(())
}
