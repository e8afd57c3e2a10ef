use std::collections::BTreeSet;
use std::convert::TryFrom;

use log::trace;

use crate::device::Device;
use crate::progress::Progress;
use crate::Error;

/// Writes `data` to the page currently armed on the device, split into code blocks.
///
/// Every block is the largest supported size that still fits in what remains of the page, so a
/// page that no block size divides evenly ends in a smaller, irregular block. After each block
/// the absolute progress `bytes_done + offset` is reported.
///
/// The first device error is returned as is; nothing is retried here.
pub fn write_page<D: Device + ?Sized>(
    device: &mut D,
    bytes_done: u64,
    data: &[u8],
    block_sizes: &BTreeSet<u32>,
    progress: &Progress,
) -> Result<(), Error> {
    let mut offset = 0usize;
    let mut remaining = data.len();

    while remaining > 0 {
        let block_size = largest_fitting(block_sizes, remaining)
            .ok_or(Error::NoFittingBlockSize { remaining })?;

        trace!("Writing {} byte block at offset {}", block_size, offset);

        device.write_bootloader_code_block(&data[offset..offset + block_size])?;

        offset += block_size;
        remaining -= block_size;

        progress.bytes(bytes_done + offset as u64);
    }

    Ok(())
}

/// The largest block size not exceeding `remaining`
fn largest_fitting(block_sizes: &BTreeSet<u32>, remaining: usize) -> Option<usize> {
    let limit = u32::try_from(remaining).unwrap_or(u32::MAX);

    block_sizes
        .range(1..=limit)
        .next_back()
        .map(|size| *size as usize)
}
