use std::collections::BTreeSet;

use log::{debug, info};

use super::page::write_page;
use super::retry::CancelToken;
use crate::device::{Device, VerifyOutcome};
use crate::firmware::FirmwareImage;
use crate::progress::Progress;
use crate::Error;

/// Runs one complete write and verify cycle over every page of `image`.
///
/// The device must already be connected in bootloader mode. Pages are visited in image order.
/// Each page is first checked against its digest and only written if it differs, so running a
/// pass again after an interrupted one only rewrites what is missing. Once every page has been
/// handled, all of them are verified again; a page that still differs at that point is a
/// `Error::VerificationMismatch`.
///
/// Progress counts restart from zero on every pass. The verify phase advances the counter by
/// `verify_size` per page.
pub fn run_pass<D: Device + ?Sized>(
    device: &mut D,
    image: &FirmwareImage,
    block_sizes: &BTreeSet<u32>,
    verify_size: u64,
    progress: &Progress,
    cancel: &CancelToken,
) -> Result<(), Error> {
    let mut done_bytes = 0u64;
    let mut rewritten = 0usize;

    for page in &image.pages {
        cancel.check()?;

        progress.status(format!("Writing Page {}", page.page_number));

        device.start_bootloader_page(page.page_number, &page.nonce)?;

        match device.verify_bootloader_page(&page.digest)? {
            VerifyOutcome::Matches => {
                debug!("Page {} already matches, skipping", page.page_number);
            }
            VerifyOutcome::Differs => {
                debug!("Page {} differs, writing {} bytes", page.page_number, page.data.len());

                // The verify consumed the armed page
                device.start_bootloader_page(page.page_number, &page.nonce)?;
                write_page(device, done_bytes, &page.data, block_sizes, progress)?;
                device.finish_bootloader_page(&page.digest)?;

                rewritten += 1;
            }
        }

        done_bytes += page.data.len() as u64;
        progress.bytes(done_bytes);
    }

    info!(
        "Wrote {} of {} pages, verifying",
        rewritten,
        image.pages.len()
    );

    for page in &image.pages {
        cancel.check()?;

        progress.status(format!("Verifying Page {}", page.page_number));

        device.start_bootloader_page(page.page_number, &page.nonce)?;

        if device.verify_bootloader_page(&page.digest)? == VerifyOutcome::Differs {
            return Err(Error::VerificationMismatch {
                page: page.page_number,
            });
        }

        done_bytes += verify_size;
        progress.bytes(done_bytes);
    }

    Ok(())
}
