//! An in-memory bootloader device
//!
//! `SimulatedDevice` implements `Device` without any hardware behind it. It keeps the digest of
//! every finished page, records all block writes and can be told to fail specific operations,
//! which makes it useful for exercising the bootload engine and for dry runs from the command
//! line.
//!
//! A reconnect always lands in the requested mode unless a failure has been injected for it.

use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::device::{Device, DeviceError, ErrorCode, Mode, VerifyOutcome};
use crate::firmware::Page;

/// The device primitives, used for failure injection and call counting
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Operation {
    BootloaderJump,
    BootloaderStartProgram,
    ReconnectBootloader,
    ReconnectApplication,
    GetBootloaderInfo,
    GetBlockSizes,
    StartPage,
    WriteBlock,
    FinishPage,
    VerifyPage,
}

/// A code block as received by the simulated bootloader
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BlockWrite {
    pub page_number: u32,
    pub len: usize,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredPage {
    data: Vec<u8>,
    digest: Vec<u8>,
}

#[derive(Debug)]
pub struct SimulatedDevice {
    mode: Mode,
    block_sizes: Vec<u32>,
    /// The page armed by the last `start_bootloader_page`, if any
    armed: Option<u32>,
    pending: Vec<u8>,
    flash: HashMap<u32, StoredPage>,
    corrupt: Vec<u32>,
    failures: HashMap<Operation, VecDeque<DeviceError>>,
    calls: Vec<Operation>,
    block_writes: Vec<BlockWrite>,
    finished: Vec<u32>,
}

impl SimulatedDevice {
    /// Creates a device running its application, with a bootloader that accepts `block_sizes`
    pub fn new(block_sizes: Vec<u32>) -> SimulatedDevice {
        SimulatedDevice {
            mode: Mode::Application,
            block_sizes,
            armed: None,
            pending: Vec::new(),
            flash: HashMap::new(),
            corrupt: Vec::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            block_writes: Vec::new(),
            finished: Vec::new(),
        }
    }

    /// Marks `page` as already holding its target contents
    pub fn preload_page(&mut self, page: &Page) {
        self.flash.insert(
            page.page_number,
            StoredPage {
                data: page.data.clone(),
                digest: page.digest.clone(),
            },
        );
    }

    pub fn preload<'a, I: IntoIterator<Item = &'a Page>>(&mut self, pages: I) {
        for page in pages {
            self.preload_page(page);
        }
    }

    /// Makes every write of `page_number` end up with the wrong contents
    pub fn corrupt_page(&mut self, page_number: u32) {
        self.corrupt.push(page_number);
    }

    /// Makes the next `count` calls of `operation` fail with a timeout
    pub fn fail_next(&mut self, operation: Operation, count: usize) {
        for _ in 0..count {
            self.fail_next_with(operation, DeviceError::Timeout);
        }
    }

    /// Queues a single failure with `err` for the next call of `operation`
    pub fn fail_next_with(&mut self, operation: Operation, err: DeviceError) {
        self.failures
            .entry(operation)
            .or_insert_with(VecDeque::new)
            .push_back(err);
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Every operation called so far, including the failed ones
    pub fn calls(&self) -> &[Operation] {
        &self.calls
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls.iter().filter(|op| **op == operation).count()
    }

    pub fn block_writes(&self) -> &[BlockWrite] {
        &self.block_writes
    }

    /// Page numbers in the order they were successfully finished
    pub fn finished_pages(&self) -> Vec<u32> {
        self.finished.clone()
    }

    /// Contents of a stored page
    pub fn page_data(&self, page_number: u32) -> Option<&[u8]> {
        self.flash.get(&page_number).map(|page| &page.data[..])
    }

    /// Data received for the armed page that has not been finished yet
    pub fn pending_data(&self) -> &[u8] {
        &self.pending
    }

    /// Forgets recorded calls and writes, keeping the flash contents
    pub fn clear_log(&mut self) {
        self.calls.clear();
        self.block_writes.clear();
        self.finished.clear();
    }

    fn call(&mut self, operation: Operation) -> Result<(), DeviceError> {
        self.calls.push(operation);

        if let Some(err) = self
            .failures
            .get_mut(&operation)
            .and_then(|queue| queue.pop_front())
        {
            trace!("Injecting {:?} into {:?}", err, operation);
            return Err(err);
        }

        Ok(())
    }

    fn require_bootloader(&self) -> Result<(), DeviceError> {
        if self.mode != Mode::Bootloader {
            return Err(DeviceError::Command(ErrorCode::UnimplementedCommand));
        }

        Ok(())
    }

    fn armed_page(&self) -> Result<u32, DeviceError> {
        self.armed.ok_or(DeviceError::Command(ErrorCode::BadState))
    }
}

impl Device for SimulatedDevice {
    fn supports_bootloader_commands(&self) -> bool {
        self.mode == Mode::Bootloader
    }

    fn bootloader_jump(&mut self) -> Result<(), DeviceError> {
        self.call(Operation::BootloaderJump)?;
        self.mode = Mode::Bootloader;
        self.armed = None;

        Ok(())
    }

    fn bootloader_start_program(&mut self) -> Result<(), DeviceError> {
        self.call(Operation::BootloaderStartProgram)?;
        self.require_bootloader()?;
        self.mode = Mode::Application;
        self.armed = None;

        Ok(())
    }

    fn reconnect(&mut self, mode: Mode) -> Result<(), DeviceError> {
        self.call(match mode {
            Mode::Bootloader => Operation::ReconnectBootloader,
            Mode::Application => Operation::ReconnectApplication,
        })?;
        self.mode = mode;
        self.armed = None;

        Ok(())
    }

    fn get_bootloader_info(&mut self) -> Result<String, DeviceError> {
        self.call(Operation::GetBootloaderInfo)?;
        self.require_bootloader()?;

        Ok("Simulated AES".to_string())
    }

    fn get_bootloader_block_sizes(&mut self) -> Result<Vec<u32>, DeviceError> {
        self.call(Operation::GetBlockSizes)?;
        self.require_bootloader()?;

        Ok(self.block_sizes.clone())
    }

    fn start_bootloader_page(&mut self, page_number: u32, _nonce: &[u8]) -> Result<(), DeviceError> {
        self.call(Operation::StartPage)?;
        self.require_bootloader()?;
        self.armed = Some(page_number);
        self.pending.clear();

        Ok(())
    }

    fn write_bootloader_code_block(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        self.call(Operation::WriteBlock)?;
        self.require_bootloader()?;

        let page_number = self.armed_page()?;

        if !self.block_sizes.contains(&(data.len() as u32)) {
            return Err(DeviceError::Command(ErrorCode::BadCommandLength));
        }

        self.pending.extend_from_slice(data);
        self.block_writes.push(BlockWrite {
            page_number,
            len: data.len(),
            data: data.to_vec(),
        });

        Ok(())
    }

    fn finish_bootloader_page(&mut self, digest: &[u8]) -> Result<(), DeviceError> {
        self.call(Operation::FinishPage)?;
        self.require_bootloader()?;

        let page_number = self.armed_page()?;
        let mut data = std::mem::replace(&mut self.pending, Vec::new());
        let mut digest = digest.to_vec();

        // The stored digest stands in for what the device computes over the received data
        if self.corrupt.contains(&page_number) {
            data.iter_mut().for_each(|byte| *byte ^= 0xff);
            digest.iter_mut().for_each(|byte| *byte ^= 0xff);
        }

        self.flash.insert(page_number, StoredPage { data, digest });
        self.finished.push(page_number);
        self.armed = None;

        Ok(())
    }

    fn verify_bootloader_page(&mut self, digest: &[u8]) -> Result<VerifyOutcome, DeviceError> {
        self.call(Operation::VerifyPage)?;
        self.require_bootloader()?;

        let page_number = self.armed_page()?;
        self.armed = None;

        let result = match self.flash.get(&page_number) {
            Some(page) if page.digest == digest => Ok(()),
            _ => Err(DeviceError::Command(ErrorCode::InvalidData)),
        };

        VerifyOutcome::from_command_result(result)
    }
}
