//! The page oriented bootload engine
//!
//! `Orchestrator::run` is the entry point for a full firmware update. It moves the device into
//! its bootloader, writes and verifies every page of the image and starts the application
//! again, retrying transient device failures out of a single shared budget.

mod mode;
mod orchestrator;
mod page;
mod pass;
mod retry;

pub use mode::{force_application, force_bootloader};
pub use orchestrator::{BuilderError, Orchestrator, OrchestratorBuilder};
pub use page::write_page;
pub use pass::run_pass;
pub use retry::{CancelToken, RetryBudget};

/// The number of device failures tolerated over a whole bootload, unless configured otherwise
pub const DEFAULT_TRIES: u32 = 10;
