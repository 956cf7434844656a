//! Co-signing engine: a cursor-driven poller feeding a per-output
//! co-signing state machine.

pub mod cosign;
pub mod cursor;
pub mod poller;

#[cfg(test)]
mod testing;

pub use cosign::{is_fully_signed, should_sign, CosignError, CosignOutcome, Cosigner};
pub use cursor::PollCursor;
pub use poller::{BatchReport, OutputDisposition, Poller, PollerConfig};
