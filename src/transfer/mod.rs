//! Transfer orchestration: one item at a time, or a whole list.

pub mod batch;
pub mod delay;
pub mod pipeline;
pub mod progress;

pub use batch::{load_batch_input, run_batch, BatchFailure, BatchOptions, BatchResult, SourceItem};
pub use delay::DelayRange;
pub use pipeline::{
    compose_description, compose_title, ItemTransfer, TransferOutcome, TransferPipeline,
    TransferRequest,
};
pub use progress::{Progress, ProgressSink};
