//! Bulk export: streaming, sinks, rollover and progress

mod delimited;
pub mod error;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod sink;
mod spreadsheet;

pub use error::{ExportError, SinkError};
pub use pipeline::{ExportJob, ExportSummary, ExportedFile, run_export};
pub use progress::{ChannelObserver, ExportEvent, ProgressObserver};
pub use sink::{OutputSink, SinkStrategy};
