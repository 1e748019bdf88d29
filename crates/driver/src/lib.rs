//! Transferscope driver crate root: creation-block discovery, historical
//! backfill and live tailing over one shared store.

pub mod backfill;
pub mod creation;
pub mod driver;
pub mod event;
pub mod tailer;

pub use backfill::BackfillEngine;
pub use creation::{CreationError, CreationLocator};
pub use driver::Driver;
pub use event::decode_transfer;
pub use tailer::{EventSink, LiveTailer};
