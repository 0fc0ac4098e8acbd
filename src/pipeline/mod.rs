//! Pipeline entry points for synchronization runs.
//!
//! - `run_sync`: Authenticate, fetch the catalog, resolve and persist stops
//! - `interrupt_flag`: Ctrl-C observation for cooperative cancellation

pub mod sync;

pub use sync::{SyncOutcome, interrupt_flag, run_sync, sync_catalog};
