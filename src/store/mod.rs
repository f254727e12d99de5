//! The pair snapshot store and its persistence seam.

pub mod backend;
pub mod memory;
pub mod pair_store;

pub use backend::{PairBackend, RawRecord, SnapshotListener, Subscription};
pub use memory::MemoryBackend;
pub use pair_store::{LiveHandle, PairStore, WatcherToken};
