#![doc(test(attr(deny(warnings))))]

//! Pairtab offers the ledger core of a two-person shared-expense tracker:
//! the transaction model and classifiers, the balance reconciliation fold,
//! calendar period bucketing, and the pair snapshot store.

pub mod errors;
pub mod ledger;
pub mod store;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Pairtab tracing initialized.");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
    }
}
