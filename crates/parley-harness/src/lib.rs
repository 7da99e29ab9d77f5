//! Parley Harness
//!
//! Test support shared by the runtime's unit and integration tests: a
//! deterministic mock transport and a tracing setup that writes through the
//! test harness' captured output.

pub mod mock_transport;

pub use mock_transport::{MockBehavior, MockTransport, MockTransportProvider, TransportProbe};

/// Install a `tracing` subscriber writing to the test output
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
