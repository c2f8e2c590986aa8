//! Observability and telemetry.

mod logging;

pub use logging::{NOISY_CRATES, init_logging};
