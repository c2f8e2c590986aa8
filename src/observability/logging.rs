//! Structured logging.

use tracing_subscriber::EnvFilter;

/// Crates whose chatter is pinned to `warn` unless `RUST_LOG` says
/// otherwise. The AWS SDK and its HTTP stack log every request at
/// `debug`, which drowns cycle output.
pub const NOISY_CRATES: [&str; 6] = [
    "aws_config",
    "aws_smithy_runtime",
    "aws_sdk_s3",
    "hyper",
    "hyper_util",
    "h2",
];

/// Initializes the global tracing subscriber.
///
/// The default level is `info`, or `debug` with `--verbose`; the
/// `RUST_LOG` environment variable overrides both. Calling this more than
/// once is harmless (subsequent calls are no-ops).
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    for noisy in NOISY_CRATES {
        if let Ok(directive) = format!("{noisy}=warn").parse() {
            filter = filter.add_directive(directive);
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
