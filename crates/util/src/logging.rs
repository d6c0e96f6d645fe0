// SPDX-License-Identifier: PolyForm-Shield-1.0

use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "info";

/// install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise everything logs at `info`. output goes
/// to stderr so stdout stays free for the JSON record.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_DIRECTIVE);
}

/// like [`init_tracing`] but with a caller-chosen fallback directive,
/// e.g. `"debug"` for a `--verbose` flag.
pub fn init_tracing_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // a second init (tests, embedding) is not an error worth surfacing.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
