// Tracing setup
//
// RUST_LOG overrides the default filter.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FILTER: &str = "lyricdeck=info,lyricdeck_lib=info,tower_http=warn,reqwest=warn";

pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("lyricdeck=debug,lyricdeck_lib=debug,tower_http=debug,reqwest=info")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    });

    // try_init: a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
