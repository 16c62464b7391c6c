//! Tracing setup. Logs go to stderr so stdout stays free for reports.
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive for the given verbosity flags.
pub fn default_directive(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Initialize the global subscriber; `RUST_LOG` overrides the flags.
pub fn init_logging(quiet: bool, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(default_directive(quiet, verbose));
        // Reduce noise from the HTTP stack
        for directive in ["ureq=warn", "ureq_proto=warn", "rustls=warn"] {
            if let Ok(directive) = directive.parse::<Directive>() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    });

    let fmt_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    // try_init: a subscriber may already be installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
