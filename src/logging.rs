use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber used by every binary.
///
/// Filtering follows `RUST_LOG`; without it the progress lines at `info` are shown.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Tests may drive several entry points in one process; only the first init wins.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
