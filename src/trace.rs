/// Initializes the global tracing subscriber from `RUST_LOG`, defaulting to
/// `info`. Unlike the ad-hoc tree-printing subscriber this crate's teacher
/// used for its own CLI output, this is a plain `tracing-subscriber` fmt
/// layer: this crate runs as a long-lived service, not an interactive shell.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
