use tracing_subscriber::EnvFilter;

/// Console diagnostics. The per-run log files are owned by `session_log`.
pub fn init_tracing(component: &str) {
    let default_filter = format!("info,restaurant_crew=debug,{component}=debug");

    let filter = std::env::var("RESTAURANT_CREW_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
