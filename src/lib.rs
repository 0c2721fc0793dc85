pub mod config;
pub mod context;
pub mod crew;
pub mod domains;
pub mod error;
pub mod extract;
pub mod google;
pub mod interfaces;
pub mod logging;
pub mod mail;
pub mod providers;
pub mod services;
pub mod session_log;
pub mod tools;

pub type Result<T> = std::result::Result<T, error::CrewError>;

/// Version string recorded in session metadata.
pub fn build_version() -> String {
    format!(
        "{}+{}",
        env!("CARGO_PKG_VERSION"),
        env!("RESTAURANT_CREW_GIT_SHA")
    )
}
