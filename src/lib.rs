pub mod config;
pub mod context;
pub mod error;
pub mod files;
pub mod license;
pub mod store;

pub use error::{Error, Result};
pub use license::license_file;
pub use license::license_validator::{verify, verify_signed};
pub use license::{canonicalize, LicenseClaims, LicenseDraft, SignedLicense, SigningAuthority};
pub use store::{LicenseId, LicenseRecord, LicenseStore};

/// Installs the stderr log subscriber. `verbose` is the number of `-v` flags.
pub fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();
}
