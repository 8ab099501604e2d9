//! Tracing bootstrap, following the host family's `logging::init_tracing()`
//! convention: `EnvFilter` from `RUST_LOG` (default `info`), JSON output
//! when `AIORG_LOG_FORMAT=json`, pretty output otherwise.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber. Safe to call once at process
/// startup; calling it twice in the same process (e.g. across tests) is
/// tolerated via `try_init`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("AIORG_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}
