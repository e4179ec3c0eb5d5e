use tracing_subscriber::EnvFilter;

const LOG_FORMAT_ENV: &str = "SMARD_LOG_FORMAT";

/// Install the global subscriber. Both crates log at `info`; `RUST_LOG` adds
/// directives for everything else. `SMARD_LOG_FORMAT=json` emits one JSON
/// object per line.
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("smard_bridge=info".parse().unwrap_or_else(|_| "info".parse().unwrap()))
        .add_directive("smard_client=info".parse().unwrap_or_else(|_| "info".parse().unwrap()));

    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
