//! Env-filter driven `tracing-subscriber` wiring for binaries embedding
//! `railyard` (spec §3.1). Kept deliberately thin: no exporter, no span
//! propagation, just the console subscriber the teacher's own
//! `tracing_setup.rs` built as the base layer underneath its OTel export.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Installs a process-global subscriber. Safe to call once per process;
/// a second call is a no-op that `tracing` itself swallows.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false);

    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}
