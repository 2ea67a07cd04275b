//! railyard — distributed end-to-end test orchestration engine.
//!
//! This is the umbrella crate: it owns the enumerated configuration of
//! spec §6 and wires every component crate (transport, supervisor,
//! FS-Store, worker pool, controller, browser-proxy) into a single
//! [`Railyard`] instance with one entry point, [`Railyard::run_queue`].
//!
//! ```ignore
//! let railyard = Railyard::new(config, backend, logger, clock, None).await;
//! let outcome = railyard.run_queue(entries).await;
//! ```

pub mod config;
pub mod discovery;
pub mod wiring;

pub use config::{ConfigError, DebugConfig, FsStoreConfig, PoolConfig, RailyardConfig, RetryConfig, TimeoutsConfig};
pub use discovery::{load_test_entries, load_test_entry, StdFileReader};
pub use wiring::{Railyard, WorkerBackend};
