//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win: defaults, then the config file, then the environment.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 2050)?
        .set_default("server.bulk_port", 2051)?
        .set_default("storage.snapshot_path", "persist/snapshot.json")?
        .set_default("storage.blob_dir", "storage")?
        .set_default("storage.persist_interval_ms", 1000)?
        .set_default("lock.host", "127.0.0.1")?
        .set_default("lock.port", 2181)?
        .set_default("lock.lease_ttl_ms", 10_000)?
        .set_default("lock.reap_interval_ms", 500)?
        .set_default("lock.embedded", true)
}
