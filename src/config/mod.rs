mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    HttpSettings, LogSettings, RetrySettings, SUBSCRIPTIONS_PATH, ServerSettings, ServiceSettings,
    Settings, StorageSettings, SubscriptionSettings, WorkerSettings,
};

/// Prefix of the environment variables read by `load_config`, e.g.
/// `CHANNELHUB__SERVICE__FOREIGN_ENDPOINT_URL`.
pub const ENV_PREFIX: &str = "CHANNELHUB";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct with every section filled in
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        server: partial.server.unwrap_or_default().merge(default.server),
        service: partial.service.unwrap_or_default().merge(default.service),
        storage: partial.storage.unwrap_or_default().merge(default.storage),
        worker: partial.worker.unwrap_or_default().merge(default.worker),
        retry: partial.retry.unwrap_or_default().merge(default.retry),
        http: partial.http.unwrap_or_default().merge(default.http),
        subscription: partial
            .subscription
            .unwrap_or_default()
            .merge(default.subscription),
        log: partial.log.unwrap_or_default().merge(default.log),
    })
}

#[cfg(test)]
mod tests;
