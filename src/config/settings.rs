use serde::Deserialize;

use crate::hub::RetryPolicy;

/// Path of the subscription endpoint, advertised as the hub URL.
pub const SUBSCRIPTIONS_PATH: &str = "/messages/subscriptions/by_jurisdiction";

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub service: ServiceSettings,
    pub storage: StorageSettings,
    pub worker: WorkerSettings,
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub subscription: SubscriptionSettings,
    pub log: LogSettings,
}

/// Configuration settings for the HTTP API.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Identity of this channel and of its foreign counterpart.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServiceSettings {
    pub name: String,
    /// Jurisdiction code whose incoming messages are announced to subscribers.
    pub jurisdiction: String,
    /// Public base URL of this service, used to build the hub URL.
    pub service_url: String,
    pub foreign_endpoint_url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    pub path: String,
    /// Keep everything in process memory instead of opening `path`.
    pub in_memory: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WorkerSettings {
    pub poll_interval_ms: u64,
    pub visibility_timeout_secs: u64,
    /// Processors started per pipeline stage. Zero is treated as one.
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetrySettings {
    pub base_secs: u64,
    pub max_delay_secs: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SubscriptionSettings {
    /// Lease applied when a subscription request does not name one.
    pub default_lease_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
}

impl Settings {
    pub fn hub_url(&self) -> String {
        format!(
            "{}{SUBSCRIPTIONS_PATH}",
            self.service.service_url.trim_end_matches('/')
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_secs: self.retry.base_secs,
            max_delay_secs: self.retry.max_delay_secs,
            max_attempts: self.retry.max_attempts,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub service: Option<PartialServiceSettings>,
    pub storage: Option<PartialStorageSettings>,
    pub worker: Option<PartialWorkerSettings>,
    pub retry: Option<PartialRetrySettings>,
    pub http: Option<PartialHttpSettings>,
    pub subscription: Option<PartialSubscriptionSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServiceSettings {
    pub name: Option<String>,
    pub jurisdiction: Option<String>,
    pub service_url: Option<String>,
    pub foreign_endpoint_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialStorageSettings {
    pub path: Option<String>,
    pub in_memory: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialWorkerSettings {
    pub poll_interval_ms: Option<u64>,
    pub visibility_timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRetrySettings {
    pub base_secs: Option<u64>,
    pub max_delay_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialHttpSettings {
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialSubscriptionSettings {
    pub default_lease_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialServerSettings {
    pub fn merge(self, default: ServerSettings) -> ServerSettings {
        ServerSettings {
            host: self.host.unwrap_or(default.host),
            port: self.port.unwrap_or(default.port),
        }
    }
}

impl PartialServiceSettings {
    pub fn merge(self, default: ServiceSettings) -> ServiceSettings {
        ServiceSettings {
            name: self.name.unwrap_or(default.name),
            jurisdiction: self.jurisdiction.unwrap_or(default.jurisdiction),
            service_url: self.service_url.unwrap_or(default.service_url),
            foreign_endpoint_url: self
                .foreign_endpoint_url
                .unwrap_or(default.foreign_endpoint_url),
        }
    }
}

impl PartialStorageSettings {
    pub fn merge(self, default: StorageSettings) -> StorageSettings {
        StorageSettings {
            path: self.path.unwrap_or(default.path),
            in_memory: self.in_memory.unwrap_or(default.in_memory),
        }
    }
}

impl PartialWorkerSettings {
    pub fn merge(self, default: WorkerSettings) -> WorkerSettings {
        WorkerSettings {
            poll_interval_ms: self.poll_interval_ms.unwrap_or(default.poll_interval_ms),
            visibility_timeout_secs: self
                .visibility_timeout_secs
                .unwrap_or(default.visibility_timeout_secs),
            concurrency: self.concurrency.unwrap_or(default.concurrency),
        }
    }
}

impl PartialRetrySettings {
    pub fn merge(self, default: RetrySettings) -> RetrySettings {
        RetrySettings {
            base_secs: self.base_secs.unwrap_or(default.base_secs),
            max_delay_secs: self.max_delay_secs.unwrap_or(default.max_delay_secs),
            max_attempts: self.max_attempts.unwrap_or(default.max_attempts),
        }
    }
}

impl PartialHttpSettings {
    pub fn merge(self, default: HttpSettings) -> HttpSettings {
        HttpSettings {
            timeout_secs: self.timeout_secs.unwrap_or(default.timeout_secs),
        }
    }
}

impl PartialSubscriptionSettings {
    pub fn merge(self, default: SubscriptionSettings) -> SubscriptionSettings {
        SubscriptionSettings {
            default_lease_seconds: self
                .default_lease_seconds
                .unwrap_or(default.default_lease_seconds),
        }
    }
}

impl PartialLogSettings {
    pub fn merge(self, default: LogSettings) -> LogSettings {
        LogSettings {
            level: self.level.unwrap_or(default.level),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            service: ServiceSettings {
                name: "api-channel".to_string(),
                jurisdiction: "AU".to_string(),
                service_url: "http://api-channel".to_string(),
                foreign_endpoint_url: "http://foreign-api-channel/incoming/messages".to_string(),
            },
            storage: StorageSettings {
                path: "channelhub_db".to_string(),
                in_memory: false,
            },
            worker: WorkerSettings {
                poll_interval_ms: 1000,
                visibility_timeout_secs: 30,
                concurrency: 1,
            },
            retry: RetrySettings {
                base_secs: RetryPolicy::BASE_SECS,
                max_delay_secs: RetryPolicy::MAX_DELAY_SECS,
                max_attempts: RetryPolicy::MAX_ATTEMPTS,
            },
            http: HttpSettings { timeout_secs: 30 },
            subscription: SubscriptionSettings {
                default_lease_seconds: 432_000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
