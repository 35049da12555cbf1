use rust_decimal::Decimal;
use serde_json::{Value as JsonValue, json};

use flowpay_core::AccountId;
use flowpay_infra::config::{AppConfig, StorageConfig};
use flowpay_infra::event_bus::NotificationBus;
use flowpay_infra::store::PostgresLedgerStore;
use flowpay_ledger::{
    Account, CreateTransaction, InMemoryLedgerStore, LedgerError, LedgerFacade, LedgerStore,
    NewAccount, PostedTransaction, StoreError,
};

#[cfg(feature = "redis")]
use flowpay_infra::event_bus::{RedisStreamsError, RedisStreamsEventBus};

pub type InMemoryLedger = LedgerFacade<InMemoryLedgerStore, NotificationBus>;
pub type PostgresLedger = LedgerFacade<PostgresLedgerStore, NotificationBus>;

/// Startup failures while wiring storage and the notification sink.
#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error("ledger store unavailable: {0}")]
    Store(#[from] StoreError),

    #[cfg(feature = "redis")]
    #[error("notification sink unavailable: {0}")]
    Redis(#[from] RedisStreamsError),
}

/// Result of a storage liveness probe.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub up: bool,
    pub body: JsonValue,
}

/// Ledger wiring selected at startup.
pub enum AppServices {
    InMemory { ledger: InMemoryLedger },
    Persistent { ledger: PostgresLedger },
}

impl AppServices {
    /// In-process store and bus (dev/test).
    pub fn in_memory(topic: impl Into<String>) -> Self {
        AppServices::InMemory {
            ledger: LedgerFacade::new(InMemoryLedgerStore::new(), NotificationBus::in_memory())
                .with_topic(topic),
        }
    }

    pub fn storage_label(&self) -> &'static str {
        match self {
            AppServices::InMemory { .. } => "memory",
            AppServices::Persistent { .. } => "postgres",
        }
    }

    pub fn bus(&self) -> &NotificationBus {
        match self {
            AppServices::InMemory { ledger } => ledger.bus(),
            AppServices::Persistent { ledger } => ledger.bus(),
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            AppServices::InMemory { ledger } => ledger.topic(),
            AppServices::Persistent { ledger } => ledger.topic(),
        }
    }

    pub async fn create_account(&self, new_account: NewAccount) -> Result<Account, LedgerError> {
        match self {
            AppServices::InMemory { ledger } => ledger.create_account(new_account).await,
            AppServices::Persistent { ledger } => ledger.create_account(new_account).await,
        }
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        match self {
            AppServices::InMemory { ledger } => ledger.get_account(account_id).await,
            AppServices::Persistent { ledger } => ledger.get_account(account_id).await,
        }
    }

    pub async fn get_balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        match self {
            AppServices::InMemory { ledger } => ledger.get_balance(account_id).await,
            AppServices::Persistent { ledger } => ledger.get_balance(account_id).await,
        }
    }

    pub async fn create_transaction(
        &self,
        request: CreateTransaction,
    ) -> Result<PostedTransaction, LedgerError> {
        match self {
            AppServices::InMemory { ledger } => ledger.create_transaction(request).await,
            AppServices::Persistent { ledger } => ledger.create_transaction(request).await,
        }
    }

    /// Probe the store. The Postgres variant also reports pool gauges.
    pub async fn health(&self) -> HealthReport {
        let (probe, mut body) = match self {
            AppServices::InMemory { ledger } => (ledger.store().ping().await, json!({})),
            AppServices::Persistent { ledger } => {
                let stats = ledger.store().pool_stats();
                (
                    ledger.store().ping().await,
                    json!({
                        "open_connections": stats.size,
                        "idle": stats.idle,
                        "in_use": (stats.size as usize).saturating_sub(stats.idle),
                    }),
                )
            }
        };

        body["storage"] = json!(self.storage_label());
        body["notifications"] = json!(self.bus().label());

        match probe {
            Ok(()) => {
                body["status"] = json!("up");
                HealthReport { up: true, body }
            }
            Err(e) => {
                tracing::warn!(error = %e, "health probe failed");
                body["status"] = json!("down");
                body["error"] = json!(e.to_string());
                HealthReport { up: false, body }
            }
        }
    }

    /// Close pooled connections (Postgres only).
    pub async fn close(&self) {
        if let AppServices::Persistent { ledger } = self {
            ledger.store().close().await;
        }
    }
}

/// Wire storage and notifications from configuration.
///
/// Postgres is connected and its schema bootstrapped before this returns, so
/// a bad `DATABASE_URL` fails startup instead of the first request.
pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServicesError> {
    let bus = build_bus(config)?;

    match &config.storage {
        StorageConfig::Memory => {
            tracing::info!(notifications = bus.label(), "using in-memory ledger store");
            Ok(AppServices::InMemory {
                ledger: LedgerFacade::new(InMemoryLedgerStore::new(), bus)
                    .with_topic(config.events_topic.clone()),
            })
        }
        StorageConfig::Postgres {
            database_url,
            max_connections,
        } => {
            let store = PostgresLedgerStore::connect(database_url, *max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!(
                max_connections,
                notifications = bus.label(),
                "using postgres ledger store"
            );
            Ok(AppServices::Persistent {
                ledger: LedgerFacade::new(store, bus).with_topic(config.events_topic.clone()),
            })
        }
    }
}

fn build_bus(config: &AppConfig) -> Result<NotificationBus, ServicesError> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        return Ok(NotificationBus::in_memory());
    };

    #[cfg(feature = "redis")]
    {
        let bus = RedisStreamsEventBus::new(redis_url, config.events_topic.clone())?;
        bus.ping()?;
        tracing::info!(stream = %config.events_topic, "publishing commits to redis streams");
        Ok(NotificationBus::Redis(std::sync::Arc::new(bus)))
    }

    #[cfg(not(feature = "redis"))]
    {
        tracing::warn!(
            redis_url,
            "REDIS_URL set but redis feature not enabled, falling back to in-memory notifications"
        );
        Ok(NotificationBus::in_memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_health_is_up() {
        let services = AppServices::in_memory("payments");
        let report = services.health().await;

        assert!(report.up);
        assert_eq!(report.body["status"], "up");
        assert_eq!(report.body["storage"], "memory");
        assert_eq!(services.topic(), "payments");
    }

    #[tokio::test]
    async fn memory_config_builds_in_memory_services() {
        let services = build_services(&AppConfig::default()).await.unwrap();
        assert_eq!(services.storage_label(), "memory");
        assert_eq!(services.bus().label(), "in-memory");
    }
}
