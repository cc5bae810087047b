//! Shared test harness: in-memory database with the real migrations and
//! a scripted provider gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use mockall::mock;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use settla_core::provider::{
    AccountBalance, ProviderError, ProviderGateway, ProviderReceipt, TransferRequest,
};
use settla_db::migration::{Migrator, MigratorTrait};
use settla_shared::config::SettlementConfig;

pub async fn setup() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options.max_connections(1);
    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

mock! {
    pub Gateway {}

    #[async_trait]
    impl ProviderGateway for Gateway {
        async fn transfer(
            &self,
            request: &TransferRequest,
        ) -> Result<ProviderReceipt, ProviderError>;
        async fn query_transfer(&self, reference: &str) -> Result<ProviderReceipt, ProviderError>;
        async fn account_balance(&self, account_no: &str) -> Result<AccountBalance, ProviderError>;
    }
}

/// Settlement config with a generous refund timeout: nothing times out
/// during a test unless asked to.
pub fn config() -> SettlementConfig {
    SettlementConfig {
        refund_timeout_secs: 3600,
        poll_interval_secs: 1,
        dispatch_interval_secs: 1,
        batch_size: 10,
        stale_after_secs: 3600,
        claim_visibility_secs: 300,
        idempotency_ttl_secs: 3600,
        sweep_interval_secs: 3600,
    }
}

/// Settlement config whose refund timeout has already elapsed for any
/// record created before the cycle runs.
pub fn instant_timeout_config() -> SettlementConfig {
    SettlementConfig {
        refund_timeout_secs: 0,
        ..config()
    }
}

pub fn receipt(status: &str, txn_id: Option<&str>) -> ProviderReceipt {
    ProviderReceipt {
        status: status.to_string(),
        txn_id: txn_id.map(String::from),
        session_id: Some("SES1".to_string()),
    }
}
