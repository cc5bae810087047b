//! HTTP provider gateway and the breaker-guarded wrapper.

use std::time::Duration;

use async_trait::async_trait;
use settla_shared::config::ProviderConfig;

use super::breaker::{BreakerConfig, CircuitBreaker};
use super::{AccountBalance, ProviderError, ProviderGateway, ProviderReceipt, TransferRequest};

/// Provider gateway over HTTP.
///
/// Every request carries a bounded timeout; callers must never hold a
/// store transaction open across these calls.
#[derive(Debug, Clone)]
pub struct HttpProviderGateway {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProviderGateway {
    /// Builds the gateway from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| ProviderError::Http(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn map_transport_error(err: &reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(err.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16().to_string();
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(ProviderError::Http(format!("{code}: {message}")))
        } else {
            Err(ProviderError::Api { code, message })
        }
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn transfer(&self, request: &TransferRequest) -> Result<ProviderReceipt, ProviderError> {
        let url = format!("{}/v1/transfers", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| Self::map_transport_error(&err))?;

        Self::check_status(response)
            .await?
            .json::<ProviderReceipt>()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))
    }

    async fn query_transfer(&self, reference: &str) -> Result<ProviderReceipt, ProviderError> {
        let url = format!("{}/v1/transfers/{reference}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| Self::map_transport_error(&err))?;

        Self::check_status(response)
            .await?
            .json::<ProviderReceipt>()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))
    }

    async fn account_balance(&self, account_no: &str) -> Result<AccountBalance, ProviderError> {
        let url = format!("{}/v1/accounts/{account_no}/balance", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| Self::map_transport_error(&err))?;

        Self::check_status(response)
            .await?
            .json::<AccountBalance>()
            .await
            .map_err(|err| ProviderError::InvalidResponse(err.to_string()))
    }
}

/// Wraps any gateway with a circuit breaker.
///
/// Transport failures (timeouts, network errors, unparseable responses)
/// count against the breaker; provider-level rejections do not — the
/// provider answered, so the dependency is alive.
#[derive(Debug)]
pub struct GuardedGateway<G> {
    inner: G,
    breaker: CircuitBreaker,
}

impl<G: ProviderGateway> GuardedGateway<G> {
    /// Wraps a gateway with a breaker built from provider configuration.
    #[must_use]
    pub fn new(inner: G, config: &ProviderConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(BreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                window: Duration::from_secs(config.breaker_window_secs),
                reset_timeout: Duration::from_secs(config.breaker_reset_secs),
            }),
        }
    }

    /// Wraps a gateway with an explicit breaker configuration.
    #[must_use]
    pub fn with_breaker(inner: G, config: BreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
        }
    }

    /// The breaker, for metrics/state inspection.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn record<T>(&self, result: &Result<T, ProviderError>) {
        match result {
            Ok(_) | Err(ProviderError::Api { .. }) => self.breaker.record_success(),
            Err(
                ProviderError::Http(_) | ProviderError::Timeout | ProviderError::InvalidResponse(_),
            ) => self.breaker.record_failure(),
            Err(ProviderError::CircuitOpen) => {}
        }
    }
}

#[async_trait]
impl<G: ProviderGateway> ProviderGateway for GuardedGateway<G> {
    async fn transfer(&self, request: &TransferRequest) -> Result<ProviderReceipt, ProviderError> {
        self.breaker.try_acquire()?;
        let result = self.inner.transfer(request).await;
        self.record(&result);
        result
    }

    async fn query_transfer(&self, reference: &str) -> Result<ProviderReceipt, ProviderError> {
        self.breaker.try_acquire()?;
        let result = self.inner.query_transfer(reference).await;
        self.record(&result);
        result
    }

    async fn account_balance(&self, account_no: &str) -> Result<AccountBalance, ProviderError> {
        self.breaker.try_acquire()?;
        let result = self.inner.account_balance(account_no).await;
        self.record(&result);
        result
    }
}
