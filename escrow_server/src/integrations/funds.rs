//! Clients for the external funds-movement service, which refunds buyers and pays sellers.
use std::sync::Arc;

use escrow_engine::traits::{FundsError, FundsGateway, FundsReceipt, PayoutRequest, RefundRequest};
use futures::future::BoxFuture;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::config::FundsServiceConfig;

/// The funds service's response to a refund or payout.
#[derive(Debug, Deserialize)]
struct ReceiptResponse {
    reference: String,
}

/// Posts refunds to `{url}/refunds` and payouts to `{url}/payouts`.
///
/// Every request carries an `Idempotency-Key` header, so the funds service can recognise a retry of a request it has
/// already honoured.
#[derive(Clone)]
pub struct HttpFundsGateway {
    url: String,
    client: Arc<Client>,
}

impl HttpFundsGateway {
    pub fn new(url: &str, config: &FundsServiceConfig) -> Result<Self, FundsError> {
        let mut headers = HeaderMap::with_capacity(2);
        if !config.api_key.is_empty() {
            let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
                .map_err(|e| FundsError::Unavailable(format!("Invalid API key. {e}")))?;
            headers.insert(AUTHORIZATION, val);
        }
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| FundsError::Unavailable(e.to_string()))?;
        Ok(Self { url: url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    fn post<B>(
        &self,
        path: &'static str,
        idempotency_key: String,
        body: B,
    ) -> BoxFuture<'static, Result<FundsReceipt, FundsError>>
    where
        B: Serialize + Send + 'static,
    {
        let url = format!("{}{path}", self.url);
        let client = Arc::clone(&self.client);
        Box::pin(async move {
            trace!("💸️ POST {url} ({idempotency_key})");
            let response = client
                .post(&url)
                .header("Idempotency-Key", idempotency_key.as_str())
                .json(&body)
                .send()
                .await
                .map_err(|e| FundsError::Unavailable(e.to_string()))?;
            let status = response.status();
            if status.is_success() {
                let receipt = response
                    .json::<ReceiptResponse>()
                    .await
                    .map_err(|e| FundsError::Unavailable(format!("Unreadable receipt. {e}")))?;
                return Ok(FundsReceipt { reference: receipt.reference });
            }
            let message = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                Err(FundsError::Rejected(format!("{status}. {message}")))
            } else {
                Err(FundsError::Unavailable(format!("{status}. {message}")))
            }
        })
    }
}

impl FundsGateway for HttpFundsGateway {
    fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        info!("💸️ Requesting a refund of {} to {} for order {}", request.amount, request.buyer_id, request.order_id);
        let key = request.idempotency_key.clone();
        self.post("/refunds", key, request)
    }

    fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        info!("💸️ Requesting a payout of {} to {} for order {}", request.amount, request.seller_id, request.order_id);
        let key = request.idempotency_key.clone();
        self.post("/payouts", key, request)
    }
}

/// Used when no funds service is configured. Nothing moves; every request is logged and succeeds.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFundsGateway;

impl FundsGateway for SimulatedFundsGateway {
    fn refund(&self, request: RefundRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        warn!(
            "💸️ SIMULATED refund of {} to {} for order {} ({})",
            request.amount, request.buyer_id, request.order_id, request.reason
        );
        let reference = format!("sim-refund-{}", request.idempotency_key);
        Box::pin(async move { Ok(FundsReceipt { reference }) })
    }

    fn payout(&self, request: PayoutRequest) -> BoxFuture<'static, Result<FundsReceipt, FundsError>> {
        warn!("💸️ SIMULATED payout of {} to {} for order {}", request.amount, request.seller_id, request.order_id);
        let reference = format!("sim-payout-{}", request.idempotency_key);
        Box::pin(async move { Ok(FundsReceipt { reference }) })
    }
}

/// The HTTP client if a funds service URL is configured, otherwise the simulator.
pub fn funds_gateway_from_config(config: &FundsServiceConfig) -> Result<Arc<dyn FundsGateway>, FundsError> {
    match &config.url {
        Some(url) => {
            info!("💸️ Refunds and payouts will be sent to {url}");
            Ok(Arc::new(HttpFundsGateway::new(url, config)?))
        },
        None => Ok(Arc::new(SimulatedFundsGateway)),
    }
}
