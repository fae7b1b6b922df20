//! Turns a signed [`PaymentRequest`] into the URL the buyer's browser is sent to.
//!
//! PayFast takes the signed fields straight from the browser, so its URL is built locally. Ozow and PayGate both
//! expect the merchant to post the request server-side first; they answer with a payment page (Ozow) or a request id
//! and checksum that the browser carries to the process page (PayGate).
use std::sync::Arc;

use escrow_common::Secret;
use escrow_engine::{
    db_types::PaymentMethod,
    gateways::{GatewayPayload, PaymentRequest},
};
use log::*;
use reqwest::Client;
use serde::Deserialize;
use url::form_urlencoded;

use crate::errors::ServerError;

pub const PAYGATE_PROCESS_URL: &str = "https://secure.paygate.co.za/payweb3/process.trans";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OzowPaymentResponse {
    url: Option<String>,
    payment_request_id: Option<String>,
    error_message: Option<String>,
}

#[derive(Clone, Default)]
pub struct GatewayCheckout {
    client: Arc<Client>,
}

impl GatewayCheckout {
    pub fn new() -> Self {
        Self { client: Arc::new(Client::new()) }
    }

    pub async fn redirect_url(
        &self,
        request: PaymentRequest,
        ozow_api_key: &Secret<String>,
    ) -> Result<String, ServerError> {
        match request.provider {
            PaymentMethod::PayFast => Ok(url_with_query(&request.redirect_target, &request.signed_payload)),
            PaymentMethod::Ozow => self.post_ozow(request, ozow_api_key).await,
            PaymentMethod::PayGate => self.initiate_paygate(request).await,
            PaymentMethod::Eft => Err(ServerError::InvalidRequestBody("EFT payments have no payment page".into())),
        }
    }

    async fn post_ozow(&self, request: PaymentRequest, api_key: &Secret<String>) -> Result<String, ServerError> {
        debug!("💻️ Posting Ozow payment request to {}", request.redirect_target);
        let response = self
            .client
            .post(&request.redirect_target)
            .header("ApiKey", api_key.reveal().as_str())
            .header("Accept", "application/json")
            .json(&request.signed_payload)
            .send()
            .await
            .map_err(|e| ServerError::UpstreamError(format!("Ozow could not be reached. {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServerError::UpstreamError(format!("Ozow rejected the payment request. {status}. {message}")));
        }
        let body = response
            .json::<OzowPaymentResponse>()
            .await
            .map_err(|e| ServerError::UpstreamError(format!("Unreadable Ozow response. {e}")))?;
        match body.url {
            Some(url) if !url.is_empty() => {
                debug!("💻️ Ozow payment request {} created", body.payment_request_id.unwrap_or_default());
                Ok(url)
            },
            _ => Err(ServerError::UpstreamError(format!(
                "Ozow did not return a payment URL. {}",
                body.error_message.unwrap_or_default()
            ))),
        }
    }

    async fn initiate_paygate(&self, request: PaymentRequest) -> Result<String, ServerError> {
        debug!("💻️ Initiating PayGate transaction at {}", request.redirect_target);
        let form = request.signed_payload.iter().collect::<Vec<(&str, &str)>>();
        let response = self
            .client
            .post(&request.redirect_target)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServerError::UpstreamError(format!("PayGate could not be reached. {e}")))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| ServerError::UpstreamError(format!("Unreadable PayGate response. {e}")))?;
        process_url_from_initiate_response(&body)
    }
}

/// PayGate answers `initiate.trans` with a form-encoded body carrying `PAY_REQUEST_ID` and `CHECKSUM`, or `ERROR`.
pub fn process_url_from_initiate_response(body: &[u8]) -> Result<String, ServerError> {
    let fields = GatewayPayload::from_form(body);
    if let Some(error) = fields.get("ERROR") {
        return Err(ServerError::UpstreamError(format!("PayGate refused the transaction. {error}")));
    }
    let (Some(id), Some(checksum)) = (fields.get("PAY_REQUEST_ID"), fields.get("CHECKSUM")) else {
        return Err(ServerError::UpstreamError("PayGate did not return a PAY_REQUEST_ID and CHECKSUM".into()));
    };
    let mut process = GatewayPayload::new();
    process.insert("PAY_REQUEST_ID", id).insert("CHECKSUM", checksum);
    Ok(url_with_query(PAYGATE_PROCESS_URL, &process))
}

pub fn url_with_query(target: &str, payload: &GatewayPayload) -> String {
    let query = form_urlencoded::Serializer::new(String::new()).extend_pairs(payload.iter()).finish();
    format!("{target}?{query}")
}
