use std::str::FromStr;

use escrow_common::{Secret, CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{Cents, Order, OrderId, PaymentMethod},
    gateways::{
        signature::{digests_match, paygate_checksum},
        CheckoutContext,
        GatewayError,
        GatewayPayload,
        NormalizedPaymentEvent,
        PaymentGateway,
        PaymentRequest,
    },
};

const INITIATE_URL: &str = "https://secure.paygate.co.za/payweb3/initiate.trans";
const LOCALE: &str = "en-za";
const COUNTRY: &str = "ZAF";
const APPROVED: &str = "1";

pub const REQUEST_FIELDS: [&str; 17] = [
    "PAYGATE_ID",
    "REFERENCE",
    "AMOUNT",
    "CURRENCY",
    "RETURN_URL",
    "TRANSACTION_DATE",
    "LOCALE",
    "COUNTRY",
    "EMAIL",
    "PAY_METHOD",
    "PAY_METHOD_DETAIL",
    "NOTIFY_URL",
    "USER1",
    "USER2",
    "USER3",
    "VAULT",
    "VAULT_ID",
];

pub const NOTIFICATION_FIELDS: [&str; 19] = [
    "PAYGATE_ID",
    "PAY_REQUEST_ID",
    "REFERENCE",
    "TRANSACTION_STATUS",
    "RESULT_CODE",
    "AUTH_CODE",
    "CURRENCY",
    "AMOUNT",
    "RESULT_DESC",
    "TRANSACTION_ID",
    "RISK_INDICATOR",
    "PAY_METHOD",
    "PAY_METHOD_DETAIL",
    "USER1",
    "USER2",
    "USER3",
    "VAULT_ID",
    "PAYVAULT_DATA_1",
    "PAYVAULT_DATA_2",
];

pub const CHECKSUM_FIELD: &str = "CHECKSUM";

#[derive(Debug, Clone, Default)]
pub struct PayGateConfig {
    pub paygate_id: String,
    pub encryption_key: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct PayGateGateway {
    config: PayGateConfig,
}

impl PayGateGateway {
    pub fn new(config: PayGateConfig) -> Self {
        Self { config }
    }
}

impl PaymentGateway for PayGateGateway {
    fn provider(&self) -> PaymentMethod {
        PaymentMethod::PayGate
    }

    /// PayGate amounts are whole cents, so no decimal conversion happens on this path.
    fn build_payment_request(&self, order: &Order, ctx: &CheckoutContext) -> Result<PaymentRequest, GatewayError> {
        if !order.total_amount.is_positive() {
            return Err(GatewayError::InvalidAmount(order.total_amount.value().to_string()));
        }
        let mut payload = GatewayPayload::new();
        payload
            .insert("PAYGATE_ID", self.config.paygate_id.as_str())
            .insert("REFERENCE", order.order_id.as_str())
            .insert("AMOUNT", order.total_amount.value().to_string())
            .insert("CURRENCY", CURRENCY_CODE)
            .insert("RETURN_URL", ctx.return_url.as_str())
            .insert("TRANSACTION_DATE", ctx.requested_at.format("%Y-%m-%d %H:%M:%S").to_string())
            .insert("LOCALE", LOCALE)
            .insert("COUNTRY", COUNTRY)
            .insert("EMAIL", ctx.buyer_email.as_str())
            .insert("NOTIFY_URL", ctx.notify_url.as_str());
        let checksum = paygate_checksum(&payload, &REQUEST_FIELDS, self.config.encryption_key.reveal());
        payload.insert(CHECKSUM_FIELD, checksum);
        Ok(PaymentRequest {
            provider: PaymentMethod::PayGate,
            redirect_target: INITIATE_URL.to_string(),
            signed_payload: payload,
        })
    }

    fn verify(&self, payload: &GatewayPayload) -> bool {
        let Some(supplied) = payload.get(CHECKSUM_FIELD) else {
            debug!("🔐️ PayGate notification has no checksum");
            return false;
        };
        let expected = paygate_checksum(
            &payload.without(CHECKSUM_FIELD),
            &NOTIFICATION_FIELDS,
            self.config.encryption_key.reveal(),
        );
        digests_match(&expected, supplied)
    }

    fn parse_notification(&self, payload: &GatewayPayload) -> Result<NormalizedPaymentEvent, GatewayError> {
        let order_id = OrderId::from(payload.required("REFERENCE")?);
        let status = payload.required("TRANSACTION_STATUS")?;
        if status == APPROVED {
            let amount = payload.required("AMOUNT")?;
            let amount = i64::from_str(amount)
                .map(Cents::from)
                .map_err(|_| GatewayError::InvalidAmount(amount.to_string()))?;
            let provider_ref = payload.required("TRANSACTION_ID")?.to_string();
            Ok(NormalizedPaymentEvent::Completed { order_id, amount, provider_ref })
        } else {
            let provider_ref = payload.required("TRANSACTION_ID").ok().map(String::from);
            Ok(NormalizedPaymentEvent::NotCompleted { order_id, status: status.to_string(), provider_ref })
        }
    }
}
