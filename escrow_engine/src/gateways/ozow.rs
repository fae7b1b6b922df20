use std::str::FromStr;

use escrow_common::{Secret, CURRENCY_CODE};
use log::*;

use crate::{
    db_types::{Cents, Order, OrderId, PaymentMethod},
    gateways::{
        signature::{digests_match, ozow_hash},
        CheckoutContext,
        GatewayError,
        GatewayPayload,
        NormalizedPaymentEvent,
        PaymentGateway,
        PaymentRequest,
    },
};

const STAGING_API: &str = "https://stagingapi.ozow.com";
const LIVE_API: &str = "https://api.ozow.com";
const COUNTRY_CODE: &str = "ZA";

pub const REQUEST_FIELDS: [&str; 28] = [
    "siteCode",
    "countryCode",
    "currencyCode",
    "amount",
    "transactionReference",
    "bankReference",
    "optional1",
    "optional2",
    "optional3",
    "optional4",
    "optional5",
    "customer",
    "cancelUrl",
    "errorUrl",
    "successUrl",
    "notifyUrl",
    "isTest",
    "selectedBankId",
    "bankAccountNumber",
    "branchCode",
    "bankAccountName",
    "payeeDisplayName",
    "expiryDateUtc",
    "allowVariableAmount",
    "variableAmountMin",
    "variableAmountMax",
    "customerIdentifier",
    "customerCellphoneNumber",
];

pub const NOTIFICATION_FIELDS: [&str; 15] = [
    "SiteCode",
    "TransactionId",
    "TransactionReference",
    "Amount",
    "Status",
    "Optional1",
    "Optional2",
    "Optional3",
    "Optional4",
    "Optional5",
    "CurrencyCode",
    "SubStatus",
    "MaskedAccountNumber",
    "BankName",
    "SmartIndicators",
];

pub const REQUEST_HASH_FIELD: &str = "hashCheck";
pub const NOTIFICATION_HASH_FIELD: &str = "Hash";
const COMPLETE: &str = "Complete";

#[derive(Debug, Clone, Default)]
pub struct OzowConfig {
    pub site_code: String,
    pub private_key: Secret<String>,
    /// Sent by the client as the `ApiKey` header when posting the payment request.
    pub api_key: Secret<String>,
    pub is_test: bool,
}

#[derive(Debug, Clone)]
pub struct OzowGateway {
    config: OzowConfig,
}

impl OzowGateway {
    pub fn new(config: OzowConfig) -> Self {
        Self { config }
    }

    pub fn api_key(&self) -> &Secret<String> {
        &self.config.api_key
    }

    fn api_url(&self) -> String {
        let base = if self.config.is_test { STAGING_API } else { LIVE_API };
        format!("{base}/PostPaymentRequest")
    }
}

impl PaymentGateway for OzowGateway {
    fn provider(&self) -> PaymentMethod {
        PaymentMethod::Ozow
    }

    fn build_payment_request(&self, order: &Order, ctx: &CheckoutContext) -> Result<PaymentRequest, GatewayError> {
        if !order.total_amount.is_positive() {
            return Err(GatewayError::InvalidAmount(order.total_amount.to_decimal_string()));
        }
        let customer = format!("{} {}", ctx.buyer_first_name, ctx.buyer_last_name);
        let mut payload = GatewayPayload::new();
        payload
            .insert("siteCode", self.config.site_code.as_str())
            .insert("countryCode", COUNTRY_CODE)
            .insert("currencyCode", CURRENCY_CODE)
            .insert("amount", order.total_amount.to_decimal_string())
            .insert("transactionReference", order.order_id.as_str())
            .insert("bankReference", format!("EduThrift {}", order.order_id.as_str()))
            .insert("customer", customer.trim())
            .insert("cancelUrl", ctx.cancel_url.as_str())
            .insert("errorUrl", ctx.error_url.as_str())
            .insert("successUrl", ctx.return_url.as_str())
            .insert("notifyUrl", ctx.notify_url.as_str())
            .insert("isTest", self.config.is_test.to_string());
        let hash = ozow_hash(&payload, &REQUEST_FIELDS, self.config.private_key.reveal());
        payload.insert(REQUEST_HASH_FIELD, hash);
        Ok(PaymentRequest { provider: PaymentMethod::Ozow, redirect_target: self.api_url(), signed_payload: payload })
    }

    fn verify(&self, payload: &GatewayPayload) -> bool {
        let Some(supplied) = payload.get(NOTIFICATION_HASH_FIELD) else {
            debug!("🔐️ Ozow notification has no hash");
            return false;
        };
        let expected =
            ozow_hash(&payload.without(NOTIFICATION_HASH_FIELD), &NOTIFICATION_FIELDS, self.config.private_key.reveal());
        digests_match(&expected, supplied)
    }

    fn parse_notification(&self, payload: &GatewayPayload) -> Result<NormalizedPaymentEvent, GatewayError> {
        let order_id = OrderId::from(payload.required("TransactionReference")?);
        let status = payload.required("Status")?;
        if status == COMPLETE {
            let amount = payload.required("Amount")?;
            let amount = Cents::from_str(amount).map_err(|_| GatewayError::InvalidAmount(amount.to_string()))?;
            let provider_ref = payload.required("TransactionId")?.to_string();
            Ok(NormalizedPaymentEvent::Completed { order_id, amount, provider_ref })
        } else {
            let provider_ref = payload.required("TransactionId").ok().map(String::from);
            Ok(NormalizedPaymentEvent::NotCompleted { order_id, status: status.to_string(), provider_ref })
        }
    }
}
