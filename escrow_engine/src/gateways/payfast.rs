use std::str::FromStr;

use escrow_common::Secret;
use log::*;

use crate::{
    db_types::{Cents, Order, OrderId, PaymentMethod},
    gateways::{
        signature::{digests_match, payfast_signature},
        CheckoutContext,
        GatewayError,
        GatewayPayload,
        NormalizedPaymentEvent,
        PaymentGateway,
        PaymentRequest,
    },
};

const SANDBOX_URL: &str = "https://sandbox.payfast.co.za/eng/process";
const LIVE_URL: &str = "https://www.payfast.co.za/eng/process";

/// The order in which PayFast lists the fields of a payment request. The signature is computed over the non-empty
/// fields in exactly this order.
pub const REQUEST_FIELDS: [&str; 26] = [
    "merchant_id",
    "merchant_key",
    "return_url",
    "cancel_url",
    "notify_url",
    "name_first",
    "name_last",
    "email_address",
    "cell_number",
    "m_payment_id",
    "amount",
    "item_name",
    "item_description",
    "custom_int1",
    "custom_int2",
    "custom_int3",
    "custom_int4",
    "custom_int5",
    "custom_str1",
    "custom_str2",
    "custom_str3",
    "custom_str4",
    "custom_str5",
    "email_confirmation",
    "confirmation_address",
    "payment_method",
];

/// The order in which PayFast posts the fields of an ITN (instant transaction notification).
pub const NOTIFICATION_FIELDS: [&str; 22] = [
    "m_payment_id",
    "pf_payment_id",
    "payment_status",
    "item_name",
    "item_description",
    "amount_gross",
    "amount_fee",
    "amount_net",
    "custom_str1",
    "custom_str2",
    "custom_str3",
    "custom_str4",
    "custom_str5",
    "custom_int1",
    "custom_int2",
    "custom_int3",
    "custom_int4",
    "custom_int5",
    "name_first",
    "name_last",
    "email_address",
    "merchant_id",
];

pub const SIGNATURE_FIELD: &str = "signature";
const COMPLETE: &str = "COMPLETE";

#[derive(Debug, Clone, Default)]
pub struct PayFastConfig {
    pub merchant_id: String,
    pub merchant_key: Secret<String>,
    pub passphrase: Option<Secret<String>>,
    pub sandbox: bool,
}

#[derive(Debug, Clone)]
pub struct PayFastGateway {
    config: PayFastConfig,
}

impl PayFastGateway {
    pub fn new(config: PayFastConfig) -> Self {
        Self { config }
    }

    fn passphrase(&self) -> Option<&str> {
        self.config.passphrase.as_ref().map(|p| p.reveal().as_str())
    }

    fn process_url(&self) -> &'static str {
        if self.config.sandbox {
            SANDBOX_URL
        } else {
            LIVE_URL
        }
    }
}

impl PaymentGateway for PayFastGateway {
    fn provider(&self) -> PaymentMethod {
        PaymentMethod::PayFast
    }

    fn build_payment_request(&self, order: &Order, ctx: &CheckoutContext) -> Result<PaymentRequest, GatewayError> {
        if !order.total_amount.is_positive() {
            return Err(GatewayError::InvalidAmount(order.total_amount.to_decimal_string()));
        }
        let mut payload = GatewayPayload::new();
        payload
            .insert("merchant_id", self.config.merchant_id.as_str())
            .insert("merchant_key", self.config.merchant_key.reveal().as_str())
            .insert("return_url", ctx.return_url.as_str())
            .insert("cancel_url", ctx.cancel_url.as_str())
            .insert("notify_url", ctx.notify_url.as_str())
            .insert("name_first", ctx.buyer_first_name.as_str())
            .insert("name_last", ctx.buyer_last_name.as_str())
            .insert("email_address", ctx.buyer_email.as_str())
            .insert("m_payment_id", order.order_id.as_str())
            .insert("amount", order.total_amount.to_decimal_string())
            .insert("item_name", format!("Escrow Payment - {}", order.item_name))
            .insert("item_description", "Secure payment held until delivery confirmation")
            .insert("custom_str1", order.seller_id.as_str())
            .insert("custom_str2", order.seller_amount.to_decimal_string())
            .insert("custom_str3", order.platform_fee.to_decimal_string())
            .insert("custom_str4", "escrow_payment");
        let signature = payfast_signature(&payload, &REQUEST_FIELDS, self.passphrase());
        payload.insert(SIGNATURE_FIELD, signature);
        Ok(PaymentRequest {
            provider: PaymentMethod::PayFast,
            redirect_target: self.process_url().to_string(),
            signed_payload: payload,
        })
    }

    fn verify(&self, payload: &GatewayPayload) -> bool {
        let Some(supplied) = payload.get(SIGNATURE_FIELD) else {
            debug!("🔐️ PayFast notification has no signature");
            return false;
        };
        let expected = payfast_signature(&payload.without(SIGNATURE_FIELD), &NOTIFICATION_FIELDS, self.passphrase());
        digests_match(&expected, supplied)
    }

    fn parse_notification(&self, payload: &GatewayPayload) -> Result<NormalizedPaymentEvent, GatewayError> {
        let order_id = OrderId::from(payload.required("m_payment_id")?);
        let status = payload.required("payment_status")?;
        if status == COMPLETE {
            let gross = payload.required("amount_gross")?;
            let amount = Cents::from_str(gross).map_err(|_| GatewayError::InvalidAmount(gross.to_string()))?;
            let provider_ref = payload.required("pf_payment_id")?.to_string();
            Ok(NormalizedPaymentEvent::Completed { order_id, amount, provider_ref })
        } else {
            let provider_ref = payload.get("pf_payment_id").map(str::trim).filter(|s| !s.is_empty()).map(String::from);
            Ok(NormalizedPaymentEvent::NotCompleted { order_id, status: status.to_string(), provider_ref })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gateways::test_fixtures::{checkout_context, sample_order};

    fn gateway() -> PayFastGateway {
        PayFastGateway::new(PayFastConfig {
            merchant_id: "10000100".into(),
            merchant_key: Secret::new("46f0cd694581a".to_string()),
            passphrase: Some(Secret::new("jt7NOE43FZPn".to_string())),
            sandbox: true,
        })
    }

    fn itn() -> GatewayPayload {
        [
            ("m_payment_id", "O1"),
            ("pf_payment_id", "1089250"),
            ("payment_status", "COMPLETE"),
            ("item_name", "Escrow Payment - School blazer"),
            ("item_description", "Secure payment held until delivery confirmation"),
            ("amount_gross", "250.00"),
            ("amount_fee", "-5.75"),
            ("amount_net", "244.25"),
            ("custom_str1", "seller-7"),
            ("custom_str2", "225.00"),
            ("custom_str3", "25.00"),
            ("custom_str4", "escrow_payment"),
            ("name_first", "Thandi"),
            ("name_last", "Nkosi"),
            ("email_address", "thandi@example.com"),
            ("merchant_id", "10000100"),
            ("signature", "614f59f1262432a3e01caaa4333c000b"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn payment_request_is_signed() {
        let request = gateway().build_payment_request(&sample_order(), &checkout_context("payfast")).unwrap();
        assert_eq!(request.provider, PaymentMethod::PayFast);
        assert_eq!(request.redirect_target, SANDBOX_URL);
        let payload = &request.signed_payload;
        assert_eq!(payload.get("amount"), Some("250.00"));
        assert_eq!(payload.get("m_payment_id"), Some("O1"));
        assert_eq!(payload.get("custom_str2"), Some("225.00"));
        assert_eq!(payload.get("signature"), Some("13f2575e5734f04e2bf7345144f8e83a"));
    }

    #[test]
    fn valid_itn_verifies() {
        let gw = gateway();
        assert!(gw.verify(&itn()));
        let mut upper = itn();
        upper.insert("signature", "614F59F1262432A3E01CAAA4333C000B");
        assert!(gw.verify(&upper));
    }

    #[test]
    fn tampered_itn_is_rejected() {
        let gw = gateway();
        let mut tampered = itn();
        tampered.insert("amount_gross", "2500.00");
        assert!(!gw.verify(&tampered));
        assert!(!gw.verify(&itn().without("signature")));
        let wrong_passphrase = PayFastGateway::new(PayFastConfig { passphrase: None, ..gw.config.clone() });
        assert!(!wrong_passphrase.verify(&itn()));
    }

    #[test]
    fn every_signed_field_is_covered() {
        let gw = gateway();
        for field in NOTIFICATION_FIELDS {
            let mut tampered = itn();
            let value = format!("{}x", tampered.value(field));
            tampered.insert(field, value);
            assert!(!gw.verify(&tampered), "Changing {field} should break the signature");
        }
    }

    #[test]
    fn parse_complete_itn() {
        let event = gateway().parse_notification(&itn()).unwrap();
        assert_eq!(event, NormalizedPaymentEvent::Completed {
            order_id: OrderId::from("O1"),
            amount: Cents::from(25_000),
            provider_ref: "1089250".into(),
        });
    }

    #[test]
    fn parse_other_statuses() {
        let mut cancelled = itn();
        cancelled.insert("payment_status", "CANCELLED");
        let event = gateway().parse_notification(&cancelled).unwrap();
        assert!(!event.is_success());
        assert!(matches!(event, NormalizedPaymentEvent::NotCompleted { ref status, .. } if status == "CANCELLED"));

        for status in ["complete", "Complete", "COMPLETED"] {
            let mut almost = itn();
            almost.insert("payment_status", status);
            let event = gateway().parse_notification(&almost).unwrap();
            assert!(!event.is_success(), "{status} is not a completed payment");
        }

        let mut bad_amount = itn();
        bad_amount.insert("amount_gross", "two fifty");
        assert!(matches!(gateway().parse_notification(&bad_amount), Err(GatewayError::InvalidAmount(_))));

        let missing = itn().without("m_payment_id");
        assert!(matches!(gateway().parse_notification(&missing), Err(GatewayError::MissingField("m_payment_id"))));
    }
}
