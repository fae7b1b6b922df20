use std::{env, fmt::Display, str::FromStr, time::Duration};

use chrono::NaiveTime;
use escrow_common::{helpers::parse_boolean_flag, Secret};
use escrow_engine::{
    escrow_objects::EscrowPolicy,
    gateways::{OzowConfig, PayFastConfig, PayGateConfig},
};
use log::*;
use serde::{Deserialize, Serialize};

const DEFAULT_ESCROW_HOST: &str = "127.0.0.1";
const DEFAULT_ESCROW_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/escrow_store.db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_BACKEND_URL: &str = "http://localhost:8370";
const DEFAULT_OVERDUE_SWEEP_INTERVAL_MINS: u64 = 60;
const DEFAULT_REFUND_SWEEP_TIME: &str = "09:00";
const DEFAULT_SHIPPING_HMAC_HEADER: &str = "X-Shipping-Hmac-Sha256";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Create the database and bring the schema up to date on startup.
    pub auto_migrate: bool,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// Buyers are sent back here after paying, e.g. `https://eduthrift.co.za`.
    pub frontend_url: String,
    /// The public address of this server. Gateways post their notifications here.
    pub backend_url: String,
    pub policy: EscrowPolicy,
    pub schedule: SweepSchedule,
    pub funds: FundsServiceConfig,
    pub shipping_webhook: ShippingWebhookConfig,
    pub payfast: PayFastConfig,
    pub ozow: OzowConfig,
    pub paygate: PayGateConfig,
    pub eft: EftDetails,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ESCROW_HOST.to_string(),
            port: DEFAULT_ESCROW_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auto_migrate: true,
            use_x_forwarded_for: false,
            use_forwarded: false,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            policy: EscrowPolicy::default(),
            schedule: SweepSchedule::default(),
            funds: FundsServiceConfig::default(),
            shipping_webhook: ShippingWebhookConfig::default(),
            payfast: PayFastConfig::default(),
            ozow: OzowConfig::default(),
            paygate: PayGateConfig::default(),
            eft: EftDetails::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ESCROW_HOST").ok().unwrap_or_else(|| DEFAULT_ESCROW_HOST.into());
        let port = parse_env("ESCROW_PORT", DEFAULT_ESCROW_PORT);
        let database_url = env::var("ESCROW_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ESCROW_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let auto_migrate = parse_boolean_flag(env::var("ESCROW_AUTO_MIGRATE").ok(), true);
        let use_x_forwarded_for = parse_boolean_flag(env::var("ESCROW_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("ESCROW_USE_FORWARDED").ok(), false);
        let frontend_url = url_from_env("ESCROW_FRONTEND_URL", DEFAULT_FRONTEND_URL);
        let backend_url = url_from_env("ESCROW_BACKEND_URL", DEFAULT_BACKEND_URL);
        Self {
            host,
            port,
            database_url,
            auto_migrate,
            use_x_forwarded_for,
            use_forwarded,
            frontend_url,
            backend_url,
            policy: policy_from_env(),
            schedule: SweepSchedule::from_env_or_default(),
            funds: FundsServiceConfig::from_env(),
            shipping_webhook: ShippingWebhookConfig::from_env(),
            payfast: payfast_from_env(),
            ozow: ozow_from_env(),
            paygate: paygate_from_env(),
            eft: EftDetails::from_env_or_default(),
        }
    }

    pub fn checkout_urls(&self) -> CheckoutUrls {
        CheckoutUrls { frontend_url: self.frontend_url.clone(), backend_url: self.backend_url.clone() }
    }
}

fn policy_from_env() -> EscrowPolicy {
    let defaults = EscrowPolicy::default();
    let policy = EscrowPolicy {
        platform_fee_percent: parse_env("ESCROW_PLATFORM_FEE_PERCENT", defaults.platform_fee_percent),
        delivery_sla_days: parse_env("ESCROW_DELIVERY_SLA_DAYS", defaults.delivery_sla_days),
        overdue_threshold_days: parse_env("ESCROW_OVERDUE_THRESHOLD_DAYS", defaults.overdue_threshold_days),
        refund_grace_days: parse_env("ESCROW_REFUND_GRACE_DAYS", defaults.refund_grace_days),
        dispute_extension_days: parse_env("ESCROW_DISPUTE_EXTENSION_DAYS", defaults.dispute_extension_days),
    };
    if policy.platform_fee_percent > 100 {
        error!(
            "🪛️ ESCROW_PLATFORM_FEE_PERCENT is {}%, which is more than the order itself. Using {}% instead.",
            policy.platform_fee_percent, defaults.platform_fee_percent
        );
        return EscrowPolicy { platform_fee_percent: defaults.platform_fee_percent, ..policy };
    }
    info!("🪛️ Escrow policy: {policy:?}");
    policy
}

//-------------------------------------------------  SweepSchedule  ----------------------------------------------------
/// When the auto-refund sweeps run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepSchedule {
    /// The overdue sweep runs on every multiple of this interval (so hourly runs happen on the hour).
    pub overdue_interval: Duration,
    /// The refund sweep runs once a day at this time, UTC.
    pub refund_time: NaiveTime,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            overdue_interval: Duration::from_secs(DEFAULT_OVERDUE_SWEEP_INTERVAL_MINS * 60),
            refund_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        }
    }
}

impl SweepSchedule {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let mins = parse_env("ESCROW_OVERDUE_SWEEP_INTERVAL_MINS", DEFAULT_OVERDUE_SWEEP_INTERVAL_MINS);
        let overdue_interval = if mins == 0 {
            warn!("🪛️ ESCROW_OVERDUE_SWEEP_INTERVAL_MINS cannot be zero. Using {DEFAULT_OVERDUE_SWEEP_INTERVAL_MINS}.");
            defaults.overdue_interval
        } else {
            Duration::from_secs(mins * 60)
        };
        let refund_time = match env::var("ESCROW_REFUND_SWEEP_TIME") {
            Ok(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M").unwrap_or_else(|e| {
                warn!("🪛️ ESCROW_REFUND_SWEEP_TIME ({s}) is not a valid HH:MM time. {e}. Using {DEFAULT_REFUND_SWEEP_TIME}.");
                defaults.refund_time
            }),
            Err(_) => {
                info!("🪛️ ESCROW_REFUND_SWEEP_TIME is not set. Refunds will run daily at {DEFAULT_REFUND_SWEEP_TIME} UTC.");
                defaults.refund_time
            },
        };
        Self { overdue_interval, refund_time }
    }
}

//-------------------------------------------------  FundsServiceConfig  -----------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct FundsServiceConfig {
    /// When `None`, refunds and payouts are only logged.
    pub url: Option<String>,
    pub api_key: Secret<String>,
}

impl FundsServiceConfig {
    pub fn from_env() -> Self {
        let url = env::var("ESCROW_FUNDS_SERVICE_URL").ok().map(|s| s.trim().trim_end_matches('/').to_string());
        let url = url.filter(|s| !s.is_empty());
        if url.is_none() {
            warn!(
                "🪛️ ESCROW_FUNDS_SERVICE_URL is not set. Refunds and payouts will be SIMULATED and no money will move. \
                 Do not run production like this."
            );
        }
        let api_key = Secret::new(env::var("ESCROW_FUNDS_SERVICE_API_KEY").unwrap_or_default());
        if url.is_some() && api_key.is_empty() {
            warn!("🪛️ ESCROW_FUNDS_SERVICE_API_KEY is not set. Requests to the funds service will not be authenticated.");
        }
        Self { url, api_key }
    }
}

//-------------------------------------------------  ShippingWebhookConfig  --------------------------------------------
#[derive(Clone, Debug)]
pub struct ShippingWebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_header: String,
    /// If false, courier webhooks are accepted without checking their signature. **DANGER**
    pub hmac_checks: bool,
}

impl Default for ShippingWebhookConfig {
    fn default() -> Self {
        Self { hmac_secret: Secret::default(), hmac_header: DEFAULT_SHIPPING_HMAC_HEADER.into(), hmac_checks: true }
    }
}

impl ShippingWebhookConfig {
    pub fn from_env() -> Self {
        let hmac_secret = env::var("ESCROW_SHIPPING_HMAC_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ ESCROW_SHIPPING_HMAC_SECRET is not set. Courier webhooks cannot be authenticated and will be \
                 rejected."
            );
            String::default()
        });
        let hmac_header =
            env::var("ESCROW_SHIPPING_HMAC_HEADER").ok().unwrap_or_else(|| DEFAULT_SHIPPING_HMAC_HEADER.into());
        let hmac_checks = parse_boolean_flag(env::var("ESCROW_SHIPPING_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Courier webhook HMAC checks are DISABLED. Anyone can release escrowed funds.");
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_header, hmac_checks }
    }
}

//-------------------------------------------------  Gateways  ---------------------------------------------------------
fn payfast_from_env() -> PayFastConfig {
    let merchant_id = required_env("ESCROW_PAYFAST_MERCHANT_ID");
    let merchant_key = Secret::new(required_env("ESCROW_PAYFAST_MERCHANT_KEY"));
    let passphrase = env::var("ESCROW_PAYFAST_PASSPHRASE").ok().filter(|s| !s.trim().is_empty()).map(Secret::new);
    let sandbox = parse_boolean_flag(env::var("ESCROW_PAYFAST_SANDBOX").ok(), true);
    if sandbox {
        info!("🪛️ PayFast is in SANDBOX mode");
    }
    PayFastConfig { merchant_id, merchant_key, passphrase, sandbox }
}

fn ozow_from_env() -> OzowConfig {
    let site_code = required_env("ESCROW_OZOW_SITE_CODE");
    let private_key = Secret::new(required_env("ESCROW_OZOW_PRIVATE_KEY"));
    let api_key = Secret::new(required_env("ESCROW_OZOW_API_KEY"));
    let is_test = parse_boolean_flag(env::var("ESCROW_OZOW_TEST_MODE").ok(), true);
    if is_test {
        info!("🪛️ Ozow is in TEST mode");
    }
    OzowConfig { site_code, private_key, api_key, is_test }
}

fn paygate_from_env() -> PayGateConfig {
    let paygate_id = required_env("ESCROW_PAYGATE_ID");
    let encryption_key = Secret::new(required_env("ESCROW_PAYGATE_ENCRYPTION_KEY"));
    PayGateConfig { paygate_id, encryption_key }
}

//-------------------------------------------------  EftDetails  -------------------------------------------------------
/// The platform's bank account, shown to buyers who pay by manual bank transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EftDetails {
    pub bank: String,
    pub account_name: String,
    pub account_number: String,
    pub branch_code: String,
}

impl Default for EftDetails {
    fn default() -> Self {
        Self {
            bank: "First National Bank".into(),
            account_name: "EduThrift (Pty) Ltd".into(),
            account_number: String::default(),
            branch_code: "250655".into(),
        }
    }
}

impl EftDetails {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        let account_number = env::var("ESCROW_EFT_ACCOUNT_NUMBER").ok().unwrap_or_else(|| {
            warn!("🪛️ ESCROW_EFT_ACCOUNT_NUMBER is not set. Buyers choosing EFT will not be able to pay.");
            String::default()
        });
        Self {
            bank: env::var("ESCROW_EFT_BANK_NAME").unwrap_or(defaults.bank),
            account_name: env::var("ESCROW_EFT_ACCOUNT_NAME").unwrap_or(defaults.account_name),
            account_number,
            branch_code: env::var("ESCROW_EFT_BRANCH_CODE").unwrap_or(defaults.branch_code),
        }
    }
}

//-------------------------------------------------  CheckoutUrls  -----------------------------------------------------
/// Where gateways send the buyer back to, and where they post their notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutUrls {
    pub frontend_url: String,
    pub backend_url: String,
}

impl CheckoutUrls {
    pub fn return_url(&self, page: &str, order_id: &str) -> String {
        format!("{}/payment/{page}?orderId={}", self.frontend_url, urlencoded(order_id))
    }

    /// `provider` is the path segment of the notification route, e.g. `payfast`.
    pub fn notify_url(&self, provider: &str) -> String {
        format!("{}/{provider}/notify", self.backend_url)
    }
}

fn urlencoded(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

//-------------------------------------------------  Helpers  ----------------------------------------------------------
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

fn url_from_env(name: &str, default: &str) -> String {
    let url = env::var(name).ok().unwrap_or_else(|| {
        warn!("🪛️ {name} is not set. Using {default}.");
        default.to_string()
    });
    url.trim().trim_end_matches('/').to_string()
}

fn required_env(name: &str) -> String {
    env::var(name).ok().unwrap_or_else(|| {
        warn!("🪛️ {name} is not set. Payments through this gateway will fail.");
        String::default()
    })
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
