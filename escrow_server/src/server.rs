use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use escrow_engine::{
    events::EventProducers,
    gateways::PaymentGateways,
    traits::FundsGateway,
    AutoRefundApi,
    DeliveryConfirmationApi,
    DisputeApi,
    EscrowLedgerApi,
    NotificationApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    integrations::{audit::create_audit_event_handlers, checkout::GatewayCheckout, funds::funds_gateway_from_config},
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        CheckoutRoute,
        EscrowStateRoute,
        MarkNotificationReadRoute,
        MyNotificationsRoute,
        OpenDisputeRoute,
        OzowNotifyRoute,
        PayfastNotifyRoute,
        PaygateNotifyRoute,
        RegisterShipmentRoute,
        ReleaseEscrowRoute,
        ShippingWebhookRoute,
    },
    scheduler::RefundScheduler,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = connect_database(&config).await?;
    let funds = funds_gateway_from_config(&config.funds).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers();

    let ledger = EscrowLedgerApi::new(db.clone(), config.policy, producers.clone(), Arc::clone(&funds));
    let mut scheduler = RefundScheduler::new(AutoRefundApi::new(ledger), config.schedule);
    scheduler.start();

    let srv = create_server_instance(config, db, producers, funds)?;
    let result = srv.await;
    scheduler.stop().await;
    result.map_err(|e| ServerError::Unspecified(e.to_string()))
}

async fn connect_database(config: &ServerConfig) -> Result<SqliteDatabase, ServerError> {
    let url = config.database_url.as_str();
    if config.auto_migrate && !Sqlite::database_exists(url).await.unwrap_or(false) {
        info!("🗃️ Creating new database at {url}");
        Sqlite::create_database(url).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let db = SqliteDatabase::new_with_url(url, 25).await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.auto_migrate {
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    Ok(db)
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    funds: Arc<dyn FundsGateway>,
) -> Result<Server, ServerError> {
    let gateways = PaymentGateways::new(config.payfast.clone(), config.ozow.clone(), config.paygate.clone());
    let options = ServerOptions::from_config(&config);
    let urls = config.checkout_urls();
    let host = config.host.clone();
    let port = config.port;
    info!("💻️ Starting server on {host}:{port}");
    let srv = HttpServer::new(move || {
        let ledger = EscrowLedgerApi::new(db.clone(), config.policy, producers.clone(), Arc::clone(&funds));
        let delivery_api = DeliveryConfirmationApi::new(ledger.clone());
        let dispute_api = DisputeApi::new(db.clone(), config.policy, producers.clone());
        let notification_api = NotificationApi::new(db.clone());
        let hmac = &config.shipping_webhook;
        let shipping_scope = web::scope("/shipping")
            .wrap(HmacMiddlewareFactory::new(&hmac.hmac_header, hmac.hmac_secret.clone(), hmac.hmac_checks))
            .service(ShippingWebhookRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("escrow::access_log"))
            .app_data(web::Data::new(ledger))
            .app_data(web::Data::new(delivery_api))
            .app_data(web::Data::new(dispute_api))
            .app_data(web::Data::new(notification_api))
            .app_data(web::Data::new(gateways.clone()))
            .app_data(web::Data::new(GatewayCheckout::new()))
            .app_data(web::Data::new(urls.clone()))
            .app_data(web::Data::new(config.eft.clone()))
            .app_data(web::Data::new(options))
            .service(health)
            .service(CheckoutRoute::<SqliteDatabase>::new())
            .service(PayfastNotifyRoute::<SqliteDatabase>::new())
            .service(OzowNotifyRoute::<SqliteDatabase>::new())
            .service(PaygateNotifyRoute::<SqliteDatabase>::new())
            .service(shipping_scope)
            .service(RegisterShipmentRoute::<SqliteDatabase>::new())
            .service(ReleaseEscrowRoute::<SqliteDatabase>::new())
            .service(EscrowStateRoute::<SqliteDatabase>::new())
            .service(OpenDisputeRoute::<SqliteDatabase>::new())
            .service(MyNotificationsRoute::<SqliteDatabase>::new())
            .service(MarkNotificationReadRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
