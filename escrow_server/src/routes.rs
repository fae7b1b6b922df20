//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution.
use std::str::FromStr;

use actix_web::{get, http::header::CONTENT_TYPE, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use escrow_engine::{
    db_types::{Cents, NewOrder, OrderId, PaymentMethod},
    escrow_objects::{EscrowView, ShippingUpdate},
    gateways::{CheckoutContext, GatewayPayload, PaymentGateways},
    traits::{EscrowDatabase, NotificationManagement},
    DeliveryConfirmationApi,
    DisputeApi,
    EscrowLedgerApi,
    NotificationApi,
};
use log::*;

use crate::{
    auth::CallerId,
    config::{CheckoutUrls, EftDetails, ServerOptions},
    data_objects::{
        CheckoutPayment,
        CheckoutRequest,
        CheckoutResponse,
        DisputeRequest,
        DisputeResponse,
        JsonResponse,
        NotificationQuery,
        ShipmentRequest,
    },
    errors::ServerError,
    helpers::get_remote_ip,
    integrations::checkout::GatewayCheckout,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl EscrowDatabase);
/// Route handler for the checkout endpoint
///
/// The caller is the buyer. The order and its `pending` escrow are created first, and then the payment request for
/// the chosen gateway is built and signed. The response tells the storefront where to send the buyer: the gateway's
/// payment page, or the platform's bank details for EFT.
///
/// If the gateway cannot be reached, the escrow stays `pending` (no money has moved) and the call fails with `502`.
pub async fn checkout<B: EscrowDatabase>(
    caller: CallerId,
    body: web::Json<CheckoutRequest>,
    ledger: web::Data<EscrowLedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    initiator: web::Data<GatewayCheckout>,
    urls: web::Data<CheckoutUrls>,
    eft: web::Data<EftDetails>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    debug!("💻️ POST checkout for order {} by {caller} via {}", req.order_id, req.payment_method);
    let total_amount = Cents::from_str(&req.amount)
        .map_err(|e| ServerError::InvalidRequestBody(format!("'{}' is not a valid amount. {e}", req.amount)))?;
    let now = Utc::now();
    let new_order = NewOrder {
        order_id: req.order_id,
        buyer_id: caller.0,
        seller_id: req.seller_id,
        item_id: req.item_id,
        item_name: req.item_name,
        total_amount,
        payment_method: req.payment_method,
    };
    let (order, escrow) = ledger.open_escrow(new_order, now).await?;
    let payment = match order.payment_method {
        PaymentMethod::Eft => {
            CheckoutPayment::Eft { details: eft.get_ref().clone(), reference: order.order_id.to_string() }
        },
        provider => {
            let ctx = CheckoutContext {
                buyer_email: req.buyer_email,
                buyer_first_name: req.buyer_first_name,
                buyer_last_name: req.buyer_last_name,
                return_url: urls.return_url("success", order.order_id.as_str()),
                cancel_url: urls.return_url("cancel", order.order_id.as_str()),
                error_url: urls.return_url("error", order.order_id.as_str()),
                notify_url: urls.notify_url(&provider.to_string()),
                requested_at: now,
            };
            let request = gateways.build_payment_request(&order, &ctx)?;
            let url = initiator.redirect_url(request, gateways.ozow().api_key()).await.map_err(|e| {
                warn!("💻️ Could not start the {provider} payment for order {}. {e}", order.order_id);
                e
            })?;
            CheckoutPayment::Redirect { provider, url }
        },
    };
    let response = CheckoutResponse { order_id: order.order_id, escrow: EscrowView::from(escrow), payment };
    Ok(HttpResponse::Created().json(response))
}

//----------------------------------------------   Gateway notifications  -------------------------------------------
route!(payfast_notify => Post "/payfast/notify" impl EscrowDatabase);
/// PayFast's Instant Transaction Notification (ITN). Form encoded.
pub async fn payfast_notify<B: EscrowDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    ledger: web::Data<EscrowLedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    handle_payment_notification(PaymentMethod::PayFast, req, body, &ledger, &gateways, &options).await
}

route!(ozow_notify => Post "/ozow/notify" impl EscrowDatabase);
pub async fn ozow_notify<B: EscrowDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    ledger: web::Data<EscrowLedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    handle_payment_notification(PaymentMethod::Ozow, req, body, &ledger, &gateways, &options).await
}

route!(paygate_notify => Post "/paygate/notify" impl EscrowDatabase);
pub async fn paygate_notify<B: EscrowDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    ledger: web::Data<EscrowLedgerApi<B>>,
    gateways: web::Data<PaymentGateways>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    handle_payment_notification(PaymentMethod::PayGate, req, body, &ledger, &gateways, &options).await
}

/// Verifies and applies a gateway's payment notification.
///
/// * `400` if the signature does not match. Nothing is written.
/// * `404` if the order is unknown.
/// * `400` if the amount paid does not match the order total.
/// * `400` if the order was checked out with a different payment method.
/// * `200 OK` otherwise, including for repeats and for payments that did not complete, so that the gateway stops
///   retrying.
pub async fn handle_payment_notification<B: EscrowDatabase>(
    provider: PaymentMethod,
    req: HttpRequest,
    body: web::Bytes,
    ledger: &EscrowLedgerApi<B>,
    gateways: &PaymentGateways,
    options: &ServerOptions,
) -> Result<HttpResponse, ServerError> {
    let remote_ip = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    let remote_ip = remote_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "unknown".into());
    debug!("💻️ {provider} payment notification from {remote_ip}");
    let content_type = req.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let payload = GatewayPayload::from_body(content_type, &body)?;
    let event = gateways.verify_and_parse(provider, &payload).map_err(|e| {
        warn!("💻️ Rejected {provider} notification from {remote_ip}. {e}");
        ServerError::from(e)
    })?;
    let outcome = ledger.process_payment_event(provider, event, Utc::now()).await?;
    trace!("💻️ {provider} notification processed: {outcome:?}");
    Ok(HttpResponse::Ok().body("OK"))
}

//----------------------------------------------   Shipping  ----------------------------------------------------
route!(shipping_webhook => Post "/webhook" impl EscrowDatabase);
/// Route handler for courier and locker status updates. Mounted under `/shipping`, behind the HMAC middleware.
///
/// Always replies `200` with the outcome, including when no order or funded escrow matches the update, so that the
/// courier does not keep retrying an update that can never apply.
pub async fn shipping_webhook<B: EscrowDatabase>(
    body: web::Json<ShippingUpdate>,
    api: web::Data<DeliveryConfirmationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let update = body.into_inner();
    info!("💻️ {} update for {}: {}", update.provider, update.tracking_number, update.status);
    let outcome = api.process_shipping_update(update, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(register_shipment => Post "/orders/{order_id}/shipment" impl EscrowDatabase);
/// The seller hands the parcel over to a courier or locker network.
pub async fn register_shipment<B: EscrowDatabase>(
    caller: CallerId,
    path: web::Path<OrderId>,
    body: web::Json<ShipmentRequest>,
    api: web::Data<DeliveryConfirmationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let ShipmentRequest { provider, tracking_number } = body.into_inner();
    debug!("💻️ POST shipment for order {order_id} by {caller}: {provider} {tracking_number}");
    let order = api.register_shipment(&order_id, caller.as_str(), provider, &tracking_number, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Escrow  ----------------------------------------------------
route!(release_escrow => Post "/escrow/release/{order_id}" impl EscrowDatabase);
/// The buyer confirms that the goods arrived. Replies `404` if there is no funded escrow to release.
pub async fn release_escrow<B: EscrowDatabase>(
    caller: CallerId,
    path: web::Path<OrderId>,
    ledger: web::Data<EscrowLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST release for order {order_id} by {caller}");
    let (_, escrow) = ledger.confirm_receipt(&order_id, caller.as_str(), Utc::now()).await?;
    Ok(HttpResponse::Ok().json(EscrowView::from(escrow)))
}

route!(escrow_state => Get "/escrow/{order_id}" impl EscrowDatabase);
/// Only the buyer and seller of an order can see its escrow. Everyone else gets `404`.
pub async fn escrow_state<B: EscrowDatabase>(
    caller: CallerId,
    path: web::Path<OrderId>,
    ledger: web::Data<EscrowLedgerApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    trace!("💻️ GET escrow for order {order_id} by {caller}");
    let view = ledger.escrow_for_party(&order_id, caller.as_str()).await?;
    Ok(HttpResponse::Ok().json(view))
}

//----------------------------------------------   Disputes  ----------------------------------------------------
route!(open_dispute => Post "/disputes" impl EscrowDatabase);
pub async fn open_dispute<B: EscrowDatabase>(
    caller: CallerId,
    body: web::Json<DisputeRequest>,
    api: web::Data<DisputeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let DisputeRequest { order_id, dispute_type, description } = body.into_inner();
    debug!("💻️ POST dispute '{dispute_type}' on order {order_id} by {caller}");
    let (dispute, escrow) =
        api.open_dispute(&order_id, caller.as_str(), &dispute_type, &description, Utc::now()).await?;
    let response = DisputeResponse { dispute, escrow: escrow.map(EscrowView::from) };
    Ok(HttpResponse::Created().json(response))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
route!(my_notifications => Get "/notifications" impl NotificationManagement);
/// The caller's notifications, newest first. Pass `?unread=true` for only the unread ones.
pub async fn my_notifications<B: NotificationManagement>(
    caller: CallerId,
    query: web::Query<NotificationQuery>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET notifications for {caller}");
    let notifications = api.notifications_for_user(caller.as_str(), query.unread).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

route!(mark_notification_read => Put "/notifications/{id}/read" impl NotificationManagement);
pub async fn mark_notification_read<B: NotificationManagement>(
    caller: CallerId,
    path: web::Path<i64>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ PUT notification {id} read by {caller}");
    api.mark_read(id, caller.as_str()).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Notification {id} marked as read"))))
}
