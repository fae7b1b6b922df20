//! # EduThrift escrow server
//! This crate hosts the HTTP server for the escrow engine. It is responsible for:
//! * Opening an escrow at checkout and sending the buyer to their chosen payment gateway.
//! * Receiving signed payment notifications from PayFast, Ozow and PayGate, and funding the escrow.
//! * Receiving signed courier and locker webhooks, and releasing funds once the buyer has the goods.
//! * Running the auto-refund sweeps on a timetable.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /checkout`: Opens an escrow and returns where to send the buyer.
//! * `POST /payfast/notify`, `POST /ozow/notify`, `POST /paygate/notify`: Gateway payment notifications.
//! * `POST /shipping/webhook`: Courier and locker status updates, signed with HMAC-SHA256.
//! * `POST /orders/{order_id}/shipment`: The seller registers the courier and tracking number.
//! * `POST /escrow/release/{order_id}`: The buyer confirms receipt.
//! * `GET /escrow/{order_id}`: The escrow for one of the caller's orders.
//! * `POST /disputes`: The buyer opens a dispute.
//! * `GET /notifications`, `PUT /notifications/{id}/read`: The caller's notifications.
//!
//! Callers are identified by the `X-User-Id` header, which is set by the authentication layer in front of this
//! service.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
