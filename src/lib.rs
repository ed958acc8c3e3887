//! # sello
//!
//! A minimal HTTP framework for services that need to answer one question
//! after the fact: *what happened to that request?*
//!
//! Every request gets a correlation id the moment it enters the pipeline.
//! The id is echoed in the `x-request-id` response header, stamped on every
//! log record emitted while the request is served, and, when something
//! breaks on our side, handed to the caller in the error body so they can
//! quote it to support.
//!
//! ## The pipeline
//!
//! ```text
//! RequestIdStage   mint id, open the request context and tracing span
//! RequestLog       "request received" / "request completed" records
//! Cors             (optional) expose x-request-id to browser scripts
//! ErrorResponse    Err(HttpError) → {"message", "requestId"?}
//! ErrorLog         record the error with its internal detail
//! handler          your code; Result<impl IntoResponse, HttpError>
//! ```
//!
//! [`Router::correlated`] registers that stack in that order.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use sello::{HttpError, Json, Request, Router, Server, config::Config, telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sello::Error> {
//!     let config = Config::from_env();
//!     let _guard = telemetry::init(&config.logging)?;
//!
//!     let app = Router::new()
//!         .get("/books/{id}", get_book)
//!         .correlated(&config.pipeline);
//!
//!     Server::bind(config.server.addr()?.to_string()).serve(app).await
//! }
//!
//! async fn get_book(req: Request) -> Result<Json<&'static str>, HttpError> {
//!     match req.param("id") {
//!         Some("1") => Ok(Json("Dune")),
//!         _ => Err(HttpError::not_found("Book not found")),
//!     }
//! }
//! ```

mod error;
mod fault;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod config;
pub mod context;
pub mod health;
pub mod middleware;
pub mod telemetry;

pub use error::Error;
pub use fault::{Fault, HttpError, UNKNOWN_ERROR};
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
