//! A small books API with request correlation turned on.
//!
//! Run with:
//!   SELLO_LOG_JSON=true cargo run --example books
//!
//! Try:
//!   curl -i http://localhost:3000/books
//!   curl -i http://localhost:3000/books/99        # 404, no requestId in body
//!   curl -i http://localhost:3000/books/1/reviews # 500, body quotes the requestId
//!   curl -i -X POST http://localhost:3000/books \
//!        -H 'content-type: application/json' -d '{"title":"Hyperion"}'
//!
//! Every response carries `x-request-id`; grep the logs for it.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use sello::config::Config;
use sello::context::RequestContext;
use sello::{HttpError, Json, Request, Router, Server, StatusCode, health, telemetry};

#[derive(Clone, Serialize)]
struct Book {
    id: u32,
    title: String,
}

#[derive(Deserialize)]
struct NewBook {
    title: String,
}

type Shelf = Arc<RwLock<BTreeMap<u32, Book>>>;

#[tokio::main]
async fn main() -> Result<(), sello::Error> {
    let config = Config::from_env();
    let _guard = telemetry::init(&config.logging)?;

    let shelf: Shelf = Arc::new(RwLock::new(BTreeMap::from([
        (1, Book { id: 1, title: "Dune".to_owned() }),
        (2, Book { id: 2, title: "Solaris".to_owned() }),
    ])));

    let app = Router::new()
        .get("/books", {
            let shelf = Arc::clone(&shelf);
            move |req: Request| list_books(Arc::clone(&shelf), req)
        })
        .get("/books/{id}", {
            let shelf = Arc::clone(&shelf);
            move |req: Request| get_book(Arc::clone(&shelf), req)
        })
        .post("/books", {
            let shelf = Arc::clone(&shelf);
            move |req: Request| create_book(Arc::clone(&shelf), req)
        })
        .get("/books/{id}/reviews", reviews)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
        .correlated(&config.pipeline);

    Server::bind(config.server.addr()?.to_string()).serve(app).await
}

async fn list_books(shelf: Shelf, _req: Request) -> Result<Json<Vec<Book>>, HttpError> {
    let books = shelf.read().map_err(|_| HttpError::server("Shelf unavailable"))?;
    Ok(Json(books.values().cloned().collect()))
}

async fn get_book(shelf: Shelf, req: Request) -> Result<Json<Book>, HttpError> {
    let id: u32 = req
        .param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| HttpError::bad_request("Book id must be a number"))?;
    let books = shelf.read().map_err(|_| HttpError::server("Shelf unavailable"))?;
    books
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| HttpError::not_found("Book not found"))
}

async fn create_book(shelf: Shelf, req: Request) -> Result<(StatusCode, Json<Book>), HttpError> {
    let input: NewBook = req.json()?;
    if input.title.trim().is_empty() {
        return Err(HttpError::unprocessable("Title must not be empty"));
    }
    let mut books = shelf.write().map_err(|_| HttpError::server("Shelf unavailable"))?;
    let id = books.keys().next_back().map_or(1, |last| last + 1);
    let book = Book { id, title: input.title };
    books.insert(id, book.clone());

    if let Some(ctx) = RequestContext::current() {
        tracing::info!(request_id = %ctx.id(), book_id = id, "book created");
    }
    Ok((StatusCode::CREATED, Json(book)))
}

/// The reviews service is not wired up yet; this fails the way an
/// unexpected bug would.
async fn reviews(_req: Request) -> Result<String, HttpError> {
    let raw = std::fs::read_to_string("/var/lib/books/reviews.json")?;
    Ok(raw)
}
