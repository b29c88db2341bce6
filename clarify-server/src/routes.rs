//! Centralized route configuration for the clarify HTTP API.
//!
//! Shared between the main server and handler tests so both wire the same
//! routing table.

use crate::handlers;
use crate::mcp;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .service(
            web::scope("/api")
                .route("/generate", web::post().to(handlers::generate))
                .route("/stream", web::get().to(handlers::stream))
                .route("/answer", web::post().to(handlers::answer))
                .route("/context/{session_id}", web::get().to(handlers::context))
                .route("/sessions", web::get().to(handlers::sessions)),
        )
        .route("/mcp", web::post().to(mcp::http::post_message))
        .route("/mcp", web::get().to(mcp::http::open_stream))
        .route("/mcp", web::delete().to(mcp::http::terminate));
}
