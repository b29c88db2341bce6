// HTTP request handlers

pub mod api;
pub mod stream;

pub use api::{answer, context, generate, health, sessions, AppState};
pub use stream::stream;
