//! HTTP surface for the lodging search.
//!
//! Exposes the fan-out search both as a single JSON response and as a
//! text/event-stream of search events:
//!
//! ```text
//! POST /api/search         -> { query, total, items }
//! POST /api/search/stream  -> meta, chunk*, done | error
//! GET  /health             -> { ok: true }
//! ```

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{AppError, ErrorBody};
pub use router::create_router;
pub use state::AppState;
