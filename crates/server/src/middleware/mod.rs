//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transactions)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded into the span)
//! 4. CORS
//! 5. Session layer (tower-sessions)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalAuth, clear_current_user, set_current_user};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, session_layer};
