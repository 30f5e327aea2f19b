//! HTTP API module.
//!
//! JSON endpoints for the patient portal, the clinician queue and
//! membership administration.

mod error;
mod extract;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::ApiJson;
pub use routes::create_router;
pub use state::AppState;
