//! HTTP facade: routes, auth header parsing, CORS.

pub mod routes;
pub mod state;

pub use routes::{api_routes, build_app, cors_layer};
pub use state::AppState;
