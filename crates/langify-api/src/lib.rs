pub mod accounts;
pub mod admin;
pub mod auth;
pub mod error;
pub mod extract;
pub mod lessons;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod sessions;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::{AppState, AppStateInner};
