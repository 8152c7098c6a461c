mod error;
mod handlers;
mod manage_handlers;
mod middleware;
mod routes;

pub use error::ApiError;
pub use middleware::{CurrentSession, CurrentTenant, Ctx, VerifiedUser, client_ip, limit_addr};
pub use routes::{AppState, auth_routes, dashboard_routes, manage_routes, router};
