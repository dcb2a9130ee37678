//! REST surface over surveys, environments and photo records.

mod auth;
mod handlers;
mod server;

pub use auth::AuthUser;
pub use server::{ApiServer, ApiState};
