pub mod auth;
pub mod state;

pub use auth::AuthenticatedUser;
pub use state::AppState;
