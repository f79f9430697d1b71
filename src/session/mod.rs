//! Session lifecycle
//!
//! - [`SessionState`]: observable authentication state and the session epoch
//! - [`bootstrap`]: restores a stored session at startup
//! - [`SessionManager`]: login, signup, verification, and logout flows

mod bootstrap;
mod manager;
mod state;

pub use bootstrap::bootstrap;
pub use manager::SessionManager;
pub use state::{SessionSnapshot, SessionState};
