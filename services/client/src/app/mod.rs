pub mod auth_flow;
pub mod bootstrap;
pub mod history;
pub mod library;
pub mod mfa_flow;
pub mod profile;
pub mod recommendations;
pub mod state;

// Re-export the pieces the binary wires together at startup.
pub use bootstrap::{start, AuthListener};
pub use state::{new_store, Action, AppState, AppStore, StoreHandle};
