pub mod functions;
pub mod gotrue;
pub mod response;
pub mod session_store;

pub use functions::FunctionsAdapter;
pub use gotrue::GoTrueAdapter;
pub use session_store::SessionStore;
