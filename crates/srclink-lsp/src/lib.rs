pub mod config;
pub mod handlers;
pub mod server;
pub mod state;

// Re-export commonly used types
pub use config::SrclinkConfig;
pub use server::Backend;
pub use state::{LinkContext, ServerState};
