pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod outputs;
pub mod resolver;
pub mod services;

// Re-export specific items if needed for convenient access
pub use config::SessionConfig;
pub use error::SessionError;
pub use kernel::session::{Session, SessionDeps, SessionHandle};
