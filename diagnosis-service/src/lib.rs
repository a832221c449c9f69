pub mod error;
pub mod models;
pub mod runner;
pub mod service;
pub mod sessions;

pub use error::ServiceError;
pub use runner::TraversalRunner;
pub use service::{AppState, create_app};
pub use sessions::{InMemorySessionStorage, SessionStorage, TraversalSession};
pub use models::*;
