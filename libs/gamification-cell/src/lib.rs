pub mod catalog;
pub mod error;
pub mod models;
pub mod services;

// Re-export the engine surface for the other cells
pub use error::{GamificationError, GamificationResult};
pub use models::*;
pub use services::*;
