pub mod engine;
pub mod evaluator;
pub mod ingestor;
pub mod memory;
pub mod platform;
pub mod progress;
pub mod recalculator;
pub mod store;
pub mod supabase_store;

pub use engine::{BadgeEngine, EngineCollaborators};
pub use evaluator::BadgeEvaluator;
pub use ingestor::EventIngestor;
pub use memory::InMemoryPlatform;
pub use platform::SupabaseCollaborators;
pub use recalculator::{RecalculationPolicy, Recalculator};
pub use supabase_store::SupabaseGamificationStore;
