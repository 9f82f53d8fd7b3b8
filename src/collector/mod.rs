mod core;
mod state;

// Re-export public items
pub use self::core::UsageCollector;
pub use self::state::{CollectorState, UsageReading};
