pub mod analysis;
pub mod baseline;
pub mod dashboard;
pub mod engine;
pub mod features;
pub mod insights;
pub mod scenarios;
pub mod signatures;
pub mod snapshot;

pub use engine::Engine;
pub use snapshot::Snapshot;
