pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{DemoSeedDataset, ScenarioSeedInfo, SeedResult, VerificationResult};
pub use repositories::RepositoryError;
pub use service::{
    DocumentValidationSummary, Repositories, TransitionReceipt, ValidationRequestDraft,
    ValidationService,
};
