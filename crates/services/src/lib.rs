#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod persistence;
pub mod profile_store;
pub mod sessions;
pub mod timer;

pub use assess_core::Clock;

pub use api::{ApiClient, HistoryEntry, HistorySource, QuestionSource, ScoringBackend, SubmissionResult};
pub use app_services::AppServices;
pub use catalog::CatalogLoader;
pub use config::{ApiConfig, SessionSettings, TimerPolicy};
pub use error::{ApiError, AppServicesError, CatalogLoadError, ConfigError, PersistenceError, SessionError};
pub use identity::IdentityProvider;
pub use persistence::SnapshotStore;
pub use profile_store::ProfileMemory;
pub use sessions::{
    AdvanceOutcome, ConfirmPrompt, Confirmation, FixedAnswer, ResumeOutcome, SessionController,
    SessionEvent,
};
pub use timer::{CountdownTimer, TimerEvent, TimerEventKind};
