mod answer;
mod ids;
mod profile;
mod question;
mod session;
mod sheet;
mod snapshot;

pub use answer::{AnswerError, AnswerValue};
pub use ids::{ClientId, ParseIdError, QuestionId, RecordId};
pub use profile::{Gender, Profile, ProfileError, age_on};
pub use question::{CatalogError, Question, QuestionCatalog};
pub use session::{Advance, Session, SessionPhase, SessionProgress, ValidationError};
pub use sheet::AnswerSheet;
pub use snapshot::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot, SnapshotError, default_snapshot_ttl};
