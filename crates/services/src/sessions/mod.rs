mod confirm;
mod controller;
mod events;

pub use confirm::{ConfirmPrompt, Confirmation, FixedAnswer};
pub use controller::{AdvanceOutcome, ResumeOutcome, SessionController};
pub use events::SessionEvent;
