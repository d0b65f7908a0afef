// src/quiz/mod.rs

pub mod normalize;
pub mod registry;
pub mod scoring;
pub mod session;

pub use registry::SessionRegistry;
pub use session::{LoadOutcome, QuizPhase, QuizSession, SubmitOutcome, SubmitTrigger};
