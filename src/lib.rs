//! Sidequest: a screen-watching game companion.
//!
//! Periodically samples the screen, asks a vision model for a short
//! narration, a quest, a quest-completion verdict or a villager line, and
//! publishes the latest results for an overlay to poll.
//!
//! # Architecture
//!
//! - **Capture**: grabs and downscales a frame via a screenshot program or file
//! - **Inference**: sends prompt + frame to a vision model (Gemini)
//! - **Scheduler**: one loop owning clocks, cooldowns and the quest record
//! - **Status**: latest text per job kind, served as JSON on `GET /state`
//! - **Speech**: fire-and-forget TTS for quest and villager announcements

pub mod capture;
pub mod config;
pub mod error;
pub mod inference;
pub mod jobs;
pub mod quest;
pub mod scheduler;
pub mod server;
pub mod speech;
pub mod status;

#[doc(hidden)]
pub mod test_utils;

pub use config::OverlayConfig;
pub use error::{OverlayError, Result};
pub use jobs::{JobKind, JobOutcome, JobResult};
pub use quest::{QuestMachine, QuestPhase, QuestRecord};
pub use scheduler::{DispatchOutcome, JobRunner, Scheduler, SchedulerHandle};
pub use server::StatusServer;
pub use speech::Notifier;
pub use status::{StatusKey, StatusSnapshot, StatusStore};
