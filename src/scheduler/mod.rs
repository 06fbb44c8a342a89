//! Job scheduling.
//!
//! Four job kinds share one scheduling loop: narration and quest checks run
//! on fixed clocks, quest generation polls for a stale or missing quest, and
//! villager lines are triggered externally with a cooldown. At most one job
//! of each kind is in flight at any time.

pub mod policy;
pub mod runner;
pub mod worker;

pub use policy::{DispatchOutcome, JobSlot, JobSlots, TriggerPolicy};
pub use runner::{Scheduler, SchedulerCommand, SchedulerHandle};
pub use worker::{JobRunner, spawn_job};
