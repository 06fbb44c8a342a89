//! Per-kind trigger policies and in-flight bookkeeping.

use crate::config::ScheduleConfig;
use crate::jobs::JobKind;
use crate::quest::QuestMachine;
use tokio::time::{Duration, Instant};

/// Result of asking the scheduler to run a job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A worker was started.
    Dispatched,
    /// A job of this kind is still running.
    InFlight,
    /// The kind ran too recently.
    CoolingDown { remaining: Duration },
    /// The kind's time condition is not met yet.
    NotDue,
    /// Quest checks need an active quest.
    NoActiveQuest,
}

impl DispatchOutcome {
    pub fn is_dispatched(self) -> bool {
        self == Self::Dispatched
    }
}

/// When a kind may run, in addition to not being in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Every tick of its clock.
    Periodic,
    /// When no quest is active or the active one is older than `max_age`.
    StaleQuest { max_age: Duration },
    /// On explicit trigger, at most once per `cooldown`.
    Cooldown { cooldown: Duration },
    /// Every tick of its clock while a quest is active.
    ActiveQuest,
}

impl TriggerPolicy {
    pub fn for_kind(kind: JobKind, schedule: &ScheduleConfig) -> Self {
        match kind {
            JobKind::Narration => Self::Periodic,
            JobKind::QuestGeneration => Self::StaleQuest {
                max_age: schedule.quest_interval(),
            },
            JobKind::VillagerLine => Self::Cooldown {
                cooldown: schedule.villager_cooldown(),
            },
            JobKind::QuestCheck => Self::ActiveQuest,
        }
    }

    /// Decide whether a job may start now.
    pub fn check(
        self,
        slot: &JobSlot,
        quests: &QuestMachine,
        now: Instant,
    ) -> Result<(), DispatchOutcome> {
        if slot.in_flight {
            return Err(DispatchOutcome::InFlight);
        }
        match self {
            Self::Periodic => Ok(()),
            Self::StaleQuest { max_age } => {
                if quests.generation_due(now, max_age) {
                    Ok(())
                } else {
                    Err(DispatchOutcome::NotDue)
                }
            }
            Self::Cooldown { cooldown } => match slot.last_dispatch {
                Some(last) => {
                    let elapsed = now.saturating_duration_since(last);
                    if elapsed < cooldown {
                        Err(DispatchOutcome::CoolingDown {
                            remaining: cooldown - elapsed,
                        })
                    } else {
                        Ok(())
                    }
                }
                None => Ok(()),
            },
            Self::ActiveQuest => {
                if quests.is_active() {
                    Ok(())
                } else {
                    Err(DispatchOutcome::NoActiveQuest)
                }
            }
        }
    }
}

/// Dispatch state of one kind.
#[derive(Debug, Clone, Default)]
pub struct JobSlot {
    in_flight: bool,
    last_dispatch: Option<Instant>,
    dispatched: u64,
}

impl JobSlot {
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Total number of jobs dispatched for this kind.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

/// Dispatch state for every kind.
#[derive(Debug, Clone, Default)]
pub struct JobSlots {
    slots: [JobSlot; 4],
}

impl JobSlots {
    pub fn get(&self, kind: JobKind) -> &JobSlot {
        &self.slots[kind.index()]
    }

    /// Mark `kind` in flight. Returns `false` if it already was.
    pub fn try_acquire(&mut self, kind: JobKind, now: Instant) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.in_flight {
            return false;
        }
        slot.in_flight = true;
        slot.last_dispatch = Some(now);
        slot.dispatched += 1;
        true
    }

    pub fn release(&mut self, kind: JobKind) {
        self.slots[kind.index()].in_flight = false;
    }
}
