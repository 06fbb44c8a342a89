//! Quest lifecycle.
//!
//! ```text
//! Inactive ──generation──▶ Active ──generation──▶ Active (new text)
//!                            │
//!                            └──affirmative check──▶ Completed ──reseed──▶ Active
//! ```
//!
//! The machine only tracks the record; timers (replacement interval,
//! re-seed delay) are owned by the scheduler.

use crate::jobs::QuestContext;
use tokio::time::{Duration, Instant};

/// Text stored when quest generation returns nothing.
pub const PLACEHOLDER_QUEST: &str = "Unknown quest.";

/// Lifecycle phase of the current quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestPhase {
    /// No quest has been generated yet.
    Inactive,
    Active,
    /// Active with a quest check in flight.
    PendingCompletion,
    /// The last quest was completed and no new one exists yet.
    Completed,
}

/// The active quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestRecord {
    /// Monotonic id, fresh for every activation.
    pub id: u64,
    pub text: String,
    pub activated_at: Instant,
}

/// Effect of a quest-check verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictOutcome {
    /// Affirmative verdict for the active quest; the record was cleared.
    Completed(QuestRecord),
    /// Negative verdict (or failure text); nothing changed.
    StillActive,
    /// Verdict for a quest that is no longer active; ignored.
    Stale,
}

/// Returns `true` when `verdict` starts, case-insensitively, with `yes`
/// after leading whitespace.
pub fn is_affirmative(verdict: &str) -> bool {
    verdict
        .trim_start()
        .as_bytes()
        .get(..3)
        .is_some_and(|head| head.eq_ignore_ascii_case(b"yes"))
}

/// Tracks the active quest and its phase.
#[derive(Debug, Default)]
pub struct QuestMachine {
    current: Option<QuestRecord>,
    next_id: u64,
    check_in_flight: bool,
    completed: bool,
}

impl QuestMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> QuestPhase {
        match (&self.current, self.check_in_flight) {
            (Some(_), true) => QuestPhase::PendingCompletion,
            (Some(_), false) => QuestPhase::Active,
            (None, _) if self.completed => QuestPhase::Completed,
            (None, _) => QuestPhase::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&QuestRecord> {
        self.current.as_ref()
    }

    /// Store `text` as the new active quest, replacing any current one.
    ///
    /// Any text activates a quest, including failure text; empty text is
    /// replaced with [`PLACEHOLDER_QUEST`].
    pub fn activate(&mut self, text: &str, now: Instant) -> &QuestRecord {
        let text = text.trim();
        let text = if text.is_empty() {
            PLACEHOLDER_QUEST
        } else {
            text
        };
        self.next_id += 1;
        self.completed = false;
        self.current.insert(QuestRecord {
            id: self.next_id,
            text: text.to_owned(),
            activated_at: now,
        })
    }

    /// Whether a new quest should be generated at `now`.
    pub fn generation_due(&self, now: Instant, max_age: Duration) -> bool {
        match &self.current {
            None => true,
            Some(quest) => now.saturating_duration_since(quest.activated_at) >= max_age,
        }
    }

    /// Snapshot of the active quest for a quest-check dispatch, marking the
    /// check as in flight. Returns `None` when no quest is active.
    pub fn begin_check(&mut self) -> Option<QuestContext> {
        let quest = self.current.as_ref()?;
        self.check_in_flight = true;
        Some(QuestContext {
            quest_id: quest.id,
            text: quest.text.clone(),
        })
    }

    /// Apply a quest-check result dispatched against `quest_id`.
    pub fn apply_verdict(&mut self, quest_id: Option<u64>, verdict: &str) -> VerdictOutcome {
        self.check_in_flight = false;

        let matches_current = match (&self.current, quest_id) {
            (Some(current), Some(id)) => current.id == id,
            _ => false,
        };
        if !matches_current {
            return VerdictOutcome::Stale;
        }
        if !is_affirmative(verdict) {
            return VerdictOutcome::StillActive;
        }

        match self.current.take() {
            Some(done) => {
                self.completed = true;
                VerdictOutcome::Completed(done)
            }
            None => VerdictOutcome::Stale,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn affirmative_detection() {
        assert!(is_affirmative("YES - key retrieved"));
        assert!(is_affirmative("  yes, the door is open"));
        assert!(is_affirmative("Yes"));
        assert!(!is_affirmative("NO - still locked"));
        assert!(!is_affirmative("Error: inference timed out after 30s"));
        assert!(!is_affirmative("ye"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("The answer is yes"));
    }

    #[test]
    fn generation_activates_quest() {
        let now = Instant::now();
        let mut quests = QuestMachine::new();
        assert_eq!(quests.phase(), QuestPhase::Inactive);

        let record = quests.activate("Find the hidden key", now).clone();
        assert_eq!(record.text, "Find the hidden key");
        assert_eq!(record.activated_at, now);
        assert_eq!(quests.phase(), QuestPhase::Active);
    }

    #[test]
    fn empty_generation_uses_placeholder() {
        let mut quests = QuestMachine::new();
        assert_eq!(quests.activate("   ", Instant::now()).text, PLACEHOLDER_QUEST);
        assert!(quests.is_active());
    }

    #[test]
    fn failure_text_still_activates() {
        let mut quests = QuestMachine::new();
        let record = quests.activate("Error: inference failed: HTTP 500: boom", Instant::now());
        assert!(record.text.starts_with("Error: "));
        assert!(quests.is_active());
    }

    #[test]
    fn each_activation_gets_a_fresh_id() {
        let now = Instant::now();
        let mut quests = QuestMachine::new();
        let first = quests.activate("one", now).id;
        let second = quests.activate("two", now).id;
        assert_ne!(first, second);
    }

    #[test]
    fn generation_due_tracks_activation_time() {
        let start = Instant::now();
        let max_age = Duration::from_secs(300);
        let mut quests = QuestMachine::new();
        assert!(quests.generation_due(start, max_age));

        quests.activate("Climb the tower", start);
        assert!(!quests.generation_due(start + Duration::from_secs(299), max_age));
        assert!(quests.generation_due(start + Duration::from_secs(300), max_age));
    }

    #[test]
    fn begin_check_requires_active_quest() {
        let mut quests = QuestMachine::new();
        assert!(quests.begin_check().is_none());
        assert_eq!(quests.phase(), QuestPhase::Inactive);

        quests.activate("Open the chest", Instant::now());
        let ctx = quests.begin_check().unwrap();
        assert_eq!(ctx.text, "Open the chest");
        assert_eq!(quests.phase(), QuestPhase::PendingCompletion);
    }

    #[test]
    fn affirmative_verdict_clears_quest() {
        let mut quests = QuestMachine::new();
        quests.activate("Find the hidden key", Instant::now());
        let ctx = quests.begin_check().unwrap();

        let outcome = quests.apply_verdict(Some(ctx.quest_id), "YES - key retrieved");
        assert!(matches!(outcome, VerdictOutcome::Completed(ref r) if r.text == "Find the hidden key"));
        assert!(!quests.is_active());
        assert_eq!(quests.phase(), QuestPhase::Completed);
    }

    #[test]
    fn negative_verdict_keeps_quest() {
        let mut quests = QuestMachine::new();
        let before = quests.activate("Find the hidden key", Instant::now()).clone();
        let ctx = quests.begin_check().unwrap();

        assert_eq!(
            quests.apply_verdict(Some(ctx.quest_id), "NO - no key in sight"),
            VerdictOutcome::StillActive
        );
        assert_eq!(quests.current(), Some(&before));
        assert_eq!(quests.phase(), QuestPhase::Active);
    }

    #[test]
    fn verdict_for_replaced_quest_is_stale() {
        let now = Instant::now();
        let mut quests = QuestMachine::new();
        quests.activate("Old quest", now);
        let ctx = quests.begin_check().unwrap();
        quests.activate("New quest", now);

        assert_eq!(
            quests.apply_verdict(Some(ctx.quest_id), "YES - done"),
            VerdictOutcome::Stale
        );
        assert_eq!(quests.current().unwrap().text, "New quest");
    }

    #[test]
    fn second_affirmative_verdict_is_stale() {
        let mut quests = QuestMachine::new();
        quests.activate("Find the hidden key", Instant::now());
        let ctx = quests.begin_check().unwrap();
        assert!(matches!(
            quests.apply_verdict(Some(ctx.quest_id), "YES"),
            VerdictOutcome::Completed(_)
        ));
        assert_eq!(
            quests.apply_verdict(Some(ctx.quest_id), "YES"),
            VerdictOutcome::Stale
        );
    }
}
