//! Job model: kinds, requests and results.
//!
//! A job is one capture + inference round trip for a specific [`JobKind`].
//! The scheduler issues a [`JobTicket`] when it dispatches, the worker turns
//! it into a [`JobRequest`] once a frame is available, and every ticket
//! produces exactly one [`JobResult`].

use crate::capture::Frame;
use crate::config::PromptConfig;
use crate::error::{OverlayError, Result};
use crate::status::StatusKey;
use uuid::Uuid;

/// Prefix applied to failure text so it is distinguishable from model output.
pub const FAILURE_PREFIX: &str = "Error: ";

/// Synthetic verdict returned when a quest check has no quest to check.
pub const NO_QUEST_VERDICT: &str = "NO - No quest text";

/// Category of background work, each with its own timing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Narration,
    QuestGeneration,
    VillagerLine,
    QuestCheck,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Narration,
        JobKind::QuestGeneration,
        JobKind::VillagerLine,
        JobKind::QuestCheck,
    ];

    /// Stable index into per-kind tables.
    pub fn index(self) -> usize {
        match self {
            Self::Narration => 0,
            Self::QuestGeneration => 1,
            Self::VillagerLine => 2,
            Self::QuestCheck => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Narration => "narration",
            Self::QuestGeneration => "quest",
            Self::VillagerLine => "villager",
            Self::QuestCheck => "quest_check",
        }
    }

    /// Status key this kind's results are published under.
    pub fn status_key(self) -> StatusKey {
        match self {
            Self::Narration => StatusKey::Narration,
            Self::QuestGeneration => StatusKey::Quest,
            Self::VillagerLine => StatusKey::Villager,
            Self::QuestCheck => StatusKey::QuestCheck,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The quest a quest-check job was dispatched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestContext {
    pub quest_id: u64,
    pub text: String,
}

/// A dispatched job before its frame has been captured.
#[derive(Debug, Clone)]
pub struct JobTicket {
    pub id: Uuid,
    pub kind: JobKind,
    /// Only set for [`JobKind::QuestCheck`].
    pub quest: Option<QuestContext>,
}

impl JobTicket {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            quest: None,
        }
    }

    pub fn with_quest(mut self, quest: QuestContext) -> Self {
        self.quest = Some(quest);
        self
    }

    /// Attach the captured frame, consuming the ticket.
    pub fn into_request(self, frame: Frame) -> JobRequest {
        JobRequest {
            id: self.id,
            kind: self.kind,
            frame,
            quest: self.quest,
        }
    }

    pub fn quest_id(&self) -> Option<u64> {
        self.quest.as_ref().map(|q| q.quest_id)
    }
}

/// Immutable input to one inference call.
#[derive(Debug)]
pub struct JobRequest {
    pub id: Uuid,
    pub kind: JobKind,
    pub frame: Frame,
    pub quest: Option<QuestContext>,
}

impl JobRequest {
    /// Render the prompt for this request.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::InvalidState`] for a quest check without quest text.
    pub fn prompt(&self, prompts: &PromptConfig) -> Result<String> {
        render_prompt(self.kind, self.quest.as_ref(), prompts)
    }
}

/// Render the prompt for `kind`.
///
/// # Errors
///
/// Returns [`OverlayError::InvalidState`] for a quest check without quest text.
pub fn render_prompt(
    kind: JobKind,
    quest: Option<&QuestContext>,
    prompts: &PromptConfig,
) -> Result<String> {
    match kind {
        JobKind::Narration => Ok(prompts.narration.clone()),
        JobKind::QuestGeneration => Ok(prompts.quest.clone()),
        JobKind::VillagerLine => Ok(prompts.villager.clone()),
        JobKind::QuestCheck => {
            let quest = quest
                .filter(|q| !q.text.trim().is_empty())
                .ok_or_else(|| OverlayError::InvalidState("no active quest to check".into()))?;
            Ok(prompts.quest_check.replace("{quest}", &quest.text))
        }
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    /// The reason is the same string surfaced as the result text.
    Failure(String),
}

/// Output of one job, delivered exactly once to the kind's handler.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub id: Uuid,
    pub kind: JobKind,
    /// Quest the job was dispatched against (quest checks only).
    pub quest_id: Option<u64>,
    pub text: String,
    pub outcome: JobOutcome,
}

impl JobResult {
    pub fn success(ticket: &JobTicket, text: impl Into<String>) -> Self {
        Self {
            id: ticket.id,
            kind: ticket.kind,
            quest_id: ticket.quest_id(),
            text: text.into(),
            outcome: JobOutcome::Success,
        }
    }

    /// Failed job; the text is the error prefixed with [`FAILURE_PREFIX`].
    pub fn failure(ticket: &JobTicket, error: &OverlayError) -> Self {
        let text = format!("{FAILURE_PREFIX}{error}");
        Self {
            id: ticket.id,
            kind: ticket.kind,
            quest_id: ticket.quest_id(),
            outcome: JobOutcome::Failure(text.clone()),
            text,
        }
    }

    /// Quest check rejected before any I/O because there is no quest.
    pub fn no_quest(ticket: &JobTicket) -> Self {
        Self {
            id: ticket.id,
            kind: ticket.kind,
            quest_id: None,
            text: NO_QUEST_VERDICT.to_owned(),
            outcome: JobOutcome::Failure(NO_QUEST_VERDICT.to_owned()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == JobOutcome::Success
    }
}
