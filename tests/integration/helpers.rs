//! Shared harness for the integration tests.

use sidequest::config::{PromptConfig, ScheduleConfig};
use sidequest::test_utils::{FakeFrames, RecordingSpeaker, ScriptedModel};
use sidequest::{JobRunner, Notifier, Scheduler, SchedulerHandle, StatusStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Prompts with distinctive markers so a [`ScriptedModel`] can route replies
/// by job kind.
pub fn tagged_prompts() -> PromptConfig {
    PromptConfig {
        narration: "NARRATE the scene.".into(),
        quest: "GENERATE one quest.".into(),
        villager: "VILLAGER line please.".into(),
        quest_check: "CHECK quest '{quest}'.".into(),
    }
}

/// A scheduler loop running against in-process fakes.
pub struct Running {
    pub handle: SchedulerHandle,
    pub task: JoinHandle<()>,
    pub store: StatusStore,
    pub model: Arc<ScriptedModel>,
    pub speaker: Arc<RecordingSpeaker>,
}

impl Running {
    pub fn start(model: ScriptedModel) -> Self {
        Self::start_with(model, FakeFrames::new(), ScheduleConfig::default())
    }

    pub fn start_with(model: ScriptedModel, frames: FakeFrames, schedule: ScheduleConfig) -> Self {
        let model = Arc::new(model);
        let speaker = Arc::new(RecordingSpeaker::default());
        let store = StatusStore::new();
        let runner = JobRunner::new(
            Arc::new(frames),
            model.clone(),
            tagged_prompts(),
            Duration::from_secs(30),
        );
        let scheduler = Scheduler::new(
            schedule,
            runner,
            store.clone(),
            Notifier::new(speaker.clone()),
        );
        let handle = scheduler.handle();
        let task = scheduler.run();
        Self {
            handle,
            task,
            store,
            model,
            speaker,
        }
    }

    /// Number of model calls whose prompt contains `marker`.
    pub fn calls_tagged(&self, marker: &str) -> usize {
        self.model
            .prompts()
            .iter()
            .filter(|p| p.contains(marker))
            .count()
    }

    /// Advance (virtual) time in small steps until `done` holds or `limit`
    /// has elapsed. Returns whether `done` was reached.
    pub async fn wait_until(&self, limit: Duration, mut done: impl FnMut(&Self) -> bool) -> bool {
        let step = Duration::from_millis(100);
        let mut waited = Duration::ZERO;
        while waited < limit {
            if done(self) {
                return true;
            }
            tokio::time::sleep(step).await;
            waited += step;
        }
        done(self)
    }

    pub async fn stop(self) {
        self.handle.shutdown();
        self.task.await.expect("scheduler task");
    }
}
