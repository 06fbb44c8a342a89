//! Scheduler loop.
//!
//! A single tokio task owns every piece of mutable orchestration state (job
//! slots, quest record, pending re-seed). Clocks, external triggers and job
//! results all arrive as events in one `select!` loop, so eligibility checks
//! and in-flight bookkeeping never race each other. Jobs themselves run on
//! worker tasks and report back over the result channel.

use crate::config::ScheduleConfig;
use crate::jobs::{JobKind, JobResult, JobTicket};
use crate::quest::{QuestMachine, VerdictOutcome};
use crate::scheduler::policy::{DispatchOutcome, JobSlots, TriggerPolicy};
use crate::scheduler::worker::{JobRunner, spawn_job};
use crate::speech::Notifier;
use crate::status::{StatusKey, StatusStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Shown instead of an empty narration.
const EMPTY_NARRATION: &str = "...";

/// Spoken when a quest check confirms completion.
const QUEST_COMPLETED_LINE: &str = "Quest completed! Well done.";

/// External events accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Ask for a villager line (subject to cooldown).
    TriggerVillager,
}

/// Cloneable control handle for a running [`Scheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Request a villager line. Returns `false` if the scheduler has stopped.
    pub fn trigger_villager(&self) -> bool {
        self.command_tx
            .send(SchedulerCommand::TriggerVillager)
            .is_ok()
    }

    /// Stop the scheduler loop. In-flight jobs finish but are not applied.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub async fn stopped(&self) {
        self.cancel.cancelled().await;
    }
}

/// Background scheduler for narration, quest and villager jobs.
pub struct Scheduler {
    schedule: ScheduleConfig,
    slots: JobSlots,
    quests: QuestMachine,
    store: StatusStore,
    notifier: Notifier,
    runner: Arc<JobRunner>,
    speak_narration: bool,
    /// When the one-shot quest re-seed fires, if pending.
    reseed_at: Option<Instant>,
    result_tx: mpsc::UnboundedSender<JobResult>,
    result_rx: Option<mpsc::UnboundedReceiver<JobResult>>,
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    command_rx: Option<mpsc::UnboundedReceiver<SchedulerCommand>>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        schedule: ScheduleConfig,
        runner: JobRunner,
        store: StatusStore,
        notifier: Notifier,
    ) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        Self {
            schedule,
            slots: JobSlots::default(),
            quests: QuestMachine::new(),
            store,
            notifier,
            runner: Arc::new(runner),
            speak_narration: false,
            reseed_at: None,
            result_tx,
            result_rx: Some(result_rx),
            command_tx,
            command_rx: Some(command_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Also speak every narration result.
    pub fn with_narration_speech(mut self, enabled: bool) -> Self {
        self.speak_narration = enabled;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn quests(&self) -> &QuestMachine {
        &self.quests
    }

    pub fn slots(&self) -> &JobSlots {
        &self.slots
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Deadline of the pending quest re-seed, if any.
    pub fn reseed_at(&self) -> Option<Instant> {
        self.reseed_at
    }

    /// Start a job of `kind` if its trigger policy allows it at `now`.
    pub fn try_dispatch(&mut self, kind: JobKind, now: Instant) -> DispatchOutcome {
        let policy = TriggerPolicy::for_kind(kind, &self.schedule);
        if let Err(outcome) = policy.check(self.slots.get(kind), &self.quests, now) {
            debug!(kind = %kind, ?outcome, "job not dispatched");
            return outcome;
        }

        if !self.slots.try_acquire(kind, now) {
            return DispatchOutcome::InFlight;
        }

        let mut ticket = JobTicket::new(kind);
        if kind == JobKind::QuestCheck {
            match self.quests.begin_check() {
                Some(quest) => ticket = ticket.with_quest(quest),
                None => {
                    self.slots.release(kind);
                    return DispatchOutcome::NoActiveQuest;
                }
            }
        }

        info!(kind = %kind, job_id = %ticket.id, "dispatching job");
        spawn_job(Arc::clone(&self.runner), ticket, self.result_tx.clone());
        DispatchOutcome::Dispatched
    }

    /// External villager trigger.
    pub fn trigger_villager(&mut self, now: Instant) -> DispatchOutcome {
        self.try_dispatch(JobKind::VillagerLine, now)
    }

    /// Wait for the next job result without applying it.
    ///
    /// Returns `None` once the scheduler loop has taken the receiver.
    pub async fn next_result(&mut self) -> Option<JobResult> {
        self.result_rx.as_mut()?.recv().await
    }

    /// Clear the kind's in-flight flag and apply the result.
    pub fn handle_result(&mut self, result: JobResult, now: Instant) {
        self.slots.release(result.kind);
        debug!(
            kind = %result.kind,
            job_id = %result.id,
            success = result.is_success(),
            "job finished"
        );

        match result.kind {
            JobKind::Narration => self.on_narration(&result),
            JobKind::QuestGeneration => self.on_new_quest(&result, now),
            JobKind::VillagerLine => self.on_villager_line(&result),
            JobKind::QuestCheck => self.on_quest_check(&result, now),
        }
    }

    fn on_narration(&mut self, result: &JobResult) {
        let text = if result.text.is_empty() {
            EMPTY_NARRATION
        } else {
            result.text.as_str()
        };
        self.store.set(StatusKey::Narration, text);
        info!("narrator: {text}");
        if self.speak_narration && result.is_success() {
            self.notifier.notify(text);
        }
    }

    fn on_new_quest(&mut self, result: &JobResult, now: Instant) {
        let text = self.quests.activate(&result.text, now).text.clone();
        self.reseed_at = None;
        self.store.set(StatusKey::Quest, text.as_str());
        info!("new quest: {text}");
        self.notifier.notify(&format!("New quest: {text}"));
    }

    fn on_villager_line(&mut self, result: &JobResult) {
        self.store.set(StatusKey::Villager, result.text.as_str());
        info!("villager: {}", result.text);
        self.notifier.notify(&result.text);
    }

    fn on_quest_check(&mut self, result: &JobResult, now: Instant) {
        self.store.set(StatusKey::QuestCheck, result.text.as_str());
        info!("quest check: {}", result.text);

        match self.quests.apply_verdict(result.quest_id, &result.text) {
            VerdictOutcome::Completed(done) => {
                let delay = self.schedule.quest_reseed_delay();
                info!(quest = %done.text, ?delay, "quest completed, scheduling a new one");
                self.notifier.notify(QUEST_COMPLETED_LINE);
                self.reseed_at = Some(now + delay);
            }
            VerdictOutcome::StillActive => {}
            VerdictOutcome::Stale => {
                debug!(quest_id = ?result.quest_id, "ignoring verdict for inactive quest");
            }
        }
    }

    /// Fire the pending re-seed: generate a new quest unless one already exists.
    pub fn fire_reseed(&mut self, now: Instant) -> DispatchOutcome {
        self.reseed_at = None;
        if self.quests.is_active() {
            return DispatchOutcome::NotDue;
        }
        self.try_dispatch(JobKind::QuestGeneration, now)
    }

    fn handle_command(&mut self, command: SchedulerCommand, now: Instant) {
        match command {
            SchedulerCommand::TriggerVillager => {
                let outcome = self.trigger_villager(now);
                debug!(?outcome, "villager trigger");
            }
        }
    }

    /// Start the scheduler loop on a background task.
    ///
    /// The first tick of each clock happens one period after start.
    pub fn run(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let (Some(mut results), Some(mut commands)) =
                (self.result_rx.take(), self.command_rx.take())
            else {
                error!("scheduler receivers already taken");
                return;
            };
            let cancel = self.cancel.clone();

            let start = Instant::now();
            let mut narration = clock(start, self.schedule.narration_interval());
            let mut quest_poll = clock(start, self.schedule.quest_poll());
            let mut quest_check = clock(start, self.schedule.quest_check_interval());

            info!(
                narration = ?self.schedule.narration_interval(),
                quest_poll = ?self.schedule.quest_poll(),
                quest_check = ?self.schedule.quest_check_interval(),
                "scheduler started"
            );

            loop {
                let reseed_at = self.reseed_at;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    Some(result) = results.recv() => self.handle_result(result, Instant::now()),
                    Some(command) = commands.recv() => self.handle_command(command, Instant::now()),
                    () = sleep_until_opt(reseed_at), if reseed_at.is_some() => {
                        let outcome = self.fire_reseed(Instant::now());
                        debug!(?outcome, "quest re-seed fired");
                    }
                    _ = narration.tick() => {
                        self.try_dispatch(JobKind::Narration, Instant::now());
                    }
                    _ = quest_poll.tick() => {
                        self.try_dispatch(JobKind::QuestGeneration, Instant::now());
                    }
                    _ = quest_check.tick() => {
                        self.try_dispatch(JobKind::QuestCheck, Instant::now());
                    }
                }
            }

            info!("scheduler stopped");
        })
    }
}

fn clock(start: Instant, period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
