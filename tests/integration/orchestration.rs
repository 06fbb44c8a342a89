//! Scheduler loop behaviour against in-process fakes, on a paused clock.

use crate::helpers::Running;
use sidequest::StatusKey;
use sidequest::config::ScheduleConfig;
use sidequest::test_utils::{FakeFrames, Reply, ScriptedModel};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn quest_is_generated_checked_and_reseeded() {
    let model = ScriptedModel::new("The hero waits.");
    model
        .when("GENERATE", Reply::Text("Find the hidden key".into()))
        .when("CHECK", Reply::Text("YES - key retrieved".into()))
        .when("GENERATE", Reply::Text("Light the beacon".into()));
    let running = Running::start(model);

    // First quest poll at 60s, first check with a quest at 75s, re-seed 5s later.
    let reseeded = running
        .wait_until(Duration::from_secs(200), |r| {
            r.store.get(StatusKey::Quest) == "Light the beacon"
        })
        .await;
    assert!(reseeded, "quest was not re-seeded");
    assert_eq!(running.calls_tagged("GENERATE"), 2);

    let checks: Vec<String> = running
        .model
        .prompts()
        .into_iter()
        .filter(|p| p.contains("CHECK"))
        .collect();
    assert_eq!(checks[0], "CHECK quest 'Find the hidden key'.");

    // Each notification plays on its own thread, so only membership is stable.
    let spoken = running.speaker.wait_for(3, Duration::from_secs(2));
    for line in [
        "New quest: Find the hidden key",
        "Quest completed! Well done.",
        "New quest: Light the beacon",
    ] {
        assert!(spoken.iter().any(|s| s == line), "missing {line:?} in {spoken:?}");
    }

    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_quest_check_before_first_quest() {
    let running = Running::start(ScriptedModel::new("Nothing happens."));

    running.wait_until(Duration::from_secs(59), |_| false).await;

    assert_eq!(running.calls_tagged("CHECK"), 0);
    assert_eq!(running.calls_tagged("GENERATE"), 0);
    assert!(running.calls_tagged("NARRATE") >= 10);
    assert_eq!(running.store.get(StatusKey::Narration), "Nothing happens.");
    assert_eq!(running.store.get(StatusKey::QuestCheck), "");

    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn villager_trigger_respects_cooldown() {
    let model = ScriptedModel::new("Nice weather.");
    model.when("VILLAGER", Reply::Text("Halt, traveller!".into()));
    let running = Running::start(model);

    assert!(running.handle.trigger_villager());
    assert!(running.handle.trigger_villager());
    assert!(
        running
            .wait_until(Duration::from_secs(5), |r| {
                r.store.get(StatusKey::Villager) == "Halt, traveller!"
            })
            .await
    );

    running.wait_until(Duration::from_secs(10), |_| false).await;
    assert!(running.handle.trigger_villager());
    running.wait_until(Duration::from_secs(1), |_| false).await;
    assert_eq!(running.calls_tagged("VILLAGER"), 1);

    running.wait_until(Duration::from_secs(25), |_| false).await;
    assert!(running.handle.trigger_villager());
    assert!(
        running
            .wait_until(Duration::from_secs(5), |r| r.calls_tagged("VILLAGER") == 2)
            .await
    );

    assert!(
        running
            .speaker
            .wait_for(1, Duration::from_secs(2))
            .contains(&"Halt, traveller!".to_owned())
    );
    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn hung_narration_stays_single_and_times_out() {
    let model = ScriptedModel::new("Quiet fields.");
    model.when("NARRATE", Reply::Hang);
    model.when("VILLAGER", Reply::Text("Lovely day.".into()));
    let running = Running::start(model);

    running.wait_until(Duration::from_secs(20), |_| false).await;
    assert_eq!(running.calls_tagged("NARRATE"), 1);

    // Other kinds are unaffected by the stuck narration.
    assert!(running.handle.trigger_villager());
    assert!(
        running
            .wait_until(Duration::from_secs(2), |r| {
                r.store.get(StatusKey::Villager) == "Lovely day."
            })
            .await
    );

    assert!(
        running
            .wait_until(Duration::from_secs(30), |r| {
                r.store.get(StatusKey::Narration) == "Error: inference timed out after 30s"
            })
            .await
    );

    // The next tick dispatches a fresh narration.
    assert!(
        running
            .wait_until(Duration::from_secs(10), |r| {
                r.store.get(StatusKey::Narration) == "Quiet fields."
            })
            .await
    );
    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn capture_failure_is_published() {
    let running = Running::start_with(
        ScriptedModel::new("unused"),
        FakeFrames::unavailable(),
        ScheduleConfig::default(),
    );

    assert!(
        running
            .wait_until(Duration::from_secs(10), |r| {
                r.store.get(StatusKey::Narration) == "Error: capture failed: no capture surface"
            })
            .await
    );
    assert_eq!(running.model.calls(), 0);
    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn short_intervals_drive_every_clock() {
    let schedule = ScheduleConfig {
        narration_interval_secs: 1,
        quest_poll_secs: 2,
        quest_check_interval_secs: 3,
        ..ScheduleConfig::default()
    };
    let model = ScriptedModel::new("NO - not yet");
    model.when("GENERATE", Reply::Text("Count the sheep".into()));
    let running = Running::start_with(model, FakeFrames::new(), schedule);

    assert!(
        running
            .wait_until(Duration::from_secs(10), |r| {
                r.store.get(StatusKey::QuestCheck) == "NO - not yet"
            })
            .await
    );
    assert_eq!(running.store.get(StatusKey::Quest), "Count the sheep");
    running.stop().await;
}

#[tokio::test(start_paused = true)]
async fn trigger_after_shutdown_is_rejected() {
    let running = Running::start(ScriptedModel::new("unused"));
    let handle = running.handle.clone();
    running.stop().await;

    assert!(handle.is_shutdown());
    assert!(!handle.trigger_villager());
}
