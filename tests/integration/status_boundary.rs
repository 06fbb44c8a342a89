//! Status server over a live scheduler.

use crate::helpers::Running;
use sidequest::config::StatusConfig;
use sidequest::test_utils::{Reply, ScriptedModel};
use sidequest::{StatusServer, StatusSnapshot};
use std::time::Duration;

#[tokio::test]
async fn state_reflects_scheduler_output() {
    let model = ScriptedModel::new("Birds circle overhead.");
    model.when("VILLAGER", Reply::Text("Mind the geese.".into()));
    let running = Running::start(model);
    let server = StatusServer::start(
        running.store.clone(),
        &StatusConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
    )
    .await
    .unwrap();
    let url = format!("http://{}/state", server.addr());

    let empty: StatusSnapshot = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(empty, StatusSnapshot::default());

    running.handle.trigger_villager();
    let mut state = empty;
    for _ in 0..100 {
        state = reqwest::get(&url).await.unwrap().json().await.unwrap();
        if !state.villager.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.villager, "Mind the geese.");
    assert_eq!(state.quest, "");

    // Reads do not disturb the store.
    let again: StatusSnapshot = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(again, state);

    server.shutdown();
    running.stop().await;
}
