#![allow(dead_code)]

use std::time::Duration;
use tokio::sync::watch;

use tokio::task::JoinHandle;
use whodares::config::GameConfig;
use whodares::coordinator::{Coordinator, CoordinatorHandle, CoordinatorService};
use whodares::replica::{ReplicaHandle, ReplicaService, SessionEnd};
use whodares::state::GameState;
use whodares::transport::memory::MemoryHub;

pub const ROOM: &str = "TEST";

pub fn test_config() -> GameConfig {
    GameConfig {
        welcome_delay: Duration::from_millis(10),
        ..GameConfig::default()
    }
}

pub fn start_coordinator(hub: &MemoryHub, config: GameConfig) -> CoordinatorHandle {
    let (transport, events) = hub.join(ROOM);
    CoordinatorService::spawn(Coordinator::with_seed("Host", config, 7), transport, events)
}

pub fn start_replica(hub: &MemoryHub, name: &str) -> (ReplicaHandle, JoinHandle<SessionEnd>) {
    let (transport, events) = hub.join(ROOM);
    ReplicaService::spawn(transport, events, name)
}

/// Wait until the watched value satisfies `pred`, failing the test after a
/// few seconds
pub async fn wait_until<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    let value = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("watch channel closed");
    T::clone(&value)
}

/// Wait until a replica's snapshot satisfies `pred`
pub async fn replica_until(
    replica: &ReplicaHandle,
    mut pred: impl FnMut(&GameState) -> bool,
) -> GameState {
    let mut rx = replica.subscribe();
    let state = wait_until(&mut rx, |state| state.as_ref().is_some_and(|s| pred(s))).await;
    state.expect("snapshot present")
}
