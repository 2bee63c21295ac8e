// The active-spawn gauge is process-global, so it gets its own test binary
// where nothing else moves it.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use penguin_bot::creature::Creature;
use penguin_bot::metrics;
use penguin_bot::spawn::SpawnState;

#[test]
fn test_active_spawn_gauge_follows_slot() {
    let state = Arc::new(SpawnState::new());
    let emperor = Arc::new(Creature::new("Emperor", "emperor.png"));
    let t0 = Instant::now();

    assert!(state.try_activate(emperor.clone(), t0));
    assert_eq!(metrics::ACTIVE_SPAWN.get(), 1);
    assert!(state.try_resolve().is_some());
    assert_eq!(metrics::ACTIVE_SPAWN.get(), 0);

    assert!(state.try_activate(emperor.clone(), t0));
    assert!(state
        .expire(t0 + Duration::from_secs(120), Duration::from_secs(60))
        .is_some());
    assert_eq!(metrics::ACTIVE_SPAWN.get(), 0);

    // Spawners and catchers racing must never leave the gauge out of step.
    let mut handles = Vec::new();
    for i in 0..8 {
        let state = state.clone();
        let emperor = emperor.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..500 {
                if i % 2 == 0 {
                    state.try_activate(emperor.clone(), Instant::now());
                } else {
                    state.try_resolve();
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(
        metrics::ACTIVE_SPAWN.get(),
        i64::from(state.peek().is_active())
    );
}
