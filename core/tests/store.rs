//! SQLite sink: a saved run reads back intact.

use meshnet_core::{
    config::SimConfig,
    emission_subsystem::PolicyKind,
    engine::run_simulation,
    event::SimEvent,
    scenario::by_name,
    store::SimStore,
};

fn store() -> SimStore {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

#[test]
fn saved_run_reads_back() {
    let store = store();
    let config = SimConfig::default_test(400);
    let (_, bear) = by_name("bear").unwrap();
    let out = run_simulation(&config, &bear, PolicyKind::Pid, 43).unwrap();

    let key = store.save_run(&out).unwrap();
    let run = store.run(key).unwrap().expect("run row");
    assert_eq!(run.run_id, "bear_pid");
    assert_eq!(run.seed, 43);
    assert_eq!(run.policy, "pid");
    assert_eq!(run.days, 400);
    assert!(!run.saved_at.is_empty());

    assert_eq!(store.record_count(key).unwrap(), 400);
    let records = store.records(key).unwrap();
    let last = out.last().unwrap();
    assert_eq!(records.last().map(|r| (r.day, r.active)), Some((last.day, last.active)));
    assert_eq!(store.final_record(key).unwrap().map(|r| r.emission), Some(last.emission));

    let events = store.events(key).unwrap();
    let shape = |e: &SimEvent| (e.type_name(), e.day());
    assert_eq!(
        events.iter().map(shape).collect::<Vec<_>>(),
        out.events.iter().map(shape).collect::<Vec<_>>()
    );
    assert_eq!(store.event_count(key, "shock_fired").unwrap(), 1);
    assert!(events.iter().any(|e| matches!(e, SimEvent::ShockFired { day: 360, .. })));
}

#[test]
fn repeated_run_ids_get_distinct_keys() {
    let store = store();
    let config = SimConfig::default_test(5);
    let (_, bull) = by_name("bull").unwrap();
    let a = store.save_run(&run_simulation(&config, &bull, PolicyKind::Static, 1).unwrap()).unwrap();
    let b = store.save_run(&run_simulation(&config, &bull, PolicyKind::Static, 1).unwrap()).unwrap();
    assert_ne!(a, b);
    assert_eq!(store.find_runs("bull_static", 1).unwrap(), vec![a, b]);
    assert_eq!(store.run_count().unwrap(), 2);
}
