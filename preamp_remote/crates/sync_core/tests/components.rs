use std::time::{Duration, Instant};
use sync_core::protocol::DeviceState;
use sync_core::{
    CommandQueue, Control, Debouncer, LifecycleCoordinator, LinkStatus, SyncDecision, SyncKind,
    SyncThrottle, SyncUpdate,
};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn queue_keeps_one_entry_per_attribute() {
    let mut q = CommandQueue::default();
    assert!(q.enqueue("set vol 1"));
    assert!(q.enqueue("SET INP 2"));
    assert!(q.enqueue("SET VOL 2"));
    assert!(q.enqueue("GET STATE"));
    assert!(q.enqueue("GET STATE"));
    assert!(!q.enqueue("   "));

    assert_eq!(
        q.lines(),
        vec!["SET INP 2", "SET VOL 2", "GET STATE", "GET STATE"]
    );
    assert_eq!(q.iter().next().and_then(|c| c.key()), Some("INP"));
}

#[test]
fn queue_evicts_oldest_at_capacity() {
    let mut q = CommandQueue::with_capacity(3);
    for line in ["SET VOL 1", "SET BAL 1", "SET BRI 1", "SET INP 1"] {
        q.enqueue(line);
    }
    assert_eq!(q.len(), 3);
    assert_eq!(q.lines(), vec!["SET BAL 1", "SET BRI 1", "SET INP 1"]);
    assert_eq!(CommandQueue::with_capacity(0).capacity(), 1);
}

#[test]
fn queue_flush_requeues_failures() {
    let mut q = CommandQueue::default();
    q.enqueue("SET VOL 1");
    q.enqueue("SET MUTE 1");
    q.enqueue("SET INP 4");

    let mut sent = Vec::new();
    let report = q.flush(|line| {
        if line.contains("MUTE") {
            return Err(());
        }
        sent.push(line.to_string());
        Ok(())
    });

    assert_eq!(report.sent, 2);
    assert_eq!(report.requeued, 1);
    assert_eq!(sent, vec!["SET VOL 1", "SET INP 4"]);
    assert_eq!(q.lines(), vec!["SET MUTE 1"]);
}

#[test]
fn debouncer_restarts_quiet_period_per_key() {
    let t0 = Instant::now();
    let mut d = Debouncer::new();
    d.schedule(Control::Volume, "SET VOL 1", ms(100), t0);
    d.schedule(Control::Balance, "SET BAL 1", ms(100), t0 + ms(20));
    d.schedule(Control::Volume, "SET VOL 2", ms(100), t0 + ms(50));

    assert_eq!(d.next_deadline(), Some(t0 + ms(120)));
    assert!(d.take_due(t0 + ms(119)).is_empty());
    assert_eq!(
        d.take_due(t0 + ms(150)),
        vec![
            (Control::Balance, "SET BAL 1".to_string()),
            (Control::Volume, "SET VOL 2".to_string()),
        ]
    );
    assert!(d.is_empty());

    d.schedule(Control::Brightness, "SET BRI 3", ms(150), t0);
    assert!(d.cancel(&Control::Brightness));
    assert!(!d.is_pending(&Control::Brightness));
}

#[test]
fn throttle_defers_full_and_drops_state_only() {
    let t0 = Instant::now();
    let mut t = SyncThrottle::new(ms(1500), ms(500));

    assert_eq!(t.request(SyncKind::Full, t0), SyncDecision::Send);
    assert_eq!(
        t.request(SyncKind::Full, t0 + ms(10)),
        SyncDecision::Deferred(t0 + ms(1500))
    );
    assert!(t.has_deferred());
    assert_eq!(
        t.request(SyncKind::StateOnly, t0 + ms(20)),
        SyncDecision::Dropped
    );

    assert!(!t.fire_deferred(t0 + ms(1499)));
    assert!(t.fire_deferred(t0 + ms(1500)));
    assert_eq!(t.request(SyncKind::Full, t0 + ms(1500)), SyncDecision::Send);

    assert_eq!(
        t.request(SyncKind::StateOnly, t0 + ms(3000)),
        SyncDecision::Send
    );
    assert_eq!(t.cooldown_until(), Some(t0 + ms(3500)));
}

#[test]
fn lifecycle_tracks_intent_and_rate_limits_resume() {
    let t0 = Instant::now();
    let mut l = LifecycleCoordinator::new(ms(1000));
    assert!(l.is_visible());
    assert!(!l.close_is_intentional());

    l.mark_hidden();
    assert!(l.close_is_intentional());
    assert!(!l.intentional_close());

    l.mark_discarded();
    assert!(l.intentional_close());
    l.mark_visible();
    assert!(!l.close_is_intentional());

    assert!(l.allow_resume(t0));
    assert!(!l.allow_resume(t0 + ms(999)));
    assert!(l.allow_resume(t0 + ms(1000)));
}

#[test]
fn updates_serialize_as_tagged_json() {
    let status = SyncUpdate::Status {
        status: LinkStatus::Polling,
    };
    assert_eq!(
        serde_json::to_value(&status).expect("json"),
        serde_json::json!({"type": "status", "status": "polling"})
    );

    let state = SyncUpdate::State {
        state: DeviceState::parse("STATE VOL=5 MUTE=0").expect("state line"),
    };
    assert_eq!(
        serde_json::to_value(&state).expect("json"),
        serde_json::json!({"type": "state", "state": {"VOL": "5", "MUTE": "0"}})
    );
}
