mod common;

use common::{ms, open_client};
use std::time::Instant;
use sync_core::{Control, SyncDecision};

#[test]
fn slider_drag_sends_only_the_last_value() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    c.live_mut().sent.clear();

    c.edit(Control::Volume, 10, t0);
    c.edit(Control::Volume, 20, t0 + ms(50));
    c.edit(Control::Volume, 30, t0 + ms(90));

    c.tick(t0 + ms(189));
    assert!(c.live().sent.is_empty());

    c.tick(t0 + ms(190));
    assert_eq!(c.live().lines(), vec!["SET VOL 30"]);
    assert_eq!(c.pending_edits(), 0);
}

#[test]
fn controls_debounce_independently() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    c.live_mut().sent.clear();

    c.edit(Control::Brightness, 40, t0);
    c.edit(Control::Balance, -5, t0);
    assert_eq!(c.next_deadline(), Some(t0 + ms(100)));

    c.tick(t0 + ms(100));
    assert_eq!(c.live().lines(), vec!["SET BAL -5"]);

    c.tick(t0 + ms(150));
    assert_eq!(c.live().lines(), vec!["SET BAL -5", "SET BRI 40"]);
}

#[test]
fn discrete_controls_send_immediately() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    c.live_mut().sent.clear();

    c.select_input(2, t0);
    c.set_mute(false, t0);
    c.send_line("  SET BRI 5  ", t0);
    c.send_line("   ", t0);
    assert_eq!(c.live().lines(), vec!["SET INP 2", "SET MUTE 0", "SET BRI 5"]);
}

#[test]
fn toggle_mute_flips_last_known_state() {
    let t0 = Instant::now();
    let (mut c, id) = open_client(t0);
    c.live_mut().sent.clear();

    c.toggle_mute(t0);
    c.on_message(id, "STATE VOL=10 MUTE=1", t0 + ms(10));
    c.toggle_mute(t0 + ms(20));
    assert_eq!(c.live().lines(), vec!["SET MUTE 1", "SET MUTE 0"]);
}

#[test]
fn refreshes_inside_cooldown_collapse_into_one() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    c.live_mut().sent.clear();

    assert_eq!(c.refresh(t0 + ms(100)), SyncDecision::Deferred(t0 + ms(1500)));
    assert_eq!(c.refresh(t0 + ms(200)), SyncDecision::Deferred(t0 + ms(1500)));
    assert!(c.live().sent.is_empty());

    c.tick(t0 + ms(1500));
    assert_eq!(c.live().lines(), vec!["GET STATE", "GET SELECTOR_LABELS"]);

    assert_eq!(c.request_state_only(t0 + ms(1600)), SyncDecision::Dropped);
    assert_eq!(c.request_state_only(t0 + ms(3000)), SyncDecision::Send);
    assert_eq!(c.live().lines().last(), Some(&"GET STATE"));
}
