mod common;

use common::{client, ms, open_client};
use std::time::Instant;
use sync_core::{CloseInfo, ConnectionState, Control, LinkStatus};

#[test]
fn close_while_hidden_is_not_retried() {
    let t0 = Instant::now();
    let (mut c, id) = open_client(t0);
    c.set_hidden(t0 + ms(10));
    c.on_close(id, CloseInfo::with_code(1006), t0 + ms(20));

    assert!(!c.reconnect_scheduled());
    assert!(!c.fallback_scheduled());
    assert_eq!(c.next_deadline(), None);
}

#[test]
fn hiding_cancels_background_timers() {
    let t0 = Instant::now();
    let (mut c, id) = open_client(t0);
    c.on_close(id, CloseInfo::abnormal("reset"), t0 + ms(10));
    c.tick(t0 + ms(2010));
    c.tick(t0 + ms(3010));
    assert!(c.is_polling());

    c.set_hidden(t0 + ms(3100));
    assert!(!c.is_polling());
    assert!(!c.reconnect_scheduled());
    assert!(!c.fallback_scheduled());
    assert_eq!(c.next_deadline(), None);
}

#[test]
fn becoming_visible_replaces_the_connection_and_polls() {
    let t0 = Instant::now();
    let (mut c, first) = open_client(t0);
    c.set_hidden(t0 + ms(10));

    c.set_visible(t0 + ms(2000));
    assert_eq!(c.live().closed, vec![first]);
    assert_eq!(c.live().opened.len(), 2);
    assert_eq!(c.connection_state(), ConnectionState::Connecting);
    assert_eq!(c.fallback().polls.len(), 1);
}

#[test]
fn resume_signals_are_rate_limited() {
    let t0 = Instant::now();
    let mut c = client();
    c.start(t0);

    c.set_visible(t0 + ms(100));
    assert_eq!(c.live().opened.len(), 2);

    assert!(!c.resume(t0 + ms(600)));
    assert_eq!(c.live().opened.len(), 2);

    assert!(c.resume(t0 + ms(1100)));
    assert_eq!(c.live().opened.len(), 3);
}

#[test]
fn quick_hide_and_show_keeps_health_monitor() {
    let t0 = Instant::now();
    let (mut c, first) = open_client(t0);
    c.set_visible(t0 + ms(100));
    let second = c.live().last_opened();
    c.on_open(second, t0 + ms(150));

    c.set_hidden(t0 + ms(400));
    c.set_visible(t0 + ms(700));
    assert_eq!(c.connection_state(), ConnectionState::Open);
    assert!(c.next_deadline().is_some());

    let state_requests = |c: &common::Engine| {
        c.live().lines().iter().filter(|l| **l == "GET STATE").count()
    };
    for s in 1..=14 {
        c.tick(t0 + ms(700 + s * 1000));
    }
    let quiet = state_requests(&c);
    c.tick(t0 + ms(15_700));
    assert_eq!(state_requests(&c), quiet + 1);

    for s in 16..=60 {
        c.tick(t0 + ms(700 + s * 1000));
    }
    assert_eq!(c.live().opened.len(), 3);
    assert_eq!(c.live().closed, vec![first, second]);
}

#[test]
fn quick_show_after_hidden_close_schedules_reconnect() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    c.set_visible(t0 + ms(100));
    let second = c.live().last_opened();

    c.set_hidden(t0 + ms(300));
    c.on_close(second, CloseInfo::with_code(1006), t0 + ms(400));
    assert!(!c.reconnect_scheduled());

    c.set_visible(t0 + ms(700));
    assert!(c.reconnect_scheduled());
    c.tick(t0 + ms(2700));
    assert_eq!(c.live().opened.len(), 3);
}

#[test]
fn discard_closes_on_purpose() {
    let t0 = Instant::now();
    let (mut c, id) = open_client(t0);

    c.discard(t0 + ms(10));
    assert_eq!(c.live().closed, vec![id]);
    assert_eq!(c.connection_state(), ConnectionState::Closing);

    c.on_close(id, CloseInfo::with_code(1000), t0 + ms(20));
    assert_eq!(c.connection_state(), ConnectionState::Closed);
    assert_eq!(c.status(), LinkStatus::Offline);
    assert!(!c.reconnect_scheduled());
    assert!(!c.fallback_scheduled());
}

#[test]
fn visible_after_discard_reconnects() {
    let t0 = Instant::now();
    let (mut c, id) = open_client(t0);
    c.discard(t0 + ms(10));
    c.on_close(id, CloseInfo::with_code(1000), t0 + ms(20));

    c.set_visible(t0 + ms(5000));
    assert_eq!(c.live().opened.len(), 2);
    assert!(c.is_visible());
}

#[test]
fn stop_drops_pending_edits_and_start_revives() {
    let t0 = Instant::now();
    let (mut c, _) = open_client(t0);
    let baseline = c.live().sent.len();

    c.edit(Control::Volume, 10, t0 + ms(10));
    assert_eq!(c.pending_edits(), 1);
    c.stop(t0 + ms(20));
    assert_eq!(c.pending_edits(), 0);
    assert!(!c.is_running());

    c.tick(t0 + ms(500));
    assert_eq!(c.live().sent.len(), baseline);

    c.send_line("SET VOL 5", t0 + ms(600));
    assert!(c.fallback().posts.is_empty());
    assert_eq!(c.queue().lines(), vec!["SET VOL 5"]);

    c.start(t0 + ms(700));
    assert_eq!(c.live().opened.len(), 2);
    assert_eq!(c.connection_state(), ConnectionState::Connecting);
}

#[test]
fn commands_while_hidden_are_only_queued() {
    let t0 = Instant::now();
    let mut c = client();
    c.start(t0);
    c.set_hidden(t0 + ms(5));

    c.toggle_mute(t0 + ms(10));
    assert!(c.fallback().posts.is_empty());
    assert_eq!(c.queue().lines(), vec!["SET MUTE 1"]);
}
