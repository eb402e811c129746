use preamp_bridge_mock::MockBridge;
use std::net::TcpListener;
use std::time::Duration;
use sync_core::{Control, Endpoints, LinkStatus, SyncConfig, SyncHandle, SyncUpdate};
use url::Url;

async fn wait_for(handle: &mut SyncHandle, pred: impl Fn(&SyncUpdate) -> bool) -> SyncUpdate {
    let waiting = async {
        loop {
            match handle.recv().await {
                Some(update) if pred(&update) => return update,
                Some(_) => {}
                None => panic!("sync actor stopped"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .expect("timed out waiting for update")
}

fn is_status(status: LinkStatus) -> impl Fn(&SyncUpdate) -> bool {
    move |u| matches!(u, SyncUpdate::Status { status: s } if *s == status)
}

fn endpoints(bridge: &MockBridge) -> Endpoints {
    Endpoints::new(
        Url::parse(&bridge.ws_url()).expect("ws url"),
        Url::parse(&bridge.api_base()).expect("api url"),
    )
}

#[tokio::test]
async fn live_session_applies_edits_and_recovers_from_drop() {
    let bridge = MockBridge::start("127.0.0.1:0", "127.0.0.1:0").expect("start bridge");
    let config = SyncConfig {
        reconnect_delay: Duration::from_millis(200),
        ..SyncConfig::default()
    };
    let mut handle = sync_core::spawn(config, endpoints(&bridge)).expect("spawn");

    wait_for(&mut handle, is_status(LinkStatus::Live)).await;
    wait_for(&mut handle, |u| {
        matches!(u, SyncUpdate::State { state } if state.volume() == Some(30))
    })
    .await;

    handle.edit(Control::Volume, 42).await.expect("edit");
    wait_for(&mut handle, |u| {
        matches!(u, SyncUpdate::State { state } if state.volume() == Some(42))
    })
    .await;
    assert_eq!(bridge.state().volume(), Some(42));
    assert!(bridge.commands().iter().any(|c| c == "SET VOL 42"));

    bridge.close_client(1011);
    wait_for(&mut handle, is_status(LinkStatus::Offline)).await;
    wait_for(&mut handle, is_status(LinkStatus::Live)).await;
    wait_for(&mut handle, |u| matches!(u, SyncUpdate::State { .. })).await;
    assert_eq!(bridge.connection_count(), 2);

    handle.shutdown().await;
    bridge.shutdown();
}

#[tokio::test]
async fn http_fallback_carries_state_and_commands() {
    let bridge = MockBridge::start("127.0.0.1:0", "127.0.0.1:0").expect("start bridge");

    // A port nobody listens on.
    let dead_port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("probe port")
        .port();
    let endpoints = Endpoints::new(
        Url::parse(&format!("ws://127.0.0.1:{dead_port}/ws")).expect("ws url"),
        Url::parse(&bridge.api_base()).expect("api url"),
    );
    let config = SyncConfig {
        startup_grace: Duration::from_millis(50),
        fallback_grace: Duration::from_millis(100),
        reconnect_delay: Duration::from_secs(10),
        ..SyncConfig::default()
    };
    let mut handle = sync_core::spawn(config, endpoints).expect("spawn");

    let mut seen_state = false;
    let mut seen_polling = false;
    while !(seen_state && seen_polling) {
        match wait_for(&mut handle, |_| true).await {
            SyncUpdate::State { state } => seen_state |= state.volume() == Some(30),
            SyncUpdate::Status { status } => seen_polling |= status == LinkStatus::Polling,
            SyncUpdate::Labels { .. } => {}
        }
    }

    handle.select_input(3).await.expect("select input");
    wait_for(&mut handle, |u| {
        matches!(u, SyncUpdate::State { state } if state.input() == Some(3))
    })
    .await;
    assert_eq!(bridge.state().input(), Some(3));
    assert_eq!(bridge.connection_count(), 0);

    handle.shutdown().await;
    bridge.shutdown();
}
