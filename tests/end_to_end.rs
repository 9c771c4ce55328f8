//! Hub and compass behavior over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::codec::{Framed, LinesCodec};

use peer_compass::engine::{run_compass, CompassEngine};
use peer_compass::hub::{serve, Registry};
use peer_compass::indicator::RecordingIndicator;
use peer_compass::protocol::{LocationSample, WireEvent};
use peer_compass::sensors::mock::MockLocationSource;
use peer_compass::storage::Storage;

type Client = Framed<TcpStream, LinesCodec>;

async fn start_hub() -> (&'static Registry, SocketAddr) {
    let registry: &'static Registry = Box::leak(Box::new(Registry::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(registry, listener));
    (registry, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).await.unwrap();
    Framed::new(stream, LinesCodec::new())
}

async fn send(client: &mut Client, event: WireEvent) {
    client
        .send(serde_json::to_string(&event).unwrap())
        .await
        .unwrap();
}

async fn recv_event(client: &mut Client) -> WireEvent {
    let line = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed")
        .expect("codec error");
    serde_json::from_str(&line).unwrap()
}

async fn assert_silent(client: &mut Client) {
    assert!(
        timeout(Duration::from_millis(300), client.next())
            .await
            .is_err(),
        "expected no frame"
    );
}

async fn wait_for_peers(registry: &Registry, n: usize) {
    timeout(Duration::from_secs(5), async {
        while registry.len().await != n {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("registry never reached {n} peers"));
}

#[tokio::test]
async fn fan_out_reaches_everyone_but_the_sender() {
    let (registry, addr) = start_hub().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    wait_for_peers(registry, 3).await;

    let fix = LocationSample::new(48.1, 11.5);
    send(&mut a, WireEvent::update(fix)).await;

    assert_eq!(recv_event(&mut b).await, WireEvent::relay(fix));
    assert_eq!(recv_event(&mut c).await, WireEvent::relay(fix));
    assert_silent(&mut a).await;
    assert_silent(&mut b).await;
    assert_silent(&mut c).await;
}

#[tokio::test]
async fn disconnect_cleans_the_registry() {
    let (registry, addr) = start_hub().await;
    let a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_peers(registry, 2).await;

    drop(a);
    wait_for_peers(registry, 1).await;

    // B's update has nobody left to go to, and the hub keeps running.
    send(&mut b, WireEvent::update(LocationSample::new(1.0, 2.0))).await;
    assert_silent(&mut b).await;

    let mut c = connect(addr).await;
    wait_for_peers(registry, 2).await;
    let fix = LocationSample::new(3.0, 4.0);
    send(&mut b, WireEvent::update(fix)).await;
    assert_eq!(recv_event(&mut c).await, WireEvent::relay(fix));
}

#[tokio::test]
async fn rapid_updates_hold_only_the_latest_position() {
    let (registry, addr) = start_hub().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_peers(registry, 2).await;

    send(&mut a, WireEvent::update(LocationSample::new(1.0, 1.0))).await;
    send(&mut a, WireEvent::update(LocationSample::new(2.0, 2.0))).await;

    // per-sender FIFO towards B
    assert_eq!(
        recv_event(&mut b).await,
        WireEvent::relay(LocationSample::new(1.0, 1.0))
    );
    assert_eq!(
        recv_event(&mut b).await,
        WireEvent::relay(LocationSample::new(2.0, 2.0))
    );

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 2);
    let held: Vec<_> = snapshot.iter().filter_map(|(_, fix)| *fix).collect();
    assert_eq!(held, vec![LocationSample::new(2.0, 2.0)]);
}

#[tokio::test]
async fn malformed_frames_leave_the_connection_open() {
    let (registry, addr) = start_hub().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_peers(registry, 2).await;

    a.send("this is not json").await.unwrap();
    // a client must not be able to inject a server-side event either
    send(&mut a, WireEvent::relay(LocationSample::new(9.0, 9.0))).await;
    assert_silent(&mut b).await;

    let fix = LocationSample::new(5.0, 6.0);
    send(&mut a, WireEvent::update(fix)).await;
    assert_eq!(recv_event(&mut b).await, WireEvent::relay(fix));
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn compass_scenario_points_west() {
    let (registry, addr) = start_hub().await;

    // Peer B sits at (0, 1), faces north, and runs a full engine.
    let storage: &'static Storage = Box::leak(Box::new(Storage::new()));
    storage.update_heading(0.0);
    let source = MockLocationSource::fixed_at(LocationSample::new(0.0, 1.0));
    let handle = source.clone();
    let indicator = RecordingIndicator::new();
    let probe = indicator.clone();
    let server_addr = addr.to_string();
    tokio::spawn(async move {
        let mut engine = CompassEngine::new(storage, source, indicator);
        engine.request_permissions();
        engine.activate();
        let _ = run_compass(&mut engine, &server_addr).await;
    });

    // Peer A sits at (0, 0) and talks the raw protocol.
    let mut a = connect(addr).await;
    wait_for_peers(registry, 2).await;

    // B publishes its position; A receives the relay.
    handle.push_fix(LocationSample::new(0.0, 1.0));
    assert_eq!(
        recv_event(&mut a).await,
        WireEvent::relay(LocationSample::new(0.0, 1.0))
    );

    // A publishes; B computes bearing 270 (due west) relative to heading 0.
    send(&mut a, WireEvent::update(LocationSample::new(0.0, 0.0))).await;
    let angle = timeout(Duration::from_secs(5), async {
        loop {
            if let Some(angle) = probe.last_angle() {
                return angle;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("the needle never moved");
    assert!((angle - 270.0).abs() < 1e-6, "got {angle}");

    // B's readout mirrors its own watch fix.
    assert_eq!(
        probe.coordinate_lines(),
        vec!["Your Coordinates: 0.0000, 1.0000".to_owned()]
    );
}
