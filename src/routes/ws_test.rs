#![allow(clippy::float_cmp)]

use std::net::SocketAddr;

use frames::event::{CONNECTED, JOIN, PRESENCE_JOIN, PRESENCE_LEAVE, SHAPE_ADD, SHAPE_DELETE, UNDO};
use frames::{Data, Identity, Shape, Status};
use futures::{SinkExt, StreamExt};
use mirror::{Applied, SyncEngine};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::*;
use crate::config::ServerConfig;
use crate::state::test_helpers::{self, rect};

// =============================================================
// process_inbound
// =============================================================

async fn recv_board_broadcast(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("broadcast receive timed out")
        .expect("broadcast channel closed unexpectedly")
}

#[tokio::test]
async fn malformed_json_produces_no_reply() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new();
    let (tx, _rx) = mpsc::channel(8);

    let out = process_inbound(&state, &mut session, &tx, frames::decode_json("{not json")).await;

    assert!(out.is_empty());
    assert!(session.board_id().is_none());
}

#[tokio::test]
async fn malformed_protobuf_produces_no_reply() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new();
    let (tx, _rx) = mpsc::channel(8);

    let out = process_inbound(&state, &mut session, &tx, frames::decode_frame(&[0xff, 0x00, 0x01])).await;

    assert!(out.is_empty());
}

#[tokio::test]
async fn unknown_syscall_is_dropped() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new();
    let (tx, _rx) = mpsc::channel(8);
    let frame = Frame::request("board:join", Data::new());
    process_inbound(&state, &mut session, &tx, Ok(frame)).await;

    let out = process_inbound(&state, &mut session, &tx, Ok(Frame::request("wb:syncState", Data::new()))).await;

    assert!(out.is_empty());
}

#[tokio::test]
async fn outbox_closes_once_room_drops_subscriber() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new();
    let (tx, mut rx) = mpsc::channel(1);
    let mut outbox = Outbox::Pending(tx);

    let sender = outbox.sender().expect("pending sender");
    let join = Event::Join { board_id: Some("r1".into()), identity: None }.to_frame();
    process_inbound(&state, &mut session, &sender, Ok(join)).await;
    outbox = Outbox::Subscribed(sender.downgrade());
    drop(sender);
    assert!(outbox.sender().is_some());

    state.rooms.write().await.get_or_create("r1").unsubscribe(session.id);

    assert!(outbox.sender().is_none());
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn unbound_mutation_produces_no_reply_and_no_state() {
    let state = test_helpers::test_app_state();
    let mut session = Session::new();
    let (tx, _rx) = mpsc::channel(8);
    let add = Frame::request(SHAPE_ADD, Data::new()).with_data("shape", json!(rect("s1", 0.0)));

    let out = process_inbound(&state, &mut session, &tx, Ok(add)).await;

    assert!(out.is_empty());
    assert_eq!(state.rooms.read().await.len(), 0);
}

#[tokio::test]
async fn join_returns_snapshot_and_later_mutations_reach_peer() {
    let state = test_helpers::test_app_state();
    let mut a = Session::new();
    let mut b = Session::new();
    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);

    let join = Frame::request(JOIN, Data::new()).with_board_id("r1");
    let out = process_inbound(&state, &mut a, &tx_a, Ok(join.clone())).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].status, Status::Done);
    assert_eq!(out[0].data.get("shapes"), Some(&json!([])));
    process_inbound(&state, &mut b, &tx_b, Ok(join)).await;

    let add = Frame::request(SHAPE_ADD, Data::new()).with_data("shape", json!(rect("s1", 0.0)));
    assert!(process_inbound(&state, &mut a, &tx_a, Ok(add)).await.is_empty());

    let relayed = recv_board_broadcast(&mut rx_b).await;
    assert_eq!(relayed.syscall, SHAPE_ADD);
    assert_eq!(relayed.from, Some(a.id.to_string()));
}

// =============================================================
// End to end over a real socket
// =============================================================

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> (SocketAddr, AppState) {
    let state = AppState::new(ServerConfig::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = crate::routes::app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server failed");
    });
    (addr, state)
}

struct Participant {
    socket: Socket,
    engine: SyncEngine,
}

impl Participant {
    /// Connect, read the welcome frame, join `board_id`, and seed from the snapshot.
    async fn join(addr: SocketAddr, board_id: &str, name: &str) -> Self {
        let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
            .await
            .expect("connect");
        let identity = Identity { id: name.to_lowercase(), name: name.into(), color: "#123456".into() };
        let mut participant = Self { socket, engine: SyncEngine::new(board_id, identity) };

        let welcome = participant.recv().await;
        assert_eq!(welcome.syscall, CONNECTED);
        assert_eq!(participant.engine.receive(&welcome).expect("welcome"), Applied::Session);

        let join = participant.engine.join_frame();
        participant.send(&join).await;
        let snapshot = participant.recv_syscall(JOIN).await;
        assert_eq!(snapshot.parent_id.as_deref(), Some(join.id.as_str()));
        assert_eq!(participant.engine.receive(&snapshot).expect("snapshot"), Applied::Snapshot);
        participant
    }

    async fn send(&mut self, frame: &Frame) {
        let text = frames::encode_json(frame).expect("encode");
        self.socket.send(WsMessage::text(text)).await.expect("send");
    }

    async fn recv(&mut self) -> Frame {
        loop {
            let msg = timeout(Duration::from_secs(2), self.socket.next())
                .await
                .expect("socket receive timed out")
                .expect("socket closed")
                .expect("socket error");
            match msg {
                WsMessage::Text(text) => return frames::decode_json(text.as_str()).expect("decode json"),
                WsMessage::Binary(bytes) => return frames::decode_frame(&bytes).expect("decode protobuf"),
                _ => {}
            }
        }
    }

    /// Receive frames, applying each to the mirror, until one matches `syscall`.
    async fn recv_syscall(&mut self, syscall: &str) -> Frame {
        loop {
            let frame = self.recv().await;
            if frame.syscall == syscall {
                return frame;
            }
            self.engine.receive(&frame).expect("apply");
        }
    }

    async fn apply_next(&mut self, syscall: &str) -> Applied {
        let frame = self.recv_syscall(syscall).await;
        self.engine.receive(&frame).expect("apply")
    }
}

async fn wait_for_shape(state: &AppState, board_id: &str, shape_id: &str) {
    timeout(Duration::from_secs(2), async {
        loop {
            let present = state
                .rooms
                .read()
                .await
                .get(board_id)
                .is_some_and(|room| room.state.snapshot().iter().any(|s| s.id == shape_id));
            if present {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("shape never reached the room");
}

fn ids(shapes: &[Shape]) -> Vec<&str> {
    shapes.iter().map(|s| s.id.as_str()).collect()
}

#[tokio::test]
async fn late_joiner_sees_add_and_follows_delete() {
    let (addr, state) = spawn_server().await;
    let mut a = Participant::join(addr, "r1", "Ann").await;

    let add = a.engine.add(rect("s1", 0.0)).expect("add frame");
    a.send(&add).await;
    wait_for_shape(&state, "r1", "s1").await;

    let mut b = Participant::join(addr, "r1", "Bo").await;
    assert_eq!(ids(b.engine.shapes()), ["s1"]);
    assert_eq!(a.apply_next(PRESENCE_JOIN).await, Applied::Presence);

    let delete = a.engine.delete(vec!["s1".into()]).expect("delete frame");
    a.send(&delete).await;
    assert_eq!(b.apply_next(SHAPE_DELETE).await, Applied::Shapes);

    assert!(b.engine.shapes().is_empty());
    assert!(a.engine.shapes().is_empty());
}

#[tokio::test]
async fn undo_reverts_sender_only() {
    let (addr, _state) = spawn_server().await;
    let mut a = Participant::join(addr, "r3", "Ann").await;
    let mut b = Participant::join(addr, "r3", "Bo").await;
    a.apply_next(PRESENCE_JOIN).await;

    let add = a.engine.add(rect("s2", 0.0)).expect("add frame");
    a.send(&add).await;
    assert_eq!(b.apply_next(SHAPE_ADD).await, Applied::Shapes);

    let undo = a.engine.undo().expect("undo frame");
    a.send(&undo).await;
    assert_eq!(b.apply_next(UNDO).await, Applied::Rerender);

    assert!(a.engine.shapes().is_empty());
    assert_eq!(ids(b.engine.shapes()), ["s2"]);
}

#[tokio::test]
async fn cursor_reaches_peer_with_session_id() {
    let (addr, _state) = spawn_server().await;
    let mut a = Participant::join(addr, "r4", "Ann").await;
    let mut b = Participant::join(addr, "r4", "Bo").await;
    a.apply_next(PRESENCE_JOIN).await;

    let cursor = a.engine.cursor(10.0, 20.0);
    a.send(&cursor).await;
    assert_eq!(b.apply_next("presence:cursor").await, Applied::Presence);

    let a_session = a.engine.session_id().expect("session id").to_owned();
    let peer = b.engine.peers().get(&a_session).expect("peer from cursor");
    assert_eq!(peer.cursor.map(|p| (p.x, p.y)), Some((10.0, 20.0)));
}

#[tokio::test]
async fn disconnect_announces_leave_and_keeps_shapes() {
    let (addr, state) = spawn_server().await;
    let mut a = Participant::join(addr, "r5", "Ann").await;
    let mut b = Participant::join(addr, "r5", "Bo").await;
    a.apply_next(PRESENCE_JOIN).await;

    let add = b.engine.add(rect("kept", 0.0)).expect("add frame");
    b.send(&add).await;
    a.apply_next(SHAPE_ADD).await;
    b.socket.close(None).await.expect("close");

    let leave = a.recv_syscall(PRESENCE_LEAVE).await;
    a.engine.receive(&leave).expect("leave");
    assert!(a.engine.peers().is_empty());
    assert_eq!(
        state.rooms.read().await.get("r5").map(|room| room.state.len()),
        Some(1)
    );
}

#[tokio::test]
async fn binary_client_gets_protobuf_replies() {
    let (addr, _state) = spawn_server().await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws"))
        .await
        .expect("connect");
    let _welcome = socket.next().await.expect("welcome").expect("welcome frame");

    let join = Frame::request(JOIN, Data::new()).with_board_id("bin");
    socket
        .send(WsMessage::binary(frames::encode_frame(&join)))
        .await
        .expect("send");

    let reply = timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("reply timed out")
        .expect("socket closed")
        .expect("socket error");
    let WsMessage::Binary(bytes) = reply else {
        panic!("expected a binary reply, got {reply:?}");
    };
    let frame = frames::decode_frame(&bytes).expect("decode");
    assert_eq!(frame.syscall, JOIN);
    assert_eq!(frame.status, Status::Done);
    assert_eq!(frame.board_id.as_deref(), Some("bin"));
}
