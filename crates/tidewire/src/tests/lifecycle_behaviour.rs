//! Behavioural tests for draining, shutdown gating, and broadcast.

use std::cell::RefCell;
use std::net::TcpStream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::client::Client;
use crate::dispatch::Execution;
use crate::engine::{DrainError, Engine, Hooks, Lifecycle};
use crate::protocol::{CMD_PING, Message};
use crate::test_support::{PeerCodec, QueuedClient, loopback_pair, settings, wait_until};

const RECORDED_CMD: u32 = 5;
const BLOCKING_CMD: u32 = 6;

struct LifecycleWorld {
    engine: Arc<Engine>,
    client: QueuedClient,
    handled: Arc<AtomicUsize>,
    entered: Receiver<()>,
    release: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    drain: Option<Result<(), DrainError>>,
    peers: Vec<(Arc<Client>, TcpStream)>,
    delivered: usize,
}

impl LifecycleWorld {
    fn new() -> Self {
        let handled = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let mut engine = Engine::new(settings(), Hooks::new());
        let counter = Arc::clone(&handled);
        engine
            .handle(RECORDED_CMD, Execution::Inline, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .expect("register recorded command");
        engine
            .handle(BLOCKING_CMD, Execution::Inline, move |_, _| {
                entered_tx.send(()).expect("signal entry");
                // A dropped sender also releases the handler.
                let _ = release_rx.lock().expect("release lock").recv();
            })
            .expect("register blocking command");
        engine.start().expect("start engine");

        Self {
            engine: Arc::new(engine),
            client: QueuedClient::new(),
            handled,
            entered,
            release: Some(release),
            worker: None,
            drain: None,
            peers: Vec::new(),
            delivered: 0,
        }
    }

    fn deliver(&self, cmd: u32) {
        self.engine
            .on_message(&self.client.client, Message::new(cmd, Vec::new()));
    }
}

impl Drop for LifecycleWorld {
    fn drop(&mut self) {
        self.release.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.engine.close_all();
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

#[given("a running lifecycle engine")]
fn given_running(world: &RefCell<LifecycleWorld>) {
    assert_eq!(world.borrow().engine.lifecycle(), Lifecycle::Running);
}

#[given("{count} accepted connections")]
fn given_connections(world: &RefCell<LifecycleWorld>, count: usize) {
    let mut world = world.borrow_mut();
    for _ in 0..count {
        let (server, peer) = loopback_pair();
        let client = world.engine.accept(server).expect("accept");
        world.peers.push((client, peer));
    }
}

#[when("a handler is blocked mid-dispatch")]
fn when_handler_blocked(world: &RefCell<LifecycleWorld>) {
    let mut world = world.borrow_mut();
    let engine = Arc::clone(&world.engine);
    let client = Arc::clone(&world.client.client);
    world.worker = Some(thread::spawn(move || {
        engine.on_message(&client, Message::new(BLOCKING_CMD, Vec::new()));
    }));
    world
        .entered
        .recv_timeout(Duration::from_secs(2))
        .expect("handler entered");
}

#[when("the engine drains with a {millis} millisecond budget")]
fn when_drains(world: &RefCell<LifecycleWorld>, millis: u64) {
    let mut world = world.borrow_mut();
    let result = world.engine.drain(Duration::from_millis(millis));
    world.drain = Some(result);
}

#[when("the client sends the recorded command and a ping")]
fn when_recorded_and_ping(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    world.deliver(RECORDED_CMD);
    world.deliver(CMD_PING);
}

#[when("one connection is stopped")]
fn when_one_stopped(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let (client, _) = world.peers.first().expect("at least one connection");
    client.stop();
}

#[when("the engine broadcasts a message")]
fn when_broadcast(world: &RefCell<LifecycleWorld>) {
    let mut world = world.borrow_mut();
    world.delivered = world.engine.broadcast(&Message::new(11, b"news".to_vec()));
}

#[then("the drain succeeds")]
fn then_drain_succeeds(world: &RefCell<LifecycleWorld>) {
    assert_eq!(world.borrow().drain, Some(Ok(())));
}

#[then("the drain reports {count} handler still running")]
fn then_drain_reports(world: &RefCell<LifecycleWorld>, count: usize) {
    assert_eq!(
        world.borrow().drain,
        Some(Err(DrainError { in_flight: count }))
    );
}

#[then("the engine is stopped")]
fn then_stopped(world: &RefCell<LifecycleWorld>) {
    assert_eq!(world.borrow().engine.lifecycle(), Lifecycle::Stopped);
}

#[then("no handler runs and nothing is queued")]
fn then_nothing_happens(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    assert_eq!(world.handled.load(Ordering::SeqCst), 0);
    assert!(world.client.drain().is_empty());
}

#[then("the broadcast reaches {count} connections")]
fn then_broadcast_reaches(world: &RefCell<LifecycleWorld>, count: usize) {
    let mut world = world.borrow_mut();
    assert_eq!(world.delivered, count);
    let mut received = 0;
    for (client, peer) in &mut world.peers {
        if client.is_stopped() {
            continue;
        }
        let message = PeerCodec::new().read(peer);
        assert_eq!(message.body(), b"news");
        received += 1;
    }
    assert_eq!(received, count);
}

#[then("the stopped connection is unregistered")]
fn then_unregistered(world: &RefCell<LifecycleWorld>) {
    let world = world.borrow();
    let expected = world.peers.len() - 1;
    assert!(wait_until(|| world.engine.client_count() == expected));
}

#[scenario(path = "tests/features/lifecycle.feature")]
fn engine_lifecycle(#[from(world)] world: RefCell<LifecycleWorld>) {
    drop(world);
}
