//! The transport contract (spec.md §6): a bidirectional, ordered, reliable
//! message channel between one server and each client. Transport itself
//! is explicitly out of scope (spec.md §1) — these traits are the seam an
//! embedder fills in with a real socket.
//!
//! Grounded on `lightyear_connection::client::ClientState` for the
//! connection lifecycle vocabulary, and on the teacher's in-memory
//! `lightyear_crossbeam` loopback transport (same-process client+server)
//! for `channel`, this crate's own test transport.

use crate::shared::clock_sync::{Ping, Pong};
use crate::shared::id::ClientId;
use crate::shared::snapshot::Snapshot;

/// Every channel listed in spec.md §6's external-interfaces table, plus
/// `ClockReport` (C→S), which the spec requires behaviorally ("the server
/// stores the latest reported {clockOffset, rtt} per client") without
/// naming a wire message for it.
#[derive(Debug, Clone)]
pub enum Message<W, I, A> {
    /// S→C, once on connect.
    Config {
        tick_rate: u32,
        tick_interval_ms: u32,
        interpolation_delay_ms: u32,
    },
    /// S→C.
    Snapshot(Snapshot<W>),
    /// S→C, periodic (~1Hz).
    ServerTiming { server_tick: u32, server_time: f64 },
    /// C→S.
    Input { seq: u32, input: I, timestamp: f64 },
    /// C→S.
    Action { seq: u32, action: A, client_timestamp: f64 },
    /// S→C.
    ActionResult {
        seq: u32,
        success: bool,
        result: Option<String>,
        server_timestamp: f64,
    },
    /// C→S.
    Ping(Ping),
    /// S→C.
    Pong(Pong),
    /// S→C.
    Join { player_id: ClientId },
    /// S→C.
    Leave { player_id: ClientId },
    /// C→S: the client's own ClockSync estimate, for the Lag Compensator.
    ClockReport { offset_ms: f64, rtt_ms: f64 },
}

impl<W, I, A> Message<W, I, A> {
    /// Short, allocation-free name for the active variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Config { .. } => "Config",
            Message::Snapshot(_) => "Snapshot",
            Message::ServerTiming { .. } => "ServerTiming",
            Message::Input { .. } => "Input",
            Message::Action { .. } => "Action",
            Message::ActionResult { .. } => "ActionResult",
            Message::Ping(_) => "Ping",
            Message::Pong(_) => "Pong",
            Message::Join { .. } => "Join",
            Message::Leave { .. } => "Leave",
            Message::ClockReport { .. } => "ClockReport",
        }
    }
}

/// Events a server-side transport delivers to the orchestrator.
pub enum ServerEvent<W, I, A> {
    Connect(ClientId),
    Disconnect(ClientId),
    Message(ClientId, Message<W, I, A>),
}

/// What a [`crate::server::orchestrator::ServerOrchestrator`] requires
/// from a transport.
pub trait ServerTransport<W, I, A> {
    /// Drain every event received since the last call. Malformed payloads
    /// are the transport's problem to surface as a dropped event, not a
    /// panic (spec.md §4.2 failure semantics: malformed messages are
    /// logged and discarded upstream of this trait, not here).
    fn drain_events(&mut self) -> Vec<ServerEvent<W, I, A>>;

    fn send(&mut self, to: &ClientId, msg: Message<W, I, A>);

    fn broadcast(&mut self, msg: Message<W, I, A>)
    where
        Message<W, I, A>: Clone;
}

/// Events a client-side transport delivers to the orchestrator.
pub enum ClientEvent<W, I, A> {
    Connected,
    Disconnected,
    Message(Message<W, I, A>),
}

/// What a [`crate::client::orchestrator::ClientOrchestrator`] requires
/// from a transport.
pub trait ClientTransport<W, I, A> {
    fn drain_events(&mut self) -> Vec<ClientEvent<W, I, A>>;

    fn send(&mut self, msg: Message<W, I, A>);
}

/// An in-memory, same-process loopback transport pairing one
/// [`ChannelServer`] with any number of [`ChannelClientSide`]s, used by
/// this crate's own integration tests. Stands in for the teacher's
/// `lightyear_crossbeam` IO layer.
pub mod channel {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    type Inbox<W, I, A> = Rc<RefCell<VecDeque<Message<W, I, A>>>>;

    /// Shared plumbing for one client connection: a queue each direction.
    struct ChannelPair<W, I, A> {
        to_server: Inbox<W, I, A>,
        to_client: Inbox<W, I, A>,
    }

    impl<W, I, A> Clone for ChannelPair<W, I, A> {
        fn clone(&self) -> Self {
            Self {
                to_server: self.to_server.clone(),
                to_client: self.to_client.clone(),
            }
        }
    }

    /// The server side: holds every connected client's pair and
    /// implements [`ServerTransport`].
    pub struct ChannelServer<W, I, A> {
        clients: indexmap::IndexMap<ClientId, ChannelPair<W, I, A>>,
        pending: VecDeque<ServerEvent<W, I, A>>,
    }

    impl<W, I, A> Default for ChannelServer<W, I, A> {
        fn default() -> Self {
            Self {
                clients: indexmap::IndexMap::new(),
                pending: VecDeque::new(),
            }
        }
    }

    impl<W, I, A> ChannelServer<W, I, A> {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a new client connection and returns its client-side
        /// handle. Queues a [`ServerEvent::Connect`] for the next
        /// `drain_events` call.
        pub fn connect(&mut self, id: ClientId) -> ChannelClientSide<W, I, A> {
            let pair = ChannelPair {
                to_server: Rc::new(RefCell::new(VecDeque::new())),
                to_client: Rc::new(RefCell::new(VecDeque::new())),
            };
            self.clients.insert(id.clone(), pair.clone());
            self.pending.push_back(ServerEvent::Connect(id.clone()));
            ChannelClientSide {
                inner: pair,
                connected_emitted: false,
            }
        }

        pub fn disconnect(&mut self, id: &ClientId) {
            if self.clients.shift_remove(id).is_some() {
                self.pending.push_back(ServerEvent::Disconnect(id.clone()));
            }
        }
    }

    impl<W, I, A> ServerTransport<W, I, A> for ChannelServer<W, I, A> {
        fn drain_events(&mut self) -> Vec<ServerEvent<W, I, A>> {
            let mut events: Vec<_> = self.pending.drain(..).collect();
            for (id, pair) in self.clients.iter() {
                for msg in pair.to_server.borrow_mut().drain(..) {
                    events.push(ServerEvent::Message(id.clone(), msg));
                }
            }
            events
        }

        fn send(&mut self, to: &ClientId, msg: Message<W, I, A>) {
            if let Some(pair) = self.clients.get(to) {
                pair.to_client.borrow_mut().push_back(msg);
            }
        }

        fn broadcast(&mut self, msg: Message<W, I, A>)
        where
            Message<W, I, A>: Clone,
        {
            for pair in self.clients.values() {
                pair.to_client.borrow_mut().push_back(msg.clone());
            }
        }
    }

    /// One client's handle onto a [`ChannelServer`] connection.
    pub struct ChannelClientSide<W, I, A> {
        inner: ChannelPair<W, I, A>,
        connected_emitted: bool,
    }

    impl<W, I, A> ClientTransport<W, I, A> for ChannelClientSide<W, I, A> {
        fn drain_events(&mut self) -> Vec<ClientEvent<W, I, A>> {
            let mut events = Vec::new();
            if !self.connected_emitted {
                events.push(ClientEvent::Connected);
                self.connected_emitted = true;
            }
            for msg in self.inner.to_client.borrow_mut().drain(..) {
                events.push(ClientEvent::Message(msg));
            }
            events
        }

        fn send(&mut self, msg: Message<W, I, A>) {
            self.inner.to_server.borrow_mut().push_back(msg);
        }
    }
}
