// Request/reply correlation and event routing
//
// Two tables behind one mutex: reply slots keyed by command packet id,
// subscriber channels keyed by event-request id. Lock hold times are a
// hash lookup plus insert/remove; nothing awaits while holding it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::events::Event;
use crate::protocol::{JdwpError, JdwpResult, ReplyPacket};

/// Buffered capacity of one subscriber channel. Events are delivered by
/// the receive loop; the buffer absorbs bursts while the subscriber
/// catches up.
const SUBSCRIBER_BUFFER: usize = 256;

pub(crate) struct Correlator {
    state: Mutex<State>,
}

struct State {
    /// Next command packet id. Monotonic; may wrap on a very long-lived
    /// connection, in which case live ids are skipped.
    next_id: u32,
    /// Next local token for a reserved subscription. Tokens are
    /// negative so they can never collide with a peer-assigned request
    /// id.
    next_token: i32,
    closed: bool,
    replies: HashMap<u32, oneshot::Sender<ReplyPacket>>,
    subscribers: HashMap<i32, mpsc::Sender<Event>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                next_token: -1,
                closed: false,
                replies: HashMap::new(),
                subscribers: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("correlator lock poisoned")
    }

    /// Allocate the next command id and register the caller's one-shot
    /// reply slot under it, atomically.
    pub fn register(&self) -> JdwpResult<(u32, oneshot::Receiver<ReplyPacket>)> {
        let mut state = self.state();
        if state.closed {
            return Err(JdwpError::ConnectionClosed);
        }

        let mut id = state.next_id;
        while state.replies.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        state.next_id = id.wrapping_add(1);

        let (tx, rx) = oneshot::channel();
        state.replies.insert(id, tx);
        Ok((id, rx))
    }

    /// Remove the reply slot for a request that timed out or whose
    /// write failed. A reply arriving later is treated as stray.
    pub fn abandon(&self, id: u32) {
        self.state().replies.remove(&id);
    }

    /// Route a reply to the caller that issued the matching command.
    pub fn deliver_reply(&self, reply: ReplyPacket) {
        let slot = self.state().replies.remove(&reply.id);
        match slot {
            Some(tx) => {
                // A closed slot means the caller gave up (timeout or
                // drop) between our lookup and now.
                if let Err(reply) = tx.send(reply) {
                    debug!(id = reply.id, "caller gone, dropping reply");
                }
            }
            None => warn!(id = reply.id, "reply for unknown command id, dropping"),
        }
    }

    /// Reserve a subscriber channel under a local token, before the
    /// EventRequest.Set command reaches the wire.
    pub fn reserve_subscriber(&self) -> JdwpResult<(i32, mpsc::Receiver<Event>)> {
        let mut state = self.state();
        if state.closed {
            return Err(JdwpError::ConnectionClosed);
        }

        let token = state.next_token;
        state.next_token -= 1;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        state.subscribers.insert(token, tx);
        Ok((token, rx))
    }

    /// Re-key a reserved subscription to the request id the peer
    /// assigned, in one critical section.
    pub fn adopt_subscriber(&self, token: i32, request_id: i32) {
        let mut state = self.state();
        if let Some(tx) = state.subscribers.remove(&token) {
            state.subscribers.insert(request_id, tx);
        }
    }

    /// Drop a subscription (reserved token or adopted request id).
    pub fn unsubscribe(&self, request_id: i32) {
        self.state().subscribers.remove(&request_id);
    }

    /// The sender for the subscription matching an event, cloned out of
    /// the lock so delivery never blocks inside it.
    pub fn subscriber(&self, request_id: i32) -> Option<mpsc::Sender<Event>> {
        self.state().subscribers.get(&request_id).cloned()
    }

    /// Fail every waiter and end every subscription. Called when the
    /// receive loop exits; idempotent.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        // Dropping the senders wakes reply waiters with a recv error
        // (surfaced as ConnectionClosed) and terminates subscriber
        // streams.
        state.replies.clear();
        state.subscribers.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}
