// EventRequest command implementations
//
// Creating and clearing event subscriptions (breakpoints, class
// prepare, method entry/exit, ...)

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::commands::{command_sets, event_kinds, event_request_commands};
use crate::connection::JdwpConnection;
use crate::correlator::Correlator;
use crate::events::{Event, EventModifier};
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::Location;
use crate::writer::Writer;

/// Suspend policy for events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SuspendPolicy {
    None = 0,
    EventThread = 1,
    All = 2,
}

/// A live event subscription: the peer-assigned request id plus the
/// channel its events arrive on.
///
/// Dropping the subscription removes it from the routing table; it
/// does not clear the request in the VM, use
/// [`JdwpConnection::clear_event`] for that.
pub struct Subscription {
    pub request_id: i32,
    pub kind: u8,
    receiver: mpsc::Receiver<Event>,
    correlator: Arc<Correlator>,
}

impl Subscription {
    /// The next matching event, in peer-emitted order. `None` once the
    /// connection closes or the subscription is dropped from routing.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.correlator.unsubscribe(self.request_id);
    }
}

impl JdwpConnection {
    /// Create an event request (EventRequest.Set command)
    ///
    /// The subscriber channel is reserved before the command is
    /// written and re-keyed to the peer-assigned request id as the
    /// reply is decoded, so an event fired immediately after the
    /// request is installed cannot be lost.
    pub async fn set_event(
        &self,
        kind: u8,
        suspend_policy: SuspendPolicy,
        modifiers: &[EventModifier],
    ) -> JdwpResult<Subscription> {
        let correlator = self.correlator().clone();
        let (token, receiver) = correlator.reserve_subscriber()?;

        let mut w = Writer::new(self.id_sizes());
        w.write_u8(kind);
        w.write_u8(suspend_policy as u8);
        w.write_i32(modifiers.len() as i32);
        for modifier in modifiers {
            modifier.encode(&mut w);
        }

        let request_id = match self
            .send_command(
                command_sets::EVENT_REQUEST,
                event_request_commands::SET,
                w.into_bytes(),
            )
            .await
            .and_then(|reply| {
                reply.check_error()?;
                Reader::new(reply.data(), self.id_sizes()).read_i32()
            }) {
            Ok(request_id) => request_id,
            Err(e) => {
                correlator.unsubscribe(token);
                return Err(e);
            }
        };

        correlator.adopt_subscriber(token, request_id);

        Ok(Subscription {
            request_id,
            kind,
            receiver,
            correlator,
        })
    }

    /// Remove an event request (EventRequest.Clear command)
    ///
    /// Also drops the local subscription, ending its event stream.
    pub async fn clear_event(&self, kind: u8, request_id: i32) -> JdwpResult<()> {
        // Stop routing first so events racing the clear are dropped
        // instead of piling into a channel nobody reads.
        self.correlator().unsubscribe(request_id);

        let mut w = Writer::new(self.id_sizes());
        w.write_u8(kind);
        w.write_i32(request_id);

        let reply = self
            .send_command(
                command_sets::EVENT_REQUEST,
                event_request_commands::CLEAR,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()
    }

    /// Remove every breakpoint request (EventRequest.ClearAllBreakpoints command)
    pub async fn clear_all_breakpoints(&self) -> JdwpResult<()> {
        let reply = self
            .send_command(
                command_sets::EVENT_REQUEST,
                event_request_commands::CLEAR_ALL_BREAKPOINTS,
                Vec::new(),
            )
            .await?;
        reply.check_error()
    }

    /// Set a breakpoint at a code location (EventRequest.Set command)
    pub async fn set_breakpoint(
        &self,
        location: Location,
        suspend_policy: SuspendPolicy,
    ) -> JdwpResult<Subscription> {
        self.set_event(
            event_kinds::BREAKPOINT,
            suspend_policy,
            &[EventModifier::LocationOnly(location)],
        )
        .await
    }
}
