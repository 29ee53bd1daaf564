// Blocking wait-for-event coordination
//
// Combines an event request, the subscription, an optional thread
// resume, predicate filtering, and Clear cleanup into one operation.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::commands::event_kinds;
use crate::connection::JdwpConnection;
use crate::eventrequest::{Subscription, SuspendPolicy};
use crate::events::{Event, EventKind, EventModifier};
use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{ClassId, MethodId, ThreadId};

impl JdwpConnection {
    /// Block until an event matching `predicate` fires.
    ///
    /// Installs an event request for `kind` with the given modifiers,
    /// optionally resumes `wake_up` so the target can make progress
    /// toward the event, then reads the subscription until the
    /// predicate accepts an event, `cancel` fires (`Cancelled`), or the
    /// connection closes (`ConnectionClosed`). A method entry or exit
    /// the predicate rejects resumes its thread and keeps waiting, so
    /// filtering on a specific method does not strand the target.
    ///
    /// The event request is cleared before returning, on every exit
    /// path.
    pub async fn wait_for_event<F>(
        &self,
        kind: u8,
        suspend_policy: SuspendPolicy,
        modifiers: &[EventModifier],
        wake_up: Option<ThreadId>,
        cancel: &CancellationToken,
        predicate: F,
    ) -> JdwpResult<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        let mut subscription = self.set_event(kind, suspend_policy, modifiers).await?;

        let outcome = self
            .wait_on(&mut subscription, wake_up, cancel, predicate)
            .await;

        // Cleanup runs even when the wait failed; a dangling request
        // would keep suspending threads long after anyone listens.
        if let Err(e) = self.clear_event(kind, subscription.request_id).await {
            match &outcome {
                Ok(_) => warn!(
                    request_id = subscription.request_id,
                    "failed to clear event request: {e}"
                ),
                // The wait already failed; clearing over a dead
                // connection failing too is expected.
                Err(_) => debug!(
                    request_id = subscription.request_id,
                    "failed to clear event request: {e}"
                ),
            }
        }

        outcome
    }

    async fn wait_on<F>(
        &self,
        subscription: &mut Subscription,
        wake_up: Option<ThreadId>,
        cancel: &CancellationToken,
        mut predicate: F,
    ) -> JdwpResult<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        if let Some(thread) = wake_up {
            self.resume_thread(thread).await?;
        }

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Err(JdwpError::Cancelled),
                event = subscription.recv() => match event {
                    Some(event) => event,
                    None => return Err(JdwpError::ConnectionClosed),
                },
            };

            if predicate(&event) {
                return Ok(event);
            }
            debug!(
                request_id = subscription.request_id,
                kind = event.kind,
                "event rejected by predicate, waiting on"
            );

            // The wrong method suspended its thread; let it run so the
            // right one can be reached.
            if let EventKind::MethodEntry { thread, .. } | EventKind::MethodExit { thread, .. } =
                event.details
            {
                self.resume_thread(thread).await?;
            }
        }
    }

    /// Wait for a class matching `pattern` to be prepared.
    ///
    /// The pattern follows the class-match modifier rules: a full class
    /// name, optionally with `*` at one end (`"Calculator"`,
    /// `"com.example.*"`).
    pub async fn wait_for_class_prepare(
        &self,
        pattern: &str,
        cancel: &CancellationToken,
    ) -> JdwpResult<Event> {
        self.wait_for_event(
            event_kinds::CLASS_PREPARE,
            SuspendPolicy::EventThread,
            &[EventModifier::ClassMatch(pattern.to_string())],
            None,
            cancel,
            |_| true,
        )
        .await
    }

    /// Wait for `method` on `class` to be entered.
    ///
    /// Pass `wake_up` to resume the thread that is about to reach the
    /// method before blocking.
    pub async fn wait_for_method_entry(
        &self,
        class: ClassId,
        method: MethodId,
        wake_up: Option<ThreadId>,
        cancel: &CancellationToken,
    ) -> JdwpResult<Event> {
        self.wait_for_event(
            event_kinds::METHOD_ENTRY,
            SuspendPolicy::EventThread,
            &[EventModifier::ClassOnly(class.into())],
            wake_up,
            cancel,
            move |event| {
                matches!(
                    &event.details,
                    EventKind::MethodEntry { location, .. } if location.method_id == method
                )
            },
        )
        .await
    }

    /// Wait for `method` on `class` to return.
    pub async fn wait_for_method_exit(
        &self,
        class: ClassId,
        method: MethodId,
        wake_up: Option<ThreadId>,
        cancel: &CancellationToken,
    ) -> JdwpResult<Event> {
        self.wait_for_event(
            event_kinds::METHOD_EXIT,
            SuspendPolicy::EventThread,
            &[EventModifier::ClassOnly(class.into())],
            wake_up,
            cancel,
            move |event| {
                matches!(
                    &event.details,
                    EventKind::MethodExit { location, .. } if location.method_id == method
                )
            },
        )
        .await
    }
}
