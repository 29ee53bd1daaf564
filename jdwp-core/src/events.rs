// JDWP event handling
//
// Events are sent from the JVM inside composite packets to notify about
// breakpoints, class loading, method entry, and so on.

use serde::{Deserialize, Serialize};

use crate::commands::{event_kinds, modifier_kinds};
use crate::protocol::{JdwpError, JdwpResult};
use crate::reader::Reader;
use crate::types::*;
use crate::writer::Writer;

/// Composite event packet (one suspend policy, one or more events)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSet {
    pub suspend_policy: u8,
    pub events: Vec<Event>,
}

/// Single event within an event set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: u8,
    pub request_id: i32,
    pub details: EventKind,
}

impl Event {
    /// The thread that produced the event, for kinds that carry one.
    pub fn thread(&self) -> Option<ThreadId> {
        match self.details {
            EventKind::VmStart { thread }
            | EventKind::ThreadStart { thread }
            | EventKind::ThreadDeath { thread }
            | EventKind::ClassPrepare { thread, .. }
            | EventKind::SingleStep { thread, .. }
            | EventKind::Breakpoint { thread, .. }
            | EventKind::MethodEntry { thread, .. }
            | EventKind::MethodExit { thread, .. }
            | EventKind::FieldAccess { thread, .. }
            | EventKind::FieldModification { thread, .. }
            | EventKind::Exception { thread, .. }
            | EventKind::ExceptionCatch { thread, .. } => Some(thread),
            EventKind::VmDeath | EventKind::ClassUnload { .. } => None,
        }
    }

    /// The code location, for kinds that carry one.
    pub fn location(&self) -> Option<Location> {
        match self.details {
            EventKind::SingleStep { location, .. }
            | EventKind::Breakpoint { location, .. }
            | EventKind::MethodEntry { location, .. }
            | EventKind::MethodExit { location, .. }
            | EventKind::FieldAccess { location, .. }
            | EventKind::FieldModification { location, .. }
            | EventKind::Exception { location, .. }
            | EventKind::ExceptionCatch { location, .. } => Some(location),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    VmStart {
        thread: ThreadId,
    },
    VmDeath,
    ThreadStart {
        thread: ThreadId,
    },
    ThreadDeath {
        thread: ThreadId,
    },
    ClassPrepare {
        thread: ThreadId,
        ref_type_tag: u8,
        type_id: ReferenceTypeId,
        signature: String,
        status: i32,
    },
    ClassUnload {
        signature: String,
    },
    SingleStep {
        thread: ThreadId,
        location: Location,
    },
    Breakpoint {
        thread: ThreadId,
        location: Location,
    },
    MethodEntry {
        thread: ThreadId,
        location: Location,
    },
    MethodExit {
        thread: ThreadId,
        location: Location,
    },
    FieldAccess {
        thread: ThreadId,
        location: Location,
        ref_type_tag: u8,
        type_id: ReferenceTypeId,
        field_id: FieldId,
        object: ObjectId,
    },
    FieldModification {
        thread: ThreadId,
        location: Location,
        ref_type_tag: u8,
        type_id: ReferenceTypeId,
        field_id: FieldId,
        object: ObjectId,
        value_to_be: Value,
    },
    Exception {
        thread: ThreadId,
        location: Location,
        exception: ObjectId,
        /// Absent for uncaught exceptions.
        catch_location: Option<Location>,
    },
    ExceptionCatch {
        thread: ThreadId,
        location: Location,
    },
}

/// Filters attached to an event request. Encoding is one-way; the peer
/// never sends modifiers back.
#[derive(Debug, Clone)]
pub enum EventModifier {
    /// Fire after being hit this many times, then expire.
    Count(i32),
    ThreadOnly(ThreadId),
    ClassOnly(ReferenceTypeId),
    /// Class name pattern, `*` allowed at one end.
    ClassMatch(String),
    ClassExclude(String),
    LocationOnly(Location),
    ExceptionOnly {
        ref_type: ReferenceTypeId,
        caught: bool,
        uncaught: bool,
    },
    FieldOnly {
        ref_type: ReferenceTypeId,
        field_id: FieldId,
    },
    Step {
        thread: ThreadId,
        size: i32,
        depth: i32,
    },
    InstanceOnly(ObjectId),
}

impl EventModifier {
    /// Wire layout: 1-byte mod kind, then the kind-specific body.
    pub(crate) fn encode(&self, w: &mut Writer) {
        match self {
            EventModifier::Count(count) => {
                w.write_u8(modifier_kinds::COUNT);
                w.write_i32(*count);
            }
            EventModifier::ThreadOnly(thread) => {
                w.write_u8(modifier_kinds::THREAD_ONLY);
                w.write_object_id(*thread);
            }
            EventModifier::ClassOnly(ref_type) => {
                w.write_u8(modifier_kinds::CLASS_ONLY);
                w.write_reference_type_id(*ref_type);
            }
            EventModifier::ClassMatch(pattern) => {
                w.write_u8(modifier_kinds::CLASS_MATCH);
                w.write_string(pattern);
            }
            EventModifier::ClassExclude(pattern) => {
                w.write_u8(modifier_kinds::CLASS_EXCLUDE);
                w.write_string(pattern);
            }
            EventModifier::LocationOnly(location) => {
                w.write_u8(modifier_kinds::LOCATION_ONLY);
                w.write_location(location);
            }
            EventModifier::ExceptionOnly {
                ref_type,
                caught,
                uncaught,
            } => {
                w.write_u8(modifier_kinds::EXCEPTION_ONLY);
                w.write_reference_type_id(*ref_type);
                w.write_bool(*caught);
                w.write_bool(*uncaught);
            }
            EventModifier::FieldOnly { ref_type, field_id } => {
                w.write_u8(modifier_kinds::FIELD_ONLY);
                w.write_reference_type_id(*ref_type);
                w.write_field_id(*field_id);
            }
            EventModifier::Step {
                thread,
                size,
                depth,
            } => {
                w.write_u8(modifier_kinds::STEP);
                w.write_object_id(*thread);
                w.write_i32(*size);
                w.write_i32(*depth);
            }
            EventModifier::InstanceOnly(object) => {
                w.write_u8(modifier_kinds::INSTANCE_ONLY);
                w.write_object_id(*object);
            }
        }
    }
}

/// Decode a composite event payload: suspend policy, count, then the
/// events themselves.
pub fn parse_composite_event(data: &[u8], sizes: IdSizes) -> JdwpResult<EventSet> {
    let mut r = Reader::new(data, sizes);

    let suspend_policy = r.read_u8()?;
    let event_count = r.read_i32()?;
    if event_count < 0 {
        return Err(JdwpError::Decode(format!(
            "negative event count: {event_count}"
        )));
    }

    let mut events = Vec::with_capacity(event_count as usize);
    for _ in 0..event_count {
        events.push(parse_event(&mut r)?);
    }

    Ok(EventSet {
        suspend_policy,
        events,
    })
}

fn parse_event(r: &mut Reader<'_>) -> JdwpResult<Event> {
    let kind = r.read_u8()?;
    let request_id = r.read_i32()?;

    let details = match kind {
        event_kinds::VM_START => EventKind::VmStart {
            thread: r.read_thread_id()?,
        },
        event_kinds::VM_DEATH => EventKind::VmDeath,
        event_kinds::THREAD_START => EventKind::ThreadStart {
            thread: r.read_thread_id()?,
        },
        event_kinds::THREAD_DEATH => EventKind::ThreadDeath {
            thread: r.read_thread_id()?,
        },
        event_kinds::CLASS_PREPARE => EventKind::ClassPrepare {
            thread: r.read_thread_id()?,
            ref_type_tag: r.read_u8()?,
            type_id: r.read_reference_type_id()?,
            signature: r.read_string()?,
            status: r.read_i32()?,
        },
        event_kinds::CLASS_UNLOAD => EventKind::ClassUnload {
            signature: r.read_string()?,
        },
        event_kinds::SINGLE_STEP => EventKind::SingleStep {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
        },
        event_kinds::BREAKPOINT => EventKind::Breakpoint {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
        },
        event_kinds::METHOD_ENTRY => EventKind::MethodEntry {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
        },
        event_kinds::METHOD_EXIT => EventKind::MethodExit {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
        },
        event_kinds::FIELD_ACCESS => EventKind::FieldAccess {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
            ref_type_tag: r.read_u8()?,
            type_id: r.read_reference_type_id()?,
            field_id: r.read_field_id()?,
            object: r.read_object_id()?,
        },
        event_kinds::FIELD_MODIFICATION => EventKind::FieldModification {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
            ref_type_tag: r.read_u8()?,
            type_id: r.read_reference_type_id()?,
            field_id: r.read_field_id()?,
            object: r.read_object_id()?,
            value_to_be: r.read_value()?,
        },
        event_kinds::EXCEPTION => {
            let thread = r.read_thread_id()?;
            let location = r.read_location()?;
            // The exception object arrives tagged.
            let _tag = r.read_u8()?;
            let exception = r.read_object_id()?;
            // A zero class id in the catch location means uncaught.
            let catch_location = Some(r.read_location()?).filter(|l| !l.class_id.is_null());
            EventKind::Exception {
                thread,
                location,
                exception,
                catch_location,
            }
        }
        event_kinds::EXCEPTION_CATCH => EventKind::ExceptionCatch {
            thread: r.read_thread_id()?,
            location: r.read_location()?,
        },
        // The record shape is unknown, so the rest of the payload
        // cannot be framed either.
        other => {
            return Err(JdwpError::Decode(format!("unknown event kind: {other}")));
        }
    };

    Ok(Event {
        kind,
        request_id,
        details,
    })
}
