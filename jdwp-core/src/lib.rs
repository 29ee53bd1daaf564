// Asynchronous JDWP client core
//
// Drives a remote JVM over any reliable byte stream:
// - Packet framing and the JDWP handshake
// - Request/reply correlation across concurrent callers
// - A codec parameterized by the negotiated id widths
// - Event demultiplexing to per-request subscribers
// - Blocking wait-for-event coordination with deterministic cleanup

pub mod classtype;
pub mod commands;
pub mod connection;
pub mod eventrequest;
pub mod events;
pub mod eventwait;
pub mod method;
pub mod object;
pub mod protocol;
pub mod reader;
pub mod reftype;
pub mod stackframe;
pub mod string;
pub mod thread;
pub mod types;
pub mod vm;
pub mod writer;

mod correlator;
mod eventloop;

pub use classtype::InvokeResult;
pub use connection::{JdwpConnection, DEFAULT_REQUEST_TIMEOUT};
pub use eventrequest::{Subscription, SuspendPolicy};
pub use events::{Event, EventKind, EventModifier, EventSet};
pub use protocol::{ErrorCode, JdwpError, JdwpResult};
pub use types::{IdSizes, Location, Tag, Value};

// Ambient cancellation for event waits, re-exported so callers do not
// need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
