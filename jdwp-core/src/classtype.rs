// ClassType command implementations
//
// Static invocation and instance creation

use serde::{Deserialize, Serialize};

use crate::commands::{class_type_commands, command_sets};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{ClassId, MethodId, ThreadId, Value};
use crate::writer::Writer;

/// Outcome of an invocation: the returned value and the thrown
/// exception. Exactly one of them is meaningful; the other is void or
/// a null object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvokeResult {
    pub return_value: Value,
    pub exception: Value,
}

impl InvokeResult {
    /// Whether the call ended by throwing.
    pub fn is_exception(&self) -> bool {
        !self.exception.is_absent()
    }
}

impl JdwpConnection {
    /// Invoke a static method (ClassType.InvokeMethod command)
    ///
    /// The invocation runs on `thread`, which must be suspended by an
    /// event; `options` is a combination of the `invoke_options` flags.
    pub async fn invoke_static_method(
        &self,
        class: ClassId,
        thread: ThreadId,
        method: MethodId,
        args: &[Value],
        options: i32,
    ) -> JdwpResult<InvokeResult> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(class);
        w.write_object_id(thread);
        w.write_method_id(method);
        w.write_values(args);
        w.write_i32(options);

        let reply = self
            .send_command(
                command_sets::CLASS_TYPE,
                class_type_commands::INVOKE_METHOD,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        Ok(InvokeResult {
            return_value: r.read_value()?,
            exception: r.read_value()?,
        })
    }

    /// Create a new instance (ClassType.NewInstance command)
    ///
    /// `constructor` must be a `<init>` method of `class`. On success
    /// the returned `return_value` is the new object.
    pub async fn new_instance(
        &self,
        class: ClassId,
        thread: ThreadId,
        constructor: MethodId,
        args: &[Value],
        options: i32,
    ) -> JdwpResult<InvokeResult> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(class);
        w.write_object_id(thread);
        w.write_method_id(constructor);
        w.write_values(args);
        w.write_i32(options);

        let reply = self
            .send_command(
                command_sets::CLASS_TYPE,
                class_type_commands::NEW_INSTANCE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        Ok(InvokeResult {
            return_value: r.read_value()?,
            exception: r.read_value()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectId;

    #[test]
    fn test_invoke_result_exception() {
        let ok = InvokeResult {
            return_value: Value::Int(10),
            exception: Value::Object(ObjectId::NULL),
        };
        assert!(!ok.is_exception());

        let threw = InvokeResult {
            return_value: Value::Void,
            exception: Value::Object(ObjectId(0x7F)),
        };
        assert!(threw.is_exception());
    }
}
