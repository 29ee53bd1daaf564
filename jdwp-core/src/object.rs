// ObjectReference command implementations
//
// Commands for working with object instances

use crate::classtype::InvokeResult;
use crate::commands::{command_sets, object_reference_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{ClassId, FieldId, MethodId, ObjectId, ReferenceTypeId, ThreadId, Value};
use crate::writer::Writer;

impl JdwpConnection {
    /// Get the reference type of an object (ObjectReference.ReferenceType command)
    pub async fn get_object_reference_type(
        &self,
        object: impl Into<ObjectId>,
    ) -> JdwpResult<ReferenceTypeId> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(object.into());

        let reply = self
            .send_command(
                command_sets::OBJECT_REFERENCE,
                object_reference_commands::REFERENCE_TYPE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let _ref_type_tag = r.read_u8()?;
        r.read_reference_type_id()
    }

    /// Get field values from an object (ObjectReference.GetValues command)
    ///
    /// The returned values correspond to `fields` in order.
    pub async fn get_object_values(
        &self,
        object: impl Into<ObjectId>,
        fields: &[FieldId],
    ) -> JdwpResult<Vec<Value>> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(object.into());
        w.write_i32(fields.len() as i32);
        for field in fields {
            w.write_field_id(*field);
        }

        let reply = self
            .send_command(
                command_sets::OBJECT_REFERENCE,
                object_reference_commands::GET_VALUES,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut values = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            values.push(r.read_value()?);
        }

        Ok(values)
    }

    /// Invoke an instance method (ObjectReference.InvokeMethod command)
    ///
    /// `class` names the type that declares `method`; pass the
    /// `invoke_options::NONVIRTUAL` flag to skip virtual dispatch.
    pub async fn invoke_method(
        &self,
        object: impl Into<ObjectId>,
        thread: ThreadId,
        class: ClassId,
        method: MethodId,
        args: &[Value],
        options: i32,
    ) -> JdwpResult<InvokeResult> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(object.into());
        w.write_object_id(thread);
        w.write_reference_type_id(class);
        w.write_method_id(method);
        w.write_values(args);
        w.write_i32(options);

        let reply = self
            .send_command(
                command_sets::OBJECT_REFERENCE,
                object_reference_commands::INVOKE_METHOD,
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
