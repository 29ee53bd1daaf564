// StackFrame command implementations
//
// Commands for inspecting stack frame variables

use serde::{Deserialize, Serialize};

use crate::commands::{command_sets, stack_frame_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{FrameId, ObjectId, ThreadId, Value};
use crate::writer::Writer;

/// Variable slot selector for GetValues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSlot {
    pub slot: i32,
    /// The value tag expected in this slot.
    pub sig_byte: u8,
}

impl JdwpConnection {
    /// Get values for variable slots in a frame (StackFrame.GetValues command)
    pub async fn get_frame_values(
        &self,
        thread: ThreadId,
        frame: FrameId,
        slots: &[VariableSlot],
    ) -> JdwpResult<Vec<Value>> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);
        w.write_frame_id(frame);
        w.write_i32(slots.len() as i32);
        for slot in slots {
            w.write_i32(slot.slot);
            w.write_u8(slot.sig_byte);
        }

        let reply = self
            .send_command(
                command_sets::STACK_FRAME,
                stack_frame_commands::GET_VALUES,
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

    /// Get the `this` object of a frame (StackFrame.ThisObject command)
    ///
    /// Returns the null id for static and native frames.
    pub async fn get_this_object(&self, thread: ThreadId, frame: FrameId) -> JdwpResult<ObjectId> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);
        w.write_frame_id(frame);

        let reply = self
            .send_command(
                command_sets::STACK_FRAME,
                stack_frame_commands::THIS_OBJECT,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let _tag = r.read_u8()?;
        r.read_object_id()
    }
}
