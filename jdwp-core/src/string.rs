// StringReference command implementations
//
// Commands for working with String objects

use crate::commands::{command_sets, string_reference_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::StringId;
use crate::writer::Writer;

impl JdwpConnection {
    /// Get the string value from a String object (StringReference.Value command)
    pub async fn get_string_value(&self, string: StringId) -> JdwpResult<String> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(string);

        let reply = self
            .send_command(
                command_sets::STRING_REFERENCE,
                string_reference_commands::VALUE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        r.read_string()
    }
}
