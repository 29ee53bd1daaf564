// Method command implementations
//
// Commands for working with methods (line tables, variable tables)

use serde::{Deserialize, Serialize};

use crate::commands::{command_sets, method_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{MethodId, ReferenceTypeId};
use crate::writer::Writer;

/// Line table entry - maps source line to bytecode index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTableEntry {
    pub line_code_index: u64,
    pub line_number: i32,
}

/// Complete line table for a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTable {
    pub start: u64,
    pub end: u64,
    pub lines: Vec<LineTableEntry>,
}

/// Local variable information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    pub length: u32,
    pub slot: u32,
}

impl JdwpConnection {
    /// Get line table for a method (Method.LineTable command)
    /// Maps source code line numbers to bytecode positions
    pub async fn get_line_table(
        &self,
        ref_type: impl Into<ReferenceTypeId>,
        method: MethodId,
    ) -> JdwpResult<LineTable> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(ref_type.into());
        w.write_method_id(method);

        let reply = self
            .send_command(
                command_sets::METHOD,
                method_commands::LINE_TABLE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let start = r.read_u64()?;
        let end = r.read_u64()?;

        let count = r.read_i32()?;
        let mut lines = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            lines.push(LineTableEntry {
                line_code_index: r.read_u64()?,
                line_number: r.read_i32()?,
            });
        }

        Ok(LineTable { start, end, lines })
    }

    /// Get variable table for a method (Method.VariableTable command)
    /// Returns info about local variables (names, types, slots)
    pub async fn get_variable_table(
        &self,
        ref_type: impl Into<ReferenceTypeId>,
        method: MethodId,
    ) -> JdwpResult<Vec<Variable>> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(ref_type.into());
        w.write_method_id(method);

        let reply = self
            .send_command(
                command_sets::METHOD,
                method_commands::VARIABLE_TABLE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let _arg_count = r.read_i32()?;

        let count = r.read_i32()?;
        let mut variables = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            variables.push(Variable {
                code_index: r.read_u64()?,
                name: r.read_string()?,
                signature: r.read_string()?,
                length: r.read_u32()?,
                slot: r.read_u32()?,
            });
        }

        Ok(variables)
    }
}
