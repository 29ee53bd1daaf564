// ReferenceType command implementations
//
// Commands for working with classes, interfaces, and arrays

use serde::{Deserialize, Serialize};
use std::ops::Deref;

use crate::commands::{command_sets, reference_type_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{FieldId, MethodId, ReferenceTypeId};
use crate::writer::Writer;

/// Method information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub method_id: MethodId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

/// Field information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub field_id: FieldId,
    pub name: String,
    pub signature: String,
    pub mod_bits: i32,
}

/// The method inventory of one reference type, with the lookups a
/// debugger actually performs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Methods(Vec<MethodInfo>);

impl Methods {
    pub fn by_id(&self, id: MethodId) -> Option<&MethodInfo> {
        self.0.iter().find(|m| m.method_id == id)
    }

    /// Exact `(name, signature)` match.
    pub fn by_name_and_signature(&self, name: &str, signature: &str) -> Option<&MethodInfo> {
        self.0
            .iter()
            .find(|m| m.name == name && m.signature == signature)
    }

    /// First method with the name, any signature.
    pub fn by_name(&self, name: &str) -> Option<&MethodInfo> {
        self.0.iter().find(|m| m.name == name)
    }
}

impl Deref for Methods {
    type Target = [MethodInfo];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Methods {
    type Item = MethodInfo;
    type IntoIter = std::vec::IntoIter<MethodInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The field inventory of one reference type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fields(Vec<FieldInfo>);

impl Fields {
    pub fn by_id(&self, id: FieldId) -> Option<&FieldInfo> {
        self.0.iter().find(|f| f.field_id == id)
    }

    pub fn by_name_and_signature(&self, name: &str, signature: &str) -> Option<&FieldInfo> {
        self.0
            .iter()
            .find(|f| f.name == name && f.signature == signature)
    }

    pub fn by_name(&self, name: &str) -> Option<&FieldInfo> {
        self.0.iter().find(|f| f.name == name)
    }
}

impl Deref for Fields {
    type Target = [FieldInfo];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for Fields {
    type Item = FieldInfo;
    type IntoIter = std::vec::IntoIter<FieldInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl JdwpConnection {
    /// Get the JNI signature of a type (ReferenceType.Signature command)
    pub async fn get_signature(
        &self,
        ref_type: impl Into<ReferenceTypeId>,
    ) -> JdwpResult<String> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(ref_type.into());

        let reply = self
            .send_command(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::SIGNATURE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        r.read_string()
    }

    /// Get methods for a reference type (ReferenceType.Methods command)
    pub async fn get_methods(
        &self,
        ref_type: impl Into<ReferenceTypeId>,
    ) -> JdwpResult<Methods> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(ref_type.into());

        let reply = self
            .send_command(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::METHODS,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut methods = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            methods.push(MethodInfo {
                method_id: r.read_method_id()?,
                name: r.read_string()?,
                signature: r.read_string()?,
                mod_bits: r.read_i32()?,
            });
        }

        Ok(Methods(methods))
    }

    /// Get fields for a reference type (ReferenceType.Fields command)
    pub async fn get_fields(&self, ref_type: impl Into<ReferenceTypeId>) -> JdwpResult<Fields> {
        let mut w = Writer::new(self.id_sizes());
        w.write_reference_type_id(ref_type.into());

        let reply = self
            .send_command(
                command_sets::REFERENCE_TYPE,
                reference_type_commands::FIELDS,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut fields = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            fields.push(FieldInfo {
                field_id: r.read_field_id()?,
                name: r.read_string()?,
                signature: r.read_string()?,
                mod_bits: r.read_i32()?,
            });
        }

        Ok(Fields(fields))
    }
}
