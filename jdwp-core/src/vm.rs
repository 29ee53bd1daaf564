// VirtualMachine command implementations
//
// The fundamental commands for interacting with the JVM

use serde::{Deserialize, Serialize};

use crate::commands::{command_sets, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::JdwpResult;
use crate::reader::Reader;
use crate::types::{IdSizes, ReferenceTypeId, StringId};
use crate::writer::Writer;

/// JVM version information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmVersion {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

/// Class information from ClassesBySignature / AllClasses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub ref_type_tag: u8, // 1=class, 2=interface, 3=array
    pub type_id: ReferenceTypeId,
    pub signature: String,
    pub status: i32,
}

impl JdwpConnection {
    /// Get JVM version information (VirtualMachine.Version command)
    pub async fn get_version(&self) -> JdwpResult<VmVersion> {
        let reply = self
            .send_command(command_sets::VIRTUAL_MACHINE, vm_commands::VERSION, Vec::new())
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        Ok(VmVersion {
            description: r.read_string()?,
            jdwp_major: r.read_i32()?,
            jdwp_minor: r.read_i32()?,
            vm_version: r.read_string()?,
            vm_name: r.read_string()?,
        })
    }

    /// Negotiate id widths (VirtualMachine.IDSizes command).
    ///
    /// Issued once during attach, before any variable-width command;
    /// the widths replace the defaults and never change again.
    pub(crate) async fn negotiate_id_sizes(&self) -> JdwpResult<IdSizes> {
        let reply = self
            .send_command(command_sets::VIRTUAL_MACHINE, vm_commands::ID_SIZES, Vec::new())
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let sizes = IdSizes::from_wire(
            r.read_i32()?,
            r.read_i32()?,
            r.read_i32()?,
            r.read_i32()?,
            r.read_i32()?,
        )?;
        self.set_id_sizes(sizes);
        tracing::debug!(?sizes, "negotiated id sizes");
        Ok(sizes)
    }

    /// Find classes by signature (VirtualMachine.ClassesBySignature command)
    /// Signature format: "Lcom/example/MyClass;" for classes
    pub async fn classes_by_signature(&self, signature: &str) -> JdwpResult<Vec<ClassInfo>> {
        let mut w = Writer::new(self.id_sizes());
        w.write_string(signature);

        let reply = self
            .send_command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CLASSES_BY_SIGNATURE,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            // The reply omits the signature; echo the query.
            classes.push(ClassInfo {
                ref_type_tag: r.read_u8()?,
                type_id: r.read_reference_type_id()?,
                signature: signature.to_string(),
                status: r.read_i32()?,
            });
        }

        Ok(classes)
    }

    /// Get every loaded class (VirtualMachine.AllClasses command)
    pub async fn all_classes(&self) -> JdwpResult<Vec<ClassInfo>> {
        let reply = self
            .send_command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::ALL_CLASSES,
                Vec::new(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut classes = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            classes.push(ClassInfo {
                ref_type_tag: r.read_u8()?,
                type_id: r.read_reference_type_id()?,
                signature: r.read_string()?,
                status: r.read_i32()?,
            });
        }

        Ok(classes)
    }

    /// Create a string object in the target VM (VirtualMachine.CreateString command)
    pub async fn create_string(&self, value: &str) -> JdwpResult<StringId> {
        let mut w = Writer::new(self.id_sizes());
        w.write_string(value);

        let reply = self
            .send_command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::CREATE_STRING,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        r.read_string_id()
    }

    /// Tell the VM the debugger is going away (VirtualMachine.Dispose
    /// command), then tear the connection down locally.
    pub async fn dispose(&self) -> JdwpResult<()> {
        let reply = self
            .send_command(command_sets::VIRTUAL_MACHINE, vm_commands::DISPOSE, Vec::new())
            .await?;
        reply.check_error()?;
        self.close();
        Ok(())
    }
}
