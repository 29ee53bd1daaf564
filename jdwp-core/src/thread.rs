// ThreadReference command implementations
//
// Thread-flavored commands: inventory, suspend/resume (VM-scoped and
// thread-scoped), status, and stack frames

use serde::{Deserialize, Serialize};

use crate::commands::{command_sets, thread_commands, vm_commands};
use crate::connection::JdwpConnection;
use crate::protocol::{JdwpError, JdwpResult};
use crate::reader::Reader;
use crate::types::{FrameId, Location, SuspendStatus, ThreadId, ThreadStatus};
use crate::writer::Writer;

/// Stack frame information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_id: FrameId,
    pub location: Location,
}

impl JdwpConnection {
    /// Get all threads (VirtualMachine.AllThreads command)
    pub async fn get_all_threads(&self) -> JdwpResult<Vec<ThreadId>> {
        let reply = self
            .send_command(
                command_sets::VIRTUAL_MACHINE,
                vm_commands::ALL_THREADS,
                Vec::new(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut threads = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            threads.push(r.read_thread_id()?);
        }
        Ok(threads)
    }

    /// Suspend all threads (VirtualMachine.Suspend command)
    pub async fn suspend_all(&self) -> JdwpResult<()> {
        let reply = self
            .send_command(command_sets::VIRTUAL_MACHINE, vm_commands::SUSPEND, Vec::new())
            .await?;
        reply.check_error()
    }

    /// Resume all threads (VirtualMachine.Resume command)
    pub async fn resume_all(&self) -> JdwpResult<()> {
        let reply = self
            .send_command(command_sets::VIRTUAL_MACHINE, vm_commands::RESUME, Vec::new())
            .await?;
        reply.check_error()
    }

    /// Suspend one thread (ThreadReference.Suspend command)
    pub async fn suspend_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);

        let reply = self
            .send_command(
                command_sets::THREAD_REFERENCE,
                thread_commands::SUSPEND,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()
    }

    /// Resume one thread (ThreadReference.Resume command)
    ///
    /// Unblocks any event handler waiting for that thread to progress.
    pub async fn resume_thread(&self, thread: ThreadId) -> JdwpResult<()> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);

        let reply = self
            .send_command(
                command_sets::THREAD_REFERENCE,
                thread_commands::RESUME,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()
    }

    /// Get a thread's name (ThreadReference.Name command)
    pub async fn get_thread_name(&self, thread: ThreadId) -> JdwpResult<String> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);

        let reply = self
            .send_command(
                command_sets::THREAD_REFERENCE,
                thread_commands::NAME,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        r.read_string()
    }

    /// Get a thread's run and suspend status (ThreadReference.Status command)
    pub async fn get_thread_status(
        &self,
        thread: ThreadId,
    ) -> JdwpResult<(ThreadStatus, SuspendStatus)> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);

        let reply = self
            .send_command(
                command_sets::THREAD_REFERENCE,
                thread_commands::STATUS,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let thread_status = r.read_i32()?;
        let suspend_status = r.read_i32()?;

        let thread_status = ThreadStatus::from_i32(thread_status).ok_or_else(|| {
            JdwpError::Decode(format!("unknown thread status: {thread_status}"))
        })?;
        let suspend_status = SuspendStatus::from_i32(suspend_status).ok_or_else(|| {
            JdwpError::Decode(format!("unknown suspend status: {suspend_status}"))
        })?;

        Ok((thread_status, suspend_status))
    }

    /// Get stack frames for a thread (ThreadReference.Frames command)
    ///
    /// `start_frame` 0 is the top of the stack; `length` -1 means all
    /// remaining frames.
    pub async fn get_frames(
        &self,
        thread: ThreadId,
        start_frame: i32,
        length: i32,
    ) -> JdwpResult<Vec<Frame>> {
        let mut w = Writer::new(self.id_sizes());
        w.write_object_id(thread);
        w.write_i32(start_frame);
        w.write_i32(length);

        let reply = self
            .send_command(
                command_sets::THREAD_REFERENCE,
                thread_commands::FRAMES,
                w.into_bytes(),
            )
            .await?;
        reply.check_error()?;

        let mut r = Reader::new(reply.data(), self.id_sizes());
        let count = r.read_i32()?;
        let mut frames = Vec::with_capacity(count.max(0) as usize);

        for _ in 0..count {
            frames.push(Frame {
                frame_id: r.read_frame_id()?,
                location: r.read_location()?,
            });
        }

        Ok(frames)
    }
}
