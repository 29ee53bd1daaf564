// Request/reply correlation under concurrency, timeouts, and
// caller-side cancellation

mod common;

use anyhow::Result;
use bytes::BufMut;
use jdwp_core::types::{ClassId, MethodId, ThreadId};
use jdwp_core::{JdwpError, Value};

use common::version_payload;

fn invoke_reply(result: i32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(b'I');
    buf.put_i32(result);
    buf.put_u8(b'L'); // no exception
    buf.put_u64(0);
    buf
}

/// Pull the two int arguments out of a ClassType.InvokeMethod payload
/// framed with 8-byte ids.
fn parse_two_int_args(data: &[u8]) -> (i32, i32) {
    assert_eq!(&data[24..28], &[0, 0, 0, 2], "argument count");
    assert_eq!(data[28], b'I');
    let a = i32::from_be_bytes(data[29..33].try_into().unwrap());
    assert_eq!(data[33], b'I');
    let b = i32::from_be_bytes(data[34..38].try_into().unwrap());
    (a, b)
}

#[tokio::test]
async fn concurrent_invocations_each_get_their_own_reply() -> Result<()> {
    let (conn, mut peer) = common::connect().await?;

    let class = ClassId(0x11);
    let thread = ThreadId(0x22);
    let method = MethodId(0x33);

    let mut tasks = Vec::new();
    for (a, b) in [(3, 7), (10, 20)] {
        tasks.push(tokio::spawn({
            let conn = conn.clone();
            async move {
                conn.invoke_static_method(
                    class,
                    thread,
                    method,
                    &[Value::Int(a), Value::Int(b)],
                    0,
                )
                .await
            }
        }));
    }

    let first = peer.read_command().await?;
    let second = peer.read_command().await?;
    assert_eq!((first.command_set, first.command), (3, 3));

    // Answer out of request order; ids still route each caller to the
    // reply computed from its own arguments.
    for cmd in [second, first] {
        let (a, b) = parse_two_int_args(&cmd.data);
        peer.reply(cmd.id, 0, &invoke_reply(a + b)).await?;
    }

    let sums: Vec<i32> = {
        let mut sums = Vec::new();
        for task in tasks {
            let result = task.await??;
            assert!(!result.is_exception());
            match result.return_value {
                Value::Int(sum) => sums.push(sum),
                other => panic!("unexpected return value: {other:?}"),
            }
        }
        sums
    };
    assert_eq!(sums, vec![10, 30]);
    Ok(())
}

#[tokio::test]
async fn many_callers_with_scrambled_replies() -> Result<()> {
    let (conn, mut peer) = common::connect().await?;

    let mut tasks = Vec::new();
    for signature in ["La;", "Lbb;", "Lccc;", "Ldddd;"] {
        tasks.push((
            signature,
            tokio::spawn({
                let conn = conn.clone();
                let signature = signature.to_string();
                async move { conn.classes_by_signature(&signature).await }
            }),
        ));
    }

    let mut commands = Vec::new();
    for _ in 0..4 {
        commands.push(peer.read_command().await?);
    }
    // Deliver in reverse arrival order, with a type id derived from the
    // query so mismatches are visible.
    for cmd in commands.into_iter().rev() {
        let signature_len = u32::from_be_bytes(cmd.data[0..4].try_into().unwrap()) as u64;
        let mut reply = Vec::new();
        reply.put_i32(1);
        reply.put_u8(1);
        reply.put_u64(signature_len);
        reply.put_i32(3);
        peer.reply(cmd.id, 0, &reply).await?;
    }

    for (signature, task) in tasks {
        let classes = task.await??;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].type_id.0, signature.len() as u64);
        assert_eq!(classes[0].signature, signature);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn timeout_does_not_poison_the_connection() -> Result<()> {
    let (conn, mut peer) = common::connect().await?;

    // Nobody answers; the paused clock jumps straight to the deadline.
    match conn.get_version().await {
        Err(JdwpError::Timeout) => {}
        other => panic!("expected Timeout, got {other:?}"),
    }

    // A later call on the same connection succeeds.
    let task = tokio::spawn({
        let conn = conn.clone();
        async move { conn.get_version().await }
    });
    let stale = peer.read_command().await?;
    let cmd = peer.read_command().await?;
    peer.reply(cmd.id, 0, &version_payload("jvm", 1, 8, "17", "mock"))
        .await?;
    let version = task.await??;
    assert_eq!(version.vm_version, "17");

    // A reply to the abandoned id is dropped on the floor.
    peer.reply(stale.id, 0, &version_payload("x", 0, 0, "x", "x"))
        .await?;
    let task = tokio::spawn({
        let conn = conn.clone();
        async move { conn.get_all_threads().await }
    });
    let cmd = peer.read_command().await?;
    peer.reply(cmd.id, 0, &[0, 0, 0, 0]).await?;
    assert!(task.await??.is_empty());
    Ok(())
}

#[tokio::test]
async fn abandoned_caller_unblocks_and_leaves_connection_usable() -> Result<()> {
    let (conn, mut peer) = common::connect().await?;

    let pending = tokio::spawn({
        let conn = conn.clone();
        async move { conn.get_version().await }
    });
    let stale = peer.read_command().await?;

    // Cancel the caller while its reply is still pending.
    pending.abort();
    assert!(pending.await.unwrap_err().is_cancelled());

    // The late reply finds a closed slot and is dropped.
    peer.reply(stale.id, 0, &version_payload("x", 0, 0, "x", "x"))
        .await?;

    let task = tokio::spawn({
        let conn = conn.clone();
        async move { conn.get_version().await }
    });
    let cmd = peer.read_command().await?;
    peer.reply(cmd.id, 0, &version_payload("jvm", 1, 8, "21", "mock"))
        .await?;
    assert_eq!(task.await??.vm_version, "21");
    Ok(())
}
