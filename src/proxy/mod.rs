//! Kernel access across a process boundary
//!
//! When a pool is owned by another user, the kernel runs in a worker
//! process started as that user, and the caller talks to it through
//! [`KernelClient`]. The channel is a pair of byte streams carrying
//! frames: a 4-byte big-endian length followed by a JSON document.
//!
//! The client opens with a [`WorkerInit`] frame; after that every
//! [`Request`] gets exactly one [`Response`]. Errors raised in the worker
//! come back as [`RemoteError`] and are rebuilt with their original kind
//! and message.

mod client;
mod server;

pub use client::KernelClient;
pub use server::{run_worker, serve};

use crate::config::ToolsConfig;
use crate::error::{ErrorKind, PoolError, PoolResult};
use crate::kernel::InfoQuery;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Hidden subcommand that turns the binary into a worker
pub const WORKER_COMMAND: &str = "__worker";

/// Largest frame either side accepts
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// First frame sent to a worker: which kernel to open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInit {
    pub path: PathBuf,
    pub debug: bool,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Invoke(Call),
    Get(Field),
    Set(FieldValue),
}

/// A kernel method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Path,
    Register { stock: String },
    Unregister { stock: String },
    Exists { package: String },
    List { all_versions: bool },
    Resolve { packages: Vec<String> },
    Getpath {
        package: String,
        build: bool,
        source: bool,
    },
    BuildLogs,
    GetpathBuildLog { package: String },
    BinaryToSource { package: String },
    Gc { recurse: bool },
    Sync,
    Info { query: InfoQuery, recursive: bool },
    PoolOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Autosync,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Autosync(bool),
    Debug(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(serde_json::Value),
    Err(RemoteError),
}

/// An error as it crosses the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PoolError> for RemoteError {
    fn from(err: &PoolError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<RemoteError> for PoolError {
    fn from(err: RemoteError) -> Self {
        PoolError::Remote {
            kind: err.kind,
            message: err.message,
        }
    }
}

/// Write one frame and flush
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> PoolResult<()> {
    let body = serde_json::to_vec(message)?;
    let len = u32::try_from(body.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| PoolError::Protocol(format!("frame too large ({} bytes)", body.len())))?;

    writer
        .write_all(&len.to_be_bytes())
        .and_then(|()| writer.write_all(&body))
        .and_then(|()| writer.flush())
        .map_err(|e| PoolError::io("writing frame", e))
}

/// Read one frame. `None` on a clean end of stream before a new frame.
pub fn read_frame<R: Read, T: DeserializeOwned>(reader: &mut R) -> PoolResult<Option<T>> {
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(PoolError::io("reading frame header", e)),
    }

    let len = u32::from_be_bytes(header);
    if len > MAX_FRAME_LEN {
        return Err(PoolError::Protocol(format!("frame too large ({} bytes)", len)));
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .map_err(|e| PoolError::io("reading frame body", e))?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| PoolError::Protocol(format!("malformed frame: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_are_length_prefixed_json() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::Get(Field::Autosync)).unwrap();

        let body = br#"{"get":"autosync"}"#;
        assert_eq!(&buf[..4], &(body.len() as u32).to_be_bytes());
        assert_eq!(&buf[4..], body);
    }

    #[test]
    fn read_frame_sequence_then_eof() {
        let mut buf = Vec::new();
        let first = Request::Invoke(Call::Exists {
            package: "foo=1.0".to_string(),
        });
        let second = Request::Set(FieldValue::Debug(true));
        write_frame(&mut buf, &first).unwrap();
        write_frame(&mut buf, &second).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame::<_, Request>(&mut cursor).unwrap(), Some(first));
        assert_eq!(read_frame::<_, Request>(&mut cursor).unwrap(), Some(second));
        assert_eq!(read_frame::<_, Request>(&mut cursor).unwrap(), None);
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Request::Invoke(Call::Sync)).unwrap();
        buf.truncate(buf.len() - 1);

        let err = read_frame::<_, Request>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let buf = u32::MAX.to_be_bytes().to_vec();
        let err = read_frame::<_, Request>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, PoolError::Protocol(_)));
    }

    #[test]
    fn garbage_frame_is_protocol_error() {
        let mut buf = 3u32.to_be_bytes().to_vec();
        buf.extend_from_slice(b"{{{");
        let err = read_frame::<_, Request>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, PoolError::Protocol(_)));
    }

    #[test]
    fn remote_error_roundtrip_keeps_kind() {
        let original = PoolError::CircularDependency {
            path: PathBuf::from("/a"),
            recursed: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        };
        let rebuilt: PoolError = RemoteError::from(&original).into();
        assert_eq!(rebuilt.kind(), ErrorKind::CircularDependency);
        assert_eq!(rebuilt.to_string(), original.to_string());
    }
}
