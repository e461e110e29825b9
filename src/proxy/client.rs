//! Caller side of the channel

use super::{read_frame, write_frame, Call, Field, FieldValue, Request, Response, WorkerInit, WORKER_COMMAND};
use crate::config::ToolsConfig;
use crate::error::{PoolError, PoolResult};
use crate::kernel::{GcReport, InfoQuery, PoolApi, PoolInfo};
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// A [`PoolApi`] forwarding every call to a kernel in another process
pub struct KernelClient {
    child: Option<Child>,
    writer: Option<Box<dyn Write + Send>>,
    reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for KernelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelClient")
            .field("pid", &self.child.as_ref().map(Child::id))
            .finish()
    }
}

impl KernelClient {
    /// Start a worker running as `uid`:`gid` and open the pool at `path` in it
    pub fn spawn(
        path: &Path,
        debug: bool,
        tools: &ToolsConfig,
        uid: u32,
        gid: u32,
    ) -> PoolResult<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| PoolError::io("locating current executable", e))?;
        info!("starting worker as {}:{} for {}", uid, gid, path.display());

        // switching uid as root also clears supplementary groups
        let mut child = Command::new(&exe)
            .arg(WORKER_COMMAND)
            .uid(uid)
            .gid(gid)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| PoolError::command_failed(exe.display().to_string(), e))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(PoolError::Protocol("worker pipes unavailable".to_string()));
        };
        let mut client = Self {
            child: Some(child),
            writer: Some(Box::new(stdin)),
            reader: Box::new(stdout),
        };
        client.handshake(WorkerInit {
            path: path.to_path_buf(),
            debug,
            tools: tools.clone(),
        })?;
        Ok(client)
    }

    /// Talk to a worker already connected to `reader` and `writer`
    pub fn from_streams(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self {
            child: None,
            writer: Some(Box::new(writer)),
            reader: Box::new(reader),
        }
    }

    /// Send the init frame and wait for the worker to open its kernel
    pub fn handshake(&mut self, init: WorkerInit) -> PoolResult<()> {
        self.send(&init)?;
        self.receive::<serde_json::Value>().map(|_| ())
    }

    fn send<T: serde::Serialize>(&mut self, message: &T) -> PoolResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PoolError::Protocol("worker channel closed".to_string()))?;
        write_frame(writer, message)
    }

    fn receive<T: DeserializeOwned>(&mut self) -> PoolResult<T> {
        match read_frame::<_, Response>(&mut self.reader)? {
            Some(Response::Ok(value)) => serde_json::from_value(value)
                .map_err(|e| PoolError::Protocol(format!("unexpected reply: {}", e))),
            Some(Response::Err(e)) => Err(e.into()),
            None => Err(PoolError::Protocol("worker exited".to_string())),
        }
    }

    fn request<T: DeserializeOwned>(&mut self, request: Request) -> PoolResult<T> {
        debug!("worker call: {:?}", request);
        self.send(&request)?;
        self.receive()
    }

    fn call<T: DeserializeOwned>(&mut self, call: Call) -> PoolResult<T> {
        self.request(Request::Invoke(call))
    }
}

impl Drop for KernelClient {
    fn drop(&mut self) {
        // closing stdin ends the worker's serve loop
        self.writer.take();
        if let Some(mut child) = self.child.take() {
            match child.wait() {
                Ok(status) if !status.success() => warn!("worker exited with {}", status),
                Ok(_) => {}
                Err(e) => warn!("failed to reap worker: {}", e),
            }
        }
    }
}

impl PoolApi for KernelClient {
    fn path(&mut self) -> PoolResult<PathBuf> {
        self.call(Call::Path)
    }

    fn register(&mut self, stock: &str) -> PoolResult<()> {
        self.call(Call::Register {
            stock: stock.to_string(),
        })
    }

    fn unregister(&mut self, stock: &str) -> PoolResult<()> {
        self.call(Call::Unregister {
            stock: stock.to_string(),
        })
    }

    fn exists(&mut self, package: &str) -> PoolResult<bool> {
        self.call(Call::Exists {
            package: package.to_string(),
        })
    }

    fn list(&mut self, all_versions: bool) -> PoolResult<Vec<String>> {
        self.call(Call::List { all_versions })
    }

    fn resolve(&mut self, packages: &[String]) -> PoolResult<Vec<String>> {
        self.call(Call::Resolve {
            packages: packages.to_vec(),
        })
    }

    fn getpath(&mut self, package: &str, build: bool, source: bool) -> PoolResult<Option<PathBuf>> {
        self.call(Call::Getpath {
            package: package.to_string(),
            build,
            source,
        })
    }

    fn build_logs(&mut self) -> PoolResult<Vec<(String, String)>> {
        self.call(Call::BuildLogs)
    }

    fn getpath_build_log(&mut self, package: &str) -> PoolResult<Option<PathBuf>> {
        self.call(Call::GetpathBuildLog {
            package: package.to_string(),
        })
    }

    fn binary_to_source(&mut self, package: &str) -> PoolResult<Option<String>> {
        self.call(Call::BinaryToSource {
            package: package.to_string(),
        })
    }

    fn gc(&mut self, recurse: bool) -> PoolResult<GcReport> {
        self.call(Call::Gc { recurse })
    }

    fn sync(&mut self) -> PoolResult<()> {
        self.call(Call::Sync)
    }

    fn info(&mut self, query: InfoQuery, recursive: bool) -> PoolResult<Vec<PoolInfo>> {
        self.call(Call::Info { query, recursive })
    }

    fn autosync(&mut self) -> PoolResult<bool> {
        self.request(Request::Get(Field::Autosync))
    }

    fn set_autosync(&mut self, autosync: bool) -> PoolResult<()> {
        self.request(Request::Set(FieldValue::Autosync(autosync)))
    }

    fn debug(&mut self) -> PoolResult<bool> {
        self.request(Request::Get(Field::Debug))
    }

    fn set_debug(&mut self, debug: bool) -> PoolResult<()> {
        self.request(Request::Set(FieldValue::Debug(debug)))
    }

    fn pool_owner(&mut self) -> PoolResult<(u32, u32)> {
        self.call(Call::PoolOwner)
    }
}
