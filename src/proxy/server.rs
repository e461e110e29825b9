//! Worker side of the channel

use super::{read_frame, write_frame, Call, Field, FieldValue, RemoteError, Request, Response, WorkerInit};
use crate::backend::create_backends;
use crate::error::{PoolError, PoolResult};
use crate::kernel::{PoolApi, PoolKernel};
use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};
use tracing::{debug, info};

/// Answer requests on `reader` until it closes.
///
/// Kernel errors are sent back to the caller; only channel failures end
/// the loop with an error.
pub fn serve<A, R, W>(api: &mut A, reader: &mut R, writer: &mut W) -> PoolResult<()>
where
    A: PoolApi + ?Sized,
    R: Read,
    W: Write,
{
    while let Some(request) = read_frame::<_, Request>(reader)? {
        debug!("worker request: {:?}", request);
        let response = match dispatch(api, request) {
            Ok(value) => Response::Ok(value),
            Err(e) => {
                debug!("worker error: {}", e);
                Response::Err(RemoteError::from(&e))
            }
        };
        write_frame(writer, &response)?;
    }
    debug!("worker channel closed");
    Ok(())
}

/// Open the kernel named by the first frame, then serve it
pub fn run_worker<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> PoolResult<()> {
    let Some(init) = read_frame::<_, WorkerInit>(reader)? else {
        return Err(PoolError::Protocol("channel closed before init".to_string()));
    };
    info!("worker opening pool at {}", init.path.display());

    let opened = PoolKernel::open(&init.path, create_backends(&init.tools)).and_then(|mut kernel| {
        kernel.set_debug(init.debug)?;
        Ok(kernel)
    });
    let mut kernel = match opened {
        Ok(kernel) => {
            write_frame(writer, &Response::Ok(Value::Null))?;
            kernel
        }
        Err(e) => {
            write_frame(writer, &Response::Err(RemoteError::from(&e)))?;
            return Ok(());
        }
    };

    serve(&mut kernel, reader, writer)
}

fn dispatch<A: PoolApi + ?Sized>(api: &mut A, request: Request) -> PoolResult<Value> {
    match request {
        Request::Invoke(call) => invoke(api, call),
        Request::Get(Field::Autosync) => to_value(api.autosync()?),
        Request::Get(Field::Debug) => to_value(api.debug()?),
        Request::Set(FieldValue::Autosync(on)) => to_value(api.set_autosync(on)?),
        Request::Set(FieldValue::Debug(on)) => to_value(api.set_debug(on)?),
    }
}

fn invoke<A: PoolApi + ?Sized>(api: &mut A, call: Call) -> PoolResult<Value> {
    match call {
        Call::Path => to_value(api.path()?),
        Call::Register { stock } => to_value(api.register(&stock)?),
        Call::Unregister { stock } => to_value(api.unregister(&stock)?),
        Call::Exists { package } => to_value(api.exists(&package)?),
        Call::List { all_versions } => to_value(api.list(all_versions)?),
        Call::Resolve { packages } => to_value(api.resolve(&packages)?),
        Call::Getpath {
            package,
            build,
            source,
        } => to_value(api.getpath(&package, build, source)?),
        Call::BuildLogs => to_value(api.build_logs()?),
        Call::GetpathBuildLog { package } => to_value(api.getpath_build_log(&package)?),
        Call::BinaryToSource { package } => to_value(api.binary_to_source(&package)?),
        Call::Gc { recurse } => to_value(api.gc(recurse)?),
        Call::Sync => to_value(api.sync()?),
        Call::Info { query, recursive } => to_value(api.info(query, recursive)?),
        Call::PoolOwner => to_value(api.pool_owner()?),
    }
}

fn to_value<T: Serialize>(value: T) -> PoolResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::kernel::{GcReport, InfoQuery, InfoReport, PoolInfo};
    use std::io::Cursor;
    use std::path::PathBuf;

    /// In-memory PoolApi recording every call
    #[derive(Debug, Default)]
    pub(crate) struct RecordingApi {
        pub calls: Vec<String>,
        pub autosync: bool,
        pub debug: bool,
    }

    impl PoolApi for RecordingApi {
        fn path(&mut self) -> PoolResult<PathBuf> {
            self.calls.push("path".into());
            Ok(PathBuf::from("/srv/pool"))
        }
        fn register(&mut self, stock: &str) -> PoolResult<()> {
            self.calls.push(format!("register {}", stock));
            Ok(())
        }
        fn unregister(&mut self, stock: &str) -> PoolResult<()> {
            self.calls.push(format!("unregister {}", stock));
            Err(PoolError::NotFound(stock.to_string()))
        }
        fn exists(&mut self, package: &str) -> PoolResult<bool> {
            self.calls.push(format!("exists {}", package));
            Ok(package.starts_with("foo"))
        }
        fn list(&mut self, all_versions: bool) -> PoolResult<Vec<String>> {
            self.calls.push(format!("list {}", all_versions));
            Ok(vec!["foo=1.0".into(), "bar=2.0".into()])
        }
        fn resolve(&mut self, packages: &[String]) -> PoolResult<Vec<String>> {
            self.calls.push("resolve".into());
            Ok(packages.iter().map(|p| format!("{}=1.0", p)).collect())
        }
        fn getpath(
            &mut self,
            package: &str,
            build: bool,
            source: bool,
        ) -> PoolResult<Option<PathBuf>> {
            self.calls
                .push(format!("getpath {} {} {}", package, build, source));
            if build {
                Ok(Some(PathBuf::from("/srv/pool/.pool/pkgcache/foo_1.0_amd64.deb")))
            } else {
                Ok(None)
            }
        }
        fn build_logs(&mut self) -> PoolResult<Vec<(String, String)>> {
            Ok(vec![("foo".into(), "1.0".into())])
        }
        fn getpath_build_log(&mut self, _package: &str) -> PoolResult<Option<PathBuf>> {
            Ok(None)
        }
        fn binary_to_source(&mut self, package: &str) -> PoolResult<Option<String>> {
            Ok(Some(format!("{}-src", package)))
        }
        fn gc(&mut self, recurse: bool) -> PoolResult<GcReport> {
            self.calls.push(format!("gc {}", recurse));
            Ok(GcReport {
                whitelisted: 1,
                removed: vec!["old=0.1".into()],
            })
        }
        fn sync(&mut self) -> PoolResult<()> {
            self.calls.push("sync".into());
            Ok(())
        }
        fn info(&mut self, query: InfoQuery, _recursive: bool) -> PoolResult<Vec<PoolInfo>> {
            self.calls.push(format!("info {:?}", query));
            Ok(vec![PoolInfo {
                path: PathBuf::from("/srv/pool"),
                report: InfoReport::BuildRoot(PathBuf::from("/srv/buildroot")),
            }])
        }
        fn autosync(&mut self) -> PoolResult<bool> {
            Ok(self.autosync)
        }
        fn set_autosync(&mut self, autosync: bool) -> PoolResult<()> {
            self.autosync = autosync;
            Ok(())
        }
        fn debug(&mut self) -> PoolResult<bool> {
            Ok(self.debug)
        }
        fn set_debug(&mut self, debug: bool) -> PoolResult<()> {
            self.debug = debug;
            Ok(())
        }
        fn pool_owner(&mut self) -> PoolResult<(u32, u32)> {
            Ok((1000, 1000))
        }
    }

    fn encode(requests: &[Request]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for request in requests {
            write_frame(&mut buf, request).unwrap();
        }
        Cursor::new(buf)
    }

    fn decode(buf: Vec<u8>) -> Vec<Response> {
        let mut cursor = Cursor::new(buf);
        let mut responses = Vec::new();
        while let Some(response) = read_frame(&mut cursor).unwrap() {
            responses.push(response);
        }
        responses
    }

    #[test]
    fn one_response_per_request() {
        let mut api = RecordingApi::default();
        let mut reader = encode(&[
            Request::Invoke(Call::Exists {
                package: "foo".into(),
            }),
            Request::Invoke(Call::Register {
                stock: "/src/foo#master".into(),
            }),
            Request::Invoke(Call::List { all_versions: true }),
        ]);
        let mut out = Vec::new();

        serve(&mut api, &mut reader, &mut out).unwrap();

        let responses = decode(out);
        assert_eq!(
            responses,
            vec![
                Response::Ok(Value::Bool(true)),
                Response::Ok(Value::Null),
                Response::Ok(serde_json::json!(["foo=1.0", "bar=2.0"])),
            ]
        );
        assert_eq!(
            api.calls,
            vec!["exists foo", "register /src/foo#master", "list true"]
        );
    }

    #[test]
    fn errors_are_answered_not_fatal() {
        let mut api = RecordingApi::default();
        let mut reader = encode(&[
            Request::Invoke(Call::Unregister {
                stock: "/nope".into(),
            }),
            Request::Invoke(Call::Sync),
        ]);
        let mut out = Vec::new();

        serve(&mut api, &mut reader, &mut out).unwrap();

        let responses = decode(out);
        assert_eq!(responses.len(), 2);
        match &responses[0] {
            Response::Err(e) => {
                assert_eq!(e.kind, ErrorKind::NotFound);
                assert!(e.message.contains("/nope"));
            }
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(responses[1], Response::Ok(Value::Null));
    }

    #[test]
    fn fields_are_read_and_written() {
        let mut api = RecordingApi::default();
        let mut reader = encode(&[
            Request::Set(FieldValue::Debug(true)),
            Request::Get(Field::Debug),
            Request::Get(Field::Autosync),
        ]);
        let mut out = Vec::new();

        serve(&mut api, &mut reader, &mut out).unwrap();

        assert_eq!(
            decode(out),
            vec![
                Response::Ok(Value::Null),
                Response::Ok(Value::Bool(true)),
                Response::Ok(Value::Bool(false)),
            ]
        );
        assert!(api.debug);
    }

    #[test]
    fn worker_reports_unopenable_pool() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut buf = Vec::new();
        write_frame(
            &mut buf,
            &WorkerInit {
                path: dir.path().to_path_buf(),
                debug: false,
                tools: crate::config::schema::ToolsConfig::default(),
            },
        )
        .unwrap();
        let mut out = Vec::new();

        run_worker(&mut Cursor::new(buf), &mut out).unwrap();

        match decode(out).as_slice() {
            [Response::Err(e)] => assert_eq!(e.kind, ErrorKind::NotInitialized),
            other => panic!("unexpected responses: {:?}", other),
        }
    }

    #[test]
    fn worker_without_init_is_protocol_error() {
        let err = run_worker(&mut Cursor::new(Vec::new()), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, PoolError::Protocol(_)));
    }
}
