use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tether_core::CancelToken;
use tether_host::{HttpBackend, HttpCall, HttpMethod, TransportError};
use tether_wasm::prelude::*;

/// A guest with a bump allocator whose handler answers
/// `[BODY]<MESSAGE env var><request body>[HEADERS]Content-Type:text/plain`.
const HANDLER_WAT: &str = r#"
    (module
        (import "env" "host_get_env" (func $get_env (param i32 i32 i32 i32) (result i32)))
        (memory (export "memory") 1)
        (global $next (mut i32) (i32.const 4096))
        (data (i32.const 0) "[BODY]")
        (data (i32.const 16) "[HEADERS]Content-Type:text/plain")
        (data (i32.const 64) "MESSAGE")

        (func (export "alloc") (param $len i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next (i32.add (global.get $next) (local.get $len)))
            (local.get $ptr))

        (func (export "handle")
            (param $body i32) (param $body_len i32)
            (param $headers i32) (param $headers_len i32)
            (param $ret i32) (param $cap i32)
            (result i32)
            (local $msg i32)
            (local $n i32)
            (memory.copy (local.get $ret) (i32.const 0) (i32.const 6))
            (local.set $msg
                (call $get_env
                    (i32.const 64) (i32.const 7)
                    (i32.add (local.get $ret) (i32.const 6)) (i32.const 64)))
            (if (i32.lt_s (local.get $msg) (i32.const 0))
                (then (local.set $msg (i32.const 0))))
            (local.set $n (i32.add (i32.const 6) (local.get $msg)))
            (memory.copy
                (i32.add (local.get $ret) (local.get $n))
                (local.get $body)
                (local.get $body_len))
            (local.set $n (i32.add (local.get $n) (local.get $body_len)))
            (memory.copy
                (i32.add (local.get $ret) (local.get $n))
                (i32.const 16)
                (i32.const 32))
            (i32.add (local.get $n) (i32.const 32)))
    )
"#;

const FAILING_WAT: &str = r#"
    (module
        (memory (export "memory") 1)
        (global $next (mut i32) (i32.const 4096))
        (data (i32.const 0) "[ERR]bad request[400]")

        (func (export "alloc") (param $len i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next (i32.add (global.get $next) (local.get $len)))
            (local.get $ptr))

        (func (export "handle")
            (param i32 i32 i32 i32) (param $ret i32) (param i32)
            (result i32)
            (memory.copy (local.get $ret) (i32.const 0) (i32.const 21))
            (i32.const 21))
    )
"#;

/// A guest with two pages of memory whose bump allocator traps when full and
/// rewinds once every region is returned through `dealloc`. Its handler
/// answers `[BODY]<request body>[HEADERS]`.
const RECLAIMING_WAT: &str = r#"
    (module
        (memory (export "memory") 2)
        (global $next (mut i32) (i32.const 1024))
        (global $live (mut i32) (i32.const 0))
        (data (i32.const 0) "[BODY]")
        (data (i32.const 16) "[HEADERS]")

        (func (export "alloc") (param $len i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (if (i32.gt_u
                    (i32.add (local.get $ptr) (local.get $len))
                    (i32.mul (memory.size) (i32.const 65536)))
                (then (unreachable)))
            (global.set $next (i32.add (local.get $ptr) (local.get $len)))
            (global.set $live (i32.add (global.get $live) (i32.const 1)))
            (local.get $ptr))

        (func (export "dealloc") (param $ptr i32) (param $len i32)
            (global.set $live (i32.sub (global.get $live) (i32.const 1)))
            (if (i32.eqz (global.get $live))
                (then (global.set $next (i32.const 1024)))))

        (func (export "live") (result i32) (global.get $live))

        (func (export "handle")
            (param $body i32) (param $body_len i32)
            (param i32 i32)
            (param $ret i32) (param i32)
            (result i32)
            (memory.copy (local.get $ret) (i32.const 0) (i32.const 6))
            (memory.copy
                (i32.add (local.get $ret) (i32.const 6))
                (local.get $body)
                (local.get $body_len))
            (memory.copy
                (i32.add (local.get $ret) (i32.add (i32.const 6) (local.get $body_len)))
                (i32.const 16)
                (i32.const 9))
            (i32.add (local.get $body_len) (i32.const 15)))
    )
"#;

/// Calls `host_http` GET on https://a.test/x once (`fetch`) or twice
/// (`fetch_twice`), writing results at 128 and 512.
const FETCH_WAT: &str = r#"
    (module
        (import "env" "host_http"
            (func $http (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))
        (memory (export "memory") 1)
        (data (i32.const 0) "https://a.test/x")
        (data (i32.const 32) "GET")
        (data (i32.const 48) "Accept:text/plain")

        (func $get (param $ret i32)
            (call $http
                (i32.const 0) (i32.const 16)
                (i32.const 32) (i32.const 3)
                (i32.const 48) (i32.const 17)
                (i32.const 0) (i32.const 0)
                (local.get $ret) (i32.const 256)))

        (func (export "fetch") (call $get (i32.const 128)))
        (func (export "fetch_twice")
            (call $get (i32.const 128))
            (call $get (i32.const 512)))
    )
"#;

type Seen = Arc<Mutex<Vec<(HttpCall, Option<Duration>)>>>;

struct Recording {
    seen: Seen,
    cancel: Arc<Mutex<Option<CancelToken>>>,
}

impl HttpBackend for Recording {
    fn execute(
        &self,
        method: HttpMethod,
        call: &HttpCall,
        timeout: Option<Duration>,
    ) -> Result<String, TransportError> {
        self.seen.lock().push((call.clone(), timeout));
        if let Some(token) = self.cancel.lock().as_ref() {
            token.cancel();
        }
        Ok(format!("{} {} ok", method, call.url))
    }
}

struct Harness {
    seen: Seen,
    cancel: Arc<Mutex<Option<CancelToken>>>,
}

impl Harness {
    fn new() -> Self {
        Self {
            seen: Arc::default(),
            cancel: Arc::default(),
        }
    }

    fn builder(&self) -> TetherBuilder {
        let seen = Arc::clone(&self.seen);
        let cancel = Arc::clone(&self.cancel);
        let factory = move || -> Box<dyn HttpBackend> {
            Box::new(Recording {
                seen: Arc::clone(&seen),
                cancel: Arc::clone(&cancel),
            })
        };
        Tether::builder().with_backend_factory(Arc::new(factory))
    }
}

fn read_result(sandbox: &mut Sandbox<()>, offset: usize) -> String {
    let bytes = sandbox.read_memory(offset, 256).unwrap();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8(bytes[..end].to_vec()).unwrap()
}

#[test]
fn test_handler_round_trip() {
    let runtime = Tether::builder()
        .with_env(EnvCapability::allow_only(["MESSAGE"]))
        .with_env_var("MESSAGE", "hola ")
        .build()
        .unwrap();
    let module = runtime.load_wat(HANDLER_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    let reply = runtime
        .invoke_handler(&mut sandbox, "mundo", &Headers::new())
        .unwrap();

    assert_eq!(reply.body, "hola mundo");
    assert_eq!(reply.headers["Content-Type"], "text/plain");
    assert_eq!(sandbox.metrics().host_calls, 1);
}

#[test]
fn test_handler_without_env_grant() {
    let runtime = Tether::builder()
        .with_env_var("MESSAGE", "secret ")
        .build()
        .unwrap();
    let module = runtime.load_wat(HANDLER_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    let reply = runtime
        .invoke_handler(&mut sandbox, "mundo", &Headers::new())
        .unwrap();

    assert_eq!(reply.body, "mundo");
}

#[test]
fn test_handler_error() {
    let runtime = Tether::with_defaults().unwrap();
    let module = runtime.load_wat(FAILING_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    let err = runtime
        .invoke_handler(&mut sandbox, "", &Headers::new())
        .unwrap_err();

    match err {
        TetherRuntimeError::HandlerFailed(failure) => {
            assert_eq!(failure.message, "bad request");
            assert_eq!(failure.code, 400);
        }
        other => panic!("expected handler failure, got {other}"),
    }
}

#[test]
fn test_repeated_invocations_release_guest_memory() {
    let runtime = Tether::with_defaults().unwrap();
    let module = runtime.load_wat(RECLAIMING_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    for i in 0..100 {
        let body = format!("request {i}");
        let reply = runtime
            .invoke_handler(&mut sandbox, &body, &Headers::new())
            .unwrap();
        assert_eq!(reply.body, body);
    }

    assert_eq!(sandbox.call::<(), i32>("live", ()).unwrap(), 0);
}

#[test]
fn test_guest_memory_released_after_handler_error() {
    let runtime = Tether::builder()
        .with_bridge_config(BridgeConfig::new().with_wire_format(WireFormat::LengthPrefixed))
        .build()
        .unwrap();
    let module = runtime.load_wat(RECLAIMING_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    for _ in 0..3 {
        assert!(matches!(
            runtime.invoke_handler(&mut sandbox, "x", &Headers::new()),
            Err(TetherRuntimeError::MalformedResponse(_))
        ));
    }

    assert_eq!(sandbox.call::<(), i32>("live", ()).unwrap(), 0);
}

#[test]
fn test_handler_requires_exports() {
    let runtime = Tether::with_defaults().unwrap();
    let module = runtime
        .load_wat(r#"(module (memory (export "memory") 1))"#)
        .unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    assert!(matches!(
        runtime.invoke_handler(&mut sandbox, "", &Headers::new()),
        Err(TetherRuntimeError::MissingExport("alloc"))
    ));
}

#[test]
fn test_guest_http_through_runtime() {
    let harness = Harness::new();
    let runtime = harness
        .builder()
        .with_network(NetworkCapability::https_only(vec!["a.test".to_string()]))
        .with_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let module = runtime.load_wat(FETCH_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    sandbox.call_void("fetch").unwrap();

    assert_eq!(read_result(&mut sandbox, 128), "GET https://a.test/x ok");
    let seen = harness.seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.headers["Accept"], "text/plain");
    assert!(seen[0].1.is_some_and(|t| t <= Duration::from_secs(2)));
}

#[test]
fn test_guest_http_denied_without_grant() {
    let harness = Harness::new();
    let runtime = harness.builder().build().unwrap();
    let module = runtime.load_wat(FETCH_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();

    sandbox.call_void("fetch").unwrap();

    assert!(read_result(&mut sandbox, 128).starts_with("[ERR]permission denied"));
    assert!(harness.seen.lock().is_empty());
}

#[test]
fn test_cancellation_reaches_later_host_calls() {
    let harness = Harness::new();
    let runtime = harness
        .builder()
        .with_network(NetworkCapability::allow_all())
        .build()
        .unwrap();
    let module = runtime.load_wat(FETCH_WAT).unwrap();
    let mut sandbox = runtime.sandbox().build().unwrap();
    sandbox.load_module(&module).unwrap();
    *harness.cancel.lock() = Some(sandbox.cancel_token());

    sandbox.call_void("fetch_twice").unwrap();

    assert_eq!(read_result(&mut sandbox, 128), "GET https://a.test/x ok");
    assert_eq!(read_result(&mut sandbox, 512), "[ERR]call cancelled");
    assert_eq!(harness.seen.lock().len(), 1);
    assert_eq!(sandbox.metrics().host_calls, 2);
}
