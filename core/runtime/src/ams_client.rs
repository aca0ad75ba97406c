//! Socket client for an external ability manager service (AMS).
//!
//! `acquire_data_ability` asks the manager to resolve a `dataability://`
//! locator. A grant names the provider runtime's socket and the token the
//! provider is hosted under, and the returned proxy speaks the data ability
//! protocol straight to that socket. The client remembers its live grants so
//! release can tell the manager which binding is going away.

use ability_core::{AbilityError, AbilityManager, DataAbilityRemote, Token, Uri};
use ability_scheduler_protocol::{
    AcquireGrant, AcquireParams, AmsMethod, AmsRequest, ReleaseParams, Response,
    MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use chrono::Utc;
use data_ability_helper::SocketDataAbilityProxy;
use rand::RngCore;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, warn};

pub const AMS_SOCKET_ENV: &str = "ABILITY_AMS_SOCKET";
const READ_TIMEOUT_MS: u64 = 2000;
const WRITE_TIMEOUT_MS: u64 = 2000;

pub fn ams_socket_from_env() -> Option<PathBuf> {
    env::var(AMS_SOCKET_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

struct GrantRecord {
    proxy: Arc<dyn DataAbilityRemote>,
    uri: String,
}

pub struct AmsClient {
    socket: PathBuf,
    grants: Mutex<Vec<GrantRecord>>,
}

impl AmsClient {
    pub fn new(socket: PathBuf) -> Self {
        Self {
            socket,
            grants: Mutex::new(Vec::new()),
        }
    }

    fn send_request(&self, request: &AmsRequest, op: &str) -> ability_core::Result<Response> {
        let mut stream = UnixStream::connect(&self.socket).map_err(|err| AbilityError::Io {
            context: format!("connect to ability manager for {}", op),
            source: err,
        })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request).map_err(|err| AbilityError::Json {
            context: format!("write {} request", op),
            source: err,
        })?;
        stream.write_all(b"\n").map_err(|err| AbilityError::Io {
            context: format!("flush {} request", op),
            source: err,
        })?;
        stream.flush().ok();

        read_response(&mut stream, op)
    }
}

impl AbilityManager for AmsClient {
    fn acquire_data_ability(
        &self,
        uri: &Uri,
        try_bind: bool,
        token: &Token,
    ) -> Option<Arc<dyn DataAbilityRemote>> {
        let params = AcquireParams {
            uri: uri.to_string(),
            try_bind,
            token: token.clone(),
        };
        let params = match serde_json::to_value(&params) {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, uri = %uri, "failed to serialize acquire request");
                return None;
            }
        };
        let request = AmsRequest {
            protocol_version: PROTOCOL_VERSION,
            method: AmsMethod::AcquireDataAbility,
            id: Some(make_request_id()),
            params: Some(params),
        };

        let response = match self.send_request(&request, "acquire_data_ability") {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, uri = %uri, "ability manager acquire failed");
                return None;
            }
        };
        if !response.ok {
            let code = response
                .error
                .as_ref()
                .map(|err| err.code.as_str())
                .unwrap_or("unknown");
            warn!(code, uri = %uri, "ability manager refused acquire");
            return None;
        }
        let grant: AcquireGrant = match response
            .data
            .and_then(|data| serde_json::from_value(data).ok())
        {
            Some(grant) => grant,
            None => {
                error!(uri = %uri, "ability manager grant was malformed");
                return None;
            }
        };

        let proxy: Arc<dyn DataAbilityRemote> =
            Arc::new(SocketDataAbilityProxy::new(grant.socket, grant.token));
        // Recover from poisoning - the grant list is append/remove only
        let mut grants = self
            .grants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        grants.push(GrantRecord {
            proxy: Arc::clone(&proxy),
            uri: uri.to_string(),
        });
        Some(proxy)
    }

    fn release_data_ability(
        &self,
        proxy: &Arc<dyn DataAbilityRemote>,
        token: &Token,
    ) -> ability_core::Result<()> {
        let uri = {
            // Recover from poisoning - the grant list is append/remove only
            let mut grants = self
                .grants
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let index = grants
                .iter()
                .position(|grant| Arc::ptr_eq(&grant.proxy, proxy))
                .ok_or_else(|| {
                    AbilityError::remote(
                        "release_data_ability",
                        "proxy was not acquired through this manager",
                    )
                })?;
            grants.remove(index).uri
        };

        let params = ReleaseParams {
            uri,
            token: token.clone(),
        };
        let request = AmsRequest {
            protocol_version: PROTOCOL_VERSION,
            method: AmsMethod::ReleaseDataAbility,
            id: Some(make_request_id()),
            params: Some(serde_json::to_value(&params).map_err(|err| AbilityError::Json {
                context: "serialize release request".to_string(),
                source: err,
            })?),
        };

        let response = self.send_request(&request, "release_data_ability")?;
        if !response.ok {
            let details = response
                .error
                .map(|err| format!("{}: {}", err.code, err.message))
                .unwrap_or_else(|| "unknown manager error".to_string());
            return Err(AbilityError::remote("release_data_ability", details));
        }
        Ok(())
    }
}

fn read_response(stream: &mut UnixStream, op: &str) -> ability_core::Result<Response> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(AbilityError::remote(
                        op,
                        "manager response exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(AbilityError::remote(
                    op,
                    "timed out waiting for manager response",
                ));
            }
            Err(err) => {
                return Err(AbilityError::Io {
                    context: format!("read {} response", op),
                    source: err,
                });
            }
        }
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let response_bytes = match newline_index {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err(AbilityError::remote(op, "manager response was empty"));
    }

    serde_json::from_slice(response_bytes).map_err(|err| AbilityError::Json {
        context: format!("parse {} response", op),
        source: err,
    })
}

fn make_request_id() -> String {
    let mut random = rand::thread_rng();
    let rand = random.next_u64();
    format!(
        "req-{}-{}-{:x}",
        Utc::now().timestamp_millis(),
        std::process::id(),
        rand
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::net::UnixListener;
    use std::sync::{Mutex as StdMutex, OnceLock};
    use std::thread::{self, JoinHandle};

    static ENV_LOCK: OnceLock<StdMutex<()>> = OnceLock::new();

    fn env_lock() -> &'static StdMutex<()> {
        ENV_LOCK.get_or_init(|| StdMutex::new(()))
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var(key).ok();
            env::set_var(key, value);
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var(key).ok();
            env::remove_var(key);
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.previous.take() {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    fn serve_requests(
        listener: UnixListener,
        responses: Vec<Response>,
    ) -> JoinHandle<Vec<AmsRequest>> {
        thread::spawn(move || {
            let mut captured = Vec::new();
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let mut buffer = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            buffer.extend_from_slice(&chunk[..n]);
                            if buffer.contains(&b'\n') {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                let newline = buffer
                    .iter()
                    .position(|b| *b == b'\n')
                    .unwrap_or(buffer.len());
                if let Ok(request) = serde_json::from_slice(&buffer[..newline]) {
                    captured.push(request);
                }
                if let Ok(mut payload) = serde_json::to_vec(&response) {
                    payload.push(b'\n');
                    let _ = stream.write_all(&payload);
                }
            }
            captured
        })
    }

    fn notes_uri() -> Uri {
        Uri::parse("dataability:///com.example.notes").unwrap()
    }

    #[test]
    fn acquire_and_release_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ams_socket = dir.path().join("ams.sock");
        let provider_socket = dir.path().join("provider.sock");
        let listener = UnixListener::bind(&ams_socket).unwrap();

        let grant = Response::ok(
            None,
            serde_json::to_value(AcquireGrant {
                socket: provider_socket.clone(),
                token: Token::new("provider-7"),
            })
            .unwrap(),
        );
        let released = Response::ok(None, json!({ "released": true }));
        let server = serve_requests(listener, vec![grant, released]);

        let client = AmsClient::new(ams_socket);
        let token = Token::new("consumer-1");
        let proxy = client
            .acquire_data_ability(&notes_uri(), true, &token)
            .expect("grant produces a proxy");
        client.release_data_ability(&proxy, &token).unwrap();

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].method, AmsMethod::AcquireDataAbility);
        let acquire: AcquireParams =
            serde_json::from_value(requests[0].params.clone().unwrap()).unwrap();
        assert_eq!(acquire.uri, "dataability:///com.example.notes");
        assert!(acquire.try_bind);
        assert_eq!(requests[1].method, AmsMethod::ReleaseDataAbility);
        let release: ReleaseParams =
            serde_json::from_value(requests[1].params.clone().unwrap()).unwrap();
        assert_eq!(release.uri, "dataability:///com.example.notes");
    }

    #[test]
    fn refused_acquire_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let ams_socket = dir.path().join("ams.sock");
        let listener = UnixListener::bind(&ams_socket).unwrap();
        let refusal = Response::error(None, "unknown_ability", "no provider for uri");
        let server = serve_requests(listener, vec![refusal]);

        let client = AmsClient::new(ams_socket);
        let token = Token::new("consumer-1");
        assert!(client
            .acquire_data_ability(&notes_uri(), false, &token)
            .is_none());
        server.join().unwrap();
    }

    #[test]
    fn unreachable_manager_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let client = AmsClient::new(dir.path().join("absent.sock"));
        let token = Token::new("consumer-1");
        assert!(client
            .acquire_data_ability(&notes_uri(), false, &token)
            .is_none());
    }

    #[test]
    fn releasing_a_foreign_proxy_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = AmsClient::new(dir.path().join("ams.sock"));
        let foreign: Arc<dyn DataAbilityRemote> = Arc::new(SocketDataAbilityProxy::new(
            dir.path().join("other.sock"),
            Token::new("x"),
        ));
        let err = client
            .release_data_ability(&foreign, &Token::new("consumer-1"))
            .unwrap_err();
        assert!(matches!(err, AbilityError::Remote { .. }));
    }

    #[test]
    fn ams_socket_env_round_trip() {
        let _lock = env_lock().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        {
            let _guard = EnvGuard::set(AMS_SOCKET_ENV, "/tmp/ams-test.sock");
            assert_eq!(
                ams_socket_from_env(),
                Some(PathBuf::from("/tmp/ams-test.sock"))
            );
        }
        {
            let _guard = EnvGuard::set(AMS_SOCKET_ENV, "   ");
            assert_eq!(ams_socket_from_env(), None);
        }
        {
            let _guard = EnvGuard::unset(AMS_SOCKET_ENV);
            assert_eq!(ams_socket_from_env(), None);
        }
    }
}
