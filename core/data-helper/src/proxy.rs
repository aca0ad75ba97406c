//! Socket-backed [`DataAbilityRemote`] speaking the scheduler protocol to
//! the runtime that hosts a Data ability.

use ability_core::{
    AbilityError, DataAbilityPredicates, DataAbilityRemote, PacMap, ResultSet, Token, Uri,
    ValuesBucket,
};
use ability_scheduler_protocol::{
    DataAbilityParams, DataOp, DataReply, Method, Request, Response, MAX_REQUEST_BYTES,
    PROTOCOL_VERSION,
};
use chrono::Utc;
use rand::RngCore;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const READ_TIMEOUT_MS: u64 = 2000;
const WRITE_TIMEOUT_MS: u64 = 2000;

/// One provider binding: the socket its runtime listens on and the token
/// the provider is hosted under there.
pub struct SocketDataAbilityProxy {
    socket: PathBuf,
    provider_token: Token,
}

impl SocketDataAbilityProxy {
    pub fn new(socket: PathBuf, provider_token: Token) -> Self {
        Self {
            socket,
            provider_token,
        }
    }

    fn call(&self, uri: &Uri, op: DataOp) -> ability_core::Result<DataReply> {
        let op_name = op.name();
        let params = DataAbilityParams {
            token: self.provider_token.clone(),
            uri: uri.to_string(),
            op,
        };
        let request = Request {
            protocol_version: PROTOCOL_VERSION,
            method: Method::DataAbility,
            id: Some(make_request_id()),
            params: Some(serde_json::to_value(&params).map_err(|err| AbilityError::Json {
                context: format!("serialize {} request", op_name),
                source: err,
            })?),
        };

        let response = self.send_request(&request, op_name)?;
        if !response.ok {
            let details = response
                .error
                .map(|err| format!("{}: {}", err.code, err.message))
                .unwrap_or_else(|| "unknown provider error".to_string());
            return Err(AbilityError::remote(op_name, details));
        }
        let data = response
            .data
            .ok_or_else(|| AbilityError::remote(op_name, "provider reply carried no data"))?;
        serde_json::from_value(data).map_err(|err| AbilityError::Json {
            context: format!("decode {} reply", op_name),
            source: err,
        })
    }

    fn send_request(&self, request: &Request, op: &str) -> ability_core::Result<Response> {
        let mut stream = UnixStream::connect(&self.socket).map_err(|err| AbilityError::Io {
            context: format!("connect to provider for {}", op),
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
                        "provider response exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(AbilityError::remote(
                    op,
                    "timed out waiting for provider response",
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
        return Err(AbilityError::remote(op, "provider response was empty"));
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

fn unexpected_reply(op: &str, reply: &DataReply) -> AbilityError {
    AbilityError::remote(op, format!("unexpected provider reply {:?}", reply))
}

impl DataAbilityRemote for SocketDataAbilityProxy {
    fn insert(&self, uri: &Uri, values: &ValuesBucket) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::Insert {
                values: values.clone(),
            },
        )? {
            DataReply::Count { value } => Ok(value),
            other => Err(unexpected_reply("insert", &other)),
        }
    }

    fn update(
        &self,
        uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::Update {
                values: values.clone(),
                predicates: predicates.clone(),
            },
        )? {
            DataReply::Count { value } => Ok(value),
            other => Err(unexpected_reply("update", &other)),
        }
    }

    fn delete(&self, uri: &Uri, predicates: &DataAbilityPredicates) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::Delete {
                predicates: predicates.clone(),
            },
        )? {
            DataReply::Count { value } => Ok(value),
            other => Err(unexpected_reply("delete", &other)),
        }
    }

    fn query(
        &self,
        uri: &Uri,
        columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> ability_core::Result<Option<ResultSet>> {
        match self.call(
            uri,
            DataOp::Query {
                columns: columns.to_vec(),
                predicates: predicates.clone(),
            },
        )? {
            DataReply::Rows { result } => Ok(result),
            other => Err(unexpected_reply("query", &other)),
        }
    }

    fn get_type(&self, uri: &Uri) -> ability_core::Result<String> {
        match self.call(uri, DataOp::GetType)? {
            DataReply::MimeType { value } => Ok(value),
            other => Err(unexpected_reply("get_type", &other)),
        }
    }

    fn get_file_types(&self, uri: &Uri, mime_type_filter: &str) -> ability_core::Result<Vec<String>> {
        match self.call(
            uri,
            DataOp::GetFileTypes {
                mime_type_filter: mime_type_filter.to_string(),
            },
        )? {
            DataReply::MimeTypes { values } => Ok(values),
            other => Err(unexpected_reply("get_file_types", &other)),
        }
    }

    fn open_file(&self, uri: &Uri, mode: &str) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::OpenFile {
                mode: mode.to_string(),
            },
        )? {
            DataReply::Fd { value } => Ok(value),
            other => Err(unexpected_reply("open_file", &other)),
        }
    }

    fn open_raw_file(&self, uri: &Uri, mode: &str) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::OpenRawFile {
                mode: mode.to_string(),
            },
        )? {
            DataReply::Fd { value } => Ok(value),
            other => Err(unexpected_reply("open_raw_file", &other)),
        }
    }

    fn batch_insert(&self, uri: &Uri, values: &[ValuesBucket]) -> ability_core::Result<i32> {
        match self.call(
            uri,
            DataOp::BatchInsert {
                values: values.to_vec(),
            },
        )? {
            DataReply::Count { value } => Ok(value),
            other => Err(unexpected_reply("batch_insert", &other)),
        }
    }

    fn reload(&self, uri: &Uri, extras: &PacMap) -> ability_core::Result<bool> {
        match self.call(
            uri,
            DataOp::Reload {
                extras: extras.clone(),
            },
        )? {
            DataReply::Reloaded { value } => Ok(value),
            other => Err(unexpected_reply("reload", &other)),
        }
    }
}
