//! Socket front end: accepts scheduler connections, validates requests, and
//! maps them onto the runtime.
//!
//! One JSON request per connection, newline-terminated, answered with one
//! JSON response. Malformed traffic is answered with a coded error instead
//! of a hangup.

use crate::ability_thread::AbilityThread;
use crate::app_runtime::AppRuntime;
use ability_core::{AbilityError, Uri};
use ability_scheduler_protocol::{
    parse_command, parse_configuration, parse_connection, parse_data, parse_launch_ability,
    parse_launch_application, parse_memory_level, parse_restore_state, parse_send_result,
    parse_token, parse_transaction, DataOp, DataReply, ErrorInfo, Method, Request, Response,
    MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use fs_err as fs;
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const SOCKET_NAME: &str = "runtime.sock";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

pub fn runtime_socket_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".ability-runtime").join(SOCKET_NAME))
}

pub fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

pub fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

pub fn serve(listener: UnixListener, runtime: Arc<AppRuntime>) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let runtime = Arc::clone(&runtime);
                thread::spawn(|| handle_connection(stream, runtime));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept runtime connection");
            }
        }
    }
}

fn handle_connection(mut stream: UnixStream, runtime: Arc<AppRuntime>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Runtime request received");
    let response = handle_request(request, &runtime);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    if buffer.is_empty() {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    let newline_index = buffer.iter().position(|b| *b == b'\n');
    let request_bytes = match newline_index {
        Some(index) => {
            if buffer.len() > index + 1 {
                let trailing = &buffer[index + 1..];
                if trailing.iter().any(|b| !b.is_ascii_whitespace()) {
                    warn!("Extra bytes detected after newline; ignoring trailing data");
                }
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, runtime: &Arc<AppRuntime>) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let Request {
        id, method, params, ..
    } = request;
    match method {
        Method::GetHealth => handle_health(id, runtime),
        Method::ScheduleLaunchApplication => handle_launch_application(id, params, runtime),
        Method::ScheduleForegroundApplication => {
            app_transition(id, "foreground", runtime.foreground_application(), runtime)
        }
        Method::ScheduleBackgroundApplication => {
            app_transition(id, "background", runtime.background_application(), runtime)
        }
        Method::ScheduleTerminateApplication => {
            app_transition(id, "terminate", runtime.terminate_application(), runtime)
        }
        Method::ScheduleMemoryLevel => handle_memory_level(id, params, runtime),
        Method::ScheduleConfigurationUpdated => handle_configuration(id, params, runtime),
        Method::ScheduleLaunchAbility => handle_launch_ability(id, params, runtime),
        Method::ScheduleCleanAbility => handle_clean_ability(id, params, runtime),
        Method::ScheduleAbilityTransaction => handle_transaction(id, params, runtime),
        Method::ScheduleConnectAbility => handle_connect(id, params, runtime),
        Method::ScheduleDisconnectAbility => handle_disconnect(id, params, runtime),
        Method::ScheduleCommandAbility => handle_command(id, params, runtime),
        Method::ScheduleSaveAbilityState => handle_save_state(id, params, runtime),
        Method::ScheduleRestoreAbilityState => handle_restore_state(id, params, runtime),
        Method::SendResult => handle_send_result(id, params, runtime),
        Method::DataAbility => handle_data_ability(id, params, runtime),
    }
}

fn handle_health(id: Option<String>, runtime: &Arc<AppRuntime>) -> Response {
    let data = serde_json::json!({
        "status": "ok",
        "pid": std::process::id(),
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": PROTOCOL_VERSION,
        "bundle": runtime.bundle_name(),
        "app_state": runtime.app_state(),
        "abilities": runtime.ability_count(),
        "started_at": runtime.started_at().to_rfc3339(),
    });
    Response::ok(id, data)
}

fn handle_launch_application(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let parsed = match parse_launch_application(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    app_transition(
        id,
        "app_ready",
        runtime.launch_application(parsed.record_id),
        runtime,
    )
}

fn app_transition(
    id: Option<String>,
    edge: &str,
    moved: bool,
    runtime: &Arc<AppRuntime>,
) -> Response {
    if moved {
        Response::ok(id, serde_json::json!({ "state": runtime.app_state() }))
    } else {
        Response::error(
            id,
            "illegal_app_transition",
            format!("cannot {} while the application is {:?}", edge, runtime.app_state()),
        )
    }
}

fn handle_memory_level(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "level is required"),
    };
    let parsed = match parse_memory_level(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    runtime.memory_level(parsed.level);
    Response::ok(id, serde_json::json!({ "accepted": true }))
}

fn handle_configuration(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "config is required"),
    };
    let parsed = match parse_configuration(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    runtime.configuration_updated(&parsed.config);
    Response::ok(id, serde_json::json!({ "accepted": true }))
}

fn handle_launch_ability(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "ability_name and token are required"),
    };
    let parsed = match parse_launch_ability(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    match runtime.launch_ability(&parsed.ability_name, parsed.token) {
        Ok(info) => match serde_json::to_value(&info) {
            Ok(value) => Response::ok(id, serde_json::json!({ "ability": value })),
            Err(err) => Response::error(
                id,
                "serialization_error",
                format!("Failed to serialize ability info: {}", err),
            ),
        },
        Err(err) => ability_error(id, &err),
    }
}

fn handle_clean_ability(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token is required"),
    };
    let parsed = match parse_token(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    match runtime.clean_ability(&parsed.token) {
        Ok(state) => Response::ok(id, serde_json::json!({ "cleaned": true, "state": state })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_transaction(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token and target_state are required"),
    };
    let parsed = match parse_transaction(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_ability_transaction(parsed.want, parsed.target_state, parsed.new_want) {
        Ok(state) => Response::ok(id, serde_json::json!({ "state": state })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_connect(id: Option<String>, params: Option<Value>, runtime: &Arc<AppRuntime>) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token is required"),
    };
    let parsed = match parse_connection(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_connect_ability(parsed.want) {
        Ok(handle) => Response::ok(id, serde_json::json!({ "handle": handle })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_disconnect(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token is required"),
    };
    let parsed = match parse_connection(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_disconnect_ability(parsed.want) {
        Ok(()) => Response::ok(id, serde_json::json!({ "accepted": true })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_command(id: Option<String>, params: Option<Value>, runtime: &Arc<AppRuntime>) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token and start_id are required"),
    };
    let parsed = match parse_command(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_command_ability(parsed.want, parsed.restart, parsed.start_id) {
        Ok(()) => Response::ok(id, serde_json::json!({ "accepted": true })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_save_state(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token is required"),
    };
    let parsed = match parse_token(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_save_ability_state() {
        Ok(state) => match serde_json::to_value(&state) {
            Ok(value) => Response::ok(id, serde_json::json!({ "saved": value })),
            Err(err) => Response::error(
                id,
                "serialization_error",
                format!("Failed to serialize saved state: {}", err),
            ),
        },
        Err(err) => ability_error(id, &err),
    }
}

fn handle_restore_state(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token and state are required"),
    };
    let parsed = match parse_restore_state(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.schedule_restore_ability_state(parsed.state) {
        Ok(()) => Response::ok(id, serde_json::json!({ "accepted": true })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_send_result(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "token and result codes are required"),
    };
    let parsed = match parse_send_result(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    match thread.send_result(parsed.request_code, parsed.result_code, parsed.want) {
        Ok(()) => Response::ok(id, serde_json::json!({ "accepted": true })),
        Err(err) => ability_error(id, &err),
    }
}

fn handle_data_ability(
    id: Option<String>,
    params: Option<Value>,
    runtime: &Arc<AppRuntime>,
) -> Response {
    let params = match params {
        Some(params) => params,
        None => return Response::error(id, "invalid_params", "data ability payload is required"),
    };
    let parsed = match parse_data(params) {
        Ok(parsed) => parsed,
        Err(err) => return Response::error_with_info(id, err),
    };
    // Validation already proved the uri parses.
    let uri = match Uri::parse(&parsed.uri) {
        Ok(uri) => uri,
        Err(err) => return ability_error(id, &err),
    };
    let thread = match runtime.thread(&parsed.token) {
        Ok(thread) => thread,
        Err(err) => return ability_error(id, &err),
    };
    tracing::debug!(op = parsed.op.name(), uri = %uri, "Data ability request");
    match execute_data_op(&thread, uri, parsed.op) {
        Ok(reply) => match serde_json::to_value(&reply) {
            Ok(value) => Response::ok(id, value),
            Err(err) => Response::error(
                id,
                "serialization_error",
                format!("Failed to serialize data reply: {}", err),
            ),
        },
        Err(err) => ability_error(id, &err),
    }
}

fn execute_data_op(
    thread: &Arc<AbilityThread>,
    uri: Uri,
    op: DataOp,
) -> Result<DataReply, AbilityError> {
    Ok(match op {
        DataOp::Insert { values } => DataReply::Count {
            value: thread.insert(uri, values)?,
        },
        DataOp::Update { values, predicates } => DataReply::Count {
            value: thread.update(uri, values, predicates)?,
        },
        DataOp::Delete { predicates } => DataReply::Count {
            value: thread.delete(uri, predicates)?,
        },
        DataOp::Query {
            columns,
            predicates,
        } => DataReply::Rows {
            result: thread.query(uri, columns, predicates)?,
        },
        DataOp::GetType => DataReply::MimeType {
            value: thread.get_type(uri)?,
        },
        DataOp::GetFileTypes { mime_type_filter } => DataReply::MimeTypes {
            values: thread.get_file_types(uri, mime_type_filter)?,
        },
        DataOp::OpenFile { mode } => DataReply::Fd {
            value: thread.open_file(uri, mode)?,
        },
        DataOp::OpenRawFile { mode } => DataReply::Fd {
            value: thread.open_raw_file(uri, mode)?,
        },
        DataOp::BatchInsert { values } => DataReply::Count {
            value: thread.batch_insert(uri, values)?,
        },
        DataOp::Reload { extras } => DataReply::Reloaded {
            value: thread.reload(uri, extras)?,
        },
    })
}

fn ability_error(id: Option<String>, err: &AbilityError) -> Response {
    Response::error(id, error_code(err), err.to_string())
}

fn error_code(err: &AbilityError) -> &'static str {
    match err {
        AbilityError::NotReady { .. } => "not_ready",
        AbilityError::AlreadyInitialized => "already_initialized",
        AbilityError::IllegalTransition { .. } => "illegal_transition",
        AbilityError::EmptyAbilityName => "invalid_ability_name",
        AbilityError::UnsupportedKind { .. } => "unsupported_kind",
        AbilityError::UnknownAbility(_) => "unknown_ability",
        AbilityError::UnknownToken(_) => "unknown_token",
        AbilityError::AlreadyAttached(_) => "already_attached",
        AbilityError::InvalidUri { .. } => "invalid_uri",
        AbilityError::Remote { .. } => "remote_error",
        AbilityError::HandlerGone { .. } => "handler_gone",
        AbilityError::Io { .. } => "io_error",
        AbilityError::Json { .. } => "json_error",
    }
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{demo_application, demo_manifest, demo_registry, NOTE_ABILITY, NOTE_URI, PAGE_ABILITY};
    use serde_json::json;

    fn demo_runtime() -> Arc<AppRuntime> {
        AppRuntime::local(demo_application(), demo_registry(), demo_manifest())
    }

    fn request(method: Method, params: Option<Value>) -> Request {
        Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some("t-1".to_string()),
            params,
        }
    }

    fn data(response: &Response) -> &Value {
        assert!(
            response.ok,
            "expected an ok response, got {:?}",
            response.error
        );
        response.data.as_ref().unwrap()
    }

    #[test]
    fn health_reports_runtime_state() {
        let runtime = demo_runtime();
        let response = handle_request(request(Method::GetHealth, None), &runtime);
        let data = data(&response);
        assert_eq!(data["status"], json!("ok"));
        assert_eq!(data["bundle"], json!("com.example.demo"));
        assert_eq!(data["app_state"], json!("create"));
        assert_eq!(data["abilities"], json!(0));
        assert_eq!(data["protocol_version"], json!(PROTOCOL_VERSION));
    }

    #[test]
    fn protocol_mismatch_is_rejected_first() {
        let runtime = demo_runtime();
        let response = handle_request(
            Request {
                protocol_version: 99,
                method: Method::GetHealth,
                id: None,
                params: None,
            },
            &runtime,
        );
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "protocol_mismatch");
    }

    #[test]
    fn application_transitions_flow_through_the_wire() {
        let runtime = demo_runtime();
        let launch = handle_request(
            request(Method::ScheduleLaunchApplication, Some(json!({ "record_id": 7 }))),
            &runtime,
        );
        assert_eq!(data(&launch)["state"], json!("ready"));

        let foreground = handle_request(request(Method::ScheduleForegroundApplication, None), &runtime);
        assert_eq!(data(&foreground)["state"], json!("foreground"));

        let background = handle_request(request(Method::ScheduleBackgroundApplication, None), &runtime);
        assert_eq!(data(&background)["state"], json!("background"));

        let terminate = handle_request(request(Method::ScheduleTerminateApplication, None), &runtime);
        assert_eq!(data(&terminate)["state"], json!("terminated"));

        let too_late = handle_request(request(Method::ScheduleForegroundApplication, None), &runtime);
        assert!(!too_late.ok);
        assert_eq!(too_late.error.unwrap().code, "illegal_app_transition");
    }

    #[test]
    fn page_ability_walks_its_lifecycle_over_the_wire() {
        let runtime = demo_runtime();
        let launch = handle_request(
            request(
                Method::ScheduleLaunchAbility,
                Some(json!({ "ability_name": PAGE_ABILITY, "token": "page-1" })),
            ),
            &runtime,
        );
        assert_eq!(data(&launch)["ability"]["kind"], json!("page"));

        let active = handle_request(
            request(
                Method::ScheduleAbilityTransaction,
                Some(json!({ "token": "page-1", "target_state": "active" })),
            ),
            &runtime,
        );
        assert_eq!(data(&active)["state"], json!("active"));

        let saved = handle_request(
            request(Method::ScheduleSaveAbilityState, Some(json!({ "token": "page-1" }))),
            &runtime,
        );
        assert_eq!(data(&saved)["saved"]["visits"], json!(1));

        let cleaned = handle_request(
            request(Method::ScheduleCleanAbility, Some(json!({ "token": "page-1" }))),
            &runtime,
        );
        assert_eq!(data(&cleaned)["state"], json!("initial"));
        assert_eq!(runtime.ability_count(), 0);
    }

    #[test]
    fn unknown_tokens_are_coded_errors() {
        let runtime = demo_runtime();
        let response = handle_request(
            request(
                Method::ScheduleAbilityTransaction,
                Some(json!({ "token": "ghost", "target_state": "active" })),
            ),
            &runtime,
        );
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "unknown_token");
    }

    #[test]
    fn missing_params_are_invalid() {
        let runtime = demo_runtime();
        let response = handle_request(request(Method::ScheduleAbilityTransaction, None), &runtime);
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "invalid_params");
    }

    #[test]
    fn data_ability_requests_round_trip() {
        let runtime = demo_runtime();
        handle_request(
            request(
                Method::ScheduleLaunchAbility,
                Some(json!({ "ability_name": NOTE_ABILITY, "token": "note-1" })),
            ),
            &runtime,
        );
        handle_request(
            request(
                Method::ScheduleAbilityTransaction,
                Some(json!({ "token": "note-1", "target_state": "active" })),
            ),
            &runtime,
        );

        let inserted = handle_request(
            request(
                Method::DataAbility,
                Some(json!({
                    "token": "note-1",
                    "uri": NOTE_URI,
                    "op": { "kind": "insert", "values": { "text": "milk" } },
                })),
            ),
            &runtime,
        );
        assert_eq!(data(&inserted)["kind"], json!("count"));
        assert_eq!(data(&inserted)["value"], json!(1));

        let rows = handle_request(
            request(
                Method::DataAbility,
                Some(json!({
                    "token": "note-1",
                    "uri": NOTE_URI,
                    "op": { "kind": "query" },
                })),
            ),
            &runtime,
        );
        assert_eq!(data(&rows)["kind"], json!("rows"));
        assert_eq!(data(&rows)["result"]["rows"][0][1], json!("milk"));

        let illegal = handle_request(
            request(
                Method::DataAbility,
                Some(json!({
                    "token": "note-1",
                    "uri": "content://foreign",
                    "op": { "kind": "get_type" },
                })),
            ),
            &runtime,
        );
        assert!(!illegal.ok);
        assert_eq!(illegal.error.unwrap().code, "invalid_uri");
    }

    #[test]
    fn service_connect_returns_a_handle() {
        let runtime = demo_runtime();
        handle_request(
            request(
                Method::ScheduleLaunchAbility,
                Some(json!({ "ability_name": "DemoServiceAbility", "token": "svc-1" })),
            ),
            &runtime,
        );
        let connected = handle_request(
            request(
                Method::ScheduleConnectAbility,
                Some(json!({ "token": "svc-1" })),
            ),
            &runtime,
        );
        assert_eq!(data(&connected)["handle"], json!(1));
    }
}
