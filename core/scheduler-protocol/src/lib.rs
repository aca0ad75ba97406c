//! Scheduler IPC protocol types and validation for the ability runtime.
//!
//! This crate is shared by the runtime and scheduler-side clients to prevent
//! schema drift. The runtime remains the authority on validation, but clients
//! can reuse the same types to construct valid requests.

use ability_core::{Configuration, LifecycleState, MemoryLevel, PacMap, Token, Uri, Want};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub mod data;

pub use data::{parse_data, DataAbilityParams, DataOp, DataReply};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    ScheduleLaunchApplication,
    ScheduleForegroundApplication,
    ScheduleBackgroundApplication,
    ScheduleTerminateApplication,
    ScheduleMemoryLevel,
    ScheduleConfigurationUpdated,
    ScheduleLaunchAbility,
    ScheduleCleanAbility,
    ScheduleAbilityTransaction,
    ScheduleConnectAbility,
    ScheduleDisconnectAbility,
    ScheduleCommandAbility,
    ScheduleSaveAbilityState,
    ScheduleRestoreAbilityState,
    SendResult,
    DataAbility,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Application scheduling payloads
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchApplicationParams {
    #[serde(default)]
    pub record_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryLevelParams {
    pub level: MemoryLevel,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationParams {
    pub config: Configuration,
}

// ─────────────────────────────────────────────────────────────────────────
// Ability scheduling payloads
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchAbilityParams {
    pub ability_name: String,
    pub token: Token,
}

impl LaunchAbilityParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.ability_name.trim().is_empty() {
            return Err(ErrorInfo::new(
                "invalid_ability_name",
                "ability_name is required",
            ));
        }
        require_token(&self.token)
    }
}

/// Payload for methods that identify an ability by token alone
/// (`schedule_save_ability_state`, `schedule_clean_ability`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenParams {
    pub token: Token,
}

impl TokenParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionParams {
    pub token: Token,
    pub target_state: LifecycleState,
    #[serde(default)]
    pub want: Want,
    #[serde(default)]
    pub new_want: bool,
}

impl TransactionParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)?;
        if self.target_state == LifecycleState::Uninitialized {
            return Err(ErrorInfo::new(
                "invalid_target",
                "uninitialized is not a reachable target state",
            ));
        }
        Ok(())
    }
}

/// Payload shared by `schedule_connect_ability` and
/// `schedule_disconnect_ability`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionParams {
    pub token: Token,
    #[serde(default)]
    pub want: Want,
}

impl ConnectionParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandAbilityParams {
    pub token: Token,
    #[serde(default)]
    pub want: Want,
    #[serde(default)]
    pub restart: bool,
    pub start_id: i32,
}

impl CommandAbilityParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)?;
        if self.start_id < 1 {
            return Err(ErrorInfo::new(
                "invalid_start_id",
                "start_id must be 1 or greater",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RestoreStateParams {
    pub token: Token,
    pub state: PacMap,
}

impl RestoreStateParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendResultParams {
    pub token: Token,
    pub request_code: i32,
    pub result_code: i32,
    #[serde(default)]
    pub want: Want,
}

impl SendResultParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_token(&self.token)
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Ability manager service (AMS) payloads
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum AmsMethod {
    AcquireDataAbility,
    ReleaseDataAbility,
}

/// Request envelope for the runtime-to-AMS direction. Same shape as
/// [`Request`], but with the manager's method set.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmsRequest {
    pub protocol_version: u32,
    pub method: AmsMethod,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquireParams {
    pub uri: String,
    #[serde(default)]
    pub try_bind: bool,
    pub token: Token,
}

impl AcquireParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_data_ability_uri(&self.uri)?;
        require_token(&self.token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseParams {
    pub uri: String,
    pub token: Token,
}

impl ReleaseParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        require_data_ability_uri(&self.uri)?;
        require_token(&self.token)
    }
}

/// Successful `acquire_data_ability` answer: where the provider listens and
/// which token names the acquiring ability there.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquireGrant {
    pub socket: PathBuf,
    pub token: Token,
}

// ─────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────

pub(crate) fn decode<T: DeserializeOwned>(params: Value, what: &str) -> Result<T, ErrorInfo> {
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("{} payload is invalid JSON: {}", what, err),
        )
    })
}

/// `schedule_launch_application` params are optional; absent means no
/// record id assignment.
pub fn parse_launch_application(
    params: Option<Value>,
) -> Result<LaunchApplicationParams, ErrorInfo> {
    match params {
        Some(params) => decode(params, "launch_application"),
        None => Ok(LaunchApplicationParams::default()),
    }
}

pub fn parse_memory_level(params: Value) -> Result<MemoryLevelParams, ErrorInfo> {
    decode(params, "memory_level")
}

pub fn parse_configuration(params: Value) -> Result<ConfigurationParams, ErrorInfo> {
    decode(params, "configuration")
}

pub fn parse_launch_ability(params: Value) -> Result<LaunchAbilityParams, ErrorInfo> {
    let parsed: LaunchAbilityParams = decode(params, "launch_ability")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_token(params: Value) -> Result<TokenParams, ErrorInfo> {
    let parsed: TokenParams = decode(params, "token")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_transaction(params: Value) -> Result<TransactionParams, ErrorInfo> {
    let parsed: TransactionParams = decode(params, "ability_transaction")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_connection(params: Value) -> Result<ConnectionParams, ErrorInfo> {
    let parsed: ConnectionParams = decode(params, "connection")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_command(params: Value) -> Result<CommandAbilityParams, ErrorInfo> {
    let parsed: CommandAbilityParams = decode(params, "command_ability")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_restore_state(params: Value) -> Result<RestoreStateParams, ErrorInfo> {
    let parsed: RestoreStateParams = decode(params, "restore_state")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_send_result(params: Value) -> Result<SendResultParams, ErrorInfo> {
    let parsed: SendResultParams = decode(params, "send_result")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_acquire(params: Value) -> Result<AcquireParams, ErrorInfo> {
    let parsed: AcquireParams = decode(params, "acquire_data_ability")?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_release(params: Value) -> Result<ReleaseParams, ErrorInfo> {
    let parsed: ReleaseParams = decode(params, "release_data_ability")?;
    parsed.validate()?;
    Ok(parsed)
}

fn require_token(token: &Token) -> Result<(), ErrorInfo> {
    if token.is_empty() {
        return Err(ErrorInfo::new("invalid_token", "token is required"));
    }
    Ok(())
}

pub(crate) fn require_data_ability_uri(uri: &str) -> Result<Uri, ErrorInfo> {
    let parsed =
        Uri::parse(uri).map_err(|err| ErrorInfo::new("invalid_uri", err.to_string()))?;
    if !parsed.is_data_ability() {
        return Err(ErrorInfo::new(
            "invalid_uri",
            "uri must use the dataability scheme",
        ));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_transaction() -> TransactionParams {
        TransactionParams {
            token: Token::new("token-1"),
            target_state: LifecycleState::Active,
            want: Want::new(),
            new_want: false,
        }
    }

    #[test]
    fn validates_transaction() {
        assert!(base_transaction().validate().is_ok());
    }

    #[test]
    fn rejects_empty_token() {
        let mut params = base_transaction();
        params.token = Token::new("  ");
        let err = params.validate().unwrap_err();
        assert_eq!(err.code, "invalid_token");
    }

    #[test]
    fn rejects_uninitialized_target() {
        let mut params = base_transaction();
        params.target_state = LifecycleState::Uninitialized;
        let err = params.validate().unwrap_err();
        assert_eq!(err.code, "invalid_target");
    }

    #[test]
    fn transaction_defaults_want_and_new_want() {
        let params = parse_transaction(json!({
            "token": "token-1",
            "target_state": "background"
        }))
        .unwrap();
        assert_eq!(params.target_state, LifecycleState::Background);
        assert_eq!(params.want, Want::new());
        assert!(!params.new_want);
    }

    #[test]
    fn launch_ability_requires_a_name() {
        let err = parse_launch_ability(json!({
            "ability_name": "   ",
            "token": "token-1"
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_ability_name");
    }

    #[test]
    fn command_requires_positive_start_id() {
        let err = parse_command(json!({
            "token": "token-1",
            "start_id": 0
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_start_id");
    }

    #[test]
    fn launch_application_params_are_optional() {
        let params = parse_launch_application(None).unwrap();
        assert_eq!(params.record_id, None);

        let params = parse_launch_application(Some(json!({ "record_id": 9 }))).unwrap();
        assert_eq!(params.record_id, Some(9));
    }

    #[test]
    fn acquire_requires_dataability_scheme() {
        let err = parse_acquire(json!({
            "uri": "https://example.com/notes",
            "token": "token-1"
        }))
        .unwrap_err();
        assert_eq!(err.code, "invalid_uri");

        assert!(parse_acquire(json!({
            "uri": "dataability:///com.example.notes",
            "token": "token-1"
        }))
        .is_ok());
    }

    #[test]
    fn rejects_unknown_request_fields() {
        let raw = json!({
            "protocol_version": 1,
            "method": "get_health",
            "surprise": true
        });
        assert!(serde_json::from_value::<Request>(raw).is_err());
    }

    #[test]
    fn rejects_unknown_methods() {
        let raw = json!({
            "protocol_version": 1,
            "method": "schedule_reboot"
        });
        assert!(serde_json::from_value::<Request>(raw).is_err());
    }

    #[test]
    fn response_serialization_skips_absent_fields() {
        let response = Response::ok(Some("req-1".to_string()), json!({ "state": "active" }));
        let raw = serde_json::to_value(&response).unwrap();
        assert_eq!(raw["ok"], json!(true));
        assert!(raw.get("error").is_none());

        let response = Response::error(None, "invalid_token", "token is required");
        let raw = serde_json::to_value(&response).unwrap();
        assert!(raw.get("data").is_none());
        assert_eq!(raw["error"]["code"], json!("invalid_token"));
    }

    #[test]
    fn methods_use_snake_case_on_the_wire() {
        let raw = serde_json::to_string(&Method::ScheduleAbilityTransaction).unwrap();
        assert_eq!(raw, "\"schedule_ability_transaction\"");
        let method: Method = serde_json::from_str("\"send_result\"").unwrap();
        assert_eq!(method, Method::SendResult);
    }
}
