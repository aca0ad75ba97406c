//! Data ability wire payloads: one request envelope per CRUD round-trip and
//! the typed replies the provider side answers with.

use ability_core::{DataAbilityPredicates, PacMap, ResultSet, Token, ValuesBucket};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ErrorInfo;

/// Characters a file-open mode string may contain (read, write, append,
/// truncate).
const OPEN_MODE_CHARS: &str = "rwat";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataAbilityParams {
    /// Token of the ability the call runs against on the provider side.
    pub token: Token,
    pub uri: String,
    pub op: DataOp,
}

impl DataAbilityParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        crate::require_data_ability_uri(&self.uri)?;
        if self.token.is_empty() {
            return Err(ErrorInfo::new("invalid_token", "token is required"));
        }
        self.op.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataOp {
    Insert {
        values: ValuesBucket,
    },
    Update {
        values: ValuesBucket,
        #[serde(default)]
        predicates: DataAbilityPredicates,
    },
    Delete {
        #[serde(default)]
        predicates: DataAbilityPredicates,
    },
    Query {
        #[serde(default)]
        columns: Vec<String>,
        #[serde(default)]
        predicates: DataAbilityPredicates,
    },
    GetType,
    GetFileTypes {
        #[serde(default)]
        mime_type_filter: String,
    },
    OpenFile {
        mode: String,
    },
    OpenRawFile {
        mode: String,
    },
    BatchInsert {
        values: Vec<ValuesBucket>,
    },
    Reload {
        #[serde(default)]
        extras: PacMap,
    },
}

impl DataOp {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        match self {
            DataOp::OpenFile { mode } | DataOp::OpenRawFile { mode } => validate_mode(mode),
            _ => Ok(()),
        }
    }

    /// Operation name for logs and error contexts.
    pub fn name(&self) -> &'static str {
        match self {
            DataOp::Insert { .. } => "insert",
            DataOp::Update { .. } => "update",
            DataOp::Delete { .. } => "delete",
            DataOp::Query { .. } => "query",
            DataOp::GetType => "get_type",
            DataOp::GetFileTypes { .. } => "get_file_types",
            DataOp::OpenFile { .. } => "open_file",
            DataOp::OpenRawFile { .. } => "open_raw_file",
            DataOp::BatchInsert { .. } => "batch_insert",
            DataOp::Reload { .. } => "reload",
        }
    }
}

/// Typed provider answer, one variant per result shape. The caller matches
/// the variant against the operation it sent.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataReply {
    Count { value: i32 },
    Rows { result: Option<ResultSet> },
    MimeType { value: String },
    MimeTypes { values: Vec<String> },
    Fd { value: i32 },
    Reloaded { value: bool },
}

pub fn parse_data(params: Value) -> Result<DataAbilityParams, ErrorInfo> {
    let parsed: DataAbilityParams = crate::decode(params, "data_ability")?;
    parsed.validate()?;
    Ok(parsed)
}

fn validate_mode(mode: &str) -> Result<(), ErrorInfo> {
    if mode.is_empty() {
        return Err(ErrorInfo::new("invalid_mode", "open mode is required"));
    }
    if let Some(bad) = mode.chars().find(|c| !OPEN_MODE_CHARS.contains(*c)) {
        return Err(ErrorInfo::new(
            "invalid_mode",
            format!("open mode may not contain '{}'", bad),
        ));
    }
    Ok(())
}
