//! Data ability value types and the remote proxy trait.

use crate::error::Result;
use crate::pac_map::{PacMap, PacValue};
use crate::uri::Uri;
use serde::{Deserialize, Serialize};

/// One row of column values for insert/update calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuesBucket(pub PacMap);

impl ValuesBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl Into<String>, value: PacValue) {
        self.0.insert(column, value);
    }

    pub fn get(&self, column: &str) -> Option<&PacValue> {
        self.0.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Row-selection arguments for query/update/delete calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataAbilityPredicates {
    #[serde(default)]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub where_args: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl DataAbilityPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.where_clause.is_none()
            && self.where_args.is_empty()
            && self.order_by.is_none()
            && self.limit.is_none()
    }
}

/// Tabular query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<PacValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value_at(&self, row: usize, column: &str) -> Option<&PacValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }
}

/// Client-side handle on a (possibly remote) Data ability.
///
/// Implementations carry the transport; callers treat every method as a
/// blocking round-trip that either returns the provider's answer or a
/// transport/remote error.
pub trait DataAbilityRemote: Send + Sync {
    fn insert(&self, uri: &Uri, values: &ValuesBucket) -> Result<i32>;
    fn update(
        &self,
        uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> Result<i32>;
    fn delete(&self, uri: &Uri, predicates: &DataAbilityPredicates) -> Result<i32>;
    fn query(
        &self,
        uri: &Uri,
        columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> Result<Option<ResultSet>>;
    fn get_type(&self, uri: &Uri) -> Result<String>;
    fn get_file_types(&self, uri: &Uri, mime_type_filter: &str) -> Result<Vec<String>>;
    fn open_file(&self, uri: &Uri, mode: &str) -> Result<i32>;
    fn open_raw_file(&self, uri: &Uri, mode: &str) -> Result<i32>;
    fn batch_insert(&self, uri: &Uri, values: &[ValuesBucket]) -> Result<i32>;
    fn reload(&self, uri: &Uri, extras: &PacMap) -> Result<bool>;
}
