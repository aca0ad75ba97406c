//! Test doubles shared by this crate's tests and by dependent crates
//! through the `test-helpers` feature.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::ability::{Ability, AbilityContext};
use crate::ability_impl::AbilityLifecycleCallbacks;
use crate::application::{Application, Configuration, MemoryLevel};
use crate::data_ability::{
    DataAbilityPredicates, DataAbilityRemote, ResultSet, ValuesBucket,
};
use crate::error::{AbilityError, Result};
use crate::manager::AbilityManager;
use crate::pac_map::{PacMap, PacValue};
use crate::types::{AbilityInfo, AbilityKind, ApplicationInfo, RemoteObject, Token};
use crate::uri::Uri;
use crate::want::Want;

/// Shared append-only log that records which callbacks ran, in order.
#[derive(Clone, Default)]
pub struct CallbackLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: &str) {
        self.entries.lock().unwrap().push(entry.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Ability that records every callback by name and answers the Data surface
/// with fixed values (insert 7, three file types, a one-row result set).
pub struct RecordingAbility {
    log: CallbackLog,
    connect_handle: Option<RemoteObject>,
}

impl RecordingAbility {
    pub fn new(log: CallbackLog) -> Self {
        Self {
            log,
            connect_handle: None,
        }
    }

    pub fn with_connect_handle(mut self, handle: RemoteObject) -> Self {
        self.connect_handle = Some(handle);
        self
    }
}

impl Ability for RecordingAbility {
    fn on_start(&mut self, _context: &mut AbilityContext, _want: &Want) {
        self.log.push("on_start");
    }

    fn on_stop(&mut self, _context: &mut AbilityContext) {
        self.log.push("on_stop");
    }

    fn on_active(&mut self, _context: &mut AbilityContext) {
        self.log.push("on_active");
    }

    fn on_inactive(&mut self, _context: &mut AbilityContext) {
        self.log.push("on_inactive");
    }

    fn on_foreground(&mut self, _context: &mut AbilityContext, _want: &Want) {
        self.log.push("on_foreground");
    }

    fn on_leave_foreground(&mut self, _context: &mut AbilityContext) {
        self.log.push("on_leave_foreground");
    }

    fn on_background(&mut self, _context: &mut AbilityContext) {
        self.log.push("on_background");
    }

    fn on_connect(&mut self, _context: &mut AbilityContext, _want: &Want) -> Option<RemoteObject> {
        self.log.push("on_connect");
        self.connect_handle
    }

    fn on_disconnect(&mut self, _context: &mut AbilityContext, _want: &Want) {
        self.log.push("on_disconnect");
    }

    fn on_command(
        &mut self,
        _context: &mut AbilityContext,
        _want: &Want,
        _restart: bool,
        _start_id: i32,
    ) {
        self.log.push("on_command");
    }

    fn on_new_want(&mut self, _context: &mut AbilityContext, _want: &Want) {
        self.log.push("on_new_want");
    }

    fn on_save_ability_state(&mut self, _context: &mut AbilityContext, state: &mut PacMap) {
        self.log.push("on_save_ability_state");
        state.put_int("saved_marker", 1);
    }

    fn on_restore_ability_state(&mut self, _context: &mut AbilityContext, _state: &PacMap) {
        self.log.push("on_restore_ability_state");
    }

    fn on_ability_result(
        &mut self,
        _context: &mut AbilityContext,
        _request_code: i32,
        _result_code: i32,
        _want: &Want,
    ) {
        self.log.push("on_ability_result");
    }

    fn on_request_permissions_from_user_result(
        &mut self,
        _context: &mut AbilityContext,
        _request_code: i32,
        _permissions: &[String],
        _grant_results: &[i32],
    ) {
        self.log.push("on_request_permissions_from_user_result");
    }

    fn insert(&mut self, _context: &mut AbilityContext, _uri: &Uri, _values: &ValuesBucket) -> i32 {
        self.log.push("insert");
        7
    }

    fn update(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _values: &ValuesBucket,
        _predicates: &DataAbilityPredicates,
    ) -> i32 {
        self.log.push("update");
        1
    }

    fn delete(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _predicates: &DataAbilityPredicates,
    ) -> i32 {
        self.log.push("delete");
        1
    }

    fn query(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _columns: &[String],
        _predicates: &DataAbilityPredicates,
    ) -> Option<ResultSet> {
        self.log.push("query");
        let mut result = ResultSet::new(vec!["id".to_string()]);
        result.rows.push(vec![PacValue::Int(1)]);
        Some(result)
    }

    fn get_type(&mut self, _context: &mut AbilityContext, _uri: &Uri) -> String {
        self.log.push("get_type");
        "vnd.test/type".to_string()
    }

    fn get_file_types(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _mime_type_filter: &str,
    ) -> Vec<String> {
        self.log.push("get_file_types");
        vec![
            "Type1".to_string(),
            "Type2".to_string(),
            "Type3".to_string(),
        ]
    }

    fn open_file(&mut self, _context: &mut AbilityContext, _uri: &Uri, _mode: &str) -> i32 {
        self.log.push("open_file");
        3
    }

    fn open_raw_file(&mut self, _context: &mut AbilityContext, _uri: &Uri, _mode: &str) -> i32 {
        self.log.push("open_raw_file");
        4
    }

    fn batch_insert(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        values: &[ValuesBucket],
    ) -> i32 {
        self.log.push("batch_insert");
        values.len() as i32
    }

    fn reload(&mut self, _context: &mut AbilityContext, _uri: &Uri, _extras: &PacMap) -> bool {
        self.log.push("reload");
        true
    }
}

/// Callback sink that records every notification with a `sink:` prefix.
pub struct RecordingCallbacks {
    log: CallbackLog,
}

impl RecordingCallbacks {
    pub fn new(log: CallbackLog) -> Self {
        Self { log }
    }
}

impl AbilityLifecycleCallbacks for RecordingCallbacks {
    fn on_ability_start(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_start");
    }

    fn on_ability_active(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_active");
    }

    fn on_ability_inactive(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_inactive");
    }

    fn on_ability_foreground(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_foreground");
    }

    fn on_ability_background(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_background");
    }

    fn on_ability_stop(&mut self, _info: &AbilityInfo) {
        self.log.push("sink:on_ability_stop");
    }

    fn on_ability_save_state(&mut self, _state: &PacMap) {
        self.log.push("sink:on_ability_save_state");
    }
}

/// Application that records its own callbacks with an `app:` prefix.
pub struct RecordingApplication {
    log: CallbackLog,
}

impl RecordingApplication {
    pub fn new(log: CallbackLog) -> Self {
        Self { log }
    }
}

impl Application for RecordingApplication {
    fn on_start(&mut self) {
        self.log.push("app:on_start");
    }

    fn on_foreground(&mut self) {
        self.log.push("app:on_foreground");
    }

    fn on_background(&mut self) {
        self.log.push("app:on_background");
    }

    fn on_terminate(&mut self) {
        self.log.push("app:on_terminate");
    }

    fn on_memory_level(&mut self, level: MemoryLevel) {
        let name = match level {
            MemoryLevel::Moderate => "moderate",
            MemoryLevel::Low => "low",
            MemoryLevel::Critical => "critical",
        };
        self.log.push(&format!("app:on_memory_level:{name}"));
    }

    fn on_configuration_updated(&mut self, _config: &Configuration) {
        self.log.push("app:on_configuration_updated");
    }
}

impl AbilityLifecycleCallbacks for RecordingApplication {
    fn on_ability_start(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_start");
    }

    fn on_ability_active(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_active");
    }

    fn on_ability_inactive(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_inactive");
    }

    fn on_ability_foreground(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_foreground");
    }

    fn on_ability_background(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_background");
    }

    fn on_ability_stop(&mut self, _info: &AbilityInfo) {
        self.log.push("app:on_ability_stop");
    }

    fn on_ability_save_state(&mut self, _state: &PacMap) {
        self.log.push("app:on_ability_save_state");
    }
}

/// Manager double with a fixed uri-to-proxy table and acquire/release
/// counters.
pub struct FakeAbilityManager {
    remotes: Mutex<HashMap<String, Arc<dyn DataAbilityRemote>>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl Default for FakeAbilityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAbilityManager {
    pub fn new() -> Self {
        Self {
            remotes: Mutex::new(HashMap::new()),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn insert_remote(&self, uri: &Uri, remote: Arc<dyn DataAbilityRemote>) {
        self.remotes.lock().unwrap().insert(uri.to_string(), remote);
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl AbilityManager for FakeAbilityManager {
    fn acquire_data_ability(
        &self,
        uri: &Uri,
        _try_bind: bool,
        _token: &Token,
    ) -> Option<Arc<dyn DataAbilityRemote>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.remotes.lock().unwrap().get(&uri.to_string()).cloned()
    }

    fn release_data_ability(
        &self,
        _proxy: &Arc<dyn DataAbilityRemote>,
        _token: &Token,
    ) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Remote double with canned answers and a call log. `failing()` makes
/// every method return a remote error instead.
pub struct FakeDataAbilityRemote {
    file_types: Vec<String>,
    insert_result: i32,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeDataAbilityRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDataAbilityRemote {
    pub fn new() -> Self {
        Self {
            file_types: Vec::new(),
            insert_result: 7,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_file_types(mut self, file_types: Vec<String>) -> Self {
        self.file_types = file_types;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if self.fail {
            Err(AbilityError::remote(call, "fake remote failure"))
        } else {
            Ok(())
        }
    }
}

impl DataAbilityRemote for FakeDataAbilityRemote {
    fn insert(&self, _uri: &Uri, _values: &ValuesBucket) -> Result<i32> {
        self.record("insert")?;
        Ok(self.insert_result)
    }

    fn update(
        &self,
        _uri: &Uri,
        _values: &ValuesBucket,
        _predicates: &DataAbilityPredicates,
    ) -> Result<i32> {
        self.record("update")?;
        Ok(1)
    }

    fn delete(&self, _uri: &Uri, _predicates: &DataAbilityPredicates) -> Result<i32> {
        self.record("delete")?;
        Ok(1)
    }

    fn query(
        &self,
        _uri: &Uri,
        _columns: &[String],
        _predicates: &DataAbilityPredicates,
    ) -> Result<Option<ResultSet>> {
        self.record("query")?;
        let mut result = ResultSet::new(vec!["id".to_string()]);
        result.rows.push(vec![PacValue::Int(1)]);
        Ok(Some(result))
    }

    fn get_type(&self, _uri: &Uri) -> Result<String> {
        self.record("get_type")?;
        Ok("vnd.fake/type".to_string())
    }

    fn get_file_types(&self, _uri: &Uri, _mime_type_filter: &str) -> Result<Vec<String>> {
        self.record("get_file_types")?;
        Ok(self.file_types.clone())
    }

    fn open_file(&self, _uri: &Uri, _mode: &str) -> Result<i32> {
        self.record("open_file")?;
        Ok(3)
    }

    fn open_raw_file(&self, _uri: &Uri, _mode: &str) -> Result<i32> {
        self.record("open_raw_file")?;
        Ok(4)
    }

    fn batch_insert(&self, _uri: &Uri, values: &[ValuesBucket]) -> Result<i32> {
        self.record("batch_insert")?;
        Ok(values.len() as i32)
    }

    fn reload(&self, _uri: &Uri, _extras: &PacMap) -> Result<bool> {
        self.record("reload")?;
        Ok(true)
    }
}

/// Context wired to a fresh `FakeAbilityManager`, for exercising ability
/// callbacks directly.
pub fn test_context(kind: AbilityKind) -> AbilityContext {
    let info = AbilityInfo {
        name: "TestAbility".to_string(),
        bundle_name: "com.example.test".to_string(),
        kind,
        uri: None,
    };
    let application = ApplicationInfo {
        bundle_name: "com.example.test".to_string(),
        data_dir: PathBuf::from("/tmp/ability-test"),
    };
    AbilityContext::new(
        info,
        application,
        Token::new("token-1"),
        Arc::new(FakeAbilityManager::new()),
    )
}
