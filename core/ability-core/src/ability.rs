//! The user-facing ability override surface and its per-instance context.

use crate::data_ability::{DataAbilityPredicates, ResultSet, ValuesBucket};
use crate::lifecycle::Lifecycle;
use crate::manager::AbilityManager;
use crate::pac_map::PacMap;
use crate::types::{AbilityInfo, ApplicationInfo, RemoteObject, Token};
use crate::uri::Uri;
use crate::want::Want;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Per-instance state the framework owns on behalf of one ability: identity,
/// the last received want, the observable lifecycle, and the channel back to
/// the ability manager service.
pub struct AbilityContext {
    info: AbilityInfo,
    application: ApplicationInfo,
    token: Token,
    want: Option<Want>,
    lifecycle: Lifecycle,
    result: Option<(i32, Want)>,
    manager: Arc<dyn AbilityManager>,
}

impl AbilityContext {
    pub fn new(
        info: AbilityInfo,
        application: ApplicationInfo,
        token: Token,
        manager: Arc<dyn AbilityManager>,
    ) -> Self {
        Self {
            info,
            application,
            token,
            want: None,
            lifecycle: Lifecycle::new(),
            result: None,
            manager,
        }
    }

    pub fn ability_info(&self) -> &AbilityInfo {
        &self.info
    }

    pub fn application_info(&self) -> &ApplicationInfo {
        &self.application
    }

    pub fn bundle_name(&self) -> &str {
        &self.application.bundle_name
    }

    pub fn data_dir(&self) -> &Path {
        &self.application.data_dir
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The want that started or most recently resumed this ability.
    pub fn want(&self) -> Option<&Want> {
        self.want.as_ref()
    }

    pub fn set_want(&mut self, want: Want) {
        self.want = Some(want);
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// Stores the result this ability wants delivered to its caller.
    pub fn set_result(&mut self, result_code: i32, want: Want) {
        self.result = Some((result_code, want));
    }

    pub fn take_result(&mut self) -> Option<(i32, Want)> {
        self.result.take()
    }

    pub fn ability_manager(&self) -> Arc<dyn AbilityManager> {
        Arc::clone(&self.manager)
    }
}

/// The override surface. Every callback has a default body so abilities
/// implement only what they handle; the Data surface defaults to the
/// documented failure sentinels.
pub trait Ability: Send {
    fn on_start(&mut self, _context: &mut AbilityContext, _want: &Want) {}

    fn on_stop(&mut self, _context: &mut AbilityContext) {}

    fn on_active(&mut self, _context: &mut AbilityContext) {}

    fn on_inactive(&mut self, _context: &mut AbilityContext) {}

    fn on_foreground(&mut self, _context: &mut AbilityContext, _want: &Want) {}

    fn on_leave_foreground(&mut self, _context: &mut AbilityContext) {}

    fn on_background(&mut self, _context: &mut AbilityContext) {}

    /// Service connection request. Returning `None` tells the caller the
    /// service refused the connection.
    fn on_connect(&mut self, _context: &mut AbilityContext, _want: &Want) -> Option<RemoteObject> {
        None
    }

    fn on_disconnect(&mut self, _context: &mut AbilityContext, _want: &Want) {}

    fn on_command(
        &mut self,
        _context: &mut AbilityContext,
        _want: &Want,
        _restart: bool,
        _start_id: i32,
    ) {
    }

    /// A new want arrived while this ability was already started.
    fn on_new_want(&mut self, _context: &mut AbilityContext, _want: &Want) {}

    fn on_save_ability_state(&mut self, _context: &mut AbilityContext, _state: &mut PacMap) {}

    fn on_restore_ability_state(&mut self, _context: &mut AbilityContext, _state: &PacMap) {}

    fn on_ability_result(
        &mut self,
        _context: &mut AbilityContext,
        _request_code: i32,
        _result_code: i32,
        _want: &Want,
    ) {
    }

    fn on_request_permissions_from_user_result(
        &mut self,
        _context: &mut AbilityContext,
        _request_code: i32,
        _permissions: &[String],
        _grant_results: &[i32],
    ) {
    }

    // ─────────────────────────────────────────────────────────────────────
    // Data ability surface
    // ─────────────────────────────────────────────────────────────────────

    fn insert(&mut self, _context: &mut AbilityContext, _uri: &Uri, _values: &ValuesBucket) -> i32 {
        -1
    }

    fn update(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _values: &ValuesBucket,
        _predicates: &DataAbilityPredicates,
    ) -> i32 {
        -1
    }

    fn delete(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _predicates: &DataAbilityPredicates,
    ) -> i32 {
        -1
    }

    fn query(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _columns: &[String],
        _predicates: &DataAbilityPredicates,
    ) -> Option<ResultSet> {
        None
    }

    fn get_type(&mut self, _context: &mut AbilityContext, _uri: &Uri) -> String {
        String::new()
    }

    fn get_file_types(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _mime_type_filter: &str,
    ) -> Vec<String> {
        Vec::new()
    }

    fn open_file(&mut self, _context: &mut AbilityContext, _uri: &Uri, _mode: &str) -> i32 {
        -1
    }

    fn open_raw_file(&mut self, _context: &mut AbilityContext, _uri: &Uri, _mode: &str) -> i32 {
        -1
    }

    fn batch_insert(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _values: &[ValuesBucket],
    ) -> i32 {
        -1
    }

    fn reload(&mut self, _context: &mut AbilityContext, _uri: &Uri, _extras: &PacMap) -> bool {
        false
    }
}

impl fmt::Debug for dyn Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ability").finish_non_exhaustive()
    }
}
