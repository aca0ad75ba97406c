//! Dispatch facade for one hosted ability.
//!
//! `attach` builds the user ability, binds it to an [`AbilityImpl`], and
//! parks the pair on a dedicated worker. Every `schedule_*` method marshals
//! one operation onto that worker and blocks for the outcome, so requests
//! against the same ability serialize in arrival order while distinct
//! abilities stay independent.

use crate::handler::Handler;
use crate::record::AbilityLocalRecord;
use ability_core::{
    AbilityContext, AbilityError, AbilityImpl, AbilityInfo, AbilityKind,
    AbilityLifecycleCallbacks, AbilityManager, AbilityRegistry, ApplicationInfo,
    DataAbilityPredicates, LifecycleState, PacMap, RemoteObject, Result, ResultSet, Token, Uri,
    ValuesBucket, Want,
};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

pub struct AbilityThread {
    record: AbilityLocalRecord,
}

impl fmt::Debug for AbilityThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbilityThread")
            .field("info", self.record.info())
            .field("token", self.record.token())
            .finish_non_exhaustive()
    }
}

impl AbilityThread {
    /// Builds the named ability and parks it on a fresh worker, leaving it
    /// in `Initial`.
    pub fn attach(
        registry: &AbilityRegistry,
        info: AbilityInfo,
        application: &ApplicationInfo,
        token: Token,
        callbacks: Weak<Mutex<dyn AbilityLifecycleCallbacks>>,
        manager: Arc<dyn AbilityManager>,
    ) -> Result<Arc<AbilityThread>> {
        if info.name.trim().is_empty() {
            return Err(AbilityError::EmptyAbilityName);
        }
        if info.kind == AbilityKind::Unknown {
            return Err(AbilityError::UnsupportedKind {
                name: info.name.clone(),
            });
        }
        let ability = registry.create(&info.name)?;
        let context = AbilityContext::new(info.clone(), application.clone(), token.clone(), manager);
        let mut ability_impl = AbilityImpl::new();
        ability_impl.init(ability, context, callbacks)?;
        let handler = Handler::spawn(format!("ability:{}", info.name), ability_impl)?;
        debug!(ability = %info.name, kind = ?info.kind, token = %token, "ability attached");
        Ok(Arc::new(AbilityThread {
            record: AbilityLocalRecord::new(info, token, handler),
        }))
    }

    pub fn info(&self) -> &AbilityInfo {
        self.record.info()
    }

    pub fn token(&self) -> &Token {
        self.record.token()
    }

    pub fn current_state(&self) -> Result<LifecycleState> {
        self.record.handler().call(|ability| ability.current_state())
    }

    /// Drives the ability toward `target` on its worker.
    pub fn schedule_ability_transaction(
        &self,
        want: Want,
        target: LifecycleState,
        new_want: bool,
    ) -> Result<LifecycleState> {
        self.record
            .handler()
            .call(move |ability| ability.handle_ability_transaction(want, target, new_want))?
    }

    pub fn schedule_connect_ability(&self, want: Want) -> Result<Option<RemoteObject>> {
        self.record
            .handler()
            .call(move |ability| ability.connect_ability(want))?
    }

    pub fn schedule_disconnect_ability(&self, want: Want) -> Result<()> {
        self.record
            .handler()
            .call(move |ability| ability.disconnect_ability(want))?
    }

    pub fn schedule_command_ability(&self, want: Want, restart: bool, start_id: i32) -> Result<()> {
        self.record
            .handler()
            .call(move |ability| ability.command_ability(want, restart, start_id))?
    }

    /// Collects the ability's saved state into a fresh map.
    pub fn schedule_save_ability_state(&self) -> Result<PacMap> {
        self.record.handler().call(|ability| {
            let mut state = PacMap::new();
            ability.dispatch_save_ability_state(&mut state)?;
            Ok(state)
        })?
    }

    pub fn schedule_restore_ability_state(&self, state: PacMap) -> Result<()> {
        self.record
            .handler()
            .call(move |ability| ability.dispatch_restore_ability_state(&state))?
    }

    pub fn send_result(&self, request_code: i32, result_code: i32, want: Want) -> Result<()> {
        self.record
            .handler()
            .call(move |ability| ability.send_result(request_code, result_code, want))?
    }

    // ─────────────────────────────────────────────────────────────────────
    // Data ability surface
    // ─────────────────────────────────────────────────────────────────────

    pub fn insert(&self, uri: Uri, values: ValuesBucket) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.insert(&uri, &values))?
    }

    pub fn update(
        &self,
        uri: Uri,
        values: ValuesBucket,
        predicates: DataAbilityPredicates,
    ) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.update(&uri, &values, &predicates))?
    }

    pub fn delete(&self, uri: Uri, predicates: DataAbilityPredicates) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.delete(&uri, &predicates))?
    }

    pub fn query(
        &self,
        uri: Uri,
        columns: Vec<String>,
        predicates: DataAbilityPredicates,
    ) -> Result<Option<ResultSet>> {
        self.record
            .handler()
            .call(move |ability| ability.query(&uri, &columns, &predicates))?
    }

    pub fn get_type(&self, uri: Uri) -> Result<String> {
        self.record
            .handler()
            .call(move |ability| ability.get_type(&uri))?
    }

    pub fn get_file_types(&self, uri: Uri, mime_type_filter: String) -> Result<Vec<String>> {
        self.record
            .handler()
            .call(move |ability| ability.get_file_types(&uri, &mime_type_filter))?
    }

    pub fn open_file(&self, uri: Uri, mode: String) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.open_file(&uri, &mode))?
    }

    pub fn open_raw_file(&self, uri: Uri, mode: String) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.open_raw_file(&uri, &mode))?
    }

    pub fn batch_insert(&self, uri: Uri, values: Vec<ValuesBucket>) -> Result<i32> {
        self.record
            .handler()
            .call(move |ability| ability.batch_insert(&uri, &values))?
    }

    pub fn reload(&self, uri: Uri, extras: PacMap) -> Result<bool> {
        self.record
            .handler()
            .call(move |ability| ability.reload(&uri, &extras))?
    }
}
