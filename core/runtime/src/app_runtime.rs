//! Process-wide runtime state: the application object, the attached
//! abilities, and the route data ability calls take to a provider.
//!
//! The application lives behind one mutex that doubles as the lifecycle
//! callback sink for every hosted ability. Ability records map scheduler
//! tokens to their worker threads.

use crate::ability_thread::AbilityThread;
use crate::manifest::BundleManifest;
use ability_core::{
    AbilityError, AbilityInfo, AbilityLifecycleCallbacks, AbilityManager, AbilityRegistry,
    Application, ApplicationImpl, ApplicationInfo, ApplicationState, Configuration,
    DataAbilityPredicates, DataAbilityRemote, LifecycleState, MemoryLevel, PacMap, Result,
    ResultSet, Token, Uri, ValuesBucket, Want,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{info, warn};

pub struct AppRuntime {
    application: Arc<Mutex<ApplicationImpl>>,
    callbacks: Arc<Mutex<dyn AbilityLifecycleCallbacks>>,
    registry: AbilityRegistry,
    manifest: BundleManifest,
    application_info: ApplicationInfo,
    records: Mutex<HashMap<Token, Arc<AbilityThread>>>,
    manager: Arc<dyn AbilityManager>,
    started_at: DateTime<Utc>,
}

impl AppRuntime {
    pub fn new(
        application: Box<dyn Application>,
        registry: AbilityRegistry,
        manifest: BundleManifest,
        manager: Arc<dyn AbilityManager>,
    ) -> Arc<Self> {
        let application_info = manifest.application_info();
        let application = Arc::new(Mutex::new(ApplicationImpl::new(application)));
        let callbacks: Arc<Mutex<dyn AbilityLifecycleCallbacks>> = application.clone();
        Arc::new(Self {
            application,
            callbacks,
            registry,
            manifest,
            application_info,
            records: Mutex::new(HashMap::new()),
            manager,
            started_at: Utc::now(),
        })
    }

    /// Runtime whose data ability routes resolve against its own hosted
    /// abilities instead of an external manager.
    pub fn local(
        application: Box<dyn Application>,
        registry: AbilityRegistry,
        manifest: BundleManifest,
    ) -> Arc<Self> {
        let local = Arc::new(LocalAbilityManager::unbound());
        let manager: Arc<dyn AbilityManager> = local.clone();
        let runtime = Self::new(application, registry, manifest, manager);
        local.bind(&runtime);
        runtime
    }

    fn application_lock(&self) -> MutexGuard<'_, ApplicationImpl> {
        // Recover from poisoning - a panicked callback must not wedge the app
        self.application
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn records_lock(&self) -> MutexGuard<'_, HashMap<Token, Arc<AbilityThread>>> {
        // Recover from poisoning - the record map holds no invariants beyond
        // its entries
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn bundle_name(&self) -> &str {
        &self.application_info.bundle_name
    }

    pub fn ability_manager(&self) -> Arc<dyn AbilityManager> {
        Arc::clone(&self.manager)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // ─────────────────────────────────────────────────────────────────────
    // Application lifecycle
    // ─────────────────────────────────────────────────────────────────────

    pub fn launch_application(&self, record_id: Option<i64>) -> bool {
        let mut application = self.application_lock();
        if let Some(record_id) = record_id {
            application.set_record_id(record_id);
        }
        application.perform_app_ready()
    }

    pub fn foreground_application(&self) -> bool {
        self.application_lock().perform_foreground()
    }

    pub fn background_application(&self) -> bool {
        self.application_lock().perform_background()
    }

    pub fn terminate_application(&self) -> bool {
        self.application_lock().perform_terminate()
    }

    pub fn memory_level(&self, level: MemoryLevel) {
        self.application_lock().perform_memory_level(level)
    }

    pub fn configuration_updated(&self, config: &Configuration) {
        self.application_lock().perform_configuration_updated(config)
    }

    pub fn app_state(&self) -> ApplicationState {
        self.application_lock().state()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ability hosting
    // ─────────────────────────────────────────────────────────────────────

    /// Attaches the named ability under `token` and leaves it in `Initial`.
    pub fn launch_ability(&self, ability_name: &str, token: Token) -> Result<AbilityInfo> {
        let info = self
            .manifest
            .ability(ability_name)
            .ok_or_else(|| AbilityError::UnknownAbility(ability_name.to_string()))?;
        let mut records = self.records_lock();
        if records.contains_key(&token) {
            return Err(AbilityError::AlreadyAttached(token));
        }
        let thread = AbilityThread::attach(
            &self.registry,
            info.clone(),
            &self.application_info,
            token.clone(),
            Arc::downgrade(&self.callbacks),
            Arc::clone(&self.manager),
        )?;
        records.insert(token, thread);
        Ok(info)
    }

    pub fn thread(&self, token: &Token) -> Result<Arc<AbilityThread>> {
        self.records_lock()
            .get(token)
            .cloned()
            .ok_or_else(|| AbilityError::UnknownToken(token.clone()))
    }

    /// Drives the ability back to `Initial` and drops its record.
    pub fn clean_ability(&self, token: &Token) -> Result<LifecycleState> {
        let thread = self.thread(token)?;
        let state =
            thread.schedule_ability_transaction(Want::default(), LifecycleState::Initial, false)?;
        self.records_lock().remove(token);
        info!(ability = %thread.info().name, token = %token, "ability detached");
        Ok(state)
    }

    pub fn ability_count(&self) -> usize {
        self.records_lock().len()
    }

    /// Finds the attached Data ability whose declared uri covers `uri`.
    pub fn resolve_local_data_ability(&self, uri: &Uri) -> Option<Arc<AbilityThread>> {
        self.records_lock()
            .values()
            .find(|thread| {
                let info = thread.info();
                info.kind.is_data()
                    && info
                        .uri
                        .as_deref()
                        .and_then(|declared| Uri::parse(declared).ok())
                        .map(|declared| declared.covers(uri))
                        .unwrap_or(false)
            })
            .cloned()
    }
}

/// In-process ability manager. `acquire` resolves against the bound
/// runtime's own attached abilities; there is nothing to tear down on
/// release.
pub struct LocalAbilityManager {
    runtime: Mutex<Weak<AppRuntime>>,
}

impl LocalAbilityManager {
    /// The runtime owns its manager, so the back-reference is filled in
    /// after construction.
    pub fn unbound() -> Self {
        Self {
            runtime: Mutex::new(Weak::new()),
        }
    }

    pub fn bind(&self, runtime: &Arc<AppRuntime>) {
        // Recover from poisoning - rebinding overwrites the slot wholesale
        let mut slot = self
            .runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Arc::downgrade(runtime);
    }

    fn runtime(&self) -> Option<Arc<AppRuntime>> {
        // Recover from poisoning - reads only upgrade the weak pointer
        self.runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .upgrade()
    }
}

impl AbilityManager for LocalAbilityManager {
    fn acquire_data_ability(
        &self,
        uri: &Uri,
        _try_bind: bool,
        _token: &Token,
    ) -> Option<Arc<dyn DataAbilityRemote>> {
        let runtime = match self.runtime() {
            Some(runtime) => runtime,
            None => {
                warn!(uri = %uri, "local ability manager is not bound to a runtime");
                return None;
            }
        };
        let thread = runtime.resolve_local_data_ability(uri)?;
        Some(Arc::new(LocalDataAbilityProxy { thread }))
    }

    fn release_data_ability(
        &self,
        _proxy: &Arc<dyn DataAbilityRemote>,
        _token: &Token,
    ) -> Result<()> {
        Ok(())
    }
}

/// Proxy that routes data calls onto the provider ability's own worker.
struct LocalDataAbilityProxy {
    thread: Arc<AbilityThread>,
}

impl DataAbilityRemote for LocalDataAbilityProxy {
    fn insert(&self, uri: &Uri, values: &ValuesBucket) -> Result<i32> {
        self.thread.insert(uri.clone(), values.clone())
    }

    fn update(
        &self,
        uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> Result<i32> {
        self.thread
            .update(uri.clone(), values.clone(), predicates.clone())
    }

    fn delete(&self, uri: &Uri, predicates: &DataAbilityPredicates) -> Result<i32> {
        self.thread.delete(uri.clone(), predicates.clone())
    }

    fn query(
        &self,
        uri: &Uri,
        columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> Result<Option<ResultSet>> {
        self.thread
            .query(uri.clone(), columns.to_vec(), predicates.clone())
    }

    fn get_type(&self, uri: &Uri) -> Result<String> {
        self.thread.get_type(uri.clone())
    }

    fn get_file_types(&self, uri: &Uri, mime_type_filter: &str) -> Result<Vec<String>> {
        self.thread
            .get_file_types(uri.clone(), mime_type_filter.to_string())
    }

    fn open_file(&self, uri: &Uri, mode: &str) -> Result<i32> {
        self.thread.open_file(uri.clone(), mode.to_string())
    }

    fn open_raw_file(&self, uri: &Uri, mode: &str) -> Result<i32> {
        self.thread.open_raw_file(uri.clone(), mode.to_string())
    }

    fn batch_insert(&self, uri: &Uri, values: &[ValuesBucket]) -> Result<i32> {
        self.thread.batch_insert(uri.clone(), values.to_vec())
    }

    fn reload(&self, uri: &Uri, extras: &PacMap) -> Result<bool> {
        self.thread.reload(uri.clone(), extras.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{
        demo_application, demo_manifest, demo_registry, NOTE_ABILITY, NOTE_URI, PAGE_ABILITY,
    };
    use ability_core::PacValue;
    use data_ability_helper::{DataAbilityHelper, HelperContext};

    fn demo_runtime() -> Arc<AppRuntime> {
        AppRuntime::local(demo_application(), demo_registry(), demo_manifest())
    }

    #[test]
    fn application_walks_its_lifecycle() {
        let runtime = demo_runtime();
        assert_eq!(runtime.app_state(), ApplicationState::Create);
        assert!(runtime.launch_application(Some(7)));
        assert!(!runtime.launch_application(None), "ready twice is rejected");
        assert!(runtime.foreground_application());
        assert!(runtime.background_application());
        assert!(runtime.terminate_application());
        assert_eq!(runtime.app_state(), ApplicationState::Terminated);
    }

    #[test]
    fn launch_ability_registers_a_record() {
        let runtime = demo_runtime();
        let info = runtime
            .launch_ability(PAGE_ABILITY, Token::new("page-1"))
            .unwrap();
        assert_eq!(info.name, PAGE_ABILITY);
        assert_eq!(runtime.ability_count(), 1);

        let thread = runtime.thread(&Token::new("page-1")).unwrap();
        assert_eq!(thread.current_state().unwrap(), LifecycleState::Initial);
    }

    #[test]
    fn duplicate_tokens_are_rejected() {
        let runtime = demo_runtime();
        runtime
            .launch_ability(PAGE_ABILITY, Token::new("page-1"))
            .unwrap();
        let err = runtime
            .launch_ability(PAGE_ABILITY, Token::new("page-1"))
            .unwrap_err();
        assert!(matches!(err, AbilityError::AlreadyAttached(_)));
    }

    #[test]
    fn unknown_abilities_and_tokens_are_rejected() {
        let runtime = demo_runtime();
        assert!(matches!(
            runtime.launch_ability("NoSuchAbility", Token::new("x-1")),
            Err(AbilityError::UnknownAbility(_))
        ));
        assert!(matches!(
            runtime.thread(&Token::new("missing")),
            Err(AbilityError::UnknownToken(_))
        ));
    }

    #[test]
    fn clean_ability_stops_and_forgets() {
        let runtime = demo_runtime();
        let token = Token::new("page-1");
        runtime.launch_ability(PAGE_ABILITY, token.clone()).unwrap();
        let thread = runtime.thread(&token).unwrap();
        thread
            .schedule_ability_transaction(Want::default(), LifecycleState::Active, false)
            .unwrap();

        let state = runtime.clean_ability(&token).unwrap();
        assert_eq!(state, LifecycleState::Initial);
        assert_eq!(runtime.ability_count(), 0);
        assert!(runtime.thread(&token).is_err());
    }

    #[test]
    fn local_manager_resolves_hosted_providers() {
        let runtime = demo_runtime();
        let token = Token::new("note-1");
        runtime.launch_ability(NOTE_ABILITY, token.clone()).unwrap();
        runtime
            .thread(&token)
            .unwrap()
            .schedule_ability_transaction(Want::default(), LifecycleState::Active, false)
            .unwrap();

        let uri = Uri::parse(NOTE_URI).unwrap();
        let helper = DataAbilityHelper::creator_with_uri(
            Some(HelperContext {
                token: Token::new("consumer-1"),
                manager: runtime.ability_manager(),
            }),
            Some(uri.clone()),
            false,
        )
        .unwrap();

        let mut values = ValuesBucket::new();
        values.set("text", PacValue::Str("milk".to_string()));
        assert_eq!(helper.insert(&uri, &values), 1);

        let rows = helper
            .query(&uri, &[], &DataAbilityPredicates::default())
            .unwrap();
        assert_eq!(rows.row_count(), 1);
        assert_eq!(
            rows.value_at(0, "text"),
            Some(&PacValue::Str("milk".to_string()))
        );
    }

    #[test]
    fn local_manager_misses_unhosted_uris() {
        let runtime = demo_runtime();
        let uri = Uri::parse("dataability:///com.example.elsewhere").unwrap();
        assert!(runtime
            .ability_manager()
            .acquire_data_ability(&uri, false, &Token::new("consumer-1"))
            .is_none());
    }
}
