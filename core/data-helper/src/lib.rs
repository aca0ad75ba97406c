//! Consumer-side helper for Data abilities.
//!
//! `DataAbilityHelper` wraps the acquire/use/release contract against the
//! ability manager. A helper is either bound to one provider uri for its
//! lifetime or unbound, resolving the provider per call. Transport and
//! provider failures never panic and never surface as errors here; they are
//! logged and the call answers with the documented failure sentinel.

pub mod proxy;

pub use proxy::SocketDataAbilityProxy;

use ability_core::{
    AbilityContext, AbilityManager, DataAbilityPredicates, DataAbilityRemote, PacMap, ResultSet,
    Token, Uri, ValuesBucket,
};
use std::sync::Arc;

/// What a helper needs from its creator: the caller's identity and a route
/// to the ability manager.
#[derive(Clone)]
pub struct HelperContext {
    pub token: Token,
    pub manager: Arc<dyn AbilityManager>,
}

impl From<&AbilityContext> for HelperContext {
    fn from(context: &AbilityContext) -> Self {
        Self {
            token: context.token().clone(),
            manager: context.ability_manager(),
        }
    }
}

/// Releases a one-shot proxy when the call is done, even on early returns.
struct ProxyGuard<'a> {
    manager: &'a dyn AbilityManager,
    proxy: Arc<dyn DataAbilityRemote>,
    token: &'a Token,
}

impl Drop for ProxyGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.release_data_ability(&self.proxy, self.token) {
            tracing::warn!(error = %err, "failed to release data ability proxy");
        }
    }
}

pub struct DataAbilityHelper {
    manager: Arc<dyn AbilityManager>,
    token: Token,
    uri: Option<Uri>,
    try_bind: bool,
    proxy: Option<Arc<dyn DataAbilityRemote>>,
}

impl DataAbilityHelper {
    /// Unbound helper. Each call resolves its uri, uses the provider once,
    /// and releases it again.
    pub fn creator(context: Option<HelperContext>) -> Option<Self> {
        let context = match context {
            Some(context) => context,
            None => {
                tracing::error!("helper creation failed: context is required");
                return None;
            }
        };
        Some(Self {
            manager: context.manager,
            token: context.token,
            uri: None,
            try_bind: false,
            proxy: None,
        })
    }

    /// Helper bound to one provider uri. Acquires the provider eagerly and
    /// holds it until [`release`](Self::release).
    pub fn creator_with_uri(
        context: Option<HelperContext>,
        uri: Option<Uri>,
        try_bind: bool,
    ) -> Option<Self> {
        let context = match context {
            Some(context) => context,
            None => {
                tracing::error!("helper creation failed: context is required");
                return None;
            }
        };
        let uri = match uri {
            Some(uri) => uri,
            None => {
                tracing::error!("helper creation failed: uri is required");
                return None;
            }
        };
        if !uri.is_data_ability() {
            tracing::error!(uri = %uri, "helper creation failed: uri must use the dataability scheme");
            return None;
        }
        let proxy = match context
            .manager
            .acquire_data_ability(&uri, try_bind, &context.token)
        {
            Some(proxy) => proxy,
            None => {
                tracing::error!(uri = %uri, "helper creation failed: no provider for uri");
                return None;
            }
        };
        Some(Self {
            manager: context.manager,
            token: context.token,
            uri: Some(uri),
            try_bind,
            proxy: Some(proxy),
        })
    }

    pub fn uri(&self) -> Option<&Uri> {
        self.uri.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.proxy.is_some()
    }

    /// Routes one call: the cached proxy when the uri matches the binding,
    /// otherwise a one-shot acquire released when the call returns.
    fn with_proxy<T>(
        &self,
        uri: &Uri,
        op: &str,
        call: impl FnOnce(&Arc<dyn DataAbilityRemote>) -> ability_core::Result<T>,
    ) -> Option<ability_core::Result<T>> {
        if let (Some(bound), Some(proxy)) = (self.uri.as_ref(), self.proxy.as_ref()) {
            if bound == uri {
                return Some(call(proxy));
            }
        }
        let proxy = match self
            .manager
            .acquire_data_ability(uri, self.try_bind, &self.token)
        {
            Some(proxy) => proxy,
            None => {
                tracing::warn!(uri = %uri, op, "no data ability provider for uri");
                return None;
            }
        };
        let guard = ProxyGuard {
            manager: self.manager.as_ref(),
            proxy,
            token: &self.token,
        };
        Some(call(&guard.proxy))
    }

    fn settle<T>(
        &self,
        op: &str,
        uri: &Uri,
        outcome: Option<ability_core::Result<T>>,
        fallback: T,
    ) -> T {
        match outcome {
            Some(Ok(value)) => value,
            Some(Err(err)) => {
                tracing::warn!(error = %err, uri = %uri, op, "data ability call failed");
                fallback
            }
            None => fallback,
        }
    }

    pub fn insert(&self, uri: &Uri, values: &ValuesBucket) -> i32 {
        let outcome = self.with_proxy(uri, "insert", |proxy| proxy.insert(uri, values));
        self.settle("insert", uri, outcome, -1)
    }

    pub fn update(
        &self,
        uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> i32 {
        let outcome = self.with_proxy(uri, "update", |proxy| {
            proxy.update(uri, values, predicates)
        });
        self.settle("update", uri, outcome, -1)
    }

    pub fn delete(&self, uri: &Uri, predicates: &DataAbilityPredicates) -> i32 {
        let outcome = self.with_proxy(uri, "delete", |proxy| proxy.delete(uri, predicates));
        self.settle("delete", uri, outcome, -1)
    }

    pub fn query(
        &self,
        uri: &Uri,
        columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> Option<ResultSet> {
        let outcome = self.with_proxy(uri, "query", |proxy| {
            proxy.query(uri, columns, predicates)
        });
        self.settle("query", uri, outcome, None)
    }

    pub fn get_type(&self, uri: &Uri) -> String {
        let outcome = self.with_proxy(uri, "get_type", |proxy| proxy.get_type(uri));
        self.settle("get_type", uri, outcome, String::new())
    }

    pub fn get_file_types(&self, uri: &Uri, mime_type_filter: &str) -> Vec<String> {
        let outcome = self.with_proxy(uri, "get_file_types", |proxy| {
            proxy.get_file_types(uri, mime_type_filter)
        });
        self.settle("get_file_types", uri, outcome, Vec::new())
    }

    pub fn open_file(&self, uri: &Uri, mode: &str) -> i32 {
        let outcome = self.with_proxy(uri, "open_file", |proxy| proxy.open_file(uri, mode));
        self.settle("open_file", uri, outcome, -1)
    }

    pub fn open_raw_file(&self, uri: &Uri, mode: &str) -> i32 {
        let outcome = self.with_proxy(uri, "open_raw_file", |proxy| {
            proxy.open_raw_file(uri, mode)
        });
        self.settle("open_raw_file", uri, outcome, -1)
    }

    pub fn batch_insert(&self, uri: &Uri, values: &[ValuesBucket]) -> i32 {
        let outcome = self.with_proxy(uri, "batch_insert", |proxy| {
            proxy.batch_insert(uri, values)
        });
        self.settle("batch_insert", uri, outcome, -1)
    }

    pub fn reload(&self, uri: &Uri, extras: &PacMap) -> bool {
        let outcome = self.with_proxy(uri, "reload", |proxy| proxy.reload(uri, extras));
        self.settle("reload", uri, outcome, false)
    }

    /// Releases the bound provider. Answers `false` for unbound helpers and
    /// for every release after the first.
    pub fn release(&mut self) -> bool {
        let uri = match self.uri.as_ref() {
            Some(uri) => uri,
            None => {
                tracing::warn!("release called on an unbound data ability helper");
                return false;
            }
        };
        match self.proxy.take() {
            Some(proxy) => {
                if let Err(err) = self.manager.release_data_ability(&proxy, &self.token) {
                    tracing::warn!(error = %err, uri = %uri, "failed to release data ability provider");
                }
                true
            }
            None => {
                tracing::warn!(uri = %uri, "data ability helper already released");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ability_core::testing::{test_context, FakeAbilityManager, FakeDataAbilityRemote};
    use ability_core::AbilityKind;

    fn helper_context(manager: &Arc<FakeAbilityManager>) -> HelperContext {
        let manager: Arc<dyn AbilityManager> = manager.clone();
        HelperContext {
            token: Token::new("token-1"),
            manager,
        }
    }

    fn notes_uri() -> Uri {
        Uri::parse("dataability:///com.example.notes").unwrap()
    }

    fn file_types() -> Vec<String> {
        vec![
            "Type1".to_string(),
            "Type2".to_string(),
            "Type3".to_string(),
        ]
    }

    #[test]
    fn creator_requires_a_context() {
        assert!(DataAbilityHelper::creator(None).is_none());
        assert!(DataAbilityHelper::creator_with_uri(None, Some(notes_uri()), false).is_none());
    }

    #[test]
    fn creator_with_uri_rejects_missing_and_foreign_uris() {
        let manager = Arc::new(FakeAbilityManager::new());
        let context = helper_context(&manager);
        assert!(DataAbilityHelper::creator_with_uri(Some(context.clone()), None, false).is_none());

        let foreign = Uri::parse("https://example.com/notes").unwrap();
        assert!(
            DataAbilityHelper::creator_with_uri(Some(context), Some(foreign), false).is_none()
        );
        assert_eq!(manager.acquire_count(), 0);
    }

    #[test]
    fn creator_with_uri_requires_a_provider() {
        let manager = Arc::new(FakeAbilityManager::new());
        let context = helper_context(&manager);
        assert!(
            DataAbilityHelper::creator_with_uri(Some(context), Some(notes_uri()), false).is_none()
        );
        assert_eq!(manager.acquire_count(), 1);
    }

    #[test]
    fn bound_helper_reuses_its_proxy() {
        let manager = Arc::new(FakeAbilityManager::new());
        let remote: Arc<dyn DataAbilityRemote> =
            Arc::new(FakeDataAbilityRemote::new().with_file_types(file_types()));
        manager.insert_remote(&notes_uri(), remote);

        let helper = DataAbilityHelper::creator_with_uri(
            Some(helper_context(&manager)),
            Some(notes_uri()),
            true,
        )
        .expect("bound helper");
        assert!(helper.is_bound());

        assert_eq!(helper.get_file_types(&notes_uri(), "*/*"), file_types());
        assert_eq!(helper.get_file_types(&notes_uri(), "*/*"), file_types());
        assert_eq!(manager.acquire_count(), 1);
        assert_eq!(manager.release_count(), 0);
    }

    #[test]
    fn bound_helper_falls_back_to_one_shot_for_other_uris() {
        let manager = Arc::new(FakeAbilityManager::new());
        let remote: Arc<dyn DataAbilityRemote> = Arc::new(FakeDataAbilityRemote::new());
        manager.insert_remote(&notes_uri(), remote);

        let helper = DataAbilityHelper::creator_with_uri(
            Some(helper_context(&manager)),
            Some(notes_uri()),
            false,
        )
        .expect("bound helper");

        let other = Uri::parse("dataability:///com.example.other").unwrap();
        assert!(helper.get_file_types(&other, "*/*").is_empty());
        // creation plus the failed one-shot resolution
        assert_eq!(manager.acquire_count(), 2);
    }

    #[test]
    fn unbound_calls_acquire_and_release_each_time() {
        let manager = Arc::new(FakeAbilityManager::new());
        let remote: Arc<dyn DataAbilityRemote> = Arc::new(FakeDataAbilityRemote::new());
        manager.insert_remote(&notes_uri(), remote);

        let helper = DataAbilityHelper::creator(Some(helper_context(&manager))).expect("helper");
        assert!(!helper.is_bound());

        assert_eq!(helper.insert(&notes_uri(), &ValuesBucket::new()), 7);
        assert_eq!(manager.acquire_count(), 1);
        assert_eq!(manager.release_count(), 1);

        assert!(helper
            .query(&notes_uri(), &[], &DataAbilityPredicates::new())
            .is_some());
        assert_eq!(manager.acquire_count(), 2);
        assert_eq!(manager.release_count(), 2);
    }

    #[test]
    fn failing_remote_returns_sentinels_and_still_releases() {
        let manager = Arc::new(FakeAbilityManager::new());
        let remote: Arc<dyn DataAbilityRemote> = Arc::new(FakeDataAbilityRemote::failing());
        manager.insert_remote(&notes_uri(), remote);

        let helper = DataAbilityHelper::creator(Some(helper_context(&manager))).expect("helper");
        assert_eq!(helper.insert(&notes_uri(), &ValuesBucket::new()), -1);
        assert_eq!(helper.get_type(&notes_uri()), "");
        assert!(helper
            .query(&notes_uri(), &[], &DataAbilityPredicates::new())
            .is_none());
        assert!(!helper.reload(&notes_uri(), &PacMap::new()));
        assert_eq!(manager.release_count(), 4);
    }

    #[test]
    fn unresolvable_uri_returns_sentinels() {
        let manager = Arc::new(FakeAbilityManager::new());
        let helper = DataAbilityHelper::creator(Some(helper_context(&manager))).expect("helper");
        assert_eq!(helper.delete(&notes_uri(), &DataAbilityPredicates::new()), -1);
        assert_eq!(helper.open_file(&notes_uri(), "r"), -1);
        assert!(helper.get_file_types(&notes_uri(), "*/*").is_empty());
        assert_eq!(manager.release_count(), 0);
    }

    #[test]
    fn release_succeeds_once_for_bound_helpers() {
        let manager = Arc::new(FakeAbilityManager::new());
        let remote: Arc<dyn DataAbilityRemote> = Arc::new(FakeDataAbilityRemote::new());
        manager.insert_remote(&notes_uri(), remote);

        let mut helper = DataAbilityHelper::creator_with_uri(
            Some(helper_context(&manager)),
            Some(notes_uri()),
            false,
        )
        .expect("bound helper");
        assert!(helper.release());
        assert!(!helper.release());
        assert_eq!(manager.release_count(), 1);
    }

    #[test]
    fn release_always_fails_for_unbound_helpers() {
        let manager = Arc::new(FakeAbilityManager::new());
        let mut helper =
            DataAbilityHelper::creator(Some(helper_context(&manager))).expect("helper");
        assert!(!helper.release());
        assert!(!helper.release());
        assert_eq!(manager.release_count(), 0);
    }

    #[test]
    fn helper_context_borrows_from_an_ability_context() {
        let context = test_context(AbilityKind::Page);
        let helper_context = HelperContext::from(&context);
        assert_eq!(helper_context.token, Token::new("token-1"));
        assert!(DataAbilityHelper::creator(Some(helper_context)).is_some());
    }
}
