//! The slice of the ability manager service an app process consumes.

use crate::data_ability::DataAbilityRemote;
use crate::error::Result;
use crate::types::Token;
use crate::uri::Uri;
use std::sync::Arc;

/// Acquire/release surface for data ability bindings.
///
/// `acquire_data_ability` resolves a `dataability://` locator to a live
/// proxy, starting the provider first when `try_bind` is set. Every acquired
/// proxy must be released exactly once through the same manager.
pub trait AbilityManager: Send + Sync {
    fn acquire_data_ability(
        &self,
        uri: &Uri,
        try_bind: bool,
        token: &Token,
    ) -> Option<Arc<dyn DataAbilityRemote>>;

    fn release_data_ability(
        &self,
        proxy: &Arc<dyn DataAbilityRemote>,
        token: &Token,
    ) -> Result<()>;
}
