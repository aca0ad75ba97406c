//! # ability-core
//!
//! Core library for the ability framework: the lifecycle state machine, the
//! `Ability` override surface, the process-wide application model, and the
//! data-ability types shared by the runtime and its clients.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The hosting runtime wraps
//!   every ability in its own single-consumer task queue.
//! - **Not thread-safe**: Callers provide their own synchronization. The
//!   runtime guarantees at most one in-flight operation per ability.
//! - **Explicit failure**: Operations on an uninitialized ability return
//!   `AbilityError::NotReady` instead of silently doing nothing.
//! - **No globals**: Ability constructors live in an owned [`AbilityRegistry`]
//!   handed to the runtime, never in process-wide statics.

// Public modules
pub mod ability;
pub mod ability_impl;
pub mod application;
pub mod data_ability;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod pac_map;
pub mod registry;
pub mod types;
pub mod uri;
pub mod want;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

// Re-export commonly used items at crate root
pub use ability::{Ability, AbilityContext};
pub use ability_impl::{AbilityImpl, AbilityLifecycleCallbacks};
pub use application::{
    Application, ApplicationImpl, ApplicationState, Configuration, MemoryLevel,
};
pub use data_ability::{DataAbilityPredicates, DataAbilityRemote, ResultSet, ValuesBucket};
pub use error::{AbilityError, Result};
pub use lifecycle::{Lifecycle, LifecycleEvent, LifecycleObserver, LifecycleState};
pub use manager::AbilityManager;
pub use pac_map::{PacMap, PacValue};
pub use registry::AbilityRegistry;
pub use types::{AbilityInfo, AbilityKind, ApplicationInfo, RemoteObject, Token};
pub use uri::{Uri, DATA_ABILITY_SCHEME};
pub use want::{ElementName, Want};
