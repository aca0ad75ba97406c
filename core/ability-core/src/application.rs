//! Application-level state and callbacks.
//!
//! `ApplicationImpl` tracks where the whole process sits (created, ready,
//! foreground, background, terminated) and drives the user `Application`
//! callbacks on each legal edge. Illegal edges log a warning and report
//! `false` instead of moving the state.

use crate::ability_impl::AbilityLifecycleCallbacks;
use crate::pac_map::PacMap;
use crate::types::AbilityInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    Create,
    Ready,
    Foreground,
    Background,
    Terminated,
}

/// Memory pressure levels forwarded by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    Moderate,
    Low,
    Critical,
}

/// Flat key-value view of the system configuration (locale, orientation,
/// and similar). Kept schemaless so new keys need no code change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    entries: BTreeMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// User-facing application callbacks. The supertrait delivers per-ability
/// lifecycle edges to the same object.
pub trait Application: AbilityLifecycleCallbacks {
    fn on_start(&mut self) {}
    fn on_foreground(&mut self) {}
    fn on_background(&mut self) {}
    fn on_terminate(&mut self) {}
    fn on_memory_level(&mut self, _level: MemoryLevel) {}
    fn on_configuration_updated(&mut self, _config: &Configuration) {}
}

pub struct ApplicationImpl {
    state: ApplicationState,
    record_id: Option<i64>,
    application: Box<dyn Application>,
}

impl ApplicationImpl {
    pub fn new(application: Box<dyn Application>) -> Self {
        Self {
            state: ApplicationState::Create,
            record_id: None,
            application,
        }
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    /// Force the state without running callbacks. The scheduler uses this
    /// when it has already decided the outcome.
    pub fn set_state(&mut self, state: ApplicationState) {
        self.state = state;
    }

    pub fn record_id(&self) -> Option<i64> {
        self.record_id
    }

    /// The record id is write-once. A second assignment keeps the first
    /// value and logs the conflict.
    pub fn set_record_id(&mut self, record_id: i64) {
        match self.record_id {
            None => self.record_id = Some(record_id),
            Some(existing) => {
                tracing::warn!(existing, rejected = record_id, "record id already set");
            }
        }
    }

    fn reject(&self, edge: &str) -> bool {
        tracing::warn!(state = ?self.state, edge, "illegal application transition");
        false
    }

    /// `Create -> Ready`, running `Application::on_start`.
    pub fn perform_app_ready(&mut self) -> bool {
        if self.state != ApplicationState::Create {
            return self.reject("app_ready");
        }
        self.state = ApplicationState::Ready;
        self.application.on_start();
        true
    }

    /// `Ready | Background -> Foreground`.
    pub fn perform_foreground(&mut self) -> bool {
        match self.state {
            ApplicationState::Ready | ApplicationState::Background => {
                self.state = ApplicationState::Foreground;
                self.application.on_foreground();
                true
            }
            _ => self.reject("foreground"),
        }
    }

    /// `Foreground -> Background`.
    pub fn perform_background(&mut self) -> bool {
        if self.state != ApplicationState::Foreground {
            return self.reject("background");
        }
        self.state = ApplicationState::Background;
        self.application.on_background();
        true
    }

    /// `Background -> Terminated`. A foreground application must be sent to
    /// the background first.
    pub fn perform_terminate(&mut self) -> bool {
        if self.state != ApplicationState::Background {
            return self.reject("terminate");
        }
        self.state = ApplicationState::Terminated;
        self.application.on_terminate();
        true
    }

    /// Memory pressure is delivered in any state.
    pub fn perform_memory_level(&mut self, level: MemoryLevel) {
        self.application.on_memory_level(level);
    }

    /// Configuration changes are delivered in any state.
    pub fn perform_configuration_updated(&mut self, config: &Configuration) {
        self.application.on_configuration_updated(config);
    }
}

impl AbilityLifecycleCallbacks for ApplicationImpl {
    fn on_ability_start(&mut self, info: &AbilityInfo) {
        self.application.on_ability_start(info);
    }

    fn on_ability_active(&mut self, info: &AbilityInfo) {
        self.application.on_ability_active(info);
    }

    fn on_ability_inactive(&mut self, info: &AbilityInfo) {
        self.application.on_ability_inactive(info);
    }

    fn on_ability_foreground(&mut self, info: &AbilityInfo) {
        self.application.on_ability_foreground(info);
    }

    fn on_ability_background(&mut self, info: &AbilityInfo) {
        self.application.on_ability_background(info);
    }

    fn on_ability_stop(&mut self, info: &AbilityInfo) {
        self.application.on_ability_stop(info);
    }

    fn on_ability_save_state(&mut self, state: &PacMap) {
        self.application.on_ability_save_state(state);
    }
}
