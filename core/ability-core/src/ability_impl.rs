//! The framework-side lifecycle driver for one ability instance.
//!
//! `AbilityImpl` owns the user `Ability`, its context, and the authoritative
//! lifecycle position. Transition operations run the user callback, dispatch
//! the matching lifecycle event, move the state, and notify the process-wide
//! callback sink. Before `init`, and once the sink is gone, every operation
//! fails with `NotReady` without touching state or the ability.

use crate::ability::{Ability, AbilityContext};
use crate::data_ability::{DataAbilityPredicates, ResultSet, ValuesBucket};
use crate::error::{AbilityError, Result};
use crate::lifecycle::{LifecycleEvent, LifecycleState};
use crate::pac_map::PacMap;
use crate::types::{AbilityInfo, AbilityKind, RemoteObject};
use crate::uri::Uri;
use crate::want::{Want, PARAM_PERMISSION_GRANT_RESULTS, PARAM_REQUESTED_PERMISSIONS};
use std::sync::{Arc, Mutex, Weak};

/// Process-wide observer of per-ability lifecycle edges. The application
/// object implements this to hear about every hosted ability.
pub trait AbilityLifecycleCallbacks: Send {
    fn on_ability_start(&mut self, _info: &AbilityInfo) {}
    fn on_ability_active(&mut self, _info: &AbilityInfo) {}
    fn on_ability_inactive(&mut self, _info: &AbilityInfo) {}
    fn on_ability_foreground(&mut self, _info: &AbilityInfo) {}
    fn on_ability_background(&mut self, _info: &AbilityInfo) {}
    fn on_ability_stop(&mut self, _info: &AbilityInfo) {}
    fn on_ability_save_state(&mut self, _state: &PacMap) {}
}

fn notify_sink<F>(sink: &Arc<Mutex<dyn AbilityLifecycleCallbacks>>, f: F)
where
    F: FnOnce(&mut dyn AbilityLifecycleCallbacks),
{
    // Recover from poisoning - a panicked observer must not wedge dispatch
    let mut guard = sink
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut *guard);
}

enum ResultRouting {
    PermissionGrant {
        permissions: Vec<String>,
        grant_results: Vec<i32>,
    },
    MismatchedGrant {
        permissions: usize,
        grants: usize,
    },
    AbilityResult,
}

fn classify_result(want: &Want) -> ResultRouting {
    let permissions = want.params.get_string_vec(PARAM_REQUESTED_PERMISSIONS);
    let grants = want.params.get_int_vec(PARAM_PERMISSION_GRANT_RESULTS);
    match (permissions, grants) {
        (Some(permissions), Some(grants)) => {
            if permissions.len() == grants.len() {
                ResultRouting::PermissionGrant {
                    permissions: permissions.to_vec(),
                    grant_results: grants.iter().map(|value| *value as i32).collect(),
                }
            } else {
                ResultRouting::MismatchedGrant {
                    permissions: permissions.len(),
                    grants: grants.len(),
                }
            }
        }
        _ => ResultRouting::AbilityResult,
    }
}

pub struct AbilityImpl {
    ability: Option<Box<dyn Ability>>,
    context: Option<AbilityContext>,
    callbacks: Option<Weak<Mutex<dyn AbilityLifecycleCallbacks>>>,
    state: LifecycleState,
}

impl Default for AbilityImpl {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityImpl {
    pub fn new() -> Self {
        Self {
            ability: None,
            context: None,
            callbacks: None,
            state: LifecycleState::Uninitialized,
        }
    }

    /// Binds the user ability, its context, and the callback sink. Moves the
    /// state machine to `Initial`. Calling it twice is an error.
    pub fn init(
        &mut self,
        ability: Box<dyn Ability>,
        context: AbilityContext,
        callbacks: Weak<Mutex<dyn AbilityLifecycleCallbacks>>,
    ) -> Result<()> {
        if self.ability.is_some() {
            return Err(AbilityError::AlreadyInitialized);
        }
        self.ability = Some(ability);
        self.context = Some(context);
        self.callbacks = Some(callbacks);
        self.state = LifecycleState::Initial;
        Ok(())
    }

    pub fn current_state(&self) -> LifecycleState {
        self.state
    }

    fn sink(&self, op: &str) -> Result<Arc<Mutex<dyn AbilityLifecycleCallbacks>>> {
        self.callbacks
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AbilityError::not_ready(op))
    }

    fn ensure_ready(&self, op: &str) -> Result<()> {
        self.sink(op).map(|_| ())
    }

    fn parts(&mut self, op: &str) -> Result<(&mut dyn Ability, &mut AbilityContext)> {
        match (self.ability.as_deref_mut(), self.context.as_mut()) {
            (Some(ability), Some(context)) => Ok((ability, context)),
            _ => Err(AbilityError::not_ready(op)),
        }
    }

    fn kind(&self, op: &str) -> Result<AbilityKind> {
        self.context
            .as_ref()
            .map(|context| context.ability_info().kind)
            .ok_or_else(|| AbilityError::not_ready(op))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transition operations
    // ─────────────────────────────────────────────────────────────────────

    /// `on_start`, then `Active` for Data abilities and `Inactive` for
    /// everything else.
    pub fn start(&mut self, want: Want) -> Result<()> {
        let sink = self.sink("start")?;
        let (ability, context) = self.parts("start")?;
        context.set_want(want.clone());
        ability.on_start(context, &want);
        context
            .lifecycle_mut()
            .dispatch(LifecycleEvent::OnStart, Some(&want));
        let info = context.ability_info().clone();
        self.state = if info.kind.is_data() {
            LifecycleState::Active
        } else {
            LifecycleState::Inactive
        };
        notify_sink(&sink, |callbacks| callbacks.on_ability_start(&info));
        tracing::debug!(ability = %info.name, state = ?self.state, "ability started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        let sink = self.sink("stop")?;
        let (ability, context) = self.parts("stop")?;
        ability.on_stop(context);
        context.lifecycle_mut().dispatch(LifecycleEvent::OnStop, None);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Initial;
        notify_sink(&sink, |callbacks| callbacks.on_ability_stop(&info));
        tracing::debug!(ability = %info.name, "ability stopped");
        Ok(())
    }

    pub fn active(&mut self) -> Result<()> {
        let sink = self.sink("active")?;
        let (ability, context) = self.parts("active")?;
        ability.on_active(context);
        context
            .lifecycle_mut()
            .dispatch(LifecycleEvent::OnActive, None);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Active;
        notify_sink(&sink, |callbacks| callbacks.on_ability_active(&info));
        Ok(())
    }

    pub fn inactive(&mut self) -> Result<()> {
        let sink = self.sink("inactive")?;
        let (ability, context) = self.parts("inactive")?;
        ability.on_inactive(context);
        context
            .lifecycle_mut()
            .dispatch(LifecycleEvent::OnInactive, None);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Inactive;
        notify_sink(&sink, |callbacks| callbacks.on_ability_inactive(&info));
        Ok(())
    }

    /// Foreground lands on `Inactive`; the scheduler follows up with
    /// `active` to finish the resume.
    pub fn foreground(&mut self, want: Want) -> Result<()> {
        let sink = self.sink("foreground")?;
        let (ability, context) = self.parts("foreground")?;
        context.set_want(want.clone());
        ability.on_foreground(context, &want);
        context
            .lifecycle_mut()
            .dispatch(LifecycleEvent::OnForeground, Some(&want));
        let info = context.ability_info().clone();
        self.state = LifecycleState::Inactive;
        notify_sink(&sink, |callbacks| callbacks.on_ability_foreground(&info));
        Ok(())
    }

    /// `on_leave_foreground` fires unconditionally before `on_background`,
    /// even when the ability never reached `Active`.
    pub fn background(&mut self) -> Result<()> {
        let sink = self.sink("background")?;
        let (ability, context) = self.parts("background")?;
        ability.on_leave_foreground(context);
        ability.on_background(context);
        context
            .lifecycle_mut()
            .dispatch(LifecycleEvent::OnBackground, None);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Background;
        notify_sink(&sink, |callbacks| callbacks.on_ability_background(&info));
        Ok(())
    }

    pub fn connect_ability(&mut self, want: Want) -> Result<Option<RemoteObject>> {
        let sink = self.sink("connect_ability")?;
        let (ability, context) = self.parts("connect_ability")?;
        context.set_want(want.clone());
        let handle = ability.on_connect(context, &want);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Active;
        notify_sink(&sink, |callbacks| callbacks.on_ability_active(&info));
        tracing::debug!(ability = %info.name, connected = handle.is_some(), "service connect");
        Ok(handle)
    }

    pub fn disconnect_ability(&mut self, want: Want) -> Result<()> {
        self.ensure_ready("disconnect_ability")?;
        let (ability, context) = self.parts("disconnect_ability")?;
        ability.on_disconnect(context, &want);
        Ok(())
    }

    pub fn command_ability(&mut self, want: Want, restart: bool, start_id: i32) -> Result<()> {
        let sink = self.sink("command_ability")?;
        let (ability, context) = self.parts("command_ability")?;
        context.set_want(want.clone());
        ability.on_command(context, &want, restart, start_id);
        let info = context.ability_info().clone();
        self.state = LifecycleState::Active;
        notify_sink(&sink, |callbacks| callbacks.on_ability_active(&info));
        Ok(())
    }

    /// Routes a delivered result. A want carrying the permission marker pair
    /// goes to the permission callback; mismatched marker arrays are dropped
    /// with an error log and reach neither callback.
    pub fn send_result(&mut self, request_code: i32, result_code: i32, want: Want) -> Result<()> {
        self.ensure_ready("send_result")?;
        let routing = classify_result(&want);
        let (ability, context) = self.parts("send_result")?;
        match routing {
            ResultRouting::PermissionGrant {
                permissions,
                grant_results,
            } => {
                ability.on_request_permissions_from_user_result(
                    context,
                    request_code,
                    &permissions,
                    &grant_results,
                );
            }
            ResultRouting::MismatchedGrant {
                permissions,
                grants,
            } => {
                tracing::error!(
                    permissions,
                    grants,
                    request_code,
                    "permission result arrays differ in length; dropping result"
                );
            }
            ResultRouting::AbilityResult => {
                ability.on_ability_result(context, request_code, result_code, &want);
            }
        }
        Ok(())
    }

    /// Save notifies the sink with the collected state; restore stays local.
    pub fn dispatch_save_ability_state(&mut self, state: &mut PacMap) -> Result<()> {
        let sink = self.sink("save_ability_state")?;
        let (ability, context) = self.parts("save_ability_state")?;
        ability.on_save_ability_state(context, state);
        let snapshot = state.clone();
        notify_sink(&sink, |callbacks| callbacks.on_ability_save_state(&snapshot));
        Ok(())
    }

    pub fn dispatch_restore_ability_state(&mut self, state: &PacMap) -> Result<()> {
        self.ensure_ready("restore_ability_state")?;
        let (ability, context) = self.parts("restore_ability_state")?;
        ability.on_restore_ability_state(context, state);
        Ok(())
    }

    pub fn dispatch_new_want(&mut self, want: Want) -> Result<()> {
        self.ensure_ready("new_want")?;
        let (ability, context) = self.parts("new_want")?;
        context.set_want(want.clone());
        ability.on_new_want(context, &want);
        Ok(())
    }

    /// Walks the primitive transitions needed to reach `target` from the
    /// current state, honoring the declared kind. Unreachable pairs fail
    /// with `IllegalTransition` and leave the state untouched.
    pub fn handle_ability_transaction(
        &mut self,
        want: Want,
        target: LifecycleState,
        new_want: bool,
    ) -> Result<LifecycleState> {
        self.ensure_ready("ability_transaction")?;
        let kind = self.kind("ability_transaction")?;
        let from = self.state;

        if kind.is_data() {
            match (from, target) {
                (LifecycleState::Initial, LifecycleState::Active) => self.start(want)?,
                (LifecycleState::Active, LifecycleState::Active) => {}
                (LifecycleState::Active, LifecycleState::Initial) => self.stop()?,
                (LifecycleState::Initial, LifecycleState::Initial) => {}
                _ => return Err(AbilityError::IllegalTransition { from, target, kind }),
            }
            return Ok(self.state);
        }

        match target {
            LifecycleState::Inactive => match from {
                LifecycleState::Initial => self.start(want)?,
                LifecycleState::Active => self.inactive()?,
                LifecycleState::Inactive => {}
                _ => return Err(AbilityError::IllegalTransition { from, target, kind }),
            },
            LifecycleState::Active => {
                if new_want && from != LifecycleState::Initial {
                    self.dispatch_new_want(want.clone())?;
                }
                match from {
                    LifecycleState::Initial => {
                        self.start(want)?;
                        self.active()?;
                    }
                    LifecycleState::Inactive => self.active()?,
                    LifecycleState::Background => {
                        self.foreground(want)?;
                        self.active()?;
                    }
                    LifecycleState::Active => {}
                    LifecycleState::Uninitialized => {
                        return Err(AbilityError::not_ready("ability_transaction"));
                    }
                }
            }
            LifecycleState::Background => match from {
                LifecycleState::Active => {
                    self.inactive()?;
                    self.background()?;
                }
                LifecycleState::Inactive => self.background()?,
                LifecycleState::Background => {}
                _ => return Err(AbilityError::IllegalTransition { from, target, kind }),
            },
            LifecycleState::Initial => match from {
                LifecycleState::Active => {
                    self.inactive()?;
                    self.background()?;
                    self.stop()?;
                }
                LifecycleState::Inactive => {
                    self.background()?;
                    self.stop()?;
                }
                LifecycleState::Background => self.stop()?,
                LifecycleState::Initial => {}
                LifecycleState::Uninitialized => {
                    return Err(AbilityError::not_ready("ability_transaction"));
                }
            },
            LifecycleState::Uninitialized => {
                return Err(AbilityError::IllegalTransition { from, target, kind });
            }
        }

        Ok(self.state)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Data ability surface
    // ─────────────────────────────────────────────────────────────────────

    pub fn insert(&mut self, uri: &Uri, values: &ValuesBucket) -> Result<i32> {
        self.ensure_ready("insert")?;
        let (ability, context) = self.parts("insert")?;
        Ok(ability.insert(context, uri, values))
    }

    pub fn update(
        &mut self,
        uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> Result<i32> {
        self.ensure_ready("update")?;
        let (ability, context) = self.parts("update")?;
        Ok(ability.update(context, uri, values, predicates))
    }

    pub fn delete(&mut self, uri: &Uri, predicates: &DataAbilityPredicates) -> Result<i32> {
        self.ensure_ready("delete")?;
        let (ability, context) = self.parts("delete")?;
        Ok(ability.delete(context, uri, predicates))
    }

    pub fn query(
        &mut self,
        uri: &Uri,
        columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> Result<Option<ResultSet>> {
        self.ensure_ready("query")?;
        let (ability, context) = self.parts("query")?;
        Ok(ability.query(context, uri, columns, predicates))
    }

    pub fn get_type(&mut self, uri: &Uri) -> Result<String> {
        self.ensure_ready("get_type")?;
        let (ability, context) = self.parts("get_type")?;
        Ok(ability.get_type(context, uri))
    }

    pub fn get_file_types(&mut self, uri: &Uri, mime_type_filter: &str) -> Result<Vec<String>> {
        self.ensure_ready("get_file_types")?;
        let (ability, context) = self.parts("get_file_types")?;
        Ok(ability.get_file_types(context, uri, mime_type_filter))
    }

    pub fn open_file(&mut self, uri: &Uri, mode: &str) -> Result<i32> {
        self.ensure_ready("open_file")?;
        let (ability, context) = self.parts("open_file")?;
        Ok(ability.open_file(context, uri, mode))
    }

    pub fn open_raw_file(&mut self, uri: &Uri, mode: &str) -> Result<i32> {
        self.ensure_ready("open_raw_file")?;
        let (ability, context) = self.parts("open_raw_file")?;
        Ok(ability.open_raw_file(context, uri, mode))
    }

    pub fn batch_insert(&mut self, uri: &Uri, values: &[ValuesBucket]) -> Result<i32> {
        self.ensure_ready("batch_insert")?;
        let (ability, context) = self.parts("batch_insert")?;
        Ok(ability.batch_insert(context, uri, values))
    }

    pub fn reload(&mut self, uri: &Uri, extras: &PacMap) -> Result<bool> {
        self.ensure_ready("reload")?;
        let (ability, context) = self.parts("reload")?;
        Ok(ability.reload(context, uri, extras))
    }
}
