//! Maps ability names to the constructors that build them.

use std::collections::HashMap;

use crate::ability::Ability;
use crate::error::{AbilityError, Result};

type AbilityCtor = Box<dyn Fn() -> Box<dyn Ability> + Send + Sync>;

/// Registry of ability constructors for one bundle. The runtime consults it
/// when the scheduler asks to launch an ability by name.
pub struct AbilityRegistry {
    ctors: HashMap<String, AbilityCtor>,
}

impl Default for AbilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self {
            ctors: HashMap::new(),
        }
    }

    /// Register a constructor under an ability name. A later registration
    /// under the same name replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn() -> Box<dyn Ability> + Send + Sync + 'static,
    {
        self.ctors.insert(name.into(), Box::new(ctor));
    }

    /// Build a fresh instance of the named ability.
    pub fn create(&self, name: &str) -> Result<Box<dyn Ability>> {
        self.ctors
            .get(name)
            .map(|ctor| ctor())
            .ok_or_else(|| AbilityError::UnknownAbility(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ctors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.ctors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctors.is_empty()
    }
}
