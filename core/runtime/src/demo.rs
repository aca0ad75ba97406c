//! Built-in demo bundle hosted when no manifest is configured.
//!
//! One ability of each kind: a page that counts activations, a service that
//! hands out connection handles, and an in-memory note store reachable at
//! [`NOTE_URI`].

use crate::manifest::{BundleManifest, ManifestAbility, ManifestApplication};
use ability_core::{
    Ability, AbilityContext, AbilityInfo, AbilityKind, AbilityLifecycleCallbacks, AbilityRegistry,
    Application, Configuration, DataAbilityPredicates, MemoryLevel, PacMap, PacValue, RemoteObject,
    ResultSet, Uri, ValuesBucket, Want,
};
use tracing::info;

pub const DEMO_BUNDLE: &str = "com.example.demo";
pub const PAGE_ABILITY: &str = "DemoPageAbility";
pub const SERVICE_ABILITY: &str = "DemoServiceAbility";
pub const NOTE_ABILITY: &str = "NoteDataAbility";
pub const NOTE_URI: &str = "dataability:///com.example.demo.notes";

pub struct DemoApplication;

impl Application for DemoApplication {
    fn on_start(&mut self) {
        info!("demo application started");
    }

    fn on_memory_level(&mut self, level: MemoryLevel) {
        info!(level = ?level, "memory pressure reported");
    }

    fn on_configuration_updated(&mut self, config: &Configuration) {
        info!(entries = config.len(), "configuration updated");
    }
}

impl AbilityLifecycleCallbacks for DemoApplication {
    fn on_ability_start(&mut self, info: &AbilityInfo) {
        info!(ability = %info.name, "ability started");
    }

    fn on_ability_stop(&mut self, info: &AbilityInfo) {
        info!(ability = %info.name, "ability stopped");
    }
}

/// Counts activations and keeps the count across save/restore.
#[derive(Default)]
pub struct DemoPageAbility {
    visits: i64,
}

impl Ability for DemoPageAbility {
    fn on_active(&mut self, _context: &mut AbilityContext) {
        self.visits += 1;
    }

    fn on_save_ability_state(&mut self, _context: &mut AbilityContext, state: &mut PacMap) {
        state.put_int("visits", self.visits);
    }

    fn on_restore_ability_state(&mut self, _context: &mut AbilityContext, state: &PacMap) {
        if let Some(visits) = state.get_int("visits") {
            self.visits = visits;
        }
    }
}

#[derive(Default)]
pub struct DemoServiceAbility {
    connections: u64,
}

impl Ability for DemoServiceAbility {
    fn on_connect(&mut self, _context: &mut AbilityContext, _want: &Want) -> Option<RemoteObject> {
        self.connections += 1;
        Some(RemoteObject::new(self.connections))
    }

    fn on_command(
        &mut self,
        _context: &mut AbilityContext,
        _want: &Want,
        restart: bool,
        start_id: i32,
    ) {
        info!(restart, start_id, "demo service command");
    }
}

/// In-memory note store. Rows are `(id, text)`; predicates select rows by
/// id through `where_args`, or every row when empty.
#[derive(Default)]
pub struct NoteDataAbility {
    notes: Vec<(i64, String)>,
    next_id: i64,
}

impl NoteDataAbility {
    fn matching_ids(&self, predicates: &DataAbilityPredicates) -> Vec<i64> {
        if predicates.where_args.is_empty() {
            self.notes.iter().map(|(id, _)| *id).collect()
        } else {
            predicates
                .where_args
                .iter()
                .filter_map(|arg| arg.parse().ok())
                .collect()
        }
    }
}

impl Ability for NoteDataAbility {
    fn insert(&mut self, _context: &mut AbilityContext, _uri: &Uri, values: &ValuesBucket) -> i32 {
        let text = match values.get("text") {
            Some(PacValue::Str(text)) => text.clone(),
            _ => return -1,
        };
        self.next_id += 1;
        self.notes.push((self.next_id, text));
        self.next_id as i32
    }

    fn update(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        values: &ValuesBucket,
        predicates: &DataAbilityPredicates,
    ) -> i32 {
        let text = match values.get("text") {
            Some(PacValue::Str(text)) => text.clone(),
            _ => return -1,
        };
        let ids = self.matching_ids(predicates);
        let mut updated = 0;
        for (id, note) in self.notes.iter_mut() {
            if ids.contains(id) {
                *note = text.clone();
                updated += 1;
            }
        }
        updated
    }

    fn delete(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        predicates: &DataAbilityPredicates,
    ) -> i32 {
        let ids = self.matching_ids(predicates);
        let before = self.notes.len();
        self.notes.retain(|(id, _)| !ids.contains(id));
        (before - self.notes.len()) as i32
    }

    fn query(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        _columns: &[String],
        predicates: &DataAbilityPredicates,
    ) -> Option<ResultSet> {
        let ids = self.matching_ids(predicates);
        let mut result = ResultSet::new(vec!["id".to_string(), "text".to_string()]);
        for (id, text) in &self.notes {
            if ids.contains(id) {
                result
                    .rows
                    .push(vec![PacValue::Int(*id), PacValue::Str(text.clone())]);
            }
        }
        Some(result)
    }

    fn get_type(&mut self, _context: &mut AbilityContext, _uri: &Uri) -> String {
        "vnd.example.note/text".to_string()
    }

    fn get_file_types(
        &mut self,
        _context: &mut AbilityContext,
        _uri: &Uri,
        mime_type_filter: &str,
    ) -> Vec<String> {
        ["text/plain", "vnd.example.note/text"]
            .iter()
            .filter(|kind| {
                mime_type_filter.is_empty() || mime_type_filter == "*/*" || **kind == mime_type_filter
            })
            .map(|kind| kind.to_string())
            .collect()
    }

    fn batch_insert(
        &mut self,
        context: &mut AbilityContext,
        uri: &Uri,
        values: &[ValuesBucket],
    ) -> i32 {
        values
            .iter()
            .filter(|bucket| self.insert(context, uri, bucket) >= 0)
            .count() as i32
    }

    fn reload(&mut self, _context: &mut AbilityContext, _uri: &Uri, _extras: &PacMap) -> bool {
        self.notes.clear();
        self.next_id = 0;
        true
    }
}

pub fn demo_registry() -> AbilityRegistry {
    let mut registry = AbilityRegistry::new();
    registry.register(PAGE_ABILITY, || Box::new(DemoPageAbility::default()));
    registry.register(SERVICE_ABILITY, || Box::new(DemoServiceAbility::default()));
    registry.register(NOTE_ABILITY, || Box::new(NoteDataAbility::default()));
    registry
}

pub fn demo_application() -> Box<dyn Application> {
    Box::new(DemoApplication)
}

pub fn demo_manifest() -> BundleManifest {
    BundleManifest {
        application: ManifestApplication {
            bundle_name: DEMO_BUNDLE.to_string(),
            data_dir: None,
        },
        abilities: vec![
            ManifestAbility {
                name: PAGE_ABILITY.to_string(),
                kind: AbilityKind::Page,
                uri: None,
            },
            ManifestAbility {
                name: SERVICE_ABILITY.to_string(),
                kind: AbilityKind::Service,
                uri: None,
            },
            ManifestAbility {
                name: NOTE_ABILITY.to_string(),
                kind: AbilityKind::Data,
                uri: Some(NOTE_URI.to_string()),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ability_core::testing::test_context;

    fn note_values(text: &str) -> ValuesBucket {
        let mut values = ValuesBucket::new();
        values.set("text", PacValue::Str(text.to_string()));
        values
    }

    fn id_predicates(id: i64) -> DataAbilityPredicates {
        DataAbilityPredicates {
            where_args: vec![id.to_string()],
            ..DataAbilityPredicates::default()
        }
    }

    #[test]
    fn note_store_supports_crud() {
        let mut context = test_context(AbilityKind::Data);
        let uri = Uri::parse(NOTE_URI).unwrap();
        let mut notes = NoteDataAbility::default();

        assert_eq!(notes.insert(&mut context, &uri, &note_values("milk")), 1);
        assert_eq!(notes.insert(&mut context, &uri, &note_values("bread")), 2);
        assert_eq!(
            notes.insert(&mut context, &uri, &ValuesBucket::new()),
            -1,
            "rows without a text column are refused"
        );

        let all = notes
            .query(&mut context, &uri, &[], &DataAbilityPredicates::default())
            .unwrap();
        assert_eq!(all.row_count(), 2);
        assert_eq!(
            all.value_at(0, "text"),
            Some(&PacValue::Str("milk".to_string()))
        );

        assert_eq!(
            notes.update(&mut context, &uri, &note_values("rye bread"), &id_predicates(2)),
            1
        );
        assert_eq!(notes.delete(&mut context, &uri, &id_predicates(1)), 1);
        let rest = notes
            .query(&mut context, &uri, &[], &DataAbilityPredicates::default())
            .unwrap();
        assert_eq!(rest.row_count(), 1);
        assert_eq!(
            rest.value_at(0, "text"),
            Some(&PacValue::Str("rye bread".to_string()))
        );

        assert!(notes.reload(&mut context, &uri, &PacMap::new()));
        let empty = notes
            .query(&mut context, &uri, &[], &DataAbilityPredicates::default())
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn note_store_filters_mime_types() {
        let mut context = test_context(AbilityKind::Data);
        let uri = Uri::parse(NOTE_URI).unwrap();
        let mut notes = NoteDataAbility::default();
        assert_eq!(notes.get_file_types(&mut context, &uri, "").len(), 2);
        assert_eq!(notes.get_file_types(&mut context, &uri, "*/*").len(), 2);
        assert_eq!(
            notes.get_file_types(&mut context, &uri, "text/plain"),
            vec!["text/plain"]
        );
        assert!(notes
            .get_file_types(&mut context, &uri, "image/png")
            .is_empty());
    }

    #[test]
    fn page_counts_activations_across_save_and_restore() {
        let mut context = test_context(AbilityKind::Page);
        let mut page = DemoPageAbility::default();
        page.on_active(&mut context);
        page.on_active(&mut context);

        let mut saved = PacMap::new();
        page.on_save_ability_state(&mut context, &mut saved);
        assert_eq!(saved.get_int("visits"), Some(2));

        let mut restored = DemoPageAbility::default();
        restored.on_restore_ability_state(&mut context, &saved);
        restored.on_active(&mut context);
        let mut again = PacMap::new();
        restored.on_save_ability_state(&mut context, &mut again);
        assert_eq!(again.get_int("visits"), Some(3));
    }

    #[test]
    fn service_hands_out_distinct_handles() {
        let mut context = test_context(AbilityKind::Service);
        let mut service = DemoServiceAbility::default();
        let first = service.on_connect(&mut context, &Want::default()).unwrap();
        let second = service.on_connect(&mut context, &Want::default()).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn demo_manifest_matches_the_registry() {
        let manifest = demo_manifest();
        manifest.validate().unwrap();
        let registry = demo_registry();
        for info in manifest.abilities() {
            assert!(registry.contains(&info.name));
        }
        assert_eq!(registry.len(), manifest.abilities().len());
    }
}
