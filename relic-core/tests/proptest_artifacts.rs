//! Property-based tests for the artifact subsystem.
//!
//! Uses `proptest` to check the combination-engine invariants, resolver
//! idempotence, and progression monotonicity under random inputs.

use std::sync::Arc;

use proptest::prelude::*;

use relic_core::config::ProgressionConfig;
use relic_core::progression::{
    level_for_xp, ExperienceProgression, GrantContext, XpAmounts, XpSource, MAX_LEVEL,
};
use relic_core::registry::ArtifactRegistry;
use relic_core::resolve::{normalize, NameIndex};
use relic_core::scrolls::ScrollCombinationEngine;
use relic_core::store::MemoryStore;
use relic_core::types::{
    ArtifactDefinition, ArtifactId, ArtifactInstance, ItemInstanceId, ItemSnapshot, PageSet,
};

fn definition(id: &str) -> ArtifactDefinition {
    ArtifactDefinition {
        id: ArtifactId::new(id),
        zone: "Stygia".into(),
        book_id: format!("{id} Tale"),
        scrolls: [
            format!("{id}, Page 1 of 3"),
            format!("{id}, Page 2 of 3"),
            format!("{id}, Page 3 of 3"),
        ],
        combined_scrolls: [
            format!("{id}, Pages 1 and 2"),
            format!("{id}, Pages 1 and 3"),
            format!("{id}, Pages 2 and 3"),
        ],
        scroll_model: 499,
        combined_model: 500,
        book_model: 501,
        xp_rate: 300,
        encounter_id: String::new(),
        quest_id: String::new(),
        scholars: vec![],
        credit_token: None,
    }
}

fn engine() -> ScrollCombinationEngine {
    let mut store = MemoryStore::new();
    store.push_artifact(definition("Battler"));
    store.push_artifact(definition("Cloudsong"));
    let registry = ArtifactRegistry::new(Arc::new(store));
    registry.load().expect("load");
    ScrollCombinationEngine::new(Arc::new(registry))
}

fn item_for(def_id: &str, pages: PageSet) -> ItemSnapshot {
    let def = definition(def_id);
    let name = def.scroll_name(pages).expect("named page set").to_owned();
    ItemSnapshot {
        instance: ItemInstanceId::new(),
        template_id: "artifact_scroll".into(),
        name,
        slot: 0,
        magical: true,
        artifact: None,
    }
}

/// Any non-sentinel page set (1..=6: single and double pages).
fn arb_combinable() -> impl Strategy<Value = PageSet> {
    (1u8..=6).prop_map(|bits| PageSet::from_bits_truncate(bits))
}

// ---------------------------------------------------------------------------
// Property: combine yields the union exactly when sets are disjoint
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn combine_is_union_for_disjoint_pairs(a in arb_combinable(), b in arb_combinable()) {
        let engine = engine();
        let item_a = item_for("Battler", a);
        let item_b = item_for("Battler", b);

        let result = engine.combine(&item_a, &item_b);
        if (a & b).is_empty() {
            let outcome = result.expect("disjoint sets must combine");
            prop_assert_eq!(outcome.item.pages, a | b);
            prop_assert_eq!(outcome.complete_book, (a | b) == PageSet::ALL);
            prop_assert_eq!(outcome.artifact_id.as_str(), "Battler");
        } else {
            prop_assert!(result.is_err(), "overlapping sets must be rejected");
        }
    }

    #[test]
    fn combine_rejects_mismatched_artifacts(a in arb_combinable(), b in arb_combinable()) {
        let engine = engine();
        let item_a = item_for("Battler", a);
        let item_b = item_for("Cloudsong", b);
        prop_assert!(engine.combine(&item_a, &item_b).is_err());
    }

    #[test]
    fn books_are_never_combinable(a in arb_combinable()) {
        let engine = engine();
        let book = item_for("Battler", PageSet::ALL);
        let other = item_for("Battler", a);
        prop_assert!(engine.combine(&book, &other).is_err());
        prop_assert!(engine.combine(&other, &book).is_err());
    }
}

// ---------------------------------------------------------------------------
// Property: resolution is idempotent under re-normalization
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn resolve_is_idempotent_under_normalization(
        raw in "[A-Za-z'\u{2019}\u{E9}\u{F6} ]{0,24}",
    ) {
        let ids: Vec<ArtifactId> = ["Maddening Scalars", "Tartaros' Gift", "Battler"]
            .into_iter()
            .map(ArtifactId::from)
            .collect();
        let index = NameIndex::build(&ids);
        prop_assert_eq!(index.resolve(&raw), index.resolve(&normalize(&raw)));
    }
}

// ---------------------------------------------------------------------------
// Property: experience is monotonic and the level never exceeds 10
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn experience_monotonic_level_bounded(
        start in 0u64..600_000_000,
        grants in prop::collection::vec(0u64..100_000_000, 0..12),
    ) {
        let progression = ExperienceProgression::new(ProgressionConfig::default());
        let def = definition("Battler");
        let mut instance = ArtifactInstance {
            id: ItemInstanceId::new(),
            artifact_id: ArtifactId::new("Battler"),
            name: "Battler".into(),
            experience: start,
            level: level_for_xp(start),
        };

        let ctx = GrantContext {
            source: XpSource::NpcKill,
            holder_blocked: false,
            guild_bonus: false,
            rate_override: None,
        };

        let mut previous_xp = instance.experience;
        let mut announced: Vec<u8> = Vec::new();
        for base in grants {
            let outcome = progression.grant_experience(
                &mut instance,
                &def,
                XpAmounts { base, ..Default::default() },
                ctx,
            );
            prop_assert!(instance.experience >= previous_xp, "experience decreased");
            prop_assert!(instance.level <= MAX_LEVEL);
            // Crossed levels arrive in ascending order with no repeats.
            for level in &outcome.levels {
                prop_assert!(announced.last().is_none_or(|last| level > last));
                announced.push(*level);
            }
            previous_xp = instance.experience;
        }
        prop_assert_eq!(instance.level, level_for_xp(instance.experience).max(level_for_xp(start)));
    }
}
