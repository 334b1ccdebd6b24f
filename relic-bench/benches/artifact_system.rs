//! Artifact subsystem benchmark suite.
//!
//! All of these run inside player-interaction callbacks on the world
//! thread, so they are kept well under a millisecond:
//!   name_resolution_hit ......... synonym-table path
//!   name_resolution_miss ........ full fallback chain
//!   scroll_classification ....... linear scan over 64 definitions
//!   scroll_combination .......... classify + combine + mint
//!   negotiation_round ........... narrow + persist one choice

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use relic_core::registry::ArtifactRegistry;
use relic_core::scrolls::ScrollCombinationEngine;
use relic_core::store::{
    FlagQuest, MemoryInventory, MemoryPropertyStore, MemoryStore, QuestHandle, QuestTable,
};
use relic_core::turnin::TurnInEngine;
use relic_core::types::{
    ArtifactDefinition, ArtifactId, ArtifactVersionRow, CharacterClass, ItemInstanceId,
    ItemSnapshot, ItemTemplate, PlayerId, PlayerInfo, Realm, RealmFilter, VersionKey,
};

fn make_definition(i: u32) -> ArtifactDefinition {
    let id = format!("Artifact of Trial {i}");
    ArtifactDefinition {
        id: ArtifactId::new(&id),
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
        encounter_id: format!("{id}Encounter"),
        quest_id: format!("{id}Quest"),
        scholars: vec!["Jarron".into()],
        credit_token: None,
    }
}

fn make_registry() -> Arc<ArtifactRegistry> {
    let mut store = MemoryStore::new();
    for i in 0..64 {
        store.push_artifact(make_definition(i));
        for (key, suffix) in [
            ("Slash;Polearm", "slash_polearm"),
            ("Thrust;Polearm", "thrust_polearm"),
            ("Slash;Staff", "slash_staff"),
        ] {
            let item_id = format!("trial_{i}_{suffix}");
            store.push_version(ArtifactVersionRow {
                artifact_id: ArtifactId::new(format!("Artifact of Trial {i}")),
                version: VersionKey::new(key),
                item_id: item_id.clone(),
                realm: RealmFilter::ANY,
            });
            store.push_template(ItemTemplate {
                id: item_id,
                name: format!("Artifact of Trial {i} ({key})"),
                allowed_classes: vec![],
                model: 1,
            });
        }
    }
    let registry = Arc::new(ArtifactRegistry::new(Arc::new(store)));
    registry.load().expect("load");
    registry
}

fn scroll(name: &str) -> ItemSnapshot {
    ItemSnapshot {
        instance: ItemInstanceId::new(),
        template_id: "artifact_scroll".into(),
        name: name.into(),
        slot: 0,
        magical: true,
        artifact: None,
    }
}

/// Benchmark: resolving a partial name through the synonym table.
fn bench_name_resolution(c: &mut Criterion) {
    let registry = make_registry();
    // Force the lazy index build out of the measured path.
    let _ = registry.resolve_name("warm-up");

    c.bench_function("name_resolution_hit", |b| {
        b.iter(|| {
            let id = registry.resolve_name(black_box("the Artifact of Trial 42"));
            black_box(id);
        });
    });

    c.bench_function("name_resolution_miss", |b| {
        b.iter(|| {
            let id = registry.resolve_name(black_box("Sword of a Thousand Truths"));
            black_box(id);
        });
    });
}

/// Benchmark: classifying and combining two scroll pages.
fn bench_scroll_combination(c: &mut Criterion) {
    let registry = make_registry();
    let engine = ScrollCombinationEngine::new(registry);
    let page_1 = scroll("Artifact of Trial 42, Page 1 of 3");
    let page_3 = scroll("Artifact of Trial 42, Page 3 of 3");

    c.bench_function("scroll_classification", |b| {
        b.iter(|| {
            let pages = engine.page_numbers(black_box(&page_1));
            black_box(pages);
        });
    });

    c.bench_function("scroll_combination", |b| {
        b.iter(|| {
            let outcome = engine.combine(black_box(&page_1), black_box(&page_3));
            black_box(outcome).expect("combinable");
        });
    });
}

/// Benchmark: one full negotiation round (narrow + persist).
fn bench_negotiation_round(c: &mut Criterion) {
    let registry = make_registry();
    let properties = Arc::new(MemoryPropertyStore::new());
    let quests = Arc::new(QuestTable::new());
    let encounter = Arc::new(FlagQuest::new());
    quests.register("Artifact of Trial 42Encounter", encounter.clone());
    let engine = Arc::new(TurnInEngine::new(registry, properties.clone(), quests));

    let player = PlayerInfo {
        id: PlayerId::new(),
        name: "Bench".into(),
        class: CharacterClass(2),
        realm: Realm::Albion,
    };
    encounter.force_complete(player.id);

    c.bench_function("negotiation_round", |b| {
        b.iter_batched(
            || {
                // Fresh session awaiting the first choice.
                let mut inventory = MemoryInventory::new(8);
                let book = scroll("Artifact of Trial 42 Tale");
                let _ = inventory.insert(book.clone());
                engine
                    .deliver_book(&player, "Jarron", &book, &mut inventory)
                    .expect("deliver");
                inventory
            },
            |mut inventory| {
                // "Thrust" narrows to a single candidate, so the round
                // grants and clears the session for the next setup.
                let reply = engine.receive_choice(&player, black_box("Thrust"), &mut inventory);
                black_box(reply).expect("choice");
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_name_resolution,
    bench_scroll_combination,
    bench_negotiation_round
);
criterion_main!(benches);
