//! Scroll and book assembly: the bitmask state machine governing which
//! partial pages may be merged into a complete book.
//!
//! Items are classified by exact display-name match against the six
//! scroll-name fields and the book title of every known definition (a
//! linear scan; artifact counts are bounded by world content). Two
//! scrolls combine iff they belong to the same artifact and their page
//! sets are disjoint; the result is the bitwise union.

use std::sync::Arc;

use crate::error::{ArtifactError, Result};
use crate::registry::ArtifactRegistry;
use crate::store::Inventory;
use crate::types::{ArtifactDefinition, ArtifactId, ItemSnapshot, PageSet};

/// Price in gold of a minted scroll, by page count.
fn price_for(pages: PageSet) -> u8 {
    match pages.page_count() {
        1 => 2,
        2 => 4,
        _ => 5,
    }
}

/// A freshly minted scroll or book, ready to be placed in an inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedScroll {
    /// Owning artifact.
    pub artifact_id: ArtifactId,
    /// Display name drawn from the definition's per-combination table.
    pub name: String,
    /// Icon model.
    pub model: u16,
    /// Price in gold.
    pub price_gold: u8,
    /// Pages the item represents.
    pub pages: PageSet,
}

/// Result of combining two scrolls.
#[derive(Debug, Clone)]
pub struct CombineOutcome {
    /// The combined scroll, or the complete book.
    pub item: MintedScroll,
    /// Owning artifact.
    pub artifact_id: ArtifactId,
    /// Whether the combination produced the complete book.
    pub complete_book: bool,
}

/// The scroll combination engine.
#[derive(Debug, Clone)]
pub struct ScrollCombinationEngine {
    registry: Arc<ArtifactRegistry>,
}

impl ScrollCombinationEngine {
    /// Engine over a loaded registry.
    #[must_use]
    pub fn new(registry: Arc<ArtifactRegistry>) -> Self {
        Self { registry }
    }

    /// Classify an item: which pages it represents and for which
    /// artifact. `None` when the item is not a scroll or book at all.
    #[must_use]
    pub fn page_numbers(&self, item: &ItemSnapshot) -> Option<(PageSet, ArtifactId)> {
        if !item.magical {
            return None;
        }

        for def in self.registry.all() {
            if let Some(pages) = classify_against(&def, &item.name) {
                return Some((pages, def.id.clone()));
            }
        }
        None
    }

    /// Whether the item is a partial scroll (not a complete book).
    #[must_use]
    pub fn is_artifact_scroll(&self, item: &ItemSnapshot) -> bool {
        self.page_numbers(item)
            .is_some_and(|(pages, _)| pages.is_combinable())
    }

    /// Whether the item is the completed book of some artifact; returns
    /// the artifact id if so.
    #[must_use]
    pub fn book_artifact(&self, item: &ItemSnapshot) -> Option<ArtifactId> {
        self.page_numbers(item)
            .and_then(|(pages, id)| (pages == PageSet::ALL).then_some(id))
    }

    /// Whether two items may be combined: both combinable operands, the
    /// same artifact, and disjoint page sets.
    #[must_use]
    pub fn can_combine(&self, a: &ItemSnapshot, b: &ItemSnapshot) -> bool {
        self.check_combine(a, b).is_ok()
    }

    /// Combine two scrolls into a higher-order scroll or the complete
    /// book.
    ///
    /// # Errors
    /// [`ArtifactError::InvalidCombination`] when the pair is rejected:
    /// sentinel operands, mismatched artifacts, or overlapping pages.
    /// No state is changed on rejection.
    pub fn combine(&self, a: &ItemSnapshot, b: &ItemSnapshot) -> Result<CombineOutcome> {
        let (pages_a, pages_b, artifact_id) = self.check_combine(a, b)?;

        let union = pages_a | pages_b;
        let definition = self
            .registry
            .get(&artifact_id)
            .ok_or_else(|| ArtifactError::NotFound {
                name: artifact_id.to_string(),
            })?;

        let item = mint(&definition, union).ok_or_else(|| ArtifactError::InvalidCombination {
            reason: format!("no scroll defined for {union}"),
        })?;

        Ok(CombineOutcome {
            complete_book: union == PageSet::ALL,
            artifact_id,
            item,
        })
    }

    /// Mint a single named page of an artifact directly (content
    /// tooling; drops and vendors use this).
    #[must_use]
    pub fn create_scroll(&self, artifact_id: &ArtifactId, page: u8) -> Option<MintedScroll> {
        let pages = match page {
            1 => PageSet::PAGE_1,
            2 => PageSet::PAGE_2,
            3 => PageSet::PAGE_3,
            _ => return None,
        };
        let definition = self.registry.get(artifact_id)?;
        mint(&definition, pages)
    }

    /// Whether the inventory holds the completed book for `artifact_id`.
    #[must_use]
    pub fn has_book(&self, inventory: &dyn Inventory, artifact_id: &ArtifactId) -> bool {
        let Some(definition) = self.registry.get(artifact_id) else {
            return false;
        };
        inventory
            .items()
            .iter()
            .any(|item| item.magical && item.name.eq_ignore_ascii_case(&definition.book_id))
    }

    fn check_combine(
        &self,
        a: &ItemSnapshot,
        b: &ItemSnapshot,
    ) -> Result<(PageSet, PageSet, ArtifactId)> {
        let Some((pages_a, artifact_a)) = self.page_numbers(a) else {
            return Err(ArtifactError::InvalidCombination {
                reason: format!("\"{}\" is not an artifact scroll", a.name),
            });
        };
        let Some((pages_b, artifact_b)) = self.page_numbers(b) else {
            return Err(ArtifactError::InvalidCombination {
                reason: format!("\"{}\" is not an artifact scroll", b.name),
            });
        };

        if !pages_a.is_combinable() || !pages_b.is_combinable() {
            return Err(ArtifactError::InvalidCombination {
                reason: "complete books cannot be combined".into(),
            });
        }
        if artifact_a != artifact_b {
            return Err(ArtifactError::InvalidCombination {
                reason: format!("{artifact_a} and {artifact_b} are different artifacts"),
            });
        }
        if !(pages_a & pages_b).is_empty() {
            return Err(ArtifactError::InvalidCombination {
                reason: format!("both items contain {}", pages_a & pages_b),
            });
        }
        Ok((pages_a, pages_b, artifact_a))
    }
}

/// Exact-name classification of one item name against one definition.
fn classify_against(def: &ArtifactDefinition, name: &str) -> Option<PageSet> {
    for (pages, scroll_name) in [
        (PageSet::PAGE_1, &def.scrolls[0]),
        (PageSet::PAGE_2, &def.scrolls[1]),
        (PageSet::PAGE_3, &def.scrolls[2]),
        (PageSet::PAGE_1 | PageSet::PAGE_2, &def.combined_scrolls[0]),
        (PageSet::PAGE_1 | PageSet::PAGE_3, &def.combined_scrolls[1]),
        (PageSet::PAGE_2 | PageSet::PAGE_3, &def.combined_scrolls[2]),
    ] {
        if !scroll_name.is_empty() && name == scroll_name.as_str() {
            return Some(pages);
        }
    }
    if !def.book_id.is_empty() && name.eq_ignore_ascii_case(&def.book_id) {
        return Some(PageSet::ALL);
    }
    None
}

fn mint(def: &ArtifactDefinition, pages: PageSet) -> Option<MintedScroll> {
    let name = def.scroll_name(pages)?;
    Some(MintedScroll {
        artifact_id: def.id.clone(),
        name: name.to_owned(),
        model: def.scroll_model_for(pages),
        price_gold: price_for(pages),
        pages,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ItemInstanceId;

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
            encounter_id: format!("{id}Encounter"),
            quest_id: format!("{id}Quest"),
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

    #[test]
    fn classification_by_exact_name() {
        let engine = engine();
        let (pages, id) = engine
            .page_numbers(&scroll("Battler, Page 2 of 3"))
            .expect("classified");
        assert_eq!(pages, PageSet::PAGE_2);
        assert_eq!(id.as_str(), "Battler");

        let (pages, _) = engine
            .page_numbers(&scroll("Battler, Pages 1 and 3"))
            .expect("classified");
        assert_eq!(pages, PageSet::PAGE_1 | PageSet::PAGE_3);

        let (pages, _) = engine
            .page_numbers(&scroll("battler tale"))
            .expect("book title is case-insensitive");
        assert_eq!(pages, PageSet::ALL);

        assert!(engine.page_numbers(&scroll("Some Random Parchment")).is_none());
    }

    #[test]
    fn non_magical_items_are_never_scrolls() {
        let engine = engine();
        let mut item = scroll("Battler, Page 1 of 3");
        item.magical = false;
        assert!(engine.page_numbers(&item).is_none());
    }

    #[test]
    fn disjoint_pages_combine_to_union() {
        let engine = engine();
        let outcome = engine
            .combine(
                &scroll("Battler, Page 1 of 3"),
                &scroll("Battler, Page 3 of 3"),
            )
            .expect("combine");
        assert_eq!(outcome.item.pages, PageSet::PAGE_1 | PageSet::PAGE_3);
        assert_eq!(outcome.item.name, "Battler, Pages 1 and 3");
        assert_eq!(outcome.item.model, 500);
        assert_eq!(outcome.item.price_gold, 4);
        assert!(!outcome.complete_book);
    }

    #[test]
    fn double_plus_single_completes_the_book() {
        let engine = engine();
        let outcome = engine
            .combine(
                &scroll("Battler, Pages 1 and 2"),
                &scroll("Battler, Page 3 of 3"),
            )
            .expect("combine");
        assert!(outcome.complete_book);
        assert_eq!(outcome.item.pages, PageSet::ALL);
        assert_eq!(outcome.item.name, "Battler Tale");
        assert_eq!(outcome.item.model, 501);
        assert_eq!(outcome.item.price_gold, 5);
    }

    #[test]
    fn overlapping_pages_are_rejected() {
        let engine = engine();
        let err = engine
            .combine(
                &scroll("Battler, Page 1 of 3"),
                &scroll("Battler, Pages 1 and 2"),
            )
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidCombination { .. }));
        assert!(!engine.can_combine(
            &scroll("Battler, Page 1 of 3"),
            &scroll("Battler, Page 1 of 3"),
        ));
    }

    #[test]
    fn book_operands_are_rejected() {
        let engine = engine();
        assert!(!engine.can_combine(
            &scroll("Battler Tale"),
            &scroll("Battler, Page 1 of 3"),
        ));
    }

    #[test]
    fn mismatched_artifacts_are_rejected_even_when_disjoint() {
        let engine = engine();
        let err = engine
            .combine(
                &scroll("Battler, Page 1 of 3"),
                &scroll("Cloudsong, Page 2 of 3"),
            )
            .unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidCombination { .. }));
    }

    #[test]
    fn create_scroll_mints_single_pages_only() {
        let engine = engine();
        let battler = ArtifactId::new("Battler");
        let page = engine.create_scroll(&battler, 2).expect("page 2");
        assert_eq!(page.name, "Battler, Page 2 of 3");
        assert_eq!(page.price_gold, 2);
        assert_eq!(page.model, 499);
        assert!(engine.create_scroll(&battler, 0).is_none());
        assert!(engine.create_scroll(&battler, 4).is_none());
    }

    #[test]
    fn has_book_scans_the_backpack() {
        let engine = engine();
        let battler = ArtifactId::new("Battler");
        let mut inventory = crate::store::MemoryInventory::new(4);
        assert!(!engine.has_book(&inventory, &battler));
        let _ = inventory.insert(scroll("Battler Tale"));
        assert!(engine.has_book(&inventory, &battler));
    }
}
