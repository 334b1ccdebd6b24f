//! The scholars handing out the artifacts.
//!
//! A scholar routes player interactions into the core engines: items
//! are tried against an active turn-in session first (version swap),
//! then as an encounter-credit token, then as a completed book;
//! whispers are tried against the pending negotiation choice. Every
//! path returns the lines the scholar speaks.

use std::sync::Arc;

use tracing::{error, warn};

use relic_core::credit::CreditRouter;
use relic_core::registry::ArtifactRegistry;
use relic_core::scrolls::ScrollCombinationEngine;
use relic_core::store::Inventory;
use relic_core::turnin::{TurnInEngine, TurnInReply};
use relic_core::types::ItemSnapshot;
use relic_core::ArtifactError;

use crate::components::WorldPlayer;

const BACKPACK_FULL: &str =
    "Your backpack is full, please make some room and try again.";

/// One artifact scholar NPC.
pub struct Scholar {
    /// Display name, e.g. `"Artifact Scholar Jarron"`.
    pub name: String,
    registry: Arc<ArtifactRegistry>,
    turnin: Arc<TurnInEngine>,
    scrolls: Arc<ScrollCombinationEngine>,
    credit: Arc<CreditRouter>,
}

impl std::fmt::Debug for Scholar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scholar").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Scholar {
    /// A scholar wired to the core engines.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        registry: Arc<ArtifactRegistry>,
        turnin: Arc<TurnInEngine>,
        scrolls: Arc<ScrollCombinationEngine>,
        credit: Arc<CreditRouter>,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            turnin,
            scrolls,
            credit,
        }
    }

    /// The artifacts this scholar studies (those listing their name),
    /// sorted for a stable listing.
    #[must_use]
    pub fn studied(&self) -> Vec<String> {
        let short = self.short_name();
        let mut studied: Vec<String> = self
            .registry
            .all()
            .into_iter()
            .filter(|def| def.scholars.iter().any(|s| s.eq_ignore_ascii_case(short)))
            .map(|def| def.id.to_string())
            .collect();
        studied.sort();
        studied
    }

    fn short_name(&self) -> &str {
        self.name.rsplit(' ').next().unwrap_or(&self.name)
    }

    /// Handle a player right-clicking the scholar.
    pub fn interact(&self, player: &WorldPlayer) -> Vec<String> {
        // Mid-negotiation, repeat the pending options instead of the
        // artifact list.
        match self.turnin.current_prompt(&player.info) {
            Ok(Some(TurnInReply::Prompt { message, .. })) => {
                return vec![
                    "Choose the options I mentioned earlier and I shall begin.".into(),
                    message,
                ];
            }
            Ok(_) => {}
            Err(err) => {
                error!(scholar = %self.name, %err, "failed to load turn-in session");
            }
        }

        let studied = self.studied();
        if studied.is_empty() {
            return vec!["I have no artifacts available for your class.".into()];
        }

        let list = studied
            .iter()
            .map(|id| format!("[{id}]"))
            .collect::<Vec<_>>()
            .join(", ");
        vec![
            format!(
                "Which artifact may I assist you with, {}? I study the lore and magic of the following artifacts: {list}.",
                player.info.name
            ),
            format!(
                "{}, did you find any of the stories that chronicle the powers of the artifacts? We can unlock the powers of these artifacts by studying the stories. I can take the story and unlock the artifact's magic.",
                player.info.name
            ),
        ]
    }

    /// Handle an item handed to the scholar.
    pub fn receive_item(&self, player: &mut WorldPlayer, item: &ItemSnapshot) -> Vec<String> {
        // 1) An owned artifact opens (or is rejected by) a version-swap
        //    negotiation.
        match self
            .turnin
            .deliver_artifact(&player.info, &self.name, item, &mut player.backpack)
        {
            Ok(TurnInReply::NotHandled) => {}
            other => return self.lines_for(other),
        }

        // 2) Encounter-credit token.
        if self.credit.grant_token_credit(player.info.id, &item.name) {
            player.backpack.remove_item(item.instance);
            return vec!["Your encounter credit has been recorded.".into()];
        }

        // 3) A completed book starts the turn-in proper.
        if self.scrolls.book_artifact(item).is_some()
            || self.registry.resolve_book_title(&item.name).is_some()
        {
            let reply = self
                .turnin
                .deliver_book(&player.info, &self.name, item, &mut player.backpack);
            return self.lines_for(reply);
        }

        vec![format!("{} doesn't want that item.", self.name)]
    }

    /// Handle a whispered reply or a clicked option.
    pub fn whisper(&self, player: &mut WorldPlayer, text: &str) -> Vec<String> {
        match self
            .turnin
            .receive_choice(&player.info, text, &mut player.backpack)
        {
            Ok(TurnInReply::NotHandled) => {}
            other => return self.lines_for(other),
        }

        // Not a pending choice; maybe the player named an artifact.
        if let Some(artifact_id) = self.registry.resolve_name(text) {
            if self.scrolls.has_book(&player.backpack, &artifact_id) {
                return vec![format!(
                    "Hand me the completed story of {artifact_id} and I shall begin."
                )];
            }
            return vec![format!(
                "{} I cannot activate that artifact for you. Remember that the activation process requires you to have credit for the artifact's encounter, as well as the artifact's complete book of scrolls.",
                player.info.name
            )];
        }

        Vec::new()
    }

    fn lines_for(&self, reply: relic_core::error::Result<TurnInReply>) -> Vec<String> {
        match reply {
            Ok(TurnInReply::Granted { message, .. })
            | Ok(TurnInReply::Prompt { message, .. })
            | Ok(TurnInReply::Refused { message }) => vec![message],
            Ok(TurnInReply::NotHandled) => Vec::new(),
            Err(ArtifactError::CapacityExceeded { .. }) => vec![BACKPACK_FULL.into()],
            Err(err) => {
                warn!(scholar = %self.name, %err, "turn-in failed");
                vec![
                    "I'm very sorry but I'm having trouble locating an artifact for you. Please /report this problem to my superiors.".into(),
                ]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use relic_core::config::CreditConfig;
    use relic_core::store::{
        FlagQuest, MemoryPropertyStore, MemoryStore, QuestHandle, QuestTable,
    };
    use relic_core::types::{
        ArtifactDefinition, ArtifactId, ArtifactVersionRow, CharacterClass, ItemInstanceId,
        ItemTemplate, Realm, RealmFilter, VersionKey,
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
            encounter_id: format!("{id}Encounter"),
            quest_id: format!("{id}Quest"),
            scholars: vec!["Jarron".into()],
            credit_token: Some(format!("{id} Remnant")),
        }
    }

    struct Fixture {
        scholar: Scholar,
        encounter: Arc<FlagQuest>,
    }

    fn fixture() -> Fixture {
        let mut store = MemoryStore::new();
        store.push_artifact(definition("Battler"));
        for (key, item) in [
            ("Slash;Polearm", "battler_slash_polearm"),
            ("Thrust;Polearm", "battler_thrust_polearm"),
        ] {
            store.push_version(ArtifactVersionRow {
                artifact_id: ArtifactId::new("Battler"),
                version: VersionKey::new(key),
                item_id: item.into(),
                realm: RealmFilter::ANY,
            });
            store.push_template(ItemTemplate {
                id: item.into(),
                name: format!("Battler ({key})"),
                allowed_classes: vec![],
                model: 1,
            });
        }

        let registry = Arc::new(ArtifactRegistry::new(Arc::new(store)));
        registry.load().expect("load");

        let properties = Arc::new(MemoryPropertyStore::new());
        let quests = Arc::new(QuestTable::new());
        let encounter = Arc::new(FlagQuest::new());
        quests.register("BattlerEncounter", encounter.clone());
        quests.register("BattlerQuest", Arc::new(FlagQuest::new()));

        let turnin = Arc::new(TurnInEngine::new(
            registry.clone(),
            properties,
            quests.clone(),
        ));
        let scrolls = Arc::new(ScrollCombinationEngine::new(registry.clone()));
        let credit = Arc::new(CreditRouter::new(
            registry.clone(),
            quests,
            vec![],
            CreditConfig::default(),
        ));

        Fixture {
            scholar: Scholar::new(
                "Artifact Scholar Jarron",
                registry,
                turnin,
                scrolls,
                credit,
            ),
            encounter,
        }
    }

    fn book(name: &str) -> ItemSnapshot {
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
    fn interact_lists_studied_artifacts() {
        let fx = fixture();
        let player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        let lines = fx.scholar.interact(&player);
        assert!(lines[0].contains("[Battler]"), "got {lines:?}");
    }

    #[test]
    fn credit_token_is_consumed_and_recorded() {
        let fx = fixture();
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        let token = book("Battler Remnant");
        let _ = player.backpack.insert(token.clone());

        let lines = fx.scholar.receive_item(&mut player, &token);
        assert_eq!(lines, vec!["Your encounter credit has been recorded.".to_owned()]);
        assert!(player.backpack.items().is_empty(), "token consumed");
        assert_eq!(fx.encounter.is_finished_by(player.info.id), 1);
    }

    #[test]
    fn book_delivery_runs_the_negotiation_end_to_end() {
        let fx = fixture();
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        fx.encounter.force_complete(player.info.id);

        let delivered = book("Battler Tale");
        let _ = player.backpack.insert(delivered.clone());
        let lines = fx.scholar.receive_item(&mut player, &delivered);
        assert!(lines[0].contains("[Slash]"), "got {lines:?}");
        assert!(lines[0].contains("[Thrust]"));

        // Interacting mid-negotiation repeats the options.
        let lines = fx.scholar.interact(&player);
        assert!(lines.iter().any(|l| l.contains("[Slash]")), "got {lines:?}");

        let lines = fx.scholar.whisper(&mut player, "Thrust");
        assert!(lines[0].contains("May it serve you well"), "got {lines:?}");
        assert_eq!(player.backpack.items().len(), 1, "book swapped for the item");
        assert_eq!(player.backpack.items()[0].name, "Battler (Thrust;Polearm)");
    }

    #[test]
    fn junk_items_are_politely_declined() {
        let fx = fixture();
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        let junk = book("A Moldy Loaf");
        let _ = player.backpack.insert(junk.clone());
        let lines = fx.scholar.receive_item(&mut player, &junk);
        assert_eq!(
            lines,
            vec!["Artifact Scholar Jarron doesn't want that item.".to_owned()]
        );
        assert_eq!(player.backpack.items().len(), 1, "item stays");
    }

    #[test]
    fn whispering_an_artifact_name_without_the_book() {
        let fx = fixture();
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        let lines = fx.scholar.whisper(&mut player, "Battler");
        assert!(
            lines[0].contains("cannot activate that artifact"),
            "got {lines:?}"
        );

        let _ = player.backpack.insert(book("Battler Tale"));
        let lines = fx.scholar.whisper(&mut player, "Battler");
        assert!(lines[0].contains("Hand me the completed story"), "got {lines:?}");
    }
}
