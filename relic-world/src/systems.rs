//! Per-event processing functions.
//!
//! In a full server integration these run inside the world-simulation
//! tick; here they are standalone functions the host calls with the
//! event and the resolved player. Each returns the chat lines to send.

use relic_core::credit::CreditRouter;
use relic_core::progression::{ExperienceProgression, GrantContext, XpAmounts, XpSource};
use relic_core::registry::ArtifactRegistry;

use crate::components::WorldPlayer;
use crate::scholar::Scholar;

/// Process a tracked NPC death: grant encounter credit to every player
/// within the interaction radius. Returns how many were credited.
pub fn process_npc_death(
    router: &CreditRouter,
    name: &str,
    region: u16,
    nearby: &[relic_core::types::PlayerId],
) -> usize {
    router.on_npc_died(name, region, nearby)
}

/// Process an experience gain: every equipped artifact gains its share.
///
/// Returns the chat lines to send, in order.
pub fn process_experience_gain(
    progression: &ExperienceProgression,
    registry: &ArtifactRegistry,
    player: &mut WorldPlayer,
    amounts: XpAmounts,
    source: XpSource,
) -> Vec<String> {
    let mut lines = Vec::new();
    let ctx = GrantContext {
        source,
        holder_blocked: player.praying,
        guild_bonus: player.guild_artifact_buff,
        rate_override: None,
    };

    for instance in &mut player.equipped {
        let Some(definition) = registry.get(&instance.artifact_id) else {
            continue;
        };
        let outcome = progression.grant_experience(instance, &definition, amounts, ctx);
        if outcome.guild_bonus_applied && outcome.gained > 0 {
            lines.push(format!(
                "Your {} gains additional experience due to your guild's buff!",
                instance.name
            ));
        }
        if outcome.gained > 0 {
            lines.push(format!("Your {} has gained experience.", instance.name));
        }
        for _level in &outcome.levels {
            lines.push(format!("Your {} has gained a level!", instance.name));
        }
    }
    lines
}

/// Process an item handed to a scholar.
pub fn process_item_delivered(
    scholar: &Scholar,
    player: &mut WorldPlayer,
    item: &relic_core::types::ItemSnapshot,
) -> Vec<String> {
    scholar.receive_item(player, item)
}

/// Process a whisper addressed to a scholar.
pub fn process_whisper(scholar: &Scholar, player: &mut WorldPlayer, text: &str) -> Vec<String> {
    scholar.whisper(player, text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use relic_core::config::ProgressionConfig;
    use relic_core::store::MemoryStore;
    use relic_core::types::{
        ArtifactDefinition, ArtifactId, ArtifactInstance, CharacterClass, ItemInstanceId, Realm,
    };

    fn registry_with(id: &str, xp_rate: u32) -> ArtifactRegistry {
        let mut store = MemoryStore::new();
        store.push_artifact(ArtifactDefinition {
            id: ArtifactId::new(id),
            zone: "Stygia".into(),
            book_id: format!("{id} Tale"),
            scrolls: ["a".into(), "b".into(), "c".into()],
            combined_scrolls: ["ab".into(), "ac".into(), "bc".into()],
            scroll_model: 499,
            combined_model: 500,
            book_model: 501,
            xp_rate,
            encounter_id: String::new(),
            quest_id: String::new(),
            scholars: vec![],
            credit_token: None,
        });
        let registry = ArtifactRegistry::new(Arc::new(store));
        registry.load().expect("load");
        registry
    }

    fn equipped(id: &str, xp: u64) -> ArtifactInstance {
        ArtifactInstance {
            id: ItemInstanceId::new(),
            artifact_id: ArtifactId::new(id),
            name: id.into(),
            experience: xp,
            level: relic_core::progression::level_for_xp(xp),
        }
    }

    #[test]
    fn equipped_artifacts_gain_from_kills() {
        let registry = registry_with("Battler", 350);
        let progression = ExperienceProgression::new(ProgressionConfig::default());
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        player.equipped.push(equipped("Battler", 0));

        let amounts = XpAmounts {
            base: 1_000,
            ..Default::default()
        };
        let lines =
            process_experience_gain(&progression, &registry, &mut player, amounts, XpSource::NpcKill);
        assert_eq!(lines, vec!["Your Battler has gained experience.".to_owned()]);
        assert_eq!(player.equipped[0].experience, 1_000);
    }

    #[test]
    fn praying_blocks_artifact_experience() {
        let registry = registry_with("Battler", 350);
        let progression = ExperienceProgression::new(ProgressionConfig::default());
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        player.equipped.push(equipped("Battler", 0));
        player.praying = true;

        let amounts = XpAmounts {
            base: 1_000,
            ..Default::default()
        };
        let lines =
            process_experience_gain(&progression, &registry, &mut player, amounts, XpSource::NpcKill);
        assert!(lines.is_empty());
        assert_eq!(player.equipped[0].experience, 0);
    }

    #[test]
    fn level_crossing_announces_each_level() {
        let registry = registry_with("Battler", 350);
        let progression = ExperienceProgression::new(ProgressionConfig::default());
        let mut player = WorldPlayer::new("Aredhel", CharacterClass(2), Realm::Albion);
        player.equipped.push(equipped("Battler", 199_999_999));

        let amounts = XpAmounts {
            base: 60_000_000,
            ..Default::default()
        };
        let lines =
            process_experience_gain(&progression, &registry, &mut player, amounts, XpSource::PlayerKill);
        let level_ups = lines.iter().filter(|l| l.contains("gained a level")).count();
        assert_eq!(level_ups, 2);
        assert_eq!(player.equipped[0].level, 5);
    }
}
