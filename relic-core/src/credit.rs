//! Encounter credit routing: turning world kill events and delivered
//! credit tokens into encounter-credit grants.
//!
//! A small ordered list of matchers maps a dying NPC's name (and
//! optionally region) onto an artifact id; first match wins. Credit is
//! a no-op for players who already hold finished-credit for the
//! artifact's encounter or activation quest.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::CreditConfig;
use crate::registry::ArtifactRegistry;
use crate::store::QuestHandleResolver;
use crate::types::{ArtifactId, PlayerId};

/// One (artifact, name-matchers, region) entry.
#[derive(Debug, Clone)]
pub struct CreditMatcher {
    /// Artifact whose encounter this entry credits.
    pub artifact_id: ArtifactId,
    /// Candidate NPC names.
    pub names: Vec<String>,
    /// Substring match instead of exact (case-insensitive either way).
    pub fuzzy: bool,
    /// Restrict to one region, if set.
    pub region: Option<u16>,
}

impl CreditMatcher {
    /// Exact-name matcher without a region restriction.
    #[must_use]
    pub fn exact(artifact_id: impl Into<String>, names: &[&str]) -> Self {
        Self {
            artifact_id: ArtifactId::new(artifact_id),
            names: names.iter().map(|n| (*n).to_owned()).collect(),
            fuzzy: false,
            region: None,
        }
    }

    /// Substring matcher, optionally restricted to a region.
    #[must_use]
    pub fn fuzzy(artifact_id: impl Into<String>, names: &[&str], region: Option<u16>) -> Self {
        Self {
            artifact_id: ArtifactId::new(artifact_id),
            names: names.iter().map(|n| (*n).to_owned()).collect(),
            fuzzy: true,
            region,
        }
    }

    /// Whether this entry matches the dying NPC.
    #[must_use]
    pub fn matches(&self, npc_name: &str, region: u16) -> bool {
        if self.region.is_some_and(|r| r != region) {
            return false;
        }
        self.names.iter().any(|candidate| {
            if candidate.trim().is_empty() {
                return false;
            }
            if self.fuzzy {
                npc_name.to_lowercase().contains(&candidate.to_lowercase())
            } else {
                npc_name.eq_ignore_ascii_case(candidate)
            }
        })
    }
}

/// Routes kill events and credit tokens to encounter-credit grants.
pub struct CreditRouter {
    registry: Arc<ArtifactRegistry>,
    quests: Arc<dyn QuestHandleResolver>,
    matchers: Vec<CreditMatcher>,
    config: CreditConfig,
}

impl std::fmt::Debug for CreditRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditRouter")
            .field("matchers", &self.matchers.len())
            .field("radius", &self.config.radius)
            .finish_non_exhaustive()
    }
}

impl CreditRouter {
    /// Router over the given ordered matcher list.
    #[must_use]
    pub fn new(
        registry: Arc<ArtifactRegistry>,
        quests: Arc<dyn QuestHandleResolver>,
        matchers: Vec<CreditMatcher>,
        config: CreditConfig,
    ) -> Self {
        Self {
            registry,
            quests,
            matchers,
            config,
        }
    }

    /// Interaction radius within which players receive credit.
    #[must_use]
    pub fn radius(&self) -> u32 {
        self.config.radius
    }

    /// The artifact credited for a dying NPC, if any matcher applies.
    #[must_use]
    pub fn resolve_npc(&self, npc_name: &str, region: u16) -> Option<ArtifactId> {
        self.matchers
            .iter()
            .find(|m| m.matches(npc_name, region))
            .map(|m| m.artifact_id.clone())
    }

    /// Handle a tracked NPC's death: grant encounter credit to every
    /// nearby player. Returns how many players were newly credited.
    pub fn on_npc_died(&self, npc_name: &str, region: u16, nearby_players: &[PlayerId]) -> usize {
        let Some(artifact_id) = self.resolve_npc(npc_name, region) else {
            return 0;
        };

        let mut credited = 0;
        for player in nearby_players {
            if self.grant_credit(*player, &artifact_id) {
                credited += 1;
            }
        }
        if credited > 0 {
            info!(npc = npc_name, artifact = %artifact_id, credited, "encounter credit granted");
        }
        credited
    }

    /// Grant encounter credit for an artifact directly. No-op (returns
    /// `false`) when the player already holds finished-credit for the
    /// artifact's encounter or activation quest, or when the artifact
    /// or its encounter handle is unknown.
    pub fn grant_credit(&self, player: PlayerId, artifact_id: &ArtifactId) -> bool {
        let Some(definition) = self.registry.get(artifact_id) else {
            return false;
        };
        let Some(encounter) = self.quests.resolve(&definition.encounter_id) else {
            return false;
        };

        if encounter.is_finished_by(player) > 0 {
            return false;
        }
        if let Some(quest) = self.quests.resolve(&definition.quest_id) {
            if quest.is_finished_by(player) > 0 {
                return false;
            }
        }

        encounter.force_complete(player);
        debug!(%player, artifact = %artifact_id, "encounter credit recorded");
        true
    }

    /// Grant credit for a delivered token item: the first artifact
    /// whose `credit_token` equals the item name, if any.
    pub fn grant_token_credit(&self, player: PlayerId, token_name: &str) -> bool {
        let Some(artifact_id) = self.registry.all().into_iter().find_map(|def| {
            def.credit_token
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(token_name))
                .then(|| def.id.clone())
        }) else {
            return false;
        };
        self.grant_credit(player, &artifact_id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
