//! Experience accumulation and leveling for equipped artifacts.
//!
//! All artifacts share one ten-level threshold table; they level at
//! different speeds through a per-artifact rate numerator divided by
//! the globally configured divisor. Accumulated experience never
//! decreases and the level never exceeds [`MAX_LEVEL`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProgressionConfig;
use crate::types::{ArtifactDefinition, ArtifactInstance};

/// The artifact level cap.
pub const MAX_LEVEL: u8 = 10;

/// Experience required to reach each level; index 0 is level 0.
pub const XP_FOR_LEVEL: [u64; 11] = [
    0,
    50_000_000,
    100_000_000,
    150_000_000,
    200_000_000,
    250_000_000,
    300_000_000,
    350_000_000,
    400_000_000,
    450_000_000,
    500_000_000,
];

/// Where an experience gain came from. Artifacts only gain experience
/// on player and NPC kills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum XpSource {
    /// Killing an enemy player.
    PlayerKill,
    /// Killing an NPC.
    NpcKill,
    /// Anything else (quests, tasks, crafting, ...).
    Other,
}

impl XpSource {
    /// Whether this source qualifies for artifact experience.
    #[must_use]
    pub fn qualifies(self) -> bool {
        matches!(self, Self::PlayerKill | Self::NpcKill)
    }
}

/// The experience components of one kill, as supplied by the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct XpAmounts {
    /// Base kill experience.
    pub base: u64,
    /// Camp bonus.
    pub camp: u64,
    /// Group bonus.
    pub group: u64,
    /// Outpost bonus.
    pub outpost: u64,
}

impl XpAmounts {
    /// Sum of all components.
    #[must_use]
    pub fn total(self) -> u64 {
        self.base + self.camp + self.group + self.outpost
    }
}

/// Per-grant context supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct GrantContext {
    /// Source of the experience gain.
    pub source: XpSource,
    /// Whether the holder is currently in a state that forbids artifact
    /// experience gain (e.g. praying).
    pub holder_blocked: bool,
    /// Whether the holder's guild carries the artifact-XP buff.
    pub guild_bonus: bool,
    /// Per-grant override of the artifact's rate numerator.
    pub rate_override: Option<u32>,
}

/// Result of one experience grant.
#[derive(Debug, Clone, Default)]
pub struct GrantOutcome {
    /// Experience actually added to the instance.
    pub gained: u64,
    /// Levels crossed by this grant, ascending; the caller fires one
    /// notification per entry.
    pub levels: Vec<u8>,
    /// Whether the guild bonus was applied.
    pub guild_bonus_applied: bool,
}

impl GrantOutcome {
    /// Whether this grant crossed at least one level.
    #[must_use]
    pub fn leveled_up(&self) -> bool {
        !self.levels.is_empty()
    }
}

/// Level derived from a total experience value.
#[must_use]
pub fn level_for_xp(xp: u64) -> u8 {
    let mut level = 0;
    for (candidate, threshold) in XP_FOR_LEVEL.iter().enumerate().rev() {
        if xp >= *threshold {
            level = candidate;
            break;
        }
    }
    u8::try_from(level).unwrap_or(MAX_LEVEL)
}

/// Percent progress toward the instance's next level; 0 at the cap.
#[must_use]
pub fn progress_percent(instance: &ArtifactInstance) -> u8 {
    let level = usize::from(level_for_xp(instance.experience));
    if level >= usize::from(MAX_LEVEL) {
        return 0;
    }
    let floor = XP_FOR_LEVEL[level];
    let ceiling = XP_FOR_LEVEL[level + 1];
    let gained = instance.experience - floor;
    u8::try_from(gained * 100 / (ceiling - floor)).unwrap_or(100)
}

/// The experience progression engine.
#[derive(Debug, Clone, Default)]
pub struct ExperienceProgression {
    config: ProgressionConfig,
}

impl ExperienceProgression {
    /// Engine over the given rate configuration.
    #[must_use]
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    /// Grant experience from one kill to an equipped artifact instance.
    ///
    /// No-op (empty outcome) when the source does not qualify or the
    /// holder is blocked. When the instance already sits at the top
    /// threshold, no experience is added and any pending level gains
    /// are flushed instead, one entry per level, ascending.
    pub fn grant_experience(
        &self,
        instance: &mut ArtifactInstance,
        definition: &ArtifactDefinition,
        amounts: XpAmounts,
        ctx: GrantContext,
    ) -> GrantOutcome {
        let mut outcome = GrantOutcome::default();

        if !ctx.source.qualifies() || ctx.holder_blocked {
            return outcome;
        }

        let old_xp = instance.experience;

        // Already at the top threshold: flush pending levels, add nothing.
        if old_xp >= XP_FOR_LEVEL[usize::from(MAX_LEVEL)] {
            while instance.level < MAX_LEVEL {
                instance.level += 1;
                outcome.levels.push(instance.level);
            }
            return outcome;
        }

        let mut total = amounts.total();
        if ctx.guild_bonus {
            total += total * u64::from(self.config.guild_bonus_percent) / 100;
            outcome.guild_bonus_applied = true;
        }

        let rate = u64::from(ctx.rate_override.unwrap_or(definition.xp_rate));
        let divisor = u64::from(self.config.xp_rate_divisor.max(1));
        let gained = total * rate / divisor;

        let new_xp = old_xp + gained;
        instance.experience = new_xp;
        outcome.gained = gained;

        for level in 1..=usize::from(MAX_LEVEL) {
            if new_xp < XP_FOR_LEVEL[level] {
                break;
            }
            if old_xp >= XP_FOR_LEVEL[level] {
                continue;
            }
            let level = u8::try_from(level).unwrap_or(MAX_LEVEL);
            instance.level = instance.level.max(level);
            outcome.levels.push(level);
        }

        debug!(
            artifact = %instance.artifact_id,
            gained,
            total = instance.experience,
            levels = outcome.levels.len(),
            "artifact experience granted"
        );
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
