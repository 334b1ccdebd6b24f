//! The turn-in negotiation: a per-player, persisted state machine that
//! narrows a combinatorial set of item variants down to one concrete
//! item through successive player choices.
//!
//! A session is created when a player delivers a completed book (or an
//! owned artifact, for a version swap) that maps to ≥2 eligible
//! versions. Each round compares one position of the candidates'
//! version keys: a single distinct value is appended silently, two or
//! more are presented as a choice, and the player's reply narrows the
//! candidate set. Books with exactly one eligible version bypass the
//! choice state entirely and grant immediately.
//!
//! Sessions survive disconnects through the generic quest-property
//! store and are reloaded verbatim; a corrupt round index resets the
//! session to round 0 with cleared choices instead of failing.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ArtifactError, Result};
use crate::registry::{ArtifactRegistry, VersionChoice};
use crate::store::{Inventory, QuestHandleResolver, QuestPropertyStore};
use crate::types::{
    ArtifactDefinition, ArtifactId, ArtifactInstance, ArtifactState, ItemInstanceId, ItemSnapshot,
    PlayerInfo, VersionKey,
};

/// The maximum number of discriminating rounds.
pub const MAX_ROUNDS: u8 = 3;

/// Session name under which properties are stored.
const SESSION: &str = "ArtifactTurnIn";

// Property keys. Opaque to everything but this module.
const PROP_ARTIFACT: &str = "Art";
const PROP_SCHOLAR: &str = "SN";
const PROP_STEP: &str = "Step";
const PROP_ROUND: &str = "VS";
const PROP_CHOSEN: &str = "Chosen";
const PROP_TYPES: &str = "Types";
const PROP_BOOK: &str = "Book";
const PROP_XP: &str = "AXP";
const PROP_LEVEL: &str = "ALevel";

// ---------------------------------------------------------------------------
// Session model
// ---------------------------------------------------------------------------

/// Negotiation states. Serialized as the step codes `0`, `1`, `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the player to hand over a book or artifact.
    AwaitingItem,
    /// Waiting for the player to pick one of the presented labels.
    AwaitingChoice,
    /// Terminal; the session is removed from the active set.
    Finished,
}

impl SessionState {
    fn code(self) -> i8 {
        match self {
            Self::AwaitingItem => 0,
            Self::AwaitingChoice => 1,
            Self::Finished => -1,
        }
    }

    fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::AwaitingItem),
            1 => Some(Self::AwaitingChoice),
            -1 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// One remaining candidate version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The version key whose tokens drive the rounds.
    pub key: VersionKey,
    /// Item template granted if this candidate wins.
    pub item_id: String,
}

/// Reference to the delivered book, for deferred removal by exact
/// object identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookRef {
    /// Instance identity of the delivered book.
    pub instance: ItemInstanceId,
    /// Backpack slot it occupied at delivery.
    pub slot: i32,
}

/// A persisted negotiation session, exclusively owned by one player.
#[derive(Debug, Clone)]
pub struct TurnInSession {
    /// Artifact under negotiation.
    pub artifact_id: ArtifactId,
    /// Scholar display name, for prompts.
    pub scholar: String,
    /// Current state.
    pub state: SessionState,
    /// Current round index, 0-based, capped at [`MAX_ROUNDS`].
    pub round: u8,
    /// Accumulated chosen prefix, `;`-terminated per round.
    pub chosen: String,
    /// Remaining candidate versions.
    pub candidates: Vec<Candidate>,
    /// The delivered book, removed only after a successful grant.
    pub pending_book: Option<BookRef>,
    /// Progress to restore on the granted item (version-swap path).
    pub restored: Option<ArtifactState>,
}

impl TurnInSession {
    /// Distinct non-empty attribute values at the current round, in
    /// order of first appearance.
    #[must_use]
    pub fn current_options(&self) -> Vec<String> {
        let mut options: Vec<String> = Vec::new();
        for candidate in &self.candidates {
            let Some(token) = candidate.key.token_at(usize::from(self.round)) else {
                continue;
            };
            if token.is_empty() {
                continue;
            }
            if !options.iter().any(|o| o.eq_ignore_ascii_case(token)) {
                options.push(token.to_owned());
            }
        }
        options
    }
}

/// What one round advance produced.
enum RoundOutcome {
    /// ≥2 distinct values at this round; present them.
    Present(Vec<String>),
    /// Exactly one candidate remains.
    Complete(Candidate),
    /// Zero candidates, or the round cap was hit without a winner.
    NoWinner,
}

/// A reply to hand back to the interacting player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnInReply {
    /// The item was granted; the session is finished.
    Granted {
        /// Display name of the granted item.
        item: String,
        /// Scholar line to show the player.
        message: String,
    },
    /// A choice is pending.
    Prompt {
        /// Scholar line to show the player.
        message: String,
        /// The labels the next reply must match (case-insensitive).
        choices: Vec<String>,
    },
    /// The delivery or choice was declined; state is unchanged.
    Refused {
        /// Scholar line to show the player.
        message: String,
    },
    /// Not addressed to this engine; other handlers may continue.
    NotHandled,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The turn-in negotiation engine.
pub struct TurnInEngine {
    registry: Arc<ArtifactRegistry>,
    properties: Arc<dyn QuestPropertyStore>,
    quests: Arc<dyn QuestHandleResolver>,
}

impl std::fmt::Debug for TurnInEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnInEngine").finish_non_exhaustive()
    }
}

impl TurnInEngine {
    /// Engine over a loaded registry, a property store and the quest
    /// handle registration table.
    #[must_use]
    pub fn new(
        registry: Arc<ArtifactRegistry>,
        properties: Arc<dyn QuestPropertyStore>,
        quests: Arc<dyn QuestHandleResolver>,
    ) -> Self {
        Self {
            registry,
            properties,
            quests,
        }
    }

    /// Whether the player qualifies for a version-swap turn-in: they
    /// carry at least one artifact with more than one eligible version.
    ///
    /// # Errors
    /// Propagates store errors.
    pub fn eligible(&self, player: &PlayerInfo, inventory: &dyn Inventory) -> Result<bool> {
        for artifact in self.registry.artifacts_carried(inventory) {
            let versions = self
                .registry
                .versions_for(&artifact, player.class, player.realm)?;
            if versions.len() > 1 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Deliveries
    // -----------------------------------------------------------------------

    /// Handle a completed book handed to a scholar.
    ///
    /// # Errors
    /// [`ArtifactError::CapacityExceeded`] when the single eligible
    /// version does not fit the inventory; the book stays put and the
    /// delivery may be retried. Store errors propagate.
    pub fn deliver_book(
        &self,
        player: &PlayerInfo,
        scholar: &str,
        item: &ItemSnapshot,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        let Some(artifact_id) = self.registry.resolve_book_title(&item.name) else {
            warn!(book = %item.name, "book title did not resolve to any artifact");
            return Ok(TurnInReply::Refused {
                message: "Something went wrong with that book. Please try again.".into(),
            });
        };

        if let Some(session) = self.load_session(player)? {
            if session.state == SessionState::AwaitingChoice {
                // Never overwrite a pending negotiation.
                let options = session.current_options();
                return Ok(TurnInReply::Refused {
                    message: format!(
                        "Finish choosing first. Your options are: {}",
                        bracket_list(&options)
                    ),
                });
            }
        }

        let Some(definition) = self.registry.get(&artifact_id) else {
            return Ok(TurnInReply::Refused {
                message: "Something went wrong with that book. Please try again.".into(),
            });
        };

        // A loose page can name-resolve to the artifact; only the
        // completed book is accepted here.
        if is_partial_scroll(&definition, &item.name) {
            return Ok(TurnInReply::Refused {
                message: "That is only part of the story. Combine the scrolls into the complete book and I shall begin.".into(),
            });
        }

        // The encounter must already be beaten; the book alone is not
        // enough.
        if let Some(encounter) = self.quests.resolve(&definition.encounter_id) {
            if encounter.is_finished_by(player.id) == 0 {
                return Ok(TurnInReply::Refused {
                    message: "You still need the encounter credit for this artifact.".into(),
                });
            }
        }

        let versions = self
            .registry
            .versions_for(&artifact_id, player.class, player.realm)?;

        match versions.len() {
            0 => Ok(TurnInReply::Refused {
                message: "I can't seem to find a matching version of that artifact.".into(),
            }),
            1 => {
                let template = &versions[0].template;
                if !inventory.receive_item(template) {
                    return Err(ArtifactError::CapacityExceeded {
                        item: template.name.clone(),
                    });
                }
                inventory.remove_item(item.instance);
                self.complete_activation(player, &definition.quest_id);
                info!(player = %player.name, artifact = %artifact_id, "book turned in, single version granted");
                Ok(TurnInReply::Granted {
                    item: template.name.clone(),
                    message: well_served(&template.name, &player.name),
                })
            }
            _ => self.open_session(
                player,
                scholar,
                artifact_id,
                versions,
                Some(BookRef {
                    instance: item.instance,
                    slot: item.slot,
                }),
                None,
                inventory,
            ),
        }
    }

    /// Handle an owned artifact handed over for a version swap. The
    /// artifact is taken immediately; its progress is restored onto the
    /// replacement when the negotiation completes.
    ///
    /// # Errors
    /// Store errors propagate.
    pub fn deliver_artifact(
        &self,
        player: &PlayerInfo,
        scholar: &str,
        item: &ItemSnapshot,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        let Some(artifact_id) = self.registry.artifact_id_for_item(&item.template_id) else {
            return Ok(TurnInReply::NotHandled);
        };

        if let Some(session) = self.load_session(player)? {
            if session.state == SessionState::AwaitingChoice {
                return Ok(TurnInReply::Refused {
                    message: format!("{scholar} doesn't want that item."),
                });
            }
        }

        let versions = self
            .registry
            .versions_for(&artifact_id, player.class, player.realm)?;
        if versions.len() < 2 {
            return Ok(TurnInReply::NotHandled);
        }

        let restored = item.artifact.unwrap_or(ArtifactState {
            experience: 0,
            level: 0,
        });
        inventory.remove_item(item.instance);
        self.open_session(
            player,
            scholar,
            artifact_id,
            versions,
            None,
            Some(restored),
            inventory,
        )
    }

    /// Handle a whispered reply while a choice is pending. Text that
    /// matches no presented label is left for other handlers.
    ///
    /// # Errors
    /// [`ArtifactError::CapacityExceeded`] when the final grant does
    /// not fit; session state is unchanged and the identical choice
    /// may be retried. Store errors propagate.
    pub fn receive_choice(
        &self,
        player: &PlayerInfo,
        text: &str,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        let Some(session) = self.load_session(player)? else {
            return Ok(TurnInReply::NotHandled);
        };
        if session.state != SessionState::AwaitingChoice {
            return Ok(TurnInReply::NotHandled);
        }

        let options = session.current_options();
        let submitted = text.trim();
        let Some(choice) = options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(submitted))
            .cloned()
        else {
            return Ok(TurnInReply::NotHandled);
        };

        // Narrow on a scratch copy; nothing is persisted until the
        // grant succeeds or the next prompt is ready, so a failed grant
        // reissues the identical choice set.
        let mut narrowed = session.clone();
        let round = usize::from(narrowed.round);
        narrowed
            .candidates
            .retain(|c| c.key.token_at(round).is_some_and(|t| t.eq_ignore_ascii_case(&choice)));
        narrowed.chosen.push_str(&choice);
        narrowed.chosen.push(';');
        narrowed.round += 1;
        debug!(player = %player.name, %choice, remaining = narrowed.candidates.len(), "turn-in choice accepted");

        self.advance(player, narrowed, inventory)
    }

    /// Re-issue the current prompt, e.g. when the player interacts with
    /// the scholar mid-negotiation.
    ///
    /// # Errors
    /// Store errors propagate.
    pub fn current_prompt(&self, player: &PlayerInfo) -> Result<Option<TurnInReply>> {
        let Some(session) = self.load_session(player)? else {
            return Ok(None);
        };
        if session.state != SessionState::AwaitingChoice {
            return Ok(None);
        }
        let options = session.current_options();
        Ok(Some(TurnInReply::Prompt {
            message: format!(
                "Would you prefer {} of {}?",
                option_sentence(&options),
                session.artifact_id
            ),
            choices: options,
        }))
    }

    /// The player's persisted session, if any.
    ///
    /// # Errors
    /// Store errors propagate.
    pub fn active_session(&self, player: &PlayerInfo) -> Result<Option<TurnInSession>> {
        self.load_session(player)
    }

    // -----------------------------------------------------------------------
    // Round machinery
    // -----------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn open_session(
        &self,
        player: &PlayerInfo,
        scholar: &str,
        artifact_id: ArtifactId,
        versions: Vec<VersionChoice>,
        pending_book: Option<BookRef>,
        restored: Option<ArtifactState>,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        let candidates = versions
            .into_iter()
            .map(|v| Candidate {
                key: v.key,
                item_id: v.template.id,
            })
            .collect();

        let session = TurnInSession {
            artifact_id,
            scholar: scholar.to_owned(),
            state: SessionState::AwaitingChoice,
            round: 0,
            chosen: String::new(),
            candidates,
            pending_book,
            restored,
        };
        self.advance(player, session, inventory)
    }

    /// Advance a session through silently-skipped rounds, then either
    /// present, grant, or fail safely. Persists the session except when
    /// the grant succeeds (which clears it) or fails on capacity (which
    /// leaves the previous persisted state untouched).
    fn advance(
        &self,
        player: &PlayerInfo,
        mut session: TurnInSession,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        match step_rounds(&mut session) {
            RoundOutcome::Present(options) => {
                self.save_session(player, &session)?;
                Ok(TurnInReply::Prompt {
                    message: format!(
                        "Would you prefer {} of {}?",
                        option_sentence(&options),
                        session.artifact_id
                    ),
                    choices: options,
                })
            }
            RoundOutcome::Complete(candidate) => self.grant(player, session, &candidate, inventory),
            RoundOutcome::NoWinner => {
                let err = ArtifactError::AmbiguousNoWinner {
                    artifact: session.artifact_id.clone(),
                    rounds: session.round,
                };
                warn!(player = %player.name, %err, "turn-in could not narrow to a single version");
                self.save_session(player, &session)?;
                Ok(TurnInReply::Refused {
                    message: "I'm sorry, but I can't seem to find a matching version of that artifact for you.".into(),
                })
            }
        }
    }

    fn grant(
        &self,
        player: &PlayerInfo,
        session: TurnInSession,
        candidate: &Candidate,
        inventory: &mut dyn Inventory,
    ) -> Result<TurnInReply> {
        let Some(template) = self.registry.item_template(&candidate.item_id)? else {
            warn!(item = %candidate.item_id, "winning version template is missing");
            return Ok(TurnInReply::Refused {
                message: "Something went wrong while creating the artifact. Please try again."
                    .into(),
            });
        };

        let received = match session.restored {
            Some(state) => inventory.receive_artifact(ArtifactInstance {
                id: ItemInstanceId::new(),
                artifact_id: session.artifact_id.clone(),
                name: template.name.clone(),
                experience: state.experience,
                level: state.level,
            }),
            None => inventory.receive_item(&template),
        };
        if !received {
            return Err(ArtifactError::CapacityExceeded {
                item: template.name.clone(),
            });
        }

        // Remove the book only if it is still the very same instance;
        // a stacked duplicate by the same name must survive.
        if let Some(book) = session.pending_book {
            let matches = inventory
                .find_by_slot(book.slot)
                .is_some_and(|i| i.instance == book.instance);
            if matches {
                inventory.remove_item(book.instance);
            }
        }

        if let Some(definition) = self.registry.get(&session.artifact_id) {
            self.complete_activation(player, &definition.quest_id);
        }

        // The choice set dies with the grant: a second submission finds
        // no session and is rejected.
        self.clear_session(player)?;
        info!(player = %player.name, artifact = %session.artifact_id, item = %template.name, "turn-in finished");

        Ok(TurnInReply::Granted {
            item: template.name.clone(),
            message: well_served(&template.name, &player.name),
        })
    }

    /// Force-complete a still-open activation quest for the same
    /// artifact so its journal entry disappears.
    fn complete_activation(&self, player: &PlayerInfo, quest_id: &str) {
        if let Some(handle) = self.quests.resolve(quest_id) {
            if handle.is_finished_by(player.id) == 0 {
                handle.force_complete(player.id);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn save_session(&self, player: &PlayerInfo, session: &TurnInSession) -> Result<()> {
        let set = |key: &str, value: &str| self.properties.set(player.id, SESSION, key, value);

        set(PROP_ARTIFACT, session.artifact_id.as_str())?;
        set(PROP_SCHOLAR, &session.scholar)?;
        set(PROP_STEP, &session.state.code().to_string())?;
        set(PROP_ROUND, &session.round.to_string())?;
        set(PROP_CHOSEN, &session.chosen)?;

        let types = session
            .candidates
            .iter()
            .map(|c| format!("{}={}", c.item_id, c.key))
            .collect::<Vec<_>>()
            .join("|");
        set(PROP_TYPES, &types)?;

        match session.pending_book {
            Some(book) => set(PROP_BOOK, &format!("{}:{}", book.instance, book.slot))?,
            None => self.properties.remove(player.id, SESSION, PROP_BOOK)?,
        }
        match session.restored {
            Some(state) => {
                set(PROP_XP, &state.experience.to_string())?;
                set(PROP_LEVEL, &state.level.to_string())?;
            }
            None => {
                self.properties.remove(player.id, SESSION, PROP_XP)?;
                self.properties.remove(player.id, SESSION, PROP_LEVEL)?;
            }
        }
        Ok(())
    }

    fn load_session(&self, player: &PlayerInfo) -> Result<Option<TurnInSession>> {
        let get = |key: &str| self.properties.get(player.id, SESSION, key);

        let Some(artifact) = get(PROP_ARTIFACT)? else {
            return Ok(None);
        };
        let artifact_id = ArtifactId::new(artifact);

        let scholar = get(PROP_SCHOLAR)?.unwrap_or_default();
        let state = get(PROP_STEP)?
            .and_then(|s| s.parse::<i8>().ok())
            .and_then(SessionState::from_code)
            .unwrap_or(SessionState::AwaitingChoice);
        let chosen = get(PROP_CHOSEN)?.unwrap_or_default();

        let mut candidates: Vec<Candidate> = Vec::new();
        if let Some(types) = get(PROP_TYPES)? {
            for entry in types.split('|').filter(|e| !e.trim().is_empty()) {
                if let Some((item_id, key)) = entry.split_once('=') {
                    candidates.push(Candidate {
                        key: VersionKey::new(key),
                        item_id: item_id.to_owned(),
                    });
                }
            }
        }

        let pending_book = get(PROP_BOOK)?.and_then(|raw| {
            let (id, slot) = raw.split_once(':')?;
            Some(BookRef {
                instance: ItemInstanceId(id.parse().ok()?),
                slot: slot.parse().ok()?,
            })
        });

        let restored = match (get(PROP_XP)?, get(PROP_LEVEL)?) {
            (Some(xp), Some(level)) => Some(ArtifactState {
                experience: xp.parse().unwrap_or(0),
                level: level.parse().unwrap_or(0),
            }),
            _ => None,
        };

        let mut session = TurnInSession {
            artifact_id,
            scholar,
            state,
            round: 0,
            chosen,
            candidates,
            pending_book,
            restored,
        };

        // A mangled round index resets the round state instead of
        // poisoning the session.
        match get(PROP_ROUND)?.and_then(|v| v.parse::<u8>().ok()) {
            Some(round) if round <= MAX_ROUNDS => session.round = round,
            _ => {
                warn!(player = %player.name, artifact = %session.artifact_id, "corrupt round index, resetting session rounds");
                session.round = 0;
                session.chosen.clear();
                session.candidates = self
                    .registry
                    .versions_for(&session.artifact_id, player.class, player.realm)?
                    .into_iter()
                    .map(|v| Candidate {
                        key: v.key,
                        item_id: v.template.id,
                    })
                    .collect();
                self.save_session(player, &session)?;
            }
        }

        Ok(Some(session))
    }

    fn clear_session(&self, player: &PlayerInfo) -> Result<()> {
        self.properties.delete_session(player.id, SESSION)
    }
}

// ---------------------------------------------------------------------------
// Round stepping (pure)
// ---------------------------------------------------------------------------

/// Advance through rounds that need no player input. Single-value
/// rounds are appended silently; empty rounds advance with a bare `;`.
fn step_rounds(session: &mut TurnInSession) -> RoundOutcome {
    loop {
        if session.candidates.is_empty() {
            return RoundOutcome::NoWinner;
        }
        if session.candidates.len() == 1 {
            return RoundOutcome::Complete(session.candidates[0].clone());
        }
        if session.round >= MAX_ROUNDS {
            return RoundOutcome::NoWinner;
        }

        let options = session.current_options();
        match options.len() {
            0 => {
                session.chosen.push(';');
                session.round += 1;
            }
            1 => {
                let value = &options[0];
                let round = usize::from(session.round);
                // Candidates with an empty field at this position stay:
                // the position does not apply to them.
                session.candidates.retain(|c| {
                    c.key
                        .token_at(round)
                        .is_none_or(|t| t.is_empty() || t.eq_ignore_ascii_case(value))
                });
                session.chosen.push_str(value);
                session.chosen.push(';');
                session.round += 1;
            }
            _ => return RoundOutcome::Present(options),
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt formatting
// ---------------------------------------------------------------------------

/// `"the [Slash] version, the [Thrust] version or the [Crush] version"`.
fn option_sentence(options: &[String]) -> String {
    let mut sentence = String::new();
    for (i, option) in options.iter().enumerate() {
        if i + 1 == options.len() && options.len() > 1 {
            sentence.push_str(&format!(" or the [{option}] version"));
        } else {
            let comma = if options.len() > 2 && i + 2 < options.len() { "," } else { "" };
            if i > 0 {
                sentence.push(' ');
            }
            sentence.push_str(&format!("the [{option}] version{comma}"));
        }
    }
    sentence
}

/// Clickable option list: `"[Slash] [Thrust]"`.
fn bracket_list(options: &[String]) -> String {
    options
        .iter()
        .map(|o| format!("[{o}]"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn well_served(item: &str, player: &str) -> String {
    format!("Here is your {item}, {player}. May it serve you well!")
}

/// Whether an item name is one of the definition's six partial-scroll
/// names (exact match, as in scroll classification).
fn is_partial_scroll(definition: &ArtifactDefinition, name: &str) -> bool {
    definition
        .scrolls
        .iter()
        .chain(definition.combined_scrolls.iter())
        .any(|scroll| !scroll.is_empty() && scroll == name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
