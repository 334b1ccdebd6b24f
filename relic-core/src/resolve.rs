//! Name resolution: mapping loosely-formatted player-facing strings
//! (book titles, credit-token names, scroll names) onto canonical
//! artifact identifiers.
//!
//! Players type and click names with inconsistent casing, punctuation,
//! diacritics and partial words ("Scalars" for "Maddening Scalars"), so
//! resolution runs a fixed pipeline: normalize, then match exact →
//! synonym → substring → token subset. A miss is a miss; the resolver
//! never guesses a default.

use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::types::ArtifactId;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a raw player-facing string for matching.
///
/// Pipeline: decompose and drop combining diacritical marks, fold the
/// typographic apostrophe to `'`, collapse whitespace runs, lowercase,
/// strip a leading `"the "`. Deterministic, pure, and idempotent: the
/// article is stripped after folding so `normalize` is a fixpoint of
/// itself.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        let ch = if ch == '\u{2019}' { '\'' } else { ch };
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    strip_leading_the(&out).to_owned()
}

/// Stricter normalization for title-exact book lookups: [`normalize`]
/// plus dropping every non-alphanumeric character.
#[must_use]
pub fn normalize_strict(raw: &str) -> String {
    normalize(raw).chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Drop punctuation from an already-normalized string, keeping word
/// boundaries ("tartaros' gift" → "tartaros gift").
fn strip_punctuation(normalized: &str) -> String {
    let kept: String = normalized
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_leading_the(mut s: &str) -> &str {
    loop {
        let trimmed = s.trim_start();
        match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("the ") => s = &trimmed[4..],
            _ => return trimmed,
        }
    }
}

// ---------------------------------------------------------------------------
// Name index
// ---------------------------------------------------------------------------

/// Historical aliases that predate consistent naming in the data.
/// Only installed when the target id actually exists in the table.
const ALIASES: &[(&str, &str)] = &[
    ("tartaros gift", "Tartaros' Gift"),
    ("traldors oracle", "Traldor's Oracle"),
    ("winged helm", "The Winged Helm"),
    ("arms of the winds", "Arms of the Winds"),
];

/// Synonym and token index over the canonical artifact ids, built once
/// from a loaded artifact table.
#[derive(Debug, Default)]
pub struct NameIndex {
    /// Normalized synonym key → canonical id.
    synonyms: HashMap<String, ArtifactId>,
    /// Synonym keys ordered longest-first, for substring containment.
    ordered_keys: Vec<String>,
    /// Canonical id → its normalized tokens, for token-subset matching.
    tokens: Vec<(ArtifactId, Vec<String>)>,
}

impl NameIndex {
    /// Build the index from the full set of canonical artifact ids.
    #[must_use]
    pub fn build<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a ArtifactId>,
    {
        let ids: Vec<&ArtifactId> = ids.into_iter().collect();
        let mut synonyms: HashMap<String, ArtifactId> = HashMap::new();

        let normalized: Vec<(ArtifactId, String)> = ids
            .iter()
            .map(|id| ((*id).clone(), normalize(id.as_str())))
            .collect();

        for (id, norm) in &normalized {
            synonyms.entry(norm.clone()).or_insert_with(|| id.clone());

            // Final word as a shorthand ("scalars" → "Maddening Scalars"),
            // only when unique across all artifacts.
            let words: Vec<&str> = norm.split(' ').collect();
            if words.len() >= 2 {
                let last = words[words.len() - 1];
                let unique = normalized
                    .iter()
                    .filter(|(other, _)| other != id)
                    .all(|(_, other_norm)| {
                        other_norm.split(' ').next_back() != Some(last)
                    });
                if unique {
                    synonyms
                        .entry(last.to_owned())
                        .or_insert_with(|| id.clone());
                }
            }

            // Punctuation-free variant ("tartaros' gift" → "tartaros gift").
            let no_punct = strip_punctuation(norm);
            if no_punct != *norm {
                synonyms.entry(no_punct).or_insert_with(|| id.clone());
            }
        }

        for (key, target) in ALIASES {
            if let Some(id) = ids.iter().find(|id| id.as_str() == *target) {
                synonyms
                    .entry(normalize(key))
                    .or_insert_with(|| (*id).clone());
            }
        }

        let mut ordered_keys: Vec<String> = synonyms.keys().cloned().collect();
        ordered_keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut tokens: Vec<(ArtifactId, Vec<String>)> = normalized
            .into_iter()
            .map(|(id, norm)| {
                let toks = norm.split(' ').map(str::to_owned).collect();
                (id, toks)
            })
            .collect();
        tokens.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            synonyms,
            ordered_keys,
            tokens,
        }
    }

    /// Resolve a raw string to a canonical artifact id.
    ///
    /// Matching order, first hit wins: exact normalized match, synonym
    /// table, substring containment of a synonym key, token subset.
    /// Returns `None` when nothing matches.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<ArtifactId> {
        let norm = normalize(raw);
        if norm.is_empty() {
            return None;
        }

        if let Some(id) = self.synonyms.get(&norm) {
            return Some(id.clone());
        }

        // "Complete Scalars of the Deep" still contains "scalars".
        for key in &self.ordered_keys {
            if norm.contains(key.as_str()) {
                return self.synonyms.get(key).cloned();
            }
        }

        // Every input token appears among some artifact's tokens.
        let input_tokens: Vec<&str> = norm.split(' ').collect();
        for (id, toks) in &self.tokens {
            if input_tokens
                .iter()
                .all(|t| toks.iter().any(|a| a == t))
            {
                return Some(id.clone());
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Book title index
// ---------------------------------------------------------------------------

/// Curated literal mapping from completed-book titles to artifact ids.
///
/// Book titles rarely contain the artifact name ("Remus' Story" is the
/// book of "Aten's Shield"), so this table is consulted before the
/// general resolver whenever the input is known to be a book title.
const BOOK_TITLES: &[(&str, &str)] = &[
    ("Alvarus' Bundled Letters", "Alvarus' Leggings"),
    ("Anthos' Fish Skin", "Arms of the Winds"),
    ("Remus' Story", "Aten's Shield"),
    ("King's Vase", "Band of Stars"),
    ("Battler", "Battler"),
    ("Oglidarsh the Half-Giant's Story", "Belt of Oglidarsh"),
    ("Belt of the Moon", "Belt of the Moon"),
    ("Belt of the Sun", "Belt of the Sun"),
    ("An Apprentice's Works", "Bracelet of Zo'arkat"),
    ("Carved Stone Tablet", "Braggart's Bow"),
    ("Bruiser", "Bruiser"),
    ("Arbiter's Personal Papers", "Ceremonial Bracers"),
    ("Cloudsong", "Cloudsong"),
    ("Tyrus' Epic Poem", "Crocodile Tear Ring"),
    ("Marricus' Journal", "Crocodile's Tooth Dagger"),
    ("Advisor's Personal Log", "Crown of Zahur"),
    ("Damyon's Journal", "Cyclops Eye Shield"),
    ("Loukas' Journal", "Dream Sphere"),
    ("Crafter's Pages on Lightstones", "Eerie Darkness Stone"),
    ("Complete Egg of Youth Scroll", "Egg of Youth"),
    ("Eirene's Journal", "Eirene's Hauberk"),
    ("Enyalios' Boots", "Enyalio's Boots"),
    ("Erinys' Charm", "Erinys Charm"),
    ("Eternal Plant Guide", "Eternal Plant"),
    ("King Kiron's Notes to Cyrell", "Flamedancer's Boots"),
    ("Flask", "A Flask"),
    ("Fool's Bow Tale", "Fool's Bow"),
    ("Foppish Sleeves", "Foppish Sleeves"),
    ("Book of Lost Memories, complete story", "Gem of Lost Memories"),
    ("Dianna's Tragic Tale", "Goddess Necklace"),
    ("Bence's Letters to Helenia", "Golden Scarab Vest"),
    ("A Love Story", "Guard of Valor"),
    ("Bellona's Diary", "Harpy Feather Cloak"),
    ("Vara's Medical Log", "Healer's Embrace"),
    ("Tarin's Animal Skin", "Jacina's Sash"),
    ("Kalare's Memoirs", "Kalare's Necklace"),
    ("Scalars", "Maddening Scalars"),
    ("Malice's Axe", "Malice's Axe"),
    ("Mariasha's Wall Section", "Mariasha's Sharkskin Gloves"),
    ("Nailah's Diary", "Nailah's Robes"),
    ("Dysis' Tablet", "Night's Shroud Bracelet"),
    ("Great Hunt, complete story", "Orion's Belt"),
    ("Phoebus' Harp Tale", "Phoebus Harp Necklace"),
    ("Journal of Public Notices", "Ring of Dances"),
    ("Ring of fire", "Ring of Fire"),
    ("Tribute to Adauron, complete story", "Ring of Unyielding Will"),
    ("Adnes's Bundled Letters", "Scepter of the Meritorious"),
    ("Shades of Mist", "Shades of Mist"),
    ("Shield of Khaos", "Shield of Khaos"),
    ("Snatcher Tales", "Snatcher"),
    ("Spear of Kings Tale", "Spear of Kings"),
    ("Staff of the Gods Tale", "Staff of the Gods"),
    ("Helenia's Letters to Bence", "Stone of Atlantis"),
    ("Atlantis' Magic Tablets", "Tablet of Atlantis"),
    ("Tartaros' Gift", "Tartaros' Gift"),
    ("History of the Golden Spear", "The Golden Spear"),
    ("Complete Wooden Triptych", "Scorpion's Tail Ring"),
    ("Julea's Story", "Snakecharmer's Weapon"),
    ("Complete Thoughts of Hermes", "Winged Helm"),
    ("Complete Book of Glyphs", "Traitor's Dagger"),
    ("Completed Dichotory's Dissertation", "Traldor's Oracle"),
    ("Wing's Dive", "Wing's Dive"),
];

/// Title-exact lookup from completed-book names to artifact ids.
#[derive(Debug)]
pub struct BookTitleIndex {
    by_title: HashMap<String, ArtifactId>,
}

impl BookTitleIndex {
    /// Build the curated index. Keys are strictly normalized, so casing,
    /// punctuation and diacritics in item names do not matter.
    #[must_use]
    pub fn curated() -> Self {
        let by_title = BOOK_TITLES
            .iter()
            .map(|(title, id)| (normalize_strict(title), ArtifactId::new(*id)))
            .collect();
        Self { by_title }
    }

    /// Resolve an exact book title. Substrings do not match here.
    #[must_use]
    pub fn resolve(&self, raw_title: &str) -> Option<ArtifactId> {
        let key = normalize_strict(raw_title);
        if key.is_empty() {
            return None;
        }
        self.by_title.get(&key).cloned()
    }
}

impl Default for BookTitleIndex {
    fn default() -> Self {
        Self::curated()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
