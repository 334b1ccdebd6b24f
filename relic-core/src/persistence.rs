//! SQLite persistence for the artifact subsystem.
//!
//! One database holds both the flat artifact collections the registry
//! indexes and the per-player quest-property rows the turn-in sessions
//! persist into:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS artifacts         (artifact_id TEXT PRIMARY KEY, ...);
//! CREATE TABLE IF NOT EXISTS artifact_versions (artifact_id, version, item_id, realm);
//! CREATE TABLE IF NOT EXISTS artifact_bonuses  (artifact_id, bonus_id, level);
//! CREATE TABLE IF NOT EXISTS item_templates    (item_id TEXT PRIMARY KEY, ...);
//! CREATE TABLE IF NOT EXISTS quest_properties (
//!     player_id  TEXT NOT NULL,
//!     session    TEXT NOT NULL,
//!     key        TEXT NOT NULL,
//!     value      TEXT NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     PRIMARY KEY (player_id, session, key)
//! );
//! ```
//!
//! WAL mode keeps property writes cheap while gameplay reads continue.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::info;

use crate::config::PersistenceConfig;
use crate::error::Result;
use crate::store::{ArtifactStore, QuestPropertyStore};
use crate::types::{
    ArtifactBonus, ArtifactBonusRow, ArtifactDefinition, ArtifactId, ArtifactVersionRow,
    CharacterClass, ItemTemplate, PlayerId, RealmFilter, VersionKey,
};

/// Handle to an open SQLite database backing both the artifact data
/// store and the quest-property store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating the schema if
    /// it does not exist.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "artifact database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    // -----------------------------------------------------------------------
    // Content writers (world-building tools and test fixtures)
    // -----------------------------------------------------------------------

    /// Insert or replace one artifact definition row.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Database`] on SQLite failures.
    pub fn insert_artifact(&self, def: &ArtifactDefinition) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO artifacts
             (artifact_id, zone, book_id, scroll1, scroll2, scroll3,
              scroll12, scroll13, scroll23, scroll_model, combined_model,
              book_model, xp_rate, encounter_id, quest_id, scholar_id, credit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                def.id.as_str(),
                def.zone,
                def.book_id,
                def.scrolls[0],
                def.scrolls[1],
                def.scrolls[2],
                def.combined_scrolls[0],
                def.combined_scrolls[1],
                def.combined_scrolls[2],
                def.scroll_model,
                def.combined_model,
                def.book_model,
                def.xp_rate,
                def.encounter_id,
                def.quest_id,
                def.scholars.join(","),
                def.credit_token,
            ],
        )?;
        Ok(())
    }

    /// Insert one version row.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Database`] on SQLite failures.
    pub fn insert_version(&self, row: &ArtifactVersionRow) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO artifact_versions (artifact_id, version, item_id, realm)
             VALUES (?1, ?2, ?3, ?4)",
            params![row.artifact_id.as_str(), row.version.0, row.item_id, row.realm.0],
        )?;
        Ok(())
    }

    /// Insert one bonus row.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Database`] on SQLite failures.
    pub fn insert_bonus(&self, bonus: &ArtifactBonus) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO artifact_bonuses (artifact_id, bonus_id, level) VALUES (?1, ?2, ?3)",
            params![bonus.artifact_id.as_str(), bonus.row.bonus_id, bonus.row.level],
        )?;
        Ok(())
    }

    /// Insert or replace one item template.
    ///
    /// # Errors
    /// Returns [`crate::ArtifactError::Database`] on SQLite failures.
    pub fn insert_template(&self, template: &ItemTemplate) -> Result<()> {
        let classes = template
            .allowed_classes
            .iter()
            .map(|c| c.0.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO item_templates (item_id, name, allowed_classes, model)
             VALUES (?1, ?2, ?3, ?4)",
            params![template.id, template.name, classes, template.model],
        )?;
        Ok(())
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artifacts (
    artifact_id    TEXT PRIMARY KEY,
    zone           TEXT NOT NULL DEFAULT '',
    book_id        TEXT NOT NULL,
    scroll1        TEXT NOT NULL DEFAULT '',
    scroll2        TEXT NOT NULL DEFAULT '',
    scroll3        TEXT NOT NULL DEFAULT '',
    scroll12       TEXT NOT NULL DEFAULT '',
    scroll13       TEXT NOT NULL DEFAULT '',
    scroll23       TEXT NOT NULL DEFAULT '',
    scroll_model   INTEGER NOT NULL DEFAULT 499,
    combined_model INTEGER NOT NULL DEFAULT 500,
    book_model     INTEGER NOT NULL DEFAULT 500,
    xp_rate        INTEGER NOT NULL DEFAULT 350,
    encounter_id   TEXT NOT NULL DEFAULT '',
    quest_id       TEXT NOT NULL DEFAULT '',
    scholar_id     TEXT NOT NULL DEFAULT '',
    credit         TEXT
);
CREATE TABLE IF NOT EXISTS artifact_versions (
    artifact_id TEXT NOT NULL,
    version     TEXT NOT NULL DEFAULT '',
    item_id     TEXT NOT NULL,
    realm       INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (artifact_id, version, item_id)
);
CREATE TABLE IF NOT EXISTS artifact_bonuses (
    artifact_id TEXT NOT NULL,
    bonus_id    INTEGER NOT NULL,
    level       INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS item_templates (
    item_id         TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    allowed_classes TEXT NOT NULL DEFAULT '',
    model           INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS quest_properties (
    player_id  TEXT NOT NULL,
    session    TEXT NOT NULL,
    key        TEXT NOT NULL,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (player_id, session, key)
);
";

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl ArtifactStore for SqliteStore {
    fn load_artifacts(&self) -> Result<Vec<ArtifactDefinition>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT artifact_id, zone, book_id, scroll1, scroll2, scroll3,
                    scroll12, scroll13, scroll23, scroll_model, combined_model,
                    book_model, xp_rate, encounter_id, quest_id, scholar_id, credit
             FROM artifacts",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ArtifactDefinition {
                id: ArtifactId::new(row.get::<_, String>(0)?),
                zone: row.get(1)?,
                book_id: row.get(2)?,
                scrolls: [row.get(3)?, row.get(4)?, row.get(5)?],
                combined_scrolls: [row.get(6)?, row.get(7)?, row.get(8)?],
                scroll_model: row.get(9)?,
                combined_model: row.get(10)?,
                book_model: row.get(11)?,
                xp_rate: row.get(12)?,
                encounter_id: row.get(13)?,
                quest_id: row.get(14)?,
                scholars: split_csv(&row.get::<_, String>(15)?),
                credit_token: row.get(16)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn load_versions(&self) -> Result<Vec<ArtifactVersionRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT artifact_id, version, item_id, realm FROM artifact_versions
             ORDER BY artifact_id, item_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ArtifactVersionRow {
                artifact_id: ArtifactId::new(row.get::<_, String>(0)?),
                version: VersionKey::new(row.get::<_, String>(1)?),
                item_id: row.get(2)?,
                realm: RealmFilter(row.get(3)?),
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn load_bonuses(&self) -> Result<Vec<ArtifactBonus>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT artifact_id, bonus_id, level FROM artifact_bonuses")?;
        let rows = stmt.query_map([], |row| {
            Ok(ArtifactBonus {
                artifact_id: ArtifactId::new(row.get::<_, String>(0)?),
                row: ArtifactBonusRow {
                    bonus_id: row.get(1)?,
                    level: row.get(2)?,
                },
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    fn item_template(&self, id: &str) -> Result<Option<ItemTemplate>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT item_id, name, allowed_classes, model FROM item_templates WHERE item_id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            let classes = split_csv(&row.get::<_, String>(2)?)
                .iter()
                .filter_map(|c| c.parse().ok().map(CharacterClass))
                .collect();
            Ok(ItemTemplate {
                id: row.get(0)?,
                name: row.get(1)?,
                allowed_classes: classes,
                model: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }
}

impl QuestPropertyStore for SqliteStore {
    fn get(&self, player: PlayerId, session: &str, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT value FROM quest_properties
             WHERE player_id = ?1 AND session = ?2 AND key = ?3",
        )?;
        let mut rows = stmt.query_map(params![player.0.to_string(), session, key], |row| {
            row.get::<_, String>(0)
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn set(&self, player: PlayerId, session: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO quest_properties (player_id, session, key, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                player.0.to_string(),
                session,
                key,
                value,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, player: PlayerId, session: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM quest_properties WHERE player_id = ?1 AND session = ?2 AND key = ?3",
            params![player.0.to_string(), session, key],
        )?;
        Ok(())
    }

    fn delete_session(&self, player: PlayerId, session: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM quest_properties WHERE player_id = ?1 AND session = ?2",
            params![player.0.to_string(), session],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("relic.db"), &PersistenceConfig::default())
            .expect("open");
        (dir, store)
    }

    fn definition() -> ArtifactDefinition {
        ArtifactDefinition {
            id: ArtifactId::new("Battler"),
            zone: "Stygia".into(),
            book_id: "Battler Tale".into(),
            scrolls: ["p1".into(), "p2".into(), "p3".into()],
            combined_scrolls: ["p12".into(), "p13".into(), "p23".into()],
            scroll_model: 499,
            combined_model: 500,
            book_model: 501,
            xp_rate: 300,
            encounter_id: "BattlerEncounter".into(),
            quest_id: "BattlerQuest".into(),
            scholars: vec!["Jarron".into(), "Alaria".into()],
            credit_token: Some("Battler Hilt".into()),
        }
    }

    #[test]
    fn artifact_rows_round_trip() {
        let (_dir, store) = open_temp();
        store.insert_artifact(&definition()).expect("insert");
        store
            .insert_version(&ArtifactVersionRow {
                artifact_id: ArtifactId::new("Battler"),
                version: VersionKey::new("Slash;Polearm"),
                item_id: "battler_slash".into(),
                realm: RealmFilter(2),
            })
            .expect("insert");
        store
            .insert_bonus(&ArtifactBonus {
                artifact_id: ArtifactId::new("Battler"),
                row: ArtifactBonusRow { bonus_id: 4, level: 7 },
            })
            .expect("insert");

        let artifacts = store.load_artifacts().expect("load");
        assert_eq!(artifacts.len(), 1);
        let def = &artifacts[0];
        assert_eq!(def.scholars, vec!["Jarron", "Alaria"]);
        assert_eq!(def.credit_token.as_deref(), Some("Battler Hilt"));
        assert_eq!(def.combined_scrolls[1], "p13");

        let versions = store.load_versions().expect("load");
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version.0, "Slash;Polearm");
        assert_eq!(versions[0].realm, RealmFilter(2));

        let bonuses = store.load_bonuses().expect("load");
        assert_eq!(bonuses[0].row.bonus_id, 4);
    }

    #[test]
    fn template_lookup_parses_allowed_classes() {
        let (_dir, store) = open_temp();
        store
            .insert_template(&ItemTemplate {
                id: "battler_slash".into(),
                name: "Battler".into(),
                allowed_classes: vec![CharacterClass(2), CharacterClass(10)],
                model: 7,
            })
            .expect("insert");

        let template = store
            .item_template("battler_slash")
            .expect("query")
            .expect("present");
        assert_eq!(
            template.allowed_classes,
            vec![CharacterClass(2), CharacterClass(10)]
        );
        assert!(store.item_template("missing").expect("query").is_none());
    }

    #[test]
    fn quest_properties_round_trip_and_delete() {
        let (_dir, store) = open_temp();
        let player = PlayerId::new();
        let other = PlayerId::new();

        store.set(player, "ArtifactTurnIn", "Art", "Battler").expect("set");
        store.set(player, "ArtifactTurnIn", "VS", "1").expect("set");
        store.set(other, "ArtifactTurnIn", "Art", "Cloudsong").expect("set");

        assert_eq!(
            store
                .get(player, "ArtifactTurnIn", "Art")
                .expect("get")
                .as_deref(),
            Some("Battler")
        );

        // Overwrite keeps one row per key.
        store.set(player, "ArtifactTurnIn", "VS", "2").expect("set");
        assert_eq!(
            store
                .get(player, "ArtifactTurnIn", "VS")
                .expect("get")
                .as_deref(),
            Some("2")
        );

        store.delete_session(player, "ArtifactTurnIn").expect("delete");
        assert_eq!(store.get(player, "ArtifactTurnIn", "Art").expect("get"), None);
        // Other players' sessions are untouched.
        assert_eq!(
            store
                .get(other, "ArtifactTurnIn", "Art")
                .expect("get")
                .as_deref(),
            Some("Cloudsong")
        );
    }
}
