//! SQLite-backed relationship store.
//!
//! Implements the read and write collaborator traits of the family engine
//! over the `persons` and `person_relationships` tables.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection};

use crate::db::{migrate, Db};
use crate::error::{KinshipError, Result};
use crate::family::{
    NewPerson, PersonDirectory, PersonHandle, PersonRecord, RelationSource, RelationshipChange,
    RelationshipKind, RelationshipRecord, RelationshipWriter,
};

const PARENT_CHILD: i64 = 1;
const PARTNER: i64 = 2;

/// Relationship store on a SQLite database file.
#[derive(Debug, Clone)]
pub struct SqliteFamilyStore {
    db: Db,
}

impl SqliteFamilyStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Apply pending schema migrations from `migrations_dir`.
    pub async fn migrate(&self, migrations_dir: &Path) -> Result<Vec<String>> {
        let migrations_dir = migrations_dir.to_path_buf();
        self.db
            .with_connection(move |conn| migrate::run_migrations(conn, &migrations_dir))
            .await
    }
}

fn handle(raw: i64) -> Result<PersonHandle> {
    PersonHandle::new(raw)
        .map_err(|_| KinshipError::InvalidInput(format!("store returned invalid person id {}", raw)))
}

/// Partner rows are stored lowest handle first.
fn partner_pair(a: PersonHandle, b: PersonHandle) -> (i64, i64) {
    (a.get().min(b.get()), a.get().max(b.get()))
}

fn load_relations(conn: &Connection, person: PersonHandle) -> Result<Option<RelationshipRecord>> {
    let mut stmt = conn.prepare(
        "SELECT person1_id, person2_id, relationship_type, is_active
         FROM person_relationships
         WHERE person1_id = ?1 OR person2_id = ?1
         ORDER BY relationship_id",
    )?;
    let rows = stmt
        .query_map([person.get()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    if rows.is_empty() {
        return Ok(None);
    }

    let mut record = RelationshipRecord::new(person);
    let mut former = Vec::new();
    for (person1, person2, kind, active) in rows {
        let (person1, person2) = (handle(person1)?, handle(person2)?);
        match kind {
            PARENT_CHILD if person2 == person => {
                record.add_parent(person1);
            }
            PARENT_CHILD => {
                record.add_child(person2);
            }
            PARTNER => {
                let other = if person1 == person { person2 } else { person1 };
                if !active {
                    former.push(other);
                } else if !record.set_partner(other) {
                    log::warn!(
                        "Person {} has more than one active partner on file; ignoring {}",
                        person,
                        other
                    );
                }
            }
            other => log::warn!("Unknown relationship type {} for person {}", other, person),
        }
    }
    for partner in former {
        record.add_previous_partner(partner);
    }

    Ok(Some(record))
}

fn apply_change(conn: &Connection, change: &RelationshipChange) -> Result<()> {
    match change.kind {
        RelationshipKind::ParentChild => {
            conn.execute(
                "INSERT OR IGNORE INTO person_relationships
                     (person1_id, person2_id, relationship_type, is_active)
                 VALUES (?1, ?2, ?3, 1)",
                params![change.person1.get(), change.person2.get(), PARENT_CHILD],
            )?;
        }
        RelationshipKind::Partner => {
            let (low, high) = partner_pair(change.person1, change.person2);
            conn.execute(
                "INSERT INTO person_relationships
                     (person1_id, person2_id, relationship_type, is_active)
                 VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT(person1_id, person2_id, relationship_type) DO UPDATE SET
                     is_active = 1,
                     updated_at = CURRENT_TIMESTAMP",
                params![low, high, PARTNER],
            )?;
        }
        RelationshipKind::Dissolution => {
            let (low, high) = partner_pair(change.person1, change.person2);
            let updated = conn.execute(
                "UPDATE person_relationships
                 SET is_active = 0, updated_at = CURRENT_TIMESTAMP
                 WHERE person1_id = ?1 AND person2_id = ?2 AND relationship_type = ?3",
                params![low, high, PARTNER],
            )?;
            if updated == 0 {
                return Err(KinshipError::InvalidInput(format!(
                    "no partnership between {} and {} to dissolve",
                    change.person1, change.person2
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RelationSource for SqliteFamilyStore {
    async fn person_exists(&self, person: PersonHandle) -> Result<bool> {
        self.db
            .with_connection(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM persons WHERE person_id = ?1)",
                    [person.get()],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
    }

    async fn fetch_relations(&self, person: PersonHandle) -> Result<Option<RelationshipRecord>> {
        self.db
            .with_connection(move |conn| load_relations(conn, person))
            .await
    }
}

#[async_trait]
impl PersonDirectory for SqliteFamilyStore {
    async fn fetch_persons(&self, persons: &BTreeSet<PersonHandle>) -> Result<Vec<PersonRecord>> {
        if persons.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = persons.iter().map(|p| p.get()).collect();

        let rows = self
            .db
            .with_connection(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT person_id, name, gender, date_of_birth, place_of_birth,
                            date_of_death, place_of_death, occupation
                     FROM persons
                     WHERE person_id IN ({})
                     ORDER BY person_id",
                    placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params_from_iter(ids.iter()), |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<NaiveDate>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<NaiveDate>>(5)?,
                            row.get::<_, Option<String>>(6)?,
                            row.get::<_, Option<String>>(7)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(
                |(id, name, gender, date_of_birth, place_of_birth, date_of_death, place_of_death, occupation)|
                 -> Result<PersonRecord> {
                    Ok(PersonRecord {
                        id: handle(id)?,
                        name,
                        gender,
                        date_of_birth,
                        place_of_birth,
                        date_of_death,
                        place_of_death,
                        occupation,
                    })
                },
            )
            .collect()
    }
}

#[async_trait]
impl RelationshipWriter for SqliteFamilyStore {
    async fn add_person(&self, person: &NewPerson) -> Result<PersonHandle> {
        let person = person.clone();
        let id = self
            .db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO persons (
                         name, gender, date_of_birth, place_of_birth,
                         date_of_death, place_of_death, occupation
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        person.name.trim(),
                        person.gender,
                        person.date_of_birth,
                        person.place_of_birth,
                        person.date_of_death,
                        person.place_of_death,
                        person.occupation,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        handle(id)
    }

    async fn record_relationships(&self, changes: &[RelationshipChange]) -> Result<()> {
        let changes = changes.to_vec();
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                for change in &changes {
                    apply_change(&tx, change)?;
                }
                tx.commit()?;
                log::debug!("Wrote {} relationship change(s)", changes.len());
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
impl SqliteFamilyStore {
    /// Look up one person by handle.
    pub async fn find_person(&self, person: PersonHandle) -> Result<Option<PersonRecord>> {
        let found = self.fetch_persons(&BTreeSet::from([person])).await?;
        Ok(found.into_iter().next())
    }

    /// Number of persons on file.
    pub async fn person_count(&self) -> Result<usize> {
        self.db
            .with_connection(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM persons", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
    }
}
