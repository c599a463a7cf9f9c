use anyhow::{Context, Result};
use domain::{Team, User};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::fs;
use std::path::{Path, PathBuf};

/// redb-backed Persistence Adapter.
///
/// The hub never writes user data at runtime; `put_user`/`put_team` exist only for the
/// startup seeding routine (see the gateway's `init` module) and for tests. Production
/// deployments are expected to populate these tables out-of-band from the real user
/// database.
pub struct Storage {
    #[allow(dead_code)]
    base: PathBuf,
    db: Database,
}

const USERS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("users");
const TEAMS_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("teams");

impl Storage {
    /// Open (or create) a redb database at `<base_path>/hub.redb`.
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base)
            .with_context(|| format!("creating base path {}", base.display()))?;

        let db_path = base.join("hub.redb");
        let db = Database::create(&db_path)
            .with_context(|| format!("opening redb database {}", db_path.display()))?;

        // Ensure both tables exist so reads against an empty database don't error.
        let write_txn = db.begin_write().context("opening initial write transaction")?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(TEAMS_TABLE)?;
        }
        write_txn.commit().context("committing initial table creation")?;

        Ok(Self { base, db })
    }

    pub fn put_user(&self, user: &User) -> Result<()> {
        let bytes = serde_json::to_vec(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS_TABLE)?;
            table.insert(user.id.as_str(), bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn user_by_id(&self, id: &str) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve a user by the `email` claim carried in a bearer token.
    pub fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: User = serde_json::from_slice(&value.value())?;
            if user.email == email {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    /// All users sharing `team_id`, excluding `user_id` itself.
    pub fn teammates_of(&self, user_id: &str, team_id: &str) -> Result<Vec<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: User = serde_json::from_slice(&value.value())?;
            if user.team_id == team_id && user.id != user_id {
                out.push(user);
            }
        }
        Ok(out)
    }

    pub fn put_team(&self, team: &Team) -> Result<()> {
        let bytes = serde_json::to_vec(team)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TEAMS_TABLE)?;
            table.insert(team.id.as_str(), bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn team_by_id(&self, id: &str) -> Result<Option<Team>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TEAMS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value.value())?)),
            None => Ok(None),
        }
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new("./data").expect("failed to open default storage at ./data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> Storage {
        let path = std::env::temp_dir().join(format!("hub-storage-test-{}", uuid::Uuid::new_v4()));
        Storage::new(&path).expect("open temp storage")
    }

    #[test]
    fn user_round_trips_by_id_and_email() -> Result<()> {
        let storage = temp_storage();
        let user = User {
            id: "u1".into(),
            email: "ada@example.com".into(),
            display_name: "Ada".into(),
            team_id: "acme".into(),
        };
        storage.put_user(&user)?;

        assert_eq!(storage.user_by_id("u1")?, Some(user.clone()));
        assert_eq!(storage.user_by_email("ada@example.com")?, Some(user));
        assert_eq!(storage.user_by_email("nobody@example.com")?, None);
        Ok(())
    }

    #[test]
    fn teammates_of_excludes_self_and_other_teams() -> Result<()> {
        let storage = temp_storage();
        let a = User { id: "a".into(), email: "a@x.com".into(), display_name: "A".into(), team_id: "t1".into() };
        let b = User { id: "b".into(), email: "b@x.com".into(), display_name: "B".into(), team_id: "t1".into() };
        let c = User { id: "c".into(), email: "c@x.com".into(), display_name: "C".into(), team_id: "t2".into() };
        storage.put_user(&a)?;
        storage.put_user(&b)?;
        storage.put_user(&c)?;

        let mates = storage.teammates_of("a", "t1")?;
        assert_eq!(mates.len(), 1);
        assert_eq!(mates[0].id, "b");
        Ok(())
    }

    #[test]
    fn team_round_trips() -> Result<()> {
        let storage = temp_storage();
        let team = Team { id: "acme".into(), name: "Acme Corp".into() };
        storage.put_team(&team)?;
        assert_eq!(storage.team_by_id("acme")?, Some(team));
        assert_eq!(storage.team_by_id("missing")?, None);
        Ok(())
    }
}
