use std::path::Path;

use super::OpacityDb;

use crate::errors::OpacityErr;

impl OpacityDb {
    const TABLES: [&'static str; 3] = ["continuum", "header", "molecular"];

    /// Create a new, empty database, replacing any file already at `path`.
    pub fn create(path: &dyn AsRef<Path>) -> Result<Self, OpacityErr> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        let db_conn = rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        db_conn.execute_batch(include_str!("create_schema.sql"))?;

        Ok(OpacityDb { path, db_conn })
    }

    /// Open an existing database.
    pub fn connect(path: &dyn AsRef<Path>) -> Result<Self, OpacityErr> {
        let path = path.as_ref().to_path_buf();

        let db_conn = rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE,
        )?;

        Self::validate_db_structure(&db_conn)?;

        Ok(OpacityDb { path, db_conn })
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate the database structure is correct.
    fn validate_db_structure(db_conn: &rusqlite::Connection) -> Result<(), OpacityErr> {
        let mut stmt =
            db_conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;

        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<_, _>>()?;

        if names != Self::TABLES {
            return Err(OpacityErr::InvalidSchema);
        }

        Ok(())
    }
}
