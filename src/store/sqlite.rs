use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::{COLLECTION_PREFIX, SCHEMA, collection_ddl, unique_index_ddl};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database. Used by tests and throwaway servers.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Maps a JSON text column into a value, surfacing bad JSON as a conversion failure.
fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Table holding the records of `shape_name`. Shape names are restricted to
/// `[A-Za-z0-9_-]`, so the result is safe to splice into quoted identifiers.
fn collection_table(shape_name: &str) -> Result<String> {
    if shape_name.is_empty()
        || !shape_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::Validation(format!(
            "invalid repo name '{shape_name}'"
        )));
    }
    Ok(format!("{COLLECTION_PREFIX}{shape_name}"))
}

/// Translates a UNIQUE failure on a collection table into a domain error.
fn unique_violation(table: &str, message: Option<&str>) -> Error {
    let message = message.unwrap_or_default();
    if message.contains(&format!("{table}.uid")) {
        return Error::UidCollision;
    }
    let index_prefix = format!("{table}__");
    let field = message
        .split('\'')
        .find_map(|part| part.strip_prefix(index_prefix.as_str()))
        .unwrap_or("a unique field");
    Error::Validation(format!("duplicate value for unique field '{field}'"))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(2)?;
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        role: Role::parse(&role).unwrap_or_else(|| {
            tracing::error!("Unknown role in database: '{}'", role);
            Role::User
        }),
        active: row.get(3)?,
        password_hash: row.get(4)?,
        repos: json_column(row, 5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn row_to_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        client_id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        client_secret: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn row_to_shape(row: &Row<'_>) -> rusqlite::Result<Shape> {
    let kind: String = row.get(2)?;
    Ok(Shape {
        name: row.get(0)?,
        owner_id: row.get(1)?,
        kind: ShapeKind::parse(&kind).unwrap_or_default(),
        fields: json_column(row, 3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<StoredDocument> {
    Ok(StoredDocument {
        id: row.get(0)?,
        uid: row.get(1)?,
        rev: row.get(2)?,
        body: json_column(row, 3)?,
    })
}

const USER_COLUMNS: &str =
    "id, name, role, active, password_hash, repos, created_at, updated_at";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, name, role, active, password_hash, repos, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.name,
                user.role.as_str(),
                user.active,
                user.password_hash,
                serde_json::to_string(&user.repos)?,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists(format!("user '{}'", user.name)))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1"),
            params![name],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_active_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND active = 1"),
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET name = ?1, role = ?2, active = ?3, password_hash = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                user.name,
                user.role.as_str(),
                user.active,
                user.password_hash,
                format_datetime(&user.updated_at),
                user.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<()> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn add_user_repo(&self, user_id: &str, shape_name: &str) -> Result<()> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![user_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound);
        }

        conn.execute(
            "UPDATE users SET repos = json_insert(repos, '$[#]', ?2), updated_at = ?3
             WHERE id = ?1
               AND NOT EXISTS (SELECT 1 FROM json_each(users.repos) WHERE value = ?2)",
            params![user_id, shape_name, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn has_root_user(&self) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'root')",
            [],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // Application operations

    fn create_application(&self, app: &Application) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO applications (client_id, owner_id, name, client_secret, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                app.client_id,
                app.owner_id,
                app.name,
                app.client_secret,
                format_datetime(&app.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists(format!("application '{}'", app.client_id)))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn find_application(&self, client_id: &str, owner_id: &str) -> Result<Option<Application>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT client_id, owner_id, name, client_secret, created_at
             FROM applications WHERE client_id = ?1 AND owner_id = ?2",
            params![client_id, owner_id],
            row_to_application,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_applications(&self, owner_id: &str) -> Result<Vec<Application>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT client_id, owner_id, name, client_secret, created_at
             FROM applications WHERE owner_id = ?1 ORDER BY created_at, client_id",
        )?;

        let rows = stmt.query_map(params![owner_id], row_to_application)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Shape operations

    fn create_shape(&self, shape: &Shape) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO shapes (name, owner_id, kind, fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                shape.name,
                shape.owner_id,
                shape.kind.as_str(),
                serde_json::to_string(&shape.fields)?,
                format_datetime(&shape.created_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists(format!("repo '{}'", shape.name)))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_shape(&self, name: &str) -> Result<Option<Shape>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT name, owner_id, kind, fields, created_at FROM shapes WHERE name = ?1",
            params![name],
            row_to_shape,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_shape_names(&self, owner_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT name FROM shapes WHERE owner_id = ?1 ORDER BY name")?;

        let rows = stmt.query_map(params![owner_id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Collection operations

    fn ensure_collection(&self, shape_name: &str, unique_fields: &[String]) -> Result<()> {
        let table = collection_table(shape_name)?;
        let mut ddl = collection_ddl(&table);
        for field in unique_fields {
            ddl.push_str(&unique_index_ddl(&table, field));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute_batch(&ddl)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_document(
        &self,
        shape_name: &str,
        uid: &str,
        body: &Document,
    ) -> Result<StoredDocument> {
        let table = collection_table(shape_name)?;
        let conn = self.conn();
        let result = conn.execute(
            &format!(r#"INSERT INTO "{table}" (uid, _rev, body) VALUES (?1, 0, ?2)"#),
            params![uid, serde_json::to_string(body)?],
        );

        match result {
            Ok(_) => Ok(StoredDocument {
                id: conn.last_insert_rowid(),
                rev: 0,
                uid: uid.to_string(),
                body: body.clone(),
            }),
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(unique_violation(&table, message.as_deref()))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_document(&self, shape_name: &str, uid: &str) -> Result<Option<StoredDocument>> {
        let table = collection_table(shape_name)?;
        let conn = self.conn();
        conn.query_row(
            &format!(r#"SELECT _id, uid, _rev, body FROM "{table}" WHERE uid = ?1"#),
            params![uid],
            row_to_document,
        )
        .optional()
        .map_err(Error::from)
    }

    fn replace_document(&self, shape_name: &str, uid: &str, body: &Document) -> Result<StoredDocument> {
        let table = collection_table(shape_name)?;
        let conn = self.conn();
        let result = conn.execute(
            &format!(r#"UPDATE "{table}" SET body = ?1, _rev = _rev + 1 WHERE uid = ?2"#),
            params![serde_json::to_string(body)?, uid],
        );

        match result {
            Ok(0) => Err(Error::RecordNotFound(uid.to_string())),
            Ok(_) => conn
                .query_row(
                    &format!(r#"SELECT _id, uid, _rev, body FROM "{table}" WHERE uid = ?1"#),
                    params![uid],
                    row_to_document,
                )
                .map_err(Error::from),
            Err(rusqlite::Error::SqliteFailure(err, message))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(unique_violation(&table, message.as_deref()))
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn close(&self) -> Result<()> {
        self.conn()
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}
