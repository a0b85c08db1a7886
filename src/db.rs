//! SQLite database with Diesel ORM
//!
//! Stores users, smartphones, inspections, defects and defect images.
//! Tables are created on first connect and an admin account is seeded into
//! a store that has none.

use crate::auth::{hash_password, NewUser, User};
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::forms::Table;
use crate::inspect::{self, ColumnDescriptor};
use crate::record::Record;
use crate::schema::*;
use crate::sql::{self, Param, Statement};
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sql_types::{BigInt, Bool, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Database handle
///
/// Holds exactly one SQLite connection, opened at connect time and reused by
/// every read and write. Statements autocommit; there are no multi-statement
/// transactions.
pub struct Database {
    pool: DbPool,
    path: PathBuf,
}

/// Per-connection pragmas
#[derive(Debug)]
struct ConnectionOptions {
    enforce_foreign_keys: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        let pragma = if self.enforce_foreign_keys {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        };
        diesel::sql_query(pragma)
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Helper for reading rows rendered by `json_object`
#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Text)]
    record: String,
}

impl Database {
    /// Open database at default path
    pub fn open() -> Result<Self> {
        Self::connect(&Config::default())
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::connect(&Config::at(path))
    }

    /// Fresh in-memory database, seeded like a new file
    pub fn open_in_memory() -> Result<Self> {
        Self::connect(&Config::in_memory())
    }

    /// Open the database described by `config`, creating tables and seeding the admin as configured
    pub fn connect(config: &Config) -> Result<Self> {
        let path_str = config.db_path.to_string_lossy().to_string();

        // Fail fast on a bad path instead of waiting out the pool timeout
        SqliteConnection::establish(&path_str)?;

        let manager = ConnectionManager::<SqliteConnection>::new(&path_str);
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(Duration::from_secs(5))
            .connection_customizer(Box::new(ConnectionOptions {
                enforce_foreign_keys: config.enforce_foreign_keys,
            }))
            .build(manager)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { pool, path: config.db_path.clone() };
        {
            let mut conn = db.get_conn()?;
            Self::init_schema(&mut conn)?;
            if config.seed_admin {
                Self::seed_admin(&mut conn)?;
            }
        }
        info!(path = %path_str, "connected");
        Ok(db)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }

    fn init_schema(conn: &mut SqliteConnection) -> Result<()> {
        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL CHECK(role IN ('admin', 'inspector', 'viewer')),
                full_name TEXT,
                email TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS smartphones (
                smartphone_id INTEGER PRIMARY KEY AUTOINCREMENT,
                model_name TEXT NOT NULL,
                manufacturer TEXT NOT NULL,
                screen_size REAL,
                resolution TEXT,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS inspections (
                inspection_id INTEGER PRIMARY KEY AUTOINCREMENT,
                smartphone_id INTEGER,
                inspector_id INTEGER,
                inspection_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                status TEXT CHECK(status IN ('pending', 'in_progress', 'completed', 'rejected')),
                overall_result TEXT CHECK(overall_result IN ('pass', 'fail', 'conditional')),
                notes TEXT,
                image_path TEXT,
                FOREIGN KEY (smartphone_id) REFERENCES smartphones(smartphone_id),
                FOREIGN KEY (inspector_id) REFERENCES users(user_id)
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS defects (
                defect_id INTEGER PRIMARY KEY AUTOINCREMENT,
                inspection_id INTEGER,
                defect_type TEXT CHECK(defect_type IN ('scratch', 'chip', 'crack', 'discoloration', 'other')),
                severity INTEGER CHECK(severity BETWEEN 1 AND 5),
                location_x INTEGER,
                location_y INTEGER,
                size REAL,
                description TEXT,
                detected_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (inspection_id) REFERENCES inspections(inspection_id)
            )
        "#).execute(conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS defect_images (
                image_id INTEGER PRIMARY KEY AUTOINCREMENT,
                defect_id INTEGER,
                image_path TEXT NOT NULL,
                thumbnail_path TEXT,
                uploaded_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (defect_id) REFERENCES defects(defect_id)
            )
        "#).execute(conn)?;

        Ok(())
    }

    /// Insert the bootstrap admin if the store has no admin at all
    fn seed_admin(conn: &mut SqliteConnection) -> Result<()> {
        let admins: i64 = users::table
            .filter(users::role.eq("admin"))
            .count()
            .get_result(conn)?;
        if admins > 0 {
            return Ok(());
        }

        let digest = hash_password(config::DEFAULT_ADMIN_PASSWORD);
        let admin = NewUser {
            username: config::DEFAULT_ADMIN_USERNAME,
            password_hash: &digest,
            role: "admin",
            full_name: Some(config::DEFAULT_ADMIN_FULL_NAME),
        };
        let inserted = diesel::insert_or_ignore_into(users::table)
            .values(&admin)
            .execute(conn)?;
        if inserted > 0 {
            warn!(
                username = config::DEFAULT_ADMIN_USERNAME,
                "seeded default admin account; change its password"
            );
        }
        Ok(())
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// The user with this username and password, if any
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let mut conn = self.get_conn()?;
        let digest = hash_password(password);

        let user = users::table
            .filter(users::username.eq(username))
            .filter(users::password_hash.eq(&digest))
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        match &user {
            Some(u) => info!(username, role = %u.role, "login"),
            None => warn!(username, "login failed"),
        }
        Ok(user)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Ordered column descriptors of a table
    pub fn describe(&self, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut conn = self.get_conn()?;
        inspect::describe(&mut conn, table_name)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn prepare(statement: &Statement) -> BoxedSqlQuery<'static, Sqlite, SqlQuery> {
        debug!(sql = %statement.sql, params = statement.params.len(), "statement");
        let mut query = diesel::sql_query(statement.sql.clone()).into_boxed::<Sqlite>();
        for param in &statement.params {
            query = match param {
                Param::Text(value) => query.bind::<Nullable<Text>, _>(value.clone()),
                Param::Id(id) => query.bind::<BigInt, _>(*id),
            };
        }
        query
    }

    /// Run a write; returns the number of rows changed
    pub fn execute(&self, statement: &Statement) -> Result<usize> {
        let mut conn = self.get_conn()?;
        let changed = Self::prepare(statement).execute(&mut conn)?;
        Ok(changed)
    }

    /// Run an INSERT; returns the new row's id
    pub fn insert(&self, statement: &Statement) -> Result<i64> {
        let mut conn = self.get_conn()?;
        Self::prepare(statement).execute(&mut conn)?;

        let id: i64 = diesel::select(diesel::dsl::sql::<BigInt>("last_insert_rowid()"))
            .first(&mut conn)?;

        Ok(id)
    }

    /// First row of a SELECT built by [`sql::select_one`] / [`sql::select_all`]
    pub fn fetch_one(&self, statement: &Statement) -> Result<Option<Record>> {
        let mut conn = self.get_conn()?;
        let row = Self::prepare(statement)
            .get_result::<JsonRow>(&mut conn)
            .optional()?;
        row.map(|r| Record::from_json(&r.record, &statement.columns))
            .transpose()
    }

    /// Every row of a SELECT built by [`sql::select_all`]
    pub fn fetch_all(&self, statement: &Statement) -> Result<Vec<Record>> {
        let mut conn = self.get_conn()?;
        let rows = Self::prepare(statement).load::<JsonRow>(&mut conn)?;
        rows.iter()
            .map(|r| Record::from_json(&r.record, &statement.columns))
            .collect()
    }

    // ========================================================================
    // Records
    // ========================================================================

    /// Load one record by primary key
    pub fn load(&self, table: Table, id: i64) -> Result<Record> {
        let columns = self.describe(table.name())?;
        self.fetch_one(&sql::select_one(table, &columns, id))?
            .ok_or_else(|| Error::NotFound { table: table.name().to_string(), id })
    }

    /// All records of a table in primary key order
    pub fn list(&self, table: Table) -> Result<Vec<Record>> {
        let columns = self.describe(table.name())?;
        self.fetch_all(&sql::select_all(table, &columns))
    }

    /// Delete exactly one record
    pub fn delete(&self, table: Table, id: i64) -> Result<()> {
        let deleted = self.execute(&sql::delete(table, id))?;
        if deleted == 0 {
            return Err(Error::NotFound { table: table.name().to_string(), id });
        }
        info!(table = %table, id, "record deleted");
        Ok(())
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Counts shown after login
    pub fn get_summary(&self) -> Result<DbSummary> {
        let mut conn = self.get_conn()?;

        let smartphones: i64 = smartphones::table.count().get_result(&mut conn)?;
        let inspections: i64 = inspections::table.count().get_result(&mut conn)?;
        let defects: i64 = defects::table.count().get_result(&mut conn)?;
        let inspections_today: i64 = inspections::table
            .filter(diesel::dsl::sql::<Bool>("DATE(inspection_date) = DATE('now')"))
            .count()
            .get_result(&mut conn)?;

        Ok(DbSummary {
            smartphones,
            inspections,
            defects,
            inspections_today,
        })
    }

    /// Defects per type and smartphones per manufacturer
    pub fn get_breakdown(&self) -> Result<DbBreakdown> {
        let mut conn = self.get_conn()?;

        let mut defects_by_type: Vec<(String, i64)> = defects::table
            .group_by(defects::defect_type)
            .select((defects::defect_type, diesel::dsl::count_star()))
            .load::<(Option<String>, i64)>(&mut conn)?
            .into_iter()
            .map(|(kind, n)| (kind.unwrap_or_else(|| "unspecified".to_string()), n))
            .collect();
        defects_by_type.sort();

        let mut smartphones_by_manufacturer: Vec<(String, i64)> = smartphones::table
            .group_by(smartphones::manufacturer)
            .select((smartphones::manufacturer, diesel::dsl::count_star()))
            .load::<(String, i64)>(&mut conn)?;
        smartphones_by_manufacturer.sort();

        Ok(DbBreakdown {
            defects_by_type,
            smartphones_by_manufacturer,
        })
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Copy the database file; returns the backup path and its size in bytes
    pub fn backup(&self, output: Option<PathBuf>) -> Result<(PathBuf, u64)> {
        if self.path.as_os_str() == ":memory:" || !self.path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no database file at {}", self.path.display()),
            )));
        }

        let backup_path = output.unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            PathBuf::from(format!("screencheck_backup_{}.db", timestamp))
        });
        let bytes = std::fs::copy(&self.path, &backup_path)?;
        info!(from = %self.path.display(), to = %backup_path.display(), bytes, "backup written");
        Ok((backup_path, bytes))
    }
}

// ============================================================================
// Additional Types
// ============================================================================

/// Summary statistics from the database
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DbSummary {
    pub smartphones: i64,
    pub inspections: i64,
    pub defects: i64,
    pub inspections_today: i64,
}

/// Grouped counts, sorted by key
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DbBreakdown {
    pub defects_by_type: Vec<(String, i64)>,
    pub smartphones_by_manufacturer: Vec<(String, i64)>,
}
