//! Add/edit form sessions
//!
//! A [`FormSession`] is the dialog of one add or edit. It describes the table,
//! builds one [`FieldBinding`] per form field, loads the record when editing,
//! and on save runs validation and writes one statement.
//!
//! ```text
//! Opened -> Loading (edit only) -> Editing -> Validating -> Saving -> Closed(Committed)
//!                                     ^            |           |
//!                                     +------------+-----------+   (rejected / failed)
//!                                  Editing -> Closed(Cancelled)
//! ```
//!
//! Opening a session borrows the [`Database`] mutably, so at most one session
//! exists at a time. The borrow ends when the session is dropped, whatever
//! state it is in.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::forms::{self, ControlKind, Table};
use crate::inspect::ColumnDescriptor;
use crate::record::Record;
use crate::sql;
use crate::validate::validate;
use tracing::{debug, info, warn};

/// Whether the session creates a row or changes the row with this id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Add,
    Edit(i64),
}

impl Mode {
    pub fn is_edit(self) -> bool {
        matches!(self, Mode::Edit(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Saved; carries the id of the written row
    Committed(i64),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Loading,
    Editing,
    Validating,
    Saving,
    Closed(Outcome),
}

impl SessionState {
    fn describe(self) -> &'static str {
        match self {
            SessionState::Opened => "still opening",
            SessionState::Loading => "still loading",
            SessionState::Editing => "editing",
            SessionState::Validating => "validating",
            SessionState::Saving => "saving",
            SessionState::Closed(_) => "closed",
        }
    }
}

/// One form input: a column, how it is entered, and its current value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub column: ColumnDescriptor,
    pub kind: ControlKind,
    pub value: String,
    /// Shown but not editable (the primary key of an existing record)
    pub read_only: bool,
}

impl FieldBinding {
    pub fn name(&self) -> &str {
        &self.column.name
    }
}

/// Form fields for `columns`, skipping auto-timestamps and, when adding, the
/// store-generated primary key.
pub fn bind_fields(table: Table, mode: Mode, columns: &[ColumnDescriptor]) -> Vec<FieldBinding> {
    columns
        .iter()
        .filter(|c| !forms::is_auto_timestamp(&c.name))
        .filter(|c| !(c.is_primary_key && mode == Mode::Add))
        .map(|c| FieldBinding {
            column: c.clone(),
            kind: forms::map(table, &c.name),
            value: String::new(),
            read_only: c.is_primary_key,
        })
        .collect()
}

pub struct FormSession<'db> {
    db: &'db Database,
    table: Table,
    mode: Mode,
    bindings: Vec<FieldBinding>,
    state: SessionState,
}

impl<'db> FormSession<'db> {
    /// Open a form on `table`. Edit mode loads the record first and fails with
    /// [`Error::NotFound`] if it does not exist.
    pub fn open(db: &'db mut Database, table: Table, mode: Mode) -> Result<Self> {
        let db: &'db Database = db;
        let columns = db.describe(table.name())?;
        let mut session = Self {
            db,
            table,
            mode,
            bindings: bind_fields(table, mode, &columns),
            state: SessionState::Opened,
        };

        if let Mode::Edit(id) = mode {
            session.state = SessionState::Loading;
            let record = db.load(table, id)?;
            session.fill(&record);
        }

        session.state = SessionState::Editing;
        debug!(table = %table, ?mode, fields = session.bindings.len(), "form opened");
        Ok(session)
    }

    pub fn open_add(db: &'db mut Database, table: Table) -> Result<Self> {
        Self::open(db, table, Mode::Add)
    }

    pub fn open_edit(db: &'db mut Database, table: Table, id: i64) -> Result<Self> {
        Self::open(db, table, Mode::Edit(id))
    }

    fn fill(&mut self, record: &Record) {
        for binding in &mut self.bindings {
            // the stored digest is never shown; blank means keep it
            if binding.kind.is_secret() {
                continue;
            }
            if let Some(value) = record.get(&binding.column.name) {
                binding.value = value.to_string();
            }
        }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.name() == field)
            .map(|b| b.value.as_str())
    }

    fn require_editing(&self) -> Result<()> {
        match self.state {
            SessionState::Editing => Ok(()),
            other => Err(Error::InvalidSession(other.describe())),
        }
    }

    /// Set the value of one field
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        self.require_editing()?;
        let table = self.table;
        let binding = self
            .bindings
            .iter_mut()
            .find(|b| b.column.name == field)
            .ok_or_else(|| Error::UnknownField {
                table: table.name().to_string(),
                field: field.to_string(),
            })?;
        if binding.read_only {
            return Err(Error::ReadOnlyField(field.to_string()));
        }
        binding.value = value.into();
        Ok(())
    }

    /// Validate and write. On success the session is closed and the id of the
    /// written row is returned; on any error it is back in `Editing`.
    pub fn save(&mut self) -> Result<i64> {
        self.require_editing()?;

        self.state = SessionState::Validating;
        if let Err(e) = validate(self.mode, &self.bindings) {
            warn!(table = %self.table, error = %e, "save rejected");
            self.state = SessionState::Editing;
            return Err(e);
        }

        self.state = SessionState::Saving;
        let statement = sql::build(self.table, self.mode, &self.bindings);
        let written = match self.mode {
            Mode::Add => self.db.insert(&statement),
            Mode::Edit(id) => self.db.execute(&statement).and_then(|changed| {
                if changed == 0 {
                    Err(Error::NotFound { table: self.table.name().to_string(), id })
                } else {
                    Ok(id)
                }
            }),
        };

        match written {
            Ok(id) => {
                info!(table = %self.table, id, "record saved");
                self.state = SessionState::Closed(Outcome::Committed(id));
                Ok(id)
            }
            Err(e) => {
                warn!(table = %self.table, error = %e, "save failed");
                self.state = SessionState::Editing;
                Err(e)
            }
        }
    }

    /// Close without writing
    pub fn cancel(self) -> Outcome {
        if let SessionState::Closed(outcome) = self.state {
            return outcome;
        }
        debug!(table = %self.table, "form cancelled");
        Outcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_smartphone(db: &mut Database, model: &str, maker: &str) -> i64 {
        let mut form = FormSession::open_add(db, Table::Smartphones).unwrap();
        form.set("model_name", model).unwrap();
        form.set("manufacturer", maker).unwrap();
        form.save().unwrap()
    }

    fn add_inspection(db: &mut Database, smartphone_id: i64, status: &str) -> i64 {
        let mut form = FormSession::open_add(db, Table::Inspections).unwrap();
        form.set("smartphone_id", smartphone_id.to_string()).unwrap();
        form.set("inspector_id", "1").unwrap();
        form.set("status", status).unwrap();
        form.set("overall_result", "pass").unwrap();
        form.set("notes", "front glass").unwrap();
        form.save().unwrap()
    }

    // ==========================================================================
    // FIELD BINDING TESTS
    // ==========================================================================

    #[test]
    fn test_add_form_skips_key_and_timestamps() {
        let mut db = db();
        let form = FormSession::open_add(&mut db, Table::Users).unwrap();
        let names: Vec<_> = form.bindings().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["username", "password_hash", "role", "full_name", "email"]);
        assert_eq!(form.state(), SessionState::Editing);
        assert!(form.bindings().iter().all(|b| b.value.is_empty()));
    }

    #[test]
    fn test_edit_form_shows_read_only_key() {
        let mut db = db();
        let id = add_smartphone(&mut db, "X1", "Acme");
        let form = FormSession::open_edit(&mut db, Table::Smartphones, id).unwrap();
        let key = &form.bindings()[0];
        assert_eq!(key.name(), "smartphone_id");
        assert!(key.read_only);
        assert_eq!(key.value, id.to_string());
        assert!(form.bindings().iter().all(|b| b.name() != "created_at"));
    }

    #[test]
    fn test_kinds_follow_form_config() {
        let mut db = db();
        let form = FormSession::open_add(&mut db, Table::Defects).unwrap();
        for b in form.bindings() {
            assert_eq!(b.kind, forms::map(Table::Defects, b.name()));
        }
        let severity = form.bindings().iter().find(|b| b.name() == "severity").unwrap();
        assert_eq!(severity.kind.options().len(), 5);
    }

    // ==========================================================================
    // ADD / EDIT SCENARIOS
    // ==========================================================================

    #[test]
    fn test_add_smartphone_appears_in_listing() {
        let mut db = db();
        let id = add_smartphone(&mut db, "X1", "Acme");
        assert!(id >= 1);

        let rows = db.list(Table::Smartphones).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("smartphone_id"), Some(id.to_string().as_str()));
        assert_eq!(rows[0].get("model_name"), Some("X1"));
        assert_eq!(rows[0].get("manufacturer"), Some("Acme"));
    }

    #[test]
    fn test_add_with_blank_model_is_rejected() {
        let mut db = db();
        {
            let mut form = FormSession::open_add(&mut db, Table::Smartphones).unwrap();
            form.set("manufacturer", "Acme").unwrap();
            let err = form.save().unwrap_err();
            assert!(matches!(err, Error::MissingField(ref f) if f == "model_name"));
            assert_eq!(form.state(), SessionState::Editing);
            assert_eq!(form.cancel(), Outcome::Cancelled);
        }
        assert!(db.list(Table::Smartphones).unwrap().is_empty());
    }

    #[test]
    fn test_rejected_save_can_be_corrected() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Smartphones).unwrap();
        form.set("manufacturer", "Acme").unwrap();
        assert!(form.save().is_err());
        form.set("model_name", "X1").unwrap();
        let id = form.save().unwrap();
        assert_eq!(form.state(), SessionState::Closed(Outcome::Committed(id)));
    }

    #[test]
    fn test_edit_status_leaves_other_fields() {
        let mut db = db();
        let phone = add_smartphone(&mut db, "X1", "Acme");
        let id = add_inspection(&mut db, phone, "pending");
        let before = db.load(Table::Inspections, id).unwrap();

        let mut form = FormSession::open_edit(&mut db, Table::Inspections, id).unwrap();
        assert_eq!(form.get("status"), Some("pending"));
        form.set("status", "completed").unwrap();
        assert_eq!(form.save().unwrap(), id);

        let after = db.load(Table::Inspections, id).unwrap();
        assert_eq!(after.get("status"), Some("completed"));
        for (column, value) in before.iter().filter(|(c, _)| *c != "status") {
            assert_eq!(after.get(column), Some(value), "{column} changed");
        }
    }

    #[test]
    fn test_add_edit_load_round_trip() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Defects).unwrap();
        form.set("inspection_id", "1").unwrap();
        form.set("defect_type", "crack").unwrap();
        form.set("severity", "4").unwrap();
        form.set("location_x", "120").unwrap();
        form.set("location_y", "340").unwrap();
        form.set("size", "2.5").unwrap();
        form.set("description", "hairline").unwrap();
        let id = form.save().unwrap();

        let mut form = FormSession::open_edit(&mut db, Table::Defects, id).unwrap();
        form.set("severity", "5").unwrap();
        form.set("description", "").unwrap();
        form.save().unwrap();

        let record = db.load(Table::Defects, id).unwrap();
        assert_eq!(record.get("defect_type"), Some("crack"));
        assert_eq!(record.get("severity"), Some("5"));
        assert_eq!(record.get("location_x"), Some("120"));
        assert_eq!(record.get("location_y"), Some("340"));
        assert_eq!(record.get("size"), Some("2.5"));
        assert_eq!(record.get("description"), Some(""));
    }

    #[test]
    fn test_check_constraint_failure_returns_to_editing() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Defects).unwrap();
        form.set("severity", "9").unwrap();
        let err = form.save().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(form.state(), SessionState::Editing);
    }

    // ==========================================================================
    // SESSION STATE TESTS
    // ==========================================================================

    #[test]
    fn test_edit_missing_record() {
        let mut db = db();
        let err = FormSession::open_edit(&mut db, Table::Smartphones, 42).err().unwrap();
        assert!(matches!(err, Error::NotFound { id: 42, .. }));
    }

    #[test]
    fn test_closed_session_rejects_changes() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Smartphones).unwrap();
        form.set("model_name", "X1").unwrap();
        form.set("manufacturer", "Acme").unwrap();
        let id = form.save().unwrap();

        assert!(matches!(form.set("model_name", "X2"), Err(Error::InvalidSession("closed"))));
        assert!(matches!(form.save(), Err(Error::InvalidSession("closed"))));
        assert_eq!(form.cancel(), Outcome::Committed(id));
    }

    #[test]
    fn test_unknown_and_read_only_fields() {
        let mut db = db();
        let id = add_smartphone(&mut db, "X1", "Acme");
        let mut form = FormSession::open_edit(&mut db, Table::Smartphones, id).unwrap();
        assert!(matches!(form.set("created_at", "now"), Err(Error::UnknownField { .. })));
        assert!(matches!(form.set("smartphone_id", "99"), Err(Error::ReadOnlyField(_))));
    }

    #[test]
    fn test_edit_deleted_record_fails_save() {
        let mut db = db();
        let id = add_smartphone(&mut db, "X1", "Acme");
        let mut form = FormSession::open_edit(&mut db, Table::Smartphones, id).unwrap();
        form.set("model_name", "X2").unwrap();
        // the session only holds a shared reference internally
        form.db.delete(Table::Smartphones, id).unwrap();
        assert!(matches!(form.save(), Err(Error::NotFound { .. })));
        assert_eq!(form.state(), SessionState::Editing);
    }

    // ==========================================================================
    // PASSWORD TESTS
    // ==========================================================================

    #[test]
    fn test_new_user_password_is_digested() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Users).unwrap();
        form.set("username", "ivan").unwrap();
        form.set("password_hash", "s3cret").unwrap();
        form.set("role", "inspector").unwrap();
        let id = form.save().unwrap();

        let record = db.load(Table::Users, id).unwrap();
        assert_ne!(record.get("password_hash"), Some("s3cret"));
        assert_eq!(record.get("password_hash"), Some(hash_password("s3cret").as_str()));

        let user = db.authenticate("ivan", "s3cret").unwrap().unwrap();
        assert_eq!(user.role, "inspector");
    }

    #[test]
    fn test_edit_user_keeps_password_when_blank() {
        let mut db = db();
        let mut form = FormSession::open_add(&mut db, Table::Users).unwrap();
        form.set("username", "ivan").unwrap();
        form.set("password_hash", "s3cret").unwrap();
        form.set("role", "viewer").unwrap();
        let id = form.save().unwrap();

        let mut form = FormSession::open_edit(&mut db, Table::Users, id).unwrap();
        assert_eq!(form.get("password_hash"), Some(""));
        form.set("full_name", "Ivan Petrov").unwrap();
        form.save().unwrap();
        assert!(db.authenticate("ivan", "s3cret").unwrap().is_some());

        let mut form = FormSession::open_edit(&mut db, Table::Users, id).unwrap();
        form.set("password_hash", "n3w").unwrap();
        form.save().unwrap();
        assert!(db.authenticate("ivan", "s3cret").unwrap().is_none());
        assert!(db.authenticate("ivan", "n3w").unwrap().is_some());
    }

    // ==========================================================================
    // PRE-EXISTING TABLE TESTS
    // ==========================================================================

    /// A database whose users table was created with two extra columns
    fn db_with_extended_users(dir: &tempfile::TempDir) -> Database {
        use diesel::{Connection, RunQueryDsl, SqliteConnection};

        let path = dir.path().join("legacy.db");
        {
            let mut conn = SqliteConnection::establish(&path.to_string_lossy()).unwrap();
            diesel::sql_query(
                "CREATE TABLE users (
                    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL CHECK(role IN ('admin', 'inspector', 'viewer')),
                    full_name TEXT,
                    email TEXT,
                    recovery_password TEXT,
                    badge_number TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )",
            )
            .execute(&mut conn)
            .unwrap();
        }
        Database::open_at(&path).unwrap()
    }

    #[test]
    fn test_unlisted_columns_are_bound_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = db_with_extended_users(&dir);
        let form = FormSession::open_add(&mut db, Table::Users).unwrap();

        let kind_of = |name: &str| form.bindings().iter().find(|b| b.name() == name).unwrap().kind;
        assert_eq!(kind_of("recovery_password"), ControlKind::Secret);
        assert_eq!(kind_of("badge_number"), ControlKind::Text);
    }

    #[test]
    fn test_unlisted_password_column_is_digested() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = db_with_extended_users(&dir);

        let mut form = FormSession::open_add(&mut db, Table::Users).unwrap();
        form.set("username", "ivan").unwrap();
        form.set("password_hash", "s3cret").unwrap();
        form.set("role", "inspector").unwrap();
        form.set("recovery_password", "plaintext-secret").unwrap();
        form.set("badge_number", "B-17").unwrap();
        let id = form.save().unwrap();

        let record = db.load(Table::Users, id).unwrap();
        assert_ne!(record.get("recovery_password"), Some("plaintext-secret"));
        assert_eq!(
            record.get("recovery_password"),
            Some(hash_password("plaintext-secret").as_str())
        );
        assert_eq!(record.get("badge_number"), Some("B-17"));

        // loading for edit never exposes the digest
        let form = FormSession::open_edit(&mut db, Table::Users, id).unwrap();
        assert_eq!(form.get("recovery_password"), Some(""));
        assert_eq!(form.get("badge_number"), Some("B-17"));
    }
}
