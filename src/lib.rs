//! Screencheck - smartphone screen inspection records
//!
//! Screencheck keeps smartphone models, inspections, the screen defects found
//! during them (scratch, chip, crack, discoloration, other) and defect images
//! in a SQLite file, together with the users allowed to edit them.
//!
//! # Overview
//!
//! Every table is edited through the same form machinery:
//!
//! 1. **Schema inspection**: the store reports the table's columns in order,
//!    with their declared type, nullability and primary key flag.
//! 2. **Form configuration**: each table has a static [`FormSchema`] that says
//!    how a field is entered (free text, secret, or one of a fixed list).
//! 3. **Form session**: a [`FormSession`] binds one field per column, loads the
//!    existing row when editing, validates required fields and writes a single
//!    parameterized INSERT or UPDATE.
//!
//! # Quick Start
//!
//! ```no_run
//! use screencheck::{Database, FormSession, Table};
//!
//! let mut db = Database::open_at("smartphone_defects.db")?;
//! let user = db.authenticate("admin", "admin123")?.expect("seeded admin");
//! println!("Hello, {}", user.display_name());
//!
//! let mut form = FormSession::open_add(&mut db, Table::Smartphones)?;
//! form.set("model_name", "X1")?;
//! form.set("manufacturer", "Acme")?;
//! let id = form.save()?;
//! drop(form);
//!
//! let phone = db.load(Table::Smartphones, id)?;
//! assert_eq!(phone.get("model_name"), Some("X1"));
//! # Ok::<(), screencheck::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`db`]: connection, bootstrap, statement execution, statistics
//! - [`forms`]: per-table form configuration
//! - [`session`]: add/edit form sessions
//! - [`sql`]: statement building with identifiers kept apart from values

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod inspect;
pub mod record;
pub mod schema;
pub mod session;
pub mod sql;
pub mod validate;

pub use auth::{hash_password, Role, User};
pub use config::Config;
pub use db::{Database, DbBreakdown, DbSummary};
pub use error::{Error, Result};
pub use forms::{ControlKind, FieldSpec, FormSchema, Table};
pub use inspect::ColumnDescriptor;
pub use record::Record;
pub use session::{FieldBinding, FormSession, Mode, Outcome, SessionState};
pub use sql::Statement;
