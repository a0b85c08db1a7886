//! Per-table form configuration
//!
//! Each known table has a unit struct implementing [`FormSchema`] that lists
//! its editable fields and how they are entered. The control kind of a field
//! is looked up here by (table, column name); nothing is inferred from the
//! spelling of a column name.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

pub const ROLE_OPTIONS: &[&str] = &["admin", "inspector", "viewer"];
pub const DEFECT_TYPE_OPTIONS: &[&str] = &["scratch", "chip", "crack", "discoloration", "other"];
pub const STATUS_OPTIONS: &[&str] = &["pending", "in_progress", "completed", "rejected"];
pub const OVERALL_RESULT_OPTIONS: &[&str] = &["pass", "fail", "conditional"];
pub const SEVERITY_OPTIONS: &[&str] = &["1", "2", "3", "4", "5"];

/// Columns filled by the store's `CURRENT_TIMESTAMP` default. Never on a form.
pub const AUTO_TIMESTAMP_COLUMNS: &[&str] =
    &["created_at", "uploaded_at", "detected_at", "inspection_date"];

/// How a field is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Free text
    Text,
    /// Masked input; the value is stored as a one-way digest
    Secret,
    /// One of a fixed, ordered list of values
    Choice(&'static [&'static str]),
}

impl ControlKind {
    pub fn is_secret(&self) -> bool {
        matches!(self, ControlKind::Secret)
    }

    pub fn options(&self) -> &'static [&'static str] {
        match self {
            ControlKind::Choice(options) => options,
            _ => &[],
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::Text => write!(f, "text"),
            ControlKind::Secret => write!(f, "secret"),
            ControlKind::Choice(options) => write!(f, "choice[{}]", options.join("|")),
        }
    }
}

/// One field of a table's form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: ControlKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: ControlKind::Text }
    }

    pub const fn secret(name: &'static str) -> Self {
        Self { name, kind: ControlKind::Secret }
    }

    pub const fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self { name, kind: ControlKind::Choice(options) }
    }
}

/// Static form layout of one table
pub trait FormSchema {
    const TABLE: Table;
    const PRIMARY_KEY: &'static str;
    const FIELDS: &'static [FieldSpec];
}

pub struct UsersForm;
pub struct SmartphonesForm;
pub struct InspectionsForm;
pub struct DefectsForm;
pub struct DefectImagesForm;

impl FormSchema for UsersForm {
    const TABLE: Table = Table::Users;
    const PRIMARY_KEY: &'static str = "user_id";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("user_id"),
        FieldSpec::text("username"),
        FieldSpec::secret("password_hash"),
        FieldSpec::choice("role", ROLE_OPTIONS),
        FieldSpec::text("full_name"),
        FieldSpec::text("email"),
    ];
}

impl FormSchema for SmartphonesForm {
    const TABLE: Table = Table::Smartphones;
    const PRIMARY_KEY: &'static str = "smartphone_id";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("smartphone_id"),
        FieldSpec::text("model_name"),
        FieldSpec::text("manufacturer"),
        FieldSpec::text("screen_size"),
        FieldSpec::text("resolution"),
    ];
}

impl FormSchema for InspectionsForm {
    const TABLE: Table = Table::Inspections;
    const PRIMARY_KEY: &'static str = "inspection_id";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("inspection_id"),
        FieldSpec::text("smartphone_id"),
        FieldSpec::text("inspector_id"),
        FieldSpec::choice("status", STATUS_OPTIONS),
        FieldSpec::choice("overall_result", OVERALL_RESULT_OPTIONS),
        FieldSpec::text("notes"),
        FieldSpec::text("image_path"),
    ];
}

impl FormSchema for DefectsForm {
    const TABLE: Table = Table::Defects;
    const PRIMARY_KEY: &'static str = "defect_id";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("defect_id"),
        FieldSpec::text("inspection_id"),
        FieldSpec::choice("defect_type", DEFECT_TYPE_OPTIONS),
        FieldSpec::choice("severity", SEVERITY_OPTIONS),
        FieldSpec::text("location_x"),
        FieldSpec::text("location_y"),
        FieldSpec::text("size"),
        FieldSpec::text("description"),
    ];
}

impl FormSchema for DefectImagesForm {
    const TABLE: Table = Table::DefectImages;
    const PRIMARY_KEY: &'static str = "image_id";
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("image_id"),
        FieldSpec::text("defect_id"),
        FieldSpec::text("image_path"),
        FieldSpec::text("thumbnail_path"),
    ];
}

/// The tables a form can be opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Smartphones,
    Inspections,
    Defects,
    DefectImages,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Smartphones,
        Table::Inspections,
        Table::Defects,
        Table::DefectImages,
        Table::Users,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Smartphones => "smartphones",
            Table::Inspections => "inspections",
            Table::Defects => "defects",
            Table::DefectImages => "defect_images",
        }
    }

    pub fn primary_key(self) -> &'static str {
        match self {
            Table::Users => UsersForm::PRIMARY_KEY,
            Table::Smartphones => SmartphonesForm::PRIMARY_KEY,
            Table::Inspections => InspectionsForm::PRIMARY_KEY,
            Table::Defects => DefectsForm::PRIMARY_KEY,
            Table::DefectImages => DefectImagesForm::PRIMARY_KEY,
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Table::Users => UsersForm::FIELDS,
            Table::Smartphones => SmartphonesForm::FIELDS,
            Table::Inspections => InspectionsForm::FIELDS,
            Table::Defects => DefectsForm::FIELDS,
            Table::DefectImages => DefectImagesForm::FIELDS,
        }
    }

    /// Only admins may open forms on this table
    pub fn is_admin_only(self) -> bool {
        matches!(self, Table::Users)
    }

    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::Schema(s.to_string()))
    }
}

/// Control kind for a column of `table`. Columns the form does not list are
/// secret when their name contains "password" and free text otherwise.
pub fn map(table: Table, column: &str) -> ControlKind {
    match table.field(column) {
        Some(field) => field.kind,
        None if column.contains("password") => ControlKind::Secret,
        None => ControlKind::Text,
    }
}

pub fn is_auto_timestamp(column: &str) -> bool {
    AUTO_TIMESTAMP_COLUMNS.contains(&column)
}
