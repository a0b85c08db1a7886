//! Statement building
//!
//! Two kinds of input end up in a statement and they never mix:
//!
//! - [`Ident`]: table and column names. Only built from [`Table`] and
//!   [`ColumnDescriptor`], i.e. from schema metadata, and always quoted.
//! - [`Param`]: values typed by the user. Only ever bound to a `?` placeholder.

use crate::auth::hash_password;
use crate::forms::Table;
use crate::inspect::ColumnDescriptor;
use crate::session::{FieldBinding, Mode};

/// A quoted SQL identifier taken from schema metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    name: String,
}

impl Ident {
    pub fn table(table: Table) -> Self {
        Self { name: table.name().to_string() }
    }

    pub fn primary_key(table: Table) -> Self {
        Self { name: table.primary_key().to_string() }
    }

    pub fn column(column: &ColumnDescriptor) -> Self {
        Self { name: column.name.clone() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"name"`, for use as an identifier
    fn quoted(&self) -> String {
        format!("\"{}\"", self.name.replace('"', "\"\""))
    }

    /// `'name'`, for use as a JSON key inside `json_object`
    fn literal(&self) -> String {
        format!("'{}'", self.name.replace('\'', "''"))
    }
}

/// A bound value
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Field value; `None` binds SQL NULL
    Text(Option<String>),
    /// Record identifier
    Id(i64),
}

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Param>,
    /// Column order of the rows a SELECT returns; empty for writes
    pub columns: Vec<String>,
}

impl Statement {
    fn write(sql: String, params: Vec<Param>) -> Self {
        Self { sql, params, columns: Vec::new() }
    }
}

/// Value a binding contributes to a write, or `None` when the binding is left
/// out of the statement entirely.
fn bound_value(mode: Mode, binding: &FieldBinding) -> Option<Param> {
    if binding.read_only {
        return None;
    }
    let value = binding.value.trim();
    if binding.kind.is_secret() {
        return match (value.is_empty(), mode) {
            // blank secret on edit keeps the stored digest
            (true, Mode::Edit(_)) => None,
            (true, Mode::Add) => Some(Param::Text(None)),
            (false, _) => Some(Param::Text(Some(hash_password(&binding.value)))),
        };
    }
    if value.is_empty() {
        Some(Param::Text(None))
    } else {
        Some(Param::Text(Some(binding.value.clone())))
    }
}

/// INSERT (add mode) or UPDATE (edit mode) for the bindings of a form
pub fn build(table: Table, mode: Mode, bindings: &[FieldBinding]) -> Statement {
    let (columns, mut params): (Vec<Ident>, Vec<Param>) = bindings
        .iter()
        .filter_map(|b| bound_value(mode, b).map(|p| (Ident::column(&b.column), p)))
        .unzip();
    let target = Ident::table(table).quoted();

    match mode {
        Mode::Add => {
            if columns.is_empty() {
                return Statement::write(format!("INSERT INTO {} DEFAULT VALUES", target), params);
            }
            let names: Vec<String> = columns.iter().map(Ident::quoted).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            Statement::write(
                format!("INSERT INTO {} ({}) VALUES ({})", target, names.join(", "), placeholders),
                params,
            )
        }
        Mode::Edit(id) => {
            let key = Ident::primary_key(table).quoted();
            let assignments = if columns.is_empty() {
                // touch the row so a missing record still reports zero changes
                format!("{key} = {key}")
            } else {
                columns
                    .iter()
                    .map(|c| format!("{} = ?", c.quoted()))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            params.push(Param::Id(id));
            Statement::write(
                format!("UPDATE {} SET {} WHERE {} = ?", target, assignments, key),
                params,
            )
        }
    }
}

fn json_projection(columns: &[ColumnDescriptor]) -> String {
    let pairs: Vec<String> = columns
        .iter()
        .map(Ident::column)
        .map(|c| format!("{}, {}", c.literal(), c.quoted()))
        .collect();
    format!("json_object({}) AS record", pairs.join(", "))
}

/// One row by primary key, rendered as a JSON object
pub fn select_one(table: Table, columns: &[ColumnDescriptor], id: i64) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = ?",
            json_projection(columns),
            Ident::table(table).quoted(),
            Ident::primary_key(table).quoted()
        ),
        params: vec![Param::Id(id)],
        columns: columns.iter().map(|c| c.name.clone()).collect(),
    }
}

/// Every row in primary key order, rendered as JSON objects
pub fn select_all(table: Table, columns: &[ColumnDescriptor]) -> Statement {
    Statement {
        sql: format!(
            "SELECT {} FROM {} ORDER BY {}",
            json_projection(columns),
            Ident::table(table).quoted(),
            Ident::primary_key(table).quoted()
        ),
        params: Vec::new(),
        columns: columns.iter().map(|c| c.name.clone()).collect(),
    }
}

/// Delete one row by primary key
pub fn delete(table: Table, id: i64) -> Statement {
    Statement::write(
        format!(
            "DELETE FROM {} WHERE {} = ?",
            Ident::table(table).quoted(),
            Ident::primary_key(table).quoted()
        ),
        vec![Param::Id(id)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::{map, ControlKind};

    fn column(name: &str, not_null: bool, pk: bool) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            declared_type: "TEXT".to_string(),
            not_null,
            is_primary_key: pk,
        }
    }

    fn binding(table: Table, name: &str, value: &str) -> FieldBinding {
        FieldBinding {
            column: column(name, false, false),
            kind: map(table, name),
            value: value.to_string(),
            read_only: false,
        }
    }

    fn text(value: &str) -> Param {
        Param::Text(Some(value.to_string()))
    }

    // ==========================================================================
    // INSERT / UPDATE TESTS
    // ==========================================================================

    #[test]
    fn test_insert_uses_placeholders() {
        let bindings = vec![
            binding(Table::Smartphones, "model_name", "X1"),
            binding(Table::Smartphones, "manufacturer", "Acme"),
        ];
        let stmt = build(Table::Smartphones, Mode::Add, &bindings);
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "smartphones" ("model_name", "manufacturer") VALUES (?, ?)"#
        );
        assert_eq!(stmt.params, vec![text("X1"), text("Acme")]);
    }

    #[test]
    fn test_user_data_never_enters_sql_text() {
        let hostile = "x'); DROP TABLE smartphones; --";
        let bindings = vec![binding(Table::Smartphones, "model_name", hostile)];
        let stmt = build(Table::Smartphones, Mode::Add, &bindings);
        assert!(!stmt.sql.contains("DROP"));
        assert_eq!(stmt.params, vec![text(hostile)]);
    }

    #[test]
    fn test_blank_value_binds_null() {
        let bindings = vec![
            binding(Table::Smartphones, "model_name", "X1"),
            binding(Table::Smartphones, "resolution", "   "),
        ];
        let stmt = build(Table::Smartphones, Mode::Add, &bindings);
        assert_eq!(stmt.params, vec![text("X1"), Param::Text(None)]);
    }

    #[test]
    fn test_update_appends_id() {
        let bindings = vec![
            binding(Table::Inspections, "status", "completed"),
            binding(Table::Inspections, "notes", "ok"),
        ];
        let stmt = build(Table::Inspections, Mode::Edit(4), &bindings);
        assert_eq!(
            stmt.sql,
            r#"UPDATE "inspections" SET "status" = ?, "notes" = ? WHERE "inspection_id" = ?"#
        );
        assert_eq!(stmt.params, vec![text("completed"), text("ok"), Param::Id(4)]);
    }

    #[test]
    fn test_read_only_binding_left_out() {
        let mut key = binding(Table::Smartphones, "smartphone_id", "9");
        key.read_only = true;
        let bindings = vec![key, binding(Table::Smartphones, "model_name", "X2")];
        let stmt = build(Table::Smartphones, Mode::Edit(9), &bindings);
        assert_eq!(
            stmt.sql,
            r#"UPDATE "smartphones" SET "model_name" = ? WHERE "smartphone_id" = ?"#
        );
    }

    #[test]
    fn test_update_with_nothing_to_set() {
        let stmt = build(Table::Defects, Mode::Edit(1), &[]);
        assert_eq!(
            stmt.sql,
            r#"UPDATE "defects" SET "defect_id" = "defect_id" WHERE "defect_id" = ?"#
        );
        assert_eq!(stmt.params, vec![Param::Id(1)]);
    }

    #[test]
    fn test_insert_with_nothing_to_set() {
        let stmt = build(Table::Defects, Mode::Add, &[]);
        assert_eq!(stmt.sql, r#"INSERT INTO "defects" DEFAULT VALUES"#);
        assert!(stmt.params.is_empty());
    }

    // ==========================================================================
    // SECRET FIELD TESTS
    // ==========================================================================

    #[test]
    fn test_secret_is_hashed() {
        let pw = binding(Table::Users, "password_hash", "hunter2");
        assert_eq!(pw.kind, ControlKind::Secret);
        let stmt = build(Table::Users, Mode::Add, &[pw]);
        assert_eq!(stmt.params, vec![text(&hash_password("hunter2"))]);
        assert_ne!(stmt.params, vec![text("hunter2")]);
    }

    #[test]
    fn test_blank_secret_on_edit_is_kept() {
        let bindings = vec![
            binding(Table::Users, "username", "alice"),
            binding(Table::Users, "password_hash", ""),
        ];
        let stmt = build(Table::Users, Mode::Edit(2), &bindings);
        assert_eq!(stmt.sql, r#"UPDATE "users" SET "username" = ? WHERE "user_id" = ?"#);
        assert_eq!(stmt.params, vec![text("alice"), Param::Id(2)]);
    }

    // ==========================================================================
    // SELECT / DELETE TESTS
    // ==========================================================================

    #[test]
    fn test_select_one() {
        let columns = vec![column("image_id", false, true), column("image_path", true, false)];
        let stmt = select_one(Table::DefectImages, &columns, 5);
        assert_eq!(
            stmt.sql,
            r#"SELECT json_object('image_id', "image_id", 'image_path', "image_path") AS record FROM "defect_images" WHERE "image_id" = ?"#
        );
        assert_eq!(stmt.params, vec![Param::Id(5)]);
        assert_eq!(stmt.columns, vec!["image_id", "image_path"]);
    }

    #[test]
    fn test_select_all_orders_by_key() {
        let columns = vec![column("user_id", false, true)];
        let stmt = select_all(Table::Users, &columns);
        assert!(stmt.sql.ends_with(r#"FROM "users" ORDER BY "user_id""#));
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_delete() {
        let stmt = delete(Table::Smartphones, 3);
        assert_eq!(stmt.sql, r#"DELETE FROM "smartphones" WHERE "smartphone_id" = ?"#);
        assert_eq!(stmt.params, vec![Param::Id(3)]);
    }

    #[test]
    fn test_identifier_quoting() {
        let odd = column("we\"ird'", false, false);
        let ident = Ident::column(&odd);
        assert_eq!(ident.quoted(), "\"we\"\"ird'\"");
        assert_eq!(ident.literal(), "'we\"ird'''");
    }
}
