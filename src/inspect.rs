//! Column metadata read from the store

use crate::error::{Error, Result};
use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use diesel::sqlite::SqliteConnection;

/// One column of a table, in storage order
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// Needs a value before a save is accepted
    pub fn is_required(&self) -> bool {
        self.not_null && !self.is_primary_key
    }
}

#[derive(QueryableByName)]
struct PragmaColumn {
    #[diesel(sql_type = Text)]
    name: String,
    #[diesel(sql_type = Text)]
    declared_type: String,
    #[diesel(sql_type = Integer)]
    not_null: i32,
    #[diesel(sql_type = Integer)]
    pk: i32,
}

// The table name is bound, never spliced into the statement
const TABLE_INFO: &str = r#"
    SELECT name, type AS declared_type, "notnull" AS not_null, pk
    FROM pragma_table_info(?)
    ORDER BY cid
"#;

/// Ordered column descriptors of `table_name`
pub fn describe(conn: &mut SqliteConnection, table_name: &str) -> Result<Vec<ColumnDescriptor>> {
    let rows = diesel::sql_query(TABLE_INFO)
        .bind::<Text, _>(table_name)
        .load::<PragmaColumn>(conn)?;

    if rows.is_empty() {
        return Err(Error::Schema(table_name.to_string()));
    }

    Ok(rows
        .into_iter()
        .map(|c| ColumnDescriptor {
            name: c.name,
            declared_type: c.declared_type,
            not_null: c.not_null != 0,
            is_primary_key: c.pk != 0,
        })
        .collect())
}
