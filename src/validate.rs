//! Required-field check run before every save

use crate::error::{Error, Result};
use crate::session::{FieldBinding, Mode};

/// Reject the save if a required column is blank.
///
/// Required means declared NOT NULL and not the primary key. The first blank
/// field in column order is reported. A blank secret on edit keeps the stored
/// digest and passes.
pub fn validate(mode: Mode, bindings: &[FieldBinding]) -> Result<()> {
    for binding in bindings {
        if !binding.column.is_required() || !binding.value.trim().is_empty() {
            continue;
        }
        if binding.kind.is_secret() && mode.is_edit() {
            continue;
        }
        return Err(Error::MissingField(binding.column.name.clone()));
    }
    Ok(())
}
