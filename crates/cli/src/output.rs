use std::io::{self, Write};

use serde_json::Value;

/// Print a command result.
///
/// Strings are printed as is, so that CSV and other preformatted output stays
/// readable. Everything else is printed as pretty JSON.
pub(crate) fn write<W: Write>(writer: &mut W, result: &Value) -> Result<(), io::Error> {
    match result {
        Value::Null => Ok(()),
        Value::String(text) => writeln!(writer, "{text}"),
        value => {
            serde_json::to_writer_pretty(&mut *writer, value)?;
            writeln!(writer)
        }
    }
}
