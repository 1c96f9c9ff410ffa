//! Output formatting utilities

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::error::CommandError;
use crate::cli::OutputFormat;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat, is_list: bool) -> OutputFormat {
    match format {
        OutputFormat::Auto => {
            if is_list {
                OutputFormat::Table
            } else {
                OutputFormat::Text
            }
        }
        other => other,
    }
}

/// Print a value as JSON or YAML; returns false for other formats
pub fn print_structured<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> Result<bool, CommandError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)
                .map_err(|e| CommandError::usage(format!("cannot render JSON: {}", e)))?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value)
                .map_err(|e| CommandError::usage(format!("cannot render YAML: {}", e)))?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Print list rows as a table or CSV
pub fn print_rows<R: Tabled + Serialize>(rows: &[R], format: OutputFormat) -> Result<(), CommandError> {
    if print_structured(rows, format)? {
        return Ok(());
    }

    if format == OutputFormat::Csv {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| CommandError::Io(std::io::Error::other(e)))?;
        }
        writer.flush()?;
        return Ok(());
    }

    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{}", table);
    Ok(())
}
