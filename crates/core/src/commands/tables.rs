use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use super::IfExists;
use crate::command::{CommandBehavior, CommandContext};
use crate::command_definitions::{CommandDefinition, ParameterDefinition, ParameterType};
use crate::error::{Error, Result};
use crate::parameter::{ParameterSet, ValidationProblem};
use crate::processor::Table;
use crate::registry::RegistryEntry;

pub(crate) fn entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::new(
            CommandDefinition::new("ReadTableFromDelimitedFile", "Read a table from a delimited text file")
                .parameter(ParameterDefinition::required("InputFile", ParameterType::InputFile))
                .parameter(ParameterDefinition::required("TableID", ParameterType::Identifier))
                .parameter(delimiter_parameter())
                .parameter(
                    ParameterDefinition::optional("HeaderLines", ParameterType::Integer)
                        .with_default("1")
                        .with_description("Lines before the data; the first holds column names"),
                )
                .parameter(IfExists::parameter("IfTableIDExists")),
            || Arc::new(ReadTableFromDelimitedFile),
        ),
        RegistryEntry::new(
            CommandDefinition::new("WriteTableToDelimitedFile", "Write a table to a delimited text file")
                .parameter(ParameterDefinition::required("TableID", ParameterType::Identifier))
                .parameter(ParameterDefinition::required("OutputFile", ParameterType::OutputFile))
                .parameter(delimiter_parameter()),
            || Arc::new(WriteTableToDelimitedFile),
        ),
        RegistryEntry::new(
            CommandDefinition::new("FreeTable", "Remove a table from the processor")
                .parameter(ParameterDefinition::required("TableID", ParameterType::Identifier)),
            || Arc::new(FreeTable),
        ),
    ]
}

fn delimiter_parameter() -> ParameterDefinition {
    ParameterDefinition::optional("Delimiter", ParameterType::String)
        .with_default(",")
        .with_description("Single character, or \\t for tab")
}

/// The delimiter byte, accepting `\t` for tab.
fn delimiter(params: &ParameterSet) -> std::result::Result<u8, String> {
    match params.str("Delimiter").unwrap_or(",") {
        "\\t" => Ok(b'\t'),
        text if text.len() == 1 && text.is_ascii() => Ok(text.as_bytes()[0]),
        text => Err(format!("Delimiter `{text}` is not a single ASCII character")),
    }
}

fn delimiter_problems(params: &ParameterSet) -> Vec<ValidationProblem> {
    match delimiter(params) {
        Ok(_) => Vec::new(),
        Err(problem) => vec![ValidationProblem::new(
            Some("Delimiter"),
            problem,
            "Specify one character such as , or ; or \\t",
        )],
    }
}

fn to_vec(record: &StringRecord) -> Vec<String> {
    record.iter().map(ToString::to_string).collect()
}

/// Read a delimited file. Column names come from the first header line, or
/// are generated as `Column1`, `Column2`, ... when there is none.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_table(path: &Path, id: &str, delimiter: u8, header_lines: usize) -> Result<Table> {
    let display = path.display().to_string();
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| Error::csv_error(&display, e))?;

    let mut columns = Vec::new();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::csv_error(&display, e))?;
        if i == 0 && header_lines > 0 {
            columns = to_vec(&record);
        } else if i >= header_lines {
            rows.push(to_vec(&record));
        }
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for n in columns.len()..width {
        columns.push(format!("Column{}", n + 1));
    }

    Ok(Table {
        id: id.to_string(),
        columns,
        rows,
        source: Some(path.to_path_buf()),
    })
}

/// Write a table with its column names as the first line.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_table(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    let display = path.display().to_string();
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| Error::csv_error(&display, e))?;

    writer
        .write_record(&table.columns)
        .map_err(|e| Error::csv_error(&display, e))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| Error::csv_error(&display, e))?;
    }
    writer
        .flush()
        .map_err(|e| Error::io_error("delimited", &display, e))
}

struct ReadTableFromDelimitedFile;

impl CommandBehavior for ReadTableFromDelimitedFile {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        let mut problems = delimiter_problems(params);
        if params.integer("HeaderLines").is_some_and(|n| n < 0) {
            problems.push(ValidationProblem::new(
                Some("HeaderLines"),
                "HeaderLines may not be negative",
                "Specify 0 or more header lines",
            ));
        }
        problems
    }

    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let path = params.require_path("InputFile")?;
        let id = params.require_str("TableID")?;
        let delimiter = delimiter(params).map_err(Error::Misc)?;
        let header_lines = usize::try_from(params.integer("HeaderLines").unwrap_or(1)).unwrap_or(0);

        let exists = ctx.workspace.has_table(id);
        let policy = IfExists::from_params(params, "IfTableIDExists");
        if !policy.should_store(ctx, "Table", id, exists, || Error::TableExists(id.to_string()))? {
            return Ok(());
        }

        let table = read_table(path, id, delimiter, header_lines)?;
        let count = table.rows.len();
        ctx.workspace.add_table(table);
        ctx.message(format!("Read table `{id}` with {count} rows"));
        Ok(())
    }
}

struct WriteTableToDelimitedFile;

impl CommandBehavior for WriteTableToDelimitedFile {
    fn validate(&self, params: &ParameterSet) -> Vec<ValidationProblem> {
        delimiter_problems(params)
    }

    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = params.require_str("TableID")?;
        let path = params.require_path("OutputFile")?;
        let delimiter = delimiter(params).map_err(Error::Misc)?;

        let table = ctx
            .workspace
            .table(id)
            .ok_or_else(|| Error::TableNotFound(id.to_string()))?;
        write_table(table, path, delimiter)?;
        ctx.message(format!("Wrote table `{id}` to {}", path.display()));
        Ok(())
    }
}

struct FreeTable;

impl CommandBehavior for FreeTable {
    fn run(&self, params: &ParameterSet, ctx: &mut CommandContext<'_>) -> Result<()> {
        let id = params.require_str("TableID")?;
        ctx.workspace
            .remove_table(id)
            .map(|_| ())
            .ok_or_else(|| Error::TableNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_table_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stations.csv");
        fs::write(&path, "id,name\nS1,North\nS2,South,extra\n").unwrap();

        let table = read_table(&path, "Stations", b',', 1).unwrap();
        assert_eq!(table.columns, vec!["id", "name", "Column3"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.column_values("name").unwrap(), vec!["North", "South"]);
    }

    #[test]
    fn test_read_table_without_header_and_skipped_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "a;b\n1;2\n").unwrap();

        let table = read_table(&path, "T", b';', 0).unwrap();
        assert_eq!(table.columns, vec!["Column1", "Column2"]);
        assert_eq!(table.rows.len(), 2);

        let table = read_table(&path, "T", b';', 2).unwrap();
        assert_eq!(table.columns, vec!["a", "b"]);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_write_then_read_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        let table = Table {
            id: "T".to_string(),
            columns: vec!["x".to_string(), "y".to_string()],
            rows: vec![vec!["1".to_string(), "a, b".to_string()]],
            source: None,
        };

        write_table(&table, &path, b'\t').unwrap();
        let read = read_table(&path, "T", b'\t', 1).unwrap();
        assert_eq!(read.columns, table.columns);
        assert_eq!(read.rows, table.rows);
    }

    #[test]
    fn test_delimiter_parameter() {
        let mut params = ParameterSet::new();
        assert_eq!(delimiter(&params), Ok(b','));

        params.insert("Delimiter", "\\t".into());
        assert_eq!(delimiter(&params), Ok(b'\t'));

        params.insert("Delimiter", "::".into());
        assert!(delimiter(&params).is_err());
        assert_eq!(delimiter_problems(&params).len(), 1);
    }
}
