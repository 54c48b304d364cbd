use crate::error::{Error, Result};
use polars::io::csv::read::NullValues;
use polars::io::mmap::MmapBytesReader;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Reads a delimited text table into an eager frame.
///
/// `\N` and empty fields become nulls, column types are inferred, and an
/// optional column subset is applied after the read so a missing column
/// surfaces as [`Error::MissingColumn`] rather than a parser failure.
pub fn load_table(path: &Path, delimiter: u8, columns: Option<&[&str]>) -> Result<DataFrame> {
    let df = read_options(delimiter)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| Error::DataSource {
            path: path.display().to_string(),
            source,
        })?;
    info!(path = %path.display(), rows = df.height(), "loaded table");
    project(df, columns, &path.display().to_string())
}

/// Same as [`load_table`] over any in-memory byte source.
pub fn load_table_from<R>(reader: R, delimiter: u8, columns: Option<&[&str]>) -> Result<DataFrame>
where
    R: MmapBytesReader + 'static,
{
    let df = CsvReader::new(reader)
        .with_options(read_options(delimiter))
        .finish()
        .map_err(|source| Error::DataSource {
            path: "<memory>".to_string(),
            source,
        })?;
    project(df, columns, "<memory>")
}

/// Writes `df` as a headered CSV, creating missing parent directories.
pub fn write_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    CsvWriter::new(File::create(path)?)
        .include_header(true)
        .finish(df)?;
    info!(path = %path.display(), rows = df.height(), "wrote table");
    Ok(())
}

fn read_options(delimiter: u8) -> CsvReadOptions {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1024))
        .map_parse_options(|opts| {
            opts.with_separator(delimiter)
                .with_null_values(Some(NullValues::AllColumnsSingle("\\N".into())))
        })
}

fn project(df: DataFrame, columns: Option<&[&str]>, path: &str) -> Result<DataFrame> {
    let Some(columns) = columns else {
        return Ok(df);
    };
    for column in columns {
        if df.get_column_index(column).is_none() {
            return Err(Error::MissingColumn {
                path: path.to_string(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(df.select(columns.iter().copied())?)
}
