use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rayon::prelude::*;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, info};

use crate::domain::TabError;

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    JSON,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// One cell of the dataset. Every loader maps its source types onto these
/// three variants; anything richer (booleans, nested JSON) becomes a string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Str(String),
}

impl Value {
    fn from_json(value: &JsonValue) -> Value {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Str(b.to_string()),
            JsonValue::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .unwrap_or_else(|| Value::Str(n.to_string())),
            JsonValue::String(s) => Value::Str(s.clone()),
            other => Value::Str(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Absent and null cells read as the empty string everywhere.
            Value::Null => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// The dataset: ordered column names plus row-major cells aligned to them.
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn load(path: PathBuf) -> Result<Self, TabError> {
        let file_info = Self::get_file_info(path)?;
        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        info!(
            "Loading {} ({} bytes, {:?})",
            name, file_info.file_size, file_info.file_type
        );

        match file_info.file_type {
            FileType::JSON => {
                let raw = fs::read_to_string(&file_info.path)?;
                Self::from_json_str(&name, &raw)
            }
            FileType::CSV => Self::from_frame(&name, Self::load_csv(&file_info.path)?),
            FileType::PARQUET => Self::from_frame(&name, Self::load_parquet(&file_info.path)?),
            FileType::ARROW => Self::from_frame(&name, Self::load_arrow(&file_info.path)?),
        }
    }

    /// Builds a table from a JSON array of objects. The column set is the
    /// key order of the first object; later rows missing a key hold `Null`
    /// there and keys outside the first row's set are dropped.
    pub fn from_json_str(name: &str, raw: &str) -> Result<Self, TabError> {
        let records: Vec<JsonMap<String, JsonValue>> = serde_json::from_str(raw)?;
        let columns: Vec<String> = records
            .first()
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| record.get(column).map(Value::from_json).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Table {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    /// Collects a lazy frame and extracts every column into `Value` cells,
    /// one rayon task per column, then reassembles them row-major.
    fn from_frame(name: &str, frame: LazyFrame) -> Result<Self, TabError> {
        let df = frame.collect()?;
        let columns: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let extracted: Result<Vec<Vec<Value>>, PolarsError> = columns
            .par_iter()
            .map(|column| Self::load_column(&df, column))
            .collect();
        let extracted = extracted?;

        let mut rows: Vec<Vec<Value>> = (0..df.height())
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for cells in extracted {
            for (row, value) in cells.into_iter().enumerate() {
                rows[row].push(value);
            }
        }

        debug!("Extracted {} columns x {} rows", columns.len(), rows.len());
        Ok(Table {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    fn load_column(df: &DataFrame, column: &str) -> Result<Vec<Value>, PolarsError> {
        let dtype = df.column(column)?.dtype().clone();
        if Self::is_numeric_type(&dtype) {
            let col = df.column(column)?.cast(&DataType::Float64)?;
            let series = col.f64()?;
            Ok(series
                .into_iter()
                .map(|v| v.map(Value::Number).unwrap_or(Value::Null))
                .collect())
        } else {
            // Everything non-numeric goes through the string cast; dates
            // come out in their ISO form, which the sort coercion picks up.
            let col = df.column(column)?.cast(&DataType::String)?;
            let series = col.str()?;
            Ok(series
                .into_iter()
                .map(|v| match v {
                    Some(s) => Value::Str(s.to_string()),
                    None => Value::Null,
                })
                .collect())
        }
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn detect_file_type(path: &Path) -> Result<FileType, TabError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            Some("JSON") => Ok(FileType::JSON),
            _ => Err(TabError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, TabError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TabError::FileNotFound,
            ErrorKind::PermissionDenied => TabError::PermissionDenied,
            _ => TabError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(TabError::LoadingFailed("Not a file!".into()));
        }

        let file_size = metadata.len();
        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size,
            file_type,
        })
    }

    fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.as_path().into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(
            PlPath::Local(path.as_path().into()),
            ScanArgsParquet::default(),
        )
    }

    fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.as_path().into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, row: usize) -> &[Value] {
        &self.rows[row]
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.rows[row][column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_come_from_the_first_record() {
        let table = Table::from_json_str(
            "t",
            r#"[{"id": 1, "name": "Bob"}, {"id": 2, "name": "ann"}]"#,
        )
        .unwrap();
        assert_eq!(table.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, 1), &Value::Str("ann".into()));
    }

    #[test]
    fn missing_keys_become_null_and_extra_keys_are_dropped() {
        let table = Table::from_json_str(
            "t",
            r#"[{"id": 1, "name": "Bob"}, {"id": 2, "email": "x@example.com"}]"#,
        )
        .unwrap();
        assert_eq!(table.columns().len(), 2);
        assert_eq!(table.value(1, 1), &Value::Null);
        assert!(table.column_index("email").is_none());
    }

    #[test]
    fn empty_dataset_has_no_columns() {
        let table = Table::from_json_str("t", "[]").unwrap();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn scalars_outside_the_cell_model_become_strings() {
        let table = Table::from_json_str(
            "t",
            r#"[{"flag": true, "tags": ["a", "b"], "none": null, "n": 1.5}]"#,
        )
        .unwrap();
        assert_eq!(table.value(0, 0), &Value::Str("true".into()));
        assert_eq!(table.value(0, 1), &Value::Str(r#"["a","b"]"#.into()));
        assert_eq!(table.value(0, 2), &Value::Null);
        assert_eq!(table.value(0, 3), &Value::Number(1.5));
    }

    #[test]
    fn null_displays_as_the_empty_string() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Number(100.0).to_string(), "100");
        assert_eq!(Value::Str("Bob".into()).to_string(), "Bob");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Table::from_json_str("t", "{not rows}"),
            Err(TabError::JsonError(_))
        ));
    }
}
