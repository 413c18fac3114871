//! Statically declared municipality record matching the warehouse table.
//!
//! The table mixes demographic counts, budget figures and the ten
//! analysis columns. Every column is coerced through the explicit
//! column-to-kind table below before it reaches the staging load; malformed
//! values surface as [`RowError`] instead of reaching the warehouse.

use csv::StringRecord;
use serde_json::{Map as JsonMap, Value as JsonValue, json};
use thiserror::Error;

/// Merge key shared by the staging and persistent tables.
pub const KEY_COLUMN: &str = "municipality_kod";

/// Value class of a warehouse column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nullable integer; a blank CSV cell is loaded as NULL.
    Integer,
    /// Nullable float.
    Float,
    /// Free text, including the ten analysis columns.
    Text,
}

impl ColumnKind {
    pub fn warehouse_type(self) -> &'static str {
        match self {
            ColumnKind::Integer => "INTEGER",
            ColumnKind::Float => "FLOAT",
            ColumnKind::Text => "STRING",
        }
    }
}

macro_rules! year_block {
    ($year:literal) => {
        &[
            (concat!("pocet_obyvatel_", $year), ColumnKind::Integer),
            (concat!("prirozeny_prirustek_", $year), ColumnKind::Integer),
            (concat!("prirustek_stehovanim_", $year), ColumnKind::Integer),
            (concat!("obyvatele_0_14_", $year), ColumnKind::Integer),
            (concat!("obyvatele_15_64_", $year), ColumnKind::Integer),
            (concat!("obyvatele_65_", $year), ColumnKind::Integer),
            (concat!("prijmy_", $year), ColumnKind::Float),
            (concat!("vydaje_", $year), ColumnKind::Float),
            (concat!("dokoncene_byty_", $year), ColumnKind::Integer),
            (concat!("ubytovaci_zarizeni_", $year), ColumnKind::Integer),
            (concat!("nezamestnanost_", $year), ColumnKind::Float),
            (concat!("narozeni_", $year), ColumnKind::Integer),
            (concat!("zemreli_", $year), ColumnKind::Integer),
            (concat!("pristehovali_", $year), ColumnKind::Integer),
            (concat!("vystehovali_", $year), ColumnKind::Integer),
            (concat!("zemedelska_puda_", $year), ColumnKind::Float),
            (concat!("nezemedelska_puda_", $year), ColumnKind::Float),
            (concat!("koeficient_ekologie_", $year), ColumnKind::Float),
            (concat!("prumerny_vek_", $year), ColumnKind::Float),
        ]
    };
}

const HEAD_COLUMNS: &[(&str, ColumnKind)] = &[
    ("obec", ColumnKind::Text),
    ("kraj", ColumnKind::Text),
    ("url", ColumnKind::Text),
    ("municipality_kod", ColumnKind::Integer),
    ("pou_kod", ColumnKind::Integer),
    ("okres_kod", ColumnKind::Integer),
];

const YEAR_2023: &[(&str, ColumnKind)] = year_block!("2023");
const YEAR_2022: &[(&str, ColumnKind)] = year_block!("2022");

const TAIL_COLUMNS: &[(&str, ColumnKind)] = &[
    ("posledni_dokumentace", ColumnKind::Text),
    ("posledni_dokumentace_datum", ColumnKind::Text),
    ("trend_1", ColumnKind::Text),
    ("trend_2", ColumnKind::Text),
    ("trend_3", ColumnKind::Text),
    ("trend_4", ColumnKind::Text),
    ("trend_5", ColumnKind::Text),
    ("problem_1", ColumnKind::Text),
    ("problem_2", ColumnKind::Text),
    ("problem_3", ColumnKind::Text),
    ("problem_4", ColumnKind::Text),
    ("problem_5", ColumnKind::Text),
];

/// The full warehouse column list in table order.
pub fn columns() -> impl Iterator<Item = (&'static str, ColumnKind)> {
    HEAD_COLUMNS
        .iter()
        .chain(YEAR_2023)
        .chain(YEAR_2022)
        .chain(TAIL_COLUMNS)
        .copied()
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error("enriched CSV is missing column `{name}`")]
    MissingColumn { name: &'static str },
    #[error("column `{column}` holds `{value}` which is not a valid {expected}")]
    Coerce {
        column: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("row has no municipality code")]
    MissingKey,
}

/// One typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Integer(Option<i64>),
    Float(Option<f64>),
    Text(String),
}

impl ColumnValue {
    fn to_json(&self) -> JsonValue {
        match self {
            ColumnValue::Integer(Some(v)) => json!(v),
            ColumnValue::Float(Some(v)) => json!(v),
            ColumnValue::Integer(None) | ColumnValue::Float(None) => JsonValue::Null,
            ColumnValue::Text(v) => json!(v),
        }
    }
}

/// One enriched municipality record, coerced and ordered per the column table.
#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityRow {
    values: Vec<(&'static str, ColumnValue)>,
}

impl MunicipalityRow {
    /// Coerce a CSV record into typed cells using the header row for lookup.
    /// The enriched CSV carries the columns in table order, but lookup is by
    /// name so column reordering upstream stays harmless.
    pub fn from_csv(headers: &StringRecord, record: &StringRecord) -> Result<Self, RowError> {
        let mut values = Vec::with_capacity(headers.len());

        for (name, kind) in columns() {
            let index = headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}') == name)
                .ok_or(RowError::MissingColumn { name })?;
            let raw = record.get(index).unwrap_or("").trim();
            values.push((name, coerce(name, kind, raw)?));
        }

        let row = Self { values };
        if row.municipality_code().is_none() {
            return Err(RowError::MissingKey);
        }
        Ok(row)
    }

    pub fn municipality_code(&self) -> Option<i64> {
        self.values.iter().find_map(|(name, value)| {
            if *name == KEY_COLUMN
                && let ColumnValue::Integer(code) = value
            {
                *code
            } else {
                None
            }
        })
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.values
            .iter()
            .find_map(|(name, value)| (*name == column).then_some(value))
    }

    /// JSON object for the staging-table load, NULLs preserved.
    pub fn to_json(&self) -> JsonMap<String, JsonValue> {
        let mut map = JsonMap::new();
        for (name, value) in &self.values {
            map.insert((*name).to_owned(), value.to_json());
        }
        map
    }
}

/// Explicit staging-table schema in table order, as warehouse field objects.
pub fn schema_json() -> JsonValue {
    let fields: Vec<JsonValue> = columns()
        .map(|(name, kind)| json!({ "name": name, "type": kind.warehouse_type() }))
        .collect();
    json!({ "fields": fields })
}

/// Atomic upsert-by-key statement: matched rows get every non-key column
/// updated, unmatched rows are inserted whole.
pub fn merge_statement(project: &str, dataset: &str, table: &str, staging: &str) -> String {
    let updates: Vec<String> = columns()
        .filter(|(name, _)| *name != KEY_COLUMN)
        .map(|(name, _)| format!("T.{name} = S.{name}"))
        .collect();

    format!(
        "MERGE `{project}.{dataset}.{table}` T\n\
         USING `{project}.{dataset}.{staging}` S\n\
         ON T.{KEY_COLUMN} = S.{KEY_COLUMN}\n\
         WHEN MATCHED THEN UPDATE SET {}\n\
         WHEN NOT MATCHED THEN INSERT ROW",
        updates.join(", ")
    )
}

fn coerce(name: &'static str, kind: ColumnKind, raw: &str) -> Result<ColumnValue, RowError> {
    match kind {
        ColumnKind::Text => Ok(ColumnValue::Text(raw.to_owned())),
        ColumnKind::Integer => {
            if raw.is_empty() {
                return Ok(ColumnValue::Integer(None));
            }
            if let Ok(v) = raw.parse::<i64>() {
                return Ok(ColumnValue::Integer(Some(v)));
            }
            // Spreadsheet exports render nullable integer columns as floats.
            if let Ok(v) = raw.parse::<f64>()
                && v.fract() == 0.0
            {
                return Ok(ColumnValue::Integer(Some(v as i64)));
            }
            Err(RowError::Coerce {
                column: name,
                value: raw.to_owned(),
                expected: "integer",
            })
        }
        ColumnKind::Float => {
            if raw.is_empty() {
                return Ok(ColumnValue::Float(None));
            }
            raw.parse::<f64>()
                .map(|v| ColumnValue::Float(Some(v)))
                .map_err(|_| RowError::Coerce {
                    column: name,
                    value: raw.to_owned(),
                    expected: "float",
                })
        }
    }
}
