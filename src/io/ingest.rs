//! CSV ingest for the source series.
//!
//! This module is responsible for turning the source CSV files into raw
//! [`Observation`]s that the aligner can collapse.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Missing files are not errors**: an absent file leaves the source
//!   unsupplied, and the aligner substitutes its fallback
//! - **Separation of concerns**: no estimation logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;

use crate::data::{Observation, RawSources, SourceKind};
use crate::error::AppError;

/// Where each source lives inside a data directory.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile {
    pub kind: SourceKind,
    pub file_name: &'static str,
    pub value_column: &'static str,
}

/// File layout of the source directory.
pub const SOURCE_FILES: [SourceFile; 7] = [
    SourceFile {
        kind: SourceKind::Official,
        file_name: "us_pop_official.csv",
        value_column: "value",
    },
    SourceFile {
        kind: SourceKind::HousingUnits,
        file_name: "us_housing_units.csv",
        value_column: "value",
    },
    SourceFile {
        kind: SourceKind::OccupancyRate,
        file_name: "occupancy_pph.csv",
        value_column: "occupancy_rate",
    },
    SourceFile {
        kind: SourceKind::PersonsPerHousehold,
        file_name: "occupancy_pph.csv",
        value_column: "persons_per_household",
    },
    SourceFile {
        kind: SourceKind::Births,
        file_name: "us_births.csv",
        value_column: "births",
    },
    SourceFile {
        kind: SourceKind::Deaths,
        file_name: "us_deaths.csv",
        value_column: "deaths",
    },
    SourceFile {
        kind: SourceKind::NetMigration,
        file_name: "us_netmig.csv",
        value_column: "net_mig",
    },
];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Observations read from one value column.
#[derive(Debug, Clone)]
pub struct IngestedColumn {
    pub observations: Vec<Observation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Everything read from a source directory.
#[derive(Debug, Clone, Default)]
pub struct SourceLoad {
    pub raw: RawSources,
    pub missing_files: Vec<PathBuf>,
    pub row_errors: Vec<(SourceKind, RowError)>,
}

/// Load every source file found in `dir`.
pub fn load_sources(dir: &Path) -> Result<SourceLoad, AppError> {
    if !dir.is_dir() {
        return Err(AppError::new(
            2,
            format!("Data directory '{}' does not exist.", dir.display()),
        ));
    }
    let mut load = SourceLoad::default();

    for spec in SOURCE_FILES {
        let path = dir.join(spec.file_name);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::warn!("{}: file not found ({})", spec.kind.name(), path.display());
                if !load.missing_files.contains(&path) {
                    load.missing_files.push(path);
                }
                continue;
            }
            Err(e) => {
                return Err(AppError::new(
                    2,
                    format!("Failed to open CSV '{}': {e}", path.display()),
                ));
            }
        };

        let column = read_observations(file, spec.value_column)
            .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))?;

        for err in &column.row_errors {
            log::warn!("{}:{}: {}", path.display(), err.line, err.message);
        }
        log::info!(
            "{}: {} of {} rows read from {}",
            spec.kind.name(),
            column.observations.len(),
            column.rows_read,
            path.display()
        );

        load.row_errors
            .extend(column.row_errors.into_iter().map(|e| (spec.kind, e)));
        load.raw.insert(spec.kind, column.observations);
    }

    Ok(load)
}

/// Read one value column keyed by either a `date` or a `year` column.
pub fn read_observations<R: Read>(reader: R, value_column: &str) -> Result<IngestedColumn, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let key = if let Some(&idx) = header_map.get("date") {
        KeyColumn::Date(idx)
    } else if let Some(&idx) = header_map.get("year") {
        KeyColumn::Year(idx)
    } else {
        return Err(AppError::new(
            2,
            "Missing required key column: `DATE` or `year`",
        ));
    };

    let value_idx = *header_map
        .get(&normalize_header_name(value_column))
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{value_column}`")))?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header line, then 1-based line numbers.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, key, value_idx) {
            Ok(obs) => observations.push(obs),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(IngestedColumn {
        observations,
        row_errors,
        rows_read,
    })
}

#[derive(Debug, Clone, Copy)]
enum KeyColumn {
    Date(usize),
    Year(usize),
}

fn parse_row(record: &StringRecord, key: KeyColumn, value_idx: usize) -> Result<Observation, String> {
    let value = get_field(record, value_idx)
        .ok_or_else(|| "Missing value.".to_string())
        .and_then(parse_f64)?;

    match key {
        KeyColumn::Date(idx) => {
            let raw = get_field(record, idx).ok_or_else(|| "Missing date.".to_string())?;
            Ok(Observation::dated(parse_date(raw)?, value))
        }
        KeyColumn::Year(idx) => {
            let raw = get_field(record, idx).ok_or_else(|| "Missing year.".to_string())?;
            Ok(Observation::annual(parse_year(raw)?, value))
        }
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // pandas writes `YYYY-MM-DD`; timestamps with a time part are cut at the date.
    let s = s.split([' ', 'T']).next().unwrap_or(s);
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, YYYY/MM/DD, DD/MM/YYYY."
    ))
}

fn parse_year(s: &str) -> Result<i32, String> {
    if let Ok(y) = s.parse::<i32>() {
        return Ok(y);
    }
    // Year columns round-tripped through floats come back as `2000.0`.
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i32::MAX as f64 => Ok(v as i32),
        _ => Err(format!("Invalid year '{s}'.")),
    }
}

fn parse_f64(s: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid number '{s}'."))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value '{s}'."))
    }
}
