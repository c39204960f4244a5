//! Wine table loading
//!
//! Reads the `;`-delimited red and white wine tables with polars, normalizes
//! their column names and folds the source file into the `wine_type_red`
//! indicator.

use crate::data::{Dataset, WineType, FEATURE_NAMES, N_FEATURES, TARGET_COLUMN};
use crate::error::{VintnerError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Red wine table file name inside the data directory
pub const RED_FILE: &str = "winequality-red.csv";

/// White wine table file name inside the data directory
pub const WHITE_FILE: &str = "winequality-white.csv";

/// Field delimiter of both tables
const SEPARATOR: u8 = b';';

/// Lower-case a raw header and replace spaces with underscores.
///
/// `"Free Sulfur Dioxide"` becomes `free_sulfur_dioxide`; `pH` becomes `ph`.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Canonical feature name for a normalized column, if it is a measurement
fn canonical_name(normalized: &str) -> Option<&'static str> {
    FEATURE_NAMES
        .iter()
        .find(|f| f.to_lowercase() == normalized)
        .copied()
}

/// Loader for the wine quality tables
#[derive(Debug, Clone)]
pub struct WineDataLoader {
    infer_schema_length: usize,
}

impl Default for WineDataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl WineDataLoader {
    /// Create a loader for `;`-delimited tables
    pub fn new() -> Self {
        Self {
            infer_schema_length: 100,
        }
    }

    /// Read a raw table
    pub fn load_table(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            VintnerError::DataError(format!(
                "cannot open {}: {}. Place {} and {} in the data directory",
                path.display(),
                e,
                RED_FILE,
                WHITE_FILE
            ))
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(SEPARATOR);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| VintnerError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Convert a raw table into a dataset tagged with `wine_type`
    pub fn to_dataset(&self, df: &DataFrame, wine_type: WineType, source: &Path) -> Result<Dataset> {
        // normalized name -> raw header
        let columns: HashMap<String, String> = df
            .get_column_names()
            .iter()
            .map(|raw| (normalize_column_name(raw.as_str()), raw.to_string()))
            .collect();

        let n_rows = df.height();
        let mut x = Array2::<f64>::zeros((n_rows, N_FEATURES));

        for (j, feature) in FEATURE_NAMES.iter().enumerate() {
            if *feature == "wine_type_red" {
                x.column_mut(j).fill(wine_type.indicator());
                continue;
            }
            let raw = columns
                .iter()
                .find(|(normalized, _)| canonical_name(normalized) == Some(*feature))
                .map(|(_, raw)| raw.as_str())
                .ok_or_else(|| {
                    VintnerError::DataError(format!("{}: missing column '{}'", source.display(), feature))
                })?;
            let values = numeric_column(df, raw, source)?;
            x.column_mut(j).assign(&values);
        }

        let target = columns.get(TARGET_COLUMN).ok_or_else(|| {
            VintnerError::DataError(format!("{}: missing column '{}'", source.display(), TARGET_COLUMN))
        })?;
        let y = numeric_column(df, target, source)?;

        Dataset::new(x, y)
    }

    /// Load a single tagged table
    pub fn load_wine_file(&self, path: &Path, wine_type: WineType) -> Result<Dataset> {
        let start = Instant::now();
        let df = self.load_table(path)?;
        let dataset = self.to_dataset(&df, wine_type, path)?;
        debug!(
            path = %path.display(),
            rows = dataset.n_samples(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded wine table"
        );
        Ok(dataset)
    }

    /// Load and concatenate the red and white tables from `dir`, red rows first
    pub fn load_dir(&self, dir: &Path) -> Result<Dataset> {
        let red = self.load_wine_file(&dir.join(RED_FILE), WineType::Red)?;
        let white = self.load_wine_file(&dir.join(WHITE_FILE), WineType::White)?;
        let combined = red.concat(&white)?;

        let (rows, cols) = combined.table_shape();
        info!(
            red = red.n_samples(),
            white = white.n_samples(),
            rows,
            cols,
            classes = ?combined.classes(),
            "Dataset loaded"
        );
        Ok(combined)
    }
}

/// Read a column as f64, rejecting nulls and non-numeric content
fn numeric_column(df: &DataFrame, name: &str, source: &Path) -> Result<Array1<f64>> {
    let series = df.column(name)?.as_materialized_series().clone();
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|e| VintnerError::DataError(format!("{}: column '{}' is not numeric: {}", source.display(), name, e)))?;
    let ca = casted.f64()?;

    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                VintnerError::DataError(format!(
                    "{}: column '{}' has a missing or non-numeric value at row {}",
                    source.display(),
                    name,
                    row
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "\"fixed acidity\";\"volatile acidity\";\"citric acid\";\"residual sugar\";\"chlorides\";\"free sulfur dioxide\";\"total sulfur dioxide\";\"density\";\"pH\";\"sulphates\";\"alcohol\";\"quality\"";

    fn write_table(dir: &Path, name: &str, rows: &[&str]) {
        let mut file = File::create(dir.join(name)).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("Fixed Acidity"), "fixed_acidity");
        assert_eq!(normalize_column_name("pH"), "ph");
        assert_eq!(canonical_name("ph"), Some("pH"));
        assert_eq!(canonical_name("quality"), None);
    }

    #[test]
    fn test_load_dir_tags_and_concatenates() {
        let dir = tempfile::tempdir().unwrap();
        write_table(
            dir.path(),
            RED_FILE,
            &[
                "7.4;0.7;0;1.9;0.076;11;34;0.9978;3.51;0.56;9.4;5",
                "7.8;0.88;0;2.6;0.098;25;67;0.9968;3.2;0.68;9.8;5",
            ],
        );
        write_table(
            dir.path(),
            WHITE_FILE,
            &["7;0.27;0.36;20.7;0.045;45;170;1.001;3;0.45;8.8;6"],
        );

        let ds = WineDataLoader::new().load_dir(dir.path()).unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.table_shape(), (3, 13));
        assert_eq!(ds.classes(), vec![5, 6]);

        let red_col = crate::data::feature_index("wine_type_red").unwrap();
        assert_eq!(ds.x()[[0, red_col]], 1.0);
        assert_eq!(ds.x()[[2, red_col]], 0.0);

        let ph = crate::data::feature_index("pH").unwrap();
        assert!((ds.x()[[0, ph]] - 3.51).abs() < 1e-12);
    }

    #[test]
    fn test_missing_file_is_actionable() {
        let dir = tempfile::tempdir().unwrap();
        let err = WineDataLoader::new().load_dir(dir.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(RED_FILE));
    }

    #[test]
    fn test_missing_column_named() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = File::create(dir.path().join(RED_FILE)).unwrap();
        writeln!(file, "\"fixed acidity\";\"quality\"").unwrap();
        writeln!(file, "7.4;5").unwrap();
        drop(file);

        let err = WineDataLoader::new()
            .load_wine_file(&dir.path().join(RED_FILE), WineType::Red)
            .unwrap_err();
        assert!(err.to_string().contains("volatile_acidity"));
    }
}
