//! # Dataset Loading
//!
//! A dataset is a directory with a fixed layout:
//!
//! ```text
//! <dataset>/subjects.tsv                              subject_id<TAB>group
//! <dataset>/regions.tsv                               name[<TAB>x<TAB>y<TAB>z]
//! <dataset>/connectivity/<metric>/<subject_id>.tsv    R x R, tab-separated, no header
//! ```
//!
//! The two tables are read eagerly with polars and validated against a strict
//! schema. Matrices are read on demand, one subject at a time, so only the
//! metric being analysed is ever held in memory.

use ndarray::Array2;
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SUBJECTS_FILE: &str = "subjects.tsv";
pub const REGIONS_FILE: &str = "regions.tsv";
pub const CONNECTIVITY_DIR: &str = "connectivity";

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to read connectivity matrix: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("The required column '{column}' was not found in '{file}'.")]
    ColumnNotFound { file: String, column: String },
    #[error("Missing or empty values were found in column '{column}' of '{file}'.")]
    MissingValues { file: String, column: String },
    #[error("Column '{column}' of '{file}' contains non-numeric or non-finite values.")]
    NotNumeric { file: String, column: String },
    #[error("'{0}' lists no rows.")]
    EmptyTable(String),
    #[error("Subject '{0}' is listed more than once.")]
    DuplicateSubject(String),
    #[error("Region coordinates need all of the columns x, y and z; '{0}' has only some.")]
    PartialCoordinates(String),
    #[error("'{path}' row {row}, column {column}: cannot parse '{value}' as a number.")]
    MatrixParse {
        path: String,
        row: usize,
        column: usize,
        value: String,
    },
    #[error("'{path}' row {row}, column {column}: off-diagonal entry is not finite.")]
    MatrixNonFinite {
        path: String,
        row: usize,
        column: usize,
    },
    #[error("'{path}' is {rows}x{cols}; connectivity matrices must be square.")]
    NotSquare {
        path: String,
        rows: usize,
        cols: usize,
    },
    #[error("'{path}' has dimension {found}, but the dataset defines {expected} regions.")]
    DimensionMismatch {
        path: String,
        found: usize,
        expected: usize,
    },
    #[error("No '{metric}' connectivity matrix for subject '{subject}'.")]
    MissingMatrix { subject: String, metric: String },
    #[error("Connectivity matrix has an inconsistent shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub group: String,
}

/// Ordered brain regions; their count fixes the matrix dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    pub names: Vec<String>,
    pub coords: Option<Vec<[f64; 3]>>,
}

impl RegionSet {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Anything that can supply subjects, regions and per-subject matrices.
pub trait ConnectivitySource {
    fn subjects(&self) -> &[Subject];

    fn regions(&self) -> &RegionSet;

    /// The R x R matrix of `subject` under `metric`.
    fn connectivity(&self, subject: &Subject, metric: &str) -> Result<Array2<f64>, LoaderError>;

    /// Positions in `subjects()` of every member of `group`, in subject order.
    fn group_indices(&self, group: &str) -> Vec<usize> {
        self.subjects()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.group == group)
            .map(|(i, _)| i)
            .collect()
    }
}

/// A dataset directory on disk.
#[derive(Debug, Clone)]
pub struct DatasetDir {
    root: PathBuf,
    subjects: Vec<Subject>,
    regions: RegionSet,
}

impl DatasetDir {
    /// Reads and validates `subjects.tsv` and `regions.tsv`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let root = root.as_ref().to_path_buf();
        let subjects = read_subjects(&root.join(SUBJECTS_FILE))?;
        let regions = read_regions(&root.join(REGIONS_FILE))?;
        log::info!(
            "Loaded dataset '{}': {} subjects, {} regions",
            root.display(),
            subjects.len(),
            regions.len()
        );
        Ok(Self {
            root,
            subjects,
            regions,
        })
    }

    pub fn matrix_path(&self, subject: &Subject, metric: &str) -> PathBuf {
        self.root
            .join(CONNECTIVITY_DIR)
            .join(metric)
            .join(format!("{}.tsv", subject.id))
    }
}

impl ConnectivitySource for DatasetDir {
    fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    fn regions(&self) -> &RegionSet {
        &self.regions
    }

    fn connectivity(&self, subject: &Subject, metric: &str) -> Result<Array2<f64>, LoaderError> {
        let path = self.matrix_path(subject, metric);
        if !path.is_file() {
            return Err(LoaderError::MissingMatrix {
                subject: subject.id.clone(),
                metric: metric.to_string(),
            });
        }
        let matrix = read_matrix(&path)?;
        check_dimension(&matrix, self.regions.len(), &path.display().to_string())?;
        Ok(matrix)
    }
}

/// A dataset held entirely in memory.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    subjects: Vec<Subject>,
    regions: RegionSet,
    matrices: HashMap<(String, String), Array2<f64>>,
}

impl InMemoryDataset {
    pub fn new(subjects: Vec<Subject>, regions: RegionSet) -> Result<Self, LoaderError> {
        check_unique_subjects(&subjects)?;
        Ok(Self {
            subjects,
            regions,
            matrices: HashMap::new(),
        })
    }

    /// Stores the `metric` matrix of `subject_id`, replacing any previous one.
    pub fn insert(
        &mut self,
        subject_id: &str,
        metric: &str,
        matrix: Array2<f64>,
    ) -> Result<(), LoaderError> {
        let label = format!("{subject_id}/{metric}");
        if matrix.nrows() != matrix.ncols() {
            return Err(LoaderError::NotSquare {
                path: label,
                rows: matrix.nrows(),
                cols: matrix.ncols(),
            });
        }
        check_dimension(&matrix, self.regions.len(), &label)?;
        self.matrices
            .insert((subject_id.to_string(), metric.to_string()), matrix);
        Ok(())
    }
}

impl ConnectivitySource for InMemoryDataset {
    fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    fn regions(&self) -> &RegionSet {
        &self.regions
    }

    fn connectivity(&self, subject: &Subject, metric: &str) -> Result<Array2<f64>, LoaderError> {
        self.matrices
            .get(&(subject.id.clone(), metric.to_string()))
            .cloned()
            .ok_or_else(|| LoaderError::MissingMatrix {
                subject: subject.id.clone(),
                metric: metric.to_string(),
            })
    }
}

fn check_dimension(matrix: &Array2<f64>, expected: usize, label: &str) -> Result<(), LoaderError> {
    if matrix.nrows() != expected {
        return Err(LoaderError::DimensionMismatch {
            path: label.to_string(),
            found: matrix.nrows(),
            expected,
        });
    }
    Ok(())
}

fn check_unique_subjects(subjects: &[Subject]) -> Result<(), LoaderError> {
    let mut seen = HashSet::new();
    for subject in subjects {
        if !seen.insert(subject.id.as_str()) {
            return Err(LoaderError::DuplicateSubject(subject.id.clone()));
        }
    }
    Ok(())
}

/// Reads a tab-separated table with every column kept as text, so identifiers
/// such as `007` survive unchanged.
fn read_table(path: &Path) -> Result<DataFrame, LoaderError> {
    let file = File::open(path).map_err(|source| LoaderError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;
    if df.height() == 0 {
        return Err(LoaderError::EmptyTable(path.display().to_string()));
    }
    Ok(df)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn text_column(df: &DataFrame, file: &str, name: &str) -> Result<Vec<String>, LoaderError> {
    if !has_column(df, name) {
        return Err(LoaderError::ColumnNotFound {
            file: file.to_string(),
            column: name.to_string(),
        });
    }
    let column = df.column(name)?.cast(&DataType::String)?;
    let missing = || LoaderError::MissingValues {
        file: file.to_string(),
        column: name.to_string(),
    };
    if column.null_count() > 0 {
        return Err(missing());
    }
    let values: Vec<String> = column
        .str()?
        .into_no_null_iter()
        .map(|v| v.trim().to_string())
        .collect();
    if values.iter().any(String::is_empty) {
        return Err(missing());
    }
    Ok(values)
}

fn numeric_column(df: &DataFrame, file: &str, name: &str) -> Result<Vec<f64>, LoaderError> {
    let column = df.column(name)?;
    if column.null_count() > 0 {
        return Err(LoaderError::MissingValues {
            file: file.to_string(),
            column: name.to_string(),
        });
    }
    let not_numeric = || LoaderError::NotNumeric {
        file: file.to_string(),
        column: name.to_string(),
    };
    // Unparseable text becomes null under a non-strict cast.
    let casted = column.cast(&DataType::Float64).map_err(|_| not_numeric())?;
    if casted.null_count() > 0 {
        return Err(not_numeric());
    }
    let values: Vec<f64> = casted.f64()?.into_no_null_iter().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(not_numeric());
    }
    Ok(values)
}

fn read_subjects(path: &Path) -> Result<Vec<Subject>, LoaderError> {
    let file = path.display().to_string();
    let df = read_table(path)?;
    let ids = text_column(&df, &file, "subject_id")?;
    let groups = text_column(&df, &file, "group")?;
    let subjects: Vec<Subject> = ids
        .into_iter()
        .zip(groups)
        .map(|(id, group)| Subject { id, group })
        .collect();
    check_unique_subjects(&subjects)?;
    Ok(subjects)
}

fn read_regions(path: &Path) -> Result<RegionSet, LoaderError> {
    let file = path.display().to_string();
    let df = read_table(path)?;
    let names = text_column(&df, &file, "name")?;

    let axes = ["x", "y", "z"];
    let present = axes.iter().filter(|a| has_column(&df, a)).count();
    let coords = match present {
        0 => None,
        3 => {
            let x = numeric_column(&df, &file, "x")?;
            let y = numeric_column(&df, &file, "y")?;
            let z = numeric_column(&df, &file, "z")?;
            Some(
                x.into_iter()
                    .zip(y)
                    .zip(z)
                    .map(|((x, y), z)| [x, y, z])
                    .collect(),
            )
        }
        _ => return Err(LoaderError::PartialCoordinates(file)),
    };
    Ok(RegionSet { names, coords })
}

/// Reads one square matrix. Diagonal entries may be non-finite (self
/// connectivity is often undefined); every other entry must be a finite number.
pub fn read_matrix(path: &Path) -> Result<Array2<f64>, LoaderError> {
    let label = path.display().to_string();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;

    let mut values = Vec::new();
    let mut rows = 0;
    let mut cols = 0;
    for record in reader.records() {
        let record = record?;
        cols = record.len();
        for (column, field) in record.iter().enumerate() {
            let value: f64 = field.trim().parse().map_err(|_| LoaderError::MatrixParse {
                path: label.clone(),
                row: rows,
                column,
                value: field.to_string(),
            })?;
            if !value.is_finite() && column != rows {
                return Err(LoaderError::MatrixNonFinite {
                    path: label.clone(),
                    row: rows,
                    column,
                });
            }
            values.push(value);
        }
        rows += 1;
    }
    if rows != cols {
        return Err(LoaderError::NotSquare {
            path: label,
            rows,
            cols,
        });
    }
    Ok(Array2::from_shape_vec((rows, cols), values)?)
}
