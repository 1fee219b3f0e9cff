//! # Reporting
//!
//! Every evaluator invocation becomes one `CurveFigure`. Reporters receive
//! the figures as they are produced; the complete list is also returned to the
//! caller as an `AnalysisReport`.

mod svg;
mod table;

use crate::evaluate::{Curve, CurveSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

pub use svg::SvgReporter;
pub use table::TsvReporter;

pub const X_LABEL: &str = "Train size";
pub const Y_LABEL: &str = "Accuracy";
/// Headroom added above the highest mean accuracy on the y-axis.
pub const Y_HEADROOM: f64 = 0.1;
pub const FONT_SIZE: u32 = 16;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to write curve table: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to serialize report to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Failed to draw figure '{figure}': {message}")]
    Plot { figure: String, message: String },
}

/// One accuracy-vs-train-size chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveFigure {
    pub title: String,
    /// File stem for outputs derived from this figure.
    pub slug: String,
    pub metric: String,
    /// The groups being told apart: every configured group for the
    /// full-set learning curve, exactly two for a pairwise figure.
    pub groups: Vec<String>,
    pub x_label: String,
    pub y_label: String,
    pub train_sizes: Vec<f64>,
    pub curves: Vec<Curve>,
}

impl CurveFigure {
    /// The full-set learning-curve figure of `metric`.
    pub fn learning_curve(metric: &str, groups: &[String], set: CurveSet) -> Self {
        Self::new(learning_curve_title(metric), metric, groups.to_vec(), set)
    }

    /// The figure for one unordered pair of groups under `metric`.
    pub fn pairwise(metric: &str, group_i: &str, group_j: &str, set: CurveSet) -> Self {
        Self::new(
            pairwise_title(metric, group_i, group_j),
            metric,
            vec![group_i.to_string(), group_j.to_string()],
            set,
        )
    }

    fn new(title: String, metric: &str, groups: Vec<String>, set: CurveSet) -> Self {
        Self {
            slug: slugify(&title),
            title,
            metric: metric.to_string(),
            groups,
            x_label: X_LABEL.to_string(),
            y_label: Y_LABEL.to_string(),
            train_sizes: set.train_sizes,
            curves: set.curves,
        }
    }

    /// Largest finite mean accuracy across all curves.
    pub fn max_accuracy(&self) -> Option<f64> {
        self.accuracies().reduce(f64::max)
    }

    pub fn min_accuracy(&self) -> Option<f64> {
        self.accuracies().reduce(f64::min)
    }

    /// Upper y-limit: the data maximum plus `Y_HEADROOM`.
    pub fn y_upper(&self) -> f64 {
        self.max_accuracy().unwrap_or(1.0) + Y_HEADROOM
    }

    fn accuracies(&self) -> impl Iterator<Item = f64> + '_ {
        self.curves
            .iter()
            .flat_map(|c| c.mean_accuracy.iter().copied())
            .filter(|v| v.is_finite())
    }
}

pub(crate) fn learning_curve_title(metric: &str) -> String {
    format!("Classification {metric}")
}

pub(crate) fn pairwise_title(metric: &str, group_i: &str, group_j: &str) -> String {
    format!("Classification {group_i}_{group_j}_{metric}")
}

/// Lower-case file stem: alphanumerics kept, every other run becomes `_`.
pub(crate) fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

/// Receives each figure once, in production order.
pub trait Reporter {
    fn report(&mut self, figure: &CurveFigure) -> Result<(), ReportError>;

    /// Called once after the last figure.
    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Fans every figure out to several reporters.
#[derive(Default)]
pub struct MultiReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl MultiReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

}

impl Reporter for MultiReporter {
    fn report(&mut self, figure: &CurveFigure) -> Result<(), ReportError> {
        self.reporters.iter_mut().try_for_each(|r| r.report(figure))
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.reporters.iter_mut().try_for_each(|r| r.finish())
    }
}

/// Every figure of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub figures: Vec<CurveFigure>,
}

impl AnalysisReport {
    pub fn figure(&self, title: &str) -> Option<&CurveFigure> {
        self.figures.iter().find(|f| f.title == title)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_figure() -> CurveFigure {
        CurveFigure::pairwise(
            "pc",
            "avn",
            "v",
            CurveSet {
                train_sizes: vec![0.2, 0.5, 0.8],
                curves: vec![
                    Curve {
                        classifier: "SVC".to_string(),
                        mean_accuracy: vec![0.5, 0.6, 0.7],
                    },
                    Curve {
                        classifier: "LDA".to_string(),
                        mean_accuracy: vec![0.55, 0.65, 0.8],
                    },
                ],
            },
        )
    }

    #[test]
    fn titles_and_slugs() {
        let figure = sample_figure();
        assert_eq!(figure.title, "Classification avn_v_pc");
        assert_eq!(figure.slug, "classification_avn_v_pc");
        assert_eq!(figure.groups, vec!["avn", "v"]);

        let full = CurveFigure::learning_curve(
            "gsc",
            &["avn".to_string(), "v".to_string(), "av".to_string()],
            CurveSet {
                train_sizes: vec![10.0],
                curves: Vec::new(),
            },
        );
        assert_eq!(full.title, "Classification gsc");
        assert_eq!(full.slug, "classification_gsc");
    }

    #[test]
    fn y_limit_leaves_headroom_above_data() {
        let figure = sample_figure();
        assert_eq!(figure.max_accuracy(), Some(0.8));
        assert_eq!(figure.min_accuracy(), Some(0.5));
        assert!((figure.y_upper() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Classification a b/c"), "classification_a_b_c");
        assert_eq!(slugify("  x--y  "), "x_y");
    }

    #[test]
    fn report_round_trips_through_toml() {
        let report = AnalysisReport {
            figures: vec![sample_figure()],
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.toml");
        report.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: AnalysisReport = toml::from_str(&text).unwrap();
        assert_eq!(back, report);
        assert!(back.figure("Classification avn_v_pc").is_some());
    }
}
