use super::{CurveFigure, ReportError, Reporter};
use std::fs::File;
use std::path::{Path, PathBuf};

const HEADER: [&str; 5] = ["figure", "metric", "classifier", "train_size", "mean_accuracy"];

/// Appends every curve point of every figure to one tab-separated table.
pub struct TsvReporter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl TsvReporter {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)?;
        writer.write_record(HEADER)?;
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for TsvReporter {
    fn report(&mut self, figure: &CurveFigure) -> Result<(), ReportError> {
        for curve in &figure.curves {
            for (size, accuracy) in figure.train_sizes.iter().zip(&curve.mean_accuracy) {
                let size = size.to_string();
                let accuracy = accuracy.to_string();
                self.writer.write_record([
                    figure.slug.as_str(),
                    figure.metric.as_str(),
                    curve.classifier.as_str(),
                    size.as_str(),
                    accuracy.as_str(),
                ])?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.writer.flush()?;
        log::info!("Wrote curve table to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_figure;

    #[test]
    fn writes_header_and_one_row_per_point() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = TsvReporter::create(dir.path().join("curves.tsv")).unwrap();
        reporter.report(&sample_figure()).unwrap();
        reporter.finish().unwrap();

        let text = std::fs::read_to_string(reporter.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 3);
        assert_eq!(lines[0], "figure\tmetric\tclassifier\ttrain_size\tmean_accuracy");
        assert_eq!(lines[1], "classification_avn_v_pc\tpc\tSVC\t0.2\t0.5");
        assert_eq!(lines[6], "classification_avn_v_pc\tpc\tLDA\t0.8\t0.8");
    }
}
