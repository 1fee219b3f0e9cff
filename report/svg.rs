use super::{CurveFigure, FONT_SIZE, ReportError, Reporter};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const SIZE: (u32, u32) = (960, 720);

/// Writes each figure as `<out_dir>/<slug>.svg`.
#[derive(Debug, Clone)]
pub struct SvgReporter {
    out_dir: PathBuf,
}

impl SvgReporter {
    pub fn new(out_dir: impl AsRef<Path>) -> Result<Self, ReportError> {
        let out_dir = out_dir.as_ref().to_path_buf();
        fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir })
    }

    pub fn path_for(&self, figure: &CurveFigure) -> PathBuf {
        self.out_dir.join(format!("{}.svg", figure.slug))
    }
}

impl Reporter for SvgReporter {
    fn report(&mut self, figure: &CurveFigure) -> Result<(), ReportError> {
        let path = self.path_for(figure);
        render(figure, &path).map_err(|e| ReportError::Plot {
            figure: figure.title.clone(),
            message: e.to_string(),
        })?;
        log::debug!("Wrote figure '{}' to {}", figure.title, path.display());
        Ok(())
    }
}

fn axis_range(values: impl Iterator<Item = f64>, pad: f64) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo < f64::EPSILON {
        let half = if lo.abs() > 1.0 { lo.abs() * 0.05 } else { 0.05 };
        return (lo - half, hi + half);
    }
    let margin = (hi - lo) * pad;
    (lo - margin, hi + margin)
}

fn render(figure: &CurveFigure, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_lo, x_hi) = axis_range(figure.train_sizes.iter().copied(), 0.05);
    let y_hi = figure.y_upper();
    let y_lo = figure
        .min_accuracy()
        .map(|m| (m - 0.05).max(0.0))
        .unwrap_or(0.0)
        .min(y_hi - 0.1);

    let mut chart = ChartBuilder::on(&root)
        .caption(&figure.title, ("sans-serif", FONT_SIZE + 4))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc(&figure.x_label)
        .y_desc(&figure.y_label)
        .label_style(("sans-serif", FONT_SIZE))
        .axis_desc_style(("sans-serif", FONT_SIZE))
        .draw()?;

    for (i, curve) in figure.curves.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(f64, f64)> = figure
            .train_sizes
            .iter()
            .copied()
            .zip(curve.mean_accuracy.iter().copied())
            .filter(|(_, y)| y.is_finite())
            .collect();
        chart
            .draw_series(LineSeries::new(points, color.stroke_width(2)))?
            .label(curve.classifier.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .label_font(("sans-serif", FONT_SIZE))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_figure;

    #[test]
    fn writes_one_svg_per_figure() {
        let dir = tempfile::tempdir().unwrap();
        let mut reporter = SvgReporter::new(dir.path().join("figures")).unwrap();
        let figure = sample_figure();
        reporter.report(&figure).unwrap();
        let path = reporter.path_for(&figure);
        assert!(path.ends_with("classification_avn_v_pc.svg"));
        let svg = fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Classification avn_v_pc"));
        assert!(svg.contains("Ridge cl") || svg.contains("SVC"));
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        let (lo, hi) = axis_range([0.5].into_iter(), 0.05);
        assert!((lo - 0.45).abs() < 1e-12 && (hi - 0.55).abs() < 1e-12);
        assert_eq!(axis_range(std::iter::empty(), 0.05), (0.0, 1.0));
        let (lo, hi) = axis_range([0.0, 1.0].into_iter(), 0.1);
        assert!((lo + 0.1).abs() < 1e-12 && (hi - 1.1).abs() < 1e-12);
    }
}
