//! The end-to-end analysis: for every metric, one learning-curve figure on the
//! full set of groups and one pairwise figure per unordered pair of groups.

use crate::config::{AnalysisConfig, ConfigError};
use crate::evaluate::{EvaluationError, learning_curve, pairwise_accuracy};
use crate::features::{FeatureError, LowerTriangle, stack_features};
use crate::labels::{LabelError, group_labels};
use crate::loader::{ConnectivitySource, LoaderError};
use crate::report::{AnalysisReport, CurveFigure, ReportError, Reporter};
use crate::samples::{LabeledSampleSet, SampleError};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use ndarray::Array2;
use std::io::IsTerminal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Group '{0}' has no subjects in the dataset.")]
    EmptyGroup(String),
    #[error("The dataset defines {0} region(s); at least 2 are needed to form connectivity features.")]
    TooFewRegions(usize),
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

fn summarize(figure: &CurveFigure) -> String {
    figure
        .curves
        .iter()
        .map(|c| {
            let last = c.mean_accuracy.last().copied().unwrap_or(f64::NAN);
            format!("{}={last:.3}", c.classifier)
        })
        .join(", ")
}

/// Runs the whole analysis over `source`, handing each figure to `reporter`
/// as soon as it is computed.
///
/// Subjects outside every configured group keep the reference label 0 in the
/// full-set evaluation and take no part in pairwise figures.
pub fn run_analysis<S, R>(
    source: &S,
    config: &AnalysisConfig,
    reporter: &mut R,
) -> Result<AnalysisReport, PipelineError>
where
    S: ConnectivitySource + ?Sized,
    R: Reporter + ?Sized,
{
    config.validate()?;

    let n_regions = source.regions().len();
    if n_regions < 2 {
        return Err(PipelineError::TooFewRegions(n_regions));
    }
    let triangle = LowerTriangle::new(n_regions);

    let subjects = source.subjects();
    let memberships: Vec<Vec<usize>> = config
        .groups
        .iter()
        .map(|group| {
            let members = source.group_indices(group);
            if members.is_empty() {
                Err(PipelineError::EmptyGroup(group.clone()))
            } else {
                Ok(members)
            }
        })
        .collect::<Result<_, _>>()?;
    let assigned: usize = memberships.iter().map(Vec::len).sum();
    if assigned < subjects.len() {
        log::warn!(
            "{} subject(s) belong to none of the configured groups and are counted as '{}'",
            subjects.len() - assigned,
            config.groups[0]
        );
    }
    let named: Vec<(&str, &[usize])> = config
        .groups
        .iter()
        .map(String::as_str)
        .zip(memberships.iter().map(Vec::as_slice))
        .collect();
    let labels = group_labels(subjects.len(), &named)?;

    let factories = config.model_params().factories(&config.classifiers);
    let pairs: Vec<(usize, usize)> = (0..config.groups.len()).tuple_combinations().collect();
    let total = config.metrics.len() * (1 + pairs.len());
    log::info!(
        "Analysing {} subjects, {} regions ({} features), {} metric(s), {} figure(s)",
        subjects.len(),
        n_regions,
        triangle.len(),
        config.metrics.len(),
        total
    );

    let pb = create_progress_bar(total as u64, "Evaluating classifiers...");
    let mut report = AnalysisReport::default();
    let mut emit = |figure: CurveFigure, report: &mut AnalysisReport| -> Result<(), ReportError> {
        log::info!("{}: {}", figure.title, summarize(&figure));
        reporter.report(&figure)?;
        report.figures.push(figure);
        pb.inc(1);
        Ok(())
    };

    for metric in &config.metrics {
        pb.set_message(format!("metric {metric}"));
        let matrices: Vec<Array2<f64>> = subjects
            .iter()
            .map(|subject| source.connectivity(subject, metric))
            .collect::<Result<_, _>>()?;
        let features = stack_features(&triangle, matrices.iter().map(|m| m.view()))?;
        drop(matrices);
        let full = LabeledSampleSet::new(features, labels.clone())?;

        let set = learning_curve(&full, &factories, &config.learning_curve)?;
        emit(
            CurveFigure::learning_curve(metric, &config.groups, set),
            &mut report,
        )?;

        for &(i, j) in &pairs {
            let pair = LabeledSampleSet::pairwise(full.features(), &memberships[i], &memberships[j])?;
            let set = pairwise_accuracy(&pair, &factories, &config.pairwise)?;
            emit(
                CurveFigure::pairwise(metric, &config.groups[i], &config.groups[j], set),
                &mut report,
            )?;
        }
    }

    reporter.finish()?;
    pb.finish_with_message("Done");
    Ok(report)
}
