use std::fs;
use std::path::Path;

use fcclass::config::AnalysisConfig;
use fcclass::loader::{ConnectivitySource, DatasetDir};
use fcclass::pipeline::run_analysis;
use fcclass::report::{MultiReporter, SvgReporter, TsvReporter};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tempfile::tempdir;

const GROUPS: [&str; 3] = ["avn", "v", "av"];
const METRICS: [&str; 3] = ["pc", "gl", "gsc"];

/// Writes a dataset with `per_group` subjects in each of three groups,
/// interleaved in subject order, each group shifting a different block of
/// connections.
fn write_dataset(root: &Path, per_group: usize, regions: usize) {
    let mut rng = StdRng::seed_from_u64(2024);
    let noise = Normal::new(0.0, 0.15).unwrap();

    let mut subjects = String::from("subject_id\tgroup\n");
    let mut ids = Vec::new();
    for i in 0..3 * per_group {
        let id = format!("sub-{i:03}");
        subjects.push_str(&format!("{id}\t{}\n", GROUPS[i % 3]));
        ids.push((id, i % 3));
    }
    fs::write(root.join("subjects.tsv"), subjects).unwrap();

    let mut region_table = String::from("name\tx\ty\tz\n");
    for r in 0..regions {
        region_table.push_str(&format!("R{r}\t{}\t{}\t{}\n", r, -(r as i64), 2 * r));
    }
    fs::write(root.join("regions.tsv"), region_table).unwrap();

    for metric in METRICS {
        let dir = root.join("connectivity").join(metric);
        fs::create_dir_all(&dir).unwrap();
        for (id, group) in &ids {
            let mut m = vec![vec![1.0f64; regions]; regions];
            for r in 0..regions {
                for c in 0..r {
                    let shift = if (r + c) % 3 == *group { 0.8 } else { 0.0 };
                    let v = shift + noise.sample(&mut rng);
                    m[r][c] = v;
                    m[c][r] = v;
                }
            }
            let text: String = m
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join("\t")
                })
                .collect::<Vec<_>>()
                .join("\n");
            fs::write(dir.join(format!("{id}.tsv")), text + "\n").unwrap();
        }
    }
}

#[test]
fn default_analysis_produces_twelve_figures() {
    let data = tempdir().unwrap();
    write_dataset(data.path(), 12, 6);
    let out = tempdir().unwrap();

    let dataset = DatasetDir::open(data.path()).unwrap();
    assert_eq!(dataset.subjects().len(), 36);
    assert_eq!(dataset.regions().len(), 6);

    let mut reporter = MultiReporter::new()
        .with(TsvReporter::create(out.path().join("curves.tsv")).unwrap())
        .with(SvgReporter::new(out.path()).unwrap());
    let report = run_analysis(&dataset, &AnalysisConfig::default(), &mut reporter).unwrap();

    assert_eq!(report.figures.len(), 12);
    let expected_titles = [
        "Classification pc",
        "Classification avn_v_pc",
        "Classification avn_av_pc",
        "Classification v_av_pc",
        "Classification gl",
        "Classification gsc",
        "Classification v_av_gsc",
    ];
    for title in expected_titles {
        assert!(report.figure(title).is_some(), "missing figure {title}");
    }

    for figure in &report.figures {
        assert_eq!(figure.curves.len(), 3);
        let legends: Vec<&str> = figure.curves.iter().map(|c| c.classifier.as_str()).collect();
        assert_eq!(legends, vec!["SVC", "LDA", "Ridge cl"]);
        for curve in &figure.curves {
            assert_eq!(curve.mean_accuracy.len(), figure.train_sizes.len());
            assert!(
                curve
                    .mean_accuracy
                    .iter()
                    .all(|a| a.is_finite() && (0.0..=1.0).contains(a))
            );
        }
        assert!(out.path().join(format!("{}.svg", figure.slug)).is_file());
    }

    let pairwise = report.figure("Classification avn_v_pc").unwrap();
    assert_eq!(pairwise.train_sizes.len(), 8);
    assert!((pairwise.train_sizes[0] - 0.2).abs() < 1e-12);

    // Full-set curves are indexed by absolute sample counts of the 30-sample
    // training folds.
    let full = report.figure("Classification pc").unwrap();
    assert_eq!(full.train_sizes, vec![6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0]);

    let table = fs::read_to_string(out.path().join("curves.tsv")).unwrap();
    let expected_rows: usize = report
        .figures
        .iter()
        .map(|f| f.curves.len() * f.train_sizes.len())
        .sum();
    assert_eq!(table.lines().count(), 1 + expected_rows);
}

#[test]
fn pairwise_figures_are_reproducible() {
    let data = tempdir().unwrap();
    write_dataset(data.path(), 10, 5);
    let dataset = DatasetDir::open(data.path()).unwrap();

    let mut config = AnalysisConfig::default();
    config.metrics = vec!["gl".to_string()];
    config.groups = vec!["v".to_string(), "av".to_string()];
    config.learning_curve.folds = 5;
    config.pairwise.n_iter = 10;

    let first = run_analysis(&dataset, &config, &mut MultiReporter::new()).unwrap();
    let second = run_analysis(&dataset, &config, &mut MultiReporter::new()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.figures.len(), 2);
}
