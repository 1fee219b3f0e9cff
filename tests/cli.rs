use std::fs;
use std::process::Command;

use tempfile::tempdir;

#[test]
fn config_subcommand_prints_loadable_defaults() {
    let output = Command::new(env!("CARGO_BIN_EXE_fcclass"))
        .arg("config")
        .output()
        .expect("run fcclass cli");
    assert!(output.status.success());

    let text = String::from_utf8(output.stdout).expect("utf-8 output");
    let config: fcclass::config::AnalysisConfig = toml::from_str(&text).expect("valid TOML");
    assert_eq!(config, fcclass::config::AnalysisConfig::default());
}

#[test]
fn run_writes_table_and_report_without_plots() {
    let tmp = tempdir().expect("temporary directory");
    let data = tmp.path().join("dataset");
    fs::create_dir_all(data.join("connectivity/pc")).expect("create dataset dirs");

    let mut subjects = String::from("subject_id\tgroup\n");
    for i in 0..16 {
        let group = if i % 2 == 0 { "ctl" } else { "pat" };
        subjects.push_str(&format!("s{i}\t{group}\n"));
        let shift = if i % 2 == 0 { 0.6 } else { -0.6 };
        let jitter = 0.01 * i as f64;
        let a = shift + jitter;
        let b = shift - jitter;
        let c = 0.1 + jitter;
        let matrix = format!("1\t{a}\t{b}\n{a}\t1\t{c}\n{b}\t{c}\t1\n");
        fs::write(data.join(format!("connectivity/pc/s{i}.tsv")), matrix).expect("write matrix");
    }
    fs::write(data.join("subjects.tsv"), subjects).expect("write subjects");
    fs::write(data.join("regions.tsv"), "name\nA\nB\nC\n").expect("write regions");

    let config = tmp.path().join("fcclass.toml");
    fs::write(
        &config,
        "metrics = [\"pc\"]\ngroups = [\"ctl\", \"pat\"]\n\n[learning_curve]\nfolds = 4\n\n[pairwise]\nn_iter = 5\n",
    )
    .expect("write config");

    let out = tmp.path().join("out");
    let status = Command::new(env!("CARGO_BIN_EXE_fcclass"))
        .args([
            "run",
            data.to_str().expect("path str"),
            "--config",
            config.to_str().expect("path str"),
            "--out",
            out.to_str().expect("path str"),
            "--no-plots",
        ])
        .status()
        .expect("run fcclass cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    assert!(out.join("curves.tsv").is_file());
    assert!(out.join("report.toml").is_file());
    assert!(!out.join("classification_pc.svg").exists());
}

#[test]
fn missing_dataset_fails_with_error_message() {
    let tmp = tempdir().expect("temporary directory");
    let output = Command::new(env!("CARGO_BIN_EXE_fcclass"))
        .args(["run", tmp.path().join("nope").to_str().expect("path str")])
        .current_dir(tmp.path())
        .output()
        .expect("run fcclass cli");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
}
