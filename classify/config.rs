//! Run configuration, stored as TOML.
//!
//! Every field has a default matching the reference analysis, so an empty file
//! (or no file at all) reproduces it exactly.

use crate::evaluate::{EvaluationError, LearningCurveParams, PairwiseParams};
use crate::models::{ClassifierKind, LdaParams, ModelError, ModelParams, RidgeParams, SvcParams};
use crate::report::{learning_curve_title, pairwise_title, slugify};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Invalid classifier settings: {0}")]
    Model(#[from] ModelError),
    #[error("Invalid evaluation settings: {0}")]
    Evaluation(#[from] EvaluationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Connectivity estimators to analyse, one full pass each.
    pub metrics: Vec<String>,
    /// Group names; the first is the reference group (label 0).
    pub groups: Vec<String>,
    pub classifiers: Vec<ClassifierKind>,
    pub learning_curve: LearningCurveParams,
    pub pairwise: PairwiseParams,
    pub svc: SvcParams,
    pub lda: LdaParams,
    pub ridge: RidgeParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            metrics: ["pc", "gl", "gsc"].map(String::from).to_vec(),
            groups: ["avn", "v", "av"].map(String::from).to_vec(),
            classifiers: ClassifierKind::ALL.to_vec(),
            learning_curve: LearningCurveParams::default(),
            pairwise: PairwiseParams::default(),
            svc: SvcParams::default(),
            lda: LdaParams::default(),
            ridge: RidgeParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            svc: self.svc.clone(),
            lda: self.lda.clone(),
            ridge: self.ridge.clone(),
        }
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates, then writes the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let toml_string = self.to_toml_string()?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.metrics.is_empty() {
            return Err(ConfigError::Invalid("metrics must not be empty".to_string()));
        }
        if self.groups.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "at least 2 groups are required, got {}",
                self.groups.len()
            )));
        }
        if let Some(dup) = first_duplicate(&self.groups) {
            return Err(ConfigError::Invalid(format!("group '{dup}' is listed twice")));
        }
        if let Some(dup) = first_duplicate(&self.metrics) {
            return Err(ConfigError::Invalid(format!("metric '{dup}' is listed twice")));
        }
        if self.classifiers.is_empty() {
            return Err(ConfigError::Invalid(
                "classifiers must not be empty".to_string(),
            ));
        }
        let mut slugs: HashMap<String, String> = HashMap::new();
        for title in self.figure_titles() {
            let slug = slugify(&title);
            if let Some(other) = slugs.insert(slug.clone(), title.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "figures '{other}' and '{title}' would both be written to '{slug}'"
                )));
            }
        }

        let curve = &self.learning_curve;
        if curve.folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "learning_curve.folds must be at least 2, got {}",
                curve.folds
            )));
        }
        if curve.train_sizes.is_empty() {
            return Err(ConfigError::Invalid(
                "learning_curve.train_sizes must not be empty".to_string(),
            ));
        }
        if let Some(bad) = curve.train_sizes.iter().find(|f| !(**f > 0.0 && **f <= 1.0)) {
            return Err(ConfigError::Invalid(format!(
                "learning_curve.train_sizes must lie in (0, 1], got {bad}"
            )));
        }

        self.pairwise.validate()?;
        if self
            .pairwise
            .train_sizes
            .iter()
            .any(|f| f + self.pairwise.test_size > 1.0 + 1e-9)
        {
            return Err(ConfigError::Invalid(format!(
                "every pairwise.train_sizes entry plus test_size ({}) must not exceed 1",
                self.pairwise.test_size
            )));
        }

        self.model_params().validate()?;
        Ok(())
    }
}

impl AnalysisConfig {
    /// Titles of every figure a run produces, in production order.
    fn figure_titles(&self) -> Vec<String> {
        let pairs: Vec<(&String, &String)> = self.groups.iter().tuple_combinations().collect();
        self.metrics
            .iter()
            .flat_map(|metric| {
                std::iter::once(learning_curve_title(metric)).chain(
                    pairs
                        .iter()
                        .map(move |(gi, gj)| pairwise_title(metric, gi, gj)),
                )
            })
            .collect()
    }
}

fn first_duplicate(values: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    values
        .iter()
        .find(|v| !seen.insert(v.as_str()))
        .map(String::as_str)
}
