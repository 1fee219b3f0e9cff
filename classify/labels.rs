//! Integer class labels for subjects.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LabelError {
    #[error("Group '{group}' lists subject index {index}, but only {n_subjects} subjects exist.")]
    SubjectOutOfRange {
        group: String,
        index: usize,
        n_subjects: usize,
    },
}

/// Multi-group labels: every subject starts at 0 and members of `groups[k]` get `k`.
///
/// The first group is the reference group and keeps the default label, so with
/// groups `[avn, v, av]` the codes are `avn -> 0`, `v -> 1`, `av -> 2`.
pub fn group_labels<S: AsRef<str>>(
    n_subjects: usize,
    groups: &[(S, &[usize])],
) -> Result<Vec<usize>, LabelError> {
    let mut labels = vec![0usize; n_subjects];
    for (code, (name, members)) in groups.iter().enumerate().skip(1) {
        for &index in members.iter() {
            let slot = labels
                .get_mut(index)
                .ok_or_else(|| LabelError::SubjectOutOfRange {
                    group: name.as_ref().to_string(),
                    index,
                    n_subjects,
                })?;
            *slot = code;
        }
    }
    Ok(labels)
}

/// Binary labels for two stacked groups: `n_i` zeros followed by `n_j` ones.
pub fn pairwise_labels(n_i: usize, n_j: usize) -> Vec<usize> {
    let mut labels = vec![0usize; n_i];
    labels.resize(n_i + n_j, 1);
    labels
}
