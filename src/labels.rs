//! Label conventions linking Testim to Qase.
//!
//! An execution carries a result label `qase/<PROJECT>` naming the Qase
//! project; a Testim test carries `qase/<PROJECT>-<caseId>` naming the Qase
//! test case it reports into.

use std::fmt;

use thiserror::Error;

const PREFIX: &str = "qase/";

/// Short code of a Qase project, taken verbatim from an execution label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectCode(String);

impl ProjectCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix every test-case label for this project starts with.
    pub fn case_label_prefix(&self) -> String {
        format!("{PREFIX}{}-", self.0)
    }
}

impl fmt::Display for ProjectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    /// A test may link to at most one case per project.
    #[error("expected exactly one '{prefix}' label, found {}: {labels:?}", .labels.len())]
    MultipleLabels { prefix: String, labels: Vec<String> },
}

/// Project code from the first `qase/` label, in label order.
///
/// The remainder after the prefix is returned as-is, without trimming or
/// case changes.
pub fn extract_project_code<S: AsRef<str>>(labels: &[S]) -> Option<ProjectCode> {
    labels
        .iter()
        .find_map(|l| l.as_ref().strip_prefix(PREFIX))
        .map(ProjectCode::new)
}

/// Labels of the form `qase/<project>-...`.
pub fn case_labels<'a, S: AsRef<str>>(labels: &'a [S], project: &ProjectCode) -> Vec<&'a str> {
    let prefix = project.case_label_prefix();
    labels
        .iter()
        .map(|l| l.as_ref())
        .filter(|l| l.starts_with(&prefix))
        .collect()
}

/// Qase case id linked by `labels` within `project`.
///
/// `Ok(None)` covers both "no matching label" and a non-numeric suffix; more
/// than one matching label is an error the caller has to decide on.
pub fn extract_test_case_id<S: AsRef<str>>(
    labels: &[S],
    project: &ProjectCode,
) -> Result<Option<u64>, LabelError> {
    let prefix = project.case_label_prefix();
    match case_labels(labels, project).as_slice() {
        [] => Ok(None),
        [single] => Ok(single[prefix.len()..].parse::<u64>().ok()),
        many => Err(LabelError::MultipleLabels {
            prefix,
            labels: many.iter().map(|l| l.to_string()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prj() -> ProjectCode {
        ProjectCode::new("PRJ")
    }

    #[test]
    fn test_project_code_absent_without_prefix() {
        assert_eq!(extract_project_code::<&str>(&[]), None);
        assert_eq!(extract_project_code(&["smoke", "qase", "QASE/PRJ", "xqase/PRJ"]), None);
    }

    #[test]
    fn test_project_code_taken_verbatim() {
        assert_eq!(
            extract_project_code(&["nightly", "qase/My Prj "]),
            Some(ProjectCode::new("My Prj "))
        );
    }

    #[test]
    fn test_project_code_first_match_wins() {
        let labels = vec!["qase/AAA".to_string(), "qase/BBB".to_string()];
        assert_eq!(extract_project_code(&labels).unwrap().as_str(), "AAA");
    }

    #[test]
    fn test_case_id_none_when_unlinked() {
        assert_eq!(extract_test_case_id(&["qase/OTHER-1", "PRJ-2"], &prj()), Ok(None));
    }

    #[test]
    fn test_case_id_single_label() {
        assert_eq!(extract_test_case_id(&["ui", "qase/PRJ-42"], &prj()), Ok(Some(42)));
    }

    #[test]
    fn test_case_id_non_numeric_is_unlinked() {
        assert_eq!(extract_test_case_id(&["qase/PRJ-abc"], &prj()), Ok(None));
        assert_eq!(extract_test_case_id(&["qase/PRJ-"], &prj()), Ok(None));
    }

    #[test]
    fn test_case_id_ambiguous() {
        let err = extract_test_case_id(&["qase/PRJ-42", "qase/PRJ-43"], &prj()).unwrap_err();
        assert_eq!(
            err,
            LabelError::MultipleLabels {
                prefix: "qase/PRJ-".to_string(),
                labels: vec!["qase/PRJ-42".to_string(), "qase/PRJ-43".to_string()],
            }
        );
    }

    #[test]
    fn test_case_prefix_does_not_match_longer_project() {
        // "qase/PRJX-1" belongs to project PRJX, not PRJ.
        assert_eq!(extract_test_case_id(&["qase/PRJX-1"], &prj()), Ok(None));
    }
}
