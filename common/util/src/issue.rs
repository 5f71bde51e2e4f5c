use std::fmt::{Display, Formatter};

/// A single human-readable message produced by a planning tool.
///
/// Tools never abort on the first expected problem; they accumulate issues
/// into an [`IssueLog`] so the user gets one complete report.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Issue {
    pub message: String,
    pub severity: IssueSeverity,
    pub kind: IssueKind,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueSeverity {
    Warning,
    Error,
}

impl Display for IssueSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueSeverity::Warning => f.write_str("Warning"),
            IssueSeverity::Error => f.write_str("Error"),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum IssueKind {
    InputValidity,
    Conversion,
    LayoutInvariant,
    StockAvailability,
    Geometry,
    Verification,
    InvariantPreservation,
}

/// The warning/error sink passed explicitly to every planning tool.
///
/// A tool has failed iff its log contains at least one error-severity issue;
/// warnings alone leave the result usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueLog {
    issues: Vec<Issue>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(Issue {
            message: message.into(),
            severity: IssueSeverity::Error,
            kind,
        });
    }

    pub fn warning(&mut self, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(Issue {
            message: message.into(),
            severity: IssueSeverity::Warning,
            kind,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == IssueSeverity::Error)
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
    }

    pub fn extend(&mut self, other: IssueLog) {
        self.issues.extend(other.issues);
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[cfg(test)]
mod issue_log_tests {
    use super::*;

    #[test]
    fn warnings_do_not_fail_the_tool() {
        let mut log = IssueLog::new();
        log.warning(IssueKind::StockAvailability, "no tube for floating pool");

        assert!(!log.has_errors());
        assert_eq!(log.warnings().count(), 1);
    }

    #[test]
    fn errors_fail_the_tool() {
        let mut log = IssueLog::new();
        log.warning(IssueKind::Conversion, "first");
        log.error(IssueKind::Conversion, "second");

        assert!(log.has_errors());
        assert_eq!(log.errors().count(), 1);
        assert_eq!(log.issues().len(), 2);
    }
}
