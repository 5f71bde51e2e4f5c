use std::fmt::{Display, Formatter};

/// A (domain, predicate, value) triple attached to rack positions.
///
/// Predicates are compared case-insensitively; the constructor folds them to
/// lower case so the derived equality and ordering are sufficient.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub domain: String,
    pub predicate: String,
    pub value: String,
}

impl Tag {
    pub fn new(domain: impl Into<String>, predicate: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            predicate: predicate.into().to_lowercase(),
            value: value.into(),
        }
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}={}", self.domain, self.predicate, self.value)
    }
}

#[cfg(test)]
mod tag_tests {
    use super::Tag;

    #[test]
    fn predicates_are_case_insensitive() {
        let lower = Tag::new("iso", "molecule_design_pool_id", "205200");
        let upper = Tag::new("iso", "Molecule_Design_Pool_Id", "205200");

        assert_eq!(lower, upper);
    }

    #[test]
    fn values_are_case_sensitive() {
        let one = Tag::new("iso", "position_type", "mock");
        let other = Tag::new("iso", "position_type", "MOCK");

        assert_ne!(one, other);
    }
}
