use std::collections::BTreeSet;

/// Attribute holding an article's tag collection in the backing store
pub const TAGS_ATTRIBUTE: &str = "tags";

/// `contains(<attribute>, <value>)`; stores bind `value` as a query parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainsClause {
    pub attribute: &'static str,
    pub value: String,
}

/// Filter matching items whose tag list contains at least one of the clauses' values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<ContainsClause>,
}

impl Predicate {
    /// Builds an OR of per-tag containment checks. Returns `None` for an empty tag set.
    pub fn any_tag(tags: &BTreeSet<String>) -> Option<Self> {
        if tags.is_empty() {
            return None;
        }

        let clauses = tags
            .iter()
            .map(|tag| ContainsClause {
                attribute: TAGS_ATTRIBUTE,
                value: tag.clone(),
            })
            .collect();

        Some(Self { clauses })
    }

    pub fn clauses(&self) -> &[ContainsClause] {
        &self.clauses
    }

    /// Evaluates the predicate against an already-normalized tag list
    pub fn matches(&self, tags: &[String]) -> bool {
        self.clauses
            .iter()
            .any(|c| tags.iter().any(|tag| *tag == c.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_tags_build_nothing() {
        assert!(Predicate::any_tag(&BTreeSet::new()).is_none());
    }

    #[test]
    fn test_one_clause_per_tag() {
        let predicate = Predicate::any_tag(&tags(&["Technology", "Sports", "Sports"])).unwrap();
        let values: Vec<_> = predicate.clauses().iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["Sports", "Technology"]);
        assert!(predicate.clauses().iter().all(|c| c.attribute == TAGS_ATTRIBUTE));
    }

    #[test]
    fn test_matches_any_tag() {
        let predicate = Predicate::any_tag(&tags(&["Health", "Science"])).unwrap();
        assert!(predicate.matches(&["Politics".to_string(), "Science".to_string()]));
        assert!(!predicate.matches(&["Politics".to_string()]));
        assert!(!predicate.matches(&[]));
    }
}
