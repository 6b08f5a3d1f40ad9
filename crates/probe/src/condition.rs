//! Page-state predicates described as data

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::locator::Locator;

/// A predicate over the current page, evaluated by
/// [`Session::holds`](crate::session::Session::holds).
///
/// In YAML a condition is written externally tagged, e.g.
/// `{ text_contains: "ПОБЕДА" }` or `{ any: [ ... ] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Body text contains the string
    TextContains(String),

    /// Serialized HTML contains the fragment
    HtmlContains(String),

    /// The first match of the locator is visible
    Visible(Locator),

    /// At least `count` elements match
    CountAtLeast { locator: Locator, count: usize },

    UrlContains(String),

    Not(Box<Condition>),
    Any(Vec<Condition>),
    All(Vec<Condition>),
}

impl Condition {
    pub fn text(s: impl Into<String>) -> Self {
        Self::TextContains(s.into())
    }

    pub fn visible(locator: Locator) -> Self {
        Self::Visible(locator)
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, sep: &str, items: &[Condition]) -> fmt::Result {
            f.write_str("(")?;
            for (i, c) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", sep)?;
                }
                write!(f, "{}", c)?;
            }
            f.write_str(")")
        }

        match self {
            Condition::TextContains(s) => write!(f, "text contains '{}'", s),
            Condition::HtmlContains(s) => write!(f, "html contains '{}'", s),
            Condition::Visible(l) => write!(f, "{} visible", l),
            Condition::CountAtLeast { locator, count } => write!(f, "{} matches >= {}", locator, count),
            Condition::UrlContains(s) => write!(f, "url contains '{}'", s),
            Condition::Not(c) => write!(f, "not {}", c),
            Condition::Any(items) => join(f, "or", items),
            Condition::All(items) => join(f, "and", items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_forms() {
        let yaml = r#"
any:
  - text_contains: ПОБЕДА
  - visible: { by: text, value: "🏆" }
  - not:
      count_at_least: { locator: { by: css, value: ".grid.grid-cols-3 button" }, count: 1 }
"#;
        let condition: Condition = serde_yaml::from_str(yaml).unwrap();
        match &condition {
            Condition::Any(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0], Condition::text("ПОБЕДА"));
                assert!(matches!(items[2], Condition::Not(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let c = Condition::Any(vec![
            Condition::text("ПОБЕДА"),
            Condition::visible(Locator::text("🏆")),
        ]);
        assert_eq!(c.to_string(), "(text contains 'ПОБЕДА' or text=🏆 visible)");
    }
}
