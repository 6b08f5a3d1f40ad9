//! Locators identifying zero or more page elements

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rule that resolves to zero or more elements on the page.
///
/// Locators are data so they can be logged, compared and written in YAML
/// scenarios. They render to Playwright selector syntax with
/// [`Locator::selector`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    /// Any element whose visible text contains the string
    Text(String),

    /// Any element whose visible text is exactly the string
    ExactText(String),

    /// A `<button>` whose text contains the string
    Button(String),

    /// Raw CSS selector
    Css(String),

    /// CSS selector narrowed to elements containing the text
    CssWithText { css: String, text: String },
}

impl Locator {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn exact_text(text: impl Into<String>) -> Self {
        Self::ExactText(text.into())
    }

    pub fn button(text: impl Into<String>) -> Self {
        Self::Button(text.into())
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Render as a Playwright selector string
    pub fn selector(&self) -> String {
        match self {
            Locator::Text(t) => format!("text={}", t),
            Locator::ExactText(t) => format!("text=\"{}\"", escape_quotes(t)),
            Locator::Button(t) => format!("button:has-text(\"{}\")", escape_quotes(t)),
            Locator::Css(css) => css.clone(),
            Locator::CssWithText { css, text } => {
                format!("{}:has-text(\"{}\")", css, escape_quotes(text))
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.selector())
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
