use crate::error::{Error, Result};
use scraper::Selector;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A recursive, serializable definition of a CSS selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec")]
pub enum CssSelector {
    /// Matches an HTML tag name (e.g., "div", "a")
    Tag(String),

    /// Matches a CSS class (e.g., "crypto-card")
    Class(String),

    /// Matches an HTML ID (e.g., "main")
    Id(String),

    /// Matches an attribute existence or specific value
    Attribute { key: String, value: Option<String> },

    /// AND Logic: Matches if ALL sub-selectors match
    And(Vec<CssSelector>),

    /// OR Logic: Matches if ANY sub-selector matches
    Or(Vec<CssSelector>),

    /// Descendant Logic: .ancestor .descendant
    Descendant {
        ancestor: Box<CssSelector>,
        descendant: Box<CssSelector>,
    },

    /// Child Logic: .parent > .child
    Child {
        parent: Box<CssSelector>,
        child: Box<CssSelector>,
    },
}

impl CssSelector {
    pub fn class(name: impl Into<String>) -> Self {
        CssSelector::Class(name.into())
    }

    /// Converts the structured selector into a standard CSS selector string.
    pub fn to_css_string(&self) -> String {
        self.render(false)
    }

    fn render(&self, nested: bool) -> String {
        match self {
            CssSelector::Tag(tag) => tag.clone(),
            CssSelector::Class(cls) => format!(".{}", cls),
            CssSelector::Id(id) => format!("#{}", id),
            CssSelector::Attribute { key, value } => match value {
                Some(v) => format!(
                    "[{}=\"{}\"]",
                    key,
                    v.replace('\\', "\\\\").replace('"', "\\\"")
                ),
                None => format!("[{}]", key),
            },
            CssSelector::And(selectors) if selectors.is_empty() => "*".to_string(),
            CssSelector::And(selectors) => selectors
                .iter()
                .map(|s| s.render(true))
                .collect::<Vec<_>>()
                .join(""),
            CssSelector::Or(selectors) => {
                let list = selectors
                    .iter()
                    .map(|s| s.render(false))
                    .collect::<Vec<_>>()
                    .join(", ");
                if nested {
                    format!(":is({})", list)
                } else {
                    list
                }
            }
            CssSelector::Descendant {
                ancestor,
                descendant,
            } => {
                format!("{} {}", ancestor.render(true), descendant.render(true))
            }
            CssSelector::Child { parent, child } => {
                format!("{} > {}", parent.render(true), child.render(true))
            }
        }
    }
}

impl fmt::Display for CssSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css_string())
    }
}

/// A selector as configured: CSS text, either written directly or rendered
/// from a [`CssSelector`]. Compiled with `scraper` when rules are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSpec(String);

impl SelectorSpec {
    pub fn css(text: impl Into<String>) -> Self {
        SelectorSpec(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn compile(&self) -> Result<Selector> {
        Selector::parse(&self.0).map_err(|e| Error::Selector {
            css: self.0.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<CssSelector> for SelectorSpec {
    fn from(selector: CssSelector) -> Self {
        SelectorSpec(selector.to_css_string())
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for SelectorSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Accepts either a CSS string (`"div.card > .name"`) or the structured
/// `{ kind, spec }` form.
impl<'de> Deserialize<'de> for SelectorSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Css(String),
            Structured(CssSelector),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Css(css) if css.trim().is_empty() => {
                Err(D::Error::custom("selector must not be empty"))
            }
            Repr::Css(css) => Ok(SelectorSpec(css)),
            Repr::Structured(selector) => Ok(selector.into()),
        }
    }
}
