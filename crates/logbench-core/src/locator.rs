//! Locator parsing and resolution.
//!
//! A locator is a chain of selector parts joined by `>>`. Each part narrows
//! the set of elements matched by the previous one:
//!
//! - a CSS-like compound selector (`textarea`, `.absolute`, `div.ls-block`,
//!   `#search-button`, `[placeholder="Search"]`) matches descendants of the
//!   current set;
//! - `text=foo` matches descendants whose own text contains `foo`
//!   (case-insensitive, whitespace-normalized); `text="foo"` requires the
//!   whole text to equal `foo`;
//! - `nth=N` picks the N-th element (0-based, negative counts from the end)
//!   of the current set.
//!
//! # Example
//!
//! ```
//! use logbench_core::element::UIElement;
//! use logbench_core::locator::Locator;
//!
//! let tree = vec![UIElement::new("div").with_children([
//!     UIElement::new("textarea").with_value("first"),
//!     UIElement::new("textarea").with_value("second"),
//! ])];
//!
//! let locator: Locator = "textarea >> nth=1".parse().unwrap();
//! let found = locator.resolve(&tree);
//! assert_eq!(found[0].value.as_deref(), Some("second"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{descendants, flatten, UIElement};

/// Errors produced while parsing a locator string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The locator (or one of its `>>` parts) is empty.
    #[error("empty selector in '{0}'")]
    Empty(String),

    /// An `nth=` part does not carry an integer.
    #[error("invalid nth index '{0}'")]
    InvalidNth(String),

    /// A CSS part uses syntax this resolver does not understand.
    #[error("unsupported selector syntax '{0}'")]
    Unsupported(String),
}

/// One attribute condition of a compound selector, e.g. `[placeholder="x"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrCondition {
    pub name: String,
    pub value: String,
}

/// A compound CSS selector: optional tag, id, classes and attribute tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrCondition>,
}

impl CssSelector {
    fn parse(input: &str) -> Result<Self, LocatorError> {
        if input.is_empty() {
            return Err(LocatorError::Empty(input.to_string()));
        }
        let mut selector = CssSelector::default();
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;

        let read_ident = |i: &mut usize| -> String {
            let start = *i;
            while *i < chars.len() && (chars[*i].is_alphanumeric() || chars[*i] == '-' || chars[*i] == '_') {
                *i += 1;
            }
            chars[start..*i].iter().collect()
        };

        if chars.first().map_or(false, |c| c.is_alphabetic()) {
            selector.tag = Some(read_ident(&mut i).to_ascii_lowercase());
        } else if chars.first() == Some(&'*') {
            i += 1;
        }

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let class = read_ident(&mut i);
                    if class.is_empty() {
                        return Err(LocatorError::Unsupported(input.to_string()));
                    }
                    selector.classes.push(class);
                }
                '#' => {
                    i += 1;
                    let id = read_ident(&mut i);
                    if id.is_empty() {
                        return Err(LocatorError::Unsupported(input.to_string()));
                    }
                    selector.id = Some(id);
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| LocatorError::Unsupported(input.to_string()))?;
                    let body: String = chars[i + 1..close].iter().collect();
                    let (name, value) = body
                        .split_once('=')
                        .ok_or_else(|| LocatorError::Unsupported(input.to_string()))?;
                    selector.attrs.push(AttrCondition {
                        name: name.trim().to_string(),
                        value: unquote(value.trim()).to_string(),
                    });
                    i = close + 1;
                }
                _ => return Err(LocatorError::Unsupported(input.to_string())),
            }
        }

        Ok(selector)
    }

    /// Returns true if `element` satisfies every condition of this selector.
    pub fn matches(&self, element: &UIElement) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| element.has_class(c)) {
            return false;
        }
        self.attrs.iter().all(|attr| {
            let actual = match attr.name.as_str() {
                "id" => element.id.as_deref(),
                "placeholder" => element.placeholder.as_deref(),
                "value" => element.value.as_deref(),
                _ => None,
            };
            actual == Some(attr.value.as_str())
        })
    }
}

/// One `>>`-separated part of a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorPart {
    /// A compound CSS selector matched against descendants.
    Css(CssSelector),
    /// A text match against descendants' own text.
    Text {
        /// The text to look for, whitespace-normalized.
        value: String,
        /// `true` for a quoted `text="..."` (whole, case-sensitive match).
        exact: bool,
    },
    /// Picks one element of the current set.
    Nth(isize),
}

impl SelectorPart {
    fn parse(part: &str) -> Result<Self, LocatorError> {
        if let Some(rest) = part.strip_prefix("nth=") {
            let n: isize = rest
                .trim()
                .parse()
                .map_err(|_| LocatorError::InvalidNth(rest.to_string()))?;
            return Ok(SelectorPart::Nth(n));
        }
        if let Some(rest) = part.strip_prefix("text=") {
            let rest = rest.trim();
            let exact = rest.len() >= 2 && rest.starts_with('"') && rest.ends_with('"');
            let value = normalize_whitespace(if exact { unquote(rest) } else { rest });
            if value.is_empty() {
                return Err(LocatorError::Empty(part.to_string()));
            }
            return Ok(SelectorPart::Text { value, exact });
        }
        let css = part.strip_prefix("css=").unwrap_or(part).trim();
        Ok(SelectorPart::Css(CssSelector::parse(css)?))
    }

    fn matches(&self, element: &UIElement) -> bool {
        match self {
            SelectorPart::Css(css) => css.matches(element),
            SelectorPart::Text { value, exact } => element.text.as_deref().map_or(false, |text| {
                let text = normalize_whitespace(text);
                if *exact {
                    text == *value
                } else {
                    text.to_lowercase().contains(&value.to_lowercase())
                }
            }),
            SelectorPart::Nth(_) => false,
        }
    }
}

/// A parsed locator. Displays and serializes as the original string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    raw: String,
    parts: Vec<SelectorPart>,
}

impl Locator {
    /// Parses a `>>`-separated locator string.
    pub fn parse(input: &str) -> Result<Self, LocatorError> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(LocatorError::Empty(input.to_string()));
        }
        let parts = raw
            .split(">>")
            .map(|p| {
                let p = p.trim();
                if p.is_empty() {
                    Err(LocatorError::Empty(input.to_string()))
                } else {
                    SelectorPart::parse(p)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { raw: raw.to_string(), parts })
    }

    /// The locator string as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn parts(&self) -> &[SelectorPart] {
        &self.parts
    }

    /// Returns a new locator narrowed by `>> nth=n`.
    pub fn nth(&self, n: isize) -> Self {
        let mut parts = self.parts.clone();
        parts.push(SelectorPart::Nth(n));
        Self {
            raw: format!("{} >> nth={}", self.raw, n),
            parts,
        }
    }

    /// Resolves the locator against a forest of root elements.
    ///
    /// Returns every match in document order. Hidden elements are included;
    /// callers decide whether visibility matters.
    pub fn resolve<'a>(&self, roots: &'a [UIElement]) -> Vec<&'a UIElement> {
        let mut current: Option<Vec<&'a UIElement>> = None;

        for part in &self.parts {
            let next = match part {
                SelectorPart::Nth(n) => {
                    let set = current.unwrap_or_else(|| flatten(roots));
                    let index = if *n < 0 { set.len() as isize + n } else { *n };
                    if index < 0 {
                        Vec::new()
                    } else {
                        set.get(index as usize).map(|e| vec![*e]).unwrap_or_default()
                    }
                }
                _ => {
                    let scope = match current {
                        None => flatten(roots),
                        Some(ref set) => {
                            let mut scoped = Vec::new();
                            for el in set {
                                for d in descendants(el) {
                                    if !scoped.iter().any(|s: &&UIElement| std::ptr::eq(*s, d)) {
                                        scoped.push(d);
                                    }
                                }
                            }
                            scoped
                        }
                    };
                    scope.into_iter().filter(|e| part.matches(e)).collect()
                }
            };
            if next.is_empty() {
                return next;
            }
            current = Some(next);
        }

        current.unwrap_or_default()
    }
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Locator::parse(s)
    }
}

impl TryFrom<String> for Locator {
    type Error = LocatorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Locator::parse(&value)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.raw
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
        .unwrap_or(s)
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Vec<UIElement> {
        vec![UIElement::new("div").with_id("app").with_children([
            UIElement::new("div").with_class("ls-block").with_child(
                UIElement::new("span").with_class("block-content").with_text("#foo bar"),
            ),
            UIElement::new("div").with_class("ls-block").with_child(
                UIElement::new("textarea").with_value("bar [[blah]]"),
            ),
            UIElement::new("div").with_class("absolute").with_children([
                UIElement::new("div").with_class("title").with_text("Search for a page"),
                UIElement::new("div").with_class("menu-link").with_text("foo"),
                UIElement::new("div").with_class("menu-link").with_text("Food"),
            ]),
            UIElement::new("input").with_placeholder("Search or create page"),
        ])]
    }

    #[test]
    fn parses_chain() {
        let loc = Locator::parse("textarea >> nth=0").unwrap();
        assert_eq!(loc.parts().len(), 2);
        assert_eq!(loc.parts()[1], SelectorPart::Nth(0));
        assert_eq!(loc.to_string(), "textarea >> nth=0");
    }

    #[test]
    fn quoted_text_is_exact() {
        let loc = Locator::parse(r#"text="Search for a page""#).unwrap();
        assert_eq!(
            loc.parts()[0],
            SelectorPart::Text { value: "Search for a page".to_string(), exact: true }
        );
        let tree = page();
        assert_eq!(loc.resolve(&tree).len(), 1);
        assert!(Locator::parse(r#"text="search for a page""#).unwrap().resolve(&tree).is_empty());
    }

    #[test]
    fn unquoted_text_is_case_insensitive_substring() {
        let tree = page();
        let found = Locator::parse(".absolute >> text=foo").unwrap().resolve(&tree);
        let texts: Vec<_> = found.iter().filter_map(|e| e.text.as_deref()).collect();
        assert_eq!(texts, vec!["foo", "Food"]);
    }

    #[test]
    fn chained_css_scopes_to_descendants() {
        let tree = page();
        let found = Locator::parse(".ls-block >> nth=1 >> textarea").unwrap().resolve(&tree);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value.as_deref(), Some("bar [[blah]]"));

        assert!(Locator::parse(".ls-block >> nth=0 >> textarea").unwrap().resolve(&tree).is_empty());
    }

    #[test]
    fn negative_nth_counts_from_end() {
        let tree = page();
        let found = Locator::parse(".ls-block >> nth=-1").unwrap().resolve(&tree);
        assert_eq!(found.len(), 1);
        assert!(found[0].children[0].tag == "textarea");
        assert!(Locator::parse(".ls-block >> nth=-3").unwrap().resolve(&tree).is_empty());
    }

    #[test]
    fn attribute_and_id_selectors() {
        let tree = page();
        assert_eq!(
            Locator::parse(r#"[placeholder="Search or create page"]"#).unwrap().resolve(&tree).len(),
            1
        );
        assert_eq!(Locator::parse("div#app").unwrap().resolve(&tree).len(), 1);
        assert_eq!(Locator::parse("div.ls-block").unwrap().resolve(&tree).len(), 2);
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(Locator::parse(""), Err(LocatorError::Empty(_))));
        assert!(matches!(Locator::parse("textarea >> "), Err(LocatorError::Empty(_))));
        assert!(matches!(Locator::parse("textarea >> nth=x"), Err(LocatorError::InvalidNth(_))));
        assert!(matches!(Locator::parse("div textarea"), Err(LocatorError::Unsupported(_))));
        assert!(matches!(Locator::parse("text="), Err(LocatorError::Empty(_))));
    }

    #[test]
    fn nth_builder_appends_part() {
        let loc = Locator::parse("textarea").unwrap().nth(0);
        assert_eq!(loc.as_str(), "textarea >> nth=0");
        assert_eq!(loc, Locator::parse("textarea >> nth=0").unwrap());
    }

    #[test]
    fn serde_as_string() {
        let loc = Locator::parse(".absolute >> text=foo").unwrap();
        let json = serde_json::to_string(&loc).unwrap();
        assert_eq!(json, r#"".absolute >> text=foo""#);
        let back: Locator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, loc);
        assert!(serde_json::from_str::<Locator>(r#""nth=abc""#).is_err());
    }
}
