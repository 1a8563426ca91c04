//! Shared UI element types for selector-based automation.
//!
//! This module defines the data structures representing the rendered
//! element tree of the application under test. These types are used across
//! all automation backends and are independent of any specific backend
//! implementation.

use serde::{Deserialize, Serialize};

/// Represents one element of the rendered document tree.
///
/// Elements form a tree structure via the `children` field. Backends report
/// only the attributes locators can match against, not the full DOM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// Lower-case tag name (e.g., "div", "textarea").
    pub tag: String,

    /// The element's `id` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The element's class list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    /// Text rendered directly by this element (not by its children).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// The current value of a form control, e.g. textarea contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// The `placeholder` attribute of a form control.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Whether the element is currently rendered visibly.
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Child elements nested within this element.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UIElement>,
}

fn default_visible() -> bool {
    true
}

impl UIElement {
    /// Creates a visible element with the given tag and nothing else set.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_child(mut self, child: UIElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = UIElement>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Returns true if the class list contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Collects every descendant of `element` (not the element itself) in
/// document order.
pub fn descendants(element: &UIElement) -> Vec<&UIElement> {
    let mut out = Vec::new();
    collect(&element.children, &mut out);
    out
}

/// Collects every element of a forest, roots included, in document order.
pub fn flatten(elements: &[UIElement]) -> Vec<&UIElement> {
    let mut out = Vec::new();
    collect(elements, &mut out);
    out
}

fn collect<'a>(elements: &'a [UIElement], out: &mut Vec<&'a UIElement>) {
    for element in elements {
        out.push(element);
        collect(&element.children, out);
    }
}
