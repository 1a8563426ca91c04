//! In-process simulated editor implementing [`AutomationDriver`].
//!
//! [`SimDriver`] keeps a small model of the notes application's outliner:
//! a set of known pages, the blocks of the current page, the block being
//! edited with its caret, and the page-search popup. It renders that model
//! as a [`UIElement`] tree so locators resolve the same way they would
//! against the agent's tree.
//!
//! Editing rules:
//!
//! - only the block being edited renders a `textarea`;
//! - `[` inserts `[]`, and typing `]` in front of a `]` steps over it;
//! - `#` opens the tag popup, a second consecutive `[` opens the
//!   page-reference popup;
//! - the popup (`div.absolute`) lists known pages whose title contains the
//!   text typed since the trigger, ignoring case;
//! - `Enter` splits the block at the caret and commits the left half,
//!   registering the pages it mentions.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use crate::driver::{resolve_one, AutomationDriver, DriverError};
use crate::element::UIElement;
use crate::locator::Locator;

/// Heading text of the page-search popup.
pub const SEARCH_PROMPT: &str = "Search for a page";

const EDITOR_ID: &str = "block-editor";
const ITEM_PREFIX: &str = "ac-item-";
const BLOCK_PREFIX: &str = "ls-block-";
const CONTENT_PREFIX: &str = "block-content-";

/// Behavior switches for [`SimDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOptions {
    /// Open the page-search popup on `#` and `[[`.
    pub page_search_popup: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            page_search_popup: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PopupKind {
    Tag,
    PageRef,
}

#[derive(Debug, Clone, Copy)]
struct Popup {
    kind: PopupKind,
    /// Index of `#`, or of the first `[` of `[[`.
    trigger: usize,
}

impl Popup {
    /// The text typed since the trigger, or `None` once the popup no longer
    /// applies to the caret position.
    fn query(&self, text: &[char], caret: usize) -> Option<String> {
        let (start, opener_ok) = match self.kind {
            PopupKind::Tag => (self.trigger + 1, text.get(self.trigger) == Some(&'#')),
            PopupKind::PageRef => (
                self.trigger + 2,
                text.get(self.trigger..self.trigger + 2) == Some(&['[', '['][..]),
            ),
        };
        if !opener_ok || caret < start || caret > text.len() {
            return None;
        }
        let query = &text[start..caret];
        let closed = match self.kind {
            PopupKind::Tag => query.iter().any(|c| c.is_whitespace()),
            PopupKind::PageRef => query.iter().any(|&c| c == '[' || c == ']'),
        };
        if closed {
            None
        } else {
            Some(query.iter().collect())
        }
    }
}

#[derive(Debug)]
struct Page {
    title: String,
    blocks: Vec<Vec<char>>,
}

/// What a resolved element stands for in the model.
enum Target {
    Editor,
    Block(usize),
    Item(usize),
    Inert,
}

fn target_of(element: &UIElement) -> Target {
    let Some(id) = element.id.as_deref() else {
        return Target::Inert;
    };
    if id == EDITOR_ID {
        return Target::Editor;
    }
    if let Some(n) = id.strip_prefix(ITEM_PREFIX).and_then(|n| n.parse().ok()) {
        return Target::Item(n);
    }
    id.strip_prefix(BLOCK_PREFIX)
        .or_else(|| id.strip_prefix(CONTENT_PREFIX))
        .and_then(|n| n.parse().ok())
        .map_or(Target::Inert, Target::Block)
}

fn no_focus() -> DriverError {
    DriverError::CommandFailed("no block is being edited".into())
}

/// Page names mentioned by `#tag`, `#[[page]]` and `[[page]]` in `text`.
fn referenced_pages(text: &str) -> Vec<String> {
    let mut pages = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(&['#', '['][..]) {
        let at = &rest[pos..];
        if let Some(inner) = at.strip_prefix("#[[").or_else(|| at.strip_prefix("[[")) {
            match inner.find("]]") {
                Some(end) => {
                    let name = inner[..end].trim();
                    if !name.is_empty() {
                        pages.push(name.to_string());
                    }
                    rest = &inner[end + 2..];
                }
                None => rest = inner,
            }
        } else if let Some(tag) = at.strip_prefix('#') {
            let end = tag
                .find(|c: char| c.is_whitespace() || matches!(c, ',' | '#' | '['))
                .unwrap_or(tag.len());
            if end > 0 {
                pages.push(tag[..end].to_string());
            }
            rest = &tag[end..];
        } else {
            rest = &at[1..];
        }
    }
    pages
}

#[derive(Debug, Default)]
struct Editor {
    pages: Vec<String>,
    page: Option<Page>,
    editing: Option<usize>,
    caret: usize,
    popup: Option<Popup>,
}

impl Editor {
    fn register_page(&mut self, title: &str) {
        if !self.pages.iter().any(|p| p.eq_ignore_ascii_case(title)) {
            self.pages.push(title.to_string());
        }
    }

    fn open_page(&mut self, title: &str) {
        self.register_page(title);
        self.page = Some(Page {
            title: title.to_string(),
            blocks: vec![Vec::new()],
        });
        self.editing = Some(0);
        self.caret = 0;
        self.popup = None;
    }

    fn editing_text(&self) -> Option<&Vec<char>> {
        let idx = self.editing?;
        self.page.as_ref()?.blocks.get(idx)
    }

    fn editing_text_mut(&mut self) -> Result<&mut Vec<char>, DriverError> {
        let idx = self.editing.ok_or_else(no_focus)?;
        self.page
            .as_mut()
            .and_then(|p| p.blocks.get_mut(idx))
            .ok_or_else(no_focus)
    }

    fn refresh_popup(&mut self) {
        if let Some(popup) = self.popup {
            let still_open = self
                .editing_text()
                .and_then(|text| popup.query(text, self.caret))
                .is_some();
            if !still_open {
                self.popup = None;
            }
        }
    }

    fn popup_items(&self) -> Vec<String> {
        let Some(popup) = self.popup else {
            return Vec::new();
        };
        let Some(query) = self.editing_text().and_then(|t| popup.query(t, self.caret)) else {
            return Vec::new();
        };
        let needle = query.to_lowercase();
        let current = self.page.as_ref().map(|p| p.title.as_str());
        self.pages
            .iter()
            .filter(|p| Some(p.as_str()) != current && p.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    fn insert_char(&mut self, c: char, popups: bool) -> Result<(), DriverError> {
        let caret = self.caret;
        let text = self.editing_text_mut()?;
        let mut opened = None;
        match c {
            ']' if text.get(caret) == Some(&']') => {}
            '[' => {
                text.insert(caret, '[');
                text.insert(caret + 1, ']');
                if caret > 0 && text[caret - 1] == '[' {
                    opened = Some(Popup {
                        kind: PopupKind::PageRef,
                        trigger: caret - 1,
                    });
                }
            }
            _ => {
                text.insert(caret, c);
                if c == '#' {
                    opened = Some(Popup {
                        kind: PopupKind::Tag,
                        trigger: caret,
                    });
                }
            }
        }
        self.caret += 1;
        if popups && opened.is_some() {
            self.popup = opened;
        }
        self.refresh_popup();
        Ok(())
    }

    fn select_item(&mut self, index: usize) -> Result<(), DriverError> {
        let page = self
            .popup_items()
            .get(index)
            .cloned()
            .ok_or_else(|| DriverError::CommandFailed(format!("no popup item {index}")))?;
        let popup = self
            .popup
            .take()
            .ok_or_else(|| DriverError::CommandFailed("page search popup is closed".into()))?;
        let caret = self.caret;
        let text = self.editing_text_mut()?;
        let (replacement, end) = match popup.kind {
            PopupKind::Tag if page.chars().any(char::is_whitespace) => (format!("#[[{page}]]"), caret),
            PopupKind::Tag => (format!("#{page}"), caret),
            PopupKind::PageRef => {
                let end = if text.get(caret..caret + 2) == Some(&[']', ']'][..]) {
                    caret + 2
                } else {
                    caret
                };
                (format!("[[{page}]]"), end)
            }
        };
        let inserted: Vec<char> = replacement.chars().collect();
        let len = inserted.len();
        text.splice(popup.trigger..end, inserted);
        self.caret = popup.trigger + len;
        debug!(page = %page, "popup item selected");
        Ok(())
    }

    /// Splits the edited block at the caret and edits the right half.
    fn split_block(&mut self) -> Result<(), DriverError> {
        let idx = self.editing.ok_or_else(no_focus)?;
        let caret = self.caret;
        let page = self.page.as_mut().ok_or_else(no_focus)?;
        let right = page.blocks[idx].split_off(caret);
        page.blocks.insert(idx + 1, right);
        let committed: String = page.blocks[idx].iter().collect();
        self.editing = Some(idx + 1);
        self.caret = 0;
        self.popup = None;
        self.commit(&committed);
        Ok(())
    }

    fn stop_editing(&mut self) {
        if let Some(text) = self.editing_text() {
            let committed: String = text.iter().collect();
            self.commit(&committed);
        }
        self.editing = None;
        self.popup = None;
    }

    fn commit(&mut self, content: &str) {
        for page in referenced_pages(content) {
            self.register_page(&page);
        }
    }

    fn focus_block(&mut self, idx: usize) -> Result<(), DriverError> {
        if self.editing == Some(idx) {
            return Ok(());
        }
        let len = self
            .page
            .as_ref()
            .and_then(|p| p.blocks.get(idx))
            .map(Vec::len)
            .ok_or_else(|| DriverError::CommandFailed(format!("no block {idx}")))?;
        self.stop_editing();
        self.editing = Some(idx);
        self.caret = len;
        Ok(())
    }

    fn press(&mut self, key: &str, popups: bool) -> Result<(), DriverError> {
        let mut chars = key.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return self.insert_char(c, popups);
        }
        if let Some((_, last)) = key.rsplit_once('+') {
            return Err(if matches!(last.to_ascii_lowercase().as_str(), "c" | "v" | "x") {
                DriverError::Unsupported(format!("clipboard access ({key})"))
            } else {
                DriverError::Unsupported(format!("key chord '{key}'"))
            });
        }

        let caret = self.caret;
        let len = self.editing_text().map(Vec::len).ok_or_else(no_focus)?;
        match key {
            "Enter" => {
                if self.popup.is_some() {
                    if self.popup_items().is_empty() {
                        self.popup = None;
                    } else {
                        self.select_item(0)?;
                    }
                } else {
                    self.split_block()?;
                }
            }
            "Escape" => {
                if self.popup.take().is_none() {
                    self.stop_editing();
                }
            }
            "ArrowLeft" => self.caret = caret.saturating_sub(1),
            "ArrowRight" => self.caret = (caret + 1).min(len),
            "Home" => self.caret = 0,
            "End" => self.caret = len,
            "Backspace" => {
                if caret > 0 {
                    self.editing_text_mut()?.remove(caret - 1);
                    self.caret -= 1;
                }
            }
            "Space" => return self.insert_char(' ', popups),
            other => return Err(DriverError::Unsupported(format!("key '{other}'"))),
        }
        self.refresh_popup();
        Ok(())
    }

    fn render(&self) -> Vec<UIElement> {
        let mut app = UIElement::new("div").with_id("app");
        if let Some(page) = &self.page {
            let mut container = UIElement::new("div")
                .with_class("page")
                .with_child(UIElement::new("h1").with_class("page-title").with_text(&page.title));
            for (i, block) in page.blocks.iter().enumerate() {
                let content: String = block.iter().collect();
                let body = if self.editing == Some(i) {
                    UIElement::new("textarea")
                        .with_id(EDITOR_ID)
                        .with_class("block-editor")
                        .with_value(content)
                } else {
                    UIElement::new("div")
                        .with_id(format!("{CONTENT_PREFIX}{i}"))
                        .with_class("block-content")
                        .with_text(content)
                };
                container = container.with_child(
                    UIElement::new("div")
                        .with_id(format!("{BLOCK_PREFIX}{i}"))
                        .with_class("ls-block")
                        .with_child(body),
                );
            }
            app = app.with_child(container);
        }
        if self.popup.is_some() {
            let mut popup = UIElement::new("div")
                .with_class("absolute")
                .with_child(UIElement::new("div").with_class("title").with_text(SEARCH_PROMPT));
            for (i, item) in self.popup_items().into_iter().enumerate() {
                popup = popup.with_child(
                    UIElement::new("div")
                        .with_id(format!("{ITEM_PREFIX}{i}"))
                        .with_class("menu-link")
                        .with_text(item),
                );
            }
            app = app.with_child(popup);
        }
        vec![app]
    }

    fn target(&self, locator: &Locator) -> Result<Target, DriverError> {
        let tree = self.render();
        resolve_one(&tree, locator).map(target_of)
    }
}

/// An [`AutomationDriver`] over an in-memory editor model.
///
/// Known pages survive [`open_page`](AutomationDriver::open_page), the way
/// pages persist in a graph between tests.
pub struct SimDriver {
    options: SimOptions,
    connected: bool,
    editor: Mutex<Editor>,
}

impl SimDriver {
    pub fn new() -> Self {
        Self::with_options(SimOptions::default())
    }

    pub fn with_options(options: SimOptions) -> Self {
        Self {
            options,
            connected: false,
            editor: Mutex::new(Editor::default()),
        }
    }

    pub fn options(&self) -> SimOptions {
        self.options
    }

    /// Titles of every page the editor knows about, in creation order.
    pub async fn known_pages(&self) -> Vec<String> {
        self.editor.lock().await.pages.clone()
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.connected {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }

    /// Focuses the block behind `locator` for keyboard input.
    fn focus(editor: &mut Editor, locator: &Locator) -> Result<(), DriverError> {
        match editor.target(locator)? {
            Target::Editor => Ok(()),
            Target::Block(idx) => editor.focus_block(idx),
            Target::Item(_) | Target::Inert => Err(DriverError::CommandFailed(format!(
                "'{locator}' does not accept keyboard input"
            ))),
        }
    }
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AutomationDriver for SimDriver {
    async fn connect(&mut self) -> Result<(), DriverError> {
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    #[instrument(skip(self), level = "debug")]
    async fn open_page(&self, title: &str) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.editor.lock().await.open_page(title);
        Ok(())
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn type_text(
        &self,
        locator: &Locator,
        text: &str,
        delay: Option<Duration>,
    ) -> Result<(), DriverError> {
        self.ensure_connected()?;
        Self::focus(&mut *self.editor.lock().await, locator)?;
        for c in text.chars() {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            trace!(key = %c, "keystroke");
            self.editor
                .lock()
                .await
                .insert_char(c, self.options.page_search_popup)?;
        }
        Ok(())
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn press_key(&self, locator: &Locator, key: &str) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let mut editor = self.editor.lock().await;
        Self::focus(&mut editor, locator)?;
        editor.press(key, self.options.page_search_popup)
    }

    async fn keyboard_press(&self, chord: &str) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.editor
            .lock()
            .await
            .press(chord, self.options.page_search_popup)
    }

    #[instrument(skip(self, locator), fields(locator = %locator), level = "debug")]
    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.ensure_connected()?;
        let mut editor = self.editor.lock().await;
        match editor.target(locator)? {
            Target::Item(idx) => editor.select_item(idx),
            Target::Block(idx) => editor.focus_block(idx),
            Target::Editor | Target::Inert => Ok(()),
        }
    }

    async fn input_value(&self, locator: &Locator) -> Result<Option<String>, DriverError> {
        self.ensure_connected()?;
        let tree = self.editor.lock().await.render();
        Ok(resolve_one(&tree, locator)?.value.clone())
    }

    async fn dump_tree(&self) -> Result<Vec<UIElement>, DriverError> {
        self.ensure_connected()?;
        Ok(self.editor.lock().await.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(s: &str) -> Locator {
        Locator::parse(s).unwrap()
    }

    async fn driver_on_page(options: SimOptions) -> SimDriver {
        let mut driver = SimDriver::with_options(options);
        driver.connect().await.unwrap();
        driver.open_page("scratch").await.unwrap();
        driver
    }

    async fn value(driver: &SimDriver) -> String {
        driver
            .input_value(&loc("textarea >> nth=0"))
            .await
            .unwrap()
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn requires_connect() {
        let driver = SimDriver::new();
        assert!(!driver.is_connected());
        assert!(matches!(driver.open_page("x").await, Err(DriverError::NotConnected)));
    }

    #[tokio::test]
    async fn open_page_renders_one_editing_block() {
        let driver = driver_on_page(SimOptions::default()).await;
        assert_eq!(driver.count(&loc(".ls-block")).await.unwrap(), 1);
        assert_eq!(driver.count(&loc("textarea")).await.unwrap(), 1);
        assert_eq!(value(&driver).await, "");
    }

    #[tokio::test]
    async fn brackets_autopair_and_closing_steps_over() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "bar [[blah]]", None).await.unwrap();
        assert_eq!(value(&driver).await, "bar [[blah]]");
        assert_eq!(driver.count(&loc(".absolute")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hash_opens_popup_and_whitespace_closes_it() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "#fo", None).await.unwrap();
        assert!(driver
            .find_element(&loc(r#"text="Search for a page""#))
            .await
            .unwrap()
            .is_some());
        driver.type_text(&ta, " ", None).await.unwrap();
        assert_eq!(driver.count(&loc(".absolute")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn caret_before_trigger_closes_popup() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "#", None).await.unwrap();
        driver.press_key(&ta, "ArrowLeft").await.unwrap();
        assert_eq!(driver.count(&loc(".absolute")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn enter_commits_block_and_registers_pages() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "#foo bar [[blah]]", None).await.unwrap();
        driver.press_key(&ta, "Enter").await.unwrap();

        assert_eq!(driver.count(&loc(".ls-block")).await.unwrap(), 2);
        let editor = driver
            .find_element(&loc(".ls-block >> nth=1 >> textarea"))
            .await
            .unwrap();
        assert!(editor.is_some());
        assert_eq!(driver.known_pages().await, vec!["scratch", "foo", "blah"]);
    }

    #[tokio::test]
    async fn clicking_item_completes_tag() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "#foo", None).await.unwrap();
        driver.press_key(&ta, "Escape").await.unwrap();
        driver.press_key(&ta, "Enter").await.unwrap();

        driver.type_text(&ta, "#fo", None).await.unwrap();
        driver.click(&loc(".absolute >> text=foo")).await.unwrap();
        assert_eq!(value(&driver).await, "#foo");
        assert_eq!(driver.count(&loc(".absolute")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn tag_completion_wraps_multi_word_titles() {
        let driver = driver_on_page(SimOptions::default()).await;
        driver.open_page("Reading list").await.unwrap();
        driver.open_page("scratch").await.unwrap();
        let ta = loc("textarea");
        driver.type_text(&ta, "#read", None).await.unwrap();
        driver.click(&loc(".absolute >> text=Reading")).await.unwrap();
        assert_eq!(value(&driver).await, "#[[Reading list]]");
    }

    #[tokio::test]
    async fn page_ref_completion_replaces_query() {
        let driver = driver_on_page(SimOptions::default()).await;
        driver.open_page("blah").await.unwrap();
        driver.open_page("scratch").await.unwrap();
        let ta = loc("textarea");
        driver.type_text(&ta, "[[bl", None).await.unwrap();
        assert_eq!(value(&driver).await, "[[bl]]");
        driver.click(&loc(".absolute >> text=blah")).await.unwrap();
        assert_eq!(value(&driver).await, "[[blah]]");
    }

    #[tokio::test]
    async fn disabled_popup_never_renders() {
        let driver = driver_on_page(SimOptions {
            page_search_popup: false,
        })
        .await;
        driver.type_text(&loc("textarea"), "#fo", None).await.unwrap();
        assert_eq!(driver.count(&loc(".absolute")).await.unwrap(), 0);
        assert_eq!(value(&driver).await, "#fo");
    }

    #[tokio::test]
    async fn clipboard_chords_are_unsupported() {
        let driver = driver_on_page(SimOptions::default()).await;
        let err = driver.keyboard_press("Meta+c").await.unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(ref m) if m.contains("clipboard")));
        let err = driver.keyboard_press("Control+v").await.unwrap_err();
        assert!(matches!(err, DriverError::Unsupported(_)));
    }

    #[tokio::test]
    async fn actions_are_strict() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.press_key(&ta, "Enter").await.unwrap();
        let err = driver.click(&loc(".ls-block")).await.unwrap_err();
        assert!(matches!(err, DriverError::Ambiguous { count: 2, .. }));
        let err = driver.click(&loc(".block-ref")).await.unwrap_err();
        assert!(matches!(err, DriverError::ElementNotFound(_)));
    }

    #[tokio::test]
    async fn arrows_home_end_backspace() {
        let driver = driver_on_page(SimOptions::default()).await;
        let ta = loc("textarea");
        driver.type_text(&ta, "abc", None).await.unwrap();
        driver.press_key(&ta, "Home").await.unwrap();
        driver.press_key(&ta, "ArrowRight").await.unwrap();
        driver.press_key(&ta, "Backspace").await.unwrap();
        driver.press_key(&ta, "End").await.unwrap();
        driver.type_text(&ta, "d", None).await.unwrap();
        assert_eq!(value(&driver).await, "bcd");
    }

    #[test]
    fn referenced_pages_finds_tags_and_refs() {
        assert_eq!(
            referenced_pages("#foo bar [[blah]] #[[two words]], #x"),
            vec!["foo", "blah", "two words", "x"]
        );
        assert!(referenced_pages("no refs # here [[open").is_empty());
    }
}
