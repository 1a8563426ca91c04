//! The editor regression scenarios.
//!
//! Each function builds one [`Scenario`]. Use [`all`] for the full catalog
//! in its canonical order and [`find`] to look one up by name.

use crate::executor::FIRST_EDITOR;
use crate::platform::Platform;
use crate::scenario::{BuildError, Scenario};

/// Name of the hashtag/brackets scenario.
pub const HASHTAG_AND_BRACKETS: &str = "hashtag-and-brackets-same-line";

/// Name of the block-reference clipboard scenario.
pub const COPY_PASTE_BLOCK_REF: &str = "copy-paste-block-ref";

/// Caret moves that put the caret at the start of `bar [[blah]]`.
pub const HASHTAG_CARET_OFFSET: usize = 12;

/// Completing a tag typed in front of a line that already holds a page
/// reference must keep the rest of the line intact.
pub fn hashtag_and_brackets_same_line() -> Result<Scenario, BuildError> {
    hashtag_and_brackets_same_line_with_offset(HASHTAG_CARET_OFFSET)
}

/// [`hashtag_and_brackets_same_line`] with `offset` caret moves instead of
/// [`HASHTAG_CARET_OFFSET`].
pub fn hashtag_and_brackets_same_line_with_offset(offset: usize) -> Result<Scenario, BuildError> {
    Scenario::builder(HASHTAG_AND_BRACKETS, "hashtag and square brackets in same line")
        .issue("#4178")
        .create_random_page()
        .type_text(FIRST_EDITOR, "#foo bar")
        .enter_next_block()
        .type_text_slowly(FIRST_EDITOR, "bar [[blah]]", 100)
        .press_times(FIRST_EDITOR, "ArrowLeft", offset)
        .type_text(FIRST_EDITOR, " ")
        .press(FIRST_EDITOR, "ArrowLeft")
        .type_text(FIRST_EDITOR, "#")
        .wait_for_visible(r#"text="Search for a page""#)
        .type_text(FIRST_EDITOR, "fo")
        .click(".absolute >> text=foo")
        .expect_value(FIRST_EDITOR, "#foo bar [[blah]]")
        .build()
}

/// Copy a block, paste it as a block reference, then replace the reference
/// with its content. Disabled: the automation browser has no clipboard
/// (`ClipboardItem is not defined`).
pub fn copy_paste_block_ref(platform: Platform) -> Result<Scenario, BuildError> {
    let block_ref = r#".block-ref >> text="Some random text""#;
    let replace_ref = match platform {
        Platform::Mac => "Meta+Shift+r",
        Platform::Other => "Control+Shift+v",
    };
    Scenario::builder(COPY_PASTE_BLOCK_REF, "copy & paste block ref and replace its content")
        .disabled("ClipboardItem is not defined in the automation browser")
        .create_random_page()
        .type_text(FIRST_EDITOR, "Some random text")
        .keyboard_press(platform.chord("c"))
        .comment("pause for inspection")
        .press(FIRST_EDITOR, "Enter")
        .keyboard_press(platform.chord("v"))
        .keyboard_press("Escape")
        .expect_count(block_ref, 1)
        .press(block_ref, "Enter")
        .press_times(FIRST_EDITOR, "ArrowLeft", 4)
        .keyboard_press(replace_ref)
        .expect_value(FIRST_EDITOR, "Some random text")
        .build()
}

/// Every scenario, active and disabled, for the current platform.
pub fn all() -> Result<Vec<Scenario>, BuildError> {
    Ok(vec![
        hashtag_and_brackets_same_line()?,
        copy_paste_block_ref(Platform::current())?,
    ])
}

/// Looks up a catalog scenario by name.
pub fn find(name: &str) -> Result<Option<Scenario>, BuildError> {
    Ok(all()?.into_iter().find(|s| s.name == name))
}
