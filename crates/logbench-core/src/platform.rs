//! Host platform detection for keyboard shortcuts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The platform the automated browser runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mac,
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else {
            Platform::Other
        }
    }

    /// Primary shortcut modifier: `Meta` on macOS, `Control` elsewhere.
    pub fn modifier(self) -> &'static str {
        match self {
            Platform::Mac => "Meta",
            Platform::Other => "Control",
        }
    }

    /// `<modifier>+<key>`, e.g. `Meta+c`.
    pub fn chord(self, key: &str) -> String {
        format!("{}+{}", self.modifier(), key)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Mac => "mac",
            Platform::Other => "other",
        })
    }
}
