//! Sales channels finished goods are attributed to.

use serde::{Deserialize, Serialize};

/// Catch-all FG bucket for stock left over after channel distribution.
pub const ALL_STOCK: &str = "All Stock";

/// Portal label stamped on semi-finished and WIP lines.
pub const GENERAL: &str = "General";

/// A sales channel. The vocabulary is closed; adding a channel means
/// extending this enum, the inference rule table and the distribution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Ajio,
    Nykaa,
    Flipkart,
    Amazon,
    Myntra,
    FirstCry,
    Website,
}

impl Channel {
    /// Distribution priority order. Earlier channels are served first.
    pub const PRIORITY: [Channel; 7] = [
        Channel::Ajio,
        Channel::Nykaa,
        Channel::Flipkart,
        Channel::Amazon,
        Channel::Myntra,
        Channel::FirstCry,
        Channel::Website,
    ];

    /// Portal label written onto order lines.
    pub fn label(self) -> &'static str {
        match self {
            Channel::Ajio => "Ajio",
            Channel::Nykaa => "Nykaa",
            Channel::Flipkart => "Flipkart",
            Channel::Amazon => "Amazon",
            Channel::Myntra => "Myntra",
            Channel::FirstCry => "FirstCry",
            Channel::Website => "Website",
        }
    }

    /// Lowercase keyword matched against normalized header cells.
    pub fn keyword(self) -> &'static str {
        match self {
            Channel::Ajio => "ajio",
            Channel::Nykaa => "nykaa",
            Channel::Flipkart => "flipkart",
            Channel::Amazon => "amazon",
            Channel::Myntra => "myntra",
            Channel::FirstCry => "firstcry",
            Channel::Website => "website",
        }
    }

    /// Position in [`Channel::PRIORITY`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Looks a channel up by its portal label (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
