//! Rule-reference lookup.
//!
//! Rejected actions can be annotated with a citation from the rulebook.
//! Citations are decoration only: nothing the lookup returns feeds back
//! into play.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::ConfigError;

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+(.*)$").expect("Invalid regex"));

/// Source of rulebook citations by topic.
pub trait RulingLookup: Send + Sync {
    /// A citation mentioning `topic`, if one exists.
    fn lookup_ruling(&self, topic: &str) -> Option<String>;
}

/// One numbered rulebook section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub number: String,
    pub body: String,
}

/// Numbered rulebook sections in document order.
///
/// ```
/// use ptcg_referee::rules::RuleBook;
///
/// let book = RuleBook::from_text("4.1 You may attach one Energy card per turn.\n4.2 You may retreat once per turn.");
/// assert_eq!(book.lookup("retreat").as_deref(), Some("§4.2: You may retreat once per turn."));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleBook {
    sections: Vec<Section>,
}

impl RuleBook {
    /// Parse rulebook text. Unnumbered lines continue the previous section;
    /// lines before the first section are ignored.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(caps) = SECTION.captures(line) {
                sections.push(Section {
                    number: caps[1].to_string(),
                    body: caps[2].trim().to_string(),
                });
            } else if let Some(last) = sections.last_mut() {
                last.body.push(' ');
                last.body.push_str(line);
            }
        }
        Self { sections }
    }

    /// Read and parse a rulebook file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::from_text(&std::fs::read_to_string(path)?))
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// First section whose body mentions `topic`, ignoring case.
    #[must_use]
    pub fn lookup(&self, topic: &str) -> Option<String> {
        let needle = topic.to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.sections
            .iter()
            .find(|s| s.body.to_lowercase().contains(&needle))
            .map(|s| format!("§{}: {}", s.number, s.body))
    }
}

impl RulingLookup for RuleBook {
    fn lookup_ruling(&self, topic: &str) -> Option<String> {
        self.lookup(topic)
    }
}
