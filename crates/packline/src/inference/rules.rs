//! The header keyword rule table.
//!
//! Rules are evaluated top to bottom. Within a rule the matchers are tried
//! in order; the first matcher that accepts any cell binds the leftmost such
//! cell and later matchers are not consulted.

use crate::order::Channel;

pub const MASTER_SKU_SCORE: u32 = 5;
pub const QTY_SCORE: u32 = 3;

/// Substrings that mark a header as a quantity column.
pub const QTY_KEYWORDS: &[&str] = &["qty", "quantity", "stock", "count", "unit", "available"];

/// How strongly a binding is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    #[default]
    High,
    /// Bound by a category fallback without any quantity keyword.
    Low,
}

/// Column role a rule binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Sku,
    FgSku,
    SfgSku,
    Channel(Channel),
    FgQty,
    SfgQty,
    WipQty,
}

/// One test against a normalized (lowercase, trimmed) header cell.
#[derive(Debug, Clone, Copy)]
pub enum Term {
    /// Whole cell equals the text once inner whitespace is collapsed.
    Equals(&'static str),
    Contains(&'static str),
    /// Contains at least one of the words.
    AnyOf(&'static [&'static str]),
    /// Contains one of the quantity keywords.
    QtyKeyword,
    Excludes(&'static str),
}

impl Term {
    fn accepts(&self, cell: &str) -> bool {
        match self {
            Term::Equals(s) => collapse_whitespace(cell) == *s,
            Term::Contains(s) => cell.contains(s),
            Term::AnyOf(words) => words.iter().any(|w| cell.contains(w)),
            Term::QtyKeyword => QTY_KEYWORDS.iter().any(|k| cell.contains(k)),
            Term::Excludes(s) => !cell.contains(s),
        }
    }
}

/// All terms must accept the cell.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    pub terms: &'static [Term],
    pub confidence: Confidence,
}

impl Matcher {
    const fn high(terms: &'static [Term]) -> Self {
        Self {
            terms,
            confidence: Confidence::High,
        }
    }

    const fn low(terms: &'static [Term]) -> Self {
        Self {
            terms,
            confidence: Confidence::Low,
        }
    }

    pub fn accepts(&self, cell: &str) -> bool {
        !cell.is_empty() && self.terms.iter().all(|t| t.accepts(cell))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub field: Field,
    pub matchers: &'static [Matcher],
    pub score: u32,
}

macro_rules! channel_rule {
    ($channel:ident, $keyword:literal) => {
        Rule {
            field: Field::Channel(Channel::$channel),
            matchers: &[Matcher::high(&[
                Term::Contains($keyword),
                Term::Excludes("date"),
                Term::Excludes("id"),
            ])],
            score: 0,
        }
    };
}

const SFG_WORDS: &[&str] = &["sfg", "semi"];
const WIP_QTY_WORDS: &[&str] = &["qty", "quantity", "stock", "count", "unit", "available", "pick"];

pub const RULES: &[Rule] = &[
    Rule {
        field: Field::Sku,
        matchers: &[
            Matcher::high(&[Term::Equals("master sku")]),
            Matcher::high(&[Term::Equals("mastersku")]),
        ],
        score: MASTER_SKU_SCORE,
    },
    Rule {
        field: Field::FgSku,
        matchers: &[
            Matcher::high(&[Term::Contains("fg"), Term::Contains("sku")]),
            Matcher::high(&[Term::Contains("fg"), Term::Contains("code")]),
        ],
        score: 0,
    },
    Rule {
        field: Field::SfgSku,
        matchers: &[
            Matcher::high(&[Term::AnyOf(SFG_WORDS), Term::Contains("sku")]),
            Matcher::high(&[Term::AnyOf(SFG_WORDS), Term::Contains("code")]),
        ],
        score: 0,
    },
    channel_rule!(Ajio, "ajio"),
    channel_rule!(Nykaa, "nykaa"),
    channel_rule!(Flipkart, "flipkart"),
    channel_rule!(Amazon, "amazon"),
    channel_rule!(Myntra, "myntra"),
    channel_rule!(FirstCry, "firstcry"),
    channel_rule!(Website, "website"),
    Rule {
        field: Field::FgQty,
        matchers: &[
            Matcher::high(&[Term::Contains("finish"), Term::Contains("good"), Term::QtyKeyword]),
            Matcher::high(&[Term::Contains("fg"), Term::QtyKeyword]),
            Matcher::low(&[Term::Contains("finish"), Term::Contains("good")]),
        ],
        score: QTY_SCORE,
    },
    Rule {
        field: Field::SfgQty,
        matchers: &[
            Matcher::high(&[Term::Contains("semi"), Term::Contains("finish"), Term::QtyKeyword]),
            Matcher::high(&[Term::Contains("sfg"), Term::QtyKeyword]),
            Matcher::low(&[Term::Contains("semi"), Term::Contains("finish")]),
        ],
        score: QTY_SCORE,
    },
    Rule {
        field: Field::WipQty,
        matchers: &[
            Matcher::high(&[Term::Contains("wip"), Term::AnyOf(WIP_QTY_WORDS)]),
            Matcher::low(&[Term::Contains("wip")]),
        ],
        score: QTY_SCORE,
    },
];

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
