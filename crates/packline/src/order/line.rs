//! The `OrderLine` record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::{ALL_STOCK, GENERAL};

/// Work area an order line belongs to. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    FinishedGoods,
    SemiFinished,
    Wip,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::FinishedGoods,
        Category::SemiFinished,
        Category::Wip,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::FinishedGoods => "FINISHED_GOODS",
            Category::SemiFinished => "SEMI_FINISHED",
            Category::Wip => "WIP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FINISHED_GOODS" => Some(Category::FinishedGoods),
            "SEMI_FINISHED" => Some(Category::SemiFinished),
            "WIP" => Some(Category::Wip),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::FinishedGoods => write!(f, "Finished Goods"),
            Category::SemiFinished => write!(f, "Semi-Finished"),
            Category::Wip => write!(f, "WIP"),
        }
    }
}

/// Workflow stage of an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineStatus {
    Pending,
    /// Reachable only for [`Category::Wip`].
    WipProcessing,
    /// Terminal.
    Completed,
}

impl LineStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LineStatus::Pending => "PENDING",
            LineStatus::WipProcessing => "WIP_PROCESSING",
            LineStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(LineStatus::Pending),
            "WIP_PROCESSING" => Some(LineStatus::WipProcessing),
            "COMPLETED" => Some(LineStatus::Completed),
            _ => None,
        }
    }

    /// Sort rank used by staff views: pending work first, finished work last.
    pub fn rank(self) -> u8 {
        match self {
            LineStatus::Pending => 1,
            LineStatus::WipProcessing => 2,
            LineStatus::Completed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LineStatus::Completed)
    }
}

impl std::fmt::Display for LineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(quantity, status)` pair a client observed for a line.
///
/// Conditional store writes compare against it so that a decision taken on
/// a stale view cannot commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRevision {
    pub quantity: u32,
    pub status: LineStatus,
}

/// One unit of work: a quantity of one SKU in one category at one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: String,
    pub sku: String,
    pub category: Category,
    /// Always positive.
    pub quantity: u32,
    pub status: LineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal: Option<String>,
    /// FG cross-reference display code copied from the upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg_sku: Option<String>,
    /// SFG cross-reference display code copied from the upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sfg_sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Ingestion batch the line was created by.
    pub upload_id: String,
    /// Grid row the line was derived from.
    pub source_row: u32,
}

impl OrderLine {
    pub fn master_sku(&self) -> String {
        master_sku(&self.sku)
    }

    pub fn revision(&self) -> LineRevision {
        LineRevision {
            quantity: self.quantity,
            status: self.status,
        }
    }

    /// Portal label used for FG grouping. Lines without a channel, and the
    /// legacy "General" labels, fall into the catch-all bucket.
    pub fn display_portal(&self) -> &str {
        match self.portal.as_deref() {
            None | Some(GENERAL) | Some("General Stock") => ALL_STOCK,
            Some(p) => p,
        }
    }
}

/// Leading alphabetic prefix of a SKU, uppercased; `"OTHER"` if there is none.
pub fn master_sku(sku: &str) -> String {
    let prefix: String = sku
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if prefix.is_empty() {
        "OTHER".to_string()
    } else {
        prefix.to_ascii_uppercase()
    }
}
