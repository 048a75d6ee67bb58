//! A staff client's local copy of the order collection.
//!
//! The view is fed snapshots from the store and may lag behind it. Every
//! decision taken from it carries the [`LineRevision`] it saw, so a stale
//! decision can be rejected at commit.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ScanError;
use crate::mapping::SkuMappingSnapshot;
use crate::order::{master_sku, Category, LineRevision, LineStatus, OrderLine, ALL_STOCK};
use crate::store::OrderSnapshot;
use crate::workflow::PickRequest;

/// Pending FG work for one portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalGroup {
    pub portal: String,
    pub lines: usize,
    pub units: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterSkuStat {
    pub master_sku: String,
    /// Units not yet completed.
    pub units: u64,
}

/// Narrowing applied by [`LocalView::display_lines`].
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    /// Normalized portal (see [`OrderLine::display_portal`]).
    pub portal: Option<String>,
    pub master_sku: Option<String>,
    /// Case-insensitive SKU substring.
    pub query: Option<String>,
}

/// A line picked out by a scan, with the revision this view showed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub line_id: String,
    pub sku: String,
    pub observed: LineRevision,
}

impl ScanMatch {
    pub fn pick_request(&self, quantity: u32) -> PickRequest {
        PickRequest {
            line_id: self.line_id.clone(),
            quantity,
            observed: self.observed,
        }
    }
}

pub struct LocalView {
    role: Category,
    version: Option<u64>,
    lines: Vec<OrderLine>,
}

impl LocalView {
    pub fn new(role: Category) -> Self {
        Self {
            role,
            version: None,
            lines: Vec::new(),
        }
    }

    pub fn role(&self) -> Category {
        self.role
    }

    /// Version of the last applied snapshot.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Replaces the view with `snapshot` unless it is not newer than what
    /// the view already holds. Returns whether it was applied.
    pub fn apply(&mut self, snapshot: &OrderSnapshot) -> bool {
        if self.version.is_some_and(|v| snapshot.version <= v) {
            log::debug!(
                "Ignoring snapshot v{} (view at v{:?})",
                snapshot.version,
                self.version
            );
            return false;
        }
        self.lines = snapshot
            .lines
            .iter()
            .filter(|l| l.category == self.role)
            .cloned()
            .collect();
        self.version = Some(snapshot.version);
        true
    }

    /// Pending FG lines grouped by portal, "All Stock" first, then by name.
    /// Empty for the other roles.
    pub fn portal_groups(&self) -> Vec<PortalGroup> {
        if self.role != Category::FinishedGoods {
            return Vec::new();
        }

        let mut groups: BTreeMap<&str, PortalGroup> = BTreeMap::new();
        for line in self.lines.iter().filter(|l| l.status == LineStatus::Pending) {
            let portal = line.display_portal();
            let group = groups.entry(portal).or_insert_with(|| PortalGroup {
                portal: portal.to_string(),
                lines: 0,
                units: 0,
            });
            group.lines += 1;
            group.units += u64::from(line.quantity);
        }

        let mut groups: Vec<PortalGroup> = groups.into_values().collect();
        groups.sort_by(|a, b| match (a.portal == ALL_STOCK, b.portal == ALL_STOCK) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.portal.cmp(&b.portal),
        });
        groups
    }

    /// Open units per master SKU, optionally within one portal.
    pub fn master_sku_stats(&self, portal: Option<&str>) -> Vec<MasterSkuStat> {
        let mut stats: BTreeMap<String, u64> = BTreeMap::new();
        for line in self
            .lines
            .iter()
            .filter(|l| l.status != LineStatus::Completed)
            .filter(|l| portal.is_none_or(|p| l.display_portal() == p))
        {
            *stats.entry(line.master_sku()).or_default() += u64::from(line.quantity);
        }
        stats
            .into_iter()
            .map(|(master_sku, units)| MasterSkuStat { master_sku, units })
            .collect()
    }

    /// Lines matching `filter`, pending first, then processing, then
    /// completed; ties by SKU.
    pub fn display_lines(&self, filter: &ViewFilter) -> Vec<&OrderLine> {
        let query = filter.query.as_deref().map(str::to_uppercase);
        let mut lines: Vec<&OrderLine> = self
            .lines
            .iter()
            .filter(|l| {
                filter
                    .portal
                    .as_deref()
                    .is_none_or(|p| l.display_portal() == p)
            })
            .filter(|l| {
                filter
                    .master_sku
                    .as_deref()
                    .is_none_or(|m| master_sku(&l.sku) == m)
            })
            .filter(|l| {
                query
                    .as_deref()
                    .is_none_or(|q| l.sku.to_uppercase().contains(q))
            })
            .collect();
        lines.sort_by(|a, b| {
            a.status
                .rank()
                .cmp(&b.status.rank())
                .then_with(|| a.sku.cmp(&b.sku))
        });
        lines
    }

    /// Finds the first open line, in display order, that a scanned code
    /// refers to. A code matches a line by its own SKU, by the master SKU
    /// it maps to, or by the line's FG/SFG cross-reference.
    pub fn match_scan(
        &self,
        code: &str,
        mappings: &SkuMappingSnapshot,
    ) -> Result<ScanMatch, ScanError> {
        let scanned = code.trim().to_uppercase();
        if scanned.is_empty() {
            return Err(ScanError::EmptyCode);
        }
        let resolved = mappings.resolve(&scanned).to_uppercase();

        self.display_lines(&ViewFilter::default())
            .into_iter()
            .filter(|l| l.status != LineStatus::Completed)
            .find(|l| {
                same(Some(l.sku.as_str()), &scanned)
                    || same(Some(l.sku.as_str()), &resolved)
                    || same(l.fg_sku.as_deref(), &scanned)
                    || same(l.sfg_sku.as_deref(), &scanned)
            })
            .map(|l| ScanMatch {
                line_id: l.id.clone(),
                sku: l.sku.clone(),
                observed: l.revision(),
            })
            .ok_or(ScanError::NotFound { code: scanned })
    }
}

fn same(value: Option<&str>, target: &str) -> bool {
    value.is_some_and(|v| v.trim().to_uppercase() == target)
}
