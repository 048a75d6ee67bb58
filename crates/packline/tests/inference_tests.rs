//! Table-driven header inference checks.
//!
//! Each case is a small grid plus the bindings expected from it. Adding a
//! case means adding an entry to `CASES`.

mod common;

use packline::inference::{infer_columns, score_row, Confidence};
use packline::{Channel, Grid, InferenceError};

struct Case {
    name: &'static str,
    rows: &'static [&'static [&'static str]],
    header_row: usize,
    score: u32,
    sku: Option<usize>,
    fg_qty: Option<(usize, Confidence)>,
    sfg_qty: Option<(usize, Confidence)>,
    wip_qty: Option<(usize, Confidence)>,
    channels: &'static [(Channel, usize)],
}

const CASES: &[Case] = &[
    Case {
        name: "full_header",
        rows: &[&["Master SKU", "FG Qty", "SFG Qty", "WIP Qty", "Ajio", "Nykaa"]],
        header_row: 0,
        score: 14,
        sku: Some(0),
        fg_qty: Some((1, Confidence::High)),
        sfg_qty: Some((2, Confidence::High)),
        wip_qty: Some((3, Confidence::High)),
        channels: &[(Channel::Ajio, 4), (Channel::Nykaa, 5)],
    },
    Case {
        name: "bare_wip_decoy_loses",
        rows: &[
            &["WIP"],
            &[],
            &["Master SKU", "Finished Goods Qty", "WIP Qty"],
        ],
        header_row: 2,
        score: 11,
        sku: Some(0),
        fg_qty: Some((1, Confidence::High)),
        sfg_qty: None,
        wip_qty: Some((2, Confidence::High)),
        channels: &[],
    },
    Case {
        name: "decoy_title_row_loses",
        rows: &[
            &["WIP Qty summary"],
            &[],
            &["Master SKU", "Finished Goods Qty", "Semi Finished Qty"],
        ],
        header_row: 2,
        score: 11,
        sku: Some(0),
        fg_qty: Some((1, Confidence::High)),
        sfg_qty: Some((2, Confidence::High)),
        wip_qty: None,
        channels: &[],
    },
    Case {
        name: "fallback_without_qty_keyword",
        rows: &[&["MasterSKU", "Finished Goods", "Amazon Order Id", "Amazon"]],
        header_row: 0,
        score: 8,
        sku: Some(0),
        fg_qty: Some((1, Confidence::Low)),
        sfg_qty: None,
        wip_qty: None,
        channels: &[(Channel::Amazon, 3)],
    },
    Case {
        name: "channel_date_columns_ignored",
        rows: &[&["Master SKU", "FG Stock", "Website Date", "Website", "Myntra"]],
        header_row: 0,
        score: 8,
        sku: Some(0),
        fg_qty: Some((1, Confidence::High)),
        sfg_qty: None,
        wip_qty: None,
        channels: &[(Channel::Myntra, 4), (Channel::Website, 3)],
    },
    Case {
        name: "wip_pick_list",
        rows: &[&["Master SKU", "WIP Pick List"]],
        header_row: 0,
        score: 8,
        sku: Some(0),
        fg_qty: None,
        sfg_qty: None,
        wip_qty: Some((1, Confidence::High)),
        channels: &[],
    },
    Case {
        name: "qty_without_sku_column",
        rows: &[&["Item", "Semi Finished Stock"]],
        header_row: 0,
        score: 3,
        sku: None,
        fg_qty: None,
        sfg_qty: Some((1, Confidence::High)),
        wip_qty: None,
        channels: &[],
    },
    Case {
        name: "tie_keeps_first_row",
        rows: &[&["Master SKU", "WIP Qty"], &["Master SKU", "FG Qty"]],
        header_row: 0,
        score: 8,
        sku: Some(0),
        fg_qty: None,
        sfg_qty: None,
        wip_qty: Some((1, Confidence::High)),
        channels: &[],
    },
];

fn binding(b: Option<packline::inference::Binding>) -> Option<(usize, Confidence)> {
    b.map(|b| (b.column, b.confidence))
}

#[test]
fn test_inference_cases() {
    for case in CASES {
        let grid = Grid::from_text(case.rows.iter().map(|r| r.iter().copied()));
        let map = infer_columns(&grid).unwrap_or_else(|e| panic!("{}: {}", case.name, e));

        assert_eq!(map.header_row, case.header_row, "{}: header row", case.name);
        assert_eq!(map.score, case.score, "{}: score", case.name);
        assert_eq!(map.sku, case.sku, "{}: sku", case.name);
        assert_eq!(binding(map.fg_qty), case.fg_qty, "{}: fg", case.name);
        assert_eq!(binding(map.sfg_qty), case.sfg_qty, "{}: sfg", case.name);
        assert_eq!(binding(map.wip_qty), case.wip_qty, "{}: wip", case.name);

        let channels: Vec<(Channel, usize)> = map.bound_channels().collect();
        assert_eq!(channels, case.channels, "{}: channels", case.name);
    }
}

#[test]
fn test_bare_wip_row_scores_as_fallback() {
    let decoy = score_row(0, &["wip".to_string()]);
    assert_eq!(decoy.score, 3);
    assert_eq!(binding(decoy.wip_qty), Some((0, Confidence::Low)));
}

#[test]
fn test_no_headers_in_scan_window() {
    let mut rows: Vec<Vec<&str>> = vec![vec!["notes"]; 10];
    rows.push(vec!["Master SKU", "FG Qty"]);
    let grid = Grid::from_text(rows);

    assert_eq!(
        infer_columns(&grid),
        Err(InferenceError::HeadersNotRecognized { rows_scanned: 10 })
    );
}

#[test]
fn test_inference_is_deterministic() {
    let grid = common::dispatch_sheet().grid();
    let first = infer_columns(&grid).unwrap();
    for _ in 0..5 {
        assert_eq!(infer_columns(&grid).unwrap(), first);
    }
    assert_eq!(first.header_row, 2);
}
