//! Rendering of an import result. Only structure is shown: group names,
//! entry counts and warnings. Attribute values never reach the output.

use std::fmt::Write as _;

use keyport_vault::{Database, GroupId, ImportFormat, ImportReport, ImportWarning};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary<'a> {
    pub format: ImportFormat,
    pub root: &'a str,
    pub entry_count: usize,
    pub recycle_bin: Option<String>,
    pub groups: Vec<GroupSummary>,
    pub warnings: &'a [ImportWarning],
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub path: String,
    pub entries: usize,
    pub has_icon: bool,
}

impl<'a> Summary<'a> {
    #[must_use]
    pub fn new(format: ImportFormat, report: &'a ImportReport) -> Self {
        let db = &report.database;
        let groups = walk(db)
            .into_iter()
            .filter_map(|(id, _)| {
                let group = db.group(id)?;
                Some(GroupSummary {
                    path: db.group_path(id),
                    entries: group.entries().len(),
                    has_icon: group.icon().is_some(),
                })
            })
            .collect();
        Self {
            format,
            root: db.root_group().name(),
            entry_count: db.entry_count(),
            recycle_bin: db.recycle_bin().map(|id| db.group_path(id)),
            groups,
            warnings: &report.warnings,
        }
    }
}

/// Indented group tree, one line per group.
#[must_use]
pub fn render_tree(db: &Database) -> String {
    let mut out = String::new();
    for (id, depth) in walk(db) {
        let Some(group) = db.group(id) else { continue };
        let count = group.entries().len();
        let noun = if count == 1 { "entry" } else { "entries" };
        let marker = if db.recycle_bin() == Some(id) { " [recycle bin]" } else { "" };
        let _ = writeln!(
            out,
            "{:indent$}{} ({count} {noun}){marker}",
            "",
            group.name(),
            indent = depth.saturating_mul(2)
        );
    }
    out
}

/// Warnings, one per line.
#[must_use]
pub fn render_warnings(warnings: &[ImportWarning]) -> String {
    warnings.iter().fold(String::new(), |mut out, w| {
        let _ = writeln!(out, "warning: {w}");
        out
    })
}

/// Groups in display order with their depth below the root.
fn walk(db: &Database) -> Vec<(GroupId, usize)> {
    let mut out = Vec::new();
    let mut stack = vec![(db.root(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        out.push((id, depth));
        if let Some(group) = db.group(id) {
            let child_depth = depth.saturating_add(1);
            stack.extend(group.children().iter().rev().map(|c| (*c, child_depth)));
        }
    }
    out
}
