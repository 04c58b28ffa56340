//! Incremental construction of the group tree during one conversion.

use crate::database::{Database, GroupId};
use crate::entry::Entry;
use crate::options::ImportOptions;

use super::{apply_otp, ImportFormat, ImportReport, ImportWarning, WarningKind};

/// Owns the database under construction and collects warnings.
pub(crate) struct TreeBuilder<'o> {
    db: Database,
    options: &'o ImportOptions,
    warnings: Vec<ImportWarning>,
}

impl<'o> TreeBuilder<'o> {
    pub(crate) fn new(root_name: &str, options: &'o ImportOptions) -> Self {
        Self {
            db: Database::new(root_name),
            options,
            warnings: Vec::new(),
        }
    }

    pub(crate) const fn options(&self) -> &ImportOptions {
        self.options
    }

    pub(crate) const fn root(&self) -> GroupId {
        self.db.root()
    }

    pub(crate) const fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Child of `parent` named `name`, created on first use.
    pub(crate) fn group(&mut self, parent: GroupId, name: &str) -> GroupId {
        if let Some(id) = self.db.child_by_name(parent, name) {
            return id;
        }
        tracing::debug!(group = name, "creating group");
        self.db.add_group(parent, name).unwrap_or(parent)
    }

    /// The recycle bin, created under the root on first use.
    pub(crate) fn recycle_bin(&mut self) -> GroupId {
        if let Some(id) = self.db.recycle_bin() {
            return id;
        }
        let root = self.db.root();
        let name = self.options.recycle_bin_name.clone();
        let id = self.group(root, &name);
        self.db.set_recycle_bin(id);
        id
    }

    pub(crate) fn insert(&mut self, group: GroupId, entry: Entry) {
        tracing::debug!(group = %self.db.group_path(group), "adding entry");
        if let Err(entry) = self.db.add_entry(group, entry) {
            let root = self.db.root();
            if self.db.add_entry(root, entry).is_err() {
                tracing::error!("root group missing, entry dropped");
            }
        }
    }

    pub(crate) fn mark_favorite(&self, entry: &mut Entry) {
        entry.add_tag(&self.options.favorite_tag);
    }

    pub(crate) fn mark_archived(&self, entry: &mut Entry) {
        entry.add_tag(&self.options.archived_tag);
    }

    /// Record a warning. Secret values must never appear in `reason`.
    pub(crate) fn warn(&mut self, index: usize, title: &str, kind: WarningKind, reason: impl Into<String>) {
        let warning = ImportWarning {
            index,
            title: title.to_owned(),
            kind,
            reason: reason.into(),
        };
        tracing::warn!(index, kind = ?kind, "{warning}");
        self.warnings.push(warning);
    }

    /// [`apply_otp`], turning a kept-raw value into a warning.
    pub(crate) fn apply_otp(&mut self, index: usize, entry: &mut Entry, value: &str) {
        if let Err(reason) = apply_otp(entry, value) {
            let title = entry.title().to_owned();
            self.warn(index, &title, WarningKind::FieldIgnored, reason);
        }
    }

    pub(crate) fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    pub(crate) fn finish(self, format: ImportFormat) -> ImportReport {
        tracing::info!(
            %format,
            groups = self.db.group_count(),
            entries = self.db.entry_count(),
            warnings = self.warnings.len(),
            "import finished"
        );
        ImportReport {
            database: self.db,
            warnings: self.warnings,
        }
    }
}
