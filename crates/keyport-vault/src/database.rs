//! Canonical database: a tree of groups holding entries.
//!
//! Groups live in an arena owned by [`Database`] and are addressed by
//! [`GroupId`]. A group's parent is a plain index, so the tree has no
//! reference cycles and the whole database is `Send`.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::entry::Entry;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Handle of a group inside one [`Database`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);

/// A named folder of entries and sub-groups.
#[derive(Clone, Debug)]
pub struct Group {
    uuid: Uuid,
    name: String,
    icon: Option<Uuid>,
    parent: Option<GroupId>,
    children: Vec<GroupId>,
    entries: Vec<Entry>,
}

impl Group {
    fn new(name: &str, parent: Option<GroupId>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_owned(),
            icon: None,
            parent,
            children: Vec::new(),
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Custom icon, as a key into [`Metadata::custom_icons`].
    #[must_use]
    pub const fn icon(&self) -> Option<Uuid> {
        self.icon
    }

    #[must_use]
    pub const fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    /// Child groups in insertion order.
    #[must_use]
    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

/// Database-wide settings.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    recycle_bin: Option<GroupId>,
    custom_icons: BTreeMap<Uuid, Vec<u8>>,
}

impl Metadata {
    #[must_use]
    pub const fn recycle_bin(&self) -> Option<GroupId> {
        self.recycle_bin
    }

    /// Icon bytes by UUID.
    #[must_use]
    pub const fn custom_icons(&self) -> &BTreeMap<Uuid, Vec<u8>> {
        &self.custom_icons
    }
}

/// Root owner of the group tree.
#[derive(Clone, Debug)]
pub struct Database {
    groups: Vec<Group>,
    metadata: Metadata,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl Database {
    /// Fresh database with an empty root group called `root_name`.
    #[must_use]
    pub fn new(root_name: &str) -> Self {
        Self {
            groups: vec![Group::new(root_name, None)],
            metadata: Metadata::default(),
        }
    }

    #[must_use]
    pub const fn root(&self) -> GroupId {
        GroupId(0)
    }

    #[must_use]
    pub fn root_group(&self) -> &Group {
        &self.groups[0]
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of groups, root included.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Create a child of `parent`. Returns `None` if `parent` is unknown.
    pub fn add_group(&mut self, parent: GroupId, name: &str) -> Option<GroupId> {
        if self.group(parent).is_none() {
            return None;
        }
        let id = GroupId(self.groups.len());
        self.groups.push(Group::new(name, Some(parent)));
        self.groups.get_mut(parent.0)?.children.push(id);
        Some(id)
    }

    /// First direct child of `parent` named `name`.
    #[must_use]
    pub fn child_by_name(&self, parent: GroupId, name: &str) -> Option<GroupId> {
        self.group(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.group(c).is_some_and(|g| g.name == name))
    }

    /// Append `entry` to `group`. Hands the entry back if the group is unknown.
    ///
    /// # Errors
    ///
    /// Returns the entry unchanged when `group` does not belong to this
    /// database.
    pub fn add_entry(&mut self, group: GroupId, entry: Entry) -> Result<(), Entry> {
        match self.groups.get_mut(group.0) {
            Some(g) => {
                g.entries.push(entry);
                Ok(())
            }
            None => Err(entry),
        }
    }

    /// Group at `/A/B` (relative to the root; `/` is the root itself).
    #[must_use]
    pub fn find_group_by_path(&self, path: &str) -> Option<GroupId> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.root(), |id, name| self.child_by_name(id, name))
    }

    /// Entry at `/A/B/Title`: the first entry titled `Title` in group `/A/B`.
    #[must_use]
    pub fn find_entry_by_path(&self, path: &str) -> Option<&Entry> {
        let trimmed = path.trim_start_matches('/');
        let (group_path, title) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
        let group = self.find_group_by_path(group_path)?;
        self.group(group)?.entries.iter().find(|e| e.title() == title)
    }

    /// Every entry, depth-first from the root, with its group.
    #[must_use]
    pub fn entries(&self) -> Vec<(GroupId, &Entry)> {
        let mut out = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            let Some(group) = self.group(id) else { continue };
            out.extend(group.entries.iter().map(|e| (id, e)));
            stack.extend(group.children.iter().rev().copied());
        }
        out
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    /// `/A/B` path of a group; the root is `/`.
    #[must_use]
    pub fn group_path(&self, id: GroupId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(group) = self.group(cur) else { break };
            if group.parent.is_some() {
                names.push(group.name.as_str());
            }
            current = group.parent;
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    #[must_use]
    pub const fn recycle_bin(&self) -> Option<GroupId> {
        self.metadata.recycle_bin
    }

    pub fn set_recycle_bin(&mut self, group: GroupId) {
        self.metadata.recycle_bin = Some(group);
    }

    /// Register an icon and return its UUID.
    pub fn add_custom_icon(&mut self, data: Vec<u8>) -> Uuid {
        let uuid = Uuid::new_v4();
        self.metadata.custom_icons.insert(uuid, data);
        uuid
    }

    /// Assign a registered icon to `group`. Returns `false` if either is unknown.
    pub fn set_group_icon(&mut self, group: GroupId, icon: Uuid) -> bool {
        if !self.metadata.custom_icons.contains_key(&icon) {
            return false;
        }
        match self.groups.get_mut(group.0) {
            Some(g) => {
                g.icon = Some(icon);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> Entry {
        let mut entry = Entry::new();
        entry.set_title(title);
        entry
    }

    #[test]
    fn new_database_has_only_a_root() {
        let db = Database::new("Vault");
        assert_eq!(db.group_count(), 1);
        assert_eq!(db.root_group().name(), "Vault");
        assert!(db.root_group().parent().is_none());
        assert!(db.recycle_bin().is_none());
        assert_eq!(db.entry_count(), 0);
    }

    #[test]
    fn paths_resolve_groups_and_entries() {
        let mut db = Database::new("Vault");
        let personal = db.add_group(db.root(), "Personal").unwrap();
        let banking = db.add_group(personal, "Banking").unwrap();
        db.add_entry(banking, titled("Checking")).unwrap();
        db.add_entry(db.root(), titled("Loose")).unwrap();

        assert_eq!(db.find_group_by_path("/Personal/Banking"), Some(banking));
        assert_eq!(db.find_group_by_path("/"), Some(db.root()));
        assert!(db.find_group_by_path("/Nope").is_none());
        assert_eq!(
            db.find_entry_by_path("/Personal/Banking/Checking").unwrap().title(),
            "Checking"
        );
        assert_eq!(db.find_entry_by_path("/Loose").unwrap().title(), "Loose");
        assert!(db.find_entry_by_path("/Personal/Checking").is_none());
        assert_eq!(db.group_path(banking), "/Personal/Banking");
        assert_eq!(db.group_path(db.root()), "/");
    }

    #[test]
    fn entries_walk_depth_first_in_order() {
        let mut db = Database::new("Vault");
        let a = db.add_group(db.root(), "A").unwrap();
        let b = db.add_group(db.root(), "B").unwrap();
        db.add_entry(b, titled("b1")).unwrap();
        db.add_entry(a, titled("a1")).unwrap();
        db.add_entry(db.root(), titled("r1")).unwrap();

        let titles: Vec<_> = db.entries().iter().map(|(_, e)| e.title().to_owned()).collect();
        assert_eq!(titles, ["r1", "a1", "b1"]);
        assert_eq!(db.entry_count(), 3);
    }

    #[test]
    fn unknown_group_ids_are_rejected() {
        let mut db = Database::new("Vault");
        let mut other = Database::new("Other");
        let x = other.add_group(other.root(), "x").unwrap();
        let foreign = other.add_group(x, "y").unwrap();

        assert!(db.add_group(foreign, "z").is_none());
        assert!(db.add_entry(foreign, titled("t")).is_err());
    }

    #[test]
    fn custom_icons_attach_to_groups() {
        let mut db = Database::new("Vault");
        let g = db.add_group(db.root(), "Shared").unwrap();
        let icon = db.add_custom_icon(vec![0x89, b'P', b'N', b'G']);
        assert!(db.set_group_icon(g, icon));
        assert_eq!(db.group(g).unwrap().icon(), Some(icon));
        assert!(!db.set_group_icon(g, Uuid::new_v4()));
        assert_eq!(db.metadata().custom_icons().len(), 1);
    }

    #[test]
    fn database_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Database>();
    }
}
