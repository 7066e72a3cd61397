//! The browsable directory tree, built from flat adapter entry groups.
//!
//! Adapters enumerate a container as flat `(directory, entries)` groups;
//! the engine splits each group's directory path on the format's separator
//! and creates intermediate nodes on demand. The tree is built strictly
//! top-down from path segments, so no cycle is possible, and rebuilding
//! from the same flat list is idempotent.

use crate::adapter::{DirectoryGroup, FormatEntry};
use crate::entry::ArchiveEntry;

/// One directory in the archive namespace.
///
/// The root directory's name is the empty string; every node's full path
/// is reconstructible by walking ancestors.
#[derive(Debug, Clone)]
pub struct DirectoryNode<E> {
    name: String,
    entries: Vec<ArchiveEntry<E>>,
    children: Vec<DirectoryNode<E>>,
}

impl<E: FormatEntry> DirectoryNode<E> {
    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    /// This directory's own name. Empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entries stored directly in this directory.
    pub fn entries(&self) -> &[ArchiveEntry<E>] {
        &self.entries
    }

    /// Mutable access to this directory's entries.
    pub fn entries_mut(&mut self) -> &mut [ArchiveEntry<E>] {
        &mut self.entries
    }

    /// The sub-directories of this directory.
    pub fn children(&self) -> &[DirectoryNode<E>] {
        &self.children
    }

    /// Finds the directory node at `path`, where segments are joined by
    /// `separator`. An empty path resolves to `self`.
    ///
    /// Matching is case-sensitive exact string comparison.
    pub fn find_dir(&self, path: &str, separator: char) -> Option<&DirectoryNode<E>> {
        if path.is_empty() {
            return Some(self);
        }
        let mut node = self;
        for segment in path.split(separator) {
            node = node.children.iter().find(|c| c.name == segment)?;
        }
        Some(node)
    }

    /// Finds the entry at the full archive path `path`.
    pub fn find_entry(&self, path: &str, separator: char) -> Option<&ArchiveEntry<E>> {
        let (dir, file_name) = split_parent(path, separator);
        self.find_dir(dir, separator)?
            .entries
            .iter()
            .find(|e| e.file_name() == file_name)
    }

    /// Mutable variant of [`find_entry`](Self::find_entry), used to stage
    /// imports.
    pub fn find_entry_mut(
        &mut self,
        path: &str,
        separator: char,
    ) -> Option<&mut ArchiveEntry<E>> {
        let (dir, file_name) = split_parent(path, separator);
        let mut node = self;
        if !dir.is_empty() {
            for segment in dir.split(separator) {
                node = node.children.iter_mut().find(|c| c.name == segment)?;
            }
        }
        node.entries.iter_mut().find(|e| e.file_name() == file_name)
    }

    /// Total number of entries in this directory and all descendants.
    pub fn entry_count(&self) -> usize {
        self.entries.len() + self.children.iter().map(Self::entry_count).sum::<usize>()
    }

    /// Visits every entry depth-first, directories after their own
    /// entries, passing each entry's full path joined with `/`.
    ///
    /// Formats with another separator should join paths through
    /// [`ArchiveEntry::full_path`] instead.
    pub fn for_each_entry(&self, f: &mut dyn FnMut(&str, &ArchiveEntry<E>)) {
        self.walk(String::new(), '/', f)
    }

    fn walk(&self, prefix: String, separator: char, f: &mut dyn FnMut(&str, &ArchiveEntry<E>)) {
        for entry in &self.entries {
            let path = if prefix.is_empty() {
                entry.file_name().to_string()
            } else {
                format!("{}{}{}", prefix, separator, entry.file_name())
            };
            f(&path, entry);
        }
        for child in &self.children {
            let child_prefix = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{}{}{}", prefix, separator, child.name)
            };
            child.walk(child_prefix, separator, f);
        }
    }

    /// Collects all entries in deterministic tree order, for repack.
    ///
    /// Order is root entries first, then each child subtree depth-first in
    /// creation order; rebuilding from the same flat groups reproduces it.
    pub fn collect_entries(&self) -> Vec<&ArchiveEntry<E>> {
        let mut out = Vec::with_capacity(self.entry_count());
        self.collect_into(&mut out);
        out
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a ArchiveEntry<E>>) {
        out.extend(self.entries.iter());
        for child in &self.children {
            child.collect_into(out);
        }
    }
}

/// Splits a full path into `(parent_dir, file_name)`.
fn split_parent(path: &str, separator: char) -> (&str, &str) {
    match path.rsplit_once(separator) {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// Builds the directory tree from an adapter's flat entry groups.
///
/// The group whose directory path is empty attaches its entries directly
/// to the root; every other group's path is split on `separator` and
/// walked, creating intermediate nodes on demand (exact string match
/// before creation). Each entry is stamped with `epoch`.
pub fn build_tree<E: FormatEntry>(
    groups: &[DirectoryGroup<E>],
    separator: char,
    epoch: u64,
) -> DirectoryNode<E> {
    let mut root = DirectoryNode::empty("");
    for group in groups {
        let node = if group.directory.is_empty() {
            &mut root
        } else {
            descend(&mut root, &group.directory, separator)
        };
        node.entries.extend(group.entries.iter().map(|record| {
            ArchiveEntry::new(
                record.file_name.clone(),
                group.directory.clone(),
                record.format_entry.clone(),
                epoch,
            )
        }));
    }
    root
}

fn descend<'a, E: FormatEntry>(
    root: &'a mut DirectoryNode<E>,
    path: &str,
    separator: char,
) -> &'a mut DirectoryNode<E> {
    let mut node = root;
    for segment in path.split(separator) {
        let position = node.children.iter().position(|c| c.name == segment);
        let index = match position {
            Some(index) => index,
            None => {
                node.children.push(DirectoryNode::empty(segment));
                node.children.len() - 1
            }
        };
        node = &mut node.children[index];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::EntryRecord;

    #[derive(Debug, Clone, PartialEq)]
    struct StubEntry(u64);

    impl FormatEntry for StubEntry {
        fn data_size(&self) -> u64 {
            self.0
        }
        fn offset(&self) -> u64 {
            0
        }
        fn set_offset(&mut self, _offset: u64) {}
    }

    fn group(directory: &str, names: &[&str]) -> DirectoryGroup<StubEntry> {
        DirectoryGroup {
            directory: directory.to_string(),
            entries: names
                .iter()
                .map(|n| EntryRecord {
                    file_name: n.to_string(),
                    format_entry: StubEntry(1),
                })
                .collect(),
        }
    }

    fn paths_of(tree: &DirectoryNode<StubEntry>) -> Vec<String> {
        let mut paths = Vec::new();
        tree.for_each_entry(&mut |path, _| paths.push(path.to_string()));
        paths
    }

    #[test]
    fn test_root_group_attaches_to_root() {
        let tree = build_tree(&[group("", &["a.txt", "b.txt"])], '/', 1);
        assert_eq!(tree.name(), "");
        assert_eq!(tree.entries().len(), 2);
        assert!(tree.children().is_empty());
    }

    #[test]
    fn test_nested_groups_create_intermediate_nodes() {
        let tree = build_tree(
            &[
                group("", &["a.txt"]),
                group("sub", &["b.bin"]),
                group("sub/deep", &["c.dat"]),
            ],
            '/',
            1,
        );
        assert_eq!(
            paths_of(&tree),
            vec!["a.txt", "sub/b.bin", "sub/deep/c.dat"]
        );

        let sub = tree.find_dir("sub", '/').unwrap();
        assert_eq!(sub.entries().len(), 1);
        assert_eq!(sub.children().len(), 1);
    }

    #[test]
    fn test_sibling_groups_share_intermediate_nodes() {
        let tree = build_tree(
            &[group("pack/audio", &["x.ogg"]), group("pack/gfx", &["y.png"])],
            '/',
            1,
        );
        let pack = tree.find_dir("pack", '/').unwrap();
        assert_eq!(pack.children().len(), 2);
        assert_eq!(tree.entry_count(), 2);
    }

    #[test]
    fn test_name_matching_is_case_sensitive() {
        let tree = build_tree(&[group("Data", &["a"]), group("data", &["b"])], '/', 1);
        assert_eq!(tree.children().len(), 2);
        assert!(tree.find_dir("Data", '/').is_some());
        assert!(tree.find_dir("data", '/').is_some());
        assert!(tree.find_dir("DATA", '/').is_none());
    }

    #[test]
    fn test_find_entry_and_mut() {
        let mut tree = build_tree(&[group("", &["a.txt"]), group("sub", &["b.bin"])], '/', 1);
        assert!(tree.find_entry("a.txt", '/').is_some());
        assert!(tree.find_entry("sub/b.bin", '/').is_some());
        assert!(tree.find_entry("sub/missing", '/').is_none());
        assert!(tree.find_entry("other/b.bin", '/').is_none());

        let entry = tree.find_entry_mut("sub/b.bin", '/').unwrap();
        entry.stage_content(b"new".to_vec());
        assert!(tree.find_entry("sub/b.bin", '/').unwrap().is_modified());
    }

    #[test]
    fn test_backslash_separator() {
        let tree = build_tree(&[group("dir\\sub", &["f.dat"])], '\\', 1);
        assert!(tree.find_dir("dir\\sub", '\\').is_some());
        assert!(tree.find_entry("dir\\sub\\f.dat", '\\').is_some());
    }

    #[test]
    fn test_collect_entries_order_matches_walk_order() {
        let tree = build_tree(
            &[
                group("", &["r1", "r2"]),
                group("a", &["a1"]),
                group("b", &["b1"]),
            ],
            '/',
            1,
        );
        let collected: Vec<_> = tree
            .collect_entries()
            .iter()
            .map(|e| e.file_name().to_string())
            .collect();
        assert_eq!(collected, vec!["r1", "r2", "a1", "b1"]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let groups = [
            group("", &["a.txt"]),
            group("sub", &["b.bin", "c.bin"]),
            group("sub/deep", &["d"]),
        ];
        let first = build_tree(&groups, '/', 1);
        let second = build_tree(&groups, '/', 1);
        assert_eq!(paths_of(&first), paths_of(&second));
        assert_eq!(first.entry_count(), second.entry_count());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_groups() -> impl Strategy<Value = Vec<DirectoryGroup<StubEntry>>> {
            let dir = prop_oneof![
                Just(String::new()),
                "[a-c]",
                "[a-c]/[a-c]",
                "[a-c]/[a-c]/[a-c]",
            ];
            let names = proptest::collection::vec("[a-z]{1,4}", 0..4);
            proptest::collection::vec(
                (dir, names).prop_map(|(directory, names)| DirectoryGroup {
                    directory,
                    entries: names
                        .into_iter()
                        .map(|n| EntryRecord {
                            file_name: n,
                            format_entry: StubEntry(1),
                        })
                        .collect(),
                }),
                0..6,
            )
        }

        proptest! {
            #[test]
            fn rebuild_yields_identical_structure(groups in arb_groups()) {
                let first = build_tree(&groups, '/', 7);
                let second = build_tree(&groups, '/', 7);
                prop_assert_eq!(paths_of(&first), paths_of(&second));
                prop_assert_eq!(first.entry_count(), second.entry_count());
            }

            #[test]
            fn every_entry_reachable_by_its_full_path(groups in arb_groups()) {
                let tree = build_tree(&groups, '/', 7);
                let mut ok = true;
                tree.for_each_entry(&mut |path, entry| {
                    // Duplicate names resolve to the first match; reachability
                    // is what matters here.
                    let found = tree.find_entry(path, '/');
                    ok &= found.is_some_and(|f| f.file_name() == entry.file_name());
                });
                prop_assert!(ok);
            }
        }
    }
}
