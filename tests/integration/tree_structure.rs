//! Integration tests for namespace tree structure

use checkoutfs::error::StorageError;
use checkoutfs::tree::hasher::compute_file_id;
use checkoutfs::tree::namespace::NamespaceTree;
use checkoutfs::tree::node::Entry;

/// Test building a nested layout and listing each level
#[test]
fn test_nested_layout_listing() {
    let mut tree = NamespaceTree::new();
    tree.create_directory("/", "docs").unwrap();
    tree.create_directory("/docs", "drafts").unwrap();
    tree.create_file("/docs", "readme.txt").unwrap();
    tree.create_file("/docs/drafts", "a.txt").unwrap();
    tree.create_file("/", "top.txt").unwrap();

    assert_eq!(tree.list("/").unwrap(), vec!["docs", "top.txt"]);
    assert_eq!(tree.list("/docs").unwrap(), vec!["drafts", "readme.txt"]);
    assert_eq!(tree.list("/docs/drafts").unwrap(), vec!["a.txt"]);
    assert_eq!(tree.file_count(), 3);
}

/// Test that every file's id derives from its name and path
#[test]
fn test_file_ids_follow_location() {
    let mut tree = NamespaceTree::new();
    tree.ensure_directories("/a/b").unwrap();
    let entry = tree.create_file("/a/b", "c.txt").unwrap();

    assert_eq!(entry.virtual_path, "/a/b/c.txt");
    assert_eq!(entry.id, compute_file_id("c.txt", "/a/b/c.txt"));
    assert!(entry.has_consistent_id());
}

/// Test that moving a subtree rewrites every descendant path and id
#[test]
fn test_directory_rename_rewrites_descendants() {
    let mut tree = NamespaceTree::new();
    tree.ensure_directories("/projects/alpha/src").unwrap();
    let main = tree.create_file("/projects/alpha/src", "main.rs").unwrap();
    let notes = tree.create_file("/projects/alpha", "notes.md").unwrap();

    let migrations = tree
        .rename_directory("/projects", "alpha", "beta")
        .unwrap();
    assert_eq!(migrations.len(), 2);
    assert!(migrations.iter().any(|(old, _)| old == &main.id));
    assert!(migrations.iter().any(|(old, _)| old == &notes.id));

    let moved = tree.resolve_file("/projects/beta/src/main.rs").unwrap();
    assert_eq!(moved.id, compute_file_id("main.rs", "/projects/beta/src/main.rs"));
    assert_eq!(moved.created_at, main.created_at);
    assert!(matches!(
        tree.resolve("/projects/alpha"),
        Err(StorageError::NotFound(_))
    ));
}

/// Test that paths through a file do not resolve
#[test]
fn test_resolve_through_file_fails() {
    let mut tree = NamespaceTree::new();
    tree.create_file("/", "plain.txt").unwrap();

    assert!(matches!(
        tree.resolve("/plain.txt/child"),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        tree.create_file("/plain.txt", "child"),
        Err(StorageError::NotADirectory(_)) | Err(StorageError::NotFound(_))
    ));
}

/// Test that the root resolves as a directory
#[test]
fn test_root_resolves_as_directory() {
    let tree = NamespaceTree::new();
    let root = tree.resolve("/").unwrap();
    assert!(matches!(root, Entry::Directory(_)));
    assert!(tree.list("/").unwrap().is_empty());
}
