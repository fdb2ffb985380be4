//! Property tests for virtual path handling and file identity

use checkoutfs::tree::hasher::compute_file_id;
use checkoutfs::tree::namespace::NamespaceTree;
use checkoutfs::tree::path::{normalize_path, parent_and_name, split_path};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}"
}

fn segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..6)
}

proptest! {
    #[test]
    fn normalize_is_idempotent(segs in segments(), extra_slashes in 1usize..4) {
        let sep = "/".repeat(extra_slashes);
        let messy = format!("{}{}{}", sep, segs.join(&sep), sep);
        let once = normalize_path(&messy).unwrap();
        prop_assert_eq!(normalize_path(&once).unwrap(), once.clone());
        prop_assert_eq!(once, format!("/{}", segs.join("/")));
    }

    #[test]
    fn parent_and_name_rejoin(segs in segments()) {
        let full = format!("/{}", segs.join("/"));
        let (parent, name) = parent_and_name(&full).unwrap();
        prop_assert_eq!(&name, segs.last().unwrap());
        let rejoined = if parent == "/" { format!("/{}", name) } else { format!("{}/{}", parent, name) };
        prop_assert_eq!(rejoined, full.clone());
        prop_assert_eq!(split_path(&full).unwrap(), segs);
    }

    #[test]
    fn file_ids_are_deterministic_and_location_bound(name in segment(), a in segment(), b in segment()) {
        let path_a = format!("/{}/{}", a, name);
        let path_b = format!("/{}/{}", b, name);
        prop_assert_eq!(compute_file_id(&name, &path_a), compute_file_id(&name, &path_a));
        if a != b {
            prop_assert_ne!(compute_file_id(&name, &path_a), compute_file_id(&name, &path_b));
        }
    }

    #[test]
    fn created_files_resolve_with_consistent_ids(segs in segments()) {
        let mut tree = NamespaceTree::new();
        let full = format!("/{}", segs.join("/"));
        let (parent, name) = parent_and_name(&full).unwrap();
        tree.ensure_directories(&parent).unwrap();
        let entry = tree.create_file(&parent, &name).unwrap();

        prop_assert_eq!(&entry.virtual_path, &full);
        prop_assert!(entry.has_consistent_id());
        prop_assert_eq!(tree.resolve_file(&full).unwrap(), &entry);
        prop_assert_eq!(tree.file_count(), 1);
    }
}
