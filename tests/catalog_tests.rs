use std::fs;

use picview::catalog::{CatalogOptions, FileCatalog};
use picview::error::Error;
use tempfile::tempdir;

fn touch(dir: &std::path::Path, name: &str) {
    fs::write(dir.join(name), b"x").unwrap();
}

#[test]
fn load_order_is_stable_across_rescans() {
    let tmp = tempdir().unwrap();
    touch(tmp.path(), "c.png");
    touch(tmp.path(), "a.jpg");
    touch(tmp.path(), "B.gif");
    touch(tmp.path(), "notes.txt");

    let first = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    let second = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    assert_eq!(first.entries(), second.entries());

    let names: Vec<_> = first
        .entries()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, ["a.jpg", "B.gif", "c.png"]);
}

#[test]
fn navigation_is_a_local_inverse_on_disk_entries() {
    let tmp = tempdir().unwrap();
    for name in ["a.jpg", "b.png", "c.gif"] {
        touch(tmp.path(), name);
    }
    let catalog = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    assert_eq!(catalog.len(), 3);

    for pair in catalog.entries().windows(2) {
        let next = catalog.next(&pair[0]).unwrap();
        assert_eq!(next, pair[1].as_path());
        assert_eq!(catalog.previous(next).unwrap(), pair[0].as_path());
    }
}

#[test]
fn missing_directory_is_unreadable() {
    let tmp = tempdir().unwrap();
    let gone = tmp.path().join("nope");
    assert!(matches!(
        FileCatalog::load(&gone, CatalogOptions::default()),
        Err(Error::DirectoryUnreadable { .. })
    ));
}

#[test]
fn non_recursive_scan_ignores_subdirectories() {
    let tmp = tempdir().unwrap();
    touch(tmp.path(), "top.png");
    fs::create_dir(tmp.path().join("nested")).unwrap();
    touch(&tmp.path().join("nested"), "deep.png");

    let flat = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    assert_eq!(flat.len(), 1);

    let deep = FileCatalog::load(
        tmp.path(),
        CatalogOptions {
            recursive: true,
            ..CatalogOptions::default()
        },
    )
    .unwrap();
    assert_eq!(deep.len(), 2);
}

#[test]
fn reload_picks_up_new_files() {
    let tmp = tempdir().unwrap();
    touch(tmp.path(), "a.jpg");
    let mut catalog = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    assert_eq!(catalog.len(), 1);

    touch(tmp.path(), "b.jpg");
    catalog.reload().unwrap();
    assert_eq!(catalog.len(), 2);
}

#[test]
fn removing_an_entry_shrinks_the_catalog_by_one() {
    let tmp = tempdir().unwrap();
    for name in ["a.jpg", "b.png", "c.gif"] {
        touch(tmp.path(), name);
    }
    let mut catalog = FileCatalog::load(tmp.path(), CatalogOptions::default()).unwrap();
    let b = tmp.path().join("b.png");

    let replacement = catalog.remove(&b).unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(replacement, tmp.path().join("c.gif"));
    assert_eq!(catalog.position_of(&b), None);
}
