//! Directory catalog: the ordered list of navigable image files.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Error;

/// Extensions recognized by default; consulted by both catalog filtering and
/// decoder format dispatch.
pub const DEFAULT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Options controlling catalog enumeration and navigation.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Allowed extensions, lowercase, without dot.
    pub extensions: Vec<String>,
    /// Whether `next`/`previous` wrap around at the ends. Off by default;
    /// the exhausted end is reported instead.
    pub wrap: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_owned()).collect(),
            wrap: false,
            recursive: false,
        }
    }
}

/// Return `true` if `path` has an allowed image extension.
#[must_use]
pub fn has_supported_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| *e == ext)
        })
}

/// Case-folded path comparison with a raw tie-break so the order is total
/// and repeatable across rescans.
fn compare_paths(a: &Path, b: &Path) -> Ordering {
    let ka = a.to_string_lossy().to_lowercase();
    let kb = b.to_string_lossy().to_lowercase();
    ka.cmp(&kb).then_with(|| a.cmp(b))
}

/// Ordered listing of the image files in one directory.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    directory: PathBuf,
    entries: Vec<PathBuf>,
    options: CatalogOptions,
}

impl FileCatalog {
    /// Enumerates `directory` and builds the sorted catalog.
    ///
    /// # Errors
    /// Returns [`Error::DirectoryUnreadable`] when the directory itself
    /// cannot be enumerated. Unreadable entries below it are skipped.
    pub fn load(directory: &Path, options: CatalogOptions) -> Result<Self, Error> {
        if !directory.is_dir() {
            return Err(Error::DirectoryUnreadable {
                path: directory.to_path_buf(),
                reason: "not a directory".into(),
            });
        }

        let mut walk = WalkDir::new(directory).follow_links(true);
        if !options.recursive {
            walk = walk.max_depth(1);
        }

        let mut entries = Vec::new();
        for entry in walk {
            match entry {
                Ok(e) => {
                    if e.file_type().is_file()
                        && has_supported_extension(e.path(), &options.extensions)
                    {
                        entries.push(e.into_path());
                    }
                }
                Err(err) if err.depth() == 0 => {
                    return Err(Error::DirectoryUnreadable {
                        path: directory.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    debug!(directory = %directory.display(), %err, "skipping unreadable entry");
                }
            }
        }
        entries.sort_by(|a, b| compare_paths(a, b));

        Ok(Self {
            directory: directory.to_path_buf(),
            entries,
            options,
        })
    }

    /// An empty catalog; the fallback when enumeration fails.
    pub fn empty(directory: &Path, options: CatalogOptions) -> Self {
        Self {
            directory: directory.to_path_buf(),
            entries: Vec::new(),
            options,
        }
    }

    /// Re-enumerates the directory in place.
    pub fn reload(&mut self) -> Result<(), Error> {
        let fresh = Self::load(&self.directory, self.options.clone())?;
        self.entries = fresh.entries;
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position_of(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e == path)
    }

    pub fn first(&self) -> Option<&Path> {
        self.entries.first().map(PathBuf::as_path)
    }

    pub fn last(&self) -> Option<&Path> {
        self.entries.last().map(PathBuf::as_path)
    }

    /// The entry after `current`.
    ///
    /// When `current` is no longer present (deleted or renamed externally)
    /// navigation restarts at the first entry.
    ///
    /// # Errors
    /// [`Error::NavigationExhausted`] at the last entry unless wrapping is
    /// configured, or when the catalog is empty.
    pub fn next(&self, current: &Path) -> Result<&Path, Error> {
        if self.entries.is_empty() {
            return Err(Error::NavigationExhausted);
        }
        match self.position_of(current) {
            Some(i) if i + 1 < self.entries.len() => Ok(&self.entries[i + 1]),
            Some(_) if self.options.wrap => Ok(&self.entries[0]),
            Some(_) => Err(Error::NavigationExhausted),
            None => Ok(&self.entries[0]),
        }
    }

    /// The entry before `current`; the mirror of [`FileCatalog::next`].
    /// A vanished `current` restarts at the last entry.
    pub fn previous(&self, current: &Path) -> Result<&Path, Error> {
        if self.entries.is_empty() {
            return Err(Error::NavigationExhausted);
        }
        match self.position_of(current) {
            Some(i) if i > 0 => Ok(&self.entries[i - 1]),
            Some(_) if self.options.wrap => Ok(&self.entries[self.entries.len() - 1]),
            Some(_) => Err(Error::NavigationExhausted),
            None => Ok(&self.entries[self.entries.len() - 1]),
        }
    }

    /// Removes `path` from the ordering without a rescan and reports the
    /// entry that takes its place: the entry now at the same position, or the
    /// new last entry when the removed one was last. `None` when the catalog
    /// is empty afterwards or `path` was not listed.
    pub fn remove(&mut self, path: &Path) -> Option<PathBuf> {
        let i = self.position_of(path)?;
        self.entries.remove(i);
        if self.entries.is_empty() {
            return None;
        }
        let i = i.min(self.entries.len() - 1);
        Some(self.entries[i].clone())
    }

    /// Inserts `path` at its sorted position. Returns `false` for duplicates
    /// and files outside the extension allow-list.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        if !has_supported_extension(&path, &self.options.extensions) {
            return false;
        }
        match self
            .entries
            .binary_search_by(|e| compare_paths(e, &path))
        {
            Ok(_) => false,
            Err(i) => {
                self.entries.insert(i, path);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_of(names: &[&str]) -> FileCatalog {
        let mut catalog = FileCatalog::empty(Path::new("/pics"), CatalogOptions::default());
        for name in names {
            catalog.insert(Path::new("/pics").join(name));
        }
        catalog
    }

    #[test]
    fn insert_keeps_case_insensitive_order() {
        let catalog = catalog_of(&["Zebra.png", "apple.jpg", "Mango.gif"]);
        let names: Vec<_> = catalog
            .entries()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["apple.jpg", "Mango.gif", "Zebra.png"]);
    }

    #[test]
    fn next_and_previous_are_local_inverses() {
        let catalog = catalog_of(&["a.jpg", "b.png", "c.gif"]);
        for pair in catalog.entries().windows(2) {
            assert_eq!(catalog.next(&pair[0]).unwrap(), pair[1].as_path());
            assert_eq!(catalog.previous(&pair[1]).unwrap(), pair[0].as_path());
        }
    }

    #[test]
    fn navigation_clamps_by_default() {
        let catalog = catalog_of(&["a.jpg", "b.png"]);
        let last = catalog.last().unwrap().to_path_buf();
        let first = catalog.first().unwrap().to_path_buf();
        assert!(matches!(
            catalog.next(&last),
            Err(Error::NavigationExhausted)
        ));
        assert!(matches!(
            catalog.previous(&first),
            Err(Error::NavigationExhausted)
        ));
    }

    #[test]
    fn navigation_wraps_when_configured() {
        let mut catalog = FileCatalog::empty(
            Path::new("/pics"),
            CatalogOptions {
                wrap: true,
                ..CatalogOptions::default()
            },
        );
        catalog.insert(PathBuf::from("/pics/a.jpg"));
        catalog.insert(PathBuf::from("/pics/b.png"));
        let last = catalog.last().unwrap().to_path_buf();
        assert_eq!(catalog.next(&last).unwrap(), catalog.first().unwrap());
        let first = catalog.first().unwrap().to_path_buf();
        assert_eq!(catalog.previous(&first).unwrap(), catalog.last().unwrap());
    }

    #[test]
    fn remove_middle_promotes_following_entry() {
        let mut catalog = catalog_of(&["a.jpg", "b.png", "c.gif"]);
        let b = Path::new("/pics/b.png");
        let replacement = catalog.remove(b).unwrap();
        assert_eq!(replacement, PathBuf::from("/pics/c.gif"));
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.position_of(b), None);
    }

    #[test]
    fn remove_last_falls_back_to_previous_entry() {
        let mut catalog = catalog_of(&["a.jpg", "b.png", "c.gif"]);
        let replacement = catalog.remove(Path::new("/pics/c.gif")).unwrap();
        assert_eq!(replacement, PathBuf::from("/pics/b.png"));
    }

    #[test]
    fn remove_sole_entry_empties_catalog() {
        let mut catalog = catalog_of(&["a.jpg"]);
        assert_eq!(catalog.remove(Path::new("/pics/a.jpg")), None);
        assert!(catalog.is_empty());
    }

    #[test]
    fn insert_rejects_duplicates_and_foreign_extensions() {
        let mut catalog = catalog_of(&["a.jpg"]);
        assert!(!catalog.insert(PathBuf::from("/pics/a.jpg")));
        assert!(!catalog.insert(PathBuf::from("/pics/notes.txt")));
        assert_eq!(catalog.len(), 1);
    }
}
