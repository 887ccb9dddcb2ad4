//! Where compiled units come from and where woven units go.
//!
//! A [`SourceSet`] names every unit of a build and reads and writes them by internal name
//! (`com/example/Position`). Two implementations are provided: [`DirectorySource`] for a
//! compiler output directory and [`MemorySource`] for tests and tooling that never touch
//! the disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use dashmap::{DashMap, DashSet};

use crate::{Error, Result};

/// File extension of compiled units.
pub const UNIT_EXTENSION: &str = "class";

/// A set of compiled units addressed by internal name.
///
/// Implementations must tolerate concurrent `read` and `write` calls for distinct names;
/// the coordinator never touches the same name from two workers.
pub trait SourceSet: Send + Sync {
    /// Every unit name in the set, in a stable order.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the set cannot be enumerated.
    fn names(&self) -> Result<Vec<String>>;

    /// Read the raw bytes of a unit.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the unit cannot be read.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Replace the bytes of a unit. The write is all-or-nothing: a failed write leaves the
    /// previous content in place.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the unit cannot be written.
    fn write(&self, name: &str, data: &[u8]) -> Result<()>;
}

/// A compiler output directory, searched recursively for `.class` files.
///
/// # Examples
///
/// ```rust,no_run
/// use weavescope::project::{DirectorySource, SourceSet};
///
/// let source = DirectorySource::new("target/classes")?;
/// for name in source.names()? {
///     println!("{name}");
/// }
/// # Ok::<(), weavescope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Open a directory source.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if `root` is not a readable directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !fs::metadata(root)?.is_dir() {
            return Err(Error::Error(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk path of a unit.
    #[must_use]
    pub fn path_of(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in name.split('/') {
            path.push(segment);
        }
        path.set_extension(UNIT_EXTENSION);
        path
    }

    fn collect(&self, dir: &Path, names: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect(&path, names)?;
            } else if path.extension().is_some_and(|ext| ext == UNIT_EXTENSION) {
                if let Some(name) = self.name_of(&path) {
                    names.push(name);
                }
            }
        }
        Ok(())
    }

    fn name_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Vec<&str> = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(segments.join("/"))
    }
}

impl SourceSet for DirectorySource {
    fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.collect(&self.root, &mut names)?;
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_of(name))?)
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let target = self.path_of(name);
        let mut staging = target.clone().into_os_string();
        staging.push(".weaving");
        let staging = PathBuf::from(staging);

        if let Err(error) = fs::write(&staging, data).and_then(|()| fs::rename(&staging, &target)) {
            let _ = fs::remove_file(&staging);
            return Err(error.into());
        }
        Ok(())
    }
}

/// An in-memory source set.
///
/// Keeps track of the names written through [`SourceSet::write`], which makes it handy for
/// checking which units a run actually replaced.
#[derive(Debug, Default)]
pub struct MemorySource {
    units: DashMap<String, Vec<u8>>,
    written: DashSet<String>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a unit without marking it written.
    pub fn insert(&self, name: impl Into<String>, data: Vec<u8>) {
        self.units.insert(name.into(), data);
    }

    /// Builder variant of [`MemorySource::insert`].
    #[must_use]
    pub fn with_unit(self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(name, data);
        self
    }

    /// Current bytes of a unit.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.units.get(name).map(|entry| entry.value().clone())
    }

    /// Whether the unit was replaced through [`SourceSet::write`].
    #[must_use]
    pub fn was_written(&self, name: &str) -> bool {
        self.written.contains(name)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if the source holds no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl SourceSet for MemorySource {
    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.units.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.get(name).ok_or_else(|| {
            Error::FileError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no unit named {name}"),
            ))
        })
    }

    fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.units.insert(name.to_string(), data.to_vec());
        self.written.insert(name.to_string());
        Ok(())
    }
}
