//! File access and import resolution.
//!
//! The parser never touches the disk directly: it asks a [`FileSystem`] for
//! text, which lets tests and embedders compile from memory.

use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Source reader used while parsing
pub trait FileSystem {
    fn read(&self, path: &Path) -> io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

/// Reads from the real file system
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFs;

impl FileSystem for DiskFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory file table, keyed by normalized path
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: HashMap<PathBuf, String>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl FileSystem for MemoryFs {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory")
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn read(&self, path: &Path) -> io::Result<String> {
        (**self).read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }
}

/// `package.json`, only the entry point matters
#[derive(Debug, Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

/// Resolve `import "spec"` written in `importer`.
///
/// Bare names (no leading `.` and no `.adom` in them) are looked up as
/// packages first; everything else is relative to the importing file.
pub fn resolve_import(fs: &dyn FileSystem, importer: &Path, spec: &str) -> PathBuf {
    let dir = importer.parent().unwrap_or(Path::new(""));
    if !spec.starts_with('.') && !spec.contains(".adom") {
        if let Some(found) = resolve_package(fs, dir, spec) {
            tracing::trace!(spec, path = %found.display(), "resolved package import");
            return found;
        }
    }
    normalize(&dir.join(spec))
}

/// Path of a file read with `file "..."`, relative to the reading file
pub fn resolve_relative(importer: &Path, spec: &str) -> PathBuf {
    let dir = importer.parent().unwrap_or(Path::new(""));
    normalize(&dir.join(spec))
}

/// Walk `dir` and its ancestors looking for `node_modules/<name>`
fn resolve_package(fs: &dyn FileSystem, dir: &Path, name: &str) -> Option<PathBuf> {
    for ancestor in dir.ancestors() {
        let modules = ancestor.join("node_modules");

        let file = modules.join(format!("{}.adom", name));
        if fs.exists(&file) {
            return Some(normalize(&file));
        }

        let index = modules.join(name).join("index.adom");
        if fs.exists(&index) {
            return Some(normalize(&index));
        }

        let manifest = modules.join(name).join("package.json");
        if fs.exists(&manifest) {
            let main = fs
                .read(&manifest)
                .ok()
                .and_then(|text| serde_json::from_str::<PackageManifest>(&text).ok())
                .and_then(|m| m.main);
            if let Some(main) = main {
                let entry = normalize(&modules.join(name).join(main));
                if fs.exists(&entry) {
                    return Some(entry);
                }
            }
        }
    }
    None
}

/// Lexically resolve `.` and `..` components
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
