//! Virtual file system over physical directories and explicit file mounts.
//!
//! Bakers never touch the disk layout directly: each resource pack mounts
//! its input directories and files into a [`FileSystem`], and the flattened
//! [`FileCollection`] snapshot is what a baker iterates. The same type is
//! reused for the `baking_output` view that exposes already-baked artifacts
//! to higher-order bakers.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

/// Error from a [`DataSource`] lookup.
#[derive(Debug)]
pub enum DataSourceError {
    /// IO error while probing or reading a file
    Io(io::Error),
    /// The path is not present in the source
    NotFound(String),
    /// The path is known but no configured baker can produce it
    NotBaked(String),
    /// A baker failed while producing the path on demand
    Bake(String),
}

impl std::fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceError::Io(e) => write!(f, "IO error: {}", e),
            DataSourceError::NotFound(path) => write!(f, "File not found: {}", path),
            DataSourceError::NotBaked(path) => write!(f, "File not baked: {}", path),
            DataSourceError::Bake(message) => write!(f, "Baking failed: {}", message),
        }
    }
}

impl std::error::Error for DataSourceError {}

impl From<io::Error> for DataSourceError {
    fn from(e: io::Error) -> Self {
        DataSourceError::Io(e)
    }
}

/// Read-only view of files addressable by relative path.
///
/// Implemented by [`FileSystem`] (plain mounts) and by the on-demand
/// `BakerDataSource`, which bakes a file lazily when it is first asked for.
pub trait DataSource: Send + Sync {
    /// Look up a file by normalized relative path.
    fn find_file(&self, path: &str) -> Result<Option<FileHeader>, DataSourceError>;

    /// Read a file's contents, failing if it cannot be resolved.
    fn read_file(&self, path: &str) -> Result<Vec<u8>, DataSourceError> {
        let header = self
            .find_file(path)?
            .ok_or_else(|| DataSourceError::NotFound(path.to_string()))?;
        Ok(fs::read(&header.full_path)?)
    }
}

/// Name, size and write time of one mounted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Normalized relative path ('/' separated) within the mount
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Last write time, milliseconds since the Unix epoch
    pub write_time: u64,
    /// Physical location backing this entry
    pub full_path: PathBuf,
}

impl FileHeader {
    /// Stat a physical file into a header under the given relative path.
    pub fn from_path(rel: &str, full: &Path) -> io::Result<Self> {
        let meta = fs::metadata(full)?;
        Ok(Self {
            path: normalize_path(rel),
            size: meta.len(),
            write_time: write_time_of(&meta),
            full_path: full.to_path_buf(),
        })
    }

    /// Read the file's contents.
    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.full_path)
    }

    /// Extension (lowercased), or empty string when absent.
    pub fn extension(&self) -> String {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Normalize a relative path to forward slashes without a leading "./".
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified.strip_prefix("./").unwrap_or(&unified).to_string()
}

/// Last write time of a file in milliseconds since the Unix epoch.
pub fn write_time_of(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
enum Mount {
    /// A directory whose files are addressed relative to its root
    Dir { root: PathBuf, recursive: bool },
    /// A single file addressed by its bare name
    File { rel: String, full: PathBuf },
}

/// Ordered collection of mounts. Later mounts win on path collision.
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    mounts: Vec<Mount>,
}

impl FileSystem {
    /// Create an empty file system with no mounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a directory. With `recursive`, subdirectories are included and
    /// entries keep their subpath; otherwise only the top level is visible.
    pub fn mount_dir(&mut self, root: &Path, recursive: bool) {
        self.mounts.push(Mount::Dir { root: root.to_path_buf(), recursive });
    }

    /// Mount explicit files. The argument may be a glob pattern; every match
    /// is mounted under its bare file name.
    pub fn mount_file(&mut self, pattern: &Path) -> Result<(), glob::PatternError> {
        let pattern_str = pattern.to_string_lossy();
        if pattern_str.contains('*') || pattern_str.contains('?') || pattern_str.contains('[') {
            for entry in glob::glob(&pattern_str)?.flatten() {
                if entry.is_file() {
                    self.push_file(entry);
                }
            }
        } else if pattern.is_file() {
            self.push_file(pattern.to_path_buf());
        }
        Ok(())
    }

    fn push_file(&mut self, full: PathBuf) {
        let rel = full
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.mounts.push(Mount::File { rel, full });
    }

    /// Number of mounts.
    pub fn mount_count(&self) -> usize {
        self.mounts.len()
    }

    /// Check if nothing has been mounted.
    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Enumerate every mounted file into a sorted, deduplicated snapshot.
    ///
    /// Enumeration order is deterministic: entries are keyed by relative
    /// path and later mounts shadow earlier ones.
    pub fn get_files(&self) -> io::Result<FileCollection> {
        let mut entries: BTreeMap<String, FileHeader> = BTreeMap::new();

        for mount in &self.mounts {
            match mount {
                Mount::Dir { root, recursive } => {
                    let depth = if *recursive { usize::MAX } else { 1 };
                    for entry in WalkDir::new(root)
                        .max_depth(depth)
                        .sort_by_file_name()
                        .into_iter()
                        .filter_map(|e| e.ok())
                    {
                        if !entry.file_type().is_file() {
                            continue;
                        }
                        let rel = entry
                            .path()
                            .strip_prefix(root)
                            .unwrap_or(entry.path())
                            .to_string_lossy()
                            .to_string();
                        let header = FileHeader::from_path(&rel, entry.path())?;
                        entries.insert(header.path.clone(), header);
                    }
                }
                Mount::File { rel, full } => {
                    if full.is_file() {
                        let header = FileHeader::from_path(rel, full)?;
                        entries.insert(header.path.clone(), header);
                    }
                }
            }
        }

        Ok(FileCollection { files: entries.into_values().collect() })
    }
}

impl DataSource for FileSystem {
    fn find_file(&self, path: &str) -> Result<Option<FileHeader>, DataSourceError> {
        let wanted = normalize_path(path);

        for mount in self.mounts.iter().rev() {
            match mount {
                Mount::Dir { root, recursive } => {
                    if !*recursive && wanted.contains('/') {
                        continue;
                    }
                    let full = root.join(&wanted);
                    if full.is_file() {
                        return Ok(Some(FileHeader::from_path(&wanted, &full)?));
                    }
                }
                Mount::File { rel, full } => {
                    if *rel == wanted && full.is_file() {
                        return Ok(Some(FileHeader::from_path(rel, full)?));
                    }
                }
            }
        }

        Ok(None)
    }
}

/// Flattened snapshot of a [`FileSystem`], taken once per pack per run.
#[derive(Debug, Clone, Default)]
pub struct FileCollection {
    files: Vec<FileHeader>,
}

impl FileCollection {
    /// Create a collection from pre-built headers (sorted by path).
    pub fn from_headers(mut files: Vec<FileHeader>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self { files }
    }

    /// All files in the snapshot, sorted by path.
    pub fn files(&self) -> &[FileHeader] {
        &self.files
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Find an entry by normalized relative path.
    pub fn find(&self, path: &str) -> Option<&FileHeader> {
        let wanted = normalize_path(path);
        self.files.iter().find(|f| f.path == wanted)
    }

    /// Files whose extension is one of the given lowercased extensions.
    pub fn with_extensions<'a>(
        &'a self,
        extensions: &'a [&'a str],
    ) -> impl Iterator<Item = &'a FileHeader> {
        self.files.iter().filter(move |f| extensions.contains(&f.extension().as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a\\b\\c.png"), "a/b/c.png");
        assert_eq!(normalize_path("./foo.scr"), "foo.scr");
        assert_eq!(normalize_path("plain.cfg"), "plain.cfg");
    }

    #[test]
    fn test_file_header_from_path() {
        let temp = TempDir::new().unwrap();
        let path = create_test_file(temp.path(), "asset.png", "12345");

        let header = FileHeader::from_path("asset.png", &path).unwrap();
        assert_eq!(header.path, "asset.png");
        assert_eq!(header.size, 5);
        assert!(header.write_time > 0);
        assert_eq!(header.extension(), "png");
    }

    #[test]
    fn test_mount_dir_recursive() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.scr", "a");
        create_test_file(temp.path(), "sub/b.scr", "b");

        let mut vfs = FileSystem::new();
        vfs.mount_dir(temp.path(), true);

        let files = vfs.get_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.find("a.scr").is_some());
        assert!(files.find("sub/b.scr").is_some());
    }

    #[test]
    fn test_mount_dir_flat() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.scr", "a");
        create_test_file(temp.path(), "sub/b.scr", "b");

        let mut vfs = FileSystem::new();
        vfs.mount_dir(temp.path(), false);

        let files = vfs.get_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.find("sub/b.scr").is_none());
    }

    #[test]
    fn test_mount_file_glob() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "one.cfg", "1");
        create_test_file(temp.path(), "two.cfg", "2");
        create_test_file(temp.path(), "skip.txt", "x");

        let mut vfs = FileSystem::new();
        vfs.mount_file(&temp.path().join("*.cfg")).unwrap();

        let files = vfs.get_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.find("one.cfg").is_some());
        assert!(files.find("skip.txt").is_none());
    }

    #[test]
    fn test_later_mount_wins() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        create_test_file(&first, "same.txt", "old");
        create_test_file(&second, "same.txt", "new");

        let mut vfs = FileSystem::new();
        vfs.mount_dir(&first, true);
        vfs.mount_dir(&second, true);

        let files = vfs.get_files().unwrap();
        assert_eq!(files.len(), 1);
        let bytes = files.find("same.txt").unwrap().read().unwrap();
        assert_eq!(bytes, b"new");

        let found = vfs.find_file("same.txt").unwrap().unwrap();
        assert!(found.full_path.starts_with(&second));
    }

    #[test]
    fn test_find_file_missing() {
        let temp = TempDir::new().unwrap();
        let mut vfs = FileSystem::new();
        vfs.mount_dir(temp.path(), true);

        assert!(vfs.find_file("nope.png").unwrap().is_none());
    }

    #[test]
    fn test_read_file_not_found_error() {
        let vfs = FileSystem::new();
        let err = vfs.read_file("missing.txt").unwrap_err();
        assert!(matches!(err, DataSourceError::NotFound(_)));
    }

    #[test]
    fn test_collection_with_extensions() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "a.png", "a");
        create_test_file(temp.path(), "b.TGA", "b");
        create_test_file(temp.path(), "c.scr", "c");

        let mut vfs = FileSystem::new();
        vfs.mount_dir(temp.path(), true);
        let files = vfs.get_files().unwrap();

        let images: Vec<_> = files.with_extensions(&["png", "tga"]).collect();
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_collection_sorted_deterministic() {
        let temp = TempDir::new().unwrap();
        create_test_file(temp.path(), "z.scr", "z");
        create_test_file(temp.path(), "a.scr", "a");
        create_test_file(temp.path(), "m/n.scr", "n");

        let mut vfs = FileSystem::new();
        vfs.mount_dir(temp.path(), true);
        let files = vfs.get_files().unwrap();

        let paths: Vec<_> = files.files().iter().map(|f| f.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
    }
}
