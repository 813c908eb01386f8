use std::{
    collections::{BTreeMap, BTreeSet},
    fs::{self, File},
    io::{self, Cursor, Read},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

/// The filesystem operations both pipeline stages need.
pub trait Storage {
    /// Create `dir` and any missing parents. Succeeds if it already exists.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Names of the regular files directly inside `dir`. No recursion.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn exists(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Create or truncate `path` with `contents`. The parent must exist.
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// The real disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            // non-UTF-8 names can never end in ".csv" as a str, so skip them
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(path)?))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

#[derive(Debug, Default)]
struct MemTree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemTree {
    fn add_dir_all(&mut self, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.dirs.insert(ancestor.to_path_buf());
        }
    }

    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.dirs.contains(parent),
            _ => true,
        }
    }
}

/// An in-memory tree of directories and files, for fixtures.
#[derive(Debug, Default)]
pub struct MemStorage {
    tree: Mutex<MemTree>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a file at `path`, creating its parent directories.
    pub fn insert(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut tree = self.lock();
        if let Some(parent) = path.parent() {
            tree.add_dir_all(parent);
        }
        tree.files.insert(path.to_path_buf(), contents.into());
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.lock().files.get(path.as_ref()).cloned()
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        self.lock().dirs.contains(path.as_ref())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemTree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl Storage for MemStorage {
    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        let mut tree = self.lock();
        if tree.files.contains_key(dir) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", dir.display()),
            ));
        }
        tree.add_dir_all(dir);
        Ok(())
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<String>> {
        let tree = self.lock();
        if !tree.dirs.contains(dir) {
            return Err(not_found(dir));
        }
        Ok(tree
            .files
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .map(str::to_string)
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        let tree = self.lock();
        tree.files.contains_key(path) || tree.dirs.contains(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let data = self.lock().files.get(path).cloned().ok_or_else(|| not_found(path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tree = self.lock();
        if !tree.parent_exists(path) {
            return Err(not_found(path.parent().unwrap_or(path)));
        }
        tree.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}
