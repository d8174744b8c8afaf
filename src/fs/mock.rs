use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Maximum number of symlink hops before resolution gives up.
const MAX_LINK_HOPS: usize = 32;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
    /// Symlink to another mock path (interpreted from the mock root).
    Symlink(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    clock: Arc<Mutex<u64>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            clock: Arc::new(Mutex::new(0)),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let modified = self.tick();
        let mut files = self.files.lock().unwrap();
        files.insert(
            path.clone(),
            MockEntry::File {
                content: content.into(),
                modified,
            },
        );
        link_into_parent(&mut files, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut files = self.files.lock().unwrap();
        ensure_dir_entry(&mut files, &path);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut files = self.files.lock().unwrap();
        files.insert(path.clone(), MockEntry::Symlink(normalize(target.as_ref())));
        link_into_parent(&mut files, &path);
    }

    /// Remove a file, directory or symlink (directories recursively).
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut files = self.files.lock().unwrap();
        files.retain(|p, _| !(p == &path || p.starts_with(&path)));

        if let Some(MockEntry::Dir(children)) = files.get_mut(&parent_of(&path)) {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                children.retain(|c| c != name);
            }
        }
    }

    fn tick(&self) -> SystemTime {
        let mut clock = self.clock.lock().unwrap();
        *clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(*clock)
    }

    /// Follow symlinks component by component.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let files = self.files.lock().unwrap();
        let mut current = PathBuf::from(".");
        let mut hops = 0;

        for comp in normalize(path).components() {
            let Component::Normal(name) = comp else {
                continue;
            };
            current = join(&current, name);
            while let Some(MockEntry::Symlink(target)) = files.get(&current) {
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return Err(anyhow!("Too many levels of symbolic links: {:?}", path));
                }
                current = target.clone();
            }
        }

        if files.contains_key(&current) {
            Ok(current)
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }

    fn entry(&self, path: &Path) -> Option<MockEntry> {
        let resolved = self.resolve(path).ok()?;
        self.files.lock().unwrap().get(&resolved).cloned()
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.entry(path) {
            Some(MockEntry::File { content, .. }) => Ok(content),
            Some(_) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.entry(path).is_some()
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.entry(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entry(path), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.resolve(path)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        match self.entry(path) {
            Some(MockEntry::File { modified, .. }) => Some(modified),
            _ => None,
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.entry(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

/// Strip `.` components so `./src/a` and `src/a` share one key.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::from(".");
    for comp in path.components() {
        if let Component::Normal(name) = comp {
            out = join(&out, name);
        }
    }
    out
}

fn join(base: &Path, name: &std::ffi::OsStr) -> PathBuf {
    if base == Path::new(".") {
        PathBuf::from(name)
    } else {
        base.join(name)
    }
}

fn parent_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn link_into_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if path == Path::new(".") {
        return;
    }
    let parent = parent_of(path);
    ensure_dir_entry(files, &parent);
    if let Some(MockEntry::Dir(children)) = files.get_mut(&parent) {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    link_into_parent(files, path);
}
