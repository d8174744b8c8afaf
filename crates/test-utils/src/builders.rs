#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use treebuild::fs::mock::MockFileSystem;
use treebuild::pipeline::PipelineBuilder;
use treebuild::SourceTree;

/// In-memory tree from `(path, contents)` pairs.
pub fn tree(files: &[(&str, &str)]) -> SourceTree {
    let mut tree = SourceTree::new();
    for (path, contents) in files {
        tree.insert_bytes(*path, contents.as_bytes());
    }
    tree
}

/// Contents of `path` in `tree` as UTF-8, if present.
pub fn text(tree: &SourceTree, path: &str) -> Option<String> {
    tree.get(path)
        .map(|e| String::from_utf8_lossy(e.contents()).into_owned())
}

/// Mock filesystem rooted at `.` holding `files`.
pub fn mock_fs(files: &[(&str, &str)]) -> Arc<MockFileSystem> {
    let fs = MockFileSystem::new();
    for (path, contents) in files {
        fs.add_file(path, contents.as_bytes());
    }
    Arc::new(fs)
}

/// Write `files` below `root`, creating parent directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let abs = root.join(path);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&abs, contents).expect("write test file");
    }
}

/// A source directory and a separate output directory, both temporary.
pub struct Workspace {
    pub source: TempDir,
    pub out: TempDir,
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let source = tempfile::tempdir().expect("create source tempdir");
        let out = tempfile::tempdir().expect("create output tempdir");
        write_files(source.path(), files);
        Self { source, out }
    }

    /// Where the pipeline publishes. Not created until the first publish.
    pub fn output_dir(&self) -> std::path::PathBuf {
        self.out.path().join("dist")
    }

    pub fn write(&self, path: &str, contents: &str) {
        write_files(self.source.path(), &[(path, contents)]);
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.source.path().join(path)).expect("remove test file");
    }

    /// Builder over this workspace with publishing into [`Self::output_dir`].
    pub fn builder(&self) -> PipelineBuilder {
        PipelineBuilder::new(self.source.path()).output_dir(self.output_dir())
    }
}

/// Builder over a mock filesystem that never publishes.
pub fn mock_builder(fs: Arc<MockFileSystem>) -> PipelineBuilder {
    PipelineBuilder::new(".").filesystem(fs).publish(false)
}
