//! Git repository fixtures built with `git2` only.

use std::fs;
use std::path::Path;

/// Files committed by [`repo_with_commit`].
pub const FIXTURE_FILES: &[(&str, &[u8])] = &[
    ("README.md", b"# Fixture\n"),
    ("src/lib.rs", b"pub fn answer() -> u32 {\n    42\n}\n"),
    ("assets/logo.bin", &[0x89, 0x50, 0x4e, 0x47, 0x00, 0xff, 0xfe]),
];

/// Initialises a repository on `main` with one commit of [`FIXTURE_FILES`].
///
/// Realism level: **REAL WITH HISTORY**. Clone it with a plain path URL.
///
/// # Panics
/// Panics if any filesystem or git operation fails.
pub fn repo_with_commit(path: &Path) -> git2::Repository {
    let mut options = git2::RepositoryInitOptions::new();
    options.initial_head("main");
    let repo = git2::Repository::init_opts(path, &options).unwrap_or_else(|e| {
        panic!("repo_with_commit: failed to init repository at {}: {e}", path.display())
    });

    for (name, content) in FIXTURE_FILES {
        let file = path.join(name);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .unwrap_or_else(|e| panic!("repo_with_commit: failed to create {}: {e}", parent.display()));
        }
        fs::write(&file, content)
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to write {name}: {e}"));
    }

    let tree_id = {
        let mut index = repo
            .index()
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to open index: {e}"));
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to stage files: {e}"));
        index
            .write()
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to write index: {e}"));
        index
            .write_tree()
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to write tree: {e}"))
    };

    {
        let tree = repo
            .find_tree(tree_id)
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to find tree: {e}"));
        let signature = git2::Signature::now("Test User", "test@test.com")
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to build signature: {e}"));
        repo.commit(Some("HEAD"), &signature, &signature, "Initial commit", &tree, &[])
            .unwrap_or_else(|e| panic!("repo_with_commit: failed to commit: {e}"));
    }

    repo
}
