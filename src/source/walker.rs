use anyhow::Result;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};

use crate::source::{EntryKind, RepoFile, RepoRef, RepoSource, TreeEntry};

/// Directories that never contain indexable sources
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "dist",
    "build",
    "out",
    "target",
    "vendor",
    "__pycache__",
    "venv",
    "coverage",
];

/// Generated lockfiles: large, dense, and useless as answer context
const EXCLUDED_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "cargo.lock",
    "composer.lock",
    "gemfile.lock",
    "poetry.lock",
    "go.sum",
];

/// Shared by the walker and the file counter so the pre-flight estimate and
/// the actual walk agree on what is indexable. Dot-prefixed names cover VCS
/// directories, env files, and editor config in one rule.
fn is_excluded(entry: &TreeEntry) -> bool {
    let name = entry.name.to_lowercase();
    if name.starts_with('.') {
        return true;
    }
    match entry.kind {
        EntryKind::Dir => EXCLUDED_DIRS.contains(&name.as_str()),
        EntryKind::File => EXCLUDED_FILES.contains(&name.as_str()),
    }
}

/// Count indexable files without downloading any content. Used for the
/// pre-flight credit check, so the count must be exact: any listing failure
/// is propagated rather than skipped.
pub async fn count_files(source: &dyn RepoSource, repo: &RepoRef) -> Result<u64> {
    count_dir(source, repo, String::new()).await
}

/// Each call returns its own subtree count; the parent sums child results.
fn count_dir<'a>(
    source: &'a dyn RepoSource,
    repo: &'a RepoRef,
    dir: String,
) -> BoxFuture<'a, Result<u64>> {
    Box::pin(async move {
        let mut total = 0u64;
        for entry in source.list_dir(repo, &dir).await? {
            if is_excluded(&entry) {
                continue;
            }
            match entry.kind {
                EntryKind::File => total += 1,
                EntryKind::Dir => total += count_dir(source, repo, entry.path).await?,
            }
        }
        Ok(total)
    })
}

/// Walk every indexable file of a repository and fetch its content with a
/// bounded fan-out. A single file fetch failure is logged and skipped; only
/// a failure to list the repository root aborts the walk.
pub async fn walk_files(
    source: &dyn RepoSource,
    repo: &RepoRef,
    concurrency: usize,
) -> Result<Vec<RepoFile>> {
    let paths = collect_file_paths(source, repo, String::new()).await?;
    tracing::info!(
        "Walk found {} indexable files in {}/{}",
        paths.len(),
        repo.owner,
        repo.repo
    );

    let fetched: Vec<Option<RepoFile>> = stream::iter(paths.into_iter().map(|path| async move {
        match source.fetch_file(repo, &path).await {
            Ok(content) => Some(RepoFile { path, content }),
            Err(e) => {
                tracing::warn!("Skipping {path}: {e:#}");
                None
            }
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await;

    Ok(fetched.into_iter().flatten().collect())
}

/// Collect indexable file paths recursively. A subdirectory that fails to
/// list is logged and dropped; the root listing failure propagates from
/// the outer call.
fn collect_file_paths<'a>(
    source: &'a dyn RepoSource,
    repo: &'a RepoRef,
    dir: String,
) -> BoxFuture<'a, Result<Vec<String>>> {
    Box::pin(async move {
        let mut paths = Vec::new();
        for entry in source.list_dir(repo, &dir).await? {
            if is_excluded(&entry) {
                continue;
            }
            match entry.kind {
                EntryKind::File => paths.push(entry.path),
                EntryKind::Dir => {
                    let subdir = entry.path.clone();
                    match collect_file_paths(source, repo, entry.path).await {
                        Ok(mut sub) => paths.append(&mut sub),
                        Err(e) => tracing::warn!("Skipping directory {subdir}: {e:#}"),
                    }
                }
            }
        }
        Ok(paths)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    use crate::source::CommitInfo;

    /// In-memory repository tree for walker tests
    #[derive(Default)]
    struct TreeSource {
        dirs: HashMap<String, Vec<TreeEntry>>,
        files: HashMap<String, String>,
        failing_files: HashSet<String>,
    }

    impl TreeSource {
        fn add_dir(&mut self, parent: &str, name: &str) {
            let path = join(parent, name);
            self.dirs.entry(parent.to_string()).or_default().push(TreeEntry {
                path: path.clone(),
                name: name.to_string(),
                kind: EntryKind::Dir,
            });
            self.dirs.entry(path).or_default();
        }

        fn add_file(&mut self, parent: &str, name: &str, content: &str) {
            let path = join(parent, name);
            self.dirs.entry(parent.to_string()).or_default().push(TreeEntry {
                path: path.clone(),
                name: name.to_string(),
                kind: EntryKind::File,
            });
            self.files.insert(path, content.to_string());
        }
    }

    fn join(parent: &str, name: &str) -> String {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}/{name}")
        }
    }

    #[async_trait]
    impl RepoSource for TreeSource {
        async fn list_dir(&self, _repo: &RepoRef, path: &str) -> Result<Vec<TreeEntry>> {
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such directory: {path}"))
        }

        async fn fetch_file(&self, _repo: &RepoRef, path: &str) -> Result<String> {
            if self.failing_files.contains(path) {
                anyhow::bail!("simulated fetch failure for {path}");
            }
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such file: {path}"))
        }

        async fn list_commits(&self, _repo: &RepoRef) -> Result<Vec<CommitInfo>> {
            anyhow::bail!("not a commit source")
        }

        async fn fetch_diff(&self, _repo: &RepoRef, _hash: &str) -> Result<String> {
            anyhow::bail!("not a commit source")
        }
    }

    fn repo() -> RepoRef {
        RepoRef {
            owner: "acme".to_string(),
            repo: "demo".to_string(),
            token: None,
        }
    }

    fn nested_tree() -> TreeSource {
        let mut t = TreeSource::default();
        t.add_file("", "README.md", "# demo");
        t.add_dir("", "src");
        t.add_file("src", "main.rs", "fn main() {}");
        t.add_dir("src", "deep");
        t.add_file("src/deep", "a.rs", "pub fn a() {}");
        t.add_file("src/deep", "b.rs", "pub fn b() {}");
        t.add_dir("", "empty");
        t
    }

    #[tokio::test]
    async fn test_count_equals_leaf_files_regardless_of_nesting() {
        let t = nested_tree();
        let count = count_files(&t, &repo()).await.unwrap();
        assert_eq!(count, 4);
    }

    #[tokio::test]
    async fn test_count_empty_dir_is_zero_not_error() {
        let mut t = TreeSource::default();
        t.add_dir("", "empty");
        let count = count_files(&t, &repo()).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_count_skips_excluded_entries() {
        let mut t = TreeSource::default();
        t.add_file("", "main.rs", "fn main() {}");
        t.add_file("", "yarn.lock", "lock");
        t.add_file("", ".env", "SECRET=1");
        t.add_dir("", "node_modules");
        t.add_file("node_modules", "index.js", "x");
        t.add_dir("", ".git");
        let count = count_files(&t, &repo()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_walk_returns_contents() {
        let t = nested_tree();
        let files = walk_files(&t, &repo(), 5).await.unwrap();
        assert_eq!(files.len(), 4);
        let main = files.iter().find(|f| f.path == "src/main.rs").unwrap();
        assert_eq!(main.content, "fn main() {}");
    }

    #[tokio::test]
    async fn test_walk_skips_failing_file_and_continues() {
        let mut t = nested_tree();
        t.failing_files.insert("src/main.rs".to_string());
        let files = walk_files(&t, &repo(), 2).await.unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.path != "src/main.rs"));
    }

    #[tokio::test]
    async fn test_walk_fails_when_root_unlistable() {
        // No root listing registered at all
        let t = TreeSource::default();
        assert!(walk_files(&t, &repo(), 2).await.is_err());
    }
}
