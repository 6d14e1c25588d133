//! Cheap enumerations run ahead of typing

use crate::config::FinderConfig;
use crate::error::PrefetchError;
use crate::job::{SearchMode, SourceKind};
use crate::process::collect_lines;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// How a working directory's candidates are listed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enumeration {
    /// gitignore-aware walk of every file, on a blocking thread
    Walk,
    /// A shell command run in the directory
    Shell(String),
    /// A shell command, skipped outside git repositories
    RepoShell(String),
}

impl Enumeration {
    /// The enumeration that warms a cache for `mode`, if the mode has one
    pub fn for_mode(mode: &SearchMode, config: &FinderConfig) -> Option<Self> {
        match mode {
            SearchMode::StaticFilter(SourceKind::Files) => Some(Enumeration::Walk),
            SearchMode::StaticFilter(SourceKind::GitFiles) => {
                Some(Enumeration::Shell(config.git_files_command.clone()))
            }
            SearchMode::StaticFilter(SourceKind::Command(cmd)) => Some(Enumeration::Shell(cmd.clone())),
            // every line of every file: grep with an empty pattern, rooted at `.`
            SearchMode::LiveGrep => Some(Enumeration::RepoShell(format!("{} '' .", config.grep_command))),
            SearchMode::Tags | SearchMode::DynamicList => None,
        }
    }

    /// List the candidates of `dir`
    pub async fn run(&self, dir: &Path) -> Result<Vec<String>, PrefetchError> {
        if !dir.is_dir() {
            return Err(PrefetchError::MissingDir {
                dir: dir.to_path_buf(),
            });
        }

        match self {
            Enumeration::Walk => {
                let root = dir.to_path_buf();
                tokio::task::spawn_blocking(move || walk_files(&root))
                    .await
                    .map_err(|_| PrefetchError::Cancelled {
                        dir: dir.to_path_buf(),
                    })
            }
            Enumeration::Shell(command) => collect_lines(command, dir).await,
            Enumeration::RepoShell(command) => {
                if !is_git_repo(dir) {
                    return Err(PrefetchError::NotGitRepo {
                        dir: dir.to_path_buf(),
                    });
                }
                collect_lines(command, dir).await
            }
        }
    }
}

/// Relative paths of every non-ignored file under `root`, hidden ones included
pub fn walk_files(root: &Path) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .require_git(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut files: Vec<String> = walker
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .collect();

    files.sort();
    files
}

/// Whether `dir` or one of its ancestors holds a `.git` entry
pub fn is_git_repo(dir: &Path) -> bool {
    find_git_root(dir).is_some()
}

pub fn find_git_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .find(|ancestor| ancestor.join(".git").exists())
        .map(Path::to_path_buf)
}
