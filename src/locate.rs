//! Exactly-one-match discovery over a directory listing.
//!
//! Build outputs are picked out of directories that routinely hold several
//! near-identical candidates (symbol archives, older builds). A [`Filter`] is
//! a chain of predicates over directory entries; [`Filter::scan`] applies it
//! and reports [`Matches::NotFound`], [`Matches::Ambiguous`] or
//! [`Matches::Found`]. Callers never pick "the first" or "the newest" match.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::error::BuildError;

/// One directory entry under consideration.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone)]
enum Predicate {
    Prefix(String),
    Suffix(String),
    Excludes(String),
    Includes(String),
    Kind(EntryKind),
}

impl Predicate {
    fn holds(&self, candidate: &Candidate) -> bool {
        match self {
            Predicate::Prefix(prefix) => candidate.name.starts_with(prefix.as_str()),
            Predicate::Suffix(suffix) => candidate.name.ends_with(suffix.as_str()),
            Predicate::Excludes(needle) => !candidate.name.contains(needle.as_str()),
            Predicate::Includes(needle) => candidate.name.contains(needle.as_str()),
            Predicate::Kind(EntryKind::File) => candidate.path.is_file(),
            Predicate::Kind(EntryKind::Dir) => candidate.path.is_dir(),
        }
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone)]
pub enum Matches<T> {
    NotFound,
    Ambiguous(Vec<T>),
    Found(T),
}

impl<T> Matches<T> {
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Matches::NotFound,
            1 => match items.pop() {
                Some(item) => Matches::Found(item),
                None => Matches::NotFound,
            },
            _ => Matches::Ambiguous(items),
        }
    }
}

/// A named predicate chain. All predicates must hold for an entry to match.
#[derive(Debug, Clone)]
pub struct Filter {
    what: String,
    predicates: Vec<Predicate>,
}

impl Filter {
    /// `what` names the thing being looked for in error messages.
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            predicates: Vec::new(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Prefix(prefix.into()));
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Suffix(suffix.into()));
        self
    }

    pub fn excludes(mut self, needle: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Excludes(needle.into()));
        self
    }

    pub fn includes(mut self, needle: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Includes(needle.into()));
        self
    }

    pub fn files(mut self) -> Self {
        self.predicates.push(Predicate::Kind(EntryKind::File));
        self
    }

    pub fn dirs(mut self) -> Self {
        self.predicates.push(Predicate::Kind(EntryKind::Dir));
        self
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.predicates.iter().all(|p| p.holds(candidate))
    }

    /// Apply the chain to every entry of `dir`. Matches are sorted by name.
    pub fn scan(&self, dir: &Path) -> Result<Matches<Candidate>> {
        let listing = list_dir(dir)?;
        Ok(self.select(listing))
    }

    fn select(&self, listing: Vec<Candidate>) -> Matches<Candidate> {
        let matched = listing
            .into_iter()
            .filter(|candidate| self.matches(candidate))
            .collect::<Vec<_>>();
        Matches::from_vec(matched)
    }

    /// Like [`Filter::scan`], turning anything but a single match into an error.
    ///
    /// With no match, every entry of `dir` is listed in the error.
    pub fn find_one(&self, dir: &Path) -> Result<PathBuf> {
        let listing = list_dir(dir)?;
        let scanned: Vec<String> = listing.iter().map(|c| c.name.clone()).collect();
        match self.select(listing) {
            Matches::Found(candidate) => Ok(candidate.path),
            Matches::NotFound => Err(BuildError::NoMatch {
                what: self.what.clone(),
                dir: dir.to_path_buf(),
                candidates: scanned,
            }
            .into()),
            Matches::Ambiguous(candidates) => Err(BuildError::Ambiguous {
                what: self.what.clone(),
                dir: dir.to_path_buf(),
                candidates: candidates.into_iter().map(|c| c.name).collect(),
            }
            .into()),
        }
    }
}

/// Entries of `dir`, sorted by name.
fn list_dir(dir: &Path) -> Result<Vec<Candidate>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("listing directory '{}'", dir.display()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("reading entry of '{}'", dir.display()))?;
        candidates.push(Candidate {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
        });
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

/// The `cef_binary_*.tar.bz2` archive built for `commit`, skipping symbol archives.
pub fn cef_archive_filter(commit: &str, archive_format: &str) -> Filter {
    Filter::new("output filename matching criteria")
        .prefix("cef_binary")
        .suffix(format!(".{archive_format}"))
        .excludes("release_symbols")
        .includes(format!("+g{commit}+"))
        .files()
}

/// Exactly one subdirectory of `dir`, whatever its name.
pub fn single_subdir(dir: &Path, what: &str) -> Result<PathBuf> {
    Filter::new(what).dirs().find_one(dir)
}

/// Copy the single archive matching `filter` in `dir` to `output`.
///
/// `output` is not created unless exactly one candidate matches.
pub fn copy_single_match(filter: &Filter, dir: &Path, output: &Path) -> Result<PathBuf> {
    info!("Locating output file in '{}'", dir.display());
    let source = filter.find_one(dir)?;
    info!(
        "Copying output file from '{}' to '{}'",
        source.display(),
        output.display()
    );
    fs::copy(&source, output).with_context(|| {
        format!(
            "copying '{}' to '{}'",
            source.display(),
            output.display()
        )
    })?;
    Ok(source)
}
