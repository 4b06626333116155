//! Raw slide locator
//!
//! Indexes slide files under the configured slide directories by file name
//! and rewrites slide table `FILENAME`s to absolute paths. Slides that are not
//! found keep their original identifier.

use argo_common::{SlideRecord, SlideTable};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

const SLIDE_EXTENSION: &str = ".svs";
const EXAMPLE_COUNT: usize = 3;

/// File name → absolute path of every file under the scanned directories
#[derive(Debug, Clone, Default)]
pub struct SlideIndex {
    files: HashMap<String, PathBuf>,
}

/// Outcome of matching a slide table against the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationSummary {
    pub found: usize,
    pub missing: usize,
    /// Up to three `(identifier, path)` pairs
    pub found_examples: Vec<(String, PathBuf)>,
    /// Up to three `(identifier, patient)` pairs
    pub missing_examples: Vec<(String, String)>,
}

impl VerificationSummary {
    pub fn log(&self) {
        info!(
            found = self.found,
            missing = self.missing,
            "Slide verification complete"
        );
        for (filename, path) in &self.found_examples {
            info!("  found {} → {}", filename, path.display());
        }
        for (filename, patient) in &self.missing_examples {
            info!("  missing {} (patient {})", filename, patient);
        }
    }
}

impl SlideIndex {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn insert(&mut self, path: PathBuf) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            return;
        };
        if let Some(stem) = name.strip_suffix(SLIDE_EXTENSION) {
            self.files.insert(stem.to_string(), path.clone());
        }
        self.files.insert(name, path);
    }

    /// Path of a slide by identifier, also trying the identifier + `.svs`
    pub fn lookup(&self, filename: &str) -> Option<&Path> {
        self.files
            .get(filename)
            .or_else(|| self.files.get(&format!("{}{}", filename, SLIDE_EXTENSION)))
            .map(PathBuf::as_path)
    }

    /// Copy of `slides` with found slides' `FILENAME` set to their path
    pub fn verify(&self, slides: &SlideTable) -> (SlideTable, VerificationSummary) {
        let mut summary = VerificationSummary::default();

        let records: Vec<SlideRecord> = slides
            .records
            .iter()
            .map(|record| match self.lookup(&record.filename) {
                Some(path) => {
                    summary.found += 1;
                    if summary.found_examples.len() < EXAMPLE_COUNT {
                        summary
                            .found_examples
                            .push((record.filename.clone(), path.to_path_buf()));
                    }
                    SlideRecord {
                        filename: path.to_string_lossy().into_owned(),
                        ..record.clone()
                    }
                }
                None => {
                    summary.missing += 1;
                    if summary.missing_examples.len() < EXAMPLE_COUNT {
                        summary
                            .missing_examples
                            .push((record.filename.clone(), record.patient_id.clone()));
                    }
                    record.clone()
                }
            })
            .collect();

        let verified = SlideTable {
            records,
            ..slides.clone()
        };
        (verified, summary)
    }
}

/// Recursive slide directory scanner
pub struct SlideScanner {
    ignore_patterns: Vec<String>,
}

impl Default for SlideScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideScanner {
    /// Scanner skipping version control and OS metadata entries
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
            ],
        }
    }

    /// Index all files under `dirs`. Missing directories are skipped with a
    /// warning; a name seen again in a later directory replaces the earlier
    /// path.
    pub fn scan(&self, dirs: &[PathBuf]) -> SlideIndex {
        let mut index = SlideIndex::default();
        info!(
            directories = dirs.len(),
            "Starting slide verification in base directories and their subdirectories"
        );

        for dir in dirs {
            if !dir.is_dir() {
                warn!("Slide directory {} does not exist", dir.display());
                continue;
            }
            let root = absolute(dir);
            debug!("Scanning directory: {}", root.display());

            let mut symlink_visited = HashSet::new();
            let walker = WalkDir::new(&root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

            for entry in walker {
                match entry {
                    Ok(entry) => {
                        let is_file = entry.file_type().is_file()
                            || (entry.path_is_symlink() && entry.path().is_file());
                        if is_file {
                            index.insert(entry.into_path());
                        }
                    }
                    Err(e) => warn!("Error accessing entry: {}", e),
                }
            }
        }

        info!(names = index.len(), "Indexed slide file names");
        index
    }

    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let file_name = entry.file_name().to_string_lossy();
        if self
            .ignore_patterns
            .iter()
            .any(|pattern| file_name.contains(pattern.as_str()))
        {
            return false;
        }

        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }
        true
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
