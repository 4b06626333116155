//! Feature artifact locator
//!
//! Finds the cached feature file extracted for a slide. The on-disk layout is
//! a [`FeatureLayout`] strategy; the default [`ExtractorLayout`] expects
//!
//! ```text
//! <base>/<site>/features/<dir containing an extractor name>/<slide base name>.h5
//! ```
//!
//! Candidate directories are listed once per site and reused for every slide
//! of that site. Lookups never fail: a missing site root, no candidate
//! directory, or no matching file are all "not found".

use argo_common::config::FeaturesConfig;
use argo_common::model::slide_base_name;
use argo_common::{SlideRecord, SlideTable};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Storage layout of the feature cache
pub trait FeatureLayout {
    /// Directory whose sub-directories hold the feature sets of `site`
    fn site_root(&self, base_dir: &Path, site: &str) -> PathBuf;

    /// Whether a sub-directory of the site root is a candidate feature set
    fn is_candidate(&self, dir_name: &str) -> bool;

    /// Artifact file name for a slide base name
    fn artifact_name(&self, base_name: &str) -> String;
}

/// `<site>/features/<extractor dir>/<name>.<extension>` layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorLayout {
    extractors: Vec<String>,
    extension: String,
    preferred: Option<String>,
}

impl ExtractorLayout {
    pub fn new<I, S>(extractors: I, extension: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extractors: extractors.into_iter().map(Into::into).collect(),
            extension: extension.trim_start_matches('.').to_string(),
            preferred: None,
        }
    }

    /// Only directories of `extractor` are candidates
    pub fn with_preferred(mut self, extractor: Option<String>) -> Self {
        self.preferred = extractor.filter(|e| !e.is_empty());
        self
    }

    pub fn from_config(config: &FeaturesConfig) -> Self {
        Self::new(config.extractors.iter().cloned(), &config.extension)
            .with_preferred(config.preferred_extractor.clone())
    }
}

impl Default for ExtractorLayout {
    fn default() -> Self {
        Self::from_config(&FeaturesConfig::default())
    }
}

impl FeatureLayout for ExtractorLayout {
    fn site_root(&self, base_dir: &Path, site: &str) -> PathBuf {
        base_dir.join(site).join("features")
    }

    fn is_candidate(&self, dir_name: &str) -> bool {
        match &self.preferred {
            Some(preferred) => dir_name.contains(preferred.as_str()),
            None => self
                .extractors
                .iter()
                .any(|extractor| dir_name.contains(extractor.as_str())),
        }
    }

    fn artifact_name(&self, base_name: &str) -> String {
        format!("{}.{}", base_name, self.extension)
    }
}

/// Result of resolving one slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureMatch {
    Missing,
    Found(PathBuf),
    /// Several candidate directories hold the artifact; `chosen` is the first
    /// in directory name order
    Ambiguous { chosen: PathBuf, others: Vec<PathBuf> },
}

impl FeatureMatch {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FeatureMatch::Missing => None,
            FeatureMatch::Found(path) | FeatureMatch::Ambiguous { chosen: path, .. } => {
                Some(path.as_path())
            }
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            FeatureMatch::Missing => None,
            FeatureMatch::Found(path) | FeatureMatch::Ambiguous { chosen: path, .. } => {
                Some(path)
            }
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, FeatureMatch::Ambiguous { .. })
    }
}

/// Counts from annotating a slide table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub found: usize,
    pub missing: usize,
    /// Slides without a site, never looked up
    pub skipped: usize,
    pub ambiguous: usize,
    /// Up to three `(slide, artifact)` pairs
    pub examples: Vec<(String, PathBuf)>,
}

impl AnnotationSummary {
    pub fn log(&self) {
        info!(
            found = self.found,
            not_found = self.missing + self.skipped,
            without_site = self.skipped,
            ambiguous = self.ambiguous,
            "Feature path addition complete"
        );
        for (slide, path) in &self.examples {
            info!("  {} → {}", slide, path.display());
        }
    }
}

pub struct FeatureLocator<L = ExtractorLayout> {
    base_dir: PathBuf,
    layout: L,
    site_dirs: HashMap<String, Vec<PathBuf>>,
}

impl<L: FeatureLayout> FeatureLocator<L> {
    pub fn new(base_dir: impl Into<PathBuf>, layout: L) -> Self {
        Self {
            base_dir: base_dir.into(),
            layout,
            site_dirs: HashMap::new(),
        }
    }

    /// Number of sites whose candidate directories have been listed
    pub fn scanned_sites(&self) -> usize {
        self.site_dirs.len()
    }

    /// Candidate feature-set directories of a site, sorted by name
    pub fn candidate_dirs(&mut self, site: &str) -> &[PathBuf] {
        if !self.site_dirs.contains_key(site) {
            let root = self.layout.site_root(&self.base_dir, site);
            let dirs = list_candidates(&self.layout, &root);
            debug!(
                site,
                root = %root.display(),
                candidates = dirs.len(),
                "Listed feature directories"
            );
            self.site_dirs.insert(site.to_string(), dirs);
        }
        &self.site_dirs[site]
    }

    /// Resolve a slide, reporting every candidate that holds the artifact
    pub fn resolve(&mut self, filename: &str, site: &str) -> FeatureMatch {
        let artifact = self.layout.artifact_name(slide_base_name(filename));
        let mut hits = self
            .candidate_dirs(site)
            .iter()
            .map(|dir| dir.join(&artifact))
            .filter(|path| path.exists())
            .collect::<Vec<_>>()
            .into_iter();

        let Some(chosen) = hits.next() else {
            return FeatureMatch::Missing;
        };
        let others: Vec<PathBuf> = hits.collect();
        if others.is_empty() {
            return FeatureMatch::Found(chosen);
        }

        warn!(
            slide = filename,
            site,
            chosen = %chosen.display(),
            others = ?others,
            "Feature artifact present under several extractor directories; using the first"
        );
        FeatureMatch::Ambiguous { chosen, others }
    }

    /// Path of a slide's artifact, if any
    pub fn locate(&mut self, filename: &str, site: &str) -> Option<PathBuf> {
        self.resolve(filename, site).into_path()
    }

    /// Copy of `slides` with the feature path column filled in
    pub fn annotate(&mut self, slides: &SlideTable) -> (SlideTable, AnnotationSummary) {
        let mut summary = AnnotationSummary::default();
        let mut records = Vec::with_capacity(slides.len());

        for record in &slides.records {
            let Some(site) = record.site.as_deref() else {
                summary.skipped += 1;
                records.push(SlideRecord {
                    feature_path: None,
                    ..record.clone()
                });
                continue;
            };

            let found = self.resolve(&record.filename, site);
            if found.is_ambiguous() {
                summary.ambiguous += 1;
            }
            let feature_path = found.into_path();
            match &feature_path {
                Some(path) => {
                    summary.found += 1;
                    if summary.examples.len() < 3 {
                        summary
                            .examples
                            .push((record.base_name().to_string(), path.clone()));
                    }
                }
                None => {
                    summary.missing += 1;
                    debug!(slide = %record.filename, site, "No feature artifact");
                }
            }
            records.push(SlideRecord {
                feature_path,
                ..record.clone()
            });
        }

        debug!(
            sites = self.scanned_sites(),
            "Feature directories listed for annotation"
        );
        let annotated = SlideTable {
            extra_columns: slides.extra_columns.clone(),
            records,
            annotated: true,
        };
        (annotated, summary)
    }
}

fn list_candidates<L: FeatureLayout>(layout: &L, root: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| layout.is_candidate(name))
        })
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_extractor_layout_candidates() {
        let layout = ExtractorLayout::default();
        assert!(layout.is_candidate("STAMP_macenko_xiyuewang-ctranspath-7c998680"));
        assert!(layout.is_candidate("ctranspath_v2"));
        assert!(!layout.is_candidate("uni_features"));

        let layout = layout.with_preferred(Some("uni".to_string()));
        assert!(layout.is_candidate("uni_features"));
        assert!(!layout.is_candidate("ctranspath_v2"));
    }

    #[test]
    fn test_artifact_name_uses_extension() {
        assert_eq!(ExtractorLayout::default().artifact_name("S-1"), "S-1.h5");
        assert_eq!(
            ExtractorLayout::new(["uni"], ".pt").artifact_name("S-1"),
            "S-1.pt"
        );
    }

    #[test]
    fn test_resolve_strips_directory_and_extension() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("siteA/features/ctranspath-1/S-1.h5");
        touch(&artifact);

        let mut locator = FeatureLocator::new(dir.path(), ExtractorLayout::default());
        assert_eq!(
            locator.resolve("/slides/siteA/S-1.svs", "siteA"),
            FeatureMatch::Found(artifact)
        );
    }

    #[test]
    fn test_ambiguous_match_picks_first_in_name_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("siteA/features/a-ctranspath/S-1.h5");
        let second = dir.path().join("siteA/features/b-xiyuewang/S-1.h5");
        touch(&first);
        touch(&second);

        let mut locator = FeatureLocator::new(dir.path(), ExtractorLayout::default());
        let found = locator.resolve("S-1", "siteA");
        assert_eq!(
            found,
            FeatureMatch::Ambiguous {
                chosen: first.clone(),
                others: vec![second]
            }
        );
        assert_eq!(found.path(), Some(first.as_path()));
    }

    #[test]
    fn test_candidate_dirs_are_listed_once_per_site() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("siteA/features/xiyuewang/S-1.h5"));

        let mut locator = FeatureLocator::new(dir.path(), ExtractorLayout::default());
        assert!(locator.locate("S-1", "siteA").is_some());
        assert!(locator.locate("S-2", "siteA").is_none());
        assert!(locator.locate("S-3", "siteB").is_none());
        assert_eq!(locator.scanned_sites(), 2);
    }

    #[test]
    fn test_annotate_skips_slides_without_site() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("siteA/features/xiyuewang/S-1.h5"));

        let slides = SlideTable::new(
            Vec::new(),
            vec![
                SlideRecord::new("P1", "S-1.svs", Some("siteA".to_string())),
                SlideRecord::new("P2", "S-2.svs", Some("siteA".to_string())),
                SlideRecord::new("P3", "S-3.svs", None),
            ],
        );

        let mut locator = FeatureLocator::new(dir.path(), ExtractorLayout::default());
        let (annotated, summary) = locator.annotate(&slides);
        assert!(annotated.annotated);
        assert_eq!(summary.found, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(summary.skipped, 1);
        assert!(annotated.records[0].feature_path.is_some());
        assert!(annotated.records[1].feature_path.is_none());
    }
}
