use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use walkdir::WalkDir;

/// Collect every `<root>/<speaker>/<clip>.wav` in the dataset layout.
/// The list comes back shuffled so long clips spread evenly across the
/// contiguous worker chunks instead of piling onto one worker.
pub fn discover_wavs(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(crate::WAV_EXTENSION))
        })
        .map(|e| e.into_path())
        .collect();
    files.shuffle(&mut rand::rng());
    files
}
