use crate::error::{Error, Result};
use crate::file_type::{classify, FileTypeTag};
use crate::handler::Handler;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One (role, file) match and the outcome of binding its parser
#[derive(Debug)]
pub struct DiscoveredFile {
    pub tag: FileTypeTag,
    pub path: PathBuf,
    pub handler: Result<Handler>,
}

/// Walks `base_path`, classifies every regular file and binds one handler per match.
///
/// The walk is sequential; binding runs on the current rayon pool. Output is
/// stable-sorted by descending tag rank. A matched file that fails to bind keeps
/// its entry with the error, a file matching no pattern is left out.
pub fn discover(base_path: &Path) -> Result<Vec<DiscoveredFile>> {
    let matches = classify_tree(base_path)?;
    info!(
        base = %base_path.display(),
        matches = matches.len(),
        "Classified scenario folder"
    );

    let pb = ProgressBar::new(matches.len() as u64);
    let mut discovered: Vec<DiscoveredFile> = matches
        .into_par_iter()
        .map(|(tag, path)| {
            let handler = tag.constructor()(&path);
            if let Err(e) = &handler {
                warn!(path = %path.display(), %tag, error = %e, "Failed to bind file");
            }
            pb.inc(1);
            DiscoveredFile { tag, path, handler }
        })
        .collect();
    pb.finish_and_clear();

    discovered.sort_by(|a, b| b.tag.rank().cmp(&a.tag.rank()));
    Ok(discovered)
}

/// (tag, path) for every classified file under `base_path`, in walk order.
/// Unreadable directory entries below the root are logged and skipped.
pub fn classify_tree(base_path: &Path) -> Result<Vec<(FileTypeTag, PathBuf)>> {
    if !base_path.is_dir() {
        return Err(Error::DirectoryNotFound(base_path.to_path_buf()));
    }
    let mut matches = Vec::new();
    for entry in WalkDir::new(base_path)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let tags = classify(entry.path());
        if tags.is_empty() {
            debug!(path = %entry.path().display(), "No file type matches");
        }
        for tag in tags {
            matches.push((tag, entry.path().to_path_buf()));
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let result = discover(&dir.path().join("missing"));
        assert!(matches!(result, Err(Error::DirectoryNotFound(_))));
    }

    #[test]
    fn file_path_is_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("scenery.xodr");
        fs::write(&file, "<OpenDRIVE/>").unwrap();
        assert!(matches!(
            discover(&file),
            Err(Error::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn classify_tree_recurses_and_skips_unmatched() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("nested/deeper/scenery.xodr"), "<a/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "scenario").unwrap();
        fs::write(dir.path().join("systemConfig.xml"), "<a/>").unwrap();

        let matches = classify_tree(dir.path()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].0, FileTypeTag::Scenery);
        assert!(matches[0].1.ends_with("nested/deeper/scenery.xodr"));
    }

    #[test]
    fn malformed_match_keeps_its_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("scenery.xodr"), "<OpenDRIVE>").unwrap();
        let found = discover(dir.path()).unwrap();
        assert_eq!(found.len(), 1);
        assert!(matches!(
            found[0].handler,
            Err(Error::MalformedDocument { .. })
        ));
    }
}
