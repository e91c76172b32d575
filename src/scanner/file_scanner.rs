//! Imaging file discovery and path-derived identity
//!
//! Files are expected under `collection-folder/event-ID-folder/...` at any
//! depth below the root, where the event ID is exactly seven digits.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ConfigError;

/// Length of an event ID folder name
pub const EVENT_ID_DIGITS: usize = 7;
/// Hex characters of the digest kept in a hashed site ID
const HASHED_SITE_CHARS: usize = 12;

/// Where a file sits in the collection/event layout
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PathIdentity {
    pub site: String,
    pub event: String,
    /// Remainder of the path below the event folder, `/`-separated
    pub file: String,
}

impl PathIdentity {
    /// `site/event/file`, the path findings are reported under
    pub fn report_path(&self) -> PathBuf {
        Path::new(&self.site).join(&self.event).join(&self.file)
    }
}

/// How collection folder names become site IDs in the report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteIdStrategy {
    /// Folder name verbatim
    #[default]
    Folder,
    /// `site-` plus the first 12 hex characters of SHA-256(salt + folder name)
    Hashed { salt: String },
}

impl SiteIdStrategy {
    pub fn site_id(&self, folder: &str) -> String {
        match self {
            SiteIdStrategy::Folder => folder.to_string(),
            SiteIdStrategy::Hashed { salt } => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(folder.as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                format!("site-{}", &digest[..HASHED_SITE_CHARS])
            }
        }
    }
}

pub fn is_event_id(name: &str) -> bool {
    name.len() == EVENT_ID_DIGITS && name.bytes().all(|b| b.is_ascii_digit())
}

/// Identity of `path` below `root`, counting the root folder's own name
///
/// The first directory component that is an event ID and has a parent
/// component is the event folder; its parent is the collection folder.
/// Returns `None` for files outside that shape.
pub fn identify(root: &Path, path: &Path) -> Option<PathIdentity> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components: Vec<String> = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .into_iter()
        .collect();
    for component in relative.components() {
        match component {
            Component::Normal(name) => components.push(name.to_string_lossy().into_owned()),
            _ => return None,
        }
    }

    // The last component is the file itself
    let directories = components.len().checked_sub(1)?;
    let event_index = (1..directories).find(|&i| is_event_id(&components[i]))?;
    Some(PathIdentity {
        site: components[event_index - 1].clone(),
        event: components[event_index].clone(),
        file: components[event_index + 1..].join("/"),
    })
}

/// A folder holding files that do not fit the collection/event layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrayFolder {
    /// Relative to the scan root; `.` for the root itself
    pub folder: PathBuf,
    pub files: usize,
}

/// Result of walking a root directory
#[derive(Debug, Default)]
pub struct Discovery {
    /// Files to process with their identity, in walk order
    pub files: Vec<(PathBuf, PathIdentity)>,
    pub stray_folders: Vec<StrayFolder>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

fn relative_folder(root: &Path, path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(root);
    match parent.strip_prefix(root) {
        Ok(relative) if relative.as_os_str().is_empty() => PathBuf::from("."),
        Ok(relative) => relative.to_path_buf(),
        Err(_) => parent.to_path_buf(),
    }
}

/// Walk `root` without following links, sorted by file name
pub fn discover(root: &Path) -> Result<Discovery, ConfigError> {
    let metadata = fs::metadata(root).map_err(|source| ConfigError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::NotADirectory(root.to_path_buf()));
    }
    // Resolve `.` and friends so the root folder name takes part in identity
    let root = root.canonicalize().map_err(|source| ConfigError::UnreadableRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut discovery = Discovery::default();
    let mut strays: BTreeMap<PathBuf, usize> = BTreeMap::new();

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || is_hidden(entry.path()) {
            continue;
        }

        let path = entry.path().to_path_buf();
        match identify(&root, &path) {
            Some(identity) => discovery.files.push((path, identity)),
            None => {
                *strays.entry(relative_folder(&root, &path)).or_insert(0) += 1;
            }
        }
    }

    discovery.stray_folders = strays
        .into_iter()
        .map(|(folder, files)| StrayFolder { folder, files })
        .collect();
    tracing::debug!(
        root = %root.display(),
        files = discovery.files.len(),
        stray_folders = discovery.stray_folders.len(),
        "Discovery finished"
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_identify_nested_event() {
        let root = Path::new("/data/upload");
        let path = Path::new("/data/upload/SiteA/1234567/series1/img.dcm");
        let identity = identify(root, path).unwrap();
        assert_eq!(identity.site, "SiteA");
        assert_eq!(identity.event, "1234567");
        assert_eq!(identity.file, "series1/img.dcm");
    }

    #[test]
    fn test_identify_uses_root_folder_name() {
        let root = Path::new("/data/SiteB");
        let path = Path::new("/data/SiteB/7654321/img.dcm");
        let identity = identify(root, path).unwrap();
        assert_eq!(identity.site, "SiteB");
        assert_eq!(identity.event, "7654321");
        assert_eq!(identity.file, "img.dcm");
    }

    #[test]
    fn test_identify_first_event_wins() {
        let root = Path::new("/r");
        let path = Path::new("/r/Site/1111111/2222222/img.dcm");
        let identity = identify(root, path).unwrap();
        assert_eq!(identity.event, "1111111");
        assert_eq!(identity.file, "2222222/img.dcm");
    }

    #[test]
    fn test_identify_rejects_bad_shapes() {
        let root = Path::new("/r");
        assert!(identify(root, Path::new("/r/Site/123456/img.dcm")).is_none());
        assert!(identify(root, Path::new("/r/Site/12345678/img.dcm")).is_none());
        assert!(identify(root, Path::new("/r/img.dcm")).is_none());
        // A file named like an event ID is not a folder
        assert!(identify(root, Path::new("/r/Site/1234567")).is_none());
        assert!(identify(root, Path::new("/elsewhere/Site/1234567/a.dcm")).is_none());
    }

    #[test]
    fn test_event_id_needs_parent() {
        // The root itself is the only candidate and has no parent
        assert!(identify(Path::new("1234567"), Path::new("1234567/a.dcm")).is_none());
    }

    #[test]
    fn test_hashed_site_ids() {
        let strategy = SiteIdStrategy::Hashed {
            salt: "pepper".to_string(),
        };
        let id = strategy.site_id("SiteA");
        assert!(id.starts_with("site-"));
        assert_eq!(id.len(), "site-".len() + HASHED_SITE_CHARS);
        assert_eq!(id, strategy.site_id("SiteA"));
        assert_ne!(id, strategy.site_id("SiteB"));
        assert_eq!(SiteIdStrategy::Folder.site_id("SiteA"), "SiteA");
    }

    #[test]
    fn test_discover_groups_strays_by_folder() {
        let temp_dir = TempDir::new().unwrap();
        let event = temp_dir.path().join("SiteA").join("1234567");
        fs::create_dir_all(&event).unwrap();
        File::create(event.join("b.dcm")).unwrap();
        File::create(event.join("a.dcm")).unwrap();
        File::create(event.join(".DS_Store")).unwrap();
        let loose = temp_dir.path().join("loose");
        fs::create_dir_all(&loose).unwrap();
        File::create(loose.join("x.dcm")).unwrap();
        File::create(loose.join("y.dcm")).unwrap();

        let discovery = discover(temp_dir.path()).unwrap();
        let names: Vec<&str> = discovery.files.iter().map(|(_, id)| id.file.as_str()).collect();
        assert_eq!(names, ["a.dcm", "b.dcm"]);
        assert_eq!(discovery.stray_folders.len(), 1);
        assert_eq!(discovery.stray_folders[0].files, 2);
        assert_eq!(discovery.stray_folders[0].folder, PathBuf::from("loose"));
    }

    #[test]
    fn test_root_strays_are_reported_as_dot() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("x.dcm")).unwrap();
        let discovery = discover(temp_dir.path()).unwrap();
        assert_eq!(discovery.stray_folders[0].folder, PathBuf::from("."));
    }

    #[test]
    fn test_report_path_joins_identity() {
        let identity = PathIdentity {
            site: "SiteA".to_string(),
            event: "1234567".to_string(),
            file: "series1/img.dcm".to_string(),
        };
        assert_eq!(
            identity.report_path(),
            PathBuf::from("SiteA/1234567/series1/img.dcm")
        );
    }

    #[test]
    fn test_discover_rejects_missing_root() {
        let result = discover(Path::new("/nonexistent/root/xyz"));
        assert!(matches!(result, Err(ConfigError::UnreadableRoot { .. })));
    }

    #[test]
    fn test_discover_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f.dcm");
        File::create(&file).unwrap();
        assert!(matches!(discover(&file), Err(ConfigError::NotADirectory(_))));
    }
}
