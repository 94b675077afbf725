use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

pub const DEFAULT_FOLDER_NAME: &str = "lang";

/// A language folder holding the source file and (eventually) its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleCollection {
    pub dir: PathBuf,
    pub source_path: PathBuf,
    pub target_path: PathBuf,
}

impl LocaleCollection {
    /// Source path relative to `root`, or the full path when it is not below it.
    pub fn display_path(&self, root: &Path) -> String {
        self.source_path
            .strip_prefix(root)
            .unwrap_or(&self.source_path)
            .display()
            .to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LocaleDiscoverer {
    root: PathBuf,
    folder_name: String,
    source_file: String,
    target_file: String,
}

impl LocaleDiscoverer {
    pub fn new(root: impl Into<PathBuf>, source_lang: &str, target_lang: &str) -> Self {
        Self {
            root: root.into(),
            folder_name: DEFAULT_FOLDER_NAME.to_string(),
            source_file: format!("{}.json", source_lang),
            target_file: format!("{}.json", target_lang),
        }
    }

    pub fn with_folder_name(mut self, folder_name: impl Into<String>) -> Self {
        let folder_name = folder_name.into();
        if !folder_name.trim().is_empty() {
            self.folder_name = folder_name;
        }
        self
    }

    /// Walks the tree depth-first, siblings in file-name order. Each call
    /// starts a fresh walk; unreadable entries are skipped.
    pub fn collections(&self) -> impl Iterator<Item = LocaleCollection> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    debug!("skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_dir())
            .filter(|entry| entry.file_name().to_str() == Some(self.folder_name.as_str()))
            .filter_map(|entry| {
                let dir = entry.into_path();
                let source_path = dir.join(&self.source_file);
                if !source_path.is_file() {
                    return None;
                }
                let target_path = dir.join(&self.target_file);
                Some(LocaleCollection {
                    dir,
                    source_path,
                    target_path,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn finds_lang_folders_with_source_file_in_stable_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("zeta/assets/zeta/lang/en_us.json"));
        touch(&root.join("alpha/assets/alpha/lang/en_us.json"));
        touch(&root.join("alpha/assets/alpha/lang/ja_jp.json"));
        touch(&root.join("beta/assets/beta/lang/ja_jp.json"));
        touch(&root.join("gamma/assets/gamma/language/en_us.json"));

        let discoverer = LocaleDiscoverer::new(root, "en_us", "ja_jp");
        let found = discoverer.collections().collect::<Vec<_>>();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].dir, root.join("alpha/assets/alpha/lang"));
        assert_eq!(found[0].target_path, root.join("alpha/assets/alpha/lang/ja_jp.json"));
        assert_eq!(found[1].dir, root.join("zeta/assets/zeta/lang"));

        let again = discoverer.collections().collect::<Vec<_>>();
        assert_eq!(found, again);
    }

    #[test]
    fn folder_named_like_source_file_is_not_a_source() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lang/en_us.json")).unwrap();
        let discoverer = LocaleDiscoverer::new(dir.path(), "en_us", "ja_jp");
        assert_eq!(discoverer.collections().count(), 0);
    }

    #[test]
    fn custom_folder_name() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("mod/i18n/en_us.json"));
        touch(&dir.path().join("mod/lang/en_us.json"));
        let discoverer =
            LocaleDiscoverer::new(dir.path(), "en_us", "ja_jp").with_folder_name("i18n");
        let found = discoverer.collections().collect::<Vec<_>>();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].display_path(dir.path()),
            Path::new("mod/i18n/en_us.json").display().to_string()
        );
    }
}
