use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::language::Language;

/// Whether a file belongs in the index: not hidden, not under a hidden
/// directory (both judged relative to `root`), and written in a supported
/// language.
pub fn is_indexable(root: &Path, file: &Path) -> bool {
    let Ok(relative) = file.strip_prefix(root) else {
        return false;
    };
    let hidden = relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(true)
    });
    if hidden {
        return false;
    }
    Language::from_path(file).is_some()
}

/// Every indexable file under `root`.
pub fn scan_indexable_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .build();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file())
                    && is_indexable(root, entry.path())
                {
                    files.push(entry.path().to_path_buf());
                }
            }
            Err(err) => log::warn!("failed to read entry while scanning: {err}"),
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_finds_supported_files_and_skips_hidden_ones() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("src/app.py"), "x = 1\n").unwrap();
        std::fs::write(root.join("src/notes.md"), "# notes\n").unwrap();
        std::fs::write(root.join(".hidden.py"), "x = 1\n").unwrap();
        std::fs::write(root.join(".git/hook.py"), "x = 1\n").unwrap();

        let files = scan_indexable_files(&root);
        assert_eq!(files, vec![root.join("src/app.py")]);
    }

    #[test]
    fn indexability_is_judged_relative_to_the_root() {
        // The root itself may live under a hidden directory (tempdirs often
        // do); only components below it count.
        let tmp = tempdir().unwrap();
        let root = tmp.path().join(".workdir");
        std::fs::create_dir_all(root.join("src")).unwrap();
        let file = root.join("src/app.py");
        std::fs::write(&file, "x = 1\n").unwrap();
        assert!(is_indexable(&root, &file));
        assert!(!is_indexable(&root, &root.join(".env.py")));
        assert!(!is_indexable(&root, &root.join("src/app.md")));
    }
}
