use std::path::Path;
use std::sync::Arc;

use crate::error::{EditorError, Result};
use crate::observer::ChangeObserver;
use crate::render::{clip_text, numbered};

/// Lines of context shown around an edit.
pub const SNIPPET_LINES: usize = 4;

/// The text edit engine. Paths arriving here have already been resolved
/// through the session sandbox.
pub struct TextEditor {
    max_render_bytes: usize,
    observer: Arc<dyn ChangeObserver>,
}

impl TextEditor {
    pub fn new(max_render_bytes: usize, observer: Arc<dyn ChangeObserver>) -> Self {
        Self {
            max_render_bytes,
            observer,
        }
    }

    /// View a file (numbered lines, optional 1-based `[start, end]` range,
    /// `end = -1` meaning EOF) or a directory (entries two levels deep,
    /// hidden entries excluded).
    pub fn view(&self, path: &Path, view_range: Option<[i64; 2]>) -> Result<String> {
        if path.is_dir() {
            if view_range.is_some() {
                return Err(EditorError::OutOfRange(
                    "`view_range` is not allowed when `path` points to a directory".to_string(),
                ));
            }
            let listing = list_two_levels(path)?;
            return Ok(format!(
                "Files and directories up to 2 levels deep in {}, excluding hidden items:\n{}\n",
                path.display(),
                listing.join("\n")
            ));
        }
        if !path.exists() {
            return Err(EditorError::NotFound(path.display().to_string()));
        }
        if !path.is_file() {
            return Err(EditorError::NotAFile(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let (window, first_line) = match view_range {
            None => (content.clone(), 1),
            Some([start, end]) => slice_lines(&content, start, end)?,
        };
        Ok(self.render(&window, &path.display().to_string(), first_line))
    }

    /// Create a new file, parent directories included. Refuses to overwrite.
    pub fn create(&self, path: &Path, file_text: &str) -> Result<String> {
        if path.exists() {
            return Err(EditorError::AlreadyExists(path.display().to_string()));
        }
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            serde_json::from_str::<serde_json::Value>(file_text)
                .map_err(|err| EditorError::Parse(format!("invalid JSON content: {err}")))?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, file_text)?;
        log::debug!("created {}", path.display());
        self.observer.on_file_changed(path);

        let preview = clip_text(file_text, 1_000);
        Ok(format!(
            "File created successfully at: {}\n\nFile content:\n```\n{}\n```",
            path.display(),
            preview
        ))
    }

    /// Replace exactly one literal occurrence of `old_str` with `new_str`.
    /// Zero matches fail; multiple matches fail listing every line they
    /// occur on. Matching is byte-literal; no whitespace fuzzing.
    pub fn replace(&self, path: &Path, old_str: &str, new_str: &str) -> Result<String> {
        let content = self.read_existing(path)?;

        let occurrences = content.matches(old_str).count();
        if occurrences == 0 {
            return Err(EditorError::TargetMissing(path.display().to_string()));
        }
        if occurrences > 1 {
            let lines: Vec<usize> = content
                .split('\n')
                .enumerate()
                .filter(|(_, line)| line.contains(old_str.split('\n').next().unwrap_or(old_str)))
                .map(|(idx, _)| idx + 1)
                .collect();
            return Err(EditorError::NotUnique {
                path: path.display().to_string(),
                count: occurrences,
                lines,
            });
        }

        let new_content = content.replacen(old_str, new_str, 1);
        std::fs::write(path, &new_content)?;
        log::debug!("replaced one occurrence in {}", path.display());
        self.observer.on_file_changed(path);

        // Snippet: the window around where the replacement landed.
        let replacement_line = content
            .split(old_str)
            .next()
            .unwrap_or("")
            .matches('\n')
            .count();
        let start = replacement_line.saturating_sub(SNIPPET_LINES);
        let end = replacement_line + SNIPPET_LINES + new_str.matches('\n').count();
        let snippet = new_content
            .split('\n')
            .skip(start)
            .take(end + 1 - start)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected. Edit the file again if necessary.",
            path.display(),
            self.render(&snippet, &format!("a snippet of {}", path.display()), start + 1)
        ))
    }

    /// Insert `new_str` after 1-based line `insert_line` (0 inserts at the
    /// top). Fails when the line is past the end of the file.
    pub fn insert(&self, path: &Path, insert_line: usize, new_str: &str) -> Result<String> {
        let content = self.read_existing(path)?;
        let lines: Vec<&str> = content.split('\n').collect();
        let line_count = lines.len();
        if insert_line > line_count {
            return Err(EditorError::OutOfRange(format!(
                "invalid `insert_line` {insert_line}: it should be within [0, {line_count}]"
            )));
        }

        let new_lines: Vec<&str> = new_str.split('\n').collect();
        let mut updated: Vec<&str> = Vec::with_capacity(line_count + new_lines.len());
        updated.extend_from_slice(&lines[..insert_line]);
        updated.extend_from_slice(&new_lines);
        updated.extend_from_slice(&lines[insert_line..]);
        let new_content = updated.join("\n");

        let snippet_start = insert_line.saturating_sub(SNIPPET_LINES);
        let mut snippet_lines: Vec<&str> = Vec::new();
        snippet_lines.extend_from_slice(&lines[snippet_start..insert_line]);
        snippet_lines.extend_from_slice(&new_lines);
        snippet_lines.extend_from_slice(&lines[insert_line..line_count.min(insert_line + SNIPPET_LINES)]);
        let snippet = snippet_lines.join("\n");

        std::fs::write(path, &new_content)?;
        self.observer.on_file_changed(path);

        Ok(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            path.display(),
            self.render(&snippet, "a snippet of the edited file", snippet_start + 1)
        ))
    }

    fn read_existing(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(EditorError::NotFound(path.display().to_string()));
        }
        if !path.is_file() {
            return Err(EditorError::NotAFile(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn render(&self, content: &str, descriptor: &str, first_line: usize) -> String {
        let clipped = clip_text(content, self.max_render_bytes);
        format!(
            "Here's the result of running `cat -n` on {}:\n{}\n",
            descriptor,
            numbered(&clipped, first_line)
        )
    }
}

/// Apply a 1-based `[start, end]` view range; `end = -1` runs to EOF.
fn slice_lines(content: &str, start: i64, end: i64) -> Result<(String, usize)> {
    let lines: Vec<&str> = content.split('\n').collect();
    let line_count = lines.len() as i64;
    if start < 1 || start > line_count {
        return Err(EditorError::OutOfRange(format!(
            "invalid `view_range`: first element {start} should be within [1, {line_count}]"
        )));
    }
    if end > line_count {
        return Err(EditorError::OutOfRange(format!(
            "invalid `view_range`: second element {end} should not exceed the file's {line_count} lines"
        )));
    }
    if end != -1 && end < start {
        return Err(EditorError::OutOfRange(format!(
            "invalid `view_range`: second element {end} should be at least {start} (or -1 for EOF)"
        )));
    }

    let window = if end == -1 {
        lines[(start - 1) as usize..].join("\n")
    } else {
        lines[(start - 1) as usize..end as usize].join("\n")
    };
    Ok((window, start as usize))
}

/// Non-hidden entries up to two levels deep, directories marked with `/`.
fn list_two_levels(dir: &Path) -> Result<Vec<String>> {
    fn push_level(dir: &Path, prefix: &str, depth: usize, out: &mut Vec<String>) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok().map(|name| (name, entry)))
            .filter(|(name, _)| !name.starts_with('.'))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, entry) in entries {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let shown = if is_dir {
                format!("{prefix}{name}/")
            } else {
                format!("{prefix}{name}")
            };
            out.push(shown.clone());
            if is_dir && depth > 1 {
                push_level(&entry.path(), &shown, depth - 1, out)?;
            }
        }
        Ok(())
    }

    if !dir.is_dir() {
        return Err(EditorError::NotADirectory(dir.display().to_string()));
    }
    let mut out = Vec::new();
    push_level(dir, "", 2, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NullObserver;
    use crate::render::CLIPPED_MARKER;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn editor() -> TextEditor {
        TextEditor::new(30_000, Arc::new(NullObserver))
    }

    fn fixture(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a.py");
        std::fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn view_numbers_every_line() {
        let (_tmp, path) = fixture("one\ntwo\nthree\n");
        let out = editor().view(&path, None).unwrap();
        assert!(out.contains("     1\tone"));
        assert!(out.contains("     3\tthree"));
    }

    #[test]
    fn view_range_to_eof_with_minus_one() {
        let (_tmp, path) = fixture("one\ntwo\nthree\nfour\n");
        let out = editor().view(&path, Some([3, -1])).unwrap();
        assert!(!out.contains("\tone"));
        assert!(out.contains("     3\tthree"));
        assert!(out.contains("     4\tfour"));
    }

    #[test]
    fn view_range_past_eof_is_out_of_range() {
        let (_tmp, path) = fixture("one\ntwo\n");
        let err = editor().view(&path, Some([1, 99])).unwrap_err();
        assert!(matches!(err, EditorError::OutOfRange(_)));
    }

    #[test]
    fn view_directory_lists_two_levels_without_hidden() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/nested/deep")).unwrap();
        std::fs::write(tmp.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(tmp.path().join(".hidden"), "").unwrap();
        let out = editor().view(tmp.path(), None).unwrap();
        assert!(out.contains("src/"));
        assert!(out.contains("src/lib.rs"));
        assert!(out.contains("src/nested/"));
        assert!(!out.contains("src/nested/deep"));
        assert!(!out.contains(".hidden"));
    }

    #[test]
    fn view_directory_rejects_view_range() {
        let tmp = tempdir().unwrap();
        let err = editor().view(tmp.path(), Some([1, 2])).unwrap_err();
        assert!(matches!(err, EditorError::OutOfRange(_)));
    }

    #[test]
    fn create_refuses_existing_files() {
        let (_tmp, path) = fixture("already here\n");
        let err = editor().create(&path, "new").unwrap_err();
        assert!(matches!(err, EditorError::AlreadyExists(_)));
    }

    #[test]
    fn create_makes_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a/b/c.txt");
        editor().create(&path, "deep\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "deep\n");
    }

    #[test]
    fn create_validates_json_payloads() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("x.json");
        let err = editor().create(&path, "{not json").unwrap_err();
        assert!(matches!(err, EditorError::Parse(_)));
        assert!(!path.exists());
    }

    #[test]
    fn replace_unique_occurrence_and_round_trip() {
        let (_tmp, path) = fixture("def f(): return 1\nprint(f())\n");
        let out = editor().replace(&path, "return 1", "return 2").unwrap();
        assert!(out.contains("return 2"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("return 1").count(), 0);
        assert_eq!(content.matches("return 2").count(), 1);

        // Swapping the arguments restores the original content.
        editor().replace(&path, "return 2", "return 1").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "def f(): return 1\nprint(f())\n"
        );
    }

    #[test]
    fn replace_missing_target_fails() {
        let (_tmp, path) = fixture("nothing to see\n");
        let err = editor().replace(&path, "ghost", "real").unwrap_err();
        assert!(matches!(err, EditorError::TargetMissing(_)));
    }

    #[test]
    fn replace_ambiguous_target_reports_line_numbers() {
        let (_tmp, path) = fixture("def f(): return 1\ndef f(): return 1\n");
        let err = editor().replace(&path, "return 1", "return 2").unwrap_err();
        match err {
            EditorError::NotUnique { count, lines, .. } => {
                assert_eq!(count, 2);
                assert_eq!(lines, vec![1, 2]);
            }
            other => panic!("expected NotUnique, got {other:?}"),
        }
    }

    #[test]
    fn replace_multiline_duplicate_is_still_ambiguous() {
        let (_tmp, path) = fixture("def f(): return 1\ndef f(): return 1\n");
        let err = editor()
            .replace(&path, "def f(): return 1\n", "def f(): return 2\n")
            .unwrap_err();
        assert!(matches!(err, EditorError::NotUnique { .. }));
    }

    #[test]
    fn replace_is_whitespace_sensitive() {
        let (_tmp, path) = fixture("x  =  1\n");
        let err = editor().replace(&path, "x = 1", "x = 2").unwrap_err();
        assert!(matches!(err, EditorError::TargetMissing(_)));
    }

    #[test]
    fn insert_at_top_and_after_a_line() {
        let (_tmp, path) = fixture("b\nc\n");
        editor().insert(&path, 0, "a").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
        editor().insert(&path, 3, "d").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\nc\nd\n");
    }

    #[test]
    fn insert_past_eof_is_out_of_range() {
        let (_tmp, path) = fixture("only\n");
        let err = editor().insert(&path, 10, "nope").unwrap_err();
        assert!(matches!(err, EditorError::OutOfRange(_)));
    }

    #[test]
    fn long_views_are_clipped() {
        let (_tmp, path) = fixture(&"line\n".repeat(100));
        let small = TextEditor::new(64, Arc::new(NullObserver));
        let out = small.view(&path, None).unwrap();
        assert!(out.contains(CLIPPED_MARKER));
    }
}
