use crate::interface::Prompt;
use crate::prelude::SinkError;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Run-scoped artifact sink.
///
/// Every path is relative to the run directory. Writers create missing
/// parent directories and overwrite existing files; I/O failures are
/// returned, never swallowed.
#[derive(Debug, Clone)]
pub struct RunLogger {
    root: PathBuf,
}

impl RunLogger {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| SinkError {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A logger rooted at a subdirectory of this run.
    pub fn scoped(&self, subdir: impl AsRef<Path>) -> Result<Self, SinkError> {
        Self::new(self.root.join(subdir))
    }

    /// Diagnostic line for a noteworthy run event.
    pub fn record(&self, message: &str) {
        info!("{}", message);
    }

    pub fn store_chat(
        &self,
        path: impl AsRef<Path>,
        prompt: &Prompt,
        response: &str,
        tokens: Option<usize>,
    ) -> Result<(), SinkError> {
        let tokens = tokens.map_or_else(|| "None".to_string(), |n| n.to_string());
        let content = format!(
            "[Prompt]\n{}\n[Response]\n{}\n[Tokens]\n{}",
            prompt.instruction(),
            response,
            tokens
        );
        self.write(path.as_ref(), content.as_bytes())
    }

    pub fn store_image(&self, path: impl AsRef<Path>, png: &[u8]) -> Result<(), SinkError> {
        self.write(path.as_ref(), png)
    }

    pub fn store_text(&self, path: impl AsRef<Path>, content: &str) -> Result<(), SinkError> {
        self.write(path.as_ref(), content.as_bytes())
    }

    fn write(&self, relative: &Path, bytes: &[u8]) -> Result<(), SinkError> {
        let path = self.root.join(relative);
        let sink_error = |source| SinkError {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(sink_error)?;
        }
        fs::write(&path, bytes).map_err(sink_error)
    }
}

/// Makes a class label safe to embed in a file name.
pub fn sanitize_label(label: &str) -> String {
    label.replace([' ', '/', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chat_artifact_has_fixed_layout() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new(dir.path()).unwrap();
        let prompt = Prompt::with_images("question text", vec![vec![1, 2, 3]]);
        logger
            .store_chat("3/task_solver.txt", &prompt, "<answer>a</answer>", Some(42))
            .unwrap();
        logger.store_chat("plan.txt", &prompt, "resp", None).unwrap();

        let solved = fs::read_to_string(dir.path().join("3/task_solver.txt")).unwrap();
        assert_eq!(
            solved,
            "[Prompt]\nquestion text\n[Response]\n<answer>a</answer>\n[Tokens]\n42"
        );
        let plan = fs::read_to_string(dir.path().join("plan.txt")).unwrap();
        assert!(plan.ends_with("[Tokens]\nNone"));
    }

    #[test]
    fn writes_overwrite_existing_files() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new(dir.path().join("run")).unwrap();
        logger.store_text("a/b/notes.txt", "first").unwrap();
        logger.store_text("a/b/notes.txt", "second").unwrap();
        logger.store_image("a/img.png", &[9, 8, 7]).unwrap();
        assert_eq!(fs::read_to_string(logger.root().join("a/b/notes.txt")).unwrap(), "second");
        assert_eq!(fs::read(logger.root().join("a/img.png")).unwrap(), vec![9, 8, 7]);
    }

    #[test]
    fn io_failures_carry_the_path() {
        let dir = tempdir().unwrap();
        let logger = RunLogger::new(dir.path()).unwrap();
        logger.store_text("blocker", "file").unwrap();
        let err = logger.store_text("blocker/inner.txt", "x").unwrap_err();
        assert!(err.path.ends_with("blocker/inner.txt"));
    }

    #[test]
    fn labels_are_sanitized() {
        assert_eq!(sanitize_label("sit-to stand/lie"), "sit_to_stand_lie");
    }
}
