//! Knowledge loader — builds the effective system prompt.
//!
//! The prompt is assembled from three sources, in this order:
//!
//! 1. **Base instructions**: a minimal built-in instruction set
//! 2. **Knowledge files**: plain text / markdown, in caller order
//! 3. **Dynamic knowledge**: strings supplied at runtime, in call order
//!
//! Knowledge is opaque instructive text: nothing is validated. Loading more
//! knowledge only ever appends; earlier sections are never removed or
//! reordered. Missing or unreadable files are logged and skipped.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where a knowledge section came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeSource {
    File(PathBuf),
    Dynamic,
}

/// A single loaded piece of knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSection {
    pub source: KnowledgeSource,
    pub heading: String,
    pub content: String,
}

/// The agent's base instructions plus all loaded knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    base_instructions: String,
    sections: Vec<KnowledgeSection>,
}

impl KnowledgeBase {
    pub fn new(base_instructions: impl Into<String>) -> Self {
        Self {
            base_instructions: base_instructions.into(),
            sections: Vec::new(),
        }
    }

    /// The built-in instruction set used when none is supplied.
    pub fn default_instructions() -> String {
        concat!(
            "You are a capable assistant that solves tasks step by step. ",
            "Think about what is needed, call a tool when it helps, read the ",
            "observation it returns, and continue until you can answer. ",
            "When a tool reports an error, correct the arguments and try again ",
            "or explain why the task cannot be completed. ",
            "Reply with the final answer as plain text once you are done.",
        )
        .into()
    }

    /// Load knowledge files in the given order.
    ///
    /// Relative paths are tried as given first, then against `base_dir`.
    /// A directory contributes its files as [`load_directory`](Self::load_directory)
    /// does. Returns the number of files actually loaded.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P], base_dir: Option<&Path>) -> usize {
        let mut loaded = 0;
        for path in paths {
            match resolve(path.as_ref(), base_dir) {
                Some(resolved) if resolved.is_dir() => loaded += self.load_directory(&resolved),
                Some(resolved) => {
                    if self.load_file(&resolved) {
                        loaded += 1;
                    }
                }
                None => warn!(file = %path.as_ref().display(), "Knowledge file not found, skipping"),
            }
        }
        loaded
    }

    /// Load every `.md` / `.txt` file in a directory, sorted by name.
    pub fn load_directory(&mut self, dir: &Path) -> usize {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext == "md" || ext == "txt")
                })
                .collect(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read knowledge directory");
                return 0;
            }
        };

        entries.sort();
        entries.iter().filter(|p| self.load_file(p)).count()
    }

    fn load_file(&mut self, path: &Path) -> bool {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to read knowledge file");
                return false;
            }
        };
        if content.trim().is_empty() {
            debug!(file = %path.display(), "Skipping empty knowledge file");
            return false;
        }

        let heading = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("knowledge")
            .to_string();
        debug!(file = %path.display(), chars = content.len(), "Loaded knowledge file");
        self.sections.push(KnowledgeSection {
            source: KnowledgeSource::File(path.to_path_buf()),
            heading,
            content,
        });
        true
    }

    /// Append a dynamically supplied knowledge string.
    pub fn add_knowledge(&mut self, content: impl Into<String>) {
        let content = content.into();
        if content.trim().is_empty() {
            return;
        }
        let heading = format!("dynamic-{}", self.dynamic_count() + 1);
        self.sections.push(KnowledgeSection {
            source: KnowledgeSource::Dynamic,
            heading,
            content,
        });
    }

    fn dynamic_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.source == KnowledgeSource::Dynamic)
            .count()
    }

    pub fn sections(&self) -> &[KnowledgeSection] {
        &self.sections
    }

    /// Paths of the files loaded so far (for diagnostics).
    pub fn loaded_files(&self) -> Vec<PathBuf> {
        self.sections
            .iter()
            .filter_map(|s| match &s.source {
                KnowledgeSource::File(p) => Some(p.clone()),
                KnowledgeSource::Dynamic => None,
            })
            .collect()
    }

    /// Render the effective system prompt.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::with_capacity(
            self.base_instructions.len() + self.sections.iter().map(|s| s.content.len() + 32).sum::<usize>(),
        );
        prompt.push_str(self.base_instructions.trim_end());

        if self.sections.is_empty() {
            return prompt;
        }

        prompt.push_str("\n\n## Knowledge\n");
        for section in &self.sections {
            prompt.push_str(&format!("\n=== {} ===\n", section.heading));
            prompt.push_str(section.content.trim_end());
            prompt.push('\n');
        }
        prompt
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(Self::default_instructions())
    }
}

fn resolve(path: &Path, base_dir: Option<&Path>) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }
    if path.is_relative() {
        if let Some(base) = base_dir {
            let candidate = base.join(path);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}
