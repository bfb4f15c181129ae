// ============================================================
// Layer 3 — Document Domain Types
// ============================================================
// A question is asked against a document made of one or more
// pages. A batch is an ordered list of such items and is never
// mutated by a forward pass.
//
// For `concat` page retrieval the pages are flattened into one
// context string. The flattened form carries a parallel array with
// one marker per character: Some(page) for text belonging to a page,
// None for the boundary character inserted between two pages.

use serde::{Deserialize, Serialize};

/// Character placed between pages when a document is flattened.
pub const PAGE_SEPARATOR: char = '\n';

/// The context of one item: a single page, or an ordered list of pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Context {
    Page(String),
    Pages(Vec<String>),
}

/// A multi-page context flattened into one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatContext {
    pub text: String,

    /// One entry per character of `text`; None marks a page boundary.
    pub page_markers: Vec<Option<usize>>,
}

impl Context {
    /// Borrow every page as a string slice.
    /// A single-page context yields exactly one page.
    pub fn pages(&self) -> Vec<&str> {
        match self {
            Context::Page(text) => vec![text.as_str()],
            Context::Pages(pages) => pages.iter().map(String::as_str).collect(),
        }
    }

    pub fn num_pages(&self) -> usize {
        match self {
            Context::Page(_) => 1,
            Context::Pages(pages) => pages.len(),
        }
    }

    /// Join all pages with PAGE_SEPARATOR and build the matching
    /// per-character page markers.
    pub fn flatten(&self) -> FlatContext {
        let mut text         = String::new();
        let mut page_markers = Vec::new();

        for (page_idx, page) in self.pages().into_iter().enumerate() {
            if page_idx > 0 {
                text.push(PAGE_SEPARATOR);
                page_markers.push(None);
            }
            text.push_str(page);
            page_markers.extend(page.chars().map(|_| Some(page_idx)));
        }

        FlatContext { text, page_markers }
    }
}

impl From<&str> for Context {
    fn from(text: &str) -> Self {
        Context::Page(text.to_string())
    }
}

impl From<Vec<String>> for Context {
    fn from(pages: Vec<String>) -> Self {
        Context::Pages(pages)
    }
}

/// One question asked against one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocItem {
    pub question: String,

    pub context: Context,

    /// Gold answers; any of them is an acceptable label.
    #[serde(default)]
    pub answers: Vec<String>,

    /// Page holding the answer, when known.
    #[serde(default)]
    pub answer_page: Option<usize>,

    /// Per-character page markers for an already flattened context.
    /// When absent they are derived from `context`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_markers: Option<Vec<Option<usize>>>,
}

impl DocItem {
    pub fn new(question: impl Into<String>, context: impl Into<Context>) -> Self {
        Self {
            question:     question.into(),
            context:      context.into(),
            answers:      Vec::new(),
            answer_page:  None,
            page_markers: None,
        }
    }

    pub fn with_answers<S: Into<String>>(mut self, answers: impl IntoIterator<Item = S>) -> Self {
        self.answers = answers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_answer_page(mut self, page: usize) -> Self {
        self.answer_page = Some(page);
        self
    }

    pub fn with_page_markers(mut self, markers: Vec<Option<usize>>) -> Self {
        self.page_markers = Some(markers);
        self
    }

    /// The single context string fed to the pair encoder, together with
    /// its page markers. Explicit markers win over derived ones.
    pub fn flat_context(&self) -> FlatContext {
        let mut flat = self.context.flatten();
        if let Some(markers) = &self.page_markers {
            flat.page_markers = markers.clone();
        }
        flat
    }
}

/// An ordered batch of items processed by one forward pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocBatch {
    pub items: Vec<DocItem>,
}

impl DocBatch {
    pub fn new(items: Vec<DocItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
