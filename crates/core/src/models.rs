use serde::{Deserialize, Serialize};

/// Closed set of topical labels. `Otros` is the fail-closed fallback and is
/// never offered to the router as a routable option.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Laboral,
    Fiscal,
    AyudasYSubvenciones,
    Otros,
}

impl Category {
    /// Categories the router and the document classifier may choose from.
    pub const ROUTABLE: [Category; 3] = [
        Category::Laboral,
        Category::Fiscal,
        Category::AyudasYSubvenciones,
    ];

    /// The exact label advertised in prompts and stored in collection
    /// metadata. Prompt text and this mapping must stay in sync.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Laboral => "Laboral",
            Category::Fiscal => "Fiscal",
            Category::AyudasYSubvenciones => "Ayudas_y_Subvenciones",
            Category::Otros => "otros",
        }
    }

    /// Lenient parse of a model reply: accepts the label anywhere in the raw
    /// text, case-insensitive. Returns `None` for anything outside the
    /// closed set, so callers fall back explicitly.
    pub fn parse_lenient(raw: &str) -> Option<Category> {
        let lowered = raw.to_lowercase();
        for category in Category::ROUTABLE {
            if lowered.contains(&category.label().to_lowercase()) {
                return Some(category);
            }
        }
        if lowered.contains("otros") {
            return Some(Category::Otros);
        }
        None
    }
}

impl Default for Category {
    fn default() -> Self {
        Category::Otros
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Router outcome: either pure small talk or a topical category to filter
/// retrieval with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Greeting,
    Topic(Category),
}

/// One chat turn, as supplied by the caller and as sent to the completion
/// backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Indexed unit for the text collection: the child span is what gets
/// embedded and searched, the owning parent's full text rides along as
/// metadata so the generator only ever sees parent-level context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildRecord {
    pub id: String,
    pub source: String,
    pub category: Category,
    pub parent_id: usize,
    pub text: String,
    pub parent_text: String,
}

/// Indexed unit for the image collection. The vector comes from a
/// vision-capable encoder, not the text embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescriptor {
    #[serde(rename = "nombre_archivo")]
    pub file_name: String,
    #[serde(rename = "pdf_origen")]
    pub source_pdf: String,
    #[serde(rename = "pagina", default)]
    pub page: Option<u32>,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "ruta_imagen")]
    pub image_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FragmentKind {
    Text,
    Image,
}

/// A retrieved piece of context handed to the generator. For text hits the
/// `text` field already holds the expanded parent context, never the bare
/// child span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedFragment {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
    pub kind: FragmentKind,
    pub distance: f64,
}

/// Source reference for UI display, built per hit before deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    #[serde(rename = "archivo")]
    pub document: String,
    pub chunk_id: String,
}

/// Post-hoc quality verdicts. Malformed judge output leaves the field unset
/// rather than failing the turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub grounded: Option<bool>,
    pub relevance: Option<u8>,
}

/// The unit of work for one user turn. Created fresh per question, mutated
/// stage by stage, discarded after the response; continuity lives only in
/// the caller-supplied `history`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    pub question: String,
    pub history: Vec<ChatMessage>,
    pub fragments: Vec<RetrievedFragment>,
    pub citations: Vec<Citation>,
    pub answer: String,
    pub trace: Vec<String>,
    pub category: Category,
    #[serde(default)]
    pub verdict: JudgeVerdict,
}

impl PipelineState {
    pub fn new(question: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        Self {
            question: question.into(),
            history,
            ..Self::default()
        }
    }
}

/// Parent/child chunk geometry. Parents are the context payload, children
/// are the embedded search unit.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub parent_size: usize,
    pub parent_overlap: usize,
    pub child_size: usize,
    pub child_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            parent_size: 2_000,
            parent_overlap: 200,
            child_size: 400,
            child_overlap: 50,
        }
    }
}

/// Retrieval knobs.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalOptions {
    pub top_k_text: usize,
    pub top_k_images: usize,
    pub use_hyde: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k_text: 5,
            top_k_images: 2,
            use_hyde: true,
        }
    }
}
