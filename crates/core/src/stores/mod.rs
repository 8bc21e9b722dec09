pub mod chroma;

pub use chroma::ChromaCollection;
