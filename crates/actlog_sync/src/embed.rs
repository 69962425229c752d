//! The embedding transform.

/// An embedding vector.
pub type Vector = Vec<f32>;

/// One document handed to an [`Embedder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedDoc {
    /// Document title.
    pub title: String,
    /// Document body.
    pub text: String,
}

/// Output of one [`Embedder::embed_docs`] call.
///
/// `vectors[i]` belongs to input `i`. On partial failure `vectors` may be
/// shorter than the input and `error` describes the failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Embedded {
    /// Vectors aligned with the inputs.
    pub vectors: Vec<Vector>,
    /// Failure reported by the embedder, if any.
    pub error: Option<String>,
}

impl Embedded {
    /// A complete result.
    pub fn ok(vectors: Vec<Vector>) -> Self {
        Self {
            vectors,
            error: None,
        }
    }

    /// A failed result carrying the vectors computed before the failure.
    pub fn failed(vectors: Vec<Vector>, error: impl Into<String>) -> Self {
        Self {
            vectors,
            error: Some(error.into()),
        }
    }
}

/// Turns documents into vectors.
pub trait Embedder: Send + Sync {
    /// Embeds `docs`, returning vectors in input order.
    fn embed_docs(&self, docs: &[EmbedDoc]) -> Embedded;
}

impl<E: Embedder + ?Sized> Embedder for &E {
    fn embed_docs(&self, docs: &[EmbedDoc]) -> Embedded {
        (**self).embed_docs(docs)
    }
}
