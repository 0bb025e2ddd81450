use crate::domain::{GenerationError, GenerationOutput, GenerationRequest};

pub trait StructuredGenerator: Send + Sync {
    fn backend_id(&self) -> &str;

    fn model_id(&self) -> &str;

    /// One blocking round trip. The returned value already satisfies
    /// `request.schema`.
    fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError>;
}
