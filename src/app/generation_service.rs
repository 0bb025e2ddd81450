use std::sync::Arc;

use crate::domain::{GenerationError, GenerationOutput, GenerationRequest, StructuredOutput};
use crate::infra::llm::StructuredGenerator;

#[derive(Clone)]
pub struct GenerationService {
    generator: Arc<dyn StructuredGenerator>,
}

impl GenerationService {
    pub fn new(generator: impl StructuredGenerator + 'static) -> Self {
        Self::from_shared(Arc::new(generator))
    }

    pub fn from_shared(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub fn backend_id(&self) -> &str {
        self.generator.backend_id()
    }

    pub fn model_id(&self) -> &str {
        self.generator.model_id()
    }

    pub fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        request.validate()?;

        let schema = request.schema.name();
        match self.generator.generate(request) {
            Ok(output) => {
                tracing::info!(
                    backend = %output.metadata.backend,
                    model = %output.metadata.model,
                    schema,
                    latency_ms = output.metadata.latency_ms,
                    "structured generation succeeded"
                );
                Ok(output)
            }
            Err(error) => {
                tracing::warn!(
                    backend = self.generator.backend_id(),
                    model = self.generator.model_id(),
                    schema,
                    category = ?error.category(),
                    %error,
                    "structured generation failed"
                );
                Err(error)
            }
        }
    }

    /// Generates and decodes straight into `T`, using `T`'s own schema.
    pub fn generate_typed<T: StructuredOutput>(
        &self,
        prompt: impl Into<String>,
    ) -> Result<T, GenerationError> {
        let request = GenerationRequest::for_output::<T>(prompt);
        self.generate(&request)?.into_typed()
    }
}
