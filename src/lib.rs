//! Schema-validated structured generation over heterogeneous LLM backends.
//!
//! A caller describes the expected output with a [`domain::SchemaDescriptor`]
//! (usually through [`domain::StructuredOutput`]), picks an adapter with
//! [`infra::llm::AdapterConfig`], and gets back a value that already passed
//! validation, or a categorised [`domain::GenerationError`].

pub mod app;
pub mod domain;
pub mod infra;
