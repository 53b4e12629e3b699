//! Pipeline configuration: typed records, YAML loading, semantic validation.

pub mod loader;
pub mod types;
pub mod validator;

pub use loader::ConfigLoader;
pub use types::{
    Layer, PipelineConfig, ProcessingConfig, QualityConfig, SourceConfig, SourceKind,
    TargetConfig, TransformationConfig, WriteMode,
};
