pub mod generation;
pub mod grading;
pub mod loaders;
pub mod provider;

pub use generation::{GeneratedQuestion, GenerationParams, QuestionType};
pub use grading::{
    BatchGradingRequest, BatchGradingResult, BatchMetadata, CalibrationParams,
    CalibrationResult, CalibrationSample, ConsistencyReport, EssayGradingRequest,
    EssayGradingResult, GradingFeedback, RubricScore,
};
pub use loaders::load_batch_file;
pub use provider::{ProviderConfig, ProviderConfigOverride, ProviderKind};
