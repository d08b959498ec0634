pub mod calibration_service;
pub mod consistency_checker;
pub mod grading_service;
pub mod llm_service;
pub mod output_parser;
pub mod question_service;

pub use calibration_service::CalibrationService;
pub use consistency_checker::check_consistency;
pub use grading_service::GradingService;
pub use llm_service::LlmService;
pub use question_service::QuestionService;
