//! # Essay Grader
//!
//! 主观题 AI 批改的调用编排
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 与业务无关的调用控制
//! - `RateLimiter` - 60 秒滑动窗口限流，只放行或拒绝，不排队
//! - `RetryPolicy` - 指数退避重试，只重试瞬时故障
//!
//! ### ② 后端适配层（Clients）
//! - `clients/` - 两种 LLM 后端实现同一个 `CompletionBackend`
//! - `OpenAiBackend` - chat-completion 风格
//! - `AnthropicBackend` - message 风格
//! - `TokenSink` - 流式输出通道，按顺序送达片段
//!
//! ### ③ 业务能力层（Services）
//! - `LlmService` - 所有 LLM 调用的唯一入口（密钥校验 → 限流 → 超时 + 重试）
//! - `GradingService` - 批改单篇作答，分数夹紧
//! - `CalibrationService` - 人工分与模型分对比校准
//! - `QuestionService` - 根据文档出题
//! - `check_consistency` - 同题多份作答的评分一致性检查
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用入口
//! - `orchestrator/batch_processor` - 分批并发批改，保持输入顺序
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use clients::{CompletionBackend, DocumentSource, StreamEvent, TokenSink};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{RateLimiter, RetryPolicy};
pub use models::{
    BatchGradingRequest, BatchGradingResult, CalibrationParams, CalibrationResult,
    EssayGradingRequest, EssayGradingResult,
};
pub use orchestrator::{App, BatchGrader};
pub use services::{GradingService, LlmService};
