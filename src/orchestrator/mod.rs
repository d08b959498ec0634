//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 进程启动时创建一次，持有限流器和后端
//! - 对外暴露补全、批改、批量批改、校准、出题
//!
//! ### `batch_processor` - 批量批改处理器
//! - 分批切分作答列表，批内并发（Semaphore）
//! - 按下标回填结果，保持输入顺序
//! - 任意一份失败即终止整个批次
//! - 按需执行一致性检查并输出统计
//!
//! ## 层次关系
//!
//! ```text
//! app
//!     ↓
//! batch_processor (处理 Vec<EssayGradingRequest>)
//!     ↓
//! services (能力层：批改 / 校准 / 出题 / 一致性检查)
//!     ↓
//! services::LlmService (限流 + 重试 + 超时)
//!     ↓
//! clients (后端适配：chat-completion / message)
//! ```

pub mod app;
pub mod batch_processor;

// 重新导出主要类型
pub use app::App;
pub use batch_processor::{BatchGrader, DEFAULT_CHUNK_SIZE};
