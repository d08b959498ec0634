//! 应用入口
//!
//! `App` 持有限流器和后端（通过 `LlmService`），在进程启动时创建一次，
//! 以引用或克隆的方式传给调用方。所有对外操作都从这里进入。

use std::sync::Arc;

use crate::clients::{CompletionBackend, DocumentSource, TokenSink};
use crate::config::Config;
use crate::error::AppResult;
use crate::models::{
    BatchGradingRequest, BatchGradingResult, CalibrationParams, CalibrationResult,
    EssayGradingRequest, EssayGradingResult, GeneratedQuestion, GenerationParams,
    ProviderConfigOverride,
};
use crate::orchestrator::BatchGrader;
use crate::services::{CalibrationService, GradingService, LlmService, QuestionService};

/// 应用主结构
#[derive(Clone)]
pub struct App {
    llm: LlmService,
    grading: GradingService,
    batch: BatchGrader,
    calibration: CalibrationService,
    questions: QuestionService,
}

impl App {
    /// 按配置创建应用，后端由 `config.llm_provider` 决定
    pub fn new(config: &Config) -> Self {
        Self::from_llm(LlmService::new(config), config.batch_chunk_size)
    }

    /// 使用指定后端创建应用
    pub fn with_backend(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self::from_llm(LlmService::with_backend(config, backend), config.batch_chunk_size)
    }

    pub fn from_llm(llm: LlmService, chunk_size: usize) -> Self {
        let grading = GradingService::new(llm.clone());
        Self {
            batch: BatchGrader::new(grading.clone(), chunk_size),
            calibration: CalibrationService::new(grading.clone()),
            questions: QuestionService::new(llm.clone()),
            grading,
            llm,
        }
    }

    pub fn llm(&self) -> &LlmService {
        &self.llm
    }

    /// 发起一次补全
    pub async fn create_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        overrides: Option<&ProviderConfigOverride>,
        sink: Option<&TokenSink>,
    ) -> AppResult<String> {
        self.llm
            .create_completion(system_prompt, user_prompt, overrides, sink)
            .await
    }

    /// 批改单篇作答
    pub async fn grade_essay(
        &self,
        request: &EssayGradingRequest,
    ) -> AppResult<EssayGradingResult> {
        self.grading.grade_essay(request).await
    }

    /// 批量批改，任意一份失败则整体失败
    pub async fn batch_grade_essays(
        &self,
        request: &BatchGradingRequest,
    ) -> AppResult<BatchGradingResult> {
        self.batch.batch_grade(request).await
    }

    /// 评分校准
    pub async fn calibrate_grading(
        &self,
        params: &CalibrationParams,
    ) -> AppResult<CalibrationResult> {
        self.calibration.calibrate(params).await
    }

    /// 根据文档生成题目
    pub async fn generate_questions(
        &self,
        source: &dyn DocumentSource,
        document_id: &str,
        document_type: &str,
        params: &GenerationParams,
        sink: Option<&TokenSink>,
    ) -> AppResult<Vec<GeneratedQuestion>> {
        self.questions
            .generate_questions(source, document_id, document_type, params, sink)
            .await
    }
}
