//! 批量批改处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **分批处理**：按固定大小切分作答列表，每批完成后再开始下一批
//! 2. **并发控制**：批内所有作答并发批改，Semaphore 保证同时在途的请求不超过每批大小
//! 3. **保持顺序**：按下标回填结果，`results[i]` 始终对应 `essays[i]`，与完成先后无关
//! 4. **失败即终止**：任意一份作答最终失败，整个批次失败，不返回部分结果
//! 5. **一致性检查**：按需在全部批改完成后执行
//!
//! 单份作答的重试已经在 `LlmService` 内完成，这里不再重试。

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::{AppError, AppResult, GradingError};
use crate::models::{
    BatchGradingRequest, BatchGradingResult, BatchMetadata, EssayGradingRequest, EssayGradingResult,
};
use crate::services::{check_consistency, GradingService};
use crate::utils::logging::{log_batch_complete, log_batch_start, print_final_stats};

/// 默认每批大小
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// 批量批改处理器
#[derive(Clone)]
pub struct BatchGrader {
    grading: GradingService,
    chunk_size: usize,
}

impl BatchGrader {
    pub fn new(grading: GradingService, chunk_size: usize) -> Self {
        Self {
            grading,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 批量批改
    pub async fn batch_grade(
        &self,
        request: &BatchGradingRequest,
    ) -> AppResult<BatchGradingResult> {
        let start = Instant::now();
        let total = request.essays.len();

        if total == 0 {
            info!("没有待批改的作答");
            return Ok(BatchGradingResult::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.chunk_size));
        let total_batches = total.div_ceil(self.chunk_size);
        let mut slots: Vec<Option<EssayGradingResult>> = vec![None; total];

        // 分批处理
        for (batch_idx, batch) in request.essays.chunks(self.chunk_size).enumerate() {
            let batch_start = batch_idx * self.chunk_size;
            let batch_num = batch_idx + 1;

            log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            if let Err(e) = self
                .process_batch(batch, batch_start, semaphore.clone(), &mut slots)
                .await
            {
                error!(
                    "❌ [批次 {}/{}] 批改失败，终止整个批次: {}",
                    batch_num, total_batches, e
                );
                return Err(e);
            }

            log_batch_complete(batch_num, total_batches, batch.len());
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| AppError::Other(format!("作答 {} 缺少批改结果", idx + 1)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let consistency_reports = if request.consistency_check && results.len() > 1 {
            check_consistency(&results, &request.essays)
        } else {
            Vec::new()
        };

        let average_score =
            results.iter().map(|r| r.suggested_score).sum::<f64>() / results.len() as f64;
        let metadata = BatchMetadata {
            total_essays: results.len(),
            average_score,
            processing_time_ms: start.elapsed().as_millis() as u64,
        };

        let flagged = consistency_reports.iter().filter(|r| r.flagged).count();
        print_final_stats(&metadata, flagged);

        Ok(BatchGradingResult {
            results,
            metadata,
            consistency_reports,
        })
    }

    /// 处理单个批次，结果按下标写入 `slots`
    async fn process_batch(
        &self,
        batch: &[EssayGradingRequest],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
        slots: &mut [Option<EssayGradingResult>],
    ) -> AppResult<()> {
        let mut tasks = JoinSet::new();

        // 为本批创建并发任务
        for (offset, essay) in batch.iter().enumerate() {
            let index = batch_start + offset;
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Other(format!("获取并发许可失败: {}", e)))?;

            let grading = self.grading.clone();
            let essay = essay.clone();

            tasks.spawn(async move {
                let _permit = permit;
                (index, grading.grade_essay(&essay).await)
            });
        }

        // 按完成顺序收集，按下标回填
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => slots[index] = Some(result),
                Ok((index, Err(e))) => {
                    error!("[作答 {}] ❌ 批改失败: {}", index + 1, e);
                    tasks.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(GradingError::TaskPanicked {
                        reason: e.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(())
    }
}
