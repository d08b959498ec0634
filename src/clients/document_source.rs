//! 文档内容来源
//!
//! 文档的上传和存储不在本 crate 内，这里只约定"给定文档 ID 返回提取出的文本"。

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// 返回文档提取后的纯文本
    async fn fetch_text(&self, document_id: &str, document_type: &str) -> AppResult<String>;
}

/// 内存中的文档来源
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentSource {
    documents: HashMap<String, String>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, document_id: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(document_id.into(), text.into());
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocumentSource {
    async fn fetch_text(&self, document_id: &str, _document_type: &str) -> AppResult<String> {
        self.documents
            .get(document_id)
            .cloned()
            .ok_or_else(|| AppError::document(document_id, "文档不存在"))
    }
}
