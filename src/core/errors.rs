//! 错误类型定义
//!
//! 只有文档解析失败是致命错误；其余失败一律降级为诊断信息，
//! 以 Diagnostic 的形式进入检查结果。

use thiserror::Error;

/// 检查/修订流水线的致命错误
#[derive(Debug, Error)]
pub enum CheckError {
    /// 文档容器或XML损坏，无法解析
    #[error("文档无法解析: {0}")]
    MalformedDocument(String),

    /// 不是预期的docx容器格式
    #[error("不支持的文档格式: {0}")]
    UnsupportedFormat(String),

    /// 文档没有任何正文内容
    #[error("文档内容为空")]
    EmptyDocument,

    /// 修订后的文档未通过完整性校验
    ///
    /// 合成器内部使用，对外会回退到最近一次有效状态并降级为警告。
    #[error("修订结果校验失败: {0}")]
    RevisionIntegrity(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}
