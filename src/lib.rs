//! DocCheck - 文档格式检查与修订引擎
//!
//! 核心设计原则：
//! - 文档模型只构建一次，各检查器只读扇出
//! - 确定性检查结果永远完整，AI失败只降级不中断
//! - 修订以审阅痕迹写回原始文档，人类永远有最终裁决权

pub mod core;
pub mod storage;
