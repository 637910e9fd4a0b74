//! 检查流水线编排
//!
//! 单次检查是一个逻辑作业：解析（串行）→ {规则引擎、结构检查、AI检查}
//! 对同一只读模型扇出 → 聚合器收拢。核心本身无状态、可重入，
//! "同一提交同时只有一次检查"的约束由调用方保证。

use crate::core::aggregate::aggregate;
use crate::core::docx::DocxParser;
use crate::core::errors::CheckError;
use crate::core::models::{CheckOptions, CheckResult, RuleSet};
use crate::core::rule_engine::RuleEngine;
use crate::core::semantic::AiChecker;
use crate::core::structure::StructureChecker;

/// 检查流水线
pub struct CheckPipeline {
    options: CheckOptions,
}

impl CheckPipeline {
    pub fn new(options: CheckOptions) -> Self {
        Self { options }
    }

    /// 完整检查（启用AI时包含语义检查）
    ///
    /// 解析失败是唯一的致命错误；AI层任何失败都降级为诊断，
    /// 确定性结果始终完整返回。
    pub async fn run_check(
        &self,
        filename: &str,
        bytes: &[u8],
        ruleset: &RuleSet,
    ) -> Result<CheckResult, CheckError> {
        let model = DocxParser::parse_with_name(filename, bytes)?;
        tracing::info!(
            "文档解析完成：{}个段落，{}个标题，{}个表格，{}张图片",
            model.paragraphs.len(),
            model.headings.len(),
            model.tables.len(),
            model.figures.len()
        );

        let deterministic = RuleEngine::new(&ruleset.rules).evaluate(&model);
        let structural = StructureChecker::new(&model).check(&ruleset.rules);

        let mut diagnostics = deterministic.diagnostics;
        let mut ai_issues = Vec::new();

        if self.options.ai_enabled {
            let checker = AiChecker::new(self.options.ai.clone());
            let outcome = checker.check(&model, &ruleset.rules, &self.options).await;
            ai_issues = outcome.issues;
            diagnostics.extend(outcome.diagnostics);
        }

        let result = aggregate(
            &model.info.fingerprint,
            deterministic.issues,
            structural,
            ai_issues,
            diagnostics,
        );
        tracing::info!(
            "检查完成：共{}个问题，状态{:?}",
            result.total_issues,
            result.status
        );
        Ok(result)
    }

    /// 同步检查（跳过全部AI规则）
    pub fn run_check_sync(
        &self,
        filename: &str,
        bytes: &[u8],
        ruleset: &RuleSet,
    ) -> Result<CheckResult, CheckError> {
        let model = DocxParser::parse_with_name(filename, bytes)?;

        let deterministic = RuleEngine::new(&ruleset.rules).evaluate(&model);
        let structural = StructureChecker::new(&model).check(&ruleset.rules);

        Ok(aggregate(
            &model.info.fingerprint,
            deterministic.issues,
            structural,
            Vec::new(),
            deterministic.diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{AiConfig, CheckStatus, RuleCategory};
    use crate::core::testutil::{paragraph, styled_paragraph, DocxBuilder};
    use serde_json::json;

    fn sample_ruleset() -> RuleSet {
        RuleSet::from_json(
            r#"[
            {
                "id": "PAGE_MARGIN_25",
                "name": "页边距检查",
                "category": "page",
                "match": "document",
                "condition": {"top_cm": 2.5, "tolerance_mm": 0.5},
                "error_message": "页边距不符合规范",
                "suggestion": "请调整页边距"
            }
        ]"#,
        )
        .unwrap()
    }

    fn sample_docx() -> Vec<u8> {
        DocxBuilder::new()
            .with_default_styles()
            .margins(1134, 1440, 1800, 1440)
            .add_paragraph(styled_paragraph("第一章 绪论", "Heading1"))
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph(styled_paragraph("1.1.1 跳级标题", "Heading3"))
            .build()
    }

    #[test]
    fn test_sync_check_end_to_end() {
        let pipeline = CheckPipeline::new(CheckOptions::default());
        let result = pipeline
            .run_check_sync("test.docx", &sample_docx(), &sample_ruleset())
            .unwrap();

        // 页边距问题 + 标题跳级问题
        assert_eq!(result.status, CheckStatus::Completed);
        assert!(result
            .issues
            .iter()
            .any(|i| i.category == RuleCategory::Page));
        assert!(result.issues.iter().any(|i| i.rule_id == "HEADING_LEVEL_JUMP"));
        assert_eq!(
            result.total_issues,
            result.category_counts.values().sum::<usize>()
        );
        // 每个问题至少有一个位置
        assert!(result.issues.iter().all(|i| !i.locations.is_empty()));
    }

    #[test]
    fn test_check_is_reentrant() {
        let pipeline = CheckPipeline::new(CheckOptions::default());
        let bytes = sample_docx();
        let ruleset = sample_ruleset();

        let first = pipeline.run_check_sync("test.docx", &bytes, &ruleset).unwrap();
        let second = pipeline.run_check_sync("test.docx", &bytes, &ruleset).unwrap();

        assert_eq!(first.issues, second.issues);
        assert_eq!(first.category_counts, second.category_counts);
    }

    #[test]
    fn test_malformed_rule_yields_warning_status() {
        let ruleset = RuleSet::new(vec![serde_json::from_value(json!({
            "id": "BROKEN",
            "name": "坏规则",
            "category": "page",
            "match": "document",
            "condition": {"top_mm": "不是数字"}
        }))
        .unwrap()]);

        let pipeline = CheckPipeline::new(CheckOptions::default());
        let result = pipeline
            .run_check_sync("test.docx", &sample_docx(), &ruleset)
            .unwrap();

        assert_eq!(result.status, CheckStatus::CompletedWithWarnings);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_ai_failure_preserves_deterministic_issues() {
        // AI端点不可达：确定性问题完整保留，AI问题为零，不报致命错误
        let options = CheckOptions {
            ai_enabled: true,
            spell_check: true,
            cross_ref_check: false,
            ai: AiConfig {
                base_url: "http://127.0.0.1:9/v1".to_string(),
                api_key: "test-key".to_string(),
                timeout_secs: 5,
                ..AiConfig::default()
            },
        };

        let pipeline = CheckPipeline::new(options);
        let result = pipeline
            .run_check("test.docx", &sample_docx(), &sample_ruleset())
            .await
            .unwrap();

        assert!(result.issues.iter().any(|i| i.category == RuleCategory::Page));
        assert!(result
            .issues
            .iter()
            .all(|i| i.source != crate::core::models::IssueSource::Ai));
        assert_eq!(result.status, CheckStatus::CompletedWithWarnings);
    }

    #[test]
    fn test_unparseable_document_fails_fast() {
        let pipeline = CheckPipeline::new(CheckOptions::default());
        let err = pipeline
            .run_check_sync("bad.docx", b"not a docx", &sample_ruleset())
            .unwrap_err();
        assert!(matches!(err, CheckError::UnsupportedFormat(_)));
    }
}
