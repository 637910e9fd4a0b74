//! 端到端仿真测试：构造真实docx包走完整的检查→修订链路

use crate::core::docx::DocxParser;
use crate::core::models::{CheckOptions, CheckStatus, RuleCategory, RuleSet, RevisionPolicy};
use crate::core::pipeline::CheckPipeline;
use crate::core::revision::RevisionSynthesizer;
use crate::core::testutil::{paragraph, styled_paragraph, DocxBuilder};
use chrono::TimeZone;
use std::fs;
use tempfile::tempdir;

fn fixed_policy() -> RevisionPolicy {
    RevisionPolicy {
        author: "DocCheck".to_string(),
        deterministic_first: true,
        timestamp: Some(chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()),
    }
}

fn thesis_ruleset() -> RuleSet {
    RuleSet::from_json(
        r#"[
        {
            "id": "PAGE_MARGIN_25",
            "name": "页边距检查",
            "category": "page",
            "match": "document",
            "condition": {"top_cm": 2.5, "bottom_cm": 2.5, "tolerance_mm": 0.5},
            "error_message": "页边距不符合规范（上2.5cm/下2.5cm）",
            "suggestion": "请设置页边距为上2.5cm、下2.5cm",
            "fix_action": "set_page_margin",
            "fix_params": {"top_mm": 25.0, "bottom_mm": 25.0, "left_mm": 31.8, "right_mm": 25.4}
        },
        {
            "id": "FONT_BODY_SONGTI",
            "name": "正文字体检查",
            "category": "font",
            "match": "run",
            "condition": {"chinese_font": "宋体", "chinese_size_pt": 12.0, "tolerance_pt": 0.5},
            "error_message": "正文应使用宋体12pt字体",
            "suggestion": "请将正文字体设置为宋体，字号12pt",
            "fix_action": "set_run_style",
            "fix_params": {"chinese_font": "宋体", "size_pt": 12.0}
        },
        {
            "id": "REQUIRED_SECTIONS_CHECK",
            "name": "必要章节检查",
            "category": "structure",
            "match": "document",
            "condition": {"required_sections": ["绪论", "参考文献"]}
        }
    ]"#,
    )
    .unwrap()
}

/// 上边距2.0cm、正文用错字体、标题跳级的问题文档
fn problem_docx() -> Vec<u8> {
    DocxBuilder::new()
        .with_default_styles()
        .margins(1134, 1417, 1800, 1440)
        .add_paragraph(styled_paragraph("第一章 绪论", "Heading1"))
        .add_paragraph(paragraph("这一段正文用了黑体字。", Some(("黑体", 24, false))))
        .add_paragraph(styled_paragraph("1.1.1 跳过了二级的标题", "Heading3"))
        .add_paragraph(paragraph("这一段正文是正常的宋体。", Some(("宋体", 24, false))))
        .build()
}

#[test]
fn sim_margin_scenario_exactly_one_page_issue() {
    // 2.0cm上边距 vs 规则要求2.5cm：恰好一个page类问题、一个文档级位置
    let bytes = DocxBuilder::new()
        .margins(1134, 1417, 1800, 1440)
        .add_paragraph(paragraph("正文内容", Some(("宋体", 24, false))))
        .build();

    let pipeline = CheckPipeline::new(CheckOptions::default());
    let result = pipeline
        .run_check_sync("margin.docx", &bytes, &thesis_ruleset())
        .unwrap();

    let page_issues: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.category == RuleCategory::Page)
        .collect();
    assert_eq!(page_issues.len(), 1);
    assert_eq!(page_issues[0].locations.len(), 1);
    assert_eq!(
        page_issues[0].locations[0].kind,
        crate::core::models::LocationKind::Document
    );
}

#[test]
fn sim_full_check_finds_all_issue_classes() {
    let pipeline = CheckPipeline::new(CheckOptions::default());
    let result = pipeline
        .run_check_sync("thesis.docx", &problem_docx(), &thesis_ruleset())
        .unwrap();

    // 页边距、正文字体、标题跳级、缺少参考文献章节
    assert!(result.issues.iter().any(|i| i.rule_id == "PAGE_MARGIN_25"));
    assert!(result.issues.iter().any(|i| i.rule_id == "FONT_BODY_SONGTI"));
    assert!(result.issues.iter().any(|i| i.rule_id == "HEADING_LEVEL_JUMP"));
    assert!(result
        .issues
        .iter()
        .any(|i| i.rule_id == "REQUIRED_SECTION_MISSING"));

    // 字体问题只应标记黑体那一段
    let font_issue = result
        .issues
        .iter()
        .find(|i| i.rule_id == "FONT_BODY_SONGTI")
        .unwrap();
    assert_eq!(font_issue.locations.len(), 1);
    assert_eq!(font_issue.locations[0].paragraph_index, Some(1));

    // 报告排序：page类在font类之前
    let page_pos = result
        .issues
        .iter()
        .position(|i| i.category == RuleCategory::Page)
        .unwrap();
    let font_pos = result
        .issues
        .iter()
        .position(|i| i.category == RuleCategory::Font)
        .unwrap();
    assert!(page_pos < font_pos);
}

#[test]
fn sim_check_then_revise_roundtrip() {
    let bytes = problem_docx();
    let pipeline = CheckPipeline::new(CheckOptions::default());
    let result = pipeline
        .run_check_sync("thesis.docx", &bytes, &thesis_ruleset())
        .unwrap();

    let synthesizer = RevisionSynthesizer::new(fixed_policy());
    let revised = synthesizer.synthesize(&bytes, &result).unwrap();

    // 修订后的文档必须仍可打开
    let model = DocxParser::parse(&revised.bytes).unwrap();

    // 页边距已按修订参数改写
    assert!((model.page_settings.margins.top_mm - 25.0).abs() < 0.1);
    assert!((model.page_settings.margins.bottom_mm - 25.0).abs() < 0.1);

    // 带修复动作的问题都已应用；结构类问题无机械修复，记为未修订
    assert!(revised
        .manifest
        .revised
        .iter()
        .any(|r| r.rule_id == "PAGE_MARGIN_25"));
    assert!(revised
        .manifest
        .revised
        .iter()
        .any(|r| r.rule_id == "FONT_BODY_SONGTI"));
    assert!(revised
        .manifest
        .unrevised
        .iter()
        .any(|u| u.rule_id == "HEADING_LEVEL_JUMP" && u.reason == "无自动修复动作"));
}

#[test]
fn sim_result_json_roundtrip_through_files() {
    // 模拟CLI链路：检查结果落盘JSON，再读回驱动修订
    let dir = tempdir().unwrap();
    let doc_path = dir.path().join("thesis.docx");
    let result_path = dir.path().join("result.json");

    let bytes = problem_docx();
    fs::write(&doc_path, &bytes).unwrap();

    let pipeline = CheckPipeline::new(CheckOptions::default());
    let loaded = fs::read(&doc_path).unwrap();
    let result = pipeline
        .run_check_sync("thesis.docx", &loaded, &thesis_ruleset())
        .unwrap();
    assert_eq!(result.status, CheckStatus::Completed);

    fs::write(&result_path, serde_json::to_string_pretty(&result).unwrap()).unwrap();

    let reloaded: crate::core::models::CheckResult =
        serde_json::from_str(&fs::read_to_string(&result_path).unwrap()).unwrap();
    assert_eq!(reloaded.total_issues, result.total_issues);
    assert_eq!(reloaded.check_id, result.check_id);

    let revised = RevisionSynthesizer::new(fixed_policy())
        .synthesize(&loaded, &reloaded)
        .unwrap();
    let revised_path = dir.path().join("thesis_revised.docx");
    fs::write(&revised_path, &revised.bytes).unwrap();

    let reopened = fs::read(&revised_path).unwrap();
    assert!(DocxParser::parse(&reopened).is_ok());
}

#[test]
fn sim_revision_is_repeatable_on_same_check_result() {
    let bytes = problem_docx();
    let pipeline = CheckPipeline::new(CheckOptions::default());
    let result = pipeline
        .run_check_sync("thesis.docx", &bytes, &thesis_ruleset())
        .unwrap();

    let synthesizer = RevisionSynthesizer::new(fixed_policy());
    let first = synthesizer.synthesize(&bytes, &result).unwrap();
    let second = synthesizer.synthesize(&bytes, &result).unwrap();

    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.manifest.revised, second.manifest.revised);
    assert_eq!(first.manifest.unrevised, second.manifest.unrevised);
}
