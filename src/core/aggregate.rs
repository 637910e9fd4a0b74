//! 结果聚合模块
//!
//! 把确定性检查、结构检查与AI检查的问题合并为一份CheckResult：
//! 去重（同位置同分类时确定性结果优先于AI结果）、
//! 稳定排序（分类序 → 首位置页码），保证报告可复现。

use crate::core::models::{
    CheckResult, CheckStatus, Diagnostic, Issue, IssueSource, Location, LocationKind,
};
use std::collections::BTreeMap;

/// 聚合全部检查器的输出
pub fn aggregate(
    fingerprint: &str,
    deterministic: Vec<Issue>,
    structural: Vec<Issue>,
    ai: Vec<Issue>,
    diagnostics: Vec<Diagnostic>,
) -> CheckResult {
    let mut issues: Vec<Issue> = Vec::new();
    issues.extend(deterministic);
    issues.extend(structural);

    // AI问题与确定性问题指向同一位置、同一分类时，保留置信度更高的确定性结果
    for ai_issue in ai {
        let duplicated = issues
            .iter()
            .filter(|existing| existing.source != IssueSource::Ai)
            .any(|existing| {
                existing.category == ai_issue.category
                    && existing.locations.iter().any(|a| {
                        ai_issue.locations.iter().any(|b| locations_overlap(a, b))
                    })
            });
        if duplicated {
            tracing::debug!("AI问题与确定性问题重复，丢弃: {}", ai_issue.rule_id);
            continue;
        }
        issues.push(ai_issue);
    }

    // 稳定排序：分类序 → 首位置页码；同键保持产出顺序
    issues.sort_by_key(|issue| {
        (
            issue.category.order_index(),
            issue
                .locations
                .first()
                .map(|l| l.page_number)
                .unwrap_or(u32::MAX),
        )
    });

    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    for issue in &issues {
        *category_counts
            .entry(issue.category.as_str().to_string())
            .or_insert(0) += 1;
    }

    let status = if diagnostics.is_empty() {
        CheckStatus::Completed
    } else {
        CheckStatus::CompletedWithWarnings
    };

    CheckResult {
        check_id: uuid::Uuid::new_v4().to_string(),
        fingerprint: fingerprint.to_string(),
        total_issues: issues.len(),
        issues,
        category_counts,
        status,
        diagnostics,
        checked_at: chrono::Utc::now(),
    }
}

/// 两个位置是否指向同一处
fn locations_overlap(a: &Location, b: &Location) -> bool {
    if a.kind == LocationKind::Document && b.kind == LocationKind::Document {
        return true;
    }
    match (a.paragraph_index, b.paragraph_index) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{RuleCategory, Severity};

    fn issue(
        rule_id: &str,
        category: RuleCategory,
        source: IssueSource,
        paragraph_index: Option<usize>,
        page: u32,
    ) -> Issue {
        let location = Location {
            kind: if paragraph_index.is_some() {
                LocationKind::Paragraph
            } else {
                LocationKind::Document
            },
            page_number: page,
            paragraph_index,
            run_index: None,
            element_index: None,
            start_line: None,
            end_line: None,
            excerpt: None,
            description: format!("位置{}", page),
        };
        Issue {
            rule_id: rule_id.to_string(),
            rule_name: rule_id.to_string(),
            category,
            severity: Severity::Error,
            source,
            error_message: "问题".to_string(),
            suggestion: "建议".to_string(),
            locations: vec![location],
            fix_action: None,
            fix_params: None,
        }
    }

    #[test]
    fn test_ai_duplicate_dropped_deterministic_kept() {
        let det = vec![issue(
            "FONT_CHECK",
            RuleCategory::Font,
            IssueSource::Deterministic,
            Some(3),
            1,
        )];
        let ai = vec![issue(
            "AI_FONT",
            RuleCategory::Font,
            IssueSource::Ai,
            Some(3),
            1,
        )];

        let result = aggregate("fp", det, Vec::new(), ai, Vec::new());
        assert_eq!(result.total_issues, 1);
        assert_eq!(result.issues[0].rule_id, "FONT_CHECK");
    }

    #[test]
    fn test_ai_issue_at_other_location_kept() {
        let det = vec![issue(
            "FONT_CHECK",
            RuleCategory::Font,
            IssueSource::Deterministic,
            Some(3),
            1,
        )];
        let ai = vec![issue(
            "AI_SPELL_CHECK",
            RuleCategory::ContentQuality,
            IssueSource::Ai,
            Some(3),
            1,
        )];

        // 分类不同，不算重复
        let result = aggregate("fp", det, Vec::new(), ai, Vec::new());
        assert_eq!(result.total_issues, 2);
    }

    #[test]
    fn test_sort_by_category_then_page() {
        let det = vec![
            issue("P2", RuleCategory::Paragraph, IssueSource::Deterministic, Some(30), 2),
            issue("PAGE", RuleCategory::Page, IssueSource::Deterministic, None, 1),
            issue("P1", RuleCategory::Paragraph, IssueSource::Deterministic, Some(1), 1),
        ];

        let result = aggregate("fp", det, Vec::new(), Vec::new(), Vec::new());
        let ids: Vec<&str> = result.issues.iter().map(|i| i.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["PAGE", "P1", "P2"]);
    }

    #[test]
    fn test_total_equals_category_sum_and_status() {
        let det = vec![
            issue("PAGE", RuleCategory::Page, IssueSource::Deterministic, None, 1),
            issue("F1", RuleCategory::Font, IssueSource::Deterministic, Some(1), 1),
        ];
        let structural = vec![issue(
            "HEADING_LEVEL_JUMP",
            RuleCategory::Structure,
            IssueSource::Structure,
            Some(5),
            1,
        )];

        let result = aggregate("fp", det, structural, Vec::new(), Vec::new());
        assert_eq!(result.status, CheckStatus::Completed);
        assert_eq!(
            result.total_issues,
            result.category_counts.values().sum::<usize>()
        );
        assert_eq!(result.category_counts.get("page"), Some(&1));
        assert_eq!(result.category_counts.get("structure"), Some(&1));
    }

    #[test]
    fn test_diagnostics_flip_status_to_warning() {
        let diagnostics = vec![Diagnostic {
            kind: crate::core::models::DiagnosticKind::AiTimeout,
            rule_id: Some("AI_SPELL_CHECK".to_string()),
            message: "超时".to_string(),
        }];

        let result = aggregate("fp", Vec::new(), Vec::new(), Vec::new(), diagnostics);
        assert_eq!(result.status, CheckStatus::CompletedWithWarnings);
        assert_eq!(result.total_issues, 0);
    }
}
