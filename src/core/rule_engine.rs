//! 确定性规则引擎
//!
//! 对只读的 DocumentModel 执行规则匹配：纯函数、同步、无IO，
//! 同样的输入重复执行得到同样的结果。
//!
//! 同一条规则的多处违规合并为一个Issue（每处违规一个Location），
//! 问题数量口径是"规则被违反了N处"而不是N个问题。

use crate::core::docx::{contains_chinese, contains_english, normalize_font_name};
use crate::core::models::{
    Alignment, CheckerKind, Diagnostic, DiagnosticKind, DocumentModel, FigureInfo, Heading, Issue,
    IssueSource, Location, MatchTarget, Paragraph, Rule, RuleCategory, Run, Severity, TableInfo,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref NUMERIC_HEADING_RE: Regex = Regex::new(r"^\d+(\.\d+)*").unwrap();
}

/// 规则评估输出：问题列表 + 软失败诊断
#[derive(Debug, Default)]
pub struct EvalOutcome {
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 被检查的模型节点
enum Node<'m> {
    Document,
    Paragraph(&'m Paragraph),
    Run(&'m Run),
    Heading(&'m Heading),
    Table(&'m TableInfo),
    Figure(&'m FigureInfo),
}

/// 确定性规则引擎
pub struct RuleEngine<'a> {
    rules: &'a [Rule],
}

impl<'a> RuleEngine<'a> {
    pub fn new(rules: &'a [Rule]) -> Self {
        Self { rules }
    }

    /// 对文档模型执行全部确定性规则
    ///
    /// AI独占规则由语义检查器处理，结构类规则由结构检查器处理；
    /// hybrid规则的确定性部分在这里执行。
    pub fn evaluate(&self, model: &DocumentModel) -> EvalOutcome {
        let mut outcome = EvalOutcome::default();

        for rule in self.rules {
            if rule.checker == CheckerKind::Ai {
                continue;
            }
            if rule.category == RuleCategory::Structure {
                continue;
            }

            match self.check_rule(rule, model) {
                Ok(locations) => {
                    if !locations.is_empty() {
                        outcome.issues.push(build_issue(rule, locations));
                    }
                }
                Err(msg) => {
                    tracing::warn!("规则 {} 条件非法，已跳过: {}", rule.id, msg);
                    outcome.diagnostics.push(Diagnostic {
                        kind: DiagnosticKind::RuleEvaluation,
                        rule_id: Some(rule.id.clone()),
                        message: msg,
                    });
                }
            }
        }

        outcome
    }

    /// 单条规则：解析匹配目标，逐节点判断条件，返回违规位置
    fn check_rule(&self, rule: &Rule, model: &DocumentModel) -> Result<Vec<Location>, String> {
        let targets = resolve_targets(model, rule);
        let mut violations: Vec<Location> = Vec::new();

        for node in &targets {
            if !match_condition(node, &rule.condition, rule.category, rule.target, model)? {
                violations.push(node_location(node, model));
            }
        }

        // run级违规聚合到段落粒度，避免同一段落内多个run重复报告
        if rule.target == MatchTarget::Run && !violations.is_empty() {
            violations = aggregate_to_paragraphs(violations, model);
        }

        Ok(violations)
    }
}

fn build_issue(rule: &Rule, locations: Vec<Location>) -> Issue {
    let error_message = if rule.error_message.is_empty() {
        "格式不符合规范".to_string()
    } else {
        rule.error_message.clone()
    };

    Issue {
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        category: rule.category,
        severity: Severity::Error,
        source: IssueSource::Deterministic,
        error_message,
        suggestion: rule.suggestion.clone(),
        locations,
        fix_action: rule.fix_action,
        fix_params: rule.fix_params.clone(),
    }
}

/// 按匹配目标取出待检查的节点集合
fn resolve_targets<'m>(model: &'m DocumentModel, rule: &Rule) -> Vec<Node<'m>> {
    match rule.target {
        MatchTarget::Document => vec![Node::Document],
        MatchTarget::Paragraph => {
            let targets: Vec<Node> = model
                .paragraphs
                .iter()
                .filter(|p| !p.text.trim().is_empty())
                .filter(|p| {
                    // 正文段落检查排除标题段落
                    rule.category != RuleCategory::Paragraph
                        || !model.is_heading_paragraph(p.index)
                })
                .map(Node::Paragraph)
                .collect();
            targets
        }
        MatchTarget::Run => model
            .runs
            .iter()
            .filter(|r| {
                // 正文字体检查排除标题段落内的run
                rule.category != RuleCategory::Font
                    || !model.is_heading_paragraph(r.paragraph_index)
            })
            .map(Node::Run)
            .collect(),
        MatchTarget::Heading | MatchTarget::Section => {
            model.headings.iter().map(Node::Heading).collect()
        }
        MatchTarget::Style => {
            // 每个层级取首个标题作为该层级样式的代表
            let mut nodes = Vec::new();
            for level in 1..=4u32 {
                if let Some(h) = model.headings.iter().find(|h| h.level == level) {
                    nodes.push(Node::Heading(h));
                }
            }
            nodes
        }
        MatchTarget::Table => model.tables.iter().map(Node::Table).collect(),
        MatchTarget::Figure => model.figures.iter().map(Node::Figure).collect(),
        // 交叉引用由AI检查器负责
        MatchTarget::Reference => Vec::new(),
    }
}

fn node_location(node: &Node, model: &DocumentModel) -> Location {
    match node {
        Node::Document => Location::document(),
        Node::Paragraph(p) => Location::paragraph(p),
        Node::Run(r) => Location::run(r),
        Node::Heading(h) => Location::heading(h, model.page_of_paragraph(h.paragraph_index)),
        Node::Table(t) => Location::table(
            t,
            t.paragraph_index
                .map(|i| model.page_of_paragraph(i))
                .unwrap_or(1),
        ),
        Node::Figure(f) => Location::figure(f, model.page_of_paragraph(f.paragraph_index)),
    }
}

/// run级位置按段落去重并升格为段落位置
fn aggregate_to_paragraphs(violations: Vec<Location>, model: &DocumentModel) -> Vec<Location> {
    let mut seen = std::collections::BTreeSet::new();
    let mut result = Vec::new();

    for loc in violations {
        let para_idx = match loc.paragraph_index {
            Some(idx) => idx,
            None => continue,
        };
        if !seen.insert(para_idx) {
            continue;
        }
        match model.paragraphs.get(para_idx) {
            Some(para) => result.push(Location::paragraph(para)),
            None => result.push(loc),
        }
    }

    result
}

// ---- 条件取值辅助：键存在但类型不对视为条件非法 ----

fn cond_object(cond: &Value) -> Result<&serde_json::Map<String, Value>, String> {
    cond.as_object().ok_or_else(|| "条件必须是JSON对象".to_string())
}

fn cond_f64(obj: &serde_json::Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("条件字段 {} 必须是数值", key)),
    }
}

fn cond_str<'v>(
    obj: &'v serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<&'v str>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| format!("条件字段 {} 必须是字符串", key)),
    }
}

fn cond_bool(obj: &serde_json::Map<String, Value>, key: &str) -> Result<Option<bool>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| format!("条件字段 {} 必须是布尔值", key)),
    }
}

fn alignment_str(a: Alignment) -> &'static str {
    match a {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "justify",
    }
}

/// 条件判断入口，返回true表示通过（无问题）
fn match_condition(
    node: &Node,
    cond: &Value,
    category: RuleCategory,
    target: MatchTarget,
    model: &DocumentModel,
) -> Result<bool, String> {
    let obj = cond_object(cond)?;
    if obj.is_empty() {
        return Ok(true);
    }

    // 章节编号风格检查独立于分类：标题文本须以数字编号开头
    if target == MatchTarget::Section && obj.contains_key("number_style") {
        if let Node::Heading(h) = node {
            return Ok(NUMERIC_HEADING_RE.is_match(h.text.trim()));
        }
    }

    match (category, node) {
        (RuleCategory::Page, Node::Document) => match_page_condition(model, obj),
        (RuleCategory::Font, Node::Run(run)) => match_font_condition(run, obj),
        (RuleCategory::Paragraph, Node::Paragraph(para)) => match_paragraph_condition(para, obj),
        (RuleCategory::Heading, Node::Heading(h)) => match_heading_condition(h, obj),
        (RuleCategory::Figure, Node::Table(t)) => match_caption_condition(
            t.caption.as_deref(),
            t.caption_paragraph_index,
            t.paragraph_index,
            obj,
        ),
        (RuleCategory::Figure, Node::Figure(f)) => match_caption_condition(
            f.caption.as_deref(),
            f.caption_paragraph_index,
            Some(f.paragraph_index),
            obj,
        ),
        (_, node) => match_generic_condition(node, obj),
    }
}

/// 页面设置条件：页边距与纸张大小
///
/// 数值比较默认零容差，规则可通过tolerance_mm显式放宽；
/// 纸张尺寸因twips换算存在舍入噪声，最小容差1mm。
fn match_page_condition(
    model: &DocumentModel,
    obj: &serde_json::Map<String, Value>,
) -> Result<bool, String> {
    let margins = &model.page_settings.margins;
    let tolerance = cond_f64(obj, "tolerance_mm")?.unwrap_or(0.0);

    let checks: [(&str, &str, f64); 4] = [
        ("top_mm", "top_cm", margins.top_mm),
        ("bottom_mm", "bottom_cm", margins.bottom_mm),
        ("left_mm", "left_cm", margins.left_mm),
        ("right_mm", "right_cm", margins.right_mm),
    ];

    for (key_mm, key_cm, actual) in checks {
        let expected = match cond_f64(obj, key_mm)? {
            Some(v) => Some(v),
            None => cond_f64(obj, key_cm)?.map(|cm| cm * 10.0),
        };
        if let Some(expected) = expected {
            if (actual - expected).abs() > tolerance {
                return Ok(false);
            }
        }
    }

    let paper = &model.page_settings.paper_size;
    let paper_tolerance = tolerance.max(1.0);

    if let Some(name) = cond_str(obj, "paper_name")? {
        if name == "A4"
            && !((paper.width_mm - 210.0).abs() < paper_tolerance
                && (paper.height_mm - 297.0).abs() < paper_tolerance)
        {
            return Ok(false);
        }
    }
    if let Some(width) = cond_f64(obj, "width_mm")? {
        if (paper.width_mm - width).abs() > paper_tolerance {
            return Ok(false);
        }
    }
    if let Some(height) = cond_f64(obj, "height_mm")? {
        if (paper.height_mm - height).abs() > paper_tolerance {
            return Ok(false);
        }
    }

    Ok(true)
}

/// 字体条件：中英文分别检查字体名与字号
fn match_font_condition(run: &Run, obj: &serde_json::Map<String, Value>) -> Result<bool, String> {
    // 字体信息不完整（继承自样式且未取到）时跳过，避免误报
    if run.font.name.is_none() || run.font.size_pt.is_none() {
        return Ok(true);
    }

    let tolerance = cond_f64(obj, "tolerance_pt")?.unwrap_or(0.0);
    let actual_name = run.font.name.as_deref().map(normalize_font_name);
    let actual_size = run.font.size_pt.unwrap_or(0.0);

    if let Some(expected) = cond_str(obj, "chinese_font")? {
        let expected = normalize_font_name(expected);
        if contains_chinese(&run.text) && actual_name.as_deref() != Some(expected.as_str()) {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_str(obj, "english_font")? {
        let expected = normalize_font_name(expected);
        if contains_english(&run.text) && actual_name.as_deref() != Some(expected.as_str()) {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_f64(obj, "chinese_size_pt")? {
        if contains_chinese(&run.text) && (actual_size - expected).abs() > tolerance {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_f64(obj, "english_size_pt")? {
        if contains_english(&run.text) && (actual_size - expected).abs() > tolerance {
            return Ok(false);
        }
    }

    Ok(true)
}

/// 段落格式条件：首行缩进与行距
fn match_paragraph_condition(
    para: &Paragraph,
    obj: &serde_json::Map<String, Value>,
) -> Result<bool, String> {
    if let Some(expected) = cond_f64(obj, "first_line_indent_chars")? {
        let tolerance = cond_f64(obj, "tolerance_chars")?.unwrap_or(0.0);
        let actual = para.formatting.first_line_indent_chars.unwrap_or(0.0);
        if (actual - expected).abs() > tolerance {
            return Ok(false);
        }
    }

    if let Some(expected) = cond_f64(obj, "paragraph_line_spacing")? {
        let tolerance = cond_f64(obj, "tolerance_pt")?.unwrap_or(0.0);
        // 多倍行距在解析时已折算为磅值；完全未设置行距的段落跳过
        if let Some(actual) = para.formatting.line_spacing_pt {
            if (actual - expected).abs() > tolerance {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// 标题样式条件：按levelN子条件检查字体/字号/加粗/对齐
fn match_heading_condition(
    heading: &Heading,
    obj: &serde_json::Map<String, Value>,
) -> Result<bool, String> {
    let level_key = format!("level{}", heading.level);
    let level_cond = match obj.get(&level_key) {
        Some(v) => v
            .as_object()
            .ok_or_else(|| format!("条件字段 {} 必须是JSON对象", level_key))?,
        None => return Ok(true),
    };

    // 字体信息不完整时跳过
    if heading.font.name.is_none() || heading.font.size_pt.is_none() {
        return Ok(true);
    }

    let tolerance = cond_f64(level_cond, "tolerance_pt")?.unwrap_or(0.0);

    if let Some(expected) = cond_str(level_cond, "font")? {
        let expected = normalize_font_name(expected);
        let actual = heading.font.name.as_deref().map(normalize_font_name);
        if actual.as_deref() != Some(expected.as_str()) {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_f64(level_cond, "size_pt")? {
        if (heading.font.size_pt.unwrap_or(0.0) - expected).abs() > tolerance {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_bool(level_cond, "bold")? {
        if heading.font.bold.unwrap_or(false) != expected {
            return Ok(false);
        }
    }
    if let Some(expected) = cond_str(level_cond, "alignment")? {
        if alignment_str(heading.alignment) != expected {
            return Ok(false);
        }
    }

    Ok(true)
}

/// 图表题注条件：位置（上方/下方）、前缀、是否必须有题注
fn match_caption_condition(
    caption: Option<&str>,
    caption_paragraph_index: Option<usize>,
    anchor_paragraph_index: Option<usize>,
    obj: &serde_json::Map<String, Value>,
) -> Result<bool, String> {
    if let Some(required) = cond_bool(obj, "require_caption")? {
        if required && caption.is_none() {
            return Ok(false);
        }
    }

    if let Some(expected) = cond_str(obj, "caption_prefix")? {
        match caption {
            Some(text) => {
                if !text.starts_with(expected) {
                    return Ok(false);
                }
            }
            None => return Ok(false),
        }
    }

    if let Some(expected) = cond_str(obj, "caption_position")? {
        if let (Some(cap_idx), Some(anchor_idx)) = (caption_paragraph_index, anchor_paragraph_index)
        {
            let actual = if cap_idx <= anchor_idx { "above" } else { "below" };
            if actual != expected {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

/// 兜底：把节点序列化为JSON后逐字段做相等比较
fn match_generic_condition(
    node: &Node,
    obj: &serde_json::Map<String, Value>,
) -> Result<bool, String> {
    let value = match node {
        Node::Paragraph(p) => serde_json::to_value(p),
        Node::Run(r) => serde_json::to_value(r),
        Node::Heading(h) => serde_json::to_value(h),
        Node::Table(t) => serde_json::to_value(t),
        Node::Figure(f) => serde_json::to_value(f),
        Node::Document => return Ok(true),
    }
    .map_err(|e| format!("节点序列化失败: {}", e))?;

    for (key, expected) in obj {
        if key.starts_with("tolerance") || key.starts_with('_') {
            continue;
        }
        if value.get(key) != Some(expected) {
            return Ok(false);
        }
    }

    Ok(true)
}
