//! 核心数据模型定义
//!
//! 所有数据结构必须严格遵守设计文档定义，不允许自行添加未定义的字段。
//! DocumentModel 一旦构建完成即为只读，下游检查器不得修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 文档基本信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// 文件名
    pub filename: String,
    /// 文件大小（字节）
    pub file_size: u64,
    /// 内容指纹（SHA-256前16字节的hex编码）
    pub fingerprint: String,
}

/// 纸张尺寸（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PaperSize {
    pub width_mm: f64,
    pub height_mm: f64,
}

/// 页边距（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Margins {
    pub top_mm: f64,
    pub bottom_mm: f64,
    pub left_mm: f64,
    pub right_mm: f64,
}

/// 页面设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PageSettings {
    pub paper_size: PaperSize,
    pub margins: Margins,
    /// 页眉高度（毫米）
    pub header_mm: f64,
    /// 页脚高度（毫米）
    pub footer_mm: f64,
}

/// 对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// 字体信息
///
/// name/size_pt 为 None 表示该属性继承自样式且未能直接取到，
/// 检查器对不完整的字体信息跳过判断，避免误报。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FontInfo {
    pub name: Option<String>,
    pub size_pt: Option<f64>,
    pub bold: Option<bool>,
}

/// 段落格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParagraphFormatting {
    /// 首行缩进（毫米）
    pub first_line_indent_mm: Option<f64>,
    /// 首行缩进（字符，来自firstLineChars时为精确值，否则按毫米估算）
    pub first_line_indent_chars: Option<f64>,
    /// 行距（磅）
    pub line_spacing_pt: Option<f64>,
    /// 行距倍数（多倍行距时有值）
    pub line_spacing_multiple: Option<f64>,
    /// 段前间距（磅）
    pub space_before_pt: Option<f64>,
    /// 段后间距（磅）
    pub space_after_pt: Option<f64>,
}

/// 段落
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 正文段落索引（从0开始，表格内段落不计入）
    pub index: usize,
    /// 段落文本（所有run拼接）
    pub text: String,
    /// 样式名称
    pub style_name: String,
    pub alignment: Alignment,
    pub formatting: ParagraphFormatting,
    /// 首个run的字体（用于正文字体抽取）
    pub font: Option<FontInfo>,
    /// 估算页码
    pub page_number: u32,
    /// 页内起始行（估算）
    pub start_line: u32,
    /// 页内结束行（估算）
    pub end_line: u32,
}

/// 文本run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub paragraph_index: usize,
    pub run_index: usize,
    pub text: String,
    pub font: FontInfo,
    pub page_number: u32,
}

/// 标题
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// 层级（1为最高）
    pub level: u32,
    pub text: String,
    pub style_name: String,
    pub alignment: Alignment,
    pub font: FontInfo,
    pub paragraph_index: usize,
}

/// 表格
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub index: usize,
    pub rows: usize,
    pub cols: usize,
    /// 题注文本（如"表1-1 xxx"）
    pub caption: Option<String>,
    pub caption_paragraph_index: Option<usize>,
    /// 表格前最近一个正文段落的索引（定位锚点）
    pub paragraph_index: Option<usize>,
}

/// 图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureInfo {
    pub index: usize,
    pub caption: Option<String>,
    pub caption_paragraph_index: Option<usize>,
    /// 图片所在段落索引
    pub paragraph_index: usize,
}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub level: u32,
    pub page_number: Option<u32>,
    pub paragraph_index: usize,
}

/// 目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableOfContents {
    pub exists: bool,
    pub entries: Vec<TocEntry>,
    pub paragraph_index: Option<usize>,
}

/// 文档结构模型
///
/// 由 DocxParser 一次性构建，构建后只读。同一次检查中
/// 规则引擎、结构检查器与AI检查器共享同一个实例。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentModel {
    pub info: DocumentInfo,
    pub page_settings: PageSettings,
    pub paragraphs: Vec<Paragraph>,
    pub runs: Vec<Run>,
    pub headings: Vec<Heading>,
    pub tables: Vec<TableInfo>,
    pub figures: Vec<FigureInfo>,
    pub table_of_contents: TableOfContents,
}

impl DocumentModel {
    /// 按段落索引取页码（找不到时返回1）
    pub fn page_of_paragraph(&self, paragraph_index: usize) -> u32 {
        self.paragraphs
            .get(paragraph_index)
            .map(|p| p.page_number)
            .unwrap_or(1)
    }

    /// 判断段落是否为标题段落
    pub fn is_heading_paragraph(&self, paragraph_index: usize) -> bool {
        self.headings
            .iter()
            .any(|h| h.paragraph_index == paragraph_index)
    }
}

/// 规则分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Page,
    Font,
    Paragraph,
    Heading,
    Figure,
    Reference,
    Structure,
    ContentQuality,
    Other,
}

impl RuleCategory {
    /// 报告中的排序权重
    pub fn order_index(&self) -> u8 {
        match self {
            RuleCategory::Page => 0,
            RuleCategory::Font => 1,
            RuleCategory::Paragraph => 2,
            RuleCategory::Heading => 3,
            RuleCategory::Figure => 4,
            RuleCategory::Reference => 5,
            RuleCategory::Structure => 6,
            RuleCategory::ContentQuality => 7,
            RuleCategory::Other => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Page => "page",
            RuleCategory::Font => "font",
            RuleCategory::Paragraph => "paragraph",
            RuleCategory::Heading => "heading",
            RuleCategory::Figure => "figure",
            RuleCategory::Reference => "reference",
            RuleCategory::Structure => "structure",
            RuleCategory::ContentQuality => "content_quality",
            RuleCategory::Other => "other",
        }
    }
}

/// 规则匹配目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTarget {
    Document,
    Section,
    Paragraph,
    Run,
    Style,
    Heading,
    Table,
    Figure,
    Reference,
}

/// 检查器类型
///
/// hybrid 规则先走确定性检查，再把需要语义判断的部分交给AI。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckerKind {
    #[default]
    Deterministic,
    Ai,
    Hybrid,
}

/// 自动修复动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixAction {
    SetPageMargin,
    SetParagraphIndent,
    SetHeadingStyle,
    SetRunStyle,
    ReplaceText,
    ReplaceRef,
}

/// 规则定义
///
/// 规则由外部模板系统提供，核心只读不写。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// 规则业务ID（如 PAGE_MARGIN_25）
    pub id: String,
    /// 规则名称（用于显示）
    pub name: String,
    /// 规则分类
    pub category: RuleCategory,
    /// 匹配目标
    #[serde(rename = "match")]
    pub target: MatchTarget,
    /// 匹配条件（结构化JSON谓词）
    #[serde(default)]
    pub condition: serde_json::Value,
    /// 错误消息
    #[serde(default)]
    pub error_message: String,
    /// 修复建议
    #[serde(default)]
    pub suggestion: String,
    /// 检查器类型
    #[serde(default)]
    pub checker: CheckerKind,
    /// AI检查的prompt模板
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// 单条规则的AI超时（秒），缺省走全局配置
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// 自动修复动作
    #[serde(default)]
    pub fix_action: Option<FixAction>,
    /// 自动修复参数
    #[serde(default)]
    pub fix_params: Option<serde_json::Value>,
}

/// 规则集合（有序，调用方提供）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// 从JSON加载规则集
    pub fn from_json(json_str: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json_str)?)
    }
}

/// 问题严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Hint,
}

/// 问题来源检查器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Deterministic,
    Structure,
    Ai,
}

/// 位置类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Document,
    Paragraph,
    Run,
    Heading,
    Table,
    Figure,
    Toc,
}

/// 问题位置
///
/// 每个位置都必须能回溯到 DocumentModel 中的具体节点。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub page_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_index: Option<usize>,
    /// 图/表索引
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    /// 文本摘录（便于人工定位）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// 人类可读描述（如"第2页第5段"）
    pub description: String,
}

impl Location {
    /// 文档整体设置级位置
    pub fn document() -> Self {
        Self {
            kind: LocationKind::Document,
            page_number: 1,
            paragraph_index: None,
            run_index: None,
            element_index: None,
            start_line: None,
            end_line: None,
            excerpt: None,
            description: "文档整体设置".to_string(),
        }
    }

    pub fn paragraph(para: &Paragraph) -> Self {
        Self {
            kind: LocationKind::Paragraph,
            page_number: para.page_number,
            paragraph_index: Some(para.index),
            run_index: None,
            element_index: None,
            start_line: Some(para.start_line),
            end_line: Some(para.end_line),
            excerpt: Some(truncate_excerpt(&para.text)),
            description: format!(
                "第{}页第{}段({}~{}行)",
                para.page_number,
                para.index + 1,
                para.start_line,
                para.end_line
            ),
        }
    }

    pub fn run(run: &Run) -> Self {
        Self {
            kind: LocationKind::Run,
            page_number: run.page_number,
            paragraph_index: Some(run.paragraph_index),
            run_index: Some(run.run_index),
            element_index: None,
            start_line: None,
            end_line: None,
            excerpt: Some(truncate_excerpt(&run.text)),
            description: format!("第{}页第{}段文本", run.page_number, run.paragraph_index + 1),
        }
    }

    pub fn heading(heading: &Heading, page_number: u32) -> Self {
        Self {
            kind: LocationKind::Heading,
            page_number,
            paragraph_index: Some(heading.paragraph_index),
            run_index: None,
            element_index: None,
            start_line: None,
            end_line: None,
            excerpt: Some(truncate_excerpt(&heading.text)),
            description: format!("标题: {}", heading.text),
        }
    }

    pub fn table(table: &TableInfo, page_number: u32) -> Self {
        Self {
            kind: LocationKind::Table,
            page_number,
            paragraph_index: table.paragraph_index,
            run_index: None,
            element_index: Some(table.index),
            start_line: None,
            end_line: None,
            excerpt: table.caption.as_deref().map(truncate_excerpt),
            description: format!("第{}个表格", table.index + 1),
        }
    }

    pub fn figure(figure: &FigureInfo, page_number: u32) -> Self {
        Self {
            kind: LocationKind::Figure,
            page_number,
            paragraph_index: Some(figure.paragraph_index),
            run_index: None,
            element_index: Some(figure.index),
            start_line: None,
            end_line: None,
            excerpt: figure.caption.as_deref().map(truncate_excerpt),
            description: format!("第{}个图片", figure.index + 1),
        }
    }

    pub fn toc(description: String) -> Self {
        Self {
            kind: LocationKind::Toc,
            page_number: 1,
            paragraph_index: None,
            run_index: None,
            element_index: None,
            start_line: None,
            end_line: None,
            excerpt: None,
            description,
        }
    }
}

fn truncate_excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 40;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_CHARS).collect();
        format!("{}…", cut)
    }
}

/// 单个问题
///
/// 由且仅由一个检查器产出，产出后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub rule_id: String,
    pub rule_name: String,
    pub category: RuleCategory,
    pub severity: Severity,
    pub source: IssueSource,
    pub error_message: String,
    pub suggestion: String,
    /// 至少包含一个有效位置
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_action: Option<FixAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_params: Option<serde_json::Value>,
}

/// 软失败诊断类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 单条规则条件非法，已跳过
    RuleEvaluation,
    /// AI检查被跳过（未启用/传输失败）
    AiSkipped,
    /// AI检查超时
    AiTimeout,
    /// 修订编辑冲突，已跳过
    RevisionConflict,
    /// 修订结果校验失败，已回退
    RevisionIntegrity,
}

/// 软失败诊断
///
/// 降级信息以数据形式进入结果，不以错误形式中断流程。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub message: String,
}

/// 检查完成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Completed,
    /// 有软失败发生（如AI超时），确定性结果仍然完整
    CompletedWithWarnings,
}

/// 一次完整检查的聚合结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// 检查ID
    pub check_id: String,
    /// 源文档指纹
    pub fingerprint: String,
    pub total_issues: usize,
    pub issues: Vec<Issue>,
    /// 各分类问题数，total_issues等于各分类之和
    pub category_counts: BTreeMap<String, usize>,
    pub status: CheckStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub checked_at: DateTime<Utc>,
}

/// 修订编辑优先级分类
///
/// 结构/格式类修复先于AI文本类修复，冲突时后序编辑跳过。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EditPrecedence {
    Structural,
    Textual,
}

/// 具体编辑操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOp {
    SetPageMargins {
        top_mm: f64,
        bottom_mm: f64,
        left_mm: f64,
        right_mm: f64,
    },
    SetFirstLineIndent {
        paragraph_index: usize,
        chars: f64,
    },
    SetRunFont {
        paragraph_index: usize,
        font: String,
        size_pt: f64,
        bold: Option<bool>,
        alignment: Option<Alignment>,
    },
    ReplaceText {
        paragraph_index: usize,
        original: String,
        replacement: String,
    },
}

impl EditOp {
    /// 编辑落点的段落索引（文档级编辑为None）
    pub fn paragraph_index(&self) -> Option<usize> {
        match self {
            EditOp::SetPageMargins { .. } => None,
            EditOp::SetFirstLineIndent {
                paragraph_index, ..
            }
            | EditOp::SetRunFont {
                paragraph_index, ..
            }
            | EditOp::ReplaceText {
                paragraph_index, ..
            } => Some(*paragraph_index),
        }
    }
}

/// 计划中的单个编辑
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEdit {
    pub rule_id: String,
    pub precedence: EditPrecedence,
    pub op: EditOp,
    /// 问题提交顺序（冲突时的最终仲裁依据）
    pub order: usize,
    pub location_description: String,
}

/// 修订计划
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionPlan {
    pub edits: Vec<PlannedEdit>,
    /// 计划阶段即确定无法机械修复的问题
    pub unrevised: Vec<UnrevisedRecord>,
}

/// 已应用的修订记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub rule_id: String,
    pub location_description: String,
}

/// 未修订记录及原因
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrevisedRecord {
    pub rule_id: String,
    pub location_description: String,
    pub reason: String,
}

/// 修订清单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionManifest {
    pub revised: Vec<RevisionRecord>,
    pub unrevised: Vec<UnrevisedRecord>,
    pub warnings: Vec<String>,
    pub author: String,
    pub revised_at: DateTime<Utc>,
}

/// 修订输出：新文档字节与修订清单
#[derive(Debug, Clone)]
pub struct RevisedDocument {
    pub bytes: Vec<u8>,
    pub manifest: RevisionManifest,
}

/// 修订策略
///
/// 冲突优先序（确定性优先于AI文本修复）作为策略参数而非硬编码。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionPolicy {
    /// 修订作者（写入w:author）
    pub author: String,
    /// 结构/格式类修复是否优先于文本类修复
    pub deterministic_first: bool,
    /// 固定修订时间戳（用于可重复输出，None时取当前时间）
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Default for RevisionPolicy {
    fn default() -> Self {
        Self {
            author: "DocCheck".to_string(),
            deterministic_first: true,
            timestamp: None,
        }
    }
}

/// AI配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API基础URL（OpenAI兼容）
    pub base_url: String,
    /// API密钥
    pub api_key: String,
    /// 模型名称
    pub model: String,
    /// 全局单次调用超时（秒）
    pub timeout_secs: u64,
    /// 传输失败时的重试次数
    pub max_retries: u32,
    /// 并发上限
    pub max_concurrency: usize,
    /// 最大token数
    pub max_tokens: u32,
    /// 温度参数
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            max_retries: 0,
            max_concurrency: 4,
            max_tokens: 3000,
            temperature: 0.3,
        }
    }
}

/// 单次检查的选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOptions {
    /// 是否启用AI检查
    pub ai_enabled: bool,
    /// 是否启用错别字检测
    pub spell_check: bool,
    /// 是否启用交叉引用检查
    pub cross_ref_check: bool,
    /// AI配置
    pub ai: AiConfig,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            ai_enabled: false,
            spell_check: true,
            cross_ref_check: true,
            ai: AiConfig::default(),
        }
    }
}

/// 应用配置（CLI驱动用，显式传入流水线）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub check: CheckOptions,
    pub revision: RevisionPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserialization_defaults() {
        let json = r#"{
            "id": "PAGE_MARGIN_25",
            "name": "页边距检查",
            "category": "page",
            "match": "document",
            "condition": {"top_mm": 25.0},
            "error_message": "页边距不符合规范",
            "suggestion": "请设置页边距"
        }"#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.checker, CheckerKind::Deterministic);
        assert_eq!(rule.category, RuleCategory::Page);
        assert_eq!(rule.target, MatchTarget::Document);
        assert!(rule.fix_action.is_none());
    }

    #[test]
    fn test_fix_action_snake_case() {
        let rule: Rule = serde_json::from_str(
            r#"{
                "id": "R1", "name": "n", "category": "font", "match": "run",
                "fix_action": "set_run_style"
            }"#,
        )
        .unwrap();
        assert_eq!(rule.fix_action, Some(FixAction::SetRunStyle));
    }

    #[test]
    fn test_category_order() {
        assert!(RuleCategory::Page.order_index() < RuleCategory::Font.order_index());
        assert!(RuleCategory::Structure.order_index() < RuleCategory::ContentQuality.order_index());
    }

    #[test]
    fn test_location_excerpt_truncation() {
        let para = Paragraph {
            index: 0,
            text: "很".repeat(100),
            style_name: "Normal".to_string(),
            alignment: Alignment::Left,
            formatting: ParagraphFormatting::default(),
            font: None,
            page_number: 1,
            start_line: 1,
            end_line: 2,
        };
        let loc = Location::paragraph(&para);
        assert!(loc.excerpt.unwrap().chars().count() <= 41);
    }
}
