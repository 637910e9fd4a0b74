//! 结构检查模块
//!
//! 面向整篇文档的层级不变量检查，与逐节点的规则引擎分开：
//! 标题层级跳跃、必要章节、图表题注编号连续性、目录与正文一致性。
//! 纯函数、同步执行。

use crate::core::models::{
    DocumentModel, Issue, IssueSource, Location, Rule, RuleCategory, Severity,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PREFIX_CN_NUM_RE: Regex = Regex::new(r"^[一二三四五六七八九十]+[、.]").unwrap();
    static ref PREFIX_NUM_RE: Regex = Regex::new(r"^\d+[、.]").unwrap();
    static ref PREFIX_PAREN_CN_RE: Regex =
        Regex::new(r"^[（(]\s*[一二三四五六七八九十]+[）)]").unwrap();
    static ref PREFIX_PAREN_NUM_RE: Regex = Regex::new(r"^[（(]\s*\d+[）)]").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"[\s　]+").unwrap();
    static ref PUNCT_RE: Regex = Regex::new(r"[，。、；：！？]").unwrap();
    static ref CAPTION_NUMBER_RE: Regex = Regex::new(r"^[图表]\s*(\d+(?:[-－.．]\d+)*)").unwrap();
}

/// 文档结构检查器
pub struct StructureChecker<'m> {
    model: &'m DocumentModel,
}

impl<'m> StructureChecker<'m> {
    pub fn new(model: &'m DocumentModel) -> Self {
        Self { model }
    }

    /// 执行结构检查
    ///
    /// 标题层级与题注编号是无条件检查；必要章节与目录一致性
    /// 只在规则集声明对应structure规则时执行。
    pub fn check(&self, rules: &[Rule]) -> Vec<Issue> {
        let mut issues = Vec::new();

        issues.extend(self.check_heading_hierarchy());
        issues.extend(self.check_caption_numbering());

        for rule in rules {
            if rule.category != RuleCategory::Structure {
                continue;
            }
            match rule.id.as_str() {
                "REQUIRED_SECTIONS_CHECK" => {
                    let required: Vec<String> = rule
                        .condition
                        .get("required_sections")
                        .and_then(|v| v.as_array())
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                    issues.extend(self.check_required_sections(&required));
                }
                "TOC_BODY_CONSISTENCY" => {
                    issues.extend(self.check_toc_body_consistency());
                }
                // 标题层级已在上面无条件检查
                _ => {}
            }
        }

        issues
    }

    /// 标题层级不允许跳级（如1级直接跟3级）
    ///
    /// 回到1级属于开启新章节，不算跳级。
    pub fn check_heading_hierarchy(&self) -> Vec<Issue> {
        let headings = &self.model.headings;
        let mut issues = Vec::new();

        for window in headings.windows(2) {
            let prev = &window[0];
            let curr = &window[1];

            if curr.level == 1 {
                continue;
            }
            if curr.level > prev.level + 1 {
                issues.push(structure_issue(
                    "HEADING_LEVEL_JUMP",
                    "标题层级跳跃",
                    format!(
                        "标题层级从{}级跳转到{}级，中间缺少{}级标题",
                        prev.level,
                        curr.level,
                        prev.level + 1
                    ),
                    format!(
                        "请在\"{}\"和\"{}\"之间添加{}级标题",
                        prev.text,
                        curr.text,
                        prev.level + 1
                    ),
                    Location::heading(curr, self.model.page_of_paragraph(curr.paragraph_index)),
                ));
            }
        }

        issues
    }

    /// 图/表题注编号必须各自严格递增且无跳号
    pub fn check_caption_numbering(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        let figure_captions: Vec<(Location, Option<&str>)> = self
            .model
            .figures
            .iter()
            .map(|f| {
                (
                    Location::figure(f, self.model.page_of_paragraph(f.paragraph_index)),
                    f.caption.as_deref(),
                )
            })
            .collect();
        issues.extend(self.check_numbering_sequence("图", figure_captions));

        let table_captions: Vec<(Location, Option<&str>)> = self
            .model
            .tables
            .iter()
            .map(|t| {
                let page = t
                    .paragraph_index
                    .map(|i| self.model.page_of_paragraph(i))
                    .unwrap_or(1);
                (Location::table(t, page), t.caption.as_deref())
            })
            .collect();
        issues.extend(self.check_numbering_sequence("表", table_captions));

        issues
    }

    fn check_numbering_sequence(
        &self,
        kind: &str,
        captions: Vec<(Location, Option<&str>)>,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        // (前缀段, 末段编号)，如"图2-3" -> (["2"], 3)
        let mut prev: Option<(Vec<u32>, u32)> = None;

        for (location, caption) in captions {
            let caption = match caption {
                Some(c) => c,
                None => continue,
            };
            let number = match parse_caption_number(caption) {
                Some(n) => n,
                None => continue,
            };
            let (prefix, last) = number;

            if let Some((prev_prefix, prev_last)) = &prev {
                let expected_ok = if &prefix == prev_prefix {
                    last == prev_last + 1
                } else {
                    // 前缀变化（进入新章节）时末段编号应重新从1开始
                    last == 1
                };
                if !expected_ok {
                    issues.push(structure_issue(
                        "CAPTION_NUMBER_GAP",
                        format!("{}编号不连续", kind),
                        format!("{}编号不连续：\"{}\"与前一编号存在跳号或乱序", kind, caption),
                        format!("请按出现顺序连续编号{}", kind),
                        location,
                    ));
                }
            }

            prev = Some((prefix, last));
        }

        issues
    }

    /// 检查必要章节是否存在（模糊匹配：去编号前缀、空白与标点后比较）
    pub fn check_required_sections(&self, required: &[String]) -> Vec<Issue> {
        let mut issues = Vec::new();

        let found: Vec<String> = self
            .model
            .headings
            .iter()
            .map(|h| normalize_title(&h.text))
            .filter(|t| !t.is_empty())
            .collect();

        for section in required {
            let target = normalize_title(section);
            let exists = found
                .iter()
                .any(|f| f == &target || f.contains(&target) || target.contains(f.as_str()));
            if !exists {
                issues.push(structure_issue(
                    "REQUIRED_SECTION_MISSING",
                    format!("缺少必要章节：{}", section),
                    format!("文档中未找到必要章节：{}", section),
                    format!("请在文档中添加章节：{}", section),
                    Location::document(),
                ));
            }
        }

        issues
    }

    /// 目录与正文标题的一致性检查
    pub fn check_toc_body_consistency(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        let toc = &self.model.table_of_contents;

        if !toc.exists {
            issues.push(structure_issue(
                "TOC_MISSING",
                "缺少目录",
                "文档中未找到目录".to_string(),
                "请添加目录".to_string(),
                Location::document(),
            ));
            return issues;
        }

        if toc.entries.is_empty() {
            issues.push(structure_issue(
                "TOC_EMPTY",
                "目录为空",
                "目录中没有条目".to_string(),
                "请确保目录包含所有主要章节".to_string(),
                Location::toc("目录".to_string()),
            ));
            return issues;
        }

        let body_titles: Vec<(String, &crate::core::models::Heading)> = self
            .model
            .headings
            .iter()
            .map(|h| (normalize_title(&h.text), h))
            .collect();

        // 检查1：目录条目应在正文中存在，且层级一致
        for entry in &toc.entries {
            let normalized = normalize_title(&entry.title);
            if normalized.is_empty() {
                continue;
            }

            let matched = body_titles
                .iter()
                .find(|(t, _)| t == &normalized)
                .or_else(|| {
                    body_titles
                        .iter()
                        .find(|(t, _)| t.contains(&normalized) || normalized.contains(t.as_str()))
                });

            match matched {
                None => {
                    issues.push(structure_issue(
                        "TOC_ENTRY_NOT_FOUND",
                        "目录条目在正文中不存在",
                        format!("目录中的\"{}\"在正文中未找到对应标题", entry.title),
                        format!("请检查目录，确保\"{}\"在正文中存在对应的标题", entry.title),
                        Location::toc(format!("目录条目：{}", entry.title)),
                    ));
                }
                Some((_, heading)) => {
                    if heading.level != entry.level {
                        issues.push(structure_issue(
                            "TOC_LEVEL_MISMATCH",
                            "目录层级与正文不一致",
                            format!(
                                "目录中的\"{}\"层级({}级)与正文中的层级({}级)不一致",
                                entry.title, entry.level, heading.level
                            ),
                            format!("请检查目录和正文中\"{}\"的层级设置，确保一致", entry.title),
                            Location::heading(
                                heading,
                                self.model.page_of_paragraph(heading.paragraph_index),
                            ),
                        ));
                    }
                }
            }
        }

        // 检查2：正文一级标题应出现在目录中
        let toc_titles: Vec<String> = toc
            .entries
            .iter()
            .map(|e| normalize_title(&e.title))
            .collect();

        for heading in self.model.headings.iter().filter(|h| h.level == 1) {
            let normalized = normalize_title(&heading.text);
            if normalized.is_empty() {
                continue;
            }
            let found = toc_titles.iter().any(|t| {
                t == &normalized || t.contains(&normalized) || normalized.contains(t.as_str())
            });
            if !found {
                issues.push(structure_issue(
                    "HEADING_NOT_IN_TOC",
                    "正文标题未出现在目录中",
                    format!("正文中的一级标题\"{}\"未出现在目录中", heading.text),
                    format!("请在目录中添加\"{}\"", heading.text),
                    Location::heading(
                        heading,
                        self.model.page_of_paragraph(heading.paragraph_index),
                    ),
                ));
            }
        }

        issues
    }
}

fn structure_issue(
    rule_id: &str,
    rule_name: impl Into<String>,
    error_message: String,
    suggestion: String,
    location: Location,
) -> Issue {
    Issue {
        rule_id: rule_id.to_string(),
        rule_name: rule_name.into(),
        category: RuleCategory::Structure,
        severity: Severity::Error,
        source: IssueSource::Structure,
        error_message,
        suggestion,
        locations: vec![location],
        fix_action: None,
        fix_params: None,
    }
}

/// 题注编号解析："图2-3 xxx" -> (["2"], 3)
fn parse_caption_number(caption: &str) -> Option<(Vec<u32>, u32)> {
    let captures = CAPTION_NUMBER_RE.captures(caption.trim())?;
    let number_str = captures.get(1)?.as_str();
    let parts: Vec<u32> = number_str
        .split(['-', '－', '.', '．'])
        .filter_map(|p| p.parse::<u32>().ok())
        .collect();
    let (last, prefix) = parts.split_last()?;
    Some((prefix.to_vec(), *last))
}

/// 标题归一化：去掉编号前缀、空白与常见标点
fn normalize_title(title: &str) -> String {
    let mut normalized = title.trim().to_string();
    normalized = PREFIX_CN_NUM_RE.replace(&normalized, "").to_string();
    normalized = PREFIX_NUM_RE.replace(&normalized, "").to_string();
    normalized = PREFIX_PAREN_CN_RE.replace(&normalized, "").to_string();
    normalized = PREFIX_PAREN_NUM_RE.replace(&normalized, "").to_string();
    normalized = WHITESPACE_RE.replace_all(&normalized, "").to_string();
    normalized = PUNCT_RE.replace_all(&normalized, "").to_string();
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::docx::DocxParser;
    use crate::core::testutil::{paragraph, styled_paragraph, DocxBuilder};

    fn model_with_heading_jump() -> DocumentModel {
        let bytes = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(styled_paragraph("第一章 绪论", "Heading1"))
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph(styled_paragraph("1.1.1 细节", "Heading3"))
            .build();
        DocxParser::parse(&bytes).unwrap()
    }

    #[test]
    fn test_heading_level_jump_exactly_one_issue() {
        let model = model_with_heading_jump();
        let issues = StructureChecker::new(&model).check_heading_hierarchy();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "HEADING_LEVEL_JUMP");
        assert_eq!(issues[0].category, RuleCategory::Structure);
        assert!(issues[0].error_message.contains("1级跳转到3级"));
    }

    #[test]
    fn test_return_to_level_one_is_not_a_jump() {
        let bytes = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(styled_paragraph("第一章", "Heading1"))
            .add_paragraph(styled_paragraph("1.1 背景", "Heading2"))
            .add_paragraph(styled_paragraph("第二章", "Heading1"))
            .build();
        let model = DocxParser::parse(&bytes).unwrap();

        let issues = StructureChecker::new(&model).check_heading_hierarchy();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_required_sections_fuzzy_match() {
        let bytes = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(styled_paragraph("一、项目概述", "Heading1"))
            .add_paragraph(paragraph("正文内容", None))
            .build();
        let model = DocxParser::parse(&bytes).unwrap();
        let checker = StructureChecker::new(&model);

        // "项目概述"能匹配到"一、项目概述"
        let issues = checker.check_required_sections(&["项目概述".to_string()]);
        assert!(issues.is_empty());

        let issues = checker.check_required_sections(&["参考文献".to_string()]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "REQUIRED_SECTION_MISSING");
    }

    #[test]
    fn test_figure_caption_number_gap() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph("<w:p><w:r><w:drawing/></w:r></w:p>".to_string())
            .add_paragraph(paragraph("图1 第一张图", None))
            .add_paragraph("<w:p><w:r><w:drawing/></w:r></w:p>".to_string())
            .add_paragraph(paragraph("图3 跳号的图", None))
            .build();
        let model = DocxParser::parse(&bytes).unwrap();

        let issues = StructureChecker::new(&model).check_caption_numbering();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "CAPTION_NUMBER_GAP");
    }

    #[test]
    fn test_chapter_scoped_caption_numbering_ok() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph("<w:p><w:r><w:drawing/></w:r></w:p>".to_string())
            .add_paragraph(paragraph("图1-1 第一章的图", None))
            .add_paragraph(paragraph("过渡段落", None))
            .add_paragraph(paragraph("图2-1 第二章的图", None))
            .add_paragraph("<w:p><w:r><w:drawing/></w:r></w:p>".to_string())
            .build();
        let model = DocxParser::parse(&bytes).unwrap();

        // 前缀变化（换章）后从1重新编号是合法的
        let issues = StructureChecker::new(&model).check_caption_numbering();
        assert!(issues.is_empty());
    }

    #[test]
    fn test_toc_missing() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("没有目录的文档", None))
            .build();
        let model = DocxParser::parse(&bytes).unwrap();

        let issues = StructureChecker::new(&model).check_toc_body_consistency();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_id, "TOC_MISSING");
    }

    #[test]
    fn test_toc_entry_not_in_body() {
        let bytes = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(paragraph("目录", None))
            .add_paragraph(paragraph("第一章 绪论\t1", None))
            .add_paragraph(paragraph("第九章 不存在\t9", None))
            .add_paragraph(styled_paragraph("第一章 绪论", "Heading1"))
            .build();
        let model = DocxParser::parse(&bytes).unwrap();

        let issues = StructureChecker::new(&model).check_toc_body_consistency();
        let not_found: Vec<_> = issues
            .iter()
            .filter(|i| i.rule_id == "TOC_ENTRY_NOT_FOUND")
            .collect();
        assert_eq!(not_found.len(), 1);
        assert!(not_found[0].error_message.contains("第九章 不存在"));
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("一、项目概述"), "项目概述");
        assert_eq!(normalize_title("1. 研究背景"), "研究背景");
        assert_eq!(normalize_title("（一）总体要求"), "总体要求");
        assert_eq!(normalize_title("项目 概述"), "项目概述");
    }
}
