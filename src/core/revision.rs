//! 修订合成模块
//!
//! 把CheckResult中可机械应用的修复写回原始docx包，全部以
//! 审阅修订（w:ins/w:del/w:pPrChange/w:rPrChange/w:sectPrChange）的
//! 形式落盘，原始内容保持可审阅、可拒绝。
//!
//! 关键约束：
//! - 编辑写入原始XML树而不是抽象模型，保留与修复无关的样式与元数据
//! - 编辑按稳定顺序应用，同一CheckResult重复合成输出一致（时间戳除外）
//! - 冲突的编辑按优先序跳过并记为未修订，而不是破坏文档
//! - 输出必须通过完整性校验，否则回退到最近一次有效状态

use crate::core::docx::DocxParser;
use crate::core::errors::CheckError;
use crate::core::models::{
    Alignment, CheckResult, DocumentModel, EditOp, EditPrecedence, FixAction, Issue, PlannedEdit,
    RevisedDocument, RevisionManifest, RevisionPlan, RevisionPolicy, RevisionRecord,
    UnrevisedRecord,
};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write as IoWrite};

const SETTINGS_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn mm_to_twips(mm: f64) -> i64 {
    (mm / 25.4 * 1440.0).round() as i64
}

fn pt_to_half(size_pt: f64) -> i64 {
    (size_pt * 2.0).round() as i64
}

/// 修订过程共享的作者/时间/编号上下文
struct RevCtx {
    author: String,
    date: String,
    next_id: u32,
}

impl RevCtx {
    fn next_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    /// 构造带修订元数据的包装元素（w:ins/w:del等）
    fn wrapper(&mut self, name: &str) -> BytesStart<'static> {
        let mut e = BytesStart::new(name.to_string());
        let id = self.next_id();
        e.push_attribute(("w:id", id.as_str()));
        e.push_attribute(("w:author", self.author.as_str()));
        e.push_attribute(("w:date", self.date.as_str()));
        e
    }
}

/// 修订合成器
pub struct RevisionSynthesizer {
    policy: RevisionPolicy,
}

impl RevisionSynthesizer {
    pub fn new(policy: RevisionPolicy) -> Self {
        Self { policy }
    }

    /// 基于检查结果对原始文档合成修订版
    pub fn synthesize(
        &self,
        original: &[u8],
        result: &CheckResult,
    ) -> Result<RevisedDocument, CheckError> {
        // 重新打开原始包；打不开属于致命错误
        let model = DocxParser::parse(original)?;

        let timestamp = self.policy.timestamp.unwrap_or_else(chrono::Utc::now);
        let date = timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let plan = self.build_plan(result, &model);
        let mut unrevised = plan.unrevised.clone();
        let (ordered, conflicted) = self.order_and_resolve(plan.edits, &model);
        unrevised.extend(conflicted);

        let mut warnings = Vec::new();

        let (final_bytes, applied) = match apply_edits(original, &ordered, &self.policy.author, &date)
        {
            Ok((bytes, applied)) if DocxParser::parse(&bytes).is_ok() => (bytes, applied),
            _ => {
                // 整体应用失败：回退到逐项应用，跳过破坏文档的编辑
                tracing::warn!("修订结果未通过完整性校验，回退到逐项应用");
                warnings.push("修订结果未通过完整性校验，已回退到逐项应用模式".to_string());
                self.apply_incrementally(original, &ordered, &date, &mut unrevised)?
            }
        };

        let mut revised = Vec::new();
        for edit in &ordered {
            if applied.contains(&edit.order) {
                revised.push(RevisionRecord {
                    rule_id: edit.rule_id.clone(),
                    location_description: edit.location_description.clone(),
                });
            } else if !unrevised.iter().any(|u| {
                u.rule_id == edit.rule_id && u.location_description == edit.location_description
            }) {
                unrevised.push(UnrevisedRecord {
                    rule_id: edit.rule_id.clone(),
                    location_description: edit.location_description.clone(),
                    reason: "未能在文档中定位修改点".to_string(),
                });
            }
        }

        tracing::info!(
            "修订合成完成：{}处已修订，{}处未修订",
            revised.len(),
            unrevised.len()
        );

        Ok(RevisedDocument {
            bytes: final_bytes,
            manifest: RevisionManifest {
                revised,
                unrevised,
                warnings,
                author: self.policy.author.clone(),
                revised_at: timestamp,
            },
        })
    }

    /// 逐项应用：每应用一条就校验一次，保留最近一次有效字节
    fn apply_incrementally(
        &self,
        original: &[u8],
        ordered: &[PlannedEdit],
        date: &str,
        unrevised: &mut Vec<UnrevisedRecord>,
    ) -> Result<(Vec<u8>, BTreeSet<usize>), CheckError> {
        let mut accepted: Vec<PlannedEdit> = Vec::new();
        let mut valid_bytes = original.to_vec();
        let mut valid_applied = BTreeSet::new();

        for edit in ordered {
            let mut trial: Vec<PlannedEdit> = accepted.clone();
            trial.push(edit.clone());

            match apply_edits(original, &trial, &self.policy.author, date) {
                Ok((bytes, applied)) if DocxParser::parse(&bytes).is_ok() => {
                    accepted = trial;
                    valid_bytes = bytes;
                    valid_applied = applied;
                }
                _ => {
                    unrevised.push(UnrevisedRecord {
                        rule_id: edit.rule_id.clone(),
                        location_description: edit.location_description.clone(),
                        reason: "该修订导致文档校验失败，已跳过".to_string(),
                    });
                }
            }
        }

        Ok((valid_bytes, valid_applied))
    }

    /// 把问题映射为具体编辑计划；无法机械修复的直接记为未修订
    pub fn build_plan(&self, result: &CheckResult, model: &DocumentModel) -> RevisionPlan {
        let mut plan = RevisionPlan::default();
        let mut order = 0usize;

        for issue in &result.issues {
            let action = match issue.fix_action {
                Some(a) => a,
                None => {
                    plan.unrevised.push(UnrevisedRecord {
                        rule_id: issue.rule_id.clone(),
                        location_description: first_location(issue),
                        reason: "无自动修复动作".to_string(),
                    });
                    continue;
                }
            };

            match action {
                FixAction::SetPageMargin => {
                    let p = issue.fix_params.as_ref();
                    plan.edits.push(PlannedEdit {
                        rule_id: issue.rule_id.clone(),
                        precedence: EditPrecedence::Structural,
                        op: EditOp::SetPageMargins {
                            top_mm: param_f64(p, "top_mm", 25.4),
                            bottom_mm: param_f64(p, "bottom_mm", 25.4),
                            left_mm: param_f64(p, "left_mm", 31.8),
                            right_mm: param_f64(p, "right_mm", 31.8),
                        },
                        order,
                        location_description: "文档整体设置".to_string(),
                    });
                    order += 1;
                }
                FixAction::SetParagraphIndent => {
                    let chars = param_f64(
                        issue.fix_params.as_ref(),
                        "first_line_indent_chars",
                        2.0,
                    );
                    for loc in &issue.locations {
                        if let Some(paragraph_index) = loc.paragraph_index {
                            plan.edits.push(PlannedEdit {
                                rule_id: issue.rule_id.clone(),
                                precedence: EditPrecedence::Structural,
                                op: EditOp::SetFirstLineIndent {
                                    paragraph_index,
                                    chars,
                                },
                                order,
                                location_description: loc.description.clone(),
                            });
                            order += 1;
                        }
                    }
                }
                FixAction::SetHeadingStyle => {
                    self.plan_heading_style(issue, model, &mut plan, &mut order);
                }
                FixAction::SetRunStyle => {
                    let p = issue.fix_params.as_ref();
                    let font = param_str(p, "chinese_font", "宋体");
                    let size_pt = param_f64(p, "size_pt", 12.0);
                    let bold = p.and_then(|v| v.get("bold")).and_then(|v| v.as_bool());
                    for loc in &issue.locations {
                        if let Some(paragraph_index) = loc.paragraph_index {
                            plan.edits.push(PlannedEdit {
                                rule_id: issue.rule_id.clone(),
                                precedence: EditPrecedence::Structural,
                                op: EditOp::SetRunFont {
                                    paragraph_index,
                                    font: font.clone(),
                                    size_pt,
                                    bold,
                                    alignment: None,
                                },
                                order,
                                location_description: loc.description.clone(),
                            });
                            order += 1;
                        }
                    }
                }
                FixAction::ReplaceText => {
                    self.plan_text_replacement(
                        issue, model, "original", "correction", &mut plan, &mut order,
                    );
                }
                FixAction::ReplaceRef => {
                    self.plan_text_replacement(
                        issue,
                        model,
                        "original_ref",
                        "suggested_ref",
                        &mut plan,
                        &mut order,
                    );
                }
            }
        }

        plan
    }

    fn plan_heading_style(
        &self,
        issue: &Issue,
        model: &DocumentModel,
        plan: &mut RevisionPlan,
        order: &mut usize,
    ) {
        for loc in &issue.locations {
            let paragraph_index = match loc.paragraph_index {
                Some(p) => p,
                None => continue,
            };
            // 标题层级决定取哪一组修复参数
            let level = model
                .headings
                .iter()
                .find(|h| h.paragraph_index == paragraph_index)
                .map(|h| h.level)
                .unwrap_or(1);
            let level_params = issue
                .fix_params
                .as_ref()
                .and_then(|p| p.get(format!("level{}", level)));

            let level_params = match level_params {
                Some(p) => p,
                None => {
                    plan.unrevised.push(UnrevisedRecord {
                        rule_id: issue.rule_id.clone(),
                        location_description: loc.description.clone(),
                        reason: format!("缺少{}级标题的修复参数", level),
                    });
                    continue;
                }
            };

            plan.edits.push(PlannedEdit {
                rule_id: issue.rule_id.clone(),
                precedence: EditPrecedence::Structural,
                op: EditOp::SetRunFont {
                    paragraph_index,
                    font: param_str(Some(level_params), "font", "黑体"),
                    size_pt: param_f64(Some(level_params), "size_pt", 14.0),
                    bold: level_params.get("bold").and_then(|v| v.as_bool()),
                    alignment: level_params
                        .get("alignment")
                        .and_then(|v| v.as_str())
                        .map(parse_alignment_str),
                },
                order: *order,
                location_description: loc.description.clone(),
            });
            *order += 1;
        }
    }

    fn plan_text_replacement(
        &self,
        issue: &Issue,
        model: &DocumentModel,
        original_key: &str,
        replacement_key: &str,
        plan: &mut RevisionPlan,
        order: &mut usize,
    ) {
        let params = issue.fix_params.as_ref();
        let original = params
            .and_then(|p| p.get(original_key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let replacement = params
            .and_then(|p| p.get(replacement_key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let paragraph_index = params
            .and_then(|p| p.get("paragraph_index"))
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .or_else(|| issue.locations.first().and_then(|l| l.paragraph_index));

        let location_description = first_location(issue);

        let (original, replacement, paragraph_index) =
            match (original.is_empty(), replacement.is_empty(), paragraph_index) {
                (false, false, Some(p)) => (original, replacement, p),
                _ => {
                    plan.unrevised.push(UnrevisedRecord {
                        rule_id: issue.rule_id.clone(),
                        location_description,
                        reason: "修复参数缺失".to_string(),
                    });
                    return;
                }
            };

        // 计划阶段先在模型里验证原文可定位，定位不了的不进计划
        let found = model
            .paragraphs
            .get(paragraph_index)
            .map(|p| p.text.contains(&original))
            .unwrap_or(false);
        if !found {
            plan.unrevised.push(UnrevisedRecord {
                rule_id: issue.rule_id.clone(),
                location_description,
                reason: "原文未在目标段落中找到".to_string(),
            });
            return;
        }

        plan.edits.push(PlannedEdit {
            rule_id: issue.rule_id.clone(),
            precedence: EditPrecedence::Textual,
            op: EditOp::ReplaceText {
                paragraph_index,
                original,
                replacement,
            },
            order: *order,
            location_description,
        });
        *order += 1;
    }

    /// 排序并消解冲突：优先序 → 位置 → 提交顺序，后序冲突编辑跳过
    fn order_and_resolve(
        &self,
        mut edits: Vec<PlannedEdit>,
        model: &DocumentModel,
    ) -> (Vec<PlannedEdit>, Vec<UnrevisedRecord>) {
        if self.policy.deterministic_first {
            edits.sort_by_key(|e| (e.precedence, sort_paragraph(e), e.order));
        } else {
            edits.sort_by_key(|e| (sort_paragraph(e), e.order));
        }

        let mut accepted: Vec<PlannedEdit> = Vec::new();
        let mut unrevised = Vec::new();

        'outer: for edit in edits {
            for prior in &accepted {
                if edits_conflict(prior, &edit, model) {
                    unrevised.push(UnrevisedRecord {
                        rule_id: edit.rule_id.clone(),
                        location_description: edit.location_description.clone(),
                        reason: format!("与修订（{}）范围重叠，已跳过", prior.rule_id),
                    });
                    continue 'outer;
                }
            }
            accepted.push(edit);
        }

        (accepted, unrevised)
    }
}

fn first_location(issue: &Issue) -> String {
    issue
        .locations
        .first()
        .map(|l| l.description.clone())
        .unwrap_or_default()
}

fn sort_paragraph(edit: &PlannedEdit) -> i64 {
    edit.op
        .paragraph_index()
        .map(|i| i as i64)
        .unwrap_or(-1)
}

fn param_f64(params: Option<&Value>, key: &str, default: f64) -> f64 {
    params
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_f64())
        .unwrap_or(default)
}

fn param_str(params: Option<&Value>, key: &str, default: &str) -> String {
    params
        .and_then(|p| p.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

fn parse_alignment_str(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" => Alignment::Right,
        "justify" | "both" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

/// 两个编辑是否落在重叠范围上
///
/// 文本替换的粒度是run：同一run内的两处替换视为重叠；
/// 文本替换与run属性修改落在同一段落时也视为重叠（都会改写run节点）。
fn edits_conflict(a: &PlannedEdit, b: &PlannedEdit, model: &DocumentModel) -> bool {
    if matches!(
        (&a.op, &b.op),
        (EditOp::SetPageMargins { .. }, EditOp::SetPageMargins { .. })
    ) {
        return true;
    }

    let (pa, pb) = (a.op.paragraph_index(), b.op.paragraph_index());
    let p = match (pa, pb) {
        (Some(x), Some(y)) if x == y => x,
        _ => return false,
    };

    match (&a.op, &b.op) {
        (
            EditOp::ReplaceText { original: o1, .. },
            EditOp::ReplaceText { original: o2, .. },
        ) => match (find_run(model, p, o1), find_run(model, p, o2)) {
            (Some(r1), Some(r2)) => r1 == r2,
            // 定位不了的一律视为重叠，宁可跳过也不冒险
            _ => true,
        },
        (EditOp::SetFirstLineIndent { .. }, EditOp::SetFirstLineIndent { .. }) => true,
        (EditOp::SetRunFont { .. }, EditOp::SetRunFont { .. }) => true,
        (EditOp::SetRunFont { .. }, EditOp::ReplaceText { .. })
        | (EditOp::ReplaceText { .. }, EditOp::SetRunFont { .. }) => true,
        _ => false,
    }
}

/// 在段落内定位包含指定文本的run
fn find_run(model: &DocumentModel, paragraph_index: usize, text: &str) -> Option<usize> {
    model
        .runs
        .iter()
        .find(|r| r.paragraph_index == paragraph_index && r.text.contains(text))
        .map(|r| r.run_index)
}

// ---- XML改写 ----

/// 把编辑应用到原始包，返回新包字节与实际落盘的编辑order集合
fn apply_edits(
    original: &[u8],
    edits: &[PlannedEdit],
    author: &str,
    date: &str,
) -> Result<(Vec<u8>, BTreeSet<usize>), CheckError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(original))
        .map_err(|e| CheckError::MalformedDocument(format!("zip容器损坏: {}", e)))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")?.ok_or_else(|| {
        CheckError::UnsupportedFormat("缺少word/document.xml，不是Word文档".to_string())
    })?;
    let settings_xml = read_entry(&mut archive, "word/settings.xml")?;
    drop(archive);

    let mut ctx = RevCtx {
        author: author.to_string(),
        date: date.to_string(),
        next_id: 1,
    };

    let (new_document, applied) = rewrite_document(&document_xml, edits, &mut ctx)?;
    let new_settings = ensure_track_revisions(settings_xml.as_deref())?;

    let bytes = repack(
        original,
        &[
            ("word/document.xml", new_document),
            ("word/settings.xml", new_settings),
        ],
    )?;

    Ok((bytes, applied))
}

fn read_entry(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, CheckError> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| CheckError::MalformedDocument(format!("读取{}失败: {}", name, e)))?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(CheckError::MalformedDocument(format!(
            "读取{}失败: {}",
            name, e
        ))),
    }
}

/// 重打包：逐条目复制，指定条目替换内容，缺失的替换条目补写
fn repack(original: &[u8], replacements: &[(&str, Vec<u8>)]) -> Result<Vec<u8>, CheckError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(original))
        .map_err(|e| CheckError::MalformedDocument(format!("zip容器损坏: {}", e)))?;
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut written: BTreeSet<String> = BTreeSet::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| CheckError::MalformedDocument(format!("zip条目读取失败: {}", e)))?;
        let name = file.name().to_string();

        writer
            .start_file(name.clone(), options)
            .map_err(|e| CheckError::RevisionIntegrity(format!("zip写出失败: {}", e)))?;

        if let Some((_, content)) = replacements.iter().find(|(n, _)| *n == name) {
            writer
                .write_all(content)
                .map_err(|e| CheckError::RevisionIntegrity(format!("zip写出失败: {}", e)))?;
        } else {
            let mut content = Vec::new();
            file.read_to_end(&mut content)
                .map_err(|e| CheckError::MalformedDocument(format!("zip条目读取失败: {}", e)))?;
            writer
                .write_all(&content)
                .map_err(|e| CheckError::RevisionIntegrity(format!("zip写出失败: {}", e)))?;
        }
        written.insert(name);
    }

    for (name, content) in replacements {
        if !written.contains(*name) {
            writer
                .start_file(name.to_string(), options)
                .map_err(|e| CheckError::RevisionIntegrity(format!("zip写出失败: {}", e)))?;
            writer
                .write_all(content)
                .map_err(|e| CheckError::RevisionIntegrity(format!("zip写出失败: {}", e)))?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| CheckError::RevisionIntegrity(format!("zip收尾失败: {}", e)))?;
    Ok(cursor.into_inner())
}

fn write_err(e: quick_xml::Error) -> CheckError {
    CheckError::RevisionIntegrity(format!("XML写出失败: {}", e))
}

fn read_err(e: quick_xml::Error) -> CheckError {
    CheckError::MalformedDocument(format!("document.xml解析失败: {}", e))
}

/// 单遍扫描document.xml：目标段落整体缓冲后改写，其余事件原样透传
fn rewrite_document(
    xml: &[u8],
    edits: &[PlannedEdit],
    ctx: &mut RevCtx,
) -> Result<(Vec<u8>, BTreeSet<usize>), CheckError> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    let mut applied: BTreeSet<usize> = BTreeSet::new();
    let mut para_index = 0usize;
    let mut table_depth = 0usize;

    let margin_edit = edits
        .iter()
        .find(|e| matches!(e.op, EditOp::SetPageMargins { .. }));
    let mut margin_done = false;
    let mut sectpr_change_pending = false;

    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).map_err(read_err)?;
        match ev {
            Event::Eof => break,
            Event::Start(e) if e.name().as_ref() == b"w:p" && table_depth == 0 => {
                let current = para_index;
                para_index += 1;

                let para_edits: Vec<&PlannedEdit> = edits
                    .iter()
                    .filter(|ed| ed.op.paragraph_index() == Some(current))
                    .collect();

                if para_edits.is_empty() {
                    writer.write_event(Event::Start(e)).map_err(write_err)?;
                } else {
                    let mut events: Vec<Event<'static>> = vec![Event::Start(e.into_owned())];
                    collect_paragraph(&mut reader, &mut events)?;
                    let transformed = transform_paragraph(events, &para_edits, ctx, &mut applied);
                    for tev in transformed {
                        writer.write_event(tev).map_err(write_err)?;
                    }
                }
            }
            Event::Start(e) => {
                if e.name().as_ref() == b"w:tbl" {
                    table_depth += 1;
                }
                writer.write_event(Event::Start(e)).map_err(write_err)?;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:pgMar" && !margin_done => {
                if let Some(edit) = margin_edit {
                    if let EditOp::SetPageMargins {
                        top_mm,
                        bottom_mm,
                        left_mm,
                        right_mm,
                    } = edit.op
                    {
                        let rewritten =
                            rewrite_pgmar(&e, top_mm, bottom_mm, left_mm, right_mm);
                        writer
                            .write_event(Event::Empty(rewritten))
                            .map_err(write_err)?;
                        margin_done = true;
                        sectpr_change_pending = true;
                        applied.insert(edit.order);
                        continue;
                    }
                }
                writer.write_event(Event::Empty(e)).map_err(write_err)?;
            }
            Event::End(e) => {
                if e.name().as_ref() == b"w:tbl" {
                    table_depth = table_depth.saturating_sub(1);
                }
                if e.name().as_ref() == b"w:sectPr" && sectpr_change_pending {
                    // 页面设置修订标记（sectPrChange）挂在sectPr末尾
                    sectpr_change_pending = false;
                    writer
                        .write_event(Event::Start(ctx.wrapper("w:sectPrChange")))
                        .map_err(write_err)?;
                    writer
                        .write_event(Event::Empty(BytesStart::new("w:sectPr")))
                        .map_err(write_err)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("w:sectPrChange")))
                        .map_err(write_err)?;
                }
                writer.write_event(Event::End(e)).map_err(write_err)?;
            }
            other => writer.write_event(other).map_err(write_err)?,
        }
    }

    Ok((writer.into_inner().into_inner(), applied))
}

/// 缓冲一个段落的全部事件（含结束标签）
fn collect_paragraph(
    reader: &mut Reader<&[u8]>,
    events: &mut Vec<Event<'static>>,
) -> Result<(), CheckError> {
    let mut depth = 1usize;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let ev = reader.read_event_into(&mut buf).map_err(read_err)?;
        match &ev {
            Event::Start(e) if e.name().as_ref() == b"w:p" => depth += 1,
            Event::End(e) if e.name().as_ref() == b"w:p" => depth -= 1,
            Event::Eof => {
                return Err(CheckError::MalformedDocument("段落标签未闭合".to_string()))
            }
            _ => {}
        }
        events.push(ev.into_owned());
        if depth == 0 {
            return Ok(());
        }
    }
}

fn rewrite_pgmar(
    e: &BytesStart,
    top_mm: f64,
    bottom_mm: f64,
    left_mm: f64,
    right_mm: f64,
) -> BytesStart<'static> {
    let mut out = BytesStart::new("w:pgMar");
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = match key.as_str() {
            "w:top" => mm_to_twips(top_mm).to_string(),
            "w:bottom" => mm_to_twips(bottom_mm).to_string(),
            "w:left" => mm_to_twips(left_mm).to_string(),
            "w:right" => mm_to_twips(right_mm).to_string(),
            _ => attr
                .unescape_value()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        };
        out.push_attribute((key.as_str(), value.as_str()));
    }
    out
}

/// 对缓冲的段落事件应用全部编辑
fn transform_paragraph(
    mut events: Vec<Event<'static>>,
    edits: &[&PlannedEdit],
    ctx: &mut RevCtx,
    applied: &mut BTreeSet<usize>,
) -> Vec<Event<'static>> {
    for edit in edits {
        match &edit.op {
            EditOp::ReplaceText {
                original,
                replacement,
                ..
            } => {
                if apply_replace_text(&mut events, original, replacement, ctx) {
                    applied.insert(edit.order);
                }
            }
            EditOp::SetRunFont {
                font,
                size_pt,
                bold,
                alignment,
                ..
            } => {
                let mut touched = apply_run_font(&mut events, font, *size_pt, *bold, ctx);
                if let Some(align) = alignment {
                    touched |= apply_ppr_edit(&mut events, &PprEdit::Alignment(*align), ctx);
                }
                if touched {
                    applied.insert(edit.order);
                }
            }
            EditOp::SetFirstLineIndent { chars, .. } => {
                if apply_ppr_edit(&mut events, &PprEdit::FirstLineChars(*chars), ctx) {
                    applied.insert(edit.order);
                }
            }
            EditOp::SetPageMargins { .. } => {}
        }
    }
    events
}

fn is_start(ev: &Event, name: &[u8]) -> bool {
    matches!(ev, Event::Start(e) if e.name().as_ref() == name)
}

fn is_empty(ev: &Event, name: &[u8]) -> bool {
    matches!(ev, Event::Empty(e) if e.name().as_ref() == name)
}

fn is_end(ev: &Event, name: &[u8]) -> bool {
    matches!(ev, Event::End(e) if e.name().as_ref() == name)
}

/// 找出段落内处于修订包装之外的run段（起止索引，含端点）
fn run_segments(events: &[Event<'static>]) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut wrapper_depth = 0usize;
    let mut i = 0;

    while i < events.len() {
        if is_start(&events[i], b"w:ins") || is_start(&events[i], b"w:del") {
            wrapper_depth += 1;
        } else if is_end(&events[i], b"w:ins") || is_end(&events[i], b"w:del") {
            wrapper_depth = wrapper_depth.saturating_sub(1);
        } else if wrapper_depth == 0 && is_start(&events[i], b"w:r") {
            let mut j = i + 1;
            while j < events.len() && !is_end(&events[j], b"w:r") {
                j += 1;
            }
            if j < events.len() {
                segments.push((i, j));
                i = j;
            }
        }
        i += 1;
    }

    segments
}

/// 取run段内w:t的文本
fn run_text(segment: &[Event<'static>]) -> String {
    let mut text = String::new();
    let mut in_t = false;

    for ev in segment {
        match ev {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_t = true,
            Event::End(e) if e.name().as_ref() == b"w:t" => in_t = false,
            Event::Text(t) if in_t => {
                if let Ok(s) = t.unescape() {
                    text.push_str(&s);
                }
            }
            _ => {}
        }
    }

    text
}

/// 克隆run段内的rPr事件（含起止标签）
fn extract_rpr(segment: &[Event<'static>]) -> Vec<Event<'static>> {
    for (i, ev) in segment.iter().enumerate() {
        if is_empty(ev, b"w:rPr") {
            return vec![ev.clone()];
        }
        if is_start(ev, b"w:rPr") {
            let mut j = i + 1;
            while j < segment.len() && !is_end(&segment[j], b"w:rPr") {
                j += 1;
            }
            if j < segment.len() {
                return segment[i..=j].to_vec();
            }
        }
    }
    Vec::new()
}

/// 文本替换：把包含原文的run整体替换为 w:del(原文) + w:ins(修正文)
fn apply_replace_text(
    events: &mut Vec<Event<'static>>,
    original: &str,
    replacement: &str,
    ctx: &mut RevCtx,
) -> bool {
    let segments = run_segments(events);

    for (start, end) in segments {
        let text = run_text(&events[start..=end]);
        if !text.contains(original) {
            continue;
        }

        let rpr = extract_rpr(&events[start..=end]);
        let new_text = text.replace(original, replacement);

        let mut replaced: Vec<Event<'static>> = Vec::new();

        // 旧文本标记为删除（w:delText）
        replaced.push(Event::Start(ctx.wrapper("w:del")));
        replaced.push(Event::Start(BytesStart::new("w:r")));
        replaced.extend(rpr.iter().cloned());
        let mut del_t = BytesStart::new("w:delText");
        del_t.push_attribute(("xml:space", "preserve"));
        replaced.push(Event::Start(del_t));
        replaced.push(Event::Text(BytesText::new(&text).into_owned()));
        replaced.push(Event::End(BytesEnd::new("w:delText")));
        replaced.push(Event::End(BytesEnd::new("w:r")));
        replaced.push(Event::End(BytesEnd::new("w:del")));

        // 新文本标记为插入
        replaced.push(Event::Start(ctx.wrapper("w:ins")));
        replaced.push(Event::Start(BytesStart::new("w:r")));
        replaced.extend(rpr.iter().cloned());
        let mut ins_t = BytesStart::new("w:t");
        ins_t.push_attribute(("xml:space", "preserve"));
        replaced.push(Event::Start(ins_t));
        replaced.push(Event::Text(BytesText::new(&new_text).into_owned()));
        replaced.push(Event::End(BytesEnd::new("w:t")));
        replaced.push(Event::End(BytesEnd::new("w:r")));
        replaced.push(Event::End(BytesEnd::new("w:ins")));

        events.splice(start..=end, replaced);
        return true;
    }

    false
}

/// run字体改写：重建rPr（保留未覆盖的属性），附rPrChange修订标记
fn apply_run_font(
    events: &mut Vec<Event<'static>>,
    font: &str,
    size_pt: f64,
    bold: Option<bool>,
    ctx: &mut RevCtx,
) -> bool {
    let segments = run_segments(events);
    if segments.is_empty() {
        return false;
    }

    // 逆序处理，避免splice移动后续段的索引
    for (start, end) in segments.into_iter().rev() {
        let segment = &events[start..=end];

        // 定位现有rPr
        let mut rpr_span: Option<(usize, usize, Vec<Event<'static>>)> = None;
        for (i, ev) in segment.iter().enumerate() {
            if is_empty(ev, b"w:rPr") {
                rpr_span = Some((start + i, start + i, Vec::new()));
                break;
            }
            if is_start(ev, b"w:rPr") {
                let mut j = i + 1;
                while j < segment.len() && !is_end(&segment[j], b"w:rPr") {
                    j += 1;
                }
                if j < segment.len() {
                    rpr_span = Some((start + i, start + j, segment[i + 1..j].to_vec()));
                }
                break;
            }
        }

        let (splice_start, splice_end, children) = match rpr_span {
            Some(span) => span,
            // 没有rPr：在run起始标签后插入全新的rPr
            None => (start + 1, start, Vec::new()),
        };

        let new_rpr = rebuild_rpr(children, font, size_pt, bold, ctx);

        if splice_end >= splice_start {
            events.splice(splice_start..=splice_end, new_rpr);
        } else {
            events.splice(splice_start..splice_start, new_rpr);
        }
    }

    true
}

/// 重建rPr：字体/字号/加粗用新值，其余原有属性保留，末尾附rPrChange
fn rebuild_rpr(
    children: Vec<Event<'static>>,
    font: &str,
    size_pt: f64,
    bold: Option<bool>,
    ctx: &mut RevCtx,
) -> Vec<Event<'static>> {
    let mut out: Vec<Event<'static>> = vec![Event::Start(BytesStart::new("w:rPr"))];

    let mut rfonts = BytesStart::new("w:rFonts");
    rfonts.push_attribute(("w:ascii", font));
    rfonts.push_attribute(("w:hAnsi", font));
    rfonts.push_attribute(("w:eastAsia", font));
    out.push(Event::Empty(rfonts));

    if let Some(bold) = bold {
        if bold {
            out.push(Event::Empty(BytesStart::new("w:b")));
        } else {
            let mut b = BytesStart::new("w:b");
            b.push_attribute(("w:val", "false"));
            out.push(Event::Empty(b));
        }
    }

    // 字号同时写sz与szCs，中文文本用的是szCs
    let half = pt_to_half(size_pt).to_string();
    let mut sz = BytesStart::new("w:sz");
    sz.push_attribute(("w:val", half.as_str()));
    out.push(Event::Empty(sz));
    let mut szcs = BytesStart::new("w:szCs");
    szcs.push_attribute(("w:val", half.as_str()));
    out.push(Event::Empty(szcs));

    // 保留未被覆盖的原有子元素
    out.extend(filter_out_elements(
        children,
        &[b"w:rFonts", b"w:sz", b"w:szCs", b"w:b", b"w:rPrChange"],
    ));

    // 修订标记：rPrChange携带空的旧状态
    out.push(Event::Start(ctx.wrapper("w:rPrChange")));
    out.push(Event::Empty(BytesStart::new("w:rPr")));
    out.push(Event::End(BytesEnd::new("w:rPrChange")));

    out.push(Event::End(BytesEnd::new("w:rPr")));
    out
}

/// 过滤掉指定名称的元素（含其整个子树）
fn filter_out_elements(
    events: Vec<Event<'static>>,
    names: &[&[u8]],
) -> Vec<Event<'static>> {
    let mut out = Vec::new();
    let mut skip_depth = 0usize;

    for ev in events {
        if skip_depth > 0 {
            match &ev {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                _ => {}
            }
            continue;
        }
        match &ev {
            Event::Empty(e) if names.contains(&e.name().as_ref()) => continue,
            Event::Start(e) if names.contains(&e.name().as_ref()) => {
                skip_depth = 1;
                continue;
            }
            _ => out.push(ev),
        }
    }

    out
}

/// 段落属性编辑种类
enum PprEdit {
    FirstLineChars(f64),
    Alignment(Alignment),
}

/// 段落属性改写：定位或创建pPr，改写w:ind/w:jc，附pPrChange修订标记
fn apply_ppr_edit(events: &mut Vec<Event<'static>>, edit: &PprEdit, ctx: &mut RevCtx) -> bool {
    if events.len() < 2 {
        return false;
    }

    // pPr若存在必为段落的第一个子元素
    if is_start(&events[1], b"w:pPr") {
        let mut end = 2;
        while end < events.len() && !is_end(&events[end], b"w:pPr") {
            end += 1;
        }
        if end >= events.len() {
            return false;
        }

        match edit {
            PprEdit::FirstLineChars(chars) => {
                let mut found = false;
                for i in 2..end {
                    let rewritten = match &events[i] {
                        Event::Empty(e) if e.name().as_ref() == b"w:ind" => {
                            Some(rewrite_ind(e, *chars))
                        }
                        Event::Start(e) if e.name().as_ref() == b"w:ind" => {
                            Some(rewrite_ind(e, *chars))
                        }
                        _ => None,
                    };
                    if let Some(new_ind) = rewritten {
                        let was_start = matches!(&events[i], Event::Start(_));
                        events[i] = if was_start {
                            Event::Start(new_ind)
                        } else {
                            Event::Empty(new_ind)
                        };
                        found = true;
                        break;
                    }
                }
                if !found {
                    events.insert(2, Event::Empty(make_ind(*chars)));
                    end += 1;
                }
            }
            PprEdit::Alignment(align) => {
                let mut found = false;
                for i in 2..end {
                    if is_empty(&events[i], b"w:jc") || is_start(&events[i], b"w:jc") {
                        let mut jc = BytesStart::new("w:jc");
                        jc.push_attribute(("w:val", alignment_val(*align)));
                        let was_start = matches!(&events[i], Event::Start(_));
                        events[i] = if was_start {
                            Event::Start(jc)
                        } else {
                            Event::Empty(jc)
                        };
                        found = true;
                        break;
                    }
                }
                if !found {
                    let mut jc = BytesStart::new("w:jc");
                    jc.push_attribute(("w:val", alignment_val(*align)));
                    events.insert(2, Event::Empty(jc));
                    end += 1;
                }
            }
        }

        // pPrChange插在pPr结束标签之前
        events.splice(end..end, ppr_change(ctx));
        true
    } else if is_empty(&events[1], b"w:pPr") {
        // 自闭合的空pPr：展开为带内容的pPr
        let mut block: Vec<Event<'static>> = vec![Event::Start(BytesStart::new("w:pPr"))];
        match edit {
            PprEdit::FirstLineChars(chars) => block.push(Event::Empty(make_ind(*chars))),
            PprEdit::Alignment(align) => {
                let mut jc = BytesStart::new("w:jc");
                jc.push_attribute(("w:val", alignment_val(*align)));
                block.push(Event::Empty(jc));
            }
        }
        block.extend(ppr_change(ctx));
        block.push(Event::End(BytesEnd::new("w:pPr")));
        events.splice(1..2, block);
        true
    } else {
        // 没有pPr：紧跟段落起始标签插入完整的pPr块
        let mut block: Vec<Event<'static>> = vec![Event::Start(BytesStart::new("w:pPr"))];
        match edit {
            PprEdit::FirstLineChars(chars) => block.push(Event::Empty(make_ind(*chars))),
            PprEdit::Alignment(align) => {
                let mut jc = BytesStart::new("w:jc");
                jc.push_attribute(("w:val", alignment_val(*align)));
                block.push(Event::Empty(jc));
            }
        }
        block.extend(ppr_change(ctx));
        block.push(Event::End(BytesEnd::new("w:pPr")));
        events.splice(1..1, block);
        true
    }
}

fn ppr_change(ctx: &mut RevCtx) -> Vec<Event<'static>> {
    vec![
        Event::Start(ctx.wrapper("w:pPrChange")),
        Event::Empty(BytesStart::new("w:pPr")),
        Event::End(BytesEnd::new("w:pPrChange")),
    ]
}

fn make_ind(chars: f64) -> BytesStart<'static> {
    let mut ind = BytesStart::new("w:ind");
    let value = ((chars * 100.0).round() as i64).to_string();
    ind.push_attribute(("w:firstLineChars", value.as_str()));
    ind
}

/// 改写现有w:ind：去掉绝对长度的firstLine，用字符单位的firstLineChars
fn rewrite_ind(e: &BytesStart, chars: f64) -> BytesStart<'static> {
    let mut out = BytesStart::new("w:ind");
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if key == "w:firstLine" || key == "w:firstLineChars" {
            continue;
        }
        let value = attr
            .unescape_value()
            .map(|v| v.to_string())
            .unwrap_or_default();
        out.push_attribute((key.as_str(), value.as_str()));
    }
    let value = ((chars * 100.0).round() as i64).to_string();
    out.push_attribute(("w:firstLineChars", value.as_str()));
    out
}

fn alignment_val(align: Alignment) -> &'static str {
    match align {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

/// 在settings.xml中开启修订跟踪；缺失时生成最小settings
fn ensure_track_revisions(settings_xml: Option<&[u8]>) -> Result<Vec<u8>, CheckError> {
    let xml = match settings_xml {
        Some(xml) => xml,
        None => {
            return Ok(format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<w:settings xmlns:w=\"{}\"><w:trackRevisions/>\
<w:revisionView w:ins=\"true\" w:del=\"true\" w:formatting=\"true\" w:markup=\"true\"/>\
</w:settings>",
                SETTINGS_NS
            )
            .into_bytes())
        }
    };

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut has_track = false;

    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .map_err(|e| CheckError::MalformedDocument(format!("settings.xml解析失败: {}", e)))?;
        match ev {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e)
                if e.name().as_ref() == b"w:trackRevisions" =>
            {
                has_track = true;
                writer
                    .write_event(Event::Empty(BytesStart::new("w:trackRevisions")))
                    .map_err(write_err)?;
            }
            // Start形式的trackRevisions已改写为Empty，丢弃配对的结束标签
            Event::End(e) if e.name().as_ref() == b"w:trackRevisions" => {}
            Event::End(e) if e.name().as_ref() == b"w:settings" => {
                if !has_track {
                    writer
                        .write_event(Event::Empty(BytesStart::new("w:trackRevisions")))
                        .map_err(write_err)?;
                    let mut view = BytesStart::new("w:revisionView");
                    view.push_attribute(("w:ins", "true"));
                    view.push_attribute(("w:del", "true"));
                    view.push_attribute(("w:formatting", "true"));
                    view.push_attribute(("w:markup", "true"));
                    writer.write_event(Event::Empty(view)).map_err(write_err)?;
                    has_track = true;
                }
                writer.write_event(Event::End(e)).map_err(write_err)?;
            }
            other => writer.write_event(other).map_err(write_err)?,
        }
    }

    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{
        CheckStatus, IssueSource, Location, RuleCategory, Severity,
    };
    use crate::core::testutil::{indented_paragraph, paragraph, DocxBuilder};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn fixed_policy() -> RevisionPolicy {
        RevisionPolicy {
            author: "DocCheck".to_string(),
            deterministic_first: true,
            timestamp: Some(chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()),
        }
    }

    fn check_result(issues: Vec<Issue>) -> CheckResult {
        CheckResult {
            check_id: "test-check".to_string(),
            fingerprint: String::new(),
            total_issues: issues.len(),
            issues,
            category_counts: BTreeMap::new(),
            status: CheckStatus::Completed,
            diagnostics: Vec::new(),
            checked_at: chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        }
    }

    fn spell_issue(paragraph_index: usize, original: &str, correction: &str) -> Issue {
        Issue {
            rule_id: "AI_SPELL_CHECK".to_string(),
            rule_name: "错别字检测".to_string(),
            category: RuleCategory::ContentQuality,
            severity: Severity::Warning,
            source: IssueSource::Ai,
            error_message: format!("检测到可能的错别字：{}", original),
            suggestion: format!("建议修改为：{}", correction),
            locations: vec![Location {
                kind: crate::core::models::LocationKind::Paragraph,
                page_number: 1,
                paragraph_index: Some(paragraph_index),
                run_index: None,
                element_index: None,
                start_line: None,
                end_line: None,
                excerpt: None,
                description: format!("第1页第{}段", paragraph_index + 1),
            }],
            fix_action: Some(FixAction::ReplaceText),
            fix_params: Some(json!({
                "original": original,
                "correction": correction,
                "paragraph_index": paragraph_index,
            })),
        }
    }

    fn margin_issue() -> Issue {
        Issue {
            rule_id: "PAGE_MARGIN_25".to_string(),
            rule_name: "页边距检查".to_string(),
            category: RuleCategory::Page,
            severity: Severity::Error,
            source: IssueSource::Deterministic,
            error_message: "页边距不符合规范".to_string(),
            suggestion: "请调整页边距".to_string(),
            locations: vec![Location::document()],
            fix_action: Some(FixAction::SetPageMargin),
            fix_params: Some(json!({
                "top_mm": 25.4, "bottom_mm": 25.4, "left_mm": 31.8, "right_mm": 25.4
            })),
        }
    }

    fn entry_text(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    #[test]
    fn test_replace_text_becomes_tracked_revision() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("第一段正常内容", None))
            .add_paragraph(paragraph("这里有一个错悞的词", None))
            .build();

        let result = check_result(vec![spell_issue(1, "错悞", "错误")]);
        let synthesizer = RevisionSynthesizer::new(fixed_policy());
        let revised = synthesizer.synthesize(&bytes, &result).unwrap();

        assert_eq!(revised.manifest.revised.len(), 1);
        assert!(revised.manifest.unrevised.is_empty());

        // 修订后的包必须仍可解析
        let model = DocxParser::parse(&revised.bytes).unwrap();
        assert_eq!(model.paragraphs.len(), 2);

        let doc_xml = entry_text(&revised.bytes, "word/document.xml");
        assert!(doc_xml.contains("<w:del "));
        assert!(doc_xml.contains("<w:ins "));
        assert!(doc_xml.contains("w:delText"));
        assert!(doc_xml.contains("错误"));
        assert!(doc_xml.contains("w:author=\"DocCheck\""));

        // 修订跟踪已开启
        let settings_xml = entry_text(&revised.bytes, "word/settings.xml");
        assert!(settings_xml.contains("w:trackRevisions"));
    }

    #[test]
    fn test_margin_fix_with_sectpr_change() {
        let bytes = DocxBuilder::new()
            .margins(1134, 1440, 1800, 1440)
            .add_paragraph(paragraph("正文内容", None))
            .build();

        let result = check_result(vec![margin_issue()]);
        let synthesizer = RevisionSynthesizer::new(fixed_policy());
        let revised = synthesizer.synthesize(&bytes, &result).unwrap();

        assert_eq!(revised.manifest.revised.len(), 1);

        let model = DocxParser::parse(&revised.bytes).unwrap();
        assert!((model.page_settings.margins.top_mm - 25.4).abs() < 0.1);
        assert!((model.page_settings.margins.left_mm - 31.8).abs() < 0.1);

        let doc_xml = entry_text(&revised.bytes, "word/document.xml");
        assert!(doc_xml.contains("w:sectPrChange"));
    }

    #[test]
    fn test_indent_fix_injects_ppr() {
        // 无pPr的段落也能补上缩进与pPrChange
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("没有缩进的段落", None))
            .build();

        let issue = Issue {
            fix_action: Some(FixAction::SetParagraphIndent),
            fix_params: Some(json!({"first_line_indent_chars": 2.0})),
            ..spell_issue(0, "x", "y")
        };
        let issue = Issue {
            rule_id: "PARA_INDENT_2CHAR".to_string(),
            category: RuleCategory::Paragraph,
            ..issue
        };

        let result = check_result(vec![issue]);
        let synthesizer = RevisionSynthesizer::new(fixed_policy());
        let revised = synthesizer.synthesize(&bytes, &result).unwrap();

        let model = DocxParser::parse(&revised.bytes).unwrap();
        assert_eq!(
            model.paragraphs[0].formatting.first_line_indent_chars,
            Some(2.0)
        );

        let doc_xml = entry_text(&revised.bytes, "word/document.xml");
        assert!(doc_xml.contains("w:firstLineChars=\"200\""));
        assert!(doc_xml.contains("w:pPrChange"));
    }

    #[test]
    fn test_existing_indent_is_rewritten() {
        let bytes = DocxBuilder::new()
            .add_paragraph(indented_paragraph("缩进三字符的段落", 300))
            .build();

        let issue = Issue {
            rule_id: "PARA_INDENT_2CHAR".to_string(),
            category: RuleCategory::Paragraph,
            fix_action: Some(FixAction::SetParagraphIndent),
            fix_params: Some(json!({"first_line_indent_chars": 2.0})),
            ..spell_issue(0, "x", "y")
        };

        let result = check_result(vec![issue]);
        let revised = RevisionSynthesizer::new(fixed_policy())
            .synthesize(&bytes, &result)
            .unwrap();

        let model = DocxParser::parse(&revised.bytes).unwrap();
        assert_eq!(
            model.paragraphs[0].formatting.first_line_indent_chars,
            Some(2.0)
        );
    }

    #[test]
    fn test_overlapping_edit_marked_unrevised() {
        // 两处不重叠的替换都生效；与第一处同run重叠的第三处跳过
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("这里有一个错悞的词", None))
            .add_paragraph(paragraph("另一段里有拼冩问题", None))
            .build();

        let result = check_result(vec![
            spell_issue(0, "错悞", "错误"),
            spell_issue(1, "拼冩", "拼写"),
            spell_issue(0, "悞的", "误的"),
        ]);

        let revised = RevisionSynthesizer::new(fixed_policy())
            .synthesize(&bytes, &result)
            .unwrap();

        assert_eq!(revised.manifest.revised.len(), 2);
        assert_eq!(revised.manifest.unrevised.len(), 1);
        assert!(revised.manifest.unrevised[0].reason.contains("重叠"));

        let doc_xml = entry_text(&revised.bytes, "word/document.xml");
        assert!(doc_xml.contains("错误"));
        assert!(doc_xml.contains("拼写"));
    }

    #[test]
    fn test_issue_without_fix_action_is_unrevised() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("正文内容", None))
            .build();

        let mut issue = spell_issue(0, "正文", "本文");
        issue.fix_action = None;
        issue.fix_params = None;

        let result = check_result(vec![issue]);
        let revised = RevisionSynthesizer::new(fixed_policy())
            .synthesize(&bytes, &result)
            .unwrap();

        assert!(revised.manifest.revised.is_empty());
        assert_eq!(revised.manifest.unrevised.len(), 1);
        assert_eq!(revised.manifest.unrevised[0].reason, "无自动修复动作");
    }

    #[test]
    fn test_missing_original_text_is_unrevised() {
        let bytes = DocxBuilder::new()
            .add_paragraph(paragraph("正文内容", None))
            .build();

        let result = check_result(vec![spell_issue(0, "不存在的词", "修正")]);
        let revised = RevisionSynthesizer::new(fixed_policy())
            .synthesize(&bytes, &result)
            .unwrap();

        assert!(revised.manifest.revised.is_empty());
        assert_eq!(revised.manifest.unrevised.len(), 1);
        assert!(revised.manifest.unrevised[0].reason.contains("原文未在"));
    }

    #[test]
    fn test_synthesis_is_idempotent_with_fixed_timestamp() {
        let bytes = DocxBuilder::new()
            .margins(1134, 1440, 1800, 1440)
            .add_paragraph(paragraph("这里有一个错悞的词", None))
            .build();

        let result = check_result(vec![margin_issue(), spell_issue(0, "错悞", "错误")]);
        let synthesizer = RevisionSynthesizer::new(fixed_policy());

        let first = synthesizer.synthesize(&bytes, &result).unwrap();
        let second = synthesizer.synthesize(&bytes, &result).unwrap();

        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.manifest.revised, second.manifest.revised);
    }

    #[test]
    fn test_deterministic_fix_ordered_before_ai_fix() {
        let bytes = DocxBuilder::new()
            .margins(1134, 1440, 1800, 1440)
            .add_paragraph(paragraph("这里有一个错悞的词", None))
            .build();

        // AI文本修复排在前面提交，但结构类修复必须先应用
        let result = check_result(vec![spell_issue(0, "错悞", "错误"), margin_issue()]);
        let synthesizer = RevisionSynthesizer::new(fixed_policy());
        let model = DocxParser::parse(&bytes).unwrap();

        let plan = synthesizer.build_plan(&result, &model);
        let (ordered, _) = synthesizer.order_and_resolve(plan.edits, &model);

        assert_eq!(ordered[0].rule_id, "PAGE_MARGIN_25");
        assert_eq!(ordered[1].rule_id, "AI_SPELL_CHECK");
    }
}
