//! 文档解析模块
//!
//! 负责把docx二进制包解码为结构化的 DocumentModel。
//! 此模块只做解析，不做任何规则判断。
//!
//! 提取顺序：页面设置 → 段落/run/样式 → 表格 → 图片/题注 → 标题层级 → 目录。
//! 样式缺失时回退到格式默认值，而不是解析失败。

use crate::core::errors::CheckError;
use crate::core::models::{
    Alignment, DocumentInfo, DocumentModel, FigureInfo, FontInfo, Heading, Margins, PageSettings,
    Paragraph, ParagraphFormatting, PaperSize, Run, TableInfo, TableOfContents, TocEntry,
};
use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// 每页段落数估算值（A4、1.5倍行距）
const PARAGRAPHS_PER_PAGE: usize = 25;

/// 每行字符数估算值
const CHARS_PER_LINE: usize = 50;

/// 缺省正文字号（磅）
const DEFAULT_FONT_SIZE_PT: f64 = 12.0;

lazy_static! {
    static ref TABLE_CAPTION_RE: Regex = Regex::new(r"^表\s*\d+([－\-.．]\d+)*(\s|$)").unwrap();
    static ref FIGURE_CAPTION_RE: Regex = Regex::new(r"^图\s*\d+([－\-.．]\d+)*(\s|$)").unwrap();
    static ref TOC_TITLE_RE: Regex =
        Regex::new(r"^[\s　]*[一二三四五六七八九十\d\.、．]*[\s　]*目\s*录\s*$").unwrap();
    static ref TOC_NOISE_RE: Regex = Regex::new(r"[\s　\d\.、．一二三四五六七八九十]+").unwrap();
    static ref TOC_LEADER_RE: Regex = Regex::new(r"\.{2,}|_{2,}").unwrap();
    static ref TOC_PAGE_TAIL_RE: Regex = Regex::new(r"[\s\t\._]+\d+$").unwrap();
    static ref TOC_PAGE_NUM_RE: Regex = Regex::new(r"(\d+)\s*$").unwrap();
}

/// 判断文本是否包含中文字符
pub fn contains_chinese(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// 判断文本是否包含英文字符
pub fn contains_english(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_alphabetic())
}

/// 字体名归一化：取逗号列表的第一项，并把中文名映射为英文名
pub fn normalize_font_name(name: &str) -> String {
    let raw = name.split(',').next().unwrap_or(name).trim();
    match raw {
        "宋体" => "SimSun",
        "黑体" => "SimHei",
        "微软雅黑" => "Microsoft YaHei",
        "楷体" => "KaiTi",
        "仿宋" => "FangSong",
        other => other,
    }
    .to_string()
}

fn twips_to_mm(twips: f64) -> f64 {
    round2(twips / 1440.0 * 25.4)
}

fn twips_to_pt(twips: f64) -> f64 {
    round2(twips / 20.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// 样式定义（来自word/styles.xml）
#[derive(Debug, Clone, Default)]
struct StyleDef {
    name: String,
    font_name: Option<String>,
    size_pt: Option<f64>,
    bold: Option<bool>,
    outline_level: Option<u32>,
}

/// 样式表：styleId -> 样式定义，外加文档默认值
#[derive(Debug, Default)]
struct StyleMap {
    styles: HashMap<String, StyleDef>,
    default_font: Option<String>,
    default_size_pt: Option<f64>,
}

impl StyleMap {
    fn style_name(&self, style_id: &str) -> String {
        self.styles
            .get(style_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| style_id.to_string())
    }

    fn style(&self, style_id: &str) -> Option<&StyleDef> {
        self.styles.get(style_id)
    }
}

/// 解析中的run
#[derive(Debug, Default)]
struct RawRun {
    font_name: Option<String>,
    size_pt: Option<f64>,
    bold: Option<bool>,
    text: String,
}

/// 解析中的段落
#[derive(Debug, Default)]
struct RawParagraph {
    style_id: Option<String>,
    alignment: Option<Alignment>,
    first_line_twips: Option<f64>,
    first_line_chars: Option<f64>,
    line: Option<f64>,
    line_rule: Option<String>,
    space_before_twips: Option<f64>,
    space_after_twips: Option<f64>,
    runs: Vec<RawRun>,
    has_drawing: bool,
}

impl RawParagraph {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// 解析中的表格
#[derive(Debug)]
struct RawTable {
    /// 表格起点处已累计的正文段落数（定位锚点）
    anchor: usize,
    rows: usize,
    cols: usize,
    current_row_cells: usize,
}

/// docx文档解析器
pub struct DocxParser;

impl DocxParser {
    /// 解析docx字节流，文件名仅用于文档信息展示
    pub fn parse_with_name(filename: &str, bytes: &[u8]) -> Result<DocumentModel, CheckError> {
        // zip魔数检查：区分"不是docx容器"与"容器损坏"
        if bytes.len() < 4 || &bytes[0..2] != b"PK" {
            return Err(CheckError::UnsupportedFormat(
                "不是有效的docx容器".to_string(),
            ));
        }

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| CheckError::MalformedDocument(format!("zip容器损坏: {}", e)))?;

        let document_xml = read_zip_entry(&mut archive, "word/document.xml")?.ok_or_else(|| {
            CheckError::UnsupportedFormat("缺少word/document.xml，不是Word文档".to_string())
        })?;

        // styles.xml允许缺失，缺失时全部走格式默认值
        let styles = match read_zip_entry(&mut archive, "word/styles.xml")? {
            Some(xml) => parse_styles(&xml).unwrap_or_default(),
            None => StyleMap::default(),
        };

        let (raw_paragraphs, raw_tables, page_settings) = parse_document_xml(&document_xml)?;

        if raw_paragraphs.iter().all(|p| p.text().trim().is_empty()) && raw_tables.is_empty() {
            return Err(CheckError::EmptyDocument);
        }

        let info = DocumentInfo {
            filename: filename.to_string(),
            file_size: bytes.len() as u64,
            fingerprint: fingerprint(bytes),
        };

        Ok(build_model(
            info,
            page_settings,
            raw_paragraphs,
            raw_tables,
            &styles,
        ))
    }

    /// 解析docx字节流
    pub fn parse(bytes: &[u8]) -> Result<DocumentModel, CheckError> {
        Self::parse_with_name("document.docx", bytes)
    }
}

/// 计算内容指纹
fn fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(&hasher.finalize()[..16])
}

fn read_zip_entry(
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

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.to_string())
}

fn attr_f64(e: &BytesStart, name: &str) -> Option<f64> {
    attr(e, name).and_then(|v| v.parse::<f64>().ok())
}

fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" => Alignment::Right,
        "both" | "justify" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

/// 解析word/styles.xml，失败时返回None由调用方回退默认
fn parse_styles(xml: &[u8]) -> Option<StyleMap> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut map = StyleMap::default();
    let mut current_id: Option<String> = None;
    let mut current: StyleDef = StyleDef::default();
    let mut in_doc_defaults = false;

    loop {
        let event = reader.read_event_into(&mut buf).ok()?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"w:docDefaults" => {
                        if !is_empty {
                            in_doc_defaults = true;
                        }
                    }
                    b"w:style" => {
                        if attr(e, "w:type").as_deref() == Some("paragraph") {
                            current_id = attr(e, "w:styleId");
                            current = StyleDef::default();
                        }
                    }
                    b"w:name" => {
                        if current_id.is_some() {
                            if let Some(v) = attr(e, "w:val") {
                                current.name = v;
                            }
                        }
                    }
                    b"w:outlineLvl" => {
                        if current_id.is_some() {
                            current.outline_level =
                                attr(e, "w:val").and_then(|v| v.parse::<u32>().ok());
                        }
                    }
                    b"w:rFonts" => {
                        let font = attr(e, "w:eastAsia").or_else(|| attr(e, "w:ascii"));
                        if in_doc_defaults {
                            if map.default_font.is_none() {
                                map.default_font = font;
                            }
                        } else if current_id.is_some() && current.font_name.is_none() {
                            current.font_name = font;
                        }
                    }
                    b"w:sz" => {
                        let size = attr_f64(e, "w:val").map(|v| v / 2.0);
                        if in_doc_defaults {
                            if map.default_size_pt.is_none() {
                                map.default_size_pt = size;
                            }
                        } else if current_id.is_some() && current.size_pt.is_none() {
                            current.size_pt = size;
                        }
                    }
                    b"w:b" => {
                        if current_id.is_some() {
                            let val = attr(e, "w:val");
                            current.bold =
                                Some(!matches!(val.as_deref(), Some("false") | Some("0")));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:docDefaults" => in_doc_defaults = false,
                b"w:style" => {
                    if let Some(id) = current_id.take() {
                        map.styles.insert(id, std::mem::take(&mut current));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Some(map)
}

/// 解析word/document.xml的主循环
///
/// 只收集正文段落（表格内段落不计入段落列表），页面设置取首个sectPr。
fn parse_document_xml(
    xml: &[u8],
) -> Result<(Vec<RawParagraph>, Vec<RawTable>, PageSettings), CheckError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<RawParagraph> = Vec::new();
    let mut tables: Vec<RawTable> = Vec::new();
    let mut page = PageSettings::default();
    let mut page_margin_seen = false;
    let mut page_size_seen = false;

    let mut table_depth: usize = 0;
    let mut para: Option<RawParagraph> = None;
    let mut run: Option<RawRun> = None;
    let mut in_ppr = false;
    let mut in_rpr = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| CheckError::MalformedDocument(format!("document.xml解析失败: {}", e)))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"w:tbl" => {
                        if !is_empty {
                            table_depth += 1;
                            if table_depth == 1 {
                                tables.push(RawTable {
                                    anchor: paragraphs.len(),
                                    rows: 0,
                                    cols: 0,
                                    current_row_cells: 0,
                                });
                            }
                        }
                    }
                    b"w:tr" => {
                        if table_depth == 1 {
                            if let Some(t) = tables.last_mut() {
                                t.rows += 1;
                                t.current_row_cells = 0;
                            }
                        }
                    }
                    b"w:tc" => {
                        if table_depth == 1 {
                            if let Some(t) = tables.last_mut() {
                                t.current_row_cells += 1;
                                t.cols = t.cols.max(t.current_row_cells);
                            }
                        }
                    }
                    b"w:p" => {
                        if table_depth == 0 && !is_empty {
                            para = Some(RawParagraph::default());
                        }
                    }
                    b"w:pPr" => {
                        if !is_empty && para.is_some() {
                            in_ppr = true;
                        }
                    }
                    b"w:pStyle" => {
                        if in_ppr {
                            if let Some(p) = para.as_mut() {
                                p.style_id = attr(e, "w:val");
                            }
                        }
                    }
                    b"w:jc" => {
                        if in_ppr && !in_rpr {
                            if let Some(p) = para.as_mut() {
                                p.alignment = attr(e, "w:val").map(|v| parse_alignment(&v));
                            }
                        }
                    }
                    b"w:ind" => {
                        if in_ppr {
                            if let Some(p) = para.as_mut() {
                                p.first_line_twips = attr_f64(e, "w:firstLine");
                                p.first_line_chars =
                                    attr_f64(e, "w:firstLineChars").map(|v| v / 100.0);
                            }
                        }
                    }
                    b"w:spacing" => {
                        if in_ppr && !in_rpr {
                            if let Some(p) = para.as_mut() {
                                p.line = attr_f64(e, "w:line");
                                p.line_rule = attr(e, "w:lineRule");
                                p.space_before_twips = attr_f64(e, "w:before");
                                p.space_after_twips = attr_f64(e, "w:after");
                            }
                        }
                    }
                    b"w:r" => {
                        if para.is_some() && !is_empty {
                            run = Some(RawRun::default());
                        }
                    }
                    b"w:rPr" => {
                        if !is_empty {
                            in_rpr = true;
                        }
                    }
                    b"w:rFonts" => {
                        if in_rpr {
                            if let Some(r) = run.as_mut() {
                                r.font_name = attr(e, "w:eastAsia").or_else(|| attr(e, "w:ascii"));
                            }
                        }
                    }
                    b"w:sz" => {
                        if in_rpr {
                            if let Some(r) = run.as_mut() {
                                r.size_pt = attr_f64(e, "w:val").map(|v| v / 2.0);
                            }
                        }
                    }
                    b"w:b" => {
                        if in_rpr {
                            if let Some(r) = run.as_mut() {
                                let val = attr(e, "w:val");
                                r.bold = Some(!matches!(val.as_deref(), Some("false") | Some("0")));
                            }
                        }
                    }
                    b"w:t" => {
                        if !is_empty && run.is_some() {
                            in_text = true;
                        }
                    }
                    b"w:tab" => {
                        if let Some(r) = run.as_mut() {
                            r.text.push('\t');
                        }
                    }
                    b"w:br" => {
                        if let Some(r) = run.as_mut() {
                            r.text.push('\n');
                        }
                    }
                    b"w:drawing" | b"a:blip" | b"w:pict" => {
                        if let Some(p) = para.as_mut() {
                            p.has_drawing = true;
                        }
                    }
                    b"w:pgSz" => {
                        if !page_size_seen {
                            page_size_seen = true;
                            page.paper_size = PaperSize {
                                width_mm: attr_f64(e, "w:w").map(twips_to_mm).unwrap_or(0.0),
                                height_mm: attr_f64(e, "w:h").map(twips_to_mm).unwrap_or(0.0),
                            };
                        }
                    }
                    b"w:pgMar" => {
                        if !page_margin_seen {
                            page_margin_seen = true;
                            page.margins = Margins {
                                top_mm: attr_f64(e, "w:top").map(twips_to_mm).unwrap_or(0.0),
                                bottom_mm: attr_f64(e, "w:bottom").map(twips_to_mm).unwrap_or(0.0),
                                left_mm: attr_f64(e, "w:left").map(twips_to_mm).unwrap_or(0.0),
                                right_mm: attr_f64(e, "w:right").map(twips_to_mm).unwrap_or(0.0),
                            };
                            page.header_mm = attr_f64(e, "w:header").map(twips_to_mm).unwrap_or(0.0);
                            page.footer_mm = attr_f64(e, "w:footer").map(twips_to_mm).unwrap_or(0.0);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if in_text {
                    if let Some(r) = run.as_mut() {
                        if let Ok(text) = t.unescape() {
                            r.text.push_str(&text);
                        }
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                }
                b"w:p" => {
                    if table_depth == 0 {
                        if let Some(p) = para.take() {
                            paragraphs.push(p);
                        }
                    }
                }
                b"w:pPr" => in_ppr = false,
                b"w:rPr" => in_rpr = false,
                b"w:r" => {
                    if let (Some(p), Some(r)) = (para.as_mut(), run.take()) {
                        p.runs.push(r);
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((paragraphs, tables, page))
}

/// 把原始解析结果组装为只读文档模型
fn build_model(
    info: DocumentInfo,
    page_settings: PageSettings,
    raw_paragraphs: Vec<RawParagraph>,
    raw_tables: Vec<RawTable>,
    styles: &StyleMap,
) -> DocumentModel {
    let mut paragraphs = Vec::with_capacity(raw_paragraphs.len());
    let mut runs = Vec::new();

    // 页码/行号估算（与检查报告的定位口径一致）
    let mut current_page = 1u32;
    let mut line_in_page = 1u32;

    for (idx, rp) in raw_paragraphs.iter().enumerate() {
        let text = rp.text();
        let trimmed = text.trim();
        let estimated_page = (idx / PARAGRAPHS_PER_PAGE) as u32 + 1;
        if estimated_page > current_page {
            current_page = estimated_page;
            line_in_page = 1;
        }
        let line_count = (trimmed.matches('\n').count() as u32
            + (trimmed.chars().count() / CHARS_PER_LINE) as u32)
            .max(1);
        let start_line = line_in_page;
        let end_line = start_line + line_count - 1;
        line_in_page = end_line + 1;

        let style_name = rp
            .style_id
            .as_deref()
            .map(|id| styles.style_name(id))
            .unwrap_or_else(|| "Normal".to_string());
        let style_def = rp.style_id.as_deref().and_then(|id| styles.style(id));

        let first_font = rp
            .runs
            .iter()
            .find(|r| !r.text.is_empty())
            .map(|r| resolve_font(r, style_def, styles));

        let formatting = build_formatting(rp, first_font.as_ref());

        for (run_idx, rr) in rp.runs.iter().enumerate() {
            if rr.text.is_empty() {
                continue;
            }
            runs.push(Run {
                paragraph_index: idx,
                run_index: run_idx,
                text: rr.text.clone(),
                font: resolve_font(rr, style_def, styles),
                page_number: estimated_page,
            });
        }

        paragraphs.push(Paragraph {
            index: idx,
            text,
            style_name,
            alignment: rp.alignment.unwrap_or_default(),
            formatting,
            font: first_font,
            page_number: estimated_page,
            start_line,
            end_line,
        });
    }

    let headings = derive_headings(&raw_paragraphs, &paragraphs, styles);
    let tables = locate_tables(raw_tables, &paragraphs);
    let figures = locate_figures(&raw_paragraphs, &paragraphs);
    let table_of_contents = extract_toc(&paragraphs);

    DocumentModel {
        info,
        page_settings,
        paragraphs,
        runs,
        headings,
        tables,
        figures,
        table_of_contents,
    }
}

/// 字体解析：run属性优先，缺失时回退到样式，再回退到文档默认
fn resolve_font(run: &RawRun, style: Option<&StyleDef>, styles: &StyleMap) -> FontInfo {
    let name = run
        .font_name
        .clone()
        .or_else(|| style.and_then(|s| s.font_name.clone()))
        .or_else(|| styles.default_font.clone())
        .map(|n| normalize_font_name(&n));
    let size_pt = run
        .size_pt
        .or_else(|| style.and_then(|s| s.size_pt))
        .or(styles.default_size_pt);
    let bold = run.bold.or_else(|| style.and_then(|s| s.bold));

    FontInfo {
        name,
        size_pt,
        bold,
    }
}

fn build_formatting(rp: &RawParagraph, font: Option<&FontInfo>) -> ParagraphFormatting {
    let mut fmt = ParagraphFormatting::default();

    // 首行缩进：firstLineChars为精确字符数，否则由毫米估算（约2.65mm/字符）
    if let Some(chars) = rp.first_line_chars {
        fmt.first_line_indent_chars = Some(chars);
        fmt.first_line_indent_mm = Some(round2(chars * 2.65));
    } else if let Some(twips) = rp.first_line_twips {
        let mm = twips_to_mm(twips);
        fmt.first_line_indent_mm = Some(mm);
        fmt.first_line_indent_chars = Some(round1(mm / 2.65));
    }

    // 行距：lineRule为auto时是倍数（240分之一行），否则是固定磅值
    if let Some(line) = rp.line {
        match rp.line_rule.as_deref() {
            Some("exact") | Some("atLeast") => {
                fmt.line_spacing_pt = Some(twips_to_pt(line));
            }
            _ => {
                let multiple = round2(line / 240.0);
                let font_size = font
                    .and_then(|f| f.size_pt)
                    .unwrap_or(DEFAULT_FONT_SIZE_PT);
                fmt.line_spacing_multiple = Some(multiple);
                fmt.line_spacing_pt = Some(round2(multiple * font_size));
            }
        }
    }

    fmt.space_before_pt = rp.space_before_twips.map(twips_to_pt);
    fmt.space_after_pt = rp.space_after_twips.map(twips_to_pt);
    fmt
}

/// 标题层级推导
///
/// 优先级：样式outlineLvl > "Heading N"样式名 > 视觉启发式（加粗、≥14pt、短文本）。
/// 启发式得出的层级如果比前一个标题深超过一级，收敛到前级+1。
fn derive_headings(
    raws: &[RawParagraph],
    paragraphs: &[Paragraph],
    styles: &StyleMap,
) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut prev_level: u32 = 0;

    for (idx, rp) in raws.iter().enumerate() {
        let para = &paragraphs[idx];
        let text = para.text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        let style_def = rp.style_id.as_deref().and_then(|id| styles.style(id));
        let style_name = &para.style_name;

        let mut level: Option<u32> = None;
        let mut heuristic = false;

        if let Some(outline) = style_def.and_then(|s| s.outline_level) {
            level = Some(outline + 1);
        } else if style_name.starts_with("Heading") || style_name.starts_with("heading") {
            let parsed = style_name
                .split_whitespace()
                .last()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(1);
            level = Some(parsed);
        } else if let Some(font) = &para.font {
            // 视觉启发式：短、加粗、字号明显大于正文
            let size = font.size_pt.unwrap_or(0.0);
            let bold = font.bold.unwrap_or(false);
            if size >= 14.0 && bold && text.chars().count() <= 50 {
                heuristic = true;
                level = Some(if size >= 20.0 {
                    1
                } else if size >= 16.0 {
                    2
                } else {
                    3
                });
            }
        }

        if let Some(mut lvl) = level {
            // 层级歧义收敛：最多比已确认的前级深一级
            if heuristic && lvl > prev_level + 1 {
                lvl = prev_level + 1;
            }
            prev_level = lvl;

            headings.push(Heading {
                level: lvl,
                text,
                style_name: style_name.clone(),
                alignment: para.alignment,
                font: para.font.clone().unwrap_or_default(),
                paragraph_index: idx,
            });
        }
    }

    headings
}

/// 在锚点附近按给定偏移顺序查找题注段落
///
/// 表格题注通常在上方，图片题注通常在下方，偏移顺序由调用方决定。
fn find_caption(
    paragraphs: &[Paragraph],
    anchor: usize,
    offsets: &[i64],
    pattern: &Regex,
) -> Option<(String, usize)> {
    for offset in offsets {
        let idx = anchor as i64 + offset;
        if idx < 0 || idx as usize >= paragraphs.len() {
            continue;
        }
        let text = paragraphs[idx as usize].text.trim();
        if pattern.is_match(text) {
            return Some((text.to_string(), idx as usize));
        }
    }
    None
}

fn locate_tables(raw_tables: Vec<RawTable>, paragraphs: &[Paragraph]) -> Vec<TableInfo> {
    raw_tables
        .into_iter()
        .enumerate()
        .map(|(index, rt)| {
            let caption = find_caption(paragraphs, rt.anchor, &[-1, -2, 0, 1], &TABLE_CAPTION_RE);
            TableInfo {
                index,
                rows: rt.rows,
                cols: rt.cols,
                caption: caption.as_ref().map(|(t, _)| t.clone()),
                caption_paragraph_index: caption.map(|(_, i)| i),
                paragraph_index: if rt.anchor > 0 {
                    Some(rt.anchor - 1)
                } else {
                    None
                },
            }
        })
        .collect()
}

fn locate_figures(raws: &[RawParagraph], paragraphs: &[Paragraph]) -> Vec<FigureInfo> {
    let mut figures = Vec::new();
    for (idx, rp) in raws.iter().enumerate() {
        if !rp.has_drawing {
            continue;
        }
        let caption = find_caption(paragraphs, idx, &[1, 2, -1, -2], &FIGURE_CAPTION_RE);
        figures.push(FigureInfo {
            index: figures.len(),
            caption: caption.as_ref().map(|(t, _)| t.clone()),
            caption_paragraph_index: caption.map(|(_, i)| i),
            paragraph_index: idx,
        });
    }
    figures
}

/// 目录抽取：先定位"目录"标题段落，再向后扫描目录条目
fn extract_toc(paragraphs: &[Paragraph]) -> TableOfContents {
    let mut toc = TableOfContents::default();

    let toc_start = paragraphs.iter().position(|p| {
        let text = p.text.trim();
        if TOC_TITLE_RE.is_match(text) {
            return true;
        }
        // 兜底：短文本包含"目录"且去噪后只剩"目录"二字
        if text.contains("目录") && text.chars().count() <= 10 {
            return TOC_NOISE_RE.replace_all(text, "") == "目录";
        }
        false
    });

    let start_idx = match toc_start {
        Some(idx) => idx,
        None => return toc,
    };

    toc.exists = true;
    toc.paragraph_index = Some(start_idx);

    let max_scan = (start_idx + 100).min(paragraphs.len());
    for para in &paragraphs[start_idx + 1..max_scan] {
        let text = para.text.trim();
        if text.is_empty() {
            continue;
        }

        // 扫到正文大标题就认为目录结束
        if para.style_name.starts_with("Heading") && text.chars().count() > 10 {
            break;
        }

        if !(text.contains('\t') || TOC_LEADER_RE.is_match(text)) {
            continue;
        }

        let clean = TOC_PAGE_TAIL_RE.replace(text, "");
        let clean = clean.trim().trim_end_matches(['.', '\t', '_']).to_string();
        if clean.is_empty() {
            continue;
        }

        let page_number = TOC_PAGE_NUM_RE
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        let level = if para.style_name.starts_with("Heading") {
            para.style_name
                .split_whitespace()
                .last()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(1)
        } else if para.text.starts_with("\t\t") {
            3
        } else if para.text.starts_with('\t') {
            2
        } else {
            1
        };

        toc.entries.push(TocEntry {
            title: clean,
            level,
            page_number,
            paragraph_index: para.index,
        });
    }

    toc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::{docx_bytes, paragraph, DocxBuilder};

    #[test]
    fn test_reject_non_zip() {
        let err = DocxParser::parse(b"not a zip at all").unwrap_err();
        assert!(matches!(err, CheckError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_reject_zip_without_document_xml() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default();
        writer.start_file("hello.txt", options).unwrap();
        std::io::Write::write_all(&mut writer, b"hi").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = DocxParser::parse(&bytes).unwrap_err();
        assert!(matches!(err, CheckError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_reject_broken_xml() {
        // 结束标签不匹配的坏XML
        let bytes = docx_bytes("<w:document><w:body><w:p></w:tbl></w:body></w:document>");
        let err = DocxParser::parse(&bytes).unwrap_err();
        assert!(matches!(err, CheckError::MalformedDocument(_)));
    }

    #[test]
    fn test_empty_document() {
        let builder = DocxBuilder::new().add_paragraph(paragraph("", None));
        let err = DocxParser::parse(&builder.build()).unwrap_err();
        assert!(matches!(err, CheckError::EmptyDocument));
    }

    #[test]
    fn test_page_margins_in_mm() {
        // 1440 twips = 25.4mm
        let builder = DocxBuilder::new()
            .margins(1440, 1440, 1800, 1440)
            .add_paragraph(paragraph("正文内容", None));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert!((model.page_settings.margins.top_mm - 25.4).abs() < 0.01);
        assert!((model.page_settings.margins.left_mm - 31.75).abs() < 0.01);
    }

    #[test]
    fn test_paragraph_and_run_extraction() {
        let builder = DocxBuilder::new()
            .add_paragraph(paragraph("第一段内容", Some(("宋体", 24, false))))
            .add_paragraph(paragraph("第二段内容", Some(("黑体", 28, true))));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert_eq!(model.paragraphs.len(), 2);
        assert_eq!(model.paragraphs[0].text, "第一段内容");
        assert_eq!(model.runs.len(), 2);
        // 宋体 归一化为 SimSun，sz是半磅
        assert_eq!(model.runs[0].font.name.as_deref(), Some("SimSun"));
        assert_eq!(model.runs[0].font.size_pt, Some(12.0));
        assert_eq!(model.runs[1].font.bold, Some(true));
    }

    #[test]
    fn test_heading_derivation_from_style() {
        let builder = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(paragraph_with_style("第一章 绪论", "Heading1"))
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph(paragraph_with_style("1.1 研究背景", "Heading2"));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert_eq!(model.headings.len(), 2);
        assert_eq!(model.headings[0].level, 1);
        assert_eq!(model.headings[0].text, "第一章 绪论");
        assert_eq!(model.headings[1].level, 2);
    }

    #[test]
    fn test_heading_heuristic_level_clamp() {
        // 无样式，仅凭视觉特征：14.5pt加粗短文本本应判为3级，
        // 但前面没有任何标题，收敛到1级
        let builder = DocxBuilder::new()
            .add_paragraph(paragraph("概述", Some(("黑体", 29, true))))
            .add_paragraph(paragraph("正文内容正文内容", None));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert_eq!(model.headings.len(), 1);
        assert_eq!(model.headings[0].level, 1);
    }

    #[test]
    fn test_figure_caption_detection() {
        let builder = DocxBuilder::new()
            .add_paragraph(paragraph("正文内容", None))
            .add_paragraph(drawing_paragraph())
            .add_paragraph(paragraph("图1-1 系统架构图", None));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert_eq!(model.figures.len(), 1);
        assert_eq!(
            model.figures[0].caption.as_deref(),
            Some("图1-1 系统架构图")
        );
        assert_eq!(model.figures[0].paragraph_index, 1);
    }

    #[test]
    fn test_table_extraction_with_caption() {
        let builder = DocxBuilder::new()
            .add_paragraph(paragraph("表1 实验数据对比", None))
            .add_table(2, 3)
            .add_paragraph(paragraph("正文内容", None));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].rows, 2);
        assert_eq!(model.tables[0].cols, 3);
        assert_eq!(model.tables[0].caption.as_deref(), Some("表1 实验数据对比"));
        // 表格内段落不进入正文段落列表
        assert_eq!(model.paragraphs.len(), 2);
    }

    #[test]
    fn test_toc_extraction() {
        let builder = DocxBuilder::new()
            .add_paragraph(paragraph("目录", None))
            .add_paragraph(paragraph("第一章 绪论\t1", None))
            .add_paragraph(paragraph("第二章 方法.......5", None))
            .add_paragraph(paragraph("这是一段没有制表符的普通正文", None));
        let model = DocxParser::parse(&builder.build()).unwrap();

        assert!(model.table_of_contents.exists);
        assert_eq!(model.table_of_contents.entries.len(), 2);
        assert_eq!(model.table_of_contents.entries[0].title, "第一章 绪论");
        assert_eq!(model.table_of_contents.entries[0].page_number, Some(1));
        assert_eq!(model.table_of_contents.entries[1].page_number, Some(5));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let builder = DocxBuilder::new()
            .with_default_styles()
            .add_paragraph(paragraph_with_style("第一章", "Heading1"))
            .add_paragraph(paragraph("正文内容", Some(("宋体", 24, false))));
        let bytes = builder.build();

        let first = DocxParser::parse(&bytes).unwrap();
        let second = DocxParser::parse(&bytes).unwrap();
        assert_eq!(first, second);
    }

    // ---- 测试XML片段构造 ----

    fn paragraph_with_style(text: &str, style_id: &str) -> String {
        format!(
            "<w:p><w:pPr><w:pStyle w:val=\"{}\"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>",
            style_id, text
        )
    }

    fn drawing_paragraph() -> String {
        "<w:p><w:r><w:drawing/></w:r></w:p>".to_string()
    }
}
