//! 测试用docx构造工具
//!
//! 在内存中拼装最小可用的docx包，让解析、检查与修订测试
//! 走真实的二进制路径而不是mock数据。

use std::io::{Cursor, Write};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";

/// XML转义（元素内容）
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 普通段落，font为 (字体名, 半磅字号, 是否加粗)
pub fn paragraph(text: &str, font: Option<(&str, u32, bool)>) -> String {
    match font {
        None => format!(
            "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
            xml_escape(text)
        ),
        Some((name, half_pt, bold)) => {
            let b = if bold { "<w:b/>" } else { "" };
            format!(
                "<w:p><w:r><w:rPr><w:rFonts w:ascii=\"{name}\" w:eastAsia=\"{name}\"/><w:sz w:val=\"{half_pt}\"/>{b}</w:rPr><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>",
                name = name,
                half_pt = half_pt,
                b = b,
                text = xml_escape(text)
            )
        }
    }
}

/// 带样式引用的段落
pub fn styled_paragraph(text: &str, style_id: &str) -> String {
    format!(
        "<w:p><w:pPr><w:pStyle w:val=\"{}\"/></w:pPr><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        style_id,
        xml_escape(text)
    )
}

/// 带首行缩进（firstLineChars单位为1/100字符）的段落
pub fn indented_paragraph(text: &str, first_line_chars_x100: u32) -> String {
    format!(
        "<w:p><w:pPr><w:ind w:firstLineChars=\"{}\"/></w:pPr><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
        first_line_chars_x100,
        xml_escape(text)
    )
}

/// 用原始document.xml内容直接构造docx包
pub fn docx_bytes(document_xml: &str) -> Vec<u8> {
    build_package(document_xml, None, default_settings_xml())
}

fn default_settings_xml() -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><w:settings xmlns:w=\"{}\"><w:zoom w:percent=\"100\"/></w:settings>", W_NS)
}

fn build_package(document_xml: &str, styles_xml: Option<&str>, settings_xml: String) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let content_types = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(content_types.as_bytes()).unwrap();

    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml.as_bytes()).unwrap();

    writer.start_file("word/settings.xml", options).unwrap();
    writer.write_all(settings_xml.as_bytes()).unwrap();

    if let Some(styles) = styles_xml {
        writer.start_file("word/styles.xml", options).unwrap();
        writer.write_all(styles.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// 最小docx包构造器
pub struct DocxBuilder {
    blocks: Vec<String>,
    /// 页边距（上/下/左/右，twips）
    margins: (u32, u32, u32, u32),
    /// 纸张尺寸（宽/高，twips），默认A4
    page_size: (u32, u32),
    styles_xml: Option<String>,
}

impl Default for DocxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            margins: (1440, 1440, 1800, 1440),
            page_size: (11906, 16838),
            styles_xml: None,
        }
    }

    pub fn margins(mut self, top: u32, bottom: u32, left: u32, right: u32) -> Self {
        self.margins = (top, bottom, left, right);
        self
    }

    /// 注入含Heading1~3与docDefaults（宋体12pt）的样式表
    pub fn with_default_styles(mut self) -> Self {
        self.styles_xml = Some(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{w}">
<w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:eastAsia="宋体"/><w:sz w:val="24"/></w:rPr></w:rPrDefault></w:docDefaults>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="Heading 1"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:rFonts w:eastAsia="黑体"/><w:sz w:val="32"/><w:b/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="Heading 2"/><w:pPr><w:outlineLvl w:val="1"/></w:pPr><w:rPr><w:rFonts w:eastAsia="黑体"/><w:sz w:val="28"/><w:b/></w:rPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="Heading 3"/><w:pPr><w:outlineLvl w:val="2"/></w:pPr><w:rPr><w:rFonts w:eastAsia="黑体"/><w:sz w:val="24"/><w:b/></w:rPr></w:style>
</w:styles>"#,
            w = W_NS
        ));
        self
    }

    pub fn add_paragraph(mut self, xml: String) -> Self {
        self.blocks.push(xml);
        self
    }

    pub fn add_table(mut self, rows: usize, cols: usize) -> Self {
        let mut tbl = String::from("<w:tbl><w:tblPr/>");
        for _ in 0..rows {
            tbl.push_str("<w:tr>");
            for _ in 0..cols {
                tbl.push_str("<w:tc><w:p><w:r><w:t>单元格</w:t></w:r></w:p></w:tc>");
            }
            tbl.push_str("</w:tr>");
        }
        tbl.push_str("</w:tbl>");
        self.blocks.push(tbl);
        self
    }

    pub fn document_xml(&self) -> String {
        let (top, bottom, left, right) = self.margins;
        let (width, height) = self.page_size;
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
<w:document xmlns:w=\"{w}\" xmlns:a=\"{a}\"><w:body>{blocks}\
<w:sectPr><w:pgSz w:w=\"{width}\" w:h=\"{height}\"/>\
<w:pgMar w:top=\"{top}\" w:bottom=\"{bottom}\" w:left=\"{left}\" w:right=\"{right}\" w:header=\"851\" w:footer=\"992\"/>\
</w:sectPr></w:body></w:document>",
            w = W_NS,
            a = A_NS,
            blocks = self.blocks.join(""),
            width = width,
            height = height,
            top = top,
            bottom = bottom,
            left = left,
            right = right
        )
    }

    pub fn build(&self) -> Vec<u8> {
        build_package(
            &self.document_xml(),
            self.styles_xml.as_deref(),
            default_settings_xml(),
        )
    }
}
