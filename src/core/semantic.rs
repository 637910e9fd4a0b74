//! AI语义检查模块
//!
//! 负责与OpenAI兼容API交互，处理规则无法覆盖的内容级检查：
//! 错别字检测、图表交叉引用检查、以及带prompt模板的AI规则。
//!
//! 设计原则：
//! - AI只负责发现问题，不负责决策
//! - 输入必须"瘦身"，不喂全文
//! - 输出必须是结构化JSON
//! - 任何AI失败（超时/传输/解析）都只降级为诊断，不中断确定性结果
//!
//! 同一文档的多个AI调用在信号量限制下并发执行，互相独立。

use crate::core::models::{
    AiConfig, CheckOptions, CheckerKind, Diagnostic, DiagnosticKind, DocumentModel, FixAction,
    Issue, IssueSource, Location, Rule, RuleCategory, Severity,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// 错别字检测每批段落数
const SPELL_BATCH_SIZE: usize = 30;

/// 喂给AI的段落数上限
const CONTEXT_PARAGRAPH_LIMIT: usize = 50;

/// 单段落文本截断长度
const CONTEXT_PARAGRAPH_CHARS: usize = 200;

const SPELL_CHECK_SYSTEM_PROMPT: &str = r#"你是一个专业的中文文档校对助手。你的任务是检测文档中的错别字。

请仔细检查以下内容的错别字，包括同音字错误、形近字错误、常见输入错误与英文拼写错误。

对于每个检测到的错别字，请返回：
- paragraph_index: 段落标号（方括号内的数字）
- original: 错误的文本
- correction: 正确的文本
- reason: 修改理由

请只返回确实存在错误的项，不要误报。如果未检测到错别字，返回空数组。
返回格式必须是有效的JSON数组，不要输出其他内容。"#;

const CROSS_REF_SYSTEM_PROMPT: &str = r#"你是一个专业的文档格式检查助手。你的任务是检查文档中图表交叉引用的一致性。

请检查：
1. 文中提到的图表编号是否真实存在
2. 图表编号是否连续（无跳号）
3. 引用格式是否符合规范（如"图1-1"、"表2.1"等）

对于每个检测到的问题，请返回：
- type: 问题类型（missing_ref/invalid_format/discontinuous）
- reference: 文中的引用文本
- suggestion: 修改建议
- suggested_ref: 建议替换成的引用编号（可选）

返回格式必须是有效的JSON数组，不要输出其他内容。"#;

const RULE_CHECK_SYSTEM_PROMPT: &str =
    "你是一个专业的文档格式检查助手。请严格按照JSON格式返回检查结果。";

lazy_static! {
    static ref REF_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"[图表]\s*\d+(?:[-－.．]\d+)*").unwrap(),
        Regex::new(r"(?i)Figure\s*\d+(?:[-－.．]\d+)*").unwrap(),
        Regex::new(r"(?i)Table\s*\d+(?:[-－.．]\d+)*").unwrap(),
    ];
}

/// AI检查输出：问题列表 + 软失败诊断
#[derive(Debug, Default)]
pub struct AiOutcome {
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 文中的一处图表引用
#[derive(Debug, Clone, Serialize)]
pub struct RefSite {
    pub text: String,
    pub paragraph_index: usize,
    #[serde(skip)]
    pub page_number: u32,
    pub location: String,
}

/// 单个AI任务
#[derive(Debug)]
struct AiJob {
    kind: JobKind,
    system: String,
    prompt: String,
    timeout: Duration,
}

#[derive(Debug)]
enum JobKind {
    /// 带prompt模板的AI/hybrid规则
    Rule(Box<Rule>),
    /// 错别字检测批次，offset为批次首段的绝对索引
    Spell { offset: usize },
    /// 交叉引用检查
    CrossRef { refs: Vec<RefSite> },
}

impl JobKind {
    fn label(&self) -> String {
        match self {
            JobKind::Rule(rule) => format!("规则 {}", rule.id),
            JobKind::Spell { offset } => format!("错别字批次 {}", offset),
            JobKind::CrossRef { .. } => "交叉引用检查".to_string(),
        }
    }

    fn rule_id(&self) -> String {
        match self {
            JobKind::Rule(rule) => rule.id.clone(),
            JobKind::Spell { .. } => "AI_SPELL_CHECK".to_string(),
            JobKind::CrossRef { .. } => "AI_CROSS_REF_CHECK".to_string(),
        }
    }
}

/// AI语义检查器
pub struct AiChecker {
    config: AiConfig,
    client: reqwest::Client,
}

impl AiChecker {
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// AI检查是否可用
    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    /// 对文档执行全部启用的AI检查
    ///
    /// 只处理checker为ai/hybrid的规则；每个调用独立超时，
    /// 失败只产生诊断，确定性检查结果不受影响。
    pub async fn check(
        &self,
        model: &DocumentModel,
        rules: &[Rule],
        options: &CheckOptions,
    ) -> AiOutcome {
        let mut outcome = AiOutcome::default();

        if !self.is_enabled() {
            outcome.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::AiSkipped,
                rule_id: None,
                message: "AI_API_KEY未配置，AI检查跳过".to_string(),
            });
            return outcome;
        }

        let jobs = self.build_jobs(model, rules, options);
        if jobs.is_empty() {
            return outcome;
        }

        let results = self.run_jobs(jobs).await;

        for (job, result) in results {
            match result {
                Ok(Ok(response)) => match &job.kind {
                    JobKind::Rule(rule) => {
                        outcome
                            .issues
                            .extend(parse_rule_response(&response, rule, model));
                    }
                    JobKind::Spell { offset } => {
                        let issues = parse_spell_response(&response, model, *offset);
                        tracing::info!("错别字批次{}完成，发现 {} 个问题", offset, issues.len());
                        outcome.issues.extend(issues);
                    }
                    JobKind::CrossRef { refs } => {
                        let issues = parse_cross_ref_response(&response, refs);
                        tracing::info!("交叉引用检测完成，发现 {} 个问题", issues.len());
                        outcome.issues.extend(issues);
                    }
                },
                Ok(Err(err)) => {
                    tracing::warn!("AI检查失败（{}）: {}", job.kind.label(), err);
                    // 交叉引用检查有基于规则的降级方案
                    if let JobKind::CrossRef { refs } = &job.kind {
                        outcome
                            .issues
                            .extend(rule_based_cross_ref_check(refs, model));
                    }
                    outcome.diagnostics.push(Diagnostic {
                        kind: DiagnosticKind::AiSkipped,
                        rule_id: Some(job.kind.rule_id()),
                        message: format!("AI检查失败，已跳过: {}", err),
                    });
                }
                Err(_elapsed) => {
                    tracing::warn!(
                        "AI检查超时（{}，{}秒）",
                        job.kind.label(),
                        job.timeout.as_secs()
                    );
                    if let JobKind::CrossRef { refs } = &job.kind {
                        outcome
                            .issues
                            .extend(rule_based_cross_ref_check(refs, model));
                    }
                    outcome.diagnostics.push(Diagnostic {
                        kind: DiagnosticKind::AiTimeout,
                        rule_id: Some(job.kind.rule_id()),
                        message: format!("AI检查超时（{}秒），已跳过", job.timeout.as_secs()),
                    });
                }
            }
        }

        outcome
    }

    /// 构建本次检查的全部AI任务（纯同步，不借用model跨越await点）
    fn build_jobs(
        &self,
        model: &DocumentModel,
        rules: &[Rule],
        options: &CheckOptions,
    ) -> Vec<AiJob> {
        let mut jobs = Vec::new();
        let default_timeout = Duration::from_secs(self.config.timeout_secs.max(1));

        // 1. 带prompt模板的AI/hybrid规则
        for rule in rules {
            if !matches!(rule.checker, CheckerKind::Ai | CheckerKind::Hybrid) {
                continue;
            }
            let template = match &rule.prompt_template {
                Some(t) => t,
                None => {
                    tracing::warn!("规则 {} 没有prompt模板，跳过AI检查", rule.id);
                    continue;
                }
            };
            let timeout = rule
                .timeout_secs
                .map(|s| Duration::from_secs(s.max(1)))
                .unwrap_or(default_timeout);
            jobs.push(AiJob {
                kind: JobKind::Rule(Box::new(rule.clone())),
                system: RULE_CHECK_SYSTEM_PROMPT.to_string(),
                prompt: render_prompt_template(template, model),
                timeout,
            });
        }

        // 2. 错别字检测（按批次切分段落）
        if options.spell_check {
            let mut offset = 0;
            while offset < model.paragraphs.len() {
                let batch = &model.paragraphs[offset..(offset + SPELL_BATCH_SIZE).min(model.paragraphs.len())];
                let batch_text = format_spell_batch(batch, offset);
                if !batch_text.is_empty() {
                    jobs.push(AiJob {
                        kind: JobKind::Spell { offset },
                        system: SPELL_CHECK_SYSTEM_PROMPT.to_string(),
                        prompt: format!(
                            "请检查以下文本中的错别字：\n\n{}\n\n返回JSON格式的检测结果。只返回确实存在错误的项。",
                            batch_text
                        ),
                        timeout: default_timeout,
                    });
                }
                offset += SPELL_BATCH_SIZE;
            }
        }

        // 3. 交叉引用检查（没有引用时不发请求）
        if options.cross_ref_check {
            let refs = extract_all_references(model);
            if !refs.is_empty() {
                let prompt = build_cross_ref_prompt(&refs, model);
                jobs.push(AiJob {
                    kind: JobKind::CrossRef { refs },
                    system: CROSS_REF_SYSTEM_PROMPT.to_string(),
                    prompt,
                    timeout: default_timeout,
                });
            }
        }

        jobs
    }

    /// 有界并发执行任务，每个任务独立超时
    async fn run_jobs(
        &self,
        jobs: Vec<AiJob>,
    ) -> Vec<(
        AiJob,
        Result<anyhow::Result<String>, tokio::time::error::Elapsed>,
    )> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = tokio::task::JoinSet::new();

        for (idx, job) in jobs.into_iter().enumerate() {
            let client = self.client.clone();
            let config = self.config.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = tokio::time::timeout(
                    job.timeout,
                    call_ai_with_retry(&client, &config, &job.system, &job.prompt),
                )
                .await;
                (idx, job, result)
            });
        }

        let mut completed = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(item) => completed.push(item),
                Err(e) => tracing::warn!("AI任务join失败: {}", e),
            }
        }

        // 按提交顺序排序，保证结果可重复
        completed.sort_by_key(|(idx, _, _)| *idx);
        completed.into_iter().map(|(_, job, res)| (job, res)).collect()
    }
}

/// prompt模板渲染：支持{doc_info}/{paragraphs}/{headings}占位符
fn render_prompt_template(template: &str, model: &DocumentModel) -> String {
    let doc_info = serde_json::json!({
        "filename": model.info.filename,
        "total_paragraphs": model.paragraphs.len(),
        "total_headings": model.headings.len(),
    })
    .to_string();

    let paragraphs_text: String = model
        .paragraphs
        .iter()
        .take(CONTEXT_PARAGRAPH_LIMIT)
        .map(|p| {
            let text: String = p.text.chars().take(CONTEXT_PARAGRAPH_CHARS).collect();
            format!("{}. {}", p.index + 1, text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let headings_text: String = model
        .headings
        .iter()
        .map(|h| format!("{} {}", "#".repeat(h.level as usize), h.text))
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{doc_info}", &doc_info)
        .replace("{paragraphs}", &paragraphs_text)
        .replace("{headings}", &headings_text)
}

/// 格式化错别字批次：每段前加相对标号 [idx]
fn format_spell_batch(paragraphs: &[crate::core::models::Paragraph], offset: usize) -> String {
    paragraphs
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| format!("[{}] {}", p.index - offset, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 从全文提取图表引用
pub fn extract_all_references(model: &DocumentModel) -> Vec<RefSite> {
    let mut sites = Vec::new();

    for para in &model.paragraphs {
        let mut seen = std::collections::BTreeSet::new();
        for pattern in REF_PATTERNS.iter() {
            for m in pattern.find_iter(&para.text) {
                if seen.insert(m.as_str().to_string()) {
                    sites.push(RefSite {
                        text: m.as_str().to_string(),
                        paragraph_index: para.index,
                        page_number: para.page_number,
                        location: format!("第{}页第{}行", para.page_number, para.start_line),
                    });
                }
            }
        }
    }

    sites
}

/// 构建实际存在的图表清单
fn build_inventory(model: &DocumentModel) -> (Vec<String>, Vec<String>) {
    let figures = (0..model.figures.len())
        .map(|i| format!("图{}", i + 1))
        .collect();
    let tables = (0..model.tables.len())
        .map(|i| format!("表{}", i + 1))
        .collect();
    (figures, tables)
}

fn build_cross_ref_prompt(refs: &[RefSite], model: &DocumentModel) -> String {
    let (figures, tables) = build_inventory(model);
    format!(
        r#"请检查以下文档中的图表交叉引用是否正确。

文中引用列表：
{}

实际存在的图表：
图片：{}
表格：{}

请检查：
1. 引用的图表是否真实存在
2. 图表编号是否连续
3. 引用格式是否规范

返回JSON格式的检测结果。"#,
        serde_json::to_string_pretty(refs).unwrap_or_default(),
        if figures.is_empty() {
            "无".to_string()
        } else {
            figures.join("、")
        },
        if tables.is_empty() {
            "无".to_string()
        } else {
            tables.join("、")
        }
    )
}

/// 调用AI API（OpenAI兼容Chat Completions），传输失败按配置重试
async fn call_ai_with_retry(
    client: &reqwest::Client,
    config: &AiConfig,
    system: &str,
    prompt: &str,
) -> anyhow::Result<String> {
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        match call_ai(client, config, system, prompt).await {
            Ok(text) => return Ok(text),
            Err(e) => {
                if attempt < config.max_retries {
                    tracing::warn!("AI调用失败（第{}次尝试），准备重试: {}", attempt + 1, e);
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("AI调用失败")))
}

async fn call_ai(
    client: &reqwest::Client,
    config: &AiConfig,
    system: &str,
    prompt: &str,
) -> anyhow::Result<String> {
    #[derive(Serialize)]
    struct Message {
        role: String,
        content: String,
    }

    #[derive(Serialize)]
    struct ChatRequest {
        model: String,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    }

    #[derive(Deserialize)]
    struct MessageContent {
        content: String,
    }

    #[derive(Deserialize)]
    struct Choice {
        message: MessageContent,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<Choice>,
    }

    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

    let request = ChatRequest {
        model: config.model.clone(),
        messages: vec![
            Message {
                role: "system".to_string(),
                content: system.to_string(),
            },
            Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    let mut req = client.post(&url).json(&request);
    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let response = req
        .send()
        .await?
        .error_for_status()?
        .json::<ChatResponse>()
        .await?;

    response
        .choices
        .first()
        .map(|c| c.message.content.clone())
        .ok_or_else(|| anyhow::anyhow!("AI返回空响应"))
}

// ---- 响应解析 ----

/// 从AI响应文本中提取JSON，兼容markdown代码块与夹杂说明文字的情况
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // 尝试1: 直接解析
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    // 尝试2: 剥掉markdown代码块标记
    if trimmed.starts_with("```") {
        let cleaned = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        if let Ok(v) = serde_json::from_str::<Value>(cleaned) {
            return Some(v);
        }
    }

    // 尝试3/4: 括号配对提取数组或对象
    for (open, close) in [('[', ']'), ('{', '}')] {
        if let Some(json_str) = extract_balanced(trimmed, open, close) {
            if let Ok(v) = serde_json::from_str::<Value>(&json_str) {
                return Some(v);
            }
        }
    }

    None
}

/// 括号配对提取，正确处理字符串内的括号与转义
fn extract_balanced(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + c.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

/// 把AI响应归一化为条目数组（兼容{"issues":[...]}等包装）
fn response_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            for key in ["issues", "results"] {
                if let Some(Value::Array(items)) = obj.remove(key) {
                    return items;
                }
            }
            vec![Value::Object(obj)]
        }
        _ => Vec::new(),
    }
}

/// 解析错别字检测响应，把相对段落标号映射回模型段落
///
/// 位置映射是尽力而为：先用标号定位再用原文验证，
/// 无法在文档中找到原文的条目直接丢弃而不是猜测。
fn parse_spell_response(response: &str, model: &DocumentModel, offset: usize) -> Vec<Issue> {
    let value = match extract_json(response) {
        Some(v) => v,
        None => {
            tracing::warn!("未能从AI响应中提取JSON数据");
            return Vec::new();
        }
    };

    let mut issues = Vec::new();

    for item in response_items(value) {
        let original = match item.get("original").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };
        let correction = match item.get("correction").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };

        // 相对标号 -> 绝对段落索引，再用原文验证
        let claimed = item
            .get("paragraph_index")
            .and_then(|v| v.as_u64())
            .map(|rel| rel as usize + offset);

        let para = claimed
            .and_then(|idx| model.paragraphs.get(idx))
            .filter(|p| p.text.contains(original))
            .or_else(|| {
                // 标号对不上时在本批次内搜索原文
                model.paragraphs[offset..(offset + SPELL_BATCH_SIZE).min(model.paragraphs.len())]
                    .iter()
                    .find(|p| p.text.contains(original))
            });

        let para = match para {
            Some(p) => p,
            // 定位失败，丢弃而不是瞎猜
            None => continue,
        };

        let reason = item
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        issues.push(Issue {
            rule_id: "AI_SPELL_CHECK".to_string(),
            rule_name: "错别字检测".to_string(),
            category: RuleCategory::ContentQuality,
            severity: Severity::Warning,
            source: IssueSource::Ai,
            error_message: format!("检测到可能的错别字：{}", original),
            suggestion: if reason.is_empty() {
                format!("建议修改为：{}", correction)
            } else {
                format!("建议修改为：{}（{}）", correction, reason)
            },
            locations: vec![Location::paragraph(para)],
            fix_action: Some(FixAction::ReplaceText),
            fix_params: Some(serde_json::json!({
                "original": original,
                "correction": correction,
                "paragraph_index": para.index,
            })),
        });
    }

    issues
}

/// 解析交叉引用检测响应
fn parse_cross_ref_response(response: &str, refs: &[RefSite]) -> Vec<Issue> {
    let value = match extract_json(response) {
        Some(v) => v,
        None => {
            tracing::warn!("未能从AI响应中提取JSON数据");
            return Vec::new();
        }
    };

    let mut issues = Vec::new();

    for item in response_items(value) {
        let reference = match item.get("reference").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s,
            _ => continue,
        };

        // 引用文本映射回提取时记录的位置，映射失败的条目丢弃
        let site = refs
            .iter()
            .find(|r| r.text == reference || r.text.contains(reference));
        let site = match site {
            Some(s) => s,
            None => continue,
        };

        let issue_type = item.get("type").and_then(|v| v.as_str()).unwrap_or("");
        let error_message = match issue_type {
            "missing_ref" => "引用的图表不存在".to_string(),
            "invalid_format" => "引用格式不符合规范".to_string(),
            "discontinuous" => "图表编号不连续".to_string(),
            _ => format!("交叉引用问题：{}", reference),
        };

        let suggested_ref = item.get("suggested_ref").and_then(|v| v.as_str());
        let (fix_action, fix_params) = match suggested_ref {
            Some(new_ref) if new_ref != reference => (
                Some(FixAction::ReplaceRef),
                Some(serde_json::json!({
                    "original_ref": reference,
                    "suggested_ref": new_ref,
                    "paragraph_index": site.paragraph_index,
                })),
            ),
            _ => (None, None),
        };

        issues.push(Issue {
            rule_id: "AI_CROSS_REF_CHECK".to_string(),
            rule_name: "交叉引用检查".to_string(),
            category: RuleCategory::Reference,
            severity: Severity::Warning,
            source: IssueSource::Ai,
            error_message,
            suggestion: item
                .get("suggestion")
                .and_then(|v| v.as_str())
                .unwrap_or("请检查图表编号是否正确")
                .to_string(),
            locations: vec![ref_site_location(site)],
            fix_action,
            fix_params,
        });
    }

    issues
}

/// 带prompt模板规则的响应解析
fn parse_rule_response(response: &str, rule: &Rule, model: &DocumentModel) -> Vec<Issue> {
    let value = match extract_json(response) {
        Some(v) => v,
        None => {
            tracing::warn!("规则 {} 的AI响应不是有效JSON", rule.id);
            return Vec::new();
        }
    };

    let mut issues = Vec::new();

    for item in response_items(value) {
        // 位置解析：段落标号优先，其次按文本片段搜索，都失败则落到文档级
        let para = item
            .get("paragraph_index")
            .and_then(|v| v.as_u64())
            .and_then(|idx| model.paragraphs.get(idx as usize))
            .or_else(|| {
                item.get("text")
                    .and_then(|v| v.as_str())
                    .filter(|t| !t.is_empty())
                    .and_then(|t| model.paragraphs.iter().find(|p| p.text.contains(t)))
            });

        let location = match para {
            Some(p) => Location::paragraph(p),
            None => Location::document(),
        };

        let error_message = item
            .get("error_message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                if rule.error_message.is_empty() {
                    "格式可能存在问题".to_string()
                } else {
                    rule.error_message.clone()
                }
            });

        let suggestion = item
            .get("suggestion")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| rule.suggestion.clone());

        issues.push(Issue {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            category: rule.category,
            severity: Severity::Warning,
            source: IssueSource::Ai,
            error_message,
            suggestion,
            locations: vec![location],
            fix_action: None,
            fix_params: None,
        });
    }

    issues
}

fn ref_site_location(site: &RefSite) -> Location {
    Location {
        kind: crate::core::models::LocationKind::Paragraph,
        page_number: site.page_number,
        paragraph_index: Some(site.paragraph_index),
        run_index: None,
        element_index: None,
        start_line: None,
        end_line: None,
        excerpt: Some(site.text.clone()),
        description: site.location.clone(),
    }
}

/// 基于规则的交叉引用检测（AI失败时的降级方案）
pub fn rule_based_cross_ref_check(refs: &[RefSite], model: &DocumentModel) -> Vec<Issue> {
    let (figures, tables) = build_inventory(model);
    let inventory: Vec<String> = figures.into_iter().chain(tables).collect();

    let mut issues = Vec::new();

    for site in refs {
        let normalized = site
            .text
            .replace('－', "-")
            .replace('．', ".")
            .replace(' ', "");

        let exists = inventory
            .iter()
            .any(|item| normalized.contains(item.as_str()) || item.contains(&normalized));

        if !exists {
            issues.push(Issue {
                rule_id: "AI_CROSS_REF_CHECK".to_string(),
                rule_name: "交叉引用检查".to_string(),
                category: RuleCategory::Reference,
                severity: Severity::Warning,
                source: IssueSource::Ai,
                error_message: format!("引用的图表不存在：{}", site.text),
                suggestion: "请检查图表编号是否正确".to_string(),
                locations: vec![ref_site_location(site)],
                // 规则检测无法判断正确编号，不给自动修复
                fix_action: None,
                fix_params: None,
            });
        }
    }

    issues
}
