//! DocCheck 命令行入口
//!
//! check: 解析文档并输出检查结果JSON
//! revise: 基于已有检查结果生成带审阅修订的文档副本

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docheck::core::models::{CheckResult, RuleSet};
use docheck::core::pipeline::CheckPipeline;
use docheck::core::revision::RevisionSynthesizer;
use docheck::storage::config::ConfigManager;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "docheck", about = "AI增强型文档格式检查与修订工具", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 检查文档格式
    Check {
        /// 待检查的docx文件
        file: PathBuf,
        /// 规则集JSON文件
        #[arg(long)]
        rules: PathBuf,
        /// 配置文件路径
        #[arg(long)]
        config: Option<PathBuf>,
        /// 启用AI检查
        #[arg(long)]
        ai: bool,
        /// 检查结果输出路径（缺省打印到标准输出）
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 基于检查结果生成修订版文档
    Revise {
        /// 原始docx文件
        file: PathBuf,
        /// 检查结果JSON文件
        #[arg(long)]
        result: PathBuf,
        /// 配置文件路径
        #[arg(long)]
        config: Option<PathBuf>,
        /// 修订版输出路径
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<docheck::core::models::AppConfig> {
    let path = path.unwrap_or_else(ConfigManager::default_path);
    ConfigManager::new(path).load()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            file,
            rules,
            config,
            ai,
            output,
        } => {
            let app_config = load_config(config)?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("读取文档失败: {}", file.display()))?;
            let ruleset_json = std::fs::read_to_string(&rules)
                .with_context(|| format!("读取规则集失败: {}", rules.display()))?;
            let ruleset = RuleSet::from_json(&ruleset_json).context("规则集JSON解析失败")?;

            let mut options = app_config.check;
            if ai {
                options.ai_enabled = true;
            }

            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "document.docx".to_string());

            let pipeline = CheckPipeline::new(options);
            let result = pipeline.run_check(&filename, &bytes, &ruleset).await?;

            let json = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    tracing::info!("检查结果已写入 {}", path.display());
                }
                None => println!("{}", json),
            }

            tracing::info!(
                "共发现 {} 个问题（检查ID: {}）",
                result.total_issues,
                result.check_id
            );
            Ok(())
        }
        Commands::Revise {
            file,
            result,
            config,
            output,
        } => {
            let app_config = load_config(config)?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("读取文档失败: {}", file.display()))?;
            let result_json = std::fs::read_to_string(&result)
                .with_context(|| format!("读取检查结果失败: {}", result.display()))?;
            let check_result: CheckResult =
                serde_json::from_str(&result_json).context("检查结果JSON解析失败")?;

            let synthesizer = RevisionSynthesizer::new(app_config.revision);
            let revised = synthesizer.synthesize(&bytes, &check_result)?;

            let out_path = output.unwrap_or_else(|| {
                let stem = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "document".to_string());
                file.with_file_name(format!("{}_revised.docx", stem))
            });
            std::fs::write(&out_path, &revised.bytes)
                .with_context(|| format!("写出修订版失败: {}", out_path.display()))?;

            tracing::info!(
                "修订版已写入 {}：{}处已修订，{}处未修订",
                out_path.display(),
                revised.manifest.revised.len(),
                revised.manifest.unrevised.len()
            );
            for record in &revised.manifest.unrevised {
                tracing::warn!(
                    "未修订 [{}] {}: {}",
                    record.rule_id,
                    record.location_description,
                    record.reason
                );
            }
            Ok(())
        }
    }
}
