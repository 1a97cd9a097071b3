//! ZCUT 命令行入口
//!
//! - `zcut export`：读取设计快照 JSON，导出加工文件
//! - `zcut scale`：比例换算
//! - `zcut constrain`：编辑区约束计算

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zcut_core::scale::{calculate_scale, to_pixels, to_real};
use zcut_core::scene::DesignSnapshot;
use zcut_core::zone::{constrain, EditZone, ElementBounds};
use zcut_file::{ExportConfig, ExportFormat, ExportPipeline, FontSource};

#[derive(Debug, Parser)]
#[command(name = "zcut", version, about = "将设计快照导出为真实尺寸的加工文件")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 导出设计快照
    Export(ExportArgs),
    /// 计算比例系数并换算长度
    Scale(ScaleArgs),
    /// 把元素包围盒约束到编辑区
    Constrain(ConstrainArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Dxf,
    Svg,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Dxf => ExportFormat::Dxf,
            FormatArg::Svg => ExportFormat::Svg,
        }
    }
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// 设计快照（JSON）
    snapshot: PathBuf,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// 配置文件（JSON）
    #[arg(short, long, env = "ZCUT_CONFIG")]
    config: Option<PathBuf>,

    /// 输出格式
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// 本地字体目录
    #[arg(long, env = "ZCUT_FONTS_DIR", conflicts_with = "font_url")]
    fonts_dir: Option<PathBuf>,

    /// 远程字体服务地址
    #[arg(long, env = "ZCUT_FONT_URL")]
    font_url: Option<String>,

    /// 曲线离散容差（英寸）
    #[arg(long)]
    tolerance: Option<f64>,
}

#[derive(Debug, Args)]
struct ScaleArgs {
    /// 产品真实宽度（英寸）
    #[arg(long)]
    real_width: f64,

    /// 画布像素宽度
    #[arg(long)]
    pixel_width: f64,

    /// 要换算为英寸的像素值
    #[arg(long)]
    pixels: Option<f64>,

    /// 要换算为像素的英寸值
    #[arg(long)]
    inches: Option<f64>,
}

#[derive(Debug, Args)]
struct ConstrainArgs {
    /// 编辑区 x,y,宽,高（英寸）
    #[arg(long, value_delimiter = ',', required = true)]
    zone: Vec<f64>,

    /// 比例系数（像素/英寸）
    #[arg(long)]
    scale: f64,

    /// 元素 left,top,原始宽,原始高（像素）
    #[arg(long, value_delimiter = ',', required = true)]
    element: Vec<f64>,

    #[arg(long, default_value_t = 1.0)]
    scale_x: f64,

    #[arg(long, default_value_t = 1.0)]
    scale_y: f64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    // ZCUT_LOG_FORMAT=json 输出结构化日志
    if std::env::var("ZCUT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

/// 配置文件 + 命令行覆盖
fn resolve_config(args: &ExportArgs) -> Result<ExportConfig> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    if let Some(format) = args.format {
        config.format = format.into();
    }
    if let Some(dir) = &args.fonts_dir {
        config.font_source = FontSource::Directory { path: dir.clone() };
    }
    if let Some(url) = &args.font_url {
        config.font_source = FontSource::Http {
            base_url: url.clone(),
        };
    }
    if let Some(tolerance) = args.tolerance {
        config.curve_tolerance = tolerance;
    }
    config.validate()?;
    Ok(config)
}

/// 先写临时文件再原子替换，失败时不留下半个文件
fn write_atomically(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let target = dir.join(file_name);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(&target)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

async fn run_export(args: ExportArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let text = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("failed to read {}", args.snapshot.display()))?;
    let snapshot: DesignSnapshot = serde_json::from_str(&text)
        .with_context(|| format!("invalid design snapshot {}", args.snapshot.display()))?;

    let pipeline = ExportPipeline::from_config(config)?;
    let outcome = pipeline.export(&snapshot).await?;

    for skipped in &outcome.report.skipped {
        warn!(
            "未导出: {} ({}) - {}",
            skipped.id.as_deref().unwrap_or("<unnamed>"),
            skipped.kind,
            skipped.error
        );
    }
    for degraded in &outcome.report.degraded {
        warn!("占位输出: {} - {}", degraded.model, degraded.error);
    }

    let path = write_atomically(&args.out_dir, &outcome.file_name, &outcome.bytes)?;
    info!(
        "已写入 {} ({} 个模型)",
        path.display(),
        outcome.report.document.len()
    );
    Ok(())
}

fn run_scale(args: ScaleArgs) -> Result<()> {
    let scale = calculate_scale(args.real_width, args.pixel_width)?;
    println!("scale: {} px/in", scale);
    if let Some(px) = args.pixels {
        println!("{} px = {} in", px, to_real(px, scale)?);
    }
    if let Some(inches) = args.inches {
        println!("{} in = {} px", inches, to_pixels(inches, scale)?);
    }
    Ok(())
}

fn run_constrain(args: ConstrainArgs) -> Result<()> {
    let [x, y, w, h] = <[f64; 4]>::try_from(args.zone.as_slice()).context("--zone needs 4 values")?;
    let [left, top, nw, nh] =
        <[f64; 4]>::try_from(args.element.as_slice()).context("--element needs 4 values")?;

    let rect = EditZone::new("cli", x, y, w, h).to_pixels(args.scale)?;
    let bounds = ElementBounds {
        left,
        top,
        natural_width: nw,
        natural_height: nh,
        scale_x: args.scale_x,
        scale_y: args.scale_y,
    };
    let adjusted = constrain(bounds, &rect);
    println!("{}", serde_json::to_string_pretty(&adjusted)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Export(args) => run_export(args).await,
        Command::Scale(args) => run_scale(args),
        Command::Constrain(args) => run_constrain(args),
    }
}
