//! outfit-booth CLI: 姿勢に衣装を合わせ、写真をオフラインで合成する

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use outfit_booth::booth::Booth;
use outfit_booth::compose::{load_rgba, Garments};
use outfit_booth::config::Config;
use outfit_booth::filter::Filter;
use outfit_booth::placement::PlacementEngine;
use outfit_booth::pose::{EstimatorWorker, StaticPoses};
use outfit_booth::render::draw_skeleton;

#[derive(Parser)]
#[command(name = "outfit-booth")]
#[command(about = "Fit jacket and pants images onto a detected body pose")]
#[command(version = outfit_booth::VERSION)]
struct Cli {
    /// 設定ファイル (TOML)。なければデフォルト
    #[arg(long, global = true, default_value = "booth.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 姿勢に対する衣装配置をJSONで出力
    Place {
        /// 外部の推定器が出力したポーズJSON
        #[arg(long)]
        pose: PathBuf,
    },

    /// 写真を合成してPNGで書き出す
    Compose(ComposeArgs),
}

#[derive(Debug, Clone, Args)]
struct ComposeArgs {
    /// 入力写真
    #[arg(long)]
    frame: PathBuf,

    /// ポーズJSON。省略時は `desktop` feature 付きビルドならMoveNetを使い、
    /// そうでなければ衣装なし
    #[arg(long)]
    pose: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Filter::GrungeOutfit)]
    filter: Filter,

    /// 出力PNG
    #[arg(long)]
    out: PathBuf,

    /// キャプチャレポート (JSON) の書き出し先
    #[arg(long)]
    report: Option<PathBuf>,

    /// 推定の前に写真を左右反転する（ポーズJSONも合わせて反転）
    #[arg(long)]
    mirror: bool,

    /// 結果の上に検出した骨格を描く
    #[arg(long)]
    skeleton: bool,

    /// 設定のジャケット画像を上書き
    #[arg(long)]
    jacket: Option<PathBuf>,

    /// 設定のパンツ画像を上書き
    #[arg(long)]
    pants: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Commands::Place { pose } => run_place(&config, &pose),
        Commands::Compose(args) => run_compose(&config, &args),
    }
}

fn run_place(config: &Config, pose_path: &Path) -> Result<()> {
    let poses = StaticPoses::load(pose_path)?;
    let engine = PlacementEngine::from_config(&config.placement);
    let outfit = engine.place(poses.poses().first());
    println!("{}", serde_json::to_string_pretty(&outfit)?);
    Ok(())
}

fn run_compose(config: &Config, args: &ComposeArgs) -> Result<()> {
    info!("Loading photo: {}", args.frame.display());
    let frame = load_rgba(&args.frame)?;
    info!("Photo size: {}x{}", frame.width(), frame.height());

    let jacket = args.jacket.as_ref().unwrap_or(&config.assets.jacket);
    let pants = args.pants.as_ref().unwrap_or(&config.assets.pants);
    let garments = Garments::load(jacket, pants)?;

    let estimator = match &args.pose {
        Some(path) => {
            // ポーズJSONは元の写真の座標なので、反転する写真に合わせる
            let poses = StaticPoses::load(path)?;
            let poses = if args.mirror { poses.mirrored(frame.width()) } else { poses };
            Some(EstimatorWorker::spawn(poses))
        }
        None => model_estimator(config),
    };

    let booth = Booth::from_config(config, garments, estimator)
        .with_mirror(args.mirror);
    let mut capture = booth.capture(&frame, args.filter);

    if args.skeleton {
        if let Some(pose) = capture.estimate.as_ref().and_then(|e| e.pose()) {
            draw_skeleton(&mut capture.image, pose);
        }
    }

    capture.save(&args.out)?;
    info!("Wrote {}", args.out.display());

    let report = serde_json::to_string_pretty(&capture.report())?;
    match &args.report {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", report),
    }
    Ok(())
}

#[cfg(feature = "desktop")]
fn model_estimator(config: &Config) -> Option<EstimatorWorker> {
    match outfit_booth::pose::MoveNetEstimator::new(&config.assets.model) {
        Ok(model) => Some(EstimatorWorker::spawn(model)),
        Err(e) => {
            warn!("pose model unavailable ({:#}); continuing without it", e);
            None
        }
    }
}

#[cfg(not(feature = "desktop"))]
fn model_estimator(_config: &Config) -> Option<EstimatorWorker> {
    warn!("built without the `desktop` feature and no --pose given; no outfit will be fitted");
    None
}
