// ==========================================
// 科研成果评估系统 - 命令行入口
// ==========================================
// 子命令: init-db / rebuild-cache / solve-discipline / solve-university / reset-pins / metrics
// 数据库路径: --db > SLOT_EVALUATION_DB_PATH > 用户数据目录
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use slot_evaluation::config::{ConfigManager, EvaluationSettings};
use slot_evaluation::db::{init_schema, open_sqlite_connection};
use slot_evaluation::engine::{
    BatchRunner, ConvergenceController, ConvergenceOptions, EvaluationRepositories,
    MetricsAggregator, PointsCache, SlotCalculator, SolverStrategy,
};
use slot_evaluation::{logging, YearRange, APP_NAME, VERSION};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "slot-evaluation")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "科研成果评估：槽位计算、学科选优与收敛", long_about = None)]
struct Cli {
    /// 数据库文件路径
    #[arg(long, global = true, env = "SLOT_EVALUATION_DB_PATH")]
    db: Option<PathBuf>,

    /// 以 JSON 行格式输出日志
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化数据库表结构（幂等）
    InitDb,

    /// 重建全部成果的分值缓存
    RebuildCache,

    /// 单学科选优（含收敛循环）
    SolveDiscipline {
        #[arg(long)]
        discipline: i64,

        #[arg(long, default_value_t = 2022)]
        from: i32,

        #[arg(long, default_value_t = 2025)]
        to: i32,

        /// knapsack / knapsack-unbounded / genetic
        #[arg(long, default_value = "knapsack")]
        strategy: SolverStrategy,

        /// 轮间解除弱绑定
        #[arg(long)]
        unpin: bool,

        #[arg(long, default_value = "default")]
        institution: String,
    },

    /// 全校所有学科并发选优
    SolveUniversity {
        #[arg(long, default_value_t = 2022)]
        from: i32,

        #[arg(long, default_value_t = 2025)]
        to: i32,

        /// 覆盖学科 N 下限
        #[arg(long)]
        min_n: Option<Decimal>,

        #[arg(long, default_value = "knapsack")]
        strategy: SolverStrategy,

        #[arg(long)]
        unpin: bool,

        #[arg(long, default_value = "default")]
        institution: String,
    },

    /// 重新绑定区间内全部可计入关联
    ResetPins {
        #[arg(long, default_value_t = 2022)]
        from: i32,

        #[arg(long, default_value_t = 2025)]
        to: i32,
    },

    /// 汇总作者指标
    Metrics {
        #[arg(long, default_value_t = 2022)]
        from: i32,

        #[arg(long, default_value_t = 2025)]
        to: i32,
    },
}

/// 默认数据库路径（用户数据目录）
fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("slot-evaluation").join("slot_evaluation.db"),
        None => PathBuf::from("./slot_evaluation.db"),
    }
}

fn prepare_database(path: &Path) -> Result<String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }
    }
    let db_path = path
        .to_str()
        .ok_or_else(|| anyhow!("数据库路径不是合法 UTF-8: {}", path.display()))?
        .to_string();
    let conn = open_sqlite_connection(&db_path).context("无法打开数据库")?;
    init_schema(&conn).context("初始化表结构失败")?;
    Ok(db_path)
}

async fn load_settings(db_path: &str) -> Result<EvaluationSettings> {
    let config = ConfigManager::new(db_path).map_err(|e| anyhow!("配置加载失败: {}", e))?;
    let snapshot = config
        .get_config_snapshot()
        .map_err(|e| anyhow!("配置快照失败: {}", e))?;
    let settings = EvaluationSettings::load(&config)
        .await
        .map_err(|e| anyhow!("配置加载失败: {}", e))?;
    Ok(settings.with_snapshot(snapshot))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json {
        logging::init_json();
    } else {
        logging::init();
    }

    info!("{} {}", APP_NAME, VERSION);
    let path = cli.db.clone().unwrap_or_else(default_db_path);
    let db_path = prepare_database(&path)?;
    info!(db_path = %db_path, "使用数据库");

    match cli.command {
        Commands::InitDb => {
            println!("数据库已初始化: {}", db_path);
        }

        Commands::RebuildCache => {
            let settings = load_settings(&db_path).await?;
            let repos = EvaluationRepositories::open(&db_path)?;
            let calculator =
                SlotCalculator::new(settings.reform_year, settings.first_evaluated_year);
            let summary = PointsCache::new(repos, calculator).rebuild_all()?;
            println!(
                "已重建 {} 篇，规则不适用 {} 篇",
                summary.rebuilt,
                summary.inapplicable.len()
            );
        }

        Commands::SolveDiscipline {
            discipline,
            from,
            to,
            strategy,
            unpin,
            institution,
        } => {
            let settings = load_settings(&db_path).await?;
            let repos = EvaluationRepositories::open(&db_path)?;
            let options = ConvergenceOptions {
                strategy,
                unpin,
                institution,
            };
            let report = ConvergenceController::new(repos, settings).run(
                discipline,
                YearRange::new(from, to),
                &options,
            )?;
            if report.excluded {
                println!("学科 {} 的 N 低于下限，未参与评估", discipline);
            } else {
                println!(
                    "学科 {}: {} 轮，最终得分 {}，最终状态 {}",
                    discipline,
                    report.rounds.len(),
                    report.best_points(),
                    report.final_state
                );
            }
        }

        Commands::SolveUniversity {
            from,
            to,
            min_n,
            strategy,
            unpin,
            institution,
        } => {
            let mut settings = load_settings(&db_path).await?;
            if let Some(min_n) = min_n {
                settings = settings.with_min_n(min_n);
            }

            let cancel = Arc::new(AtomicBool::new(false));
            let signal_flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("收到中断信号，当前轮次结束后停止");
                    signal_flag.store(true, Ordering::SeqCst);
                }
            });

            let options = ConvergenceOptions {
                strategy,
                unpin,
                institution,
            };
            let results = BatchRunner::new(db_path.clone(), settings)
                .run_all(YearRange::new(from, to), options, cancel)
                .await?;
            for r in &results {
                match &r.result {
                    Ok(report) if report.excluded => {
                        println!("学科 {}: 未参与（N 低于下限）", r.discipline_id)
                    }
                    Ok(report) => println!(
                        "学科 {}: 得分 {}（{} 轮）",
                        r.discipline_id,
                        report.best_points(),
                        report.rounds.len()
                    ),
                    Err(e) => println!("学科 {}: 失败 - {}", r.discipline_id, e),
                }
            }
        }

        Commands::ResetPins { from, to } => {
            let settings = load_settings(&db_path).await?;
            let repos = EvaluationRepositories::open(&db_path)?;
            let calculator =
                SlotCalculator::new(settings.reform_year, settings.first_evaluated_year);
            let summary = PointsCache::new(repos, calculator).reset_pins(YearRange::new(from, to))?;
            println!(
                "重新绑定 {} 条关联，重建 {} 篇成果缓存（批次 {}）",
                summary.repinned, summary.rebuilt, summary.round_id
            );
        }

        Commands::Metrics { from, to } => {
            let settings = load_settings(&db_path).await?;
            let repos = EvaluationRepositories::open(&db_path)?;
            let metrics =
                MetricsAggregator::new(repos, settings).compute_all(YearRange::new(from, to))?;
            println!("已更新 {} 条作者指标", metrics.len());
        }
    }

    Ok(())
}
