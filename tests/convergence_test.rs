// ==========================================
// 收敛循环集成测试
// ==========================================
// 场景: 学科 D=1，区间 2022-2023
// - 作者 A(1): 工作量 0.5 → 上限 1
// - 作者 B(2): 工作量 1.0 → 上限 2
// - P1(10): 200 分，仅 A
// - P(20):  100 分，A 与 B 合著（均计入 D）
// 第 1 轮: A 选 P1，B 选 P → 300；A 在 P 上为弱绑定
// 第 2 轮: 解除 A-P 后 B 的槽位降为 sqrt(1/2)，得分 270.7107 < 300 → 回滚
// 回滚后的绑定集合必须与解除前快照一致，否则报错终止
// ==========================================


use slot_evaluation::config::{config_keys, ConfigManager, EvaluationSettings};
use slot_evaluation::domain::types::{AuthorKind, ConvergenceState, PinAction, PublicationKind};
use slot_evaluation::engine::{
    ConvergenceController, ConvergenceEvent, ConvergenceEventPublisher, ConvergenceEventType,
    ConvergenceOptions, EngineError, EvaluationRepositories, PointsCache, SlotCalculator,
    SolverStrategy,
};
use slot_evaluation::logging;
use slot_evaluation::YearRange;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use test_helpers::{create_test_db, dec, set_config, Scenario};

const YEARS: (i32, i32) = (2022, 2023);

struct Fixture {
    scenario: Scenario,
    settings: EvaluationSettings,
    link_a_p1: i64,
    link_a_p: i64,
}

async fn setup(db_path: &str) -> Fixture {
    set_config(db_path, config_keys::MIN_N, "0");

    let mut s = Scenario::new(db_path);
    s.discipline(1).author(1).author(2);
    s.assign(1, 1, 2022..=2023, Some("0.5"), "100", AuthorKind::ResearchOnly);
    s.assign(2, 1, 2022..=2023, Some("1"), "100", AuthorKind::ResearchOnly);
    s.publication(10, PublicationKind::Article, 2022, "200");
    s.publication(20, PublicationKind::Article, 2022, "100");
    let link_a_p1 = s.link(10, 1, Some(1));
    let link_a_p = s.link(20, 1, Some(1));
    s.link(20, 2, Some(1));

    let config = ConfigManager::new(db_path).unwrap();
    let settings = EvaluationSettings::load(&config).await.unwrap();

    PointsCache::new(
        s.repos.clone(),
        SlotCalculator::new(settings.reform_year, settings.first_evaluated_year),
    )
    .rebuild_all()
    .unwrap();

    Fixture {
        scenario: s,
        settings,
        link_a_p1,
        link_a_p,
    }
}

fn years() -> YearRange {
    YearRange::new(YEARS.0, YEARS.1)
}

#[tokio::test]
async fn test_regression_is_rolled_back() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;
    let repos = f.scenario.repos.clone();
    let pinned_before = repos.publication_repo.pinned_link_ids(1, years()).unwrap();

    let options = ConvergenceOptions {
        strategy: SolverStrategy::Knapsack,
        unpin: true,
        institution: "u".to_string(),
    };
    let report = ConvergenceController::new(repos.clone(), f.settings.clone())
        .run(1, years(), &options)
        .unwrap();

    assert!(!report.excluded);
    assert_eq!(report.baseline_points, None);
    assert_eq!(report.rounds.len(), 2);
    assert_eq!(report.rounds[0].state, ConvergenceState::Accepted);
    assert_eq!(report.rounds[0].total_points, dec("300"));
    assert_eq!(report.rounds[0].detached, vec![f.link_a_p]);
    assert_eq!(report.rounds[1].state, ConvergenceState::Rejected);
    assert_eq!(report.rounds[1].total_points, dec("270.7107"));
    assert_eq!(report.restored, vec![f.link_a_p]);
    assert_eq!(report.final_state, ConvergenceState::Terminal);
    assert_eq!(report.best_points(), dec("300"));

    // 绑定集合与开始前完全一致
    let pinned_after = repos.publication_repo.pinned_link_ids(1, years()).unwrap();
    assert_eq!(pinned_before, pinned_after);

    // 缓存已按恢复后的绑定重建
    let entries = repos.slot_cache_repo.find_author_entries(20).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.slot == dec("1")));

    // 数据库中保存的是最优一轮
    let stored = repos.optimization_repo.latest_outcome(1).unwrap().unwrap();
    assert_eq!(stored.run.total_points, dec("300"));

    // 解除与恢复使用同一批次号
    let detached = repos
        .pin_log_repo
        .find_by_discipline(1, Some(PinAction::Detach))
        .unwrap();
    assert_eq!(detached.len(), 1);
    let round = repos.pin_log_repo.find_by_round(&detached[0].round_id).unwrap();
    assert_eq!(round.len(), 2);
    assert!(round.iter().any(|c| c.action == PinAction::Restore));
}

#[tokio::test]
async fn test_without_unpin_single_round() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;

    let report = ConvergenceController::new(f.scenario.repos.clone(), f.settings.clone())
        .run(1, years(), &ConvergenceOptions::default())
        .unwrap();

    assert_eq!(report.rounds.len(), 1);
    assert!(report.rounds[0].detached.is_empty());
    assert_eq!(report.best_points(), dec("300"));
    assert!(report.restored.is_empty());

    // 第二次运行报告上一次的得分作为基线
    let again = ConvergenceController::new(f.scenario.repos.clone(), f.settings)
        .run(1, years(), &ConvergenceOptions::default())
        .unwrap();
    assert_eq!(again.baseline_points, Some(dec("300")));
}

#[tokio::test]
async fn test_single_round_limit_never_detaches() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;
    let mut settings = f.settings.clone();
    settings.convergence_max_rounds = 1;

    let options = ConvergenceOptions {
        unpin: true,
        ..Default::default()
    };
    let report = ConvergenceController::new(f.scenario.repos.clone(), settings)
        .run(1, years(), &options)
        .unwrap();

    assert_eq!(report.rounds.len(), 1);
    assert!(report.rounds[0].detached.is_empty());
    let link = f
        .scenario
        .repos
        .publication_repo
        .find_link(f.link_a_p)
        .unwrap()
        .unwrap();
    assert!(link.pinned);
}

#[tokio::test]
async fn test_cancelled_before_first_round() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;

    let cancel = Arc::new(AtomicBool::new(true));
    let result = ConvergenceController::new(f.scenario.repos.clone(), f.settings)
        .with_cancel_flag(cancel)
        .run(1, years(), &ConvergenceOptions::default());

    assert!(matches!(result, Err(EngineError::Cancelled(1))));
    assert!(f
        .scenario
        .repos
        .optimization_repo
        .latest_run(1)
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_excluded_discipline_terminates_immediately() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;
    let settings = f.settings.with_min_n(dec("12"));

    let repos = EvaluationRepositories::open(&db_path).unwrap();
    let report = ConvergenceController::new(repos, settings)
        .run(1, years(), &ConvergenceOptions::default())
        .unwrap();

    assert!(report.excluded);
    assert!(report.rounds.is_empty());
    assert!(report.best.is_none());
    assert_eq!(report.final_state, ConvergenceState::Terminal);
}

/// 解除弱绑定后，模拟外部并发修改：再解除一条未参与本轮的绑定
struct ConcurrentUnpin {
    repos: EvaluationRepositories,
    link_id: i64,
    seen: Mutex<Vec<ConvergenceEventType>>,
}

impl ConvergenceEventPublisher for ConcurrentUnpin {
    fn publish(&self, event: &ConvergenceEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(event.event_type);
        }
        if event.event_type == ConvergenceEventType::LinksDetached {
            self.repos.publication_repo.set_pinned(&[self.link_id], false)?;
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_external_pin_change_fails_rollback() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let f = setup(&db_path).await;
    let repos = f.scenario.repos.clone();

    let publisher = Arc::new(ConcurrentUnpin {
        repos: repos.clone(),
        link_id: f.link_a_p1,
        seen: Mutex::new(Vec::new()),
    });
    let options = ConvergenceOptions {
        unpin: true,
        ..Default::default()
    };
    let result = ConvergenceController::new(repos.clone(), f.settings.clone())
        .with_event_publisher(publisher.clone())
        .run(1, years(), &options);

    match result {
        Err(EngineError::ConvergenceRollbackFailure {
            discipline_id,
            missing,
            unexpected,
        }) => {
            assert_eq!(discipline_id, 1);
            assert_eq!(missing, vec![f.link_a_p1]);
            assert!(unexpected.is_empty());
        }
        other => panic!("应因绑定集合不一致而终止, got {:?}", other.map(|r| r.rounds)),
    }

    // 本轮解除的绑定已恢复，外部修改保持原样
    assert!(repos.publication_repo.find_link(f.link_a_p).unwrap().unwrap().pinned);
    assert!(!repos.publication_repo.find_link(f.link_a_p1).unwrap().unwrap().pinned);

    // 最优结果仍是第 1 轮
    let stored = repos.optimization_repo.latest_run(1).unwrap().unwrap();
    assert_eq!(stored.total_points, dec("300"));

    let seen = publisher.seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            ConvergenceEventType::RoundAccepted,
            ConvergenceEventType::LinksDetached,
            ConvergenceEventType::RoundRejected,
        ]
    );
}
