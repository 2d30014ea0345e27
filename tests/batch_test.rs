// ==========================================
// 全校批量选优集成测试
// ==========================================
// 测试目标: 学科并发执行、N 下限排除、取消信号
// ==========================================


use slot_evaluation::config::EvaluationSettings;
use slot_evaluation::domain::types::{AuthorKind, PublicationKind};
use slot_evaluation::engine::{
    BatchRunner, ConvergenceOptions, EngineError, PointsCache, SlotCalculator,
};
use slot_evaluation::logging;
use slot_evaluation::YearRange;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use test_helpers::{create_test_db, dec, Scenario};

/// 学科 1: 2 位作者 (N = 2)；学科 2: 1 位作者 (N = 1)
fn setup(db_path: &str) -> Scenario {
    let mut s = Scenario::new(db_path);
    s.discipline(1).discipline(2).author(1).author(2).author(3);
    s.assign(1, 1, 2022..=2022, Some("1"), "100", AuthorKind::ResearchOnly);
    s.assign(2, 1, 2022..=2022, Some("1"), "100", AuthorKind::ResearchOnly);
    s.assign(3, 2, 2022..=2022, Some("1"), "100", AuthorKind::ResearchOnly);

    s.publication(10, PublicationKind::Article, 2022, "100");
    s.publication(11, PublicationKind::Article, 2022, "140");
    s.publication(12, PublicationKind::Article, 2022, "70");
    s.link(10, 1, Some(1));
    s.link(11, 2, Some(1));
    s.link(12, 3, Some(2));

    PointsCache::new(s.repos.clone(), SlotCalculator::new(2019, 2017))
        .rebuild_all()
        .unwrap();
    s
}

#[tokio::test]
async fn test_run_all_disciplines() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let s = setup(&db_path);

    let settings = EvaluationSettings::default().with_min_n(dec("1.5"));
    let results = BatchRunner::new(db_path.clone(), settings)
        .run_all(
            YearRange::new(2022, 2022),
            ConvergenceOptions::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.is_ok()));

    let d1 = results.iter().find(|r| r.discipline_id == 1).unwrap();
    let report = d1.result.as_ref().unwrap();
    assert!(!report.excluded);
    assert_eq!(report.best_points(), dec("240"));

    let d2 = results.iter().find(|r| r.discipline_id == 2).unwrap();
    assert!(d2.result.as_ref().unwrap().excluded);

    assert!(s.repos.optimization_repo.latest_run(1).unwrap().is_some());
    assert!(s.repos.optimization_repo.latest_run(2).unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_batch_reports_each_discipline() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let _s = setup(&db_path);

    let results = BatchRunner::new(db_path.clone(), EvaluationSettings::default())
        .run_all(
            YearRange::new(2022, 2022),
            ConvergenceOptions::default(),
            Arc::new(AtomicBool::new(true)),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    for r in &results {
        assert!(matches!(r.result, Err(EngineError::Cancelled(id)) if id == r.discipline_id));
    }
}
