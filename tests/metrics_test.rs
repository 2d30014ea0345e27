// ==========================================
// 作者指标集成测试
// ==========================================
// 测试目标: 指标取值、零上限保护、缺省上限、重复计算幂等、按区间取选优结果
// ==========================================


use slot_evaluation::config::EvaluationSettings;
use slot_evaluation::domain::types::{AuthorKind, PublicationKind};
use slot_evaluation::engine::{
    DisciplineOptimizer, MetricsAggregator, PointsCache, SlotCalculator, SolverStrategy,
};
use slot_evaluation::logging;
use slot_evaluation::YearRange;
use test_helpers::{create_test_db, dec, Scenario};

fn years() -> YearRange {
    YearRange::new(2022, 2023)
}

/// 作者 1: 上限 2，三篇成果
/// 作者 2: 工作量 0 → 上限 0
/// 作者 3: 无申报 → 无额度记录
fn setup(db_path: &str) -> (Scenario, EvaluationSettings) {
    let settings = EvaluationSettings::default().with_min_n(dec("0"));
    let mut s = Scenario::new(db_path);
    s.discipline(1).author(1).author(2).author(3);
    s.assign(1, 1, 2022..=2023, Some("1"), "100", AuthorKind::ResearchOnly);
    s.assign(2, 1, 2022..=2023, Some("0"), "100", AuthorKind::ResearchOnly);

    s.publication(10, PublicationKind::Article, 2022, "100");
    s.publication(11, PublicationKind::Article, 2023, "100");
    s.publication(12, PublicationKind::Article, 2023, "60");
    s.publication(13, PublicationKind::Article, 2022, "100");
    s.publication(14, PublicationKind::Article, 2022, "100");
    s.link(10, 1, Some(1));
    s.link(11, 1, Some(1));
    s.link(12, 1, Some(1));
    s.link(13, 2, Some(1));
    s.link(14, 3, Some(1));

    PointsCache::new(s.repos.clone(), SlotCalculator::new(2019, 2017))
        .rebuild_all()
        .unwrap();
    DisciplineOptimizer::new(s.repos.clone(), settings.clone())
        .optimize(1, years(), SolverStrategy::Knapsack, "u")
        .unwrap()
        .unwrap();
    (s, settings)
}

#[test]
fn test_metric_values() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (s, settings) = setup(&db_path);

    let metric = MetricsAggregator::new(s.repos.clone(), settings)
        .compute(1, 1, years())
        .unwrap();

    assert_eq!(metric.slot_ceiling, dec("2"));
    assert_eq!(metric.slot_achieved, dec("2"));
    assert_eq!(metric.points_achieved, dec("200"));
    assert_eq!(metric.avg_points_per_slot, dec("100"));
    assert_eq!(metric.slot_achieved_all_works, dec("2.7071"));
    assert_eq!(metric.points_achieved_all_works, dec("242.4264"));
    assert_eq!(metric.avg_points_per_slot_all_works, dec("89.5521"));
    assert_eq!(metric.utilization_pct, dec("100"));
    assert_eq!(metric.selected_publication_ids, vec![10, 11]);
    assert_eq!(metric.unselected_publication_ids, vec![12]);

    let stored = s.repos.metric_repo.find(1, 1).unwrap().unwrap();
    assert_eq!(stored, metric);
}

#[test]
fn test_zero_ceiling_yields_zero_utilization() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (s, settings) = setup(&db_path);

    let metric = MetricsAggregator::new(s.repos.clone(), settings)
        .compute(2, 1, years())
        .unwrap();

    assert_eq!(metric.slot_ceiling, dec("0"));
    assert_eq!(metric.slot_achieved, dec("0"));
    assert_eq!(metric.utilization_pct, dec("0"));
    assert_eq!(metric.avg_points_per_slot, dec("0"));
    assert_eq!(metric.unselected_publication_ids, vec![13]);
}

#[test]
fn test_missing_quota_uses_default_ceiling() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (s, settings) = setup(&db_path);

    let metric = MetricsAggregator::new(s.repos.clone(), settings)
        .compute(3, 1, years())
        .unwrap();

    assert_eq!(metric.slot_ceiling, dec("4"));
    assert_eq!(metric.utilization_pct, dec("0"));
    assert_eq!(metric.points_achieved_all_works, dec("100"));
}

#[test]
fn test_compute_all_is_idempotent() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (s, settings) = setup(&db_path);
    let aggregator = MetricsAggregator::new(s.repos.clone(), settings);

    let first = aggregator.compute_all(years()).unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(s.repos.metric_repo.count().unwrap(), 3);

    let second = aggregator.compute_all(years()).unwrap();
    assert_eq!(first, second);
    assert_eq!(s.repos.metric_repo.count().unwrap(), 3);
}

#[test]
fn test_achieved_values_follow_requested_range() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let (s, settings) = setup(&db_path);

    // 新区间的运行替换学科的旧运行
    let latest = YearRange::new(2023, 2023);
    DisciplineOptimizer::new(s.repos.clone(), settings.clone())
        .optimize(1, latest, SolverStrategy::Knapsack, "u")
        .unwrap()
        .unwrap();
    let aggregator = MetricsAggregator::new(s.repos.clone(), settings);

    // 2022-2023 已无对应运行：上限仍取该区间额度，已入选为 0
    let stale = aggregator.compute(1, 1, years()).unwrap();
    assert_eq!(stale.slot_ceiling, dec("2"));
    assert_eq!(stale.slot_achieved, dec("0"));
    assert_eq!(stale.points_achieved, dec("0"));
    assert_eq!(stale.utilization_pct, dec("0"));
    assert!(stale.selected_publication_ids.is_empty());
    assert_eq!(stale.unselected_publication_ids, vec![10, 11, 12]);

    let current = aggregator.compute(1, 1, latest).unwrap();
    assert_eq!(current.slot_ceiling, dec("1"));
    assert_eq!(current.slot_achieved, dec("1"));
    assert_eq!(current.points_achieved, dec("100"));
    assert_eq!(current.utilization_pct, dec("100"));
    assert_eq!(current.selected_publication_ids, vec![11]);
    assert_eq!(current.unselected_publication_ids, vec![12]);
}
