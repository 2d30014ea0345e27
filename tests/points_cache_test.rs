// ==========================================
// 分值缓存集成测试
// ==========================================
// 测试目标: 缓存重建幂等、规则不适用时不落库、绑定重置
// ==========================================


use slot_evaluation::domain::types::{AuthorKind, PinAction, PublicationKind, ResponsibilityRole};
use slot_evaluation::engine::{EngineError, PointsCache, SlotCalculator};
use slot_evaluation::logging;
use slot_evaluation::YearRange;
use test_helpers::{create_test_db, dec, Scenario};

fn points_cache(scenario: &Scenario) -> PointsCache {
    PointsCache::new(scenario.repos.clone(), SlotCalculator::new(2019, 2017))
}

#[test]
fn test_rebuild_is_idempotent() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).discipline(2).author(1).author(2).author(3);
    s.publication(10, PublicationKind::Article, 2022, "140");
    s.link(10, 1, Some(1));
    s.link(10, 2, Some(1));
    s.link(10, 3, Some(2));

    let cache = points_cache(&s);
    cache.rebuild(10).unwrap();
    let first_d = s.repos.slot_cache_repo.find_discipline_entries(10).unwrap();
    let first_a = s.repos.slot_cache_repo.find_author_entries(10).unwrap();

    cache.rebuild(10).unwrap();
    let second_d = s.repos.slot_cache_repo.find_discipline_entries(10).unwrap();
    let second_a = s.repos.slot_cache_repo.find_author_entries(10).unwrap();

    assert_eq!(first_d, second_d);
    assert_eq!(first_a, second_a);
    assert_eq!(first_d.len(), 2);
    assert_eq!(first_a.len(), 3);

    // 学科 1: k=2, m=3 → sqrt(2/3)
    let a1 = first_a.iter().find(|a| a.author_id == 1).unwrap();
    assert_eq!(a1.slot, dec("0.8165"));
    // 学科 2: k=1, m=3 → sqrt(1/3)
    let a3 = first_a.iter().find(|a| a.author_id == 3).unwrap();
    assert_eq!(a3.slot, dec("0.5774"));
}

#[test]
fn test_single_author_full_slot() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1);
    s.publication(10, PublicationKind::Article, 2022, "70");
    s.link(10, 1, Some(1));

    let slots = points_cache(&s).rebuild(10).unwrap();
    assert_eq!(slots.authors.len(), 1);
    // 70 分属于 MID 档 (40 ≤ p < 100)：槽位 = sqrt(0.5)
    assert_eq!(slots.authors[0].slot, dec("0.7071"));
    assert_eq!(slots.authors[0].points, dec("49.4975"));
}

#[test]
fn test_inapplicable_publication_writes_nothing() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1);
    s.publication(10, PublicationKind::Article, 2016, "100");
    s.link(10, 1, Some(1));

    let cache = points_cache(&s);
    assert!(!cache.can_adapt(10).unwrap());
    let err = cache.rebuild(10).unwrap_err();
    assert!(matches!(err, EngineError::InapplicableRule { .. }));
    assert!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().is_empty());
}

#[test]
fn test_single_rebuild_clears_rows_when_points_zeroed() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1);
    s.publication(10, PublicationKind::Article, 2022, "100");
    s.link(10, 1, Some(1));

    let cache = points_cache(&s);
    cache.rebuild(10).unwrap();
    assert_eq!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().len(), 1);

    s.repos.publication_repo.update_points(10, dec("0")).unwrap();
    let err = cache.rebuild(10).unwrap_err();
    assert!(matches!(err, EngineError::InapplicableRule { publication_id: Some(10), .. }));
    assert!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().is_empty());
    assert!(s.repos.slot_cache_repo.find_discipline_entries(10).unwrap().is_empty());
    assert!(s
        .repos
        .slot_cache_repo
        .author_works_for_discipline(1, YearRange::new(2022, 2022))
        .unwrap()
        .is_empty());
}

#[test]
fn test_rebuild_all_clears_stale_rows_of_inapplicable() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1);
    s.publication(10, PublicationKind::Article, 2022, "100");
    s.publication(11, PublicationKind::Article, 2022, "40");
    s.link(10, 1, Some(1));
    s.link(11, 1, Some(1));

    let cache = points_cache(&s);
    let summary = cache.rebuild_all().unwrap();
    assert_eq!(summary.rebuilt, 2);
    assert!(summary.inapplicable.is_empty());

    s.repos.publication_repo.update_points(10, dec("0")).unwrap();
    let summary = cache.rebuild_all().unwrap();
    assert_eq!(summary.rebuilt, 1);
    assert_eq!(summary.inapplicable, vec![10]);
    assert!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().is_empty());
    assert_eq!(s.repos.slot_cache_repo.find_author_entries(11).unwrap().len(), 1);
}

#[test]
fn test_missing_publication_is_not_found() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let s = Scenario::new(&db_path);
    let err = points_cache(&s).rebuild(999).unwrap_err();
    assert!(matches!(err, EngineError::Repository(_)));
}

#[test]
fn test_editors_counted_when_no_credited_author() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1).author(2).author(3);
    s.publication(10, PublicationKind::Book, 2022, "100");
    // 外单位作者不计入，仅编者计入
    s.link_with(10, 1, None, false, ResponsibilityRole::Author);
    s.link_with(10, 2, Some(1), true, ResponsibilityRole::Editor);
    s.link_with(10, 3, None, false, ResponsibilityRole::Editor);

    let slots = points_cache(&s).rebuild(10).unwrap();
    assert_eq!(slots.authors.len(), 1);
    assert_eq!(slots.authors[0].author_id, 2);
    // 编者口径: k=1, m=2
    assert_eq!(slots.authors[0].slot, dec("0.7071"));
}

#[test]
fn test_reset_pins_repins_and_logs() {
    logging::init_test();
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let mut s = Scenario::new(&db_path);
    s.discipline(1).author(1).author(2);
    s.assign(1, 1, 2022..=2023, Some("1"), "100", AuthorKind::ResearchOnly);
    s.publication(10, PublicationKind::Article, 2022, "100");
    let l1 = s.link(10, 1, Some(1));
    s.link(10, 2, Some(1));

    let cache = points_cache(&s);
    s.repos.publication_repo.set_pinned(&[l1], false).unwrap();
    cache.rebuild(10).unwrap();
    assert_eq!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().len(), 1);

    let summary = cache.reset_pins(YearRange::new(2022, 2023)).unwrap();
    assert_eq!(summary.repinned, 1);
    assert_eq!(summary.rebuilt, 1);
    assert_eq!(s.repos.slot_cache_repo.find_author_entries(10).unwrap().len(), 2);

    let log = s.repos.pin_log_repo.find_by_round(&summary.round_id).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].link_id, l1);
    assert_eq!(log[0].action, PinAction::Reset);

    // 再次重置无变化
    let again = cache.reset_pins(YearRange::new(2022, 2023)).unwrap();
    assert_eq!(again.repinned, 0);
}
