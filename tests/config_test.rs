// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: 默认值回退、覆写生效、格式错误回退、配置快照
// ==========================================


use slot_evaluation::config::{
    config_keys, ConfigManager, EvaluationConfigReader, EvaluationSettings, GeneticParameters,
};
use test_helpers::{create_test_db, dec, set_config};

#[tokio::test]
async fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path);
    assert!(
        config_manager.is_ok(),
        "ConfigManager should be created successfully"
    );
}

#[tokio::test]
async fn test_defaults_when_empty() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config = ConfigManager::new(&db_path).unwrap();

    let settings = EvaluationSettings::load(&config).await.unwrap();
    assert_eq!(settings.reform_year, 2019);
    assert_eq!(settings.first_evaluated_year, 2017);
    assert_eq!(settings.quota.min_n, dec("12"));
    assert_eq!(settings.quota.author_max_slots, dec("4"));
    assert_eq!(settings.quota.author_max_mono_slots, dec("2"));
    assert_eq!(settings.quota.institution_total_multiplier, dec("3"));
    assert_eq!(settings.quota.institution_mono_multiplier, dec("0.8"));
    assert_eq!(settings.low_mono_threshold, dec("200"));
    assert_eq!(settings.low_mono_max_pct, dec("20"));
    assert_eq!(settings.outside_n_max_pct, dec("20"));
    assert_eq!(settings.convergence_max_rounds, 10);
    assert_eq!(settings.min_slot_filled, dec("0.8"));
    assert_eq!(settings.genetic, GeneticParameters::default());

    // 与代码内默认值一致
    assert_eq!(settings, EvaluationSettings::default());
}

#[tokio::test]
async fn test_overrides_take_effect() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    set_config(&db_path, config_keys::MIN_N, "3.5");
    set_config(&db_path, config_keys::REFORM_YEAR, "2020");
    set_config(&db_path, config_keys::CONVERGENCE_MAX_ROUNDS, "4");
    set_config(
        &db_path,
        config_keys::GENETIC_PROFILE,
        r#"{"population_size": 12, "seed": 9}"#,
    );

    let config = ConfigManager::new(&db_path).unwrap();
    assert_eq!(config.get_min_n().await.unwrap(), dec("3.5"));
    assert_eq!(config.get_reform_year().await.unwrap(), 2020);
    assert_eq!(config.get_convergence_max_rounds().await.unwrap(), 4);

    let genetic = config.get_genetic_parameters().await.unwrap();
    assert_eq!(genetic.population_size, 12);
    assert_eq!(genetic.seed, 9);
    assert_eq!(genetic.max_generations, GeneticParameters::default().max_generations);

    // 再次写入覆盖旧值
    set_config(&db_path, config_keys::MIN_N, "6");
    assert_eq!(config.get_min_n().await.unwrap(), dec("6"));
}

#[tokio::test]
async fn test_malformed_values_fall_back() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    set_config(&db_path, config_keys::OUTSIDE_N_MAX_PCT, "abc");
    set_config(&db_path, config_keys::FIRST_EVALUATED_YEAR, "soon");
    set_config(&db_path, config_keys::GENETIC_PROFILE, "{not json");

    let config = ConfigManager::new(&db_path).unwrap();
    assert_eq!(config.get_outside_n_max_pct().await.unwrap(), dec("20"));
    assert_eq!(config.get_first_evaluated_year().await.unwrap(), 2017);
    assert_eq!(
        config.get_genetic_parameters().await.unwrap(),
        GeneticParameters::default()
    );
}

#[tokio::test]
async fn test_config_snapshot_contains_overrides() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    set_config(&db_path, config_keys::MIN_N, "0");
    set_config(&db_path, config_keys::LOW_MONO_MAX_PCT, "25");

    let config = ConfigManager::new(&db_path).unwrap();
    let snapshot = config.get_config_snapshot().unwrap();
    let value: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
    assert_eq!(value[config_keys::MIN_N], "0");
    assert_eq!(value[config_keys::LOW_MONO_MAX_PCT], "25");

    let settings = EvaluationSettings::load(&config)
        .await
        .unwrap()
        .with_snapshot(snapshot.clone());
    assert_eq!(settings.config_snapshot.as_deref(), Some(snapshot.as_str()));
    assert_eq!(settings.low_mono_max_pct, dec("25"));
}
