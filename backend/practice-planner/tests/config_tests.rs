use std::time::Duration;

use practice_planner::error::ConfigError;
use practice_planner::Config;
use serial_test::serial;

const VARS: &[&str] = &[
    "OPENROUTER_API_KEY",
    "APP__GENERATION__API_KEY",
    "MONGO_URI",
    "MONGO_DATABASE",
    "REDIS_URI",
    "PLANNER_SUBJECT",
    "APP__PLANNER__RECENT_WINDOW",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_api_key_is_reported() {
    clear_env();

    match Config::load() {
        Err(ConfigError::Missing(key)) => assert_eq!(key, "OPENROUTER_API_KEY"),
        other => panic!("expected missing api key, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_defaults_apply_when_only_key_is_set() {
    clear_env();
    std::env::set_var("OPENROUTER_API_KEY", "sk-test");

    let config = Config::load().unwrap();
    clear_env();

    assert_eq!(config.generation.api_key, "sk-test");
    assert_eq!(config.mongo_uri, "mongodb://localhost:27017");
    assert!(config.redis_uri.is_none());
    assert_eq!(config.planner.subject, "SAT");
    assert_eq!(config.planner.recent_window, 50);
    assert_eq!(config.planner.search_max_attempts, 3);
    assert_eq!(config.planner.search_base_backoff, Duration::from_secs(4));
    assert_eq!(config.planner.inter_topic_delay, Duration::from_secs(3));
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear_env();
    std::env::set_var("OPENROUTER_API_KEY", "sk-test");
    std::env::set_var("PLANNER_SUBJECT", "ACT");
    std::env::set_var("REDIS_URI", "redis://localhost:6379");
    std::env::set_var("APP__PLANNER__RECENT_WINDOW", "20");

    let config = Config::load().unwrap();
    clear_env();

    assert_eq!(config.planner.subject, "ACT");
    assert_eq!(config.planner.recent_window, 20);
    assert_eq!(config.redis_uri.as_deref(), Some("redis://localhost:6379"));
}
