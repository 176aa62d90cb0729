mod common;

use queuep::config::load_config;
use queuep::{Config, ConfigError, DirtyCheckerConfig, OverflowPolicy, QueueError, Registry, TimeUnit};

use common::{init_logging, recording_consumer};

#[test]
fn load_config_matches_toml() {
    let cfg: Config = load_config("queuep.toml").expect("failed to load config");

    assert_eq!(cfg.queues.len(), 3);

    let telemetry = cfg.queue("telemetry").unwrap();
    assert_eq!(telemetry.interval_ms, Some(50));
    assert_eq!(telemetry.capacity, Some(1024));
    assert!(matches!(
        &telemetry.dirty_checker,
        DirtyCheckerConfig::Any { checkers } if checkers.len() == 2
    ));

    let presence = cfg.queue("presence").unwrap();
    assert_eq!(presence.overflow_policy, Some(OverflowPolicy::DropOldest));

    assert_eq!(cfg.queue("default").unwrap().dirty_checker, DirtyCheckerConfig::Naive);
}

#[tokio::test]
async fn every_declared_queue_can_be_started() {
    init_logging();
    let cfg = Config::from_toml(&std::fs::read_to_string("queuep.toml").unwrap()).unwrap();
    let registry = Registry::new();

    for def in &cfg.queues {
        let (consumer, _) = recording_consumer();
        let options = def.options(&cfg.defaults).unwrap().consumer(consumer);
        registry.init_queue(def.id.clone(), options).unwrap();
    }

    assert_eq!(registry.queue_ids(), vec!["default", "presence", "telemetry"]);
    assert_eq!(registry.get_stats("telemetry").unwrap().interval_ms, 50);
    assert_eq!(registry.get_stats("default").unwrap().interval_ms, 10);
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_config("does-not-exist.toml"),
        Err(ConfigError::Io(_))
    ));
}

fn expiration_queue(fields: &str) -> String {
    format!(
        r#"
        [[queues]]
        id = "q"
        [queues.dirty_checker]
        kind = "expiration"
        {fields}
        "#
    )
}

#[test]
fn expiration_units_accept_short_and_long_spellings() {
    let cases = [
        ("s", TimeUnit::Seconds),
        ("sec", TimeUnit::Seconds),
        ("seconds", TimeUnit::Seconds),
        ("m", TimeUnit::Minutes),
        ("min", TimeUnit::Minutes),
        ("minutes", TimeUnit::Minutes),
        ("h", TimeUnit::Hours),
        ("hr", TimeUnit::Hours),
        ("hours", TimeUnit::Hours),
    ];

    for (spelling, expected) in cases {
        let raw = expiration_queue(&format!("start = 1\nunit = \"{spelling}\""));
        let cfg = Config::from_toml(&raw).unwrap_or_else(|e| panic!("{spelling}: {e}"));
        match &cfg.queue("q").unwrap().dirty_checker {
            DirtyCheckerConfig::Expiration { unit, .. } => assert_eq!(*unit, expected),
            other => panic!("unexpected checker {other:?}"),
        }
    }
}

#[test]
fn unknown_expiration_unit_is_rejected() {
    let raw = expiration_queue("start = 1\nunit = \"fortnights\"");
    match Config::from_toml(&raw) {
        Err(ConfigError::Toml(e)) => assert!(e.to_string().contains("unknown time unit")),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn non_numeric_expiration_start_is_rejected() {
    let raw = expiration_queue("start = \"soon\"");
    assert!(matches!(Config::from_toml(&raw), Err(ConfigError::Toml(_))));
}

#[test]
fn negative_expiration_start_is_rejected() {
    let raw = expiration_queue("start = -5");
    assert!(matches!(
        Config::from_toml(&raw),
        Err(ConfigError::Invalid(QueueError::Configuration(_)))
    ));
}
