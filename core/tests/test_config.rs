#[cfg(test)]
mod tests {
    use std::time::Duration;

    use framecrypt_core::constants::{
        DEFAULT_BACKOFF_MS, DEFAULT_KEYSTREAM_BLOCK_LEN, DEFAULT_PROGRESS_INTERVAL,
        DEFAULT_TRANSFORM_RETRIES, MAX_WORKERS,
    };
    use framecrypt_core::keystream::KeystreamKind;
    use framecrypt_core::logging::init_tracing;
    use framecrypt_core::pipeline::{
        ConfigError, ErrorPolicy, IdleStrategy, ParallelismProfile, PipelineConfig, QueueBound,
    };

    #[test]
    fn minimal_json_fills_defaults() {
        let config = PipelineConfig::from_json_str(r#"{"master_key": 1234}"#).unwrap();
        assert_eq!(config.master_key, Some(1234));
        assert_eq!(config.workers, 0);
        assert_eq!(config.max_items, None);
        assert_eq!(config.keystream, KeystreamKind::Blake3);
        assert_eq!(config.keystream_block_len, DEFAULT_KEYSTREAM_BLOCK_LEN);
        assert_eq!(config.input_queue, QueueBound::Unbounded);
        assert_eq!(config.output_queue, QueueBound::Unbounded);
        assert_eq!(config.idle, IdleStrategy::Park);
        assert_eq!(config.backoff_ms, DEFAULT_BACKOFF_MS);
        assert_eq!(config.transform_retries, DEFAULT_TRANSFORM_RETRIES);
        assert_eq!(config.on_transform_error, ErrorPolicy::Abort);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.backoff(), Duration::from_millis(DEFAULT_BACKOFF_MS));
    }

    #[test]
    fn full_json_is_parsed() {
        let json = r#"{
            "master_key": 42,
            "workers": 6,
            "max_items": 150,
            "keystream": "logistic",
            "input_queue": {"fixed": 8},
            "output_queue": "auto",
            "idle": "poll",
            "backoff_ms": 3,
            "transform_retries": 0,
            "on_transform_error": "skip",
            "progress_interval": 10
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.workers, 6);
        assert_eq!(config.max_items, Some(150));
        assert_eq!(config.keystream, KeystreamKind::Logistic);
        assert_eq!(config.input_queue, QueueBound::Fixed(8));
        assert_eq!(config.output_queue, QueueBound::Auto);
        assert_eq!(config.idle, IdleStrategy::Poll);
        assert_eq!(config.on_transform_error, ErrorPolicy::Skip);
        assert_eq!(config.key().unwrap().raw(), 42);
    }

    #[test]
    fn serialized_config_reads_back() {
        let config = PipelineConfig::new(7)
            .with_workers(3)
            .with_queues(QueueBound::Fixed(4), QueueBound::Unbounded)
            .with_error_policy(ErrorPolicy::Skip);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(PipelineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn key_is_required() {
        assert!(matches!(
            PipelineConfig::from_json_str("{}"),
            Err(ConfigError::MissingKey)
        ));
        assert!(matches!(PipelineConfig::default().key(), Err(ConfigError::MissingKey)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = PipelineConfig::new(1);

        let mut c = base.clone();
        c.workers = MAX_WORKERS + 1;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidWorkers(_))));

        let c = base.clone().with_queues(QueueBound::Fixed(0), QueueBound::Unbounded);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidQueueBound)));

        let mut c = base.clone();
        c.keystream_block_len = 8;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidBlockLen(8))));

        let mut c = base.clone();
        c.progress_interval = 0;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidProgressInterval)));

        let mut c = base;
        c.max_items = Some(0);
        assert!(matches!(c.validate(), Err(ConfigError::InvalidMaxItems)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"master_key": "nope"}"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"master_key": 1, "idle": "spin"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"master_key": 99, "workers": 2}"#).unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.workers, 2);

        assert!(matches!(
            PipelineConfig::from_json_file(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn explicit_workers_override_the_host() {
        let config = PipelineConfig::new(1).with_workers(5);
        let profile = config.profile(Some(1024));
        assert_eq!(profile.workers, 5);

        let auto = PipelineConfig::new(1).profile(Some(1024));
        assert!(auto.workers >= 1 && auto.workers <= MAX_WORKERS);
    }

    #[test]
    fn queue_bounds_resolve_against_profile() {
        let profile = ParallelismProfile::new(4, 16);
        assert_eq!(QueueBound::Unbounded.resolve(&profile), None);
        assert_eq!(QueueBound::Fixed(3).resolve(&profile), Some(3));
        assert_eq!(QueueBound::Auto.resolve(&profile), Some(16));
    }

    #[test]
    fn dynamic_profile_is_sane() {
        let profile = ParallelismProfile::dynamic(1280 * 720 * 3, 0.25, 64);
        assert!(profile.workers >= 1);
        assert!(profile.inflight_items >= 1 && profile.inflight_items <= 64);

        let single = ParallelismProfile::single_threaded();
        assert_eq!((single.workers, single.inflight_items), (1, 1));
        assert_eq!(ParallelismProfile::new(0, 0), ParallelismProfile::new(1, 1));
    }

    #[test]
    fn tracing_init_is_idempotent() {
        let _ = init_tracing(Some("framecrypt_core=debug"));
        assert!(!init_tracing(None).unwrap());
    }

    #[test]
    fn bad_filter_is_rejected() {
        // Only meaningful when RUST_LOG does not take precedence.
        if std::env::var("RUST_LOG").is_err() {
            assert!(init_tracing(Some("framecrypt_core=notalevel")).is_err());
        }
    }
}
