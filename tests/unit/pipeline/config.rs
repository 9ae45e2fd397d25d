use super::*;

#[test]
fn defaults_cover_every_model() {
    let cfg = PipelineConfig::default();
    assert_eq!(cfg.model, ModelId::IsnetGeneralUse);
    assert_eq!(cfg.models, ModelId::ALL.to_vec());
    assert_eq!(cfg.failure_policy, FailurePolicy::FallbackToOriginal);
    assert_eq!(cfg.dispatch.threads, 4);
    assert_eq!(cfg.dispatch.timeout_secs, 120);
    assert_eq!(cfg.sample.fps, 10.0);
    assert!(cfg.validate().is_ok());
}

#[test]
fn json_overlays_defaults() {
    let cfg = PipelineConfig::from_json_str(
        r#"{
            "grid": { "grid": "5x2", "frames": 8 },
            "model": "u2netp",
            "models": ["silueta", "u2net"],
            "failure_policy": "strict",
            "dispatch": { "threads": 2 }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.grid.grid.as_deref(), Some("5x2"));
    assert_eq!(cfg.grid.frames, Some(8));
    assert_eq!(cfg.model, ModelId::U2netp);
    assert_eq!(cfg.models, vec![ModelId::Silueta, ModelId::U2net]);
    assert_eq!(cfg.failure_policy, FailurePolicy::Strict);
    assert_eq!(cfg.dispatch.threads, 2);
    assert_eq!(cfg.dispatch.timeout_secs, 120);
    assert_eq!(cfg.sample.max_width, 480);
}

#[test]
fn invalid_documents_are_validation_errors() {
    for bad in [
        r#"{ "model": "modnet" }"#,
        r#"{ "models": [] }"#,
        r#"{ "models": ["u2net", "u2net"] }"#,
        r#"{ "dispatch": { "threads": 0 } }"#,
        r#"{ "sample": { "fps": 0 } }"#,
        "not json",
    ] {
        let err = PipelineConfig::from_json_str(bad).unwrap_err();
        assert!(matches!(err, SpriteError::Validation(_)), "{bad}");
    }
}

#[test]
fn reads_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(&path, r#"{ "model": "silueta" }"#).unwrap();
    assert_eq!(
        PipelineConfig::from_json_file(&path).unwrap().model,
        ModelId::Silueta
    );
    assert!(PipelineConfig::from_json_file(&dir.path().join("missing.json")).is_err());
}
