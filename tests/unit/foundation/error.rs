use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(SpriteError::decode("x").to_string().contains("decode error:"));
    assert!(
        SpriteError::invalid_grid("x")
            .to_string()
            .contains("invalid grid:")
    );
    assert!(
        SpriteError::dimension_mismatch("x")
            .to_string()
            .contains("dimension mismatch:")
    );
    assert!(
        SpriteError::unsupported_format("x")
            .to_string()
            .contains("unsupported format:")
    );
    assert!(
        SpriteError::empty_source("x")
            .to_string()
            .contains("empty source:")
    );
    assert!(
        SpriteError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn model_errors_name_the_model() {
    let err = SpriteError::ModelInvocation {
        model: ModelId::U2net,
        message: "weights missing".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("u2net"));
    assert!(text.contains("weights missing"));

    let err = SpriteError::Timeout {
        model: ModelId::Silueta,
        after: Duration::from_secs(3),
    };
    assert!(err.to_string().contains("silueta"));
    assert_eq!(err.kind(), "timeout");
}

#[test]
fn frames_failed_reports_counts() {
    let err = SpriteError::FramesFailed {
        model: ModelId::U2netp,
        failed: 2,
        total: 10,
    };
    assert!(err.to_string().contains("2 of 10"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SpriteError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), "other");
}
