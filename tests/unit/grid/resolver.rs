use super::*;

fn hints() -> GridHints {
    GridHints::default()
}

#[test]
fn explicit_grid_derives_frame_size() {
    let r = resolve_grid((320, 128), &GridHints::grid("5x2")).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 5, rows: 2 });
    assert_eq!((r.layout.frame_width, r.layout.frame_height), (64, 64));
    assert_eq!(r.frame_count, 10);
    assert_eq!(r.method, ResolutionMethod::Explicit);
    assert_eq!(r.confidence, 1.0);
}

#[test]
fn explicit_grid_must_divide_sheet() {
    let err = resolve_grid((321, 128), &GridHints::grid("5x2")).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
    let err = resolve_grid((320, 128), &GridHints::grid("5x3")).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
}

#[test]
fn frames_hint_caps_processing_count() {
    let r = resolve_grid((320, 128), &GridHints::grid("5x2").with_frames(6)).unwrap();
    assert_eq!(r.frame_count, 6);

    let err = resolve_grid((320, 128), &GridHints::grid("5x2").with_frames(11)).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));

    let err = resolve_grid((320, 128), &GridHints::grid("5x2").with_frames(0)).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
}

#[test]
fn frame_size_hint_fills_sheet() {
    let h = GridHints {
        frame_width: Some(64),
        frame_height: Some(32),
        ..hints()
    };
    let r = resolve_grid((256, 128), &h).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 4, rows: 4 });
    assert_eq!(r.method, ResolutionMethod::FrameSize);
}

#[test]
fn frame_size_hint_rejects_misfits() {
    let odd = GridHints {
        frame_width: Some(60),
        frame_height: Some(64),
        ..hints()
    };
    assert!(matches!(
        resolve_grid((256, 128), &odd).unwrap_err(),
        SpriteError::InvalidGrid(_)
    ));

    let oversized = GridHints {
        frame_width: Some(512),
        frame_height: Some(64),
        ..hints()
    };
    assert!(matches!(
        resolve_grid((256, 128), &oversized).unwrap_err(),
        SpriteError::InvalidGrid(_)
    ));

    let half = GridHints {
        frame_width: Some(64),
        ..hints()
    };
    assert!(matches!(
        resolve_grid((256, 128), &half).unwrap_err(),
        SpriteError::InvalidGrid(_)
    ));
}

#[test]
fn frame_size_with_row_width_and_count_shrinks_grid() {
    let h = GridHints {
        frame_width: Some(32),
        frame_height: Some(32),
        frames_per_row: Some(3),
        frames: Some(5),
        ..hints()
    };
    let r = resolve_grid((128, 96), &h).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 3, rows: 2 });
    assert_eq!(r.frame_count, 5);

    let too_wide = GridHints {
        frames_per_row: Some(5),
        ..h
    };
    assert!(matches!(
        resolve_grid((128, 96), &too_wide).unwrap_err(),
        SpriteError::InvalidGrid(_)
    ));
}

#[test]
fn frames_per_row_with_count_derives_rows() {
    let h = GridHints {
        frames_per_row: Some(4),
        frames: Some(8),
        ..hints()
    };
    let r = resolve_grid((256, 128), &h).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 4, rows: 2 });
    assert_eq!((r.layout.frame_width, r.layout.frame_height), (64, 64));
    assert_eq!(r.method, ResolutionMethod::FramesPerRow);
}

#[test]
fn frames_per_row_alone_picks_rows_by_detection() {
    let h = GridHints {
        frames_per_row: Some(5),
        ..hints()
    };
    let r = resolve_grid((320, 128), &h).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 5, rows: 2 });
    assert_eq!(r.method, ResolutionMethod::FramesPerRow);
    assert!(r.alternatives.iter().all(|c| c.grid.cols == 5));
}

#[test]
fn auto_detects_square_tiles() {
    let r = resolve_grid((320, 128), &hints()).unwrap();
    assert_eq!(r.layout.grid, Grid { cols: 5, rows: 2 });
    assert_eq!(r.method, ResolutionMethod::AutoDetected);
    assert!(r.confidence > 0.9);
    assert!(!r.alternatives.is_empty());
    assert!(r.alternatives.len() <= MAX_ALTERNATIVES);

    let auto = resolve_grid((320, 128), &GridHints::grid("auto")).unwrap();
    assert_eq!(auto.layout.grid, r.layout.grid);
}

#[test]
fn auto_detection_fails_on_prime_sides() {
    let err = resolve_grid((1, 1), &hints()).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
}

#[test]
fn zero_sized_sheet_is_rejected() {
    assert!(resolve_grid((0, 64), &GridHints::grid("1x1")).is_err());
}

#[test]
fn near_square_grid_for_counts() {
    assert_eq!(auto_grid_for_count(1).unwrap(), Grid { cols: 1, rows: 1 });
    assert_eq!(auto_grid_for_count(6).unwrap(), Grid { cols: 3, rows: 2 });
    assert_eq!(auto_grid_for_count(9).unwrap(), Grid { cols: 3, rows: 3 });
    assert_eq!(auto_grid_for_count(10).unwrap(), Grid { cols: 4, rows: 3 });
    assert!(auto_grid_for_count(0).is_err());
}

#[test]
fn huge_counts_do_not_overflow() {
    let g = auto_grid_for_count(4_000_000_000).unwrap();
    assert_eq!(g, Grid { cols: 63246, rows: 63246 });
    assert!(g.capacity() >= 4_000_000_000);

    let err = auto_grid_for_count(u32::MAX).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
}

#[test]
fn explicit_grid_with_overflowing_capacity_is_rejected() {
    let err = resolve_grid((70000, 70000), &GridHints::grid("70000x70000")).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)), "{err}");
}
