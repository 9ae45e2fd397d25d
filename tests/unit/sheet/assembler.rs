use super::*;
use crate::foundation::core::Grid;
use crate::segment::model::ModelId;
use image::Rgba;

fn layout() -> SheetLayout {
    SheetLayout::new(Grid::new(3, 2).unwrap(), 4, 4).unwrap()
}

fn frame(i: u32) -> Frame {
    Frame::original(
        i,
        layout().grid,
        RgbaImage::from_pixel(4, 4, Rgba([10 * i as u8, 1, 2, 255])),
    )
}

#[test]
fn places_frames_by_index() {
    let frames: Vec<Frame> = (0..6).map(frame).collect();
    let sheet = assemble(&frames, &layout()).unwrap();
    assert_eq!(sheet.dimensions(), (12, 8));
    assert_eq!(sheet.get_pixel(0, 0).0, [0, 1, 2, 255]);
    assert_eq!(sheet.get_pixel(5, 1).0, [10, 1, 2, 255]);
    assert_eq!(sheet.get_pixel(11, 7).0, [50, 1, 2, 255]);
}

#[test]
fn missing_tiles_stay_transparent() {
    let frames = vec![frame(0), frame(4)];
    let sheet = assemble(&frames, &layout()).unwrap();
    assert_eq!(sheet.get_pixel(4, 0).0, [0, 0, 0, 0]);
    assert_eq!(sheet.get_pixel(8, 7).0, [0, 0, 0, 0]);
    assert_eq!(sheet.get_pixel(5, 5).0, [40, 1, 2, 255]);
}

#[test]
fn mismatched_frame_size_is_rejected() {
    let mut bad = frame(1);
    bad.image = RgbaImage::new(5, 4);
    let err = assemble(&[frame(0), bad], &layout()).unwrap_err();
    assert!(matches!(err, SpriteError::DimensionMismatch(_)));
    assert!(err.to_string().contains("frame 1"));
}

#[test]
fn out_of_grid_index_is_rejected() {
    let mut stray = frame(0);
    stray.index = 6;
    assert!(matches!(
        assemble(&[stray], &layout()).unwrap_err(),
        SpriteError::InvalidGrid(_)
    ));
}

#[test]
fn sheet_metadata_describes_layout() {
    let frames: Vec<Frame> = (0..5)
        .map(|i| {
            let f = frame(i);
            f.processed(ModelId::U2net, f.image.clone())
        })
        .collect();
    let sheet = assemble_sheet(&frames, &layout(), "walk.png", 1234).unwrap();
    let spec = sheet.spec();
    assert_eq!(spec.grid, layout().grid);
    assert_eq!(spec.frame_count, 5);
    assert_eq!(spec.source_filename, "walk.png");
    assert_eq!(spec.source_size_bytes, 1234);
    assert!(sheet.to_png().unwrap().starts_with(b"\x89PNG"));
}

#[test]
fn fit_frames_resizes_only_mismatched() {
    let mut frames = vec![frame(0), frame(1)];
    frames[1].image = RgbaImage::from_pixel(8, 2, Rgba([1, 1, 1, 255]));
    fit_frames(&mut frames, 4, 4).unwrap();
    assert!(frames.iter().all(|f| f.dimensions() == (4, 4)));
    assert_eq!(frames[0].image.get_pixel(0, 0).0, [0, 1, 2, 255]);
    assert!(fit_frames(&mut frames, 0, 4).is_err());
}
