use super::*;
use crate::foundation::core::Grid;
use crate::foundation::raster::encode_png;
use image::Rgba;

/// 3x2 sheet of 4x4 tiles, each tile filled with its index in the red channel.
fn numbered_sheet() -> RgbaImage {
    RgbaImage::from_fn(12, 8, |x, y| {
        let idx = (y / 4) * 3 + x / 4;
        Rgba([idx as u8, 0, 0, if idx % 2 == 0 { 255 } else { 128 }])
    })
}

fn layout() -> SheetLayout {
    SheetLayout::new(Grid::new(3, 2).unwrap(), 4, 4).unwrap()
}

#[test]
fn crops_tiles_in_row_major_order() {
    let frames = slice_image(&numbered_sheet(), &layout(), None).unwrap();
    assert_eq!(frames.len(), 6);
    for (i, f) in frames.iter().enumerate() {
        assert_eq!(f.index, i as u32);
        assert_eq!((f.row, f.col), (i as u32 / 3, i as u32 % 3));
        assert_eq!(f.dimensions(), (4, 4));
        assert!(f.image.pixels().all(|p| p.0[0] == i as u8));
    }
    assert_eq!(frames[1].image.get_pixel(0, 0).0[3], 128);
}

#[test]
fn frame_count_limits_output() {
    let frames = slice_image(&numbered_sheet(), &layout(), Some(4)).unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[3].index, 3);
    assert!(slice_image(&numbered_sheet(), &layout(), Some(7)).is_err());
    assert!(slice_image(&numbered_sheet(), &layout(), Some(0)).is_err());
}

#[test]
fn grid_larger_than_image_is_invalid() {
    let big = SheetLayout::new(Grid::new(4, 2).unwrap(), 4, 4).unwrap();
    let err = slice_image(&numbered_sheet(), &big, None).unwrap_err();
    assert!(matches!(err, SpriteError::InvalidGrid(_)));
}

#[test]
fn slice_decodes_bytes() {
    let png = encode_png(&numbered_sheet()).unwrap();
    let frames = slice(&png, &layout(), None).unwrap();
    assert_eq!(frames[5].image.get_pixel(2, 2).0, [5, 0, 0, 128]);

    let err = slice(b"definitely not an image", &layout(), None).unwrap_err();
    assert!(matches!(err, SpriteError::Decode(_)));
}
