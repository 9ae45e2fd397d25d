use std::io::Cursor;

use super::*;

#[test]
fn png_roundtrip_preserves_alpha() {
    let mut img = RgbaImage::new(2, 1);
    img.put_pixel(0, 0, image::Rgba([10, 20, 30, 0]));
    img.put_pixel(1, 0, image::Rgba([100, 50, 200, 128]));

    let png = encode_png(&img).unwrap();
    assert_eq!(image_dimensions(&png).unwrap(), (2, 1));

    let back = decode_rgba(&png).unwrap();
    assert_eq!(back, img);
}

#[test]
fn rgb_sources_decode_opaque() {
    let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();

    let img = decode_rgba(&buf).unwrap();
    assert_eq!(img.dimensions(), (3, 2));
    assert!(img.pixels().all(|p| p.0 == [1, 2, 3, 255]));
}

#[test]
fn garbage_and_empty_bytes_are_decode_errors() {
    assert!(matches!(decode_rgba(b""), Err(SpriteError::Decode(_))));
    assert!(matches!(
        decode_rgba(b"definitely not an image"),
        Err(SpriteError::Decode(_))
    ));
}

#[test]
fn gif_signature_sniffing() {
    assert!(is_gif(b"GIF89a......"));
    assert!(is_gif(b"GIF87a"));
    assert!(!is_gif(b"\x89PNG\r\n"));
}
