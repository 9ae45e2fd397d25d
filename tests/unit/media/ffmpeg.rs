use super::*;
use image::Rgba;

#[test]
fn parses_ffprobe_rates() {
    assert_eq!(parse_ff_ratio("30/1"), Some(30.0));
    assert_eq!(parse_ff_ratio("30000/1001").map(|f| (f * 100.0).round()), Some(2997.0));
    assert_eq!(parse_ff_ratio("0/0"), None);
    assert_eq!(parse_ff_ratio("25"), None);
}

#[test]
fn plain_probe_keeps_coded_size() {
    let json = br#"{
        "streams": [
            {"codec_type": "audio", "duration": "9.0"},
            {"codec_type": "video", "width": 64, "height": 48,
             "avg_frame_rate": "0/0", "r_frame_rate": "10/1"}
        ],
        "format": {"duration": "1.000000"}
    }"#;
    let probe = parse_probe(json).unwrap();
    assert_eq!((probe.info.width, probe.info.height), (64, 48));
    assert_eq!((probe.coded_width, probe.coded_height), (64, 48));
    assert_eq!(probe.quarter_turns, 0);
    assert_eq!(probe.info.fps, 10.0);
    assert_eq!(probe.info.duration_secs, 1.0);
    assert_eq!(probe.info.decoder, "ffmpeg");
}

#[test]
fn display_matrix_rotation_swaps_reported_size() {
    let json = br#"{
        "streams": [{
            "codec_type": "video", "width": 1920, "height": 1080,
            "avg_frame_rate": "30/1", "duration": "2.5",
            "side_data_list": [
                {"side_data_type": "Display Matrix", "rotation": -90}
            ]
        }]
    }"#;
    let probe = parse_probe(json).unwrap();
    assert_eq!(probe.quarter_turns, 1);
    assert_eq!((probe.info.width, probe.info.height), (1080, 1920));
    assert_eq!((probe.coded_width, probe.coded_height), (1920, 1080));
    assert_eq!(probe.info.duration_secs, 2.5);
}

#[test]
fn legacy_rotate_tag_is_honored() {
    let json = br#"{
        "streams": [{
            "codec_type": "video", "width": 640, "height": 360,
            "avg_frame_rate": "25/1", "tags": {"rotate": "270"}
        }]
    }"#;
    let probe = parse_probe(json).unwrap();
    assert_eq!(probe.quarter_turns, 3);
    assert_eq!((probe.info.width, probe.info.height), (360, 640));

    let flipped = br#"{
        "streams": [{
            "codec_type": "video", "width": 640, "height": 360,
            "avg_frame_rate": "25/1", "tags": {"rotate": "180"}
        }]
    }"#;
    let probe = parse_probe(flipped).unwrap();
    assert_eq!(probe.quarter_turns, 2);
    assert_eq!((probe.info.width, probe.info.height), (640, 360));
}

#[test]
fn probe_without_video_is_rejected() {
    let err = parse_probe(br#"{"streams": [{"codec_type": "audio"}]}"#).unwrap_err();
    assert!(err.to_string().contains("no video stream"), "{err}");
    assert!(parse_probe(b"not json").is_err());
}

#[test]
fn quarter_turns_normalize_angles() {
    assert_eq!(quarter_turns(0.0), 0);
    assert_eq!(quarter_turns(90.0), 1);
    assert_eq!(quarter_turns(-90.0), 3);
    assert_eq!(quarter_turns(450.0), 1);
    assert_eq!(quarter_turns(f64::NAN), 0);
}

#[test]
fn upright_turns_clockwise() {
    let mut img = RgbaImage::new(3, 2);
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    let turned = upright(img.clone(), 1);
    assert_eq!(turned.dimensions(), (2, 3));
    assert_eq!(turned.get_pixel(1, 0).0, [255, 0, 0, 255]);
    assert_eq!(upright(img.clone(), 0), img);
}
