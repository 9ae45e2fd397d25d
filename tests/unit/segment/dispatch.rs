use super::*;
use crate::foundation::core::Grid;
use crate::segment::backend::{ModelLoader, RembgLoader};
use image::Rgba;

/// Frames carry their index in the red channel of every pixel.
fn frames(n: u32) -> Vec<Frame> {
    let grid = Grid::new(n, 1).unwrap();
    (0..n)
        .map(|i| Frame::original(i, grid, RgbaImage::from_pixel(8, 8, Rgba([i as u8, 9, 9, 255]))))
        .collect()
}

#[derive(Clone, Copy)]
enum Behavior {
    Clear,
    FailOn(u8),
    PanicOn(u8),
    Sleep(Duration),
    Shrink,
    Garbage,
}

struct Scripted(Behavior);

impl Segmenter for Scripted {
    fn remove_background(&self, image: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut img = decode_rgba(image)?;
        let tag = img.get_pixel(0, 0).0[0];
        match self.0 {
            Behavior::FailOn(t) if t == tag => anyhow::bail!("scripted failure on {tag}"),
            Behavior::PanicOn(t) if t == tag => panic!("scripted panic"),
            Behavior::Sleep(d) => std::thread::sleep(d),
            Behavior::Shrink => img = RgbaImage::new(4, 4),
            Behavior::Garbage => return Ok(b"garbage".to_vec()),
            _ => {}
        }
        for p in img.pixels_mut() {
            p.0[3] = 0;
        }
        Ok(encode_png(&img)?)
    }
}

struct Loader(fn(ModelId) -> Option<Behavior>);

impl ModelLoader for Loader {
    fn load(&self, model: ModelId) -> anyhow::Result<Arc<dyn Segmenter>> {
        match (self.0)(model) {
            Some(b) => Ok(Arc::new(Scripted(b))),
            None => anyhow::bail!("no such weights"),
        }
    }
}

fn dispatcher(script: fn(ModelId) -> Option<Behavior>, timeout_secs: u64) -> ModelDispatcher {
    let registry = Arc::new(ModelRegistry::new(Arc::new(Loader(script))));
    ModelDispatcher::new(
        registry,
        DispatchOpts {
            threads: 3,
            timeout_secs,
        },
    )
    .unwrap()
}

#[test]
fn results_are_ordered_frame_then_model() {
    let d = dispatcher(|_| Some(Behavior::Clear), 30);
    let models = [ModelId::Silueta, ModelId::U2net];
    let report = d.dispatch(&frames(3), &models);

    let order: Vec<(u32, ModelId)> = report
        .results()
        .iter()
        .map(|r| (r.frame_index, r.model))
        .collect();
    assert_eq!(
        order,
        vec![
            (0, ModelId::Silueta),
            (0, ModelId::U2net),
            (1, ModelId::Silueta),
            (1, ModelId::U2net),
            (2, ModelId::Silueta),
            (2, ModelId::U2net),
        ]
    );
    assert_eq!(report.success_count(), 6);
    let out = report.get(2, ModelId::U2net).unwrap().image().unwrap();
    assert_eq!(out.get_pixel(3, 3).0, [2, 9, 9, 0]);
}

#[test]
fn one_failing_call_does_not_affect_others() {
    let d = dispatcher(
        |m| {
            Some(if m == ModelId::U2net {
                Behavior::FailOn(3)
            } else {
                Behavior::Clear
            })
        },
        30,
    );
    let report = d.dispatch(&frames(6), &[ModelId::IsnetGeneralUse, ModelId::U2net]);

    assert_eq!(report.results().len(), 12);
    assert_eq!(report.success_count(), 11);
    let failed: Vec<&ModelResult> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].frame_index, 3);
    assert_eq!(failed[0].model, ModelId::U2net);
    let failure = failed[0].error().unwrap();
    assert_eq!(failure.kind, FailureKind::Invocation);
    assert!(failure.message.contains("scripted failure on 3"));
    assert!(failed[0].image().is_none());
    assert_eq!(report.for_model(ModelId::U2net).count(), 6);
}

#[test]
fn load_failure_marks_every_frame_of_that_model() {
    let d = dispatcher(
        |m| (m != ModelId::Silueta).then_some(Behavior::Clear),
        30,
    );
    let report = d.dispatch(&frames(2), &[ModelId::Silueta, ModelId::U2netp]);
    for r in report.for_model(ModelId::Silueta) {
        assert_eq!(r.error().unwrap().kind, FailureKind::Load);
    }
    assert!(report.for_model(ModelId::U2netp).all(ModelResult::success));
}

#[test]
fn panics_become_failed_results() {
    let d = dispatcher(|_| Some(Behavior::PanicOn(1)), 30);
    let report = d.dispatch(&frames(3), &[ModelId::U2net]);
    let r = report.get(1, ModelId::U2net).unwrap();
    assert_eq!(r.error().unwrap().kind, FailureKind::Invocation);
    assert_eq!(report.success_count(), 2);
}

#[test]
fn slow_calls_time_out() {
    let d = dispatcher(|_| Some(Behavior::Sleep(Duration::from_secs(3))), 1);
    let report = d.dispatch(&frames(1), &[ModelId::U2net]);
    let failure = report.get(0, ModelId::U2net).unwrap().error().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.message.contains("timeout"));
}

#[cfg(target_os = "linux")]
#[test]
fn timed_out_rembg_child_is_reaped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = dir.path().join("rembg");
    let body = format!(
        "#!/bin/sh\nif [ \"$1\" = \"--help\" ]; then exit 0; fi\necho $$ > '{}'\nexec sleep 37\n",
        pid_file.display()
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let registry = Arc::new(ModelRegistry::new(Arc::new(RembgLoader::new(&script))));
    let d = ModelDispatcher::new(
        registry,
        DispatchOpts {
            threads: 1,
            timeout_secs: 1,
        },
    )
    .unwrap();
    let report = d.dispatch(&frames(1), &[ModelId::U2net]);

    let failure = report.get(0, ModelId::U2net).unwrap().error().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert!(
        !std::path::Path::new(&format!("/proc/{}", pid.trim())).exists(),
        "rembg child {} outlived dispatch",
        pid.trim()
    );
}

#[test]
fn bad_output_is_rejected() {
    let d = dispatcher(|_| Some(Behavior::Shrink), 30);
    let report = d.dispatch(&frames(1), &[ModelId::U2net]);
    let failure = report.get(0, ModelId::U2net).unwrap().error().unwrap();
    assert_eq!(failure.kind, FailureKind::Output);
    assert!(failure.message.contains("expected 8x8"));

    let d = dispatcher(|_| Some(Behavior::Garbage), 30);
    let report = d.dispatch(&frames(1), &[ModelId::U2net]);
    assert_eq!(
        report.get(0, ModelId::U2net).unwrap().error().unwrap().kind,
        FailureKind::Output
    );
}

#[test]
fn opts_reject_zero_values() {
    assert!(DispatchOpts::default().validate().is_ok());
    let zero_threads = DispatchOpts {
        threads: 0,
        ..DispatchOpts::default()
    };
    assert!(zero_threads.validate().is_err());
    let zero_timeout = DispatchOpts {
        timeout_secs: 0,
        ..DispatchOpts::default()
    };
    assert!(zero_timeout.validate().is_err());
}

#[test]
fn one_shot_removal_goes_through_registry() {
    let registry = ModelRegistry::new(Arc::new(Loader(|_| Some(Behavior::Clear))));
    let png = encode_png(&RgbaImage::from_pixel(2, 2, Rgba([5, 5, 5, 255]))).unwrap();
    let out = remove_background(&registry, &png, ModelId::Silueta).unwrap();
    assert_eq!(decode_rgba(&out).unwrap().get_pixel(0, 0).0[3], 0);
    assert_eq!(registry.load_count(), 1);
}
