use super::*;
use crate::compositor::CompositorOpts;
use crate::device::PageDevice;

const GROUP_PAGE: &str = r###"{
  "width": 200,
  "height": 200,
  "color_model": "rgb",
  "ops": [
    { "op": "push_device" },
    { "op": "begin_group", "isolated": true,
      "bbox": { "x0": 0, "y0": 0, "x1": 100, "y1": 100 } },
    { "op": "fill_rect", "rect": [0, 0, 200, 200], "color": { "rgb": [1, 0, 0] } },
    { "op": "end_group" },
    { "op": "pop_device" },
    { "op": "fill_path", "path": "M150 150 L160 150 L160 160 Z", "rule": "even_odd",
      "color": { "gray": 0 } },
    { "op": "copy_mono", "x": 190, "y": 0, "rows": ["##", "#."], "color": { "cmyk": [0, 0, 0, 1] } }
  ]
}"###;

fn render(script: &PageScript) -> Raster {
    let mut dev = PageDevice::new(script.page_raster().unwrap(), CompositorOpts::default());
    script.play(&mut dev).unwrap();
    dev.into_raster().unwrap()
}

#[test]
fn isolated_group_script() {
    let script = PageScript::from_json(GROUP_PAGE).unwrap();
    assert!(script.uses_transparency());
    assert_eq!(script.ops.len(), 7);

    let page = render(&script);
    assert_eq!(page.pixel(50, 50), &[255, 0, 0]);
    assert_eq!(page.pixel(150, 110), &[255, 255, 255]);
    assert_eq!(page.pixel(155, 152), &[0, 0, 0]);
    assert_eq!(page.pixel(190, 1), &[0, 0, 0]);
    assert_eq!(page.pixel(191, 1), &[255, 255, 255]);
}

#[test]
fn background_fills_the_page() {
    let script = PageScript::from_json(
        r#"{ "width": 4, "height": 4, "color_model": "gray", "background": { "gray": 0.5 } }"#,
    )
    .unwrap();
    assert!(!script.uses_transparency());
    let page = render(&script);
    assert_eq!(page.pixel(3, 3), &[128]);
}

#[test]
fn bad_path_data_is_reported_with_its_op() {
    let err = PageScript::from_json(
        r#"{ "width": 4, "height": 4,
             "ops": [ { "op": "fill_path", "path": "M 0 0 X 5", "color": { "gray": 0 } } ] }"#,
    )
    .unwrap_err();
    assert!(matches!(err, LaminaError::Serde(_)));
    assert!(err.to_string().contains("op 0"), "{err}");
}

#[test]
fn empty_page_is_rejected() {
    let err = PageScript::from_json(r#"{ "width": 0, "height": 4 }"#).unwrap_err();
    assert!(matches!(err, LaminaError::Range(_)));
}

#[test]
fn unknown_op_fails_to_parse() {
    let err = PageScript::from_json(r#"{ "width": 1, "height": 1, "ops": [ { "op": "blur" } ] }"#)
        .unwrap_err();
    assert!(matches!(err, LaminaError::Serde(_)));
}

#[test]
fn whole_image_in_one_op() {
    let script = PageScript {
        width: 3,
        height: 2,
        color_model: ColorModel::Rgb,
        background: None,
        ops: vec![ScriptOp::Image {
            x: 1,
            y: 0,
            width: 1,
            height: 2,
            n_comps: 1,
            data: vec![0, 64],
        }],
    };
    let text = serde_json::to_string(&script).unwrap();
    let back = PageScript::from_json(&text).unwrap();
    assert_eq!(back, script);
    let page = render(&back);
    assert_eq!(page.pixel(1, 0), &[0, 0, 0]);
    assert_eq!(page.pixel(1, 1), &[64, 64, 64]);
    assert_eq!(page.pixel(0, 0), &[255, 255, 255]);
}
