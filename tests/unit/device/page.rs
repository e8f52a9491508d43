use super::*;
use crate::foundation::core::Rect;

fn white(w: i32, h: i32) -> PageDevice {
    let raster = Raster::new(IntRect::new(0, 0, w, h), ColorModel::Rgb).unwrap();
    PageDevice::new(raster, CompositorOpts::default())
}

fn red(dev: &PageDevice) -> ColorIndex {
    dev.map_color(&ClientColor::rgb(1.0, 0.0, 0.0))
}

#[test]
fn drawing_outside_push_device_is_opaque() {
    let mut dev = white(4, 4);
    let c = red(&dev);
    dev.fill_rectangle(IntRect::new(1, 1, 3, 3), c).unwrap();
    let r = dev.into_raster().unwrap();
    assert_eq!(r.pixel(1, 1), &[255, 0, 0]);
    assert_eq!(r.pixel(3, 3), &[255, 255, 255]);
}

#[test]
fn transparency_calls_need_push_device() {
    let mut dev = white(4, 4);
    let err = dev
        .begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0)))
        .unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)));
    assert!(dev.pop_device().is_err());
    assert!(dev.set_blend_params(&BlendParamsUpdate::opacity(0.5)).is_err());
}

#[test]
fn isolated_red_group_over_white_page() {
    let mut dev = white(200, 200);
    dev.push_device(0).unwrap();
    dev.begin_group(&GroupParams {
        isolated: true,
        ..GroupParams::new(Rect::new(0.0, 0.0, 100.0, 100.0))
    })
    .unwrap();
    let c = red(&dev);
    dev.fill_rectangle(IntRect::new(0, 0, 200, 200), c).unwrap();
    dev.end_group().unwrap();
    dev.pop_device().unwrap();

    let r = dev.into_raster().unwrap();
    assert_eq!(r.pixel(50, 50), &[255, 0, 0]);
    assert_eq!(r.pixel(150, 150), &[255, 255, 255]);
}

#[test]
fn mask_ids_are_assigned_by_the_device() {
    let mut dev = white(10, 10);
    dev.push_device(0).unwrap();
    dev.begin_mask(&MaskParams::new(Rect::new(0.0, 0.0, 10.0, 10.0)))
        .unwrap();
    let gray = dev.map_color(&ClientColor::Gray(128.0 / 255.0));
    dev.fill_rectangle(IntRect::new(0, 0, 10, 10), gray).unwrap();
    dev.end_mask().unwrap();
    dev.begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 10.0, 10.0)))
        .unwrap();
    let c = red(&dev);
    dev.fill_rectangle(IntRect::new(0, 0, 10, 10), c).unwrap();
    dev.end_group().unwrap();
    dev.pop_device().unwrap();

    assert_eq!(dev.raster().pixel(5, 5), &[255, 127, 127]);
}

#[test]
fn colors_map_through_the_innermost_group() {
    let mut dev = white(4, 4);
    dev.push_device(0).unwrap();
    dev.begin_group(&GroupParams {
        group_color: crate::compositor::GroupColor::Gray,
        ..GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0))
    })
    .unwrap();
    assert_eq!(dev.color_model(), ColorModel::Gray);
    assert_eq!(dev.map_color(&ClientColor::WHITE), ColorIndex(0xff));
    dev.end_group().unwrap();
    assert_eq!(dev.color_model(), ColorModel::Rgb);
    dev.pop_device().unwrap();
}

#[test]
fn open_levels_fail_pop_device() {
    let mut dev = white(4, 4);
    dev.push_device(0).unwrap();
    dev.begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0)))
        .unwrap();
    assert!(matches!(dev.pop_device(), Err(LaminaError::InvalidState(_))));
}

#[test]
fn page_cannot_end_while_compositing() {
    let mut dev = white(4, 4);
    dev.push_device(0).unwrap();
    assert!(dev.push_device(0).is_err());
    assert!(dev.into_raster().is_err());
}

#[test]
fn images_paint_sample_runs() {
    let mut dev = white(4, 2);
    dev.begin_image(&ImageHeader {
        x: 1,
        y: 0,
        width: 3,
        height: 2,
        n_comps: 1,
    })
    .unwrap();
    dev.image_data(&[0, 0, 255], 1).unwrap();
    dev.image_data(&[255, 128, 255], 1).unwrap();
    assert!(dev.image_data(&[0, 0, 0], 1).is_err());
    dev.end_image().unwrap();

    let r = dev.into_raster().unwrap();
    assert_eq!(r.pixel(0, 0), &[255, 255, 255]);
    assert_eq!(r.pixel(1, 0), &[0, 0, 0]);
    assert_eq!(r.pixel(2, 0), &[0, 0, 0]);
    assert_eq!(r.pixel(3, 0), &[255, 255, 255]);
    assert_eq!(r.pixel(2, 1), &[128, 128, 128]);
}

#[test]
fn mono_bitmaps_paint_set_bits() {
    let mut dev = white(4, 4);
    let bm = MonoBitmap::from_rows(&["#.#", ".#."]).unwrap();
    let black = dev.map_color(&ClientColor::BLACK);
    dev.copy_mono(&bm, 1, 2, black).unwrap();
    let r = dev.into_raster().unwrap();
    assert_eq!(r.pixel(1, 2), &[0, 0, 0]);
    assert_eq!(r.pixel(2, 2), &[255, 255, 255]);
    assert_eq!(r.pixel(3, 2), &[0, 0, 0]);
    assert_eq!(r.pixel(2, 3), &[0, 0, 0]);
}

#[test]
fn stroked_line_covers_its_width() {
    let mut dev = white(10, 10);
    let mut line = BezPath::new();
    line.move_to((1.0, 5.0));
    line.line_to((9.0, 5.0));
    let black = dev.map_color(&ClientColor::BLACK);
    dev.stroke_path(
        &line,
        &StrokeStyle {
            width: 2.0,
            ..StrokeStyle::default()
        },
        black,
    )
    .unwrap();
    let r = dev.into_raster().unwrap();
    assert_eq!(r.pixel(5, 4), &[0, 0, 0]);
    assert_eq!(r.pixel(5, 5), &[0, 0, 0]);
    assert_eq!(r.pixel(5, 6), &[255, 255, 255]);
}
