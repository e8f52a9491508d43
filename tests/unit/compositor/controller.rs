use super::*;
use crate::blend::BlendMode;
use crate::compositor::params::GroupColor;
use crate::foundation::core::Rect;

fn comp(w: i32, h: i32, model: ColorModel) -> Compositor {
    Compositor::new(IntRect::new(0, 0, w, h), model, CompositorOpts::default()).unwrap()
}

fn base_px(c: &Compositor, x: i32, y: i32) -> Vec<u8> {
    let b = c.stack().base();
    (0..b.n_chan).map(|p| b.get(p, x, y)).collect()
}

#[test]
fn isolated_red_group_lands_inside_its_bbox() {
    let mut c = comp(200, 200, ColorModel::Rgb);
    c.begin_group(&GroupParams {
        isolated: true,
        ..GroupParams::new(Rect::new(0.0, 0.0, 100.0, 100.0))
    })
    .unwrap();
    c.fill_rect(IntRect::new(0, 0, 200, 200), &[255, 0, 0]);
    c.end_group().unwrap();

    assert_eq!(base_px(&c, 50, 50), vec![255, 0, 0, 255]);
    assert_eq!(base_px(&c, 150, 150)[3], 0);
}

#[test]
fn opacity_scales_fill_alpha() {
    let mut c = comp(4, 4, ColorModel::Rgb);
    c.set_blend_params(&BlendParamsUpdate::opacity(0.5));
    c.fill_span(1, 0, 4, &[0, 0, 255]);
    assert_eq!(base_px(&c, 2, 1), vec![0, 0, 255, 128]);
    assert_eq!(base_px(&c, 2, 2)[3], 0);
}

#[test]
fn multiply_darkens_existing_color() {
    let mut c = comp(1, 1, ColorModel::Rgb);
    c.fill_span(0, 0, 1, &[255, 0, 0]);
    c.set_blend_params(&BlendParamsUpdate::blend_mode(BlendMode::Multiply));
    c.fill_span(0, 0, 1, &[0, 255, 0]);
    assert_eq!(base_px(&c, 0, 0), vec![0, 0, 0, 255]);
}

#[test]
fn group_in_other_color_space_is_isolated() {
    let mut c = comp(4, 4, ColorModel::Rgb);
    c.begin_group(&GroupParams {
        group_color: GroupColor::Gray,
        n_color_comps: 1,
        ..GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0))
    })
    .unwrap();
    assert_eq!(c.color_model(), ColorModel::Gray);
    assert!(c.stack().top().isolated);
    c.fill_span(0, 0, 4, &[128]);
    c.end_group().unwrap();
    assert_eq!(c.color_model(), ColorModel::Rgb);
    assert_eq!(base_px(&c, 1, 0), vec![128, 128, 128, 255]);
}

#[test]
fn undeclarable_group_color_fails_without_leaking_state() {
    let mut c = comp(4, 4, ColorModel::Rgb);
    let err = c
        .begin_group(&GroupParams {
            group_color: GroupColor::Rgb,
            n_color_comps: 4,
            ..GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0))
        })
        .unwrap_err();
    assert!(matches!(err, LaminaError::UnsupportedColorSpace(_)));
    assert_eq!(c.stack().depth(), 1);
}

#[test]
fn gray_luminosity_mask_halves_group_alpha() {
    let mut c = comp(10, 10, ColorModel::Rgb);
    c.begin_mask(&MaskParams {
        mask_id: 1,
        ..MaskParams::new(Rect::new(0.0, 0.0, 10.0, 10.0))
    })
    .unwrap();
    c.fill_rect(IntRect::new(0, 0, 10, 10), &[128, 128, 128]);
    c.end_mask().unwrap();

    c.begin_group(&GroupParams {
        mask_id: 1,
        ..GroupParams::new(Rect::new(0.0, 0.0, 10.0, 10.0))
    })
    .unwrap();
    c.fill_rect(IntRect::new(0, 0, 10, 10), &[255, 0, 0]);
    c.end_group().unwrap();

    assert_eq!(base_px(&c, 5, 5), vec![255, 0, 0, 128]);
}

#[test]
fn knockout_group_keeps_last_object() {
    let mut c = comp(8, 1, ColorModel::Rgb);
    c.set_blend_params(&BlendParamsUpdate::opacity(0.5));
    c.begin_group(&GroupParams {
        knockout: true,
        ..GroupParams::new(Rect::new(0.0, 0.0, 8.0, 1.0))
    })
    .unwrap();
    c.fill_span(0, 0, 4, &[255, 0, 0]);
    c.fill_span(0, 2, 6, &[0, 0, 255]);
    c.end_group().unwrap();

    assert_eq!(base_px(&c, 0, 0), vec![255, 0, 0, 128]);
    assert_eq!(base_px(&c, 3, 0), vec![0, 0, 255, 128]);
    assert_eq!(base_px(&c, 7, 0)[3], 0);
}

#[test]
fn overprint_mode_one_keeps_unpainted_inks() {
    let mut c = comp(1, 1, ColorModel::Cmyk);
    c.fill_span(0, 0, 1, &[0, 0, 0, 255]);
    c.set_blend_params(&BlendParamsUpdate {
        overprint: Some(true),
        overprint_mode: Some(1),
        ..BlendParamsUpdate::default()
    });
    c.fill_span(0, 0, 1, &[255, 0, 0, 0]);
    assert_eq!(base_px(&c, 0, 0), vec![255, 0, 0, 255, 255]);
}

#[test]
fn finish_rejects_open_groups() {
    let mut c = comp(4, 4, ColorModel::Rgb);
    c.begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0)))
        .unwrap();

    struct Ignore;
    impl ImageSink for Ignore {
        fn put_image(&mut self, _: &BlendedImage<'_>) -> LaminaResult<()> {
            Ok(())
        }
    }
    let err = c.finish(&mut Ignore).unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)));
}
