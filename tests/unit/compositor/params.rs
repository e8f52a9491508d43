use super::*;

#[test]
fn unknown_group_color_inherits_parent() {
    assert_eq!(
        GroupColor::Unknown.resolve(0, ColorModel::Cmyk).unwrap(),
        ColorModel::Cmyk
    );
    assert_eq!(
        GroupColor::CieXyz.resolve(3, ColorModel::Gray).unwrap(),
        ColorModel::Rgb
    );
}

#[test]
fn mismatched_colorant_count_is_unsupported() {
    assert!(matches!(
        GroupColor::Gray.resolve(3, ColorModel::Rgb),
        Err(LaminaError::UnsupportedColorSpace(_))
    ));
    assert!(matches!(
        GroupColor::DeviceN.resolve(12, ColorModel::Rgb),
        Err(LaminaError::UnsupportedColorSpace(_))
    ));
}

#[test]
fn device_n_under_spot_device_keeps_spots() {
    assert_eq!(
        GroupColor::DeviceN
            .resolve(6, ColorModel::CmykSpot(2))
            .unwrap(),
        ColorModel::CmykSpot(2)
    );
    assert_eq!(
        GroupColor::DeviceN.resolve(2, ColorModel::Rgb).unwrap(),
        ColorModel::Custom(2)
    );
}

#[test]
fn group_color_bytes() {
    for v in 0..=5u8 {
        assert_eq!(GroupColor::from_u8(v).unwrap() as u8, v);
    }
    assert!(GroupColor::from_u8(6).is_err());
}

#[test]
fn blend_params_diff_and_apply() {
    let base = BlendParams::default();
    let mut next = base;
    next.opacity = 0.5;
    next.blend_mode = BlendMode::Multiply;
    let d = next.diff(&base);
    assert_eq!(
        d.changed_bits(),
        BlendParamsUpdate::OPACITY | BlendParamsUpdate::BLEND_MODE
    );
    let mut applied = base;
    applied.apply(&d);
    assert_eq!(applied, next);
    assert!(next.diff(&next).is_empty());
    assert_eq!(next.as_update().changed_bits(), 63);
}

#[test]
fn mask_bg_alpha_needs_background() {
    let mut p = MaskParams::new(Rect::new(0.0, 0.0, 1.0, 1.0));
    p.gray_background = 1.0;
    assert_eq!(p.bg_alpha(), 0);
    p.background = vec![1.0];
    assert_eq!(p.bg_alpha(), 255);
}

#[test]
fn group_consumes_completed_mask_id() {
    let mut ids = MaskIdTracker::default();
    let m = ids.begin_mask(true);
    assert_eq!(m, 1);
    ids.end_mask().unwrap();
    assert_eq!(ids.begin_group(), 1);
    ids.end_group().unwrap();
    // Consumed: the next group has no mask.
    assert_eq!(ids.begin_group(), 0);
    ids.end_group().unwrap();
    assert_eq!(ids.depth(), 0);
}

#[test]
fn non_replacing_mask_gets_temporary_id() {
    let mut ids = MaskIdTracker::default();
    ids.begin_mask(true);
    ids.end_mask().unwrap();
    let inner = ids.begin_mask(false);
    assert_eq!(inner, 2);
    ids.end_mask().unwrap();
    // The image group takes the temporary id; the outer mask id stays pending.
    assert_eq!(ids.begin_group(), 2);
    ids.end_group().unwrap();
    assert_eq!(ids.begin_group(), 1);
    ids.end_group().unwrap();
}

#[test]
fn groups_inside_a_mask_see_previous_ids() {
    let mut ids = MaskIdTracker::default();
    ids.begin_mask(true);
    assert_eq!(ids.begin_group(), 0);
    ids.end_group().unwrap();
    ids.end_mask().unwrap();
    assert_eq!(ids.begin_group(), 1);
}

#[test]
fn unbalanced_end_is_invalid_state() {
    let mut ids = MaskIdTracker::default();
    assert!(matches!(ids.end_group(), Err(LaminaError::InvalidState(_))));
}
