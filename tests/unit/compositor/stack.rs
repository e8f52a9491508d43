use super::*;

const PAGE: IntRect = IntRect::new(0, 0, 8, 8);

fn page() -> CompositingStack {
    CompositingStack::new(PAGE, ColorModel::Rgb, CompositorOpts::default()).unwrap()
}

fn group(rect: IntRect) -> PushGroup {
    PushGroup {
        rect,
        isolated: false,
        knockout: false,
        alpha: 255,
        shape: 255,
        blend_mode: BlendMode::Normal,
        mask_id: 0,
        model: ColorModel::Rgb,
        idle: false,
    }
}

fn mask(rect: IntRect, mask_id: u32) -> PushMask {
    PushMask {
        rect,
        bg_alpha: 0,
        transfer_fn: TransferFn::identity(),
        mask_id,
        subtype: MaskSubtype::Luminosity,
        is_cie: false,
        replacing: true,
        model: ColorModel::Rgb,
        idle: false,
    }
}

/// Paints an opaque color into the top buffer, clipped to its rect.
fn paint(stack: &mut CompositingStack, rect: IntRect, rgb: [u8; 3]) {
    let top = stack.top_mut();
    let r = rect.intersect(&top.rect);
    let stride = top.planestride;
    let offsets: Vec<usize> = (r.y0..r.y1)
        .flat_map(|y| (r.x0..r.x1).map(move |x| (x, y)))
        .map(|(x, y)| top.offset(x, y))
        .collect();
    let alpha_g = top.alpha_g_plane();
    let data = top.data.as_mut().unwrap();
    for o in offsets {
        for (p, v) in rgb.iter().enumerate() {
            data[p * stride + o] = *v;
        }
        data[3 * stride + o] = 255;
        if let Some(g) = alpha_g {
            data[g * stride + o] = 255;
        }
    }
    top.grow_bbox(&r);
}

fn base_px(stack: &CompositingStack, x: i32, y: i32) -> [u8; 4] {
    let b = stack.base();
    [b.get(0, x, y), b.get(1, x, y), b.get(2, x, y), b.get(3, x, y)]
}

#[test]
fn balanced_sequence_restores_depth_and_outside_pixels() {
    let mut s = page();
    paint(&mut s, PAGE, [255, 255, 255]);
    s.push_mask(&mask(IntRect::new(0, 0, 4, 4), 1)).unwrap();
    paint(&mut s, PAGE, [255, 255, 255]);
    s.pop_mask().unwrap();
    s.push_group(&PushGroup {
        mask_id: 1,
        ..group(IntRect::new(0, 0, 4, 4))
    })
    .unwrap();
    s.push_group(&group(IntRect::new(1, 1, 3, 3))).unwrap();
    paint(&mut s, PAGE, [0, 0, 255]);
    s.pop_group().unwrap();
    s.pop_group().unwrap();

    assert_eq!(s.depth(), 1);
    assert!(s.pending_mask().is_none());
    assert_eq!(base_px(&s, 2, 2), [0, 0, 255, 255]);
    assert_eq!(base_px(&s, 0, 0), [255, 255, 255, 255]);
    assert_eq!(base_px(&s, 6, 6), [255, 255, 255, 255]);
}

#[test]
fn underflow_and_mismatched_pops_are_invalid_state() {
    let mut s = page();
    assert!(matches!(s.pop_group(), Err(LaminaError::InvalidState(_))));
    assert!(matches!(s.pop_mask(), Err(LaminaError::InvalidState(_))));

    s.push_group(&group(PAGE)).unwrap();
    assert!(matches!(s.pop_mask(), Err(LaminaError::InvalidState(_))));

    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    assert!(matches!(s.pop_group(), Err(LaminaError::InvalidState(_))));
}

#[test]
fn knockout_groups_are_isolated() {
    let mut s = page();
    s.push_group(&PushGroup {
        knockout: true,
        ..group(PAGE)
    })
    .unwrap();
    assert!(s.top().isolated);
    assert!(s.top().alpha_g_plane().is_none());

    s.push_group(&group(PAGE)).unwrap();
    assert!(s.top().has_shape, "children of a knockout group track shape");
}

#[test]
fn non_isolated_group_starts_from_parent_pixels() {
    let mut s = page();
    paint(&mut s, IntRect::new(1, 1, 2, 2), [255, 0, 0]);
    s.push_group(&group(PAGE)).unwrap();
    assert_eq!(s.top().get(0, 1, 1), 255);
    assert_eq!(s.top().get(3, 1, 1), 255);
    assert_eq!(s.top().get(s.top().alpha_g_plane().unwrap(), 1, 1), 0);
    s.pop_group().unwrap();

    s.push_group(&PushGroup {
        isolated: true,
        ..group(PAGE)
    })
    .unwrap();
    assert_eq!(s.top().get(3, 1, 1), 0);
}

#[test]
fn groups_inside_knockout_groups_take_the_nearest_backdrop() {
    let mut s = page();
    paint(&mut s, PAGE, [0, 0, 255]);
    s.push_group(&PushGroup {
        knockout: true,
        ..group(PAGE)
    })
    .unwrap();
    assert_eq!(s.top().get(3, 2, 2), 0);
    paint(&mut s, IntRect::new(2, 2, 3, 3), [255, 0, 0]);

    s.push_group(&group(PAGE)).unwrap();
    assert_eq!(s.top().get(0, 2, 2), 255);
    assert_eq!(s.top().get(2, 2, 2), 0);
    assert_eq!(s.top().get(3, 5, 5), 0);
    s.pop_group().unwrap();

    s.push_group(&PushGroup {
        knockout: true,
        ..group(PAGE)
    })
    .unwrap();
    assert_eq!(s.top().get(3, 2, 2), 0);
}

#[test]
fn empty_non_isolated_group_is_a_no_op() {
    let mut s = page();
    paint(&mut s, IntRect::new(0, 0, 4, 8), [10, 20, 30]);
    let before: Vec<[u8; 4]> = (0..8).map(|x| base_px(&s, x, 3)).collect();
    s.push_group(&group(PAGE)).unwrap();
    s.pop_group().unwrap();
    let after: Vec<[u8; 4]> = (0..8).map(|x| base_px(&s, x, 3)).collect();
    assert_eq!(before, after);
}

#[test]
fn matching_mask_is_consumed_by_next_group() {
    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    paint(&mut s, PAGE, [255, 255, 255]);
    s.pop_mask().unwrap();
    assert_eq!(s.pending_mask().mask_id(), Some(1));

    s.push_group(&PushGroup {
        mask_id: 1,
        ..group(PAGE)
    })
    .unwrap();
    assert!(s.pending_mask().is_none());
    paint(&mut s, PAGE, [255, 0, 0]);
    s.pop_group().unwrap();
    assert_eq!(base_px(&s, 4, 4), [255, 0, 0, 255]);
}

#[test]
fn black_mask_suppresses_group() {
    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    paint(&mut s, PAGE, [0, 0, 0]);
    s.pop_mask().unwrap();
    s.push_group(&PushGroup {
        mask_id: 1,
        ..group(PAGE)
    })
    .unwrap();
    paint(&mut s, PAGE, [255, 0, 0]);
    s.pop_group().unwrap();
    assert_eq!(base_px(&s, 4, 4)[3], 0);
}

#[test]
fn mismatched_mask_is_dropped() {
    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    paint(&mut s, PAGE, [0, 0, 0]);
    s.pop_mask().unwrap();
    s.push_group(&PushGroup {
        mask_id: 2,
        ..group(PAGE)
    })
    .unwrap();
    paint(&mut s, PAGE, [255, 0, 0]);
    s.pop_group().unwrap();
    assert!(s.pending_mask().is_none());
    assert_eq!(base_px(&s, 4, 4), [255, 0, 0, 255]);
}

#[test]
fn mask_outside_rect_masks_out_its_group() {
    let mut s = page();
    s.push_mask(&mask(IntRect::new(20, 20, 30, 30), 1)).unwrap();
    s.pop_mask().unwrap();
    assert!(matches!(s.pending_mask(), PendingMask::Vacant(1, _)));

    s.push_group(&PushGroup {
        mask_id: 1,
        ..group(PAGE)
    })
    .unwrap();
    assert!(s.top().masked_out);
    paint(&mut s, PAGE, [255, 0, 0]);
    s.pop_group().unwrap();
    assert_eq!(base_px(&s, 4, 4)[3], 0);
}

#[test]
fn nested_mask_is_restored_after_its_group() {
    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    paint(&mut s, PAGE, [255, 255, 255]);
    s.pop_mask().unwrap();

    s.push_mask(&PushMask {
        replacing: false,
        ..mask(PAGE, 2)
    })
    .unwrap();
    paint(&mut s, PAGE, [255, 255, 255]);
    s.pop_mask().unwrap();
    assert_eq!(s.pending_mask().mask_id(), Some(2));

    s.push_group(&PushGroup {
        mask_id: 2,
        ..group(PAGE)
    })
    .unwrap();
    s.pop_group().unwrap();
    assert_eq!(s.pending_mask().mask_id(), Some(1));
}

#[test]
fn replacing_mask_discards_pending_one() {
    let mut s = page();
    s.push_mask(&mask(PAGE, 1)).unwrap();
    s.pop_mask().unwrap();
    s.push_mask(&mask(PAGE, 2)).unwrap();
    assert!(s.top().mask.is_none());
    s.pop_mask().unwrap();
    assert_eq!(s.pending_mask().mask_id(), Some(2));
}

#[test]
fn buffer_budget_is_enforced() {
    // The 8x8 RGB base holds 4 planes of 64 bytes.
    let opts = CompositorOpts {
        max_buffer_bytes: Some(300),
    };
    let mut s = CompositingStack::new(PAGE, ColorModel::Rgb, opts).unwrap();
    assert_eq!(s.live_bytes(), 256);
    let err = s.push_group(&group(PAGE)).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(s.depth(), 1);

    s.push_group(&group(IntRect::new(0, 0, 1, 1))).unwrap();
    assert_eq!(s.depth(), 2);
}

#[test]
fn into_base_requires_closed_levels() {
    let mut s = page();
    s.push_group(&group(PAGE)).unwrap();
    assert!(matches!(s.into_base(), Err(LaminaError::InvalidState(_))));

    let s = page();
    assert_eq!(s.into_base().unwrap().rect, PAGE);
}
