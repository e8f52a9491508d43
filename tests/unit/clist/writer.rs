use super::*;
use crate::clist::codec::Decoder;
use crate::foundation::core::Rect;

const RED: ColorIndex = ColorIndex(0xff0000);

fn page(width: u32, height: u32) -> PageGeometry {
    PageGeometry {
        width,
        height,
        n_colorants: 3,
        uses_transparency: true,
    }
}

fn banded(band_height: u32) -> BandOpts {
    BandOpts {
        band_height: Some(band_height),
        ..BandOpts::default()
    }
}

/// 20x40 RGB page in four bands of ten rows.
fn recorder() -> Recorder {
    Recorder::new(page(20, 40), ColorModel::Rgb, &banded(10), MemoryPool::default()).unwrap()
}

/// Records replayed for `band`, assuming no group changes the color model.
fn band_records(log: &PageLog, band: u32) -> Vec<Record> {
    let mut out = Vec::new();
    for e in log.entries().unwrap().iter().filter(|e| e.covers(band)) {
        let mut d = Decoder::new(&log.content()[e.offset as usize..], log.byte_order());
        loop {
            match Record::decode(&mut d, 3).unwrap() {
                Record::EndRun => break,
                rec => out.push(rec),
            }
        }
    }
    out
}

#[test]
fn drawing_goes_to_the_bands_it_touches() {
    let mut r = recorder();
    r.fill_rectangle(IntRect::new(0, 5, 20, 15), RED).unwrap();
    r.fill_rectangle(IntRect::new(0, 50, 20, 60), RED).unwrap();
    assert_eq!(r.state(), PageState::Recording);
    let log = r.end_page().unwrap();
    assert_eq!(r.state(), PageState::Closed);
    assert!(log.is_complete());

    let counts: Vec<u32> = log.bands().iter().map(|b| b.record_count).collect();
    assert_eq!(counts, vec![1, 1, 0, 0]);
    assert_eq!(log.bands()[0].colors_used, 0xff0000);
    assert_eq!(r.stats().culled, 1);
    let entries = log.entries().unwrap();
    assert_eq!((entries[0].band_min, entries[0].band_max), (0, 1));
    assert!(entries.last().unwrap().is_sentinel());
}

#[test]
fn groups_crop_the_records_inside_them() {
    let mut r = recorder();
    r.push_device(0).unwrap();
    r.begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 20.0, 10.0)))
        .unwrap();
    r.fill_rectangle(IntRect::new(0, 0, 20, 40), RED).unwrap();
    r.end_group().unwrap();
    r.pop_device().unwrap();
    let log = r.end_page().unwrap();

    let counts: Vec<u32> = log.bands().iter().map(|b| b.record_count).collect();
    assert_eq!(counts, vec![5, 2, 2, 2]);
    assert_eq!(
        band_records(&log, 3),
        vec![
            Record::PushDevice {
                spot_color_count: 0
            },
            Record::PopDevice
        ]
    );
}

#[test]
fn blend_changes_reach_every_band_once() {
    let mut r = recorder();
    r.push_device(0).unwrap();
    r.set_blend_params(&BlendParamsUpdate::opacity(0.5)).unwrap();
    // No change, nothing written.
    r.set_blend_params(&BlendParamsUpdate::opacity(0.5)).unwrap();
    r.pop_device().unwrap();
    let log = r.end_page().unwrap();
    for band in 0..4 {
        assert_eq!(
            band_records(&log, band)[1],
            Record::SetBlendParams(BlendParamsUpdate::opacity(0.5))
        );
        assert_eq!(log.bands()[band as usize].record_count, 3);
    }
}

#[test]
fn groups_take_the_id_of_the_mask_before_them() {
    let mut r = recorder();
    r.push_device(0).unwrap();
    let bbox = Rect::new(0.0, 0.0, 20.0, 40.0);
    r.begin_mask(&MaskParams::new(bbox)).unwrap();
    r.end_mask().unwrap();
    r.begin_group(&GroupParams::new(bbox)).unwrap();
    r.end_group().unwrap();
    r.begin_group(&GroupParams::new(bbox)).unwrap();
    r.end_group().unwrap();
    r.pop_device().unwrap();
    let log = r.end_page().unwrap();

    let ids: Vec<u32> = band_records(&log, 0)
        .iter()
        .filter_map(|rec| match rec {
            Record::BeginMask(p) => Some(p.mask_id),
            Record::BeginGroup(p) => Some(p.mask_id),
            _ => None,
        })
        .collect();
    assert_eq!(ids, vec![1, 1, 0]);
}

#[test]
fn unbalanced_nesting_is_rejected() {
    let mut r = recorder();
    let bbox = Rect::new(0.0, 0.0, 5.0, 5.0);
    let err = r.begin_group(&GroupParams::new(bbox)).unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)), "{err}");

    r.push_device(0).unwrap();
    assert!(matches!(r.end_group(), Err(LaminaError::InvalidState(_))));
    r.begin_mask(&MaskParams::new(bbox)).unwrap();
    assert!(matches!(r.end_group(), Err(LaminaError::InvalidState(_))));
    assert!(matches!(r.pop_device(), Err(LaminaError::InvalidState(_))));
    r.end_mask().unwrap();
    r.begin_group(&GroupParams::new(bbox)).unwrap();
    assert!(matches!(r.end_page(), Err(LaminaError::InvalidState(_))));
}

#[test]
fn nothing_is_accepted_after_end_page() {
    let mut r = recorder();
    r.end_page().unwrap();
    let err = r.fill_rectangle(IntRect::new(0, 0, 1, 1), RED).unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)));
}

#[test]
fn refused_flush_leaves_the_recorder_unchanged() {
    let pool = MemoryPool::new(Some(200));
    let hog = pool.try_charge(200).unwrap();
    let mut r = Recorder::new(page(20, 40), ColorModel::Rgb, &banded(10), pool.clone()).unwrap();
    r.fill_rectangle(IntRect::new(0, 0, 20, 40), RED).unwrap();
    let stats = r.stats();

    let err = r.end_page().unwrap_err();
    assert!(err.is_out_of_memory(), "{err}");
    assert_eq!(r.state(), PageState::Recording);
    assert_eq!(r.stream_bytes(), 0);
    assert_eq!(r.stats(), stats);

    drop(hog);
    let log = r.end_page().unwrap();
    assert_eq!(pool.used(), log.stream_bytes());
    drop(log);
    assert_eq!(pool.used(), 0);
}

#[test]
fn small_command_buffer_flushes_between_runs() {
    let opts = BandOpts {
        band_height: Some(10),
        memory_budget: 64 << 10,
        ..BandOpts::default()
    };
    let mut r = Recorder::new(page(20, 40), ColorModel::Rgb, &opts, MemoryPool::default()).unwrap();
    let capacity = r.layout().command_buffer_bytes;
    // Alternating first and last band, so every record opens a run of its own.
    let mut n = 0usize;
    while r.stats().flushes == 0 {
        let y = if n % 2 == 0 { 0 } else { 39 };
        r.fill_rectangle(IntRect::new(0, y, 20, y + 1), RED).unwrap();
        n += 1;
        assert!(n * 40 <= capacity + 40, "no flush after {n} records");
    }
    assert!(r.stream_bytes() > 0);
    let log = r.end_page().unwrap();
    assert_eq!(log.bands()[0].record_count as usize, n.div_ceil(2));
}

#[test]
fn repeated_bitmaps_become_tiles() {
    let mut r = recorder();
    let glyph = MonoBitmap::from_rows(&["##", "##"]).unwrap();
    r.copy_mono(&glyph, 1, 1, RED).unwrap();
    r.copy_mono(&glyph, 5, 5, RED).unwrap();
    // Straddles bands 0 and 1; band 1 has not seen the tile yet.
    r.copy_mono(&glyph, 5, 9, RED).unwrap();
    let stats = r.stats();
    assert_eq!(stats.tiles_set, 2);
    assert_eq!(stats.tiles_copied, 3);

    let log = r.end_page().unwrap();
    let band1 = band_records(&log, 1);
    assert!(matches!(band1[0], Record::SetTile { .. }));
    assert!(matches!(band1[1], Record::CopyTile { x: 5, y: 9, .. }));
    let band0 = band_records(&log, 0);
    assert_eq!(
        band0
            .iter()
            .filter(|r| matches!(r, Record::SetTile { .. }))
            .count(),
        1
    );
}

#[test]
fn image_rows_are_split_at_band_boundaries() {
    let mut r = recorder();
    let header = ImageHeader {
        x: 0,
        y: 5,
        width: 2,
        height: 10,
        n_comps: 3,
    };
    r.begin_image(&header).unwrap();
    r.image_data(&[7u8; 2 * 3 * 10], 10).unwrap();
    assert!(matches!(
        r.image_data(&[0u8; 6], 1),
        Err(LaminaError::Range(_))
    ));
    r.end_image().unwrap();
    let log = r.end_page().unwrap();

    let rows = |band| -> Vec<(u32, u32)> {
        band_records(&log, band)
            .into_iter()
            .filter_map(|rec| match rec {
                Record::ImageRows {
                    first_row, n_rows, ..
                } => Some((first_row, n_rows)),
                _ => None,
            })
            .collect()
    };
    assert_eq!(rows(0), vec![(0, 5)]);
    assert_eq!(rows(1), vec![(5, 5)]);
    assert_eq!(log.bands()[2].record_count, 0);
}

#[test]
fn partial_log_resets_and_reopens_the_compositor() {
    let mut r = recorder();
    r.push_device(2).unwrap();
    r.set_blend_params(&BlendParamsUpdate::opacity(0.25)).unwrap();
    r.fill_rectangle(IntRect::new(0, 0, 20, 5), RED).unwrap();
    assert!(r.can_hard_recover());

    let log = r.take_partial().unwrap();
    assert!(!log.is_complete());
    assert_eq!(log.bands()[0].record_count, 3);
    assert_eq!(r.state(), PageState::Flushed);
    assert_eq!(r.stream_bytes(), 0);
    // PUSH_DEVICE and the full marking state are queued for every band.
    assert!(r.band_states().iter().all(|b| b.record_count == 2));

    r.pop_device().unwrap();
    let rest = r.end_page().unwrap();
    let band2 = band_records(&rest, 2);
    assert_eq!(
        band2[0],
        Record::PushDevice {
            spot_color_count: 2
        }
    );
    match &band2[1] {
        Record::SetBlendParams(u) => assert_eq!(u.opacity, Some(0.25)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn no_partial_log_inside_a_group() {
    let mut r = recorder();
    r.push_device(0).unwrap();
    r.begin_group(&GroupParams::new(Rect::new(0.0, 0.0, 4.0, 4.0)))
        .unwrap();
    assert!(!r.can_hard_recover());
    assert!(matches!(r.take_partial(), Err(LaminaError::InvalidState(_))));
}
