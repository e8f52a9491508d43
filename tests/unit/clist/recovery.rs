use super::*;
use crate::device::PageDevice;

const W: i32 = 20;
const H: i32 = 40;

fn white() -> Raster {
    Raster::new(IntRect::new(0, 0, W, H), ColorModel::Rgb).unwrap()
}

fn opts(max_stream_bytes: Option<usize>) -> BandOpts {
    BandOpts {
        band_height: Some(10),
        memory_budget: 40_000,
        max_stream_bytes,
        ..BandOpts::default()
    }
}

/// `n` one-pixel fills walking the page row by row, later ones painting over earlier ones.
fn dots(dev: &mut dyn Device, n: u32, seed: u32) -> LaminaResult<()> {
    for i in 0..n {
        let x = (i % W as u32) as i32;
        let y = ((i / W as u32) % H as u32) as i32;
        let color = ColorIndex(i.wrapping_mul(2_654_435_761).wrapping_add(seed) as u64 & 0xff_ffff);
        dev.fill_rectangle(IntRect::new(x, y, x + 1, y + 1), color)?;
    }
    Ok(())
}

fn composited_dots(dev: &mut dyn Device, n: u32, seed: u32) -> LaminaResult<()> {
    dev.push_device(0)?;
    dots(dev, n, seed)?;
    dev.pop_device()
}

fn direct(draw: impl Fn(&mut dyn Device) -> LaminaResult<()>) -> Raster {
    let mut dev = PageDevice::new(white(), CompositorOpts::default());
    draw(&mut dev).unwrap();
    dev.into_raster().unwrap()
}

#[test]
fn pages_render_in_order() {
    let mut dev = ClistDevice::new(opts(None), CompositorOpts::default());
    for seed in [1, 2] {
        dev.begin_page(white(), false).unwrap();
        dots(&mut dev, 50, seed).unwrap();
        dev.end_page().unwrap();
    }
    let pages = dev.finish().unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], direct(|d| dots(d, 50, 1)));
    assert_eq!(pages[1], direct(|d| dots(d, 50, 2)));
    assert_eq!(dev.stats().pages, 2);
    assert_eq!(dev.memory_pool().used(), 0);
}

#[test]
fn deferred_pages_wait_for_finish() {
    let mut dev =
        ClistDevice::new(opts(None), CompositorOpts::default()).with_defer_render(true);
    dev.begin_page(white(), false).unwrap();
    dots(&mut dev, 30, 9).unwrap();
    dev.end_page().unwrap();
    assert_eq!(dev.queue().len(), 1);
    assert!(dev.queue().stream_bytes() > 0);
    assert_eq!(dev.memory_pool().used(), dev.queue().stream_bytes());
    assert!(dev.take_rendered().is_empty());

    let pages = dev.finish().unwrap();
    assert_eq!(pages.len(), 1);
    assert!(dev.queue().is_empty());
    assert_eq!(dev.memory_pool().used(), 0);
}

#[test]
fn queued_page_is_rendered_to_make_room() {
    // Size of one page's log, measured without a limit.
    let mut probe =
        ClistDevice::new(opts(None), CompositorOpts::default()).with_defer_render(true);
    probe.begin_page(white(), false).unwrap();
    dots(&mut probe, 400, 3).unwrap();
    probe.end_page().unwrap();
    let page_bytes = probe.queue().stream_bytes();

    let limit = page_bytes + page_bytes / 2;
    let mut dev =
        ClistDevice::new(opts(Some(limit)), CompositorOpts::default()).with_defer_render(true);
    for seed in [3, 4] {
        dev.begin_page(white(), false).unwrap();
        dots(&mut dev, 400, seed).unwrap();
        dev.end_page().unwrap();
    }
    let stats = dev.stats();
    assert_eq!(stats.soft_recoveries, 1);
    assert_eq!(stats.hard_recoveries, 0);
    assert_eq!(dev.queue().len(), 1);

    let pages = dev.finish().unwrap();
    assert_eq!(pages[0], direct(|d| dots(d, 400, 3)));
    assert_eq!(pages[1], direct(|d| dots(d, 400, 4)));
}

#[test]
fn partial_page_is_rendered_when_nothing_is_queued() {
    let mut dev = ClistDevice::new(opts(Some(25_000)), CompositorOpts::default());
    dev.begin_page(white(), true).unwrap();
    composited_dots(&mut dev, 3000, 5).unwrap();
    dev.end_page().unwrap();
    assert!(dev.stats().hard_recoveries >= 1);
    assert!(!dev.has_permanent_error());

    let pages = dev.finish().unwrap();
    assert_eq!(pages[0], direct(|d| composited_dots(d, 3000, 5)));
}

fn translucent_dots(dev: &mut dyn Device, n: u32, seed: u32) -> LaminaResult<()> {
    dev.push_device(0)?;
    dev.set_blend_params(&BlendParamsUpdate::opacity(0.5))?;
    dots(dev, n, seed)?;
    dev.pop_device()
}

/// A split page is flattened to 8 bits at the split, so translucent drawing after it rounds
/// against the flattened raster. Each split may move a channel by at most one.
#[test]
fn translucent_partial_page_stays_within_rounding_of_direct() {
    let mut dev = ClistDevice::new(opts(Some(25_000)), CompositorOpts::default());
    dev.begin_page(white(), true).unwrap();
    translucent_dots(&mut dev, 3000, 5).unwrap();
    dev.end_page().unwrap();
    let stats = dev.stats();
    assert!(stats.hard_recoveries >= 1, "{stats:?}");
    assert_eq!(stats.soft_recoveries, 0);

    let banded = dev.finish().unwrap().remove(0);
    let expected = direct(|d| translucent_dots(d, 3000, 5));
    let worst = banded
        .data()
        .iter()
        .zip(expected.data())
        .map(|(a, b)| a.abs_diff(*b))
        .max()
        .unwrap_or(0);
    assert!(
        u64::from(worst) <= stats.hard_recoveries,
        "worst channel difference {worst} after {} splits",
        stats.hard_recoveries
    );
}

#[test]
fn device_gives_up_when_recovery_cannot_help() {
    let mut dev = ClistDevice::new(opts(Some(10)), CompositorOpts::default());
    dev.begin_page(white(), false).unwrap();
    dots(&mut dev, 4, 0).unwrap();
    let err = dev.end_page().unwrap_err();
    assert!(err.is_out_of_memory(), "{err}");
    assert!(dev.has_permanent_error());

    let err = dev
        .fill_rectangle(IntRect::new(0, 0, 1, 1), ColorIndex(0))
        .unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)));
}

#[test]
fn failed_page_is_dropped_and_the_next_page_renders() {
    let mut dev = ClistDevice::new(opts(None), CompositorOpts::default());
    dev.begin_page(white(), false).unwrap();
    dots(&mut dev, 50, 1).unwrap();
    assert!(dev.recorder().is_some());
    let err = dev.end_group().unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)), "{err}");
    assert!(dev.recorder().is_none());
    assert!(!dev.has_permanent_error());
    assert_eq!(dev.memory_pool().used(), 0);
    assert!(!dev.abort_page());

    dev.begin_page(white(), false).unwrap();
    dots(&mut dev, 50, 2).unwrap();
    dev.end_page().unwrap();
    let pages = dev.finish().unwrap();
    assert_eq!(pages, vec![direct(|d| dots(d, 50, 2))]);
}

#[test]
fn open_page_can_be_abandoned() {
    let mut dev = ClistDevice::new(opts(Some(40_000)), CompositorOpts::default());
    dev.begin_page(white(), true).unwrap();
    composited_dots(&mut dev, 2000, 3).unwrap();
    assert!(dev.abort_page());
    assert_eq!(dev.memory_pool().used(), 0);
    assert!(dev.finish().unwrap().is_empty());
}

#[test]
fn drawing_needs_an_open_page() {
    let mut dev = ClistDevice::new(opts(None), CompositorOpts::default());
    let err = dev
        .fill_rectangle(IntRect::new(0, 0, 1, 1), ColorIndex(0))
        .unwrap_err();
    assert!(matches!(err, LaminaError::InvalidState(_)));
    dev.begin_page(white(), false).unwrap();
    assert!(matches!(
        dev.begin_page(white(), false),
        Err(LaminaError::InvalidState(_))
    ));
    assert!(matches!(dev.finish(), Err(LaminaError::InvalidState(_))));
}

#[test]
fn pooled_playback_renders_the_same_pages() {
    let pool = crate::clist::build_thread_pool(Some(3)).unwrap();
    let mut dev = ClistDevice::new(opts(None), CompositorOpts::default()).with_thread_pool(pool);
    dev.begin_page(white(), true).unwrap();
    composited_dots(&mut dev, 500, 8).unwrap();
    dev.end_page().unwrap();
    let pages = dev.finish().unwrap();
    assert_eq!(pages[0], direct(|d| composited_dots(d, 500, 8)));
    assert_eq!(dev.stats().playback.bands_rendered, 4);
}
