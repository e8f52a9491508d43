use super::*;
use crate::compositor::PlaneBuffer;

#[test]
fn new_rasters_start_as_paper() {
    let rgb = Raster::new(IntRect::new(0, 0, 2, 2), ColorModel::Rgb).unwrap();
    assert!(rgb.data().iter().all(|&v| v == 255));
    let cmyk = Raster::new(IntRect::new(0, 0, 2, 2), ColorModel::Cmyk).unwrap();
    assert!(cmyk.data().iter().all(|&v| v == 0));
    assert_eq!(cmyk.row_bytes(), 8);
}

#[test]
fn spans_clip_to_the_raster() {
    let mut r = Raster::new(IntRect::new(0, 0, 4, 2), ColorModel::Gray).unwrap();
    r.fill_span(1, -3, 2, &[7]);
    r.fill_span(5, 0, 4, &[9]);
    assert_eq!(r.data(), &[255, 255, 255, 255, 7, 7, 255, 255]);
    assert!(r.pixel(4, 0).is_empty());
}

#[test]
fn bands_copy_out_and_back() {
    let mut page = Raster::new(IntRect::new(0, 0, 3, 5), ColorModel::Gray).unwrap();
    let mut band = page.band(2, 4).unwrap();
    assert_eq!(band.rect(), IntRect::new(0, 2, 3, 4));
    band.fill_rect(IntRect::new(0, 0, 3, 10), &[0]);
    page.write_band(&band).unwrap();
    assert_eq!(page.pixel(1, 1), &[255]);
    assert_eq!(page.pixel(1, 2), &[0]);
    assert_eq!(page.pixel(1, 3), &[0]);
    assert_eq!(page.pixel(1, 4), &[255]);
    assert!(page.band(7, 9).is_err());
}

#[test]
fn blended_pixels_mix_by_alpha() {
    let rect = IntRect::new(0, 0, 2, 1);
    let mut buf = PlaneBuffer::new(rect, ColorModel::Rgb, 4, false, false, false).unwrap();
    let stride = buf.planestride;
    {
        let d = buf.data.as_mut().unwrap();
        d[0] = 255; // red at x = 0
        d[3 * stride] = 128;
        d[3 * stride + 1] = 0;
    }
    let mut page = Raster::new(rect, ColorModel::Rgb).unwrap();
    page.put_image(&BlendedImage { rect, buffer: &buf }).unwrap();
    assert_eq!(page.pixel(0, 0), &[255, 127, 127]);
    assert_eq!(page.pixel(1, 0), &[255, 255, 255]);
}

#[test]
fn model_mismatch_is_rejected() {
    let rect = IntRect::new(0, 0, 1, 1);
    let buf = PlaneBuffer::new(rect, ColorModel::Gray, 2, false, false, false).unwrap();
    let mut page = Raster::new(rect, ColorModel::Rgb).unwrap();
    let err = page
        .put_image(&BlendedImage { rect, buffer: &buf })
        .unwrap_err();
    assert!(matches!(err, LaminaError::UnsupportedColorSpace(_)));
}
