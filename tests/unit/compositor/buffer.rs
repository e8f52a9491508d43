use super::*;

#[test]
fn geometry_follows_rect_and_planes() {
    let buf = PlaneBuffer::new(IntRect::new(10, 20, 15, 23), ColorModel::Rgb, 4, true, true, false)
        .unwrap();
    assert_eq!(buf.rowstride, 8);
    assert_eq!(buf.planestride, 24);
    assert_eq!(buf.n_planes, 6);
    assert_eq!(buf.byte_len(), 144);
    assert_eq!(buf.shape_plane(), Some(4));
    assert_eq!(buf.alpha_g_plane(), Some(5));
    assert!(buf.bbox.is_empty());
}

#[test]
fn empty_or_idle_buffers_have_no_data() {
    let empty = PlaneBuffer::new(IntRect::new(5, 5, 5, 9), ColorModel::Gray, 2, false, false, false)
        .unwrap();
    assert!(!empty.has_data());
    assert_eq!(empty.get(0, 5, 5), 0);
    let idle = PlaneBuffer::new(IntRect::new(0, 0, 4, 4), ColorModel::Gray, 2, false, false, true)
        .unwrap();
    assert!(!idle.has_data());
}

#[test]
fn inverted_rect_is_normalized() {
    let buf = PlaneBuffer::new(IntRect::new(5, 5, 1, 1), ColorModel::Gray, 2, false, false, false)
        .unwrap();
    assert!(buf.rect.is_empty());
    assert!(!buf.has_data());
}

#[test]
fn alpha_g_without_shape_follows_alpha() {
    let buf = PlaneBuffer::new(IntRect::new(0, 0, 1, 1), ColorModel::Cmyk, 5, true, false, false)
        .unwrap();
    assert_eq!(buf.shape_plane(), None);
    assert_eq!(buf.alpha_g_plane(), Some(5));
}

#[test]
fn projected_len_matches_allocation() {
    let r = IntRect::new(0, 0, 7, 3);
    let buf = PlaneBuffer::new(r, ColorModel::Rgb, 4, false, false, false).unwrap();
    assert_eq!(PlaneBuffer::projected_len(r, 4), buf.byte_len());
}
