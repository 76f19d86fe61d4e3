use super::*;

#[test]
fn pixel_rect_sizes_and_containment() {
    let r = PixelRect::from_xywh(2, 3, 4, 5);
    assert_eq!(r, PixelRect::new(2, 3, 6, 8));
    assert_eq!(r.width(), 4);
    assert_eq!(r.height(), 5);
    assert_eq!(r.area(), 20);
    assert!(r.contains(2, 3));
    assert!(r.contains(5, 7));
    assert!(!r.contains(6, 7));
    assert!(!r.contains(5, 8));
}

#[test]
fn pixel_rect_intersection_and_inflate() {
    let a = PixelRect::new(0, 0, 10, 10);
    let b = PixelRect::new(5, -3, 20, 4);
    assert_eq!(a.intersect(b), PixelRect::new(5, 0, 10, 4));
    assert!(PixelRect::new(0, 0, 2, 2)
        .intersect(PixelRect::new(3, 3, 4, 4))
        .is_empty());
    assert_eq!(a.inflate(2), PixelRect::new(-2, -2, 12, 12));
    assert_eq!(a.inflate(-2), PixelRect::new(2, 2, 8, 8));
    assert!(a.contains_rect(a.inflate(-1)));
    assert!(!a.contains_rect(a.inflate(1)));
    assert_eq!(b.relative_to(a.inflate(-1)), PixelRect::new(4, -4, 19, 3));
}

#[test]
fn align_up_rounds_to_multiple() {
    assert_eq!(align_up(0, 4), 0);
    assert_eq!(align_up(1, 4), 4);
    assert_eq!(align_up(4, 4), 4);
    assert_eq!(align_up(13, 4), 16);
}

#[test]
fn sample_range_validates_order() {
    let r = SampleRange::new(3, 7).unwrap();
    assert_eq!(r.len(), 4);
    assert!(!r.is_empty());
    assert!(SampleRange::new(7, 3).is_err());
    assert!(SampleRange::new(5, 5).unwrap().is_empty());
}
