use super::*;

#[test]
fn empty_rect_is_rejected() {
    assert!(DisplayBuffer::new_byte(PixelRect::new(0, 0, 0, 4)).is_err());
    assert!(DisplayBuffer::new_half(PixelRect::new(2, 2, 2, 2)).is_err());
}

#[test]
fn rows_land_at_image_coordinates() {
    let mut display = DisplayBuffer::new_byte(PixelRect::from_xywh(10, 20, 4, 3)).unwrap();
    display
        .write_byte_row(11, 21, &[[1, 2, 3, 4], [5, 6, 7, 8]])
        .unwrap();
    assert_eq!(display.byte_at(11, 21), Some([1, 2, 3, 4]));
    assert_eq!(display.byte_at(12, 21), Some([5, 6, 7, 8]));
    assert_eq!(display.byte_at(10, 21), Some([0; 4]));
    assert_eq!(display.index_of(13, 22), Some(11));
    assert_eq!(display.byte_at(14, 21), None);
    assert_eq!(display.half_at(11, 21), None);
}

#[test]
fn overlong_or_mismatched_rows_are_errors() {
    let mut display = DisplayBuffer::new_half(PixelRect::from_xywh(0, 0, 2, 2)).unwrap();
    assert!(display.write_half_row(1, 0, &[[0; 4]; 2]).is_err());
    assert!(display.write_byte_row(0, 0, &[[0; 4]]).is_err());
    display.write_half_row(0, 1, &[[7; 4]; 2]).unwrap();
    assert_eq!(display.half_at(1, 1), Some([7; 4]));
    assert!(matches!(display.pixels(), DisplayPixels::Half(px) if px.len() == 4));
}
