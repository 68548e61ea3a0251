use framepump::platform_utils::{
    bgra_to_rgba_in_place, dimension_from_i32, force_opaque, frame_byte_len, validate_dimensions,
};

#[test]
fn bgra_swizzle_swaps_red_and_blue() {
    let mut pixels = [30, 20, 10, 0, 3, 2, 1, 7];
    bgra_to_rgba_in_place(&mut pixels);
    assert_eq!(pixels, [10, 20, 30, 0, 1, 2, 3, 7]);
}

#[test]
fn force_opaque_only_touches_alpha() {
    let mut pixels = [1, 2, 3, 0, 4, 5, 6, 128];
    force_opaque(&mut pixels);
    assert_eq!(pixels, [1, 2, 3, 255, 4, 5, 6, 255]);
}

#[test]
fn frame_length_accounts_for_four_bytes_per_pixel() {
    assert_eq!(frame_byte_len(2, 1), Some(8));
    assert_eq!(frame_byte_len(1920, 1080), Some(1920 * 1080 * 4));
    assert_eq!(frame_byte_len(u32::MAX, u32::MAX), None);
}

#[test]
fn dimension_validation_limits() {
    assert!(validate_dimensions(1, 1).is_ok());
    assert!(validate_dimensions(0, 100).is_err());
    assert!(validate_dimensions(100, 0).is_err());
    assert!(validate_dimensions(u32::MAX, u32::MAX).is_err());
}

#[test]
fn negative_metrics_clamp_to_zero() {
    assert_eq!(dimension_from_i32(-5), 0);
    assert_eq!(dimension_from_i32(1280), 1280);
}
