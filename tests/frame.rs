use live_label::frame::{convert, Plane, RawFrame};
use live_label::FrameError;
use proptest::prelude::*;

fn i420(width: u32, height: u32, y: u8, u: u8, v: u8) -> Vec<u8> {
    let luma = (width * height) as usize;
    let chroma = (width.div_ceil(2) * height.div_ceil(2)) as usize;
    let mut data = vec![y; luma];
    data.extend(std::iter::repeat(u).take(chroma));
    data.extend(std::iter::repeat(v).take(chroma));
    data
}

#[test]
fn neutral_chroma_decodes_to_gray() {
    let frame = RawFrame::from_i420(4, 4, &i420(4, 4, 128, 128, 128)).unwrap();
    let image = convert(frame).unwrap();
    assert_eq!((image.width(), image.height()), (4, 4));
    assert!(image.as_rgb().pixels().all(|p| p.0 == [130, 130, 130]));
}

#[test]
fn luma_range_maps_to_black_and_white() {
    let black = convert(RawFrame::from_i420(2, 2, &i420(2, 2, 16, 128, 128)).unwrap()).unwrap();
    let white = convert(RawFrame::from_i420(2, 2, &i420(2, 2, 235, 128, 128)).unwrap()).unwrap();
    assert_eq!(black.as_rgb().get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(white.as_rgb().get_pixel(1, 1).0, [255, 255, 255]);
}

#[test]
fn v_plane_drives_red() {
    let frame = RawFrame::from_i420(2, 2, &i420(2, 2, 128, 128, 255)).unwrap();
    let image = convert(frame).unwrap();
    assert_eq!(image.as_rgb().get_pixel(0, 0).0, [255, 27, 130]);
}

#[test]
fn odd_dimensions_use_rounded_up_chroma() {
    let frame = RawFrame::from_i420(3, 5, &i420(3, 5, 128, 128, 128)).unwrap();
    assert_eq!(frame.u.data.len(), 2 * 3);
    let image = convert(frame).unwrap();
    assert_eq!((image.width(), image.height()), (3, 5));
}

#[test]
fn nv12_and_i420_decode_identically() {
    let (w, h) = (4u32, 2u32);
    let y: Vec<u8> = (0..8).map(|i| 40 + i * 20).collect();
    let u = [90u8, 160];
    let v = [200u8, 60];

    let mut planar = y.clone();
    planar.extend_from_slice(&u);
    planar.extend_from_slice(&v);
    let mut semi = y.clone();
    for i in 0..2 {
        semi.push(u[i]);
        semi.push(v[i]);
    }

    let a = convert(RawFrame::from_i420(w, h, &planar).unwrap()).unwrap();
    let b = convert(RawFrame::from_nv12(w, h, &semi).unwrap()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn yuyv_keeps_chroma_from_even_rows() {
    // 2x2: row 0 = Y0 U Y1 V, row 1 = Y2 U' Y3 V'
    let data = [10, 100, 20, 200, 30, 101, 40, 201];
    let frame = RawFrame::from_yuyv(2, 2, &data).unwrap();
    assert_eq!(frame.y.data, vec![10, 20, 30, 40]);
    assert_eq!(frame.u.data, vec![100]);
    assert_eq!(frame.v.data, vec![200]);
}

#[test]
fn yuyv_rejects_odd_width() {
    assert!(matches!(
        RawFrame::from_yuyv(3, 2, &[0; 12]),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn i420_rejects_wrong_length() {
    assert!(matches!(
        RawFrame::from_i420(4, 4, &[0; 10]),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn luma_size_must_match_dimensions() {
    let frame = RawFrame::new(
        4,
        4,
        Plane::packed(vec![0; 15], 4),
        Plane::packed(vec![128; 4], 2),
        Plane::packed(vec![128; 4], 2),
    );
    assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));
}

#[test]
fn short_chroma_plane_is_malformed() {
    let frame = RawFrame::new(
        4,
        4,
        Plane::packed(vec![0; 16], 4),
        Plane::packed(vec![128; 3], 2),
        Plane::packed(vec![128; 4], 2),
    );
    assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));
}

#[test]
fn strided_chroma_is_honoured() {
    // Chroma rows padded to 4 bytes with junk after the two real samples.
    let frame = RawFrame::new(
        4,
        4,
        Plane::packed(vec![128; 16], 4),
        Plane::new(vec![128, 128, 0, 0, 128, 128], 4, 1),
        Plane::new(vec![128, 128, 0, 0, 128, 128], 4, 1),
    );
    let image = convert(frame).unwrap();
    assert!(image.as_rgb().pixels().all(|p| p.0 == [130, 130, 130]));
}

#[test]
fn empty_frame_is_malformed() {
    let frame = RawFrame::new(
        0,
        0,
        Plane::packed(vec![], 0),
        Plane::packed(vec![], 0),
        Plane::packed(vec![], 0),
    );
    assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));
}

#[test]
fn constructors_reject_empty_dimensions() {
    for (w, h) in [(0, 0), (0, 2), (2, 0)] {
        assert!(matches!(RawFrame::from_i420(w, h, &[]), Err(FrameError::Malformed(_))));
        assert!(matches!(RawFrame::from_nv12(w, h, &[]), Err(FrameError::Malformed(_))));
        assert!(matches!(RawFrame::from_yuyv(w, h, &[]), Err(FrameError::Malformed(_))));
    }
    assert!(matches!(
        RawFrame::from_nv12(0, 0, &[128; 8]),
        Err(FrameError::Malformed(_))
    ));
}

#[test]
fn overflowing_chroma_stride_is_malformed() {
    let frame = RawFrame::new(
        4,
        4,
        Plane::packed(vec![0; 16], 4),
        Plane::new(vec![128; 4], 2, usize::MAX),
        Plane::packed(vec![128; 4], 2),
    );
    assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));

    let frame = RawFrame::new(
        4,
        4,
        Plane::packed(vec![0; 16], 4),
        Plane::packed(vec![128; 4], 2),
        Plane::new(vec![128; 4], usize::MAX, 1),
    );
    assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));
}

proptest! {
    #[test]
    fn wide_chroma_strides_never_cover(
        row_stride in 8usize..,
        pixel_stride in any::<usize>(),
        len in 0usize..=8,
    ) {
        let frame = RawFrame::new(
            4,
            4,
            Plane::packed(vec![0; 16], 4),
            Plane::new(vec![128; len], row_stride, pixel_stride),
            Plane::packed(vec![128; 4], 2),
        );
        prop_assert!(matches!(convert(frame), Err(FrameError::Malformed(_))));
    }

    #[test]
    fn arbitrary_strides_never_panic(
        width in 1u32..6,
        height in 1u32..6,
        row_stride in any::<usize>(),
        pixel_stride in any::<usize>(),
        len in 0usize..32,
    ) {
        let luma = (width * height) as usize;
        let frame = RawFrame::new(
            width,
            height,
            Plane::packed(vec![0; luma], width as usize),
            Plane::new(vec![128; len], row_stride, pixel_stride),
            Plane::new(vec![128; len], row_stride, pixel_stride),
        );
        match convert(frame) {
            Ok(image) => prop_assert_eq!((image.width(), image.height()), (width, height)),
            Err(e) => prop_assert!(matches!(e, FrameError::Malformed(_))),
        }
    }
}
