//! Channel rearrangement kernels for interleaved and planar buffers.

/// Copies the first `min(in_channels, out_channels)` channels of each frame.
///
/// Extra input channels are dropped; extra output channels are left as
/// they were.
///
/// # Panics
///
/// If `input` holds fewer than `sample_count * in_channels` samples or
/// `output` fewer than `sample_count * out_channels`.
pub fn extract<T: Copy>(
    input: &[T],
    output: &mut [T],
    sample_count: usize,
    in_channels: usize,
    out_channels: usize,
) {
    let input = &input[..sample_count * in_channels];
    let output = &mut output[..sample_count * out_channels];
    let n = in_channels.min(out_channels);
    if n == 0 {
        return;
    }
    let frames = input.chunks_exact(in_channels).zip(output.chunks_exact_mut(out_channels));
    match n {
        1 => {
            for (i, o) in frames {
                o[0] = i[0];
            }
        }
        2 => {
            for (i, o) in frames {
                o[0] = i[0];
                o[1] = i[1];
            }
        }
        _ => {
            for (i, o) in frames {
                o[..n].copy_from_slice(&i[..n]);
            }
        }
    }
}

/// Interleaves per-channel planes into `output`.
///
/// `planes.len()` is the channel count; each plane holds `sample_count`
/// samples.
pub fn planar_interleave<T: Copy>(planes: &[&[T]], output: &mut [T], sample_count: usize) {
    let channels = planes.len();
    let output = &mut output[..sample_count * channels];
    match channels {
        0 => {}
        1 => output.copy_from_slice(&planes[0][..sample_count]),
        2 => {
            let (l, r) = (&planes[0][..sample_count], &planes[1][..sample_count]);
            for ((o, &a), &b) in output.chunks_exact_mut(2).zip(l).zip(r) {
                o[0] = a;
                o[1] = b;
            }
        }
        _ => {
            for (c, plane) in planes.iter().enumerate() {
                for (s, &v) in plane[..sample_count].iter().enumerate() {
                    output[s * channels + c] = v;
                }
            }
        }
    }
}

/// Splits an interleaved buffer into per-channel planes.
///
/// The inverse of [`planar_interleave`].
pub fn planar_deinterleave<T: Copy>(input: &[T], planes: &mut [&mut [T]], sample_count: usize) {
    let channels = planes.len();
    if channels == 1 {
        planes[0][..sample_count].copy_from_slice(&input[..sample_count]);
        return;
    }
    for (c, plane) in planes.iter_mut().enumerate() {
        for (s, v) in plane[..sample_count].iter_mut().enumerate() {
            *v = input[s * channels + c];
        }
    }
}
