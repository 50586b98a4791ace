//! Sample format conversion.
//!
//! Every conversion goes through a normalized `f64` in `[-1, 1]`. Integer
//! ranges are asymmetric, so negative values scale by `|MIN|` and positive
//! values by `MAX`; this keeps `MIN -> -1.0 -> MIN` and `MAX -> 1.0 -> MAX`
//! exact for every pair of types. Floats outside `[-1, 1]` clamp when
//! converted to integers.

use super::SampleType;

/// A PCM sample type.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + 'static {
    /// Runtime tag for this type.
    const TYPE: SampleType;

    /// Normalizes to `[-1, 1]` (floats pass through unchanged).
    fn to_f64(self) -> f64;

    /// Converts from a normalized value, clamping for integer types.
    fn from_f64(value: f64) -> Self;

    /// Decodes one native-endian sample.
    fn from_ne_slice(bytes: &[u8]) -> Self;

    /// Encodes one native-endian sample into `out`.
    fn write_ne(self, out: &mut [u8]);
}

macro_rules! int_sample {
    ($t:ty, $tag:ident) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$tag;

            #[inline]
            fn to_f64(self) -> f64 {
                if self < 0 {
                    self as f64 / -(<$t>::MIN as f64)
                } else {
                    self as f64 / <$t>::MAX as f64
                }
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                let v = value.clamp(-1.0, 1.0);
                if v < 0.0 {
                    (v * -(<$t>::MIN as f64)).round() as $t
                } else {
                    (v * <$t>::MAX as f64).round() as $t
                }
            }

            #[inline]
            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut b = [0u8; std::mem::size_of::<$t>()];
                b.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(b)
            }

            #[inline]
            fn write_ne(self, out: &mut [u8]) {
                out[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_ne_bytes());
            }
        }
    };
}

macro_rules! float_sample {
    ($t:ty, $tag:ident) => {
        impl Sample for $t {
            const TYPE: SampleType = SampleType::$tag;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }

            #[inline]
            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut b = [0u8; std::mem::size_of::<$t>()];
                b.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                <$t>::from_ne_bytes(b)
            }

            #[inline]
            fn write_ne(self, out: &mut [u8]) {
                out[..std::mem::size_of::<$t>()].copy_from_slice(&self.to_ne_bytes());
            }
        }
    };
}

int_sample!(i8, S8);
int_sample!(i16, S16);
int_sample!(i32, S32);
float_sample!(f32, F32);
float_sample!(f64, F64);

/// Converts one sample between types.
#[inline]
pub fn convert<A: Sample, B: Sample>(value: A) -> B {
    B::from_f64(value.to_f64())
}

/// Converts `input` into `output`, element by element.
///
/// Converts `min(input.len(), output.len())` samples.
pub fn convert_slice<A: Sample, B: Sample>(input: &[A], output: &mut [B]) {
    for (o, &i) in output.iter_mut().zip(input) {
        *o = convert(i);
    }
}

macro_rules! named {
    ($($name:ident: $a:ty => $b:ty),* $(,)?) => {
        $(
            #[doc = concat!("Converts `", stringify!($a), "` to `", stringify!($b), "`.")]
            #[inline]
            pub fn $name(value: $a) -> $b {
                convert(value)
            }
        )*
    };
}

named! {
    s8_to_s16: i8 => i16,
    s8_to_s32: i8 => i32,
    s8_to_f32: i8 => f32,
    s8_to_f64: i8 => f64,
    s16_to_s8: i16 => i8,
    s16_to_s32: i16 => i32,
    s16_to_f32: i16 => f32,
    s16_to_f64: i16 => f64,
    s32_to_s8: i32 => i8,
    s32_to_s16: i32 => i16,
    s32_to_f32: i32 => f32,
    s32_to_f64: i32 => f64,
    f32_to_s8: f32 => i8,
    f32_to_s16: f32 => i16,
    f32_to_s32: f32 => i32,
    f32_to_f64: f32 => f64,
    f64_to_s8: f64 => i8,
    f64_to_s16: f64 => i16,
    f64_to_s32: f64 => i32,
    f64_to_f32: f64 => f32,
}
