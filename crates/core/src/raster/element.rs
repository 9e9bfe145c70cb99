//! Cell value trait shared by attribute and code grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a grid cell.
///
/// Direction codes, stream links and sub-basin ids are integer grids;
/// elevations, slopes and soil parameters are float grids.
pub trait RasterElement:
    Copy + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// No-data value used when a grid does not declare one
    fn default_nodata() -> Self;

    /// Whether this value is no-data under the given marker
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Lossy conversion to f64 (no-data conversions yield `None`)
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Integer view of a code cell (direction, link or sub-basin id)
    fn to_i64(self) -> Option<i64> {
        NumCast::from(self)
    }
}

macro_rules! impl_int_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata.map_or(false, |nd| *self == nd)
            }
        }
    )*};
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {$(
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    )*};
}

impl_int_element!(i8, i16, i32, i64, u8, u16, u32);
impl_float_element!(f32, f64);
