use super::{rank_not_support, PluginError};
use digit_layout::DigitLayout;
use std::fmt;

/// 形状的最大维数。
pub const MAX_DIMS: usize = 8;

/// 张量形状。
///
/// | field   | type           |
/// |:-------:|:--------------:|
/// | nb_dims | i32            |
/// | d       | [i32; MAX_DIMS] |
///
/// 未使用的维度保持为 0，序列化时定长写出。
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Dims {
    nb_dims: u8,
    d: [i32; MAX_DIMS],
}

impl Dims {
    pub fn new(shape: &[i32]) -> Result<Self, PluginError> {
        if shape.len() > MAX_DIMS {
            return Err(rank_not_support(format!(
                "ndim = {}, at most {MAX_DIMS} supported",
                shape.len()
            )));
        }
        let mut d = [0; MAX_DIMS];
        d[..shape.len()].copy_from_slice(shape);
        Ok(Self {
            nb_dims: shape.len() as _,
            d,
        })
    }

    #[inline]
    pub const fn ndim(&self) -> usize {
        self.nb_dims as _
    }

    #[inline]
    pub fn shape(&self) -> &[i32] {
        &self.d[..self.ndim()]
    }

    /// 包括未使用维度在内的全部槽位。
    #[inline]
    pub(crate) const fn slots(&self) -> &[i32; MAX_DIMS] {
        &self.d
    }
}

impl fmt::Debug for Dims {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.shape())
    }
}

/// 宿主运行时提出的张量存储格式。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TensorFormat {
    /// 紧密排布的行主序格式。
    Linear,
    Chw2,
    Hwc8,
    Chw4,
    Chw16,
    Chw32,
    Hwc,
}

/// 协商过程中宿主描述的一个张量。
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct TensorDesc {
    pub dt: DigitLayout,
    pub format: TensorFormat,
    pub dims: Dims,
}

impl TensorDesc {
    #[inline]
    pub fn linear(dt: DigitLayout, dims: Dims) -> Self {
        Self {
            dt,
            format: TensorFormat::Linear,
            dims,
        }
    }
}
