use std::{
    fmt,
    ops::{Deref, DerefMut},
};

/// 预编译的设备核函数映像，按字节原样保存。
#[derive(Clone, Default, PartialEq, Eq)]
pub struct KernelImage(Box<[u8]>);

impl KernelImage {
    /// 分配 `size` 字节的全零映像。
    #[inline]
    pub fn new(size: usize) -> Self {
        Self(vec![0; size].into_boxed_slice())
    }
}

impl From<Vec<u8>> for KernelImage {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self(value.into_boxed_slice())
    }
}

impl From<&[u8]> for KernelImage {
    #[inline]
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl Deref for KernelImage {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for KernelImage {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for KernelImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KernelImage({} bytes)", self.len())
    }
}
