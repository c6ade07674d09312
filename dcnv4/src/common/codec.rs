use super::{buffer_too_small, truncated, PluginError};

/// 可定长写入序列化缓冲的标量，统一按小端序编码。
pub trait Scalar: Sized + Copy {
    const SIZE: usize;
    fn put(self, dst: &mut [u8]);
    fn get(src: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($( $ty:ty )+) => {
        $(
            impl Scalar for $ty {
                const SIZE: usize = size_of::<$ty>();

                #[inline]
                fn put(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes())
                }

                #[inline]
                fn get(src: &[u8]) -> Self {
                    let mut bytes = [0; size_of::<$ty>()];
                    bytes.copy_from_slice(src);
                    Self::from_le_bytes(bytes)
                }
            }
        )+
    };
}

impl_scalar! { i32 u64 f32 }

pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    #[inline]
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn written(&self) -> usize {
        self.pos
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> Result<(), PluginError> {
        let end = self.pos + bytes.len();
        let Some(dst) = self.buf.get_mut(self.pos..end) else {
            return Err(buffer_too_small(format!(
                "{end} bytes needed, buffer holds {}",
                self.buf.len()
            )));
        };
        dst.copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    pub fn write<T: Scalar>(&mut self, val: T) -> Result<(), PluginError> {
        let end = self.pos + T::SIZE;
        let Some(dst) = self.buf.get_mut(self.pos..end) else {
            return Err(buffer_too_small(format!(
                "{end} bytes needed, buffer holds {}",
                self.buf.len()
            )));
        };
        val.put(dst);
        self.pos = end;
        Ok(())
    }
}

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[inline]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], PluginError> {
        if len > self.remaining() {
            return Err(truncated(format!(
                "{len} bytes expected at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let ans = &self.buf[self.pos..][..len];
        self.pos += len;
        Ok(ans)
    }

    #[inline]
    pub fn read<T: Scalar>(&mut self) -> Result<T, PluginError> {
        self.bytes(T::SIZE).map(T::get)
    }
}
