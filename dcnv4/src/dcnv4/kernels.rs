use crate::{args_not_support, corrupted, KernelImage, PluginError, Reader, Writer};
use log::trace;

/// 分阶段核函数映像的数量。
pub const STAGES: usize = 4;
/// 主映像数量，写在映像表头部。
const PRIMARY_IMAGES: i32 = 1;

/// 随引擎持久化的预编译核函数映像。
///
/// | field          | type         |
/// |:--------------:|:------------:|
/// | count          | i32 (= 1)    |
/// | primary.len    | i32          |
/// | primary        | [u8]         |
/// | stages[i].len  | u64          |
/// | stages[i]      | [u8]         |
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct KernelImages {
    pub primary: KernelImage,
    pub stages: [KernelImage; STAGES],
}

impl KernelImages {
    pub fn new(primary: impl Into<KernelImage>, stages: [KernelImage; STAGES]) -> Self {
        Self {
            primary: primary.into(),
            stages,
        }
    }

    /// 序列化后的字节数。
    pub fn serialized_size(&self) -> usize {
        size_of::<i32>()
            + size_of::<i32>()
            + self.primary.len()
            + self
                .stages
                .iter()
                .map(|s| size_of::<u64>() + s.len())
                .sum::<usize>()
    }

    pub(super) fn write(&self, w: &mut Writer) -> Result<(), PluginError> {
        let Ok(len) = i32::try_from(self.primary.len()) else {
            return Err(args_not_support(format!(
                "primary kernel image of {} bytes is too large",
                self.primary.len()
            )));
        };
        w.write(PRIMARY_IMAGES)?;
        w.write(len)?;
        w.bytes(&self.primary)?;
        for stage in &self.stages {
            w.write(stage.len() as u64)?;
            w.bytes(stage)?;
        }
        Ok(())
    }

    pub(super) fn read(r: &mut Reader) -> Result<Self, PluginError> {
        let count = r.read::<i32>()?;
        if count != PRIMARY_IMAGES {
            return Err(corrupted(format!(
                "{count} primary kernel images, {PRIMARY_IMAGES} expected"
            )));
        }
        let len = r.read::<i32>()?;
        let Ok(len) = usize::try_from(len) else {
            return Err(corrupted(format!("primary kernel image length {len}")));
        };
        let primary = KernelImage::from(r.bytes(len)?);
        trace!("primary kernel image: {len} bytes");

        let mut stages: [KernelImage; STAGES] = Default::default();
        for (i, stage) in stages.iter_mut().enumerate() {
            let len = r.read::<u64>()?;
            let Ok(len) = usize::try_from(len) else {
                return Err(corrupted(format!("stage {i} kernel image length {len}")));
            };
            *stage = KernelImage::from(r.bytes(len)?);
            trace!("stage {i} kernel image: {len} bytes");
        }
        Ok(Self { primary, stages })
    }
}

#[cfg(test)]
mod test {
    use super::{KernelImages, STAGES};
    use crate::{KernelImage, PluginErrorKind, Reader, Writer};

    fn images(primary: usize, stages: [usize; STAGES]) -> KernelImages {
        KernelImages::new(
            (0..primary).map(|i| i as u8).collect::<Vec<_>>(),
            stages.map(|n| KernelImage::from(vec![0xa5; n])),
        )
    }

    #[test]
    fn test_size() {
        assert_eq!(KernelImages::default().serialized_size(), 8 + 4 * 8);
        assert_eq!(
            images(100, [1, 0, 7, 4096]).serialized_size(),
            8 + 100 + 4 * 8 + 1 + 7 + 4096
        );
    }

    #[test]
    fn test_read_write() {
        for images in [
            KernelImages::default(),
            images(1, [0; STAGES]),
            images(333, [1, 2, 3, 65536]),
        ] {
            let mut buf = vec![0u8; images.serialized_size()];
            let mut w = Writer::new(&mut buf);
            images.write(&mut w).unwrap();
            assert_eq!(w.written(), buf.len());

            let mut r = Reader::new(&buf);
            assert_eq!(KernelImages::read(&mut r).unwrap(), images);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn test_bad_table() {
        let images = images(16, [4; STAGES]);
        let mut buf = vec![0u8; images.serialized_size()];
        images.write(&mut Writer::new(&mut buf)).unwrap();

        let e = KernelImages::read(&mut Reader::new(&buf[..buf.len() - 1])).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::Truncated);

        let mut bad = buf.clone();
        bad[..4].copy_from_slice(&2i32.to_le_bytes());
        let e = KernelImages::read(&mut Reader::new(&bad)).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::Corrupted);

        let mut bad = buf;
        bad[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        let e = KernelImages::read(&mut Reader::new(&bad)).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::Corrupted);
    }
}
