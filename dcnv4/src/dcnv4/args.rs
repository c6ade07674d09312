use crate::{
    args_not_support, bad_field, shape_not_support, type_mismatch, utils::rank_error, Dims,
    PluginError, Reader, Writer,
};

/// 宿主属性值的基本类型。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldType {
    Int8,
    Int32,
    Float32,
    Float64,
    Char,
}

/// 宿主提供的属性值。
#[derive(Clone, PartialEq, Debug)]
pub enum FieldData {
    Int8(Vec<i8>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Char(String),
}

impl FieldData {
    pub fn ty(&self) -> FieldType {
        match self {
            Self::Int8(_) => FieldType::Int8,
            Self::Int32(_) => FieldType::Int32,
            Self::Float32(_) => FieldType::Float32,
            Self::Float64(_) => FieldType::Float64,
            Self::Char(_) => FieldType::Char,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Char(s) => s.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 一条具名属性。
#[derive(Clone, PartialEq, Debug)]
pub struct PluginField {
    pub name: String,
    pub data: FieldData,
}

impl PluginField {
    pub fn new(name: impl Into<String>, data: FieldData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    #[inline]
    pub fn i32(name: impl Into<String>, val: i32) -> Self {
        Self::new(name, FieldData::Int32(vec![val]))
    }

    #[inline]
    pub fn f32(name: impl Into<String>, val: f32) -> Self {
        Self::new(name, FieldData::Float32(vec![val]))
    }
}

/// 属性表中一项的名字和类型。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FieldSchema {
    pub name: &'static str,
    pub ty: FieldType,
    pub len: usize,
}

trait FieldScalar: Sized {
    const TYPE: FieldType;
    fn first(data: &FieldData) -> Option<Self>;
}

impl FieldScalar for i32 {
    const TYPE: FieldType = FieldType::Int32;
    #[inline]
    fn first(data: &FieldData) -> Option<Self> {
        match data {
            FieldData::Int32(v) => v.first().copied(),
            _ => None,
        }
    }
}

impl FieldScalar for f32 {
    const TYPE: FieldType = FieldType::Float32;
    #[inline]
    fn first(data: &FieldData) -> Option<Self> {
        match data {
            FieldData::Float32(v) => v.first().copied(),
            _ => None,
        }
    }
}

fn scalar<T: FieldScalar>(field: &PluginField) -> Result<T, PluginError> {
    T::first(&field.data).ok_or_else(|| {
        type_mismatch(format!(
            "{}: {:?} x {}, one {:?} expected",
            field.name,
            field.data.ty(),
            field.data.len(),
            T::TYPE,
        ))
    })
}

macro_rules! attributes {
    ($( $(#[$doc:meta])* $field:ident: $ty:ty, )+) => {
        /// DCNv4 的静态属性。
        #[derive(Clone, Copy, Default, PartialEq, Debug)]
        pub struct Attributes {
            $( $(#[$doc])* pub $field: $ty, )+
        }

        /// 可识别的属性表，顺序即序列化顺序。
        pub static FIELDS: &[FieldSchema] = &[
            $(
                FieldSchema {
                    name: stringify!($field),
                    ty: <$ty as FieldScalar>::TYPE,
                    len: 1,
                },
            )+
        ];

        impl Attributes {
            /// 序列化后的字节数。
            pub(super) const SIZE: usize = 0 $( + size_of::<$ty>() )+;

            fn set(&mut self, field: &PluginField) -> Result<(), PluginError> {
                match &*field.name {
                    $( stringify!($field) => self.$field = scalar(field)?, )+
                    name => {
                        return Err(bad_field(format!("\"{name}\" is not a DCNv4 attribute")))
                    }
                }
                Ok(())
            }

            pub(super) fn write(&self, w: &mut Writer) -> Result<(), PluginError> {
                $( w.write(self.$field)?; )+
                Ok(())
            }

            pub(super) fn read(r: &mut Reader) -> Result<Self, PluginError> {
                Ok(Self {
                    $( $field: r.read()?, )+
                })
            }
        }
    };
}

attributes! {
    /// 卷积核高
    kh: i32,
    /// 卷积核宽
    kw: i32,
    sh: i32,
    sw: i32,
    ph: i32,
    pw: i32,
    dh: i32,
    dw: i32,
    /// 分组数
    group: i32,
    /// 每组通道数
    group_channels: i32,
    /// 偏移量缩放
    offscale: f32,
    step: i32,
    /// 非零时去掉采样网格中心点
    remove_center: i32,
}

impl Attributes {
    /// 由属性表构造。未出现的属性保持 0，出现未知属性则整体失败。
    pub fn from_fields(fields: &[PluginField]) -> Result<Self, PluginError> {
        let mut ans = Self::default();
        for field in fields {
            ans.set(field)?;
        }
        Ok(ans)
    }

    /// 输出通道数，只由分组配置决定。
    #[inline]
    pub fn out_channels(&self) -> Option<i32> {
        self.group.checked_mul(self.group_channels)
    }

    /// 由 `[h, w, c]` 输入推导 `[h_out, w_out, group * group_channels]` 输出。
    ///
    /// 批大小固定为 1，不出现在形状中。
    /// 输出通道数与输入通道数无关，此处也不检查二者的关系。
    pub fn infer_output(&self, input: &Dims) -> Result<Dims, PluginError> {
        let &[h, w, _c] = input.shape() else {
            return Err(rank_error("input", 3, input.ndim()));
        };
        self.check_geometry()?;

        let h = out_extent("height", h, self.kh, self.sh, self.ph, self.dh)?;
        let w = out_extent("width", w, self.kw, self.sw, self.pw, self.dw)?;
        let Some(c) = self.out_channels() else {
            return Err(shape_not_support(format!(
                "group * group_channels = {} * {} overflows",
                self.group, self.group_channels
            )));
        };
        Dims::new(&[h, w, c])
    }

    fn check_geometry(&self) -> Result<(), PluginError> {
        let &Self {
            kh,
            kw,
            sh,
            sw,
            ph,
            pw,
            dh,
            dw,
            group,
            group_channels,
            ..
        } = self;
        for (name, val) in [
            ("kh", kh),
            ("kw", kw),
            ("sh", sh),
            ("sw", sw),
            ("dh", dh),
            ("dw", dw),
            ("group", group),
            ("group_channels", group_channels),
        ] {
            if val <= 0 {
                return Err(args_not_support(format!("{name} = {val}, positive expected")));
            }
        }
        for (name, val) in [("ph", ph), ("pw", pw)] {
            if val < 0 {
                return Err(args_not_support(format!("{name} = {val}, negative padding")));
            }
        }
        Ok(())
    }
}

/// 单个空间轴上的卷积输出长度。
fn out_extent(
    axis: &str,
    len: i32,
    kernel: i32,
    stride: i32,
    pad: i32,
    dilation: i32,
) -> Result<i32, PluginError> {
    let [len, kernel, stride, pad, dilation] = [len, kernel, stride, pad, dilation].map(i64::from);
    // 考虑空洞的卷积核跨度
    let span = dilation * (kernel - 1) + 1;
    let ans = (len + 2 * pad - span).div_euclid(stride) + 1;
    match i32::try_from(ans) {
        Ok(ans) if ans > 0 => Ok(ans),
        _ => Err(shape_not_support(format!(
            "{axis}: {len} + 2 * {pad} is shorter than kernel span {span}"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::{Attributes, FieldData, FieldType, PluginField, FIELDS};
    use crate::{Dims, PluginErrorKind};

    pub(crate) fn fields_3x3() -> Vec<PluginField> {
        vec![
            PluginField::i32("kh", 3),
            PluginField::i32("kw", 3),
            PluginField::i32("sh", 1),
            PluginField::i32("sw", 1),
            PluginField::i32("ph", 1),
            PluginField::i32("pw", 1),
            PluginField::i32("dh", 1),
            PluginField::i32("dw", 1),
            PluginField::i32("group", 4),
            PluginField::i32("group_channels", 16),
            PluginField::f32("offscale", 1.),
            PluginField::i32("step", 256),
            PluginField::i32("remove_center", 0),
        ]
    }

    #[test]
    fn test_schema() {
        let names = FIELDS.iter().map(|f| f.name).collect::<Vec<_>>();
        assert_eq!(
            names,
            [
                "kh",
                "kw",
                "sh",
                "sw",
                "ph",
                "pw",
                "dh",
                "dw",
                "group",
                "group_channels",
                "offscale",
                "step",
                "remove_center",
            ]
        );
        for f in FIELDS {
            let ty = if f.name == "offscale" {
                FieldType::Float32
            } else {
                FieldType::Int32
            };
            assert_eq!(f.ty, ty);
            assert_eq!(f.len, 1);
        }
        assert_eq!(Attributes::SIZE, 13 * 4);
    }

    #[test]
    fn test_schema_shared() {
        std::thread::scope(|s| {
            let handles = (0..4)
                .map(|_| s.spawn(|| Attributes::from_fields(&fields_3x3()).unwrap()))
                .collect::<Vec<_>>();
            for h in handles {
                assert_eq!(h.join().unwrap().group_channels, 16);
            }
        });
    }

    #[test]
    fn test_from_fields() {
        let attrs = Attributes::from_fields(&fields_3x3()).unwrap();
        assert_eq!(
            attrs,
            Attributes {
                kh: 3,
                kw: 3,
                sh: 1,
                sw: 1,
                ph: 1,
                pw: 1,
                dh: 1,
                dw: 1,
                group: 4,
                group_channels: 16,
                offscale: 1.,
                step: 256,
                remove_center: 0,
            }
        );

        // 未给出的属性保持默认值
        let attrs = Attributes::from_fields(&[PluginField::i32("group", 2)]).unwrap();
        assert_eq!(attrs.group, 2);
        assert_eq!(attrs.kh, 0);
    }

    #[test]
    fn test_random_fields() {
        use rand::Rng;

        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let vals = FIELDS
                .iter()
                .map(|f| match f.ty {
                    FieldType::Float32 => FieldData::Float32(vec![rng.gen_range(-4f32..4.)]),
                    _ => FieldData::Int32(vec![rng.gen()]),
                })
                .collect::<Vec<_>>();
            let fields = FIELDS
                .iter()
                .zip(&vals)
                .map(|(f, v)| PluginField::new(f.name, v.clone()))
                .collect::<Vec<_>>();
            let attrs = Attributes::from_fields(&fields).unwrap();

            let FieldData::Int32(kh) = &vals[0] else {
                unreachable!()
            };
            let FieldData::Float32(offscale) = &vals[10] else {
                unreachable!()
            };
            let FieldData::Int32(remove_center) = &vals[12] else {
                unreachable!()
            };
            assert_eq!(attrs.kh, kh[0]);
            assert_eq!(attrs.offscale, offscale[0]);
            assert_eq!(attrs.remove_center, remove_center[0]);
        }
    }

    #[test]
    fn test_bad_field() {
        let mut fields = fields_3x3();
        fields.push(PluginField::i32("kernel_size", 3));
        let e = Attributes::from_fields(&fields).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::BadField);
        assert!(e.info.contains("kernel_size"));

        let e = Attributes::from_fields(&[PluginField::i32("KH", 3)]).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::BadField);
    }

    #[test]
    fn test_field_type() {
        let e = Attributes::from_fields(&[PluginField::f32("kh", 3.)]).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::TypeMismatch);

        let e = Attributes::from_fields(&[PluginField::i32("offscale", 1)]).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::TypeMismatch);

        let empty = PluginField::new("kw", FieldData::Int32(vec![]));
        let e = Attributes::from_fields(&[empty]).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::TypeMismatch);
    }

    #[test]
    fn test_infer_output() {
        let attrs = Attributes::from_fields(&fields_3x3()).unwrap();
        let out = attrs.infer_output(&Dims::new(&[32, 32, 64]).unwrap()).unwrap();
        assert_eq!(out.shape(), &[32, 32, 64]);

        let attrs = Attributes {
            kh: 3,
            kw: 3,
            sh: 2,
            sw: 2,
            ph: 0,
            pw: 0,
            dh: 1,
            dw: 1,
            group: 1,
            group_channels: 8,
            ..Default::default()
        };
        let out = attrs.infer_output(&Dims::new(&[33, 34, 8]).unwrap()).unwrap();
        assert_eq!(out.shape(), &[16, 16, 8]);

        let attrs = Attributes {
            dh: 2,
            dw: 3,
            ..attrs
        };
        let out = attrs.infer_output(&Dims::new(&[33, 34, 8]).unwrap()).unwrap();
        // (33 - 5) / 2 + 1, (34 - 7) / 2 + 1
        assert_eq!(out.shape(), &[15, 14, 8]);
    }

    #[test]
    fn test_out_channels() {
        let attrs = Attributes::from_fields(&fields_3x3()).unwrap();
        for c in [1, 3, 64, 1000] {
            let out = attrs.infer_output(&Dims::new(&[8, 8, c]).unwrap()).unwrap();
            assert_eq!(out.shape()[2], 4 * 16);
        }
    }

    #[test]
    fn test_infer_error() {
        let attrs = Attributes::from_fields(&fields_3x3()).unwrap();

        let e = attrs.infer_output(&Dims::new(&[1, 32, 32, 64]).unwrap()).unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::RankNotSupport);

        let e = Attributes::default()
            .infer_output(&Dims::new(&[32, 32, 64]).unwrap())
            .unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::ArgsNotSupport);

        let e = Attributes { pw: -1, ..attrs }
            .infer_output(&Dims::new(&[32, 32, 64]).unwrap())
            .unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::ArgsNotSupport);

        let e = Attributes { ph: 0, ..attrs }
            .infer_output(&Dims::new(&[2, 32, 64]).unwrap())
            .unwrap_err();
        assert_eq!(e.kind, PluginErrorKind::ShapeNotSupport);
    }
}
