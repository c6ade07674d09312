use std::{error::Error, fmt};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PluginErrorKind {
    /// 属性表中出现未知字段。
    BadField,
    TypeNotSupport,
    TypeMismatch,
    RankNotSupport,
    ShapeNotSupport,
    ArgsNotSupport,
    ArityMismatch,
    IndexOutOfRange,
    BufferTooSmall,
    /// 序列化数据提前结束。
    Truncated,
    /// 序列化数据内容非法。
    Corrupted,
}

#[derive(Clone, Debug)]
pub struct PluginError {
    pub kind: PluginErrorKind,
    pub info: String,
}

impl fmt::Display for PluginError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.info)
    }
}

impl Error for PluginError {}

pub(super) mod functions {
    use super::{PluginError, PluginErrorKind::*};

    macro_rules! builder {
        ($ty:ident: $name:ident $kind:expr) => {
            #[inline]
            pub fn $name(info: impl Into<String>) -> $ty {
                $ty {
                    kind: $kind,
                    info: info.into(),
                }
            }
        };
    }

    builder!(PluginError: bad_field         BadField       );
    builder!(PluginError: type_not_support  TypeNotSupport );
    builder!(PluginError: type_mismatch     TypeMismatch   );
    builder!(PluginError: rank_not_support  RankNotSupport );
    builder!(PluginError: shape_not_support ShapeNotSupport);
    builder!(PluginError: args_not_support  ArgsNotSupport );
    builder!(PluginError: arity_mismatch    ArityMismatch  );
    builder!(PluginError: index_out_of_range IndexOutOfRange);
    builder!(PluginError: buffer_too_small  BufferTooSmall );
    builder!(PluginError: truncated         Truncated      );
    builder!(PluginError: corrupted         Corrupted      );
}

#[test]
fn test_display() {
    let e = functions::bad_field("\"kx\" is not a DCNv4 attribute");
    assert_eq!(e.kind, PluginErrorKind::BadField);
    assert_eq!(
        e.to_string(),
        "BadField: \"kx\" is not a DCNv4 attribute"
    );
}
