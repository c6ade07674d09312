use super::{corrupted, type_not_support, PluginError};
use digit_layout::{types as ty, DigitLayout};

/// 宿主运行时数据类型枚举的整数编码。
pub fn type_code(dt: DigitLayout) -> Result<i32, PluginError> {
    match dt {
        ty::F32 => Ok(0),
        ty::F16 => Ok(1),
        ty::I8 => Ok(2),
        ty::I32 => Ok(3),
        _ => Err(type_not_support(format!("{dt:?} has no runtime type code"))),
    }
}

pub fn from_type_code(code: i32) -> Result<DigitLayout, PluginError> {
    match code {
        0 => Ok(ty::F32),
        1 => Ok(ty::F16),
        2 => Ok(ty::I8),
        3 => Ok(ty::I32),
        _ => Err(corrupted(format!("unknown type code {code}"))),
    }
}
