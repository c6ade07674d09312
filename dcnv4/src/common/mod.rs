mod blob;
mod codec;
mod data_type;
mod error;
mod tensor;

pub use blob::KernelImage;
pub use data_type::{from_type_code, type_code};
pub use error::{functions::*, PluginError, PluginErrorKind};
pub use tensor::{Dims, TensorDesc, TensorFormat, MAX_DIMS};

pub(crate) use codec::{Reader, Writer};

pub mod utils {
    use super::{rank_not_support, type_mismatch, PluginError};
    use digit_layout::DigitLayout;

    #[inline]
    pub(crate) fn type_distinct(pairs: &[DigitLayout]) -> Result<DigitLayout, PluginError> {
        let [dt, tail @ ..] = pairs else {
            unreachable!("pairs empty");
        };
        if tail.iter().all(|it| it == dt) {
            Ok(*dt)
        } else {
            Err(type_mismatch(format!("{pairs:?} are not distinct")))
        }
    }

    #[inline]
    pub(crate) fn rank_error(arg: &str, expected: usize, actual: usize) -> PluginError {
        rank_not_support(format!("{arg}.ndim = {actual}, {expected} expected"))
    }
}
