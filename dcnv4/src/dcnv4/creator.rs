use super::{Dcnv4, FieldSchema, KernelImages, PluginField, FIELDS, PLUGIN_NAME, PLUGIN_VERSION};
use crate::{Plugin, PluginCreator, PluginError, TensorDesc};
use digit_layout::types as ty;
use log::{debug, trace};

/// DCNv4 插件工厂。
///
/// 由 [with_kernels](Creator::with_kernels) 构造的工厂会把核函数映像附加到创建的每个实例上，
/// 映像随实例一起序列化。
#[derive(Clone, Default, Debug)]
pub struct Creator {
    namespace: String,
    kernels: Option<KernelImages>,
}

impl Creator {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kernels(kernels: KernelImages) -> Self {
        debug!(
            "DCNv4 creator with kernel images: primary {} bytes, stages {:?}",
            kernels.primary.len(),
            kernels.stages.each_ref().map(|s| s.len()),
        );
        Self {
            namespace: String::new(),
            kernels: Some(kernels),
        }
    }
}

impl PluginCreator for Creator {
    type Plugin = Dcnv4;

    #[inline]
    fn plugin_name(&self) -> &str {
        PLUGIN_NAME
    }

    #[inline]
    fn plugin_version(&self) -> &str {
        PLUGIN_VERSION
    }

    #[inline]
    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[inline]
    fn set_namespace(&mut self, namespace: &str) {
        namespace.clone_into(&mut self.namespace)
    }

    #[inline]
    fn field_names(&self) -> &'static [FieldSchema] {
        FIELDS
    }

    fn create_plugin(&self, name: &str, fields: &[PluginField]) -> Result<Dcnv4, PluginError> {
        let mut plugin = Dcnv4::from_fields(name, fields)?;
        plugin.set_kernels(self.kernels.clone());
        plugin.set_namespace(&self.namespace);
        Ok(plugin)
    }

    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> Result<Dcnv4, PluginError> {
        let mut plugin = Dcnv4::deserialize(name, data)?;
        plugin.set_namespace(&self.namespace);
        Ok(plugin)
    }

    fn validate(
        &self,
        name: &str,
        _serial_data: &[u8],
        inputs: &[TensorDesc],
        outputs: &[TensorDesc],
        _workspace_size: usize,
    ) -> bool {
        trace!(
            "validate \"{name}\": {} inputs, {} outputs",
            inputs.len(),
            outputs.len()
        );
        let ([_, offset], [output]) = (inputs, outputs) else {
            return false;
        };
        offset.dt == output.dt && matches!(output.dt, ty::F16 | ty::F32 | ty::I8)
    }
}
