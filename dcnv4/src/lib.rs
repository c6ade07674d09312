mod common;

pub mod dcnv4;

pub use common::*;
pub use dcnv4::{
    Attributes, Creator, Dcnv4, FieldData, FieldSchema, FieldType, KernelImages, Negotiated,
    PluginField, FIELDS, PLUGIN_NAME, PLUGIN_VERSION, STAGES,
};

use digit_layout::DigitLayout;

/// 自定义算子插件。
///
/// 约定宿主推理运行时在构图、优化和引擎持久化过程中对一个算子实例的全部调用。
/// 宿主保证对同一实例的调用是串行的。
pub trait Plugin {
    /// 算子类型名。
    fn plugin_type(&self) -> &str;
    /// 算子版本。
    fn plugin_version(&self) -> &str;

    fn namespace(&self) -> &str;
    fn set_namespace(&mut self, namespace: &str);

    /// 输出张量数量。
    fn nb_outputs(&self) -> usize;

    /// 由输入形状推导第 `index` 个输出的形状。
    fn output_dimensions(&self, index: usize, inputs: &[Dims]) -> Result<Dims, PluginError>;

    /// 由输入类型推导第 `index` 个输出的类型。
    fn output_data_type(
        &self,
        index: usize,
        input_types: &[DigitLayout],
    ) -> Result<DigitLayout, PluginError>;

    /// 格式协商。
    ///
    /// 宿主对每个 `(张量位置, 候选格式)` 组合独立调用，
    /// `in_out` 依次排列 `nb_inputs` 个输入和 `nb_outputs` 个输出。
    /// 不接受的组合返回 `false`，这不是错误。
    fn supports_format_combination(
        &self,
        pos: usize,
        in_out: &[TensorDesc],
        nb_inputs: usize,
        nb_outputs: usize,
    ) -> bool;

    /// 宿主确定全部张量的类型和形状后调用，记录协商结果。
    fn configure(&mut self, inputs: &[TensorDesc], outputs: &[TensorDesc])
        -> Result<(), PluginError>;

    fn initialize(&mut self) -> Result<(), PluginError>;
    fn terminate(&mut self);

    /// 执行所需的工作空间。
    fn workspace_size(&self, max_batch_size: usize) -> usize;

    /// [serialize](Plugin::serialize) 将写出的字节数。
    fn serialization_size(&self) -> usize;
    /// 写出实例的全部可重建状态，返回写出的字节数。
    fn serialize(&self, buf: &mut [u8]) -> Result<usize, PluginError>;

    fn is_output_broadcast_across_batch(
        &self,
        output_index: usize,
        input_is_broadcasted: &[bool],
    ) -> bool;
    fn can_broadcast_input_across_batch(&self, input_index: usize) -> bool;

    /// 深拷贝，副本与原实例互不共享存储。
    fn clone_plugin(&self) -> Box<dyn Plugin>;
}

/// 插件的工厂，注册在宿主运行时中。
pub trait PluginCreator {
    type Plugin: Plugin;

    fn plugin_name(&self) -> &str;
    fn plugin_version(&self) -> &str;

    fn namespace(&self) -> &str;
    fn set_namespace(&mut self, namespace: &str);

    /// 可识别的属性表。
    fn field_names(&self) -> &'static [FieldSchema];

    /// 由属性表构造插件实例。
    fn create_plugin(&self, name: &str, fields: &[PluginField])
        -> Result<Self::Plugin, PluginError>;

    /// 由序列化数据重建插件实例。
    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> Result<Self::Plugin, PluginError>;

    /// 检查序列化实例能否用于给定的输入输出。不匹配时返回 `false`。
    fn validate(
        &self,
        name: &str,
        serial_data: &[u8],
        inputs: &[TensorDesc],
        outputs: &[TensorDesc],
        workspace_size: usize,
    ) -> bool;
}
