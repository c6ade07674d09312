mod args;
mod creator;
mod kernels;

pub use args::{Attributes, FieldData, FieldSchema, FieldType, PluginField, FIELDS};
pub use creator::Creator;
pub use kernels::{KernelImages, STAGES};

use crate::{
    arity_mismatch, buffer_too_small, corrupted, from_type_code, index_out_of_range, truncated,
    type_code,
    utils::{rank_error, type_distinct},
    Dims, Plugin, PluginError, Reader, TensorDesc, TensorFormat, Writer, MAX_DIMS,
};
use digit_layout::{types as ty, DigitLayout};
use log::{debug, trace, warn};

pub const PLUGIN_NAME: &str = "DCNv4_Plugin";
pub const PLUGIN_VERSION: &str = "1";

/// 序列化的 [Dims] 字节数。
const DIMS_SIZE: usize = size_of::<i32>() * (1 + MAX_DIMS);
/// 不含核函数映像表的序列化字节数。
pub const FIXED_SIZE: usize = Attributes::SIZE + Negotiated::SIZE;

/// 与宿主协商得到的类型和形状。
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Negotiated {
    pub dt: DigitLayout,
    pub input: Dims,
    pub output: Dims,
    /// 第二个输入（偏移量和调制量）的第 3 维。
    pub padded_offset_dim: i32,
}

impl Default for Negotiated {
    fn default() -> Self {
        Self {
            dt: ty::F32,
            input: Dims::default(),
            output: Dims::default(),
            padded_offset_dim: 0,
        }
    }
}

impl Negotiated {
    const SIZE: usize = size_of::<i32>() + DIMS_SIZE * 2 + size_of::<i32>();

    fn write(&self, w: &mut Writer) -> Result<(), PluginError> {
        w.write(type_code(self.dt)?)?;
        write_dims(w, &self.input)?;
        write_dims(w, &self.output)?;
        w.write(self.padded_offset_dim)
    }

    fn read(r: &mut Reader) -> Result<Self, PluginError> {
        Ok(Self {
            dt: from_type_code(r.read()?)?,
            input: read_dims(r)?,
            output: read_dims(r)?,
            padded_offset_dim: r.read()?,
        })
    }
}

fn write_dims(w: &mut Writer, dims: &Dims) -> Result<(), PluginError> {
    w.write(dims.ndim() as i32)?;
    for &d in dims.slots() {
        w.write(d)?
    }
    Ok(())
}

fn read_dims(r: &mut Reader) -> Result<Dims, PluginError> {
    let ndim = r.read::<i32>()?;
    let mut d = [0; MAX_DIMS];
    for d in &mut d {
        *d = r.read()?
    }
    match usize::try_from(ndim) {
        Ok(ndim) if ndim <= MAX_DIMS => Dims::new(&d[..ndim]),
        _ => Err(corrupted(format!("ndim = {ndim}"))),
    }
}

/// DCNv4 算子实例。
#[derive(Clone, PartialEq, Debug)]
pub struct Dcnv4 {
    name: String,
    namespace: String,
    attrs: Attributes,
    negotiated: Negotiated,
    kernels: Option<KernelImages>,
}

impl Dcnv4 {
    pub fn new(name: impl Into<String>, attrs: Attributes) -> Self {
        Self {
            name: name.into(),
            namespace: String::new(),
            attrs,
            negotiated: Negotiated::default(),
            kernels: None,
        }
    }

    /// 由宿主提供的属性表构造。
    pub fn from_fields(name: impl Into<String>, fields: &[PluginField]) -> Result<Self, PluginError> {
        let attrs = Attributes::from_fields(fields)?;
        debug!(
            "create DCNv4: k = {}x{}, group = {}, group_channels = {}",
            attrs.kh, attrs.kw, attrs.group, attrs.group_channels
        );
        Ok(Self::new(name, attrs))
    }

    /// 由 [Plugin::serialize] 写出的数据重建实例，包括协商结果和核函数映像。
    pub fn deserialize(name: impl Into<String>, data: &[u8]) -> Result<Self, PluginError> {
        if data.len() < FIXED_SIZE {
            return Err(truncated(format!(
                "{} bytes, at least {FIXED_SIZE} expected",
                data.len()
            )));
        }
        let mut r = Reader::new(data);
        let attrs = Attributes::read(&mut r)?;
        let negotiated = Negotiated::read(&mut r)?;
        let kernels = if r.remaining() > 0 {
            Some(KernelImages::read(&mut r)?)
        } else {
            None
        };
        if r.remaining() > 0 {
            return Err(corrupted(format!("{} trailing bytes", r.remaining())));
        }

        let name = name.into();
        debug!(
            "deserialize DCNv4 \"{name}\" from {} bytes, kernel images: {}",
            data.len(),
            kernels.is_some()
        );
        Ok(Self {
            name,
            namespace: String::new(),
            attrs,
            negotiated,
            kernels,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    #[inline]
    pub fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    #[inline]
    pub fn kernels(&self) -> Option<&KernelImages> {
        self.kernels.as_ref()
    }

    #[inline]
    pub fn kernels_mut(&mut self) -> Option<&mut KernelImages> {
        self.kernels.as_mut()
    }

    /// 附加或移除随引擎持久化的核函数映像。
    #[inline]
    pub fn set_kernels(&mut self, kernels: Option<KernelImages>) {
        self.kernels = kernels
    }

    /// 是否已记录协商结果。
    #[inline]
    pub fn is_configured(&self) -> bool {
        self.negotiated.input.ndim() > 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PluginError> {
        let mut ans = vec![0; self.serialization_size()];
        self.serialize(&mut ans)?;
        Ok(ans)
    }
}

impl Plugin for Dcnv4 {
    #[inline]
    fn plugin_type(&self) -> &str {
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
    fn nb_outputs(&self) -> usize {
        1
    }

    fn output_dimensions(&self, index: usize, inputs: &[Dims]) -> Result<Dims, PluginError> {
        if index != 0 {
            return Err(index_out_of_range(format!("output {index} of 1")));
        }
        let [input, _offset] = inputs else {
            return Err(arity_mismatch(format!("{} inputs, 2 expected", inputs.len())));
        };
        let ans = self.attrs.infer_output(input)?;
        trace!("output dimensions: {input:?} -> {ans:?}");
        Ok(ans)
    }

    fn output_data_type(
        &self,
        index: usize,
        input_types: &[DigitLayout],
    ) -> Result<DigitLayout, PluginError> {
        if index != 0 {
            return Err(index_out_of_range(format!("output {index} of 1")));
        }
        input_types
            .first()
            .copied()
            .ok_or_else(|| arity_mismatch("no input type"))
    }

    fn supports_format_combination(
        &self,
        pos: usize,
        in_out: &[TensorDesc],
        nb_inputs: usize,
        nb_outputs: usize,
    ) -> bool {
        if pos >= nb_inputs + nb_outputs || in_out.len() < nb_inputs + nb_outputs {
            return false;
        }
        let desc = &in_out[pos];
        desc.format == TensorFormat::Linear
            && matches!(desc.dt, ty::F16 | ty::F32)
            && desc.dt == in_out[0].dt
    }

    fn configure(
        &mut self,
        inputs: &[TensorDesc],
        outputs: &[TensorDesc],
    ) -> Result<(), PluginError> {
        let [input, offset, ..] = inputs else {
            return Err(arity_mismatch(format!(
                "{} inputs, at least 2 expected",
                inputs.len()
            )));
        };
        let [output, ..] = outputs else {
            return Err(arity_mismatch("no output"));
        };
        let dts = inputs.iter().chain(outputs).map(|t| t.dt).collect::<Vec<_>>();
        let dt = type_distinct(&dts).inspect_err(|e| warn!("configure rejected: {e}"))?;
        type_code(dt)?;
        let &[_, _, padded_offset_dim, ..] = offset.dims.shape() else {
            return Err(rank_error("offset", 3, offset.dims.ndim()));
        };

        self.negotiated = Negotiated {
            dt,
            input: input.dims,
            output: output.dims,
            padded_offset_dim,
        };
        debug!("configure DCNv4: {:?}", self.negotiated);
        Ok(())
    }

    #[inline]
    fn initialize(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    #[inline]
    fn terminate(&mut self) {}

    #[inline]
    fn workspace_size(&self, _max_batch_size: usize) -> usize {
        0
    }

    fn serialization_size(&self) -> usize {
        FIXED_SIZE + self.kernels.as_ref().map_or(0, KernelImages::serialized_size)
    }

    fn serialize(&self, buf: &mut [u8]) -> Result<usize, PluginError> {
        let size = self.serialization_size();
        if buf.len() < size {
            return Err(buffer_too_small(format!(
                "{size} bytes needed, buffer holds {}",
                buf.len()
            )));
        }

        let mut w = Writer::new(buf);
        self.attrs.write(&mut w)?;
        self.negotiated.write(&mut w)?;
        if let Some(kernels) = &self.kernels {
            kernels.write(&mut w)?
        }
        assert_eq!(w.written(), size, "serialization size mismatch");
        trace!("serialize DCNv4 \"{}\": {size} bytes", self.name);
        Ok(size)
    }

    #[inline]
    fn is_output_broadcast_across_batch(&self, _output_index: usize, _input: &[bool]) -> bool {
        false
    }

    #[inline]
    fn can_broadcast_input_across_batch(&self, _input_index: usize) -> bool {
        false
    }

    #[inline]
    fn clone_plugin(&self) -> Box<dyn Plugin> {
        Box::new(self.clone())
    }
}
