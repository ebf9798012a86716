use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use effects::{
    ParamKind, ParamMap, ParamValue, ParameterSpec, ParameterTypeError, PARAMETER_FIELD_PREFIX,
};

/// Reserved values at the start of every effect's uniform block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct ReservedUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub padding: f32,
}

const RESERVED_SIZE: usize = std::mem::size_of::<ReservedUniforms>();

/// GLSL type of a parameter slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Vec2,
    Vec3,
    Vec4,
    /// Choice indices and booleans.
    Int,
}

impl UniformKind {
    fn for_param(kind: &ParamKind) -> Self {
        match kind {
            ParamKind::Scalar => UniformKind::Float,
            ParamKind::Vec2 => UniformKind::Vec2,
            ParamKind::Vec3 => UniformKind::Vec3,
            ParamKind::Vec4 => UniformKind::Vec4,
            ParamKind::Choice { .. } | ParamKind::Bool => UniformKind::Int,
        }
    }

    fn glsl(&self) -> &'static str {
        match self {
            UniformKind::Float => "float",
            UniformKind::Vec2 => "vec2",
            UniformKind::Vec3 => "vec3",
            UniformKind::Vec4 => "vec4",
            UniformKind::Int => "int",
        }
    }

    /// std140 base alignment in bytes.
    fn align(&self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 | UniformKind::Vec4 => 16,
        }
    }

    fn size(&self) -> usize {
        match self {
            UniformKind::Float | UniformKind::Int => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UniformField {
    pub name: String,
    pub kind: UniformKind,
    pub offset: usize,
}

/// std140 layout of an effect's uniform block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl UniformLayout {
    /// Layout holding only `uResolution` and `uTime`.
    pub fn reserved_only() -> Self {
        Self {
            fields: Vec::new(),
            size: RESERVED_SIZE,
        }
    }

    /// Lays parameters out in name order after the reserved header.
    pub fn for_parameters(parameters: &BTreeMap<String, ParameterSpec>) -> Self {
        let mut offset = RESERVED_SIZE;
        let mut fields = Vec::with_capacity(parameters.len());
        for (name, spec) in parameters {
            let kind = UniformKind::for_param(&spec.kind);
            offset = align_to(offset, kind.align());
            fields.push(UniformField {
                name: name.clone(),
                kind,
                offset,
            });
            offset += kind.size();
        }
        Self {
            fields,
            size: align_to(offset, 16),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// GLSL member declarations and `#define` aliases for the parameters.
    pub fn glsl_block(&self) -> (String, String) {
        let mut members = String::new();
        let mut macros = String::new();
        for field in self.fields() {
            members.push_str(&format!(
                "    {} {PARAMETER_FIELD_PREFIX}{};\n",
                field.kind.glsl(),
                field.name
            ));
            macros.push_str(&format!(
                "#define {0} params.{PARAMETER_FIELD_PREFIX}{0}\n",
                field.name
            ));
        }
        (members, macros)
    }
}

/// Serializes merged parameters into the uniform block bytes for `layout`.
///
/// Reserved uniforms are always written. Map entries without a slot in the
/// layout are ignored; slots without a map entry stay zero.
pub(crate) fn bind_parameters(
    layout: &UniformLayout,
    params: &ParamMap,
    resolution: (u32, u32),
    time: f32,
) -> Result<Vec<u8>, ParameterTypeError> {
    let mut bytes = vec![0u8; layout.size()];
    let reserved = ReservedUniforms {
        resolution: [resolution.0 as f32, resolution.1 as f32],
        time,
        padding: 0.0,
    };
    bytes[..RESERVED_SIZE].copy_from_slice(bytemuck::bytes_of(&reserved));

    for (name, value) in params {
        let Some(field) = layout.field(name) else {
            tracing::trace!(parameter = %name, "no uniform slot for parameter; ignoring");
            continue;
        };
        let offset = field.offset;
        match (field.kind, value) {
            (UniformKind::Float, ParamValue::Scalar(v)) => write_floats(&mut bytes, offset, &[*v]),
            (UniformKind::Vec2, ParamValue::Vec2(v)) => write_floats(&mut bytes, offset, v),
            (UniformKind::Vec3, ParamValue::Vec3(v)) => write_floats(&mut bytes, offset, v),
            (UniformKind::Vec4, ParamValue::Vec4(v)) => write_floats(&mut bytes, offset, v),
            (UniformKind::Int, ParamValue::Scalar(v)) => {
                write_int(&mut bytes, offset, v.round() as i32)
            }
            (UniformKind::Int, ParamValue::Bool(flag)) => {
                write_int(&mut bytes, offset, i32::from(*flag))
            }
            (kind, other) => {
                return Err(ParameterTypeError::new(
                    name.clone(),
                    format!(
                        "uniform slot is {} but the value is {}",
                        kind.glsl(),
                        other.shape_name()
                    ),
                ))
            }
        }
    }
    Ok(bytes)
}

fn write_floats(bytes: &mut [u8], offset: usize, values: &[f32]) {
    let source: &[u8] = bytemuck::cast_slice(values);
    bytes[offset..offset + source.len()].copy_from_slice(source);
}

fn write_int(bytes: &mut [u8], offset: usize, value: i32) {
    bytes[offset..offset + 4].copy_from_slice(bytemuck::bytes_of(&value));
}
