//! The externally consumable description of a validated shader's
//! attributes, uniforms and varyings.
//!
//! Lookups accept `name`, `name[i]`, `name.field` and nested combinations,
//! and answer in terms of the GPU-binding layer's closed storage-tag
//! enumeration.

use std::cell::OnceCell;
use std::fmt;

use essl_ast::{ArraySize, Precision, SamplerKind, ScalarKind, Type, TypeInner};

use crate::types::leaf_count;

/// Which top-level collection a variable belongs to.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VariableKind {
    Attribute,
    Uniform,
    Varying,
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Attribute => "attribute",
            Self::Uniform => "uniform",
            Self::Varying => "varying",
        })
    }
}

/// The native binding layer's closed enumeration of leaf storage shapes.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum StorageTag {
    Bool,
    BoolVec2,
    BoolVec3,
    BoolVec4,
    Int,
    IntVec2,
    IntVec3,
    IntVec4,
    Float,
    FloatVec2,
    FloatVec3,
    FloatVec4,
    FloatMat2,
    FloatMat3,
    FloatMat4,
    Sampler2D,
    SamplerCube,
}

/// Maps a leaf type onto its storage tag.
pub fn storage_tag(ty: &Type) -> Option<StorageTag> {
    Some(match &ty.inner {
        TypeInner::Scalar(ScalarKind::Bool) => StorageTag::Bool,
        TypeInner::Scalar(ScalarKind::Int) | TypeInner::Scalar(ScalarKind::UInt) => {
            StorageTag::Int
        }
        TypeInner::Scalar(ScalarKind::Float) => StorageTag::Float,
        TypeInner::Vector { size, kind } => {
            let n = size.len();
            match kind {
                ScalarKind::Bool => match n {
                    2 => StorageTag::BoolVec2,
                    3 => StorageTag::BoolVec3,
                    _ => StorageTag::BoolVec4,
                },
                ScalarKind::Int | ScalarKind::UInt => match n {
                    2 => StorageTag::IntVec2,
                    3 => StorageTag::IntVec3,
                    _ => StorageTag::IntVec4,
                },
                ScalarKind::Float => match n {
                    2 => StorageTag::FloatVec2,
                    3 => StorageTag::FloatVec3,
                    _ => StorageTag::FloatVec4,
                },
            }
        }
        TypeInner::Matrix { cols, .. } => match cols.len() {
            2 => StorageTag::FloatMat2,
            3 => StorageTag::FloatMat3,
            _ => StorageTag::FloatMat4,
        },
        TypeInner::Sampler(SamplerKind::Sampler2D) => StorageTag::Sampler2D,
        TypeInner::Sampler(SamplerKind::SamplerCube) => StorageTag::SamplerCube,
        _ => return None,
    })
}

/// One exported variable.
#[derive(Clone, Debug)]
pub struct ShaderVariable {
    pub kind: VariableKind,
    /// Source name as written in the shader.
    pub name: String,
    /// Generated alias when the name had to be rewritten for the target.
    pub alias: Option<String>,
    pub ty: Type,
    pub precision: Precision,
}

impl fmt::Display for ShaderVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.kind,
            essl_ast::display::type_name(&self.ty),
            self.name
        )?;
        if let Some(alias) = &self.alias {
            write!(f, " (as {alias})")?;
        }
        Ok(())
    }
}

/// The normalized answer of a path lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct VariableInfo {
    pub tag: StorageTag,
    /// Element count: declared array length when the path names a whole
    /// array, 1 otherwise.
    pub count: u32,
    /// Canonical source name; whole arrays are canonicalized to
    /// `name[0]` form.
    pub canonical: String,
}

/// Ordered attribute/uniform/varying collections of one (or both) stages.
#[derive(Debug, Default)]
pub struct ShaderVariableSet {
    attributes: Vec<ShaderVariable>,
    uniforms: Vec<ShaderVariable>,
    varyings: Vec<ShaderVariable>,
    attribute_count: OnceCell<u32>,
    uniform_count: OnceCell<u32>,
    varying_count: OnceCell<u32>,
}

impl Clone for ShaderVariableSet {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            uniforms: self.uniforms.clone(),
            varyings: self.varyings.clone(),
            ..Self::default()
        }
    }
}

impl ShaderVariableSet {
    pub fn push(&mut self, var: ShaderVariable) {
        match var.kind {
            VariableKind::Attribute => self.attributes.push(var),
            VariableKind::Uniform => self.uniforms.push(var),
            VariableKind::Varying => self.varyings.push(var),
        }
    }

    pub fn attributes(&self) -> &[ShaderVariable] {
        &self.attributes
    }

    pub fn uniforms(&self) -> &[ShaderVariable] {
        &self.uniforms
    }

    pub fn varyings(&self) -> &[ShaderVariable] {
        &self.varyings
    }

    pub fn find_attribute(&self, name: &str) -> Option<&ShaderVariable> {
        self.attributes.iter().find(|v| v.name == name)
    }

    pub fn find_uniform(&self, name: &str) -> Option<&ShaderVariable> {
        self.uniforms.iter().find(|v| v.name == name)
    }

    pub fn find_varying(&self, name: &str) -> Option<&ShaderVariable> {
        self.varyings.iter().find(|v| v.name == name)
    }

    pub fn lookup_attribute(&self, path: &str) -> Option<VariableInfo> {
        lookup_path(&self.attributes, path)
    }

    pub fn lookup_uniform(&self, path: &str) -> Option<VariableInfo> {
        lookup_path(&self.uniforms, path)
    }

    pub fn lookup_varying(&self, path: &str) -> Option<VariableInfo> {
        lookup_path(&self.varyings, path)
    }

    /// Aggregate leaf count over all attributes (arrays expanded by length,
    /// structs recursively). Computed once, cached.
    pub fn attribute_count(&self) -> u32 {
        *self
            .attribute_count
            .get_or_init(|| self.attributes.iter().map(|v| leaf_count(&v.ty)).sum())
    }

    pub fn uniform_count(&self) -> u32 {
        *self
            .uniform_count
            .get_or_init(|| self.uniforms.iter().map(|v| leaf_count(&v.ty)).sum())
    }

    pub fn varying_count(&self) -> u32 {
        *self
            .varying_count
            .get_or_init(|| self.varyings.iter().map(|v| leaf_count(&v.ty)).sum())
    }

    /// Concatenates the uniform and varying lists of a second stage's set,
    /// skipping names already present. Attributes are vertex-only and are
    /// never merged from a fragment set.
    pub fn merge(&mut self, other: &ShaderVariableSet) {
        for var in &other.uniforms {
            if self.find_uniform(&var.name).is_none() {
                self.uniforms.push(var.clone());
            }
        }
        for var in &other.varyings {
            if self.find_varying(&var.name).is_none() {
                self.varyings.push(var.clone());
            }
        }
        self.attribute_count = OnceCell::new();
        self.uniform_count = OnceCell::new();
        self.varying_count = OnceCell::new();
    }
}

/// Splits `light.color` / `arr[2]` paths and walks the declared type.
fn lookup_path(vars: &[ShaderVariable], path: &str) -> Option<VariableInfo> {
    let (base, rest) = split_base(path);
    let var = vars.iter().find(|v| v.name == base)?;
    let mut ty = &var.ty;
    let mut canonical = String::from(base);
    let mut rest = rest;

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('[') {
            let close = tail.find(']')?;
            let index: u32 = tail[..close].parse().ok()?;
            match &ty.inner {
                TypeInner::Array { base, size } => {
                    if let ArraySize::Constant(n) = size {
                        if index >= *n {
                            return None;
                        }
                    }
                    ty = base;
                }
                TypeInner::Vector { size, kind } => {
                    if index >= size.len() {
                        return None;
                    }
                    return Some(VariableInfo {
                        tag: storage_tag(&Type::scalar(*kind))?,
                        count: 1,
                        canonical: format!("{canonical}[{index}]"),
                    });
                }
                _ => return None,
            }
            canonical.push('[');
            canonical.push_str(&tail[..close]);
            canonical.push(']');
            rest = &tail[close + 1..];
        } else if let Some(tail) = rest.strip_prefix('.') {
            let (field, after) = split_base(tail);
            match &ty.inner {
                TypeInner::Struct { fields, .. } => {
                    ty = &fields.iter().find(|f| f.name == field)?.ty;
                }
                _ => return None,
            }
            canonical.push('.');
            canonical.push_str(field);
            rest = after;
        } else {
            return None;
        }
    }

    match &ty.inner {
        TypeInner::Array { base, size } => {
            // A path naming a whole array canonicalizes to its first
            // element.
            let ArraySize::Constant(n) = size else {
                return None;
            };
            Some(VariableInfo {
                tag: storage_tag(base)?,
                count: *n,
                canonical: format!("{canonical}[0]"),
            })
        }
        _ => Some(VariableInfo {
            tag: storage_tag(ty)?,
            count: 1,
            canonical,
        }),
    }
}

fn split_base(path: &str) -> (&str, &str) {
    match path.find(['.', '[']) {
        Some(pos) => (&path[..pos], &path[pos..]),
        None => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essl_ast::{StructField, VectorSize};

    fn var(kind: VariableKind, name: &str, ty: Type) -> ShaderVariable {
        ShaderVariable {
            kind,
            name: name.into(),
            alias: None,
            ty,
            precision: Precision::None,
        }
    }

    fn sample_set() -> ShaderVariableSet {
        let mut set = ShaderVariableSet::default();
        set.push(var(
            VariableKind::Attribute,
            "pos",
            Type::vec(VectorSize::Tri),
        ));
        set.push(var(
            VariableKind::Uniform,
            "weights",
            Type::array(Type::float(), ArraySize::Constant(4)),
        ));
        set.push(var(
            VariableKind::Uniform,
            "light",
            Type::new(TypeInner::Struct {
                name: "Light".into(),
                fields: vec![
                    StructField {
                        name: "color".into(),
                        ty: Type::vec(VectorSize::Tri),
                    },
                    StructField {
                        name: "falloff".into(),
                        ty: Type::array(Type::float(), ArraySize::Constant(2)),
                    },
                ],
            }),
        ));
        set.push(var(
            VariableKind::Varying,
            "vColor",
            Type::vec(VectorSize::Quad),
        ));
        set
    }

    #[test]
    fn plain_lookup() {
        let set = sample_set();
        let info = set.lookup_attribute("pos").unwrap();
        assert_eq!(info.tag, StorageTag::FloatVec3);
        assert_eq!(info.count, 1);
        assert_eq!(info.canonical, "pos");
    }

    #[test]
    fn whole_array_lookup() {
        let set = sample_set();
        let info = set.lookup_uniform("weights").unwrap();
        assert_eq!(info.tag, StorageTag::Float);
        assert_eq!(info.count, 4);
        assert_eq!(info.canonical, "weights[0]");
    }

    #[test]
    fn array_element_lookup() {
        let set = sample_set();
        let info = set.lookup_uniform("weights[2]").unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(info.canonical, "weights[2]");
        assert!(set.lookup_uniform("weights[4]").is_none());
    }

    #[test]
    fn struct_field_lookup() {
        let set = sample_set();
        let info = set.lookup_uniform("light.color").unwrap();
        assert_eq!(info.tag, StorageTag::FloatVec3);
        assert_eq!(info.canonical, "light.color");
    }

    #[test]
    fn nested_struct_array_lookup() {
        let set = sample_set();
        let info = set.lookup_uniform("light.falloff").unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.canonical, "light.falloff[0]");
        let elem = set.lookup_uniform("light.falloff[1]").unwrap();
        assert_eq!(elem.count, 1);
    }

    #[test]
    fn counts_expand_arrays_and_structs() {
        let set = sample_set();
        assert_eq!(set.attribute_count(), 1);
        // weights: 4 leaves, light: color (1) + falloff (2) = 3
        assert_eq!(set.uniform_count(), 7);
        assert_eq!(set.varying_count(), 1);
        // Cached value stays stable on repeat calls.
        assert_eq!(set.uniform_count(), 7);
    }

    #[test]
    fn merge_skips_attributes() {
        let mut a = sample_set();
        let mut b = ShaderVariableSet::default();
        b.push(var(
            VariableKind::Attribute,
            "normal",
            Type::vec(VectorSize::Tri),
        ));
        b.push(var(VariableKind::Uniform, "extra", Type::float()));
        b.push(var(
            VariableKind::Uniform,
            "weights",
            Type::array(Type::float(), ArraySize::Constant(4)),
        ));
        a.merge(&b);
        assert!(a.find_attribute("normal").is_none());
        assert!(a.find_uniform("extra").is_some());
        // Duplicate name not doubled.
        assert_eq!(
            a.uniforms().iter().filter(|v| v.name == "weights").count(),
            1
        );
    }

    #[test]
    fn unknown_paths_resolve_to_none() {
        let set = sample_set();
        assert!(set.lookup_uniform("missing").is_none());
        assert!(set.lookup_uniform("light.missing").is_none());
        assert!(set.lookup_uniform("weights.color").is_none());
    }
}
