//! The closed catalog of builtin variables, constants and functions.
//!
//! Builtin functions are polymorphic over a small set of type categories;
//! resolution walks each name's candidate list in declaration order
//! (first match wins, mirroring the shading language's lack of best-match
//! overload resolution).

use std::collections::HashMap;

use essl_ast::{ArraySize, Precision, SamplerKind, ScalarKind, Type, TypeInner, VectorSize};

use crate::config::{Config, ShaderStage};

/// Optional language extensions gated behind `#extension`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Extension {
    /// `GL_OES_standard_derivatives`: dFdx/dFdy/fwidth in fragment shaders.
    StandardDerivatives,
}

impl Extension {
    pub fn name(self) -> &'static str {
        match self {
            Self::StandardDerivatives => "GL_OES_standard_derivatives",
        }
    }

    /// The `#define` advertised in generated code when enabled.
    pub fn define(self) -> &'static str {
        match self {
            Self::StandardDerivatives => "GL_OES_standard_derivatives",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GL_OES_standard_derivatives" => Some(Self::StandardDerivatives),
            _ => None,
        }
    }

    /// Stages the extension exists in at all.
    pub fn available_in(self, stage: ShaderStage) -> bool {
        match self {
            Self::StandardDerivatives => stage == ShaderStage::Fragment,
        }
    }

    fn bit(self) -> u32 {
        match self {
            Self::StandardDerivatives => 1,
        }
    }

    pub const ALL: &'static [Extension] = &[Self::StandardDerivatives];
}

/// Set of enabled extensions.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub struct ExtensionSet(u32);

impl ExtensionSet {
    pub const EMPTY: Self = Self(0);

    pub fn contains(self, ext: Extension) -> bool {
        self.0 & ext.bit() != 0
    }

    pub fn insert(&mut self, ext: Extension) {
        self.0 |= ext.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Extension> {
        Extension::ALL
            .iter()
            .copied()
            .filter(move |e| self.contains(*e))
    }
}

/// A parameter or return type category of a builtin function.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Cat {
    /// Exact `bool`; loosely matches any scalar argument.
    Bool,
    /// Exact `float`; loosely matches any scalar argument.
    Float,
    Vec2,
    Vec3,
    Vec4,
    Sampler2D,
    SamplerCube,
    /// Generic float: `float`, `vec2`, `vec3` or `vec4`.
    GenF,
    /// Any float vector.
    AnyVec,
    /// Any matrix.
    AnyMat,
    /// Any boolean vector.
    BVec,
    /// Any signed-integer vector.
    IVec,
}

impl Cat {
    /// Whether this category binds the call's generic instance type.
    pub fn is_generic(self) -> bool {
        matches!(
            self,
            Self::GenF | Self::AnyVec | Self::AnyMat | Self::BVec | Self::IVec
        )
    }

    /// Tests a concrete argument type against the category.
    pub fn matches(self, ty: &Type) -> bool {
        match self {
            // Scalar categories accept any scalar; strict kind agreement is
            // not required here (the language's own builtin matching is this
            // loose for scalars).
            Self::Bool | Self::Float => matches!(ty.inner, TypeInner::Scalar(_)),
            Self::Vec2 => is_float_vec(ty, VectorSize::Bi),
            Self::Vec3 => is_float_vec(ty, VectorSize::Tri),
            Self::Vec4 => is_float_vec(ty, VectorSize::Quad),
            Self::Sampler2D => {
                matches!(ty.inner, TypeInner::Sampler(SamplerKind::Sampler2D))
            }
            Self::SamplerCube => {
                matches!(ty.inner, TypeInner::Sampler(SamplerKind::SamplerCube))
            }
            Self::GenF => matches!(
                ty.inner,
                TypeInner::Scalar(ScalarKind::Float)
                    | TypeInner::Vector {
                        kind: ScalarKind::Float,
                        ..
                    }
            ),
            Self::AnyVec => matches!(
                ty.inner,
                TypeInner::Vector {
                    kind: ScalarKind::Float,
                    ..
                }
            ),
            Self::AnyMat => matches!(ty.inner, TypeInner::Matrix { .. }),
            Self::BVec => matches!(
                ty.inner,
                TypeInner::Vector {
                    kind: ScalarKind::Bool,
                    ..
                }
            ),
            Self::IVec => matches!(
                ty.inner,
                TypeInner::Vector {
                    kind: ScalarKind::Int,
                    ..
                }
            ),
        }
    }

    /// The concrete type of a non-generic category.
    pub fn concrete_type(self) -> Option<Type> {
        Some(match self {
            Self::Bool => Type::bool(),
            Self::Float => Type::float(),
            Self::Vec2 => Type::vec(VectorSize::Bi),
            Self::Vec3 => Type::vec(VectorSize::Tri),
            Self::Vec4 => Type::vec(VectorSize::Quad),
            Self::Sampler2D => Type::sampler(SamplerKind::Sampler2D),
            Self::SamplerCube => Type::sampler(SamplerKind::SamplerCube),
            _ => return None,
        })
    }
}

fn is_float_vec(ty: &Type, size: VectorSize) -> bool {
    matches!(
        ty.inner,
        TypeInner::Vector { size: s, kind: ScalarKind::Float } if s == size
    )
}

/// A builtin variable or constant.
#[derive(Clone, Debug)]
pub struct BuiltinVar {
    pub ty: Type,
    pub read_only: bool,
    /// Written by the shader and consumed by the pipeline (e.g.
    /// `gl_Position`, `gl_FragColor`).
    pub is_output: bool,
    pub const_value: Option<i32>,
}

/// A builtin function candidate.
#[derive(Clone, Debug)]
pub struct BuiltinFun {
    pub name: &'static str,
    pub ret: Cat,
    pub args: &'static [Cat],
}

/// One catalog entry.
#[derive(Clone, Debug)]
pub enum Builtin {
    Var(BuiltinVar),
    Fun(BuiltinFun),
}

/// Result of a catalog lookup.
pub enum Lookup<'a> {
    Hit(&'a [Builtin]),
    /// The name exists, but only behind an extension that is not enabled.
    Gated(Extension),
    Miss,
}

use Cat::{AnyMat, AnyVec, BVec, Bool, Float, GenF, IVec, Sampler2D, SamplerCube, Vec2, Vec3, Vec4};

/// Core builtin functions in resolution order (the order of the language
/// specification's own listing). Do not reorder: `resolve` is first-match.
const CORE_FUNCTIONS: &[(&str, Cat, &[Cat])] = &[
    // Angle and trigonometry
    ("radians", GenF, &[GenF]),
    ("degrees", GenF, &[GenF]),
    ("sin", GenF, &[GenF]),
    ("cos", GenF, &[GenF]),
    ("tan", GenF, &[GenF]),
    ("asin", GenF, &[GenF]),
    ("acos", GenF, &[GenF]),
    ("atan", GenF, &[GenF, GenF]),
    ("atan", GenF, &[GenF]),
    // Exponential
    ("pow", GenF, &[GenF, GenF]),
    ("exp", GenF, &[GenF]),
    ("log", GenF, &[GenF]),
    ("exp2", GenF, &[GenF]),
    ("log2", GenF, &[GenF]),
    ("sqrt", GenF, &[GenF]),
    ("inversesqrt", GenF, &[GenF]),
    // Common
    ("abs", GenF, &[GenF]),
    ("sign", GenF, &[GenF]),
    ("floor", GenF, &[GenF]),
    ("ceil", GenF, &[GenF]),
    ("fract", GenF, &[GenF]),
    ("mod", GenF, &[GenF, Float]),
    ("mod", GenF, &[GenF, GenF]),
    ("min", GenF, &[GenF, GenF]),
    ("min", GenF, &[GenF, Float]),
    ("max", GenF, &[GenF, GenF]),
    ("max", GenF, &[GenF, Float]),
    ("clamp", GenF, &[GenF, GenF, GenF]),
    ("clamp", GenF, &[GenF, Float, Float]),
    ("mix", GenF, &[GenF, GenF, GenF]),
    ("mix", GenF, &[GenF, GenF, Float]),
    ("step", GenF, &[GenF, GenF]),
    ("step", GenF, &[Float, GenF]),
    ("smoothstep", GenF, &[GenF, GenF, GenF]),
    ("smoothstep", GenF, &[Float, Float, GenF]),
    // Geometric
    ("length", Float, &[GenF]),
    ("distance", Float, &[GenF, GenF]),
    ("dot", Float, &[GenF, GenF]),
    ("cross", Vec3, &[Vec3, Vec3]),
    ("normalize", GenF, &[GenF]),
    ("faceforward", GenF, &[GenF, GenF, GenF]),
    ("reflect", GenF, &[GenF, GenF]),
    ("refract", GenF, &[GenF, GenF, Float]),
    // Matrix
    ("matrixCompMult", AnyMat, &[AnyMat, AnyMat]),
    // Vector relational
    ("lessThan", BVec, &[AnyVec, AnyVec]),
    ("lessThan", BVec, &[IVec, IVec]),
    ("lessThanEqual", BVec, &[AnyVec, AnyVec]),
    ("lessThanEqual", BVec, &[IVec, IVec]),
    ("greaterThan", BVec, &[AnyVec, AnyVec]),
    ("greaterThan", BVec, &[IVec, IVec]),
    ("greaterThanEqual", BVec, &[AnyVec, AnyVec]),
    ("greaterThanEqual", BVec, &[IVec, IVec]),
    ("equal", BVec, &[AnyVec, AnyVec]),
    ("equal", BVec, &[IVec, IVec]),
    ("equal", BVec, &[BVec, BVec]),
    ("notEqual", BVec, &[AnyVec, AnyVec]),
    ("notEqual", BVec, &[IVec, IVec]),
    ("notEqual", BVec, &[BVec, BVec]),
    ("any", Bool, &[BVec]),
    ("all", Bool, &[BVec]),
    ("not", BVec, &[BVec]),
    // Texture lookups
    ("texture2D", Vec4, &[Sampler2D, Vec2]),
    ("texture2D", Vec4, &[Sampler2D, Vec2, Float]),
    ("texture2DProj", Vec4, &[Sampler2D, Vec3]),
    ("texture2DProj", Vec4, &[Sampler2D, Vec4]),
    ("texture2DProj", Vec4, &[Sampler2D, Vec3, Float]),
    ("texture2DProj", Vec4, &[Sampler2D, Vec4, Float]),
    ("texture2DLod", Vec4, &[Sampler2D, Vec2, Float]),
    ("texture2DProjLod", Vec4, &[Sampler2D, Vec3, Float]),
    ("texture2DProjLod", Vec4, &[Sampler2D, Vec4, Float]),
    ("textureCube", Vec4, &[SamplerCube, Vec3]),
    ("textureCube", Vec4, &[SamplerCube, Vec3, Float]),
    ("textureCubeLod", Vec4, &[SamplerCube, Vec3, Float]),
];

/// Derivative functions, visible only once `GL_OES_standard_derivatives`
/// has been enabled for the fragment stage.
const DERIVATIVE_FUNCTIONS: &[(&str, Cat, &[Cat])] = &[
    ("dFdx", GenF, &[GenF]),
    ("dFdy", GenF, &[GenF]),
    ("fwidth", GenF, &[GenF]),
];

/// One name's candidates plus the extension gating them, if any.
struct Entry {
    requires: Option<Extension>,
    candidates: Vec<Builtin>,
}

/// The per-stage builtin catalog. Immutable once constructed.
pub struct BuiltinRegistry {
    map: HashMap<&'static str, Entry>,
}

impl BuiltinRegistry {
    /// Builds the catalog for one stage, with limit constants taken from
    /// the configuration.
    pub fn for_stage(stage: ShaderStage, config: &Config) -> Self {
        let mut map: HashMap<&'static str, Entry> = HashMap::new();

        let mut var = |map: &mut HashMap<&'static str, Entry>,
                       name: &'static str,
                       ty: Type,
                       read_only: bool,
                       is_output: bool| {
            map.insert(
                name,
                Entry {
                    requires: None,
                    candidates: vec![Builtin::Var(BuiltinVar {
                        ty,
                        read_only,
                        is_output,
                        const_value: None,
                    })],
                },
            );
        };

        match stage {
            ShaderStage::Vertex => {
                var(
                    &mut map,
                    "gl_Position",
                    Type::vec(VectorSize::Quad).with_precision(Precision::High),
                    false,
                    true,
                );
                var(
                    &mut map,
                    "gl_PointSize",
                    Type::float().with_precision(Precision::Medium),
                    false,
                    true,
                );
                var(
                    &mut map,
                    "gl_DepthRange",
                    Type::vec(VectorSize::Tri).with_precision(Precision::High),
                    true,
                    false,
                );
            }
            ShaderStage::Fragment => {
                var(
                    &mut map,
                    "gl_FragCoord",
                    Type::vec(VectorSize::Quad).with_precision(Precision::Medium),
                    true,
                    false,
                );
                var(&mut map, "gl_FrontFacing", Type::bool(), true, false);
                var(
                    &mut map,
                    "gl_FragColor",
                    Type::vec(VectorSize::Quad).with_precision(Precision::Medium),
                    false,
                    true,
                );
                var(
                    &mut map,
                    "gl_FragData",
                    Type::array(
                        Type::vec(VectorSize::Quad).with_precision(Precision::Medium),
                        ArraySize::Symbolic("gl_MaxDrawBuffers".into()),
                    ),
                    false,
                    true,
                );
                var(
                    &mut map,
                    "gl_PointCoord",
                    Type::vector(ScalarKind::Float, VectorSize::Bi)
                        .with_precision(Precision::Medium),
                    true,
                    false,
                );
                var(
                    &mut map,
                    "gl_DepthRange",
                    Type::vec(VectorSize::Tri).with_precision(Precision::High),
                    true,
                    false,
                );
            }
        }

        for name in [
            "gl_MaxVertexAttribs",
            "gl_MaxVertexUniformVectors",
            "gl_MaxVaryingVectors",
            "gl_MaxVertexTextureImageUnits",
            "gl_MaxCombinedTextureImageUnits",
            "gl_MaxTextureImageUnits",
            "gl_MaxFragmentUniformVectors",
            "gl_MaxDrawBuffers",
        ] {
            let value = config.limit(name).unwrap_or(0) as i32;
            map.insert(
                name,
                Entry {
                    requires: None,
                    candidates: vec![Builtin::Var(BuiltinVar {
                        ty: Type::int().with_precision(Precision::Medium),
                        read_only: true,
                        is_output: false,
                        const_value: Some(value),
                    })],
                },
            );
        }

        let mut add_funs = |funs: &[(&'static str, Cat, &'static [Cat])],
                            requires: Option<Extension>,
                            map: &mut HashMap<&'static str, Entry>| {
            for &(name, ret, args) in funs {
                let entry = map.entry(name).or_insert_with(|| Entry {
                    requires,
                    candidates: Vec::new(),
                });
                entry
                    .candidates
                    .push(Builtin::Fun(BuiltinFun { name, ret, args }));
            }
        };

        add_funs(CORE_FUNCTIONS, None, &mut map);
        if stage == ShaderStage::Fragment && config.support_oes_derivatives {
            add_funs(
                DERIVATIVE_FUNCTIONS,
                Some(Extension::StandardDerivatives),
                &mut map,
            );
        }

        Self { map }
    }

    /// Looks a name up, honoring extension gating.
    pub fn lookup(&self, name: &str, enabled: ExtensionSet) -> Lookup<'_> {
        match self.map.get(name) {
            None => Lookup::Miss,
            Some(entry) => match entry.requires {
                Some(ext) if !enabled.contains(ext) => Lookup::Gated(ext),
                _ => Lookup::Hit(&entry.candidates),
            },
        }
    }

    /// Whether any entry (gated or not) uses the name.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(stage: ShaderStage) -> BuiltinRegistry {
        BuiltinRegistry::for_stage(stage, &Config::default())
    }

    #[test]
    fn stage_specific_variables() {
        let vert = registry(ShaderStage::Vertex);
        let frag = registry(ShaderStage::Fragment);
        assert!(matches!(
            vert.lookup("gl_Position", ExtensionSet::EMPTY),
            Lookup::Hit(_)
        ));
        assert!(matches!(
            vert.lookup("gl_FragColor", ExtensionSet::EMPTY),
            Lookup::Miss
        ));
        assert!(matches!(
            frag.lookup("gl_FragColor", ExtensionSet::EMPTY),
            Lookup::Hit(_)
        ));
    }

    #[test]
    fn limit_constants_take_config_values() {
        let config = Config {
            max_draw_buffers: 4,
            ..Config::default()
        };
        let reg = BuiltinRegistry::for_stage(ShaderStage::Fragment, &config);
        let Lookup::Hit(cands) = reg.lookup("gl_MaxDrawBuffers", ExtensionSet::EMPTY) else {
            panic!("expected hl_MaxDrawBuffers hit");
        };
        let Builtin::Var(var) = &cands[0] else {
            panic!("expected variable");
        };
        assert_eq!(var.const_value, Some(4));
    }

    #[test]
    fn derivatives_are_gated() {
        let config = Config {
            support_oes_derivatives: true,
            ..Config::default()
        };
        let reg = BuiltinRegistry::for_stage(ShaderStage::Fragment, &config);
        assert!(matches!(
            reg.lookup("dFdx", ExtensionSet::EMPTY),
            Lookup::Gated(Extension::StandardDerivatives)
        ));
        let mut enabled = ExtensionSet::EMPTY;
        enabled.insert(Extension::StandardDerivatives);
        assert!(matches!(reg.lookup("dFdx", enabled), Lookup::Hit(_)));
    }

    #[test]
    fn derivatives_absent_when_unsupported() {
        let reg = registry(ShaderStage::Fragment);
        assert!(matches!(
            reg.lookup("dFdx", ExtensionSet::EMPTY),
            Lookup::Miss
        ));
    }

    #[test]
    fn category_matching() {
        assert!(Cat::GenF.matches(&Type::float()));
        assert!(Cat::GenF.matches(&Type::vec(VectorSize::Tri)));
        assert!(!Cat::GenF.matches(&Type::vector(ScalarKind::Int, VectorSize::Tri)));
        assert!(Cat::BVec.matches(&Type::vector(ScalarKind::Bool, VectorSize::Bi)));
        assert!(!Cat::IVec.matches(&Type::vector(ScalarKind::UInt, VectorSize::Bi)));
        assert!(Cat::Float.matches(&Type::int()), "scalar categories are loose");
        assert!(!Cat::Vec2.matches(&Type::vec(VectorSize::Tri)));
    }

    #[test]
    fn frag_data_is_symbolically_sized() {
        let reg = registry(ShaderStage::Fragment);
        let Lookup::Hit(cands) = reg.lookup("gl_FragData", ExtensionSet::EMPTY) else {
            panic!("expected gl_FragData");
        };
        let Builtin::Var(var) = &cands[0] else {
            panic!("expected variable");
        };
        assert!(matches!(
            &var.ty.inner,
            TypeInner::Array {
                size: ArraySize::Symbolic(key),
                ..
            } if key == "gl_MaxDrawBuffers"
        ));
    }
}
