//! Type model for the GLSL-ES subset.

use crate::arena::Handle;
use crate::expr::Expr;

/// Precision qualifier attached to a type or declaration.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub enum Precision {
    /// No qualifier written; resolved against the scoped default table.
    #[default]
    None,
    Low,
    Medium,
    High,
}

/// The kind of a scalar type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ScalarKind {
    Bool,
    Int,
    UInt,
    Float,
}

/// Number of components in a vector (or rows/columns of a matrix).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum VectorSize {
    /// 2 components.
    Bi = 2,
    /// 3 components.
    Tri = 3,
    /// 4 components.
    Quad = 4,
}

impl VectorSize {
    /// Component count as an integer.
    pub fn len(self) -> u32 {
        self as u32
    }

    /// Maps 2/3/4 back to a size.
    pub fn from_len(n: u32) -> Option<Self> {
        match n {
            2 => Some(Self::Bi),
            3 => Some(Self::Tri),
            4 => Some(Self::Quad),
            _ => None,
        }
    }
}

/// Texture sampler kinds of the subset.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum SamplerKind {
    Sampler2D,
    SamplerCube,
}

/// Size of an array type.
///
/// `Expr` is the raw source form; validation concretizes it to `Constant`.
/// `Symbolic` carries a configuration limit key (e.g. `gl_MaxDrawBuffers`)
/// and is concretized against the limit table at validation time.
#[derive(Clone, Debug, PartialEq)]
pub enum ArraySize {
    Unsized,
    Expr(Handle<Expr>),
    Constant(u32),
    Symbolic(String),
}

/// A named member of a struct type.
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
}

/// A type with an optional precision qualifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Type {
    pub precision: Precision,
    pub inner: TypeInner,
}

/// The concrete shape of a type.
///
/// A `Named` reference must be resolved through the struct-type table before
/// any equality or size computation; an unresolved name is a validation
/// diagnostic, never a silent default.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeInner {
    Void,
    Scalar(ScalarKind),
    Vector {
        size: VectorSize,
        kind: ScalarKind,
    },
    /// Column-major matrix of floats. The subset only has square matrices,
    /// but rows and columns are kept apart for the M*V typing rules.
    Matrix {
        cols: VectorSize,
        rows: VectorSize,
    },
    Sampler(SamplerKind),
    Array {
        base: Box<Type>,
        size: ArraySize,
    },
    Struct {
        name: String,
        fields: Vec<StructField>,
    },
    /// A reference to a struct type by name.
    Named(String),
}

impl Type {
    pub fn new(inner: TypeInner) -> Self {
        Self {
            precision: Precision::None,
            inner,
        }
    }

    pub fn void() -> Self {
        Self::new(TypeInner::Void)
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::new(TypeInner::Scalar(kind))
    }

    pub fn float() -> Self {
        Self::scalar(ScalarKind::Float)
    }

    pub fn int() -> Self {
        Self::scalar(ScalarKind::Int)
    }

    pub fn bool() -> Self {
        Self::scalar(ScalarKind::Bool)
    }

    pub fn vector(kind: ScalarKind, size: VectorSize) -> Self {
        Self::new(TypeInner::Vector { size, kind })
    }

    pub fn vec(size: VectorSize) -> Self {
        Self::vector(ScalarKind::Float, size)
    }

    pub fn matrix(size: VectorSize) -> Self {
        Self::new(TypeInner::Matrix {
            cols: size,
            rows: size,
        })
    }

    pub fn sampler(kind: SamplerKind) -> Self {
        Self::new(TypeInner::Sampler(kind))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeInner::Named(name.into()))
    }

    pub fn array(base: Type, size: ArraySize) -> Self {
        Self::new(TypeInner::Array {
            base: Box::new(base),
            size,
        })
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// The scalar kind if this is a scalar type.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.inner {
            TypeInner::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    /// The element kind of a scalar or vector type.
    pub fn element_kind(&self) -> Option<ScalarKind> {
        match self.inner {
            TypeInner::Scalar(kind) => Some(kind),
            TypeInner::Vector { kind, .. } => Some(kind),
            TypeInner::Matrix { .. } => Some(ScalarKind::Float),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.inner, TypeInner::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.inner, TypeInner::Vector { .. })
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self.inner, TypeInner::Matrix { .. })
    }

    pub fn is_sampler(&self) -> bool {
        matches!(self.inner, TypeInner::Sampler(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.inner, TypeInner::Array { .. })
    }

    /// Scalar component count of a scalar/vector/matrix type.
    pub fn component_count(&self) -> Option<u32> {
        match self.inner {
            TypeInner::Scalar(_) => Some(1),
            TypeInner::Vector { size, .. } => Some(size.len()),
            TypeInner::Matrix { cols, rows } => Some(cols.len() * rows.len()),
            _ => None,
        }
    }
}

/// Errors from the pure type algebra.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A `Named` type reference did not resolve through the struct table.
    #[error("unknown type name '{0}'")]
    UnresolvedTypeName(String),

    /// A field selection named no member of the struct.
    #[error("unknown field '{field}' in struct '{name}'")]
    UnknownField { name: String, field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_size_roundtrip() {
        assert_eq!(VectorSize::from_len(3), Some(VectorSize::Tri));
        assert_eq!(VectorSize::from_len(5), None);
        assert_eq!(VectorSize::Quad.len(), 4);
    }

    #[test]
    fn component_counts() {
        assert_eq!(Type::float().component_count(), Some(1));
        assert_eq!(Type::vec(VectorSize::Tri).component_count(), Some(3));
        assert_eq!(Type::matrix(VectorSize::Quad).component_count(), Some(16));
        assert_eq!(
            Type::sampler(SamplerKind::Sampler2D).component_count(),
            None
        );
    }

    #[test]
    fn precision_defaults_to_none() {
        assert_eq!(Type::float().precision, Precision::None);
        assert_eq!(
            Type::float().with_precision(Precision::High).precision,
            Precision::High
        );
    }

    #[test]
    fn element_kind_of_matrix_is_float() {
        assert_eq!(
            Type::matrix(VectorSize::Bi).element_kind(),
            Some(ScalarKind::Float)
        );
    }
}
