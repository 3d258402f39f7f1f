//! Pure operations over the structural type algebra.
//!
//! Everything here is side-effect-free: name resolution goes through an
//! explicit struct table, equality never consults ambient state.

use std::collections::HashMap;

use essl_ast::{ArraySize, ScalarKind, Type, TypeError, TypeInner, VectorSize};

/// The struct-type table a session accumulates; `Named` references resolve
/// against it.
pub type StructTable = HashMap<String, Type>;

/// Resolves `Named` references through `structs`, recursively normalizing
/// array elements and struct fields.
///
/// Array sizes in `Expr` form are left alone here; the validator concretizes
/// them with its constant evaluator before registering the type. `Symbolic`
/// sizes are concretized by the caller against the configuration limits.
pub fn normalize(ty: &Type, structs: &StructTable) -> Result<Type, TypeError> {
    // Struct definitions cannot be self-referential (nested struct
    // declarations are rejected up front), so this recursion is bounded by
    // the finite type tree.
    match &ty.inner {
        TypeInner::Named(name) => match structs.get(name) {
            Some(resolved) => {
                let mut out = normalize(resolved, structs)?;
                if ty.precision != essl_ast::Precision::None {
                    out.precision = ty.precision;
                }
                Ok(out)
            }
            None => Err(TypeError::UnresolvedTypeName(name.clone())),
        },
        TypeInner::Array { base, size } => {
            let base = normalize(base, structs)?;
            Ok(Type {
                precision: ty.precision,
                inner: TypeInner::Array {
                    base: Box::new(base),
                    size: size.clone(),
                },
            })
        }
        TypeInner::Struct { name, fields } => {
            let mut out_fields = Vec::with_capacity(fields.len());
            for field in fields {
                out_fields.push(essl_ast::StructField {
                    name: field.name.clone(),
                    ty: normalize(&field.ty, structs)?,
                });
            }
            Ok(Type {
                precision: ty.precision,
                inner: TypeInner::Struct {
                    name: name.clone(),
                    fields: out_fields,
                },
            })
        }
        _ => Ok(ty.clone()),
    }
}

/// Structural equality.
///
/// With `strict` the two types must agree exactly (including array sizes);
/// without it, any two non-void scalars are considered interchangeable —
/// the looser equality used during overload matching.
pub fn same_type(t1: &Type, t2: &Type, strict: bool) -> bool {
    match (&t1.inner, &t2.inner) {
        (TypeInner::Void, TypeInner::Void) => true,
        (TypeInner::Scalar(k1), TypeInner::Scalar(k2)) => {
            if strict {
                k1 == k2
            } else {
                true
            }
        }
        (
            TypeInner::Vector { size: s1, kind: k1 },
            TypeInner::Vector { size: s2, kind: k2 },
        ) => s1 == s2 && k1 == k2,
        (
            TypeInner::Matrix { cols: c1, rows: r1 },
            TypeInner::Matrix { cols: c2, rows: r2 },
        ) => c1 == c2 && r1 == r2,
        (TypeInner::Sampler(s1), TypeInner::Sampler(s2)) => s1 == s2,
        (TypeInner::Named(n1), TypeInner::Named(n2)) => n1 == n2,
        (TypeInner::Named(n1), TypeInner::Struct { name: n2, .. })
        | (TypeInner::Struct { name: n1, .. }, TypeInner::Named(n2)) => n1 == n2,
        (
            TypeInner::Struct {
                name: n1,
                fields: f1,
            },
            TypeInner::Struct {
                name: n2,
                fields: f2,
            },
        ) => {
            n1 == n2
                && f1.len() == f2.len()
                && f1
                    .iter()
                    .zip(f2)
                    .all(|(a, b)| a.name == b.name && same_type(&a.ty, &b.ty, true))
        }
        (
            TypeInner::Array { base: b1, size: s1 },
            TypeInner::Array { base: b2, size: s2 },
        ) => {
            if !same_type(b1, b2, true) {
                return false;
            }
            match (s1, s2) {
                (ArraySize::Constant(n1), ArraySize::Constant(n2)) => n1 == n2,
                (ArraySize::Symbolic(k1), ArraySize::Symbolic(k2)) => k1 == k2,
                // Non-normalized sizes never compare equal.
                _ => false,
            }
        }
        _ => false,
    }
}

/// Looks up a named field of a struct type.
pub fn lookup_field<'a>(ty: &'a Type, field: &str) -> Result<&'a Type, TypeError> {
    match &ty.inner {
        TypeInner::Struct { name, fields } => fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.ty)
            .ok_or_else(|| TypeError::UnknownField {
                name: name.clone(),
                field: field.to_owned(),
            }),
        _ => Err(TypeError::UnknownField {
            name: essl_ast::display::type_name(ty),
            field: field.to_owned(),
        }),
    }
}

/// True for float scalars and float vectors/matrices of GLSL's `vecN`/`matN`
/// shapes — the types a varying may have.
pub fn is_varying_type(ty: &Type) -> bool {
    matches!(
        ty.inner,
        TypeInner::Scalar(ScalarKind::Float)
            | TypeInner::Vector {
                kind: ScalarKind::Float,
                ..
            }
            | TypeInner::Matrix { .. }
    )
}

/// Scalar element count of a type after struct/array expansion; `None` for
/// void. Samplers count as one leaf.
pub fn leaf_count(ty: &Type) -> u32 {
    match &ty.inner {
        TypeInner::Void => 0,
        TypeInner::Scalar(_) | TypeInner::Sampler(_) => 1,
        TypeInner::Vector { .. } | TypeInner::Matrix { .. } => 1,
        TypeInner::Array { base, size } => {
            let n = match size {
                ArraySize::Constant(n) => *n,
                _ => 0,
            };
            n * leaf_count(base)
        }
        TypeInner::Struct { fields, .. } => fields.iter().map(|f| leaf_count(&f.ty)).sum(),
        TypeInner::Named(_) => 0,
    }
}

/// Result type of `v[i]` / `m[i]` / `arr[i]`, if indexing is meaningful.
pub fn indexed_type(ty: &Type) -> Option<Type> {
    match &ty.inner {
        TypeInner::Array { base, .. } => Some((**base).clone()),
        TypeInner::Vector { kind, .. } => Some(Type::scalar(*kind)),
        TypeInner::Matrix { rows, .. } => Some(Type::vec(*rows)),
        _ => None,
    }
}

/// Declared length of an array/vector/matrix for bounds checks.
pub fn indexed_len(ty: &Type) -> Option<u32> {
    match &ty.inner {
        TypeInner::Array {
            size: ArraySize::Constant(n),
            ..
        } => Some(*n),
        TypeInner::Vector { size, .. } => Some(size.len()),
        TypeInner::Matrix { cols, .. } => Some(cols.len()),
        _ => None,
    }
}

/// Component type of a swizzle of `len` letters over a vector type.
pub fn swizzle_type(kind: ScalarKind, len: usize) -> Option<Type> {
    match len {
        1 => Some(Type::scalar(kind)),
        2..=4 => Some(Type::vector(kind, VectorSize::from_len(len as u32)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essl_ast::{Precision, SamplerKind, StructField};

    fn light_struct() -> Type {
        Type::new(TypeInner::Struct {
            name: "Light".into(),
            fields: vec![
                StructField {
                    name: "color".into(),
                    ty: Type::vec(VectorSize::Tri),
                },
                StructField {
                    name: "intensity".into(),
                    ty: Type::float(),
                },
            ],
        })
    }

    #[test]
    fn strict_equality_is_symmetric() {
        let cases = [
            (Type::float(), Type::float()),
            (Type::float(), Type::int()),
            (Type::vec(VectorSize::Tri), Type::vec(VectorSize::Quad)),
            (Type::matrix(VectorSize::Bi), Type::matrix(VectorSize::Bi)),
            (
                Type::array(Type::float(), ArraySize::Constant(4)),
                Type::array(Type::float(), ArraySize::Constant(4)),
            ),
            (
                Type::sampler(SamplerKind::Sampler2D),
                Type::sampler(SamplerKind::SamplerCube),
            ),
        ];
        for (a, b) in &cases {
            assert_eq!(
                same_type(a, b, true),
                same_type(b, a, true),
                "asymmetric for {a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn loose_equality_merges_scalars_only() {
        assert!(same_type(&Type::float(), &Type::int(), false));
        assert!(!same_type(
            &Type::float(),
            &Type::vec(VectorSize::Bi),
            false
        ));
    }

    #[test]
    fn array_sizes_must_match_strictly() {
        let a = Type::array(Type::float(), ArraySize::Constant(4));
        let b = Type::array(Type::float(), ArraySize::Constant(5));
        assert!(!same_type(&a, &b, true));
    }

    #[test]
    fn registered_struct_round_trips() {
        let mut structs = StructTable::new();
        structs.insert("Light".into(), light_struct());
        let resolved = normalize(&Type::named("Light"), &structs).unwrap();
        assert!(same_type(&resolved, &light_struct(), true));
    }

    #[test]
    fn unresolved_name_is_an_error() {
        let structs = StructTable::new();
        let err = normalize(&Type::named("Missing"), &structs).unwrap_err();
        assert!(matches!(err, TypeError::UnresolvedTypeName(n) if n == "Missing"));
    }

    #[test]
    fn field_lookup() {
        let ty = light_struct();
        assert!(same_type(
            lookup_field(&ty, "color").unwrap(),
            &Type::vec(VectorSize::Tri),
            true
        ));
        assert!(lookup_field(&ty, "missing").is_err());
    }

    #[test]
    fn normalization_keeps_outer_precision() {
        let mut structs = StructTable::new();
        structs.insert("Light".into(), light_struct());
        let named = Type::named("Light").with_precision(Precision::High);
        let resolved = normalize(&named, &structs).unwrap();
        assert_eq!(resolved.precision, Precision::High);
    }

    #[test]
    fn indexing_results() {
        assert!(same_type(
            &indexed_type(&Type::vec(VectorSize::Quad)).unwrap(),
            &Type::float(),
            true
        ));
        assert!(same_type(
            &indexed_type(&Type::matrix(VectorSize::Tri)).unwrap(),
            &Type::vec(VectorSize::Tri),
            true
        ));
        assert_eq!(indexed_len(&Type::vec(VectorSize::Bi)), Some(2));
        assert_eq!(
            indexed_len(&Type::array(Type::float(), ArraySize::Constant(7))),
            Some(7)
        );
    }
}
