//! Builtin overload resolution.
//!
//! Resolution is deterministic and order-dependent: candidates are tried in
//! catalog declaration order and the first full match wins. The shading
//! language itself defines no best-match rule, so none is applied here.

use essl_ast::{Type, TypeInner};

use crate::builtins::{Builtin, BuiltinFun, Cat};
use crate::types;

/// Picks the first candidate whose parameter categories accept every
/// argument type. Arguments bound by generic categories must agree with the
/// first generic binding under strict equality.
///
/// Returns the candidate and the bound generic instance type, if any.
pub fn resolve_builtin<'a>(
    candidates: &'a [Builtin],
    args: &[Type],
) -> Option<(&'a BuiltinFun, Option<Type>)> {
    'candidates: for builtin in candidates {
        let Builtin::Fun(fun) = builtin else {
            continue;
        };
        if fun.args.len() != args.len() {
            continue;
        }
        let mut generic: Option<&Type> = None;
        for (cat, arg) in fun.args.iter().zip(args) {
            if !cat.matches(arg) {
                continue 'candidates;
            }
            if cat.is_generic() {
                match generic {
                    None => generic = Some(arg),
                    Some(bound) if types::same_type(bound, arg, true) => {}
                    Some(_) => continue 'candidates,
                }
            }
        }
        return Some((fun, generic.cloned()));
    }
    None
}

/// Concretizes a candidate's return type.
///
/// Concrete categories stand for themselves. A generic return type takes
/// the bound generic instance, except the boolean-vector family
/// (vector relational builtins, `not`) which produces a bool vector of the
/// argument's width.
pub fn builtin_return_type(fun: &BuiltinFun, generic: Option<&Type>) -> Option<Type> {
    if let Some(concrete) = fun.ret.concrete_type() {
        return Some(concrete);
    }
    let generic = generic?;
    match fun.ret {
        Cat::BVec => {
            let size = match generic.inner {
                TypeInner::Vector { size, .. } => size,
                // A bool result over a scalar generic would be malformed.
                _ => return None,
            };
            Some(Type::vector(essl_ast::ScalarKind::Bool, size))
        }
        _ => Some(generic.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{BuiltinRegistry, ExtensionSet, Lookup};
    use crate::config::{Config, ShaderStage};
    use essl_ast::{SamplerKind, ScalarKind, VectorSize};

    fn candidates<'a>(reg: &'a BuiltinRegistry, name: &str) -> &'a [Builtin] {
        match reg.lookup(name, ExtensionSet::EMPTY) {
            Lookup::Hit(cands) => cands,
            _ => panic!("no candidates for {name}"),
        }
    }

    #[test]
    fn pow_resolves_generic() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Tri), Type::vec(VectorSize::Tri)];
        let (fun, generic) = resolve_builtin(candidates(&reg, "pow"), &args).unwrap();
        let ret = builtin_return_type(fun, generic.as_ref()).unwrap();
        assert!(types::same_type(&ret, &Type::vec(VectorSize::Tri), true));
    }

    #[test]
    fn pow_rejects_mixed_generic_widths() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Tri), Type::vec(VectorSize::Quad)];
        assert!(resolve_builtin(candidates(&reg, "pow"), &args).is_none());
    }

    #[test]
    fn length_returns_float() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Tri)];
        let (fun, generic) = resolve_builtin(candidates(&reg, "length"), &args).unwrap();
        let ret = builtin_return_type(fun, generic.as_ref()).unwrap();
        assert!(types::same_type(&ret, &Type::float(), true));
    }

    #[test]
    fn texture2d_returns_vec4() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Fragment, &config);
        let args = [
            Type::sampler(SamplerKind::Sampler2D),
            Type::vec(VectorSize::Bi),
        ];
        let (fun, generic) = resolve_builtin(candidates(&reg, "texture2D"), &args).unwrap();
        let ret = builtin_return_type(fun, generic.as_ref()).unwrap();
        assert!(types::same_type(&ret, &Type::vec(VectorSize::Quad), true));
    }

    #[test]
    fn less_than_returns_bool_vector() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Bi), Type::vec(VectorSize::Bi)];
        let (fun, generic) = resolve_builtin(candidates(&reg, "lessThan"), &args).unwrap();
        let ret = builtin_return_type(fun, generic.as_ref()).unwrap();
        assert!(types::same_type(
            &ret,
            &Type::vector(ScalarKind::Bool, VectorSize::Bi),
            true
        ));
    }

    #[test]
    fn mod_vector_scalar_uses_first_candidate() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Bi), Type::float()];
        let (fun, generic) = resolve_builtin(candidates(&reg, "mod"), &args).unwrap();
        assert_eq!(fun.args, &[Cat::GenF, Cat::Float]);
        let ret = builtin_return_type(fun, generic.as_ref()).unwrap();
        assert!(types::same_type(&ret, &Type::vec(VectorSize::Bi), true));
    }

    #[test]
    fn resolution_is_deterministic() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        let args = [Type::vec(VectorSize::Quad), Type::vec(VectorSize::Quad)];
        let first = resolve_builtin(candidates(&reg, "min"), &args).unwrap().0 as *const _;
        let second = resolve_builtin(candidates(&reg, "min"), &args).unwrap().0 as *const _;
        assert_eq!(first, second);
    }

    #[test]
    fn arity_mismatch_resolves_nothing() {
        let config = Config::default();
        let reg = BuiltinRegistry::for_stage(ShaderStage::Vertex, &config);
        assert!(resolve_builtin(candidates(&reg, "length"), &[]).is_none());
    }
}
