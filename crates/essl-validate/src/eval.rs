//! Constant-expression evaluation.
//!
//! Used where the language mandates compile-time constants: array sizes,
//! `const` initializers, loop bounds, and constant index bounds checks.
//! Evaluation is best-effort: anything non-constant folds to `None`, which
//! the caller diagnoses in context.

use essl_ast::{
    BinaryOp, Expr, Handle, Literal, ScalarKind, TranslationUnit, TypeInner, UnaryOp, VectorSize,
};

use crate::builtins::{Builtin, Lookup};
use crate::session::Session;

/// A folded constant.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f64),
    /// A constant vector; elements stored as f64 (exact for the 32-bit
    /// scalar kinds of the language).
    Vector { kind: ScalarKind, elems: Vec<f64> },
}

impl ConstValue {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(v) => Some(*v),
            Self::Vector { .. } => None,
        }
    }

    pub fn to_i32(&self) -> Option<i32> {
        match self {
            Self::Bool(b) => Some(*b as i32),
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i32::try_from(*u).ok(),
            Self::Float(v) => {
                if v.is_finite() && (i32::MIN as f64..=i32::MAX as f64).contains(v) {
                    Some(*v as i32)
                } else {
                    None
                }
            }
            Self::Vector { .. } => None,
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::UInt(u) => Some(*u != 0),
            Self::Float(v) => Some(*v != 0.0),
            Self::Vector { .. } => None,
        }
    }

    fn from_literal(lit: Literal) -> Self {
        match lit {
            Literal::Bool(b) => Self::Bool(b),
            Literal::Int(i) => Self::Int(i),
            Literal::UInt(u) => Self::UInt(u),
            Literal::Float(v) => Self::Float(v),
        }
    }
}

/// Texture lookups never fold, whatever their arguments.
fn is_foldable_builtin(name: &str) -> bool {
    !name.starts_with("texture")
}

/// Conservative constness test mirroring the language's static rules:
/// literals, `const`-qualified variables with known values, constructor
/// applications and operators over constant operands.
pub fn is_constant(sess: &Session<'_>, unit: &TranslationUnit, handle: Handle<Expr>) -> bool {
    match &unit.exprs[handle] {
        Expr::Literal(_) => true,
        Expr::Var(name) => match sess.lookup_var_binding(name) {
            Some(binding) => {
                // Uniforms are not constants: they are not bound until
                // run time.
                !binding.ty.is_array()
                    && (binding.storage == essl_ast::StorageQualifier::Const
                        || (binding.storage == essl_ast::StorageQualifier::None
                            && binding.value.is_some()))
            }
            None => matches!(
                sess.lookup_builtin(name),
                Lookup::Hit(cands) if matches!(
                    cands.first(),
                    Some(Builtin::Var(var)) if var.const_value.is_some()
                )
            ),
        },
        Expr::Construct { args, .. } => {
            !args.is_empty() && args.iter().all(|a| is_constant(sess, unit, *a))
        }
        Expr::Call { callee, args } => {
            if args.is_empty() {
                return false;
            }
            match sess.lookup_builtin(callee) {
                Lookup::Hit(_) if is_foldable_builtin(callee) => {
                    if callee == "min" || callee == "max" {
                        // min/max fold as soon as one side is known.
                        args.iter().any(|a| is_constant(sess, unit, *a))
                    } else {
                        args.iter().all(|a| is_constant(sess, unit, *a))
                    }
                }
                _ => false,
            }
        }
        Expr::Index { base, index } => {
            is_constant(sess, unit, *base) && is_constant(sess, unit, *index)
        }
        Expr::Select { .. } => false,
        Expr::Unary { op, expr } => match op {
            UnaryOp::PreInc | UnaryOp::PreDec => false,
            _ => is_constant(sess, unit, *expr),
        },
        Expr::Post { .. } => false,
        Expr::Binary { left, right, .. } => {
            is_constant(sess, unit, *left) && is_constant(sess, unit, *right)
        }
        Expr::Cond {
            cond,
            accept,
            reject,
        } => {
            is_constant(sess, unit, *cond)
                && is_constant(sess, unit, *accept)
                && is_constant(sess, unit, *reject)
        }
        Expr::Assign { .. } => false,
        Expr::Seq { first, second } => {
            is_constant(sess, unit, *first) && is_constant(sess, unit, *second)
        }
    }
}

/// Folds `handle` to a constant, or `None` when it is not foldable.
pub fn eval(sess: &Session<'_>, unit: &TranslationUnit, handle: Handle<Expr>) -> Option<ConstValue> {
    match &unit.exprs[handle] {
        Expr::Literal(lit) => Some(ConstValue::from_literal(*lit)),
        Expr::Var(name) => {
            if let Some(binding) = sess.lookup_var_binding(name) {
                let value = binding.value?;
                return eval(sess, unit, value);
            }
            match sess.lookup_builtin(name) {
                Lookup::Hit(cands) => match cands.first() {
                    Some(Builtin::Var(var)) => var.const_value.map(ConstValue::Int),
                    _ => None,
                },
                _ => None,
            }
        }
        Expr::Construct { ty, args } => eval_construct(sess, unit, ty, args),
        Expr::Call { callee, args } => eval_builtin_call(sess, unit, callee, args),
        Expr::Index { base, index } => {
            let base = eval(sess, unit, *base)?;
            let idx = eval(sess, unit, *index)?.to_i32()?;
            match base {
                ConstValue::Vector { kind, elems } => {
                    let elem = *elems.get(usize::try_from(idx).ok()?)?;
                    Some(scalar_of_kind(kind, elem))
                }
                _ => None,
            }
        }
        Expr::Select { .. } => None,
        Expr::Unary { op, expr } => {
            let value = eval(sess, unit, *expr)?;
            fold_unary(*op, value)
        }
        Expr::Post { expr, .. } => eval(sess, unit, *expr),
        Expr::Binary { op, left, right } => {
            let l = eval(sess, unit, *left)?;
            let r = eval(sess, unit, *right)?;
            fold_binary(*op, l, r)
        }
        Expr::Cond {
            cond,
            accept,
            reject,
        } => {
            let cond = eval(sess, unit, *cond)?.to_bool()?;
            eval(sess, unit, if cond { *accept } else { *reject })
        }
        Expr::Assign { .. } => None,
        Expr::Seq { second, .. } => eval(sess, unit, *second),
    }
}

/// Folds and converts to a non-negative i32, the shape array sizes and
/// index bounds need.
pub fn eval_to_i32(
    sess: &Session<'_>,
    unit: &TranslationUnit,
    handle: Handle<Expr>,
) -> Option<i32> {
    eval(sess, unit, handle)?.to_i32()
}

fn scalar_of_kind(kind: ScalarKind, v: f64) -> ConstValue {
    match kind {
        ScalarKind::Bool => ConstValue::Bool(v != 0.0),
        ScalarKind::Int => ConstValue::Int(v as i32),
        ScalarKind::UInt => ConstValue::UInt(v as u32),
        ScalarKind::Float => ConstValue::Float(v),
    }
}

fn eval_construct(
    sess: &Session<'_>,
    unit: &TranslationUnit,
    ty: &essl_ast::Type,
    args: &[Handle<Expr>],
) -> Option<ConstValue> {
    match ty.inner {
        TypeInner::Scalar(kind) => {
            let value = eval(sess, unit, *args.first()?)?;
            match kind {
                ScalarKind::Float => Some(ConstValue::Float(value.to_f64()?)),
                ScalarKind::Int => Some(ConstValue::Int(value.to_i32()?)),
                ScalarKind::UInt => Some(ConstValue::UInt(value.to_i32()? as u32)),
                ScalarKind::Bool => Some(ConstValue::Bool(value.to_bool()?)),
            }
        }
        TypeInner::Vector { size, kind } => {
            let mut elems = Vec::with_capacity(size.len() as usize);
            for arg in args {
                match eval(sess, unit, *arg)? {
                    ConstValue::Vector { elems: sub, .. } => elems.extend(sub),
                    scalar => elems.push(scalar.to_f64()?),
                }
            }
            match elems.len() as u32 {
                1 => {
                    // Scalar splat.
                    let v = elems[0];
                    Some(ConstValue::Vector {
                        kind,
                        elems: vec![v; size.len() as usize],
                    })
                }
                n if n >= size.len() => {
                    elems.truncate(size.len() as usize);
                    Some(ConstValue::Vector { kind, elems })
                }
                _ => None,
            }
        }
        // Matrix and array constructors are not folded.
        _ => None,
    }
}

fn eval_builtin_call(
    sess: &Session<'_>,
    unit: &TranslationUnit,
    callee: &str,
    args: &[Handle<Expr>],
) -> Option<ConstValue> {
    if !matches!(sess.lookup_builtin(callee), Lookup::Hit(_)) || !is_foldable_builtin(callee) {
        return None;
    }
    match callee {
        "abs" | "sign" => {
            let value = eval(sess, unit, *args.first()?)?;
            let f = |v: f64| {
                if callee == "abs" {
                    v.abs()
                } else if v > 0.0 {
                    1.0
                } else if v == 0.0 {
                    0.0
                } else {
                    -1.0
                }
            };
            match value {
                ConstValue::Vector { kind, elems } => Some(ConstValue::Vector {
                    kind,
                    elems: elems.into_iter().map(f).collect(),
                }),
                scalar => Some(ConstValue::Float(f(scalar.to_f64()?))),
            }
        }
        "min" | "max" if args.len() == 2 => {
            // One side being foldable is enough; the result then bounds the
            // expression for the array-index checks.
            let l = eval(sess, unit, args[0]).and_then(|v| v.to_f64());
            let r = eval(sess, unit, args[1]).and_then(|v| v.to_f64());
            let folded = match (l, r) {
                (Some(l), Some(r)) => {
                    if callee == "min" {
                        l.min(r)
                    } else {
                        l.max(r)
                    }
                }
                (Some(v), None) | (None, Some(v)) => v,
                (None, None) => return None,
            };
            Some(ConstValue::Float(folded))
        }
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, value: ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Plus => Some(value),
        UnaryOp::Not => Some(ConstValue::Bool(!value.to_bool()?)),
        UnaryOp::Negate => match value {
            ConstValue::Float(v) => Some(ConstValue::Float(-v)),
            ConstValue::Int(i) => Some(ConstValue::Int(i.wrapping_neg())),
            ConstValue::UInt(u) => Some(ConstValue::Int((u as i32).wrapping_neg())),
            ConstValue::Bool(b) => Some(ConstValue::Bool(!b)),
            ConstValue::Vector { kind, elems } => Some(ConstValue::Vector {
                kind,
                elems: elems.into_iter().map(|v| -v).collect(),
            }),
        },
        UnaryOp::PreInc => arith_shift(value, 1.0),
        UnaryOp::PreDec => arith_shift(value, -1.0),
    }
}

fn arith_shift(value: ConstValue, delta: f64) -> Option<ConstValue> {
    match value {
        ConstValue::Float(v) => Some(ConstValue::Float(v + delta)),
        ConstValue::Int(i) => Some(ConstValue::Int(i.wrapping_add(delta as i32))),
        ConstValue::UInt(u) => Some(ConstValue::UInt(u.wrapping_add(delta as u32))),
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, l: ConstValue, r: ConstValue) -> Option<ConstValue> {
    use ConstValue::{Bool, Float, Int, UInt};
    match (&l, &r) {
        (Int(a), Int(b)) => fold_int(op, *a, *b),
        (UInt(a), UInt(b)) => fold_uint(op, *a, *b),
        (Bool(a), Bool(b)) => fold_bool(op, *a, *b),
        (Float(_), _) | (_, Float(_)) => fold_float(op, l.to_f64()?, r.to_f64()?),
        (UInt(_), _) | (_, UInt(_)) => {
            fold_uint(op, l.to_i32()? as u32, r.to_i32()? as u32)
        }
        (Int(_), _) | (_, Int(_)) => fold_int(op, l.to_i32()?, r.to_i32()?),
        _ => None,
    }
}

fn fold_float(op: BinaryOp, l: f64, r: f64) -> Option<ConstValue> {
    use ConstValue::{Bool, Float};
    Some(match op {
        BinaryOp::Add => Float(l + r),
        BinaryOp::Sub => Float(l - r),
        BinaryOp::Mul => Float(l * r),
        BinaryOp::Div => Float(l / r),
        BinaryOp::Equal => Bool(l == r),
        BinaryOp::NotEqual => Bool(l != r),
        BinaryOp::Less => Bool(l < r),
        BinaryOp::LessEqual => Bool(l <= r),
        BinaryOp::Greater => Bool(l > r),
        BinaryOp::GreaterEqual => Bool(l >= r),
        BinaryOp::And => Bool(l != 0.0 && r != 0.0),
        BinaryOp::Or => Bool(l != 0.0 || r != 0.0),
        BinaryOp::Xor => Bool((l != 0.0) != (r != 0.0)),
    })
}

fn fold_int(op: BinaryOp, l: i32, r: i32) -> Option<ConstValue> {
    use ConstValue::{Bool, Int};
    Some(match op {
        BinaryOp::Add => Int(l.wrapping_add(r)),
        BinaryOp::Sub => Int(l.wrapping_sub(r)),
        BinaryOp::Mul => Int(l.wrapping_mul(r)),
        BinaryOp::Div => Int(if r != 0 { l.wrapping_div(r) } else { 0 }),
        BinaryOp::Equal => Bool(l == r),
        BinaryOp::NotEqual => Bool(l != r),
        BinaryOp::Less => Bool(l < r),
        BinaryOp::LessEqual => Bool(l <= r),
        BinaryOp::Greater => Bool(l > r),
        BinaryOp::GreaterEqual => Bool(l >= r),
        BinaryOp::And => Bool(l != 0 && r != 0),
        BinaryOp::Or => Bool(l != 0 || r != 0),
        BinaryOp::Xor => Bool((l != 0) != (r != 0)),
    })
}

fn fold_uint(op: BinaryOp, l: u32, r: u32) -> Option<ConstValue> {
    use ConstValue::{Bool, UInt};
    Some(match op {
        BinaryOp::Add => UInt(l.wrapping_add(r)),
        BinaryOp::Sub => UInt(l.wrapping_sub(r)),
        BinaryOp::Mul => UInt(l.wrapping_mul(r)),
        BinaryOp::Div => UInt(if r != 0 { l / r } else { 0 }),
        BinaryOp::Equal => Bool(l == r),
        BinaryOp::NotEqual => Bool(l != r),
        BinaryOp::Less => Bool(l < r),
        BinaryOp::LessEqual => Bool(l <= r),
        BinaryOp::Greater => Bool(l > r),
        BinaryOp::GreaterEqual => Bool(l >= r),
        BinaryOp::And => Bool(l != 0 && r != 0),
        BinaryOp::Or => Bool(l != 0 || r != 0),
        BinaryOp::Xor => Bool((l != 0) != (r != 0)),
    })
}

fn fold_bool(op: BinaryOp, l: bool, r: bool) -> Option<ConstValue> {
    use ConstValue::Bool;
    Some(match op {
        BinaryOp::Equal => Bool(l == r),
        BinaryOp::NotEqual => Bool(l != r),
        BinaryOp::Less => Bool(!l & r),
        BinaryOp::LessEqual => Bool(l <= r),
        BinaryOp::Greater => Bool(l & !r),
        BinaryOp::GreaterEqual => Bool(l >= r),
        BinaryOp::And => Bool(l && r),
        BinaryOp::Or => Bool(l || r),
        BinaryOp::Xor => Bool(l != r),
        _ => return None,
    })
}
