//! The validation driver: one run per shader stage over a parsed
//! declaration list.
//!
//! Walks declarations, statements and expressions performing identifier
//! resolution, strict structural type checking (no implicit int↔float
//! promotion), constant-expression evaluation where the language mandates
//! it, l-value legality checks, and the fragment-stage uniform-array
//! indexing policy. All findings accumulate as diagnostics; hostile input
//! terminates with a bounded diagnostic list, never a crash.

use std::collections::HashMap;

use essl_ast::{
    ArraySize, AssignOp, BinaryOp, Decl, Diagnostic, DiagnosticKind, Expr, ExtensionBehavior,
    FunctionProto, Handle, Literal, ParamDirection, PostOp, Precision, ScalarKind, Stmt,
    StorageQualifier, StructField, TranslationUnit, Type, TypeError, TypeInner, UnaryOp, VarDecl,
    VarDeclList,
};

use crate::builtins::{Builtin, Extension, ExtensionSet, Lookup};
use crate::config::{Config, ShaderStage};
use crate::eval;
use crate::resolve;
use crate::session::{
    is_hlsl_reserved, FunctionSig, Session, GENERATED_PREFIX, MAX_IDENTIFIER_LENGTH,
};
use crate::types;
use crate::vars::{ShaderVariable, ShaderVariableSet, VariableKind};

/// Name of the generated index-clamping helper injected by the rewrite.
pub const CLAMP_HELPER: &str = "essl_clamp_index";

/// Tri-state result of a validation run.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Outcome {
    Validated,
    Rejected,
    InternalError,
}

/// Everything a validation run produces.
#[derive(Debug)]
pub struct Validation {
    pub outcome: Outcome,
    pub stage: ShaderStage,
    pub diagnostics: Vec<Diagnostic>,
    pub variables: ShaderVariableSet,
    pub extensions: ExtensionSet,
    pub uses_clamp_helper: bool,
    /// Source-name → generated-name map for target-language emission.
    pub aliases: HashMap<String, String>,
    /// Expression types, indexed by expression handle.
    pub expr_types: Vec<Option<Type>>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.outcome == Outcome::Validated
    }
}

/// Validates one translation unit for one stage.
///
/// The unit is mutated only by the uniform-array auto-clamp rewrite (when
/// enabled); everything else is read-only.
pub fn validate_unit(unit: &mut TranslationUnit, stage: ShaderStage, config: &Config) -> Validation {
    let mut validator = Validator {
        sess: Session::new(stage, config),
        expr_types: Vec::new(),
    };
    validator.run(unit);
    validator.finish()
}

struct Validator<'a> {
    sess: Session<'a>,
    expr_types: Vec<Option<Type>>,
}

impl<'a> Validator<'a> {
    // -----------------------------------------------------------------
    // Driver
    // -----------------------------------------------------------------

    fn run(&mut self, unit: &mut TranslationUnit) {
        self.process_extensions(unit);

        let decls = std::mem::take(&mut unit.decls);
        for decl in &decls {
            self.check_decl(unit, decl);
        }
        unit.decls = decls;

        if !self.sess.has_main() {
            self.sess.error(
                DiagnosticKind::UndeclaredIdentifier,
                "no 'main' function defined",
            );
        }
    }

    fn finish(mut self) -> Validation {
        let rejected = self.sess.has_errors();
        let keep_unused_varyings = self.sess.config.output_format.is_hlsl()
            || self.sess.stage == ShaderStage::Vertex;

        let mut variables = ShaderVariableSet::default();
        if !rejected {
            for record in &self.sess.attributes {
                if record.usages == 0 {
                    continue;
                }
                variables.push(ShaderVariable {
                    kind: VariableKind::Attribute,
                    name: record.name.clone(),
                    alias: self.sess.aliases.get(&record.name).cloned(),
                    ty: record.ty.clone(),
                    precision: record.precision,
                });
            }
            for record in &self.sess.uniforms {
                if record.usages == 0 {
                    continue;
                }
                variables.push(ShaderVariable {
                    kind: VariableKind::Uniform,
                    name: record.name.clone(),
                    alias: self.sess.aliases.get(&record.name).cloned(),
                    ty: record.ty.clone(),
                    precision: record.precision,
                });
            }
            for record in &self.sess.varyings {
                if record.usages == 0 && !keep_unused_varyings {
                    continue;
                }
                variables.push(ShaderVariable {
                    kind: VariableKind::Varying,
                    name: record.name.clone(),
                    alias: self.sess.aliases.get(&record.name).cloned(),
                    ty: record.ty.clone(),
                    precision: record.precision,
                });
            }
        }

        Validation {
            outcome: if rejected {
                Outcome::Rejected
            } else {
                Outcome::Validated
            },
            stage: self.sess.stage,
            diagnostics: std::mem::take(&mut self.sess.diags),
            variables,
            extensions: self.sess.extensions_enabled,
            uses_clamp_helper: self.sess.used_clamp_helper,
            aliases: std::mem::take(&mut self.sess.aliases),
            expr_types: self.expr_types,
        }
    }

    fn process_extensions(&mut self, unit: &TranslationUnit) {
        for directive in &unit.extensions {
            self.sess.set_line(directive.line);
            let known = Extension::from_name(&directive.name);
            let available = known.is_some_and(|ext| {
                ext.available_in(self.sess.stage)
                    && match ext {
                        Extension::StandardDerivatives => {
                            self.sess.config.support_oes_derivatives
                        }
                    }
            });
            match directive.behavior {
                ExtensionBehavior::Require => {
                    if let (Some(ext), true) = (known, available) {
                        self.sess.extensions_enabled.insert(ext);
                    } else {
                        self.sess.error(
                            DiagnosticKind::ExtensionNotEnabled,
                            format!("required extension '{}' is not supported", directive.name),
                        );
                    }
                }
                ExtensionBehavior::Enable | ExtensionBehavior::Warn => {
                    if let (Some(ext), true) = (known, available) {
                        self.sess.extensions_enabled.insert(ext);
                    } else {
                        self.sess.warning(
                            DiagnosticKind::ExtensionNotEnabled,
                            format!("extension '{}' is not supported", directive.name),
                        );
                    }
                }
                ExtensionBehavior::Disable => {
                    // Nothing to do: the default state is disabled, and a
                    // later enable wins anyway in this single pass.
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Identifier hygiene
    // -----------------------------------------------------------------

    /// Checks a user-declared name, generating a target alias when needed.
    /// `program_global` marks names shared across stages (attributes,
    /// uniforms, varyings, functions) whose aliases must be content-stable.
    fn check_identifier(&mut self, name: &str, program_global: bool) {
        if name.starts_with("gl_") || name.starts_with("webgl_") {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                format!("identifier '{name}' uses a reserved prefix"),
            );
            return;
        }
        if name.starts_with(&format!("{GENERATED_PREFIX}_")) || name.starts_with("__") {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                format!("identifier '{name}' uses a reserved prefix"),
            );
            return;
        }
        if name.len() > MAX_IDENTIFIER_LENGTH {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                format!("identifier '{name}' exceeds {MAX_IDENTIFIER_LENGTH} characters"),
            );
            return;
        }
        if self.sess.config.output_format.is_hlsl() && is_hlsl_reserved(name) {
            let alias = if program_global {
                self.sess.stable_alias(name)
            } else {
                self.sess.unique_alias()
            };
            log::debug!("aliasing reserved identifier '{name}' to '{alias}'");
            self.sess.add_alias(name, alias);
        }
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    /// Resolves named types and concretizes array sizes, reporting failures.
    fn resolve_type(&mut self, unit: &TranslationUnit, ty: &Type) -> Option<Type> {
        let mut ty = ty.clone();
        if let TypeInner::Array { size, .. } = &mut ty.inner {
            if let ArraySize::Expr(handle) = size {
                let handle = *handle;
                if !eval::is_constant(&self.sess, unit, handle) {
                    self.sess.error(
                        DiagnosticKind::ArraySizeError,
                        "array size is not a constant expression",
                    );
                    return None;
                }
                match eval::eval_to_i32(&self.sess, unit, handle) {
                    Some(n) if n > 0 => *size = ArraySize::Constant(n as u32),
                    Some(_) => {
                        self.sess.error(
                            DiagnosticKind::ArraySizeError,
                            "array size must be greater than zero",
                        );
                        return None;
                    }
                    None => {
                        self.sess.error(
                            DiagnosticKind::ArraySizeError,
                            "array size does not evaluate to an integer",
                        );
                        return None;
                    }
                }
            }
        }
        let ty = self.sess.concretize(ty);
        match types::normalize(&ty, &self.sess.structs) {
            Ok(ty) => Some(ty),
            Err(TypeError::UnresolvedTypeName(name)) => {
                self.sess.error(
                    DiagnosticKind::UndeclaredIdentifier,
                    format!("unknown type name '{name}'"),
                );
                None
            }
            Err(err) => {
                self.sess.error(DiagnosticKind::TypeMismatch, err.to_string());
                None
            }
        }
    }

    /// Explicit precision, or the scoped default for the type's element.
    fn effective_precision(&mut self, ty: &Type) -> Precision {
        if ty.precision != Precision::None {
            return ty.precision;
        }
        let key = match &ty.inner {
            TypeInner::Scalar(kind) | TypeInner::Vector { kind, .. } => Type::scalar(*kind),
            TypeInner::Matrix { .. } => Type::float(),
            TypeInner::Sampler(kind) => Type::sampler(*kind),
            TypeInner::Array { base, .. } => return self.effective_precision(base),
            _ => return Precision::None,
        };
        self.sess.lookup_precision(&key)
    }

    fn check_precision_use(&mut self, ty: &Type, name: &str) {
        if self.sess.stage != ShaderStage::Fragment {
            return;
        }
        let precision = self.effective_precision(ty);
        if precision == Precision::High && !self.sess.config.support_highp_fragment {
            self.sess.error(
                DiagnosticKind::PrecisionError,
                format!("'{name}': 'highp' is not supported in fragment shaders"),
            );
        }
        let float_based = matches!(
            ty.inner,
            TypeInner::Scalar(ScalarKind::Float)
                | TypeInner::Vector {
                    kind: ScalarKind::Float,
                    ..
                }
                | TypeInner::Matrix { .. }
        );
        if float_based && precision == Precision::None && !self.sess.has_global_float_precision()
        {
            self.sess.warning(
                DiagnosticKind::PrecisionError,
                format!("'{name}' has no precision and no default precision for 'float' exists"),
            );
        }
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn check_decl(&mut self, unit: &mut TranslationUnit, decl: &Decl) {
        self.sess.set_line(decl.line());
        match decl {
            Decl::Precision { precision, ty, .. } => self.check_precision_decl(*precision, ty),
            Decl::Struct {
                name,
                fields,
                instance,
                ..
            } => self.check_struct_decl(unit, name, fields, instance.as_deref()),
            Decl::Variable(list) => self.check_var_decl_list(unit, list, true),
            Decl::Prototype(proto) => self.check_prototype(unit, proto),
            Decl::Function { proto, body } => self.check_function(unit, proto, body),
            Decl::Invariant { names, .. } => self.check_invariant(names),
        }
    }

    fn check_precision_decl(&mut self, precision: Precision, ty: &Type) {
        let ok = matches!(
            ty.inner,
            TypeInner::Scalar(ScalarKind::Int) | TypeInner::Scalar(ScalarKind::Float)
        ) || ty.is_sampler();
        if !ok {
            self.sess.error(
                DiagnosticKind::PrecisionError,
                "precision statements apply to 'int', 'float' and sampler types only",
            );
            return;
        }
        if precision == Precision::High
            && self.sess.stage == ShaderStage::Fragment
            && !self.sess.config.support_highp_fragment
        {
            self.sess.error(
                DiagnosticKind::PrecisionError,
                "'highp' is not supported in fragment shaders",
            );
            return;
        }
        self.sess.add_precision(ty.clone(), precision);
    }

    fn check_struct_decl(
        &mut self,
        unit: &mut TranslationUnit,
        name: &str,
        fields: &[StructField],
        instance: Option<&str>,
    ) {
        self.check_identifier(name, false);
        if fields.is_empty() {
            self.sess.error(
                DiagnosticKind::TypeMismatch,
                format!("struct '{name}' has no fields"),
            );
        }
        let mut resolved_fields = Vec::with_capacity(fields.len());
        for field in fields {
            if resolved_fields
                .iter()
                .any(|f: &StructField| f.name == field.name)
            {
                self.sess.error(
                    DiagnosticKind::DuplicateName,
                    format!("duplicate field '{}' in struct '{name}'", field.name),
                );
                continue;
            }
            let Some(ty) = self.resolve_type(unit, &field.ty) else {
                continue;
            };
            resolved_fields.push(StructField {
                name: field.name.clone(),
                ty,
            });
        }
        let struct_ty = Type::new(TypeInner::Struct {
            name: name.to_owned(),
            fields: resolved_fields,
        });
        self.sess.add_struct_type(name, struct_ty.clone());
        if let Some(instance) = instance {
            self.check_identifier(instance, false);
            if self.sess.bound_in_current_scope(instance) {
                self.sess.error(
                    DiagnosticKind::DuplicateName,
                    format!("'{instance}' is already declared in this scope"),
                );
            } else {
                self.sess
                    .add_variable(instance, struct_ty, StorageQualifier::None, false);
            }
        }
    }

    fn check_var_decl_list(
        &mut self,
        unit: &mut TranslationUnit,
        list: &VarDeclList,
        global: bool,
    ) {
        self.sess.set_line(list.line);
        if !global
            && matches!(
                list.qualifier,
                StorageQualifier::Attribute | StorageQualifier::Uniform | StorageQualifier::Varying
            )
        {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                format!("'{:?}' declarations are only allowed at global scope", list.qualifier),
            );
            return;
        }
        for decl in &list.decls {
            self.check_one_var_decl(unit, list.qualifier, decl, global);
        }
    }

    fn check_one_var_decl(
        &mut self,
        unit: &mut TranslationUnit,
        qualifier: StorageQualifier,
        decl: &VarDecl,
        global: bool,
    ) {
        let program_global = global && qualifier != StorageQualifier::None;
        self.check_identifier(&decl.name, program_global);

        let Some(ty) = self.resolve_type(unit, &decl.ty) else {
            return;
        };

        if self.sess.bound_in_current_scope(&decl.name) {
            self.sess.error(
                DiagnosticKind::DuplicateName,
                format!("'{}' is already declared in this scope", decl.name),
            );
            return;
        }

        // Initializer first: its expressions resolve in the enclosing
        // environment, not against the new binding.
        let mut const_value = None;
        if let Some(init) = decl.init {
            let init_ty = self.check_expr(unit, init);
            if let Some(init_ty) = &init_ty {
                let resolved_init = types::normalize(init_ty, &self.sess.structs)
                    .unwrap_or_else(|_| init_ty.clone());
                if !types::same_type(&ty, &resolved_init, true) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot initialize '{}' of type {} with a value of type {}",
                            decl.name,
                            essl_ast::display::type_name(&ty),
                            essl_ast::display::type_name(&resolved_init),
                        ),
                    );
                }
            }
            if eval::is_constant(&self.sess, unit, init) {
                const_value = Some(init);
            } else if qualifier == StorageQualifier::Const {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!("initializer of 'const' variable '{}' is not constant", decl.name),
                );
            }
        } else if qualifier == StorageQualifier::Const {
            self.sess.error(
                DiagnosticKind::TypeMismatch,
                format!("'const' variable '{}' lacks an initializer", decl.name),
            );
        }

        match qualifier {
            StorageQualifier::Uniform => {
                if decl.init.is_some() {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!("uniform '{}' may not have an initializer", decl.name),
                    );
                }
                self.check_precision_use(&ty, &decl.name);
                let precision = self.effective_precision(&ty);
                self.register_uniform(&decl.name, &ty, precision);
            }
            StorageQualifier::Attribute => {
                if self.sess.stage != ShaderStage::Vertex {
                    self.sess.error(
                        DiagnosticKind::SyntaxError,
                        format!("attribute '{}' declared outside a vertex shader", decl.name),
                    );
                } else if !attribute_type_ok(&ty) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "attribute '{}' must be a float scalar, vector or matrix",
                            decl.name
                        ),
                    );
                } else {
                    self.sess.add_attribute(&decl.name, ty.clone(), self.sess.line());
                }
            }
            StorageQualifier::Varying => {
                if !varying_type_ok(&ty) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "varying '{}' must be a float scalar, vector, matrix or an array of those",
                            decl.name
                        ),
                    );
                } else {
                    self.check_precision_use(&ty, &decl.name);
                    let precision = self.effective_precision(&ty);
                    self.register_varying(&decl.name, &ty, precision);
                }
            }
            _ => {
                if global || qualifier == StorageQualifier::None {
                    self.check_precision_use(&ty, &decl.name);
                }
            }
        }

        let read_only = qualifier == StorageQualifier::Const
            || qualifier == StorageQualifier::Attribute
            || qualifier == StorageQualifier::Uniform;
        self.sess
            .add_variable(&decl.name, ty, qualifier, read_only);
        if let Some(value) = const_value {
            if let Some(binding) = self.sess.lookup_var_binding_mut(&decl.name) {
                binding.value = Some(value);
            }
        }
    }

    fn register_uniform(&mut self, name: &str, ty: &Type, precision: Precision) {
        let line = self.sess.line();
        let existing = self
            .sess
            .lookup_uniform(name, false)
            .map(|r| (r.ty.clone(), r.precision));
        match existing {
            Some((existing_ty, existing_prec)) => {
                if !types::same_type(&existing_ty, ty, true) || existing_prec != precision {
                    self.sess.error(
                        DiagnosticKind::DuplicateName,
                        format!("uniform '{name}' redeclared with a different type"),
                    );
                }
            }
            None => self.sess.add_uniform(name, ty.clone(), precision, line),
        }
    }

    fn register_varying(&mut self, name: &str, ty: &Type, precision: Precision) {
        let line = self.sess.line();
        let existing = self
            .sess
            .lookup_varying(name, false)
            .map(|r| (r.ty.clone(), r.precision));
        match existing {
            Some((existing_ty, existing_prec)) => {
                if !types::same_type(&existing_ty, ty, true) || existing_prec != precision {
                    self.sess.error(
                        DiagnosticKind::DuplicateName,
                        format!("varying '{name}' redeclared with a different type"),
                    );
                }
            }
            None => self.sess.add_varying(name, ty.clone(), precision, line),
        }
    }

    fn check_invariant(&mut self, names: &[String]) {
        if self.sess.scope_level() > 0 {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                "invariant declarations are only allowed at global scope",
            );
            return;
        }
        for name in names {
            let is_builtin_output = match self.sess.lookup_builtin(name) {
                Lookup::Hit(cands) => cands
                    .iter()
                    .any(|b| matches!(b, Builtin::Var(var) if var.is_output)),
                _ => false,
            };
            let is_varying = self.sess.lookup_varying(name, false).is_some();
            if !is_builtin_output && !is_varying {
                self.sess.error(
                    DiagnosticKind::UndeclaredIdentifier,
                    format!("'{name}' is not a varying or builtin output"),
                );
            }
        }
    }

    fn function_sig(&mut self, unit: &TranslationUnit, proto: &FunctionProto) -> FunctionSig {
        let return_type = self
            .resolve_type(unit, &proto.return_type)
            .unwrap_or_else(Type::void);
        if return_type.is_array() {
            self.sess.error(
                DiagnosticKind::TypeMismatch,
                format!("function '{}' may not return an array", proto.name),
            );
        }
        let mut params = Vec::with_capacity(proto.params.len());
        let mut dirs = Vec::with_capacity(proto.params.len());
        for param in &proto.params {
            let ty = self
                .resolve_type(unit, &param.ty)
                .unwrap_or_else(Type::void);
            params.push(ty);
            dirs.push(param.direction);
        }
        FunctionSig {
            return_type,
            params,
            param_dirs: dirs,
            is_proto: false,
            line: proto.line,
        }
    }

    fn check_prototype(&mut self, unit: &mut TranslationUnit, proto: &FunctionProto) {
        self.check_identifier(&proto.name, true);
        let sig = FunctionSig {
            is_proto: true,
            ..self.function_sig(unit, proto)
        };
        self.sess.add_function(&proto.name, sig);
    }

    fn check_function(&mut self, unit: &mut TranslationUnit, proto: &FunctionProto, body: &[Stmt]) {
        if self.sess.current_function().is_some() {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                format!("nested function '{}' is not allowed", proto.name),
            );
            return;
        }
        self.check_identifier(&proto.name, true);
        let sig = self.function_sig(unit, proto);
        let return_type = sig.return_type.clone();
        self.sess.add_function(&proto.name, sig);

        self.sess.enter_scope(Some(return_type));
        for param in &proto.params {
            if let Some(name) = &param.name {
                self.check_identifier(name, false);
                if let Some(ty) = self.resolve_type(unit, &param.ty) {
                    if self.sess.bound_in_current_scope(name) {
                        self.sess.error(
                            DiagnosticKind::DuplicateName,
                            format!("parameter '{name}' is declared twice"),
                        );
                    } else {
                        self.sess.add_variable(
                            name,
                            ty,
                            StorageQualifier::None,
                            param.is_const,
                        );
                    }
                }
            }
        }
        self.sess.set_current_function(Some(proto.name.clone()));
        for stmt in body {
            self.check_stmt(unit, stmt);
        }
        self.sess.set_current_function(None);
        self.sess.leave_scope();
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn check_stmt(&mut self, unit: &mut TranslationUnit, stmt: &Stmt) {
        self.sess.set_line(stmt.line());
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr { expr, .. } => {
                self.check_expr(unit, *expr);
            }
            Stmt::Decl(list) => self.check_var_decl_list(unit, list, false),
            Stmt::Compound { body, .. } => {
                self.sess.enter_scope(None);
                for stmt in body {
                    self.check_stmt(unit, stmt);
                }
                self.sess.leave_scope();
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.check_condition(unit, *cond, "if");
                self.check_stmt(unit, then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(unit, else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(unit, *cond, "while");
                self.check_stmt(unit, body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.check_stmt(unit, body);
                self.check_condition(unit, *cond, "do-while");
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => self.check_for(unit, init, *cond, *update, body),
            Stmt::Return { value, .. } => {
                let expected = self.sess.function_return_type().cloned();
                let value_ty = value.map(|v| self.check_expr(unit, v));
                match (expected, value_ty) {
                    (Some(expected), Some(Some(actual))) => {
                        let actual = types::normalize(&actual, &self.sess.structs)
                            .unwrap_or(actual);
                        if !types::same_type(&expected, &actual, true) {
                            self.sess.error(
                                DiagnosticKind::TypeMismatch,
                                "return value does not match the function's return type",
                            );
                        }
                    }
                    (Some(expected), None) => {
                        if !matches!(expected.inner, TypeInner::Void) {
                            self.sess.error(
                                DiagnosticKind::TypeMismatch,
                                "non-void function returns without a value",
                            );
                        }
                    }
                    _ => {}
                }
            }
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::Discard { .. } => {
                if self.sess.stage != ShaderStage::Fragment {
                    self.sess.error(
                        DiagnosticKind::SyntaxError,
                        "'discard' is only allowed in fragment shaders",
                    );
                }
            }
        }
    }

    fn check_condition(&mut self, unit: &mut TranslationUnit, cond: Handle<Expr>, what: &str) {
        if let Some(ty) = self.check_expr(unit, cond) {
            if !matches!(ty.inner, TypeInner::Scalar(ScalarKind::Bool)) {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!("'{what}' condition must be a bool"),
                );
            }
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn set_expr_type(&mut self, handle: Handle<Expr>, ty: Type) -> Option<Type> {
        if self.expr_types.len() <= handle.index() {
            self.expr_types.resize(handle.index() + 1, None);
        }
        self.expr_types[handle.index()] = Some(ty.clone());
        Some(ty)
    }

    fn check_expr(&mut self, unit: &mut TranslationUnit, handle: Handle<Expr>) -> Option<Type> {
        let expr = unit.exprs[handle].clone();
        match expr {
            Expr::Literal(lit) => {
                let ty = Type::scalar(lit.scalar_kind());
                self.set_expr_type(handle, ty)
            }
            Expr::Var(name) => {
                let ty = self.resolve_var_use(&name)?;
                self.set_expr_type(handle, ty)
            }
            Expr::Call { callee, args } => {
                let ty = self.check_call(unit, &callee, &args)?;
                self.set_expr_type(handle, ty)
            }
            Expr::Construct { ty, args } => {
                let out = self.check_construct(unit, &ty, &args)?;
                self.set_expr_type(handle, out)
            }
            Expr::Index { base, index } => {
                let out = self.check_index(unit, handle, base, index)?;
                self.set_expr_type(handle, out)
            }
            Expr::Select { base, field } => {
                let out = self.check_select(unit, base, &field)?;
                self.set_expr_type(handle, out)
            }
            Expr::Unary { op, expr } => {
                let arg = self.check_expr(unit, expr)?;
                let out = self.check_unary(unit, op, expr, &arg)?;
                self.set_expr_type(handle, out)
            }
            Expr::Post { op, expr } => {
                let arg = self.check_expr(unit, expr)?;
                let _ = op;
                if !is_numeric(&arg) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "'++'/'--' require a numeric operand",
                    );
                }
                self.check_writable(unit, expr);
                self.set_expr_type(handle, arg)
            }
            Expr::Binary { op, left, right } => {
                let lt = self.check_expr(unit, left);
                let rt = self.check_expr(unit, right);
                let (lt, rt) = (lt?, rt?);
                let out = self.check_binary(op, &lt, &rt)?;
                self.set_expr_type(handle, out)
            }
            Expr::Cond {
                cond,
                accept,
                reject,
            } => {
                if let Some(cond_ty) = self.check_expr(unit, cond) {
                    if !matches!(cond_ty.inner, TypeInner::Scalar(ScalarKind::Bool)) {
                        self.sess.error(
                            DiagnosticKind::TypeMismatch,
                            "conditional expression requires a bool condition",
                        );
                    }
                }
                let at = self.check_expr(unit, accept);
                let rt = self.check_expr(unit, reject);
                let (at, rt) = (at?, rt?);
                if !types::same_type(&at, &rt, true) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "conditional expression arms have different types",
                    );
                }
                self.set_expr_type(handle, at)
            }
            Expr::Assign { op, target, value } => {
                let lt = self.check_expr(unit, target);
                let rt = self.check_expr(unit, value);
                self.check_writable(unit, target);
                let (lt, rt) = (lt?, rt?);
                match op.binary_op() {
                    Some(bin) => {
                        self.check_binary(bin, &lt, &rt)?;
                    }
                    None => {
                        if !types::same_type(&lt, &rt, true) {
                            self.sess.error(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "cannot assign a value of type {} to a target of type {}",
                                    essl_ast::display::type_name(&rt),
                                    essl_ast::display::type_name(&lt),
                                ),
                            );
                        }
                    }
                }
                self.set_expr_type(handle, lt)
            }
            Expr::Seq { first, second } => {
                self.check_expr(unit, first);
                let ty = self.check_expr(unit, second)?;
                self.set_expr_type(handle, ty)
            }
        }
    }

    /// Resolves an identifier use, bumping usage counters and applying the
    /// extension gate.
    fn resolve_var_use(&mut self, name: &str) -> Option<Type> {
        if let Some(binding) = self.sess.lookup_var_binding(name) {
            let ty = binding.ty.clone();
            let storage = binding.storage;
            match storage {
                StorageQualifier::Uniform => {
                    self.sess.lookup_uniform(name, true);
                }
                StorageQualifier::Varying => {
                    self.sess.lookup_varying(name, true);
                }
                StorageQualifier::Attribute => {
                    self.sess.lookup_attribute(name, true);
                }
                _ => {}
            }
            return Some(ty);
        }
        match self.sess.lookup_builtin(name) {
            Lookup::Hit(cands) => match cands.first() {
                Some(Builtin::Var(var)) => Some(self.sess.concretize(var.ty.clone())),
                _ => {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!("builtin function '{name}' used as a value"),
                    );
                    None
                }
            },
            Lookup::Gated(ext) => {
                self.sess.error(
                    DiagnosticKind::ExtensionNotEnabled,
                    format!("'{name}' requires the {} extension", ext.name()),
                );
                None
            }
            Lookup::Miss => {
                self.sess.error(
                    DiagnosticKind::UndeclaredIdentifier,
                    format!("unknown identifier '{name}'"),
                );
                None
            }
        }
    }

    fn check_call(
        &mut self,
        unit: &mut TranslationUnit,
        callee: &str,
        args: &[Handle<Expr>],
    ) -> Option<Type> {
        let mut arg_types = Vec::with_capacity(args.len());
        let mut all_typed = true;
        for arg in args {
            match self.check_expr(unit, *arg) {
                Some(ty) => {
                    let ty = types::normalize(&ty, &self.sess.structs).unwrap_or(ty);
                    arg_types.push(ty);
                }
                None => all_typed = false,
            }
        }
        if !all_typed {
            return None;
        }

        // Recursion ban: calling ourselves, or anything that (transitively)
        // calls us, is rejected before overload matching.
        if let Some(current) = self.sess.current_function().map(str::to_owned) {
            if current == callee || self.sess.calls_transitively(callee, &current) {
                self.sess.error(
                    DiagnosticKind::RecursionError,
                    format!("recursive call of function '{callee}'"),
                );
            }
        }

        let mut saw_user_candidates = false;
        let mut user_match: Option<(Type, Vec<bool>)> = None;
        if let Some(data) = self.sess.lookup_function(callee) {
            saw_user_candidates = true;
            let matched = data.sigs.iter().find(|sig| {
                sig.params.len() == arg_types.len()
                    && sig
                        .params
                        .iter()
                        .zip(&arg_types)
                        .all(|(p, a)| types::same_type(p, a, true))
            });
            if let Some(sig) = matched {
                user_match = Some((
                    sig.return_type.clone(),
                    sig.param_dirs
                        .iter()
                        .map(|d| matches!(d, ParamDirection::Out | ParamDirection::InOut))
                        .collect(),
                ));
            }
        }
        if let Some((return_type, out_dirs)) = user_match {
            for (arg, is_out) in args.iter().zip(out_dirs) {
                if is_out && !self.is_legal_reference_arg(unit, *arg) {
                    self.sess.error(
                        DiagnosticKind::IllegalReferenceArgument,
                        format!(
                            "argument to 'out' parameter of '{callee}' is not a writable variable"
                        ),
                    );
                }
            }
            self.sess.add_function_call(callee);
            return Some(return_type);
        }

        match self.sess.lookup_builtin(callee) {
            Lookup::Hit(cands) => match resolve::resolve_builtin(cands, &arg_types) {
                Some((fun, generic)) => resolve::builtin_return_type(fun, generic.as_ref()),
                None => {
                    self.sess.error(
                        DiagnosticKind::MismatchedOverload,
                        format!("no overload of '{callee}' matches these argument types"),
                    );
                    None
                }
            },
            Lookup::Gated(ext) => {
                self.sess.error(
                    DiagnosticKind::ExtensionNotEnabled,
                    format!("'{callee}' requires the {} extension", ext.name()),
                );
                None
            }
            Lookup::Miss => {
                if saw_user_candidates {
                    self.sess.error(
                        DiagnosticKind::MismatchedOverload,
                        format!("no overload of '{callee}' matches these argument types"),
                    );
                } else if callee != CLAMP_HELPER {
                    self.sess.error(
                        DiagnosticKind::UndeclaredIdentifier,
                        format!("unknown function '{callee}'"),
                    );
                }
                None
            }
        }
    }

    fn check_construct(
        &mut self,
        unit: &mut TranslationUnit,
        ty: &Type,
        args: &[Handle<Expr>],
    ) -> Option<Type> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let ty = self.check_expr(unit, *arg)?;
            arg_types.push(types::normalize(&ty, &self.sess.structs).unwrap_or(ty));
        }
        if args.is_empty() {
            self.sess.error(
                DiagnosticKind::TypeMismatch,
                "constructors require at least one argument",
            );
            return None;
        }

        match &ty.inner {
            TypeInner::Scalar(_) => {
                let ok = args.len() == 1 && arg_types[0].component_count().is_some();
                if !ok {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "scalar constructors take exactly one scalar, vector or matrix argument",
                    );
                    return None;
                }
                Some(ty.clone())
            }
            TypeInner::Vector { size, .. } => {
                let want = size.len();
                if args.len() == 1 {
                    let width = arg_types[0].component_count();
                    match width {
                        Some(w) if w == 1 || w >= want => Some(ty.clone()),
                        _ => {
                            self.sess.error(
                                DiagnosticKind::TypeMismatch,
                                "vector constructor argument does not provide enough components",
                            );
                            None
                        }
                    }
                } else {
                    let mut total = 0;
                    for arg_ty in &arg_types {
                        match arg_ty.component_count() {
                            Some(w) if !arg_ty.is_matrix() => total += w,
                            _ => {
                                self.sess.error(
                                    DiagnosticKind::TypeMismatch,
                                    "vector constructors take scalar and vector arguments",
                                );
                                return None;
                            }
                        }
                    }
                    if total != want {
                        self.sess.error(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "vector constructor provides {total} components where {want} are required"
                            ),
                        );
                        return None;
                    }
                    Some(ty.clone())
                }
            }
            TypeInner::Matrix { cols, rows } => {
                let want = cols.len() * rows.len();
                if args.len() == 1 {
                    let ok = matches!(
                        arg_types[0].inner,
                        TypeInner::Scalar(_) | TypeInner::Matrix { .. }
                    );
                    if !ok {
                        self.sess.error(
                            DiagnosticKind::TypeMismatch,
                            "single-argument matrix constructors take a scalar or matrix",
                        );
                        return None;
                    }
                    Some(ty.clone())
                } else {
                    let mut total = 0;
                    for arg_ty in &arg_types {
                        match arg_ty.component_count() {
                            Some(w) if !arg_ty.is_matrix() => total += w,
                            _ => {
                                self.sess.error(
                                    DiagnosticKind::TypeMismatch,
                                    "matrix constructors take scalar and vector arguments",
                                );
                                return None;
                            }
                        }
                    }
                    if total != want {
                        self.sess.error(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "matrix constructor provides {total} components where {want} are required"
                            ),
                        );
                        return None;
                    }
                    Some(ty.clone())
                }
            }
            TypeInner::Named(name) => {
                let Some(struct_ty) = self.sess.lookup_struct(name).cloned() else {
                    self.sess.error(
                        DiagnosticKind::UndeclaredIdentifier,
                        format!("unknown type name '{name}'"),
                    );
                    return None;
                };
                let TypeInner::Struct { fields, .. } = &struct_ty.inner else {
                    return None;
                };
                if fields.len() != args.len() {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        format!("constructor of '{name}' requires {} arguments", fields.len()),
                    );
                    return None;
                }
                for (field, arg_ty) in fields.iter().zip(&arg_types) {
                    if !types::same_type(&field.ty, arg_ty, true) {
                        self.sess.error(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "constructor argument for field '{}' has the wrong type",
                                field.name
                            ),
                        );
                    }
                }
                Some(struct_ty)
            }
            _ => {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!(
                        "type '{}' has no constructor",
                        essl_ast::display::type_name(ty)
                    ),
                );
                None
            }
        }
    }

    fn check_index(
        &mut self,
        unit: &mut TranslationUnit,
        index_expr: Handle<Expr>,
        base: Handle<Expr>,
        index: Handle<Expr>,
    ) -> Option<Type> {
        let base_ty = self.check_expr(unit, base)?;
        let base_ty = types::normalize(&base_ty, &self.sess.structs).unwrap_or(base_ty);
        let base_ty = self.sess.concretize(base_ty);

        if let Some(index_ty) = self.check_expr(unit, index) {
            if !matches!(
                index_ty.inner,
                TypeInner::Scalar(ScalarKind::Int) | TypeInner::Scalar(ScalarKind::UInt)
            ) {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    "index expressions must have integer type",
                );
            }
        }

        let element = match types::indexed_type(&base_ty) {
            Some(elem) => elem,
            None => {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    "only arrays, vectors and matrices can be indexed",
                );
                return None;
            }
        };

        let is_constant = eval::is_constant(&self.sess, unit, index);
        if is_constant {
            if let (Some(len), Some(value)) = (
                types::indexed_len(&base_ty),
                eval::eval_to_i32(&self.sess, unit, index),
            ) {
                if value < 0 || value as u32 >= len {
                    self.sess.error(
                        DiagnosticKind::ArraySizeError,
                        format!("constant index {value} is out of bounds (size {len})"),
                    );
                }
            }
        } else {
            let root_is_uniform = root_var(unit, base)
                .map(|name| self.uniform_rooted(&name))
                .unwrap_or(false);
            if root_is_uniform
                && self.sess.stage == ShaderStage::Fragment
                && self.sess.config.fragment_constant_uniform_array_indexing
                && !self.sess.config.clamp_out_of_bound_uniform_array_indexing
            {
                self.sess.error(
                    DiagnosticKind::UniformArrayIndexError,
                    "fragment shaders may only index uniform arrays with constant expressions",
                );
            } else if root_is_uniform
                && self.sess.config.clamp_out_of_bound_uniform_array_indexing
            {
                if let Some(len) = types::indexed_len(&base_ty) {
                    if len > 0 {
                        self.rewrite_clamped_index(unit, index_expr, index, len - 1);
                    }
                }
            }
        }

        Some(element)
    }

    /// Replaces `index` inside `base[index]` with
    /// `essl_clamp_index(index, limit)`, bounding the GPU-side access.
    fn rewrite_clamped_index(
        &mut self,
        unit: &mut TranslationUnit,
        index_expr: Handle<Expr>,
        index: Handle<Expr>,
        limit: u32,
    ) {
        let limit_lit = unit
            .exprs
            .append(Expr::Literal(Literal::Int(limit as i32)));
        self.set_expr_type(limit_lit, Type::int());
        let clamped = unit.exprs.append(Expr::Call {
            callee: CLAMP_HELPER.into(),
            args: vec![index, limit_lit],
        });
        self.set_expr_type(clamped, Type::int());
        if let Expr::Index { index: slot, .. } = &mut unit.exprs[index_expr] {
            *slot = clamped;
        }
        self.sess.used_clamp_helper = true;
        log::debug!("clamped non-constant uniform array index to 0..={limit}");
    }

    /// Whether `name` resolves to a uniform (directly or through the
    /// aliased global binding).
    fn uniform_rooted(&self, name: &str) -> bool {
        self.sess
            .lookup_var_binding(name)
            .map(|b| b.storage == StorageQualifier::Uniform)
            .unwrap_or(false)
    }

    fn check_select(
        &mut self,
        unit: &mut TranslationUnit,
        base: Handle<Expr>,
        field: &str,
    ) -> Option<Type> {
        let base_ty = self.check_expr(unit, base)?;
        let base_ty = types::normalize(&base_ty, &self.sess.structs).unwrap_or(base_ty);
        match &base_ty.inner {
            TypeInner::Struct { .. } => match types::lookup_field(&base_ty, field) {
                Ok(field_ty) => Some(field_ty.clone()),
                Err(err) => {
                    self.sess
                        .error(DiagnosticKind::UndeclaredIdentifier, err.to_string());
                    None
                }
            },
            TypeInner::Vector { size, kind } => {
                self.check_swizzle(field, size.len())?;
                types::swizzle_type(*kind, field.len())
            }
            _ => {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!("type has no field '{field}'"),
                );
                None
            }
        }
    }

    /// Swizzle letters must come from a single selector family and stay in
    /// range for the vector's width.
    fn check_swizzle(&mut self, field: &str, width: u32) -> Option<()> {
        if field.is_empty() || field.len() > 4 {
            self.sess.error(
                DiagnosticKind::TypeMismatch,
                format!("illegal vector selector '{field}'"),
            );
            return None;
        }
        let family = |c: char| match c {
            'x' | 'y' | 'z' | 'w' => Some((1, "xyzw".find(c).unwrap() as u32)),
            'r' | 'g' | 'b' | 'a' => Some((2, "rgba".find(c).unwrap() as u32)),
            's' | 't' | 'p' | 'q' => Some((3, "stpq".find(c).unwrap() as u32)),
            _ => None,
        };
        let mut seen_family = None;
        for c in field.chars() {
            let Some((fam, component)) = family(c) else {
                self.sess.error(
                    DiagnosticKind::UndeclaredIdentifier,
                    format!("unknown vector selector '{field}'"),
                );
                return None;
            };
            if *seen_family.get_or_insert(fam) != fam {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!("vector selector '{field}' mixes selector families"),
                );
                return None;
            }
            if component >= width {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    format!("vector selector '{field}' is out of range"),
                );
                return None;
            }
        }
        Some(())
    }

    fn check_unary(
        &mut self,
        unit: &mut TranslationUnit,
        op: UnaryOp,
        operand: Handle<Expr>,
        arg: &Type,
    ) -> Option<Type> {
        match op {
            UnaryOp::Not => {
                if !matches!(arg.inner, TypeInner::Scalar(ScalarKind::Bool)) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "'!' requires a bool operand",
                    );
                }
                Some(Type::bool())
            }
            UnaryOp::Plus | UnaryOp::Negate => {
                if !is_numeric(arg) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "unary '+'/'-' require a numeric operand",
                    );
                }
                Some(arg.clone())
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                if !is_numeric(arg) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "'++'/'--' require a numeric operand",
                    );
                }
                self.check_writable(unit, operand);
                Some(arg.clone())
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, lt: &Type, rt: &Type) -> Option<Type> {
        let lt = &types::normalize(lt, &self.sess.structs).unwrap_or_else(|_| lt.clone());
        let rt = &types::normalize(rt, &self.sess.structs).unwrap_or_else(|_| rt.clone());
        match op {
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                let bool_scalar =
                    |t: &Type| matches!(t.inner, TypeInner::Scalar(ScalarKind::Bool));
                if !bool_scalar(lt) || !bool_scalar(rt) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "logical operators require bool operands",
                    );
                }
                Some(Type::bool())
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                if !types::same_type(lt, rt, true) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "'=='/'!=' operands have different types",
                    );
                } else {
                    self.check_equality_operand(lt);
                }
                Some(Type::bool())
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                if !types::same_type(lt, rt, true) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "relational operands have different types",
                    );
                } else if !matches!(lt.inner, TypeInner::Scalar(k) if k != ScalarKind::Bool) {
                    self.sess.error(
                        DiagnosticKind::TypeMismatch,
                        "relational operators compare numeric scalars",
                    );
                }
                Some(Type::bool())
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.arithmetic_result(op, lt, rt)
            }
        }
    }

    /// Typing of `+ - * /`: identical types, scalar⊗vector/matrix
    /// promotion, and the linear-algebra products for `*`.
    fn arithmetic_result(&mut self, op: BinaryOp, lt: &Type, rt: &Type) -> Option<Type> {
        let err = |v: &mut Self| {
            v.sess.error(
                DiagnosticKind::TypeMismatch,
                "operand types do not support this arithmetic operator",
            );
        };

        if types::same_type(lt, rt, true) {
            if !is_numeric(lt) {
                err(self);
                return None;
            }
            // vec*vec and mat*mat are component-wise except mat*mat, which
            // is the linear-algebra product with the same shape here.
            return Some(lt.clone());
        }

        let scalar_kind = |t: &Type| match t.inner {
            TypeInner::Scalar(k) if k != ScalarKind::Bool => Some(k),
            _ => None,
        };
        let elem_kind = |t: &Type| match t.inner {
            TypeInner::Vector { kind, .. } => Some(kind),
            TypeInner::Matrix { .. } => Some(ScalarKind::Float),
            _ => None,
        };

        // scalar ⊗ vector/matrix of the same element kind.
        if let (Some(sk), Some(ek)) = (scalar_kind(lt), elem_kind(rt)) {
            if sk == ek {
                return Some(rt.clone());
            }
        }
        if let (Some(sk), Some(ek)) = (scalar_kind(rt), elem_kind(lt)) {
            if sk == ek {
                return Some(lt.clone());
            }
        }

        if op == BinaryOp::Mul {
            // vector * matrix (row vector) and matrix * vector (column
            // vector), dimensions permitting.
            match (&lt.inner, &rt.inner) {
                (
                    TypeInner::Vector {
                        size,
                        kind: ScalarKind::Float,
                    },
                    TypeInner::Matrix { rows, cols },
                ) if size == rows => {
                    return Some(Type::vec(*cols));
                }
                (
                    TypeInner::Matrix { rows, cols },
                    TypeInner::Vector {
                        size,
                        kind: ScalarKind::Float,
                    },
                ) if size == cols => {
                    return Some(Type::vec(*rows));
                }
                _ => {}
            }
        }

        err(self);
        None
    }

    /// `==`/`!=` are undefined over arrays and samplers, including through
    /// struct fields.
    fn check_equality_operand(&mut self, ty: &Type) {
        match &ty.inner {
            TypeInner::Array { .. } => {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    "arrays cannot be compared with '=='/'!='",
                );
            }
            TypeInner::Sampler(_) => {
                self.sess.error(
                    DiagnosticKind::TypeMismatch,
                    "samplers cannot be compared with '=='/'!='",
                );
            }
            TypeInner::Struct { fields, .. } => {
                for field in fields.clone() {
                    self.check_equality_operand(&field.ty);
                }
            }
            TypeInner::Named(name) => {
                if let Some(resolved) = self.sess.lookup_struct(name).cloned() {
                    self.check_equality_operand(&resolved);
                }
            }
            _ => {}
        }
    }

    /// A legal reference argument (out/inout) is a plain variable bound to
    /// a writable, non-const, non-uniform binding.
    fn is_legal_reference_arg(&mut self, unit: &TranslationUnit, arg: Handle<Expr>) -> bool {
        match &unit.exprs[arg] {
            Expr::Var(name) => match self.sess.lookup_var_binding(name) {
                Some(binding) => {
                    !binding.read_only
                        && !matches!(
                            binding.storage,
                            StorageQualifier::Const | StorageQualifier::Uniform
                        )
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Assignment-target legality; the root variable must be mutable.
    fn check_writable(&mut self, unit: &TranslationUnit, target: Handle<Expr>) {
        let Some(name) = root_var(unit, target) else {
            self.sess.error(
                DiagnosticKind::IllegalReferenceArgument,
                "assignment target is not an l-value",
            );
            return;
        };
        if let Some(binding) = self.sess.lookup_var_binding(&name) {
            let illegal = binding.read_only
                || matches!(
                    binding.storage,
                    StorageQualifier::Const | StorageQualifier::Uniform
                )
                || (binding.storage == StorageQualifier::Varying
                    && self.sess.stage == ShaderStage::Fragment);
            if illegal {
                self.sess.error(
                    DiagnosticKind::IllegalReferenceArgument,
                    format!("'{name}' is not writable"),
                );
            }
            return;
        }
        match self.sess.lookup_builtin(&name) {
            Lookup::Hit(cands) => {
                let writable = matches!(
                    cands.first(),
                    Some(Builtin::Var(var)) if !var.read_only && var.const_value.is_none()
                );
                if !writable {
                    self.sess.error(
                        DiagnosticKind::IllegalReferenceArgument,
                        format!("'{name}' is not writable"),
                    );
                }
            }
            _ => {
                // An unknown name was already diagnosed during resolution.
            }
        }
    }

    // -----------------------------------------------------------------
    // For-loop restrictions (GLSL-ES Appendix A)
    // -----------------------------------------------------------------

    fn check_for(
        &mut self,
        unit: &mut TranslationUnit,
        init: &Stmt,
        cond: Option<Handle<Expr>>,
        update: Option<Handle<Expr>>,
        body: &Stmt,
    ) {
        self.sess.enter_scope(None);
        self.check_stmt(unit, init);

        // The loop index must be declared (or assigned) with a constant
        // initializer of scalar numeric type.
        let mut loop_index: Option<String> = None;
        let mut init_value: Option<f64> = None;
        match init {
            Stmt::Decl(list) if list.decls.len() == 1 => {
                let decl = &list.decls[0];
                if loop_var_type_ok(&decl.ty) {
                    if let Some(init_expr) = decl.init {
                        if eval::is_constant(&self.sess, unit, init_expr) {
                            loop_index = Some(decl.name.clone());
                            init_value = eval::eval(&self.sess, unit, init_expr)
                                .and_then(|v| v.to_f64());
                        }
                    }
                }
            }
            Stmt::Expr { expr, .. } => {
                if let Expr::Assign {
                    op: AssignOp::Assign,
                    target,
                    value,
                } = &unit.exprs[*expr]
                {
                    if let Expr::Var(name) = &unit.exprs[*target] {
                        if eval::is_constant(&self.sess, unit, *value) {
                            loop_index = Some(name.clone());
                            init_value =
                                eval::eval(&self.sess, unit, *value).and_then(|v| v.to_f64());
                        }
                    }
                }
            }
            _ => {}
        }
        if loop_index.is_none() || init_value.is_none() {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                "for loop must declare one index variable with a constant initializer",
            );
        }

        // Condition: index compared against a constant bound.
        if let Some(cond) = cond {
            self.check_condition(unit, cond, "for");
        }
        let mut bound_op: Option<BinaryOp> = None;
        let mut bound_value: Option<f64> = None;
        if let (Some(cond), Some(index)) = (cond, loop_index.as_deref()) {
            if let Expr::Binary { op, left, right } = &unit.exprs[cond] {
                if matches!(
                    op,
                    BinaryOp::Less
                        | BinaryOp::LessEqual
                        | BinaryOp::Greater
                        | BinaryOp::GreaterEqual
                        | BinaryOp::Equal
                        | BinaryOp::NotEqual
                ) {
                    if let Expr::Var(name) = &unit.exprs[*left] {
                        if name == index && eval::is_constant(&self.sess, unit, *right) {
                            bound_op = Some(*op);
                            bound_value =
                                eval::eval(&self.sess, unit, *right).and_then(|v| v.to_f64());
                        }
                    }
                    if bound_op.is_none() {
                        if let Expr::Var(name) = &unit.exprs[*right] {
                            if name == index && eval::is_constant(&self.sess, unit, *left) {
                                bound_op = Some(reverse_relational(*op));
                                bound_value =
                                    eval::eval(&self.sess, unit, *left).and_then(|v| v.to_f64());
                            }
                        }
                    }
                }
            }
        }
        if bound_op.is_none() {
            self.sess.error(
                DiagnosticKind::SyntaxError,
                "for loop condition must compare the index against a constant bound",
            );
        }

        // The update expression is still allowed to write the index, so
        // check it before the body makes the index read-only.
        if let Some(update) = update {
            self.check_expr(unit, update);
        }

        // The index is read-only inside the body, and no longer a known
        // constant.
        if let Some(index) = loop_index.as_deref() {
            if let Some(binding) = self.sess.lookup_var_binding_mut(index) {
                binding.read_only = true;
                binding.value = None;
            }
        }

        self.check_stmt(unit, body);

        // Update: a fixed, nonzero step applied to the index.
        let mut delta: Option<f64> = None;
        if let (Some(update), Some(index)) = (update, loop_index.as_deref()) {
            match &unit.exprs[update] {
                Expr::Post { op, expr } => {
                    if let Expr::Var(name) = &unit.exprs[*expr] {
                        if name == index {
                            delta = Some(if *op == PostOp::Inc { 1.0 } else { -1.0 });
                        }
                    }
                }
                Expr::Unary { op, expr }
                    if matches!(op, UnaryOp::PreInc | UnaryOp::PreDec) =>
                {
                    if let Expr::Var(name) = &unit.exprs[*expr] {
                        if name == index {
                            delta = Some(if *op == UnaryOp::PreInc { 1.0 } else { -1.0 });
                        }
                    }
                }
                Expr::Assign { op, target, value }
                    if matches!(op, AssignOp::Add | AssignOp::Sub) =>
                {
                    if let Expr::Var(name) = &unit.exprs[*target] {
                        if name == index && eval::is_constant(&self.sess, unit, *value) {
                            if let Some(step) =
                                eval::eval(&self.sess, unit, *value).and_then(|v| v.to_f64())
                            {
                                delta = Some(if *op == AssignOp::Add { step } else { -step });
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        match delta {
            None => {
                self.sess.error(
                    DiagnosticKind::SyntaxError,
                    "for loop update must step the index by a constant amount",
                );
            }
            Some(0.0) => {
                self.sess.error(
                    DiagnosticKind::SyntaxError,
                    "for loop update does not change the index",
                );
            }
            Some(step) => {
                if let (Some(init), Some(op), Some(bound)) = (init_value, bound_op, bound_value) {
                    if !loop_terminates(init, op, bound, step) {
                        self.sess.error(
                            DiagnosticKind::SyntaxError,
                            "for loop never terminates",
                        );
                    }
                }
            }
        }

        self.sess.leave_scope();
    }
}

fn attribute_type_ok(ty: &Type) -> bool {
    types::is_varying_type(ty)
}

fn varying_type_ok(ty: &Type) -> bool {
    match &ty.inner {
        TypeInner::Array { base, .. } => types::is_varying_type(base),
        _ => types::is_varying_type(ty),
    }
}

fn loop_var_type_ok(ty: &Type) -> bool {
    matches!(ty.inner, TypeInner::Scalar(k) if k != ScalarKind::Bool)
}

fn is_numeric(ty: &Type) -> bool {
    matches!(
        ty.inner,
        TypeInner::Scalar(k) if k != ScalarKind::Bool
    ) || matches!(
        ty.inner,
        TypeInner::Vector { kind, .. } if kind != ScalarKind::Bool
    ) || ty.is_matrix()
}

fn reverse_relational(op: BinaryOp) -> BinaryOp {
    match op {
        BinaryOp::Less => BinaryOp::Greater,
        BinaryOp::LessEqual => BinaryOp::GreaterEqual,
        BinaryOp::Greater => BinaryOp::Less,
        BinaryOp::GreaterEqual => BinaryOp::LessEqual,
        other => other,
    }
}

/// Conservative termination check over (init, bound-op, bound, step).
fn loop_terminates(init: f64, op: BinaryOp, bound: f64, step: f64) -> bool {
    match op {
        BinaryOp::Less | BinaryOp::LessEqual => init >= bound || step > 0.0,
        BinaryOp::Greater | BinaryOp::GreaterEqual => init <= bound || step < 0.0,
        BinaryOp::NotEqual => {
            // i != bound terminates when stepping toward the bound and the
            // step divides the gap.
            let gap = bound - init;
            if gap == 0.0 {
                return true;
            }
            step != 0.0 && gap.signum() == step.signum() && (gap / step).fract() == 0.0
        }
        BinaryOp::Equal => true,
        _ => true,
    }
}

/// Digs out the identifier at the root of an l-value chain.
fn root_var(unit: &TranslationUnit, mut handle: Handle<Expr>) -> Option<String> {
    loop {
        match &unit.exprs[handle] {
            Expr::Var(name) => return Some(name.clone()),
            Expr::Index { base, .. } | Expr::Select { base, .. } => handle = *base,
            _ => return None,
        }
    }
}
