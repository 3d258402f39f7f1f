//! Per-run validation state: scoped bindings, top-level variable records,
//! function overload sets, aliases and the call graph.
//!
//! One session services exactly one shader-stage validation; validating the
//! other stage requires a fresh session (or an explicit [`Session::reset`]).

use std::collections::{HashMap, HashSet};

use essl_ast::{
    ArraySize, Diagnostic, DiagnosticKind, Handle, ParamDirection, Precision, StorageQualifier,
    Type, TypeInner,
};

use crate::builtins::{Builtin, BuiltinRegistry, ExtensionSet, Lookup};
use crate::config::{Config, ShaderStage};
use crate::types::{self, StructTable};

/// Longest accepted identifier, per the WebGL source hygiene rules.
pub const MAX_IDENTIFIER_LENGTH: usize = 256;

/// Prefix of every generated name (aliases and emitted helpers).
pub const GENERATED_PREFIX: &str = "essl";

/// A scoped variable binding.
#[derive(Clone, Debug)]
pub struct VarBinding {
    pub name: String,
    pub ty: Type,
    pub storage: StorageQualifier,
    pub read_only: bool,
    /// Initializer handle when the binding has a known constant value.
    pub value: Option<Handle<essl_ast::Expr>>,
}

/// A top-level attribute/uniform/varying record.
#[derive(Clone, Debug)]
pub struct VarRecord {
    pub name: String,
    pub ty: Type,
    pub precision: Precision,
    pub line: u32,
    /// Bumped on every resolved use; records with zero usages are dropped
    /// from the exported variable set.
    pub usages: u32,
}

/// One declaration (prototype or definition) in an overload set.
#[derive(Clone, Debug)]
pub struct FunctionSig {
    pub return_type: Type,
    pub params: Vec<Type>,
    pub param_dirs: Vec<ParamDirection>,
    pub is_proto: bool,
    pub line: u32,
}

/// All declarations sharing one function name.
#[derive(Clone, Debug, Default)]
pub struct FunctionData {
    pub sigs: Vec<FunctionSig>,
    pub has_definition: bool,
}

#[derive(Default)]
struct ScopeFrame {
    vars: Vec<VarBinding>,
    precisions: Vec<(Type, Precision)>,
    aliases: Vec<(String, String)>,
    return_type: Option<Type>,
}

/// The mutable state of one validation run.
pub struct Session<'a> {
    pub config: &'a Config,
    pub stage: ShaderStage,
    pub diags: Vec<Diagnostic>,
    line: u32,

    pub structs: StructTable,
    globals: Vec<VarBinding>,
    global_precisions: Vec<(Type, Precision)>,
    scopes: Vec<ScopeFrame>,

    pub attributes: Vec<VarRecord>,
    pub uniforms: Vec<VarRecord>,
    pub varyings: Vec<VarRecord>,

    functions: HashMap<String, FunctionData>,
    call_edges: HashMap<String, Vec<String>>,
    current_function: Option<String>,

    registry: BuiltinRegistry,
    pub extensions_enabled: ExtensionSet,

    /// Program-level source-name → generated-name map.
    pub aliases: HashMap<String, String>,
    alias_values: HashSet<String>,
    unique_counter: u32,

    pub used_clamp_helper: bool,
}

impl<'a> Session<'a> {
    pub fn new(stage: ShaderStage, config: &'a Config) -> Self {
        Self {
            config,
            stage,
            diags: Vec::new(),
            line: 1,
            structs: StructTable::new(),
            globals: Vec::new(),
            global_precisions: Vec::new(),
            scopes: Vec::new(),
            attributes: Vec::new(),
            uniforms: Vec::new(),
            varyings: Vec::new(),
            functions: HashMap::new(),
            call_edges: HashMap::new(),
            current_function: None,
            registry: BuiltinRegistry::for_stage(stage, config),
            extensions_enabled: ExtensionSet::EMPTY,
            aliases: HashMap::new(),
            alias_values: HashSet::new(),
            unique_counter: 0,
            used_clamp_helper: false,
        }
    }

    /// Clears all per-run state so the session can validate another unit
    /// of the same stage.
    pub fn reset(&mut self) {
        let stage = self.stage;
        let config = self.config;
        *self = Session::new(stage, config);
    }

    // -----------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------

    pub fn set_line(&mut self, line: u32) {
        if line > 0 {
            self.line = line;
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diags.push(Diagnostic::error(kind, self.line, message));
    }

    pub fn warning(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.diags
            .push(Diagnostic::warning(kind, self.line, message));
    }

    pub fn has_errors(&self) -> bool {
        self.diags
            .iter()
            .any(|d| d.severity == essl_ast::Severity::Error)
    }

    // -----------------------------------------------------------------
    // Scopes
    // -----------------------------------------------------------------

    /// Pushes a frame. A return type may only be attached to the outermost
    /// frame of a function body.
    pub fn enter_scope(&mut self, return_type: Option<Type>) {
        debug_assert!(return_type.is_none() || self.scopes.is_empty());
        self.scopes.push(ScopeFrame {
            return_type,
            ..ScopeFrame::default()
        });
    }

    pub fn leave_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn scope_level(&self) -> usize {
        self.scopes.len()
    }

    /// Return type of the enclosing function body, if inside one.
    pub fn function_return_type(&self) -> Option<&Type> {
        self.scopes.first().and_then(|f| f.return_type.as_ref())
    }

    // -----------------------------------------------------------------
    // Variable bindings
    // -----------------------------------------------------------------

    /// Binds into the current scope, or the global scope when no function
    /// scope is open.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        storage: StorageQualifier,
        read_only: bool,
    ) {
        let binding = VarBinding {
            name: name.into(),
            ty,
            storage,
            read_only,
            value: None,
        };
        match self.scopes.last_mut() {
            Some(frame) => frame.vars.push(binding),
            None => self.globals.push(binding),
        }
    }

    fn deref_alias<'s>(&'s self, name: &'s str) -> &'s str {
        for frame in self.scopes.iter().rev() {
            for (old, new) in frame.aliases.iter().rev() {
                if old == name {
                    return new;
                }
            }
        }
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Innermost-first binding lookup, dereferencing aliases first.
    pub fn lookup_var_binding(&self, name: &str) -> Option<&VarBinding> {
        let name = self.deref_alias(name);
        for frame in self.scopes.iter().rev() {
            if let Some(binding) = frame.vars.iter().rev().find(|b| b.name == name) {
                return Some(binding);
            }
        }
        self.globals.iter().rev().find(|b| b.name == name)
    }

    pub fn lookup_var_binding_mut(&mut self, name: &str) -> Option<&mut VarBinding> {
        let name = self.deref_alias(name).to_owned();
        for frame in self.scopes.iter_mut().rev() {
            if let Some(binding) = frame.vars.iter_mut().rev().find(|b| b.name == name) {
                return Some(binding);
            }
        }
        self.globals.iter_mut().rev().find(|b| b.name == name)
    }

    /// Type of a variable, falling through scopes, globals, then builtin
    /// variables.
    pub fn lookup_var_type(&self, name: &str) -> Option<Type> {
        if let Some(binding) = self.lookup_var_binding(name) {
            return Some(binding.ty.clone());
        }
        let name = self.deref_alias(name);
        match self.registry.lookup(name, self.extensions_enabled) {
            Lookup::Hit(cands) => cands.iter().find_map(|b| match b {
                Builtin::Var(var) => Some(self.concretize(var.ty.clone())),
                Builtin::Fun(_) => None,
            }),
            _ => None,
        }
    }

    /// Whether `name` is bound in the innermost open scope (or among the
    /// globals when none is open); used for duplicate detection.
    pub fn bound_in_current_scope(&self, name: &str) -> bool {
        match self.scopes.last() {
            Some(frame) => frame.vars.iter().any(|b| b.name == name),
            None => self.globals.iter().any(|b| b.name == name),
        }
    }

    // -----------------------------------------------------------------
    // Aliases
    // -----------------------------------------------------------------

    /// Scoped rename; local aliases shadow the program-level map.
    pub fn add_alias(&mut self, old: impl Into<String>, new: impl Into<String>) {
        let (old, new) = (old.into(), new.into());
        self.alias_values.insert(new.clone());
        match self.scopes.last_mut() {
            Some(frame) => frame.aliases.push((old, new)),
            None => {
                self.aliases.insert(old, new);
            }
        }
    }

    /// Content-stable generated name for a program-global identifier: the
    /// same source name yields the same alias in both linked stages.
    pub fn stable_alias(&mut self, name: &str) -> String {
        let mut candidate = format!("{GENERATED_PREFIX}_h{:016x}", fnv1a64(name.as_bytes()));
        let mut salt = 0u32;
        while self.alias_values.contains(&candidate) {
            salt += 1;
            candidate = format!(
                "{GENERATED_PREFIX}_h{:016x}_{salt}",
                fnv1a64(name.as_bytes())
            );
        }
        candidate
    }

    /// Per-run generated name for a local identifier.
    pub fn unique_alias(&mut self) -> String {
        let n = self.unique_counter;
        self.unique_counter += 1;
        format!("{GENERATED_PREFIX}_{n}")
    }

    // -----------------------------------------------------------------
    // Attributes / uniforms / varyings
    // -----------------------------------------------------------------

    pub fn add_attribute(&mut self, name: impl Into<String>, ty: Type, line: u32) {
        self.attributes.push(VarRecord {
            name: name.into(),
            ty,
            precision: Precision::None,
            line,
            usages: 0,
        });
    }

    pub fn add_uniform(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        precision: Precision,
        line: u32,
    ) {
        self.uniforms.push(VarRecord {
            name: name.into(),
            ty,
            precision,
            line,
            usages: 0,
        });
    }

    pub fn add_varying(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        precision: Precision,
        line: u32,
    ) {
        self.varyings.push(VarRecord {
            name: name.into(),
            ty,
            precision,
            line,
            usages: 0,
        });
    }

    pub fn lookup_uniform(&mut self, name: &str, record_use: bool) -> Option<&VarRecord> {
        Self::lookup_record(&mut self.uniforms, name, record_use)
    }

    pub fn lookup_varying(&mut self, name: &str, record_use: bool) -> Option<&VarRecord> {
        Self::lookup_record(&mut self.varyings, name, record_use)
    }

    pub fn lookup_attribute(&mut self, name: &str, record_use: bool) -> Option<&VarRecord> {
        Self::lookup_record(&mut self.attributes, name, record_use)
    }

    fn lookup_record<'r>(
        records: &'r mut [VarRecord],
        name: &str,
        record_use: bool,
    ) -> Option<&'r VarRecord> {
        let record = records.iter_mut().find(|r| r.name == name)?;
        if record_use {
            record.usages += 1;
        }
        Some(&*record)
    }

    // -----------------------------------------------------------------
    // Struct types
    // -----------------------------------------------------------------

    /// Registers a struct type under its tag.
    pub fn add_struct_type(&mut self, name: &str, ty: Type) {
        if self.structs.contains_key(name) {
            self.error(
                DiagnosticKind::DuplicateName,
                format!("struct '{name}' is already defined"),
            );
        } else {
            self.structs.insert(name.to_owned(), ty);
        }
    }

    pub fn lookup_struct(&self, name: &str) -> Option<&Type> {
        self.structs.get(name)
    }

    // -----------------------------------------------------------------
    // Functions and the call graph
    // -----------------------------------------------------------------

    /// Inserts a declaration into `name`'s overload set, diagnosing
    /// duplicate/conflicting overloads and builtin collisions.
    pub fn add_function(&mut self, name: &str, sig: FunctionSig) {
        if self.conflicts_with_builtin(name, &sig.params) {
            self.error(
                DiagnosticKind::BuiltinOverloadConflict,
                format!("function '{name}' conflicts with a builtin of the same signature"),
            );
            return;
        }
        let data = self.functions.entry(name.to_owned()).or_default();
        let mut clashed = false;
        for existing in &data.sigs {
            if existing.params.len() != sig.params.len() {
                continue;
            }
            let same_params = existing
                .params
                .iter()
                .zip(&sig.params)
                .all(|(a, b)| types::same_type(a, b, true));
            if !same_params {
                continue;
            }
            let same_return = types::same_type(&existing.return_type, &sig.return_type, true);
            if !same_return {
                clashed = true;
                self.diags.push(Diagnostic::error(
                    DiagnosticKind::MismatchedOverload,
                    sig.line,
                    format!("function '{name}' redeclared with a different return type"),
                ));
                break;
            }
            // Identical signature: a prototype followed by exactly one
            // definition is fine, anything else is a duplicate.
            if existing.is_proto != sig.is_proto {
                continue;
            }
            clashed = true;
            self.diags.push(Diagnostic::error(
                DiagnosticKind::DuplicateOverload,
                sig.line,
                format!("function '{name}' redefined with an identical signature"),
            ));
            break;
        }
        if !clashed {
            if !sig.is_proto {
                data.has_definition = true;
            }
            data.sigs.push(sig);
        }
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionData> {
        self.functions.get(self.deref_alias(name))
    }

    fn conflicts_with_builtin(&self, name: &str, params: &[Type]) -> bool {
        let Lookup::Hit(cands) = self.registry.lookup(name, self.extensions_enabled) else {
            // A user signature may not shadow a gated builtin either.
            return self.registry.contains(name);
        };
        cands.iter().any(|b| match b {
            Builtin::Var(_) => true,
            Builtin::Fun(fun) => {
                fun.args.len() == params.len()
                    && fun.args.iter().zip(params).all(|(cat, ty)| cat.matches(ty))
            }
        })
    }

    /// Marks entry into a function body for call-graph recording.
    pub fn set_current_function(&mut self, name: Option<String>) {
        self.current_function = name;
    }

    pub fn current_function(&self) -> Option<&str> {
        self.current_function.as_deref()
    }

    /// Records a call-graph edge from the function currently being
    /// validated.
    pub fn add_function_call(&mut self, callee: &str) {
        if let Some(current) = &self.current_function {
            let edges = self.call_edges.entry(current.clone()).or_default();
            if !edges.iter().any(|c| c == callee) {
                edges.push(callee.to_owned());
            }
        }
    }

    /// Outgoing call edges recorded for `name`.
    pub fn function_calls(&self, name: &str) -> &[String] {
        self.call_edges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Explicit DFS with a visited set over function identities; direct or
    /// indirect cycles are reported by the caller as `RecursionError`.
    pub fn calls_transitively(&self, from: &str, target: &str) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from.to_owned()];
        while let Some(fun) = stack.pop() {
            if !visited.insert(fun.clone()) {
                continue;
            }
            for callee in self.function_calls(&fun) {
                if callee == target {
                    return true;
                }
                stack.push(callee.clone());
            }
        }
        false
    }

    /// Whether a `main` definition was seen.
    pub fn has_main(&self) -> bool {
        self.functions
            .get("main")
            .is_some_and(|data| data.has_definition)
    }

    // -----------------------------------------------------------------
    // Precision defaults
    // -----------------------------------------------------------------

    /// Registers a scoped `precision` statement.
    pub fn add_precision(&mut self, ty: Type, precision: Precision) {
        match self.scopes.last_mut() {
            Some(frame) => frame.precisions.push((ty, precision)),
            None => self.global_precisions.push((ty, precision)),
        }
    }

    /// Innermost default precision for a type, if any scope declares one.
    pub fn lookup_precision(&self, ty: &Type) -> Precision {
        for frame in self.scopes.iter().rev() {
            for (t, p) in frame.precisions.iter().rev() {
                if types::same_type(t, ty, true) {
                    return *p;
                }
            }
        }
        for (t, p) in self.global_precisions.iter().rev() {
            if types::same_type(t, ty, true) {
                return *p;
            }
        }
        Precision::None
    }

    /// True if any global default precision exists for `float`.
    pub fn has_global_float_precision(&self) -> bool {
        self.global_precisions
            .iter()
            .any(|(t, _)| matches!(t.inner, TypeInner::Scalar(essl_ast::ScalarKind::Float)))
    }

    // -----------------------------------------------------------------
    // Builtins
    // -----------------------------------------------------------------

    pub fn lookup_builtin(&self, name: &str) -> Lookup<'_> {
        self.registry.lookup(name, self.extensions_enabled)
    }

    pub fn is_builtin_name(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Substitutes configuration limits for symbolic array sizes.
    pub fn concretize(&self, mut ty: Type) -> Type {
        if let TypeInner::Array { size, .. } = &mut ty.inner {
            if let ArraySize::Symbolic(key) = size {
                if let Some(limit) = self.config.limit(key) {
                    *size = ArraySize::Constant(limit);
                }
            }
        }
        ty
    }
}

/// 64-bit FNV-1a over a byte string; the alias derivation only needs to be
/// deterministic across translation units, not cryptographic.
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Identifiers reserved by the HLSL targets; user identifiers colliding
/// with these are aliased when generating HLSL.
pub fn is_hlsl_reserved(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "asm", "bool2", "bool3", "bool4", "cbuffer", "column_major", "compile", "discard",
        "double", "dword", "extern", "float2", "float3", "float4", "float2x2", "float3x3",
        "float4x4", "half", "half2", "half3", "half4", "inline", "int2", "int3", "int4", "lerp",
        "linear", "matrix", "mul", "namespace", "nointerpolation", "noperspective", "pass",
        "pixelshader", "point", "precise", "register", "row_major", "sampler", "sampler1D",
        "sampler3D", "sampler_state", "SamplerState", "shared", "stateblock", "static", "string",
        "switch", "tbuffer", "technique", "texture", "Texture1D", "Texture2D", "Texture3D",
        "TextureCube", "typedef", "uniform", "uint2", "uint3", "uint4", "vector", "vertexshader",
        "volatile",
    ];
    RESERVED.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use essl_ast::VectorSize;

    fn session(config: &Config) -> Session<'_> {
        Session::new(ShaderStage::Vertex, config)
    }

    #[test]
    fn inner_bindings_shadow_outer() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.add_variable("x", Type::float(), StorageQualifier::None, false);
        sess.enter_scope(None);
        sess.add_variable("x", Type::int(), StorageQualifier::None, false);
        assert!(types::same_type(
            &sess.lookup_var_type("x").unwrap(),
            &Type::int(),
            true
        ));
        sess.leave_scope();
        assert!(types::same_type(
            &sess.lookup_var_type("x").unwrap(),
            &Type::float(),
            true
        ));
    }

    #[test]
    fn alias_consulted_before_direct_lookup() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.add_variable("renamed", Type::float(), StorageQualifier::None, false);
        sess.add_alias("original", "renamed");
        assert!(sess.lookup_var_binding("original").is_some());
    }

    #[test]
    fn duplicate_overload_detected() {
        let config = Config::default();
        let mut sess = session(&config);
        let sig = FunctionSig {
            return_type: Type::float(),
            params: vec![Type::float()],
            param_dirs: vec![ParamDirection::In],
            is_proto: false,
            line: 1,
        };
        sess.add_function("f", sig.clone());
        sess.add_function("f", sig);
        assert!(sess
            .diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::DuplicateOverload));
    }

    #[test]
    fn mismatched_overload_detected() {
        let config = Config::default();
        let mut sess = session(&config);
        let sig = FunctionSig {
            return_type: Type::float(),
            params: vec![Type::float()],
            param_dirs: vec![ParamDirection::In],
            is_proto: true,
            line: 1,
        };
        sess.add_function("f", sig.clone());
        sess.add_function(
            "f",
            FunctionSig {
                return_type: Type::int(),
                ..sig
            },
        );
        assert!(sess
            .diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::MismatchedOverload));
    }

    #[test]
    fn prototype_then_definition_is_allowed() {
        let config = Config::default();
        let mut sess = session(&config);
        let proto = FunctionSig {
            return_type: Type::float(),
            params: vec![Type::float()],
            param_dirs: vec![ParamDirection::In],
            is_proto: true,
            line: 1,
        };
        sess.add_function("f", proto.clone());
        sess.add_function(
            "f",
            FunctionSig {
                is_proto: false,
                line: 2,
                ..proto
            },
        );
        assert!(sess.diags.is_empty(), "{:?}", sess.diags);
        assert_eq!(sess.lookup_function("f").unwrap().sigs.len(), 2);
    }

    #[test]
    fn builtin_signature_conflict() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.add_function(
            "sin",
            FunctionSig {
                return_type: Type::float(),
                params: vec![Type::float()],
                param_dirs: vec![ParamDirection::In],
                is_proto: false,
                line: 1,
            },
        );
        assert!(sess
            .diags
            .iter()
            .any(|d| d.kind == DiagnosticKind::BuiltinOverloadConflict));
    }

    #[test]
    fn call_graph_cycle_detection() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.set_current_function(Some("a".into()));
        sess.add_function_call("b");
        sess.set_current_function(Some("b".into()));
        sess.add_function_call("c");
        sess.set_current_function(Some("c".into()));
        sess.add_function_call("a");
        assert!(sess.calls_transitively("b", "a"));
        assert!(sess.calls_transitively("a", "a"));
        assert!(!sess.calls_transitively("a", "missing"));
    }

    #[test]
    fn precision_scoping() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.add_precision(Type::float(), Precision::Medium);
        sess.enter_scope(None);
        sess.add_precision(Type::float(), Precision::High);
        assert_eq!(sess.lookup_precision(&Type::float()), Precision::High);
        sess.leave_scope();
        assert_eq!(sess.lookup_precision(&Type::float()), Precision::Medium);
        assert_eq!(sess.lookup_precision(&Type::int()), Precision::None);
    }

    #[test]
    fn stable_alias_is_deterministic() {
        let config = Config::default();
        let mut s1 = session(&config);
        let mut s2 = Session::new(ShaderStage::Fragment, &config);
        assert_eq!(s1.stable_alias("myUniform"), s2.stable_alias("myUniform"));
        assert_ne!(s1.stable_alias("a"), s1.stable_alias("b"));
    }

    #[test]
    fn usage_counting() {
        let config = Config::default();
        let mut sess = session(&config);
        sess.add_uniform("u", Type::float(), Precision::None, 1);
        sess.lookup_uniform("u", true);
        sess.lookup_uniform("u", true);
        sess.lookup_uniform("u", false);
        assert_eq!(sess.uniforms[0].usages, 2);
    }

    #[test]
    fn symbolic_sizes_concretize_from_config() {
        let config = Config {
            max_draw_buffers: 4,
            ..Config::default()
        };
        let sess = Session::new(ShaderStage::Fragment, &config);
        let ty = Type::array(
            Type::vec(VectorSize::Quad),
            ArraySize::Symbolic("gl_MaxDrawBuffers".into()),
        );
        let concrete = sess.concretize(ty);
        assert!(matches!(
            concrete.inner,
            TypeInner::Array {
                size: ArraySize::Constant(4),
                ..
            }
        ));
    }
}
