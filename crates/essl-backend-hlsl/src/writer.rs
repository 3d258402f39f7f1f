//! GLSL-ES → HLSL translation of one shader stage.
//!
//! The writer re-encodes GLSL semantics HLSL lacks natively: `mod` and the
//! vector-widening intrinsic overloads become generated helpers, vector
//! relational builtins become componentwise operators, texture lookups with
//! bias/lod/projection become helpers, matrix products become `mul` with
//! swapped operands, and swizzle letter families are normalized to xyzw.
//! Attributes, varyings and fragment outputs travel through generated
//! input/output structs with pipeline semantics assigned by declaration
//! order.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use essl_ast::{
    ArraySize, AssignOp, BinaryOp, Block, Decl, Expr, FunctionProto, Handle, Literal,
    ParamDirection, PostOp, SamplerKind, ScalarKind, Stmt, StorageQualifier, TranslationUnit,
    Type, TypeInner, UnaryOp, VarDecl, VarDeclList,
};
use essl_backend_core::BackendError;
use essl_validate::{ExtensionSet, ShaderStage, ShaderVariableSet, CLAMP_HELPER};

use crate::helpers::{Helper, HelperSet};

/// Everything the writer needs to emit one stage.
pub struct WriterInput<'a> {
    pub stage: ShaderStage,
    pub unit: &'a TranslationUnit,
    pub types: &'a [Option<Type>],
    pub variables: &'a ShaderVariableSet,
    pub aliases: &'a HashMap<String, String>,
    pub extensions: ExtensionSet,
    pub uses_clamp_helper: bool,
    pub dx10: bool,
    pub max_draw_buffers: u32,
    /// Whether the linked vertex stage writes `gl_PointSize` (keeps the
    /// two stages' interface structs identical).
    pub include_point_size: bool,
}

const VS_IN: &str = "essl_VSInput";
const VS_OUT: &str = "essl_VSOutput";
const PS_OUT: &str = "essl_PSOutput";
const IN_VAR: &str = "essl_in";
const OUT_VAR: &str = "essl_out";
const CBUFFER: &str = "essl_uniforms";
const HALF_PIXEL: &str = "essl_half_pixel";
const DEPTH_RANGE: &str = "essl_depth_range";
const FRAG_DATA_FIELD: &str = "essl_frag_data_";
const INDENT: &str = "    ";

/// Emits one stage as HLSL source.
pub fn emit_stage(input: &WriterInput<'_>) -> Result<String, BackendError> {
    let mut writer = HlslWriter {
        input,
        out: String::new(),
        indent: 0,
        helpers: HelperSet::EMPTY,
        used_builtins: collect_builtin_uses(input.unit),
        texcoord_counter: 0,
        errors: Vec::new(),
    };
    let text = writer.run()?;
    if let Some(first) = writer.errors.first() {
        return Err(BackendError::Unsupported(first.clone()));
    }
    Ok(text)
}

/// Builtin `gl_*` identifiers referenced anywhere in the unit.
fn collect_builtin_uses(unit: &TranslationUnit) -> HashSet<String> {
    let mut used = HashSet::new();
    for (_, expr) in unit.exprs.iter() {
        if let Expr::Var(name) = expr {
            if name.starts_with("gl_") {
                used.insert(name.clone());
            }
        }
    }
    used
}

struct HlslWriter<'a> {
    input: &'a WriterInput<'a>,
    out: String,
    indent: usize,
    helpers: HelperSet,
    used_builtins: HashSet<String>,
    texcoord_counter: u32,
    errors: Vec<String>,
}

impl<'a> HlslWriter<'a> {
    fn run(&mut self) -> Result<String, BackendError> {
        if self.input.uses_clamp_helper {
            self.helpers.insert(Helper::ClampIndex);
        }

        // Struct type declarations come first: uniforms may use them.
        let mut structs = String::new();
        for decl in &self.input.unit.decls {
            if let Decl::Struct { name, fields, .. } = decl {
                self.struct_decl(&mut structs, name, fields);
            }
        }

        // The translated body is built before final assembly so the helper
        // bitmap is complete by the time helpers are emitted.
        let body = self.body_text();

        let mut text = String::new();
        for ext in self.input.extensions.iter() {
            let _ = writeln!(text, "#define {} 1", ext.define());
        }
        text.push_str(&structs);
        self.uniform_section(&mut text);
        self.io_structs(&mut text);
        for helper in self.helpers.iter() {
            text.push_str(&helper.source(self.input.dx10));
            text.push('\n');
        }
        match self.input.stage {
            ShaderStage::Vertex => {
                let _ = writeln!(text, "static {VS_IN} {IN_VAR};");
                let _ = writeln!(text, "static {VS_OUT} {OUT_VAR};");
            }
            ShaderStage::Fragment => {
                let _ = writeln!(text, "static {VS_OUT} {IN_VAR};");
                let _ = writeln!(text, "static {PS_OUT} {OUT_VAR};");
            }
        }
        text.push_str(&body);
        Ok(text)
    }

    fn body_text(&mut self) -> String {
        let saved = std::mem::take(&mut self.out);
        for decl in &self.input.unit.decls {
            match decl {
                Decl::Precision { .. } | Decl::Struct { .. } | Decl::Invariant { .. } => {}
                Decl::Variable(list) => self.global_var_decl(list),
                Decl::Prototype(proto) => {
                    if proto.name != "main" {
                        self.function_signature(proto);
                        self.out.push_str(";\n");
                    }
                }
                Decl::Function { proto, body } => {
                    if proto.name == "main" {
                        self.main_wrapper(body);
                    } else {
                        self.function_signature(proto);
                        self.out.push(' ');
                        self.block(body);
                        self.out.push('\n');
                    }
                }
            }
        }
        std::mem::replace(&mut self.out, saved)
    }

    // -----------------------------------------------------------------
    // Sections
    // -----------------------------------------------------------------

    fn uniform_section(&mut self, text: &mut String) {
        let samplers: Vec<_> = self
            .input
            .variables
            .uniforms()
            .iter()
            .filter(|v| v.ty.is_sampler())
            .cloned()
            .collect();
        let plain: Vec<_> = self
            .input
            .variables
            .uniforms()
            .iter()
            .filter(|v| !v.ty.is_sampler())
            .cloned()
            .collect();

        let needs_half_pixel =
            !self.input.dx10 && self.input.stage == ShaderStage::Vertex;
        let needs_depth_range = self.used_builtins.contains("gl_DepthRange");

        if self.input.dx10 {
            let _ = writeln!(text, "cbuffer {CBUFFER} : register(b0)");
            text.push_str("{\n");
            if needs_depth_range {
                let _ = writeln!(text, "{INDENT}float3 {DEPTH_RANGE};");
            }
            for var in &plain {
                text.push_str(INDENT);
                let name = self.exported_name(&var.name);
                self.typed_decl(text, &var.ty, &name);
                text.push_str(";\n");
            }
            text.push_str("};\n");
        } else {
            if needs_half_pixel {
                let _ = writeln!(text, "float2 {HALF_PIXEL};");
            }
            if needs_depth_range {
                let _ = writeln!(text, "float3 {DEPTH_RANGE};");
            }
            for var in &plain {
                let name = self.exported_name(&var.name);
                self.typed_decl(text, &var.ty, &name);
                text.push_str(";\n");
            }
        }

        for var in &samplers {
            let name = self.exported_name(&var.name);
            let ty = self.type_name(&var.ty);
            let _ = writeln!(text, "{ty} {name};");
            if self.input.dx10 {
                let _ = writeln!(text, "SamplerState {name}Sampler;");
            }
        }
    }

    fn io_structs(&mut self, text: &mut String) {
        if self.input.stage == ShaderStage::Vertex {
            self.texcoord_counter = 0;
            let _ = writeln!(text, "struct {VS_IN}");
            text.push_str("{\n");
            for var in self.input.variables.attributes() {
                let name = self.exported_name(&var.name);
                text.push_str(INDENT);
                self.typed_decl(text, &var.ty, &name);
                let idx = self.next_texcoord();
                let _ = writeln!(text, " : TEXCOORD{idx};");
            }
            text.push_str("};\n");
        }

        // The vertex-output/pixel-input struct is emitted for both stages
        // and must agree field for field.
        self.texcoord_counter = 0;
        let _ = writeln!(text, "struct {VS_OUT}");
        text.push_str("{\n");
        let position = if self.input.dx10 {
            "SV_Position"
        } else {
            "POSITION0"
        };
        let _ = writeln!(text, "{INDENT}float4 gl_Position : {position};");
        if self.input.include_point_size {
            let _ = writeln!(text, "{INDENT}float gl_PointSize : PSIZE0;");
        }
        for var in self.input.variables.varyings() {
            let name = self.exported_name(&var.name);
            text.push_str(INDENT);
            self.typed_decl(text, &var.ty, &name);
            let idx = self.next_texcoord();
            let _ = writeln!(text, " : TEXCOORD{idx};");
        }
        text.push_str("};\n");

        if self.input.stage == ShaderStage::Fragment {
            let _ = writeln!(text, "struct {PS_OUT}");
            text.push_str("{\n");
            if self.used_builtins.contains("gl_FragData") {
                for i in 0..self.input.max_draw_buffers {
                    let semantic = self.color_semantic(i);
                    let _ =
                        writeln!(text, "{INDENT}float4 {FRAG_DATA_FIELD}{i} : {semantic};");
                }
            } else {
                let semantic = self.color_semantic(0);
                let _ = writeln!(text, "{INDENT}float4 gl_FragColor : {semantic};");
            }
            text.push_str("};\n");
        }
    }

    fn color_semantic(&self, index: u32) -> String {
        if self.input.dx10 {
            format!("SV_Target{index}")
        } else {
            format!("COLOR{index}")
        }
    }

    fn next_texcoord(&mut self) -> u32 {
        let idx = self.texcoord_counter;
        self.texcoord_counter += 1;
        idx
    }

    fn struct_decl(&mut self, text: &mut String, name: &str, fields: &[essl_ast::StructField]) {
        let name = self.exported_name(name);
        let _ = writeln!(text, "struct {name}");
        text.push_str("{\n");
        for field in fields {
            text.push_str(INDENT);
            self.typed_decl(text, &field.ty, &field.name);
            text.push_str(";\n");
        }
        text.push_str("};\n");
    }

    // -----------------------------------------------------------------
    // Main wrappers
    // -----------------------------------------------------------------

    fn main_wrapper(&mut self, body: &Block) {
        match self.input.stage {
            ShaderStage::Vertex => {
                let _ = write!(
                    self.out,
                    "{VS_OUT} essl_main_vs({VS_IN} essl_vertex_input)\n{{\n"
                );
                let _ = writeln!(self.out, "{INDENT}{IN_VAR} = essl_vertex_input;");
                self.indent = 1;
                for stmt in body {
                    self.newline();
                    self.stmt(stmt);
                }
                self.indent = 0;
                self.out.push('\n');
                self.position_fixup();
                let _ = writeln!(self.out, "{INDENT}return {OUT_VAR};");
                self.out.push_str("}\n");
            }
            ShaderStage::Fragment => {
                let _ = write!(
                    self.out,
                    "{PS_OUT} essl_main_ps({VS_OUT} essl_fragment_input"
                );
                if self.used_builtins.contains("gl_FragCoord") {
                    let semantic = if self.input.dx10 { "SV_Position" } else { "VPOS" };
                    let _ = write!(self.out, ", float4 gl_FragCoord : {semantic}");
                }
                if self.used_builtins.contains("gl_PointCoord") {
                    let semantic = if self.input.dx10 { "SV_Position" } else { "VPOS" };
                    let _ = write!(self.out, ", float4 gl_PointCoord : {semantic}");
                }
                if self.used_builtins.contains("gl_FrontFacing") {
                    if self.input.dx10 {
                        let _ = write!(self.out, ", bool gl_FrontFacing : SV_IsFrontFace");
                    } else {
                        let _ = write!(self.out, ", float essl_vface : VFACE");
                    }
                }
                self.out.push_str(")\n{\n");
                let _ = writeln!(self.out, "{INDENT}{IN_VAR} = essl_fragment_input;");
                self.indent = 1;
                for stmt in body {
                    self.newline();
                    self.stmt(stmt);
                }
                self.indent = 0;
                self.out.push('\n');
                let _ = writeln!(self.out, "{INDENT}return {OUT_VAR};");
                self.out.push_str("}\n");
            }
        }
    }

    /// GL clip space → D3D clip space: flip y (with the DX9 half-pixel
    /// offset) and remap z from [-w, w] to [0, w].
    fn position_fixup(&mut self) {
        let p = format!("{OUT_VAR}.gl_Position");
        if self.input.dx10 {
            let _ = writeln!(self.out, "{INDENT}{p}.y = -{p}.y;");
        } else {
            let _ = writeln!(
                self.out,
                "{INDENT}{p}.x = {p}.x - {HALF_PIXEL}.x * {p}.w;"
            );
            let _ = writeln!(
                self.out,
                "{INDENT}{p}.y = -({p}.y - {HALF_PIXEL}.y * {p}.w);"
            );
        }
        let _ = writeln!(self.out, "{INDENT}{p}.z = 0.5 * ({p}.z + {p}.w);");
    }

    // -----------------------------------------------------------------
    // Declarations and statements
    // -----------------------------------------------------------------

    fn global_var_decl(&mut self, list: &VarDeclList) {
        match list.qualifier {
            StorageQualifier::Attribute
            | StorageQualifier::Uniform
            | StorageQualifier::Varying => {} // emitted via structs/cbuffer
            StorageQualifier::Const => {
                for decl in &list.decls {
                    self.out.push_str("static const ");
                    self.var_decl(decl);
                    self.out.push_str(";\n");
                }
            }
            StorageQualifier::None => {
                // Unqualified globals are externally invisible and writable
                // in GLSL; HLSL needs 'static' for the same meaning.
                for decl in &list.decls {
                    self.out.push_str("static ");
                    self.var_decl(decl);
                    self.out.push_str(";\n");
                }
            }
        }
    }

    fn var_decl(&mut self, decl: &VarDecl) {
        let name = self.exported_name(&decl.name);
        let mut prefix = String::new();
        self.typed_decl(&mut prefix, &decl.ty, &name);
        self.out.push_str(&prefix);
        if let Some(init) = decl.init {
            self.out.push_str(" = ");
            self.expr(init, 1);
        }
    }

    /// `float3 name` / `float name[4]` style declaration text.
    fn typed_decl(&mut self, text: &mut String, ty: &Type, name: &str) {
        if let TypeInner::Array { base, size } = &ty.inner {
            let base_name = self.type_name(base);
            let _ = write!(text, "{base_name} {name}[");
            match size {
                ArraySize::Constant(n) => {
                    let _ = write!(text, "{n}");
                }
                _ => self.errors.push(format!(
                    "array '{name}' has no concrete size at code generation"
                )),
            }
            text.push(']');
        } else {
            let ty_name = self.type_name(ty);
            let _ = write!(text, "{ty_name} {name}");
        }
    }

    fn type_name(&mut self, ty: &Type) -> String {
        match &ty.inner {
            TypeInner::Void => "void".into(),
            TypeInner::Scalar(ScalarKind::Float) => "float".into(),
            TypeInner::Scalar(ScalarKind::Int) => "int".into(),
            TypeInner::Scalar(ScalarKind::UInt) => "uint".into(),
            TypeInner::Scalar(ScalarKind::Bool) => "bool".into(),
            TypeInner::Vector { size, kind } => {
                let base = match kind {
                    ScalarKind::Float => "float",
                    ScalarKind::Int => "int",
                    ScalarKind::UInt => "uint",
                    ScalarKind::Bool => "bool",
                };
                format!("{base}{}", size.len())
            }
            TypeInner::Matrix { cols, rows } => format!("float{}x{}", cols.len(), rows.len()),
            TypeInner::Sampler(SamplerKind::Sampler2D) => {
                if self.input.dx10 {
                    "Texture2D".into()
                } else {
                    "sampler2D".into()
                }
            }
            TypeInner::Sampler(SamplerKind::SamplerCube) => {
                if self.input.dx10 {
                    "TextureCube".into()
                } else {
                    "samplerCUBE".into()
                }
            }
            TypeInner::Struct { name, .. } | TypeInner::Named(name) => self.exported_name(name),
            TypeInner::Array { .. } => {
                self.errors
                    .push("nested array type in code generation".into());
                "float".into()
            }
        }
    }

    fn function_signature(&mut self, proto: &FunctionProto) {
        let ret = self.type_name(&proto.return_type);
        let name = self.exported_name(&proto.name);
        let _ = write!(self.out, "{ret} {name}(");
        for (i, param) in proto.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            match param.direction {
                ParamDirection::In => {}
                ParamDirection::Out => self.out.push_str("out "),
                ParamDirection::InOut => self.out.push_str("inout "),
            }
            let pname = param
                .name
                .as_deref()
                .map(|n| self.exported_name(n))
                .unwrap_or_default();
            let mut text = String::new();
            self.typed_decl(&mut text, &param.ty, &pname);
            self.out.push_str(&text);
        }
        self.out.push(')');
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn block(&mut self, body: &Block) {
        self.out.push('{');
        self.indent += 1;
        for stmt in body {
            self.newline();
            self.stmt(stmt);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Empty => self.out.push(';'),
            Stmt::Expr { expr, .. } => {
                self.expr(*expr, 0);
                self.out.push(';');
            }
            Stmt::Decl(list) => {
                for (i, decl) in list.decls.iter().enumerate() {
                    if i > 0 {
                        self.newline();
                    }
                    if list.qualifier == StorageQualifier::Const {
                        self.out.push_str("const ");
                    }
                    self.var_decl(decl);
                    self.out.push(';');
                }
            }
            Stmt::Compound { body, .. } => self.block(body),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.out.push_str("if (");
                self.expr(*cond, 0);
                self.out.push_str(") ");
                self.stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.out.push_str(" else ");
                    self.stmt(else_branch);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.out.push_str("while (");
                self.expr(*cond, 0);
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::DoWhile { body, cond, .. } => {
                self.out.push_str("do ");
                self.stmt(body);
                self.out.push_str(" while (");
                self.expr(*cond, 0);
                self.out.push_str(");");
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
                ..
            } => {
                self.out.push_str("for (");
                self.stmt(init);
                self.out.push(' ');
                if let Some(cond) = cond {
                    self.expr(*cond, 0);
                }
                self.out.push_str("; ");
                if let Some(update) = update {
                    self.expr(*update, 0);
                }
                self.out.push_str(") ");
                self.stmt(body);
            }
            Stmt::Return { value, .. } => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(*value, 1);
                }
                self.out.push(';');
            }
            Stmt::Break { .. } => self.out.push_str("break;"),
            Stmt::Continue { .. } => self.out.push_str("continue;"),
            Stmt::Discard { .. } => self.out.push_str("discard;"),
        }
    }

    // -----------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------

    /// Alias-resolved spelling of a user identifier.
    fn exported_name(&self, name: &str) -> String {
        self.input
            .aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }

    /// Spelling of an identifier at an expression use site, routing
    /// attributes/varyings/builtins through the generated structs.
    fn value_name(&mut self, name: &str) -> String {
        match name {
            "gl_Position" | "gl_PointSize" => return format!("{OUT_VAR}.{name}"),
            "gl_FragColor" => return format!("{OUT_VAR}.gl_FragColor"),
            "gl_FragCoord" => return name.into(),
            "gl_PointCoord" => return "(gl_PointCoord.xy)".into(),
            "gl_FrontFacing" => {
                return if self.input.dx10 {
                    name.into()
                } else {
                    "(essl_vface >= 0.0)".into()
                };
            }
            "gl_DepthRange" => return DEPTH_RANGE.into(),
            "gl_FragData" => {
                // Reachable only through indexing, which is handled at the
                // index site.
                return format!("{OUT_VAR}.{FRAG_DATA_FIELD}0");
            }
            _ => {}
        }
        let exported = self.exported_name(name);
        if self.input.stage == ShaderStage::Vertex {
            if self.input.variables.find_attribute(name).is_some() {
                return format!("{IN_VAR}.{exported}");
            }
            if self.input.variables.find_varying(name).is_some() {
                return format!("{OUT_VAR}.{exported}");
            }
        } else if self.input.variables.find_varying(name).is_some() {
            return format!("{IN_VAR}.{exported}");
        }
        exported
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn ty_of(&self, handle: Handle<Expr>) -> Option<&'a Type> {
        self.input.types.get(handle.index()).and_then(Option::as_ref)
    }

    fn binary_prec(op: BinaryOp) -> u8 {
        match op {
            BinaryOp::Or => 3,
            BinaryOp::Xor => 4,
            BinaryOp::And => 5,
            BinaryOp::Equal | BinaryOp::NotEqual => 6,
            BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => 7,
            BinaryOp::Add | BinaryOp::Sub => 8,
            BinaryOp::Mul | BinaryOp::Div => 9,
        }
    }

    fn expr_prec(&self, handle: Handle<Expr>) -> u8 {
        match &self.input.unit.exprs[handle] {
            Expr::Seq { .. } => 0,
            Expr::Assign { .. } => 1,
            Expr::Cond { .. } => 2,
            Expr::Binary { op, .. } => Self::binary_prec(*op),
            Expr::Unary { .. } => 10,
            _ => 11,
        }
    }

    fn expr(&mut self, handle: Handle<Expr>, min_prec: u8) {
        let prec = self.expr_prec(handle);
        let rewritten = matches!(
            &self.input.unit.exprs[handle],
            Expr::Call { .. } | Expr::Construct { .. } | Expr::Binary { .. }
        );
        // Rewritten forms manage their own bracketing.
        let parens = prec < min_prec && !rewritten;
        if parens {
            self.out.push('(');
        }
        let unit = self.input.unit;
        match &unit.exprs[handle] {
            Expr::Literal(lit) => self.literal(*lit),
            Expr::Var(name) => {
                let spelled = self.value_name(name);
                self.out.push_str(&spelled);
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Construct { ty, args } => self.construct(ty, args),
            Expr::Index { base, index } => self.index(*base, *index),
            Expr::Select { base, field } => self.select(*base, field),
            Expr::Unary { op, expr } => {
                self.out.push_str(match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Negate => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::PreInc => "++",
                    UnaryOp::PreDec => "--",
                });
                self.expr(*expr, 10);
            }
            Expr::Post { op, expr } => {
                self.expr(*expr, 11);
                self.out.push_str(match op {
                    PostOp::Inc => "++",
                    PostOp::Dec => "--",
                });
            }
            Expr::Binary { op, left, right } => self.binary(*op, *left, *right, min_prec),
            Expr::Cond {
                cond,
                accept,
                reject,
            } => {
                self.expr(*cond, 3);
                self.out.push_str(" ? ");
                self.expr(*accept, 2);
                self.out.push_str(" : ");
                self.expr(*reject, 2);
            }
            Expr::Assign { op, target, value } => {
                self.expr(*target, 11);
                self.out.push_str(match op {
                    AssignOp::Assign => " = ",
                    AssignOp::Add => " += ",
                    AssignOp::Sub => " -= ",
                    AssignOp::Mul => " *= ",
                    AssignOp::Div => " /= ",
                });
                self.expr(*value, 1);
            }
            Expr::Seq { first, second } => {
                self.expr(*first, 1);
                self.out.push_str(", ");
                self.expr(*second, 1);
            }
        }
        if parens {
            self.out.push(')');
        }
    }

    fn literal(&mut self, lit: Literal) {
        match lit {
            Literal::Bool(b) => {
                let _ = write!(self.out, "{b}");
            }
            Literal::Int(i) => {
                let _ = write!(self.out, "{i}");
            }
            Literal::UInt(u) => {
                let _ = write!(self.out, "{u}u");
            }
            Literal::Float(v) => {
                self.out
                    .push_str(&essl_ast::display::float_literal(v));
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: Handle<Expr>, right: Handle<Expr>, min_prec: u8) {
        match op {
            BinaryOp::Mul => {
                let involves_matrix = self.ty_of(left).is_some_and(Type::is_matrix)
                    || self.ty_of(right).is_some_and(Type::is_matrix);
                if involves_matrix {
                    // Swap instead of transposing: (AᵀBᵀ)ᵀ = BA, and HLSL
                    // interprets vector operands by position.
                    self.out.push_str("mul(");
                    self.expr(right, 1);
                    self.out.push_str(", ");
                    self.expr(left, 1);
                    self.out.push(')');
                    return;
                }
            }
            BinaryOp::Xor => {
                // No logical ^^ in HLSL; bools compare unequal instead.
                self.out.push_str("((");
                self.expr(left, 0);
                self.out.push_str(") != (");
                self.expr(right, 0);
                self.out.push_str("))");
                return;
            }
            _ => {}
        }
        let prec = Self::binary_prec(op);
        let parens = prec < min_prec;
        if parens {
            self.out.push('(');
        }
        self.expr(left, prec);
        let _ = write!(
            self.out,
            " {} ",
            match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Equal => "==",
                BinaryOp::NotEqual => "!=",
                BinaryOp::Less => "<",
                BinaryOp::LessEqual => "<=",
                BinaryOp::Greater => ">",
                BinaryOp::GreaterEqual => ">=",
                BinaryOp::And => "&&",
                BinaryOp::Or => "||",
                BinaryOp::Xor => unreachable!("handled above"),
            }
        );
        self.expr(right, prec + 1);
        if parens {
            self.out.push(')');
        }
    }

    fn index(&mut self, base: Handle<Expr>, index: Handle<Expr>) {
        if let Expr::Var(name) = &self.input.unit.exprs[base] {
            if name == "gl_FragData" {
                match &self.input.unit.exprs[index] {
                    Expr::Literal(Literal::Int(i)) => {
                        let _ = write!(self.out, "{OUT_VAR}.{FRAG_DATA_FIELD}{i}");
                    }
                    _ => self
                        .errors
                        .push("gl_FragData index must be a literal constant".into()),
                }
                return;
            }
        }
        self.expr(base, 11);
        self.out.push('[');
        self.expr(index, 0);
        self.out.push(']');
    }

    fn select(&mut self, base: Handle<Expr>, field: &str) {
        let is_vector = self.ty_of(base).map(Type::is_vector).unwrap_or_else(|| {
            field.len() <= 4 && field.chars().all(|c| "xyzwrgbastpq".contains(c))
        });
        self.expr(base, 11);
        self.out.push('.');
        if is_vector {
            // Normalize rgba/stpq selector letters to xyzw.
            for c in field.chars() {
                self.out.push(match c {
                    'r' | 's' => 'x',
                    'g' | 't' => 'y',
                    'b' | 'p' => 'z',
                    'a' | 'q' => 'w',
                    other => other,
                });
            }
        } else {
            self.out.push_str(field);
        }
    }

    fn args(&mut self, args: &[Handle<Expr>]) {
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(*arg, 1);
        }
        self.out.push(')');
    }

    fn helper_call(&mut self, helper: Helper, args: &[Handle<Expr>]) {
        self.helpers.insert(helper);
        self.out.push_str(helper.name());
        self.args(args);
    }

    fn vec_width(&self, handle: Handle<Expr>) -> Option<u32> {
        match self.ty_of(handle)?.inner {
            TypeInner::Vector { size, .. } => Some(size.len()),
            _ => None,
        }
    }

    fn is_scalar_arg(&self, handle: Handle<Expr>) -> bool {
        self.ty_of(handle).map(Type::is_scalar).unwrap_or(false)
    }

    fn call(&mut self, callee: &str, args: &[Handle<Expr>]) {
        if args.is_empty() {
            // Only user functions can be nullary; the specialized arms
            // below all index their arguments.
            let name = self.exported_name(callee);
            self.plain_call(&name, args);
            return;
        }
        match callee {
            "fract" => self.plain_call("frac", args),
            "inversesqrt" => self.plain_call("rsqrt", args),
            "atan" if args.len() == 2 => self.plain_call("atan2", args),
            "dFdx" => self.plain_call("ddx", args),
            "dFdy" => self.plain_call("ddy", args),
            "mix" => {
                if let (Some(width), true) = (
                    self.vec_width(args[0]),
                    args.len() == 3 && self.is_scalar_arg(args[2]),
                ) {
                    self.helper_call(Helper::sized(Helper::LerpFVec2, width), args);
                } else {
                    self.plain_call("lerp", args);
                }
            }
            "mod" if args.len() == 2 => {
                if let (Some(width), true) = (self.vec_width(args[0]), self.is_scalar_arg(args[1]))
                {
                    self.helper_call(Helper::sized(Helper::ModFVec2, width), args);
                } else {
                    // GLSL mod floors; HLSL fmod truncates, so spell it out.
                    self.out.push('(');
                    self.expr(args[0], 9);
                    self.out.push_str(" - ");
                    self.expr(args[1], 9);
                    self.out.push_str(" * floor(");
                    self.expr(args[0], 9);
                    self.out.push_str(" / ");
                    self.expr(args[1], 10);
                    self.out.push_str("))");
                }
            }
            "min" | "max" if args.len() == 2 => {
                if let (Some(width), true) = (self.vec_width(args[0]), self.is_scalar_arg(args[1]))
                {
                    let base = if callee == "min" {
                        Helper::MinFVec2
                    } else {
                        Helper::MaxFVec2
                    };
                    self.helper_call(Helper::sized(base, width), args);
                } else {
                    self.plain_call(callee, args);
                }
            }
            "clamp" if args.len() == 3 => {
                if let (Some(width), true) = (self.vec_width(args[0]), self.is_scalar_arg(args[1]))
                {
                    self.helper_call(Helper::sized(Helper::ClampFVec2, width), args);
                } else {
                    self.plain_call(callee, args);
                }
            }
            "step" if args.len() == 2 => {
                if let (true, Some(width)) = (self.is_scalar_arg(args[0]), self.vec_width(args[1]))
                {
                    self.helper_call(Helper::sized(Helper::StepFVec2, width), args);
                } else {
                    self.plain_call(callee, args);
                }
            }
            "smoothstep" if args.len() == 3 => {
                if let (true, Some(width)) = (self.is_scalar_arg(args[0]), self.vec_width(args[2]))
                {
                    self.helper_call(Helper::sized(Helper::SmoothStepFVec2, width), args);
                } else {
                    self.plain_call(callee, args);
                }
            }
            "matrixCompMult" => {
                let cols = match self.ty_of(args[0]).map(|t| &t.inner) {
                    Some(TypeInner::Matrix { cols, .. }) => cols.len(),
                    _ => 4,
                };
                self.helper_call(Helper::sized(Helper::MatCompMult2, cols), args);
            }
            "lessThan" | "lessThanEqual" | "greaterThan" | "greaterThanEqual" => {
                let op = match callee {
                    "lessThan" => "<",
                    "lessThanEqual" => "<=",
                    "greaterThan" => ">",
                    _ => ">=",
                };
                self.out.push('(');
                self.expr(args[0], 8);
                let _ = write!(self.out, " {op} ");
                self.expr(args[1], 8);
                self.out.push(')');
            }
            "equal" | "notEqual" => {
                let kind = self
                    .ty_of(args[0])
                    .and_then(Type::element_kind)
                    .unwrap_or(ScalarKind::Float);
                let width = self.vec_width(args[0]).unwrap_or(4);
                let base = match kind {
                    ScalarKind::Bool => Helper::EqualBVec2,
                    ScalarKind::Int | ScalarKind::UInt => Helper::EqualIVec2,
                    ScalarKind::Float => Helper::EqualFVec2,
                };
                if callee == "notEqual" {
                    self.out.push_str("(!");
                    self.helper_call(Helper::sized(base, width), args);
                    self.out.push(')');
                } else {
                    self.helper_call(Helper::sized(base, width), args);
                }
            }
            "not" => {
                self.out.push_str("(!(");
                self.expr(args[0], 0);
                self.out.push_str("))");
            }
            "texture2D" | "texture2DProj" | "texture2DLod" | "texture2DProjLod"
            | "textureCube" | "textureCubeLod" => self.texture_call(callee, args),
            _ => {
                // User function, the clamp helper, or a builtin with a
                // same-named HLSL intrinsic.
                let name = if callee == CLAMP_HELPER {
                    self.helpers.insert(Helper::ClampIndex);
                    callee.to_owned()
                } else {
                    self.exported_name(callee)
                };
                self.out.push_str(&name);
                self.args(args);
            }
        }
    }

    fn plain_call(&mut self, name: &str, args: &[Handle<Expr>]) {
        self.out.push_str(name);
        self.args(args);
    }

    /// Texture lookups: plain forms map to `tex2D`/`texCUBE` (or `Sample`
    /// on DX10); biased, leveled and projective forms go through helpers.
    fn texture_call(&mut self, callee: &str, args: &[Handle<Expr>]) {
        let coord_width = args.get(1).and_then(|a| self.vec_width(*a)).unwrap_or(2);
        let has_extra = args.len() == 3;
        let helper = match callee {
            "texture2D" if has_extra => Some(Helper::Tex2DBias),
            "texture2D" => None,
            "texture2DProj" => Some(match (coord_width, has_extra) {
                (3, false) => Helper::Tex2DProj3,
                (3, true) => Helper::Tex2DProj3Bias,
                (_, false) => Helper::Tex2DProj4,
                (_, true) => Helper::Tex2DProj4Bias,
            }),
            "texture2DLod" => Some(Helper::Tex2DLod),
            "texture2DProjLod" => Some(if coord_width == 3 {
                Helper::Tex2DProj3Lod
            } else {
                Helper::Tex2DProj4Lod
            }),
            "textureCube" if has_extra => Some(Helper::TexCubeBias),
            "textureCube" => None,
            "textureCubeLod" => Some(Helper::TexCubeLod),
            _ => None,
        };

        let sampler_name = match &self.input.unit.exprs[args[0]] {
            Expr::Var(name) => Some(self.exported_name(name)),
            _ => None,
        };
        if self.input.dx10 && sampler_name.is_none() {
            self.errors
                .push(format!("'{callee}' requires a named sampler on this target"));
            return;
        }

        match helper {
            None => {
                if self.input.dx10 {
                    let name = sampler_name.expect("checked above");
                    let _ = write!(self.out, "{name}.Sample({name}Sampler, ");
                    self.expr(args[1], 1);
                    self.out.push(')');
                } else {
                    let intrinsic = if callee.starts_with("textureCube") {
                        "texCUBE"
                    } else {
                        "tex2D"
                    };
                    self.plain_call(intrinsic, args);
                }
            }
            Some(helper) => {
                self.helpers.insert(helper);
                self.out.push_str(helper.name());
                self.out.push('(');
                if self.input.dx10 {
                    let name = sampler_name.expect("checked above");
                    let _ = write!(self.out, "{name}, {name}Sampler");
                } else {
                    self.expr(args[0], 1);
                }
                for arg in &args[1..] {
                    self.out.push_str(", ");
                    self.expr(*arg, 1);
                }
                self.out.push(')');
            }
        }
    }

    fn construct(&mut self, ty: &Type, args: &[Handle<Expr>]) {
        match &ty.inner {
            TypeInner::Scalar(_) => {
                let name = self.type_name(ty);
                if args.len() == 1 && self.is_scalar_arg(args[0]) {
                    let _ = write!(self.out, "(({name})(");
                    self.expr(args[0], 0);
                    self.out.push_str("))");
                } else if args.len() == 1 {
                    // Wider argument: take its first component.
                    let _ = write!(self.out, "(({name})((");
                    self.expr(args[0], 0);
                    self.out.push_str(").x))");
                } else {
                    self.errors
                        .push("malformed scalar constructor survived validation".into());
                }
            }
            TypeInner::Vector { size, .. } => {
                let name = self.type_name(ty);
                let want = size.len();
                if args.len() == 1 && self.is_scalar_arg(args[0]) {
                    let _ = write!(self.out, "(({name})(");
                    self.expr(args[0], 0);
                    self.out.push_str("))");
                    return;
                }
                if args.len() == 1 {
                    if let Some(width) = self.vec_width(args[0]) {
                        if width > want {
                            let swizzle = &"xyzw"[..want as usize];
                            let _ = write!(self.out, "{name}((");
                            self.expr(args[0], 0);
                            let _ = write!(self.out, ").{swizzle})");
                            return;
                        }
                    }
                }
                self.out.push_str(&name);
                self.args(args);
            }
            TypeInner::Matrix { cols, .. } => {
                let name = self.type_name(ty);
                let dst = cols.len();
                if args.len() == 1 && self.is_scalar_arg(args[0]) {
                    // Scalar seeds the diagonal.
                    let identity = match dst {
                        2 => "(1.0, 0.0, 0.0, 1.0)",
                        3 => "(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0)",
                        _ => "(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0)",
                    };
                    self.out.push_str("((");
                    self.expr(args[0], 0);
                    let _ = write!(self.out, ") * {name}{identity})");
                    return;
                }
                if args.len() == 1 {
                    if let Some(TypeInner::Matrix { cols: src, .. }) =
                        self.ty_of(args[0]).map(|t| &t.inner)
                    {
                        let src = src.len();
                        if dst <= src {
                            let _ = write!(self.out, "(({name})(");
                            self.expr(args[0], 0);
                            self.out.push_str("))");
                        } else {
                            let helper = match (src, dst) {
                                (2, 3) => Helper::Mat2ToMat3,
                                (2, 4) => Helper::Mat2ToMat4,
                                _ => Helper::Mat3ToMat4,
                            };
                            self.helper_call(helper, args);
                        }
                        return;
                    }
                }
                self.out.push_str(&name);
                self.args(args);
            }
            TypeInner::Struct { name, .. } | TypeInner::Named(name) => {
                // HLSL has no struct constructors; emit the function-call
                // form and let a wrapping pass or target reject it.
                let spelled = self.exported_name(name);
                self.errors.push(format!(
                    "constructor of struct '{spelled}' cannot be expressed in HLSL"
                ));
                self.out.push_str(&spelled);
                self.args(args);
            }
            _ => {
                self.errors
                    .push("unsupported constructor in code generation".into());
            }
        }
    }
}
