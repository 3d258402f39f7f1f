//! Recursive-descent parser for the GLSL-ES subset.
//!
//! Produces a [`TranslationUnit`]. Syntax errors accumulate as diagnostics
//! and parsing recovers at declaration/statement granularity, so a single
//! mistake does not hide the rest of the program.

use std::collections::HashSet;

use essl_ast::{
    ArraySize, AssignOp, BinaryOp, Block, Decl, Diagnostic, DiagnosticKind, Expr, FunctionProto,
    Handle, Literal, Param, ParamDirection, PostOp, Precision, SamplerKind, ScalarKind, Stmt,
    StorageQualifier, StructField, TranslationUnit, Type, TypeInner, UnaryOp, VarDecl,
    VarDeclList, VectorSize,
};

use crate::lexer::{Kw, SpannedTok, Tok};

/// Hard bound on expression/statement nesting; hostile input beyond this is
/// rejected instead of overflowing the parser stack.
const MAX_DEPTH: u32 = 256;

struct Parser {
    toks: Vec<SpannedTok>,
    pos: usize,
    unit: TranslationUnit,
    diags: Vec<Diagnostic>,
    struct_names: HashSet<String>,
    depth: u32,
    last_line: u32,
}

type PResult<T> = Result<T, ()>;

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|t| &t.tok)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.toks.get(self.pos + 1).map(|t| &t.tok)
    }

    fn line(&self) -> u32 {
        self.toks
            .get(self.pos)
            .map(|t| t.line)
            .unwrap_or(self.last_line)
    }

    fn bump(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if let Some(t) = &t {
            self.last_line = t.line;
            self.pos += 1;
        }
        t.map(|t| t.tok)
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == Some(tok)
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        let line = self.line();
        self.diags
            .push(Diagnostic::error(DiagnosticKind::SyntaxError, line, message));
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> PResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            self.error(format!("expected {what}"));
            Err(())
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<String> {
        match self.peek() {
            Some(Tok::Ident(_)) => match self.bump() {
                Some(Tok::Ident(name)) => Ok(name),
                _ => unreachable!(),
            },
            _ => {
                self.error(format!("expected {what}"));
                Err(())
            }
        }
    }

    /// Skips ahead to a likely declaration/statement boundary.
    fn synchronize(&mut self) {
        let mut brace_depth = 0i32;
        while let Some(tok) = self.peek() {
            match tok {
                Tok::Semicolon if brace_depth <= 0 => {
                    self.pos += 1;
                    return;
                }
                Tok::LBrace => {
                    brace_depth += 1;
                    self.pos += 1;
                }
                Tok::RBrace => {
                    brace_depth -= 1;
                    self.pos += 1;
                    if brace_depth <= 0 {
                        return;
                    }
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------

    fn builtin_type(name: &str) -> Option<TypeInner> {
        Some(match name {
            "void" => TypeInner::Void,
            "float" => TypeInner::Scalar(ScalarKind::Float),
            "int" => TypeInner::Scalar(ScalarKind::Int),
            "uint" => TypeInner::Scalar(ScalarKind::UInt),
            "bool" => TypeInner::Scalar(ScalarKind::Bool),
            "vec2" => vector(ScalarKind::Float, VectorSize::Bi),
            "vec3" => vector(ScalarKind::Float, VectorSize::Tri),
            "vec4" => vector(ScalarKind::Float, VectorSize::Quad),
            "ivec2" => vector(ScalarKind::Int, VectorSize::Bi),
            "ivec3" => vector(ScalarKind::Int, VectorSize::Tri),
            "ivec4" => vector(ScalarKind::Int, VectorSize::Quad),
            "uvec2" => vector(ScalarKind::UInt, VectorSize::Bi),
            "uvec3" => vector(ScalarKind::UInt, VectorSize::Tri),
            "uvec4" => vector(ScalarKind::UInt, VectorSize::Quad),
            "bvec2" => vector(ScalarKind::Bool, VectorSize::Bi),
            "bvec3" => vector(ScalarKind::Bool, VectorSize::Tri),
            "bvec4" => vector(ScalarKind::Bool, VectorSize::Quad),
            "mat2" => matrix(VectorSize::Bi),
            "mat3" => matrix(VectorSize::Tri),
            "mat4" => matrix(VectorSize::Quad),
            "sampler2D" => TypeInner::Sampler(SamplerKind::Sampler2D),
            "samplerCube" => TypeInner::Sampler(SamplerKind::SamplerCube),
            _ => return None,
        })
    }

    fn precision_qualifier(&mut self) -> Precision {
        match self.peek() {
            Some(Tok::Kw(Kw::Highp)) => {
                self.pos += 1;
                Precision::High
            }
            Some(Tok::Kw(Kw::Mediump)) => {
                self.pos += 1;
                Precision::Medium
            }
            Some(Tok::Kw(Kw::Lowp)) => {
                self.pos += 1;
                Precision::Low
            }
            _ => Precision::None,
        }
    }

    /// True if the current token begins a type specifier.
    fn at_type(&self) -> bool {
        match self.peek() {
            Some(Tok::Kw(Kw::Highp | Kw::Mediump | Kw::Lowp | Kw::Struct)) => true,
            Some(Tok::Ident(name)) => {
                Self::builtin_type(name).is_some() || self.struct_names.contains(name)
            }
            _ => false,
        }
    }

    fn parse_type(&mut self) -> PResult<Type> {
        let precision = self.precision_qualifier();
        let inner = match self.peek().cloned() {
            Some(Tok::Ident(name)) => {
                if let Some(inner) = Self::builtin_type(&name) {
                    self.pos += 1;
                    inner
                } else if self.struct_names.contains(&name) {
                    self.pos += 1;
                    TypeInner::Named(name)
                } else {
                    self.error(format!("unknown type '{name}'"));
                    return Err(());
                }
            }
            _ => {
                self.error("expected type");
                return Err(());
            }
        };
        Ok(Type { precision, inner })
    }

    /// Optional `[expr]` array suffix wrapped around `base`.
    fn array_suffix(&mut self, base: Type) -> PResult<Type> {
        if !self.eat(&Tok::LBracket) {
            return Ok(base);
        }
        if self.eat(&Tok::RBracket) {
            return Ok(Type::array(base, ArraySize::Unsized));
        }
        let size = self.parse_cond()?;
        self.expect(&Tok::RBracket, "']' after array size")?;
        Ok(Type::array(base, ArraySize::Expr(size)))
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.error("expression nests too deeply");
            return Err(());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn add(&mut self, expr: Expr) -> Handle<Expr> {
        self.unit.exprs.append(expr)
    }

    /// Full expression, including the comma operator.
    fn parse_expr(&mut self) -> PResult<Handle<Expr>> {
        let mut first = self.parse_assign()?;
        while self.eat(&Tok::Comma) {
            let second = self.parse_assign()?;
            first = self.add(Expr::Seq { first, second });
        }
        Ok(first)
    }

    fn parse_assign(&mut self) -> PResult<Handle<Expr>> {
        self.enter()?;
        let result = (|| {
            let target = self.parse_cond()?;
            let op = match self.peek() {
                Some(Tok::Assign) => AssignOp::Assign,
                Some(Tok::PlusEq) => AssignOp::Add,
                Some(Tok::MinusEq) => AssignOp::Sub,
                Some(Tok::StarEq) => AssignOp::Mul,
                Some(Tok::SlashEq) => AssignOp::Div,
                _ => return Ok(target),
            };
            self.pos += 1;
            let value = self.parse_assign()?;
            Ok(self.add(Expr::Assign { op, target, value }))
        })();
        self.leave();
        result
    }

    fn parse_cond(&mut self) -> PResult<Handle<Expr>> {
        self.enter()?;
        let result = (|| {
            let cond = self.parse_binary(0)?;
            if !self.eat(&Tok::Question) {
                return Ok(cond);
            }
            let accept = self.parse_expr()?;
            self.expect(&Tok::Colon, "':' in conditional expression")?;
            let reject = self.parse_assign()?;
            Ok(self.add(Expr::Cond {
                cond,
                accept,
                reject,
            }))
        })();
        self.leave();
        result
    }

    fn binary_op(tok: &Tok) -> Option<(BinaryOp, u8)> {
        Some(match tok {
            Tok::OrOr => (BinaryOp::Or, 0),
            Tok::XorXor => (BinaryOp::Xor, 1),
            Tok::AndAnd => (BinaryOp::And, 2),
            Tok::Eq => (BinaryOp::Equal, 3),
            Tok::NotEq => (BinaryOp::NotEqual, 3),
            Tok::Lt => (BinaryOp::Less, 4),
            Tok::Le => (BinaryOp::LessEqual, 4),
            Tok::Gt => (BinaryOp::Greater, 4),
            Tok::Ge => (BinaryOp::GreaterEqual, 4),
            Tok::Plus => (BinaryOp::Add, 5),
            Tok::Minus => (BinaryOp::Sub, 5),
            Tok::Star => (BinaryOp::Mul, 6),
            Tok::Slash => (BinaryOp::Div, 6),
            _ => return None,
        })
    }

    /// Precedence-climbing over the binary operator levels.
    fn parse_binary(&mut self, min_level: u8) -> PResult<Handle<Expr>> {
        self.enter()?;
        let result = (|| {
            let mut left = self.parse_unary()?;
            while let Some((op, level)) = self.peek().and_then(Self::binary_op) {
                if level < min_level {
                    break;
                }
                self.pos += 1;
                let right = self.parse_binary(level + 1)?;
                left = self.add(Expr::Binary { op, left, right });
            }
            Ok(left)
        })();
        self.leave();
        result
    }

    fn parse_unary(&mut self) -> PResult<Handle<Expr>> {
        self.enter()?;
        let result = (|| {
            let op = match self.peek() {
                Some(Tok::Plus) => Some(UnaryOp::Plus),
                Some(Tok::Minus) => Some(UnaryOp::Negate),
                Some(Tok::Bang) => Some(UnaryOp::Not),
                Some(Tok::Inc) => Some(UnaryOp::PreInc),
                Some(Tok::Dec) => Some(UnaryOp::PreDec),
                _ => None,
            };
            if let Some(op) = op {
                self.pos += 1;
                let expr = self.parse_unary()?;
                return Ok(self.add(Expr::Unary { op, expr }));
            }
            self.parse_postfix()
        })();
        self.leave();
        result
    }

    fn parse_postfix(&mut self) -> PResult<Handle<Expr>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Tok::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    self.expect(&Tok::RBracket, "']' after index")?;
                    expr = self.add(Expr::Index { base: expr, index });
                }
                Some(Tok::Dot) => {
                    self.pos += 1;
                    let field = self.expect_ident("field name after '.'")?;
                    expr = self.add(Expr::Select { base: expr, field });
                }
                Some(Tok::Inc) => {
                    self.pos += 1;
                    expr = self.add(Expr::Post {
                        op: PostOp::Inc,
                        expr,
                    });
                }
                Some(Tok::Dec) => {
                    self.pos += 1;
                    expr = self.add(Expr::Post {
                        op: PostOp::Dec,
                        expr,
                    });
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_args(&mut self) -> PResult<Vec<Handle<Expr>>> {
        // Past the '('.
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        // A lone 'void' argument list means "no arguments".
        if let Some(Tok::Ident(name)) = self.peek() {
            if name == "void" && self.peek2() == Some(&Tok::RParen) {
                self.pos += 2;
                return Ok(args);
            }
        }
        loop {
            args.push(self.parse_assign()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::RParen, "')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Handle<Expr>> {
        match self.peek().cloned() {
            Some(Tok::Int(v)) => {
                self.pos += 1;
                if !(i32::MIN as i64..=u32::MAX as i64).contains(&v) {
                    self.error("integer literal out of range");
                    return Err(());
                }
                Ok(self.add(Expr::Literal(Literal::Int(v as i32))))
            }
            Some(Tok::UInt(v)) => {
                self.pos += 1;
                if v > u32::MAX as u64 {
                    self.error("unsigned literal out of range");
                    return Err(());
                }
                Ok(self.add(Expr::Literal(Literal::UInt(v as u32))))
            }
            Some(Tok::Float(v)) => {
                self.pos += 1;
                Ok(self.add(Expr::Literal(Literal::Float(v))))
            }
            Some(Tok::Kw(Kw::True)) => {
                self.pos += 1;
                Ok(self.add(Expr::Literal(Literal::Bool(true))))
            }
            Some(Tok::Kw(Kw::False)) => {
                self.pos += 1;
                Ok(self.add(Expr::Literal(Literal::Bool(false))))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(expr)
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                let is_type =
                    Self::builtin_type(&name).is_some() || self.struct_names.contains(&name);
                if is_type {
                    // Type constructor; 'void(..)' and samplers are rejected
                    // later by the validator.
                    let inner = Self::builtin_type(&name)
                        .unwrap_or_else(|| TypeInner::Named(name.clone()));
                    self.expect(&Tok::LParen, "'(' after type constructor")?;
                    let args = self.parse_args()?;
                    Ok(self.add(Expr::Construct {
                        ty: Type::new(inner),
                        args,
                    }))
                } else if self.eat(&Tok::LParen) {
                    let args = self.parse_args()?;
                    Ok(self.add(Expr::Call { callee: name, args }))
                } else {
                    Ok(self.add(Expr::Var(name)))
                }
            }
            _ => {
                self.error("expected expression");
                Err(())
            }
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    /// True when a statement position starts a declaration.
    fn at_local_decl(&self) -> bool {
        match self.peek() {
            Some(Tok::Kw(Kw::Const | Kw::Highp | Kw::Mediump | Kw::Lowp | Kw::Struct)) => true,
            Some(Tok::Ident(name)) => {
                let is_type =
                    Self::builtin_type(name).is_some() || self.struct_names.contains(name);
                // "vec4(..)" at statement start is a constructor expression,
                // not a declaration.
                is_type && matches!(self.peek2(), Some(Tok::Ident(_)))
            }
            _ => false,
        }
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        self.enter()?;
        let result = self.parse_stmt_inner();
        self.leave();
        result
    }

    fn parse_stmt_inner(&mut self) -> PResult<Stmt> {
        let line = self.line();
        match self.peek() {
            Some(Tok::Semicolon) => {
                self.pos += 1;
                Ok(Stmt::Empty)
            }
            Some(Tok::LBrace) => {
                self.pos += 1;
                let body = self.parse_block()?;
                Ok(Stmt::Compound { body, line })
            }
            Some(Tok::Kw(Kw::If)) => {
                self.pos += 1;
                self.expect(&Tok::LParen, "'(' after 'if'")?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen, "')' after condition")?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.eat(&Tok::Kw(Kw::Else)) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    line,
                })
            }
            Some(Tok::Kw(Kw::While)) => {
                self.pos += 1;
                self.expect(&Tok::LParen, "'(' after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen, "')' after condition")?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::While { cond, body, line })
            }
            Some(Tok::Kw(Kw::Do)) => {
                self.pos += 1;
                let body = Box::new(self.parse_stmt()?);
                self.expect(&Tok::Kw(Kw::While), "'while' after do-body")?;
                self.expect(&Tok::LParen, "'(' after 'while'")?;
                let cond = self.parse_expr()?;
                self.expect(&Tok::RParen, "')' after condition")?;
                self.expect(&Tok::Semicolon, "';' after do-while")?;
                Ok(Stmt::DoWhile { body, cond, line })
            }
            Some(Tok::Kw(Kw::For)) => {
                self.pos += 1;
                self.expect(&Tok::LParen, "'(' after 'for'")?;
                let init = if self.at(&Tok::Semicolon) {
                    self.pos += 1;
                    Box::new(Stmt::Empty)
                } else if self.at_local_decl() {
                    Box::new(Stmt::Decl(self.parse_local_decl()?))
                } else {
                    let expr = self.parse_expr()?;
                    self.expect(&Tok::Semicolon, "';' in for header")?;
                    Box::new(Stmt::Expr { expr, line })
                };
                let cond = if self.at(&Tok::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::Semicolon, "';' in for header")?;
                let update = if self.at(&Tok::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::RParen, "')' after for header")?;
                let body = Box::new(self.parse_stmt()?);
                Ok(Stmt::For {
                    init,
                    cond,
                    update,
                    body,
                    line,
                })
            }
            Some(Tok::Kw(Kw::Return)) => {
                self.pos += 1;
                let value = if self.at(&Tok::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(&Tok::Semicolon, "';' after return")?;
                Ok(Stmt::Return { value, line })
            }
            Some(Tok::Kw(Kw::Break)) => {
                self.pos += 1;
                self.expect(&Tok::Semicolon, "';' after 'break'")?;
                Ok(Stmt::Break { line })
            }
            Some(Tok::Kw(Kw::Continue)) => {
                self.pos += 1;
                self.expect(&Tok::Semicolon, "';' after 'continue'")?;
                Ok(Stmt::Continue { line })
            }
            Some(Tok::Kw(Kw::Discard)) => {
                self.pos += 1;
                self.expect(&Tok::Semicolon, "';' after 'discard'")?;
                Ok(Stmt::Discard { line })
            }
            _ if self.at_local_decl() => Ok(Stmt::Decl(self.parse_local_decl()?)),
            Some(_) => {
                let expr = self.parse_expr()?;
                self.expect(&Tok::Semicolon, "';' after expression")?;
                Ok(Stmt::Expr { expr, line })
            }
            None => {
                self.error("unexpected end of input");
                Err(())
            }
        }
    }

    fn parse_block(&mut self) -> PResult<Block> {
        // Past the '{'.
        let mut body = Block::new();
        loop {
            if self.eat(&Tok::RBrace) {
                return Ok(body);
            }
            if self.peek().is_none() {
                self.error("unexpected end of input in block");
                return Err(());
            }
            match self.parse_stmt() {
                Ok(stmt) => body.push(stmt),
                Err(()) => self.synchronize(),
            }
        }
    }

    // -----------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------

    fn storage_qualifier(&mut self) -> StorageQualifier {
        match self.peek() {
            Some(Tok::Kw(Kw::Const)) => {
                self.pos += 1;
                StorageQualifier::Const
            }
            Some(Tok::Kw(Kw::Attribute)) => {
                self.pos += 1;
                StorageQualifier::Attribute
            }
            Some(Tok::Kw(Kw::Uniform)) => {
                self.pos += 1;
                StorageQualifier::Uniform
            }
            Some(Tok::Kw(Kw::Varying)) => {
                self.pos += 1;
                StorageQualifier::Varying
            }
            _ => StorageQualifier::None,
        }
    }

    fn parse_declarators(
        &mut self,
        qualifier: StorageQualifier,
        invariant: bool,
        base: Type,
        line: u32,
    ) -> PResult<VarDeclList> {
        let mut decls = Vec::new();
        loop {
            let name = self.expect_ident("declarator name")?;
            let ty = self.array_suffix(base.clone())?;
            let init = if self.eat(&Tok::Assign) {
                Some(self.parse_assign()?)
            } else {
                None
            };
            decls.push(VarDecl { name, ty, init });
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(&Tok::Semicolon, "';' after declaration")?;
        Ok(VarDeclList {
            qualifier,
            invariant,
            decls,
            line,
        })
    }

    fn parse_local_decl(&mut self) -> PResult<VarDeclList> {
        let line = self.line();
        let qualifier = self.storage_qualifier();
        let base = self.parse_type()?;
        self.parse_declarators(qualifier, false, base, line)
    }

    fn parse_struct(&mut self, line: u32) -> PResult<Decl> {
        // Past the 'struct' keyword.
        let name = self.expect_ident("struct name")?;
        self.expect(&Tok::LBrace, "'{' after struct name")?;
        let mut fields = Vec::new();
        while !self.eat(&Tok::RBrace) {
            if self.peek().is_none() {
                self.error("unexpected end of input in struct");
                return Err(());
            }
            let base = self.parse_type()?;
            loop {
                let field_name = self.expect_ident("field name")?;
                let ty = self.array_suffix(base.clone())?;
                fields.push(StructField {
                    name: field_name,
                    ty,
                });
                if !self.eat(&Tok::Comma) {
                    break;
                }
            }
            self.expect(&Tok::Semicolon, "';' after struct field")?;
        }
        self.struct_names.insert(name.clone());
        let instance = match self.peek() {
            Some(Tok::Ident(_)) => Some(self.expect_ident("instance name")?),
            _ => None,
        };
        self.expect(&Tok::Semicolon, "';' after struct declaration")?;
        Ok(Decl::Struct {
            name,
            fields,
            instance,
            line,
        })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let is_const = self.eat(&Tok::Kw(Kw::Const));
        let direction = match self.peek() {
            Some(Tok::Kw(Kw::In)) => {
                self.pos += 1;
                ParamDirection::In
            }
            Some(Tok::Kw(Kw::Out)) => {
                self.pos += 1;
                ParamDirection::Out
            }
            Some(Tok::Kw(Kw::InOut)) => {
                self.pos += 1;
                ParamDirection::InOut
            }
            _ => ParamDirection::In,
        };
        let base = self.parse_type()?;
        let name = match self.peek() {
            Some(Tok::Ident(_)) => Some(self.expect_ident("parameter name")?),
            _ => None,
        };
        let ty = self.array_suffix(base)?;
        Ok(Param {
            name,
            ty,
            direction,
            is_const,
        })
    }

    fn parse_function(&mut self, return_type: Type, name: String, line: u32) -> PResult<Decl> {
        // Past the '('.
        let mut params = Vec::new();
        if !self.eat(&Tok::RParen) {
            // A lone 'void' parameter list means "no parameters".
            let lone_void = matches!(self.peek(), Some(Tok::Ident(n)) if n == "void")
                && self.peek2() == Some(&Tok::RParen);
            if lone_void {
                self.pos += 2;
            } else {
                loop {
                    params.push(self.parse_param()?);
                    if !self.eat(&Tok::Comma) {
                        break;
                    }
                }
                self.expect(&Tok::RParen, "')' after parameters")?;
            }
        }
        let proto = FunctionProto {
            name,
            return_type,
            params,
            line,
        };
        if self.eat(&Tok::Semicolon) {
            Ok(Decl::Prototype(proto))
        } else if self.eat(&Tok::LBrace) {
            let body = self.parse_block()?;
            Ok(Decl::Function { proto, body })
        } else {
            self.error("expected ';' or function body");
            Err(())
        }
    }

    fn parse_top_decl(&mut self) -> PResult<Decl> {
        let line = self.line();
        match self.peek() {
            Some(Tok::Kw(Kw::Precision)) => {
                self.pos += 1;
                let precision = self.precision_qualifier();
                if precision == Precision::None {
                    self.error("expected precision qualifier");
                    return Err(());
                }
                let ty = self.parse_type()?;
                self.expect(&Tok::Semicolon, "';' after precision declaration")?;
                Ok(Decl::Precision {
                    precision,
                    ty,
                    line,
                })
            }
            Some(Tok::Kw(Kw::Struct)) => {
                self.pos += 1;
                self.parse_struct(line)
            }
            Some(Tok::Kw(Kw::Invariant)) => {
                self.pos += 1;
                if self.at(&Tok::Kw(Kw::Varying)) {
                    self.pos += 1;
                    let base = self.parse_type()?;
                    return Ok(Decl::Variable(self.parse_declarators(
                        StorageQualifier::Varying,
                        true,
                        base,
                        line,
                    )?));
                }
                // 'invariant name, ...;' re-declaration form.
                let mut names = vec![self.expect_ident("variable name after 'invariant'")?];
                while self.eat(&Tok::Comma) {
                    names.push(self.expect_ident("variable name")?);
                }
                self.expect(&Tok::Semicolon, "';' after invariant declaration")?;
                Ok(Decl::Invariant { names, line })
            }
            Some(Tok::Kw(Kw::Const | Kw::Attribute | Kw::Uniform | Kw::Varying)) => {
                let qualifier = self.storage_qualifier();
                let base = self.parse_type()?;
                Ok(Decl::Variable(
                    self.parse_declarators(qualifier, false, base, line)?,
                ))
            }
            Some(Tok::Semicolon) => {
                self.pos += 1;
                Ok(Decl::Variable(VarDeclList {
                    qualifier: StorageQualifier::None,
                    invariant: false,
                    decls: vec![],
                    line,
                }))
            }
            _ if self.at_type() => {
                let base = self.parse_type()?;
                let name = self.expect_ident("declarator or function name")?;
                if self.eat(&Tok::LParen) {
                    self.parse_function(base, name, line)
                } else {
                    // Re-join the already-consumed declarator name by hand.
                    let ty = self.array_suffix(base.clone())?;
                    let init = if self.eat(&Tok::Assign) {
                        Some(self.parse_assign()?)
                    } else {
                        None
                    };
                    let mut decls = vec![VarDecl { name, ty, init }];
                    while self.eat(&Tok::Comma) {
                        let name = self.expect_ident("declarator name")?;
                        let ty = self.array_suffix(base.clone())?;
                        let init = if self.eat(&Tok::Assign) {
                            Some(self.parse_assign()?)
                        } else {
                            None
                        };
                        decls.push(VarDecl { name, ty, init });
                    }
                    self.expect(&Tok::Semicolon, "';' after declaration")?;
                    Ok(Decl::Variable(VarDeclList {
                        qualifier: StorageQualifier::None,
                        invariant: false,
                        decls,
                        line,
                    }))
                }
            }
            Some(other) => {
                let msg = format!("unexpected token {other:?} at top level");
                self.error(msg);
                Err(())
            }
            None => Err(()),
        }
    }

    fn run(mut self) -> (TranslationUnit, Vec<Diagnostic>) {
        while self.peek().is_some() {
            match self.parse_top_decl() {
                Ok(decl) => {
                    // Empty stray-semicolon declarations are dropped.
                    let keep = !matches!(&decl, Decl::Variable(list) if list.decls.is_empty());
                    if keep {
                        self.unit.decls.push(decl);
                    }
                }
                Err(()) => self.synchronize(),
            }
        }
        (self.unit, self.diags)
    }
}

/// Parses a token stream into a translation unit.
pub fn parse_tokens(toks: Vec<SpannedTok>) -> (TranslationUnit, Vec<Diagnostic>) {
    Parser {
        toks,
        pos: 0,
        unit: TranslationUnit::default(),
        diags: Vec::new(),
        struct_names: HashSet::new(),
        depth: 0,
        last_line: 1,
    }
    .run()
}

fn vector(kind: ScalarKind, size: VectorSize) -> TypeInner {
    TypeInner::Vector { size, kind }
}

fn matrix(size: VectorSize) -> TypeInner {
    TypeInner::Matrix {
        cols: size,
        rows: size,
    }
}
