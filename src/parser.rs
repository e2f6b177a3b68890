//! Parser for the scene language
//!
//! Converts tokens into an Abstract Syntax Tree. Parsing is all-or-nothing:
//! the first structural mismatch aborts the file with a syntax error.

use crate::ast::{
    AssignValue, BinaryOp, Expr, FaceSpec, Literal, MaterialRef, Program, Property, PropertyValue,
    Stmt,
};
use crate::error::{ErrorKind, Result, SceneError};
use crate::geometry::Modifier;
use crate::scene::MATERIAL_PROPERTIES;
use crate::token::{Span, Token, TokenKind};

/// Convenience wrapper around [`Parser::parse`]
pub fn parse(tokens: Vec<Token>) -> Result<Program> {
    Parser::new(tokens).parse()
}

/// The parser state
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Create a new parser from tokens
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, span, String::new()));
        }
        Self { tokens, current: 0 }
    }

    /// Parse the tokens into a program
    pub fn parse(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            statements.push(self.statement()?);
        }

        Ok(Program::new(statements))
    }

    // ==================== Statements ====================

    fn statement(&mut self) -> Result<Stmt> {
        let stmt = match &self.peek().kind {
            TokenKind::Import => self.import_statement()?,
            TokenKind::Local => self.local_statement()?,
            TokenKind::If => self.if_statement()?,
            TokenKind::While => self.while_statement()?,
            TokenKind::For => self.for_statement()?,
            TokenKind::Ident(_) => self.ident_statement()?,
            other => {
                return Err(SceneError::new(
                    ErrorKind::UnexpectedToken(other.to_string()),
                    Some(self.peek().span),
                ))
            }
        };

        self.match_token(&TokenKind::Semicolon);
        Ok(stmt)
    }

    /// `import X [as Y]` or `import a, b from X [as Y]`
    fn import_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // consume 'import'

        let first_is_name = matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(
                self.peek_next().map(|t| &t.kind),
                Some(TokenKind::Comma) | Some(TokenKind::From)
            );

        let (names, source) = if first_is_name {
            let mut names = vec![self.expect_ident("expected import name")?];
            while self.match_token(&TokenKind::Comma) {
                names.push(self.expect_ident("expected import name after ','")?);
            }
            self.expect(&TokenKind::From, "expected 'from' after import names")?;
            (names, self.import_source()?)
        } else {
            (Vec::new(), self.import_source()?)
        };

        let alias = if self.match_token(&TokenKind::As) {
            Some(self.expect_ident("expected alias name after 'as'")?)
        } else {
            None
        };

        Ok(Stmt::Import { names, source, alias, span })
    }

    /// A quoted path/URL, or a bare name with `.` or `/` separated segments
    fn import_source(&mut self) -> Result<String> {
        if let TokenKind::String(path) = &self.peek().kind {
            let path = path.clone();
            self.advance();
            return Ok(path);
        }

        let mut path = self.expect_ident("expected module name or path")?;
        loop {
            let separator = match self.peek().kind {
                TokenKind::Dot => '.',
                TokenKind::Slash => '/',
                _ => break,
            };
            self.advance();
            path.push(separator);
            path.push_str(&self.expect_ident("expected module path segment")?);
        }
        Ok(path)
    }

    fn local_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // consume 'local'
        let name = self.expect_ident("expected variable name after 'local'")?;
        self.expect(&TokenKind::Equal, "expected '=' after variable name")?;
        let value = self.expression()?;
        Ok(Stmt::Assignment { name, value, local: true, span })
    }

    /// Statements that start with an identifier: assignment, property
    /// assignment, method call and `console.print`.
    fn ident_statement(&mut self) -> Result<Stmt> {
        let span = self.peek().span;
        let name = self.expect_ident("expected identifier")?;

        if name == "console"
            && self.check(&TokenKind::Dot)
            && matches!(self.peek_next().map(|t| &t.kind), Some(TokenKind::Ident(m)) if m == "print")
        {
            self.advance(); // '.'
            self.advance(); // 'print'
            self.expect(&TokenKind::LeftParen, "expected '(' after console.print")?;
            let value = self.expression()?;
            self.expect(&TokenKind::RightParen, "expected ')' after print argument")?;
            return Ok(Stmt::ConsolePrint { value, span });
        }

        if self.match_token(&TokenKind::Equal) {
            let value = self.expression()?;
            return Ok(Stmt::Assignment { name, value, local: false, span });
        }

        self.expect(&TokenKind::Dot, "expected '=' or '.' after identifier")?;

        if self.match_token(&TokenKind::LeftParen) {
            let sub_target = self.expect_ident("expected child name")?;
            self.expect(&TokenKind::RightParen, "expected ')' after child name")?;
            self.expect(&TokenKind::Dot, "expected '.' after child selector")?;
            let property = self.expect_name("expected property name")?;
            self.expect(&TokenKind::Equal, "expected '=' after property name")?;
            let value = self.assign_value()?;
            return Ok(Stmt::PropertyAssignment {
                target: name,
                sub_target: Some(sub_target),
                property,
                value,
                span,
            });
        }

        let member = self.expect_name("expected property or method name after '.'")?;

        if self.match_token(&TokenKind::LeftParen) {
            let (args, exclude) = self.method_arguments()?;
            return Ok(Stmt::MethodCall { target: name, method: member, args, exclude, span });
        }

        self.expect(&TokenKind::Equal, "expected '=' or '(' after member name")?;
        let value = self.assign_value()?;

        Ok(Stmt::PropertyAssignment {
            target: name,
            sub_target: None,
            property: member,
            value,
            span,
        })
    }

    /// Arguments of a method call; `not name` marks an excluded object
    fn method_arguments(&mut self) -> Result<(Vec<Expr>, Option<String>)> {
        let mut args = Vec::new();
        let mut exclude = None;

        while !self.check(&TokenKind::RightParen) && !self.is_at_end() {
            if self.match_token(&TokenKind::Not) {
                exclude = Some(self.expect_ident("expected object name after 'not'")?);
            } else {
                args.push(self.expression()?);
            }
            self.match_token(&TokenKind::Comma);
        }

        self.expect(&TokenKind::RightParen, "expected ')' after arguments")?;
        Ok((args, exclude))
    }

    /// Value of a property assignment: an expression, an `x, y, z` triple, or
    /// a relative position `@anchor [+ x, y, z]`.
    fn assign_value(&mut self) -> Result<AssignValue> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            if let Some(anchor) = name.strip_prefix('@') {
                let anchor = anchor.to_string();
                self.advance();
                let offset = if self.match_token(&TokenKind::Plus)
                    || self.match_token(&TokenKind::Comma)
                {
                    Some(Box::new(self.triple()?))
                } else {
                    None
                };
                return Ok(AssignValue::Relative { anchor, offset });
            }
        }

        let first = self.expression()?;
        if self.match_token(&TokenKind::Comma) {
            let second = self.expression()?;
            self.expect(&TokenKind::Comma, "expected ',' between coordinates")?;
            let third = self.expression()?;
            return Ok(AssignValue::Triple(Box::new([first, second, third])));
        }

        Ok(AssignValue::Expr(first))
    }

    fn triple(&mut self) -> Result<[Expr; 3]> {
        let x = self.expression()?;
        self.expect(&TokenKind::Comma, "expected ',' between coordinates")?;
        let y = self.expression()?;
        self.expect(&TokenKind::Comma, "expected ',' between coordinates")?;
        let z = self.expression()?;
        Ok([x, y, z])
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // consume 'if'

        let condition = self.expression()?;
        let then_branch = self.block()?;

        let else_branch = if self.match_token(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                Some(vec![self.if_statement()?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch, span })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // consume 'while'

        let condition = self.expression()?;
        let body = self.block()?;

        Ok(Stmt::While { condition, body, span })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // consume 'for'

        let var = self.expect_ident("expected loop variable name")?;
        self.expect(&TokenKind::Equal, "expected '=' after loop variable")?;
        let start = self.expression()?;
        self.expect(&TokenKind::To, "expected 'to' after loop start")?;
        let end = self.expression()?;

        let step = if self.match_token(&TokenKind::Step) {
            Some(self.expression()?)
        } else {
            None
        };

        let body = self.block()?;

        Ok(Stmt::For { var, start, end, step, body, span })
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokenKind::LeftBrace, "expected '{' before block")?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            stmts.push(self.statement()?);
        }

        self.expect(&TokenKind::RightBrace, "expected '}' after block")?;
        Ok(stmts)
    }

    // ==================== Expressions ====================

    pub fn expression(&mut self) -> Result<Expr> {
        self.equality()
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut left = self.comparison()?;

        loop {
            let op = if self.match_token(&TokenKind::EqualEqual) {
                BinaryOp::Eq
            } else if self.match_token(&TokenKind::BangEqual) {
                BinaryOp::Ne
            } else {
                break;
            };

            let right = self.comparison()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut left = self.term()?;

        loop {
            let op = if self.match_token(&TokenKind::Less) {
                BinaryOp::Lt
            } else if self.match_token(&TokenKind::LessEqual) {
                BinaryOp::Le
            } else if self.match_token(&TokenKind::Greater) {
                BinaryOp::Gt
            } else if self.match_token(&TokenKind::GreaterEqual) {
                BinaryOp::Ge
            } else {
                break;
            };

            let right = self.term()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;

        loop {
            let op = if self.match_token(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_token(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };

            let right = self.factor()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;

        loop {
            let op = if self.match_token(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_token(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_token(&TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };

            let right = self.unary()?;
            left = binary(left, op, right);
        }

        Ok(left)
    }

    /// `-x` becomes `0 - x`
    fn unary(&mut self) -> Result<Expr> {
        if self.match_token(&TokenKind::Minus) {
            let span = self.previous().span;
            let operand = self.unary()?;
            return Ok(Expr::Binary {
                left: Box::new(Expr::number(0.0, span)),
                op: BinaryOp::Sub,
                right: Box::new(operand),
                span,
            });
        }

        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();

        match &token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::number(*n, token.span))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::Literal { value: Literal::String(s.clone()), span: token.span })
            }
            TokenKind::Cube => self.cube_literal(),
            TokenKind::Mesh => self.mesh_literal(),
            TokenKind::Material => {
                self.advance();
                let properties = self.property_block(MATERIAL_PROPERTIES)?;
                Ok(Expr::Material { properties, span: token.span })
            }
            TokenKind::Modifier => {
                self.advance();
                self.expect(&TokenKind::Dot, "expected '.' after 'modifier'")?;
                let kind = self.expect_ident("expected modifier kind")?;
                let mut names = vec!["base"];
                names.extend(Modifier::property_names(&kind).unwrap_or_default());
                let properties = self.property_block(&names)?;
                Ok(Expr::Modifier { kind, properties, span: token.span })
            }
            TokenKind::Group => self.group_literal(),
            TokenKind::Int | TokenKind::Float | TokenKind::StringType | TokenKind::Bool => {
                self.advance();
                self.expect(&TokenKind::LeftParen, "expected '(' after conversion name")?;
                let args = self.call_arguments()?;
                Ok(Expr::Call {
                    receiver: None,
                    callee: token.lexeme.clone(),
                    args,
                    span: token.span,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                self.reference_or_call(name.clone(), token.span)
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            _ => Err(SceneError::new(ErrorKind::ExpectedExpression, Some(token.span))),
        }
    }

    /// `name`, `name.member...`, `name(args)` or `receiver.name(args)`
    fn reference_or_call(&mut self, name: String, span: Span) -> Result<Expr> {
        let mut members = Vec::new();
        while self.match_token(&TokenKind::Dot) {
            members.push(self.expect_name("expected member name after '.'")?);
        }

        if !self.match_token(&TokenKind::LeftParen) {
            return Ok(Expr::Reference { name, members, span });
        }

        let (receiver, callee) = match members.len() {
            0 => (None, name),
            1 => (Some(name), members.remove(0)),
            _ => {
                return Err(SceneError::new(
                    ErrorKind::UnexpectedToken("(".to_string()),
                    Some(self.previous().span),
                ))
            }
        };

        let args = self.call_arguments()?;
        Ok(Expr::Call { receiver, callee, args, span })
    }

    /// Comma separated arguments up to and including the closing `)`
    fn call_arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(args)
    }

    // ==================== Domain literals ====================

    /// `cube(...)`: the raw tokens are glued together and split on `:`
    fn cube_literal(&mut self) -> Result<Expr> {
        let span = self.advance().span; // consume 'cube'
        self.expect(&TokenKind::LeftParen, "expected '(' after 'cube'")?;

        let mut raw = String::new();
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::Eof => {
                    return Err(SceneError::new(
                        ErrorKind::ExpectedToken(
                            "expected ')' after cube vertices".to_string(),
                            TokenKind::Eof.to_string(),
                        ),
                        Some(self.peek().span),
                    ))
                }
                TokenKind::RightParen if depth == 0 => break,
                TokenKind::RightParen => depth -= 1,
                TokenKind::LeftParen => depth += 1,
                _ => {}
            }
            raw.push_str(self.advance().raw_text());
        }
        self.advance(); // ')'

        let vertices = raw
            .split(':')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Expr::Cube { vertices, span })
    }

    /// `mesh { vertices = [x,y,z; ...] faces = [i,j,k: mat; ...] }`
    fn mesh_literal(&mut self) -> Result<Expr> {
        let span = self.advance().span; // consume 'mesh'
        self.expect(&TokenKind::LeftBrace, "expected '{' after 'mesh'")?;

        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) || self.match_token(&TokenKind::Comma) {
                continue;
            }

            let section_span = self.peek().span;
            let section = self.expect_ident("expected 'vertices' or 'faces'")?;
            self.expect(&TokenKind::Equal, "expected '=' after mesh section name")?;
            self.expect(&TokenKind::LeftBracket, "expected '[' to open mesh section")?;

            match section.as_str() {
                "vertices" => vertices = self.vertex_list()?,
                "faces" => faces = self.face_list()?,
                other => {
                    return Err(SceneError::new(
                        ErrorKind::UnexpectedToken(other.to_string()),
                        Some(section_span),
                    ))
                }
            }

            self.expect(&TokenKind::RightBracket, "expected ']' to close mesh section")?;
        }

        self.expect(&TokenKind::RightBrace, "expected '}' after mesh body")?;

        Ok(Expr::Mesh { vertices, faces, span })
    }

    fn vertex_list(&mut self) -> Result<Vec<[f64; 3]>> {
        let mut vertices = Vec::new();

        while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
            let x = self.signed_number()?;
            self.expect(&TokenKind::Comma, "expected ',' between vertex coordinates")?;
            let y = self.signed_number()?;
            self.expect(&TokenKind::Comma, "expected ',' between vertex coordinates")?;
            let z = self.signed_number()?;
            vertices.push([x, y, z]);

            if !self.match_token(&TokenKind::Semicolon) && !self.check(&TokenKind::RightBracket) {
                return Err(self.expected("expected ';' after vertex"));
            }
        }

        Ok(vertices)
    }

    fn face_list(&mut self) -> Result<Vec<FaceSpec>> {
        let mut faces = Vec::new();

        while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
            let face_span = self.peek().span;
            let mut indices = vec![self.face_index()?];
            while self.match_token(&TokenKind::Comma) {
                indices.push(self.face_index()?);
            }

            if indices.len() < 3 {
                return Err(SceneError::new(
                    ErrorKind::InvalidFace(format!(
                        "a face needs at least 3 indices, got {}",
                        indices.len()
                    )),
                    Some(face_span),
                ));
            }

            let material = if self.match_token(&TokenKind::Colon) {
                Some(self.material_ref()?)
            } else {
                None
            };

            faces.push(FaceSpec { indices, material });

            if !self.match_token(&TokenKind::Semicolon) && !self.check(&TokenKind::RightBracket) {
                return Err(self.expected("expected ';' after face"));
            }
        }

        Ok(faces)
    }

    fn face_index(&mut self) -> Result<usize> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) if n >= 0.0 && n.fract() == 0.0 => {
                self.advance();
                Ok(n as usize)
            }
            TokenKind::Number(n) => Err(SceneError::new(
                ErrorKind::InvalidFace(format!("'{}' is not a vertex index", n)),
                Some(token.span),
            )),
            _ => Err(self.expected("expected vertex index")),
        }
    }

    fn material_ref(&mut self) -> Result<MaterialRef> {
        let name = self.expect_ident("expected material name after ':'")?;
        if self.match_token(&TokenKind::Dot) {
            let item = self.expect_name("expected material name after '.'")?;
            Ok(MaterialRef::Library { library: name, item })
        } else {
            Ok(MaterialRef::Name(name))
        }
    }

    fn signed_number(&mut self) -> Result<f64> {
        let negative = self.match_token(&TokenKind::Minus);
        match self.peek().kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(if negative { -n } else { n })
            }
            _ => Err(self.expected("expected number")),
        }
    }

    /// `{ k = v, k1, k2 = v1, v2, k = v1, v2, v3 }`
    ///
    /// `names` lists the property names the literal accepts. They decide where
    /// an entry ends when a value list is followed by `name, ..., name =`.
    fn property_block(&mut self, names: &[&str]) -> Result<Vec<Property>> {
        self.expect(&TokenKind::LeftBrace, "expected '{' before properties")?;

        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) || self.match_token(&TokenKind::Semicolon) {
                continue;
            }

            let entry_span = self.peek().span;
            let mut keys = vec![self.expect_name("expected property name")?];
            while self.match_token(&TokenKind::Comma) {
                keys.push(self.expect_name("expected property name after ','")?);
            }
            self.expect(&TokenKind::Equal, "expected '=' after property name")?;

            let mut values = vec![self.expression()?];
            while self.check(&TokenKind::Comma) && !self.starts_property_entry(self.current + 1, names) {
                self.advance(); // ','
                values.push(self.expression()?);
            }

            if keys.len() == values.len() {
                properties.extend(keys.into_iter().zip(values).map(|(key, value)| Property {
                    key,
                    value: PropertyValue::Single(value),
                }));
            } else if keys.len() == 1 {
                properties.push(Property {
                    key: keys.remove(0),
                    value: PropertyValue::List(values),
                });
            } else {
                return Err(SceneError::new(
                    ErrorKind::PropertyArity(keys.len(), values.len()),
                    Some(entry_span),
                ));
            }
        }

        self.expect(&TokenKind::RightBrace, "expected '}' after properties")?;
        Ok(properties)
    }

    /// Whether the tokens at `pos` start a new entry `name [, name]* =`.
    ///
    /// In `axis = X, Y, angle = 90, 45` the run `Y, angle =` starts with a
    /// name that is not a known property, so `Y` still belongs to `axis`. A
    /// run made only of unknown names is an entry, so typos surface as
    /// unknown properties.
    fn starts_property_entry(&self, mut pos: usize, names: &[&str]) -> bool {
        let mut run = Vec::new();
        loop {
            match self.tokens.get(pos) {
                Some(token) if is_name_token(token) => run.push(token.lexeme.as_str()),
                _ => return false,
            }
            match self.tokens.get(pos + 1).map(|t| &t.kind) {
                Some(TokenKind::Equal) => break,
                Some(TokenKind::Comma) => pos += 2,
                _ => return false,
            }
        }

        let known = |name: &&str| names.contains(name);
        known(&run[0]) || !run.iter().any(known)
    }

    /// `group [a, b, c]`
    fn group_literal(&mut self) -> Result<Expr> {
        let span = self.advance().span; // consume 'group'
        self.expect(&TokenKind::LeftBracket, "expected '[' after 'group'")?;

        let mut children = Vec::new();
        while !self.check(&TokenKind::RightBracket) && !self.is_at_end() {
            children.push(self.expect_ident("expected child name")?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightBracket, "expected ']' after group children")?;
        Ok(Expr::Group { children, span })
    }

    // ==================== Helpers ====================

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expected(&self, message: &str) -> SceneError {
        SceneError::new(
            ErrorKind::ExpectedToken(message.to_string(), self.peek().kind.to_string()),
            Some(self.peek().span),
        )
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(message))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.expected(message))
        }
    }

    /// Property and member names may reuse keywords (`obj.material`)
    fn expect_name(&mut self, message: &str) -> Result<String> {
        if is_name_token(self.peek()) {
            Ok(self.advance().lexeme.clone())
        } else {
            Err(self.expected(message))
        }
    }
}

fn is_name_token(token: &Token) -> bool {
    matches!(token.kind, TokenKind::Ident(_)) || token.kind.is_keyword()
}

fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    let span = Span::new(
        left.span().start,
        right.span().end,
        left.span().line,
        left.span().column,
    );
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
        span,
    }
}
