use super::{tokenize, AnnotationDesignator, Lexeme, PointcutExpr, SyntaxError, Token};
use crate::jvm::{modifier_bit, BaseType};
use crate::weaver::patterns::{
    AnnotationPattern, ClassNamePattern, ElementPattern, MemberPatternKind, ModifiersPattern,
    NamePattern, NameSegment, ParamPattern, SignaturePattern, TypePattern,
};
use crate::weaver::shadow::ShadowKind;

/// Parse a pointcut expression
///
/// The grammar is the AspectJ pointcut language minus the parts that need a Java front-end
/// (generic types, `throws` clauses, `if(...)` with a Java expression):
///
/// ```text
/// pointcut   := or
/// or         := and ('||' and)*
/// and        := unary ('&&' unary)*
/// unary      := '!' unary | '(' pointcut ')' | designator
/// designator := keyword '(' ... ')' | '@' keyword '(' ... ')' | dotted-name '(' types ')'
/// ```
pub fn parse_pointcut(source: &str) -> Result<PointcutExpr, SyntaxError> {
    let lexemes = tokenize(source)?;
    let mut parser = Parser {
        lexemes,
        position: 0,
        source_len: source.len(),
    };
    let pointcut = parser.pointcut()?;
    match parser.peek() {
        None => Ok(pointcut),
        Some(_) => Err(parser.unexpected("end of pointcut")),
    }
}

/// Parse a comma separated list of type patterns, as found in `declare precedence`
pub fn parse_type_patterns(source: &str) -> Result<Vec<TypePattern>, SyntaxError> {
    let lexemes = tokenize(source)?;
    let mut parser = Parser {
        lexemes,
        position: 0,
        source_len: source.len(),
    };
    let mut patterns = vec![parser.type_pattern()?];
    while parser.eat(Token::Comma) {
        patterns.push(parser.type_pattern()?);
    }
    match parser.peek() {
        None => Ok(patterns),
        Some(_) => Err(parser.unexpected("`,` or end of list")),
    }
}

struct Parser<'s> {
    lexemes: Vec<Lexeme<'s>>,
    position: usize,
    source_len: usize,
}

/// Dotted name with the extra decorations a type or member path can carry
struct Path<'s> {
    /// Segment text, with `None` for `..`
    segments: Vec<Option<&'s str>>,

    /// Index of the segment followed by `+`
    subtypes_at: Option<usize>,

    dimensions: usize,
}

impl<'s> Parser<'s> {
    fn peek(&self) -> Option<Token> {
        self.lexemes.get(self.position).map(|lexeme| lexeme.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Lexeme<'s>> {
        self.lexemes.get(self.position + offset)
    }

    fn peek_word(&self) -> Option<&'s str> {
        match self.lexemes.get(self.position) {
            Some(Lexeme {
                token: Token::Word,
                text,
                ..
            }) => Some(*text),
            _ => None,
        }
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(token.describe()))
        }
    }

    fn expect_word(&mut self) -> Result<&'s str, SyntaxError> {
        match self.peek_word() {
            Some(word) => {
                self.position += 1;
                Ok(word)
            }
            None => Err(self.unexpected("identifier")),
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.lexemes.get(self.position) {
            Some(lexeme) => SyntaxError {
                message: format!("expected {} but found `{}`", expected, lexeme.text),
                span: lexeme.span.clone(),
            },
            None => SyntaxError {
                message: format!("expected {} but reached the end", expected),
                span: self.source_len..self.source_len,
            },
        }
    }

    fn error_here(&self, message: String) -> SyntaxError {
        let span = match self.lexemes.get(self.position.saturating_sub(1)) {
            Some(lexeme) => lexeme.span.clone(),
            None => 0..self.source_len,
        };
        SyntaxError { message, span }
    }

    fn pointcut(&mut self) -> Result<PointcutExpr, SyntaxError> {
        let mut left = self.conjunction()?;
        while self.eat(Token::OrOr) {
            let right = self.conjunction()?;
            left = PointcutExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> Result<PointcutExpr, SyntaxError> {
        let mut left = self.unary()?;
        while self.eat(Token::AndAnd) {
            let right = self.unary()?;
            left = PointcutExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<PointcutExpr, SyntaxError> {
        if self.eat(Token::Bang) {
            return Ok(PointcutExpr::Not(Box::new(self.unary()?)));
        }
        if self.eat(Token::LParen) {
            let inner = self.pointcut()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        if self.eat(Token::At) {
            return self.annotation_designator();
        }
        self.designator()
    }

    fn annotation_designator(&mut self) -> Result<PointcutExpr, SyntaxError> {
        let designator = match self.expect_word()? {
            "annotation" => AnnotationDesignator::Member,
            "this" => AnnotationDesignator::This,
            "target" => AnnotationDesignator::Target,
            "within" => AnnotationDesignator::Within,
            "withincode" => AnnotationDesignator::WithinCode,
            "args" => {
                self.expect(Token::LParen)?;
                let args = self.param_list(Token::RParen)?;
                return Ok(PointcutExpr::AnnotationArgs(args));
            }
            other => {
                return Err(self.error_here(format!("unknown designator `@{}`", other)));
            }
        };
        self.expect(Token::LParen)?;
        let annotation = self.class_name()?;
        self.expect(Token::RParen)?;
        Ok(PointcutExpr::Annotation {
            designator,
            annotation,
        })
    }

    fn designator(&mut self) -> Result<PointcutExpr, SyntaxError> {
        let keyword = self.peek_word();
        let is_call = self.peek_at(1).map(|l| l.token) == Some(Token::LParen);
        let keyword = match keyword {
            Some(keyword) if is_call => keyword,
            _ => return self.reference(),
        };

        let (method_kind, constructor_kind) = match keyword {
            "call" => (ShadowKind::MethodCall, ShadowKind::ConstructorCall),
            "execution" => (ShadowKind::MethodExecution, ShadowKind::ConstructorExecution),
            "get" => (ShadowKind::FieldGet, ShadowKind::FieldGet),
            "set" => (ShadowKind::FieldSet, ShadowKind::FieldSet),
            _ => return self.simple_designator(keyword),
        };
        self.position += 2;
        let signature = self.signature()?;
        self.expect(Token::RParen)?;

        let is_field_designator = matches!(method_kind, ShadowKind::FieldGet | ShadowKind::FieldSet);
        let kind = match &signature.kind {
            MemberPatternKind::Field { .. } if is_field_designator => method_kind,
            MemberPatternKind::Method { .. } if !is_field_designator => method_kind,
            MemberPatternKind::Constructor { .. } if !is_field_designator => constructor_kind,
            MemberPatternKind::Field { .. } => {
                return Err(self.error_here(format!("`{}` expects a method signature", keyword)))
            }
            _ => return Err(self.error_here(format!("`{}` expects a field signature", keyword))),
        };
        Ok(PointcutExpr::Kinded { kind, signature })
    }

    fn simple_designator(&mut self, keyword: &'s str) -> Result<PointcutExpr, SyntaxError> {
        let expr = match keyword {
            "handler" => {
                self.position += 2;
                PointcutExpr::Handler(self.type_pattern()?)
            }
            "staticinitialization" => {
                self.position += 2;
                PointcutExpr::StaticInitialization(self.type_pattern()?)
            }
            "within" => {
                self.position += 2;
                PointcutExpr::Within(self.type_pattern()?)
            }
            "withincode" => {
                self.position += 2;
                let signature = self.signature()?;
                if signature.is_field() {
                    return Err(self.error_here(String::from(
                        "`withincode` expects a method or constructor signature",
                    )));
                }
                PointcutExpr::WithinCode(signature)
            }
            "this" => {
                self.position += 2;
                PointcutExpr::This(self.type_pattern()?)
            }
            "target" => {
                self.position += 2;
                PointcutExpr::Target(self.type_pattern()?)
            }
            "args" => {
                self.position += 2;
                return Ok(PointcutExpr::Args(self.param_list(Token::RParen)?));
            }
            "cflow" | "cflowbelow" => {
                self.position += 2;
                let inner = self.pointcut()?;
                PointcutExpr::Cflow {
                    inner: Box::new(inner),
                    below: keyword == "cflowbelow",
                }
            }
            "if" => {
                self.position += 2;
                let condition = match self.peek_word() {
                    Some("true") => Some(true),
                    Some("false") => Some(false),
                    Some(other) => {
                        return Err(self.unexpected(&format!(
                            "`true`, `false`, or nothing (not `{}`)",
                            other
                        )))
                    }
                    None => None,
                };
                if condition.is_some() {
                    self.position += 1;
                }
                PointcutExpr::If(condition)
            }
            _ => return self.reference(),
        };
        self.expect(Token::RParen)?;
        Ok(expr)
    }

    /// `name(args)` or `some.Aspect.name(args)`
    fn reference(&mut self) -> Result<PointcutExpr, SyntaxError> {
        let mut segments = vec![self.expect_word()?];
        while self.eat(Token::Dot) {
            segments.push(self.expect_word()?);
        }
        self.expect(Token::LParen)?;
        let mut arguments = vec![];
        if !self.eat(Token::RParen) {
            loop {
                arguments.push(self.type_pattern()?);
                if self.eat(Token::RParen) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        let name = segments.pop().unwrap_or_default().to_owned();
        if segments.iter().any(|segment| segment.contains('*')) || name.contains('*') {
            return Err(self.error_here(String::from(
                "pointcut references can't contain wildcards",
            )));
        }
        let aspect = if segments.is_empty() {
            None
        } else {
            Some(ClassNamePattern {
                segments: segments
                    .into_iter()
                    .map(|segment| NameSegment::Name(NamePattern::new(segment)))
                    .collect(),
            })
        };
        Ok(PointcutExpr::Reference {
            aspect,
            name,
            arguments,
        })
    }

    /// Comma separated type patterns (with `..`) up to and including the closing token
    fn param_list(&mut self, close: Token) -> Result<Vec<ParamPattern>, SyntaxError> {
        let mut params = vec![];
        if self.eat(close) {
            return Ok(params);
        }
        loop {
            if self.eat(Token::DotDot) {
                params.push(ParamPattern::Ellipsis);
            } else {
                params.push(ParamPattern::Type(self.type_pattern()?));
            }
            if self.eat(close) {
                return Ok(params);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn type_pattern(&mut self) -> Result<TypePattern, SyntaxError> {
        let mut left = self.type_conjunction()?;
        while self.eat(Token::OrOr) {
            let right = self.type_conjunction()?;
            left = TypePattern::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn type_conjunction(&mut self) -> Result<TypePattern, SyntaxError> {
        let mut left = self.type_unary()?;
        while self.eat(Token::AndAnd) {
            let right = self.type_unary()?;
            left = TypePattern::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn type_unary(&mut self) -> Result<TypePattern, SyntaxError> {
        if self.eat(Token::Bang) {
            return Ok(TypePattern::Not(Box::new(self.type_unary()?)));
        }
        if self.eat(Token::LParen) {
            let inner = self.type_pattern()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        let path = self.path()?;
        self.path_type(path)
    }

    /// Dotted name with an optional `+` and `[]` suffixes
    ///
    /// `+` is also accepted in the middle, for member paths like `Collection+.size`.
    fn path(&mut self) -> Result<Path<'s>, SyntaxError> {
        let mut path = Path {
            segments: vec![],
            subtypes_at: None,
            dimensions: 0,
        };
        loop {
            if self.eat(Token::DotDot) {
                path.segments.push(None);
                continue;
            }
            path.segments.push(Some(self.expect_word()?));
            if self.eat(Token::Plus) {
                if path.subtypes_at.is_some() {
                    return Err(self.error_here(String::from("more than one `+` in a name")));
                }
                path.subtypes_at = Some(path.segments.len() - 1);
            }
            match self.peek() {
                Some(Token::Dot) => self.position += 1,
                Some(Token::DotDot) => (),
                _ => break,
            }
        }
        while self.eat(Token::LBracket) {
            self.expect(Token::RBracket)?;
            path.dimensions += 1;
        }
        Ok(path)
    }

    fn path_type(&self, path: Path<'s>) -> Result<TypePattern, SyntaxError> {
        if path.subtypes_at.map_or(false, |at| at + 1 != path.segments.len()) {
            return Err(self.error_here(String::from("`+` must come at the end of a type")));
        }
        let include_subtypes = path.subtypes_at.is_some();
        let element = match path.segments.as_slice() {
            [Some("*")] => ElementPattern::Any,
            [Some("void")] => ElementPattern::Void,
            [Some(word)] => match BaseType::from_java_name(word) {
                Some(base_type) => ElementPattern::Primitive(base_type),
                None => ElementPattern::Class(self.class_name_pattern(&path.segments)?),
            },
            _ => ElementPattern::Class(self.class_name_pattern(&path.segments)?),
        };
        if include_subtypes && !matches!(element, ElementPattern::Class(_)) {
            return Err(self.error_here(String::from("`+` only applies to class types")));
        }
        Ok(TypePattern::Element {
            element,
            include_subtypes,
            dimensions: path.dimensions,
        })
    }

    fn class_name(&mut self) -> Result<ClassNamePattern, SyntaxError> {
        let path = self.path()?;
        if path.subtypes_at.is_some() || path.dimensions > 0 {
            return Err(self.error_here(String::from("expected a class name")));
        }
        self.class_name_pattern(&path.segments)
    }

    fn class_name_pattern(&self, segments: &[Option<&str>]) -> Result<ClassNamePattern, SyntaxError> {
        if segments.iter().all(Option::is_none) {
            return Err(self.error_here(String::from("`..` is not a type")));
        }
        Ok(ClassNamePattern {
            segments: segments
                .iter()
                .map(|segment| match segment {
                    Some(name) => NameSegment::Name(NamePattern::new(*name)),
                    None => NameSegment::Ellipsis,
                })
                .collect(),
        })
    }

    /// Signature of a method, constructor, or field
    ///
    /// ```text
    /// signature := annotation* modifier* [type] member-path ['(' params ')']
    /// ```
    fn signature(&mut self) -> Result<SignaturePattern, SyntaxError> {
        let mut annotations = vec![];
        let mut modifiers = ModifiersPattern::default();
        loop {
            let negated = self.peek() == Some(Token::Bang);
            let next = self.peek_at(if negated { 1 } else { 0 });
            match next.map(|lexeme| (lexeme.token, lexeme.text)) {
                Some((Token::At, _)) => {
                    self.position += if negated { 2 } else { 1 };
                    let annotation = self.class_name()?;
                    annotations.push(AnnotationPattern {
                        annotation,
                        negated,
                    });
                }
                Some((Token::Word, word)) if modifier_bit(word).is_some() => {
                    self.position += if negated { 2 } else { 1 };
                    let bit = modifier_bit(word).unwrap_or(0);
                    if negated {
                        modifiers.forbidden |= bit;
                    } else {
                        modifiers.required |= bit;
                    }
                }
                _ => break,
            }
        }

        // Constructors have no return type, which is only known after the first path
        let (return_type, member) = match self.peek() {
            Some(Token::Bang | Token::LParen) => {
                let return_type = self.type_unary()?;
                (Some(return_type), self.path()?)
            }
            _ => {
                let first = self.path()?;
                if self.peek() == Some(Token::LParen) {
                    (None, first)
                } else {
                    let return_type = self.path_type(first)?;
                    (Some(return_type), self.path()?)
                }
            }
        };
        if member.dimensions > 0 {
            return Err(self.error_here(String::from("member names can't have `[]`")));
        }
        let mut segments = member.segments;
        let name = match segments.pop() {
            Some(Some(name)) => name,
            _ => return Err(self.error_here(String::from("expected a member name"))),
        };
        if member.subtypes_at.map_or(false, |at| at + 1 != segments.len()) {
            return Err(self.error_here(String::from("`+` must follow the declaring type")));
        }
        let declaring_type = if segments.is_empty() {
            None
        } else {
            if segments.last() == Some(&None) {
                // `a..name` means any type under `a`
                segments.push(Some("*"));
            }
            Some(TypePattern::Element {
                element: match segments.as_slice() {
                    [Some("*")] => ElementPattern::Any,
                    _ => ElementPattern::Class(self.class_name_pattern(&segments)?),
                },
                include_subtypes: member.subtypes_at.is_some(),
                dimensions: 0,
            })
        };

        let kind = if self.eat(Token::LParen) {
            let params = self.param_list(Token::RParen)?;
            match return_type {
                None if name == "new" => MemberPatternKind::Constructor { params },
                None => {
                    return Err(self.error_here(format!("method `{}` needs a return type", name)))
                }
                Some(_) if name == "new" => {
                    return Err(self.error_here(String::from("constructors have no return type")))
                }
                Some(return_type) => MemberPatternKind::Method {
                    return_type,
                    name: NamePattern::new(name),
                    params,
                },
            }
        } else {
            match return_type {
                Some(field_type) => MemberPatternKind::Field {
                    field_type,
                    name: NamePattern::new(name),
                },
                None => return Err(self.error_here(format!("field `{}` needs a type", name))),
            }
        };
        Ok(SignaturePattern {
            annotations,
            modifiers,
            kind,
            declaring_type,
        })
    }
}
