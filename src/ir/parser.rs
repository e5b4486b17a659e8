//! Parser for the textual module form produced by the printer.
//!
//! Parsing is line oriented: every function header, label and instruction
//! sits on its own line and `;` starts a comment. A function body is read in
//! two passes. The first pass creates every block and assigns each defining
//! line the instruction handle it will receive, so branches and operands may
//! refer forward; the second pass builds the instructions through a
//! [`Builder`], which rejects instructions placed after a terminator.

use hashbrown::HashMap;

use super::{BinaryOp, BlockId, Builder, FuncId, InstId, Instruction, IntPredicate, Module, Type, Value};
use crate::error::ParseError;

type ParseResult<T> = Result<T, ParseError>;

/// Parse a module from its text form.
pub fn parse_module(text: &str) -> ParseResult<Module> {
    Parser::new(text)?.parse()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Ident(&'a str),
    Local(&'a str),
    Global(&'a str),
    Int(i64),
    Punct(char),
}

pub(super) fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'
}

type CharStream<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

/// Consume name characters and return the slice starting at `start`.
fn take_name<'a>(text: &'a str, start: usize, chars: &mut CharStream<'a>) -> &'a str {
    let mut end = start;
    while let Some(&(idx, ch)) = chars.peek() {
        if !is_name_char(ch) {
            break;
        }
        end = idx + ch.len_utf8();
        chars.next();
    }
    &text[start..end]
}

/// Consume a `"..."` name whose opening quote is at `quote`, returning the
/// text between the quotes.
fn take_quoted<'a>(
    text: &'a str,
    quote: usize,
    chars: &mut CharStream<'a>,
    line: usize,
) -> ParseResult<&'a str> {
    chars.next();
    for (idx, ch) in chars.by_ref() {
        if ch == '"' {
            return Ok(&text[quote + 1..idx]);
        }
    }
    Err(ParseError::new(line, "unterminated quoted name"))
}

fn lex_line(text: &str, line: usize) -> ParseResult<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(idx, ch)) = chars.peek() {
        match ch {
            ';' => break,
            c if c.is_whitespace() => {
                chars.next();
            }
            '%' | '@' => {
                chars.next();
                let name = match chars.peek() {
                    Some(&(quote, '"')) => take_quoted(text, quote, &mut chars, line)?,
                    _ => take_name(text, idx + 1, &mut chars),
                };
                if name.is_empty() {
                    return Err(ParseError::new(line, format!("expected a name after '{ch}'")));
                }
                tokens.push(if ch == '%' {
                    Token::Local(name)
                } else {
                    Token::Global(name)
                });
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let digits = take_name(text, idx + 1, &mut chars);
                let literal = &text[idx..idx + 1 + digits.len()];
                let value = literal.parse::<i64>().map_err(|_| {
                    ParseError::new(line, format!("invalid integer literal '{literal}'"))
                })?;
                tokens.push(Token::Int(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let name = take_name(text, idx, &mut chars);
                tokens.push(Token::Ident(name));
            }
            // Quoted label of a block definition.
            '"' => {
                let name = take_quoted(text, idx, &mut chars, line)?;
                tokens.push(Token::Ident(name));
            }
            '(' | ')' | '{' | '}' | ',' | '=' | ':' => {
                chars.next();
                tokens.push(Token::Punct(ch));
            }
            other => {
                return Err(ParseError::new(line, format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

/// Cursor over the tokens of one line.
struct Cursor<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    line: usize,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn new(tokens: &'t [Token<'a>], line: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            line,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> ParseResult<Token<'a>> {
        let token = self
            .peek()
            .ok_or_else(|| self.error("unexpected end of line"))?;
        self.pos += 1;
        Ok(token)
    }

    fn try_punct(&mut self, ch: char) -> bool {
        if self.peek() == Some(Token::Punct(ch)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, ch: char) -> ParseResult<()> {
        if self.try_punct(ch) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{ch}' but found {:?}", self.peek())))
        }
    }

    fn ident(&mut self) -> ParseResult<&'a str> {
        match self.next()? {
            Token::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected a keyword but found {other:?}"))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        let found = self.ident()?;
        if found == keyword {
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}' but found '{found}'")))
        }
    }

    fn local(&mut self) -> ParseResult<&'a str> {
        match self.next()? {
            Token::Local(name) => Ok(name),
            other => Err(self.error(format!("expected a %name but found {other:?}"))),
        }
    }

    fn global(&mut self) -> ParseResult<&'a str> {
        match self.next()? {
            Token::Global(name) => Ok(name),
            other => Err(self.error(format!("expected an @name but found {other:?}"))),
        }
    }

    fn ty(&mut self) -> ParseResult<Type> {
        let name = self.ident()?;
        Type::from_name(name).ok_or_else(|| self.error(format!("unknown type '{name}'")))
    }

    fn finish(&self) -> ParseResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(self.error(format!("unexpected trailing {token:?}"))),
        }
    }
}

/// Names visible inside one function body.
struct Scope<'a> {
    values: HashMap<&'a str, Value>,
    blocks: HashMap<&'a str, BlockId>,
}

impl<'a> Scope<'a> {
    fn value(&self, cursor: &Cursor<'_, 'a>, name: &str) -> ParseResult<Value> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| cursor.error(format!("use of undefined value %{name}")))
    }

    fn label(&self, cursor: &mut Cursor<'_, 'a>) -> ParseResult<BlockId> {
        cursor.expect_keyword("label")?;
        let name = cursor.local()?;
        self.blocks
            .get(name)
            .copied()
            .ok_or_else(|| cursor.error(format!("use of undefined label %{name}")))
    }

    fn operand(&self, cursor: &mut Cursor<'_, 'a>, ty: Type) -> ParseResult<Value> {
        match cursor.next()? {
            Token::Local(name) => self.value(cursor, name),
            Token::Int(value) => Ok(Value::constant(ty, value)),
            Token::Ident("true") => Ok(Value::bool(true)),
            Token::Ident("false") => Ok(Value::bool(false)),
            other => Err(cursor.error(format!("expected an operand but found {other:?}"))),
        }
    }
}

struct Line<'a> {
    number: usize,
    tokens: Vec<Token<'a>>,
}

impl<'a> Line<'a> {
    fn is_label(&self) -> bool {
        matches!(self.tokens.as_slice(), [Token::Ident(_), Token::Punct(':')])
    }

    fn is_close(&self) -> bool {
        self.tokens.as_slice() == [Token::Punct('}')]
    }

    /// Name defined by an instruction line (`%name = ...`).
    fn defined_name(&self) -> Option<&'a str> {
        match self.tokens.as_slice() {
            [Token::Local(name), Token::Punct('='), ..] => Some(*name),
            _ => None,
        }
    }
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
    module: Module,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> ParseResult<Self> {
        let module_name = text
            .lines()
            .find_map(|l| l.trim().strip_prefix("; ModuleID = '"))
            .and_then(|rest| rest.strip_suffix('\''))
            .unwrap_or("module");

        let mut lines = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let tokens = lex_line(raw, idx + 1)?;
            if !tokens.is_empty() {
                lines.push(Line {
                    number: idx + 1,
                    tokens,
                });
            }
        }

        Ok(Self {
            lines,
            pos: 0,
            module: Module::new(module_name),
        })
    }

    fn parse(mut self) -> ParseResult<Module> {
        while self.pos < self.lines.len() {
            let line = &self.lines[self.pos];
            let (number, first) = (line.number, line.tokens[0]);
            match first {
                Token::Ident("define") => self.parse_function(true)?,
                Token::Ident("declare") => self.parse_function(false)?,
                other => {
                    return Err(ParseError::new(
                        number,
                        format!("expected 'define' or 'declare' but found {other:?}"),
                    ))
                }
            }
        }
        log::debug!(
            "parsed module '{}' with {} function(s)",
            self.module.name(),
            self.module.num_functions()
        );
        Ok(self.module)
    }

    fn parse_function(&mut self, has_body: bool) -> ParseResult<()> {
        let header = &self.lines[self.pos];
        let mut cursor = Cursor::new(&header.tokens, header.number);
        cursor.next()?;
        let ret = cursor.ty()?;
        let name = cursor.global()?;

        cursor.expect_punct('(')?;
        let mut params: Vec<(&str, Type)> = Vec::new();
        if !cursor.try_punct(')') {
            loop {
                let ty = cursor.ty()?;
                let param = cursor.local()?;
                params.push((param, ty));
                if cursor.try_punct(')') {
                    break;
                }
                cursor.expect_punct(',')?;
            }
        }
        if has_body {
            cursor.expect_punct('{')?;
        }
        cursor.finish()?;

        let func = self
            .module
            .add_function(name, &params, ret)
            .map_err(|e| cursor.error(e.to_string()))?;
        self.pos += 1;

        if !has_body {
            return Ok(());
        }

        let body_start = self.pos;
        let body_end = (body_start..self.lines.len())
            .find(|&idx| self.lines[idx].is_close())
            .ok_or_else(|| ParseError::new(header.number, format!("unterminated body of @{name}")))?;

        let scope = self.scan_body(func, &params, body_start, body_end)?;
        self.build_body(func, &scope, body_start, body_end)?;
        self.pos = body_end + 1;
        Ok(())
    }

    /// First pass: create blocks and pre-assign instruction handles.
    fn scan_body(
        &mut self,
        func: FuncId,
        params: &[(&'a str, Type)],
        start: usize,
        end: usize,
    ) -> ParseResult<Scope<'a>> {
        let mut scope = Scope {
            values: HashMap::new(),
            blocks: HashMap::new(),
        };
        for (idx, (name, _)) in params.iter().enumerate() {
            scope.values.insert(*name, Value::Argument(idx as u32));
        }

        let mut next_inst = 0u32;
        for line in &self.lines[start..end] {
            if line.is_label() {
                let Token::Ident(label) = line.tokens[0] else {
                    unreachable!("label lines start with an identifier")
                };
                if scope.blocks.contains_key(label) {
                    return Err(ParseError::new(line.number, format!("redefinition of label %{label}")));
                }
                let block = self
                    .module
                    .create_block(func, label)
                    .map_err(|e| ParseError::new(line.number, e.to_string()))?;
                scope.blocks.insert(label, block);
                continue;
            }

            if let Some(name) = line.defined_name() {
                if scope
                    .values
                    .insert(name, Value::Result(InstId(next_inst)))
                    .is_some()
                {
                    return Err(ParseError::new(line.number, format!("redefinition of %{name}")));
                }
            }
            next_inst += 1;
        }

        Ok(scope)
    }

    /// Second pass: build instructions in text order.
    fn build_body(&mut self, func: FuncId, scope: &Scope<'a>, start: usize, end: usize) -> ParseResult<()> {
        let lines = &self.lines[start..end];
        let mut builder = Builder::new(&mut self.module);
        let mut next_inst = 0u32;

        for line in lines {
            let mut cursor = Cursor::new(&line.tokens, line.number);
            if line.is_label() {
                let label = cursor.ident()?;
                let block = scope
                    .blocks
                    .get(label)
                    .copied()
                    .ok_or_else(|| cursor.error(format!("unknown label %{label}")))?;
                builder.position_at_end(func, block);
                continue;
            }
            if builder.insertion_block().is_none() {
                return Err(cursor.error("instruction outside of a block"));
            }

            let name = match line.defined_name() {
                Some(name) => {
                    cursor.pos = 2;
                    name
                }
                None => "",
            };
            let inst = parse_instruction(&mut cursor, scope)?;
            cursor.finish()?;

            if inst.defines_value() != !name.is_empty() {
                return Err(cursor.error(if name.is_empty() {
                    format!("result of '{}' must be named", inst.opcode().name())
                } else {
                    format!("'{}' does not define a value", inst.opcode().name())
                }));
            }

            // Anonymous values are written as numbers in the text form.
            let display_name = if name.starts_with(|c: char| c.is_ascii_digit()) {
                ""
            } else {
                name
            };
            let value = builder
                .append(inst, display_name)
                .map_err(|e| cursor.error(e.to_string()))?;
            debug_assert!(value.map_or(true, |v| v == Value::Result(InstId(next_inst))));
            next_inst += 1;
        }

        Ok(())
    }
}

fn parse_instruction<'a>(cursor: &mut Cursor<'_, 'a>, scope: &Scope<'a>) -> ParseResult<Instruction> {
    let opcode = cursor.ident()?;

    let inst = match opcode {
        "const" => {
            let ty = cursor.ty()?;
            match scope.operand(cursor, ty)? {
                Value::Constant(c) => Instruction::Const(c),
                _ => return Err(cursor.error("const expects a literal")),
            }
        }
        "icmp" => {
            let pred_name = cursor.ident()?;
            let pred = IntPredicate::from_mnemonic(pred_name)
                .ok_or_else(|| cursor.error(format!("unknown predicate '{pred_name}'")))?;
            let ty = cursor.ty()?;
            let lhs = scope.operand(cursor, ty)?;
            cursor.expect_punct(',')?;
            let rhs = scope.operand(cursor, ty)?;
            Instruction::ICmp { pred, lhs, rhs }
        }
        "call" => {
            let ret = cursor.ty()?;
            let callee = cursor.global()?.to_string();
            cursor.expect_punct('(')?;
            let mut args = Vec::new();
            if !cursor.try_punct(')') {
                loop {
                    let ty = cursor.ty()?;
                    args.push(scope.operand(cursor, ty)?);
                    if cursor.try_punct(')') {
                        break;
                    }
                    cursor.expect_punct(',')?;
                }
            }
            Instruction::Call { callee, args, ret }
        }
        "br" => {
            if cursor.peek() == Some(Token::Ident("label")) {
                Instruction::Br {
                    dest: scope.label(cursor)?,
                }
            } else {
                let ty = cursor.ty()?;
                let cond = scope.operand(cursor, ty)?;
                cursor.expect_punct(',')?;
                let then_dest = scope.label(cursor)?;
                cursor.expect_punct(',')?;
                let else_dest = scope.label(cursor)?;
                Instruction::CondBr {
                    cond,
                    then_dest,
                    else_dest,
                }
            }
        }
        "ret" => {
            let ty = cursor.ty()?;
            Instruction::Ret {
                value: scope.operand(cursor, ty)?,
            }
        }
        other => {
            let op = BinaryOp::from_mnemonic(other)
                .ok_or_else(|| cursor.error(format!("unknown instruction '{other}'")))?;
            let ty = cursor.ty()?;
            let lhs = scope.operand(cursor, ty)?;
            cursor.expect_punct(',')?;
            let rhs = scope.operand(cursor, ty)?;
            Instruction::Binary { op, lhs, rhs }
        }
    };

    Ok(inst)
}
