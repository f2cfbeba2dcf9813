//! Syntax checking for `{{ ... }}` template fields.
//!
//! Templated options are rendered by the build orchestrator, not here. This
//! module only parses them far enough to reject input that could never
//! render: unclosed actions and strings, unbalanced block directives, and
//! calls to functions the renderer does not provide.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

type Chars<'a> = Peekable<CharIndices<'a>>;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const LEFT_COMMENT: &str = "/*";
const RIGHT_COMMENT: &str = "*/";

/// Functions available to templates at render time.
static KNOWN_FUNCTIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // text/template builtins
        "and", "call", "html", "index", "slice", "js", "len", "not", "or", "print", "printf",
        "println", "urlquery", "eq", "ge", "gt", "le", "lt", "ne",
        // build helpers
        "build_name", "build_type", "clean_image_name", "clean_resource_name", "env", "isotime",
        "lower", "pwd", "replace", "replace_all", "split", "strftime", "template_dir",
        "timestamp", "upper", "user", "uuid",
    ]
    .into_iter()
    .collect()
});

const KEYWORDS: &[&str] = &[
    "block", "break", "continue", "define", "else", "end", "if", "range", "template", "with",
];

/// A template that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct TemplateError {
    /// What went wrong.
    pub message: String,
    /// Byte offset into the template source.
    pub offset: usize,
}

impl TemplateError {
    fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// A lexical token inside an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `.` or a field chain such as `.Command` or `.Build.Name`.
    Field(String),
    /// `$` or `$name`, optionally followed by a field chain.
    Variable(String),
    /// Function name or keyword.
    Identifier(String),
    /// Interpreted or raw string literal, without quotes.
    Str(String),
    /// Character constant, without quotes.
    Char(String),
    /// Numeric literal.
    Number(String),
    /// `|`
    Pipe,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    /// `,`
    Comma,
}

/// The role an action plays in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Evaluates a pipeline and emits its value.
    Output,
    /// `{{/* ... */}}`
    Comment,
    /// `{{if pipeline}}`
    If,
    /// `{{range pipeline}}`
    Range,
    /// `{{with pipeline}}`
    With,
    /// `{{define "name"}}`
    Define,
    /// `{{block "name" pipeline}}`
    Block,
    /// `{{template "name" pipeline}}`
    Template,
    /// `{{else}}`, `{{else if ...}}`
    Else,
    /// `{{end}}`
    End,
    /// `{{break}}`
    Break,
    /// `{{continue}}`
    Continue,
}

impl ActionKind {
    const fn opens_block(self) -> bool {
        matches!(
            self,
            Self::If | Self::Range | Self::With | Self::Define | Self::Block
        )
    }

    const fn keyword(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Comment => "comment",
            Self::If => "if",
            Self::Range => "range",
            Self::With => "with",
            Self::Define => "define",
            Self::Block => "block",
            Self::Template => "template",
            Self::Else => "else",
            Self::End => "end",
            Self::Break => "break",
            Self::Continue => "continue",
        }
    }
}

/// One `{{ ... }}` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Byte offset of the opening delimiter.
    pub offset: usize,
    /// What the action does.
    pub kind: ActionKind,
    /// Tokens between the delimiters, trim markers removed.
    pub tokens: Vec<Token>,
}

impl Action {
    /// Returns true for an output action consisting of the single field `field`.
    pub fn is_field(&self, field: &str) -> bool {
        self.kind == ActionKind::Output
            && matches!(self.tokens.as_slice(), [Token::Field(name)] if name == field)
    }
}

/// A parsed template node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Literal text, with trim markers already applied.
    Text(String),
    /// An action.
    Action(Action),
}

/// A syntactically valid template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parses `source`, returning the first syntax error found.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        Parser::new(source).parse()
    }

    /// Iterates over all actions.
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Action(action) => Some(action),
            Node::Text(_) => None,
        })
    }

    /// Concatenation of every literal text node.
    pub fn literal_text(&self) -> String {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Action(_) => None,
            })
            .collect()
    }

    /// Returns true if any action can produce output.
    pub fn has_dynamic_content(&self) -> bool {
        self.actions().any(|action| {
            !matches!(
                action.kind,
                ActionKind::Comment
                    | ActionKind::End
                    | ActionKind::Else
                    | ActionKind::Break
                    | ActionKind::Continue
                    | ActionKind::Define
            )
        })
    }

    /// Returns true if the template can only ever render to whitespace.
    pub fn is_blank(&self) -> bool {
        !self.has_dynamic_content() && self.literal_text().trim().is_empty()
    }

    /// Number of `{{.field}}` placeholders, e.g. `placeholder_count(".Command")`.
    pub fn placeholder_count(&self, field: &str) -> usize {
        self.actions().filter(|action| action.is_field(field)).count()
    }
}

/// An open `if`/`range`/`with`/`define`/`block` and the variables declared inside it.
struct OpenBlock {
    kind: ActionKind,
    offset: usize,
    /// A plain `{{else}}` was seen; only `{{end}}` may follow.
    else_seen: bool,
    variables: Vec<String>,
}

struct Parser<'a> {
    source: &'a str,
    nodes: Vec<Node>,
    blocks: Vec<OpenBlock>,
    /// Variables declared outside any block. `$` is always defined.
    variables: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            nodes: Vec::new(),
            blocks: Vec::new(),
            variables: vec!["$".to_string()],
        }
    }

    fn parse(mut self) -> Result<Template, TemplateError> {
        let source = self.source;
        let mut pos = 0;
        let mut trim_next = false;

        while let Some(rel) = source[pos..].find(LEFT_DELIM) {
            let open = pos + rel;
            let mut text = &source[pos..open];
            if trim_next {
                text = text.trim_start();
            }

            let mut inner = open + LEFT_DELIM.len();
            if has_trim_marker(&source[inner..]) {
                text = text.trim_end();
                inner += 1;
            }
            self.push_text(text);

            let scanned = scan_action(source, open, inner)?;
            trim_next = scanned.right_trim;
            pos = scanned.end;

            let action = match scanned.body {
                None => Action {
                    offset: open,
                    kind: ActionKind::Comment,
                    tokens: Vec::new(),
                },
                Some((body, base)) => {
                    let tokens = lex_action(body, base)?;
                    let kind = classify(&tokens, open)?;
                    Action {
                        offset: open,
                        kind,
                        tokens,
                    }
                }
            };
            self.track_action(&action)?;
            self.nodes.push(Node::Action(action));
        }

        let mut tail = &source[pos..];
        if trim_next {
            tail = tail.trim_start();
        }
        self.push_text(tail);

        if let Some(block) = self.blocks.last() {
            return Err(TemplateError::new(
                format!("unexpected EOF: {{{{{}}}}} is never closed", block.kind.keyword()),
                block.offset,
            ));
        }

        Ok(Template { nodes: self.nodes })
    }

    fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.nodes.push(Node::Text(text.to_string()));
        }
    }

    fn track_action(&mut self, action: &Action) -> Result<(), TemplateError> {
        let (declared, pipeline) = split_declarations(pipeline_tokens(action));

        match action.kind {
            ActionKind::If | ActionKind::Range | ActionKind::With => {
                self.open(action);
                self.bind(action.offset, &declared, pipeline)?;
            }
            // The body of a definition does not see the caller's variables.
            ActionKind::Define | ActionKind::Block => {
                self.bind(action.offset, &declared, pipeline)?;
                self.open(action);
            }
            ActionKind::Else => {
                let chained = action.tokens.len() > 1;
                match self.blocks.last_mut() {
                    Some(block)
                        if matches!(
                            block.kind,
                            ActionKind::If | ActionKind::Range | ActionKind::With
                        ) =>
                    {
                        if block.else_seen {
                            return Err(TemplateError::new(
                                "expected {{end}}; found {{else}}",
                                action.offset,
                            ));
                        }
                        block.else_seen = !chained;
                    }
                    _ => return Err(TemplateError::new("unexpected {{else}}", action.offset)),
                }
                self.bind(action.offset, &declared, pipeline)?;
            }
            ActionKind::End => {
                if self.blocks.pop().is_none() {
                    return Err(TemplateError::new("unexpected {{end}}", action.offset));
                }
            }
            ActionKind::Break | ActionKind::Continue => {
                if !self
                    .blocks
                    .iter()
                    .any(|block| block.kind == ActionKind::Range)
                {
                    return Err(TemplateError::new(
                        format!("{{{{{}}}}} outside {{{{range}}}}", action.kind.keyword()),
                        action.offset,
                    ));
                }
            }
            ActionKind::Output | ActionKind::Template => {
                self.bind(action.offset, &declared, pipeline)?;
            }
            ActionKind::Comment => {}
        }
        Ok(())
    }

    fn open(&mut self, action: &Action) {
        self.blocks.push(OpenBlock {
            kind: action.kind,
            offset: action.offset,
            else_seen: false,
            variables: Vec::new(),
        });
    }

    /// Declares `declared` in the innermost scope, then checks every variable `pipeline` reads.
    fn bind(
        &mut self,
        offset: usize,
        declared: &[&str],
        pipeline: &[Token],
    ) -> Result<(), TemplateError> {
        let scope = match self.blocks.last_mut() {
            Some(block) => &mut block.variables,
            None => &mut self.variables,
        };
        scope.extend(declared.iter().map(|name| (*name).to_string()));

        for token in pipeline {
            if let Token::Variable(variable) = token {
                let name = variable_name(variable);
                if !self.is_declared(name) {
                    return Err(TemplateError::new(
                        format!("undefined variable {name:?}"),
                        offset,
                    ));
                }
            }
        }
        Ok(())
    }

    fn is_declared(&self, name: &str) -> bool {
        for block in self.blocks.iter().rev() {
            if block.variables.iter().any(|v| v == name) {
                return true;
            }
            if matches!(block.kind, ActionKind::Define | ActionKind::Block) {
                return name == "$";
            }
        }
        self.variables.iter().any(|v| v == name)
    }
}

/// The pipeline part of an action: everything after its keyword and template name.
fn pipeline_tokens(action: &Action) -> &[Token] {
    let skip = match action.kind {
        ActionKind::Output => 0,
        ActionKind::If | ActionKind::Range | ActionKind::With => 1,
        ActionKind::Else | ActionKind::Block | ActionKind::Template => 2,
        _ => action.tokens.len(),
    };
    action.tokens.get(skip..).unwrap_or_default()
}

/// Splits a leading `$x :=` or `$i, $x :=` off a pipeline. `$x =` is left in place as a use.
fn split_declarations(tokens: &[Token]) -> (Vec<&str>, &[Token]) {
    match tokens {
        [Token::Variable(name), Token::Declare, rest @ ..] => (vec![variable_name(name)], rest),
        [Token::Variable(first), Token::Comma, Token::Variable(second), Token::Declare, rest @ ..] => {
            (vec![variable_name(first), variable_name(second)], rest)
        }
        _ => (Vec::new(), tokens),
    }
}

/// `$x.Field.Chain` -> `$x`, `$.Field` -> `$`.
fn variable_name(variable: &str) -> &str {
    variable
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '.')
        .map_or(variable, |(i, _)| &variable[..i])
}

/// `-` followed by whitespace right after `{{` (or right before `}}`).
fn has_trim_marker(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

struct ScannedAction<'a> {
    /// Action body and its byte offset, or `None` for a comment.
    body: Option<(&'a str, usize)>,
    right_trim: bool,
    /// Byte offset just past the closing delimiter.
    end: usize,
}

fn scan_action(source: &str, open: usize, inner: usize) -> Result<ScannedAction<'_>, TemplateError> {
    let rest = &source[inner..];
    let leading_ws = rest.len() - rest.trim_start().len();

    if rest[leading_ws..].starts_with(LEFT_COMMENT) {
        let comment_start = inner + leading_ws + LEFT_COMMENT.len();
        let close = source[comment_start..]
            .find(RIGHT_COMMENT)
            .map(|rel| comment_start + rel + RIGHT_COMMENT.len())
            .ok_or_else(|| TemplateError::new("unclosed comment", open))?;

        let after = &source[close..];
        let trailing_ws = after.len() - after.trim_start().len();
        let (right_trim, delim_at) = if after.starts_with(RIGHT_DELIM) {
            (false, close)
        } else if trailing_ws > 0 && after[trailing_ws..].starts_with("-}}") {
            (true, close + trailing_ws + 1)
        } else {
            return Err(TemplateError::new(
                "comment ends before closing delimiter",
                close,
            ));
        };

        return Ok(ScannedAction {
            body: None,
            right_trim,
            end: delim_at + RIGHT_DELIM.len(),
        });
    }

    let mut chars = source[inner..].char_indices().peekable();
    while let Some((rel, c)) = chars.next() {
        let at = inner + rel;
        match c {
            '"' | '\'' => {
                let mut escaped = false;
                loop {
                    match chars.next() {
                        Some((_, '\n')) | None => {
                            let what = if c == '"' {
                                "unterminated quoted string"
                            } else {
                                "unterminated character constant"
                            };
                            return Err(TemplateError::new(what, at));
                        }
                        Some((_, '\\')) if !escaped => escaped = true,
                        Some((_, q)) if q == c && !escaped => break,
                        Some(_) => escaped = false,
                    }
                }
            }
            '`' => {
                if !chars.any(|(_, q)| q == '`') {
                    return Err(TemplateError::new("unterminated raw quoted string", at));
                }
            }
            '}' if source[at..].starts_with(RIGHT_DELIM) => {
                let mut body = &source[inner..at];
                let mut right_trim = false;
                if let Some(stripped) = body.strip_suffix('-') {
                    if stripped.ends_with(char::is_whitespace) {
                        body = stripped;
                        right_trim = true;
                    }
                }
                return Ok(ScannedAction {
                    body: Some((body, inner)),
                    right_trim,
                    end: at + RIGHT_DELIM.len(),
                });
            }
            _ => {}
        }
    }

    Err(TemplateError::new("unclosed action", open))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex_action(body: &str, base: usize) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let at = base + start;
        match c {
            c if c.is_whitespace() => {}
            '|' => tokens.push(Token::Pipe),
            '(' => tokens.push(Token::LeftParen),
            ')' => tokens.push(Token::RightParen),
            ',' => tokens.push(Token::Comma),
            '=' => tokens.push(Token::Assign),
            ':' => {
                if chars.next_if(|&(_, next)| next == '=').is_none() {
                    return Err(TemplateError::new("expected :=", at));
                }
                tokens.push(Token::Declare);
            }
            '"' => {
                let mut value = String::new();
                let mut escaped = false;
                for (_, q) in chars.by_ref() {
                    if escaped {
                        value.push(q);
                        escaped = false;
                    } else if q == '\\' {
                        escaped = true;
                    } else if q == '"' {
                        break;
                    } else {
                        value.push(q);
                    }
                }
                tokens.push(Token::Str(value));
            }
            '\'' => {
                let mut value = String::new();
                let mut escaped = false;
                for (_, q) in chars.by_ref() {
                    if escaped {
                        value.push(q);
                        escaped = false;
                    } else if q == '\\' {
                        escaped = true;
                    } else if q == '\'' {
                        break;
                    } else {
                        value.push(q);
                    }
                }
                if value.chars().count() != 1 {
                    return Err(TemplateError::new("malformed character constant", at));
                }
                tokens.push(Token::Char(value));
            }
            '`' => {
                let value: String = chars.by_ref().map(|(_, q)| q).take_while(|&q| q != '`').collect();
                tokens.push(Token::Str(value));
            }
            '.' => match chars.peek() {
                Some(&(_, next)) if next.is_ascii_digit() => {
                    let end = take_number(&mut chars, start + 1);
                    tokens.push(Token::Number(body[start..end].to_string()));
                }
                Some(&(i, next)) if is_ident_start(next) => {
                    chars.next();
                    let end = take_ident(&mut chars, i + next.len_utf8());
                    let end = take_fields(&mut chars, end);
                    tokens.push(Token::Field(body[start..end].to_string()));
                }
                _ => tokens.push(Token::Field(".".to_string())),
            },
            '$' => {
                let end = take_ident(&mut chars, start + 1);
                let end = take_fields(&mut chars, end);
                tokens.push(Token::Variable(body[start..end].to_string()));
            }
            '+' | '-' if chars.peek().is_some_and(|&(_, next)| next.is_ascii_digit()) => {
                let end = take_number(&mut chars, start + 1);
                tokens.push(Token::Number(body[start..end].to_string()));
            }
            c if c.is_ascii_digit() => {
                let end = take_number(&mut chars, start + 1);
                tokens.push(Token::Number(body[start..end].to_string()));
            }
            c if is_ident_start(c) => {
                let end = take_ident(&mut chars, start + c.len_utf8());
                tokens.push(Token::Identifier(body[start..end].to_string()));
            }
            other => {
                return Err(TemplateError::new(
                    format!("unexpected {other:?} in action"),
                    at,
                ))
            }
        }
    }

    Ok(tokens)
}

/// Consumes `[A-Za-z0-9_]*` and returns the end offset.
fn take_ident(chars: &mut Chars<'_>, mut end: usize) -> usize {
    while let Some(&(i, c)) = chars.peek() {
        if !is_ident_continue(c) {
            break;
        }
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

/// Consumes a trailing `.Field.Chain` and returns the end offset.
fn take_fields(chars: &mut Chars<'_>, mut end: usize) -> usize {
    loop {
        let mut lookahead = chars.clone();
        match (lookahead.next(), lookahead.next()) {
            (Some((_, '.')), Some((i, c))) if is_ident_start(c) => {
                chars.next();
                chars.next();
                end = take_ident(chars, i + c.len_utf8());
            }
            _ => return end,
        }
    }
}

fn take_number(chars: &mut Chars<'_>, mut end: usize) -> usize {
    let mut prev = ' ';
    while let Some(&(i, c)) = chars.peek() {
        let exponent_sign = matches!(c, '+' | '-') && matches!(prev, 'e' | 'E' | 'p' | 'P');
        if !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign) {
            break;
        }
        prev = c;
        end = i + c.len_utf8();
        chars.next();
    }
    end
}

fn keyword_of(token: Option<&Token>) -> Option<&str> {
    match token {
        Some(Token::Identifier(name)) if KEYWORDS.contains(&name.as_str()) => Some(name),
        _ => None,
    }
}

fn classify(tokens: &[Token], offset: usize) -> Result<ActionKind, TemplateError> {
    let err = |message: String| TemplateError::new(message, offset);

    let Some(first) = tokens.first() else {
        return Err(err("missing value for command".to_string()));
    };
    let rest = &tokens[1..];

    let kind = match keyword_of(Some(first)) {
        None => {
            check_pipeline(tokens).map_err(err)?;
            return Ok(ActionKind::Output);
        }
        Some("if") => ActionKind::If,
        Some("range") => ActionKind::Range,
        Some("with") => ActionKind::With,
        Some("else") => {
            match keyword_of(rest.first()) {
                None if rest.is_empty() => {}
                Some("if" | "with" | "range") => {
                    require_pipeline("else", &rest[1..]).map_err(err)?;
                }
                _ => return Err(err("unexpected tokens after {{else}}".to_string())),
            }
            return Ok(ActionKind::Else);
        }
        Some(keyword @ ("end" | "break" | "continue")) => {
            if !rest.is_empty() {
                return Err(err(format!("unexpected tokens in {{{{{keyword}}}}}")));
            }
            return Ok(match keyword {
                "end" => ActionKind::End,
                "break" => ActionKind::Break,
                _ => ActionKind::Continue,
            });
        }
        Some("define") => {
            if !matches!(rest, [Token::Str(_)]) {
                return Err(err("{{define}} expects a single quoted name".to_string()));
            }
            return Ok(ActionKind::Define);
        }
        Some(keyword @ ("block" | "template")) => {
            let Some((Token::Str(_), args)) = rest.split_first() else {
                return Err(err(format!("{{{{{keyword}}}}} expects a quoted name")));
            };
            if keyword == "block" {
                require_pipeline(keyword, args).map_err(err)?;
                return Ok(ActionKind::Block);
            }
            if !args.is_empty() {
                check_pipeline(args).map_err(err)?;
            }
            return Ok(ActionKind::Template);
        }
        Some(other) => return Err(err(format!("unexpected keyword {other:?}"))),
    };

    require_pipeline(kind.keyword(), rest).map_err(err)?;
    Ok(kind)
}

fn require_pipeline(keyword: &str, tokens: &[Token]) -> Result<(), String> {
    if tokens.is_empty() {
        return Err(format!("missing value for {keyword}"));
    }
    check_pipeline(tokens)
}

fn check_pipeline(tokens: &[Token]) -> Result<(), String> {
    let tokens = skip_declarations(tokens);
    if tokens.is_empty() {
        return Err("missing value for command".to_string());
    }

    let mut depth = 0usize;
    let mut command_len = 0usize;
    let mut command_starts_with_literal = false;

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Pipe if depth == 0 => {
                if command_len == 0 {
                    return Err("missing command in pipeline".to_string());
                }
                command_len = 0;
                continue;
            }
            Token::LeftParen => {
                if tokens.get(i + 1) == Some(&Token::RightParen) {
                    return Err("missing command in parenthesized pipeline".to_string());
                }
                depth += 1;
            }
            Token::RightParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unexpected right paren".to_string())?;
            }
            Token::Declare | Token::Assign | Token::Comma => {
                return Err("unexpected variable declaration".to_string());
            }
            Token::Identifier(name) => {
                if KEYWORDS.contains(&name.as_str()) {
                    return Err(format!("unexpected keyword {name:?}"));
                }
                if !matches!(name.as_str(), "nil" | "true" | "false")
                    && !KNOWN_FUNCTIONS.contains(name.as_str())
                {
                    return Err(format!("function {name:?} not defined"));
                }
            }
            _ => {}
        }

        if depth == 0 || matches!(token, Token::LeftParen) && depth == 1 {
            if command_len == 0 {
                command_starts_with_literal = is_literal(token);
            } else if command_starts_with_literal {
                return Err("can't give argument to non-function".to_string());
            }
            command_len += 1;
        }
    }

    if depth > 0 {
        return Err("unclosed left paren".to_string());
    }
    if command_len == 0 {
        return Err("missing command in pipeline".to_string());
    }
    Ok(())
}

fn is_literal(token: &Token) -> bool {
    match token {
        Token::Str(_) | Token::Char(_) | Token::Number(_) => true,
        Token::Identifier(name) => matches!(name.as_str(), "nil" | "true" | "false"),
        _ => false,
    }
}

/// Skips a leading `$x :=`, `$x =` or `$i, $x :=`.
fn skip_declarations(tokens: &[Token]) -> &[Token] {
    match tokens {
        [Token::Variable(_), Token::Declare | Token::Assign, rest @ ..]
        | [Token::Variable(_), Token::Comma, Token::Variable(_), Token::Declare | Token::Assign, rest @ ..] => {
            rest
        }
        _ => tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(source: &str) -> String {
        Template::parse(source).unwrap_err().message
    }

    #[test]
    fn test_plain_text() {
        let template = Template::parse("just text").unwrap();
        assert_eq!(template.nodes, [Node::Text("just text".to_string())]);
        assert!(!template.has_dynamic_content());
    }

    #[test]
    fn test_lone_closing_delimiter_is_text() {
        let template = Template::parse("foo }} bar").unwrap();
        assert_eq!(template.literal_text(), "foo }} bar");
    }

    #[test]
    fn test_command_placeholder() {
        let template = Template::parse("echo hi; {{.Command}}").unwrap();
        assert_eq!(template.placeholder_count(".Command"), 1);
        assert_eq!(template.literal_text(), "echo hi; ");

        let spaced = Template::parse("sudo {{ .Command }}").unwrap();
        assert_eq!(spaced.placeholder_count(".Command"), 1);

        let piped = Template::parse("{{.Command | printf \"%s\"}}").unwrap();
        assert_eq!(piped.placeholder_count(".Command"), 0);
    }

    #[test]
    fn test_unclosed_action() {
        assert_eq!(parse_err("foo {{"), "unclosed action");
        assert_eq!(parse_err("foo {{ .Name"), "unclosed action");
        assert_eq!(Template::parse("foo {{").unwrap_err().offset, 4);
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(parse_err("{{ nope }}"), "function \"nope\" not defined");
        assert!(Template::parse("{{ timestamp }}").is_ok());
        assert!(Template::parse("{{ isotime \"2006-01-02\" }}").is_ok());
        assert!(Template::parse("{{ clean_image_name .Name }}").is_ok());
    }

    #[test]
    fn test_empty_action() {
        assert_eq!(parse_err("a {{ }} b"), "missing value for command");
    }

    #[test]
    fn test_strings_may_contain_delimiters() {
        let template = Template::parse(r#"{{ printf "%s}}" .Name }}"#).unwrap();
        assert_eq!(template.actions().count(), 1);
        assert_eq!(parse_err(r#"{{ printf "oops }}"#), "unterminated quoted string");
        assert_eq!(parse_err("{{ printf `raw }}"), "unterminated raw quoted string");
    }

    #[test]
    fn test_blocks() {
        assert!(Template::parse("{{if .X}}a{{else if .Y}}b{{else}}c{{end}}").is_ok());
        assert!(Template::parse("{{range $i, $v := .Items}}{{$v}}{{end}}").is_ok());
        assert!(Template::parse("{{range .Items}}{{break}}{{end}}").is_ok());
        assert!(parse_err("{{if .X}}a").contains("never closed"));
        assert_eq!(parse_err("a{{end}}"), "unexpected {{end}}");
        assert_eq!(parse_err("{{else}}"), "unexpected {{else}}");
        assert_eq!(parse_err("{{break}}"), "{{break}} outside {{range}}");
        assert_eq!(parse_err("{{if}}{{end}}"), "missing value for if");
    }

    #[test]
    fn test_else_after_else() {
        assert_eq!(
            parse_err("{{if .X}}a{{else}}b{{else}}c{{end}}"),
            "expected {{end}}; found {{else}}"
        );
        assert_eq!(
            parse_err("{{if .X}}a{{else}}b{{else if .Y}}c{{end}}"),
            "expected {{end}}; found {{else}}"
        );
        assert!(Template::parse("{{if .X}}a{{else if .Y}}b{{else if .Z}}c{{else}}d{{end}}").is_ok());
        assert!(Template::parse("{{range .A}}{{if .X}}a{{else}}b{{end}}{{else}}none{{end}}").is_ok());
    }

    #[test]
    fn test_variables_must_be_declared() {
        assert_eq!(parse_err("{{$nope}}"), "undefined variable \"$nope\"");
        assert_eq!(parse_err("{{$x = 1}}"), "undefined variable \"$x\"");
        assert!(Template::parse("{{$}} {{$.Name}}").is_ok());
        assert!(Template::parse("{{$x := .Name}}{{$x}}{{$x = 2}}{{$x.Len}}").is_ok());
        assert!(Template::parse("{{if $v := .X}}{{$v}}{{else}}{{$v}}{{end}}").is_ok());
    }

    #[test]
    fn test_variables_are_scoped_to_their_block() {
        assert_eq!(
            parse_err("{{range $i, $v := .Items}}{{end}}{{$v}}"),
            "undefined variable \"$v\""
        );
        assert_eq!(
            parse_err("{{$x := 1}}{{define \"t\"}}{{$x}}{{end}}"),
            "undefined variable \"$x\""
        );
        assert!(Template::parse("{{$x := 1}}{{if .Y}}{{$x}}{{end}}").is_ok());
        assert!(Template::parse("{{define \"t\"}}{{$.Name}}{{end}}").is_ok());
    }

    #[test]
    fn test_character_constants() {
        assert!(Template::parse("{{printf \"%c\" 'x'}}").is_ok());
        assert_eq!(parse_err("{{printf \"%c\" 'x }}"), "unterminated character constant");
        assert_eq!(parse_err("{{printf \"%c\" 'xy'}}"), "malformed character constant");
    }

    #[test]
    fn test_template_and_block_actions() {
        let template = Template::parse("{{template \"base\" .}}").unwrap();
        assert!(template.has_dynamic_content());
        assert!(Template::parse("{{template \"base\"}}").is_ok());
        assert_eq!(
            parse_err("{{template base}}"),
            "{{template}} expects a quoted name"
        );

        assert!(Template::parse("{{block \"name\" .}}default{{end}}").is_ok());
        assert_eq!(parse_err("{{block \"name\"}}x{{end}}"), "missing value for block");
        assert!(parse_err("{{block \"name\" .}}x").contains("{{block}} is never closed"));
    }

    #[test]
    fn test_comments() {
        let template = Template::parse("a {{/* note */}} b").unwrap();
        assert_eq!(template.literal_text(), "a  b");
        assert!(!template.has_dynamic_content());
        assert_eq!(parse_err("{{/* never closed"), "unclosed comment");
        assert_eq!(
            parse_err("{{/* c */ x}}"),
            "comment ends before closing delimiter"
        );
    }

    #[test]
    fn test_trim_markers() {
        let template = Template::parse("a   {{- .X -}}   b").unwrap();
        assert_eq!(template.literal_text(), "ab");

        // `{{-3}}` is a negative number, not a trim marker.
        let number = Template::parse("a {{-3}}").unwrap();
        assert_eq!(number.literal_text(), "a ");
    }

    #[test]
    fn test_parens_and_pipelines() {
        assert!(Template::parse("{{ (lower .Name) | upper }}").is_ok());
        assert_eq!(parse_err("{{ (lower .Name }}"), "unclosed left paren");
        assert_eq!(parse_err("{{ lower .Name) }}"), "unexpected right paren");
        assert_eq!(parse_err("{{ .Name | }}"), "missing command in pipeline");
        assert_eq!(
            parse_err("{{ \"x\" .Name }}"),
            "can't give argument to non-function"
        );
    }

    #[test]
    fn test_is_blank() {
        assert!(Template::parse("").unwrap().is_blank());
        assert!(Template::parse("   ").unwrap().is_blank());
        assert!(Template::parse("{{/* nothing */}}").unwrap().is_blank());
        assert!(!Template::parse("{{timestamp}}").unwrap().is_blank());
        assert!(!Template::parse("x").unwrap().is_blank());
    }
}
