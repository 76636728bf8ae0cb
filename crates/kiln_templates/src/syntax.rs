//! Template syntax parser.
//!
//! Templates are plain text with `{{ }}` actions:
//!
//! - `{{.Name}}` substitutes a variable
//! - `{{snake .Name}}` / `{{.Name | snake}}` call a helper
//! - `{{if .A}}..{{else if eq .B "x"}}..{{else}}..{{end}}` selects a branch
//! - `{{/* comment */}}` is dropped
//! - `{{-` and `-}}` trim surrounding whitespace

/// Parsed template node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If {
        branches: Vec<(Pipeline, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
}

/// `cmd | cmd | ...`; each result is passed as the last argument of the next.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

/// A function call or a single operand.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Field(String),
    Ident(String),
    Str(String),
    Int(i64),
    Bool(bool),
    Nested(Pipeline),
}

impl Pipeline {
    /// Variable names referenced anywhere in the pipeline.
    pub fn fields(&self, out: &mut Vec<String>) {
        for command in &self.commands {
            for arg in &command.args {
                match arg {
                    Arg::Field(name) => out.push(name.clone()),
                    Arg::Nested(inner) => inner.fields(out),
                    _ => {}
                }
            }
        }
    }
}

/// Variable names referenced anywhere in the nodes.
pub(crate) fn collect_fields(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Text(_) => {}
            Node::Action(p) => p.fields(out),
            Node::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    cond.fields(out);
                    collect_fields(body, out);
                }
                collect_fields(otherwise, out);
            }
        }
    }
}

/// Syntax error with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

type ParseResult<T> = Result<T, SyntaxError>;

#[derive(Debug, Clone)]
enum Item {
    Text(String),
    Action { body: String, line: usize },
}

/// Parse a whole template.
pub(crate) fn parse(template: &str) -> ParseResult<Vec<Node>> {
    let items = split(template)?;
    let mut parser = Parser { items, pos: 0 };
    let (nodes, end) = parser.nodes()?;
    match end {
        Terminator::Eof => Ok(nodes),
        Terminator::Else { line, .. } => Err(SyntaxError {
            line,
            message: "unexpected {{else}}".to_string(),
        }),
        Terminator::End { line } => Err(SyntaxError {
            line,
            message: "unexpected {{end}}".to_string(),
        }),
    }
}

/// Parse the inside of a single action, e.g. `eq .Database "postgres"`.
pub(crate) fn parse_pipeline(body: &str, line: usize) -> ParseResult<Pipeline> {
    let tokens = tokenize(body, line)?;
    let mut pos = 0;
    let pipeline = pipeline(&tokens, &mut pos, line)?;
    if pos != tokens.len() {
        return Err(SyntaxError {
            line,
            message: format!("unexpected {:?} in action", tokens[pos]),
        });
    }
    Ok(pipeline)
}

/// Split raw text into text runs and action bodies, applying trim markers.
fn split(template: &str) -> ParseResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut rest = template;
    let mut line = 1;
    let mut trim_next = false;

    while let Some(start) = rest.find("{{") {
        let mut text = &rest[..start];
        if trim_next {
            text = text.trim_start();
        }
        let after_open = &rest[start + 2..];
        let trim_prev = after_open.starts_with("- ")
            || after_open.starts_with("-\t")
            || after_open.starts_with("-\n");
        if trim_prev {
            text = text.trim_end();
        }
        if !text.is_empty() {
            items.push(Item::Text(text.to_string()));
        }
        line += rest[..start].matches('\n').count();

        let inner_start = if trim_prev { 1 } else { 0 };
        let close = find_close(after_open).ok_or_else(|| SyntaxError {
            line,
            message: "unclosed action".to_string(),
        })?;
        let mut body = &after_open[inner_start..close];
        trim_next = false;
        if body.ends_with(" -") || body.ends_with("\t-") || body.ends_with("\n-") {
            body = &body[..body.len() - 1];
            trim_next = true;
        }

        let trimmed = body.trim();
        if trimmed.starts_with("/*") {
            if !trimmed.ends_with("*/") {
                return Err(SyntaxError {
                    line,
                    message: "unclosed comment".to_string(),
                });
            }
        } else {
            items.push(Item::Action {
                body: trimmed.to_string(),
                line,
            });
        }

        line += after_open[..close].matches('\n').count();
        rest = &after_open[close + 2..];
    }

    let text = if trim_next { rest.trim_start() } else { rest };
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
    Ok(items)
}

/// Offset of the closing `}}`, skipping over quoted strings.
fn find_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q == b'"' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' {
                    quote = Some(b);
                } else if b == b'}' && bytes.get(i + 1) == Some(&b'}') {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

enum Terminator {
    Eof,
    Else { cond: Option<Pipeline>, line: usize },
    End { line: usize },
}

struct Parser {
    items: Vec<Item>,
    pos: usize,
}

impl Parser {
    fn nodes(&mut self) -> ParseResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();
        while self.pos < self.items.len() {
            let index = self.pos;
            self.pos += 1;
            match self.items[index].clone() {
                Item::Text(text) => nodes.push(Node::Text(text)),
                Item::Action { body, line } => {
                    let (keyword, rest) = split_keyword(&body);
                    match keyword {
                        "if" => nodes.push(self.if_block(rest, line)?),
                        "else" => {
                            let rest = rest.trim();
                            let cond = if rest.is_empty() {
                                None
                            } else if let Some(cond) = rest.strip_prefix("if ") {
                                Some(parse_pipeline(cond, line)?)
                            } else {
                                return Err(SyntaxError {
                                    line,
                                    message: format!("unexpected `{}` after else", rest),
                                });
                            };
                            return Ok((nodes, Terminator::Else { cond, line }));
                        }
                        "end" => return Ok((nodes, Terminator::End { line })),
                        _ => nodes.push(Node::Action(parse_pipeline(&body, line)?)),
                    }
                }
            }
        }
        Ok((nodes, Terminator::Eof))
    }

    fn if_block(&mut self, cond: &str, line: usize) -> ParseResult<Node> {
        if cond.trim().is_empty() {
            return Err(SyntaxError {
                line,
                message: "missing condition in {{if}}".to_string(),
            });
        }
        let mut branches = Vec::new();
        let mut current = parse_pipeline(cond, line)?;

        loop {
            let (body, end) = self.nodes()?;
            match end {
                Terminator::End { .. } => {
                    branches.push((current, body));
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    });
                }
                Terminator::Else {
                    cond: Some(next), ..
                } => {
                    branches.push((current, body));
                    current = next;
                }
                Terminator::Else { cond: None, .. } => {
                    branches.push((current, body));
                    let (otherwise, end) = self.nodes()?;
                    return match end {
                        Terminator::End { .. } => Ok(Node::If {
                            branches,
                            otherwise,
                        }),
                        Terminator::Else { line, .. } => Err(SyntaxError {
                            line,
                            message: "{{else}} after final {{else}}".to_string(),
                        }),
                        Terminator::Eof => Err(SyntaxError {
                            line,
                            message: "unclosed {{if}}".to_string(),
                        }),
                    };
                }
                Terminator::Eof => {
                    return Err(SyntaxError {
                        line,
                        message: "unclosed {{if}}".to_string(),
                    })
                }
            }
        }
    }
}

fn split_keyword(body: &str) -> (&str, &str) {
    match body.find(char::is_whitespace) {
        Some(i) => (&body[..i], &body[i..]),
        None => (body, ""),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Ident(String),
    Str(String),
    Int(i64),
    Pipe,
    Open,
    Close,
}

fn tokenize(body: &str, line: usize) -> ParseResult<Vec<Token>> {
    let err = |message: String| SyntaxError { line, message };
    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '|' {
            tokens.push(Token::Pipe);
            i += 1;
        } else if c == '(' {
            tokens.push(Token::Open);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::Close);
            i += 1;
        } else if c == '"' {
            let mut value = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(err("unterminated string".to_string()));
                };
                i += 1;
                match ch {
                    '"' => break,
                    '\\' => {
                        let escaped = chars
                            .get(i)
                            .ok_or_else(|| err("unterminated string".to_string()))?;
                        i += 1;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                    }
                    other => value.push(other),
                }
            }
            tokens.push(Token::Str(value));
        } else if c == '`' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|&ch| ch == '`')
                .ok_or_else(|| err("unterminated raw string".to_string()))?;
            tokens.push(Token::Str(chars[start..start + end].iter().collect()));
            i = start + end + 1;
        } else if c == '.' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            if end == start {
                return Err(err("expected a variable name after `.`".to_string()));
            }
            tokens.push(Token::Field(chars[start..end].iter().collect()));
            i = end;
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<i64>()
                .map_err(|e| err(format!("invalid number {}: {}", text, e)))?;
            tokens.push(Token::Int(value));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            return Err(err(format!("unexpected character `{}`", c)));
        }
    }
    Ok(tokens)
}

fn pipeline(tokens: &[Token], pos: &mut usize, line: usize) -> ParseResult<Pipeline> {
    let mut commands = vec![command(tokens, pos, line)?];
    while tokens.get(*pos) == Some(&Token::Pipe) {
        *pos += 1;
        commands.push(command(tokens, pos, line)?);
    }
    Ok(Pipeline { commands })
}

fn command(tokens: &[Token], pos: &mut usize, line: usize) -> ParseResult<Command> {
    let mut args = Vec::new();
    while let Some(token) = tokens.get(*pos) {
        let arg = match token {
            Token::Pipe | Token::Close => break,
            Token::Field(name) => Arg::Field(name.clone()),
            Token::Ident(name) if name == "true" => Arg::Bool(true),
            Token::Ident(name) if name == "false" => Arg::Bool(false),
            Token::Ident(name) => Arg::Ident(name.clone()),
            Token::Str(s) => Arg::Str(s.clone()),
            Token::Int(i) => Arg::Int(*i),
            Token::Open => {
                *pos += 1;
                let inner = pipeline(tokens, pos, line)?;
                if tokens.get(*pos) != Some(&Token::Close) {
                    return Err(SyntaxError {
                        line,
                        message: "missing `)`".to_string(),
                    });
                }
                Arg::Nested(inner)
            }
        };
        args.push(arg);
        *pos += 1;
    }
    if args.is_empty() {
        return Err(SyntaxError {
            line,
            message: "empty command".to_string(),
        });
    }
    Ok(Command { args })
}
