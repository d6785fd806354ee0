//! Proto source parser.
//!
//! Extracts the declarations the build needs from `.proto` files: syntax,
//! package, imports, messages, enums, and services with their RPCs. Field
//! definitions and options are skipped. Code generation itself is left to
//! `protoc`; this parser only has to be precise about declarations and block
//! structure.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::error::{CompilerError, Result};

/// A parsed `.proto` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtoFile {
    /// Path relative to the source root, with `/` separators.
    pub path: String,
    /// Value of the `syntax` statement, if any.
    pub syntax: Option<String>,
    /// Declared package, if any.
    pub package: Option<String>,
    /// Imported files.
    pub imports: Vec<String>,
    /// Messages, nested ones qualified by their parent (`Outer.Inner`).
    pub messages: Vec<Declaration>,
    /// Enums, qualified the same way as messages.
    pub enums: Vec<Declaration>,
    /// Services.
    pub services: Vec<ServiceDef>,
}

/// A named declaration and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    /// Qualified name within the package.
    pub name: String,
    /// 1-based line number.
    pub line: usize,
}

/// A service declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDef {
    /// Service name.
    pub name: String,
    /// 1-based line number.
    pub line: usize,
    /// RPC methods in declaration order.
    pub rpcs: Vec<RpcDef>,
}

/// An RPC method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcDef {
    /// Method name.
    pub name: String,
    /// Request message type.
    pub request: String,
    /// Response message type.
    pub response: String,
    /// Whether the request is a stream.
    pub client_streaming: bool,
    /// Whether the response is a stream.
    pub server_streaming: bool,
}

impl ProtoFile {
    /// Parses a proto file located under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is malformed.
    pub fn parse_file(root: &Path, path: &Path) -> Result<Self> {
        debug!(?path, "Parsing proto file");

        let source = fs::read_to_string(path).map_err(|e| CompilerError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Self::parse_source(&source, &relative)
    }

    /// Parses proto source text.
    ///
    /// # Errors
    ///
    /// Returns an error if braces or parentheses do not balance, a string or
    /// comment is unterminated, or a declaration is incomplete.
    pub fn parse_source(source: &str, file_name: &str) -> Result<Self> {
        let tokens = tokenize(source, file_name)?;
        DeclParser {
            file_name,
            tokens: &tokens,
            pos: 0,
            file: Self {
                path: file_name.to_string(),
                syntax: None,
                package: None,
                imports: Vec::new(),
                messages: Vec::new(),
                enums: Vec::new(),
                services: Vec::new(),
            },
        }
        .run()
    }

    /// Returns the name of the Rust file the generator writes for this
    /// file's package.
    #[must_use]
    pub fn generated_file_name(&self) -> String {
        format!("{}.rs", self.package.as_deref().unwrap_or("_"))
    }

    /// Returns the package split on `.`.
    #[must_use]
    pub fn package_segments(&self) -> Vec<&str> {
        self.package
            .as_deref()
            .map(|p| p.split('.').collect())
            .unwrap_or_default()
    }

    /// Qualifies a local name with the package.
    #[must_use]
    pub fn qualify(&self, name: &str) -> String {
        match &self.package {
            Some(package) => format!("{package}.{name}"),
            None => name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

fn tokenize(source: &str, file_name: &str) -> Result<Vec<Token>> {
    let parse_err = |line: usize, message: &str| CompilerError::ParseError {
        file: file_name.to_string(),
        line,
        message: message.to_string(),
    };

    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                let start = line;
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '\n' {
                        line += 1;
                    }
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(parse_err(start, "unterminated block comment"));
                }
            }
            '"' | '\'' => {
                let start = line;
                let mut value = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        '\n' => break,
                        ch if ch == c => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(parse_err(start, "unterminated string literal"));
                }
                tokens.push(Token {
                    kind: TokenKind::Str(value),
                    line: start,
                });
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' || next == '.' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Word(word),
                    line,
                });
            }
            c => tokens.push(Token {
                kind: TokenKind::Punct(c),
                line,
            }),
        }
    }

    Ok(tokens)
}

#[derive(Debug)]
enum Scope {
    Message(String),
    Enum,
    Service(usize),
    Other,
}

struct DeclParser<'a> {
    file_name: &'a str,
    tokens: &'a [Token],
    pos: usize,
    file: ProtoFile,
}

impl DeclParser<'_> {
    fn run(mut self) -> Result<ProtoFile> {
        let mut scopes: Vec<Scope> = Vec::new();
        let mut statement_start = true;

        while let Some(Token { kind, line }) = self.next().cloned() {
            match kind {
                TokenKind::Punct('{') => {
                    scopes.push(Scope::Other);
                    statement_start = true;
                }
                TokenKind::Punct('}') => {
                    if scopes.pop().is_none() {
                        return Err(self.error(line, "unbalanced closing brace"));
                    }
                    statement_start = true;
                }
                TokenKind::Punct(';') => statement_start = true,
                TokenKind::Word(word) if statement_start => {
                    self.statement(&word, line, &mut scopes)?;
                    // Keyword statements consume through their terminator.
                    statement_start =
                        matches!(self.peek_prev(), Some(TokenKind::Punct(';' | '{')));
                }
                _ => statement_start = false,
            }
        }

        if let Some(scope) = scopes.last() {
            let what = match scope {
                Scope::Message(name) => format!("message {name} is not closed"),
                Scope::Enum => "enum block is not closed".to_string(),
                Scope::Service(idx) => {
                    format!("service {} is not closed", self.file.services[*idx].name)
                }
                Scope::Other => "block is not closed".to_string(),
            };
            let last_line = self.tokens.last().map_or(1, |t| t.line);
            return Err(self.error(last_line, &what));
        }

        Ok(self.file)
    }

    fn statement(&mut self, keyword: &str, line: usize, scopes: &mut Vec<Scope>) -> Result<()> {
        let top_level = scopes.is_empty();
        let in_message = matches!(scopes.last(), Some(Scope::Message(_)));
        let service = match scopes.last() {
            Some(Scope::Service(idx)) => Some(*idx),
            _ => None,
        };

        match keyword {
            "syntax" if top_level => {
                self.expect_punct('=', line)?;
                let value = self.expect_string(line)?;
                self.expect_punct(';', line)?;
                self.file.syntax = Some(value);
            }
            "package" if top_level => {
                let name = self.expect_word(line, "package name")?;
                self.expect_punct(';', line)?;
                if self.file.package.is_some() {
                    return Err(self.error(line, "duplicate package declaration"));
                }
                self.file.package = Some(name);
            }
            "import" if top_level => {
                if matches!(self.peek(), Some(TokenKind::Word(w)) if w == "public" || w == "weak")
                {
                    self.pos += 1;
                }
                let path = self.expect_string(line)?;
                self.expect_punct(';', line)?;
                self.file.imports.push(path);
            }
            "message" if top_level || in_message => {
                let name = self.expect_word(line, "message name")?;
                self.expect_punct('{', line)?;
                let qualified = Self::nested_name(scopes, &name);
                self.file.messages.push(Declaration {
                    name: qualified.clone(),
                    line,
                });
                scopes.push(Scope::Message(qualified));
            }
            "enum" if top_level || in_message => {
                let name = self.expect_word(line, "enum name")?;
                self.expect_punct('{', line)?;
                self.file.enums.push(Declaration {
                    name: Self::nested_name(scopes, &name),
                    line,
                });
                scopes.push(Scope::Enum);
            }
            "service" if top_level => {
                let name = self.expect_word(line, "service name")?;
                self.expect_punct('{', line)?;
                self.file.services.push(ServiceDef {
                    name,
                    line,
                    rpcs: Vec::new(),
                });
                scopes.push(Scope::Service(self.file.services.len() - 1));
            }
            "rpc" if service.is_some() => {
                let rpc = self.rpc(line)?;
                if let Some(idx) = service {
                    self.file.services[idx].rpcs.push(rpc);
                }
                match self.next().map(|t| t.kind.clone()) {
                    Some(TokenKind::Punct(';')) => {}
                    Some(TokenKind::Punct('{')) => scopes.push(Scope::Other),
                    _ => return Err(self.error(line, "expected ';' or '{' after rpc")),
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn rpc(&mut self, line: usize) -> Result<RpcDef> {
        let name = self.expect_word(line, "rpc name")?;
        let (client_streaming, request) = self.rpc_type(line)?;
        match self.next().map(|t| t.kind.clone()) {
            Some(TokenKind::Word(w)) if w == "returns" => {}
            _ => return Err(self.error(line, "expected 'returns'")),
        }
        let (server_streaming, response) = self.rpc_type(line)?;
        Ok(RpcDef {
            name,
            request,
            response,
            client_streaming,
            server_streaming,
        })
    }

    fn rpc_type(&mut self, line: usize) -> Result<(bool, String)> {
        self.expect_punct('(', line)?;
        let mut name = self.expect_word(line, "message type")?;
        let streaming = name == "stream" && matches!(self.peek(), Some(TokenKind::Word(_)));
        if streaming {
            name = self.expect_word(line, "message type")?;
        }
        self.expect_punct(')', line)?;
        Ok((streaming, name))
    }

    fn nested_name(scopes: &[Scope], name: &str) -> String {
        match scopes.last() {
            Some(Scope::Message(parent)) => format!("{parent}.{name}"),
            _ => name.to_string(),
        }
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_prev(&self) -> Option<&TokenKind> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| &t.kind)
    }

    fn expect_punct(&mut self, expected: char, line: usize) -> Result<()> {
        match self.next().map(|t| t.kind.clone()) {
            Some(TokenKind::Punct(c)) if c == expected => Ok(()),
            _ => Err(self.error(line, &format!("expected '{expected}'"))),
        }
    }

    fn expect_word(&mut self, line: usize, what: &str) -> Result<String> {
        match self.next().map(|t| t.kind.clone()) {
            Some(TokenKind::Word(w)) => Ok(w),
            _ => Err(self.error(line, &format!("expected {what}"))),
        }
    }

    fn expect_string(&mut self, line: usize) -> Result<String> {
        match self.next().map(|t| t.kind.clone()) {
            Some(TokenKind::Str(s)) => Ok(s),
            _ => Err(self.error(line, "expected string literal")),
        }
    }

    fn error(&self, line: usize, message: &str) -> CompilerError {
        CompilerError::ParseError {
            file: self.file_name.to_string(),
            line,
            message: message.to_string(),
        }
    }
}
