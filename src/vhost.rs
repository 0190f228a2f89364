// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

//! nginx-sp virtual host parsing.
//!
//! The grammar is nginx's directive format: `name arg... ;` or
//! `name arg... { ... }`, with `#` comments and quoted arguments.
//! Only enough of it is understood to recover the owner and the
//! served domains of an app.

use crate::config::Paths;
use crate::domain::DomainSet;
use crate::error::{Error, Result};
use std::path::{Component, Path};
use tracing::trace;

/// A single directive, with children when it opens a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub block: Option<Vec<Directive>>,
    pub line: usize,
}

impl Directive {
    /// First child directive with the given name (`None` when this is not a block).
    pub fn child(&self, name: &str) -> Option<&Directive> {
        self.block.iter().flatten().find(|d| d.name == name)
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semi,
}

fn tokenize(input: &str) -> std::result::Result<Vec<(Token, usize)>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '{' => {
                tokens.push((Token::Open, line));
                chars.next();
            }
            '}' => {
                tokens.push((Token::Close, line));
                chars.next();
            }
            ';' => {
                tokens.push((Token::Semi, line));
                chars.next();
            }
            '"' | '\'' => {
                let quote = c;
                let start = line;
                chars.next();
                let mut word = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                if escaped == '\n' {
                                    line += 1;
                                }
                                word.push(escaped);
                            }
                        }
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => {
                            if c == '\n' {
                                line += 1;
                            }
                            word.push(c);
                        }
                    }
                }
                if !closed {
                    return Err(format!("unterminated quoted string starting on line {}", start));
                }
                tokens.push((Token::Word(word), start));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | ';') {
                        break;
                    }
                    if c == '\\' {
                        chars.next();
                        if let Some(escaped) = chars.next() {
                            word.push(escaped);
                        }
                        continue;
                    }
                    word.push(c);
                    chars.next();
                    // `${name}` is a variable, not a block
                    if c == '$' && chars.peek() == Some(&'{') {
                        for c in chars.by_ref() {
                            word.push(c);
                            if c == '}' {
                                break;
                            }
                        }
                    }
                }
                tokens.push((Token::Word(word), line));
            }
        }
    }

    Ok(tokens)
}

fn parse_block<I>(tokens: &mut I, nested: bool) -> std::result::Result<Vec<Directive>, String>
where
    I: Iterator<Item = (Token, usize)>,
{
    let mut directives = Vec::new();

    loop {
        let (name, line) = match tokens.next() {
            None if nested => return Err("unexpected end of file, missing '}'".into()),
            None => return Ok(directives),
            Some((Token::Close, _)) if nested => return Ok(directives),
            Some((Token::Close, line)) => return Err(format!("unexpected '}}' on line {}", line)),
            Some((Token::Open, line)) => return Err(format!("unexpected '{{' on line {}", line)),
            Some((Token::Semi, line)) => return Err(format!("unexpected ';' on line {}", line)),
            Some((Token::Word(name), line)) => (name, line),
        };

        let mut args = Vec::new();
        loop {
            match tokens.next() {
                Some((Token::Word(arg), _)) => args.push(arg),
                Some((Token::Semi, _)) => {
                    directives.push(Directive {
                        name,
                        args,
                        block: None,
                        line,
                    });
                    break;
                }
                Some((Token::Open, _)) => {
                    let block = parse_block(tokens, true)?;
                    directives.push(Directive {
                        name,
                        args,
                        block: Some(block),
                        line,
                    });
                    break;
                }
                Some((Token::Close, _)) | None => {
                    return Err(format!(
                        "directive '{}' on line {} is not terminated by ';'",
                        name, line
                    ))
                }
            }
        }
    }
}

/// Parse a config file body into its top-level directives.
pub fn parse(input: &str) -> std::result::Result<Vec<Directive>, String> {
    let tokens = tokenize(input)?;
    parse_block(&mut tokens.into_iter(), false)
}

/// Owner and domains recovered from an app's vhost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDetails {
    pub user: String,
    pub domains: DomainSet,
}

impl AppDetails {
    /// Extract details from vhost text. `users_root` locates the owner inside the `root` path.
    pub fn from_config(input: &str, users_root: &Path) -> std::result::Result<Self, String> {
        let directives = parse(input)?;
        let servers: Vec<&Directive> = directives
            .iter()
            .filter(|d| d.name == "server" && d.block.is_some())
            .collect();

        // With two blocks the first one is the port 80 companion of the real server
        let server = match servers.as_slice() {
            [] => return Err("no server block found".into()),
            [_, second, ..] => *second,
            [only] => *only,
        };

        let server_name = server
            .child("server_name")
            .ok_or_else(|| format!("server block on line {} has no server_name", server.line))?;
        let domains: Vec<String> = server_name
            .args
            .iter()
            .filter(|d| !d.is_empty())
            .cloned()
            .collect();

        let root = server
            .child("root")
            .and_then(Directive::first_arg)
            .ok_or_else(|| format!("server block on line {} has no root", server.line))?;

        let user = owner_from_root(Path::new(root), users_root)
            .ok_or_else(|| format!("cannot determine owning user from root '{}'", root))?;

        trace!(user = %user, domains = ?domains, "Parsed vhost");

        Ok(Self {
            user,
            domains: DomainSet::from_config(domains),
        })
    }
}

/// The account owning a web root: the component following `users_root`, or by
/// convention the third segment of `/srv/users/<user>/apps/<app>/public`.
pub fn owner_from_root(root: &Path, users_root: &Path) -> Option<String> {
    let component_str = |c: Component<'_>| match c {
        Component::Normal(s) => s.to_str().map(str::to_string),
        _ => None,
    };

    if let Ok(rest) = root.strip_prefix(users_root) {
        if let Some(user) = rest.components().next().and_then(component_str) {
            return Some(user);
        }
    }

    root.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .nth(2)
        .and_then(component_str)
}

/// Read and parse the vhost of `app`.
///
/// # Errors
/// [`Error::VhostNotFound`] if the file is missing, [`Error::VhostParse`] if
/// it does not yield an owner and a `server_name`.
pub fn read_app_details(paths: &Paths, app: &str) -> Result<AppDetails> {
    let path = paths.vhost_conf(app);
    if !path.exists() {
        return Err(Error::VhostNotFound { path });
    }
    let content = crate::fs::read_to_string(&path)?;
    AppDetails::from_config(&content, &paths.users_root)
        .map_err(|reason| Error::VhostParse { path, reason })
}
