// SPDX-License-Identifier: GPL-3.0-only

//! MPD line protocol
//!
//! Requests are one line: a command name followed by quoted arguments.
//! Responses are `key: value` lines terminated by `OK`, or a single
//! `ACK [code@index] {command} message` line.

use std::fmt;

use crate::error::{MpdError, Result};

const GREETING_PREFIX: &str = "OK MPD ";

/// A request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Wire form, newline included
    pub fn to_line(&self) -> String {
        let mut line = self.name.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line.push('\n');
        line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_line().trim_end())
    }
}

fn quote(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Ordered key/value pairs of one response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pairs: Vec<(String, String)>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Split a list response into records, each starting at `key`
    ///
    /// Pairs before the first `key` are dropped.
    pub fn split_on(&self, key: &str) -> Vec<Frame> {
        let mut records = Vec::new();
        let mut current: Option<Frame> = None;
        for (k, v) in &self.pairs {
            if k == key {
                if let Some(done) = current.take() {
                    records.push(done);
                }
                current = Some(Frame::new());
            }
            if let Some(record) = current.as_mut() {
                record.push(k.clone(), v.clone());
            }
        }
        records.extend(current);
        records
    }
}

/// One parsed response line
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    Pair(String, String),
    Ok,
    Ack { code: u32, command: String, message: String },
}

pub fn parse_line(line: &str) -> Result<Line> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == "OK" {
        return Ok(Line::Ok);
    }
    if let Some(rest) = line.strip_prefix("ACK ") {
        return parse_ack(rest);
    }
    match line.split_once(": ") {
        Some((key, value)) => Ok(Line::Pair(key.to_string(), value.to_string())),
        None => Err(MpdError::Protocol(format!("unexpected response line: {line:?}"))),
    }
}

// `[50@0] {add} No such directory`
fn parse_ack(rest: &str) -> Result<Line> {
    let malformed = || MpdError::Protocol(format!("malformed ACK: {rest:?}"));

    let rest = rest.strip_prefix('[').ok_or_else(malformed)?;
    let (code, rest) = rest.split_once('@').ok_or_else(malformed)?;
    let (_, rest) = rest.split_once("] {").ok_or_else(malformed)?;
    let (command, message) = rest.split_once('}').ok_or_else(malformed)?;

    Ok(Line::Ack {
        code: code.parse().map_err(|_| malformed())?,
        command: command.to_string(),
        message: message.trim_start().to_string(),
    })
}

/// Protocol version from the server greeting
pub fn parse_greeting(line: &str) -> Result<String> {
    line.trim_end_matches(['\r', '\n'])
        .strip_prefix(GREETING_PREFIX)
        .map(str::to_string)
        .ok_or_else(|| MpdError::Protocol(format!("not an MPD server greeting: {line:?}")))
}
