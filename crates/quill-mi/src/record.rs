//! MI output records.

use serde::Serialize;

use crate::error::MiError;
use crate::value::{MiValue, Parser};

/// Classification of a `^` result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl std::str::FromStr for ResultClass {
    type Err = MiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(ResultClass::Done),
            "running" => Ok(ResultClass::Running),
            "connected" => Ok(ResultClass::Connected),
            "error" => Ok(ResultClass::Error),
            "exit" => Ok(ResultClass::Exit),
            other => Err(MiError::UnknownResultClass(other.to_string())),
        }
    }
}

/// Which async channel a `*`, `+` or `=` record arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AsyncClass {
    /// `*`: execution state changes (`running`, `stopped`).
    Exec,
    /// `+`: progress of slow operations.
    Status,
    /// `=`: everything else (thread groups, libraries, breakpoints).
    Notify,
}

/// Which stream a `~`, `@` or `&` record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// `~`: text gdb would print on its own console.
    Console,
    /// `@`: output of a remote target.
    Target,
    /// `&`: gdb's internal log, including echoes of failed commands.
    Log,
}

/// One line of MI output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiRecord {
    /// `[token]^class,results`: the reply to exactly one command.
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: MiValue,
    },
    /// `[token]*class,results`, `+class,...` or `=class,...`.
    Async {
        token: Option<u64>,
        kind: AsyncClass,
        class: String,
        results: MiValue,
    },
    /// `~"text"`, `@"text"`, `&"text"`.
    Stream { kind: StreamKind, text: String },
    /// The `(gdb)` prompt that terminates each output batch.
    Prompt,
    /// Anything that is not MI, e.g. inferior output when no TTY was set.
    Raw(String),
}

impl MiRecord {
    /// Whether this record answers a command.
    pub fn is_result(&self) -> bool {
        matches!(self, MiRecord::Result { .. })
    }

    /// An `^error,msg="<message>"` record, for replies that arrived but
    /// could not be read.
    pub fn error_result(message: impl Into<String>) -> Self {
        MiRecord::Result {
            token: None,
            class: ResultClass::Error,
            results: MiValue::Tuple(vec![("msg".to_string(), MiValue::Const(message.into()))]),
        }
    }

    /// Convert a result record into the response handed to continuations.
    pub fn into_response(self) -> Option<MiResponse> {
        match self {
            MiRecord::Result { class, results, .. } => Some(MiResponse::new(class, results)),
            _ => None,
        }
    }
}

/// A parsed reply: its class plus the payload tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiResponse {
    pub result_class: ResultClass,
    pub data: MiValue,
}

impl MiResponse {
    pub fn new(result_class: ResultClass, data: MiValue) -> Self {
        Self { result_class, data }
    }

    /// The `msg` field gdb attaches to `^error`, or `""`.
    pub fn error_message(&self) -> &str {
        self.data.child_data("msg").unwrap_or("")
    }
}

impl std::fmt::Display for MiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let class = match self.result_class {
            ResultClass::Done => "done",
            ResultClass::Running => "running",
            ResultClass::Connected => "connected",
            ResultClass::Error => "error",
            ResultClass::Exit => "exit",
        };
        write!(f, "^{class}")?;
        if let MiValue::Tuple(entries) = &self.data {
            for (k, v) in entries {
                write!(f, ",{k}={v}")?;
            }
        }
        Ok(())
    }
}

/// Parse one line of gdb's MI output (without the trailing newline).
/// Whether `line` has the `[token]^` prefix of a result record, whether or
/// not the rest of it parses.
pub fn is_result_line(line: &str) -> bool {
    line.trim_start_matches(|c: char| c.is_ascii_digit()).starts_with('^')
}

pub fn parse_record(line: &str) -> Result<MiRecord, MiError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim_end() == "(gdb)" {
        return Ok(MiRecord::Prompt);
    }

    let mut p = Parser::new(line);
    let token = p.token();
    let record = match p.peek() {
        Some(b'^') => {
            p.bump();
            let class_start = p.pos();
            let class = p.word();
            let class = class.parse::<ResultClass>().map_err(|e| match e {
                MiError::UnknownResultClass(name) => MiError::Syntax {
                    offset: class_start,
                    message: format!("unknown result class '{name}'"),
                },
                other => other,
            })?;
            MiRecord::Result {
                token,
                class,
                results: p.results()?,
            }
        }
        Some(prefix @ (b'*' | b'+' | b'=')) => {
            p.bump();
            let kind = match prefix {
                b'*' => AsyncClass::Exec,
                b'+' => AsyncClass::Status,
                _ => AsyncClass::Notify,
            };
            let class = p.word();
            if class.is_empty() {
                return Err(p.error("expected async class"));
            }
            MiRecord::Async {
                token,
                kind,
                class,
                results: p.results()?,
            }
        }
        Some(prefix @ (b'~' | b'@' | b'&')) if token.is_none() => {
            p.bump();
            let kind = match prefix {
                b'~' => StreamKind::Console,
                b'@' => StreamKind::Target,
                _ => StreamKind::Log,
            };
            let text = p.c_string()?;
            if !p.at_end() {
                return Err(p.error("trailing characters after stream record"));
            }
            MiRecord::Stream { kind, text }
        }
        _ => MiRecord::Raw(line.to_string()),
    };
    Ok(record)
}
