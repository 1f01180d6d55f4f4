//! HTTP request → endpoint line translation.
//!
//! The endpoint only understands `METHOD target accept [body]` on a single
//! line. Headers other than `Accept` are dropped and nothing is escaped.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Request line plus the first `Accept` header, anywhere after the target.
static REQUEST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(GET|POST) ([^ ]+).+?Accept: (\S+)").expect("request pattern compiles")
});

const HEADER_TERMINATOR: &str = "\r\n\r\n";

/// The two methods the endpoint can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed HTTP-side request, reduced to what the endpoint needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunneledRequest {
    pub method: Method,
    pub target: String,
    pub accept: String,
    pub body: Option<String>,
}

impl TunneledRequest {
    /// Parse raw request text. Returns `None` when the method is not GET or
    /// POST or no `Accept:` header follows the request line.
    pub fn parse(raw: &str) -> Option<Self> {
        let captures = REQUEST_PATTERN.captures(raw)?;
        let method = match &captures[1] {
            "GET" => Method::Get,
            _ => Method::Post,
        };

        let body = raw
            .split_once(HEADER_TERMINATOR)
            .map(|(_, body)| body)
            .filter(|body| !body.is_empty())
            .map(str::to_owned);

        Some(Self {
            method,
            target: captures[2].to_owned(),
            accept: captures[3].to_owned(),
            body,
        })
    }

    /// Single-line form sent to the endpoint, without the trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = format!("{} {} {}", self.method, self.target, self.accept);
        if let Some(body) = &self.body {
            line.push(' ');
            line.push_str(body);
        }
        line
    }
}
