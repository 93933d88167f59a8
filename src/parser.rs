// src/parser.rs

#[derive(Debug, PartialEq)]
pub enum ParseError {
    InvalidSyntax(String),
}

impl From<ParseError> for crate::errors::ResolveError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidSyntax(msg) => crate::errors::ResolveError::MalformedName(msg),
        }
    }
}

/// Parse a dotted identifier chain, e.g. `x.y.z` -> ["x", "y", "z"].
pub fn parse_name(input: &str) -> Result<Vec<String>, ParseError> {
    let mut p = Parser::new(input);
    p.skip_ws();
    let mut segments = vec![p.parse_identifier()?];
    while p.consume_char('.') {
        segments.push(p.parse_identifier()?);
    }
    p.skip_ws();
    if !p.eof() {
        return Err(ParseError::InvalidSyntax(format!(
            "unexpected '{}' in name",
            p.peek_char().unwrap_or_default()
        )));
    }
    Ok(segments)
}

/// Parse a namespaced call-site reference, e.g. `math:log` -> ("math", "log").
pub fn parse_call_ref(input: &str) -> Result<(String, String), ParseError> {
    let mut p = Parser::new(input);
    p.skip_ws();
    let tag = p.parse_identifier()?;
    p.skip_ws();
    p.expect(':')?;
    p.skip_ws();
    let function = p.parse_identifier()?;
    p.skip_ws();
    if !p.eof() {
        return Err(ParseError::InvalidSyntax("trailing input".into()));
    }
    Ok((tag, function))
}

pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    pub fn parse_identifier(&mut self) -> Result<String, ParseError> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == '_' || c == '$' || c.is_ascii_alphanumeric() {
                self.i += 1;
            } else {
                break;
            }
        }
        if self.i == start {
            return Err(ParseError::InvalidSyntax("identifier expected".into()));
        }
        Ok(self.s[start..self.i].to_string())
    }

    pub fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(ParseError::InvalidSyntax(format!("expected '{}'", c)))
        }
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
