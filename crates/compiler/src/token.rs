//! Tokenizer for Asteria source.
//!
//! Source is an 8-bit-clean byte stream. Comments run `//` to end of line
//! or `/* ... */` without nesting. String literals accept the single-char
//! escapes `\n \r \t \" \\ \a \b \f \v \' \/` plus `\xHH`; any other
//! escaped byte passes through unchanged, as do raw non-ASCII bytes.
//! Numeric literals cover decimal, hex (`0x`) and octal (`0o`) integers and
//! decimal/hex floating point with exponents; an unsuffixed literal
//! containing a dot or an exponent is a `real`, otherwise an `integer`.

use asteria_core::{Error, Result, Span};

/// Reserved words. These never tokenize as plain identifiers.
pub const KEYWORDS: &[&str] = &[
    "var", "const", "func", "if", "else", "switch", "case", "default", "while", "do", "for",
    "each", "try", "catch", "throw", "return", "break", "continue", "null", "true", "false",
    "nan", "infinity",
];

/// Multi-byte punctuators first so maximal munch works by scanning in order.
const PUNCTUATORS: &[&str] = &[
    "...", "++", "--", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "*=", "/=", "%=", "+", "-",
    "*", "/", "%", "!", "~", "<", ">", "=", "?", ":", ";", ",", ".", "(", ")", "[", "]", "{", "}",
    "&", "|", "^",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// An identifier or keyword.
    Word(String),
    /// A punctuator, always one of [`PUNCTUATORS`].
    Punct(&'static str),
    Integer(i64),
    Real(f64),
    Str(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a [u8], start_line: u32) -> Self {
        Cursor {
            src,
            pos: 0,
            line: start_line,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.src.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.src[self.pos..].starts_with(s.as_bytes()) {
            for _ in 0..s.len() {
                self.bump();
            }
            true
        } else {
            false
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Tokenize a source buffer. `start_line` sets the line number of the first
/// line, so embedded scripts report positions relative to their container.
pub fn tokenize(src: &[u8], start_line: u32) -> Result<Vec<Token>> {
    let mut cur = Cursor::new(src, start_line);
    let mut tokens = Vec::new();

    'outer: while let Some(b) = cur.peek() {
        // Whitespace.
        if matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\x0b') {
            cur.bump();
            continue;
        }
        // Comments.
        if b == b'/' && cur.peek_at(1) == Some(b'/') {
            while let Some(c) = cur.peek() {
                if c == b'\n' {
                    break;
                }
                cur.bump();
            }
            continue;
        }
        if b == b'/' && cur.peek_at(1) == Some(b'*') {
            let open = cur.span();
            cur.bump();
            cur.bump();
            loop {
                match cur.peek() {
                    Some(b'*') if cur.peek_at(1) == Some(b'/') => {
                        cur.bump();
                        cur.bump();
                        continue 'outer;
                    }
                    Some(_) => {
                        cur.bump();
                    }
                    None => return Err(Error::parse("unterminated block comment", open)),
                }
            }
        }
        // String literals.
        if b == b'"' {
            tokens.push(read_string(&mut cur)?);
            continue;
        }
        // Numeric literals.
        if b.is_ascii_digit() {
            tokens.push(read_number(&mut cur)?);
            continue;
        }
        // Identifiers and keywords.
        if is_ident_start(b) {
            let span = cur.span();
            let mut word = String::new();
            while let Some(c) = cur.peek() {
                if !is_ident_continue(c) {
                    break;
                }
                word.push(c as char);
                cur.bump();
            }
            tokens.push(Token::new(TokenKind::Word(word), span));
            continue;
        }
        // Punctuators, longest first.
        let span = cur.span();
        for &p in PUNCTUATORS {
            if cur.eat_str(p) {
                tokens.push(Token::new(TokenKind::Punct(p), span));
                continue 'outer;
            }
        }
        return Err(Error::parse(format!("unexpected byte 0x{:02X}", b), span));
    }
    Ok(tokens)
}

fn read_string(cur: &mut Cursor<'_>) -> Result<Token> {
    let span = cur.span();
    cur.bump(); // opening quote
    let mut bytes = Vec::new();
    loop {
        let b = match cur.bump() {
            Some(b) => b,
            None => return Err(Error::parse("unterminated string literal", span)),
        };
        match b {
            b'"' => return Ok(Token::new(TokenKind::Str(bytes), span)),
            b'\\' => {
                let esc = match cur.bump() {
                    Some(e) => e,
                    None => return Err(Error::parse("unterminated string literal", span)),
                };
                match esc {
                    b'n' => bytes.push(b'\n'),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'a' => bytes.push(0x07),
                    b'b' => bytes.push(0x08),
                    b'f' => bytes.push(0x0c),
                    b'v' => bytes.push(0x0b),
                    b'x' => {
                        let hi = cur.bump().and_then(hex_digit);
                        let lo = cur.bump().and_then(hex_digit);
                        match (hi, lo) {
                            (Some(h), Some(l)) => bytes.push(h * 16 + l),
                            _ => {
                                return Err(Error::parse(
                                    "invalid \\x escape in string literal",
                                    span,
                                ))
                            }
                        }
                    }
                    // `\" \\ \' \/` and unknown escapes pass the byte through.
                    other => bytes.push(other),
                }
            }
            other => bytes.push(other),
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn read_number(cur: &mut Cursor<'_>) -> Result<Token> {
    let span = cur.span();

    if cur.peek() == Some(b'0') {
        match cur.peek_at(1) {
            Some(b'x') | Some(b'X') => {
                cur.bump();
                cur.bump();
                return read_hex(cur, span);
            }
            Some(b'o') | Some(b'O') => {
                cur.bump();
                cur.bump();
                return read_radix_integer(cur, span, 8);
            }
            _ => {}
        }
    }

    // Decimal: digits, optional fraction, optional exponent.
    let mut text = String::new();
    let mut is_real = false;
    while let Some(c) = cur.peek() {
        if c.is_ascii_digit() {
            text.push(c as char);
            cur.bump();
        } else {
            break;
        }
    }
    if cur.peek() == Some(b'.') && cur.peek_at(1).map_or(false, |c| c.is_ascii_digit()) {
        is_real = true;
        text.push('.');
        cur.bump();
        while let Some(c) = cur.peek() {
            if c.is_ascii_digit() {
                text.push(c as char);
                cur.bump();
            } else {
                break;
            }
        }
    }
    if matches!(cur.peek(), Some(b'e') | Some(b'E')) {
        let mut ahead = 1;
        if matches!(cur.peek_at(1), Some(b'+') | Some(b'-')) {
            ahead = 2;
        }
        if cur.peek_at(ahead).map_or(false, |c| c.is_ascii_digit()) {
            is_real = true;
            text.push('e');
            cur.bump();
            if let Some(sign) = cur.peek().filter(|c| matches!(c, b'+' | b'-')) {
                text.push(sign as char);
                cur.bump();
            }
            while let Some(c) = cur.peek() {
                if c.is_ascii_digit() {
                    text.push(c as char);
                    cur.bump();
                } else {
                    break;
                }
            }
        }
    }

    if is_real {
        let value: f64 = text
            .parse()
            .map_err(|_| Error::parse(format!("invalid real literal '{}'", text), span))?;
        Ok(Token::new(TokenKind::Real(value), span))
    } else {
        let value: i64 = text
            .parse()
            .map_err(|_| Error::parse(format!("integer literal '{}' out of range", text), span))?;
        Ok(Token::new(TokenKind::Integer(value), span))
    }
}

fn read_radix_integer(cur: &mut Cursor<'_>, span: Span, radix: u32) -> Result<Token> {
    let mut value: i64 = 0;
    let mut any = false;
    while let Some(c) = cur.peek() {
        let digit = match (c as char).to_digit(radix) {
            Some(d) => d,
            None => break,
        };
        cur.bump();
        any = true;
        value = value
            .checked_mul(radix as i64)
            .and_then(|v| v.checked_add(digit as i64))
            .ok_or_else(|| Error::parse("integer literal out of range", span))?;
    }
    if !any {
        return Err(Error::parse("missing digits in integer literal", span));
    }
    Ok(Token::new(TokenKind::Integer(value), span))
}

/// Hex literals: integer by default; a fraction or a `p` exponent makes a
/// hexadecimal floating-point literal (`0x1.8p1` == 3.0).
fn read_hex(cur: &mut Cursor<'_>, span: Span) -> Result<Token> {
    let mut mantissa: f64 = 0.0;
    let mut int_value: i64 = 0;
    let mut int_ok = true;
    let mut any = false;

    while let Some(c) = cur.peek() {
        let digit = match hex_digit(c) {
            Some(d) => d,
            None => break,
        };
        cur.bump();
        any = true;
        mantissa = mantissa * 16.0 + digit as f64;
        int_value = match int_value
            .checked_mul(16)
            .and_then(|v| v.checked_add(digit as i64))
        {
            Some(v) => v,
            None => {
                int_ok = false;
                0
            }
        };
    }
    if !any {
        return Err(Error::parse("missing digits in hex literal", span));
    }

    let mut is_real = false;
    if cur.peek() == Some(b'.') && cur.peek_at(1).and_then(hex_digit).is_some() {
        is_real = true;
        cur.bump();
        let mut scale = 1.0 / 16.0;
        while let Some(c) = cur.peek() {
            let digit = match hex_digit(c) {
                Some(d) => d,
                None => break,
            };
            cur.bump();
            mantissa += digit as f64 * scale;
            scale /= 16.0;
        }
    }
    if matches!(cur.peek(), Some(b'p') | Some(b'P')) {
        let mut ahead = 1;
        if matches!(cur.peek_at(1), Some(b'+') | Some(b'-')) {
            ahead = 2;
        }
        if cur.peek_at(ahead).map_or(false, |c| c.is_ascii_digit()) {
            is_real = true;
            cur.bump();
            let negative = match cur.peek() {
                Some(b'-') => {
                    cur.bump();
                    true
                }
                Some(b'+') => {
                    cur.bump();
                    false
                }
                _ => false,
            };
            let mut exp: i32 = 0;
            while let Some(c) = cur.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                exp = exp.saturating_mul(10).saturating_add((c - b'0') as i32);
                cur.bump();
            }
            if negative {
                exp = -exp;
            }
            mantissa *= (exp as f64).exp2();
        }
    }

    if is_real {
        Ok(Token::new(TokenKind::Real(mantissa), span))
    } else if int_ok {
        Ok(Token::new(TokenKind::Integer(int_value), span))
    } else {
        Err(Error::parse("integer literal out of range", span))
    }
}
