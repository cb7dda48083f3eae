use crate::error::ParseError;

// ── Token ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `<tag>` on a line of its own.
    OpenTag(String),
    /// `</tag>` on a line of its own.
    CloseTag(String),
    /// A bare or quoted whitespace-separated word.
    Word(String),
    /// End of a non-empty source line.
    Newline,
    // Sentinel
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenWithPos {
    pub token: Token,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub col: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────

/// Line-oriented lexer.
///
/// Each source line is either blank, a comment (`#` or `//` first non-blank),
/// a single tag (`<name>` / `</name>`), or a list of words. Words are split on
/// whitespace; a word starting with `"` runs to the closing quote and may
/// contain spaces.
pub struct Lexer<'s> {
    src: &'s str,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self { src }
    }

    pub fn tokenize(self) -> Result<Vec<TokenWithPos>, ParseError> {
        let mut tokens = Vec::new();
        let mut last_line = 1;

        for (idx, raw) in self.src.lines().enumerate() {
            let line = idx + 1;
            last_line = line;

            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
                continue;
            }
            let col = raw.len() - trimmed.len() + 1;

            if trimmed.starts_with('<') {
                let token = lex_tag(trimmed.trim_end(), line, col)?;
                tokens.push(TokenWithPos { token, line, col });
            } else {
                LineLexer::new(raw, line).lex_words(&mut tokens)?;
            }

            tokens.push(TokenWithPos { token: Token::Newline, line, col: raw.len() + 1 });
        }

        tokens.push(TokenWithPos { token: Token::Eof, line: last_line, col: 1 });
        Ok(tokens)
    }
}

fn lex_tag(text: &str, line: usize, col: usize) -> Result<Token, ParseError> {
    let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) else {
        return Err(ParseError::new(
            format!("malformed section tag {:?}; expected <name> or </name>", text),
            line,
            col,
        ));
    };

    let (closing, name) = match inner.strip_prefix('/') {
        Some(name) => (true, name),
        None => (false, inner),
    };

    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(ParseError::new(format!("invalid section name {:?}", name), line, col));
    }

    Ok(if closing {
        Token::CloseTag(name.to_ascii_lowercase())
    } else {
        Token::OpenTag(name.to_ascii_lowercase())
    })
}

// ── LineLexer ─────────────────────────────────────────────────────────────

struct LineLexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
}

impl<'s> LineLexer<'s> {
    fn new(src: &'s str, line: usize) -> Self {
        Self { src, pos: 0, line }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn col(&self) -> usize {
        self.pos + 1
    }

    fn lex_words(&mut self, out: &mut Vec<TokenWithPos>) -> Result<(), ParseError> {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }
            let col = self.col();
            let word = match self.peek() {
                None => return Ok(()),
                // trailing comment
                Some('#') => return Ok(()),
                Some('"') => self.lex_quoted()?,
                Some(_) => self.lex_bare(),
            };
            out.push(TokenWithPos { token: Token::Word(word), line: self.line, col });
        }
    }

    fn lex_bare(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if !c.is_whitespace()) {
            self.advance();
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_quoted(&mut self) -> Result<String, ParseError> {
        let col = self.col();
        self.advance(); // consume opening `"`
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::new("unterminated string literal", self.line, col)),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some(c) => {
                        s.push('\\');
                        s.push(c);
                    }
                    None => {
                        return Err(ParseError::new("unterminated escape sequence", self.line, col));
                    }
                },
                Some(c) => s.push(c),
            }
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn tags_and_words() {
        let toks = kinds("<shaders>\n  vertex basic shaders/basic.vert\n</shaders>\n");
        assert_eq!(
            toks,
            vec![
                Token::OpenTag("shaders".into()),
                Token::Newline,
                Token::Word("vertex".into()),
                Token::Word("basic".into()),
                Token::Word("shaders/basic.vert".into()),
                Token::Newline,
                Token::CloseTag("shaders".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let toks = kinds("# header\n\n// note\n<models>\n</models> \n");
        assert_eq!(toks.len(), 5);
        assert_eq!(toks[0], Token::OpenTag("models".into()));
    }

    #[test]
    fn quoted_word_keeps_spaces() {
        let toks = kinds("tex \"my textures/a b.png\" mipmaps\n");
        assert_eq!(toks[1], Token::Word("my textures/a b.png".into()));
        assert_eq!(toks[2], Token::Word("mipmaps".into()));
    }

    #[test]
    fn trailing_comment_ends_line() {
        let toks = kinds("a b # c d\n");
        assert_eq!(toks, vec![
            Token::Word("a".into()),
            Token::Word("b".into()),
            Token::Newline,
            Token::Eof,
        ]);
    }

    #[test]
    fn positions_are_one_based() {
        let toks = Lexer::new("\n   <Programs>\n").tokenize().unwrap();
        assert_eq!((toks[0].line, toks[0].col), (2, 4));
        assert_eq!(toks[0].token, Token::OpenTag("programs".into()));
    }

    #[test]
    fn malformed_tag_is_an_error() {
        let err = Lexer::new("<shaders\n").tokenize().unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(Lexer::new("a \"oops\n").tokenize().is_err());
    }
}
