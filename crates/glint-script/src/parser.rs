use crate::ast::{
    CubemapDecl, Manifest, ModelDecl, ProgramDecl, ShaderDecl, SkippedSection, StageKeyword,
    TextureDecl, TextureFlag,
};
use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenWithPos};

// ── Section ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Section {
    Shaders,
    Programs,
    Textures,
    Cubemaps,
    Models,
}

impl Section {
    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "shaders" => Self::Shaders,
            "programs" => Self::Programs,
            "textures" => Self::Textures,
            "cubemaps" => Self::Cubemaps,
            "models" => Self::Models,
            _ => return None,
        })
    }
}

/// One word of a declaration line with its column.
struct Word {
    text: String,
    col: usize,
}

// ── Parser ────────────────────────────────────────────────────────────────

pub struct Parser {
    tokens: Vec<TokenWithPos>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithPos>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current_pos(&self) -> (usize, usize) {
        self.tokens
            .get(self.pos)
            .map(|t| (t.line, t.col))
            .or_else(|| self.tokens.last().map(|t| (t.line, t.col)))
            .unwrap_or((1, 1))
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).map(|t| t.token.clone()).unwrap_or(Token::Eof);
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let (line, col) = self.current_pos();
        ParseError::new(msg, line, col)
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    // ── Document ──────────────────────────────────────────────────────────

    pub fn parse_manifest(&mut self) -> Result<Manifest, ParseError> {
        let mut manifest = Manifest::default();

        loop {
            self.skip_newlines();
            let (line, _) = self.current_pos();
            match self.advance() {
                Token::Eof => break,
                Token::OpenTag(tag) => match Section::from_tag(&tag) {
                    Some(section) => self.parse_section(section, &tag, &mut manifest)?,
                    None => {
                        self.skip_section(&tag, line)?;
                        manifest.skipped.push(SkippedSection { tag, line });
                    }
                },
                Token::CloseTag(tag) => {
                    self.pos -= 1;
                    return Err(self.err(format!("</{}> without a matching <{}>", tag, tag)));
                }
                tok => {
                    self.pos -= 1;
                    return Err(self.err(format!("expected a section tag, got {:?}", tok)));
                }
            }
        }

        Ok(manifest)
    }

    /// Consumes everything up to and including `</tag>`.
    fn skip_section(&mut self, tag: &str, open_line: usize) -> Result<(), ParseError> {
        loop {
            match self.advance() {
                Token::Eof => {
                    return Err(ParseError::new(format!("unclosed <{}> section", tag), open_line, 1));
                }
                Token::CloseTag(t) if t == tag => return Ok(()),
                _ => {}
            }
        }
    }

    // ── Section ───────────────────────────────────────────────────────────

    fn parse_section(
        &mut self,
        section: Section,
        tag: &str,
        manifest: &mut Manifest,
    ) -> Result<(), ParseError> {
        let (open_line, _) = self.current_pos();
        loop {
            self.skip_newlines();
            match self.peek().clone() {
                Token::CloseTag(t) if t == tag => {
                    self.advance();
                    return Ok(());
                }
                Token::CloseTag(t) => {
                    return Err(self.err(format!("</{}> does not close <{}>", t, tag)));
                }
                Token::OpenTag(t) => {
                    return Err(self.err(format!("<{}> cannot be nested inside <{}>", t, tag)));
                }
                Token::Eof => {
                    return Err(ParseError::new(format!("unclosed <{}> section", tag), open_line, 1));
                }
                Token::Newline => unreachable!("newlines were skipped"),
                Token::Word(_) => {
                    let (line, _) = self.current_pos();
                    let words = self.collect_line();
                    self.parse_decl(section, line, words, manifest)?;
                }
            }
        }
    }

    fn collect_line(&mut self) -> Vec<Word> {
        let mut words = Vec::new();
        while let Token::Word(_) = self.peek() {
            let col = self.tokens[self.pos].col;
            if let Token::Word(text) = self.advance() {
                words.push(Word { text, col });
            }
        }
        words
    }

    // ── Declarations ──────────────────────────────────────────────────────

    fn parse_decl(
        &self,
        section: Section,
        line: usize,
        words: Vec<Word>,
        manifest: &mut Manifest,
    ) -> Result<(), ParseError> {
        let at = |w: &Word, msg: String| ParseError::new(msg, line, w.col);
        let arity = |expected: &str| {
            ParseError::new(
                format!("expected {} but found {} token(s)", expected, words.len()),
                line,
                words.first().map_or(1, |w| w.col),
            )
        };

        match section {
            Section::Shaders => {
                let [stage, name, path] = take_exact::<3>(&words).ok_or_else(|| arity("`<stage> <name> <path>`"))?;
                let kind = StageKeyword::parse(&stage.text)
                    .ok_or_else(|| at(stage, format!("unknown shader stage {:?}", stage.text)))?;
                manifest.shaders.push(ShaderDecl {
                    stage: kind,
                    name: name.text.clone(),
                    path: path.text.clone(),
                    line,
                });
            }
            Section::Programs => {
                if words.len() < 2 {
                    return Err(arity("`<name> <shader> [<shader> ...]`"));
                }
                manifest.programs.push(ProgramDecl {
                    name: words[0].text.clone(),
                    shaders: words[1..].iter().map(|w| w.text.clone()).collect(),
                    line,
                });
            }
            Section::Textures => {
                if words.len() < 2 {
                    return Err(arity("`<name> <path> [flag ...]`"));
                }
                let flags = words[2..]
                    .iter()
                    .map(|w| {
                        TextureFlag::parse(&w.text)
                            .ok_or_else(|| at(w, format!("unknown texture flag {:?}", w.text)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                manifest.textures.push(TextureDecl {
                    name: words[0].text.clone(),
                    path: words[1].text.clone(),
                    flags,
                    line,
                });
            }
            Section::Cubemaps => {
                let [name, px, nx, py, ny, pz, nz] = take_exact::<7>(&words)
                    .ok_or_else(|| arity("`<name>` followed by six face paths"))?;
                manifest.cubemaps.push(CubemapDecl {
                    name: name.text.clone(),
                    faces: [px, nx, py, ny, pz, nz].map(|w| w.text.clone()),
                    line,
                });
            }
            Section::Models => {
                let [name, path] = take_exact::<2>(&words).ok_or_else(|| arity("`<name> <path>`"))?;
                manifest.models.push(ModelDecl {
                    name: name.text.clone(),
                    path: path.text.clone(),
                    line,
                });
            }
        }
        Ok(())
    }
}

fn take_exact<const N: usize>(words: &[Word]) -> Option<[&Word; N]> {
    if words.len() != N {
        return None;
    }
    Some(std::array::from_fn(|i| &words[i]))
}

// ── Public parse entry point ──────────────────────────────────────────────

/// Parse a `.glint` manifest source string into a [`Manifest`].
pub fn parse_str(src: &str) -> Result<Manifest, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_manifest()
}
