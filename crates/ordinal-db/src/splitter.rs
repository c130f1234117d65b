//! Cutting migration file text into individual statements.
//!
//! [`SplitMode::Naive`] splits on every `;` and is the default. It breaks
//! statements that contain a `;` inside a string literal, a comment or a
//! trigger body.
//!
//! [`SplitMode::Aware`] understands SQLite lexing well enough to keep those
//! intact: quoted strings and identifiers (`'...'`, `"..."`, `` `...` ``,
//! `[...]`), `--` and `/* */` comments, and `CREATE TRIGGER ... BEGIN ... END`
//! bodies. Fragments that hold only comments are dropped. Files that fail
//! under the naive splitter may succeed under this one.

use ordinal_config::SplitMode;

/// Split `sql` into trimmed, non-empty statements, in source order.
pub fn split_statements(sql: &str, mode: SplitMode) -> Vec<&str> {
    match mode {
        SplitMode::Naive => split_naive(sql),
        SplitMode::Aware => split_aware(sql),
    }
}

fn split_naive(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexer {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Per-statement keyword tracking, only used to find trigger bodies.
#[derive(Debug, Default)]
struct Fragment {
    has_code: bool,
    words: usize,
    create: bool,
    trigger: bool,
    in_body: bool,
    case_depth: usize,
    body_ended: bool,
}

impl Fragment {
    fn word(&mut self, word: &str) {
        self.has_code = true;
        self.words += 1;

        if self.words == 1 {
            self.create = word.eq_ignore_ascii_case("CREATE");
            return;
        }
        if !self.trigger {
            // CREATE TRIGGER, CREATE TEMP TRIGGER, CREATE TEMPORARY TRIGGER
            self.trigger = self.create && self.words <= 3 && word.eq_ignore_ascii_case("TRIGGER");
            return;
        }

        if !self.in_body {
            self.in_body = word.eq_ignore_ascii_case("BEGIN");
        } else if word.eq_ignore_ascii_case("CASE") {
            self.case_depth += 1;
        } else if word.eq_ignore_ascii_case("END") {
            if self.case_depth > 0 {
                self.case_depth -= 1;
            } else {
                self.body_ended = true;
                return;
            }
        }
        self.body_ended = false;
    }

    fn symbol(&mut self) {
        self.has_code = true;
        self.body_ended = false;
    }

    fn ends_at_semicolon(&self) -> bool {
        !self.trigger || self.body_ended
    }
}

fn split_aware(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut state = Lexer::Code;
    let mut fragment = Fragment::default();
    let mut start = 0;
    let mut word_start: Option<usize> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let next = chars.peek().map(|&(_, n)| n);
        match state {
            Lexer::Code => {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word_start.get_or_insert(i);
                    continue;
                }
                if let Some(ws) = word_start.take() {
                    fragment.word(&sql[ws..i]);
                }

                match c {
                    '\'' | '"' | '`' => {
                        fragment.symbol();
                        state = Lexer::Quoted(c);
                    }
                    '[' => {
                        fragment.symbol();
                        state = Lexer::Quoted(']');
                    }
                    '-' if next == Some('-') => {
                        chars.next();
                        state = Lexer::LineComment;
                    }
                    '/' if next == Some('*') => {
                        chars.next();
                        state = Lexer::BlockComment;
                    }
                    ';' if fragment.ends_at_semicolon() => {
                        if fragment.has_code {
                            statements.push(sql[start..i].trim());
                        }
                        start = i + 1;
                        fragment = Fragment::default();
                    }
                    c if c.is_whitespace() => {}
                    _ => fragment.symbol(),
                }
            }
            // A doubled quote ('') closes and immediately reopens, which
            // lands in the same state.
            Lexer::Quoted(close) => {
                if c == close {
                    state = Lexer::Code;
                }
            }
            Lexer::LineComment => {
                if c == '\n' {
                    state = Lexer::Code;
                }
            }
            Lexer::BlockComment => {
                if c == '*' && next == Some('/') {
                    chars.next();
                    state = Lexer::Code;
                }
            }
        }
    }

    if word_start.is_some() {
        fragment.has_code = true;
    }
    if fragment.has_code {
        statements.push(sql[start..].trim());
    }
    statements
}
