//! Cheap lexical checks on student programs.
//!
//! Submissions come in Python, JavaScript/TypeScript or a C-like language,
//! so the checks look at tokens rather than parse anything. Comments and
//! string literals are not stripped; a `for` inside a comment counts.

const LOOP_KEYWORDS: &[&str] = &["for", "while"];
const BINDING_KEYWORDS: &[&str] = &["let", "const", "var", "return"];

/// True if the program contains a `for`/`while` construct.
///
/// Iterator methods such as `forEach` or `map` are not loop constructs and
/// earn nothing here.
pub fn has_loop(source: &str) -> bool {
    tokenize(source)
        .windows(2)
        .any(|pair| match (&pair[0], &pair[1]) {
            (Token::Word(w), next) if LOOP_KEYWORDS.contains(w) => {
                matches!(next, Token::Word(_) | Token::Punct('(') | Token::Punct('['))
            }
            _ => false,
        })
}

/// True if the program binds a variable or returns a value.
pub fn has_assignment(source: &str) -> bool {
    let tokens = tokenize(source);
    if tokens
        .iter()
        .any(|t| matches!(t, Token::Word(w) if BINDING_KEYWORDS.contains(w)))
    {
        return true;
    }
    tokens.windows(3).any(|triple| match triple {
        [Token::Word(_) | Token::Punct(']') | Token::Punct(')'), Token::Punct('='), next] => {
            !matches!(next, Token::Punct('=') | Token::Punct('>'))
        }
        // Compound forms: x += 1, count -= 2, ...
        [Token::Word(_), Token::Punct(op), Token::Punct('=')] => {
            matches!(op, '+' | '-' | '*' | '/' | '%')
        }
        _ => false,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Punct(char),
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in source.char_indices() {
        if c.is_alphanumeric() || c == '_' || c == '$' {
            start.get_or_insert(i);
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(Token::Word(&source[s..i]));
        }
        if !c.is_whitespace() {
            tokens.push(Token::Punct(c));
        }
    }
    if let Some(s) = start {
        tokens.push(Token::Word(&source[s..]));
    }
    tokens
}
