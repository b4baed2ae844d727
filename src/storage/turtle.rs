//! Minimal Turtle statement reader
//!
//! Pods answer container listings, WebID profiles and ACL documents in Turtle.
//! We only need the triples whose terms are IRIs, so this reader tokenizes with
//! a regex, expands prefixed names, resolves relative IRIs against the document
//! URL, and collapses blank-node property lists and collections to `Term::Blank`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const LDP_CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";
pub const PIM_STORAGE: &str = "http://www.w3.org/ns/pim/space#storage";

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"#[^\n]*|<[^>]*>|"(?:[^"\\]|\\.)*"(?:@[A-Za-z0-9-]+|\^\^(?:<[^>]*>|[A-Za-z][\w-]*:[\w-]*))?|[;,.\[\]()]|[^\s;,<>"\[\]()#]+"#,
    )
    .expect("token pattern is valid")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Literal(String),
    Blank,
}

impl Term {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Iri(String),
    Literal(String),
    Punct(char),
    Word(String),
}

fn tokenize(document: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for m in TOKEN.find_iter(document) {
        let text = m.as_str();
        if text.starts_with('#') {
            continue;
        }
        if text.starts_with('<') {
            tokens.push(Token::Iri(text[1..text.len() - 1].to_string()));
        } else if text.starts_with('"') {
            let end = text.rfind('"').unwrap_or(0);
            tokens.push(Token::Literal(text[1..end.max(1)].to_string()));
        } else if text.len() == 1 && ";,.[]()".contains(text) {
            tokens.push(Token::Punct(text.chars().next().unwrap_or('.')));
        } else {
            // `acl:Read.` ends a statement; the dot is not part of the name
            let trimmed = text.trim_end_matches('.');
            let dots = text.len() - trimmed.len();
            if !trimmed.is_empty() {
                tokens.push(Token::Word(trimmed.to_string()));
            }
            for _ in 0..dots {
                tokens.push(Token::Punct('.'));
            }
        }
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    base: Option<Url>,
    prefixes: HashMap<String, String>,
    triples: Vec<Triple>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn resolve(&self, iri: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(iri)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| iri.to_string()),
            None => iri.to_string(),
        }
    }

    fn expand(&self, word: &str) -> Term {
        if word == "a" {
            return Term::Iri(RDF_TYPE.to_string());
        }
        if word.starts_with("_:") {
            return Term::Blank;
        }
        match word.split_once(':') {
            Some((prefix, local)) => match self.prefixes.get(prefix) {
                Some(ns) => Term::Iri(format!("{}{}", ns, local)),
                None => Term::Iri(word.to_string()),
            },
            None => Term::Literal(word.to_string()),
        }
    }

    fn term(&mut self, token: Token) -> Term {
        match token {
            Token::Iri(iri) => Term::Iri(self.resolve(&iri)),
            Token::Literal(value) => Term::Literal(value),
            Token::Word(word) => self.expand(&word),
            Token::Punct('[') => {
                self.skip_until(']');
                Term::Blank
            }
            Token::Punct('(') => {
                self.skip_until(')');
                Term::Blank
            }
            Token::Punct(_) => Term::Blank,
        }
    }

    /// Skip a bracketed block whose opening token was already consumed
    fn skip_until(&mut self, close: char) {
        let open = if close == ']' { '[' } else { '(' };
        let mut depth = 1;
        while let Some(token) = self.next() {
            match token {
                Token::Punct(c) if c == open => depth += 1,
                Token::Punct(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn directive(&mut self, keyword: &str) -> bool {
        let lower = keyword.to_ascii_lowercase();
        match lower.as_str() {
            "@prefix" | "prefix" => {
                self.pos += 1;
                let name = match self.next() {
                    Some(Token::Word(name)) => name.trim_end_matches(':').to_string(),
                    _ => return true,
                };
                if let Some(Token::Iri(iri)) = self.next() {
                    let ns = self.resolve(&iri);
                    self.prefixes.insert(name, ns);
                }
                if self.peek() == Some(&Token::Punct('.')) {
                    self.pos += 1;
                }
                true
            }
            "@base" | "base" => {
                self.pos += 1;
                if let Some(Token::Iri(iri)) = self.next() {
                    let resolved = self.resolve(&iri);
                    self.base = Url::parse(&resolved).ok().or(self.base.take());
                }
                if self.peek() == Some(&Token::Punct('.')) {
                    self.pos += 1;
                }
                true
            }
            _ => false,
        }
    }

    fn statement(&mut self) {
        let Some(first) = self.next() else {
            return;
        };
        let subject = self.term(first);

        loop {
            let predicate = match self.next() {
                None | Some(Token::Punct('.')) => return,
                Some(Token::Punct(';')) => continue,
                Some(token) => self.term(token),
            };

            loop {
                let Some(token) = self.next() else {
                    return;
                };
                let object = self.term(token);
                if let Term::Iri(predicate) = &predicate {
                    self.triples.push(Triple {
                        subject: subject.clone(),
                        predicate: predicate.clone(),
                        object,
                    });
                }
                match self.next() {
                    Some(Token::Punct(',')) => continue,
                    Some(Token::Punct(';')) => break,
                    _ => return,
                }
            }
        }
    }

    fn run(mut self) -> Vec<Triple> {
        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Word(word) if self.directive(&word) => {}
                Token::Punct('.') => self.pos += 1,
                _ => self.statement(),
            }
        }
        self.triples
    }
}

/// Parse a Turtle document, resolving relative IRIs against `base`
pub fn parse(document: &str, base: &str) -> Vec<Triple> {
    Parser {
        tokens: tokenize(document),
        pos: 0,
        base: Url::parse(base).ok(),
        prefixes: HashMap::new(),
        triples: Vec::new(),
    }
    .run()
}

/// IRI objects of every triple with the given predicate
pub fn iri_objects<'a>(triples: &'a [Triple], predicate: &str) -> Vec<&'a str> {
    triples
        .iter()
        .filter(|t| t.predicate == predicate)
        .filter_map(|t| t.object.as_iri())
        .collect()
}

/// Format an IRI for output
pub fn iri(value: &str) -> String {
    format!("<{}>", value.replace('>', "%3E"))
}
