// The line-oriented scanner for grammar files. See the crate documentation for the format.

use std::{error::Error, fmt, num::IntErrorKind};

use crate::{
    ast::{GrammarAST, Symbol, TokenDecl, TOKEN_PREFIX},
    grammar::{AssocKind, PrecedenceLevel},
};

pub type GrammarResult<T> = Result<T, Vec<GrammarError>>;

/// The broad classes of grammar-authoring errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrammarErrorClass {
    MalformedTerminalDeclaration,
    MalformedProduction,
    UnknownSymbolReference,
}

/// The various different possible grammar errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind {
    MissingTerminalPrefix,
    IncompleteTerminal,
    IllegalPrecedence(String),
    PrecedenceOutOfRange(String),
    IllegalAssociativity(String),
    TooManyTerminalFields,
    DuplicateTerminal(String),
    NoTerminals,
    TerminalOnLhs(String),
    MissingDelimiter,
    EmptyRhs,
    IllegalProductionPrecedence(String),
    /// Contains the line of the production with the same right-hand side.
    DuplicateRhs(usize),
    NoProductions,
    UnknownSymbol { symbol: String, production: String },
}

impl GrammarErrorKind {
    pub fn class(&self) -> GrammarErrorClass {
        match self {
            GrammarErrorKind::MissingTerminalPrefix
            | GrammarErrorKind::IncompleteTerminal
            | GrammarErrorKind::IllegalPrecedence(_)
            | GrammarErrorKind::PrecedenceOutOfRange(_)
            | GrammarErrorKind::IllegalAssociativity(_)
            | GrammarErrorKind::TooManyTerminalFields
            | GrammarErrorKind::DuplicateTerminal(_)
            | GrammarErrorKind::NoTerminals => GrammarErrorClass::MalformedTerminalDeclaration,
            GrammarErrorKind::TerminalOnLhs(_)
            | GrammarErrorKind::MissingDelimiter
            | GrammarErrorKind::EmptyRhs
            | GrammarErrorKind::IllegalProductionPrecedence(_)
            | GrammarErrorKind::DuplicateRhs(_)
            | GrammarErrorKind::NoProductions => GrammarErrorClass::MalformedProduction,
            GrammarErrorKind::UnknownSymbol { .. } => GrammarErrorClass::UnknownSymbolReference,
        }
    }
}

impl fmt::Display for GrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            GrammarErrorKind::MissingTerminalPrefix => {
                "Terminals must be declared with a 't_' prefix"
            }
            GrammarErrorKind::IncompleteTerminal => "Incomplete terminal declaration",
            GrammarErrorKind::IllegalPrecedence(s) => {
                return write!(f, "Invalid non-integer precedence '{}'", s)
            }
            GrammarErrorKind::PrecedenceOutOfRange(s) => {
                return write!(f, "Precedence '{}' exceeds the integer range", s)
            }
            GrammarErrorKind::IllegalAssociativity(s) => {
                return write!(
                    f,
                    "Invalid associativity '{}': must be one of 'l', 'r' or 'n'",
                    s
                )
            }
            GrammarErrorKind::TooManyTerminalFields => {
                "Terminal declarations have at most three fields"
            }
            GrammarErrorKind::DuplicateTerminal(s) => {
                return write!(f, "Terminal '{}' declared more than once", s)
            }
            GrammarErrorKind::NoTerminals => "No terminals declared",
            GrammarErrorKind::TerminalOnLhs(s) => {
                return write!(
                    f,
                    "Terminal '{}' cannot be the left-hand side of a production",
                    s
                )
            }
            GrammarErrorKind::MissingDelimiter => {
                "Expected ' > ' between the left and right-hand sides of a production"
            }
            GrammarErrorKind::EmptyRhs => "Empty right-hand side",
            GrammarErrorKind::IllegalProductionPrecedence(s) => {
                return write!(f, "Production precedence '{}' exceeds the integer range", s)
            }
            GrammarErrorKind::DuplicateRhs(line) => {
                return write!(
                    f,
                    "Right-hand side duplicates the production on line {}",
                    line
                )
            }
            GrammarErrorKind::NoProductions => "No productions found",
            GrammarErrorKind::UnknownSymbol { symbol, production } => {
                return write!(
                    f,
                    "Unknown symbol '{}' in production '{}'",
                    symbol, production
                )
            }
        };
        write!(f, "{}", s)
    }
}

/// Any error from the grammar scanner returns an instance of this struct. `line` is 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError {
    pub kind: GrammarErrorKind,
    pub line: usize,
}

impl Error for GrammarError {}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at line {}", self.kind, self.line)
    }
}

pub(crate) struct GrammarParser<'a> {
    src: &'a str,
    ast: GrammarAST,
    errs: Vec<GrammarError>,
}

impl<'a> GrammarParser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        GrammarParser {
            src,
            ast: GrammarAST::new(),
            errs: Vec::new(),
        }
    }

    /// Scan the whole input. Every malformed line is reported; only if there are none is the
    /// resulting AST validated.
    pub(crate) fn parse(mut self) -> GrammarResult<GrammarAST> {
        let mut lines = self
            .src
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')));

        for (lineno, line) in lines.by_ref() {
            if line.trim().is_empty() {
                break;
            }
            self.parse_token(lineno, line);
        }
        for (lineno, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            self.parse_prod(lineno, line);
        }

        if !self.errs.is_empty() {
            return Err(self.errs);
        }
        self.ast.complete_and_validate()?;
        Ok(self.ast)
    }

    fn push_err(&mut self, kind: GrammarErrorKind, line: usize) {
        self.errs.push(GrammarError { kind, line });
    }

    fn parse_token(&mut self, lineno: usize, line: &str) {
        if !line.starts_with(TOKEN_PREFIX) {
            self.push_err(GrammarErrorKind::MissingTerminalPrefix, lineno);
            return;
        }
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let name = fields[0];
        if name == TOKEN_PREFIX {
            self.push_err(GrammarErrorKind::IncompleteTerminal, lineno);
            return;
        }

        let (level, assoc) = match fields[1..] {
            [] => (None, None),
            [f] => match AssocKind::from_code(f) {
                Some(kind) => (None, Some(kind)),
                None => match parse_level(f) {
                    Ok(l) => (Some(l), None),
                    Err(GrammarErrorKind::IllegalPrecedence(s))
                        if !s.starts_with(|c: char| c.is_alphabetic()) =>
                    {
                        self.push_err(GrammarErrorKind::IllegalAssociativity(s), lineno);
                        return;
                    }
                    Err(kind) => {
                        self.push_err(kind, lineno);
                        return;
                    }
                },
            },
            [l, a] => {
                let level = parse_level(l);
                let assoc = AssocKind::from_code(a);
                if assoc.is_none() {
                    self.push_err(GrammarErrorKind::IllegalAssociativity(a.to_owned()), lineno);
                }
                match (level, assoc) {
                    (Ok(level), Some(assoc)) => (Some(level), Some(assoc)),
                    (Err(kind), _) => {
                        self.push_err(kind, lineno);
                        return;
                    }
                    (Ok(_), None) => return,
                }
            }
            _ => {
                self.push_err(GrammarErrorKind::TooManyTerminalFields, lineno);
                return;
            }
        };

        let decl = TokenDecl {
            line: lineno,
            level,
            assoc,
        };
        if !self.ast.add_token(name.to_owned(), decl) {
            self.push_err(GrammarErrorKind::DuplicateTerminal(name.to_owned()), lineno);
        }
    }

    fn parse_prod(&mut self, lineno: usize, line: &str) {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        let lhs = fields[0];
        if lhs.starts_with(TOKEN_PREFIX) {
            self.push_err(GrammarErrorKind::TerminalOnLhs(lhs.to_owned()), lineno);
            return;
        }
        if fields.get(1) != Some(&">") {
            self.push_err(GrammarErrorKind::MissingDelimiter, lineno);
            return;
        }

        let mut rhs = &fields[2..];
        if rhs.is_empty() {
            self.push_err(GrammarErrorKind::EmptyRhs, lineno);
            return;
        }
        let mut precedence = None;
        if let [syms @ .., last] = rhs {
            if !syms.is_empty() && is_integer(last) {
                match last.parse::<PrecedenceLevel>() {
                    Ok(level) => precedence = Some(level),
                    Err(_) => {
                        self.push_err(
                            GrammarErrorKind::IllegalProductionPrecedence((*last).to_owned()),
                            lineno,
                        );
                        return;
                    }
                }
                rhs = syms;
            }
        }

        let symbols = rhs.iter().map(|s| Symbol::from_name(s)).collect();
        self.ast
            .add_prod(lhs.to_owned(), symbols, precedence, lineno);
    }
}

fn parse_level(s: &str) -> Result<PrecedenceLevel, GrammarErrorKind> {
    s.parse::<PrecedenceLevel>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
            GrammarErrorKind::PrecedenceOutOfRange(s.to_owned())
        }
        _ => GrammarErrorKind::IllegalPrecedence(s.to_owned()),
    })
}

/// Does `s` look like an (optionally signed) decimal integer, regardless of its magnitude?
fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix(&['-', '+'][..]).unwrap_or(s);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod test {
    use super::{GrammarErrorClass, GrammarErrorKind, GrammarParser};
    use crate::{ast::Symbol, grammar::AssocKind};

    fn errors(src: &str) -> Vec<(GrammarErrorKind, usize)> {
        match GrammarParser::new(src).parse() {
            Ok(_) => panic!("grammar unexpectedly valid"),
            Err(errs) => errs.into_iter().map(|e| (e.kind, e.line)).collect(),
        }
    }

    #[test]
    fn test_tokens_and_prods() {
        let src = "t_eof\nt_plus 1 l\nt_pow 3 r\nt_x n\nt_num 7\n\nE > E t_plus E\nE > t_num\nE > t_x E 9\n";
        let ast = GrammarParser::new(src).parse().unwrap();
        assert_eq!(
            ast.tokens.keys().collect::<Vec<_>>(),
            ["t_eof", "t_plus", "t_pow", "t_x", "t_num"]
        );
        assert_eq!(ast.tokens["t_eof"].level, None);
        assert_eq!(ast.tokens["t_plus"].level, Some(1));
        assert_eq!(ast.tokens["t_plus"].assoc, Some(AssocKind::Left));
        assert_eq!(ast.tokens["t_pow"].assoc, Some(AssocKind::Right));
        assert_eq!(ast.tokens["t_x"].level, None);
        assert_eq!(ast.tokens["t_x"].assoc, Some(AssocKind::Nonassoc));
        assert_eq!(ast.tokens["t_num"].level, Some(7));
        assert_eq!(ast.tokens["t_num"].assoc, None);

        assert_eq!(ast.prods.len(), 3);
        assert_eq!(ast.rules["E"], vec![0, 1, 2]);
        assert_eq!(
            ast.prods[0].symbols,
            vec![
                Symbol::Rule("E".to_owned()),
                Symbol::Token("t_plus".to_owned()),
                Symbol::Rule("E".to_owned())
            ]
        );
        assert_eq!(ast.prods[0].line, 7);
        assert_eq!(ast.prods[2].precedence, Some(9));
        assert_eq!(ast.prods[2].symbols.len(), 2);
    }

    #[test]
    fn test_windows_line_endings() {
        let ast = GrammarParser::new("t_eof\r\nt_a\r\n\r\nS > t_a\r\n")
            .parse()
            .unwrap();
        assert_eq!(ast.tokens.len(), 2);
        assert_eq!(ast.prods.len(), 1);
    }

    #[test]
    fn test_single_integer_rhs_is_a_symbol() {
        assert_eq!(
            errors("t_eof\n\nS > 5\n"),
            vec![(
                GrammarErrorKind::UnknownSymbol {
                    symbol: "5".to_owned(),
                    production: "S > 5".to_owned()
                },
                3
            )]
        );
    }

    #[test]
    fn test_malformed_terminals() {
        let src = "t_eof\neof\nt_\nt_a x\nt_b +\nt_c 99999999999\nt_d 1 q\nt_e z l\nt_f 1 l extra\nt_eof\n\nS > t_eof\n";
        assert_eq!(
            errors(src),
            vec![
                (GrammarErrorKind::MissingTerminalPrefix, 2),
                (GrammarErrorKind::IncompleteTerminal, 3),
                (GrammarErrorKind::IllegalPrecedence("x".to_owned()), 4),
                (GrammarErrorKind::IllegalAssociativity("+".to_owned()), 5),
                (
                    GrammarErrorKind::PrecedenceOutOfRange("99999999999".to_owned()),
                    6
                ),
                (GrammarErrorKind::IllegalAssociativity("q".to_owned()), 7),
                (GrammarErrorKind::IllegalPrecedence("z".to_owned()), 8),
                (GrammarErrorKind::TooManyTerminalFields, 9),
                (GrammarErrorKind::DuplicateTerminal("t_eof".to_owned()), 10),
            ]
        );
    }

    #[test]
    fn test_malformed_productions() {
        let src = "t_eof\nt_a\n\nt_a > S\nS t_a\nS > \nS >> t_a\nS > t_a t_a 99999999999\nS > t_a\n";
        let errs = errors(src);
        assert_eq!(
            errs,
            vec![
                (GrammarErrorKind::TerminalOnLhs("t_a".to_owned()), 4),
                (GrammarErrorKind::MissingDelimiter, 5),
                (GrammarErrorKind::EmptyRhs, 6),
                (GrammarErrorKind::MissingDelimiter, 7),
                (
                    GrammarErrorKind::IllegalProductionPrecedence("99999999999".to_owned()),
                    8
                ),
            ]
        );
        for (kind, _) in errs {
            assert_eq!(kind.class(), GrammarErrorClass::MalformedProduction);
        }
    }

    #[test]
    fn test_missing_sections() {
        assert_eq!(
            errors("\nS > t_a\n"),
            vec![(GrammarErrorKind::NoTerminals, 1), (GrammarErrorKind::UnknownSymbol {
                symbol: "t_a".to_owned(),
                production: "S > t_a".to_owned()
            }, 2)]
        );
        assert_eq!(
            errors("t_eof\nt_a\n"),
            vec![(GrammarErrorKind::NoProductions, 3)]
        );
    }

    #[test]
    fn test_error_display() {
        let errs = GrammarParser::new("t_eof\n\nS > T\n").parse().unwrap_err();
        assert_eq!(
            errs[0].to_string(),
            "Unknown symbol 'T' in production 'S > T' at line 3"
        );
        assert_eq!(
            errs[0].kind.class(),
            GrammarErrorClass::UnknownSymbolReference
        );
    }
}
