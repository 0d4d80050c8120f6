use std::{collections::HashMap, fmt};

use indexmap::IndexMap;

use crate::{
    grammar::{AssocKind, Precedence, PrecedenceLevel},
    parser::{GrammarError, GrammarErrorKind},
};

/// Names starting with this prefix are terminals; all other names are rules.
pub const TOKEN_PREFIX: &str = "t_";

/// An AST representing a scanned grammar file. It is built up line by line by the grammar
/// scanner (or directly by a caller); [`GrammarAST::complete_and_validate`] must succeed before
/// it is turned into a [`Grammar`](crate::Grammar).
#[derive(Debug)]
pub struct GrammarAST {
    /// Token declarations in declaration order. The first token is the end-of-input token.
    pub tokens: IndexMap<String, TokenDecl>,
    /// A map from a rule name to indexes into `prods`, in order of first appearance.
    pub rules: IndexMap<String, Vec<usize>>,
    pub prods: Vec<Production>,
}

/// The declaration of a token: its line and its (optional) precedence fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenDecl {
    pub line: usize,
    pub level: Option<PrecedenceLevel>,
    pub assoc: Option<AssocKind>,
}

impl TokenDecl {
    /// A token declared with neither a precedence nor an associativity has no precedence.
    /// Otherwise any missing field takes its default (level `0`, non-associative).
    pub fn precedence(&self) -> Option<Precedence> {
        if self.level.is_none() && self.assoc.is_none() {
            return None;
        }
        Some(Precedence {
            level: self.level.unwrap_or(0),
            kind: self.assoc.unwrap_or(AssocKind::Nonassoc),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Production {
    pub lhs: String,
    pub symbols: Vec<Symbol>,
    /// The explicit precedence given at the end of the production line, if any.
    pub precedence: Option<PrecedenceLevel>,
    pub line: usize,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Symbol {
    Rule(String),
    Token(String),
}

impl Symbol {
    /// Classify `name` by its prefix.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with(TOKEN_PREFIX) {
            Symbol::Token(name.to_owned())
        } else {
            Symbol::Rule(name.to_owned())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Rule(s) | Symbol::Token(s) => s,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} >", self.lhs)?;
        for sym in &self.symbols {
            write!(f, " {}", sym)?;
        }
        if let Some(level) = self.precedence {
            write!(f, " {}", level)?;
        }
        Ok(())
    }
}

impl GrammarAST {
    pub fn new() -> Self {
        GrammarAST {
            tokens: IndexMap::new(),
            rules: IndexMap::new(),
            prods: Vec::new(),
        }
    }

    /// Declare a token. Returns `false` (leaving the existing declaration untouched) if a token
    /// named `name` has already been declared.
    pub fn add_token(&mut self, name: String, decl: TokenDecl) -> bool {
        if self.tokens.contains_key(&name) {
            return false;
        }
        self.tokens.insert(name, decl);
        true
    }

    pub fn add_prod(
        &mut self,
        lhs: String,
        symbols: Vec<Symbol>,
        precedence: Option<PrecedenceLevel>,
        line: usize,
    ) {
        self.rules
            .entry(lhs.clone())
            .or_default()
            .push(self.prods.len());
        self.prods.push(Production {
            lhs,
            symbols,
            precedence,
            line,
        });
    }

    /// The start rule is the left-hand side of the first production.
    pub fn start_rule(&self) -> Option<&str> {
        self.prods.first().map(|p| p.lhs.as_str())
    }

    /// Check that the grammar is usable for table construction:
    ///   1) at least one token and one production exist;
    ///   2) no two productions share an identical right-hand side;
    ///   3) every symbol referenced by a production is a declared token or a rule.
    ///
    /// All problems found are returned together.
    pub fn complete_and_validate(&self) -> Result<(), Vec<GrammarError>> {
        let mut errs = Vec::new();
        if self.tokens.is_empty() {
            errs.push(GrammarError {
                kind: GrammarErrorKind::NoTerminals,
                line: 1,
            });
        }
        if self.prods.is_empty() {
            errs.push(GrammarError {
                kind: GrammarErrorKind::NoProductions,
                line: self.tokens.values().map(|t| t.line).max().unwrap_or(0) + 1,
            });
        }

        let mut seen_rhss: HashMap<&[Symbol], usize> = HashMap::new();
        for prod in &self.prods {
            if let Some(&other) = seen_rhss.get(prod.symbols.as_slice()) {
                errs.push(GrammarError {
                    kind: GrammarErrorKind::DuplicateRhs(other),
                    line: prod.line,
                });
            } else {
                seen_rhss.insert(prod.symbols.as_slice(), prod.line);
            }

            for sym in &prod.symbols {
                let known = match sym {
                    Symbol::Rule(n) => self.rules.contains_key(n),
                    Symbol::Token(n) => self.tokens.contains_key(n),
                };
                if !known {
                    errs.push(GrammarError {
                        kind: GrammarErrorKind::UnknownSymbol {
                            symbol: sym.name().to_owned(),
                            production: prod.to_string(),
                        },
                        line: prod.line,
                    });
                }
            }
        }

        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }
}

#[cfg(test)]
mod test {
    use super::{GrammarAST, Symbol, TokenDecl};
    use crate::{grammar::AssocKind, parser::GrammarErrorKind, Precedence};

    fn decl(line: usize) -> TokenDecl {
        TokenDecl {
            line,
            level: None,
            assoc: None,
        }
    }

    #[test]
    fn token_precedence_defaults() {
        assert_eq!(decl(1).precedence(), None);
        let d = TokenDecl {
            line: 1,
            level: None,
            assoc: Some(AssocKind::Right),
        };
        assert_eq!(
            d.precedence(),
            Some(Precedence {
                level: 0,
                kind: AssocKind::Right
            })
        );
        let d = TokenDecl {
            line: 1,
            level: Some(4),
            assoc: None,
        };
        assert_eq!(
            d.precedence(),
            Some(Precedence {
                level: 4,
                kind: AssocKind::Nonassoc
            })
        );
    }

    #[test]
    fn duplicate_token_is_refused() {
        let mut ast = GrammarAST::new();
        assert!(ast.add_token("t_eof".to_owned(), decl(1)));
        assert!(!ast.add_token("t_eof".to_owned(), decl(2)));
        assert_eq!(ast.tokens["t_eof"].line, 1);
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut ast = GrammarAST::new();
        ast.add_token("t_eof".to_owned(), decl(1));
        ast.add_token("t_a".to_owned(), decl(2));
        ast.add_prod("S".to_owned(), vec![Symbol::from_name("t_a")], None, 4);
        ast.add_prod("T".to_owned(), vec![Symbol::from_name("t_a")], None, 5);
        ast.add_prod("S".to_owned(), vec![Symbol::from_name("U")], None, 6);
        ast.add_prod("S".to_owned(), vec![Symbol::from_name("t_b")], None, 7);
        let errs = ast.complete_and_validate().unwrap_err();
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0].kind, GrammarErrorKind::DuplicateRhs(4));
        assert_eq!(errs[0].line, 5);
        match &errs[1].kind {
            GrammarErrorKind::UnknownSymbol { symbol, production } => {
                assert_eq!(symbol, "U");
                assert_eq!(production, "S > U");
            }
            k => panic!("unexpected error {:?}", k),
        }
        assert_eq!(errs[1].line, 6);
        assert_eq!(errs[2].line, 7);
    }

    #[test]
    fn start_rule_is_first_lhs() {
        let mut ast = GrammarAST::new();
        ast.add_token("t_eof".to_owned(), decl(1));
        assert_eq!(ast.start_rule(), None);
        ast.add_prod("B".to_owned(), vec![Symbol::from_name("t_eof")], None, 3);
        ast.add_prod("A".to_owned(), vec![Symbol::from_name("B")], None, 4);
        assert_eq!(ast.start_rule(), Some("B"));
        assert!(ast.complete_and_validate().is_ok());
    }
}
