//! Parser for ground program text.
//!
//! Text is checked for syntax when a fragment is registered, and
//! turned into `Statement`s each time it is grounded, with the
//! fragment's parameters bound to integers.
use crate::error::Result;
use crate::ground::GroundAtom;
use crate::ground::GroundLiteral;
use crate::ground::Value;
use crate::logic::Symbol;
use pest::error::ErrorVariant;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;

#[derive(Parser)]
#[grammar = "backend/grammar.pest"]
pub struct GroundParser;

/// Integer values for a fragment's parameters.
pub(super) type Params<'a> = HashMap<&'a str, i64>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum RuleHead {
    Atom(GroundAtom),
    Choice(Vec<GroundAtom>),
    Falsum,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) enum Statement {
    Rule {
        head: RuleHead,
        body: Vec<GroundLiteral>,
    },
    Show(Symbol, usize),
    External(GroundAtom),
    Heuristic {
        atom: GroundAtom,
        weight: i64,
        sign: bool,
    },
}

/// Checks `text` for syntax errors only.
pub(super) fn check(text: &str) -> Result<()> {
    GroundParser::parse(Rule::program, text)?;
    Ok(())
}

pub(super) fn parse(text: &str, params: &Params<'_>) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for pair in GroundParser::parse(Rule::program, text)?.flat_map(Pair::into_inner) {
        match pair.as_rule() {
            Rule::EOI => break,
            _ => statements.push(build_statement(pair, params)?),
        }
    }

    Ok(statements)
}

fn custom_error(pair: &Pair<'_, Rule>, message: &str) -> pest::error::Error<Rule> {
    pest::error::Error::new_from_span(
        ErrorVariant::CustomError {
            message: message.to_string(),
        },
        pair.as_span(),
    )
}

fn build_integer(pair: &Pair<'_, Rule>) -> Result<i64> {
    let value = pair
        .as_str()
        .parse::<i64>()
        .map_err(|_| custom_error(pair, "integer out of range"))?;
    Ok(value)
}

fn build_statement(pair: Pair<'_, Rule>, params: &Params<'_>) -> Result<Statement> {
    let kind = pair.as_rule();
    let mut inner = pair.into_inner();

    let statement = match kind {
        Rule::show => {
            let mut name = None;
            let mut arity = None;
            for part in inner {
                match part.as_rule() {
                    Rule::identifier => name = Some(Symbol::from(part.as_str())),
                    _ => {
                        let value = build_integer(&part)?;
                        arity = Some(
                            usize::try_from(value)
                                .map_err(|_| custom_error(&part, "negative arity"))?,
                        );
                    }
                }
            }
            match (name, arity) {
                (Some(name), Some(arity)) => Statement::Show(name, arity),
                #[cfg(not(tarpaulin_include))]
                _ => panic!("#show without a signature"),
            }
        }
        Rule::external => {
            let mut atoms = inner.map(|part| build_atom(part, params));
            match atoms.next() {
                Some(atom) => Statement::External(atom?),
                #[cfg(not(tarpaulin_include))]
                None => panic!("#external without an atom"),
            }
        }
        Rule::heuristic => {
            let mut atom = None;
            let mut weight = 0;
            let mut sign = true;
            for part in inner {
                match part.as_rule() {
                    Rule::atom => atom = Some(build_atom(part, params)?),
                    Rule::integer => weight = build_integer(&part)?,
                    Rule::sign => sign = part.as_str() == "true",
                    #[cfg(not(tarpaulin_include))]
                    other => panic!("unexpected {:?} in #heuristic", other),
                }
            }
            match atom {
                Some(atom) => Statement::Heuristic { atom, weight, sign },
                #[cfg(not(tarpaulin_include))]
                None => panic!("#heuristic without an atom"),
            }
        }
        Rule::constraint => Statement::Rule {
            head: RuleHead::Falsum,
            body: match inner.next() {
                Some(body) => build_body(body, params)?,
                None => Vec::new(),
            },
        },
        Rule::rule => {
            let mut head = RuleHead::Falsum;
            let mut body = Vec::new();
            for part in inner {
                match part.as_rule() {
                    Rule::atom => head = RuleHead::Atom(build_atom(part, params)?),
                    Rule::choice => {
                        let atoms = part
                            .into_inner()
                            .map(|atom| build_atom(atom, params))
                            .collect::<Result<Vec<_>>>()?;
                        head = RuleHead::Choice(atoms);
                    }
                    Rule::body => body = build_body(part, params)?,
                    #[cfg(not(tarpaulin_include))]
                    other => panic!("unexpected {:?} in a rule", other),
                }
            }
            Statement::Rule { head, body }
        }
        #[cfg(not(tarpaulin_include))]
        other => panic!("unexpected statement {:?}", other),
    };

    Ok(statement)
}

fn build_body(pair: Pair<'_, Rule>, params: &Params<'_>) -> Result<Vec<GroundLiteral>> {
    let mut literals = Vec::new();
    for literal in pair.into_inner() {
        let mut positive = true;
        for part in literal.into_inner() {
            match part.as_rule() {
                Rule::negation => positive = false,
                _ => {
                    let atom = build_atom(part, params)?;
                    literals.push(GroundLiteral { atom, positive });
                }
            }
        }
    }

    Ok(literals)
}

fn build_atom(pair: Pair<'_, Rule>, params: &Params<'_>) -> Result<GroundAtom> {
    let mut inner = pair.into_inner();
    let predicate = match inner.next() {
        Some(name) => name.as_str(),
        #[cfg(not(tarpaulin_include))]
        None => panic!("atom without a predicate"),
    };

    let arguments = inner
        .map(|term| build_term(term, params))
        .collect::<Result<Vec<_>>>()?;
    Ok(GroundAtom::new(predicate, arguments))
}

fn build_term(pair: Pair<'_, Rule>, params: &Params<'_>) -> Result<Value> {
    let value = match pair.as_rule() {
        Rule::integer => Value::Int(build_integer(&pair)?),
        Rule::identifier => match params.get(pair.as_str()) {
            Some(value) => Value::Int(*value),
            None => Value::Const(pair.as_str().into()),
        },
        Rule::string => {
            let text = pair.into_inner().as_str();
            Value::Str(unescape(text).into())
        }
        Rule::tuple => {
            let mut items = Vec::new();
            let mut trailing = false;
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::trailing => trailing = true,
                    _ => items.push(build_term(part, params)?),
                }
            }

            if items.len() == 1 && !trailing {
                items.swap_remove(0)
            } else {
                Value::Tuple(items)
            }
        }
        #[cfg(not(tarpaulin_include))]
        other => panic!("unexpected term {:?}", other),
    };

    Ok(value)
}

fn unescape(text: &str) -> String {
    let mut ret = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            ret.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => ret.push('\n'),
            Some('t') => ret.push('\t'),
            Some(other) => ret.push(other),
            None => {}
        }
    }

    ret
}

#[cfg(test)]
use pretty_assertions::assert_eq;

#[cfg(test)]
fn parse_ok(text: &str) -> Vec<Statement> {
    parse(text, &Params::new()).expect("ok")
}

#[cfg(test)]
fn render(statements: &[Statement]) -> Vec<String> {
    let atoms = |atoms: &[GroundAtom]| {
        atoms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    };
    let body = |body: &[GroundLiteral]| {
        body.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    statements
        .iter()
        .map(|statement| match statement {
            Statement::Rule { head, body: b } => {
                let head = match head {
                    RuleHead::Atom(atom) => atom.to_string(),
                    RuleHead::Choice(xs) => format!("{{{}}}", atoms(xs)),
                    RuleHead::Falsum => String::new(),
                };
                if b.is_empty() {
                    format!("{}.", head)
                } else {
                    format!("{} :- {}.", head, body(b))
                }
            }
            Statement::Show(name, arity) => format!("#show {}/{}.", name, arity),
            Statement::External(atom) => format!("#external {}.", atom),
            Statement::Heuristic { atom, weight, sign } => {
                format!("#heuristic {}. [{},{}]", atom, weight, sign)
            }
        })
        .collect()
}

#[test]
fn test_parse_statements() {
    let text = r#"
        % the hypothesis space, in miniature
        clause(0).
        {body_literal(0,edge,2,(0,1)); body_literal(0,edge,2,(1,0))}.
        size(1) :- body_literal(0,edge,2,(0,1)).
        :- size(1), not clause(0).
        nothing :- nota.
        #show body_literal/4.
        #external size_in_literals(3).
        #heuristic size(2). [998, true]
        seen_rule("f/1(0):-g/1(0)", 0) :- head_literal(0,f,1,(0,)).
    "#;

    assert_eq!(
        render(&parse_ok(text)),
        vec![
            "clause(0).",
            "{body_literal(0,edge,2,(0,1));body_literal(0,edge,2,(1,0))}.",
            "size(1) :- body_literal(0,edge,2,(0,1)).",
            " :- size(1), not clause(0).",
            "nothing :- nota.",
            "#show body_literal/4.",
            "#external size_in_literals(3).",
            "#heuristic size(2). [998,true]",
            "seen_rule(\"f/1(0):-g/1(0)\",0) :- head_literal(0,f,1,(0,)).",
        ]
    );
}

#[test]
fn test_tuples() {
    let statements = parse_ok("p((1)). p((1,)). p(()). p(((a,b),-2)).");
    assert_eq!(
        render(&statements),
        vec!["p(1).", "p((1,)).", "p(()).", "p(((a,b),-2))."]
    );
}

#[test]
fn test_params_become_integers() {
    let params: Params = [("n", 4)].into_iter().collect();
    let statements = parse(
        "#external size_in_literals(n). :- size_in_literals(n), not size(n), m.",
        &params,
    )
    .expect("ok");

    assert_eq!(
        render(&statements),
        vec![
            "#external size_in_literals(4).",
            " :- size_in_literals(4), not size(4), m.",
        ]
    );
}

#[test]
fn test_syntax_errors() {
    assert!(check("p(X).").is_err());
    assert!(check("p(1) :- .").is_err());
    assert!(check("#show p.").is_err());
    assert!(check("p(1)").is_err());
    assert!(check("").is_ok());
    assert!(check("% only a comment").is_ok());
}

#[test]
fn test_integer_out_of_range() {
    assert!(check("p(99999999999999999999).").is_ok());
    assert!(parse("p(99999999999999999999).", &Params::new()).is_err());
}

#[test]
fn test_unescape() {
    assert_eq!(unescape(r#"a\"b\\c\n"#), "a\"b\\c\n");
}
