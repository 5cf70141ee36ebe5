//! Compact filter expression parser using nom.
//!
//! Turns a one-line filter into the condition list the clause builder takes.
//!
//! # Syntax Overview
//!
//! ```text
//! email=a@b.com & name~ada | age>=18 & id in [1, 2]
//! ──┬── ┬ ───┬── ┬
//!   │   │    │   └── Connector (& and, | or) joining to the previous condition
//!   │   │    └── Value (bare word, 'quoted', number, true/false/null, [list])
//!   │   └── Operator
//!   └── Field
//! ```
//!
//! | Operator | Meaning        |
//! |----------|----------------|
//! | `=`      | equals         |
//! | `!=`     | not equals     |
//! | `<` `<=` `>` `>=` | ordering |
//! | `~`      | contains       |
//! | `^=`     | starts with    |
//! | `$=`     | ends with      |
//! | `in`     | set membership |

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{map, value},
    multi::separated_list0,
    sequence::{delimited, preceded, terminated, tuple},
};

use crate::ast::*;
use crate::error::{GelError, GelResult};

/// Parse a complete filter expression.
pub fn parse(input: &str) -> GelResult<Vec<Where>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    match parse_conditions(input) {
        Ok(("", conditions)) => Ok(conditions),
        Ok((remaining, _)) => Err(GelError::parse(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(GelError::parse(
            input.len() - e.input.len(),
            format!("Parse failed: {:?}", e.code),
        )),
        Err(nom::Err::Incomplete(_)) => Err(GelError::parse(input.len(), "Incomplete input")),
    }
}

/// Parse conditions joined by `&` / `|`.
fn parse_conditions(input: &str) -> IResult<&str, Vec<Where>> {
    let (input, first) = parse_condition(input)?;
    let mut conditions = vec![first];

    let mut remaining = input;
    loop {
        let (input, _) = multispace0(remaining)?;
        let connector = match input.chars().next() {
            Some('&') => Connector::And,
            Some('|') => Connector::Or,
            _ => break,
        };
        let (input, _) = multispace0(&input[1..])?;
        let (input, mut cond) = parse_condition(input)?;
        cond.connector = connector;
        conditions.push(cond);
        remaining = input;
    }

    Ok((remaining, conditions))
}

/// Parse a field name.
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a single condition.
fn parse_condition(input: &str) -> IResult<&str, Where> {
    let (input, field) = parse_identifier(input)?;
    let (input, (operator, value)) = alt((parse_membership, parse_comparison))(input)?;

    Ok((
        input,
        Where {
            field: field.to_string(),
            operator,
            value,
            connector: Connector::And,
        },
    ))
}

/// Parse ` in [a, b]`.
fn parse_membership(input: &str) -> IResult<&str, (Operator, Value)> {
    map(
        preceded(tuple((multispace1, tag("in"), multispace0)), parse_list),
        |v| (Operator::In, v),
    )(input)
}

/// Parse an operator followed by a scalar value.
fn parse_comparison(input: &str) -> IResult<&str, (Operator, Value)> {
    let (input, _) = multispace0(input)?;
    let (input, operator) = alt((
        value(Operator::Gte, tag(">=")),
        value(Operator::Lte, tag("<=")),
        value(Operator::Ne, tag("!=")),
        value(Operator::StartsWith, tag("^=")),
        value(Operator::EndsWith, tag("$=")),
        value(Operator::Contains, char('~')),
        value(Operator::Gt, char('>')),
        value(Operator::Lt, char('<')),
        value(Operator::Eq, char('=')),
    ))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, v) = parse_scalar(input)?;
    Ok((input, (operator, v)))
}

/// Parse `[v, v, ...]`.
fn parse_list(input: &str) -> IResult<&str, Value> {
    map(
        delimited(
            terminated(char('['), multispace0),
            separated_list0(delimited(multispace0, char(','), multispace0), parse_scalar),
            preceded(multispace0, char(']')),
        ),
        Value::Array,
    )(input)
}

/// Parse a quoted string or a bare word.
fn parse_scalar(input: &str) -> IResult<&str, Value> {
    alt((parse_quoted_string, map(parse_bare, classify)))(input)
}

/// Parse a quoted string.
fn parse_quoted_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('\'')(input)?;
    let (input, content) = take_while(|c| c != '\'')(input)?;
    let (input, _) = char('\'')(input)?;

    Ok((input, Value::String(content.to_string())))
}

fn parse_bare(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && !matches!(c, '&' | '|' | '[' | ']' | ',' | '\''))(input)
}

/// Keywords and numbers get their JSON type; anything else is a string.
fn classify(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = word.parse::<i64>() {
                Value::from(n)
            } else if let Some(n) = word
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
            {
                Value::Number(n)
            } else {
                Value::String(word.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_eq() {
        let conds = parse("email=a@b.com").unwrap();
        assert_eq!(conds, vec![Where::eq("email", "a@b.com")]);
    }

    #[test]
    fn test_operators() {
        let cases = [
            ("age>=18", Operator::Gte),
            ("age<=18", Operator::Lte),
            ("age>18", Operator::Gt),
            ("age<18", Operator::Lt),
            ("age!=18", Operator::Ne),
            ("name~ada", Operator::Contains),
            ("name^=ada", Operator::StartsWith),
            ("name$=ada", Operator::EndsWith),
        ];
        for (input, op) in cases {
            let conds = parse(input).unwrap();
            assert_eq!(conds[0].operator, op, "{input}");
        }
    }

    #[test]
    fn test_connectors() {
        let conds = parse("name = 'Ada L' & age > 3 | verified=true").unwrap();
        assert_eq!(conds.len(), 3);
        assert_eq!(conds[0].value, json!("Ada L"));
        assert_eq!(conds[1].connector, Connector::And);
        assert_eq!(conds[1].value, json!(3));
        assert_eq!(conds[2].connector, Connector::Or);
        assert_eq!(conds[2].value, json!(true));
    }

    #[test]
    fn test_membership() {
        let conds = parse("id in [a, 'b c', 3]").unwrap();
        assert_eq!(conds[0].operator, Operator::In);
        assert_eq!(conds[0].value, json!(["a", "b c", 3]));
    }

    #[test]
    fn test_null_and_float() {
        let conds = parse("image=null & score<2.5").unwrap();
        assert_eq!(conds[0].value, Value::Null);
        assert_eq!(conds[1].value, json!(2.5));
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse("email"), Err(GelError::Parse { .. })));
        assert!(matches!(
            parse("email=a ]"),
            Err(GelError::Parse { position: 7, .. })
        ));
    }

    #[test]
    fn test_error_position_points_at_failure() {
        assert!(matches!(
            parse("email=a & age"),
            Err(GelError::Parse { position: 13, .. })
        ));
        assert!(matches!(
            parse("name=x | =3"),
            Err(GelError::Parse { position: 9, .. })
        ));
    }
}
