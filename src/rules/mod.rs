//! The rule compiler: turns a constrained visibility rule string into a
//! structured conditional expression ("domain") for the rendering client.
//!
//! The grammar is deliberately tiny: either the literal `"always visible"`,
//! or a single binary comparison `<operand> <operator> <value>` where the
//! token `$identifier` stands for the owning entity's identifier. There is
//! no boolean composition and no nesting.

use crate::error::CoreError;
use std::fmt;

/// The literal rule that compiles to the unconditional empty domain.
pub const ALWAYS_VISIBLE: &str = "always visible";

/// A comparison value, classified so the consumer can interpret it.
///
/// Numbers and booleans are rendered bare; anything else is rendered as a
/// single-quoted string literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValue {
    /// Kept as the raw token so `0.5` renders exactly as written.
    Number(String),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for RuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleValue::Number(raw) => write!(f, "{raw}"),
            RuleValue::Boolean(b) => write!(f, "{b}"),
            RuleValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// A compiled conditional expression.
///
/// Renders as the 3-element `['<operand>','<operator>',<value>]` text the
/// client consumes, or `[]` for "always true".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    Always,
    Condition {
        operand: String,
        /// Carried verbatim; the operator set is open, constrained only by
        /// the selection lists that gate rule writes.
        operator: String,
        value: RuleValue,
    },
}

impl Domain {
    /// Serializes the domain to the textual form stored in the cache slot.
    pub fn render(&self) -> String {
        match self {
            Domain::Always => "[]".to_string(),
            Domain::Condition { operand, operator, value } => {
                format!("['{operand}','{operator}',{value}]")
            }
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// Compiles a rule string against an entity identifier.
///
/// Substitution happens over the whole rule before tokenization, so
/// `$identifier` may appear on either side of the comparison. A rule that
/// does not decompose into exactly three tokens is a configuration error.
pub fn compile(identifier: i64, rule: &str) -> Result<Domain, CoreError> {
    if rule == ALWAYS_VISIBLE {
        return Ok(Domain::Always);
    }

    let substituted = rule.replace("$identifier", &identifier.to_string());
    let tokens: Vec<&str> = substituted.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(CoreError::InvalidRuleFormat { rule: rule.to_string() });
    }

    Ok(Domain::Condition {
        operand: tokens[0].to_string(),
        operator: tokens[1].to_string(),
        value: classify(tokens[2]),
    })
}

/// Numeric or boolean tokens stay bare; everything else becomes a quoted
/// string literal.
fn classify(token: &str) -> RuleValue {
    match token {
        "true" => RuleValue::Boolean(true),
        "false" => RuleValue::Boolean(false),
        _ if token.parse::<f64>().is_ok() => RuleValue::Number(token.to_string()),
        _ => RuleValue::Text(token.to_string()),
    }
}

// --- Rule Compiler Test Suite ---
#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(5, "$identifier = 5", "['5','=',5]")] // operand substituted too
    #[case(7, "$page.submitted = true", "['$page.submitted','=',true]")]
    #[case(7, "$page.submitted = false", "['$page.submitted','=',false]")]
    #[case(3, "$page.selection = $identifier", "['$page.selection','=',3]")]
    #[case(1, "$page.actions_counter > 3", "['$page.actions_counter','>',3]")]
    #[case(1, "$page.mode = foo", "['$page.mode','=','foo']")] // non-numeric value gets quoted
    #[case(1, "$page.ratio > 0.5", "['$page.ratio','>',0.5]")]
    fn test_compile_renders_domain(#[case] id: i64, #[case] rule: &str, #[case] expected: &str) {
        let domain = compile(id, rule).unwrap();
        assert_eq!(domain.render(), expected);
    }

    #[test]
    fn test_always_visible_is_empty_for_any_identifier() {
        for id in [0, 1, 42, -3] {
            assert_eq!(compile(id, ALWAYS_VISIBLE).unwrap(), Domain::Always);
            assert_eq!(compile(id, ALWAYS_VISIBLE).unwrap().render(), "[]");
        }
    }

    #[test]
    fn test_compile_is_idempotent() {
        let a = compile(9, "$page.selection > 0").unwrap();
        let b = compile(9, "$page.selection > 0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.render(), b.render());
    }

    #[rstest]
    #[case("$page.submitted =")] // two tokens
    #[case("$page.submitted")] // one token
    #[case("$page.submitted = true or false")] // five tokens
    #[case("")]
    fn test_malformed_rule_is_rejected(#[case] rule: &str) {
        let err = compile(1, rule).unwrap_err();
        assert_eq!(err, CoreError::InvalidRuleFormat { rule: rule.to_string() });
    }
}
