#![forbid(unsafe_code)]

//! Attribute-filter expressions: comma-separated terms sorted into three
//! buckets. `key` requires the attribute to exist, `!key` forbids it, and
//! `key OP value` compares lexicographically. Buckets AND together;
//! comparisons OR together across keys. Terms that parse to nothing are
//! dropped, not reported.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comparison {
    pub key: String,
    pub op: CompareOp,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AttributeFilter {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
    pub comparisons: Vec<Comparison>,
}

impl AttributeFilter {
    pub fn parse(expr: &str) -> Self {
        let mut filter = AttributeFilter::default();
        for term in expr.split(',') {
            match parse_term(term) {
                Some(Term::Included(key)) => filter.included.push(key),
                Some(Term::Excluded(key)) => filter.excluded.push(key),
                Some(Term::Compared(comparison)) => filter.comparisons.push(comparison),
                None => {}
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty() && self.comparisons.is_empty()
    }
}

enum Term {
    Included(String),
    Excluded(String),
    Compared(Comparison),
}

// Term grammar: optional leading '!', then a key of word chars or '-',
// then an optional operator and value. Whitespace is allowed after the
// bang, around the operator, and before the value; the value keeps any
// trailing whitespace. A '!' wins over whatever follows the key.
fn parse_term(term: &str) -> Option<Term> {
    let (negated, rest) = match term.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, term),
    };
    let rest = rest.trim_start();

    let key_end = rest
        .char_indices()
        .find(|(_, ch)| !is_key_char(*ch))
        .map(|(index, _)| index)
        .unwrap_or(rest.len());
    if key_end == 0 {
        return None;
    }
    let key = rest[..key_end].to_string();
    let rest = rest[key_end..].trim_start();

    let (op, value) = match parse_operator(rest) {
        Some((op, tail)) => (Some(op), tail.trim_start()),
        None => (None, rest),
    };

    if negated {
        Some(Term::Excluded(key))
    } else if value.is_empty() {
        Some(Term::Included(key))
    } else if let Some(op) = op {
        Some(Term::Compared(Comparison {
            key,
            op,
            value: value.to_string(),
        }))
    } else {
        None
    }
}

fn is_key_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

// Two-char operators first so "<=" never parses as "<" then garbage.
const OPERATORS: &[(&str, CompareOp)] = &[
    ("==", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    ("<=", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
];

fn parse_operator(input: &str) -> Option<(CompareOp, &str)> {
    for (token, op) in OPERATORS {
        if let Some(tail) = input.strip_prefix(token) {
            return Some((*op, tail));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_buckets() {
        let filter = AttributeFilter::parse("color==red,!archived,checksum");
        assert_eq!(filter.included, vec!["checksum".to_string()]);
        assert_eq!(filter.excluded, vec!["archived".to_string()]);
        assert_eq!(
            filter.comparisons,
            vec![Comparison {
                key: "color".to_string(),
                op: CompareOp::Eq,
                value: "red".to_string(),
            }]
        );
    }

    #[test]
    fn bang_overrides_operator_and_value() {
        let filter = AttributeFilter::parse("!color==red");
        assert_eq!(filter.excluded, vec!["color".to_string()]);
        assert!(filter.comparisons.is_empty());
    }

    #[test]
    fn operator_with_empty_value_degrades_to_bare_key() {
        let filter = AttributeFilter::parse("color==");
        assert_eq!(filter.included, vec!["color".to_string()]);
        assert!(filter.comparisons.is_empty());
    }

    #[test]
    fn malformed_terms_are_skipped() {
        let filter = AttributeFilter::parse("color red,@bad,, !late-bang,ok");
        assert_eq!(filter.included, vec!["ok".to_string()]);
        assert!(filter.excluded.is_empty());
        assert!(filter.comparisons.is_empty());
    }

    #[test]
    fn whitespace_around_operator_is_consumed() {
        let filter = AttributeFilter::parse("size >= 100,! stale");
        assert_eq!(
            filter.comparisons,
            vec![Comparison {
                key: "size".to_string(),
                op: CompareOp::Ge,
                value: "100".to_string(),
            }]
        );
        assert_eq!(filter.excluded, vec!["stale".to_string()]);
    }

    #[test]
    fn value_keeps_trailing_whitespace() {
        let filter = AttributeFilter::parse("color==red ");
        assert_eq!(filter.comparisons[0].value, "red ");
    }

    #[test]
    fn two_char_operators_win_over_one_char() {
        let filter = AttributeFilter::parse("a<=1,b<2,c!=3");
        let ops: Vec<CompareOp> = filter.comparisons.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![CompareOp::Le, CompareOp::Lt, CompareOp::Ne]);
    }

    #[test]
    fn empty_expression_is_empty_filter() {
        assert!(AttributeFilter::parse("").is_empty());
        assert!(!AttributeFilter::parse("key").is_empty());
    }
}
