//! Declarative rule table.
//!
//! Rules are data: an ordered list of `(predicate, outcome)` pairs loaded from
//! configuration. Marker strings drift as the probed services change their
//! markup, so none of them are compiled in.

use serde::{Deserialize, Serialize};

use crate::probe::Observation;

/// Predicate over an [`Observation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    Always,
    StatusIs { code: u16 },
    StatusIn { codes: Vec<u16> },
    /// Inclusive range, e.g. `200..=299`
    StatusBetween { min: u16, max: u16 },
    BodyContains { text: String },
    /// Body strictly longer than `len` bytes
    BodyLongerThan { len: usize },
    HeaderContains { name: String, text: String },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { of: Box<Predicate> },
}

impl Predicate {
    pub fn matches(&self, observation: &Observation) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::StatusIs { code } => observation.status == *code,
            Predicate::StatusIn { codes } => codes.contains(&observation.status),
            Predicate::StatusBetween { min, max } => (*min..=*max).contains(&observation.status),
            Predicate::BodyContains { text } => observation.body.contains(text.as_str()),
            Predicate::BodyLongerThan { len } => observation.body.len() > *len,
            Predicate::HeaderContains { name, text } => {
                observation.header(name).is_some_and(|value| value.contains(text.as_str()))
            }
            Predicate::All { of } => of.iter().all(|p| p.matches(observation)),
            Predicate::Any { of } => of.iter().any(|p| p.matches(observation)),
            Predicate::Not { of } => !of.matches(observation),
        }
    }

    pub fn status(code: u16) -> Self {
        Predicate::StatusIs { code }
    }

    pub fn body(text: impl Into<String>) -> Self {
        Predicate::BodyContains { text: text.into() }
    }

    pub fn all(of: Vec<Predicate>) -> Self {
        Predicate::All { of }
    }

    pub fn any(of: Vec<Predicate>) -> Self {
        Predicate::Any { of }
    }

    pub fn not(of: Predicate) -> Self {
        Predicate::Not { of: Box::new(of) }
    }
}

/// Verdict produced by a matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Blocked,
}

/// One row of the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub when: Predicate,
    pub outcome: Outcome,
}

impl Rule {
    pub fn new(when: Predicate, outcome: Outcome) -> Self {
        Self { when, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(status: u16, body: &str) -> Observation {
        Observation { status, body: body.into(), ..Default::default() }
    }

    #[test]
    fn test_status_predicates() {
        let obs = observation(302, "");
        assert!(Predicate::status(302).matches(&obs));
        assert!(Predicate::StatusIn { codes: vec![200, 301, 302] }.matches(&obs));
        assert!(Predicate::StatusBetween { min: 300, max: 399 }.matches(&obs));
        assert!(!Predicate::StatusBetween { min: 200, max: 299 }.matches(&obs));
    }

    #[test]
    fn test_combinators() {
        let obs = observation(200, "<div id=\"app-shell\"></div><header class=\"marketing\">");
        let shell = Predicate::body("app-shell");
        let marketing = Predicate::body("marketing");

        assert!(Predicate::all(vec![shell.clone(), marketing.clone()]).matches(&obs));
        assert!(!Predicate::all(vec![shell.clone(), Predicate::not(marketing.clone())]).matches(&obs));
        assert!(Predicate::any(vec![Predicate::body("missing"), shell]).matches(&obs));
        assert!(Predicate::Always.matches(&obs));
    }

    #[test]
    fn test_header_predicate() {
        let obs = Observation {
            status: 403,
            headers: vec![("server".into(), "cloudflare".into())],
            ..Default::default()
        };
        let p = Predicate::HeaderContains { name: "Server".into(), text: "cloudflare".into() };
        assert!(p.matches(&obs));
        assert!(!Predicate::HeaderContains { name: "cf-ray".into(), text: "".into() }.matches(&obs));
    }

    #[test]
    fn test_rule_deserialize() {
        let json = r#"{
            "when": { "kind": "all", "of": [
                { "kind": "status_is", "code": 403 },
                { "kind": "not", "of": { "kind": "body_contains", "text": "unsupported_country" } }
            ]},
            "outcome": "pass"
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.outcome, Outcome::Pass);
        assert!(rule.when.matches(&observation(403, "{}")));
        assert!(!rule.when.matches(&observation(403, "unsupported_country")));
    }
}
