//! Topic routing patterns
//!
//! AMQP topic semantics: a pattern is dot-separated words where `*` matches
//! exactly one word and `#` matches zero or more words. The broker performs
//! the actual matching on bindings; this type exists to validate configured
//! patterns up front and to make the contract testable without a broker.

use std::fmt;

use super::error::BrokerError;

/// A parsed topic routing pattern such as `webhook.#` or `workflow.*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPattern {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    OneWord,
    ZeroOrMore,
}

impl RoutingPattern {
    /// Parse and validate a topic pattern
    pub fn parse(pattern: &str) -> Result<Self, BrokerError> {
        if pattern.is_empty() {
            return Err(BrokerError::InvalidPattern("empty pattern".to_string()));
        }

        let mut segments = Vec::new();
        for word in pattern.split('.') {
            let segment = match word {
                "" => {
                    return Err(BrokerError::InvalidPattern(format!(
                        "empty segment in '{}'",
                        pattern
                    )))
                }
                "*" => Segment::OneWord,
                "#" => Segment::ZeroOrMore,
                literal => {
                    if literal.contains('*') || literal.contains('#') {
                        return Err(BrokerError::InvalidPattern(format!(
                            "wildcard must be a whole segment in '{}'",
                            pattern
                        )));
                    }
                    Segment::Literal(literal.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as configured
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether a concrete routing key matches this pattern
    pub fn matches(&self, routing_key: &str) -> bool {
        let words: Vec<&str> = routing_key.split('.').collect();
        Self::matches_from(&self.segments, &words)
    }

    fn matches_from(segments: &[Segment], words: &[&str]) -> bool {
        match segments.split_first() {
            None => words.is_empty(),
            Some((Segment::Literal(lit), rest)) => match words.split_first() {
                Some((word, remaining)) => word == lit && Self::matches_from(rest, remaining),
                None => false,
            },
            Some((Segment::OneWord, rest)) => match words.split_first() {
                Some((_, remaining)) => Self::matches_from(rest, remaining),
                None => false,
            },
            Some((Segment::ZeroOrMore, rest)) => {
                // `#` greedily tries every possible split, including zero words
                (0..=words.len()).any(|n| Self::matches_from(rest, &words[n..]))
            }
        }
    }
}

impl fmt::Display for RoutingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
