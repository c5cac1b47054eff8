//! History query parameters.

use time::Time;
use time::macros::format_description;

use crate::error::{ParseError, ParseResult};

/// Time window and node filter for the history graph endpoint.
///
/// Times are wall-clock `HH:MM`; the backend applies them to the current day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub start: Option<Time>,
    pub end: Option<Time>,
    pub nodes: Vec<String>,
}

impl HistoryQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window start.
    #[must_use]
    pub fn start(mut self, start: Time) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the window end.
    #[must_use]
    pub fn end(mut self, end: Time) -> Self {
        self.end = Some(end);
        self
    }

    /// Restrict to one node. May be called repeatedly.
    #[must_use]
    pub fn node(mut self, node_id: impl Into<String>) -> Self {
        self.nodes.push(node_id.into());
        self
    }

    /// Reject windows whose end precedes their start.
    pub fn validate(&self) -> ParseResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end)
            && end < start
        {
            return Err(ParseError::InvalidTime(format!(
                "end {} is before start {}",
                format_time(end),
                format_time(start)
            )));
        }
        Ok(())
    }

    /// Query string pairs, in the order the endpoint expects.
    ///
    /// ```
    /// use tirta_types::{HistoryQuery, parse_time};
    ///
    /// let q = HistoryQuery::new()
    ///     .start(parse_time("06:00").unwrap())
    ///     .node("a")
    ///     .node("b");
    /// assert_eq!(
    ///     q.pairs(),
    ///     vec![
    ///         ("start".to_string(), "06:00".to_string()),
    ///         ("nodes[]".to_string(), "a".to_string()),
    ///         ("nodes[]".to_string(), "b".to_string()),
    ///     ]
    /// );
    /// ```
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(2 + self.nodes.len());
        if let Some(start) = self.start {
            pairs.push(("start".to_string(), format_time(start)));
        }
        if let Some(end) = self.end {
            pairs.push(("end".to_string(), format_time(end)));
        }
        pairs.extend(
            self.nodes
                .iter()
                .map(|n| ("nodes[]".to_string(), n.clone())),
        );
        pairs
    }
}

/// Parse a wall-clock time in `HH:MM` form.
pub fn parse_time(raw: &str) -> ParseResult<Time> {
    Time::parse(raw.trim(), format_description!("[hour]:[minute]"))
        .map_err(|_| ParseError::InvalidTime(raw.to_string()))
}

/// Format a time as `HH:MM`.
#[must_use]
pub fn format_time(t: Time) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("06:30").unwrap(), time!(06:30));
        assert_eq!(parse_time(" 23:59 ").unwrap(), time!(23:59));
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("6pm").is_err());
    }

    #[test]
    fn test_empty_query_has_no_pairs() {
        assert!(HistoryQuery::new().pairs().is_empty());
    }

    #[test]
    fn test_window_pairs() {
        let q = HistoryQuery::new().start(time!(08:00)).end(time!(17:45));
        assert_eq!(
            q.pairs(),
            vec![
                ("start".to_string(), "08:00".to_string()),
                ("end".to_string(), "17:45".to_string()),
            ]
        );
    }

    #[test]
    fn test_inverted_window_rejected() {
        let q = HistoryQuery::new().start(time!(18:00)).end(time!(06:00));
        assert!(matches!(q.validate(), Err(ParseError::InvalidTime(_))));
        assert!(HistoryQuery::new().end(time!(06:00)).validate().is_ok());
    }
}
