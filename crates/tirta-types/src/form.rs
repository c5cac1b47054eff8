//! Node registration form and its validation.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::Metric;

/// Payload for registering or updating a node.
///
/// Coordinates are kept as entered so the backend receives exactly what the
/// operator typed; metric values are plain numbers.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeForm {
    #[cfg_attr(feature = "serde", serde(rename = "nodeID"))]
    pub node_id: String,
    pub long: String,
    pub lat: String,
    pub temp: f64,
    pub ph: f64,
    pub ec: f64,
    pub turb: f64,
    #[cfg_attr(feature = "serde", serde(rename = "do"))]
    pub dissolved_oxygen: f64,
}

impl NodeForm {
    /// Start a form for a node at the given coordinates.
    pub fn new(node_id: impl Into<String>, lat: impl Into<String>, long: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            lat: lat.into(),
            long: long.into(),
            ..Self::default()
        }
    }

    /// Set one metric value.
    #[must_use]
    pub fn with_metric(mut self, metric: Metric, value: f64) -> Self {
        match metric {
            Metric::Temperature => self.temp = value,
            Metric::Ph => self.ph = value,
            Metric::Salinity => self.ec = value,
            Metric::Turbidity => self.turb = value,
            Metric::DissolvedOxygen => self.dissolved_oxygen = value,
        }
        self
    }

    /// Check required fields and coordinate ranges.
    ///
    /// Every problem is collected; the first failure does not short-circuit.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.node_id.trim().is_empty() {
            errors.push("nodeID", "Node ID is required");
        }

        check_coordinate(&mut errors, "lat", "Latitude", &self.lat, 90.0);
        check_coordinate(&mut errors, "long", "Longitude", &self.long, 180.0);

        for metric in Metric::ALL {
            let value = self.metric(metric);
            if !value.is_finite() {
                errors.push(metric.key(), format!("{} must be a number", metric.label()));
            }
        }

        errors.into_result()
    }

    /// Value of one metric.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => self.temp,
            Metric::Ph => self.ph,
            Metric::Salinity => self.ec,
            Metric::Turbidity => self.turb,
            Metric::DissolvedOxygen => self.dissolved_oxygen,
        }
    }
}

fn check_coordinate(errors: &mut ValidationErrors, field: &str, label: &str, raw: &str, bound: f64) {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.push(field, format!("{label} is required"));
        return;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && (-bound..=bound).contains(&v) => {}
        Ok(_) => errors.push(field, format!("{label} must be between -{bound} and {bound}")),
        Err(_) => errors.push(field, format!("{label} must be a number")),
    }
}

/// Parse a metric input. Blank input counts as 0.
///
/// ```
/// use tirta_types::parse_metric_value;
///
/// assert_eq!(parse_metric_value(""), Ok(0.0));
/// assert_eq!(parse_metric_value(" 7.2 "), Ok(7.2));
/// assert!(parse_metric_value("abc").is_err());
/// ```
pub fn parse_metric_value(raw: &str) -> Result<f64, crate::ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| crate::ParseError::InvalidValue(raw.to_string()))
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A set of field-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Record a message for a field.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All messages in insertion order.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Messages for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_field_errors(
            self.0.iter().map(|e| (e.field.as_str(), e.message.as_str())),
        ))
    }
}

/// Render field errors as a bulleted list, one `• Field: message` per line.
///
/// camelCase field names are split into words and capitalized; the list
/// keeps input order.
///
/// ```
/// use tirta_types::format_field_errors;
///
/// let text = format_field_errors([("lat", "Latitude is required"), ("nodeID", "taken")]);
/// assert_eq!(text, "• Lat: Latitude is required\n• Node ID: taken");
/// ```
pub fn format_field_errors<'a, I>(errors: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    errors
        .into_iter()
        .map(|(field, message)| format!("• {}: {}", readable_field(field), message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn readable_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else {
            if c.is_uppercase() && prev_lower {
                out.push(' ');
            }
            out.push(c);
        }
        prev_lower = c.is_lowercase();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> NodeForm {
        NodeForm::new("node-7", "-6.2", "106.8").with_metric(Metric::Ph, 7.1)
    }

    #[test]
    fn test_valid_form_passes() {
        assert_eq!(valid_form().validate(), Ok(()));
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let form = NodeForm::default();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.for_field("nodeID").count(), 1);
        assert_eq!(errors.for_field("lat").next(), Some("Latitude is required"));
        assert_eq!(errors.for_field("long").next(), Some("Longitude is required"));
    }

    #[test]
    fn test_coordinate_range() {
        let mut form = valid_form();
        form.lat = "91".into();
        form.long = "-180".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.for_field("lat").next(),
            Some("Latitude must be between -90 and 90")
        );
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let mut form = valid_form();
        form.long = "east".into();
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.for_field("long").next(), Some("Longitude must be a number"));
    }

    #[test]
    fn test_non_finite_metric_rejected() {
        let form = valid_form().with_metric(Metric::Turbidity, f64::NAN);
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.for_field("turb").count(), 1);
    }

    #[test]
    fn test_display_uses_bullets() {
        let mut errors = ValidationErrors::default();
        errors.push("nodeID", "Node ID is required");
        errors.push("lat", "Latitude is required");
        assert_eq!(
            errors.to_string(),
            "• Node ID: Node ID is required\n• Lat: Latitude is required"
        );
    }

    #[test]
    fn test_readable_field_names() {
        assert_eq!(readable_field("perPage"), "Per Page");
        assert_eq!(readable_field("nodeID"), "Node ID");
        assert_eq!(readable_field("do"), "Do");
    }

    #[test]
    fn test_format_field_errors_empty() {
        assert_eq!(format_field_errors(std::iter::empty()), "");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_form_wire_names() {
        let json = serde_json::to_value(valid_form()).unwrap();
        assert_eq!(json["nodeID"], "node-7");
        assert_eq!(json["lat"], "-6.2");
        assert_eq!(json["do"], 0.0);
        assert_eq!(json["ph"], 7.1);
    }
}
