//! Field of view persistence as a `fov=<x>,<width>` query parameter.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::form_urlencoded;

pub const FOV_QUERY_KEY: &str = "fov";

/// Zoom/pan state in trace view coordinates (milliseconds from the trace origin).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldOfView {
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum FovError {
    #[error("expected `<x>,<width>`, got {0:?}")]
    Malformed(String),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("field of view must be finite")]
    NotFinite,
    #[error("field of view x must not be negative, got {0}")]
    NegativeX(f64),
    #[error("field of view width must be positive, got {0}")]
    NonPositiveWidth(f64),
    #[error("field of view {x},{width} exceeds the trace duration {trace_width}")]
    OutOfBounds { x: f64, width: f64, trace_width: f64 },
}

impl FieldOfView {
    pub fn new(x: f64, width: f64) -> Self {
        Self { x, width }
    }

    /// Checks that the field of view fits inside a trace of `trace_width` ms.
    pub fn validate(&self, trace_width: f64) -> Result<(), FovError> {
        if self.x + self.width > trace_width {
            return Err(FovError::OutOfBounds {
                x: self.x,
                width: self.width,
                trace_width,
            });
        }
        Ok(())
    }
}

impl fmt::Display for FieldOfView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.width)
    }
}

impl FromStr for FieldOfView {
    type Err = FovError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parts = value.split(',');
        let (Some(x), Some(width), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FovError::Malformed(value.to_owned()));
        };
        let x = parse_component(x)?;
        let width = parse_component(width)?;

        if !x.is_finite() || !width.is_finite() {
            return Err(FovError::NotFinite);
        }
        if x < 0.0 {
            return Err(FovError::NegativeX(x));
        }
        if width <= 0.0 {
            return Err(FovError::NonPositiveWidth(width));
        }
        Ok(FieldOfView { x, width })
    }
}

fn parse_component(raw: &str) -> Result<f64, FovError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| FovError::InvalidNumber(raw.to_owned()))
}

/// Percent-decoded value of the `fov` parameter in a query string (with or
/// without a leading `?`).
pub fn read_query(query: &str) -> Option<String> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == FOV_QUERY_KEY)
        .map(|(_, value)| value.into_owned())
}

/// Returns `query` with its `fov` parameter replaced (or appended).
/// Other parameters keep their order and are re-encoded.
pub fn write_query(query: &str, fov: &FieldOfView) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        if key != FOV_QUERY_KEY {
            serializer.append_pair(&key, &value);
        }
    }
    serializer
        .append_pair(FOV_QUERY_KEY, &fov.to_string())
        .finish()
}
