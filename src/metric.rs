//! Typed metric values
//!
//! A [`Metric`] is identified by `(id, kind)` and carries exactly one value:
//! an integer `delta` for counters or a floating point `value` for gauges.
//!
//! Raw strings only cross this boundary in two places:
//!
//! - [`Metric::new`] / [`Metric::parse`] turn a transport string into a typed value
//! - [`Metric::value_string`] renders the canonical string form back
//!
//! Accumulation is not a property of the metric itself. A bare `Metric` holds
//! whatever was last parsed into it; the storage backends decide whether a
//! second observation adds or replaces.

use std::fmt;
use std::str::FromStr;

/// Kind of metric, deciding how observations are merged by storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Accumulates: every stored observation is added to the previous total
    Counter,

    /// Overwrites: every stored observation replaces the previous value
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("counter") {
            Ok(MetricKind::Counter)
        } else if s.eq_ignore_ascii_case("gauge") {
            Ok(MetricKind::Gauge)
        } else {
            Err(MetricError::InvalidKind(s.to_string()))
        }
    }
}

/// Errors raised while building or rendering a metric
#[derive(Debug, Clone, PartialEq)]
pub enum MetricError {
    /// Kind is neither `counter` nor `gauge`
    InvalidKind(String),

    /// Raw value does not parse for the given kind
    InvalidValue { kind: MetricKind, raw: String },

    /// The field matching the metric's kind is not set
    InvalidMetric { id: String, kind: MetricKind },
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::InvalidKind(kind) => write!(f, "invalid metric kind: {:?}", kind),
            MetricError::InvalidValue { kind, raw } => {
                write!(f, "invalid {} value: {:?}", kind, raw)
            }
            MetricError::InvalidMetric { id, kind } => {
                write!(f, "{} metric {:?} has no value", kind, id)
            }
        }
    }
}

impl std::error::Error for MetricError {}

/// A single metric observation
///
/// Exactly one of `delta` (counters) and `value` (gauges) is set for every
/// metric built through the constructors of this type.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    id: String,
    kind: MetricKind,
    delta: Option<i64>,
    value: Option<f64>,
}

impl Metric {
    /// Build a metric from raw transport strings
    ///
    /// Fails with [`MetricError::InvalidKind`] for an unknown kind and with
    /// [`MetricError::InvalidValue`] when `raw` does not parse for that kind.
    ///
    /// ```
    /// # use metric_keeper::metric::Metric;
    /// let metric = Metric::new("temp", "gauge", "36.6").unwrap();
    /// assert_eq!(metric.value_string().unwrap(), "36.6");
    /// ```
    pub fn new(id: impl Into<String>, kind: &str, raw: &str) -> Result<Self, MetricError> {
        let kind = kind.parse::<MetricKind>()?;
        Self::parse(id, kind, raw)
    }

    /// Build a metric of an already known kind from a raw value string
    pub fn parse(id: impl Into<String>, kind: MetricKind, raw: &str) -> Result<Self, MetricError> {
        let mut metric = Self {
            id: id.into(),
            kind,
            delta: None,
            value: None,
        };
        metric.set_value(raw)?;
        Ok(metric)
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
        }
    }

    /// Gauges only hold finite values; `NaN` and infinities are rejected
    pub fn gauge(id: impl Into<String>, value: f64) -> Result<Self, MetricError> {
        if !value.is_finite() {
            return Err(MetricError::InvalidValue {
                kind: MetricKind::Gauge,
                raw: value.to_string(),
            });
        }

        Ok(Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
        })
    }

    /// Rebuild a metric from stored columns
    ///
    /// The field belonging to the other kind is discarded. Fails with
    /// [`MetricError::InvalidMetric`] when the field for `kind` is missing.
    pub fn from_parts(
        id: impl Into<String>,
        kind: MetricKind,
        delta: Option<i64>,
        value: Option<f64>,
    ) -> Result<Self, MetricError> {
        let id = id.into();
        match (kind, delta, value) {
            (MetricKind::Counter, Some(delta), _) => Ok(Self::counter(id, delta)),
            (MetricKind::Gauge, _, Some(value)) => Self::gauge(id, value),
            (kind, _, _) => Err(MetricError::InvalidMetric { id, kind }),
        }
    }

    /// Re-parse `raw` and replace the stored value in place
    ///
    /// On error the metric is left untouched.
    pub fn set_value(&mut self, raw: &str) -> Result<(), MetricError> {
        let invalid = || MetricError::InvalidValue {
            kind: self.kind,
            raw: raw.to_string(),
        };

        match self.kind {
            MetricKind::Counter => {
                let delta = raw.parse::<i64>().map_err(|_| invalid())?;
                self.delta = Some(delta);
                self.value = None;
            }
            MetricKind::Gauge => {
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(invalid)?;
                self.value = Some(value);
                self.delta = None;
            }
        }

        Ok(())
    }

    /// Render the value in its canonical string form
    ///
    /// Counters render as plain decimal integers, gauges in the shortest
    /// decimal form that parses back to the same float (`37.0` renders as `37`).
    pub fn value_string(&self) -> Result<String, MetricError> {
        let missing = || MetricError::InvalidMetric {
            id: self.id.clone(),
            kind: self.kind,
        };

        match self.kind {
            MetricKind::Counter => self.delta.map(|d| d.to_string()).ok_or_else(missing),
            MetricKind::Gauge => self.value.map(|v| v.to_string()).ok_or_else(missing),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn delta(&self) -> Option<i64> {
        self.delta
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value_string() {
            Ok(value) => write!(f, "{}/{}={}", self.kind, self.id, value),
            Err(_) => write!(f, "{}/{}=<unset>", self.kind, self.id),
        }
    }
}
