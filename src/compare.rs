//! The comparison coordinator — primary public API of CPI Compass.
//!
//! State flow for one request:
//!
//! ```text
//! RESOLVING → FETCHING → COMPLETE
//!                      ↘ FALLBACK_RESOLVING → FALLBACK_FETCHING → COMPLETE
//! any step → FAILED
//! ```
//!
//! An empty series after the first fetch forces that endpoint down to its
//! census-division code. There is exactly one fallback tier.

use crate::area::{AreaError, AreaResolver, Granularity, ResolutionResult};
use crate::series::{Observation, SeriesError, SeriesPair, SeriesSource, YearWindow};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

// ─── Request ─────────────────────────────────────────────────────

/// A validated, case-folded comparison request. "From" is location A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRequest {
    pub city_from: String,
    pub state_from: String,
    pub city_to: String,
    pub state_to: String,
}

impl ComparisonRequest {
    /// Trim and uppercase all fields; state codes must be exactly two characters.
    pub fn new(
        city_from: &str,
        state_from: &str,
        city_to: &str,
        state_to: &str,
    ) -> Result<Self, ComparisonFailure> {
        Ok(Self {
            city_from: normalize_city(city_from, Endpoint::From)?,
            state_from: normalize_state(state_from, Endpoint::From)?,
            city_to: normalize_city(city_to, Endpoint::To)?,
            state_to: normalize_state(state_to, Endpoint::To)?,
        })
    }

    fn city(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::From => &self.city_from,
            Endpoint::To => &self.city_to,
        }
    }

    fn state(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::From => &self.state_from,
            Endpoint::To => &self.state_to,
        }
    }

    /// "Pittsburgh, PA"
    pub fn place(&self, endpoint: Endpoint) -> String {
        format!("{}, {}", title_case(self.city(endpoint)), self.state(endpoint))
    }
}

fn normalize_city(city: &str, endpoint: Endpoint) -> Result<String, ComparisonFailure> {
    let city = city.trim();
    if city.is_empty() {
        return Err(ComparisonFailure::new(FailureKind::InvalidRequest, "City name is empty")
            .at(endpoint, None));
    }
    Ok(city.to_uppercase())
}

fn normalize_state(state: &str, endpoint: Endpoint) -> Result<String, ComparisonFailure> {
    let state = state.trim();
    if state.chars().count() != 2 {
        return Err(ComparisonFailure::new(
            FailureKind::InvalidRequest,
            format!("'{}' is not a 2-character state code", state),
        )
        .at(endpoint, Some(state.to_uppercase())));
    }
    Ok(state.to_uppercase())
}

// ─── Outcome ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    From,
    To,
}

/// Which fetch a failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Primary,
    Fallback,
}

/// `More` means the "from" location had the higher index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    More,
    Less,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::More => write!(f, "more"),
            Self::Less => write!(f, "less"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    InvalidRequest,
    UnknownState,
    AmbiguousAreaRecord,
    RemoteUnavailable,
    InvalidResponse,
    DataUnavailableAfterFallback,
    /// The static tables disagree with each other at lookup time.
    InconsistentReferenceData,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidRequest => "Invalid request",
            Self::UnknownState => "Unknown state",
            Self::AmbiguousAreaRecord => "Ambiguous area",
            Self::RemoteUnavailable => "Data service unavailable",
            Self::InvalidResponse => "Invalid data",
            Self::DataUnavailableAfterFallback => "No data available",
            Self::InconsistentReferenceData => "Reference data error",
        };
        f.write_str(s)
    }
}

/// A per-request failure with enough context to render an actionable message.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct ComparisonFailure {
    pub kind: FailureKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    pub detail: String,
}

impl ComparisonFailure {
    fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: None,
            state: None,
            tier: None,
            detail: detail.into(),
        }
    }

    fn at(mut self, endpoint: Endpoint, state: Option<String>) -> Self {
        self.endpoint = Some(endpoint);
        self.state = state;
        self
    }

    fn on(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    fn from_area(err: AreaError, endpoint: Endpoint, state: &str, tier: Tier) -> Self {
        let kind = match err {
            AreaError::UnknownState(_) => FailureKind::UnknownState,
            AreaError::AmbiguousAreaRecord { .. } => FailureKind::AmbiguousAreaRecord,
            AreaError::UnmappedDivision(_)
            | AreaError::MalformedReferenceRow { .. }
            | AreaError::Read { .. } => FailureKind::InconsistentReferenceData,
        };
        Self::new(kind, err.to_string())
            .at(endpoint, Some(state.to_string()))
            .on(tier)
    }

    fn from_series(err: SeriesError, tier: Tier) -> Self {
        let kind = match err {
            SeriesError::RemoteUnavailable(_) => FailureKind::RemoteUnavailable,
            SeriesError::InvalidResponse(_) => FailureKind::InvalidResponse,
        };
        Self::new(kind, err.to_string()).on(tier)
    }
}

/// The index value used for one side of a completed comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointValue {
    pub area_code: String,
    pub granularity: Granularity,
    pub value: f64,
    pub year: i32,
    pub period: String,
}

impl EndpointValue {
    fn new(resolved: &ResolutionResult, obs: &Observation) -> Self {
        Self {
            area_code: resolved.area_code.clone(),
            granularity: resolved.granularity,
            value: obs.value,
            year: obs.year,
            period: obs.period.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOutcome {
    /// Both locations share one index series.
    NoSignificantDifference {
        area_code: String,
        fallback: Vec<Endpoint>,
    },
    PercentageResult {
        percent: f64,
        direction: Direction,
        from: EndpointValue,
        to: EndpointValue,
        fallback: Vec<Endpoint>,
    },
    Failure(ComparisonFailure),
}

impl ComparisonOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Endpoints that were forced down to division granularity.
    pub fn fallback(&self) -> &[Endpoint] {
        match self {
            Self::NoSignificantDifference { fallback, .. }
            | Self::PercentageResult { fallback, .. } => fallback.as_slice(),
            Self::Failure(_) => &[],
        }
    }

    /// The one-line verdict shown to the user.
    pub fn sentence(&self, req: &ComparisonRequest) -> String {
        let (a, b) = (req.place(Endpoint::From), req.place(Endpoint::To));
        match self {
            Self::NoSignificantDifference { .. } => format!(
                "There may not be a significant difference in cost of living between {} and {}.",
                a, b
            ),
            Self::PercentageResult { percent, direction, .. } => format!(
                "{} is about {:.2} percent {} expensive than {}.",
                a, percent, direction, b
            ),
            Self::Failure(f) => f.to_string(),
        }
    }

    /// Explanations of any fallback that happened, in display order.
    pub fn notes(&self, req: &ComparisonRequest) -> Vec<String> {
        let fallback = self.fallback();
        if fallback.is_empty() {
            return Vec::new();
        }
        let mut notes: Vec<String> = fallback
            .iter()
            .map(|&e| {
                format!(
                    "The Bureau of Labor Statistics did not collect cost of living data for {} in the last three years.",
                    req.place(e)
                )
            })
            .collect();
        notes.push(
            "Because of missing data, census division data was used instead of city data; \
             the result may not be as accurate."
                .to_string(),
        );
        notes
    }
}

/// `(|delta| × 100, direction)` with `delta = (to − from) / from`.
/// Direction is `More` exactly when `delta < 0`.
pub fn percentage_delta(value_from: f64, value_to: f64) -> (f64, Direction) {
    let delta = (value_to - value_from) / value_from;
    let direction = if delta < 0.0 { Direction::More } else { Direction::Less };
    ((delta * 100.0).abs(), direction)
}

// ─── Coordinator ─────────────────────────────────────────────────

/// Drives resolution, fetch, and the single division fallback.
///
/// Holds only shared immutable tables and a thread-safe series source, so a
/// single coordinator can serve concurrent requests.
pub struct ComparisonCoordinator {
    resolver: AreaResolver,
    source: Arc<dyn SeriesSource>,
}

impl fmt::Debug for ComparisonCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComparisonCoordinator")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ComparisonCoordinator {
    pub fn new(resolver: AreaResolver, source: Arc<dyn SeriesSource>) -> Self {
        Self { resolver, source }
    }

    pub fn resolver(&self) -> &AreaResolver {
        &self.resolver
    }

    /// Validate raw user input, then compare.
    pub fn compare_places(
        &self,
        city_from: &str,
        state_from: &str,
        city_to: &str,
        state_to: &str,
    ) -> ComparisonOutcome {
        match ComparisonRequest::new(city_from, state_from, city_to, state_to) {
            Ok(req) => self.compare(&req),
            Err(f) => ComparisonOutcome::Failure(f),
        }
    }

    /// Compare over the trailing window ending at the current calendar year.
    pub fn compare(&self, req: &ComparisonRequest) -> ComparisonOutcome {
        self.compare_in_year(req, Utc::now().year())
    }

    /// Compare over the trailing window ending at `year`.
    pub fn compare_in_year(&self, req: &ComparisonRequest, year: i32) -> ComparisonOutcome {
        match self.run(req, YearWindow::trailing(year)) {
            Ok(outcome) => outcome,
            Err(failure) => {
                warn!(
                    "Comparison {} → {} failed: {}",
                    req.place(Endpoint::From),
                    req.place(Endpoint::To),
                    failure
                );
                ComparisonOutcome::Failure(failure)
            }
        }
    }

    fn run(&self, req: &ComparisonRequest, window: YearWindow) -> Result<ComparisonOutcome, ComparisonFailure> {
        // RESOLVING
        let from = self.resolve(req, Endpoint::From)?;
        let to = self.resolve(req, Endpoint::To)?;

        if from.area_code == to.area_code {
            info!("Both locations resolve to area {}; skipping fetch", from.area_code);
            return Ok(ComparisonOutcome::NoSignificantDifference {
                area_code: from.area_code,
                fallback: Vec::new(),
            });
        }

        // FETCHING
        let pair = self.fetch(&from, &to, window, Tier::Primary)?;
        let (empty_from, empty_to) = (pair.a.is_empty(), pair.b.is_empty());
        if !empty_from && !empty_to {
            return complete(&from, &to, &pair, Vec::new());
        }

        // FALLBACK_RESOLVING
        let mut fallback = Vec::new();
        let from = if empty_from {
            fallback.push(Endpoint::From);
            self.force_division(req, Endpoint::From, &from)?
        } else {
            from
        };
        let to = if empty_to {
            fallback.push(Endpoint::To);
            self.force_division(req, Endpoint::To, &to)?
        } else {
            to
        };

        if from.area_code == to.area_code {
            info!("After fallback both locations share area {}", from.area_code);
            return Ok(ComparisonOutcome::NoSignificantDifference {
                area_code: from.area_code,
                fallback,
            });
        }

        // FALLBACK_FETCHING
        let pair = self.fetch(&from, &to, window, Tier::Fallback)?;
        let endpoint = match (pair.a.is_empty(), pair.b.is_empty()) {
            (false, false) => return complete(&from, &to, &pair, fallback),
            (true, false) => Some(Endpoint::From),
            (false, true) => Some(Endpoint::To),
            (true, true) => None,
        };

        let mut failure = ComparisonFailure::new(
            FailureKind::DataUnavailableAfterFallback,
            match endpoint {
                Some(e) => format!("no index data for {} even at division level ({})", req.place(e), window),
                None => format!("no index data for either location even at division level ({})", window),
            },
        )
        .on(Tier::Fallback);
        if let Some(e) = endpoint {
            failure = failure.at(e, Some(req.state(e).to_string()));
        }
        Err(failure)
    }

    fn resolve(&self, req: &ComparisonRequest, endpoint: Endpoint) -> Result<ResolutionResult, ComparisonFailure> {
        let (city, state) = (req.city(endpoint), req.state(endpoint));
        self.resolver
            .resolve(city, state)
            .map_err(|e| ComparisonFailure::from_area(e, endpoint, state, Tier::Primary))
    }

    fn force_division(
        &self,
        req: &ComparisonRequest,
        endpoint: Endpoint,
        original: &ResolutionResult,
    ) -> Result<ResolutionResult, ComparisonFailure> {
        let state = req.state(endpoint);
        let resolved = self
            .resolver
            .resolve_division(state)
            .map_err(|e| ComparisonFailure::from_area(e, endpoint, state, Tier::Fallback))?;
        warn!(
            "No data collected for {} (area {}); using division area {}",
            req.place(endpoint),
            original.area_code,
            resolved.area_code
        );
        Ok(resolved)
    }

    fn fetch(
        &self,
        from: &ResolutionResult,
        to: &ResolutionResult,
        window: YearWindow,
        tier: Tier,
    ) -> Result<SeriesPair, ComparisonFailure> {
        debug!("Fetching {:?} tier: {} / {} ({})", tier, from.area_code, to.area_code, window);
        self.source
            .fetch_series(&from.area_code, &to.area_code, window)
            .map_err(|e| ComparisonFailure::from_series(e, tier))
    }
}

// COMPLETE
fn complete(
    from: &ResolutionResult,
    to: &ResolutionResult,
    pair: &SeriesPair,
    fallback: Vec<Endpoint>,
) -> Result<ComparisonOutcome, ComparisonFailure> {
    let tier = if fallback.is_empty() { Tier::Primary } else { Tier::Fallback };
    let (Some(a), Some(b)) = (pair.latest_a(), pair.latest_b()) else {
        return Err(ComparisonFailure::new(FailureKind::InvalidResponse, "empty series at completion").on(tier));
    };
    if !(a.value.is_finite() && a.value > 0.0) || !b.value.is_finite() {
        return Err(ComparisonFailure::new(
            FailureKind::InvalidResponse,
            format!("unusable index values {} / {}", a.value, b.value),
        )
        .on(tier));
    }

    let (percent, direction) = percentage_delta(a.value, b.value);
    info!(
        "{} {} {} → {} {} {}: {:.2}% {}",
        from.area_code, a.year, a.period, to.area_code, b.year, b.period, percent, direction
    );
    Ok(ComparisonOutcome::PercentageResult {
        percent,
        direction,
        from: EndpointValue::new(from, a),
        to: EndpointValue::new(to, b),
        fallback,
    })
}

/// "ST. LOUIS" → "St. Louis"
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
