//! In-memory series source for tests.

use super::client::SeriesSource;
use super::types::{Observation, SeriesError, SeriesPair, YearWindow};
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn obs(year: i32, period: &str, value: f64) -> Observation {
    Observation {
        year,
        period: period.to_string(),
        value,
    }
}

/// A fetch as seen by the source: (code_a, code_b, window).
pub type Call = (String, String, YearWindow);

/// Replays scripted responses in order and records every call.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<SeriesPair, SeriesError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<SeriesPair, SeriesError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl SeriesSource for ScriptedSource {
    fn fetch_series(
        &self,
        code_a: &str,
        code_b: &str,
        window: YearWindow,
    ) -> Result<SeriesPair, SeriesError> {
        self.calls
            .lock()
            .unwrap()
            .push((code_a.to_string(), code_b.to_string(), window));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected fetch of {} / {}", code_a, code_b))
    }
}
