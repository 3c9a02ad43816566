//! Run selection parsing and resolution
//!
//! A request names its runs either by a start (and optional end) in the URL
//! or by an explicit `runs` list in the JSON body. Both forms normalize to
//! an ordered list of positive run numbers.

use serde_json::Value;

use crate::error::ValidationError;

/// Upper bound on the number of runs a single request may name
pub const MAX_RUNS_PER_REQUEST: usize = 10_000;

/// The runs a request refers to, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelection {
    Single(i64),
    /// Inclusive on both ends
    Range { start: i64, end: i64 },
    /// Kept in the order given, duplicates included
    List(Vec<i64>),
}

impl RunSelection {
    /// Selection from URL bounds: `start` alone or `start..=end`
    pub fn from_bounds(start: i64, end: Option<i64>) -> Self {
        match end {
            Some(end) => RunSelection::Range { start, end },
            None => RunSelection::Single(start),
        }
    }

    /// Selection from the `runs` value of a request body
    ///
    /// Only checks that the value is a list of JSON integers; positivity is
    /// checked by [`RunSelection::resolve`].
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let items = value.as_array().ok_or(ValidationError::RunsNotAList)?;

        if items.len() > MAX_RUNS_PER_REQUEST {
            return Err(ValidationError::TooManyRuns {
                count: items.len() as u64,
            });
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Number(n) if n.is_i64() => n.as_i64().ok_or(ValidationError::NotAnInteger { index }),
                // Integers too large for i64 can never be valid run numbers
                Value::Number(n) if n.is_u64() => Err(ValidationError::NotPositive {
                    value: n.to_string(),
                }),
                _ => Err(ValidationError::NotAnInteger { index }),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(RunSelection::List)
    }

    /// Normalize into an ordered list of run numbers
    ///
    /// Fails if any run is not positive, if a range runs backwards, or if
    /// the selection covers more than [`MAX_RUNS_PER_REQUEST`] runs.
    pub fn resolve(&self) -> Result<Vec<i64>, ValidationError> {
        match self {
            RunSelection::Single(run) => {
                ensure_positive(*run)?;
                Ok(vec![*run])
            }
            RunSelection::Range { start, end } => {
                ensure_positive(*start)?;
                ensure_positive(*end)?;
                if end < start {
                    return Err(ValidationError::EndBeforeStart {
                        start: *start,
                        end: *end,
                    });
                }

                // Both ends are positive, so this cannot overflow
                let count = (end - start) as u64 + 1;
                if count > MAX_RUNS_PER_REQUEST as u64 {
                    return Err(ValidationError::TooManyRuns { count });
                }

                Ok((*start..=*end).collect())
            }
            RunSelection::List(runs) => {
                if runs.len() > MAX_RUNS_PER_REQUEST {
                    return Err(ValidationError::TooManyRuns {
                        count: runs.len() as u64,
                    });
                }
                for run in runs {
                    ensure_positive(*run)?;
                }
                Ok(runs.clone())
            }
        }
    }
}

/// Parse a run number taken from a URL path segment
pub fn parse_path_run(raw: &str) -> Result<i64, ValidationError> {
    raw.parse::<i64>()
        .ok()
        .filter(|run| *run > 0)
        .ok_or_else(|| ValidationError::NotPositive {
            value: format!("'{}'", raw),
        })
}

fn ensure_positive(run: i64) -> Result<(), ValidationError> {
    if run > 0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive {
            value: run.to_string(),
        })
    }
}
