//! Exact-rational model of timed events inside one measure span.
//!
//! A [Timeline] is an ordered run of [Event]s over a half-open interval
//! `[start, end)`. All timestamps are arbitrary-precision rationals:
//! subdivision search compounds divisors like 2, 3, 5 and 7, and deciding
//! whether an onset sits exactly on a subdivision boundary is only sound
//! with exact arithmetic. Binary floats never enter this module.
//!
//! Timelines are immutable once built; [`Timeline::split`] and
//! [`Timeline::shift_and_rescale`] return new values.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Exact rational time value used for every onset and boundary.
pub type Rational = BigRational;

/// Shorthand constructor for a rational from machine integers.
pub fn rational(numerator: i64, denominator: i64) -> Rational {
    Rational::new(BigInt::from(numerator), BigInt::from(denominator))
}

/// Errors raised by the JSON export.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A timestamp or duration does not fit the 64-bit numbers emitted in JSON.
    #[error("rational {0} does not fit in a 64-bit JSON number")]
    Overflow(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// What sounds (or keeps sounding) at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Artifact {
    /// Silence starting at this instant.
    Rest,
    /// Sound sustained from the previous event; not a new onset.
    Continuation,
    /// Simultaneous MIDI pitches starting at this instant.
    Chord(Vec<u8>),
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Rest => f.write_str("R"),
            Artifact::Continuation => f.write_str("c"),
            Artifact::Chord(pitches) => {
                let inner: Vec<String> = pitches.iter().map(|p| p.to_string()).collect();
                write!(f, "[{}]", inner.join(" "))
            }
        }
    }
}

/// One timed artifact. Chords that should be read as a single instant are a
/// single event; independent simultaneous artifacts may share a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub timestamp: Rational,
    pub artifact: Artifact,
}

impl Event {
    pub fn new(timestamp: Rational, artifact: Artifact) -> Self {
        Event { timestamp, artifact }
    }
}

/// Selects how [`Timeline::to_json`] expresses time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeKind {
    /// Absolute onset of each event.
    Onset,
    /// Gap from each event to the next one (the last gap is closed by `end`).
    Duration,
}

/// An ordered run of events over `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    events: Vec<Event>,
    start: Rational,
    end: Rational,
}

impl Timeline {
    /// Builds a timeline, stable-sorting the events by timestamp.
    ///
    /// If no event sits exactly on `start`, a synthetic [`Artifact::Continuation`]
    /// event is inserted there, so the span's opening instant always carries
    /// an event. Downstream code relies on this normalization.
    pub fn new(mut events: Vec<Event>, start: Rational, end: Rational) -> Self {
        events.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        if events.first().map(|e| &e.timestamp) != Some(&start) {
            events.insert(0, Event::new(start.clone(), Artifact::Continuation));
        }
        Timeline { events, start, end }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn start(&self) -> &Rational {
        &self.start
    }

    pub fn end(&self) -> &Rational {
        &self.end
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn timestamps(&self) -> Vec<Rational> {
        self.events.iter().map(|e| e.timestamp.clone()).collect()
    }

    /// Cuts the span into `k` equal parts and maps each part back onto the
    /// parent's own interval.
    ///
    /// Events are partitioned at the exact cut points (an event sitting on a
    /// cut belongs to the part it opens). Each part's events are shifted to
    /// the cut and scaled by `k`, so a recursive consumer always works in the
    /// same frame of reference; re-normalization then inserts the leading
    /// continuation where a part does not open with an event.
    pub fn split(&self, k: u32) -> Vec<Timeline> {
        assert!(k > 0, "cannot split a timeline into zero parts");
        let span = &self.end - &self.start;
        let factor = Rational::from_integer(BigInt::from(k));
        let cuts: Vec<Rational> = (0..=k)
            .map(|i| &self.start + &span * rational(i64::from(i), i64::from(k)))
            .collect();
        let bounds: Vec<usize> = cuts
            .iter()
            .map(|cut| self.events.partition_point(|e| e.timestamp < *cut))
            .collect();

        (0..k as usize)
            .map(|i| {
                let part: Vec<Event> = self.events[bounds[i]..bounds[i + 1]]
                    .iter()
                    .map(|e| {
                        Event::new(
                            (&e.timestamp - &cuts[i]) * &factor + &self.start,
                            e.artifact.clone(),
                        )
                    })
                    .collect();
                Timeline::new(part, self.start.clone(), self.end.clone())
            })
            .collect()
    }

    /// Affinely maps every timestamp onto `[new_start, new_end)`.
    pub fn shift_and_rescale(&self, new_start: Rational, new_end: Rational) -> Timeline {
        let factor = (&new_end - &new_start) / (&self.end - &self.start);
        let events = self
            .events
            .iter()
            .map(|e| {
                Event::new(
                    (&e.timestamp - &self.start) * &factor + &new_start,
                    e.artifact.clone(),
                )
            })
            .collect();
        Timeline::new(events, new_start, new_end)
    }

    /// Shifts the timeline so it opens at `new_start`, preserving its length.
    pub fn shift_to(&self, new_start: Rational) -> Timeline {
        let new_end = &new_start + (&self.end - &self.start);
        self.shift_and_rescale(new_start, new_end)
    }

    /// Appends `other`, shifted to open where this timeline closes.
    pub fn concat(&self, other: &Timeline) -> Timeline {
        let shifted = other.shift_to(self.end.clone());
        let mut events = self.events.clone();
        events.extend(shifted.events.iter().cloned());
        Timeline::new(events, self.start.clone(), shifted.end.clone())
    }

    /// Exports the events as JSON, one object per event, with exact times as
    /// `{numerator, denominator}` pairs.
    pub fn to_json(&self, kind: TimeKind) -> Result<Value, TimelineError> {
        let entries: Result<Vec<Value>, TimelineError> = match kind {
            TimeKind::Onset => self
                .events
                .iter()
                .map(|e| {
                    Ok(json!({
                        "onset": rational_json(&e.timestamp)?,
                        "artifact": serde_json::to_value(&e.artifact)?,
                    }))
                })
                .collect(),
            TimeKind::Duration => self
                .events
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let next = self
                        .events
                        .get(i + 1)
                        .map(|n| &n.timestamp)
                        .unwrap_or(&self.end);
                    Ok(json!({
                        "duration": rational_json(&(next - &e.timestamp))?,
                        "artifact": serde_json::to_value(&e.artifact)?,
                    }))
                })
                .collect(),
        };
        Ok(Value::Array(entries?))
    }
}

impl fmt::Display for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let events: Vec<String> = self
            .events
            .iter()
            .map(|e| format!("({},{})", e.timestamp, e.artifact))
            .collect();
        write!(f, "Tim[{}],[{},{}[", events.join(","), self.start, self.end)
    }
}

fn rational_json(value: &Rational) -> Result<Value, TimelineError> {
    let overflow = || TimelineError::Overflow(value.to_string());
    let numerator = value.numer().to_i64().ok_or_else(overflow)?;
    let denominator = value.denom().to_i64().ok_or_else(overflow)?;
    Ok(json!({ "numerator": numerator, "denominator": denominator }))
}

/// Per-voice timelines of one measure, exported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voices {
    pub timelines: Vec<Timeline>,
}

impl Voices {
    pub fn new(timelines: Vec<Timeline>) -> Self {
        Voices { timelines }
    }

    pub fn to_json(&self, kind: TimeKind) -> Result<Value, TimelineError> {
        let voices: Result<Vec<Value>, TimelineError> =
            self.timelines.iter().map(|t| t.to_json(kind)).collect();
        Ok(json!({ "voices": voices? }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(pitch: u8) -> Artifact {
        Artifact::Chord(vec![pitch])
    }

    fn unit_timeline(onsets: &[(i64, i64)]) -> Timeline {
        let events = onsets
            .iter()
            .enumerate()
            .map(|(i, &(n, d))| Event::new(rational(n, d), chord(60 + i as u8)))
            .collect();
        Timeline::new(events, rational(0, 1), rational(1, 1))
    }

    #[test]
    fn test_normalization_inserts_leading_continuation() {
        let tim = unit_timeline(&[(1, 4), (3, 4)]);
        assert_eq!(tim.len(), 3);
        assert_eq!(tim.events()[0].timestamp, rational(0, 1));
        assert_eq!(tim.events()[0].artifact, Artifact::Continuation);
    }

    #[test]
    fn test_normalization_skipped_when_start_occupied() {
        let tim = unit_timeline(&[(0, 1), (1, 2)]);
        assert_eq!(tim.len(), 2);
        assert_eq!(tim.events()[0].artifact, chord(60));
    }

    #[test]
    fn test_split_rescales_each_part_onto_parent_interval() {
        // splitting {0, 1/4, 3/4} in two gives {0, 1/2} and {c@0, 1/2}
        let tim = unit_timeline(&[(0, 1), (1, 4), (3, 4)]);
        let parts = tim.split(2);
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0].timestamps(),
            vec![rational(0, 1), rational(1, 2)]
        );
        assert_eq!(
            parts[1].timestamps(),
            vec![rational(0, 1), rational(1, 2)]
        );
        assert_eq!(parts[1].events()[0].artifact, Artifact::Continuation);
        assert_eq!(parts[1].events()[1].artifact, chord(62));
    }

    #[test]
    fn test_split_event_on_cut_belongs_to_right_part() {
        let tim = unit_timeline(&[(0, 1), (1, 2)]);
        let parts = tim.split(2);
        assert_eq!(parts[0].len(), 1);
        assert_eq!(parts[1].events()[0].timestamp, rational(0, 1));
        assert_eq!(parts[1].events()[0].artifact, chord(61));
    }

    #[test]
    fn test_split_in_three() {
        let tim = unit_timeline(&[(0, 1), (1, 3), (2, 3)]);
        for part in tim.split(3) {
            assert_eq!(part.timestamps(), vec![rational(0, 1)]);
        }
    }

    #[test]
    fn test_shift_and_rescale_round_trip() {
        let tim = unit_timeline(&[(0, 1), (1, 3)]);
        let wide = tim.shift_and_rescale(rational(2, 1), rational(4, 1));
        assert_eq!(wide.timestamps(), vec![rational(2, 1), rational(8, 3)]);
        assert_eq!(
            wide.shift_and_rescale(rational(0, 1), rational(1, 1)),
            tim
        );
    }

    #[test]
    fn test_concat_shifts_second_operand() {
        let first = unit_timeline(&[(0, 1)]);
        let second = unit_timeline(&[(0, 1), (1, 2)]);
        let joined = first.concat(&second);
        assert_eq!(*joined.end(), rational(2, 1));
        assert_eq!(
            joined.timestamps(),
            vec![rational(0, 1), rational(1, 1), rational(3, 2)]
        );
    }

    #[test]
    fn test_json_onsets() {
        let tim = unit_timeline(&[(0, 1), (1, 3)]);
        let value = tim.to_json(TimeKind::Onset).unwrap();
        assert_eq!(value[1]["onset"]["numerator"], 1);
        assert_eq!(value[1]["onset"]["denominator"], 3);
    }

    #[test]
    fn test_json_durations_close_the_span() {
        let tim = unit_timeline(&[(0, 1), (1, 4)]);
        let value = tim.to_json(TimeKind::Duration).unwrap();
        assert_eq!(value[0]["duration"]["numerator"], 1);
        assert_eq!(value[0]["duration"]["denominator"], 4);
        assert_eq!(value[1]["duration"]["numerator"], 3);
        assert_eq!(value[1]["duration"]["denominator"], 4);
    }

    #[test]
    fn test_voices_export() {
        let voices = Voices::new(vec![unit_timeline(&[(0, 1)])]);
        let value = voices.to_json(TimeKind::Onset).unwrap();
        assert!(value["voices"].is_array());
    }
}
