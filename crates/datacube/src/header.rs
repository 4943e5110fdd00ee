//! Cube metadata: an ordered, versioned list of header cards.
//!
//! Every mutation moves [`Header::version`], which is what the derived-axis
//! caches key on. Fields are private so there is no way to change a card
//! without the version moving. Versions are drawn from a process-wide
//! counter, so replacing one header with another also invalidates caches.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::f64::consts::PI;

use uom::si::f64::{Frequency, SolidAngle};
use uom::si::frequency::hertz;
use uom::si::solid_angle::steradian;

use crate::error::{Error, Result};

/// Keywords tried, in order, for the rest frequency of the observed line.
pub const REST_FREQUENCY_KEYS: &[&str] = &["RESTFRQ", "RESTFREQ"];
/// Keywords tried for the beam major axis FWHM (degrees).
pub const BEAM_MAJOR_KEYS: &[&str] = &["BMAJ", "BEAMMAJ", "BEAMFWHM"];
/// Keywords tried for the beam minor axis FWHM (degrees).
pub const BEAM_MINOR_KEYS: &[&str] = &["BMIN", "BEAMMIN", "BEAMFWHM"];
/// Keyword holding the physical unit of the data values.
pub const BRIGHTNESS_UNIT_KEYS: &[&str] = &["BUNIT"];

static NEXT_VERSION: AtomicU64 = AtomicU64::new(1);

fn next_version() -> u64 {
    NEXT_VERSION.fetch_add(1, Ordering::Relaxed)
}

/// A scalar header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// FITS logical value (`T` or `F`).
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// FITS floating-point value.
    Float(f64),
    /// FITS character string.
    String(String),
}

impl Value {
    /// Numeric view of the value; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer view of the value; floats are not truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// String view of the value with FITS padding trimmed.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.trim()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Logical(b) => write!(f, "{}", if *b { "T" } else { "F" }),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// One header record.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Keyword name, case-sensitive as written.
    pub keyword: String,
    /// The value, absent for commentary cards.
    pub value: Option<Value>,
    /// An optional comment string.
    pub comment: Option<String>,
}

impl Card {
    /// Card with a value and no comment.
    pub fn new(keyword: impl Into<String>, value: impl Into<Value>) -> Self {
        Card {
            keyword: keyword.into(),
            value: Some(value.into()),
            comment: None,
        }
    }

    /// Returns `true` if this card carries a commentary keyword
    /// (COMMENT, HISTORY, or blank).
    pub fn is_commentary(&self) -> bool {
        let kw = self.keyword.as_str();
        kw == "COMMENT" || kw == "HISTORY" || kw.trim().is_empty()
    }
}

/// Ordered header metadata with a mutation counter.
#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: Vec<Card>,
    version: u64,
}

impl PartialEq for Header {
    /// Headers compare by content; the version counter is bookkeeping.
    fn eq(&self, other: &Self) -> bool {
        self.cards == other.cards
    }
}

impl Header {
    /// Empty header with version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a header from parsed cards, preserving their order.
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Header {
            cards,
            version: next_version(),
        }
    }

    /// Stamp that changes on every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of cards, commentary included.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// True when there are no cards.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterates over all cards in order, commentary included.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// Iterates over `(keyword, value)` pairs of valued cards.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cards
            .iter()
            .filter_map(|c| c.value.as_ref().map(|v| (c.keyword.as_str(), v)))
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.cards
            .iter()
            .position(|c| c.keyword == key && c.value.is_some())
    }

    /// Value of the first card named `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).and_then(|i| self.cards[i].value.as_ref())
    }

    /// True if a valued card named `key` exists.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Set `key` to `value`, replacing an existing card in place or
    /// appending a new one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.cards[i].value = Some(value),
            None => self.cards.push(Card {
                keyword: key,
                value: Some(value),
                comment: None,
            }),
        }
        self.version = next_version();
    }

    /// Like [`Header::set`], also replacing the card comment.
    pub fn set_with_comment(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) {
        let key = key.into();
        self.set(key.clone(), value);
        if let Some(i) = self.position(&key) {
            self.cards[i].comment = Some(comment.into());
        }
    }

    /// Append a COMMENT/HISTORY style card.
    pub fn push_commentary(&mut self, keyword: &str, text: impl Into<String>) {
        self.cards.push(Card {
            keyword: keyword.to_string(),
            value: None,
            comment: Some(text.into()),
        });
        self.version = next_version();
    }

    /// Remove the first card named `key` and return its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.position(key)?;
        self.version = next_version();
        self.cards.remove(i).value
    }

    /// Value of the first candidate key present, trying candidates in order.
    pub fn value_for(&self, candidates: &[&str]) -> Result<&Value> {
        candidates
            .iter()
            .find_map(|k| self.get(k))
            .ok_or_else(|| missing(candidates))
    }

    /// Numeric value of the first candidate key present.
    pub fn float_for(&self, candidates: &[&str]) -> Result<f64> {
        let (i, value) = self.first_match(candidates)?;
        value.as_f64().ok_or_else(|| Error::InvalidValue {
            key: candidates[i].to_string(),
        })
    }

    /// String value of the first candidate key present.
    pub fn string_for(&self, candidates: &[&str]) -> Result<&str> {
        let (i, value) = self.first_match(candidates)?;
        value.as_str().ok_or_else(|| Error::InvalidValue {
            key: candidates[i].to_string(),
        })
    }

    fn first_match(&self, candidates: &[&str]) -> Result<(usize, &Value)> {
        candidates
            .iter()
            .enumerate()
            .find_map(|(i, k)| self.get(k).map(|v| (i, v)))
            .ok_or_else(|| missing(candidates))
    }

    /// Numeric keyword with a default when absent.
    pub(crate) fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// String keyword, empty when absent.
    pub(crate) fn str_or_empty(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Rest frequency of the observed line.
    pub fn rest_frequency(&self) -> Result<Frequency> {
        let hz = self.float_for(REST_FREQUENCY_KEYS)?;
        Ok(Frequency::new::<hertz>(hz))
    }

    /// Unit string describing the data values (`BUNIT`).
    pub fn brightness_unit(&self) -> Result<&str> {
        self.string_for(BRIGHTNESS_UNIT_KEYS)
    }

    /// Solid angle of a Gaussian beam, `π/(4 ln 2) · BMAJ · BMIN`.
    pub fn beam_solid_angle(&self) -> Result<SolidAngle> {
        let bmaj = self.float_for(BEAM_MAJOR_KEYS)?.to_radians();
        let bmin = self.float_for(BEAM_MINOR_KEYS)?.to_radians();
        let sr = PI / (4.0 * core::f64::consts::LN_2) * bmaj * bmin;
        Ok(SolidAngle::new::<steradian>(sr))
    }

    /// Solid angle of one pixel from the celestial increments.
    pub fn pixel_solid_angle(&self) -> Result<SolidAngle> {
        let dx = self.float_for(&["CDELT1"])?.to_radians();
        let dy = self.float_for(&["CDELT2"])?.to_radians();
        Ok(SolidAngle::new::<steradian>((dx * dy).abs()))
    }
}

fn missing(candidates: &[&str]) -> Error {
    Error::MissingKey(candidates.iter().map(|k| k.to_string()).collect())
}

impl<K, V> FromIterator<(K, V)> for Header
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (k, v) in iter {
            header.set(k, v);
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uom::si::frequency::gigahertz;

    fn sample() -> Header {
        [
            ("NAXIS", Value::from(3)),
            ("RESTFREQ", Value::from(1.420405751768e9)),
            ("BUNIT", Value::from("K       ")),
            ("BEAMFWHM", Value::from(0.18)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn value_for_tries_candidates_in_order() {
        let h = sample();
        let v = h.value_for(&["RESTFRQ", "RESTFREQ"]).unwrap();
        assert_eq!(v.as_f64(), Some(1.420405751768e9));
    }

    #[test]
    fn value_for_missing_reports_all_candidates() {
        let h = sample();
        match h.value_for(&["BMIN", "BEAMMIN"]) {
            Err(Error::MissingKey(keys)) => assert_eq!(keys, vec!["BMIN", "BEAMMIN"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn float_for_rejects_strings() {
        let h = sample();
        assert!(matches!(
            h.float_for(&["BUNIT"]),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn rest_frequency_uses_fallback_key() {
        let h = sample();
        let f = h.rest_frequency().unwrap();
        assert!((f.get::<gigahertz>() - 1.420405751768).abs() < 1e-12);
    }

    #[test]
    fn brightness_unit_is_trimmed() {
        assert_eq!(sample().brightness_unit().unwrap(), "K");
    }

    #[test]
    fn beam_solid_angle_from_synonym() {
        let h = sample();
        let omega = h.beam_solid_angle().unwrap().get::<steradian>();
        let fwhm = 0.18_f64.to_radians();
        let expected = PI / (4.0 * core::f64::consts::LN_2) * fwhm * fwhm;
        assert!((omega - expected).abs() < 1e-15);
    }

    #[test]
    fn every_mutation_bumps_version() {
        let mut h = sample();
        let v0 = h.version();
        h.set("CTYPE3", "VRAD");
        let v1 = h.version();
        assert!(v1 > v0);
        h.set("CTYPE3", "FREQ");
        let v2 = h.version();
        assert!(v2 > v1);
        h.remove("CTYPE3");
        let v3 = h.version();
        assert!(v3 > v2);
        assert!(h.remove("CTYPE3").is_none());
        assert_eq!(h.version(), v3);
    }

    #[test]
    fn distinct_headers_never_share_a_version() {
        let a = sample();
        let b = sample();
        assert_ne!(a.version(), b.version());
        assert_eq!(a.clone().version(), a.version());
    }

    #[test]
    fn set_replaces_in_place_and_keeps_order() {
        let mut h = sample();
        h.set("BUNIT", "Jy/beam");
        let keys: Vec<&str> = h.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["NAXIS", "RESTFREQ", "BUNIT", "BEAMFWHM"]);
        assert_eq!(h.brightness_unit().unwrap(), "Jy/beam");
    }

    #[test]
    fn equality_ignores_version() {
        let a = sample();
        let mut b = sample();
        b.set("X", 1);
        b.remove("X");
        assert_eq!(a, b);
    }
}
