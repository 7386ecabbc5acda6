//! Candidate Generator
//!
//! Produces the short, ordered list of contract months worth querying on a
//! given day. Pure and deterministic: the same `today` and policy always yield
//! the same candidates, so the rest of the pipeline can be tested in isolation.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::types::{ContractCandidate, month_label};

/// Even calendar months; December is included as the year-end major month.
pub const DEFAULT_MAJOR_MONTHS: [u32; 6] = [2, 4, 6, 8, 10, 12];
pub const DEFAULT_PREFIX: &str = "101";
pub const DEFAULT_BASE_YEAR: i32 = 2025;
/// Letter assigned to `base_year`; later years advance through the alphabet.
pub const DEFAULT_BASE_LETTER: char = 'W';
pub const DEFAULT_MAX_CANDIDATES: usize = 4;
pub const DEFAULT_HORIZON_YEARS: u32 = 2;
pub const MAX_CANDIDATES_LIMIT: usize = 24;
pub const MAX_HORIZON_YEARS: u32 = 10;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PolicyError {
    #[error("major month list is empty")]
    NoMajorMonths,

    #[error("invalid major month: {0}")]
    InvalidMonth(u32),

    #[error("max candidates must be at least 1")]
    ZeroCandidates,

    #[error("max candidates must be at most 24: {0}")]
    TooManyCandidates(usize),

    #[error("horizon must be at least 1 year")]
    ZeroHorizon,

    #[error("horizon must be at most 10 years: {0}")]
    HorizonTooLong(u32),

    #[error("base letter must be an uppercase ASCII letter: {0:?}")]
    InvalidBaseLetter(char),
}

/// Instrument-specific rules for which contract months exist and how they are encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidatePolicy {
    prefix: String,
    base_year: i32,
    base_letter: char,
    major_months: Vec<u32>,
    max_candidates: usize,
    horizon_years: u32,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            base_year: DEFAULT_BASE_YEAR,
            base_letter: DEFAULT_BASE_LETTER,
            major_months: DEFAULT_MAJOR_MONTHS.to_vec(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            horizon_years: DEFAULT_HORIZON_YEARS,
        }
    }
}

impl CandidatePolicy {
    pub fn new(
        prefix: impl Into<String>,
        base_year: i32,
        base_letter: char,
        major_months: Vec<u32>,
        max_candidates: usize,
        horizon_years: u32,
    ) -> Result<Self, PolicyError> {
        if major_months.is_empty() {
            return Err(PolicyError::NoMajorMonths);
        }
        if let Some(m) = major_months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(PolicyError::InvalidMonth(*m));
        }
        if max_candidates == 0 {
            return Err(PolicyError::ZeroCandidates);
        }
        if max_candidates > MAX_CANDIDATES_LIMIT {
            return Err(PolicyError::TooManyCandidates(max_candidates));
        }
        if horizon_years == 0 {
            return Err(PolicyError::ZeroHorizon);
        }
        if horizon_years > MAX_HORIZON_YEARS {
            return Err(PolicyError::HorizonTooLong(horizon_years));
        }
        if !base_letter.is_ascii_uppercase() {
            return Err(PolicyError::InvalidBaseLetter(base_letter));
        }

        let mut major_months = major_months;
        major_months.sort_unstable();
        major_months.dedup();

        Ok(Self {
            prefix: prefix.into(),
            base_year,
            base_letter,
            major_months,
            max_candidates,
            horizon_years,
        })
    }

    /// Default months and limits with a custom prefix and base year.
    pub fn with_encoding(prefix: impl Into<String>, base_year: i32) -> Self {
        Self {
            prefix: prefix.into(),
            base_year,
            ..Self::default()
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    pub fn is_major_month(&self, month: u32) -> bool {
        self.major_months.contains(&month)
    }

    /// Year letter, cycling through A-Z relative to `base_year`.
    pub fn year_code(&self, year: i32) -> char {
        let base = (self.base_letter as u8 - b'A') as i32;
        let idx = (base + (year - self.base_year)).rem_euclid(26);
        (b'A' + idx as u8) as char
    }

    pub fn encode_symbol(&self, year: i32, month: u32) -> String {
        format!("{}{}{:02}", self.prefix, self.year_code(year), month)
    }
}

/// Upcoming major contract months whose first day is strictly after `today`,
/// nearest first, at most `policy.max_candidates()` of them.
pub fn generate_candidates(today: NaiveDate, policy: &CandidatePolicy) -> Vec<ContractCandidate> {
    let start = today.year() * 12 + today.month0() as i32;
    let horizon = (policy.horizon_years * 12) as i32;

    let mut out = Vec::with_capacity(policy.max_candidates);

    for offset in 0..=horizon {
        let idx = start + offset;
        let year = idx.div_euclid(12);
        let month = idx.rem_euclid(12) as u32 + 1;

        if !policy.is_major_month(month) {
            continue;
        }

        let Some(expiry_date) = NaiveDate::from_ymd_opt(year, month, 1) else {
            continue;
        };
        if expiry_date <= today {
            continue;
        }

        out.push(ContractCandidate {
            symbol: policy.encode_symbol(year, month),
            expiry_year: year,
            expiry_month: month,
            expiry_date,
            description: month_label(year, month),
        });

        if out.len() >= policy.max_candidates {
            break;
        }
    }

    out
}
