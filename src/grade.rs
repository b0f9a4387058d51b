use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Failures raised while building grade inputs. These are caller bugs and are
/// surfaced at the construction boundary, never inside aggregation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GradeError {
    #[error("unknown letter grade: {0:?}")]
    InvalidGrade(String),
    #[error("credit hours must be positive, got {0}")]
    InvalidCreditHours(i64),
    #[error("semester number must be positive, got {0}")]
    InvalidSemester(i64),
    #[error("invalid mark criteria: {0}")]
    InvalidCriteria(String),
}

impl GradeError {
    /// Stable error code used in IPC error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidGrade(_) => "invalid_grade",
            Self::InvalidCreditHours(_) => "invalid_credit_hours",
            Self::InvalidSemester(_) => "invalid_semester",
            Self::InvalidCriteria(_) => "invalid_criteria",
        }
    }
}

/// Letter grades in descending order of quality. The derived `Ord` therefore
/// sorts `O` first and `F` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    #[serde(rename = "O")]
    O,
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "F")]
    F,
}

/// Display bucket for badges. Not used in any computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeTier {
    High,
    Mid,
    Low,
}

impl LetterGrade {
    pub const ALL: [LetterGrade; 7] = [
        LetterGrade::O,
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::C,
        LetterGrade::F,
    ];

    pub fn points(self) -> u8 {
        match self {
            Self::O => 10,
            Self::APlus => 9,
            Self::A => 8,
            Self::BPlus => 7,
            Self::B => 6,
            Self::C => 5,
            Self::F => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::O => "O",
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::C => "C",
            Self::F => "F",
        }
    }

    pub fn tier(self) -> GradeTier {
        match self {
            Self::O | Self::APlus => GradeTier::High,
            Self::A | Self::BPlus => GradeTier::Mid,
            Self::B | Self::C | Self::F => GradeTier::Low,
        }
    }

    pub fn is_pass(self) -> bool {
        self != Self::F
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        LetterGrade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == t)
            .ok_or_else(|| GradeError::InvalidGrade(s.to_string()))
    }
}

/// Grade point for a letter as entered by a caller.
pub fn points_for(letter: &str) -> Result<u8, GradeError> {
    Ok(letter.parse::<LetterGrade>()?.points())
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeTableRow {
    pub letter: LetterGrade,
    pub points: u8,
    pub tier: GradeTier,
}

pub fn grade_table() -> Vec<GradeTableRow> {
    LetterGrade::ALL
        .iter()
        .map(|&g| GradeTableRow {
            letter: g,
            points: g.points(),
            tier: g.tier(),
        })
        .collect()
}
