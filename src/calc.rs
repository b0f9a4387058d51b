use crate::grade::{GradeError, LetterGrade};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slack for products like `0.6 * 2.25` that land just below an exact half.
const HALF_EPSILON: f64 = 1e-9;

/// Half-away-from-zero rounding to one decimal, used for internal and final
/// marks: `round(10*x) / 10`.
pub fn round_half_away_1_decimal(x: f64) -> f64 {
    let scaled = x * 10.0;
    (scaled + scaled.signum() * HALF_EPSILON).round() / 10.0
}

/// GPA/CGPA are kept unrounded and only formatted to two decimals for display.
pub fn gpa_display(gpa: f64) -> String {
    format!("{:.2}", gpa)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
    pub credits: u32,
    pub grade: LetterGrade,
    pub semester: u32,
}

impl CourseRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        credits: i64,
        grade: LetterGrade,
        semester: i64,
    ) -> Result<Self, GradeError> {
        if credits <= 0 || credits > i64::from(u32::MAX) {
            return Err(GradeError::InvalidCreditHours(credits));
        }
        if semester <= 0 || semester > i64::from(u32::MAX) {
            return Err(GradeError::InvalidSemester(semester));
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            credits: credits as u32,
            grade,
            semester: semester as u32,
        })
    }

    pub fn grade_points(&self) -> u8 {
        self.grade.points()
    }
}

/// Untrusted course shape as it arrives from a form. Converting it into a
/// `CourseRecord` is the only place grade letters and credits are validated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub credits: i64,
    pub grade: String,
    #[serde(default = "default_semester")]
    pub semester: i64,
}

fn default_semester() -> i64 {
    1
}

impl CourseInput {
    pub fn into_record(self, fallback_id: impl FnOnce() -> String) -> Result<CourseRecord, GradeError> {
        let grade: LetterGrade = self.grade.parse()?;
        CourseRecord::new(
            self.id.unwrap_or_else(fallback_id),
            self.name.unwrap_or_default(),
            self.credits,
            grade,
            self.semester,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemesterSummary {
    pub semester: u32,
    pub gpa: f64,
    pub gpa_display: String,
    pub total_credits: u64,
    pub course_count: usize,
}

fn credit_weighted(records: &[CourseRecord]) -> (u64, u64) {
    records.iter().fold((0u64, 0u64), |(points, credits), r| {
        (
            points + u64::from(r.credits) * u64::from(r.grade_points()),
            credits + u64::from(r.credits),
        )
    })
}

pub fn total_credits(records: &[CourseRecord]) -> u64 {
    records.iter().map(|r| u64::from(r.credits)).sum()
}

/// Σ(credits × points) / Σ credits; 0 when there are no credits.
pub fn semester_gpa(records: &[CourseRecord]) -> f64 {
    let (points, credits) = credit_weighted(records);
    if credits == 0 {
        return 0.0;
    }
    points as f64 / credits as f64
}

/// Same reduction as `semester_gpa`, over every semester at once. The sums are
/// integers so the result does not depend on record order.
pub fn cumulative_cgpa(records: &[CourseRecord]) -> f64 {
    semester_gpa(records)
}

pub fn semester_summaries(records: &[CourseRecord]) -> Vec<SemesterSummary> {
    let mut by_semester: BTreeMap<u32, Vec<CourseRecord>> = BTreeMap::new();
    for r in records {
        by_semester.entry(r.semester).or_default().push(r.clone());
    }
    by_semester
        .into_iter()
        .map(|(semester, rows)| {
            let gpa = semester_gpa(&rows);
            SemesterSummary {
                semester,
                gpa,
                gpa_display: gpa_display(gpa),
                total_credits: total_credits(&rows),
                course_count: rows.len(),
            }
        })
        .collect()
}

/// Credit-weighted mean of per-semester GPAs.
pub fn combine_semesters(summaries: &[SemesterSummary]) -> f64 {
    let mut weighted = 0.0;
    let mut credits: u64 = 0;
    for s in summaries {
        weighted += s.gpa * s.total_credits as f64;
        credits += s.total_credits;
    }
    if credits == 0 {
        return 0.0;
    }
    weighted / credits as f64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScores {
    #[serde(default)]
    pub final_assessment: Option<f64>,
    #[serde(default)]
    pub assignment: Option<f64>,
    #[serde(default)]
    pub model_exam: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InternalWeights {
    pub final_assessment: f64,
    pub assignment: f64,
    pub model_exam: f64,
}

pub const INTERNAL_WEIGHTS: InternalWeights = InternalWeights {
    final_assessment: 0.6,
    assignment: 0.2,
    model_exam: 0.2,
};

/// `0.6*FAT + 0.2*Assignment + 0.2*Model`, missing components count as 0.
/// Inputs are expected to be pre-clamped to [0, 100].
pub fn weighted_internal(scores: &ComponentScores) -> f64 {
    let w = INTERNAL_WEIGHTS;
    let raw = scores.final_assessment.unwrap_or(0.0) * w.final_assessment
        + scores.assignment.unwrap_or(0.0) * w.assignment
        + scores.model_exam.unwrap_or(0.0) * w.model_exam;
    round_half_away_1_decimal(raw)
}

/// Clamp a form-entered component score into [0, 100]. Non-finite input is
/// treated as absent.
pub fn clamp_component(v: f64) -> Option<f64> {
    if !v.is_finite() {
        return None;
    }
    Some(v.clamp(0.0, 100.0))
}

/// Admin-defined composition of the final mark, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkCriteria {
    pub internals: f64,
    pub practicals: f64,
    pub semester_finals: f64,
}

impl Default for MarkCriteria {
    fn default() -> Self {
        Self {
            internals: 40.0,
            practicals: 20.0,
            semester_finals: 40.0,
        }
    }
}

impl MarkCriteria {
    pub fn validate(&self) -> Result<(), GradeError> {
        for (name, v) in [
            ("internals", self.internals),
            ("practicals", self.practicals),
            ("semesterFinals", self.semester_finals),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(GradeError::InvalidCriteria(format!(
                    "{} must be between 0 and 100",
                    name
                )));
            }
        }
        let sum = self.internals + self.practicals + self.semester_finals;
        if (sum - 100.0).abs() > 1e-9 {
            return Err(GradeError::InvalidCriteria(format!(
                "weights must sum to 100, got {}",
                sum
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalComponents {
    pub internals: f64,
    pub practicals: f64,
    pub semester_finals: f64,
}

pub fn final_mark(criteria: &MarkCriteria, parts: &FinalComponents) -> f64 {
    let raw = parts.internals * criteria.internals / 100.0
        + parts.practicals * criteria.practicals / 100.0
        + parts.semester_finals * criteria.semester_finals / 100.0;
    round_half_away_1_decimal(raw)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceOverview {
    pub cgpa: f64,
    pub cgpa_display: String,
    pub total_credits: u64,
    pub earned_credits: u64,
    pub current_semester: u32,
    pub semesters: Vec<SemesterSummary>,
    pub gpa_trend: Option<f64>,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
}

pub fn performance_overview(records: &[CourseRecord]) -> PerformanceOverview {
    let semesters = semester_summaries(records);
    let cgpa = cumulative_cgpa(records);
    debug_assert!(
        (combine_semesters(&semesters) - cgpa).abs() < 1e-9,
        "semester GPAs disagree with single-pass CGPA"
    );
    let earned_credits = records
        .iter()
        .filter(|r| r.grade.is_pass())
        .map(|r| u64::from(r.credits))
        .sum();
    let current_semester = semesters.last().map(|s| s.semester).unwrap_or(0);
    let gpa_trend = match semesters.as_slice() {
        [.., prev, last] => Some(last.gpa - prev.gpa),
        _ => None,
    };

    // Best grades first within each bucket.
    let mut ranked: Vec<&CourseRecord> = records.iter().collect();
    ranked.sort_by(|a, b| a.grade.cmp(&b.grade).then_with(|| a.name.cmp(&b.name)));
    let strengths = ranked
        .iter()
        .filter(|r| r.grade.tier() == crate::grade::GradeTier::High)
        .map(|r| r.name.clone())
        .collect();
    let improvement_areas = ranked
        .iter()
        .rev()
        .filter(|r| r.grade.tier() == crate::grade::GradeTier::Low)
        .map(|r| r.name.clone())
        .collect();

    PerformanceOverview {
        cgpa,
        cgpa_display: gpa_display(cgpa),
        total_credits: total_credits(records),
        earned_credits,
        current_semester,
        semesters,
        gpa_trend,
        strengths,
        improvement_areas,
    }
}
