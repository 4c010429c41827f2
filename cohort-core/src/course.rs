//! Course grading criteria
//!
//! Builds the criterion list a course gradebook is aggregated over:
//! an optional completion criterion plus one criterion per assessment, with
//! weights normalized to an exact 100% distribution. Rounding goes to one
//! decimal place, half-up, and the rounding residual lands on the
//! largest-weight assessment criterion so the normalized weights still sum
//! exactly to the assessment share.

use chrono::{DateTime, Duration, Utc};
use cohort_models::{AccessWindow, ItemKind};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::record::{AssessableItem, Assessment, GradingPolicy};

/// What a criterion measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "item_kind")]
pub enum CriterionKind {
    Completion,
    Assessment(ItemKind),
}

/// One row of a course's grading policy, with its normalized share of 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingCriterion {
    pub title: String,
    pub kind: CriterionKind,
    /// The assessed item id, or the course id for the completion criterion.
    pub item_id: String,
    pub weight: u32,
    pub passing_point: u32,
    pub normalized_weight: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl GradingCriterion {
    pub fn is_completion(&self) -> bool {
        matches!(self.kind, CriterionKind::Completion)
    }
}

/// Build the criterion list for a course.
///
/// `assessments` come in schedule order; `items` supplies titles and
/// passing points. With an access window, each criterion carries its
/// effective dates.
pub fn build_criteria(
    policy: &GradingPolicy,
    assessments: &[Assessment],
    items: &HashMap<String, AssessableItem>,
    window: Option<&AccessWindow>,
) -> Vec<GradingCriterion> {
    let start_date = window.map(|w| w.start);
    let end_date = window.map(|w| w.end);
    let total_weight = policy.completion_weight + policy.assessment_weight;

    let mut criteria = Vec::new();

    if policy.completion_weight > 0 || policy.completion_passing_point > 0 {
        let normalized = if total_weight > 0 {
            Decimal::from(policy.completion_weight) * Decimal::from(100)
                / Decimal::from(total_weight)
        } else {
            Decimal::ZERO
        };
        criteria.push(GradingCriterion {
            title: "Completion".to_string(),
            kind: CriterionKind::Completion,
            item_id: policy.course_id.clone(),
            weight: policy.completion_weight,
            passing_point: policy.completion_passing_point,
            normalized_weight: normalized,
            start_date,
            end_date,
        });
    }

    for assessment in assessments {
        let Some(item) = items.get(&assessment.item_id) else {
            continue;
        };
        if assessment.weight == 0 && item.passing_point == 0 {
            continue;
        }

        let criterion_start = start_date
            .map(|start| start + Duration::days(i64::from(assessment.start_offset_days)));
        let criterion_end = match (criterion_start, assessment.end_offset_days) {
            (Some(start), Some(days)) => Some(start + Duration::days(i64::from(days))),
            (Some(_), None) => end_date,
            (None, _) => None,
        };

        criteria.push(GradingCriterion {
            title: item.title.clone(),
            kind: CriterionKind::Assessment(assessment.item_kind),
            item_id: assessment.item_id.clone(),
            weight: assessment.weight,
            passing_point: item.passing_point,
            normalized_weight: Decimal::ZERO,
            start_date: criterion_start,
            end_date: criterion_end,
        });
    }

    normalize_weights(policy, &mut criteria);
    criteria
}

fn normalize_weights(policy: &GradingPolicy, criteria: &mut [GradingCriterion]) {
    if criteria.is_empty() || criteria.iter().all(|c| c.weight == 0) {
        return;
    }

    if criteria.len() == 1 {
        criteria[0].normalized_weight = Decimal::from(100);
        return;
    }

    let total_weight = policy.completion_weight + policy.assessment_weight;
    let total_assessment_weight: u32 = criteria
        .iter()
        .filter(|c| !c.is_completion())
        .map(|c| c.weight)
        .sum();
    if total_weight == 0 || total_assessment_weight == 0 {
        return;
    }

    let assessment_ratio = Decimal::from(policy.assessment_weight) * Decimal::from(100)
        / Decimal::from(total_weight);

    let mut rounded_total = Decimal::ZERO;
    for criterion in criteria.iter_mut().filter(|c| !c.is_completion()) {
        let normalized = (Decimal::from(criterion.weight) / Decimal::from(total_assessment_weight)
            * assessment_ratio)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        criterion.normalized_weight = normalized;
        rounded_total += normalized;
    }

    let residual = assessment_ratio - rounded_total;
    if !residual.is_zero() {
        // The residual goes to the largest-weight assessment criterion;
        // among equals, the first in schedule order.
        let mut largest: Option<usize> = None;
        for (index, criterion) in criteria.iter().enumerate() {
            if criterion.is_completion() {
                continue;
            }
            match largest {
                Some(best) if criteria[best].weight >= criterion.weight => {}
                _ => largest = Some(index),
            }
        }
        if let Some(index) = largest {
            criteria[index].normalized_weight += residual;
        }
    }
}
