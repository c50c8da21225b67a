// src/bot/scoring.rs - Points for suspicious terms, non-member penalty, threshold

use log::debug;

use crate::types::{cases, ClassificationResult};

/// Point total for one text
#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionScore {
    pub terms: Vec<String>,
    pub points: usize,
    pub threshold: usize,
}

impl SuspicionScore {
    /// One point per matched term, plus one for non-members when anything matched
    pub fn compute(terms: Vec<String>, is_member: bool, threshold: usize) -> Self {
        let mut points = terms.len();
        if points > 0 && !is_member {
            points += 1;
        }

        debug!("Suspicion score {} of {} for {:?} (member: {})", points, threshold, terms, is_member);
        Self {
            terms,
            points,
            threshold,
        }
    }

    pub fn into_result(self) -> Option<ClassificationResult> {
        if self.points == 0 {
            return None;
        }

        if self.points >= self.threshold {
            let details = format!(
                "Suspicious {:?} found, {} points reach the limit of {}",
                self.terms, self.points, self.threshold
            );
            Some(ClassificationResult::block(cases::SUSPICIOUS_CLUSTER, self.terms, details))
        } else {
            let details = format!(
                "Suspicious {:?} found, {} points stay below the limit of {}",
                self.terms, self.points, self.threshold
            );
            Some(ClassificationResult::suspicious(cases::INSUFFICIENT_SUSPICIOUS, self.terms, details))
        }
    }
}
