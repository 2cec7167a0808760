//! Checklist derivation
//!
//! The checklist shown next to the transcript is a pure function of the
//! record: five sections, each tracking how many of its fields hold a
//! meaningful value.

use voice_intake_core::{SectionStatus, SectionView};
use voice_intake_config::fields::{group_fields, FieldGroup};

use crate::record::PatientRecord;

/// Values treated as unanswered even when a string is present
fn is_falsy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "false" | "0" | "null" | "none" | "undefined"
    )
}

/// Count a field as answered: present and not a falsy placeholder. The
/// `not-needed` sentinel is an explicit answer and counts.
fn is_answered(record: &PatientRecord, field: &str) -> bool {
    record.get(field).map(|v| !is_falsy(v)).unwrap_or(false)
}

/// Recompute all section rows from the record
pub fn derive(record: &PatientRecord) -> Vec<SectionView> {
    FieldGroup::ALL
        .iter()
        .map(|group| {
            let mut total = 0usize;
            let mut filled = 0usize;
            for field in group_fields(*group) {
                total += 1;
                if is_answered(record, field) {
                    filled += 1;
                }
            }
            let status = if filled == 0 {
                SectionStatus::Pending
            } else if filled == total {
                SectionStatus::Completed
            } else {
                SectionStatus::PartiallyCompleted
            };
            SectionView {
                title: group.title().to_string(),
                description: group.description().to_string(),
                status,
                filled,
                total,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_intake_config::fields::NOT_NEEDED;

    #[test]
    fn test_empty_record_all_pending() {
        let sections = derive(&PatientRecord::new());
        assert_eq!(sections.len(), 5);
        assert!(sections.iter().all(|s| s.status == SectionStatus::Pending));
        assert_eq!(sections[0].total, 10);
        assert_eq!(sections[1].total, 5);
        assert_eq!(sections[2].total, 7);
    }

    #[test]
    fn test_partial_section() {
        let mut record = PatientRecord::new();
        record.set("full_name", "Jane Roe");
        record.set("dob", "1990-07-04");

        let sections = derive(&record);
        assert_eq!(sections[0].status, SectionStatus::PartiallyCompleted);
        assert_eq!(sections[0].filled, 2);
        assert_eq!(sections[1].status, SectionStatus::Pending);
    }

    #[test]
    fn test_completed_section() {
        let mut record = PatientRecord::new();
        for field in group_fields(FieldGroup::AccessibilitySupport) {
            record.set(field, NOT_NEEDED);
        }
        let sections = derive(&record);
        assert_eq!(sections[3].status, SectionStatus::Completed);
        assert_eq!(sections[3].filled, sections[3].total);
    }

    #[test]
    fn test_falsy_values_not_counted() {
        let mut record = PatientRecord::new();
        record.set("full_name", "null");
        record.set("dob", "  ");
        record.set("gender", "0");

        let sections = derive(&record);
        assert_eq!(sections[0].status, SectionStatus::Pending);
    }
}
