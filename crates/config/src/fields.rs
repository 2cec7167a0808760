//! Declarative intake field schema
//!
//! The whole intake form is described by one static table: 30 fields in 5
//! ordered groups, each with a format rule and a mandatory flag. Validation,
//! checklist rendering and dependency gating are all driven from here rather
//! than from per-field code.

use serde::{Deserialize, Serialize};

/// Sentinel the agent writes when the patient declines an optional field
pub const NOT_NEEDED: &str = "not-needed";

/// Ordered intake sections; a field in a later group may only be saved once
/// every field of the earlier groups is present
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    PatientInformation,
    VisitContext,
    MedicalInformation,
    AccessibilitySupport,
    ConsentPreferences,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 5] = [
        FieldGroup::PatientInformation,
        FieldGroup::VisitContext,
        FieldGroup::MedicalInformation,
        FieldGroup::AccessibilitySupport,
        FieldGroup::ConsentPreferences,
    ];

    /// Zero-based position in the intake order
    pub fn index(&self) -> usize {
        match self {
            FieldGroup::PatientInformation => 0,
            FieldGroup::VisitContext => 1,
            FieldGroup::MedicalInformation => 2,
            FieldGroup::AccessibilitySupport => 3,
            FieldGroup::ConsentPreferences => 4,
        }
    }

    /// Checklist row title
    pub fn title(&self) -> &'static str {
        match self {
            FieldGroup::PatientInformation => "Patient Information",
            FieldGroup::VisitContext => "Visit & Care Context",
            FieldGroup::MedicalInformation => "Medical Information",
            FieldGroup::AccessibilitySupport => "Accessibility & Support",
            FieldGroup::ConsentPreferences => "Consent & Preferences",
        }
    }

    /// Checklist row description
    pub fn description(&self) -> &'static str {
        match self {
            FieldGroup::PatientInformation => "Basic patient information",
            FieldGroup::VisitContext => "Visit details",
            FieldGroup::MedicalInformation => "Medical history",
            FieldGroup::AccessibilitySupport => "Support needs",
            FieldGroup::ConsentPreferences => "Consent & preferences",
        }
    }
}

/// Accepted values for enumerated fields
pub mod options {
    pub const GENDER: &[&str] = &["Male", "Female", "Other", "Prefer not to say"];
    pub const CALLER_TYPE: &[&str] = &["Patient", "Parent", "Guardian", "Caregiver"];
    pub const VISIT_TYPE: &[&str] = &["First-time", "Returning"];
    pub const YES_NO: &[&str] = &["Yes", "No"];
}

/// Format rule applied to a field's value before it is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRule {
    /// Any non-empty string
    FreeText,
    /// Calendar date, normalized to YYYY-MM-DD on store
    Date,
    /// local@domain.tld
    Email,
    /// US phone number, normalized to XXX-XXX-XXXX on store
    Phone,
    /// Integer within the inclusive range, stored as its decimal string
    IntRange(i64, i64),
    /// One of a fixed option list, matched case-insensitively and stored in
    /// canonical casing
    OneOf(&'static [&'static str]),
    /// Final yes/no gate over the whole record
    Confirmation,
}

/// One row of the intake schema
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub group: FieldGroup,
    /// Mandatory fields reject the `not-needed` sentinel
    pub mandatory: bool,
    pub rule: FormatRule,
}

/// The intake schema, in canonical fill order
pub const FIELDS: &[FieldDef] = &[
    // Patient Information
    FieldDef { name: "full_name", group: FieldGroup::PatientInformation, mandatory: true, rule: FormatRule::FreeText },
    FieldDef { name: "dob", group: FieldGroup::PatientInformation, mandatory: true, rule: FormatRule::Date },
    FieldDef { name: "gender", group: FieldGroup::PatientInformation, mandatory: true, rule: FormatRule::OneOf(options::GENDER) },
    FieldDef { name: "contact_number", group: FieldGroup::PatientInformation, mandatory: true, rule: FormatRule::Phone },
    FieldDef { name: "email", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::Email },
    FieldDef { name: "address", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "preferred_language", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "emergency_contact_name", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "emergency_contact_phone", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::Phone },
    FieldDef { name: "relationship_to_patient", group: FieldGroup::PatientInformation, mandatory: false, rule: FormatRule::FreeText },
    // Visit & Care Context
    FieldDef { name: "caller_type", group: FieldGroup::VisitContext, mandatory: false, rule: FormatRule::OneOf(options::CALLER_TYPE) },
    FieldDef { name: "reason_for_visit", group: FieldGroup::VisitContext, mandatory: true, rule: FormatRule::FreeText },
    FieldDef { name: "visit_type", group: FieldGroup::VisitContext, mandatory: false, rule: FormatRule::OneOf(options::VISIT_TYPE) },
    FieldDef { name: "primary_physician", group: FieldGroup::VisitContext, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "referral_source", group: FieldGroup::VisitContext, mandatory: false, rule: FormatRule::FreeText },
    // Medical Information
    FieldDef { name: "symptoms", group: FieldGroup::MedicalInformation, mandatory: true, rule: FormatRule::FreeText },
    FieldDef { name: "symptom_duration", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "pain_level", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::IntRange(0, 10) },
    FieldDef { name: "current_medications", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "allergies", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "medical_history", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "family_history", group: FieldGroup::MedicalInformation, mandatory: false, rule: FormatRule::FreeText },
    // Accessibility & Support
    FieldDef { name: "interpreter_need", group: FieldGroup::AccessibilitySupport, mandatory: false, rule: FormatRule::OneOf(options::YES_NO) },
    FieldDef { name: "interpreter_language", group: FieldGroup::AccessibilitySupport, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "accessibility_needs", group: FieldGroup::AccessibilitySupport, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "dietary_needs", group: FieldGroup::AccessibilitySupport, mandatory: false, rule: FormatRule::FreeText },
    // Consent & Preferences
    FieldDef { name: "consent_share_records", group: FieldGroup::ConsentPreferences, mandatory: false, rule: FormatRule::OneOf(options::YES_NO) },
    FieldDef { name: "preferred_communication_method", group: FieldGroup::ConsentPreferences, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "appointment_availability", group: FieldGroup::ConsentPreferences, mandatory: false, rule: FormatRule::FreeText },
    FieldDef { name: "confirmation", group: FieldGroup::ConsentPreferences, mandatory: true, rule: FormatRule::Confirmation },
];

/// Fields that must be present before `confirmation` can be accepted
pub const CONFIRMATION_REQUIRED: &[&str] =
    &["full_name", "dob", "contact_number", "reason_for_visit", "symptoms"];

/// Look up a field by its schema name (already lowercased/trimmed upstream)
pub fn field_def(name: &str) -> Option<&'static FieldDef> {
    FIELDS.iter().find(|f| f.name == name)
}

/// Schema names of a group, in fill order
pub fn group_fields(group: FieldGroup) -> impl Iterator<Item = &'static str> {
    FIELDS.iter().filter(move |f| f.group == group).map(|f| f.name)
}

/// Schema names of every group strictly before `group`, in fill order
pub fn prerequisite_fields(group: FieldGroup) -> impl Iterator<Item = &'static str> {
    FIELDS
        .iter()
        .filter(move |f| f.group.index() < group.index())
        .map(|f| f.name)
}

/// First schema field for which `is_filled` is false
pub fn next_unfilled(mut is_filled: impl FnMut(&str) -> bool) -> Option<&'static str> {
    FIELDS.iter().map(|f| f.name).find(|name| !is_filled(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_thirty_fields() {
        assert_eq!(FIELDS.len(), 30);
    }

    #[test]
    fn test_field_names_unique() {
        let mut names: Vec<_> = FIELDS.iter().map(|f| f.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), FIELDS.len());
    }

    #[test]
    fn test_groups_contiguous_and_ordered() {
        // The table must list groups in order with no interleaving
        let mut last = 0usize;
        for f in FIELDS {
            assert!(f.group.index() >= last);
            last = f.group.index();
        }
        assert_eq!(last, FieldGroup::ALL.len() - 1);
    }

    #[test]
    fn test_mandatory_set() {
        let mandatory: Vec<_> = FIELDS.iter().filter(|f| f.mandatory).map(|f| f.name).collect();
        assert_eq!(
            mandatory,
            vec!["full_name", "dob", "gender", "contact_number", "reason_for_visit", "symptoms", "confirmation"]
        );
    }

    #[test]
    fn test_confirmation_required_are_schema_fields() {
        for name in CONFIRMATION_REQUIRED {
            assert!(field_def(name).is_some(), "unknown field {name}");
        }
    }

    #[test]
    fn test_prerequisites_for_medical() {
        let prereqs: Vec<_> = prerequisite_fields(FieldGroup::MedicalInformation).collect();
        assert_eq!(prereqs.len(), 15);
        assert!(prereqs.contains(&"full_name"));
        assert!(prereqs.contains(&"referral_source"));
        assert!(!prereqs.contains(&"symptoms"));
    }

    #[test]
    fn test_next_unfilled_walks_schema_order() {
        let filled = ["full_name"];
        let next = next_unfilled(|name| filled.contains(&name));
        assert_eq!(next, Some("dob"));
    }
}
