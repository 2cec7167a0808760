//! Field validation engine
//!
//! Pure functions from (field, spoken value, current record) to a tagged
//! outcome. Accepted outcomes carry the normalized value to store plus any
//! linked auto-fills; rejections carry a correction message that is sent
//! back to the model verbatim so it can re-ask the patient.

use once_cell::sync::Lazy;
use regex::Regex;

use voice_intake_config::fields::{
    field_def, options, prerequisite_fields, FormatRule, CONFIRMATION_REQUIRED, NOT_NEEDED,
};

use crate::record::PatientRecord;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static DATE_SLASH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DATE_ISO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

/// A validated value ready to store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Normalized value for the primary field
    pub value: String,
    /// Auto-filled companion fields
    pub linked: Vec<(&'static str, String)>,
}

/// Why a save was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Field name not in the schema
    UnknownField { field: String },
    /// Mandatory field cannot take the `not-needed` sentinel
    MandatorySkipped { field: &'static str },
    /// Earlier groups are not complete yet
    MissingPrerequisites {
        field: &'static str,
        missing: Vec<&'static str>,
    },
    /// Value failed the field's format rule
    Format {
        field: &'static str,
        hint: &'static str,
    },
    /// Patient answered "no" to the final confirmation
    ConfirmationDenied,
    /// Confirmation attempted before the core fields were collected
    ConfirmationIncomplete { missing: Vec<&'static str> },
}

impl Rejection {
    /// Instruction sent back to the model so it can recover
    pub fn correction_message(&self) -> String {
        match self {
            Rejection::UnknownField { field } => format!(
                "The field '{field}' is not part of the intake form. Do not save it; \
                 continue with the next required intake field."
            ),
            Rejection::MandatorySkipped { field } => format!(
                "{field} is required and cannot be skipped. Ask the patient for their \
                 {field} before moving on."
            ),
            Rejection::MissingPrerequisites { field, missing } => format!(
                "Cannot save {field} yet. Collect these earlier fields first: {}.",
                missing.join(", ")
            ),
            Rejection::Format { field, hint } => {
                format!("The value for {field} is not valid. {hint}")
            }
            Rejection::ConfirmationDenied => "The patient did not confirm the record. Ask what \
                needs to be corrected, update those fields, and only then ask for \
                confirmation again."
                .to_string(),
            Rejection::ConfirmationIncomplete { missing } => format!(
                "Cannot confirm yet. These required fields are still missing: {}. Collect \
                 them before asking for confirmation.",
                missing.join(", ")
            ),
        }
    }
}

/// Validation result; `Err` here is a domain outcome, not a fault
pub type Outcome = Result<Accepted, Rejection>;

/// Validate a tool-call save against the schema and the current record
pub fn validate(field_raw: &str, value_raw: &str, record: &PatientRecord) -> Outcome {
    let field_name = field_raw.trim().to_lowercase();
    let Some(def) = field_def(&field_name) else {
        return Err(Rejection::UnknownField { field: field_name });
    };

    let value = value_raw.trim();

    // Strict dependency gating: all fields of earlier groups must be present
    let missing: Vec<&'static str> = prerequisite_fields(def.group)
        .filter(|name| !record.is_filled(name))
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::MissingPrerequisites {
            field: def.name,
            missing,
        });
    }

    // The sentinel short-circuits format rules for optional fields
    if value.eq_ignore_ascii_case(NOT_NEEDED) {
        if def.mandatory {
            return Err(Rejection::MandatorySkipped { field: def.name });
        }
        return Ok(Accepted {
            value: NOT_NEEDED.to_string(),
            linked: linked_writes(def.name, NOT_NEEDED, record),
        });
    }

    if value.is_empty() {
        return Err(Rejection::Format {
            field: def.name,
            hint: "An empty value cannot be saved; ask the patient again.",
        });
    }

    let normalized = match def.rule {
        FormatRule::FreeText => value.to_string(),
        FormatRule::Date => validate_date(value).ok_or(Rejection::Format {
            field: def.name,
            hint: "Provide the date as month/day/year, for example 7/16/1988.",
        })?,
        FormatRule::Email => {
            if EMAIL_RE.is_match(value) {
                value.to_string()
            } else {
                return Err(Rejection::Format {
                    field: def.name,
                    hint: "Provide a full email address such as name@example.com.",
                });
            }
        }
        FormatRule::Phone => validate_phone(value).ok_or(Rejection::Format {
            field: def.name,
            hint: "Provide a 10-digit US phone number.",
        })?,
        FormatRule::IntRange(min, max) => {
            let parsed: i64 = value.parse().map_err(|_| Rejection::Format {
                field: def.name,
                hint: "Provide a whole number from 0 to 10.",
            })?;
            if parsed < min || parsed > max {
                return Err(Rejection::Format {
                    field: def.name,
                    hint: "Provide a whole number from 0 to 10.",
                });
            }
            parsed.to_string()
        }
        FormatRule::OneOf(opts) => opts
            .iter()
            .find(|opt| opt.eq_ignore_ascii_case(value))
            .map(|opt| opt.to_string())
            .ok_or(Rejection::Format {
                field: def.name,
                hint: "The answer must be one of the listed options for this field.",
            })?,
        FormatRule::Confirmation => return validate_confirmation(value, record),
    };

    Ok(Accepted {
        linked: linked_writes(def.name, &normalized, record),
        value: normalized,
    })
}

/// Accepts M/D/YYYY (1-2 digit month/day) or YYYY-M-D; always stores
/// zero-padded YYYY-MM-DD, so re-validating a stored date is idempotent
fn validate_date(value: &str) -> Option<String> {
    let (year, month, day) = if let Some(caps) = DATE_SLASH_RE.captures(value) {
        (
            caps[3].parse::<u32>().ok()?,
            caps[1].parse::<u32>().ok()?,
            caps[2].parse::<u32>().ok()?,
        )
    } else if let Some(caps) = DATE_ISO_RE.captures(value) {
        (
            caps[1].parse::<u32>().ok()?,
            caps[2].parse::<u32>().ok()?,
            caps[3].parse::<u32>().ok()?,
        )
    } else {
        return None;
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || year < 1900 {
        return None;
    }
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// Accepts any punctuation; the digits must form a 10-digit number, or an
/// 11-digit number with a leading country code 1. Stores XXX-XXX-XXXX.
fn validate_phone(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = match digits.len() {
        10 => digits,
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => return None,
    };
    Some(format!(
        "{}-{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..10]
    ))
}

fn validate_confirmation(value: &str, record: &PatientRecord) -> Outcome {
    let answer = value.to_lowercase();
    match answer.as_str() {
        "no" => Err(Rejection::ConfirmationDenied),
        "yes" => {
            let missing: Vec<&'static str> = CONFIRMATION_REQUIRED
                .iter()
                .copied()
                .filter(|name| !record.is_filled(name))
                .collect();
            if missing.is_empty() {
                Ok(Accepted {
                    value: "yes".to_string(),
                    linked: vec![],
                })
            } else {
                Err(Rejection::ConfirmationIncomplete { missing })
            }
        }
        _ => Err(Rejection::Format {
            field: "confirmation",
            hint: "The confirmation answer must be yes or no.",
        }),
    }
}

/// Companion writes triggered by certain saves
///
/// - `interpreter_need` = No also marks `interpreter_language` not needed
/// - the emergency phone is marked not needed only once BOTH the contact
///   name and the relationship are declined; the second decline triggers it
/// - saving `caller_type` after the emergency contact was declined
///   backfills whichever of its companions is still empty
fn linked_writes(
    field: &'static str,
    value: &str,
    record: &PatientRecord,
) -> Vec<(&'static str, String)> {
    let mut linked = Vec::new();
    match field {
        "interpreter_need" => {
            if value.eq_ignore_ascii_case(options::YES_NO[1]) {
                linked.push(("interpreter_language", NOT_NEEDED.to_string()));
            }
        }
        "emergency_contact_name" | "relationship_to_patient" => {
            let other = if field == "emergency_contact_name" {
                "relationship_to_patient"
            } else {
                "emergency_contact_name"
            };
            if value == NOT_NEEDED && record.get(other) == Some(NOT_NEEDED) {
                linked.push(("emergency_contact_phone", NOT_NEEDED.to_string()));
            }
        }
        "caller_type" => {
            if record.get("emergency_contact_name") == Some(NOT_NEEDED) {
                if !record.is_filled("relationship_to_patient") {
                    linked.push(("relationship_to_patient", NOT_NEEDED.to_string()));
                }
                if !record.is_filled("emergency_contact_phone") {
                    linked.push(("emergency_contact_phone", NOT_NEEDED.to_string()));
                }
            }
        }
        _ => {}
    }
    linked
}
