//! Field validation, patient record state and duplicate suppression
//!
//! Everything here is deterministic and free of I/O: the validation engine
//! is a pure function of the schema and the current record, the record
//! store adds locking and change events, and the dedup filters take time as
//! an argument.

pub mod checklist;
pub mod dedup;
pub mod record;
pub mod validator;

pub use dedup::{ToolCallDedup, UtteranceDedup};
pub use record::{PatientRecord, RecordChange, RecordStore};
pub use validator::{validate, Accepted, Outcome, Rejection};
