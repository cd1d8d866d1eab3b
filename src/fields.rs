//! Field descriptor registry for the employee record
//!
//! Every editable attribute is declared here once: its kind, whether it is
//! required, whether it is read-only, and (for enumerated fields) the master
//! collection its codes resolve against. The edit session consults this table
//! for every operation, so field behavior is a data-driven branch rather than
//! string comparisons scattered through the session.

use chrono::NaiveDate;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::{EditError, EditResult};

/// Field holding the organizational level; linked to the reporting manager
pub const LEVEL_FIELD: &str = "level";

/// Field holding the reporting manager; cleared when the level changes
pub const REPORTING_MANAGER_FIELD: &str = "reportingManager";

const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[A-Za-z]{2,}$").expect("email pattern compiles"));

/// Named master-data collection served by `GET /masters/<collection>/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterCollection {
    Branches,
    Departments,
    Positions,
    Genders,
    MaritalStatuses,
    BloodGroups,
    ExperienceBands,
    Degrees,
    WorkModes,
}

impl MasterCollection {
    pub const ALL: [MasterCollection; 9] = [
        MasterCollection::Branches,
        MasterCollection::Departments,
        MasterCollection::Positions,
        MasterCollection::Genders,
        MasterCollection::MaritalStatuses,
        MasterCollection::BloodGroups,
        MasterCollection::ExperienceBands,
        MasterCollection::Degrees,
        MasterCollection::WorkModes,
    ];

    /// URL segment under `/masters/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            MasterCollection::Branches => "branches",
            MasterCollection::Departments => "departments",
            MasterCollection::Positions => "positions",
            MasterCollection::Genders => "genders",
            MasterCollection::MaritalStatuses => "marital-statuses",
            MasterCollection::BloodGroups => "blood-groups",
            MasterCollection::ExperienceBands => "experience-bands",
            MasterCollection::Degrees => "degrees",
            MasterCollection::WorkModes => "work-modes",
        }
    }

    pub fn from_endpoint(segment: &str) -> Option<Self> {
        MasterCollection::ALL
            .into_iter()
            .find(|c| c.endpoint() == segment)
    }
}

impl std::fmt::Display for MasterCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.endpoint())
    }
}

/// Shape expected of a scalar field's normalized value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFormat {
    /// Free text; no format validation
    Text,
    /// Must match `local@domain.tld`
    Email,
    /// Coerced to a number; non-numeric input is rejected locally
    Numeric,
}

/// Tagged kind per field; drives normalization, validation and save routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarFormat),
    Enumerated(MasterCollection),
    Date,
    Attachment,
}

/// Static metadata for one editable attribute
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub read_only: bool,
}

impl FieldDescriptor {
    const fn new(name: &'static str, label: &'static str) -> Self {
        FieldDescriptor {
            name,
            label,
            kind: FieldKind::Scalar(ScalarFormat::Text),
            required: false,
            read_only: false,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    const fn email(mut self) -> Self {
        self.kind = FieldKind::Scalar(ScalarFormat::Email);
        self
    }

    const fn numeric(mut self) -> Self {
        self.kind = FieldKind::Scalar(ScalarFormat::Numeric);
        self
    }

    const fn date(mut self) -> Self {
        self.kind = FieldKind::Date;
        self
    }

    const fn enumerated(mut self, collection: MasterCollection) -> Self {
        self.kind = FieldKind::Enumerated(collection);
        self
    }

    const fn attachment(mut self) -> Self {
        self.kind = FieldKind::Attachment;
        self
    }

    pub fn is_attachment(&self) -> bool {
        matches!(self.kind, FieldKind::Attachment)
    }

    /// Master collection this field's codes resolve against, if enumerated
    pub fn collection(&self) -> Option<MasterCollection> {
        match self.kind {
            FieldKind::Enumerated(collection) => Some(collection),
            _ => None,
        }
    }
}

/// Registry of every employee field, in display order
pub static FIELDS: Lazy<IndexMap<&'static str, FieldDescriptor>> = Lazy::new(|| {
    use FieldDescriptor as F;
    use MasterCollection::*;

    let fields = [
        // Identity
        F::new("employeeCode", "Employee code").read_only(),
        F::new("firstName", "First name").required(),
        F::new("lastName", "Last name").required(),
        F::new("gender", "Gender").enumerated(Genders),
        F::new("dob", "Date of birth").date(),
        F::new("bloodGroup", "Blood group").enumerated(BloodGroups),
        F::new("maritalStatus", "Marital status").enumerated(MaritalStatuses),
        F::new("nationality", "Nationality"),
        // Contact
        F::new("email", "Work email").email(),
        F::new("personalEmail", "Personal email").email(),
        F::new("phone1", "Primary phone").required(),
        F::new("phone2", "Alternate phone"),
        F::new("emergencyContactName", "Emergency contact name"),
        F::new("emergencyContactPhone", "Emergency contact phone"),
        // Organization
        F::new("doj", "Date of joining").date(),
        F::new("branch", "Branch").enumerated(Branches),
        F::new("department", "Department").enumerated(Departments),
        F::new("position", "Position").enumerated(Positions),
        F::new(LEVEL_FIELD, "Level"),
        F::new(REPORTING_MANAGER_FIELD, "Reporting manager"),
        F::new("workMode", "Work mode").enumerated(WorkModes),
        F::new("status", "Status"),
        F::new("lastWorkingDay", "Last working day").date(),
        // Compensation & experience
        F::new("ctc", "CTC").numeric(),
        F::new("yearsOfExperience", "Experience").enumerated(ExperienceBands),
        F::new("degree", "Highest degree").enumerated(Degrees),
        // Address
        F::new("addressLine1", "Address line 1"),
        F::new("addressLine2", "Address line 2"),
        F::new("city", "City"),
        F::new("state", "State"),
        F::new("pincode", "PIN code"),
        F::new("country", "Country"),
        // Bank & statutory
        F::new("bankName", "Bank name"),
        F::new("bankAccountNumber", "Bank account number"),
        F::new("ifscCode", "IFSC code"),
        F::new("panNumber", "PAN number"),
        F::new("aadhaarNumber", "Aadhaar number"),
        F::new("uan", "UAN"),
        F::new("pfNumber", "PF number"),
        F::new("esiNumber", "ESI number"),
        // Attachments
        F::new("photo", "Photo").attachment(),
        F::new("resume", "Resume").attachment(),
        F::new("aadhaarCard", "Aadhaar card").attachment(),
        F::new("panCard", "PAN card").attachment(),
        F::new("offerLetter", "Offer letter").attachment(),
        F::new("relievingLetter", "Relieving letter").attachment(),
        F::new("bankPassbook", "Bank passbook").attachment(),
        F::new("educationCertificate", "Education certificate").attachment(),
    ];

    fields.into_iter().map(|f| (f.name, f)).collect()
});

/// Look up a field descriptor by wire name
pub fn descriptor(name: &str) -> EditResult<&'static FieldDescriptor> {
    FIELDS
        .get(name)
        .ok_or_else(|| EditError::UnknownField(name.to_string()))
}

/// Normalize a drafted value and run the local validation rules.
///
/// Strings are trimmed and blank strings become null. Numeric fields are
/// coerced, with non-numeric input rejected before any network call. Dates
/// must parse as `YYYY-MM-DD`. Required fields reject null; email fields must
/// match `local@domain.tld`. Free-text fields pass through untouched.
pub fn normalize_and_validate(desc: &FieldDescriptor, raw: &Value) -> EditResult<Value> {
    let normalized = normalize(desc, raw)?;
    validate(desc, &normalized)?;
    Ok(normalized)
}

fn normalize(desc: &FieldDescriptor, raw: &Value) -> EditResult<Value> {
    let value = match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::String(trimmed.to_string())
            }
        }
        other => other.clone(),
    };

    if value.is_null() {
        return Ok(Value::Null);
    }

    match desc.kind {
        FieldKind::Scalar(ScalarFormat::Numeric) => coerce_numeric(desc, &value),
        FieldKind::Date => {
            let text = value.as_str().ok_or_else(|| {
                EditError::validation(desc.name, "expected a date string")
            })?;
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|_| EditError::validation(desc.name, "expected a date as YYYY-MM-DD"))?;
            Ok(value)
        }
        _ => Ok(value),
    }
}

fn coerce_numeric(desc: &FieldDescriptor, value: &Value) -> EditResult<Value> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => {
            if let Ok(n) = s.parse::<i64>() {
                return Ok(Value::from(n));
            }
            if let Ok(f) = s.parse::<f64>() {
                if let Some(n) = serde_json::Number::from_f64(f) {
                    return Ok(Value::Number(n));
                }
            }
            Err(EditError::validation(desc.name, "expected a number"))
        }
        _ => Err(EditError::validation(desc.name, "expected a number")),
    }
}

fn validate(desc: &FieldDescriptor, normalized: &Value) -> EditResult<()> {
    if normalized.is_null() {
        if desc.required {
            return Err(EditError::validation(desc.name, "value is required"));
        }
        return Ok(());
    }

    if let FieldKind::Scalar(ScalarFormat::Email) = desc.kind {
        let text = normalized.as_str().unwrap_or_default();
        if !EMAIL_PATTERN.is_match(text) {
            return Err(EditError::validation(
                desc.name,
                "expected an address like local@domain.tld",
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn registry_has_forty_scalars_and_eight_attachments() {
        let attachments = FIELDS.values().filter(|f| f.is_attachment()).count();
        assert_eq!(attachments, 8);
        assert_eq!(FIELDS.len() - attachments, 40);
    }

    #[test]
    fn required_fields_reject_blank() {
        for name in ["firstName", "lastName", "phone1"] {
            let desc = descriptor(name).unwrap();
            let err = normalize_and_validate(desc, &json!("   ")).unwrap_err();
            assert!(err.is_validation(), "{name} should require a value");
        }
    }

    #[test]
    fn optional_fields_accept_blank_as_null() {
        let desc = descriptor("phone2").unwrap();
        let normalized = normalize_and_validate(desc, &json!("")).unwrap();
        assert!(normalized.is_null());
    }

    #[test]
    fn strings_are_trimmed() {
        let desc = descriptor("firstName").unwrap();
        let normalized = normalize_and_validate(desc, &json!("  John ")).unwrap();
        assert_eq!(normalized, json!("John"));
    }

    #[test]
    fn email_format_is_enforced() {
        let desc = descriptor("email").unwrap();
        assert!(normalize_and_validate(desc, &json!("john@acme.io")).is_ok());
        let err = normalize_and_validate(desc, &json!("john@acme")).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn numeric_fields_coerce_strings() {
        let desc = descriptor("ctc").unwrap();
        assert_eq!(normalize_and_validate(desc, &json!("50000")).unwrap(), json!(50000));
        assert_eq!(
            normalize_and_validate(desc, &json!("50000.5")).unwrap(),
            json!(50000.5)
        );
    }

    #[test]
    fn numeric_fields_reject_non_numeric() {
        let desc = descriptor("ctc").unwrap();
        let err = normalize_and_validate(desc, &json!("abc")).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn dates_must_be_iso() {
        let desc = descriptor("dob").unwrap();
        assert!(normalize_and_validate(desc, &json!("1994-02-28")).is_ok());
        assert!(normalize_and_validate(desc, &json!("28/02/1994")).is_err());
    }

    #[test]
    fn free_text_bypasses_format_checks() {
        let desc = descriptor("addressLine1").unwrap();
        let value = json!("221B, Baker Street @ London !!");
        assert_eq!(normalize_and_validate(desc, &value).unwrap(), value);
    }

    #[test]
    fn enumerated_fields_name_their_collection() {
        let desc = descriptor("bloodGroup").unwrap();
        assert_eq!(desc.collection(), Some(MasterCollection::BloodGroups));
        assert_eq!(MasterCollection::from_endpoint("blood-groups"), Some(MasterCollection::BloodGroups));
    }
}
