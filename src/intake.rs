// src/intake.rs
//
// Server-side checks for the four steps of the intake form.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Urgency;
use crate::schedule::SlotTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("unknown intake step {0} (expected 1 to 4)")]
    UnknownStep(u8),
    #[error("malformed step payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientStep {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub birthday: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressStep {
    pub address: String,
    pub city: String,
    pub postal_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CareStep {
    pub care_type: String,
    pub details: Option<String>,
    pub urgency: Option<Urgency>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityStep {
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntakeSubmission {
    pub patient: PatientStep,
    pub address: AddressStep,
    pub care: CareStep,
    #[serde(default)]
    pub availability: AvailabilityStep,
}

/// A submission that passed every step, with normalised values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidIntake {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub care_type: String,
    pub details: Option<String>,
    pub urgency: Urgency,
    pub preferred_date: Option<DateTime<Utc>>,
    pub preferred_time: Option<SlotTime>,
}

/// Keeps digits and a leading `+`; accepts 10 to 15 digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let (plus, rest) = match raw.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", raw),
    };

    let mut digits = String::new();
    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '.' | '-' | '(' | ')' => {}
            _ => return None,
        }
    }

    if (10..=15).contains(&digits.len()) {
        Some(format!("{plus}{digits}"))
    } else {
        None
    }
}

pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str, max: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, "required"));
    } else if value.chars().count() > max {
        errors.push(FieldError::new(field, format!("too long (max {max})")));
    }
}

fn trimmed_opt(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PatientStep {
    pub fn validate(&self, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        required(&mut errors, "first_name", &self.first_name, 80);
        required(&mut errors, "last_name", &self.last_name, 80);
        if normalize_phone(&self.phone).is_none() {
            errors.push(FieldError::new("phone", "invalid phone number"));
        }
        if let Some(email) = trimmed_opt(&self.email) {
            if !is_valid_email(&email) {
                errors.push(FieldError::new("email", "invalid email address"));
            }
        }
        if let Some(b) = self.birthday {
            if b > today {
                errors.push(FieldError::new("birthday", "cannot be in the future"));
            }
        }
        errors
    }
}

impl AddressStep {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        required(&mut errors, "address", &self.address, 200);
        required(&mut errors, "city", &self.city, 100);
        let pc = self.postal_code.trim();
        if pc.len() != 5 || !pc.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new("postal_code", "must be 5 digits"));
        }
        errors
    }
}

impl CareStep {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        required(&mut errors, "care_type", &self.care_type, 120);
        if let Some(d) = &self.details {
            if d.chars().count() > 2000 {
                errors.push(FieldError::new("details", "too long (max 2000)"));
            }
        }
        errors
    }
}

impl AvailabilityStep {
    pub fn validate(&self, today: NaiveDate) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if let Some(d) = self.preferred_date {
            if d < today {
                errors.push(FieldError::new("preferred_date", "cannot be in the past"));
            }
        }
        if let Some(t) = trimmed_opt(&self.preferred_time) {
            if let Err(e) = SlotTime::parse(&t) {
                errors.push(FieldError::new("preferred_time", e.to_string()));
            }
        }
        errors
    }
}

impl IntakeSubmission {
    pub fn validate(&self, today: NaiveDate) -> Result<ValidIntake, Vec<FieldError>> {
        let mut errors = self.patient.validate(today);
        errors.extend(self.address.validate());
        errors.extend(self.care.validate());
        errors.extend(self.availability.validate(today));
        if !errors.is_empty() {
            return Err(errors);
        }

        let preferred_time = match trimmed_opt(&self.availability.preferred_time) {
            Some(t) => Some(SlotTime::parse(&t).map_err(|e| vec![FieldError::new("preferred_time", e.to_string())])?),
            None => None,
        };
        let phone = normalize_phone(&self.patient.phone)
            .ok_or_else(|| vec![FieldError::new("phone", "invalid phone number")])?;

        Ok(ValidIntake {
            first_name: self.patient.first_name.trim().to_string(),
            last_name: self.patient.last_name.trim().to_string(),
            phone,
            email: trimmed_opt(&self.patient.email).map(|e| e.to_lowercase()),
            birthday: self.patient.birthday,
            address: self.address.address.trim().to_string(),
            city: self.address.city.trim().to_string(),
            postal_code: self.address.postal_code.trim().to_string(),
            care_type: self.care.care_type.trim().to_string(),
            details: trimmed_opt(&self.care.details),
            urgency: self.care.urgency.unwrap_or(Urgency::Normal),
            preferred_date: self
                .availability
                .preferred_date
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc()),
            preferred_time,
        })
    }
}

/// Validate a single step of the form from its raw JSON payload.
pub fn validate_step(
    step: u8,
    payload: serde_json::Value,
    today: NaiveDate,
) -> Result<Vec<FieldError>, IntakeError> {
    let malformed = |e: serde_json::Error| IntakeError::Malformed(e.to_string());
    match step {
        1 => Ok(serde_json::from_value::<PatientStep>(payload).map_err(malformed)?.validate(today)),
        2 => Ok(serde_json::from_value::<AddressStep>(payload).map_err(malformed)?.validate()),
        3 => Ok(serde_json::from_value::<CareStep>(payload).map_err(malformed)?.validate()),
        4 => Ok(serde_json::from_value::<AvailabilityStep>(payload)
            .map_err(malformed)?
            .validate(today)),
        other => Err(IntakeError::UnknownStep(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    fn submission() -> IntakeSubmission {
        serde_json::from_value(json!({
            "patient": {
                "first_name": " Jeanne ",
                "last_name": "Martin",
                "phone": "06 12 34 56 78",
                "email": "Jeanne.Martin@Example.fr",
            },
            "address": { "address": "3 rue des Lilas", "city": "Lyon", "postal_code": "69003" },
            "care": { "care_type": "Pansement", "urgency": "high" },
            "availability": { "preferred_date": "2024-01-03", "preferred_time": "9h00" },
        }))
        .unwrap()
    }

    #[test]
    fn phone_normalisation() {
        assert_eq!(normalize_phone("06 12 34 56 78").as_deref(), Some("0612345678"));
        assert_eq!(normalize_phone("+33 6.12.34.56.78").as_deref(), Some("+33612345678"));
        assert_eq!(normalize_phone("06 12"), None);
        assert_eq!(normalize_phone("06-12-34-56-7a"), None);
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.fr"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.fr"));
        assert!(!is_valid_email("a b@c.fr"));
        assert!(!is_valid_email("a@@b.fr"));
    }

    #[test]
    fn valid_submission_is_normalised() {
        let v = submission().validate(today()).expect("valid");
        assert_eq!(v.first_name, "Jeanne");
        assert_eq!(v.phone, "0612345678");
        assert_eq!(v.email.as_deref(), Some("jeanne.martin@example.fr"));
        assert_eq!(v.urgency, Urgency::High);
        assert_eq!(v.preferred_time, Some(SlotTime::Hour(9)));
        assert_eq!(v.preferred_date.unwrap().date_naive(), NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn errors_from_every_step_are_collected() {
        let mut s = submission();
        s.patient.last_name = "  ".into();
        s.address.postal_code = "693".into();
        s.availability.preferred_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        s.availability.preferred_time = Some("23h00".into());

        let errors = s.validate(today()).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["last_name", "postal_code", "preferred_date", "preferred_time"]);
    }

    #[test]
    fn urgency_defaults_to_normal() {
        let mut s = submission();
        s.care.urgency = None;
        assert_eq!(s.validate(today()).unwrap().urgency, Urgency::Normal);
    }

    #[test]
    fn single_step_validation() {
        let errors = validate_step(2, json!({ "address": "", "city": "Lyon", "postal_code": "69003" }), today())
            .expect("known step");
        assert_eq!(errors, vec![FieldError::new("address", "required")]);

        assert!(validate_step(4, json!({}), today()).unwrap().is_empty());
        assert!(matches!(validate_step(9, json!({}), today()), Err(IntakeError::UnknownStep(9))));
        assert!(matches!(validate_step(1, json!({ "first_name": 3 }), today()), Err(IntakeError::Malformed(_))));
    }
}
