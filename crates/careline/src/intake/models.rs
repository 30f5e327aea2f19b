//! Intake form payloads and stored intake records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::sqlite_text_enum;
use crate::error::{CareError, CareResult};
use crate::membership::{EmergencyContact, Person, VitalsKitStatus};
use crate::validate;

pub const MAX_EMERGENCY_CONTACTS: usize = 5;
pub const MAX_HISTORY_ENTRIES: usize = 50;
pub const MAX_HISTORY_ENTRY_LEN: usize = 200;
pub const MAX_NOTES_LEN: usize = 2000;

/// Sex recorded at baseline intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
    Intersex,
    Other,
    Undisclosed,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Female => "female",
            Sex::Male => "male",
            Sex::Intersex => "intersex",
            Sex::Other => "other",
            Sex::Undisclosed => "undisclosed",
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            "intersex" => Ok(Sex::Intersex),
            "other" => Ok(Sex::Other),
            "undisclosed" => Ok(Sex::Undisclosed),
            _ => Err(format!("Invalid sex: {}", s)),
        }
    }
}

sqlite_text_enum!(Sex);

/// Baseline intake submission for the primary member.
#[derive(Debug, Clone, Deserialize)]
pub struct BaselineForm {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub sex: Sex,
    pub phone: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

impl BaselineForm {
    /// Checked and normalised copy of the form.
    pub fn validated(&self) -> CareResult<Self> {
        validate::optional_range("height_cm", self.height_cm, 30.0, 272.0)?;
        validate::optional_range("weight_kg", self.weight_kg, 1.0, 650.0)?;
        Ok(Self {
            first_name: validate::name("first_name", &self.first_name)?,
            last_name: validate::name("last_name", &self.last_name)?,
            date_of_birth: validate::date_of_birth(&self.date_of_birth)?,
            sex: self.sex,
            phone: validate::phone(&self.phone)?,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyContactInput {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Emergency contacts submission.
#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyContactsForm {
    pub contacts: Vec<EmergencyContactInput>,
}

impl EmergencyContactsForm {
    pub fn validated(&self) -> CareResult<Self> {
        if self.contacts.is_empty() {
            return Err(CareError::validation("at least one emergency contact is required"));
        }
        if self.contacts.len() > MAX_EMERGENCY_CONTACTS {
            return Err(CareError::validation(format!(
                "at most {MAX_EMERGENCY_CONTACTS} emergency contacts are accepted"
            )));
        }

        let contacts = self
            .contacts
            .iter()
            .map(|c| -> CareResult<EmergencyContactInput> {
                Ok(EmergencyContactInput {
                    name: validate::name("contact name", &c.name)?,
                    relationship: validate::text("contact relationship", &c.relationship, 50)?
                        .to_lowercase(),
                    phone: validate::phone(&c.phone)?,
                    email: c
                        .email
                        .as_deref()
                        .map(str::trim)
                        .filter(|e| !e.is_empty())
                        .map(validate::email)
                        .transpose()?,
                })
            })
            .collect::<CareResult<Vec<_>>>()?;

        Ok(Self { contacts })
    }
}

/// Medical history submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicalHistoryForm {
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub surgeries: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MedicalHistoryForm {
    pub fn validated(&self) -> CareResult<Self> {
        let list = |field: &str, values: &[String]| {
            validate::entries(field, values, MAX_HISTORY_ENTRIES, MAX_HISTORY_ENTRY_LEN)
        };
        Ok(Self {
            conditions: list("conditions", &self.conditions)?,
            medications: list("medications", &self.medications)?,
            allergies: list("allergies", &self.allergies)?,
            surgeries: list("surgeries", &self.surgeries)?,
            notes: validate::optional_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?,
        })
    }
}

/// Vitals kit shipping request.
#[derive(Debug, Clone, Deserialize)]
pub struct VitalsKitForm {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    #[serde(default)]
    pub consent: bool,
}

impl VitalsKitForm {
    pub fn validated(&self) -> CareResult<Self> {
        if !self.consent {
            return Err(CareError::validation(
                "consent is required to ship a vitals kit",
            ));
        }
        Ok(Self {
            address_line1: validate::text("address_line1", &self.address_line1, 200)?,
            address_line2: validate::optional_text(
                "address_line2",
                self.address_line2.as_deref(),
                200,
            )?,
            city: validate::text("city", &self.city, 100)?,
            region: validate::text("region", &self.region, 100)?,
            postal_code: validate::postal_code(&self.postal_code)?,
            consent: true,
        })
    }
}

/// Stored baseline intake.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BaselineIntake {
    pub person_id: String,
    pub sex: Sex,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub phone: String,
    pub submitted_at: String,
}

/// Stored medical history row; list columns hold JSON arrays.
#[derive(Debug, Clone, FromRow)]
pub struct MedicalHistoryRow {
    pub person_id: String,
    pub conditions: String,
    pub medications: String,
    pub allergies: String,
    pub surgeries: String,
    pub notes: Option<String>,
    pub submitted_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MedicalHistory {
    pub person_id: String,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    pub surgeries: Vec<String>,
    pub notes: Option<String>,
    pub submitted_at: String,
}

impl TryFrom<MedicalHistoryRow> for MedicalHistory {
    type Error = CareError;

    fn try_from(row: MedicalHistoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            person_id: row.person_id,
            conditions: serde_json::from_str(&row.conditions)?,
            medications: serde_json::from_str(&row.medications)?,
            allergies: serde_json::from_str(&row.allergies)?,
            surgeries: serde_json::from_str(&row.surgeries)?,
            notes: row.notes,
            submitted_at: row.submitted_at,
        })
    }
}

/// Stored vitals kit request.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VitalsKitRequest {
    pub membership_id: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub consented_at: String,
}

/// What a stage's form page is pre-filled with.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum IntakeForm {
    Baseline {
        person: Person,
        baseline: Option<BaselineIntake>,
    },
    EmergencyContacts {
        contacts: Vec<EmergencyContact>,
        max_contacts: usize,
    },
    MedicalHistory {
        history: Option<MedicalHistory>,
    },
    VitalsKit {
        request: Option<VitalsKitRequest>,
        kit_status: VitalsKitStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BaselineForm {
        BaselineForm {
            first_name: " Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            date_of_birth: "1985-12-10".to_string(),
            sex: Sex::Female,
            phone: "(555) 123-4567".to_string(),
            height_cm: Some(168.0),
            weight_kg: None,
        }
    }

    #[test]
    fn test_baseline_is_normalised() {
        let form = baseline().validated().unwrap();
        assert_eq!(form.first_name, "Ada");
        assert_eq!(form.phone, "5551234567");
    }

    #[test]
    fn test_baseline_rejects_out_of_range_measurements() {
        let mut form = baseline();
        form.height_cm = Some(300.0);
        assert!(matches!(form.validated(), Err(CareError::Validation(_))));

        let mut form = baseline();
        form.weight_kg = Some(0.5);
        assert!(form.validated().is_err());
    }

    #[test]
    fn test_sex_parsing() {
        let sex: Sex = serde_json::from_str("\"undisclosed\"").unwrap();
        assert_eq!(sex, Sex::Undisclosed);
        assert!(serde_json::from_str::<Sex>("\"unknown\"").is_err());
    }

    #[test]
    fn test_emergency_contact_bounds() {
        let contact = |name: &str| EmergencyContactInput {
            name: name.to_string(),
            relationship: "Sister".to_string(),
            phone: "555-123-4567".to_string(),
            email: Some("  ".to_string()),
        };

        let form = EmergencyContactsForm {
            contacts: vec![contact("Grace")],
        }
        .validated()
        .unwrap();
        assert_eq!(form.contacts[0].relationship, "sister");
        assert_eq!(form.contacts[0].phone, "5551234567");
        assert_eq!(form.contacts[0].email, None);

        assert!(
            EmergencyContactsForm { contacts: vec![] }
                .validated()
                .is_err()
        );
        let six = (0..6).map(|i| contact(&format!("C{i}"))).collect();
        assert!(EmergencyContactsForm { contacts: six }.validated().is_err());
    }

    #[test]
    fn test_medical_history_limits() {
        let form = MedicalHistoryForm {
            conditions: vec!["asthma".to_string()],
            notes: Some("x".repeat(MAX_NOTES_LEN + 1)),
            ..Default::default()
        };
        assert!(form.validated().is_err());

        let form = MedicalHistoryForm {
            allergies: vec!["penicillin".to_string(), "".to_string()],
            ..Default::default()
        };
        assert_eq!(form.validated().unwrap().allergies, vec!["penicillin"]);
    }

    #[test]
    fn test_vitals_kit_requires_consent() {
        let form = VitalsKitForm {
            address_line1: "1 Main St".to_string(),
            address_line2: None,
            city: "Springfield".to_string(),
            region: "IL".to_string(),
            postal_code: "62701".to_string(),
            consent: false,
        };
        assert!(form.validated().is_err());

        let consented = VitalsKitForm {
            consent: true,
            ..form
        };
        assert!(consented.validated().is_ok());
    }

    #[test]
    fn test_medical_history_row_decoding() {
        let row = MedicalHistoryRow {
            person_id: "per_1".to_string(),
            conditions: r#"["asthma"]"#.to_string(),
            medications: "[]".to_string(),
            allergies: "[]".to_string(),
            surgeries: "[]".to_string(),
            notes: None,
            submitted_at: String::new(),
        };
        let history = MedicalHistory::try_from(row.clone()).unwrap();
        assert_eq!(history.conditions, vec!["asthma"]);

        let broken = MedicalHistoryRow {
            conditions: "not json".to_string(),
            ..row
        };
        assert!(MedicalHistory::try_from(broken).is_err());
    }
}
