//! JWT claims, user roles and the capabilities each role grants.

use serde::{Deserialize, Serialize};

use crate::db::sqlite_text_enum;

/// Something an authenticated caller may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Fill out intake, manage family members and contact details.
    ManageOwnMembership,
    /// Open and cancel consultation requests.
    RequestConsultation,
    /// Work the clinician consultation queue.
    ReviewConsultations,
    /// Activate memberships and update kit shipping.
    ManageMemberships,
}

/// User role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Member using the patient portal.
    #[default]
    Patient,
    /// Clinical staff.
    Clinician,
    /// Operations staff.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Clinician => "clinician",
            Role::Admin => "admin",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Patient => &[
                Capability::ManageOwnMembership,
                Capability::RequestConsultation,
            ],
            Role::Clinician => &[Capability::ReviewConsultations],
            Role::Admin => &[
                Capability::ReviewConsultations,
                Capability::ManageMemberships,
            ],
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Landing page after login for staff roles.
    ///
    /// Patients have no fixed landing page; they are routed by onboarding
    /// progress instead.
    pub fn staff_landing(&self) -> Option<&'static str> {
        if self.has(Capability::ManageMemberships) {
            Some("/admin")
        } else if self.has(Capability::ReviewConsultations) {
            Some("/clinician")
        } else {
            None
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "clinician" => Ok(Role::Clinician),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

sqlite_text_enum!(Role);

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,

    /// User's email.
    #[serde(default)]
    pub email: Option<String>,

    /// User's name.
    #[serde(default)]
    pub name: Option<String>,

    /// User's role.
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Get the effective role for the user.
    ///
    /// A missing or unknown role claim reads as `Patient`.
    pub fn effective_role(&self) -> Role {
        self.role
            .as_deref()
            .and_then(|role| role.parse().ok())
            .unwrap_or_default()
    }

    /// Get the display name for the user.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: Option<&str>) -> Claims {
        Claims {
            sub: "usr_1".to_string(),
            iss: None,
            exp: 0,
            iat: None,
            email: Some("ada@example.com".to_string()),
            name: None,
            role: role.map(str::to_string),
        }
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("patient".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!("Clinician".parse::<Role>().unwrap(), Role::Clinician);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("user".parse::<Role>().is_err());
    }

    #[test]
    fn test_capability_sets() {
        assert!(Role::Patient.has(Capability::ManageOwnMembership));
        assert!(Role::Patient.has(Capability::RequestConsultation));
        assert!(!Role::Patient.has(Capability::ReviewConsultations));

        assert!(Role::Clinician.has(Capability::ReviewConsultations));
        assert!(!Role::Clinician.has(Capability::ManageMemberships));
        assert!(!Role::Clinician.has(Capability::ManageOwnMembership));

        assert!(Role::Admin.has(Capability::ManageMemberships));
        assert!(Role::Admin.has(Capability::ReviewConsultations));
        assert!(!Role::Admin.has(Capability::RequestConsultation));
    }

    #[test]
    fn test_staff_landing() {
        assert_eq!(Role::Patient.staff_landing(), None);
        assert_eq!(Role::Clinician.staff_landing(), Some("/clinician"));
        assert_eq!(Role::Admin.staff_landing(), Some("/admin"));
    }

    #[test]
    fn test_claims_effective_role() {
        assert_eq!(claims(None).effective_role(), Role::Patient);
        assert_eq!(claims(Some("clinician")).effective_role(), Role::Clinician);
        assert_eq!(claims(Some("superuser")).effective_role(), Role::Patient);
    }

    #[test]
    fn test_claims_display_name() {
        let mut c = claims(None);
        assert_eq!(c.display_name(), "ada@example.com");
        c.name = Some("Ada".to_string());
        assert_eq!(c.display_name(), "Ada");
        c.name = None;
        c.email = None;
        assert_eq!(c.display_name(), "usr_1");
    }
}
