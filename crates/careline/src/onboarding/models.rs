//! Onboarding data models.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Membership onboarding step.
///
/// Steps are totally ordered and only ever move forward:
/// 1. Started - membership row created
/// 2. PendingBaseline - membership activated, waiting for baseline intake
/// 3. BaselineComplete
/// 4. EmergencyContactsComplete
/// 5. MedicalHistoryComplete
/// 6. OnboardingComplete - terminal
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    #[default]
    Started,
    PendingBaseline,
    BaselineComplete,
    EmergencyContactsComplete,
    MedicalHistoryComplete,
    OnboardingComplete,
}

impl OnboardingStep {
    pub const ALL: [OnboardingStep; 6] = [
        OnboardingStep::Started,
        OnboardingStep::PendingBaseline,
        OnboardingStep::BaselineComplete,
        OnboardingStep::EmergencyContactsComplete,
        OnboardingStep::MedicalHistoryComplete,
        OnboardingStep::OnboardingComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OnboardingStep::Started => "started",
            OnboardingStep::PendingBaseline => "pending_baseline",
            OnboardingStep::BaselineComplete => "baseline_complete",
            OnboardingStep::EmergencyContactsComplete => "emergency_contacts_complete",
            OnboardingStep::MedicalHistoryComplete => "medical_history_complete",
            OnboardingStep::OnboardingComplete => "onboarding_complete",
        }
    }

    /// Interpret the raw `onboarding_step` column.
    ///
    /// A null column or a value outside the step set reads as `Started`, so
    /// the member is sent back to the first intake stage.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            None => OnboardingStep::Started,
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!(stored = value, "unrecognised onboarding step, treating as started");
                OnboardingStep::Started
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, OnboardingStep::OnboardingComplete)
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OnboardingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OnboardingStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| format!("Invalid onboarding step: {}", s))
    }
}

/// An intake form the member fills out during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntakeStage {
    Baseline,
    EmergencyContacts,
    MedicalHistory,
    VitalsKit,
}

impl IntakeStage {
    pub const ALL: [IntakeStage; 4] = [
        IntakeStage::Baseline,
        IntakeStage::EmergencyContacts,
        IntakeStage::MedicalHistory,
        IntakeStage::VitalsKit,
    ];

    /// URL slug under `/intake/`.
    pub fn slug(&self) -> &'static str {
        match self {
            IntakeStage::Baseline => "baseline",
            IntakeStage::EmergencyContacts => "emergency-contacts",
            IntakeStage::MedicalHistory => "medical-history",
            IntakeStage::VitalsKit => "vitals-kit",
        }
    }

    /// Step recorded once this stage is submitted.
    pub fn completes(&self) -> OnboardingStep {
        match self {
            IntakeStage::Baseline => OnboardingStep::BaselineComplete,
            IntakeStage::EmergencyContacts => OnboardingStep::EmergencyContactsComplete,
            IntakeStage::MedicalHistory => OnboardingStep::MedicalHistoryComplete,
            IntakeStage::VitalsKit => OnboardingStep::OnboardingComplete,
        }
    }

    /// The form page for this stage.
    pub fn destination(&self) -> Destination {
        match self {
            IntakeStage::Baseline => Destination::BaselineIntake,
            IntakeStage::EmergencyContacts => Destination::EmergencyContacts,
            IntakeStage::MedicalHistory => Destination::MedicalHistory,
            IntakeStage::VitalsKit => Destination::VitalsKit,
        }
    }
}

impl std::fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl std::str::FromStr for IntakeStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntakeStage::ALL
            .into_iter()
            .find(|stage| stage.slug() == s)
            .ok_or_else(|| format!("Invalid intake stage: {}", s))
    }
}

/// Page a member is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    RequestReview,
    BaselineIntake,
    EmergencyContacts,
    MedicalHistory,
    VitalsKit,
    Dashboard,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Destination::RequestReview => "/request-review",
            Destination::BaselineIntake => "/intake/baseline",
            Destination::EmergencyContacts => "/intake/emergency-contacts",
            Destination::MedicalHistory => "/intake/medical-history",
            Destination::VitalsKit => "/intake/vitals-kit",
            Destination::Dashboard => "/dashboard",
        }
    }

    /// The intake stage served at this destination, if any.
    pub fn stage(&self) -> Option<IntakeStage> {
        match self {
            Destination::BaselineIntake => Some(IntakeStage::Baseline),
            Destination::EmergencyContacts => Some(IntakeStage::EmergencyContacts),
            Destination::MedicalHistory => Some(IntakeStage::MedicalHistory),
            Destination::VitalsKit => Some(IntakeStage::VitalsKit),
            Destination::RequestReview | Destination::Dashboard => None,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Where a member stands in onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<OnboardingStep>,
    pub destination: Destination,
    pub path: &'static str,
    pub needs_onboarding: bool,
}

/// Result of a successful stage submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub step: OnboardingStep,
    pub destination: Destination,
    pub path: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_string_round_trip() {
        for step in OnboardingStep::ALL {
            assert_eq!(step.as_str().parse::<OnboardingStep>().unwrap(), step);
        }
        assert!("Started".parse::<OnboardingStep>().is_err());
    }

    #[test]
    fn test_step_order_follows_sequence() {
        let mut sorted = OnboardingStep::ALL;
        sorted.sort();
        assert_eq!(sorted, OnboardingStep::ALL);
        assert!(OnboardingStep::Started < OnboardingStep::OnboardingComplete);
    }

    #[test]
    fn test_from_stored_is_lenient() {
        assert_eq!(OnboardingStep::from_stored(None), OnboardingStep::Started);
        assert_eq!(
            OnboardingStep::from_stored(Some("intake_v1_done")),
            OnboardingStep::Started
        );
        assert_eq!(
            OnboardingStep::from_stored(Some("medical_history_complete")),
            OnboardingStep::MedicalHistoryComplete
        );
    }

    #[test]
    fn test_stage_destination_round_trip() {
        for stage in IntakeStage::ALL {
            assert_eq!(stage.destination().stage(), Some(stage));
            assert_eq!(stage.slug().parse::<IntakeStage>().unwrap(), stage);
            assert!(stage.destination().path().ends_with(stage.slug()));
        }
        assert_eq!(Destination::Dashboard.stage(), None);
        assert_eq!(Destination::RequestReview.stage(), None);
    }

    #[test]
    fn test_serde_forms() {
        assert_eq!(
            serde_json::to_string(&OnboardingStep::EmergencyContactsComplete).unwrap(),
            "\"emergency_contacts_complete\""
        );
        assert_eq!(
            serde_json::to_string(&IntakeStage::VitalsKit).unwrap(),
            "\"vitals-kit\""
        );
        assert_eq!(
            serde_json::to_string(&Destination::RequestReview).unwrap(),
            "\"request_review\""
        );
    }
}
