use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// ENTITY TYPES
// ==============================================================================

/// Entity collections held by the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Patients,
    Professionals,
    Appointments,
    ClinicalNotes,
    Payments,
    Attestations,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Patients,
        EntityType::Professionals,
        EntityType::Appointments,
        EntityType::ClinicalNotes,
        EntityType::Payments,
        EntityType::Attestations,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            EntityType::Patients => "patients",
            EntityType::Professionals => "professionals",
            EntityType::Appointments => "appointments",
            EntityType::ClinicalNotes => "clinical_notes",
            EntityType::Payments => "payments",
            EntityType::Attestations => "attestations",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|entity| entity.table_name() == s)
            .ok_or_else(|| format!("Unknown entity type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Professional,
}

impl Role {
    /// Collections whose change feed the role needs to follow.
    pub fn tracked_entities(&self) -> &'static [EntityType] {
        match self {
            Role::Admin => &EntityType::ALL,
            Role::Professional => &[EntityType::Appointments],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Professional => write!(f, "professional"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    // Anything other than an explicit "professional" is treated as admin.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "professional" => Ok(Role::Professional),
            "admin" | "" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// A typed row of one backing-store collection.
pub trait Record: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    const ENTITY: EntityType;

    fn id(&self) -> Uuid;

    /// Checks invariants serde cannot express.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

// ==============================================================================
// RECORDS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub consultation_value: f64,
    #[serde(default)]
    pub financial_note: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Patient {
    const ENTITY: EntityType = EntityType::Patients;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("patient {} has an empty name", self.id));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub crp: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Record for Professional {
    const ENTITY: EntityType = EntityType::Professionals;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Option<Uuid>,
    #[serde(rename = "start_time")]
    pub start: DateTime<Utc>,
    #[serde(rename = "end_time")]
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub room: String,
}

impl Appointment {
    /// Half-open interval overlap: touching appointments do not collide.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

impl Record for Appointment {
    const ENTITY: EntityType = EntityType::Appointments;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err(format!(
                "appointment {} ends ({}) before it starts ({})",
                self.id, self.end, self.start
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub note_date: DateTime<Utc>,
    #[serde(default)]
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for ClinicalNote {
    const ENTITY: EntityType = EntityType::ClinicalNotes;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Partial,
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Pix,
    Card,
    Cash,
    Transfer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Elo,
    Amex,
    Hipercard,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub amount: f64,
    pub payment_date: DateTime<Utc>,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    #[serde(default)]
    pub card_type: Option<CardType>,
    #[serde(default)]
    pub card_brand: Option<CardBrand>,
    #[serde(default = "default_installments")]
    pub card_installments: u32,
    #[serde(default)]
    pub card_authorization: Option<String>,
    #[serde(default)]
    pub card_fee: f64,
    #[serde(default)]
    pub note: String,
}

fn default_installments() -> u32 {
    1
}

impl Record for Payment {
    const ENTITY: EntityType = EntityType::Payments;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(format!("payment {} has an invalid amount {}", self.id, self.amount));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub doc_date: NaiveDate,
    #[serde(default)]
    pub days_off: Option<u32>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Attestation {
    const ENTITY: EntityType = EntityType::Attestations;

    fn id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!("attestation {} leave period ends before it starts", self.id));
            }
        }
        Ok(())
    }
}
