//! Medicine models: dosing regimens and saved drug details.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// An active dosing regimen tracked for a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub name: String,
    /// Date the prescription was issued
    pub consulting_date: NaiveDate,
    /// Length of the course in days (>= 1)
    pub dosage_period: u32,
    /// Number of units taken per dose
    pub num_medicines: u32,
    /// Hours between doses (>= 1)
    pub interval: u32,
    /// Wall-clock times a reminder fires, de-duplicated
    #[serde(with = "hhmm")]
    pub times: Vec<NaiveTime>,
    pub created_at: DateTime<Utc>,
}

impl Medicine {
    /// Instant the course ends: consulting date at midnight UTC plus the dosage period.
    ///
    /// None when that instant is past the representable date range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let start = self.consulting_date.and_time(NaiveTime::MIN).and_utc();
        start.checked_add_signed(Duration::days(i64::from(self.dosage_period)))
    }

    /// A medicine stays current while its expiry instant is strictly in the future.
    /// An unrepresentable expiry never passes.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |expires_at| expires_at > now)
    }

    /// Reminder times formatted as `HH:MM`.
    pub fn time_labels(&self) -> Vec<String> {
        self.times.iter().map(|t| format_time_of_day(*t)).collect()
    }
}

/// The reminder-relevant slice of one user document.
#[derive(Debug, Clone, PartialEq)]
pub struct MedicineSchedule {
    pub user_id: String,
    pub notification_token: Option<String>,
    pub medicines: Vec<Medicine>,
}

/// Free-form drug information a user bookmarked from a lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MedicineDetails {
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub purpose: Option<String>,
    pub active_ingredient: Option<String>,
    pub dosage_and_administration: Option<String>,
    pub image_url: Option<String>,
    pub do_not_use: Option<String>,
    pub when_using: Option<String>,
    pub indications_and_usage: Option<String>,
}

impl MedicineDetails {
    /// Details need at least one name to be worth keeping.
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.brand_name) && blank(&self.generic_name)
    }
}

/// An entry in a user's saved medicines history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SavedMedicine {
    /// Copy of a regimen added through the lifecycle manager
    Regimen(Medicine),
    /// Bookmarked drug details
    Details(MedicineDetails),
}

impl SavedMedicine {
    /// Regimen name, used for deletion by name.
    pub fn regimen_name(&self) -> Option<&str> {
        match self {
            SavedMedicine::Regimen(m) => Some(&m.name),
            SavedMedicine::Details(_) => None,
        }
    }
}

/// A count that arrives either as a number or as text like "7 days".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DoseQuantity {
    Whole(i64),
    Text(String),
}

impl DoseQuantity {
    /// Numeric value, or None when nothing usable is present.
    pub fn value(&self) -> Option<u32> {
        match self {
            DoseQuantity::Whole(n) => u32::try_from(*n).ok(),
            DoseQuantity::Text(s) => parse_leading_number(s),
        }
    }
}

impl From<u32> for DoseQuantity {
    fn from(n: u32) -> Self {
        DoseQuantity::Whole(i64::from(n))
    }
}

impl From<&str> for DoseQuantity {
    fn from(s: &str) -> Self {
        DoseQuantity::Text(s.to_string())
    }
}

impl From<String> for DoseQuantity {
    fn from(s: String) -> Self {
        DoseQuantity::Text(s)
    }
}

/// Raw medicine input as submitted by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMedicine {
    pub name: String,
    /// `YYYY-MM-DD`
    pub consulting_date: String,
    pub dosage_period: DoseQuantity,
    pub num_medicines: DoseQuantity,
    pub interval: DoseQuantity,
    /// `HH:MM` entries
    pub times: Vec<String>,
}

/// Extract the first run of ASCII digits from text ("7 days" -> 7).
pub fn parse_leading_number(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Parse `HH:MM`, tolerating a seconds component.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

pub fn format_time_of_day(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Serde adapter storing times of day as `HH:MM` strings.
mod hhmm {
    use chrono::NaiveTime;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(times.iter().map(|t| super::format_time_of_day(*t)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveTime>, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        raw.iter()
            .map(|s| {
                super::parse_time_of_day(s)
                    .ok_or_else(|| D::Error::custom(format!("invalid time of day: {}", s)))
            })
            .collect()
    }
}
