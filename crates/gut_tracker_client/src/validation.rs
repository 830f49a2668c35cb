//! Validity checks shared by every record and enum.

use thiserror::Error;

use crate::{
    BowelMovementRecord, MealCategory, MealRecord, MedicationCategory, MedicationRecord,
    SymptomCategory, SymptomRecord, SymptomType,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {0}")]
    Invalid(&'static str),
}

/// Implemented by anything that can say whether its current value is usable.
pub trait Validate {
    /// Short name used in error messages and logs.
    const KIND: &'static str;

    fn is_valid(&self) -> bool;
}

pub fn ensure_valid<T: Validate>(value: &T) -> Result<(), ValidationError> {
    if value.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(T::KIND))
    }
}

/// Keep only valid values, returning them with the number that were dropped.
pub fn retain_valid<T: Validate>(values: Vec<T>) -> (Vec<T>, usize) {
    let before = values.len();
    let kept: Vec<T> = values.into_iter().filter(|v| v.is_valid()).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

impl<T: Validate> Validate for Option<T> {
    const KIND: &'static str = T::KIND;

    fn is_valid(&self) -> bool {
        self.as_ref().is_none_or(|v| v.is_valid())
    }
}

impl Validate for SymptomCategory {
    const KIND: &'static str = "symptom category";

    fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Validate for SymptomType {
    const KIND: &'static str = "symptom type";

    fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Validate for MedicationCategory {
    const KIND: &'static str = "medication category";

    fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Validate for MealCategory {
    const KIND: &'static str = "meal category";

    fn is_valid(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

fn in_scale(v: u8) -> bool {
    (1..=10).contains(&v)
}

impl Validate for BowelMovementRecord {
    const KIND: &'static str = "bowel movement";

    fn is_valid(&self) -> bool {
        (1..=7).contains(&self.bristol_type)
            && in_scale(self.pain)
            && in_scale(self.strain)
            && in_scale(self.satisfaction)
    }
}

impl Validate for MealRecord {
    const KIND: &'static str = "meal";

    fn is_valid(&self) -> bool {
        self.spicy_level.is_none_or(|s| s <= 10) && self.category.is_valid()
    }
}

impl Validate for SymptomRecord {
    const KIND: &'static str = "symptom";

    fn is_valid(&self) -> bool {
        in_scale(self.severity) && self.category.is_valid() && self.symptom_type.is_valid()
    }
}

impl Validate for MedicationRecord {
    const KIND: &'static str = "medication";

    fn is_valid(&self) -> bool {
        let ordered = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        };
        ordered && self.category.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn bowel(bristol: u8, pain: u8) -> BowelMovementRecord {
        BowelMovementRecord {
            id: None,
            recorded_at: ts("2025-01-01T08:00:00Z"),
            bristol_type: bristol,
            pain,
            strain: 1,
            satisfaction: 5,
        }
    }

    #[test]
    fn enums_reject_unknown() {
        assert!(SymptomType::Gas.is_valid());
        assert!(!SymptomType::Unknown.is_valid());
        assert_eq!(
            ensure_valid(&MedicationCategory::Unknown),
            Err(ValidationError::Invalid("medication category"))
        );
        assert!(ensure_valid(&MealCategory::Snack).is_ok());
    }

    #[test]
    fn bowel_ranges() {
        assert!(bowel(4, 1).is_valid());
        assert!(!bowel(0, 1).is_valid());
        assert!(!bowel(8, 1).is_valid());
        assert!(!bowel(4, 11).is_valid());
    }

    #[test]
    fn medication_end_before_start_is_invalid() {
        let med = MedicationRecord {
            id: None,
            name: "x".into(),
            category: None,
            start_date: Some(ts("2025-02-01T00:00:00Z")),
            end_date: Some(ts("2025-01-01T00:00:00Z")),
            is_active: false,
        };
        assert!(!med.is_valid());
    }

    #[test]
    fn retain_valid_counts_drops() {
        let (kept, dropped) = retain_valid(vec![bowel(4, 2), bowel(9, 2), bowel(3, 0)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 2);
    }

    #[test]
    fn symptom_with_unknown_type_is_invalid() {
        let s = SymptomRecord {
            id: None,
            recorded_at: ts("2025-01-01T08:00:00Z"),
            severity: 3,
            category: Some(SymptomCategory::Digestive),
            symptom_type: Some(SymptomType::Unknown),
            triggers: vec![],
        };
        assert!(!s.is_valid());
        let ok = SymptomRecord {
            symptom_type: None,
            ..s
        };
        assert!(ok.is_valid());
    }
}
