//! Record builders shared by the unit tests.
#![cfg(test)]

use chrono::{DateTime, Utc};
use gut_tracker_client::{BowelMovementRecord, MealRecord, MedicationRecord, SymptomRecord};

pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("rfc3339 timestamp")
}

pub fn bowel(at: &str, bristol: u8) -> BowelMovementRecord {
    BowelMovementRecord {
        id: None,
        recorded_at: ts(at),
        bristol_type: bristol,
        pain: 2,
        strain: 2,
        satisfaction: 7,
    }
}

pub fn meal(at: &str, calories: u32, fiber_rich: bool) -> MealRecord {
    MealRecord {
        id: None,
        meal_time: ts(at),
        name: None,
        category: None,
        calories,
        fiber_rich,
        dairy: false,
        gluten: false,
        spicy_level: None,
        cuisine: None,
    }
}

pub fn symptom(at: &str, severity: u8) -> SymptomRecord {
    SymptomRecord {
        id: None,
        recorded_at: ts(at),
        severity,
        category: None,
        symptom_type: None,
        triggers: Vec::new(),
    }
}

pub fn medication(name: &str, start: Option<&str>, active: bool) -> MedicationRecord {
    MedicationRecord {
        id: None,
        name: name.to_string(),
        category: None,
        start_date: start.map(ts),
        end_date: None,
        is_active: active,
    }
}
