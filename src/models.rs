use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    // Older task files and configs call the middle level "Normal".
    #[default]
    #[serde(alias = "medium", alias = "Normal", alias = "normal")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority `{0}` (expected low, medium or high)")]
pub struct ParsePriorityError(String);

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "normal" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParsePriorityError(value.to_string())),
        }
    }
}

/// One to-do item as it is persisted in `tasks.json`.
///
/// Fields are private so that `completed_at` can only be present while
/// `completed` is true; use [`TaskRecord::complete`] / [`TaskRecord::uncomplete`]
/// to flip the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskRecord {
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default = "Utc::now", with = "iso8601")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "iso8601::option")]
    completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(text: &str, priority: Priority, category: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            completed: false,
            priority,
            category: category_or_default(category),
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority == Priority::High
    }

    /// Marks the task done. The completion stamp is only taken on the
    /// false -> true transition, so repeated calls keep the first stamp.
    pub fn complete(&mut self) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn uncomplete(&mut self) {
        self.completed = false;
        self.completed_at = None;
    }

    pub(crate) fn apply_edit(&mut self, text: &str, priority: Priority, category: &str) {
        self.text = text.trim().to_string();
        self.priority = priority;
        self.category = category_or_default(category);
    }

    /// Repairs records decoded from disk: a blank category becomes the default
    /// and the completion stamp is brought in line with `completed`.
    pub fn normalize(&mut self) {
        if self.category.trim().is_empty() {
            self.category = DEFAULT_CATEGORY.to_string();
        }
        match (self.completed, self.completed_at) {
            (true, None) => self.completed_at = Some(self.created_at),
            (false, Some(_)) => self.completed_at = None,
            _ => {}
        }
    }
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn category_or_default(category: &str) -> String {
    let category = category.trim();
    if category.is_empty() {
        default_category()
    } else {
        category.to_string()
    }
}

/// In-memory identity of a record held by a `TaskStore`. Never persisted and
/// never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub record: TaskRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statistics {
    pub total: usize,
    pub completed: usize,
    pub incomplete: usize,
    /// Always lists every priority, lowest first, including zero counts.
    pub by_priority: Vec<(Priority, usize)>,
    /// Distinct categories in order of first occurrence.
    pub by_category: Vec<(String, usize)>,
}

impl Statistics {
    pub fn collect<'a>(records: impl IntoIterator<Item = &'a TaskRecord>) -> Self {
        let mut stats = Statistics {
            by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
            ..Statistics::default()
        };
        for record in records {
            stats.total += 1;
            if record.completed() {
                stats.completed += 1;
            } else {
                stats.incomplete += 1;
            }
            if let Some(slot) = stats
                .by_priority
                .iter_mut()
                .find(|(priority, _)| *priority == record.priority())
            {
                slot.1 += 1;
            }
            match stats
                .by_category
                .iter_mut()
                .find(|(category, _)| category == record.category())
            {
                Some(slot) => slot.1 += 1,
                None => stats.by_category.push((record.category().to_string(), 1)),
            }
        }
        stats
    }

    pub fn priority_count(&self, priority: Priority) -> usize {
        self.by_priority
            .iter()
            .find(|(p, _)| *p == priority)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn category_count(&self, category: &str) -> usize {
        self.by_category
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Serde glue for ISO-8601 timestamps. Writes RFC 3339 in UTC; reads RFC 3339
/// with any offset, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` taken as local time.
pub(crate) mod iso8601 {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        let naive: NaiveDateTime = raw
            .parse()
            .map_err(|err| format!("invalid timestamp `{raw}`: {err}"))?;
        Ok(Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDate, TimeZone};

    fn record(text: &str, priority: Priority, category: &str) -> TaskRecord {
        TaskRecord::new(text, priority, category)
    }

    #[test]
    fn new_record_trims_text_and_defaults_blank_category() {
        let task = record("  Buy milk  ", Priority::High, "   ");
        assert_eq!(task.text(), "Buy milk");
        assert_eq!(task.category(), "General");
        assert!(!task.completed());
        assert_eq!(task.completed_at(), None);
        assert!(task.is_high_priority());
    }

    #[test]
    fn complete_stamps_once_and_uncomplete_clears() {
        let mut task = record("write report", Priority::Medium, "Work");

        task.complete();
        assert!(task.completed());
        let first = task.completed_at().expect("stamped on completion");

        // Completing again keeps the original stamp.
        task.complete();
        assert_eq!(task.completed_at(), Some(first));

        task.uncomplete();
        assert!(!task.completed());
        assert_eq!(task.completed_at(), None);

        task.uncomplete();
        assert!(!task.completed());
        assert_eq!(task.completed_at(), None);
    }

    #[test]
    fn priority_parses_names_and_legacy_alias() {
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert_eq!("Normal".parse::<Priority>().unwrap(), Priority::Medium);
        assert_eq!(" HIGH ".parse::<Priority>().unwrap(), Priority::High);
        let err = "urgent".parse::<Priority>().unwrap_err();
        assert!(err.to_string().contains("urgent"));
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn record_serde_applies_defaults_for_missing_fields() {
        let json = r#"{ "text": "call mom" }"#;
        let task: TaskRecord = serde_json::from_str(json).expect("record should deserialize");
        assert_eq!(task.text(), "call mom");
        assert!(!task.completed());
        assert_eq!(task.priority(), Priority::Medium);
        assert_eq!(task.category(), "General");
        assert_eq!(task.completed_at(), None);
    }

    #[test]
    fn record_without_text_is_rejected() {
        let json = r#"{ "completed": true }"#;
        assert!(serde_json::from_str::<TaskRecord>(json).is_err());
    }

    #[test]
    fn record_serialization_emits_full_field_set() {
        let value = serde_json::json!({
            "text": "Buy milk",
            "completed": true,
            "priority": "High",
            "category": "Errands",
            "created_at": "2026-10-16T09:30:00Z",
            "completed_at": "2026-10-16T10:00:00.250Z"
        });
        let task: TaskRecord = serde_json::from_value(value.clone()).expect("deserialize");
        let back = serde_json::to_value(&task).expect("serialize");
        assert_eq!(back, value);

        let mut open = task.clone();
        open.uncomplete();
        let back = serde_json::to_value(&open).expect("serialize");
        assert_eq!(back["completed"], serde_json::json!(false));
        assert_eq!(back["completed_at"], serde_json::Value::Null);
    }

    #[test]
    fn legacy_priority_and_naive_timestamps_decode() {
        let json = r#"
        {
          "text": "old task",
          "completed": false,
          "priority": "Normal",
          "created_at": "2024-01-02T12:00:00.123456",
          "completed_at": null
        }
        "#;
        let task: TaskRecord = serde_json::from_str(json).expect("legacy record");
        assert_eq!(task.priority(), Priority::Medium);

        let expected = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_micro_opt(12, 0, 0, 123_456)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(task.created_at(), expected);
    }

    #[test]
    fn offset_timestamps_are_converted_to_utc() {
        let parsed = iso8601::parse("2026-10-16T11:30:00+02:00").expect("rfc3339");
        assert_eq!(iso8601::format(&parsed), "2026-10-16T09:30:00Z");
        assert!(iso8601::parse("yesterday").is_err());
    }

    #[test]
    fn normalize_restores_completion_invariant() {
        let json = r#"
        {
          "text": "done but unstamped",
          "completed": true,
          "category": "",
          "created_at": "2026-01-01T00:00:00Z",
          "completed_at": null
        }
        "#;
        let mut task: TaskRecord = serde_json::from_str(json).unwrap();
        task.normalize();
        assert_eq!(task.completed_at(), Some(task.created_at()));
        assert_eq!(task.category(), "General");

        let json = r#"
        {
          "text": "open but stamped",
          "completed": false,
          "created_at": "2026-01-01T00:00:00Z",
          "completed_at": "2026-01-02T00:00:00Z"
        }
        "#;
        let mut task: TaskRecord = serde_json::from_str(json).unwrap();
        task.normalize();
        assert_eq!(task.completed_at(), None);
    }

    #[test]
    fn statistics_count_priorities_and_categories_in_first_seen_order() {
        let mut done = record("a", Priority::High, "Work");
        done.complete();
        let records = vec![
            done,
            record("b", Priority::Low, "Home"),
            record("c", Priority::High, "Work"),
            record("d", Priority::Medium, ""),
        ];

        let stats = Statistics::collect(&records);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.incomplete, 3);
        assert_eq!(stats.total, stats.completed + stats.incomplete);
        assert_eq!(
            stats.by_priority,
            vec![
                (Priority::Low, 1),
                (Priority::Medium, 1),
                (Priority::High, 2)
            ]
        );
        assert_eq!(
            stats.by_category,
            vec![
                ("Work".to_string(), 2),
                ("Home".to_string(), 1),
                ("General".to_string(), 1)
            ]
        );
        assert_eq!(stats.priority_count(Priority::High), 2);
        assert_eq!(stats.category_count("Home"), 1);
        assert_eq!(stats.category_count("Missing"), 0);
    }

    #[test]
    fn statistics_of_nothing_still_lists_every_priority() {
        let stats = Statistics::collect(std::iter::empty());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_priority.len(), 3);
        assert!(stats.by_category.is_empty());
    }
}
