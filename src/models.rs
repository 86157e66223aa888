use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Optional field that may also be `null` when present.
///
/// `None` means the remote omitted the key, `Some(None)` means it sent `null`.
/// Keeping the two apart lets a record serialize back exactly as received.
pub type Presence<T> = Option<Option<T>>;

fn present<'de, D, T>(deserializer: D) -> Result<Presence<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Paging {
    pub items_per_page: u64,
    pub current_page: u64,
    pub count_pages: u64,
    pub count_items: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Option<String>,
    pub initials: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub number: Presence<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub teams_id: Presence<i64>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub worktime_regulation_id: Presence<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_lock_sync: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_generally_see_absences: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_generally_manage_absences: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_add_customers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wage_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_groups_ids: Option<Vec<i64>>,
    /// Fields the remote sends that are not modeled above, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Entry {
    pub id: i64,
    pub users_id: i64,
    pub customers_id: i64,
    pub projects_id: Option<i64>,
    pub text: Option<String>,
    pub time_since: String,
    /// `None` while the entry is still running.
    pub time_until: Option<String>,
    pub time_insert: String,
    pub time_last_change: String,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub services_id: Presence<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable: Option<i64>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub duration: Presence<i64>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Presence<Number>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub revenue: Presence<Number>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub budget_is_hours: Presence<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub budget_is_not_strict: Presence<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProjectBudget {
    pub monetary: bool,
    pub hard: bool,
    pub interval: Option<String>,
    pub amount: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_thresholds: Option<Vec<i64>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Project {
    pub id: i64,
    pub customers_id: i64,
    pub name: String,
    pub number: Option<String>,
    pub note: Option<String>,
    pub active: bool,
    pub completed: bool,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub completed_at: Presence<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub deadline: Presence<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub start_date: Presence<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub revenue_factor: Presence<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable_default: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub budget: Presence<ProjectBudget>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One validated page of a paginated endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub paging: Paging,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.paging.current_page >= self.paging.count_pages
    }
}
