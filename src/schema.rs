use std::fmt;
use std::sync::OnceLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{ValidationError, Validator};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::models::{Entry, Page, Paging, Project, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationIssues(Vec<Issue>);

impl ValidationIssues {
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut issues = Self::default();
        issues.push(path, message);
        issues
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Issue {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Moves `other` in, qualifying each path with `prefix`.
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationIssues) {
        for issue in other.0 {
            let path = if issue.path.is_empty() {
                prefix.to_string()
            } else if issue.path.starts_with('[') {
                format!("{prefix}{}", issue.path)
            } else {
                join(prefix, &issue.path)
            };
            self.push(path, issue.message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.0.iter()
    }

    fn push_error(&mut self, error: &ValidationError) {
        let path = pointer_to_path(&error.instance_path.to_string());
        match &error.kind {
            ValidationErrorKind::Required { property } => {
                let property = property
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| property.to_string());
                self.push(join(&path, &property), "missing required field");
            }
            _ => self.push(path, error.to_string()),
        }
    }
}

impl fmt::Display for ValidationIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.len();
        write!(f, "{count} issue{}: ", if count == 1 { "" } else { "s" })?;
        for (index, issue) in self.iter().enumerate() {
            if index > 0 {
                write!(f, "; ")?;
            }
            if issue.path.is_empty() {
                write!(f, "{}", issue.message)?;
            } else {
                write!(f, "{}: {}", issue.path, issue.message)?;
            }
        }
        Ok(())
    }
}

/// A record with a JSON Schema, decoded only after every rule holds.
pub trait Validate: DeserializeOwned {
    fn validator() -> &'static Result<Validator, String>;

    fn validate(raw: &Value) -> Result<Self, ValidationIssues> {
        let validator = Self::validator()
            .as_ref()
            .map_err(|err| ValidationIssues::single("", format!("schema failed to compile: {err}")))?;

        if let Err(errors) = validator.validate(raw) {
            let mut issues = ValidationIssues::default();
            for error in errors {
                issues.push_error(&error);
            }
            return Err(issues);
        }

        Self::deserialize(raw).map_err(|err| ValidationIssues::single("", err.to_string()))
    }
}

fn compile(schema: Value) -> Result<Validator, String> {
    Validator::new(&schema).map_err(|err| err.to_string())
}

fn paging_schema() -> Value {
    json!({
        "type": "object",
        "required": ["items_per_page", "current_page", "count_pages", "count_items"],
        "properties": {
            "items_per_page": { "type": "integer" },
            "current_page": { "type": "integer" },
            "count_pages": { "type": "integer" },
            "count_items": { "type": "integer" }
        }
    })
}

fn user_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name", "email", "role", "initials", "language", "timezone"],
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" },
            "email": { "type": "string" },
            "role": { "type": ["string", "null"] },
            "initials": { "type": ["string", "null"] },
            "language": { "type": ["string", "null"] },
            "timezone": { "type": ["string", "null"] },
            "number": { "type": ["string", "null"] },
            "teams_id": { "type": ["integer", "null"] },
            "worktime_regulation_id": { "type": ["integer", "null"] },
            "active": { "type": "boolean" },
            "edit_lock_sync": { "type": "boolean" },
            "can_generally_see_absences": { "type": "boolean" },
            "can_generally_manage_absences": { "type": "boolean" },
            "can_add_customers": { "type": "boolean" },
            "wage_type": { "type": "integer" },
            "access_groups_ids": { "type": "array", "items": { "type": "integer" } }
        }
    })
}

fn entry_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "id", "users_id", "customers_id", "projects_id", "text",
            "time_since", "time_until", "time_insert", "time_last_change"
        ],
        "properties": {
            "id": { "type": "integer" },
            "users_id": { "type": "integer" },
            "customers_id": { "type": "integer" },
            "projects_id": { "type": ["integer", "null"] },
            "text": { "type": ["string", "null"] },
            "time_since": { "type": "string" },
            "time_until": { "type": ["string", "null"] },
            "time_insert": { "type": "string" },
            "time_last_change": { "type": "string" },
            "services_id": { "type": ["integer", "null"] },
            "billable": { "type": "integer" },
            "duration": { "type": ["integer", "null"] },
            "hourly_rate": { "type": ["number", "null"] },
            "revenue": { "type": ["number", "null"] },
            "budget_is_hours": { "type": ["boolean", "null"] },
            "budget_is_not_strict": { "type": ["boolean", "null"] }
        }
    })
}

fn project_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "customers_id", "name", "number", "note", "active", "completed"],
        "properties": {
            "id": { "type": "integer" },
            "customers_id": { "type": "integer" },
            "name": { "type": "string" },
            "number": { "type": ["string", "null"] },
            "note": { "type": ["string", "null"] },
            "active": { "type": "boolean" },
            "completed": { "type": "boolean" },
            "completed_at": { "type": ["string", "null"] },
            "deadline": { "type": ["string", "null"] },
            "start_date": { "type": ["string", "null"] },
            "revenue_factor": { "type": ["number", "null"] },
            "billable_default": { "type": "boolean" },
            "budget": {
                "type": ["object", "null"],
                "required": ["monetary", "hard", "interval", "amount"],
                "properties": {
                    "monetary": { "type": "boolean" },
                    "hard": { "type": "boolean" },
                    "interval": { "type": ["string", "null"] },
                    "amount": { "type": "number" },
                    "notification_thresholds": { "type": "array", "items": { "type": "integer" } }
                }
            }
        }
    })
}

impl Validate for Paging {
    fn validator() -> &'static Result<Validator, String> {
        static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
        VALIDATOR.get_or_init(|| compile(paging_schema()))
    }
}

impl Validate for User {
    fn validator() -> &'static Result<Validator, String> {
        static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
        VALIDATOR.get_or_init(|| compile(user_schema()))
    }
}

impl Validate for Entry {
    fn validator() -> &'static Result<Validator, String> {
        static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
        VALIDATOR.get_or_init(|| compile(entry_schema()))
    }
}

impl Validate for Project {
    fn validator() -> &'static Result<Validator, String> {
        static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();
        VALIDATOR.get_or_init(|| compile(project_schema()))
    }
}

/// Validates a page envelope whose items live under `items_field`.
///
/// Issues from the envelope, the paging block and every item are collected
/// together; the page is returned only if there are none.
pub fn validate_page<T: Validate>(raw: &Value, items_field: &str) -> Result<Page<T>, ValidationIssues> {
    let mut issues = ValidationIssues::default();
    let Some(envelope) = raw.as_object() else {
        issues.push("", format!("expected object, got {}", type_name(raw)));
        return Err(issues);
    };

    let paging = match envelope.get("paging") {
        None => {
            issues.push("paging", "missing required field");
            None
        }
        Some(paging) => Paging::validate(paging)
            .map_err(|found| issues.extend_prefixed("paging", found))
            .ok(),
    };

    let mut items = Vec::new();
    match envelope.get(items_field) {
        None => issues.push(items_field, "missing required field"),
        Some(Value::Array(raw_items)) => {
            for (index, item) in raw_items.iter().enumerate() {
                match T::validate(item) {
                    Ok(item) => items.push(item),
                    Err(found) => issues.extend_prefixed(&format!("{items_field}[{index}]"), found),
                }
            }
        }
        Some(other) => issues.push(items_field, format!("expected array, got {}", type_name(other))),
    }

    match paging {
        Some(paging) if issues.is_empty() => Ok(Page { paging, items }),
        _ => Err(issues),
    }
}

/// Turns a JSON pointer such as `/data/1/id` into `data[1].id`.
fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::new();
    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        if !token.is_empty() && token.bytes().all(|byte| byte.is_ascii_digit()) {
            path.push_str(&format!("[{token}]"));
        } else {
            path = join(&path, &token);
        }
    }
    path
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "email": format!("{}@example.com", name.to_lowercase()),
            "role": "worker",
            "initials": null,
            "language": "en",
            "timezone": "Europe/Berlin"
        })
    }

    fn sorted_paths(issues: &ValidationIssues) -> Vec<String> {
        let mut paths: Vec<String> = issues.iter().map(|issue| issue.path.clone()).collect();
        paths.sort();
        paths
    }

    #[test]
    fn schemas_compile() {
        assert!(Paging::validator().is_ok());
        assert!(User::validator().is_ok());
        assert!(Entry::validator().is_ok());
        assert!(Project::validator().is_ok());
    }

    #[test]
    fn valid_user_decodes() {
        let parsed = User::validate(&user(3, "Grace")).unwrap();
        assert_eq!(parsed.id, 3);
        assert_eq!(parsed.name, "Grace");
        assert_eq!(parsed.initials, None);
    }

    #[test]
    fn missing_id_is_reported() {
        let mut raw = user(3, "Grace");
        raw.as_object_mut().unwrap().remove("id");
        let issues = User::validate(&raw).unwrap_err();
        assert_eq!(issues.len(), 1);
        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.path, "id");
        assert_eq!(issue.message, "missing required field");
    }

    #[test]
    fn every_issue_is_collected() {
        let raw = json!({
            "id": "3",
            "name": null,
            "role": "worker",
            "initials": null,
            "language": "en",
            "timezone": "UTC",
            "access_groups_ids": [1, "two"]
        });
        let issues = User::validate(&raw).unwrap_err();
        assert_eq!(
            sorted_paths(&issues),
            vec!["access_groups_ids[1]", "email", "id", "name"]
        );
    }

    #[test]
    fn nullable_field_must_still_be_present() {
        let raw = json!({
            "id": 1,
            "users_id": 2,
            "customers_id": 3,
            "text": null,
            "time_since": "2026-02-03T08:00:00Z",
            "time_until": null,
            "time_insert": "2026-02-03T08:00:00Z",
            "time_last_change": "2026-02-03T08:00:00Z"
        });
        let issues = Entry::validate(&raw).unwrap_err();
        assert_eq!(sorted_paths(&issues), vec!["projects_id"]);
    }

    #[test]
    fn null_budget_is_accepted() {
        let raw = json!({
            "id": 10,
            "customers_id": 4,
            "name": "Website",
            "number": null,
            "note": null,
            "active": true,
            "completed": false,
            "budget": null
        });
        let project = Project::validate(&raw).unwrap();
        assert_eq!(project.budget, Some(None));
    }

    #[test]
    fn nested_budget_issues_are_path_qualified() {
        let raw = json!({
            "id": 10,
            "customers_id": 4,
            "name": "Website",
            "number": null,
            "note": null,
            "active": true,
            "completed": false,
            "budget": { "monetary": true, "hard": "yes", "interval": null }
        });
        let issues = Project::validate(&raw).unwrap_err();
        assert_eq!(sorted_paths(&issues), vec!["budget.amount", "budget.hard"]);
    }

    #[test]
    fn page_collects_issues_across_envelope_and_items() {
        let mut broken = user(2, "Linus");
        broken.as_object_mut().unwrap().remove("email");
        let raw = json!({
            "paging": { "items_per_page": 50, "current_page": 1, "count_pages": null },
            "data": [user(1, "Ada"), broken]
        });
        let issues = validate_page::<User>(&raw, "data").unwrap_err();
        assert_eq!(
            sorted_paths(&issues),
            vec!["data[1].email", "paging.count_items", "paging.count_pages"]
        );
    }

    #[test]
    fn page_requires_named_items_field() {
        let raw = json!({
            "paging": { "items_per_page": 50, "current_page": 1, "count_pages": 1, "count_items": 0 },
            "data": []
        });
        let issues = validate_page::<Entry>(&raw, "entries").unwrap_err();
        assert_eq!(issues.to_string(), "1 issue: entries: missing required field");
    }

    #[test]
    fn page_decodes_in_order() {
        let raw = json!({
            "paging": { "items_per_page": 50, "current_page": 1, "count_pages": 1, "count_items": 2 },
            "data": [user(5, "Ada"), user(2, "Linus")]
        });
        let page = validate_page::<User>(&raw, "data").unwrap();
        let ids: Vec<i64> = page.items.iter().map(|user| user.id).collect();
        assert_eq!(ids, vec![5, 2]);
        assert!(page.is_last());
    }

    #[test]
    fn non_object_body_is_rejected() {
        let issues = validate_page::<User>(&json!([1, 2]), "data").unwrap_err();
        assert_eq!(issues.to_string(), "1 issue: expected object, got array");
    }

    #[test]
    fn pointers_become_dotted_paths() {
        assert_eq!(pointer_to_path(""), "");
        assert_eq!(pointer_to_path("/id"), "id");
        assert_eq!(pointer_to_path("/budget/notification_thresholds/2"), "budget.notification_thresholds[2]");
        assert_eq!(pointer_to_path("/a~1b"), "a/b");
    }

    #[test]
    fn prefixed_issues_keep_index_form() {
        let mut issues = ValidationIssues::default();
        issues.extend_prefixed("data[3]", ValidationIssues::single("id", "missing required field"));
        issues.extend_prefixed("data[4]", ValidationIssues::single("", "bad"));
        assert_eq!(sorted_paths(&issues), vec!["data[3].id", "data[4]"]);
    }
}
