//! Helpers for the hosted table API: query-string building, error bodies,
//! and row counts.

use reqwest::StatusCode;

use crate::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

/// A read against one table.
///
/// ```text
/// Query::from("tasks").eq("team_id", 3).order("created_at", Order::Desc)
///   -> /rest/v1/tasks?select=*&team_id=eq.3&order=created_at.desc
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    select: String,
    filters: Vec<(String, String)>,
    order: Option<(String, Order)>,
    single: bool,
}

impl Query {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            select: "*".into(),
            filters: Vec::new(),
            order: None,
            single: false,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    /// Expect exactly one row back; zero rows become `NotFound`.
    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    pub fn is_single(&self) -> bool {
        self.single
    }

    pub fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select.clone())];
        params.extend(self.filters.iter().cloned());
        if let Some((ref column, order)) = self.order {
            params.push(("order".into(), format!("{column}.{}", order.as_str())));
        }
        params
    }

    /// Filters only, for writes and deletes that target matching rows.
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.clone()
    }
}

/// Pull the human-readable message out of an error body. The table API uses
/// `message`, the auth API `msg` or `error_description`.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value[*key].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

pub fn map_status(status: StatusCode, body: &str) -> ServiceError {
    let msg = error_message(body);
    let msg = if msg.is_empty() {
        status.to_string()
    } else {
        msg
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(msg),
        // 406 is what a single-row read returns when nothing matched.
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::InvalidInput(msg)
        }
        _ => ServiceError::Internal(msg),
    }
}

/// Total from a `Content-Range` header such as `0-24/57` or `*/0`.
pub fn parse_content_range_total(header: &str) -> Option<i64> {
    let (_, total) = header.rsplit_once('/')?;
    total.trim().parse().ok()
}
