use std::fmt::Display;

/// PostgREST filter/order builder rendered into a query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Vec<String>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.order.push(format!("{}.{}", column, direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn filter(mut self, column: &str, op: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("{}.{}", op, value)));
        self
    }

    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(select) = &self.select {
            parts.push(format!("select={}", urlencoding::encode(select)));
        }
        for (column, expr) in &self.filters {
            parts.push(format!("{}={}", column, urlencoding::encode(expr)));
        }
        if !self.order.is_empty() {
            parts.push(format!("order={}", self.order.join(",")));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={}", limit));
        }

        parts.join("&")
    }

    /// Full REST path for `table`, e.g. `/rest/v1/appointments?patient_id=eq.x`.
    pub fn to_path(&self, table: &str) -> String {
        let query = self.to_query_string();
        if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        }
    }
}
