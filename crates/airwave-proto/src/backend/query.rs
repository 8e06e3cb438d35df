use super::Table;

/// Filter/order/select parameters for one table request, rendered the way the
/// hosted REST layer expects (`col=eq.value`, `order=col.asc`).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: Table,
    params: Vec<(String, String)>,
}

impl Query {
    pub fn table(table: Table) -> Self {
        Self {
            table,
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl AsRef<str>) -> Self {
        self.params
            .push((column.into(), format!("eq.{}", value.as_ref())));
        self
    }

    /// `column=in.(a,b,c)`; values are quoted so commas inside them survive.
    pub fn in_list(mut self, column: &str, values: &[String]) -> Self {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
            .collect();
        self.params
            .push((column.into(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let dir = if ascending { "asc" } else { "desc" };
        self.params.push(("order".into(), format!("{column}.{dir}")));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".into(), n.to_string()));
        self
    }

    pub fn table_name(&self) -> &'static str {
        self.table.name()
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_filters_in_order() {
        let q = Query::table(Table::Favorites)
            .select("station_id")
            .eq("user_id", "u1")
            .order("created_at", false)
            .limit(5);
        assert_eq!(q.table_name(), "user_favorites");
        assert_eq!(
            q.params(),
            &[
                ("select".to_string(), "station_id".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "5".to_string()),
            ]
        );
    }

    #[test]
    fn in_list_quotes_values() {
        let q = Query::table(Table::Profiles).in_list("id", &["a".into(), "b,c".into()]);
        assert_eq!(q.params()[0].1, r#"in.("a","b,c")"#);
    }
}
