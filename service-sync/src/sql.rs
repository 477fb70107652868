//! SQL text generation for the reporting table.
//!
//! Statements are rendered with inline literals. Strings are single-quoted
//! with embedded quotes doubled and identifiers are double-quoted the same
//! way, so no value can terminate a literal early.

use crate::row::columns;
use std::collections::BTreeMap;

/// Column name to value. Ordered, so rendered column lists are stable.
pub type Row = BTreeMap<String, SqlValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Rendered as its JSON text in a string literal.
    Json(serde_json::Value)
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl SqlValue {
    pub fn render(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() => f.to_string(),
            Self::Float(_) => "NULL".to_string(),
            Self::Text(s) => quote_literal(s),
            Self::Json(v) => quote_literal(&v.to_string())
        }
    }
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into()
        }
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

/// Where and how rows are upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertTarget {
    pub table: TableRef,
    pub primary_key: String,
    pub version_column: String,
    /// Columns overwritten on conflict. `None` means every column of the row
    /// except the primary key and the version column.
    pub merge_columns: Option<Vec<String>>
}

impl UpsertTarget {
    fn merge_set<'a>(&'a self, row: &'a Row) -> Vec<&'a str> {
        match &self.merge_columns {
            Some(configured) => configured
                .iter()
                .map(String::as_str)
                .filter(|c| *c != self.primary_key && row.contains_key(*c))
                .collect(),
            None => row
                .keys()
                .map(String::as_str)
                .filter(|c| *c != self.primary_key && *c != self.version_column)
                .collect()
        }
    }
}

/// Renders an insert that, on primary key conflict, updates the merge set
/// only when the incoming version is strictly newer than the stored one.
pub fn compile_upsert(target: &UpsertTarget, row: &Row) -> String {
    let column_list = row
        .keys()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let value_list = row
        .values()
        .map(SqlValue::render)
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({})",
        target.table.qualified(),
        column_list,
        value_list,
        quote_ident(&target.primary_key)
    );

    let merge = target.merge_set(row);
    if merge.is_empty() {
        sql.push_str(" DO NOTHING");
        return sql;
    }

    let assignments = merge
        .iter()
        .map(|c| format!("{} = excluded.{}", quote_ident(c), quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    sql.push_str(&format!(
        " DO UPDATE SET {} WHERE {}.{} < excluded.{}",
        assignments,
        quote_ident(&target.table.table),
        quote_ident(&target.version_column),
        quote_ident(&target.version_column)
    ));

    sql
}

fn select_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Query read by the webview aggregation: every visible service with the
/// fields published in the views.
pub fn visible_services_query(table: &TableRef) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = true ORDER BY {}, {}",
        select_list(&[
            columns::ID,
            columns::NAME,
            columns::ORGANIZATION_FISCAL_CODE,
            columns::ORGANIZATION_NAME,
            columns::QUALITY,
            columns::SCOPE,
            columns::DESCRIPTION
        ]),
        table.qualified(),
        quote_ident(columns::IS_VISIBLE),
        quote_ident(columns::ORGANIZATION_FISCAL_CODE),
        quote_ident(columns::ID)
    )
}

/// Services of an organization whose subscriptions belong to a delegate.
pub fn services_by_delegate_query(
    table: &TableRef,
    delegate_email: &str,
    organization_fiscal_code: &str
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {} AND {} = {}",
        select_list(&[columns::ID, columns::NAME, columns::IS_VISIBLE]),
        table.qualified(),
        quote_ident(columns::SUBSCRIPTION_ACCOUNT_EMAIL),
        quote_literal(delegate_email),
        quote_ident(columns::ORGANIZATION_FISCAL_CODE),
        quote_literal(organization_fiscal_code)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export_target(merge: Option<Vec<&str>>) -> UpsertTarget {
        UpsertTarget {
            table: TableRef::new("ServiceData", "Export"),
            primary_key: "subscriptionId".to_string(),
            version_column: "serviceVersion".to_string(),
            merge_columns: merge.map(|m| m.into_iter().map(String::from).collect())
        }
    }

    fn export_row(email: &str) -> Row {
        let mut row = Row::new();
        row.insert("subscriptionId".into(), "subId1".into());
        row.insert("isVisible".into(), SqlValue::Bool(true));
        row.insert("organizationFiscalCode".into(), "12345678901".into());
        row.insert("sourceId".into(), "00000000000000000000000000".into());
        row.insert("sourceName".into(), "source name".into());
        row.insert("sourceSurname".into(), "source surname".into());
        row.insert("sourceEmail".into(), email.into());
        row.insert("serviceVersion".into(), SqlValue::Int(0));
        row.insert("serviceName".into(), "Service Test".into());
        row
    }

    #[test]
    fn test_compiles_versioned_upsert() {
        let target = export_target(Some(vec![
            "organizationFiscalCode",
            "serviceVersion",
            "serviceName",
        ]));
        let expected = concat!(
            r#"INSERT INTO "ServiceData"."Export" ("isVisible", "organizationFiscalCode", "serviceName", "serviceVersion", "sourceEmail", "sourceId", "sourceName", "sourceSurname", "subscriptionId") "#,
            r#"VALUES (true, '12345678901', 'Service Test', 0, 'source email', '00000000000000000000000000', 'source name', 'source surname', 'subId1') "#,
            r#"ON CONFLICT ("subscriptionId") DO UPDATE SET "organizationFiscalCode" = excluded."organizationFiscalCode", "serviceVersion" = excluded."serviceVersion", "serviceName" = excluded."serviceName" "#,
            r#"WHERE "Export"."serviceVersion" < excluded."serviceVersion""#
        );

        assert_eq!(compile_upsert(&target, &export_row("source email")), expected);
    }

    #[test]
    fn test_default_merge_set_skips_key_and_version() {
        let sql = compile_upsert(&export_target(None), &export_row("source email"));

        let update = sql.split("DO UPDATE SET ").nth(1).unwrap();
        let assignments = update.split(" WHERE ").next().unwrap();
        assert!(!assignments.contains("\"subscriptionId\" ="));
        assert!(!assignments.contains("\"serviceVersion\" ="));
        assert!(assignments.contains("\"sourceEmail\" = excluded.\"sourceEmail\""));
        assert!(sql.ends_with(r#"WHERE "Export"."serviceVersion" < excluded."serviceVersion""#));
    }

    #[test]
    fn test_quotes_are_doubled() {
        let sql = compile_upsert(&export_target(None), &export_row("'select *'"));

        assert!(sql.contains("'''select *'''"));
        assert_eq!(sql.matches('\'').count() % 2, 0);
    }

    #[test]
    fn test_merge_columns_missing_from_row_are_ignored() {
        let target = export_target(Some(vec!["description", "serviceName"]));
        let sql = compile_upsert(&target, &export_row("e"));

        assert!(!sql.contains("\"description\""));
        assert!(sql.contains("DO UPDATE SET \"serviceName\" = excluded.\"serviceName\" WHERE"));
    }

    #[test]
    fn test_empty_merge_set_does_nothing() {
        let target = export_target(Some(vec!["subscriptionId"]));
        let sql = compile_upsert(&target, &export_row("e"));

        assert!(sql.ends_with("ON CONFLICT (\"subscriptionId\") DO NOTHING"));
    }

    #[test]
    fn test_json_and_float_values() {
        assert_eq!(
            SqlValue::Json(json!({ "ip": ["10.0.0.1"] })).render(),
            r#"'{"ip":["10.0.0.1"]}'"#
        );
        assert_eq!(SqlValue::Json(json!("it's")).render(), r#"'"it''s"'"#);
        assert_eq!(SqlValue::Float(0.5).render(), "0.5");
        assert_eq!(SqlValue::Float(1.0).render(), "1");
        assert_eq!(SqlValue::Float(f64::NAN).render(), "NULL");
        assert_eq!(SqlValue::Null.render(), "NULL");
    }

    #[test]
    fn test_identifiers_are_escaped() {
        assert_eq!(quote_ident(r#"weird"name"#), r#""weird""name""#);
        assert_eq!(
            TableRef::new("ServiceData", "Export").qualified(),
            r#""ServiceData"."Export""#
        );
    }

    #[test]
    fn test_services_by_delegate_query() {
        let table = TableRef::new("SchemaTest", "TableTest");
        let sql = services_by_delegate_query(&table, "test@test.com", "12345678901");

        assert_eq!(
            sql,
            r#"SELECT "id", "name", "isVisible" FROM "SchemaTest"."TableTest" WHERE "subscriptionAccountEmail" = 'test@test.com' AND "organizationFiscalCode" = '12345678901'"#
        );
    }

    #[test]
    fn test_services_by_delegate_query_prevents_injection() {
        let table = TableRef::new("SchemaTest", "TableTest");
        let sql = services_by_delegate_query(&table, "'select *'", "12345678901");

        assert!(sql.contains(r#""subscriptionAccountEmail" = '''select *''' AND"#));
    }

    #[test]
    fn test_visible_services_query() {
        let sql = visible_services_query(&TableRef::new("ServiceData", "Services"));

        assert_eq!(
            sql,
            r#"SELECT "id", "name", "organizationFiscalCode", "organizationName", "quality", "scope", "description" FROM "ServiceData"."Services" WHERE "isVisible" = true ORDER BY "organizationFiscalCode", "id""#
        );
    }
}
