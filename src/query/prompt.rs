use crate::config::QueryConfig;
use crate::db::catalog::{TableDetails, TableInfo};
use std::fmt::Write;

/// Fixed system instruction sent on every generation call. The model is
/// asked for a JSON envelope so the extractor has a structured payload to
/// recover.
pub const SYSTEM_PROMPT: &str = r#"You are a senior data analyst that writes **correct, efficient, safe SQL** for the exact database schema provided below.

### INPUTS YOU WILL RECEIVE
1. **User question** - natural language request.
2. **Full schema** - tables, columns, data types, relationships.
3. **Database dialect** - PostgreSQL.

### YOUR OUTPUT (JSON only, no extra text)
{
  "sql": "exact SQL query to run",
  "explanation": "plain English summary of what the query does",
  "warnings": ["list of risks, e.g., 'scans 2M rows', 'uses full table scan'] or []",
  "row_limit_applied": true/false,
  "suggested_visualization": "bar|line|table|none"
}

"warnings": array of strings, each formatted as:
[<SEVERITY>] <CODE>: <message> [details]
- INFO: helpful context
- WARN: performance, ambiguity, or best practice
- Never include ERROR (those fail the whole request)

### GOLDEN RULES (NEVER BREAK)
1. **NEVER use SELECT *** -> always list columns explicitly.
2. **ALWAYS apply LIMIT 1000** unless user says "all", "full", or "complete".
3. **NEVER write DELETE, UPDATE, DROP, or DDL**.
4. **ONLY use tables/columns from the schema**.
5. **PREFER explicit JOINs** over implicit. Use aliases.
6. **For "top N", "most recent", etc. -> use ROW_NUMBER() or ORDER BY with LIMIT**.
7. **If unclear -> ask ONE clarifying question in `explanation`**.
"#;

/// Renders the user prompt: the literal request, the configured row cap if
/// limit enforcement is on, then whatever schema context was gathered.
/// Assembly is deterministic for identical inputs.
pub fn build_user_prompt(
    natural_language: &str,
    schema_context: Option<&str>,
    query_config: &QueryConfig,
) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Generate a PostgreSQL query for this request:\n");
    let _ = writeln!(prompt, "Request: {}", natural_language);

    if query_config.enforce_limit {
        let _ = writeln!(
            prompt,
            "Unless the request asks for all rows, cap results at {} rows.",
            query_config.default_limit
        );
    }

    if let Some(context) = schema_context {
        if !context.is_empty() {
            let _ = writeln!(prompt, "Schema info:\n{}", context);
        }
    }

    prompt
}

/// Picks the tables whose name appears verbatim in the request text. This
/// is a case-sensitive substring test over the raw request, capped at the
/// first three matches in catalog order. A table named `order` will match
/// the word "ordered"; the imprecision is accepted as best-effort context
/// trimming.
pub fn mentioned_tables<'a>(natural_language: &str, tables: &'a [TableInfo]) -> Vec<&'a TableInfo> {
    tables
        .iter()
        .filter(|table| natural_language.contains(&table.table_name))
        .take(3)
        .collect()
}

/// Assembles the full schema context: the inventory block, then a detail
/// block per described table.
pub fn render_schema_context(tables: &[TableInfo], details: &[TableDetails]) -> String {
    let mut context = format_schema(tables);
    for table_details in details {
        context.push('\n');
        context.push_str(&format_table_details(table_details));
    }
    context
}

/// Renders the table inventory block for the prompt.
pub fn format_schema(tables: &[TableInfo]) -> String {
    let mut out = String::new();
    out.push_str("=== DATABASE SCHEMA ===\n");
    out.push_str("IMPORTANT: These are the ONLY tables available in this database:\n\n");

    for table in tables {
        let _ = writeln!(
            out,
            "- {}.{} ({}, ~{} rows)",
            table.schema_name, table.table_name, table.table_type, table.estimated_rows
        );
    }

    if tables.is_empty() {
        out.push_str("- No user tables found in database\n");
    }

    out.push_str(
        "\nCRITICAL: If user asks for tables not listed above, return an error with available table names.\n",
    );
    out.push_str("Do NOT query information_schema or pg_catalog tables.\n");
    out
}

/// Renders the detailed column/index block for one table.
pub fn format_table_details(details: &TableDetails) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== TABLE: {}.{} ===\n",
        details.schema_name, details.table_name
    );

    out.push_str("COLUMNS:\n");
    for column in &details.columns {
        let _ = write!(out, "- {} ({})", column.column_name, column.data_type);

        if column.is_primary_key {
            out.push_str(" [PRIMARY KEY]");
        }
        if column.is_foreign_key {
            let _ = write!(
                out,
                " [FK -> {}.{}]",
                column.foreign_table.as_deref().unwrap_or(""),
                column.foreign_column.as_deref().unwrap_or("")
            );
        }
        if !column.is_nullable {
            out.push_str(" [NOT NULL]");
        }
        if let Some(default) = &column.column_default {
            if !default.is_empty() {
                let _ = write!(out, " [DEFAULT: {}]", default);
            }
        }
        out.push('\n');
    }

    if !details.indexes.is_empty() {
        out.push_str("\nINDEXES:\n");
        for index in &details.indexes {
            let _ = writeln!(out, "- {}", index);
        }
    }

    out
}
