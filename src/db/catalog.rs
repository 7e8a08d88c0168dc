use serde::Serialize;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::debug;

/// One user table as seen in the relational catalog. The row estimate comes
/// from `pg_stat_user_tables` counters and is eventually consistent; it is
/// prompt context, never a correctness input.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub table_name: String,
    pub schema_name: String,
    pub table_type: String,
    pub estimated_rows: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub foreign_table: Option<String>,
    pub foreign_column: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDetails {
    pub table_name: String,
    pub schema_name: String,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<String>,
}

const LIST_TABLES_SQL: &str = r#"
    SELECT
        t.table_name::text AS table_name,
        t.table_schema::text AS schema_name,
        t.table_type::text AS table_type,
        COALESCE(s.n_tup_ins + s.n_tup_upd + s.n_tup_del, 0)::bigint AS estimated_rows
    FROM information_schema.tables t
    LEFT JOIN pg_stat_user_tables s
        ON t.table_name = s.relname
        AND t.table_schema = s.schemaname
    WHERE t.table_schema NOT IN ('information_schema', 'pg_catalog')
        AND t.table_type = 'BASE TABLE'
    ORDER BY t.table_schema, t.table_name
"#;

const DESCRIBE_COLUMNS_SQL: &str = r#"
    SELECT
        c.column_name::text AS column_name,
        c.data_type::text AS data_type,
        (c.is_nullable = 'YES') AS is_nullable,
        c.column_default::text AS column_default,
        (pk.column_name IS NOT NULL) AS is_primary_key,
        (fk.column_name IS NOT NULL) AS is_foreign_key,
        fk.foreign_table_name::text AS foreign_table,
        fk.foreign_column_name::text AS foreign_column
    FROM information_schema.columns c
    LEFT JOIN (
        SELECT kcu.column_name, kcu.table_name, kcu.table_schema
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
    ) pk ON c.column_name = pk.column_name
        AND c.table_name = pk.table_name
        AND c.table_schema = pk.table_schema
    LEFT JOIN (
        SELECT
            kcu.column_name,
            kcu.table_name,
            kcu.table_schema,
            ccu.table_name AS foreign_table_name,
            ccu.column_name AS foreign_column_name
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
            ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
        JOIN information_schema.constraint_column_usage ccu
            ON ccu.constraint_name = tc.constraint_name
            AND ccu.table_schema = tc.table_schema
        WHERE tc.constraint_type = 'FOREIGN KEY'
    ) fk ON c.column_name = fk.column_name
        AND c.table_name = fk.table_name
        AND c.table_schema = fk.table_schema
    WHERE c.table_name = $1
        AND c.table_schema = $2
    ORDER BY c.ordinal_position
"#;

const LIST_INDEXES_SQL: &str = r#"
    SELECT indexdef::text AS indexdef
    FROM pg_indexes
    WHERE tablename = $1
        AND schemaname = $2
    ORDER BY indexname
"#;

/// Read-only view over the database catalog. Cheap to clone; all state is
/// the shared pool.
#[derive(Clone)]
pub struct CatalogInspector {
    pool: PgPool,
}

impl CatalogInspector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists user base tables with approximate row counts, ordered by
    /// (schema, name). System schemas are excluded.
    pub async fn list_tables(&self) -> Result<Vec<TableInfo>, sqlx::Error> {
        let rows = sqlx::query(LIST_TABLES_SQL).fetch_all(&self.pool).await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(TableInfo {
                table_name: row.try_get("table_name")?,
                schema_name: row.try_get("schema_name")?,
                table_type: row.try_get("table_type")?,
                estimated_rows: row.try_get("estimated_rows")?,
            });
        }

        debug!("Catalog listed {} user tables", tables.len());
        Ok(tables)
    }

    /// Describes one table: columns in declared order with key flags
    /// resolved through constraint metadata, plus index definitions.
    pub async fn describe_table(
        &self,
        table_name: &str,
        schema_name: &str,
    ) -> Result<TableDetails, sqlx::Error> {
        let column_rows = sqlx::query(DESCRIBE_COLUMNS_SQL)
            .bind(table_name)
            .bind(schema_name)
            .fetch_all(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in column_rows {
            columns.push(ColumnInfo {
                column_name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
                is_nullable: row.try_get("is_nullable")?,
                column_default: row.try_get("column_default")?,
                is_primary_key: row.try_get("is_primary_key")?,
                is_foreign_key: row.try_get("is_foreign_key")?,
                foreign_table: row.try_get("foreign_table")?,
                foreign_column: row.try_get("foreign_column")?,
            });
        }

        let index_rows = sqlx::query(LIST_INDEXES_SQL)
            .bind(table_name)
            .bind(schema_name)
            .fetch_all(&self.pool)
            .await?;

        let mut indexes = Vec::with_capacity(index_rows.len());
        for row in index_rows {
            indexes.push(row.try_get("indexdef")?);
        }

        Ok(TableDetails {
            table_name: table_name.to_string(),
            schema_name: schema_name.to_string(),
            columns,
            indexes,
        })
    }
}
