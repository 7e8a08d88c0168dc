/// Fixed rejection message for SQL that touches system catalogs.
pub const SYSTEM_TABLE_MESSAGE: &str =
    "Generated query accesses system tables. Please query user tables only.";

/// Rejects SQL that references the system catalogs. A case-insensitive
/// substring scan, not a parser: comment tricks or string concatenation in
/// the generated SQL can defeat it. That limitation is documented and
/// accepted; the check is a guardrail for honest model output.
pub fn check(sql: &str) -> Result<(), String> {
    let upper = sql.to_uppercase();
    if upper.contains("INFORMATION_SCHEMA") || upper.contains("PG_CATALOG") {
        return Err(SYSTEM_TABLE_MESSAGE.to_string());
    }
    Ok(())
}
