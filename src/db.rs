use rusqlite::Connection;

use crate::config::ConnectionProfile;

pub const TRACKER_VIEW: &str = "vw_StudentServiceTracker";
pub const REVENUE_VIEW: &str = "vw_RevenueReport";

/// Opens the store named by the profile for one interaction. The caller
/// drops the handle when the interaction ends; nothing is pooled or reused.
pub fn connect(profile: &ConnectionProfile) -> anyhow::Result<Connection> {
    if let Some(parent) = profile.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(&profile.database.path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    ensure_schema(&conn)?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL
        )",
        [],
    )?;

    // Reference catalog; seeded externally, never written by the workflows.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS services(
            service_id TEXT PRIMARY KEY,
            service_name TEXT NOT NULL,
            fee REAL NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_services(
            student_service_id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            service_id TEXT NOT NULL,
            service_date TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(student_id) ON DELETE CASCADE,
            FOREIGN KEY(service_id) REFERENCES services(service_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_services_student ON student_services(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_services_service ON student_services(service_id)",
        [],
    )?;

    conn.execute(
        "CREATE VIEW IF NOT EXISTS vw_StudentServiceTracker AS
         SELECT s.student_id AS Student_ID,
                s.name AS Student,
                s.email AS Email,
                sv.service_name AS Service,
                ss.service_date AS Date_Used
         FROM student_services ss
         JOIN students s ON s.student_id = ss.student_id
         JOIN services sv ON sv.service_id = ss.service_id",
        [],
    )?;

    conn.execute(
        "CREATE VIEW IF NOT EXISTS vw_RevenueReport AS
         SELECT sv.service_name AS Service,
                COUNT(ss.student_service_id) AS Usage_Count,
                sv.fee AS Unit_Fee,
                COUNT(ss.student_service_id) * sv.fee AS Total_Revenue
         FROM services sv
         LEFT JOIN student_services ss ON ss.service_id = sv.service_id
         GROUP BY sv.service_id
         ORDER BY sv.service_name",
        [],
    )?;

    Ok(())
}

pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Generic tabular read for the report views; their schemas are an external
/// contract consumed opaquely, so column names come from the statement.
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn fetch_view(conn: &Connection, view: &str) -> anyhow::Result<Table> {
    // View names come from the fixed report list, never from request text.
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", view))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(cell_to_string(row.get_ref(i)?));
            }
            Ok(cells)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table { columns, rows })
}

fn cell_to_string(v: rusqlite::types::ValueRef<'_>) -> String {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(_) => String::new(),
    }
}
