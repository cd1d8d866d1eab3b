//! Organizational levels and reporting-manager eligibility
//!
//! The level hierarchy table is fixed: each level may only report to levels
//! strictly above it. The resolver filters the full employee pool down to the
//! eligible, active candidates for a given level.

use serde_json::Value;

use crate::gateway::status_is_active;

/// Organizational level, L1 (most senior staff grade) through L5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    L1,
    L2,
    L3,
    L4,
    L5,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::L1, Level::L2, Level::L3, Level::L4, Level::L5];

    /// Levels permitted to supervise this one
    pub fn allowed_reporting_levels(self) -> &'static [Level] {
        match self {
            Level::L1 => &[Level::L2, Level::L3, Level::L4, Level::L5],
            Level::L2 => &[Level::L3, Level::L4, Level::L5],
            Level::L3 => &[Level::L4, Level::L5],
            Level::L4 => &[Level::L5],
            Level::L5 => &[],
        }
    }

    pub fn parse(text: &str) -> Option<Level> {
        match text.trim().to_ascii_uppercase().as_str() {
            "L1" => Some(Level::L1),
            "L2" => Some(Level::L2),
            "L3" => Some(Level::L3),
            "L4" => Some(Level::L4),
            "L5" => Some(Level::L5),
            _ => None,
        }
    }

    /// Parse a level out of a wire value
    pub fn from_value(value: &Value) -> Option<Level> {
        value.as_str().and_then(Level::parse)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Level::L1 => "L1",
            Level::L2 => "L2",
            Level::L3 => "L3",
            Level::L4 => "L4",
            Level::L5 => "L5",
        };
        f.pad(text)
    }
}

/// An eligible reporting manager, derived from the employee pool
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerCandidate {
    pub code: String,
    pub label: String,
    pub level: Level,
}

/// One employee as seen in the pool listing
#[derive(Debug, Clone)]
pub struct EmployeeSummary {
    pub code: String,
    pub name: String,
    pub level: Option<Level>,
    pub active: bool,
}

impl EmployeeSummary {
    /// Extract the pool-relevant fields from a record payload.
    ///
    /// Rows without an id are skipped; a missing status is implicitly active.
    pub fn from_value(payload: &Value) -> Option<Self> {
        let map = payload.as_object()?;

        let code = match map.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        let first = map.get("firstName").and_then(Value::as_str).unwrap_or("");
        let last = map.get("lastName").and_then(Value::as_str).unwrap_or("");
        let mut name = format!("{first} {last}").trim().to_string();
        if name.is_empty() {
            name = map
                .get("employeeCode")
                .and_then(Value::as_str)
                .unwrap_or(&code)
                .to_string();
        }

        let level = map.get("level").and_then(Level::from_value);
        let active = map
            .get("status")
            .map(status_is_active)
            .unwrap_or(true);

        Some(EmployeeSummary {
            code,
            name,
            level,
            active,
        })
    }
}

/// Computes the restricted set of eligible reporting managers
#[derive(Debug, Clone, Default)]
pub struct ManagerHierarchyResolver {
    pool: Vec<EmployeeSummary>,
}

impl ManagerHierarchyResolver {
    pub fn new(pool: Vec<EmployeeSummary>) -> Self {
        Self { pool }
    }

    /// Build the pool from a raw record listing, skipping malformed rows
    pub fn from_records(records: &[Value]) -> Self {
        Self::new(records.iter().filter_map(EmployeeSummary::from_value).collect())
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Look up a pool member's display name by code
    pub fn display_name(&self, code: &str) -> Option<&str> {
        self.pool
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.name.as_str())
    }

    /// Active employees whose level may supervise `level`, sorted by name
    pub fn candidates_for(&self, level: Level) -> Vec<ManagerCandidate> {
        let allowed = level.allowed_reporting_levels();

        let mut candidates: Vec<ManagerCandidate> = self
            .pool
            .iter()
            .filter(|e| e.active)
            .filter_map(|e| {
                let e_level = e.level?;
                allowed.contains(&e_level).then(|| ManagerCandidate {
                    code: e.code.clone(),
                    label: e.name.clone(),
                    level: e_level,
                })
            })
            .collect();

        candidates.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.code.cmp(&b.code)));
        candidates
    }
}
