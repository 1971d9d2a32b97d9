use crate::db;
use crate::export::Quoting;
use crate::ipc::error::HandlerError;
use crate::ipc::helpers::{required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;
use crate::period::ReportPeriod;
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SetupSection {
    Reports,
    Attendance,
}

impl SetupSection {
    const ALL: [SetupSection; 2] = [Self::Reports, Self::Attendance];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "reports" => Some(Self::Reports),
            "attendance" => Some(Self::Attendance),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Reports => "reports",
            Self::Attendance => "attendance",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Reports => "setup.reports",
            Self::Attendance => "setup.attendance",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Reports => json!({
            "defaultPeriod": ReportPeriod::ThisMonth.as_str(),
            "csvQuoting": Quoting::Minimal.as_str(),
            "unknownTypeLabel": ""
        }),
        SetupSection::Attendance => json!({
            "defaultStatus": AttendanceStatus::Present.as_str(),
            "notesForStatuses": [
                AttendanceStatus::Sick.as_str(),
                AttendanceStatus::Excused.as_str()
            ]
        }),
    }
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_status(v: &Value, key: &str) -> Result<AttendanceStatus, String> {
    v.as_str()
        .and_then(AttendanceStatus::parse)
        .ok_or_else(|| format!("{} must be one of: Present, Sick, Excused, Absent", key))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Reports => match k.as_str() {
                "defaultPeriod" => {
                    let p = v.as_str().and_then(ReportPeriod::parse).ok_or_else(|| {
                        concat!(
                            "defaultPeriod must be one of: ",
                            "last_7_days, last_14_days, this_month, last_month, custom"
                        )
                        .to_string()
                    })?;
                    obj.insert(k.clone(), Value::String(p.as_str().to_string()));
                }
                "csvQuoting" => {
                    let q = v
                        .as_str()
                        .and_then(Quoting::parse)
                        .ok_or_else(|| "csvQuoting must be one of: minimal, always".to_string())?;
                    obj.insert(k.clone(), Value::String(q.as_str().to_string()));
                }
                "unknownTypeLabel" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 40)?));
                }
                _ => return Err(format!("unknown reports field: {}", k)),
            },
            SetupSection::Attendance => match k.as_str() {
                "defaultStatus" => {
                    let s = parse_status(v, k)?;
                    obj.insert(k.clone(), Value::String(s.as_str().to_string()));
                }
                "notesForStatuses" => {
                    let items = v
                        .as_array()
                        .ok_or_else(|| format!("{} must be an array", k))?;
                    let mut kept: Vec<AttendanceStatus> = Vec::new();
                    for item in items {
                        let s = parse_status(item, k)?;
                        if !kept.contains(&s) {
                            kept.push(s);
                        }
                    }
                    let names: Vec<Value> = kept
                        .into_iter()
                        .map(|s| Value::String(s.as_str().to_string()))
                        .collect();
                    obj.insert(k.clone(), Value::Array(names));
                }
                _ => return Err(format!("unknown attendance field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Stale stored values fall back to defaults instead of blocking reads.
            if let Err(e) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(section = section.name(), error = %e, "ignoring stored settings");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSettings {
    pub default_period: ReportPeriod,
    pub csv_quoting: Quoting,
    pub unknown_type_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSettings {
    pub default_status: AttendanceStatus,
    pub notes_for_statuses: Vec<AttendanceStatus>,
}

impl AttendanceSettings {
    pub fn keeps_note(&self, status: AttendanceStatus) -> bool {
        self.notes_for_statuses.contains(&status)
    }
}

pub fn load_report_settings(conn: &Connection) -> anyhow::Result<ReportSettings> {
    let v = load_section(conn, SetupSection::Reports)?;
    Ok(ReportSettings {
        default_period: v["defaultPeriod"]
            .as_str()
            .and_then(ReportPeriod::parse)
            .unwrap_or(ReportPeriod::ThisMonth),
        csv_quoting: v["csvQuoting"]
            .as_str()
            .and_then(Quoting::parse)
            .unwrap_or(Quoting::Minimal),
        unknown_type_label: v["unknownTypeLabel"].as_str().unwrap_or_default().to_string(),
    })
}

pub fn load_attendance_settings(conn: &Connection) -> anyhow::Result<AttendanceSettings> {
    let v = load_section(conn, SetupSection::Attendance)?;
    Ok(AttendanceSettings {
        default_status: v["defaultStatus"]
            .as_str()
            .and_then(AttendanceStatus::parse)
            .unwrap_or(AttendanceStatus::Present),
        notes_for_statuses: v["notesForStatuses"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|s| s.as_str().and_then(AttendanceStatus::parse))
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn setup_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerError> {
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), load_section(conn, section)?);
    }
    Ok(Value::Object(out))
}

fn setup_update(conn: &Connection, params: &Value) -> Result<Value, HandlerError> {
    let section_raw = required_str(params, "section")?;
    let section = SetupSection::parse(&section_raw)
        .ok_or_else(|| HandlerError::bad_params("unknown section"))?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerError::bad_params("patch must be an object"))?;

    let mut current = load_section(conn, section)?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerError::BadParams)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(HandlerError::update("workspace_settings"))?;
    tracing::info!(section = section.name(), "settings updated");
    let mut out = json!({ "ok": true });
    out[section.name()] = current;
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(with_conn(state, req, setup_get)),
        "setup.update" => Some(with_conn(state, req, setup_update)),
        _ => None,
    }
}
