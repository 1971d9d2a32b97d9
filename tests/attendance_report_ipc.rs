mod test_support;

use serde_json::json;
use test_support::{create_class, create_student, open_workspace, Sidecar};

fn save_day(sidecar: &mut Sidecar, class_id: &str, date: &str, entries: serde_json::Value) {
    sidecar.request_ok(
        "attendance.save",
        json!({ "classId": class_id, "date": date, "entries": entries }),
    );
}

#[test]
fn day_open_defaults_to_present_until_saved() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");
    create_student(&mut sidecar, &class_id, "1002", "Budi");

    let day = sidecar.request_ok("attendance.dayOpen", json!({ "classId": class_id, "date": "2025-08-04" }));
    assert_eq!(day["recapped"], false);
    let students = day["students"].as_array().expect("students");
    assert_eq!(students.len(), 2);
    assert!(students.iter().all(|s| s["status"] == "Present" && s["saved"] == false));

    save_day(
        &mut sidecar,
        &class_id,
        "2025-08-04",
        json!([{ "studentId": ani, "status": "Sakit", "note": "demam" }]),
    );
    let day = sidecar.request_ok("attendance.dayOpen", json!({ "classId": class_id, "date": "2025-08-04" }));
    assert_eq!(day["recapped"], true);
    assert_eq!(day["students"][0]["status"], "Sick");
    assert_eq!(day["students"][0]["note"], "demam");
    assert_eq!(day["students"][1]["saved"], false);
}

#[test]
fn notes_are_kept_only_for_configured_statuses() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");
    let budi = create_student(&mut sidecar, &class_id, "1002", "Budi");

    save_day(
        &mut sidecar,
        &class_id,
        "2025-08-04",
        json!([
            { "studentId": ani, "status": "Absent", "note": "tanpa kabar" },
            { "studentId": budi, "status": "Excused", "note": "acara keluarga" }
        ]),
    );
    let day = sidecar.request_ok("attendance.dayOpen", json!({ "classId": class_id, "date": "2025-08-04" }));
    assert_eq!(day["students"][0]["note"], "");
    assert_eq!(day["students"][1]["note"], "acara keluarga");
}

#[test]
fn save_is_all_or_nothing() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let other_class = create_class(&mut sidecar, "VII B");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");
    let stranger = create_student(&mut sidecar, &other_class, "2001", "Citra");

    let code = sidecar.request_err(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2025-08-04",
            "entries": [
                { "studentId": ani, "status": "Present" },
                { "studentId": stranger, "status": "Present" }
            ]
        }),
    );
    assert_eq!(code, "bad_params");
    let code = sidecar.request_err(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2025-08-04",
            "entries": [{ "studentId": ani, "status": "Telat" }]
        }),
    );
    assert_eq!(code, "bad_params");

    let day = sidecar.request_ok("attendance.dayOpen", json!({ "classId": class_id, "date": "2025-08-04" }));
    assert_eq!(day["recapped"], false);
}

#[test]
fn two_day_scenario_uses_effective_days() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let a = create_student(&mut sidecar, &class_id, "1001", "Ani");
    let b = create_student(&mut sidecar, &class_id, "1002", "Budi");
    // Never recorded: gets no row.
    create_student(&mut sidecar, &class_id, "1003", "Citra");

    save_day(
        &mut sidecar,
        &class_id,
        "2025-08-04",
        json!([
            { "studentId": a, "status": "Present" },
            { "studentId": b, "status": "Present" }
        ]),
    );
    save_day(
        &mut sidecar,
        &class_id,
        "2025-08-05",
        json!([
            { "studentId": a, "status": "Present" },
            { "studentId": b, "status": "Sick" }
        ]),
    );

    let model = sidecar.request_ok(
        "reports.attendanceModel",
        json!({ "period": "this_month", "today": "2025-08-20", "classId": class_id }),
    );
    assert_eq!(model["status"], "ready");
    assert_eq!(model["period"]["start"], "2025-08-01");
    assert_eq!(model["period"]["end"], "2025-08-20");

    let rows = model["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Ani");
    assert_eq!(rows[0]["present"], 2);
    assert_eq!(rows[0]["attendancePercentage"].as_f64(), Some(100.0));
    assert_eq!(rows[1]["sick"], 1);
    assert_eq!(rows[1]["attendancePercentage"].as_f64(), Some(50.0));

    let summary = &model["summary"];
    assert_eq!(summary["effectiveDayCount"], 2);
    assert_eq!(summary["studentCount"], 2);
    assert_eq!(summary["recordCount"], 4);
    assert_eq!(summary["totalPresent"], 3);
    assert_eq!(summary["totalAbsentOrOther"], 1);
    assert_eq!(summary["averagePresencePercentage"].as_f64(), Some(75.0));
    assert_eq!(summary["statusTotals"]["sick"], 1);
}

#[test]
fn empty_range_returns_the_empty_marker() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let a = create_student(&mut sidecar, &class_id, "1001", "Ani");
    save_day(&mut sidecar, &class_id, "2025-06-10", json!([{ "studentId": a, "status": "Present" }]));

    let model = sidecar.request_ok(
        "reports.attendanceModel",
        json!({ "period": "last_month", "today": "2025-08-20" }),
    );
    assert_eq!(model, json!({ "status": "empty", "reason": "no_attendance_in_range" }));

    let model = sidecar.request_ok(
        "reports.attendanceModel",
        json!({ "startDate": "2025-06-01", "endDate": "2025-06-30" }),
    );
    assert_eq!(model["status"], "ready");
    assert_eq!(model["rows"][0]["present"], 1);
}

#[test]
fn period_parameters_are_validated() {
    let (_dir, mut sidecar) = open_workspace();
    assert_eq!(
        sidecar.request_err(
            "reports.attendanceModel",
            json!({ "period": "custom", "startDate": "2025-06-01" })
        ),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err(
            "reports.attendanceModel",
            json!({ "startDate": "2025-07-01", "endDate": "2025-06-01" })
        ),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("reports.attendanceModel", json!({ "period": "yesterday" })),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err("reports.attendanceModel", json!({ "classId": "missing" })),
        "not_found"
    );
}

#[test]
fn windows_reaching_past_the_calendar_are_rejected() {
    let (_dir, mut sidecar) = open_workspace();
    for period in ["last_7_days", "last_14_days", "last_month"] {
        assert_eq!(
            sidecar.request_err(
                "reports.attendanceModel",
                json!({ "period": period, "today": "-262143-01-01" })
            ),
            "bad_params",
            "{}",
            period
        );
    }
    assert_eq!(
        sidecar.request_err(
            "export.attendanceCsv",
            json!({ "period": "last_7_days", "today": "-262143-01-01" })
        ),
        "bad_params"
    );
    // The sidecar keeps serving after the rejection.
    let health = sidecar.request_ok("health", json!({}));
    assert!(health["workspacePath"].is_string());
}
