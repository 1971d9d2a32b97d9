mod test_support;

use serde_json::json;
use test_support::{create_assessment, create_class, create_student, create_type, open_workspace};

fn roster_names(sidecar: &mut test_support::Sidecar, class_id: &str) -> Vec<String> {
    let res = sidecar.request_ok("students.list", json!({ "classId": class_id }));
    res["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn student_update_applies_patch_fields() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");

    sidecar.request_ok(
        "students.update",
        json!({
            "studentId": ani,
            "patch": { "name": " Ani Lestari ", "gender": "P", "dateOfBirth": "2012-03-04" }
        }),
    );
    let res = sidecar.request_ok("students.list", json!({ "classId": class_id }));
    let s = &res["students"][0];
    assert_eq!(s["name"], "Ani Lestari");
    assert_eq!(s["nis"], "1001");
    assert_eq!(s["gender"], "P");
    assert_eq!(s["dateOfBirth"], "2012-03-04");

    sidecar.request_ok(
        "students.update",
        json!({ "studentId": ani, "patch": { "gender": null } }),
    );
    let res = sidecar.request_ok("students.list", json!({ "classId": class_id }));
    assert!(res["students"][0]["gender"].is_null());

    for params in [
        json!({ "studentId": ani }),
        json!({ "studentId": ani, "patch": { "name": "  " } }),
        json!({ "studentId": ani, "patch": { "dateOfBirth": "04/03/2012" } }),
        json!({ "studentId": ani, "patch": { "classId": "elsewhere" } }),
    ] {
        let code = sidecar.request_err("students.update", params.clone());
        assert_eq!(code, "bad_params", "{}", params);
    }
    assert_eq!(
        sidecar.request_err(
            "students.update",
            json!({ "studentId": "missing", "patch": { "name": "X" } })
        ),
        "not_found"
    );
}

#[test]
fn moved_student_joins_the_end_of_the_new_roster() {
    let (_dir, mut sidecar) = open_workspace();
    let a = create_class(&mut sidecar, "VII A");
    let b = create_class(&mut sidecar, "VII B");
    let ani = create_student(&mut sidecar, &a, "1001", "Ani");
    create_student(&mut sidecar, &a, "1002", "Budi");
    create_student(&mut sidecar, &b, "2001", "Citra");

    sidecar.request_ok("students.move", json!({ "studentId": ani, "classId": b }));
    assert_eq!(roster_names(&mut sidecar, &a), vec!["Budi"]);
    assert_eq!(roster_names(&mut sidecar, &b), vec!["Citra", "Ani"]);

    let report = sidecar.request_ok("reports.studentModel", json!({ "studentId": ani }));
    assert_eq!(report["className"], "VII B");

    assert_eq!(
        sidecar.request_err("students.move", json!({ "studentId": ani, "classId": "missing" })),
        "not_found"
    );
    assert_eq!(
        sidecar.request_err("students.move", json!({ "studentId": "missing", "classId": a })),
        "not_found"
    );
}

#[test]
fn deleted_student_drops_out_of_reports() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");
    let budi = create_student(&mut sidecar, &class_id, "1002", "Budi");
    for (date, budi_status) in [("2025-08-04", "Present"), ("2025-08-05", "Absent")] {
        sidecar.request_ok(
            "attendance.save",
            json!({
                "classId": class_id,
                "date": date,
                "entries": [
                    { "studentId": ani, "status": "Present" },
                    { "studentId": budi, "status": budi_status }
                ]
            }),
        );
    }

    sidecar.request_ok("students.delete", json!({ "studentId": budi }));
    assert_eq!(
        sidecar.request_err("students.delete", json!({ "studentId": budi })),
        "not_found"
    );
    assert_eq!(roster_names(&mut sidecar, &class_id), vec!["Ani"]);

    let params = json!({ "startDate": "2025-08-01", "endDate": "2025-08-31", "classId": class_id });
    let model = sidecar.request_ok("reports.attendanceModel", params.clone());
    assert_eq!(model["status"], "ready");
    let rows = model["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Ani");
    let summary = &model["summary"];
    assert_eq!(summary["studentCount"], 1);
    assert_eq!(summary["recordCount"], 4);
    assert_eq!(summary["effectiveDayCount"], 2);
    assert_eq!(summary["totalPresent"], 2);
    assert_eq!(summary["totalAbsentOrOther"], 0);
    assert_eq!(summary["averagePresencePercentage"].as_f64(), Some(100.0));

    let file = sidecar.request_ok("export.attendanceCsv", params);
    assert_eq!(
        file["content"],
        "Nama Siswa,Hadir,Sakit,Izin,Alfa,Kehadiran (%)\nAni,2,0,0,0,100.0"
    );

    assert_eq!(
        sidecar.request_err("reports.studentModel", json!({ "studentId": budi })),
        "not_found"
    );
}

#[test]
fn deleted_only_student_leaves_a_ready_report_without_rows() {
    let (_dir, mut sidecar) = open_workspace();
    let class_id = create_class(&mut sidecar, "VII A");
    let ani = create_student(&mut sidecar, &class_id, "1001", "Ani");
    let uh = create_type(&mut sidecar, "UH");
    let a1 = create_assessment(&mut sidecar, &class_id, &uh, "Bab 1", "2025-08-01");
    sidecar.request_ok(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2025-08-04",
            "entries": [{ "studentId": ani, "status": "Present" }]
        }),
    );
    sidecar.request_ok(
        "grades.save",
        json!({ "assessmentId": a1, "entries": [{ "studentId": ani, "score": 90 }] }),
    );
    sidecar.request_ok("students.delete", json!({ "studentId": ani }));

    let params = json!({ "startDate": "2025-08-01", "endDate": "2025-08-31" });
    let model = sidecar.request_ok("reports.attendanceModel", params.clone());
    assert_eq!(model["status"], "ready");
    assert!(model["rows"].as_array().expect("rows").is_empty());
    assert_eq!(model["summary"]["recordCount"], 1);
    assert_eq!(model["summary"]["averagePresencePercentage"].as_f64(), Some(0.0));
    let res = sidecar.request_ok("export.attendanceCsv", params);
    assert_eq!(res, json!({ "status": "empty", "reason": "no_rows" }));

    let grid = sidecar.request_ok("reports.gradeModel", json!({ "classId": class_id }));
    assert_eq!(grid["status"], "ready");
    assert!(grid["rows"].as_array().expect("rows").is_empty());
    assert_eq!(grid["stats"][0]["scoredCount"], 0);
}
