#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_rekapd");
    let mut child = Command::new(exe)
        .env("REKAPD_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rekapd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(json!({}))
    }

    /// Returns the error code of a request that is expected to fail.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"].as_str().unwrap_or("").to_string()
    }
}

/// Sidecar with a fresh workspace already selected.
pub fn open_workspace() -> (tempfile::TempDir, Sidecar) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sidecar = spawn_sidecar();
    sidecar.request_ok(
        "workspace.select",
        json!({ "path": dir.path().to_string_lossy() }),
    );
    (dir, sidecar)
}

pub fn create_class(sidecar: &mut Sidecar, name: &str) -> String {
    let res = sidecar.request_ok("classes.create", json!({ "name": name }));
    res["classId"].as_str().expect("classId").to_string()
}

pub fn create_student(sidecar: &mut Sidecar, class_id: &str, nis: &str, name: &str) -> String {
    let res = sidecar.request_ok(
        "students.create",
        json!({ "classId": class_id, "nis": nis, "name": name }),
    );
    res["studentId"].as_str().expect("studentId").to_string()
}

pub fn create_type(sidecar: &mut Sidecar, name: &str) -> String {
    let res = sidecar.request_ok("assessmentTypes.create", json!({ "name": name }));
    res["assessmentTypeId"].as_str().expect("assessmentTypeId").to_string()
}

pub fn create_assessment(
    sidecar: &mut Sidecar,
    class_id: &str,
    type_id: &str,
    title: &str,
    date: &str,
) -> String {
    let res = sidecar.request_ok(
        "assessments.create",
        json!({ "classId": class_id, "assessmentTypeId": type_id, "title": title, "date": date }),
    );
    res["assessmentId"].as_str().expect("assessmentId").to_string()
}
