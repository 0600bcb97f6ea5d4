mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, select_seeded_workspace};

#[test]
fn out_of_range_row_is_reported_and_valid_row_commits() {
    let (workspace, _child, mut stdin, mut reader) =
        select_seeded_workspace("gradingd-import-row-errors");
    let csv = workspace.join("marks.csv");
    std::fs::write(
        &csv,
        "Student ID,Mid Exam (/20),Final Exam (/40)\r\nU1001,25,30\r\nU1002,15,30\r\n",
    )
    .expect("write csv");

    let batch = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.import",
        json!({ "classId": "k1", "inPath": csv.to_string_lossy() }),
    );
    assert_eq!(batch["created"], 1);
    assert_eq!(batch["updated"], 0);
    assert_eq!(batch["rowsSeen"], 2);
    assert_eq!(batch["errors"], json!(["Row 2: Mid Exam must be 0-20"]));
    assert_eq!(batch["sha256"].as_str().map(|s| s.len()), Some(64));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "studentId": "s1" }),
    );
    assert_eq!(listed["records"].as_array().map(|a| a.len()), Some(0));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "records.list",
        json!({ "studentId": "s2" }),
    );
    let records = listed["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["totalMarks"], 45.0);
    assert_eq!(records[0]["grade"], "F");
    assert_eq!(records[0]["semester"], "Fall");
    assert_eq!(records[0]["year"], 2024);

    // Same file again: the valid row reconciles in place.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.import",
        json!({ "classId": "k1", "inPath": csv.to_string_lossy() }),
    );
    assert_eq!(again["created"], 0);
    assert_eq!(again["updated"], 1);
    assert_eq!(again["sha256"], batch["sha256"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_student_does_not_abort_the_batch() {
    let (workspace, _child, mut stdin, mut reader) =
        select_seeded_workspace("gradingd-import-unknown-student");
    let csv = workspace.join("marks.csv");
    std::fs::write(
        &csv,
        "student_no,mid,final,assessment,project,assignment,presentation\n\
         U1001,18,35,9,9,9,9\n\
         U1002,12,28,7,8,6,7\n\
         X9999,10,20,5,5,5,5\n\
         U1004,20,40,10,10,10,10\n\
         U1005,,,,,,\n",
    )
    .expect("write csv");

    let batch = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "marks.import",
        json!({ "classId": "k1", "inPath": csv.to_string_lossy() }),
    );
    assert_eq!(batch["created"], 4);
    assert_eq!(batch["errors"], json!(["Row 4: Student \"X9999\" not found"]));
    assert_eq!(batch["missingColumns"], json!([]));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "records.list",
        json!({ "studentId": "s4" }),
    );
    assert_eq!(listed["records"][0]["totalMarks"], 100.0);
    assert_eq!(listed["records"][0]["grade"], "A");
    assert_eq!(listed["records"][0]["creditHours"], 3.0);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn structural_problems_fail_the_whole_batch() {
    let (workspace, _child, mut stdin, mut reader) =
        select_seeded_workspace("gradingd-import-structural");

    let no_id = workspace.join("no-id.csv");
    std::fs::write(&no_id, "Name,Mid Exam\nAda,10\n").expect("write csv");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "marks.import",
        json!({ "classId": "k1", "inPath": no_id.to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "bad_spreadsheet");

    let good = workspace.join("good.csv");
    std::fs::write(&good, "Student ID,Mid Exam\nU1001,10\n").expect("write csv");
    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "marks.import",
        json!({ "classId": "nope", "inPath": good.to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "not_found");

    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "marks.import",
        json!({ "classId": "k1", "inPath": workspace.join("missing.csv").to_string_lossy() }),
    );
    assert_eq!(error_code(&error), "io_failed");

    let conn = test_support::open_workspace_db(&workspace);
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM exam_records", [], |r| r.get(0))
        .expect("count");
    assert_eq!(count, 0);

    let _ = std::fs::remove_dir_all(workspace);
}
