use std::fs;
use std::path::Path;
use std::sync::Arc;

use placement_desk::workflows::placement::tabular::{self, Table};
use placement_desk::workflows::placement::{
    DirectoryCriteriaSource, DirectoryReportSink, EligibilitySchema, FileRosterStore,
    LogNotifier, PipelineSettings, PlacementError, PlacementService, ReportFormat,
    RosterStoreError, RunParameters, SourceId, SourceState,
};

const ROSTER: &str = "\
Unnamed: 0,student_id,name,email,cgpa,place,sex
0,101,Asha,asha@college.test,9.1,Chennai,F
1,102,Bala,bala@college.test,7.4,Chennai,M
2,103,Chitra,chitra@college.test,8.2,Madurai,F
3,104,Dev,dev@college.test,,Madurai,M
";

fn read_table(path: &Path) -> Table {
    tabular::read_csv(fs::File::open(path).expect("file opens")).expect("csv parses")
}

fn column(table: &Table, name: &str) -> usize {
    table
        .headers
        .iter()
        .position(|header| header == name)
        .unwrap_or_else(|| panic!("column {name} missing from {:?}", table.headers))
}

fn service(
    roster: &Path,
    criteria: &Path,
    reports: &Path,
    format: ReportFormat,
) -> PlacementService<FileRosterStore, DirectoryCriteriaSource> {
    PlacementService::new(
        Arc::new(FileRosterStore::new(roster, EligibilitySchema::default())),
        Arc::new(DirectoryCriteriaSource::new(criteria)),
        Arc::new(DirectoryReportSink::new(reports, format)),
        Arc::new(LogNotifier),
        PipelineSettings::default(),
    )
}

#[tokio::test]
async fn csv_run_updates_roster_and_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster_path = dir.path().join("students.csv");
    let criteria_dir = dir.path().join("criteria");
    let report_dir = dir.path().join("reports");
    fs::write(&roster_path, ROSTER).expect("roster written");
    fs::create_dir_all(criteria_dir.join("talent@globex.test")).expect("criteria dir");
    fs::write(
        criteria_dir.join("hr@acme.test.txt"),
        "Hello,\nCGPA: 8.0\nPlace: Chennai\nThanks",
    )
    .expect("criteria written");
    fs::write(
        criteria_dir.join("talent@globex.test/2025-03-01.txt"),
        "sex: M",
    )
    .expect("older criteria written");
    fs::write(
        criteria_dir.join("talent@globex.test/2025-03-09.txt"),
        "place: Madurai",
    )
    .expect("newer criteria written");

    let outcome = service(&roster_path, &criteria_dir, &report_dir, ReportFormat::Csv)
        .run(
            &SourceId::parse_list("hr@acme.test, talent@globex.test, nobody@initech.test"),
            &RunParameters {
                recipients: vec!["tpo@college.test".to_string()],
                ..RunParameters::default()
            },
        )
        .await
        .expect("run succeeds");

    assert_eq!(outcome.counts_per_source[&SourceId::new("hr@acme.test")], 1);
    assert_eq!(outcome.counts_per_source[&SourceId::new("talent@globex.test")], 2);
    assert_eq!(outcome.sources[2].state, SourceState::NoCriteria);
    assert_eq!(outcome.scheduled, 3);
    assert!(outcome.notified);

    let roster = read_table(&roster_path);
    assert!(!roster.headers.iter().any(|header| header.starts_with("Unnamed")));
    let acme = column(&roster, "status_hr@acme.test");
    let globex = column(&roster, "status_talent@globex.test");
    let initech = column(&roster, "status_nobody@initech.test");
    assert_eq!(roster.rows[0][acme], "Selected");
    assert_eq!(roster.rows[1][acme], "Not Selected");
    assert_eq!(roster.rows[2][globex], "Selected");
    assert_eq!(roster.rows[3][globex], "Selected");
    assert!(roster.rows.iter().all(|row| row[initech] == "Not Selected"));
    assert_eq!(roster.rows[3][column(&roster, "cgpa")], "");

    let report_path = outcome.report_path.expect("report written");
    assert_eq!(
        report_path,
        report_dir.join("selected_students_with_exams.csv")
    );
    let report = read_table(&report_path);
    let ids: Vec<&str> = report.rows.iter().map(|row| row[0].as_str()).collect();
    assert_eq!(ids, ["101", "103", "104"]);
    let date = column(&report, "exam_date");
    let time = column(&report, "exam_time");
    assert_eq!(report.rows[2][date], "2025-04-03");
    assert_eq!(report.rows[2][time], "04:00 PM");
}

#[tokio::test]
async fn xlsx_roster_round_trips_through_a_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster_path = dir.path().join("students.xlsx");
    let criteria_dir = dir.path().join("criteria");
    let report_dir = dir.path().join("reports");
    let table = tabular::read_csv(ROSTER.as_bytes()).expect("csv parses");
    tabular::write_xlsx(&table, &roster_path).expect("xlsx written");
    fs::create_dir_all(&criteria_dir).expect("criteria dir");
    fs::write(criteria_dir.join("hr@acme.test.txt"), "cgpa: 8").expect("criteria written");

    let outcome = service(&roster_path, &criteria_dir, &report_dir, ReportFormat::Xlsx)
        .run(&[SourceId::new("hr@acme.test")], &RunParameters::default())
        .await
        .expect("run succeeds");

    assert_eq!(outcome.scheduled, 2);
    let report_path = outcome.report_path.expect("report written");
    assert_eq!(
        report_path.extension().and_then(|ext| ext.to_str()),
        Some("xlsx")
    );

    let roster = tabular::read_xlsx(&roster_path).expect("roster readable");
    let status = column(&roster, "status_hr@acme.test");
    assert_eq!(roster.rows[0][status], "Selected");
    assert_eq!(roster.rows[1][status], "Not Selected");

    let report = tabular::read_xlsx(&report_path).expect("report readable");
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[1][column(&report, "cgpa")], "8.2");
}

#[tokio::test]
async fn missing_roster_file_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = service(
        &dir.path().join("absent.csv"),
        dir.path(),
        &dir.path().join("reports"),
        ReportFormat::Csv,
    )
    .run(&[SourceId::new("hr@acme.test")], &RunParameters::default())
    .await;

    assert!(matches!(
        result,
        Err(PlacementError::RosterLoad(RosterStoreError::NotFound(_)))
    ));
}

#[tokio::test]
async fn empty_selection_leaves_no_report_behind() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster_path = dir.path().join("students.csv");
    let report_dir = dir.path().join("reports");
    fs::write(&roster_path, ROSTER).expect("roster written");
    fs::write(dir.path().join("hr@acme.test.txt"), "cgpa: 9.9").expect("criteria written");

    let outcome = service(&roster_path, dir.path(), &report_dir, ReportFormat::Csv)
        .run(&[SourceId::new("hr@acme.test")], &RunParameters::default())
        .await
        .expect("run succeeds");

    assert!(outcome.report_path.is_none());
    assert!(!report_dir.exists());
    let roster = read_table(&roster_path);
    let status = column(&roster, "status_hr@acme.test");
    assert!(roster.rows.iter().all(|row| row[status] == "Not Selected"));
}

#[tokio::test]
async fn reruns_keep_existing_status_headers_and_foreign_labels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let roster_path = dir.path().join("students.csv");
    let report_dir = dir.path().join("reports");
    fs::write(
        &roster_path,
        "\
student_id,name,email,cgpa,place,sex,status_HR@acme.test,status_old@corp.test
101,Asha,asha@college.test,9.0,Chennai,F,Not Responded,Shortlisted
102,Bala,bala@college.test,7.4,Chennai,M,,Selected
",
    )
    .expect("roster written");
    fs::write(dir.path().join("hr@acme.test.txt"), "cgpa: 8").expect("criteria written");

    let service = service(&roster_path, dir.path(), &report_dir, ReportFormat::Csv);
    for source in ["HR@acme.test", "hr@acme.test", "Hr@Acme.Test"] {
        let outcome = service
            .run(&[SourceId::new(source)], &RunParameters::default())
            .await
            .expect("run succeeds");
        assert_eq!(outcome.scheduled, 1);
    }

    let roster = read_table(&roster_path);
    assert_eq!(
        roster.headers,
        [
            "student_id",
            "name",
            "email",
            "cgpa",
            "place",
            "sex",
            "status_HR@acme.test",
            "status_old@corp.test",
        ]
    );
    let hr = column(&roster, "status_HR@acme.test");
    let old = column(&roster, "status_old@corp.test");
    assert_eq!(roster.rows[0][hr], "Selected");
    assert_eq!(roster.rows[1][hr], "Not Selected");
    assert_eq!(roster.rows[0][old], "Shortlisted");
    assert_eq!(roster.rows[1][old], "Selected");
    assert_eq!(roster.rows[0][column(&roster, "cgpa")], "9.0");

    let report = read_table(&report_dir.join("selected_students_with_exams.csv"));
    assert!(!report.headers.iter().any(|header| header.starts_with("status_")));
}
