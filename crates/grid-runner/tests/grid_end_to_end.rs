use grid_runner::{
    run_grid, Configuration, GridAxes, GridPlan, IterationError, ResultSink, Scenario, Subject,
};
use std::fs;
use std::path::PathBuf;

fn report(scenario: &str, total: u64, exec: u64, write: u64, read: u64) -> String {
    format!(
        "Scenario            : {scenario}
=============================================================
Total test time     : {total} ms
Execution time      : {exec} ms
 ├──Write evnt time : {write} ms
 ├──Read evnt time  : {read} ms
 └──Read/Write ratio: 10
Cache memory usage  : 2,359,296 bytes
 └──Cache capacity  : 128 items
Global memory usage : 3,670,016 bytes
 └──Capacity        : 1,024 items
Events              : 500,000 events
 └──Size between    : 173 and 3,538 bytes
Threads             : 6 threads
"
    )
}

fn two_scenario_plan(runs: usize) -> GridPlan {
    let axes = GridAxes {
        scenarios: vec![Scenario::MutexVector, Scenario::RwLockVector],
        capacities: vec![1024],
        cache_capacities: vec![128],
        event_counts: vec![500_000],
        thread_counts: vec![6],
        read_write_ratios: vec![10],
        min_payload_size: 173,
        max_payload_size: 3538,
    };
    GridPlan::new(axes, runs).expect("valid plan")
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "gridbench_e2e_{}_{}_{}",
        name,
        std::process::id(),
        chrono::Utc::now().timestamp_micros()
    ))
}

/// Fails every iteration of mutex-vector; rw-lock-vector always reports the
/// same timings.
struct Stub {
    invocations: Vec<Scenario>,
}

impl Subject for Stub {
    fn invoke(&mut self, config: &Configuration) -> Result<String, IterationError> {
        self.invocations.push(config.scenario());
        match config.scenario() {
            Scenario::MutexVector => Err(IterationError::Exit {
                status: "1".to_string(),
                stderr_tail: "scenario crashed".to_string(),
            }),
            _ => Ok(report("RwLockVector", 250, 240, 70, 170)),
        }
    }
}

#[test]
fn one_failing_and_one_succeeding_configuration() {
    let plan = two_scenario_plan(3);
    let path = temp_path("stub.csv");
    let mut subject = Stub {
        invocations: Vec::new(),
    };
    let mut sink = ResultSink::create(&path).expect("create results");
    let report = run_grid(&plan, &mut subject, &mut sink, &mut std::io::sink()).expect("run");
    drop(sink);

    assert_eq!(
        subject.invocations,
        vec![
            Scenario::MutexVector,
            Scenario::MutexVector,
            Scenario::MutexVector,
            Scenario::RwLockVector,
            Scenario::RwLockVector,
            Scenario::RwLockVector,
        ]
    );
    assert_eq!(report.total_configurations, 2);
    assert_eq!(report.tested, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed_iterations, 3);

    let table = fs::read_to_string(&path).expect("read results");
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2, "header plus one row: {table}");
    assert!(lines[0].starts_with("Global capacity,Cache capacity,Events,Threads,Read/Write Ratio,Scenario,"));
    assert_eq!(
        lines[1],
        "1024,128,500000,6,10,rw-lock-vector,250,250,250,240,240,240,70,70,70,170,170,170"
    );
    let _ = fs::remove_file(path);
}

#[test]
fn rerunning_the_same_plan_reproduces_the_table() {
    let plan = two_scenario_plan(2);
    let mut tables = Vec::new();
    for _ in 0..2 {
        let mut subject = Stub {
            invocations: Vec::new(),
        };
        let mut sink = ResultSink::new(Vec::new(), "memory").expect("sink");
        run_grid(&plan, &mut subject, &mut sink, &mut std::io::sink()).expect("run");
        tables.push(sink.into_inner().expect("flush"));
    }
    assert_eq!(tables[0], tables[1]);
}

#[cfg(unix)]
#[test]
fn process_subject_runs_a_real_executable() {
    use grid_runner::ProcessSubject;
    use std::os::unix::fs::PermissionsExt;

    let dir = temp_path("subject_dir");
    fs::create_dir_all(&dir).expect("temp dir");
    let exe = dir.join("fake_memdb");
    let script = format!(
        "#!/bin/sh
case \"$*\" in
  *\"--scenario mutex-vector\"*) echo \"thread panicked\" >&2; exit 101 ;;
esac
cat <<'REPORT'
{}REPORT
",
        report("RwLockVector", 120, 110, 30, 80)
    );
    fs::write(&exe, script).expect("write subject");
    fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut subject = ProcessSubject::new(&exe);
    subject.verify().expect("subject exists");

    let plan = two_scenario_plan(2);
    let out = dir.join("results.csv");
    let mut sink = ResultSink::create(&out).expect("create results");
    let mut status = Vec::new();
    let report = run_grid(&plan, &mut subject, &mut sink, &mut status).expect("run");
    drop(sink);

    assert_eq!(report.tested, 1);
    assert_eq!(report.failed_iterations, 2);
    let table = fs::read_to_string(&out).expect("read results");
    assert_eq!(
        table.lines().nth(1),
        Some("1024,128,500000,6,10,rw-lock-vector,120,120,120,110,110,110,30,30,30,80,80,80")
    );
    assert_eq!(table.lines().count(), 2);
    let status = String::from_utf8(status).expect("utf8");
    assert!(status.contains("No successful runs - skipping"), "{status}");

    let _ = fs::remove_dir_all(dir);
}
