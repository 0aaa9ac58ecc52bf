use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Write a chart spec to a scratch file unique to this test.
fn write_spec(name: &str, spec: &Value) -> PathBuf {
    let path = std::env::temp_dir().join(format!("gramstat-{}-{}.json", name, std::process::id()));
    fs::write(&path, spec.to_string()).expect("Failed to write spec file");
    path
}

/// Helper function to run gramstat with a spec and CSV on stdin
fn run_gramstat(name: &str, spec: &Value, csv_content: &str) -> Result<Value, String> {
    let spec_path = write_spec(name, spec);
    let mut child = Command::new(env!("CARGO_BIN_EXE_gramstat"))
        .arg(&spec_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to spawn process: {}", e))?;

    // Write CSV to stdin
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(csv_content.as_bytes())
            .map_err(|e| format!("Failed to write to stdin: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("Failed to wait for process: {}", e))?;
    let _ = fs::remove_file(&spec_path);

    if output.status.success() {
        serde_json::from_slice(&output.stdout).map_err(|e| format!("Invalid JSON output: {}", e))
    } else {
        Err(String::from_utf8_lossy(&output.stderr).to_string())
    }
}

fn scatter_csv() -> String {
    fs::read_to_string("test/scatter.csv").expect("Failed to read test CSV")
}

fn records(output: &Value, layer: usize) -> &Vec<Value> {
    output["layers"][layer]["records"].as_array().expect("records array")
}

#[test]
fn test_end_to_end_points() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "point"}]
    });
    let output = run_gramstat("points", &spec, &scatter_csv()).unwrap();
    let recs = records(&output, 0);
    assert_eq!(recs.len(), 8);
    assert_eq!(recs[0]["rowIndex"], 0);
    assert_eq!(recs[7]["x"], 8.0);
    assert_eq!(recs[0]["style"]["color"], "black");
    assert_eq!(output["coord"]["kind"], "cartesian");
}

#[test]
fn test_end_to_end_points_plus_smooth_by_group() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y", "color": "species"},
        "layers": [
            {"geom": "point"},
            {"geom": "smooth", "stat": "smooth", "stat_params": {"n": 10}}
        ]
    });
    let output = run_gramstat("smooth", &spec, &scatter_csv()).unwrap();
    assert_eq!(records(&output, 0).len(), 8);

    let smooth = records(&output, 1);
    assert_eq!(smooth.len(), 20);
    for rec in smooth {
        assert_eq!(rec["rowIndex"], -1);
        let (y, lo, hi) = (
            rec["y"].as_f64().unwrap(),
            rec["ymin"].as_f64().unwrap(),
            rec["ymax"].as_f64().unwrap(),
        );
        assert!(lo <= y && y <= hi);
    }
    assert_ne!(smooth[0]["style"]["color"], smooth[19]["style"]["color"]);
}

#[test]
fn test_end_to_end_contour_levels() {
    let csv = fs::read_to_string("test/grid.csv").expect("Failed to read test CSV");
    let spec = json!({
        "mapping": {"x": "lon", "y": "lat", "z": "depth"},
        "layers": [{"geom": "path", "stat": "contour", "stat_params": {"bins": 2}}]
    });
    let output = run_gramstat("contour", &spec, &csv).unwrap();
    let groups: Vec<&str> = records(&output, 0)
        .iter()
        .map(|r| r["group"].as_str().unwrap())
        .collect();
    assert_eq!(groups, vec!["level-0", "level-0", "level-0", "level-1", "level-1", "level-1"]);
}

#[test]
fn test_end_to_end_flip_coord() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "point"}],
        "coord": {"kind": "flip"}
    });
    let output = run_gramstat("flip", &spec, &scatter_csv()).unwrap();
    let first = &records(&output, 0)[0];
    assert_eq!(first["x"], 2.1);
    assert_eq!(first["y"], 1.0);
    assert_eq!(output["coord"]["kind"], "flip");
}

#[test]
fn test_end_to_end_manual_color_scale() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y", "color": "species"},
        "layers": [{
            "geom": "point",
            "scales": {"color": {"levels": ["a", "b"], "values": ["red", "blue"]}}
        }]
    });
    let output = run_gramstat("manual", &spec, &scatter_csv()).unwrap();
    let recs = records(&output, 0);
    assert_eq!(recs[0]["style"]["color"], "red");
    assert_eq!(recs[7]["style"]["color"], "blue");
}

#[test]
fn test_data_file_option() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "point", "stat": "sample", "stat_params": {"n": 3, "seed": 7}}]
    });
    let spec_path = write_spec("datafile", &spec);
    let output = Command::new(env!("CARGO_BIN_EXE_gramstat"))
        .arg(&spec_path)
        .args(["--data", "test/scatter.csv", "--compact"])
        .output()
        .expect("Failed to run gramstat");
    let _ = fs::remove_file(&spec_path);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows: Vec<i64> = records(&value, 0)
        .iter()
        .map(|r| r["rowIndex"].as_i64().unwrap())
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_error_unknown_stat() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "point", "stat": "bogus"}]
    });
    let result = run_gramstat("unknown-stat", &spec, &scatter_csv());
    let stderr = result.unwrap_err();
    assert!(stderr.contains("Unknown stat 'bogus'"), "stderr: {}", stderr);
}

#[test]
fn test_error_invalid_stat_param() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "smooth", "stat": "smooth", "stat_params": {"level": 1.5}}]
    });
    let stderr = run_gramstat("bad-level", &spec, &scatter_csv()).unwrap_err();
    assert!(stderr.contains("'level'"), "stderr: {}", stderr);
    assert!(stderr.contains("layer 0"), "stderr: {}", stderr);
}

#[test]
fn test_error_missing_column() {
    let spec = json!({
        "mapping": {"x": "x", "y": "weight"},
        "layers": [{"geom": "point"}]
    });
    let stderr = run_gramstat("missing-column", &spec, &scatter_csv()).unwrap_err();
    assert!(stderr.contains("weight"), "stderr: {}", stderr);
}

#[test]
fn test_error_empty_csv() {
    let spec = json!({
        "mapping": {"x": "x", "y": "y"},
        "layers": [{"geom": "point"}]
    });
    assert!(run_gramstat("empty", &spec, "x,y\n").is_err());
}

#[test]
fn test_error_no_layers() {
    let spec = json!({"mapping": {"x": "x", "y": "y"}, "layers": []});
    assert!(run_gramstat("no-layers", &spec, &scatter_csv()).is_err());
}
