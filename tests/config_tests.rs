use std::io::Write;
use std::path::{Path, PathBuf};

use zoom_viewer::config::{Configuration, ResampleFilter, StaleResultPolicy};

#[test]
fn empty_yaml_yields_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.window_size, [1000.0, 700.0]);
    assert!((cfg.initial_zoom - 1.0).abs() < f64::EPSILON);
    assert_eq!(cfg.resample_filter, ResampleFilter::Lanczos3);
    assert_eq!(cfg.stale_results, StaleResultPolicy::LatestOnly);
    assert_eq!(cfg.max_output_pixels, 150_000_000);
    assert!(cfg.supported_extensions.iter().any(|ext| ext == "tiff"));
    assert!(cfg.control_socket_path.is_none());
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
window-size: [800, 600]
initial-zoom: 2.5
resample-filter: catmull-rom
stale-results: show-all
max-output-pixels: 4000000
supported-extensions: [".PNG", " jpg ", ""]
control-socket-path: "/run/zoom-viewer/control.sock"
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.window_size, [800.0, 600.0]);
    assert!((cfg.initial_zoom - 2.5).abs() < f64::EPSILON);
    assert_eq!(cfg.resample_filter, ResampleFilter::CatmullRom);
    assert_eq!(cfg.stale_results, StaleResultPolicy::ShowAll);
    assert_eq!(cfg.max_output_pixels, 4_000_000);
    assert_eq!(cfg.supported_extensions, vec!["png", "jpg"]);
    assert_eq!(
        cfg.control_socket_path,
        Some(PathBuf::from("/run/zoom-viewer/control.sock"))
    );
}

#[test]
fn nearest_neighbour_is_not_offered() {
    let err = serde_yaml::from_str::<Configuration>("resample-filter: nearest").unwrap_err();
    assert!(err.to_string().contains("unknown variant"), "{err}");
}

#[test]
fn unknown_keys_are_rejected() {
    assert!(serde_yaml::from_str::<Configuration>("zoom-speed: 3").is_err());
}

#[test]
fn validation_rejects_bad_values() {
    let cases = [
        "initial-zoom: 0.05",
        "initial-zoom: 5.5",
        "initial-zoom: .nan",
        "max-output-pixels: 0",
        "supported-extensions: []",
        "supported-extensions: ['', '.']",
        "window-size: [0, 600]",
        "control-socket-path: /",
    ];
    for yaml in cases {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "{yaml} should fail validation");
    }
}

#[test]
fn load_reads_file_or_falls_back_to_defaults() {
    let defaults = Configuration::load(None).unwrap();
    assert_eq!(defaults.resample_filter, ResampleFilter::Lanczos3);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "resample-filter: mitchell").unwrap();
    let cfg = Configuration::load(Some(file.path())).unwrap();
    assert_eq!(cfg.resample_filter, ResampleFilter::Mitchell);

    let err = Configuration::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(format!("{err:#}").contains("failed to load configuration"));
}
