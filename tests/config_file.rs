use std::{fs, path::PathBuf};
use tempdir::TempDir;

use sensel_rs::{
    cli::ProgramArgs,
    config::Config,
    session::open_first,
    types::{ContactMask, ScanDetail},
    SenselError,
};

#[test]
fn test_config_file_is_applied() {
    let tmp_dir = TempDir::new("sensel").unwrap();
    let config_path = tmp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        "scan_detail = \"medium\"\n\
         contacts_mask = 5\n\
         max_frame_rate = 30\n\
         scan_loops = 12\n",
    )
    .unwrap();

    let args = ProgramArgs::new(None, Some(config_path), true);
    let resources = args.acquire_resources().unwrap();
    assert_eq!(resources.config.scan_loops, 12);
    assert_eq!(resources.config.led_brightness, 100);

    let lib = &*resources.backend;
    let device = open_first(lib).unwrap().unwrap();
    resources.config.apply(&device).unwrap();
    assert_eq!(device.scan_detail().unwrap(), ScanDetail::Medium);
    assert_eq!(
        device.contacts_mask().unwrap(),
        ContactMask::ELLIPSE | ContactMask::BOUNDING_BOX
    );
    assert_eq!(device.max_frame_rate().unwrap(), 30);
}

#[test]
fn test_generated_config_parses() {
    let tmp_dir = TempDir::new("sensel").unwrap();
    let config_path = tmp_dir.path().join("config.toml");
    fs::write(&config_path, Config::default().to_toml_string().unwrap()).unwrap();

    let args = ProgramArgs::new(None, Some(config_path), true);
    assert_eq!(args.load_config().unwrap(), Config::default());
}

#[test]
fn test_malformed_config() {
    let tmp_dir = TempDir::new("sensel").unwrap();
    let config_path = tmp_dir.path().join("config.toml");
    fs::write(&config_path, "scan_loops = \"many\"").unwrap();

    let args = ProgramArgs::new(None, Some(config_path), true);
    assert!(matches!(
        args.load_config(),
        Err(SenselError::ParseConfig(_))
    ));
}

#[test]
fn test_missing_config_file() {
    let args = ProgramArgs::new(None, Some(PathBuf::from("/nonexistent/sensel.toml")), true);
    assert!(matches!(args.load_config(), Err(SenselError::Generic(_))));
}

#[test]
fn test_library_path_from_config() {
    let tmp_dir = TempDir::new("sensel").unwrap();
    let config_path = tmp_dir.path().join("config.toml");
    let library_path = tmp_dir.path().join("libsensel-missing.so");
    fs::write(
        &config_path,
        format!("library_path = {:?}\n", library_path.display().to_string()),
    )
    .unwrap();

    let args = ProgramArgs::new(None, Some(config_path), false);
    match args.acquire_resources() {
        Err(SenselError::LoadLibrary { path, .. }) => assert_eq!(path, library_path),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("loaded a library that does not exist"),
    }
}
