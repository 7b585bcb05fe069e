use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use bean_sorter::config::SorterConfig;
use bean_sorter::Orientation;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SORTER_CONFIG",
        "SORTER_SERIAL_PORT",
        "SORTER_BAUD_RATE",
        "SORTER_SETTLE_MS",
        "SORTER_SIMULATE",
        "SORTER_DETECTOR_SOURCE",
        "SORTER_CONFIDENCE",
        "SORTER_API_KEY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SorterConfig::load().expect("load defaults");
    assert_eq!(cfg.actuator.port, "/dev/ttyACM0");
    assert_eq!(cfg.actuator.baud_rate, 9600);
    assert_eq!(cfg.detector.source, "sim://tray");
    assert_eq!(cfg.detector.model, "jellybelly5");
    assert_eq!(cfg.machine.feed_rate, 300);
    assert_eq!(cfg.session.tick_interval, Duration::from_millis(1));
    assert!(!cfg.actuator.simulate);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let key_file = NamedTempFile::new().expect("temp key");
    std::fs::write(key_file.path(), "  secret-key\n").expect("write key");
    let json = format!(
        r#"{{
            "frame": {{ "width": 800, "height": 600, "flip_x": false }},
            "mapping": {{ "scale": [0.5, -0.5], "offset": [100, 200], "divisor": 10 }},
            "machine": {{ "feed_rate": 450, "z_travel": [0, 0.5] }},
            "actuator": {{ "port": "/dev/ttyUSB3", "settle_ms": 250 }},
            "detector": {{
                "source": "https://detect.example.test/jellybelly5/1",
                "api_key_path": "{}",
                "confidence": 0.4
            }},
            "session": {{ "auto_pick_limit": 12 }}
        }}"#,
        key_file.path().display()
    );
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SORTER_CONFIG", file.path());
    std::env::set_var("SORTER_SERIAL_PORT", "/dev/ttyACM1");
    std::env::set_var("SORTER_SIMULATE", "yes");

    let cfg = SorterConfig::load().expect("load config");
    assert_eq!(cfg.frame.width, 800);
    assert_eq!(cfg.frame.height, 600);
    assert_eq!(
        cfg.frame.orientation,
        Orientation {
            flip_x: false,
            flip_y: true
        }
    );
    assert_eq!(cfg.mapping.divisor, 10.0);
    assert_eq!(cfg.machine.feed_rate, 450);
    assert_eq!(cfg.machine.bounds.z, (0.0, 0.5));
    assert_eq!(cfg.machine.bounds.x, (0.0, 3.45));
    assert_eq!(cfg.actuator.port, "/dev/ttyACM1");
    assert_eq!(cfg.actuator.settle_delay, Duration::from_millis(250));
    assert!(cfg.actuator.simulate);
    assert_eq!(cfg.detector.api_key.as_deref(), Some("secret-key"));
    assert_eq!(cfg.detector.confidence, 0.4);
    assert_eq!(cfg.session.auto_pick_limit, 12);

    // Mapping settings flow into the mapper: unflipped x, flipped y.
    let mapped = cfg.mapper().map(100.0, 100.0);
    assert!((mapped.x_mm - 15.0).abs() < 1e-9);
    assert!((mapped.y_mm + 5.0).abs() < 1e-9);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    std::fs::write(
        file.path(),
        r#"
[actuator]
baud_rate = 115200
wake_ms = 500

[detector]
source = "sim://tray?beans=5&seed=9"
overlap = 0.3
"#,
    )
    .expect("write config");
    std::env::set_var("SORTER_CONFIG", file.path());
    std::env::set_var("SORTER_SETTLE_MS", "0");

    let cfg = SorterConfig::load().expect("load toml config");
    assert_eq!(cfg.actuator.baud_rate, 115200);
    assert_eq!(cfg.actuator.wake_delay, Duration::from_millis(500));
    assert_eq!(cfg.actuator.settle_delay, Duration::ZERO);
    assert_eq!(cfg.detector.source, "sim://tray?beans=5&seed=9");
    assert_eq!(cfg.detector.overlap, 0.3);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SORTER_BAUD_RATE", "fast");
    let err = SorterConfig::load().unwrap_err();
    assert!(err.to_string().contains("SORTER_BAUD_RATE"));

    clear_env();
    std::env::set_var("SORTER_CONFIDENCE", "1.7");
    let err = SorterConfig::load().unwrap_err();
    assert!(err.to_string().contains("confidence"));

    clear_env();
}

#[test]
fn rejects_missing_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SORTER_CONFIG", "/nonexistent/sorter.toml");
    let err = SorterConfig::load().unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
