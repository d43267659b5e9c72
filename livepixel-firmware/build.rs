//! Build script for livepixel-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates livepixel.toml at compile time
//! - Checks that the CYW43 firmware blobs are present

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Blobs loaded into the WiFi chip at boot, see `src/main.rs`
const CYW43_BLOBS: &[&str] = &["cyw43-firmware/43439A0.bin", "cyw43-firmware/43439A0_clm.bin"];

/// Must match `livepixel_core::config::MIN_QUEUE_CAPACITY`
const MIN_QUEUE_CAPACITY: i64 = 256;

/// Must match `livepixel_core::QUEUE_SLOTS`
const QUEUE_SLOTS: i64 = 4096;

/// Must match `livepixel_core::pipeline::MAX_RENDER_BATCH`
const MAX_RENDER_BATCH: i64 = 64;

fn main() {
    setup_linker();
    check_wifi_blobs();
    validate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to the output directory
    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    // Tell rustc where to find memory.x
    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    #[cfg(feature = "defmt")]
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    // Re-run if memory.x changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// The radio firmware is not redistributed with this crate
fn check_wifi_blobs() {
    let missing: Vec<&str> = CYW43_BLOBS
        .iter()
        .copied()
        .filter(|blob| {
            println!("cargo:rerun-if-changed={}", blob);
            !Path::new(blob).exists()
        })
        .collect();

    if !missing.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: CYW43 firmware blobs not found!                          ║\n\
            ║                                                                  ║\n\
            ║  Copy 43439A0.bin and 43439A0_clm.bin from the embassy           ║\n\
            ║  repository (cyw43-firmware/) into livepixel-firmware/.          ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            missing
                .iter()
                .map(|m| format!("║  • missing {:<55} ║", m))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

/// Validate livepixel.toml configuration at compile time
fn validate_config() {
    // Re-run if livepixel.toml changes
    println!("cargo:rerun-if-changed=livepixel.toml");

    let config_path = Path::new("livepixel.toml");

    // Check if config file exists
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: livepixel.toml not found!                                ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a livepixel.toml configuration file.      ║\n\
            ║  Please create one in the livepixel-firmware directory.          ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    // Read the config file
    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read livepixel.toml                            ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    // Parse and validate TOML syntax
    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in livepixel.toml                    ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_wifi(&config, &mut errors);
    validate_server(&config, &mut errors);
    validate_canvas(&config, &mut errors);
    validate_pipeline(&config, &mut errors);
    report("Invalid livepixel.toml", &errors);

    println!("cargo:warning=livepixel.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn report(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }

    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// The firmware parser only knows these sections and no nesting
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(table) = config.as_table() else {
        return;
    };

    for (name, value) in table {
        if !["wifi", "server", "canvas", "pipeline"].contains(&name.as_str()) {
            errors.push(format!("unknown section [{}]", name));
            continue;
        }
        match value.as_table() {
            Some(section) => {
                for (key, value) in section {
                    if matches!(value, toml::Value::Table(_) | toml::Value::Array(_)) {
                        errors.push(format!("[{}] {} must be a string or integer", name, key));
                    }
                }
            }
            None => errors.push(format!("{} must be a [section]", name)),
        }
    }
}

fn validate_wifi(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(wifi) = config.get("wifi") else {
        errors.push("missing [wifi] section".to_string());
        return;
    };

    match wifi.get("ssid").and_then(|v| v.as_str()) {
        Some(ssid) if ssid.is_empty() || ssid.len() > 32 => {
            errors.push("[wifi] ssid must be 1-32 characters".to_string());
        }
        Some(_) => {}
        None => errors.push("[wifi] missing 'ssid'".to_string()),
    }

    if let Some(password) = wifi.get("password").and_then(|v| v.as_str()) {
        if password.len() > 64 {
            errors.push("[wifi] password must be at most 64 characters".to_string());
        }
    }
}

fn validate_server(config: &toml::Value, errors: &mut Vec<String>) {
    let url = config
        .get("server")
        .and_then(|s| s.get("url"))
        .and_then(|v| v.as_str());

    match url {
        Some(url) => {
            if !url.starts_with("ws://") {
                errors.push(format!("[server] url must start with ws:// ({})", url));
            } else if url.len() > 5 + 64 + 6 + 64 {
                errors.push("[server] url is too long".to_string());
            }
        }
        None => errors.push("[server] missing 'url'".to_string()),
    }
}

fn validate_canvas(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(canvas) = config.get("canvas") else {
        return;
    };

    if let Some(dim) = canvas.get("dim") {
        if !matches!(dim.as_integer(), Some(32) | Some(64)) {
            errors.push("[canvas] dim must be 32 or 64".to_string());
        }
    }

    if let Some(size) = canvas.get("size_px") {
        match size.as_integer() {
            Some(px) if (1..=320).contains(&px) => {}
            _ => errors.push("[canvas] size_px must be 1-320".to_string()),
        }
    }

    if let Some(background) = canvas.get("background") {
        let valid = background
            .as_str()
            .map(|hex| {
                !hex.is_empty() && hex.len() <= 4 && hex.chars().all(|c| c.is_ascii_hexdigit())
            })
            .unwrap_or(false);
        if !valid {
            errors.push("[canvas] background must be an RGB565 hex string".to_string());
        }
    }
}

fn validate_pipeline(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(pipeline) = config.get("pipeline") else {
        return;
    };

    let mut check = |key: &str, min: i64, max: i64| {
        if let Some(value) = pipeline.get(key) {
            match value.as_integer() {
                Some(v) if (min..=max).contains(&v) => {}
                _ => errors.push(format!("[pipeline] {} must be {}-{}", key, min, max)),
            }
        }
    };

    check("queue_capacity", MIN_QUEUE_CAPACITY, QUEUE_SLOTS);
    check("reconnect_interval_ms", 1, u32::MAX as i64);
    check("direct_draw_threshold", 0, u16::MAX as i64);
    check("render_batch", 1, MAX_RENDER_BATCH);
    check("yield_interval_ms", 1, u32::MAX as i64);
    check("poll_interval_ms", 1, u32::MAX as i64);
}
