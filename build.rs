//! Build script checking that the OpenCV system libraries are discoverable,
//! with installation hints when they are not.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    if !pkg_config_available() {
        println!("cargo:warning=pkg-config not found; system library detection will likely fail.");
        println!("cargo:warning=Install it via your package manager (e.g. apt-get install pkg-config).");
        return;
    }

    match opencv_version() {
        Some(version) => println!("cargo:warning=Building against OpenCV {version}"),
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
        }
    }
}

fn pkg_config_available() -> bool {
    Command::new("pkg-config")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn opencv_version() -> Option<String> {
    for package in ["opencv4", "opencv"] {
        if let Ok(output) = Command::new("pkg-config").args(["--modversion", package]).output() {
            if output.status.success() {
                return Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
            }
        }
    }
    None
}
