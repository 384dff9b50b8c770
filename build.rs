// build.rs

use std::path::PathBuf;

fn main() {
    // --- Embed the picture ---
    // The image step outputs raw XRGB8888 pixels laid out for the target
    // mode's pitch. Its path is given with KMS_SPLASH_PICTURE; without it an
    // empty picture is embedded and the screen shows the zeroed buffer.
    println!("cargo:rerun-if-env-changed=KMS_SPLASH_PICTURE");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR not set by cargo"));
    let target = out_dir.join("picture.bin");

    match std::env::var("KMS_SPLASH_PICTURE") {
        Ok(source) => {
            println!("cargo:rerun-if-changed={}", source);
            std::fs::copy(&source, &target)
                .unwrap_or_else(|e| panic!("Cannot copy picture {}: {}", source, e));
        }
        Err(_) => {
            println!("cargo:warning=KMS_SPLASH_PICTURE not set, embedding an empty picture");
            std::fs::write(&target, b"").expect("Cannot write empty picture");
        }
    }
}
