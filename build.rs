//! Build script for isotika.
//!
//! When the embedded-worker feature is enabled, copies the Tika server jar to
//! OUT_DIR so it can be embedded with `include_bytes!`.

fn main() {
    #[cfg(feature = "embedded-worker")]
    stage_embedded_artifact();

    println!("cargo:rerun-if-env-changed=ISOTIKA_EMBED_JAR");
    println!("cargo:rerun-if-changed=resources/");
    println!("cargo:rerun-if-changed=build.rs");
}

#[cfg(feature = "embedded-worker")]
fn stage_embedded_artifact() {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let staged = out_dir.join("tika-server.jar");

    let source = match env::var("ISOTIKA_EMBED_JAR") {
        Ok(path) => PathBuf::from(path),
        Err(_) => manifest_dir.join("resources").join("tika-server.jar"),
    };

    if !source.exists() {
        panic!(
            "Cannot embed worker: {:?} not found.\n\
             Set ISOTIKA_EMBED_JAR or place the jar at resources/tika-server.jar.",
            source
        );
    }

    fs::copy(&source, &staged).expect("Failed to copy worker jar");
    println!("cargo:warning=Embedding worker jar from {:?}", source);
}
