use std::{env, fs, path::Path};

fn main() {
    let out_dir = env::var("OUT_DIR").unwrap();

    let mut version_bytes = Vec::with_capacity(6);
    for key in [
        "CARGO_PKG_VERSION_MAJOR",
        "CARGO_PKG_VERSION_MINOR",
        "CARGO_PKG_VERSION_PATCH",
    ] {
        let part: u16 = env::var(key).unwrap().parse().unwrap();
        version_bytes.extend(part.to_be_bytes());
    }

    fs::write(Path::new(&out_dir).join("version_bytes"), version_bytes).unwrap();
    println!("cargo:rerun-if-changed=Cargo.toml");
}
