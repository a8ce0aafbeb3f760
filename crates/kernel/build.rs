use std::env;

fn main() {
    println!("cargo:rerun-if-changed=link.ld");

    // Only bare-metal images use the custom layout; hosted builds (tests)
    // link normally.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
        println!("cargo:rustc-link-arg=-T{manifest_dir}/link.ld");
    }
}
