fn main() {
    // Only run linker script setup for hardware builds
    #[cfg(feature = "hardware")]
    {
        use std::env;
        use std::fs;
        use std::path::PathBuf;

        // Put the SRAM link script in our output directory and ensure it's on the linker search path.
        let Some(out_dir) = env::var_os("OUT_DIR") else {
            println!("cargo:warning=OUT_DIR not set, link script not installed");
            return;
        };
        let out = PathBuf::from(out_dir);
        if let Err(e) = fs::write(out.join("link.x"), include_bytes!("sama5d2-sram.x")) {
            println!("cargo:warning=cannot write link.x: {e}");
            return;
        }

        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
        println!("cargo:rerun-if-changed=sama5d2-sram.x");
    }

    println!("cargo:rerun-if-changed=build.rs");
}
