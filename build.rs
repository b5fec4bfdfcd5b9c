fn main() {
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }

    println!("cargo:rerun-if-changed=tauri.conf.json");
    println!("cargo:rerun-if-changed=capabilities");
}
