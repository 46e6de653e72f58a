#[cfg(target_os = "macos")]
fn main() {
    // System audio capture goes through ScreenCaptureKit, whose Swift bridge links against
    // `@rpath/libswift_Concurrency.dylib`. Point the rpath at the system Swift runtime instead
    // of bundling a copy next to the binary.
    println!("cargo:rustc-link-arg=-Wl,-rpath,/usr/lib/swift");
    println!("cargo:rerun-if-changed=build.rs");
}

#[cfg(not(target_os = "macos"))]
fn main() {}
