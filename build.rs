fn main() {
    // HEAD が動いたらバージョンを埋め直す
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let described = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output();

    let pkg_version = env!("CARGO_PKG_VERSION");
    let version = match described {
        Ok(o) if o.status.success() => {
            format!("{} ({})", pkg_version, String::from_utf8_lossy(&o.stdout).trim())
        }
        _ => pkg_version.to_string(),
    };

    println!("cargo:rustc-env=BOOTH_BUILD_VERSION={}", version);
}
