fn main() {
    // Rerun when git HEAD changes (commit, checkout, etc.)
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-changed=build.rs");

    let output = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output();

    // git が無い環境（配布 tarball など）ではパッケージのバージョン
    let version = match output {
        Ok(o) if o.status.success() => {
            String::from_utf8_lossy(&o.stdout).trim().to_string()
        }
        _ => format!("v{}", std::env::var("CARGO_PKG_VERSION").unwrap_or_default()),
    };

    println!("cargo:rustc-env=GIT_VERSION={}", version);
}
