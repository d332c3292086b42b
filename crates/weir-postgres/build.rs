fn main() {
    // The system libpq is only linked when the real transport is compiled.
    if std::env::var_os("CARGO_FEATURE_LIBPQ").is_none() {
        return;
    }

    if let Ok(dir) = std::env::var("PQ_LIB_DIR") {
        println!("cargo:rustc-link-search=native={dir}");
    }
    println!("cargo:rustc-link-lib=pq");
    println!("cargo:rerun-if-env-changed=PQ_LIB_DIR");
}
