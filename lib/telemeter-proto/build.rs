fn main() {
    println!("cargo:rerun-if-changed=proto/remote.proto");
    println!("cargo:rerun-if-changed=proto/client_model.proto");

    let mut prost_build = prost_build::Config::new();
    prost_build
        .compile_protos(&["proto/remote.proto", "proto/client_model.proto"], &["proto"])
        .unwrap();
}
