fn main() {
    uniffi::generate_scaffolding("src/quickstart.udl").unwrap();

    // Keep the Java_org_webrtc_* JNI symbols exported so libwebrtc can call
    // back into its bundled Java classes.
    if std::env::var("CARGO_CFG_TARGET_OS").unwrap() == "android" {
        webrtc_sys_build::configure_jni_symbols()
            .expect("failed to configure JNI symbols for Android");
    }
}
