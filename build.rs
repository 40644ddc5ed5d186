fn main() {
    // Only the ESP-IDF firmware build needs the sysenv passthrough; host
    // test builds run with the `espidf` feature disabled.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
