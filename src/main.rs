fn main() -> std::process::ExitCode {
    packsmith::run()
}
