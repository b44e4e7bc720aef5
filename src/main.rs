fn main() -> std::process::ExitCode {
    todo_desk_lib::run()
}
