use std::process::ExitCode;

fn main() -> ExitCode {
    match grainfit::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("grainfit: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
