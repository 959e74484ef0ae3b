use std::process::ExitCode;

fn main() -> ExitCode {
    match home_loan_rates::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
