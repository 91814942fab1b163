use std::process::ExitCode;

fn main() -> ExitCode {
    match fwlink::run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {:#}", console::style("error:").red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
