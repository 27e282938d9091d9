use std::io::Write;

use scoring::executable_utils::{initialize_predictor, run_prediction};

fn main() {
    initialize_predictor();

    let prediction = run_prediction(
        std::env::args_os()
            .nth(1)
            .map(|argument| argument.to_string_lossy().into_owned()),
    );
    tracing::info!(degraded = prediction.is_degraded(), "Prediction finished");

    // The exit code is always 0; a closed stdout is the caller's problem.
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", prediction.to_json_line());
    let _ = stdout.flush();
}
