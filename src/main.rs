mod calc;
mod grid;
mod ipc;
mod report;

use std::io::{self, BufRead, Write};

fn main() {
    // Sidecar protocol: one JSON request per stdin line, one JSON response
    // per stdout line. Nothing else may be written to stdout.
    let mut state = ipc::AppState::new();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't address a reply without an id.
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(stdout, "{}", resp);
        let _ = stdout.flush();
    }
}
