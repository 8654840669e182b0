//! Full-duplex loopback: plays `out.wav` through the default output device
//! while recording the default microphone to `rec.wav`, until Enter is
//! pressed. The recording uses the playback file's channel count and
//! sample rate.

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use loopback::{DuplexConfig, DuplexLoopback, DUPLEX_PERIOD_MS};

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        println!("Usage: {} rec.wav out.wav", args[0]);
        return -1;
    }

    let config = DuplexConfig {
        period_ms: DUPLEX_PERIOD_MS,
        ..Default::default()
    };

    let session = match DuplexLoopback::start(&args[1], &args[2], &config) {
        Ok(session) => session,
        Err(e) => {
            println!("{}", e);
            return e.exit_code();
        }
    };

    print!("Press Enter to quit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);

    match session.stop() {
        Ok(summary) => {
            println!(
                "Recorded {} frames, played {} frames",
                summary.capture.frames_written, summary.playback.frames_played
            );
            if summary.capture.dropped_samples > 0 {
                eprintln!(
                    "Warning: dropped {} capture samples",
                    summary.capture.dropped_samples
                );
            }
            0
        }
        Err(e) => {
            println!("{}", e);
            e.exit_code()
        }
    }
}
