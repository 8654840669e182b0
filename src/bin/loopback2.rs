//! Half-duplex loopback: records the default microphone to `rec.wav`
//! (16-bit mono at 48 kHz) on one device while playing `out.wav` on
//! another, and prints the skew between the two streams' first callbacks.

use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::thread;
use std::time::{Duration, Instant};

use loopback::{
    skew_micros, CaptureConfig, CaptureStream, PlaybackConfig, PlaybackStream, WavDecoder,
    WavEncoder, HALF_DUPLEX_PERIOD_MS,
};

/// Print the first-callback skew once both streams have fired.
fn report_dt(capture: &CaptureStream, playback: &PlaybackStream) -> bool {
    match skew_micros(capture.first_callback(), playback.first_callback()) {
        Some(dt) => {
            println!("dt = {} us", dt);
            true
        }
        None => false,
    }
}

/// Fixed recording format, independent of the playback file.
const REC_CHANNELS: u16 = 1;
const REC_SAMPLE_RATE: u32 = 48000;

fn main() {
    process::exit(run());
}

fn run() -> i32 {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        println!("Usage: {} rec.wav out.wav", args[0]);
        return -1;
    }

    let epoch = Instant::now();

    let encoder = match WavEncoder::create(&args[1], REC_CHANNELS, REC_SAMPLE_RATE) {
        Ok(encoder) => encoder,
        Err(e) => {
            println!("{}", e);
            return e.exit_code();
        }
    };

    let capture_config = CaptureConfig {
        channels: REC_CHANNELS,
        sample_rate: REC_SAMPLE_RATE,
        period_ms: HALF_DUPLEX_PERIOD_MS,
        ..Default::default()
    };

    let capture = match CaptureStream::start(encoder, &capture_config, epoch) {
        Ok(stream) => stream,
        Err(e) => {
            println!("{}", e);
            return e.exit_code();
        }
    };

    let decoder = match WavDecoder::open(&args[2]) {
        Ok(decoder) => decoder,
        Err(e) => {
            println!("{}", e);
            return e.exit_code();
        }
    };

    let playback_config = PlaybackConfig {
        period_ms: HALF_DUPLEX_PERIOD_MS,
        ..Default::default()
    };

    let playback = match PlaybackStream::start(decoder, &playback_config, epoch) {
        Ok(stream) => stream,
        Err(e) => {
            println!("{}", e);
            return e.exit_code();
        }
    };

    // Report how far apart the two devices' first callbacks landed. Give
    // prompt devices a couple of seconds to show up early; slow ones get a
    // final check after Enter below.
    let mut dt_reported = false;
    for _ in 0..200 {
        if report_dt(&capture, &playback) {
            dt_reported = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    print!("Press Enter to quit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);

    if !dt_reported {
        report_dt(&capture, &playback);
    }

    let mut code = 0;
    match playback.stop() {
        Ok(summary) => {
            if summary.underruns > 0 {
                eprintln!("Warning: {} playback underruns", summary.underruns);
            }
        }
        Err(e) => {
            println!("{}", e);
            code = e.exit_code();
        }
    }
    match capture.stop() {
        Ok(summary) => {
            println!("Recorded {} frames", summary.frames_written);
        }
        Err(e) => {
            println!("{}", e);
            code = e.exit_code();
        }
    }

    code
}
