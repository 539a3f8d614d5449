use std::sync::mpsc;
use std::thread;

use hueshift::{ProgressEvent, QuantizeConfig, RunFlag};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG=hueshift=debug shows per-iteration shifts.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // A 128×128 RGB gradient.
    let pixels: Vec<Vec<u8>> = (0..128u32)
        .flat_map(|y| {
            (0..128u32).map(move |x| vec![(x * 2) as u8, (y * 2) as u8, ((x + y) % 256) as u8])
        })
        .collect();

    let config = QuantizeConfig::default().with_k(8).with_seed(2024);
    let flag = RunFlag::new();
    let (tx, rx) = mpsc::channel::<ProgressEvent>();

    // Run on a worker and poll progress from here, as a UI would.
    let worker = {
        let flag = flag.clone();
        thread::spawn(move || config.quantize(&pixels, &flag, &tx))
    };

    for event in rx {
        match event {
            ProgressEvent::Status(message) => println!("{message}"),
            ProgressEvent::SumSquaredError(sse) => println!("sum of squared error: {sse:.1}"),
        }
    }

    let result = worker.join().map_err(|_| "worker panicked")??;
    println!(
        "{:?} after {} iterations, {} colors:",
        result.status,
        result.iterations,
        result.palette.len()
    );
    let mut usage = vec![0usize; result.palette.len()];
    for &i in &result.indices {
        usage[i] += 1;
    }
    for (color, count) in result.palette.iter().zip(usage) {
        println!("  {color:?}  {count} px");
    }
    Ok(())
}
