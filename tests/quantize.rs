//! Worker-thread usage: progress over channels, cancellation, RGBA input.

#![allow(clippy::unwrap_used)]

use std::sync::mpsc;
use std::thread;

use hueshift::metric::{Norm, Scaled};
use hueshift::{Algorithm, ProgressEvent, QuantizeConfig, RunFlag, RunStatus};

/// A 64×64 gradient with a flat border, as RGB rows.
fn gradient() -> Vec<Vec<u8>> {
    let mut pixels = Vec::with_capacity(64 * 64);
    for y in 0..64u8 {
        for x in 0..64u8 {
            if x < 4 || y < 4 {
                pixels.push(vec![0, 0, 0]);
            } else {
                pixels.push(vec![x * 4, y * 4, 128]);
            }
        }
    }
    pixels
}

#[test]
fn progress_arrives_in_order_over_a_channel() {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let flag = RunFlag::new();
    let worker_flag = flag.clone();

    let worker = thread::spawn(move || {
        QuantizeConfig::default()
            .with_k(6)
            .with_seed(17)
            .quantize(&gradient(), &worker_flag, &tx)
    });
    let result = worker.join().unwrap().unwrap();
    let events: Vec<ProgressEvent> = rx.iter().collect();

    assert_eq!(
        events[0],
        ProgressEvent::Status("Choosing initial centroids".into())
    );
    assert_eq!(events[1], ProgressEvent::Status("Shifting centroids".into()));
    let iterations = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Status(s) if s.starts_with("Iteration: ")))
        .count();
    assert_eq!(iterations, result.iterations);
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::SumSquaredError(result.sum_squared_error))
    );
    assert_eq!(result.status, RunStatus::Converged);
    assert_eq!(result.indices.len(), 64 * 64);
}

#[test]
fn halting_the_flag_stops_the_worker() {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let flag = RunFlag::new();
    let worker_flag = flag.clone();

    // A negative threshold is never met, so only the flag can end the run.
    let worker = thread::spawn(move || {
        QuantizeConfig::default()
            .with_k(8)
            .with_seed(5)
            .with_convergence_threshold(-1.0)
            .quantize(&gradient(), &worker_flag, &tx)
    });

    for event in rx.iter() {
        if matches!(&event, ProgressEvent::Status(s) if s.starts_with("Iteration: 2,")) {
            flag.halt();
            break;
        }
    }

    let result = worker.join().unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.iterations >= 2);
    // The partial result is still a complete mapping.
    assert_eq!(result.palette.len(), 8);
    assert!(result.indices.iter().all(|&i| i < 8));
}

#[test]
fn bounded_channel_never_stalls_the_run() {
    let (tx, rx) = mpsc::sync_channel::<ProgressEvent>(1);
    let result = QuantizeConfig::default()
        .with_algorithm(Algorithm::MeanShift)
        .with_max_centroids(27)
        .quantize(&gradient(), &RunFlag::new(), &tx)
        .unwrap();

    assert_eq!(result.status, RunStatus::Converged);
    assert!(!result.palette.is_empty());
    assert!(result.palette.len() <= 27);
    // Only the first event fit in the queue.
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn alpha_can_be_scaled_out_of_the_metric() {
    // Same colors, wildly different alpha.
    let pixels: Vec<Vec<u8>> = (0..100u8)
        .map(|i| {
            if i % 2 == 0 {
                vec![250, 10, 10, i]
            } else {
                vec![10, 10, 250, 255 - i]
            }
        })
        .collect();

    let result = QuantizeConfig::default()
        .with_k(2)
        .with_seed(9)
        .with_metric("scaled(euclidean, (1, 1, 1, 0))")
        .with_convergence_threshold(0.0)
        .quantize(&pixels, &RunFlag::new(), &hueshift::NoProgress)
        .unwrap();

    for (i, &index) in result.indices.iter().enumerate() {
        assert_eq!(index, result.indices[i % 2]);
    }
    assert_ne!(result.indices[0], result.indices[1]);
    // Alpha is averaged but never drives the split.
    assert_eq!(result.palette[result.indices[0]][..3], [250, 10, 10]);
    assert_eq!(result.palette[result.indices[0]].len(), 4);
}

#[test]
fn custom_metric_value_bypasses_the_registry() {
    let metric = Scaled::new(Norm::manhattan(), vec![2.0, 1.0, 1.0]);
    let result = QuantizeConfig::default()
        .with_metric("not a metric")
        .with_k(3)
        .with_seed(1)
        .quantize_with_metric(&gradient(), metric, &RunFlag::new(), &hueshift::NoProgress)
        .unwrap();
    assert_eq!(result.palette.len(), 3);

    let err = QuantizeConfig::default()
        .with_metric("not a metric")
        .quantize(&gradient(), &RunFlag::new(), &hueshift::NoProgress)
        .unwrap_err();
    assert!(err.is_configuration());
}
