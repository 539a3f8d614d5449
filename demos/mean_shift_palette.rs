use hueshift::cluster::MeanShift;
use hueshift::metric::parse_metric;
use hueshift::{NoProgress, RunFlag};
use ndarray::Array2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    // Three flat color regions with a little noise.
    let bases = [[220.0, 40.0, 40.0], [30.0, 160.0, 60.0], [40.0, 60.0, 210.0]];
    let points = Array2::from_shape_fn((3000, 3), |(i, j)| {
        bases[i % 3][j] + ((i * 7 + j * 13) % 9) as f64 - 4.0
    });

    // Weight green double, blue half.
    let metric = parse_metric("scaled(euclidean, (1, 2, 0.5))")?;
    let mut engine = MeanShift::new()
        .with_max_centroids(64)
        .with_min_movement(1.0)
        .engine(points, metric)?;
    println!(
        "{} candidates, radius {:.1}",
        engine.candidates().nrows(),
        engine.radius()
    );

    let summary = engine.run(&RunFlag::new(), &NoProgress);
    println!(
        "{:?} after {} steps, {} settled",
        summary.status,
        summary.iterations,
        engine.settled_count()
    );
    for color in engine.centroids() {
        println!("  {color:?}");
    }
    Ok(())
}
