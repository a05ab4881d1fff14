use std::path::PathBuf;

use dicom_reslice::{ClipBox, Viewer, ViewerConfig, VolumeLoader};
use log::{error, info};
use nalgebra::{UnitQuaternion, Vector3};

/// Load a series, place a thin box through its centre and write the slice.
fn run(directory: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::default();
    let grid = VolumeLoader::load_from_directory(&directory, config.sort_by)?;
    let center = grid.center();
    let [xmin, xmax, ymin, ymax, ..] = grid.bounds();
    let thickness = config.planarity_threshold / 2.0;
    let mut viewer = Viewer::new(grid, config)?;

    let thin = ClipBox::from_parts(
        center,
        UnitQuaternion::identity(),
        Vector3::new(xmax - xmin, ymax - ymin, thickness),
    );
    viewer.on_interaction_update(*thin.transform())?;
    let slice = viewer.display_slice()?;
    let image = slice.to_image().ok_or("slice raster has an unexpected size")?;
    image.save("slice.png")?;
    info!("Wrote slice.png ({}x{})", image.width(), image.height());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let directory = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("dicom"));

    if let Err(err) = run(directory) {
        error!("{err}");
        std::process::exit(1);
    }
}
