use crate::errors::GrapherError;
use crate::session::{ResultPoint, SessionConfig};
use crate::sweep::SweepOutcome;

use colored::Colorize;
use plotters::prelude::*;

/// Where the scatter plot goes and how its axes are labelled.
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub path: String,
    pub x_hex: bool,
    pub y_hex: bool,
}

/// Print the collected points, then any per-value faults as warnings.
/// Expects the points already sorted by input.
pub fn print_report(outcome: &SweepOutcome) {
    println!("{}", "Points:".bold());
    for point in &outcome.points {
        println!("({}, {})", point.input, point.output);
    }

    for fault in &outcome.faults {
        println!(
            "{} input {} skipped: {}",
            "warning:".yellow().bold(),
            fault.input,
            fault.error
        );
    }
}

/// Render the swept pairs as an SVG scatter plot, inputs on the x
/// axis, outputs on the y axis.
pub fn render(
    points: &[ResultPoint],
    config: &SessionConfig,
    options: &PlotOptions,
) -> Result<(), GrapherError> {
    let fail = |reason: String| GrapherError::Plot {
        path: options.path.clone(),
        reason,
    };

    let x_min = points.iter().map(|p| p.input).min().unwrap_or(0);
    let x_max = points.iter().map(|p| p.input).max().unwrap_or(0) + 1;
    let y_min = points.iter().map(|p| p.output).min().unwrap_or(0);
    let y_max = points.iter().map(|p| p.output).max().unwrap_or(0) + 1;

    let root = SVGBackend::new(&options.path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| fail(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Bruteforcing {} @ {}", config.input, config.start),
            ("sans-serif", 24),
        )
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(96)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(|e| fail(e.to_string()))?;

    {
        let mut mesh = chart.configure_mesh();
        mesh.x_desc(format!("{} starting values @ {}", config.input, config.start))
            .y_desc(format!("{} ending values @ {}", config.output, config.stop));
        if options.x_hex {
            mesh.x_label_formatter(&hex_label);
        }
        if options.y_hex {
            mesh.y_label_formatter(&hex_label);
        }
        mesh.draw().map_err(|e| fail(e.to_string()))?;
    }

    chart
        .draw_series(
            points
                .iter()
                .map(|p| Circle::new((p.input, p.output), 4, RED.filled())),
        )
        .map_err(|e| fail(e.to_string()))?;

    root.present().map_err(|e| fail(e.to_string()))?;
    Ok(())
}

fn hex_label(value: &u64) -> String {
    format!("0x{:08X}", value)
}
