use clap::{App, Arg};
use colored::Colorize;

use r2grapher::errors::GrapherError;
use r2grapher::location::Location;
use r2grapher::plot::{self, PlotOptions};
use r2grapher::range::SweepSpec;
use r2grapher::session::{open_target, SessionConfig};
use r2grapher::sweep::sweep;

use std::process;
use std::time::Duration;

fn main() {
    let matches = App::new("r2grapher")
        .version("0.1.0")
        .about("Graphs how one register or memory value depends on another by brute forcing it under the r2 debugger")
        .arg(Arg::with_name("filename")
            .required(true)
            .index(1)
            .help("Path of the executable to analyze"))
        .arg(Arg::with_name("start")
            .required(true)
            .index(2)
            .help("Address of the first breakpoint, where the input value is injected"))
        .arg(Arg::with_name("stop")
            .required(true)
            .index(3)
            .help("Address of the second breakpoint, where the output value is recorded"))
        .arg(Arg::with_name("input")
            .required(true)
            .index(4)
            .help("Register or memory location to brute force, e.g. \"eax\" or \"m[rbp-0x8]\". Shown on the x-axis"))
        .arg(Arg::with_name("output")
            .required(true)
            .index(5)
            .help("Register or memory location to record after execution, same syntax as the input. Shown on the y-axis"))
        .arg(Arg::with_name("range")
            .required(true)
            .index(6)
            .help("Values to try, \"[lower,upper]\" or \"[lower,upper,step]\" in base 10, upper bound exclusive"))
        .arg(Arg::with_name("threads")
            .short("t")
            .long("threads")
            .takes_value(true)
            .default_value("5")
            .help("Number of simultaneously open debug sessions"))
        .arg(Arg::with_name("standard_input")
            .short("i")
            .long("standard-input")
            .takes_value(true)
            .value_name("PATH")
            .help("Make the target read standard input from this file"))
        .arg(Arg::with_name("input_length")
            .long("input-length")
            .takes_value(true)
            .default_value("1")
            .help("Bytes written at the input memory location, ignored for registers"))
        .arg(Arg::with_name("output_length")
            .long("output-length")
            .takes_value(true)
            .default_value("1")
            .possible_values(&["1", "2", "4", "8"])
            .help("Bytes read at the output memory location, ignored for registers"))
        .arg(Arg::with_name("execute")
            .short("e")
            .long("execute")
            .takes_value(true)
            .value_name("CMDS")
            .help("r2 commands run after the first breakpoint, before the input is set. Separate multiple commands with semicolons"))
        .arg(Arg::with_name("x_axis_hex")
            .long("x-axis-hex")
            .help("Display the x-axis in hexadecimal"))
        .arg(Arg::with_name("y_axis_hex")
            .long("y-axis-hex")
            .help("Display the y-axis in hexadecimal"))
        .arg(Arg::with_name("jump")
            .short("j")
            .long("jump")
            .help("Set the instruction pointer straight to the start address instead of running the code before it"))
        .arg(Arg::with_name("timeout")
            .long("timeout")
            .takes_value(true)
            .default_value("0")
            .help("Seconds before a stuck session is abandoned, 0 disables the limit"))
        .arg(Arg::with_name("output_file")
            .short("o")
            .long("output-file")
            .takes_value(true)
            .default_value("sweep.svg")
            .help("Where the scatter plot is written"))
        .arg(Arg::with_name("verbose")
            .short("v")
            .long("verbose")
            .help("Show verbose / debugging output"))
        .get_matches();

    let level = if matches.is_present("verbose") {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let spec = fatal(SweepSpec::parse(matches.value_of("range").unwrap()));
    let input = fatal(Location::parse(matches.value_of("input").unwrap()));
    let output = fatal(Location::parse(matches.value_of("output").unwrap()));

    let threads: usize = parse_number("--threads", matches.value_of("threads").unwrap());
    if threads == 0 {
        die(invalid_argument("--threads", "0", "must be at least 1"));
    }

    let input_width: usize =
        parse_number("--input-length", matches.value_of("input_length").unwrap());
    if input_width == 0 {
        die(invalid_argument("--input-length", "0", "must be at least 1"));
    }
    let output_width: usize =
        parse_number("--output-length", matches.value_of("output_length").unwrap());

    let timeout_secs: u64 = parse_number("--timeout", matches.value_of("timeout").unwrap());
    let timeout = if timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(timeout_secs))
    };

    let commands: Vec<String> = matches
        .value_of("execute")
        .unwrap_or_default()
        .split(';')
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty())
        .collect();

    let config = SessionConfig {
        target: matches.value_of("filename").unwrap().to_owned(),
        start: matches.value_of("start").unwrap().to_owned(),
        stop: matches.value_of("stop").unwrap().to_owned(),
        input,
        output,
        input_width,
        output_width,
        commands,
        stdin_file: matches.value_of("standard_input").map(|s| s.to_owned()),
        jump: matches.is_present("jump"),
    };

    let plot_options = PlotOptions {
        path: matches.value_of("output_file").unwrap().to_owned(),
        x_hex: matches.is_present("x_axis_hex"),
        y_hex: matches.is_present("y_axis_hex"),
    };

    let target = config.target.clone();
    let mut outcome = sweep(&spec, &config, threads, timeout, move || {
        open_target(&target)
    });

    outcome.points.sort_unstable();
    plot::print_report(&outcome);

    if outcome.points.is_empty() {
        eprintln!(
            "{} no value produced a result, nothing to plot",
            "error:".red().bold()
        );
        process::exit(1);
    }

    fatal(plot::render(&outcome.points, &config, &plot_options));
    println!(
        "{} plotted {} points to {}",
        "done:".green().bold(),
        outcome.points.len(),
        plot_options.path
    );
}

fn die(err: GrapherError) -> ! {
    eprintln!("{} {}", "error:".red().bold(), err);
    process::exit(1);
}

fn fatal<T>(result: Result<T, GrapherError>) -> T {
    result.unwrap_or_else(|e| die(e))
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> T
where
    T::Err: std::fmt::Display,
{
    fatal(
        raw.parse()
            .map_err(|e: T::Err| invalid_argument(field, raw, &e.to_string())),
    )
}

fn invalid_argument(field: &'static str, value: &str, reason: &str) -> GrapherError {
    GrapherError::InvalidArgument {
        field,
        value: value.to_owned(),
        reason: reason.to_owned(),
    }
}
