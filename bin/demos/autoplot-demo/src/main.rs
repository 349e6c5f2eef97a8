// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use anyhow::{Context, Result};
use autoplot::{Column, Dataset, EngineOptions, PlotEngine};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Plot one formula and print the plot spec with its decision trace.
    Plot {
        #[arg(long, default_value = "income ~ region")]
        formula: String,
    },
    /// One plot per column, or per explanatory column of a `y ~ .` formula.
    Overview {
        #[arg(long)]
        formula: Option<String>,
    },
    Random {
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Runs a fixed set of formulas covering every archetype.
    Tour,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "autoplot-demo")]
#[command(about = "Pick plots for a synthetic survey dataset and print the resulting specs.")]
struct Cli {
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long, default_value_t = 2_000)]
    rows: usize,
    #[arg(long, default_value_t = 42)]
    data_seed: u64,
    /// YAML file with engine options.
    #[arg(long)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

const REGIONS: [&str; 5] = ["north", "south", "east", "west", "central"];
const EDUCATION: [&str; 4] = ["primary", "secondary", "bachelor", "graduate"];
const TOUR: [&str; 8] = [
    "income ~ 1",
    "region ~ 1",
    "income ~ age",
    "income ~ region",
    "education ~ region",
    "income ~ age + region",
    "income ~ region | sex",
    "education ~ region + sex",
];

fn survey(rows: usize, seed: u64) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut age = Vec::with_capacity(rows);
    let mut income = Vec::with_capacity(rows);
    let mut region = Vec::with_capacity(rows);
    let mut education = Vec::with_capacity(rows);
    let mut sex = Vec::with_capacity(rows);
    let mut weights = Vec::with_capacity(rows);
    for _ in 0..rows {
        let years = rng.gen_range(18u32..80);
        let level = rng.gen_range(0..EDUCATION.len());
        let base = 15_000.0 + 400.0 * f64::from(years) + 12_000.0 * level as f64;
        age.push(Some(f64::from(years)));
        income.push((rng.gen::<f64>() > 0.03).then(|| base * (rng.gen::<f64>() * 2.5).exp()));
        region.push(REGIONS[rng.gen_range(0..REGIONS.len())]);
        education.push(EDUCATION[level]);
        sex.push(if rng.gen_bool(0.5) { "f" } else { "m" });
        weights.push(rng.gen_range(0.5..3.0));
    }
    let data = Dataset::builder()
        .column("age", Column::numeric_opt(age))
        .column("income", Column::numeric_opt(income))
        .column("region", Column::categorical(region))
        .column("education", Column::ordered(education, &EDUCATION))
        .column("sex", Column::categorical(sex))
        .weights(weights)
        .build()?;
    Ok(data)
}

fn print_plot(engine: &PlotEngine, data: &Dataset, formula: &str) -> Result<()> {
    let (spec, trace) = engine
        .plot_with_trace(data, formula)
        .with_context(|| format!("plotting `{formula}`"))?;
    info!(formula, archetype = %spec.archetype, "plot selected");
    println!("{}", spec.to_json()?);
    for entry in trace.entries() {
        println!("  [{}] {}", entry.stage, entry.message);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info,autoplot::trace=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let options = match &args.config {
        Some(path) => EngineOptions::from_yaml_file(path)?,
        None => EngineOptions::default(),
    };
    let engine = PlotEngine::with_options(options)?;
    let data = survey(args.rows, args.data_seed)?;
    info!(rows = data.n_rows(), columns = data.n_columns(), "synthetic survey ready");

    match args.command {
        Commands::Plot { formula } => print_plot(&engine, &data, &formula)?,
        Commands::Overview { formula } => {
            for spec in engine.overview(&data, formula.as_deref())? {
                match spec {
                    Ok(spec) => println!("{:>10}  {}", spec.archetype.as_str(), spec.formula),
                    Err(e) => println!("{:>10}  {e}", "skipped"),
                }
            }
        }
        Commands::Random { seed } => {
            let spec = engine.random_plot(&data, seed)?;
            println!("{}", spec.to_json()?);
        }
        Commands::Tour => {
            for formula in TOUR {
                print_plot(&engine, &data, formula)?;
            }
        }
    }
    Ok(())
}
