/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use std::path::PathBuf;
use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use odin_dtm::{
    DtmConfig, MIN_ALTITUDE, load_config,
    indices::index_source_from_config,
    params::{WorkflowVariant, derive_parameters, validate_request}
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "print the DTM2020 run parameters for a date and altitude")]
pub struct Args {
    /// the RON config file (defaults are used if not set)
    #[arg(short,long)]
    pub config: Option<PathBuf>,

    /// request date (YYYY-MM-DD)
    #[arg(short,long)]
    pub date: String,

    /// altitude in km
    #[arg(short,long, default_value_t = MIN_ALTITUDE as i64)]
    pub altitude: i64,

    /// number of following days to include (full-run horizon)
    #[arg(long, default_value_t = 1)]
    pub horizon: u32,

    /// pretty print the JSON output
    #[arg(short,long)]
    pub pretty: bool,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info"))) // use RUST_LOG to set max level
        .with_writer( std::io::stderr)
        .init();

    let args = Args::parse();

    let config: DtmConfig = match &args.config {
        Some(path) => load_config( path)?,
        None => DtmConfig::default()
    };

    let variant = if args.horizon == 1 { WorkflowVariant::Parameters } else { WorkflowVariant::FullRun { horizon_days: args.horizon } };
    let req = validate_request( &args.date, args.altitude, variant, Utc::now().date_naive())?;

    let source = index_source_from_config( &config)?;
    let params = derive_parameters( source.as_ref(), &req, variant.horizon_days()).await?;

    let json = if args.pretty { serde_json::to_string_pretty( &params)? } else { serde_json::to_string( &params)? };
    println!("{json}");

    Ok(())
}
